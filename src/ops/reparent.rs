use uuid::Uuid;

use crate::io::flush::{self, CommitReport};
use crate::io::store::{ScopeId, Store};
use crate::model::group::{GroupKey, RecordKind};
use crate::model::ordered::OrderedRecord;
use crate::model::record::{Header, Project, Task};
use crate::ops::reindex::{append_order, reindex};
use crate::ops::reorder::{OrderError, fetch_siblings, stage_all};

/// Where a task lives: the inbox, a project, or a header inside a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    pub project: Option<Uuid>,
    pub header: Option<Uuid>,
}

impl Placement {
    pub fn inbox() -> Self {
        Placement::default()
    }

    pub fn project(project: Uuid) -> Self {
        Placement {
            project: Some(project),
            header: None,
        }
    }

    pub fn header(project: Uuid, header: Uuid) -> Self {
        Placement {
            project: Some(project),
            header: Some(header),
        }
    }

    /// The task group a task with this placement belongs to
    pub fn group(&self) -> GroupKey {
        GroupKey::tasks_in(self.project, self.header)
    }
}

/// Check that the project and header named by `placement` exist in the
/// scope and that the header belongs to that project.
pub fn validate_placement(
    store: &Store,
    scope: ScopeId,
    placement: &Placement,
) -> Result<(), OrderError> {
    if let Some(project) = placement.project {
        if store.get::<Project>(scope, project)?.is_none() {
            return Err(OrderError::NotFound {
                kind: RecordKind::Project,
                id: project,
            });
        }
    }
    if let Some(header_id) = placement.header {
        let header: Header = store
            .get(scope, header_id)?
            .ok_or(OrderError::NotFound {
                kind: RecordKind::Header,
                id: header_id,
            })?;
        match placement.project {
            None => return Err(OrderError::HeaderWithoutProject(header_id)),
            Some(project) if header.project != project => {
                return Err(OrderError::HeaderOutsideProject {
                    header: header_id,
                    project,
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Move a task into another group, placing it after that group's current
/// last member, and commit.
///
/// The group the task leaves keeps its gap unless
/// `ordering.compact_on_reparent` is set. Returns `None` when the task is
/// already in the destination group.
pub fn reparent_task(
    store: &mut Store,
    scope: ScopeId,
    task_id: Uuid,
    placement: Placement,
) -> Result<Option<CommitReport>, OrderError> {
    let mut task: Task = store.get(scope, task_id)?.ok_or(OrderError::NotFound {
        kind: RecordKind::Task,
        id: task_id,
    })?;
    validate_placement(store, scope, &placement)?;

    let source = task.group();
    let target = placement.group();
    if source == target {
        return Ok(None);
    }

    let spacing = store.spacing();
    let mut destination: Vec<Task> = fetch_siblings(store, scope, &target);
    let order = match append_order(&destination, spacing) {
        Some(order) => order,
        None => {
            tracing::info!(group = %target, "order values exhausted, reindexing destination");
            reindex(&mut destination, spacing);
            append_order(&destination, spacing).unwrap_or(i32::MAX)
        }
    };

    task.project = placement.project;
    task.header = placement.header;
    task.dirty = true;
    task.set_order(order);

    stage_all(store, scope, &mut destination)?;
    stage_all(store, scope, std::slice::from_mut(&mut task))?;

    if store.config().ordering.compact_on_reparent {
        let mut remaining: Vec<Task> = fetch_siblings(store, scope, &source);
        let changed = reindex(&mut remaining, spacing);
        if changed > 0 {
            stage_all(store, scope, &mut remaining)?;
        }
    }

    tracing::debug!(task = %task_id, from = %source, to = %target, order, "reparented");
    Ok(Some(flush::commit(store, scope)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::backend::MemoryBackend;
    use crate::model::config::StoreConfig;
    use chrono::{Duration, Utc};

    struct Fixture {
        store: Store,
        project: Uuid,
        header: Uuid,
        inbox: Vec<Uuid>,
    }

    fn fixture(config: StoreConfig) -> Fixture {
        let backend = MemoryBackend::new();
        let mut store = Store::open(Box::new(backend), config).unwrap();
        let scope = ScopeId::PRIMARY;
        let now = Utc::now();

        let mut project = Project::new("Garden", now);
        project.order = Some(0);
        let mut header = Header::new(project.id, "Spring", now);
        header.order = Some(0);

        let mut inbox: Vec<Task> = (0..3)
            .map(|i| {
                let mut t = Task::new(format!("T{}", i), now + Duration::seconds(i));
                t.order = Some(i as i32 * 10);
                t
            })
            .collect();
        let mut filed = Task::new("Filed", now);
        filed.project = Some(project.id);
        filed.order = Some(40);

        let ids = inbox.iter().map(|t| t.id).collect();
        store.stage(scope, std::slice::from_mut(&mut project)).unwrap();
        store.stage(scope, std::slice::from_mut(&mut header)).unwrap();
        store.stage(scope, &mut inbox).unwrap();
        store.stage(scope, &mut [filed]).unwrap();
        flush::commit(&mut store, scope).unwrap();

        Fixture {
            store,
            project: project.id,
            header: header.id,
            inbox: ids,
        }
    }

    fn orders(store: &Store, group: &GroupKey) -> Vec<Option<i32>> {
        store
            .siblings::<Task>(ScopeId::PRIMARY, group)
            .unwrap()
            .iter()
            .map(|t| t.order)
            .collect()
    }

    #[test]
    fn test_appends_after_destination_max() {
        let mut f = fixture(StoreConfig::default());
        let moved = f.inbox[0];
        let report = reparent_task(
            &mut f.store,
            ScopeId::PRIMARY,
            moved,
            Placement::project(f.project),
        )
        .unwrap()
        .unwrap();

        assert!(report.groups.contains(&GroupKey::inbox()));
        assert!(report.groups.contains(&GroupKey::project_tasks(f.project)));
        let task: Task = f.store.get(ScopeId::PRIMARY, moved).unwrap().unwrap();
        assert_eq!(task.project, Some(f.project));
        assert_eq!(task.order, Some(50));
        // Source keeps its gap by default
        assert_eq!(orders(&f.store, &GroupKey::inbox()), vec![Some(10), Some(20)]);
    }

    #[test]
    fn test_empty_destination_starts_at_zero() {
        let mut f = fixture(StoreConfig::default());
        let moved = f.inbox[1];
        reparent_task(
            &mut f.store,
            ScopeId::PRIMARY,
            moved,
            Placement::header(f.project, f.header),
        )
        .unwrap();
        assert_eq!(
            orders(&f.store, &GroupKey::header_tasks(f.project, f.header)),
            vec![Some(0)]
        );
    }

    #[test]
    fn test_compacts_source_when_configured() {
        let mut config = StoreConfig::default();
        config.ordering.compact_on_reparent = true;
        let mut f = fixture(config);
        reparent_task(
            &mut f.store,
            ScopeId::PRIMARY,
            f.inbox[0],
            Placement::project(f.project),
        )
        .unwrap();
        assert_eq!(orders(&f.store, &GroupKey::inbox()), vec![Some(0), Some(10)]);
    }

    #[test]
    fn test_same_group_is_noop() {
        let mut f = fixture(StoreConfig::default());
        let result =
            reparent_task(&mut f.store, ScopeId::PRIMARY, f.inbox[2], Placement::inbox()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_header_must_belong_to_project() {
        let mut f = fixture(StoreConfig::default());
        let mut other = Project::new("Other", Utc::now());
        let other_id = other.id;
        f.store
            .stage(ScopeId::PRIMARY, std::slice::from_mut(&mut other))
            .unwrap();

        let err = reparent_task(
            &mut f.store,
            ScopeId::PRIMARY,
            f.inbox[0],
            Placement::header(other_id, f.header),
        )
        .unwrap_err();
        assert!(matches!(err, OrderError::HeaderOutsideProject { .. }));

        let err = reparent_task(
            &mut f.store,
            ScopeId::PRIMARY,
            f.inbox[0],
            Placement {
                project: None,
                header: Some(f.header),
            },
        )
        .unwrap_err();
        assert!(matches!(err, OrderError::HeaderWithoutProject(_)));
    }

    #[test]
    fn test_unknown_task_is_not_found() {
        let mut f = fixture(StoreConfig::default());
        let err = reparent_task(
            &mut f.store,
            ScopeId::PRIMARY,
            Uuid::new_v4(),
            Placement::inbox(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            OrderError::NotFound {
                kind: RecordKind::Task,
                ..
            }
        ));
    }
}
