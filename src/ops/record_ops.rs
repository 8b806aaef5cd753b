use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::io::flush::{self, CommitReport};
use crate::io::store::{ScopeId, Store};
use crate::model::document::StoredRecord;
use crate::model::group::RecordKind;
use crate::model::record::{Area, Header, Project, Task};
use crate::ops::reorder::{OrderError, fetch_siblings, insert_at, stage_all};
use crate::ops::reparent::{Placement, validate_placement};

/// Where to insert a new record in its group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPosition {
    /// Append after the current last member
    Bottom,
    /// Before the current first member
    Top,
    /// Directly after the record with this id
    After(Uuid),
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Add a task at `placement`. Returns the new task's id.
pub fn add_task(
    store: &mut Store,
    scope: ScopeId,
    title: &str,
    placement: Placement,
    position: &InsertPosition,
    now: DateTime<Utc>,
) -> Result<Uuid, OrderError> {
    validate_placement(store, scope, &placement)?;
    let mut task = Task::new(title, now);
    task.project = placement.project;
    task.header = placement.header;
    place_new(store, scope, task, position)
}

/// Add a header to a project. Returns the new header's id.
pub fn add_header(
    store: &mut Store,
    scope: ScopeId,
    project: Uuid,
    title: &str,
    position: &InsertPosition,
    now: DateTime<Utc>,
) -> Result<Uuid, OrderError> {
    validate_placement(store, scope, &Placement::project(project))?;
    place_new(store, scope, Header::new(project, title, now), position)
}

pub fn add_project(
    store: &mut Store,
    scope: ScopeId,
    name: &str,
    position: &InsertPosition,
    now: DateTime<Utc>,
) -> Result<Uuid, OrderError> {
    place_new(store, scope, Project::new(name, now), position)
}

pub fn add_area(
    store: &mut Store,
    scope: ScopeId,
    name: &str,
    position: &InsertPosition,
    now: DateTime<Utc>,
) -> Result<Uuid, OrderError> {
    place_new(store, scope, Area::new(name, now), position)
}

fn place_new<R: StoredRecord>(
    store: &mut Store,
    scope: ScopeId,
    record: R,
    position: &InsertPosition,
) -> Result<Uuid, OrderError> {
    let id = record.id();
    let siblings: Vec<R> = fetch_siblings(store, scope, &record.group());
    let index = match position {
        InsertPosition::Bottom => siblings.len(),
        InsertPosition::Top => 0,
        InsertPosition::After(after) => {
            let idx = siblings
                .iter()
                .position(|r| r.id() == *after)
                .ok_or(OrderError::NotFound {
                    kind: R::KIND,
                    id: *after,
                })?;
            idx + 1
        }
    };
    insert_at(store, scope, record, index)?;
    let kind = R::KIND;
    tracing::debug!(%kind, %id, index, "added record");
    Ok(id)
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Mark a task completed at `now` and commit. Completing an already
/// completed task keeps its original stamp. Returns the updated task.
pub fn complete_task(
    store: &mut Store,
    scope: ScopeId,
    task_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Task, OrderError> {
    let mut task = find_task(store, scope, task_id)?;
    if task.completed.is_none() {
        task.completed = Some(now);
        task.logged = false;
        task.dirty = true;
        save_task(store, scope, &mut task)?;
    }
    Ok(task)
}

/// Clear a task's completion (and logbook state) and commit.
pub fn reopen_task(store: &mut Store, scope: ScopeId, task_id: Uuid) -> Result<Task, OrderError> {
    let mut task = find_task(store, scope, task_id)?;
    if task.completed.is_some() || task.logged {
        task.completed = None;
        task.logged = false;
        task.dirty = true;
        save_task(store, scope, &mut task)?;
    }
    Ok(task)
}

fn find_task(store: &Store, scope: ScopeId, task_id: Uuid) -> Result<Task, OrderError> {
    store.get(scope, task_id)?.ok_or(OrderError::NotFound {
        kind: RecordKind::Task,
        id: task_id,
    })
}

fn save_task(store: &mut Store, scope: ScopeId, task: &mut Task) -> Result<CommitReport, OrderError> {
    stage_all(store, scope, std::slice::from_mut(task))?;
    Ok(flush::commit(store, scope)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::backend::MemoryBackend;
    use crate::model::config::StoreConfig;
    use crate::model::group::GroupKey;
    use crate::model::ordered::OrderedRecord;
    use chrono::Duration;

    fn open() -> (Store, MemoryBackend) {
        let backend = MemoryBackend::new();
        let store = Store::open(Box::new(backend.clone()), StoreConfig::default()).unwrap();
        (store, backend)
    }

    fn inbox_titles(store: &Store) -> Vec<String> {
        store
            .siblings::<Task>(ScopeId::PRIMARY, &GroupKey::inbox())
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect()
    }

    #[test]
    fn test_add_positions() {
        let (mut store, _backend) = open();
        let scope = ScopeId::PRIMARY;
        let now = Utc::now();

        let first = add_task(&mut store, scope, "First", Placement::inbox(), &InsertPosition::Bottom, now)
            .unwrap();
        add_task(&mut store, scope, "Last", Placement::inbox(), &InsertPosition::Bottom, now).unwrap();
        add_task(&mut store, scope, "Top", Placement::inbox(), &InsertPosition::Top, now).unwrap();
        add_task(
            &mut store,
            scope,
            "Second",
            Placement::inbox(),
            &InsertPosition::After(first),
            now,
        )
        .unwrap();

        assert_eq!(inbox_titles(&store), vec!["Top", "First", "Second", "Last"]);
        let orders: Vec<Option<i32>> = store
            .siblings::<Task>(scope, &GroupKey::inbox())
            .unwrap()
            .iter()
            .map(|t| t.order)
            .collect();
        assert_eq!(orders, vec![Some(-10), Some(0), Some(5), Some(10)]);
    }

    #[test]
    fn test_add_after_unknown_record() {
        let (mut store, backend) = open();
        let err = add_task(
            &mut store,
            ScopeId::PRIMARY,
            "Lost",
            Placement::inbox(),
            &InsertPosition::After(Uuid::new_v4()),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, OrderError::NotFound { .. }));
        assert_eq!(backend.writes(), 0);
    }

    #[test]
    fn test_add_into_project_and_header() {
        let (mut store, _backend) = open();
        let scope = ScopeId::PRIMARY;
        let now = Utc::now();
        let project = add_project(&mut store, scope, "Garden", &InsertPosition::Bottom, now).unwrap();
        let header =
            add_header(&mut store, scope, project, "Spring", &InsertPosition::Bottom, now).unwrap();
        let id = add_task(
            &mut store,
            scope,
            "Plant bulbs",
            Placement::header(project, header),
            &InsertPosition::Bottom,
            now,
        )
        .unwrap();

        let task: Task = store.get(scope, id).unwrap().unwrap();
        assert_eq!(task.group(), GroupKey::header_tasks(project, header));
        assert_eq!(task.order, Some(0));

        let missing = add_header(
            &mut store,
            scope,
            Uuid::new_v4(),
            "Nowhere",
            &InsertPosition::Bottom,
            now,
        );
        assert!(missing.is_err());
    }

    #[test]
    fn test_areas_have_their_own_group() {
        let (mut store, _backend) = open();
        let now = Utc::now();
        add_area(&mut store, ScopeId::PRIMARY, "Home", &InsertPosition::Bottom, now).unwrap();
        add_area(&mut store, ScopeId::PRIMARY, "Work", &InsertPosition::Bottom, now).unwrap();
        add_project(&mut store, ScopeId::PRIMARY, "Chores", &InsertPosition::Bottom, now).unwrap();

        let areas: Vec<Area> = store.siblings(ScopeId::PRIMARY, &GroupKey::Areas).unwrap();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[1].order, Some(10));
    }

    #[test]
    fn test_complete_and_reopen() {
        let (mut store, backend) = open();
        let scope = ScopeId::PRIMARY;
        let now = Utc::now();
        let id = add_task(&mut store, scope, "Call", Placement::inbox(), &InsertPosition::Bottom, now)
            .unwrap();

        let done = complete_task(&mut store, scope, id, now).unwrap();
        assert_eq!(done.completed, Some(now));
        let writes = backend.writes();

        let again = complete_task(&mut store, scope, id, now + Duration::seconds(30)).unwrap();
        assert_eq!(again.completed, Some(now));
        assert_eq!(backend.writes(), writes);

        let open_again = reopen_task(&mut store, scope, id).unwrap();
        assert!(open_again.completed.is_none());
        let stored: Task = store.get(scope, id).unwrap().unwrap();
        assert!(!stored.is_completed());
    }
}
