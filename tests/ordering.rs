//! Library-level tests for manual ordering: reorder, reparent, repair and
//! bootstrap against both the in-memory and the on-disk backend.

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use ordo::io::backend::MemoryBackend;
use ordo::io::changes::Interest;
use ordo::io::store::{ScopeId, Store};
use ordo::io::store_io::{FileBackend, STORE_DIR};
use ordo::model::config::StoreConfig;
use ordo::model::document::StoreDocument;
use ordo::model::group::GroupKey;
use ordo::model::ordered::{OrderedRecord, by_created};
use ordo::model::record::{Project, Task};
use ordo::ops::bootstrap::{ensure_ordering_initialized, repair_ordering};
use ordo::ops::record_ops::{InsertPosition, add_task};
use ordo::ops::reindex::{is_strictly_increasing, reindex};
use ordo::ops::reorder::{reorder, reorder_group};
use ordo::ops::reparent::{Placement, reparent_task};

const SPACING: i32 = 10;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_750_000_000 + secs, 0).unwrap()
}

/// A persisted (clean) task
fn task(title: &str, order: Option<i32>, created: i64) -> Task {
    let mut t = Task::new(title, at(created));
    t.order = order;
    t.dirty = false;
    t
}

fn titled(titles: &[&str]) -> Vec<Task> {
    titles
        .iter()
        .enumerate()
        .map(|(i, t)| task(t, Some(i as i32 * SPACING), i as i64))
        .collect()
}

fn titles(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.title.as_str()).collect()
}

fn orders<R: OrderedRecord>(records: &[R]) -> Vec<Option<i32>> {
    records.iter().map(|r| r.order()).collect()
}

fn seeded(doc: &StoreDocument) -> (Store, MemoryBackend) {
    let backend = MemoryBackend::new();
    backend.seed(doc).unwrap();
    let store = Store::open(Box::new(backend.clone()), StoreConfig::default()).unwrap();
    (store, backend)
}

fn doc_with(tasks: Vec<Task>) -> StoreDocument {
    let mut doc = StoreDocument::default();
    for t in tasks {
        doc.tasks.insert(t.id, t);
    }
    doc
}

fn inbox(store: &Store) -> Vec<Task> {
    store.siblings(ScopeId::PRIMARY, &GroupKey::inbox()).unwrap()
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[test]
fn test_drag_to_end_survives_reopen() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store_dir = tmp.path().join(STORE_DIR);
    std::fs::create_dir_all(&store_dir).unwrap();

    let scope = ScopeId::PRIMARY;
    {
        let mut store =
            Store::open(Box::new(FileBackend::new(&store_dir)), StoreConfig::default()).unwrap();
        for title in ["A", "B", "C"] {
            add_task(
                &mut store,
                scope,
                title,
                Placement::inbox(),
                &InsertPosition::Bottom,
                Utc::now(),
            )
            .unwrap();
        }
        assert_eq!(orders(&inbox(&store)), vec![Some(0), Some(10), Some(20)]);

        let changes = store.subscribe(Interest::Group(GroupKey::inbox()));
        let report = reorder_group::<Task>(&mut store, scope, &GroupKey::inbox(), 0, 2)
            .unwrap()
            .expect("move should be accepted");
        assert_eq!(report.groups, vec![GroupKey::inbox()]);
        assert_eq!(report.synced, Some(true));

        let events = changes.poll();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].groups, vec![GroupKey::inbox()]);
    }

    let store =
        Store::open(Box::new(FileBackend::new(&store_dir)), StoreConfig::default()).unwrap();
    let fresh = inbox(&store);
    assert_eq!(titles(&fresh), vec!["B", "C", "A"]);
    assert_eq!(orders(&fresh), vec![Some(0), Some(10), Some(20)]);
}

// ---------------------------------------------------------------------------
// Reindex and reorder
// ---------------------------------------------------------------------------

#[test]
fn test_reindex_is_monotonic_and_idempotent() {
    let mut tasks = vec![
        task("x", Some(500), 0),
        task("y", None, 1),
        task("z", Some(-3), 2),
        task("w", Some(500), 3),
    ];
    reindex(&mut tasks, SPACING);
    assert!(is_strictly_increasing(&tasks));
    let first = orders(&tasks);

    assert_eq!(reindex(&mut tasks, SPACING), 0);
    assert_eq!(orders(&tasks), first);
}

#[test]
fn test_reorder_front_to_fourth() {
    let mut tasks = titled(&["A", "B", "C", "D", "E"]);
    assert!(reorder(&mut tasks, 0, 3, SPACING));
    assert_eq!(titles(&tasks), vec!["B", "C", "D", "A", "E"]);
    assert!(is_strictly_increasing(&tasks));
}

#[test]
fn test_reorder_with_huge_spacing_never_ties() {
    let mut tasks = titled(&["A", "B", "C", "D", "E"]);
    assert!(reorder(&mut tasks, 0, 4, 1_000_000_000));
    assert_eq!(titles(&tasks), vec!["B", "C", "D", "E", "A"]);
    assert!(is_strictly_increasing(&tasks));
}

#[test]
fn test_reorder_rejects_same_and_out_of_range_positions() {
    let original = titled(&["A", "B", "C", "D", "E"]);

    for (from, to) in [(2, 2), (-1, 2), (5, 2), (0, 5)] {
        let mut tasks = original.clone();
        assert!(!reorder(&mut tasks, from, to, SPACING), "{} -> {}", from, to);
        assert_eq!(titles(&tasks), titles(&original));
        assert_eq!(orders(&tasks), orders(&original));
        assert!(tasks.iter().all(|t| !t.dirty));
    }
}

#[test]
fn test_rejected_move_writes_nothing() {
    let (mut store, backend) = seeded(&doc_with(titled(&["A", "B", "C", "D", "E"])));
    let result = reorder_group::<Task>(&mut store, ScopeId::PRIMARY, &GroupKey::inbox(), -1, 2);
    assert!(result.unwrap().is_none());
    assert_eq!(backend.writes(), 0);
    assert!(!store.has_changes(ScopeId::PRIMARY).unwrap());
}

// ---------------------------------------------------------------------------
// Reparent
// ---------------------------------------------------------------------------

#[test]
fn test_reparent_appends_after_destination_max() {
    let mut project = Project::new("Garden", at(0));
    project.order = Some(0);
    project.dirty = false;

    let mut members = vec![task("Rake", Some(40), 1), task("Mow", Some(90), 2)];
    for m in &mut members {
        m.project = Some(project.id);
    }
    let mover = task("Seeds", Some(0), 3);
    let mover_id = mover.id;

    let mut doc = doc_with(members);
    doc.tasks.insert(mover.id, mover);
    doc.projects.insert(project.id, project.clone());
    let (mut store, _backend) = seeded(&doc);

    reparent_task(&mut store, ScopeId::PRIMARY, mover_id, Placement::project(project.id))
        .unwrap()
        .expect("task changes group");

    let group: Vec<Task> = store
        .siblings(ScopeId::PRIMARY, &GroupKey::project_tasks(project.id))
        .unwrap();
    assert_eq!(titles(&group), vec!["Rake", "Mow", "Seeds"]);
    assert_eq!(orders(&group), vec![Some(40), Some(90), Some(100)]);
    assert!(inbox(&store).is_empty());
}

#[test]
fn test_reparent_into_empty_group_starts_at_zero() {
    let mut project = Project::new("Empty", at(0));
    project.order = Some(0);
    project.dirty = false;
    let mover = task("Only", Some(70), 1);
    let mover_id = mover.id;

    let mut doc = doc_with(vec![mover]);
    doc.projects.insert(project.id, project.clone());
    let (mut store, _backend) = seeded(&doc);

    reparent_task(&mut store, ScopeId::PRIMARY, mover_id, Placement::project(project.id)).unwrap();
    let moved: Task = store.get(ScopeId::PRIMARY, mover_id).unwrap().unwrap();
    assert_eq!(moved.order, Some(0));
    assert_eq!(moved.group(), GroupKey::project_tasks(project.id));
}

#[test]
fn test_reparent_to_unknown_project_is_rejected() {
    let (mut store, backend) = seeded(&doc_with(titled(&["A"])));
    let id = inbox(&store)[0].id;
    let result = reparent_task(&mut store, ScopeId::PRIMARY, id, Placement::project(Uuid::new_v4()));
    assert!(result.is_err());
    assert_eq!(backend.writes(), 0);
    assert_eq!(inbox(&store)[0].id, id);
}

// ---------------------------------------------------------------------------
// Repair and bootstrap
// ---------------------------------------------------------------------------

#[test]
fn test_repair_all_zero_group_by_creation_time() {
    let (mut store, backend) = seeded(&doc_with(vec![
        task("third", Some(0), 30),
        task("first", Some(0), 10),
        task("second", Some(0), 20),
    ]));
    let scope = ScopeId::PRIMARY;

    repair_ordering::<Task, _>(&mut store, scope, &GroupKey::inbox(), by_created).unwrap();
    let repaired = inbox(&store);
    assert_eq!(titles(&repaired), vec!["first", "second", "third"]);
    assert!(is_strictly_increasing(&repaired));
    assert!(repaired.windows(2).all(|p| p[0].created < p[1].created));

    let writes = backend.writes();
    let again =
        repair_ordering::<Task, _>(&mut store, scope, &GroupKey::inbox(), by_created).unwrap();
    assert_eq!(again.updated, 0);
    assert_eq!(backend.writes(), writes);
    assert_eq!(titles(&inbox(&store)), vec!["first", "second", "third"]);
}

#[test]
fn test_ensure_leaves_initialized_group_alone() {
    let (mut store, backend) = seeded(&doc_with(vec![
        task("A", Some(7), 0),
        task("B", Some(13), 1),
        task("C", Some(400), 2),
    ]));
    let before = orders(&inbox(&store));

    let report =
        ensure_ordering_initialized::<Task>(&mut store, ScopeId::PRIMARY, &GroupKey::inbox())
            .unwrap();
    assert_eq!(report.updated, 0);
    assert_eq!(orders(&inbox(&store)), before);
    assert_eq!(backend.writes(), 0);
}

// ---------------------------------------------------------------------------
// Commit failure
// ---------------------------------------------------------------------------

#[test]
fn test_failed_commit_keeps_changes_staged_until_discarded() {
    let (mut store, backend) = seeded(&doc_with(titled(&["A", "B", "C"])));
    let scope = ScopeId::PRIMARY;
    backend.fail_writes(true);

    let result = reorder_group::<Task>(&mut store, scope, &GroupKey::inbox(), 0, 2);
    assert!(result.is_err());
    assert!(store.has_changes(scope).unwrap());
    assert_eq!(titles(&inbox(&store)), vec!["B", "C", "A"]);

    let committed: Vec<&str> = store
        .committed()
        .tasks
        .values()
        .filter(|t| t.order == Some(0))
        .map(|t| t.title.as_str())
        .collect();
    assert_eq!(committed, vec!["A"]);

    store.discard(scope).unwrap();
    assert!(!store.has_changes(scope).unwrap());
    assert_eq!(titles(&inbox(&store)), vec!["A", "B", "C"]);
}
