use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::group::{GroupKey, RecordKind};
use super::ordered::OrderedRecord;
use super::record::{Area, Header, Project, Task};

/// Schema version written by this build
pub const SCHEMA_VERSION: u32 = 2;

/// Schema version of stores written before order values existed
pub const LEGACY_SCHEMA_VERSION: u32 = 1;

fn legacy_schema() -> u32 {
    LEGACY_SCHEMA_VERSION
}

/// Everything held by a store, one table per record type.
///
/// Tables keep insertion order so a freshly created store lists records
/// the way they were added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default = "legacy_schema")]
    pub schema_version: u32,
    #[serde(default)]
    pub tasks: IndexMap<Uuid, Task>,
    #[serde(default)]
    pub headers: IndexMap<Uuid, Header>,
    #[serde(default)]
    pub projects: IndexMap<Uuid, Project>,
    #[serde(default)]
    pub areas: IndexMap<Uuid, Area>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        StoreDocument {
            schema_version: SCHEMA_VERSION,
            tasks: IndexMap::new(),
            headers: IndexMap::new(),
            projects: IndexMap::new(),
            areas: IndexMap::new(),
        }
    }
}

impl StoreDocument {
    /// Copy one record from `other` into this document, overwriting any
    /// existing version. Does nothing if `other` lacks the record.
    pub fn copy_record_from(&mut self, other: &StoreDocument, kind: RecordKind, id: Uuid) {
        match kind {
            RecordKind::Task => copy_one::<Task>(self, other, id),
            RecordKind::Header => copy_one::<Header>(self, other, id),
            RecordKind::Project => copy_one::<Project>(self, other, id),
            RecordKind::Area => copy_one::<Area>(self, other, id),
        }
    }

    /// Make this document's copy of a record match `other`'s, removing it
    /// when `other` does not have it.
    pub fn restore_record_from(&mut self, other: &StoreDocument, kind: RecordKind, id: Uuid) {
        match kind {
            RecordKind::Task => restore_one::<Task>(self, other, id),
            RecordKind::Header => restore_one::<Header>(self, other, id),
            RecordKind::Project => restore_one::<Project>(self, other, id),
            RecordKind::Area => restore_one::<Area>(self, other, id),
        }
    }

    /// Every ordering domain that currently has at least one member, plus
    /// the two global domains.
    pub fn groups(&self) -> Vec<GroupKey> {
        let mut groups: Vec<GroupKey> = vec![GroupKey::Areas, GroupKey::Projects];
        for header in self.headers.values() {
            groups.push(header.group());
        }
        for task in self.tasks.values() {
            groups.push(task.group());
        }
        groups.sort();
        groups.dedup();
        groups
    }

    pub fn clear_dirty(&mut self) {
        self.tasks.values_mut().for_each(|r| r.mark_clean());
        self.headers.values_mut().for_each(|r| r.mark_clean());
        self.projects.values_mut().for_each(|r| r.mark_clean());
        self.areas.values_mut().for_each(|r| r.mark_clean());
    }
}

fn copy_one<R: StoredRecord>(into: &mut StoreDocument, from: &StoreDocument, id: Uuid) {
    if let Some(record) = R::table(from).get(&id) {
        let mut record = record.clone();
        record.mark_clean();
        R::table_mut(into).insert(id, record);
    }
}

fn restore_one<R: StoredRecord>(into: &mut StoreDocument, from: &StoreDocument, id: Uuid) {
    if R::table(from).contains_key(&id) {
        copy_one::<R>(into, from, id);
    } else {
        R::table_mut(into).shift_remove(&id);
    }
}

/// An ordered record that lives in one of the store document's tables
pub trait StoredRecord: OrderedRecord + Clone {
    const KIND: RecordKind;

    fn table(doc: &StoreDocument) -> &IndexMap<Uuid, Self>;
    fn table_mut(doc: &mut StoreDocument) -> &mut IndexMap<Uuid, Self>;
}

impl StoredRecord for Task {
    const KIND: RecordKind = RecordKind::Task;

    fn table(doc: &StoreDocument) -> &IndexMap<Uuid, Self> {
        &doc.tasks
    }

    fn table_mut(doc: &mut StoreDocument) -> &mut IndexMap<Uuid, Self> {
        &mut doc.tasks
    }
}

impl StoredRecord for Header {
    const KIND: RecordKind = RecordKind::Header;

    fn table(doc: &StoreDocument) -> &IndexMap<Uuid, Self> {
        &doc.headers
    }

    fn table_mut(doc: &mut StoreDocument) -> &mut IndexMap<Uuid, Self> {
        &mut doc.headers
    }
}

impl StoredRecord for Project {
    const KIND: RecordKind = RecordKind::Project;

    fn table(doc: &StoreDocument) -> &IndexMap<Uuid, Self> {
        &doc.projects
    }

    fn table_mut(doc: &mut StoreDocument) -> &mut IndexMap<Uuid, Self> {
        &mut doc.projects
    }
}

impl StoredRecord for Area {
    const KIND: RecordKind = RecordKind::Area;

    fn table(doc: &StoreDocument) -> &IndexMap<Uuid, Self> {
        &doc.areas
    }

    fn table_mut(doc: &mut StoreDocument) -> &mut IndexMap<Uuid, Self> {
        &mut doc.areas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_document_without_version_is_legacy() {
        let doc: StoreDocument = serde_json::from_str("{}").unwrap();
        assert_eq!(doc.schema_version, LEGACY_SCHEMA_VERSION);
        assert!(doc.tasks.is_empty());
    }

    #[test]
    fn test_groups_lists_populated_task_domains() {
        let mut doc = StoreDocument::default();
        let project = Project::new("Work", Utc::now());
        let mut task = Task::new("A", Utc::now());
        task.project = Some(project.id);
        doc.tasks.insert(task.id, task);
        let inbox = Task::new("B", Utc::now());
        doc.tasks.insert(inbox.id, inbox);

        let groups = doc.groups();
        assert!(groups.contains(&GroupKey::inbox()));
        assert!(groups.contains(&GroupKey::project_tasks(project.id)));
        assert!(groups.contains(&GroupKey::Projects));
        assert!(groups.contains(&GroupKey::Areas));
        assert_eq!(groups.len(), 4);
    }

    #[test]
    fn test_copy_record_is_clean_in_target() {
        let mut source = StoreDocument::default();
        let mut task = Task::new("A", Utc::now());
        task.order = Some(10);
        let id = task.id;
        source.tasks.insert(id, task);

        let mut target = StoreDocument::default();
        target.copy_record_from(&source, RecordKind::Task, id);
        let copied = &target.tasks[&id];
        assert_eq!(copied.order, Some(10));
        assert!(!copied.dirty);
    }

    #[test]
    fn test_restore_removes_records_missing_from_source() {
        let source = StoreDocument::default();
        let mut target = StoreDocument::default();
        let area = Area::new("Home", Utc::now());
        let id = area.id;
        target.areas.insert(id, area);

        target.restore_record_from(&source, RecordKind::Area, id);
        assert!(target.areas.is_empty());
    }
}
