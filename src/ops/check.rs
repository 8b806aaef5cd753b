use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::model::document::{StoreDocument, StoredRecord};
use crate::model::group::GroupKey;
use crate::model::ordered::{OrderedRecord, compare_by_order};
use crate::model::record::{Area, Header, Project, Task};

/// Structured result from `ordo check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A validation error (something `ordo ensure` or `ordo repair` should fix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// Record has never been given an order value
    #[serde(rename = "missing_order")]
    MissingOrder {
        group: String,
        id: Uuid,
        label: String,
    },
    /// Several records in one group share an order value
    #[serde(rename = "duplicate_order")]
    DuplicateOrder {
        group: String,
        order: i32,
        ids: Vec<Uuid>,
    },
    /// Task points at a header that doesn't exist or lives in another project
    #[serde(rename = "dangling_header")]
    DanglingHeader { task_id: Uuid, header_id: Uuid },
    /// Task or header points at a project that doesn't exist
    #[serde(rename = "unknown_project")]
    UnknownProject { id: Uuid, project_id: Uuid },
}

/// A validation warning (non-critical issue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// Neighbours are one apart, so nothing can be inserted between them
    /// without renumbering the group
    #[serde(rename = "exhausted_gap")]
    ExhaustedGap {
        group: String,
        before: Uuid,
        after: Uuid,
    },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a store document and return structured results.
///
/// This is a read-only operation; it does not modify the document.
///
/// Checks performed:
/// 1. Every record has an order value
/// 2. No two records in a group share an order value
/// 3. Task and header references resolve
/// 4. Warnings for groups where adjacent values leave no room
pub fn check_store(doc: &StoreDocument) -> CheckResult {
    let mut result = CheckResult::default();

    check_table::<Task>(doc, &mut result);
    check_table::<Header>(doc, &mut result);
    check_table::<Project>(doc, &mut result);
    check_table::<Area>(doc, &mut result);
    check_references(doc, &mut result);

    result.valid = result.errors.is_empty();
    result
}

// ---------------------------------------------------------------------------
// Per-group validation
// ---------------------------------------------------------------------------

fn check_table<R: StoredRecord>(doc: &StoreDocument, result: &mut CheckResult) {
    let mut groups: BTreeMap<GroupKey, Vec<&R>> = BTreeMap::new();
    for record in R::table(doc).values() {
        groups.entry(record.group()).or_default().push(record);
    }

    for (group, mut records) in groups {
        records.sort_by(|a, b| compare_by_order(*a, *b));
        check_group(&group, &records, result);
    }
}

fn check_group<R: OrderedRecord>(group: &GroupKey, records: &[&R], result: &mut CheckResult) {
    let name = group.to_string();

    for record in records.iter().filter(|r| r.order().is_none()) {
        result.errors.push(CheckError::MissingOrder {
            group: name.clone(),
            id: record.id(),
            label: record.label().to_string(),
        });
    }

    let mut by_value: BTreeMap<i32, Vec<Uuid>> = BTreeMap::new();
    for record in records {
        if let Some(order) = record.order() {
            by_value.entry(order).or_default().push(record.id());
        }
    }
    for (order, ids) in by_value {
        if ids.len() > 1 {
            result.errors.push(CheckError::DuplicateOrder {
                group: name.clone(),
                order,
                ids,
            });
        }
    }

    for pair in records.windows(2) {
        if let (Some(a), Some(b)) = (pair[0].order(), pair[1].order())
            && i64::from(b) - i64::from(a) == 1
        {
            result.warnings.push(CheckWarning::ExhaustedGap {
                group: name.clone(),
                before: pair[0].id(),
                after: pair[1].id(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

fn check_references(doc: &StoreDocument, result: &mut CheckResult) {
    for header in doc.headers.values() {
        if !doc.projects.contains_key(&header.project) {
            result.errors.push(CheckError::UnknownProject {
                id: header.id,
                project_id: header.project,
            });
        }
    }

    for task in doc.tasks.values() {
        if let Some(project) = task.project
            && !doc.projects.contains_key(&project)
        {
            result.errors.push(CheckError::UnknownProject {
                id: task.id,
                project_id: project,
            });
        }
        if let Some(header_id) = task.header {
            let belongs = doc
                .headers
                .get(&header_id)
                .is_some_and(|h| Some(h.project) == task.project);
            if !belongs {
                result.errors.push(CheckError::DanglingHeader {
                    task_id: task.id,
                    header_id,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task(order: Option<i32>) -> Task {
        let mut t = Task::new("T", Utc::now());
        t.order = order;
        t
    }

    fn doc_with(tasks: Vec<Task>) -> StoreDocument {
        let mut doc = StoreDocument::default();
        for t in tasks {
            doc.tasks.insert(t.id, t);
        }
        doc
    }

    #[test]
    fn test_check_clean_store() {
        let result = check_store(&doc_with(vec![task(Some(0)), task(Some(10))]));
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_check_missing_order() {
        let missing = task(None);
        let id = missing.id;
        let result = check_store(&doc_with(vec![task(Some(0)), missing]));
        assert!(!result.valid);
        assert!(matches!(
            &result.errors[0],
            CheckError::MissingOrder { id: got, group, .. } if *got == id && group == "inbox"
        ));
    }

    #[test]
    fn test_check_duplicates() {
        let a = task(Some(5));
        let b = task(Some(5));
        let result = check_store(&doc_with(vec![a, b, task(Some(9))]));
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(
            &result.errors[0],
            CheckError::DuplicateOrder { order: 5, ids, .. } if ids.len() == 2
        ));
    }

    #[test]
    fn test_check_exhausted_gap_is_warning() {
        let result = check_store(&doc_with(vec![task(Some(3)), task(Some(4))]));
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_check_dangling_references() {
        let mut doc = StoreDocument::default();
        let mut project = Project::new("Home", Utc::now());
        project.order = Some(0);
        let mut foreign = Header::new(Uuid::new_v4(), "Orphan", Utc::now());
        foreign.order = Some(0);

        let mut orphan = task(Some(0));
        orphan.project = Some(Uuid::new_v4());
        let mut misfiled = task(Some(0));
        misfiled.project = Some(project.id);
        misfiled.header = Some(foreign.id);

        doc.projects.insert(project.id, project);
        doc.headers.insert(foreign.id, foreign);
        doc.tasks.insert(orphan.id, orphan);
        doc.tasks.insert(misfiled.id, misfiled);

        let result = check_store(&doc);
        let unknown = result
            .errors
            .iter()
            .filter(|e| matches!(e, CheckError::UnknownProject { .. }))
            .count();
        let dangling = result
            .errors
            .iter()
            .filter(|e| matches!(e, CheckError::DanglingHeader { .. }))
            .count();
        assert_eq!(unknown, 2);
        assert_eq!(dangling, 1);
    }

    #[test]
    fn test_check_json_shape() {
        let result = check_store(&doc_with(vec![task(None)]));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["errors"][0]["type"], "missing_order");
    }
}
