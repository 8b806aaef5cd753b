use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::io::recovery::RecoveryEntry;
use crate::model::group::GroupKey;
use crate::model::ordered::OrderedRecord;
use crate::model::record::Task;
use crate::ops::bootstrap::RepairReport;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct RecordJson {
    pub position: usize,
    pub id: Uuid,
    pub label: String,
    pub order: Option<i32>,
    pub created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub logged: bool,
}

#[derive(Serialize)]
pub struct GroupListJson {
    pub group: String,
    pub records: Vec<RecordJson>,
}

#[derive(Serialize)]
pub struct GroupSummaryJson {
    pub group: String,
    pub kind: String,
    pub count: usize,
}

#[derive(Serialize)]
pub struct RepairJson {
    pub group: String,
    pub examined: usize,
    pub updated: usize,
}

#[derive(Serialize)]
pub struct RecoveryEntryJson {
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn record_to_json<R: OrderedRecord>(position: usize, record: &R) -> RecordJson {
    RecordJson {
        position,
        id: record.id(),
        label: record.label().to_string(),
        order: record.order(),
        created: record.created(),
        completed: None,
        logged: false,
    }
}

pub fn task_to_json(position: usize, task: &Task) -> RecordJson {
    RecordJson {
        completed: task.completed,
        logged: task.logged,
        ..record_to_json(position, task)
    }
}

pub fn repair_to_json(report: &RepairReport) -> RepairJson {
    RepairJson {
        group: report.group.to_string(),
        examined: report.examined,
        updated: report.updated,
    }
}

pub fn recovery_to_json(entry: &RecoveryEntry) -> RecoveryEntryJson {
    RecoveryEntryJson {
        timestamp: entry.timestamp,
        category: entry.category.to_string(),
        description: entry.description.clone(),
        fields: entry.fields.clone(),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// First eight hex digits of an id, enough to refer to it on the command line
pub fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

fn format_order(order: Option<i32>) -> String {
    match order {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

/// Format one listing line: position, order value, short id, label
pub fn format_record_line<R: OrderedRecord>(position: usize, record: &R) -> String {
    format!(
        "{:>3}  {:>8}  {}  {}",
        position,
        format_order(record.order()),
        short_id(record.id()),
        record.label()
    )
}

/// Like [`format_record_line`], with a completion marker in front of the title
pub fn format_task_line(position: usize, task: &Task) -> String {
    let mark = match (task.completed.is_some(), task.logged) {
        (_, true) => "[logged] ",
        (true, false) => "[x] ",
        (false, false) => "[ ] ",
    };
    format!(
        "{:>3}  {:>8}  {}  {}{}",
        position,
        format_order(task.order),
        short_id(task.id),
        mark,
        task.title
    )
}

pub fn format_repair_line(report: &RepairReport) -> String {
    format!(
        "{}: {} of {} updated",
        report.group, report.updated, report.examined
    )
}

pub fn format_group_line(group: &GroupKey, count: usize) -> String {
    format!("{:<8} {:>4}  {}", group.kind(), count, group)
}
