use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A task in the inbox or in a project, optionally filed under a header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    /// Manual sort key within the task's group (`None` until initialized)
    #[serde(default, alias = "displayOrder", skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    pub created: DateTime<Utc>,
    /// Owning project (`None` = inbox)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Uuid>,
    /// Header within the owning project (`None` = unheadered)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Uuid>,
    /// When the task was completed (`None` = open)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
    /// Whether the completed task has been moved to the logbook
    #[serde(default)]
    pub logged: bool,

    /// Whether this task has been modified since it was fetched
    #[serde(skip)]
    pub dirty: bool,
}

impl Task {
    /// Create a new inbox task, marked dirty, with no order assigned yet
    pub fn new(title: impl Into<String>, created: DateTime<Utc>) -> Self {
        Task {
            id: Uuid::new_v4(),
            title: title.into(),
            order: None,
            created,
            project: None,
            header: None,
            completed: None,
            logged: false,
            dirty: true,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed.is_some()
    }
}

/// A named section inside a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub id: Uuid,
    pub title: String,
    #[serde(default, alias = "displayOrder", skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    pub created: DateTime<Utc>,
    pub project: Uuid,
    #[serde(skip)]
    pub dirty: bool,
}

impl Header {
    pub fn new(project: Uuid, title: impl Into<String>, created: DateTime<Utc>) -> Self {
        Header {
            id: Uuid::new_v4(),
            title: title.into(),
            order: None,
            created,
            project,
            dirty: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    #[serde(default, alias = "displayOrder", skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    pub created: DateTime<Utc>,
    #[serde(skip)]
    pub dirty: bool,
}

impl Project {
    pub fn new(name: impl Into<String>, created: DateTime<Utc>) -> Self {
        Project {
            id: Uuid::new_v4(),
            name: name.into(),
            order: None,
            created,
            dirty: true,
        }
    }
}

/// A top-level area of responsibility shown in the sidebar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Area {
    pub id: Uuid,
    pub name: String,
    #[serde(default, alias = "displayOrder", skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    pub created: DateTime<Utc>,
    #[serde(skip)]
    pub dirty: bool,
}

impl Area {
    pub fn new(name: impl Into<String>, created: DateTime<Utc>) -> Self {
        Area {
            id: Uuid::new_v4(),
            name: name.into(),
            order: None,
            created,
            dirty: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_display_order_key_is_accepted() {
        let json = r#"{
            "id": "6f9619ff-8b86-4011-b42d-00c04fc964ff",
            "title": "Legacy",
            "displayOrder": 40,
            "created": "2025-03-19T10:00:00Z"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.order, Some(40));
        assert!(!task.dirty);
        assert_eq!(task.project, None);
    }

    #[test]
    fn test_missing_order_deserializes_as_none() {
        let json = r#"{
            "id": "6f9619ff-8b86-4011-b42d-00c04fc964ff",
            "name": "Home",
            "created": "2025-03-19T10:00:00Z"
        }"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert_eq!(project.order, None);
    }

    #[test]
    fn test_new_task_is_dirty_and_open() {
        let task = Task::new("Write report", Utc::now());
        assert!(task.dirty);
        assert!(!task.is_completed());
        assert!(!task.logged);
        assert_eq!(task.order, None);
    }
}
