use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which list a task lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Container {
    Inbox,
    Project(Uuid),
}

/// Sub-grouping of tasks inside a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Section {
    Unheadered,
    Header(Uuid),
}

/// The kind of record an ordering domain holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Task,
    Header,
    Project,
    Area,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Task => write!(f, "task"),
            RecordKind::Header => write!(f, "header"),
            RecordKind::Project => write!(f, "project"),
            RecordKind::Area => write!(f, "area"),
        }
    }
}

/// A partition within which manual ordering is maintained independently.
///
/// Group keys are derived from a record's relationships and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "group", rename_all = "lowercase")]
pub enum GroupKey {
    Tasks { container: Container, section: Section },
    Headers { project: Uuid },
    Projects,
    Areas,
}

impl GroupKey {
    pub fn inbox() -> Self {
        GroupKey::Tasks {
            container: Container::Inbox,
            section: Section::Unheadered,
        }
    }

    /// Unheadered tasks of a project
    pub fn project_tasks(project: Uuid) -> Self {
        GroupKey::Tasks {
            container: Container::Project(project),
            section: Section::Unheadered,
        }
    }

    pub fn header_tasks(project: Uuid, header: Uuid) -> Self {
        GroupKey::Tasks {
            container: Container::Project(project),
            section: Section::Header(header),
        }
    }

    /// The task group for a project/header pair; no project means the inbox
    pub fn tasks_in(project: Option<Uuid>, header: Option<Uuid>) -> Self {
        GroupKey::Tasks {
            container: project.map_or(Container::Inbox, Container::Project),
            section: header.map_or(Section::Unheadered, Section::Header),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            GroupKey::Tasks { .. } => RecordKind::Task,
            GroupKey::Headers { .. } => RecordKind::Header,
            GroupKey::Projects => RecordKind::Project,
            GroupKey::Areas => RecordKind::Area,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Tasks {
                container: Container::Inbox,
                section: Section::Unheadered,
            } => write!(f, "inbox"),
            GroupKey::Tasks {
                container: Container::Inbox,
                section: Section::Header(h),
            } => write!(f, "inbox/header:{}", h),
            GroupKey::Tasks {
                container: Container::Project(p),
                section: Section::Unheadered,
            } => write!(f, "project:{}", p),
            GroupKey::Tasks {
                container: Container::Project(p),
                section: Section::Header(h),
            } => write!(f, "project:{}/header:{}", p, h),
            GroupKey::Headers { project } => write!(f, "headers:{}", project),
            GroupKey::Projects => write!(f, "projects"),
            GroupKey::Areas => write!(f, "areas"),
        }
    }
}
