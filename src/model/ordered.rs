use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::group::GroupKey;
use super::record::{Area, Header, Project, Task};

/// Capability shared by every record that takes part in manual ordering.
///
/// The reindex and reorder algorithms are generic over this trait; each
/// record type supplies its own grouping key.
pub trait OrderedRecord {
    fn id(&self) -> Uuid;
    /// Current order value, `None` when never initialized
    fn order(&self) -> Option<i32>;
    /// Set the order value. Marks the record dirty only if the value changes.
    fn set_order(&mut self, order: i32);
    /// Fallback sort key
    fn created(&self) -> DateTime<Utc>;
    /// The ordering domain this record belongs to
    fn group(&self) -> GroupKey;
    /// Human-readable name for logs and listings
    fn label(&self) -> &str;
    fn is_dirty(&self) -> bool;
    fn mark_clean(&mut self);
}

/// Compare two records by stored order. Missing orders sort last; ties fall
/// back to creation time and then id so the result is deterministic.
pub fn compare_by_order<R: OrderedRecord>(a: &R, b: &R) -> Ordering {
    match (a.order(), b.order()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| by_created(a, b))
}

/// Ascending creation time (oldest first), id as tie-breaker
pub fn by_created<R: OrderedRecord>(a: &R, b: &R) -> Ordering {
    a.created()
        .cmp(&b.created())
        .then_with(|| a.id().cmp(&b.id()))
}

pub fn sort_by_order<R: OrderedRecord>(records: &mut [R]) {
    records.sort_by(compare_by_order);
}

macro_rules! impl_ordered {
    ($ty:ty, $label:ident, |$rec:ident| $group:expr) => {
        impl OrderedRecord for $ty {
            fn id(&self) -> Uuid {
                self.id
            }

            fn order(&self) -> Option<i32> {
                self.order
            }

            fn set_order(&mut self, order: i32) {
                if self.order != Some(order) {
                    self.order = Some(order);
                    self.dirty = true;
                }
            }

            fn created(&self) -> DateTime<Utc> {
                self.created
            }

            fn group(&self) -> GroupKey {
                let $rec = self;
                $group
            }

            fn label(&self) -> &str {
                &self.$label
            }

            fn is_dirty(&self) -> bool {
                self.dirty
            }

            fn mark_clean(&mut self) {
                self.dirty = false;
            }
        }
    };
}

impl_ordered!(Task, title, |task| GroupKey::tasks_in(task.project, task.header));
impl_ordered!(Header, title, |header| GroupKey::Headers {
    project: header.project
});
impl_ordered!(Project, name, |_project| GroupKey::Projects);
impl_ordered!(Area, name, |_area| GroupKey::Areas);
