use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::io::flush;
use crate::io::store::{ScopeId, Store};
use crate::model::config::CompletionConfig;
use crate::model::record::Task;
use crate::ops::reorder::{OrderError, stage_all};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingLog {
    due: DateTime<Utc>,
    /// Completion stamp the entry was scheduled against
    completed_at: DateTime<Utc>,
}

/// Completed tasks waiting to be moved to the logbook.
///
/// Entries are keyed by task id, so scheduling a task again replaces its
/// previous entry. Nothing here reads the clock; callers pass `now`.
#[derive(Debug, Clone)]
pub struct DeferredLog {
    delay: Duration,
    pending: HashMap<Uuid, PendingLog>,
}

impl DeferredLog {
    pub fn new(delay: Duration) -> Self {
        DeferredLog {
            delay,
            pending: HashMap::new(),
        }
    }

    pub fn from_config(config: &CompletionConfig) -> Self {
        let secs = i64::try_from(config.log_delay_secs).unwrap_or(i64::MAX);
        DeferredLog::new(Duration::try_seconds(secs).unwrap_or(Duration::MAX))
    }

    /// Schedule `task` to be logged `delay` after its completion. Returns
    /// false (and cancels any earlier entry) when the task is open or
    /// already logged.
    pub fn schedule(&mut self, task: &Task) -> bool {
        match task.completed {
            Some(completed_at) if !task.logged => {
                let due = completed_at
                    .checked_add_signed(self.delay)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                self.pending.insert(task.id, PendingLog { due, completed_at });
                true
            }
            _ => {
                self.pending.remove(&task.id);
                false
            }
        }
    }

    /// Forget a pending entry. Returns whether one existed.
    pub fn cancel(&mut self, task_id: Uuid) -> bool {
        self.pending.remove(&task_id).is_some()
    }

    pub fn is_pending(&self, task_id: Uuid) -> bool {
        self.pending.contains_key(&task_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// When the earliest pending entry falls due
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.pending.values().map(|p| p.due).min()
    }

    /// Log every entry due at `now` and commit once.
    ///
    /// Each task is re-read from the scope first and only logged if it is
    /// still completed with the same stamp and not logged yet; entries for
    /// tasks reopened (or deleted) in the meantime are dropped. Returns the
    /// ids that were logged.
    pub fn fire_due(
        &mut self,
        store: &mut Store,
        scope: ScopeId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, OrderError> {
        let mut due: Vec<(Uuid, PendingLog)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(id, p)| (*id, *p))
            .collect();
        due.sort_by_key(|(id, p)| (p.due, *id));

        let mut logged = Vec::new();
        for (id, entry) in &due {
            let Some(mut task) = store.get::<Task>(scope, *id)? else {
                tracing::debug!(task = %id, "pending log entry for missing task dropped");
                continue;
            };
            if task.completed != Some(entry.completed_at) || task.logged {
                tracing::debug!(task = %id, "task changed since completion, not logging");
                continue;
            }
            task.logged = true;
            task.dirty = true;
            logged.push(task);
        }

        if !logged.is_empty() {
            stage_all(store, scope, &mut logged)?;
            flush::commit(store, scope)?;
        }
        for (id, _) in &due {
            self.pending.remove(id);
        }
        Ok(logged.into_iter().map(|t| t.id).collect())
    }
}
