use uuid::Uuid;

use crate::io::flush::{self, CommitError, CommitReport};
use crate::io::store::{ScopeId, Store};
use crate::io::store_io::StoreError;
use crate::model::document::StoredRecord;
use crate::model::group::{GroupKey, RecordKind};
use crate::model::ordered::OrderedRecord;
use crate::model::record::{Area, Header, Project, Task};
use crate::ops::reindex::{order_between, reindex};

/// Error type for ordering operations that look records up by id
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: Uuid },
    #[error("header {header} does not belong to project {project}")]
    HeaderOutsideProject { header: Uuid, project: Uuid },
    #[error("header {0} given without a project")]
    HeaderWithoutProject(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Commit(#[from] CommitError),
}

/// Fresh siblings for `group`. A failed fetch is logged and treated as an
/// empty group, which turns the calling operation into a no-op.
pub fn fetch_siblings<R: StoredRecord>(store: &Store, scope: ScopeId, group: &GroupKey) -> Vec<R> {
    match store.siblings(scope, group) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(%group, error = %e, "could not fetch siblings, treating group as empty");
            Vec::new()
        }
    }
}

/// Stage records, reporting a failure the same way a failed save would be.
pub(crate) fn stage_all<R: StoredRecord>(
    store: &mut Store,
    scope: ScopeId,
    records: &mut [R],
) -> Result<usize, CommitError> {
    store
        .stage(scope, records)
        .map_err(|source| CommitError::Save { scope, source })
}

// ---------------------------------------------------------------------------
// Move one item
// ---------------------------------------------------------------------------

/// Move the record at `from` to position `to`, then reindex the whole list.
///
/// Nothing is touched (and `false` returned) when `from == to` or either
/// index is outside `0..len`. Indices are signed so that stale or negative
/// values coming from a drag gesture are rejected rather than wrapped.
pub fn reorder<R: OrderedRecord>(records: &mut Vec<R>, from: isize, to: isize, spacing: i32) -> bool {
    let len = records.len() as isize;
    if from == to || !(0..len).contains(&from) || !(0..len).contains(&to) {
        return false;
    }
    let item = records.remove(from as usize);
    records.insert(to as usize, item);
    reindex(records, spacing);
    true
}

/// Reorder within one group of a scope and commit.
///
/// Siblings are re-fetched at call time; indices refer to that fresh list.
/// Returns `None` when the move was rejected and nothing was committed.
pub fn reorder_group<R: StoredRecord>(
    store: &mut Store,
    scope: ScopeId,
    group: &GroupKey,
    from: isize,
    to: isize,
) -> Result<Option<CommitReport>, CommitError> {
    let mut records: Vec<R> = fetch_siblings(store, scope, group);
    if !reorder(&mut records, from, to, store.spacing()) {
        tracing::debug!(%group, from, to, len = records.len(), "ignored out-of-range move");
        return Ok(None);
    }
    let staged = stage_all(store, scope, &mut records)?;
    tracing::debug!(%group, from, to, staged, "reordered");
    flush::commit(store, scope).map(Some)
}

/// [`reorder_group`] for whatever record type `group` holds
pub fn reorder_in_group(
    store: &mut Store,
    scope: ScopeId,
    group: &GroupKey,
    from: isize,
    to: isize,
) -> Result<Option<CommitReport>, CommitError> {
    match group.kind() {
        RecordKind::Task => reorder_group::<Task>(store, scope, group, from, to),
        RecordKind::Header => reorder_group::<Header>(store, scope, group, from, to),
        RecordKind::Project => reorder_group::<Project>(store, scope, group, from, to),
        RecordKind::Area => reorder_group::<Area>(store, scope, group, from, to),
    }
}

// ---------------------------------------------------------------------------
// Insert at a position
// ---------------------------------------------------------------------------

/// Put `record` at `index` among its group's other members and commit.
///
/// A value between the neighbours is used when there is room, so only the
/// record itself is written. Otherwise (adjacent values, or siblings still
/// uninitialized) the group is reindexed around it. `index` past the end
/// appends.
pub fn insert_at<R: StoredRecord>(
    store: &mut Store,
    scope: ScopeId,
    mut record: R,
    index: usize,
) -> Result<CommitReport, CommitError> {
    let group = record.group();
    let spacing = store.spacing();
    let mut siblings: Vec<R> = fetch_siblings(store, scope, &group);
    siblings.retain(|r| r.id() != record.id());
    let index = index.min(siblings.len());

    let between = if siblings.iter().all(|r| r.order().is_some()) {
        let prev = index.checked_sub(1).and_then(|i| siblings[i].order());
        let next = siblings.get(index).and_then(|r| r.order());
        order_between(prev, next, spacing)
    } else {
        None
    };

    match between {
        Some(order) => {
            record.set_order(order);
            stage_all(store, scope, std::slice::from_mut(&mut record))?;
        }
        None => {
            tracing::debug!(%group, index, "no gap for insert, reindexing group");
            siblings.insert(index, record);
            reindex(&mut siblings, spacing);
            stage_all(store, scope, &mut siblings)?;
        }
    }
    flush::commit(store, scope)
}
