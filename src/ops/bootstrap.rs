use std::cmp::Ordering;

use serde::Serialize;

use crate::io::flush::{self, CommitError};
use crate::io::store::{ScopeId, Store};
use crate::model::document::StoredRecord;
use crate::model::group::{GroupKey, RecordKind};
use crate::model::ordered::{OrderedRecord, compare_by_order};
use crate::model::record::{Area, Header, Project, Task};
use crate::ops::reindex::{fill_missing, reindex};
use crate::ops::reorder::{fetch_siblings, stage_all};

/// What an initialization or repair pass did to one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub group: GroupKey,
    /// Records in the group when the pass ran
    pub examined: usize,
    /// Records whose order value changed
    pub updated: usize,
}

impl RepairReport {
    fn untouched(group: &GroupKey, examined: usize) -> Self {
        RepairReport {
            group: *group,
            examined,
            updated: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Lazy initialization
// ---------------------------------------------------------------------------

/// Give every record in `group` that has no order value one, appended after
/// the current maximum in creation order, and commit.
///
/// Safe to call from any read path: when every record already has a value
/// nothing is staged or written.
pub fn ensure_ordering_initialized<R: StoredRecord>(
    store: &mut Store,
    scope: ScopeId,
    group: &GroupKey,
) -> Result<RepairReport, CommitError> {
    let mut records: Vec<R> = fetch_siblings(store, scope, group);
    let examined = records.len();
    if records.iter().all(|r| r.order().is_some()) {
        return Ok(RepairReport::untouched(group, examined));
    }

    let updated = fill_missing(&mut records, store.spacing());
    stage_all(store, scope, &mut records)?;
    flush::commit(store, scope)?;
    tracing::info!(%group, examined, updated, "initialized missing order values");
    Ok(RepairReport {
        group: *group,
        examined,
        updated,
    })
}

// ---------------------------------------------------------------------------
// Repair
// ---------------------------------------------------------------------------

/// Rebuild the order of `group` from scratch: sort by `cmp`, reindex with
/// the store's spacing, commit.
///
/// Use [`crate::model::ordered::by_created`] to recover from corrupted
/// values, or [`compare_by_order`] to keep the current order while
/// separating duplicates.
pub fn repair_ordering<R, F>(
    store: &mut Store,
    scope: ScopeId,
    group: &GroupKey,
    cmp: F,
) -> Result<RepairReport, CommitError>
where
    R: StoredRecord,
    F: FnMut(&R, &R) -> Ordering,
{
    let mut records: Vec<R> = fetch_siblings(store, scope, group);
    let examined = records.len();
    records.sort_by(cmp);

    let updated = reindex(&mut records, store.spacing());
    if updated == 0 {
        return Ok(RepairReport::untouched(group, examined));
    }
    stage_all(store, scope, &mut records)?;
    flush::commit(store, scope)?;
    tracing::info!(%group, examined, updated, "repaired ordering");
    Ok(RepairReport {
        group: *group,
        examined,
        updated,
    })
}

/// Whether two records in `records` share an order value
pub fn has_duplicate_orders<R: OrderedRecord>(records: &[R]) -> bool {
    let mut values: Vec<i32> = records.iter().filter_map(|r| r.order()).collect();
    values.sort_unstable();
    values.windows(2).any(|pair| pair[0] == pair[1])
}

// ---------------------------------------------------------------------------
// Launch pass
// ---------------------------------------------------------------------------

/// Initialize every group in the scope and separate duplicate values,
/// keeping the current relative order. Returns a report for each group
/// that changed.
pub fn initialize_all(store: &mut Store, scope: ScopeId) -> Result<Vec<RepairReport>, CommitError> {
    let groups = match store.groups(scope) {
        Ok(groups) => groups,
        Err(e) => {
            tracing::warn!(error = %e, "could not list groups, nothing to initialize");
            Vec::new()
        }
    };

    let mut reports = Vec::new();
    for group in &groups {
        let report = match group.kind() {
            RecordKind::Task => initialize_group::<Task>(store, scope, group)?,
            RecordKind::Header => initialize_group::<Header>(store, scope, group)?,
            RecordKind::Project => initialize_group::<Project>(store, scope, group)?,
            RecordKind::Area => initialize_group::<Area>(store, scope, group)?,
        };
        if report.updated > 0 {
            reports.push(report);
        }
    }
    Ok(reports)
}

fn initialize_group<R: StoredRecord>(
    store: &mut Store,
    scope: ScopeId,
    group: &GroupKey,
) -> Result<RepairReport, CommitError> {
    let mut report = ensure_ordering_initialized::<R>(store, scope, group)?;
    let records: Vec<R> = fetch_siblings(store, scope, group);
    if has_duplicate_orders(&records) {
        let repaired = repair_ordering::<R, _>(store, scope, group, compare_by_order)?;
        report.updated += repaired.updated;
    }
    Ok(report)
}
