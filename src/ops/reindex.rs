use crate::model::ordered::{by_created, sort_by_order, OrderedRecord};

/// Assign `order = i * spacing` to each record, in list order.
///
/// The list must already be in the intended order. Returns how many records
/// had their order value changed (only those are marked dirty), so running
/// it twice in a row reports zero the second time.
///
/// When `(len - 1) * spacing` would not fit in an `i32`, the gap shrinks to
/// `i32::MAX / len` so the values stay strictly increasing.
pub fn reindex<R: OrderedRecord>(records: &mut [R], spacing: i32) -> usize {
    let spacing = fitting_spacing(records.len(), spacing);
    let mut changed = 0;
    for (i, record) in records.iter_mut().enumerate() {
        let order = (i as i64 * spacing) as i32;
        if record.order() != Some(order) {
            record.set_order(order);
            changed += 1;
        }
    }
    changed
}

fn fitting_spacing(len: usize, spacing: i32) -> i64 {
    let spacing = i64::from(spacing.max(1));
    let last = len.saturating_sub(1) as i64;
    if last.saturating_mul(spacing) <= i64::from(i32::MAX) {
        spacing
    } else {
        (i64::from(i32::MAX) / len.max(1) as i64).max(1)
    }
}

/// The order value for a record appended after `siblings`:
/// `max + spacing`, or `0` for an empty group.
///
/// Returns `None` when the addition would overflow; the caller should
/// reindex the group and try again.
pub fn append_order<R: OrderedRecord>(siblings: &[R], spacing: i32) -> Option<i32> {
    match siblings.iter().filter_map(|r| r.order()).max() {
        Some(max) => max.checked_add(spacing.max(1)),
        None => Some(0),
    }
}

/// An order value strictly between `prev` and `next`.
///
/// `None` on either side means the start or end of the group. Returns
/// `None` when the neighbours leave no room (adjacent or inverted values).
pub fn order_between(prev: Option<i32>, next: Option<i32>, spacing: i32) -> Option<i32> {
    let spacing = spacing.max(1);
    match (prev, next) {
        (None, None) => Some(0),
        (Some(p), None) => p.checked_add(spacing),
        (None, Some(n)) => n.checked_sub(spacing),
        (Some(p), Some(n)) => {
            let (p, n) = (i64::from(p), i64::from(n));
            if n - p < 2 {
                return None;
            }
            i32::try_from(p + (n - p) / 2).ok()
        }
    }
}

/// Give every record without an order a value after the group's current
/// maximum, oldest first. Records that already have a value are untouched.
///
/// When the appended values would overflow, the whole group is sorted and
/// reindexed instead. Returns how many records changed.
pub fn fill_missing<R: OrderedRecord>(records: &mut [R], spacing: i32) -> usize {
    let spacing = spacing.max(1);
    let mut missing: Vec<usize> = (0..records.len())
        .filter(|&i| records[i].order().is_none())
        .collect();
    if missing.is_empty() {
        return 0;
    }
    missing.sort_by(|&a, &b| by_created(&records[a], &records[b]));

    let mut next = match records.iter().filter_map(|r| r.order()).max() {
        Some(max) => max.checked_add(spacing),
        None => Some(0),
    };
    let mut planned = Vec::with_capacity(missing.len());
    for _ in &missing {
        let Some(value) = next else { break };
        planned.push(value);
        next = value.checked_add(spacing);
    }

    if planned.len() < missing.len() {
        sort_by_order(records);
        return reindex(records, spacing);
    }
    for (&i, value) in missing.iter().zip(planned) {
        records[i].set_order(value);
    }
    missing.len()
}

/// Whether `records` (in intended order) have strictly increasing order values
pub fn is_strictly_increasing<R: OrderedRecord>(records: &[R]) -> bool {
    records.windows(2).all(|pair| match (pair[0].order(), pair[1].order()) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    })
}
