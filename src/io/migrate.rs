use std::collections::BTreeMap;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::io::store_io::StoreError;
use crate::model::document::{SCHEMA_VERSION, StoreDocument};
use crate::model::group::GroupKey;
use crate::model::ordered::{OrderedRecord, sort_by_order};
use crate::ops::reindex::fill_missing;

/// Outcome of bringing a loaded document up to the current schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    /// Records that received an order value during the upgrade
    pub initialized: usize,
}

impl MigrationReport {
    pub fn upgraded(&self) -> bool {
        self.from_version != self.to_version
    }
}

/// Upgrade `doc` in place to [`SCHEMA_VERSION`].
///
/// Version 1 documents predate order values (or carry them under the old
/// `displayOrder` key). Every record still lacking a value is appended to
/// its group in creation order, so existing values are preserved.
pub fn upgrade(doc: &mut StoreDocument, spacing: i32) -> Result<MigrationReport, StoreError> {
    let from_version = doc.schema_version;
    if from_version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found: from_version,
            supported: SCHEMA_VERSION,
        });
    }

    let mut report = MigrationReport {
        from_version,
        to_version: from_version,
        initialized: 0,
    };
    if from_version == SCHEMA_VERSION {
        return Ok(report);
    }

    report.initialized += fill_table(&mut doc.tasks, spacing);
    report.initialized += fill_table(&mut doc.headers, spacing);
    report.initialized += fill_table(&mut doc.projects, spacing);
    report.initialized += fill_table(&mut doc.areas, spacing);
    doc.schema_version = SCHEMA_VERSION;
    report.to_version = SCHEMA_VERSION;

    tracing::info!(
        from = from_version,
        to = SCHEMA_VERSION,
        initialized = report.initialized,
        "upgraded store schema"
    );
    Ok(report)
}

fn fill_table<R: OrderedRecord + Clone>(table: &mut IndexMap<Uuid, R>, spacing: i32) -> usize {
    let mut by_group: BTreeMap<GroupKey, Vec<R>> = BTreeMap::new();
    for record in table.values() {
        by_group
            .entry(record.group())
            .or_default()
            .push(record.clone());
    }

    let mut changed = 0;
    for (_, mut records) in by_group {
        sort_by_order(&mut records);
        changed += fill_missing(&mut records, spacing);
        for mut record in records.into_iter().filter(|r| r.is_dirty()) {
            record.mark_clean();
            table.insert(record.id(), record);
        }
    }
    changed
}
