use crate::io::changes::ChangeEvent;
use crate::io::store::{ScopeId, Store};
use crate::io::store_io::StoreError;
use crate::model::group::GroupKey;

/// Error type for commits
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("could not save scope {scope}: {source}")]
    Save { scope: ScopeId, source: StoreError },
    #[error("could not save parent scope {scope}: {source}")]
    Cascade { scope: ScopeId, source: StoreError },
}

impl CommitError {
    /// The scope whose save failed
    pub fn scope(&self) -> ScopeId {
        match self {
            CommitError::Save { scope, .. } | CommitError::Cascade { scope, .. } => *scope,
        }
    }
}

/// What a successful commit did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Groups touched by the originating scope's save
    pub groups: Vec<GroupKey>,
    /// Ancestor scopes saved on the way up
    pub cascaded: Vec<ScopeId>,
    /// Outcome of the durability flush, `None` when none was attempted
    pub synced: Option<bool>,
}

/// Make staged changes in `scope` persistent and tell observers.
///
/// 1. Save the scope (nothing happens when it has no changes).
/// 2. Save each ancestor in turn, so nested work reaches the backend.
/// 3. For the primary scope, force the backing data to stable storage
///    when `durability.fsync` is on. A failure here is logged, never
///    returned.
/// 4. Publish a change event naming the touched groups.
///
/// A failed save stops the sequence; the failing scope keeps its staged
/// changes.
pub fn commit(store: &mut Store, scope: ScopeId) -> Result<CommitReport, CommitError> {
    let groups = store
        .save_scope(scope)
        .map_err(|source| CommitError::Save { scope, source })?;

    let mut cascaded = Vec::new();
    let mut current = scope;
    while let Some(parent) = store
        .parent(current)
        .map_err(|source| CommitError::Cascade {
            scope: current,
            source,
        })?
    {
        store
            .save_scope(parent)
            .map_err(|source| CommitError::Cascade {
                scope: parent,
                source,
            })?;
        cascaded.push(parent);
        current = parent;
    }

    let synced = if store.is_primary(scope) && store.config().durability.fsync {
        match store.sync_backing() {
            Ok(()) => Some(true),
            Err(e) => {
                tracing::warn!(
                    backend = %store.describe(),
                    error = %e,
                    "durability flush failed, data may not survive a crash"
                );
                Some(false)
            }
        }
    } else {
        None
    };

    if !groups.is_empty() {
        let delivered = store.publish(&ChangeEvent {
            scope,
            groups: groups.clone(),
        });
        tracing::debug!(
            scope = %scope,
            groups = groups.len(),
            subscribers = delivered,
            "committed"
        );
    }

    Ok(CommitReport {
        groups,
        cascaded,
        synced,
    })
}
