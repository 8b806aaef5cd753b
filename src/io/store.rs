use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;

use uuid::Uuid;

use crate::io::backend::Backend;
use crate::io::changes::{ChangeBus, ChangeEvent, Interest, Subscription};
use crate::io::migrate::{self, MigrationReport};
use crate::io::store_io::StoreError;
use crate::model::config::StoreConfig;
use crate::model::document::{SCHEMA_VERSION, StoreDocument, StoredRecord};
use crate::model::group::{GroupKey, RecordKind};
use crate::model::ordered::sort_by_order;

/// Handle to a unit of work inside a [`Store`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The interactive scope every store starts with
    pub const PRIMARY: ScopeId = ScopeId(0);
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Drives the interactive surface; its commits are made durable
    Primary,
    /// Root-level scope for batch work
    Background,
    /// Child of another scope; saving pushes changes into the parent
    Nested,
}

struct Scope {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    /// This scope's view of the store
    doc: StoreDocument,
    /// Records staged here since the last save
    modified: BTreeSet<(RecordKind, Uuid)>,
    /// Groups whose membership or order the staged records affect
    touched: BTreeSet<GroupKey>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>, doc: StoreDocument) -> Self {
        Scope {
            kind,
            parent,
            doc,
            modified: BTreeSet::new(),
            touched: BTreeSet::new(),
        }
    }
}

/// The persistent store together with its open scopes.
///
/// Every mutation takes `&mut self`, so operations on one store never
/// interleave. Records are read and staged per scope; nothing reaches the
/// backend until a root-level scope is saved.
pub struct Store {
    backend: Box<dyn Backend>,
    config: StoreConfig,
    /// Last document successfully written to the backend
    committed: StoreDocument,
    scopes: BTreeMap<ScopeId, Scope>,
    next_scope: u32,
    changes: ChangeBus,
    migration: MigrationReport,
}

impl Store {
    /// Load the backend's document (an empty store if nothing was written
    /// yet), upgrade it to the current schema and open the primary scope.
    pub fn open(mut backend: Box<dyn Backend>, config: StoreConfig) -> Result<Self, StoreError> {
        let mut doc = backend.load()?.unwrap_or_default();
        let migration = migrate::upgrade(&mut doc, config.ordering.spacing())?;
        if migration.upgraded() {
            backend.write(&doc)?;
        }
        tracing::debug!(
            backend = %backend.describe(),
            tasks = doc.tasks.len(),
            "opened store"
        );

        let mut scopes = BTreeMap::new();
        scopes.insert(
            ScopeId::PRIMARY,
            Scope::new(ScopeKind::Primary, None, doc.clone()),
        );
        Ok(Store {
            backend,
            config,
            committed: doc,
            scopes,
            next_scope: 1,
            changes: ChangeBus::default(),
            migration,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The spacing every reindex in this store uses
    pub fn spacing(&self) -> i32 {
        self.config.ordering.spacing()
    }

    /// What happened to the schema when the store was opened
    pub fn migration(&self) -> MigrationReport {
        self.migration
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// The document as last persisted
    pub fn committed(&self) -> &StoreDocument {
        &self.committed
    }

    // -----------------------------------------------------------------------
    // Scopes
    // -----------------------------------------------------------------------

    pub fn primary(&self) -> ScopeId {
        ScopeId::PRIMARY
    }

    /// Open a root-level scope seeded from the committed document
    pub fn new_background(&mut self) -> ScopeId {
        let doc = self.committed.clone();
        self.insert_scope(Scope::new(ScopeKind::Background, None, doc))
    }

    /// Open a child scope seeded from its parent's current view
    pub fn new_nested(&mut self, parent: ScopeId) -> Result<ScopeId, StoreError> {
        let doc = self.scope(parent)?.doc.clone();
        Ok(self.insert_scope(Scope::new(ScopeKind::Nested, Some(parent), doc)))
    }

    fn insert_scope(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.next_scope);
        self.next_scope += 1;
        self.scopes.insert(id, scope);
        id
    }

    /// Drop a scope and any changes it has not saved. The primary scope and
    /// scopes with open children cannot be closed.
    pub fn close(&mut self, id: ScopeId) -> Result<(), StoreError> {
        self.scope(id)?;
        let has_children = self.scopes.values().any(|s| s.parent == Some(id));
        if id == ScopeId::PRIMARY || has_children {
            return Err(StoreError::ScopeBusy(id));
        }
        if let Some(scope) = self.scopes.remove(&id) {
            if !scope.modified.is_empty() {
                tracing::debug!(scope = %id, dropped = scope.modified.len(), "closed scope with unsaved changes");
            }
        }
        Ok(())
    }

    pub fn kind(&self, id: ScopeId) -> Result<ScopeKind, StoreError> {
        Ok(self.scope(id)?.kind)
    }

    pub fn parent(&self, id: ScopeId) -> Result<Option<ScopeId>, StoreError> {
        Ok(self.scope(id)?.parent)
    }

    pub fn is_primary(&self, id: ScopeId) -> bool {
        id == ScopeId::PRIMARY
    }

    /// Whether the scope holds staged changes not yet saved
    pub fn has_changes(&self, id: ScopeId) -> Result<bool, StoreError> {
        Ok(!self.scope(id)?.modified.is_empty())
    }

    fn scope(&self, id: ScopeId) -> Result<&Scope, StoreError> {
        self.scopes.get(&id).ok_or(StoreError::UnknownScope(id))
    }

    fn scope_mut(&mut self, id: ScopeId) -> Result<&mut Scope, StoreError> {
        self.scopes.get_mut(&id).ok_or(StoreError::UnknownScope(id))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fresh copies of every record in `group` as this scope sees them,
    /// sorted by order (missing values last, then creation time, then id).
    pub fn siblings<R: StoredRecord>(
        &self,
        scope: ScopeId,
        group: &GroupKey,
    ) -> Result<Vec<R>, StoreError> {
        let doc = &self.scope(scope)?.doc;
        let mut records: Vec<R> = R::table(doc)
            .values()
            .filter(|r| r.group() == *group)
            .cloned()
            .collect();
        sort_by_order(&mut records);
        Ok(records)
    }

    pub fn get<R: StoredRecord>(&self, scope: ScopeId, id: Uuid) -> Result<Option<R>, StoreError> {
        Ok(R::table(&self.scope(scope)?.doc).get(&id).cloned())
    }

    /// Every record of one type, in insertion order
    pub fn all<R: StoredRecord>(&self, scope: ScopeId) -> Result<Vec<R>, StoreError> {
        Ok(R::table(&self.scope(scope)?.doc).values().cloned().collect())
    }

    pub fn groups(&self, scope: ScopeId) -> Result<Vec<GroupKey>, StoreError> {
        Ok(self.scope(scope)?.doc.groups())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Stage the dirty records among `records` into the scope and mark them
    /// clean. New records are inserted. Returns how many were staged.
    pub fn stage<R: StoredRecord>(
        &mut self,
        scope: ScopeId,
        records: &mut [R],
    ) -> Result<usize, StoreError> {
        let scope = self.scope_mut(scope)?;
        let mut staged = 0;
        for record in records.iter_mut().filter(|r| r.is_dirty()) {
            record.mark_clean();
            let table = R::table_mut(&mut scope.doc);
            if let Some(previous) = table.get(&record.id()) {
                scope.touched.insert(previous.group());
            }
            scope.touched.insert(record.group());
            table.insert(record.id(), record.clone());
            scope.modified.insert((R::KIND, record.id()));
            staged += 1;
        }
        Ok(staged)
    }

    /// Save one scope: a nested scope pushes its changes into its parent, a
    /// root-level scope writes them to the backend. Returns the touched
    /// groups, empty when there was nothing to save.
    ///
    /// On failure the scope keeps its staged changes.
    pub(crate) fn save_scope(&mut self, id: ScopeId) -> Result<Vec<GroupKey>, StoreError> {
        let mut scope = self.scopes.remove(&id).ok_or(StoreError::UnknownScope(id))?;
        if scope.modified.is_empty() {
            self.scopes.insert(id, scope);
            return Ok(Vec::new());
        }

        let result = match scope.parent {
            Some(parent) => self.push_to_parent(&scope, parent),
            None => self.persist(&scope),
        };
        if result.is_ok() {
            scope.modified.clear();
        }
        let groups: Vec<GroupKey> = match result {
            Ok(()) => std::mem::take(&mut scope.touched).into_iter().collect(),
            Err(_) => Vec::new(),
        };
        self.scopes.insert(id, scope);
        result.map(|()| groups)
    }

    fn push_to_parent(&mut self, scope: &Scope, parent: ScopeId) -> Result<(), StoreError> {
        let target = self.scope_mut(parent)?;
        for &(kind, id) in &scope.modified {
            target.doc.copy_record_from(&scope.doc, kind, id);
        }
        target.modified.extend(scope.modified.iter().copied());
        target.touched.extend(scope.touched.iter().copied());
        Ok(())
    }

    fn persist(&mut self, scope: &Scope) -> Result<(), StoreError> {
        let mut next = self.committed.clone();
        for &(kind, id) in &scope.modified {
            next.copy_record_from(&scope.doc, kind, id);
        }
        next.schema_version = SCHEMA_VERSION;
        self.backend.write(&next)?;
        self.committed = next;

        // Other scopes see the new values unless they or an ancestor changed
        // the record too
        let updates: Vec<(ScopeId, RecordKind, Uuid)> = self
            .scopes
            .keys()
            .flat_map(|&other| scope.modified.iter().map(move |&(kind, id)| (other, kind, id)))
            .filter(|&(other, kind, id)| !self.shadowed(other, kind, id))
            .collect();
        for (other, kind, id) in updates {
            if let Some(target) = self.scopes.get_mut(&other) {
                target.doc.copy_record_from(&self.committed, kind, id);
            }
        }
        Ok(())
    }

    /// Whether `scope` or one of its ancestors has unsaved changes to the record
    fn shadowed(&self, scope: ScopeId, kind: RecordKind, id: Uuid) -> bool {
        let mut current = self.scopes.get(&scope);
        while let Some(s) = current {
            if s.modified.contains(&(kind, id)) {
                return true;
            }
            current = s.parent.and_then(|p| self.scopes.get(&p));
        }
        false
    }

    /// Throw away a scope's unsaved changes, restoring its records from its
    /// parent (or the committed document). Returns how many were reverted.
    pub fn discard(&mut self, id: ScopeId) -> Result<usize, StoreError> {
        let mut scope = self.scopes.remove(&id).ok_or(StoreError::UnknownScope(id))?;
        let source = match scope.parent.and_then(|p| self.scopes.get(&p)) {
            Some(parent) => &parent.doc,
            None => &self.committed,
        };
        for &(kind, record) in &scope.modified {
            scope.doc.restore_record_from(source, kind, record);
        }
        let reverted = scope.modified.len();
        scope.modified.clear();
        scope.touched.clear();
        self.scopes.insert(id, scope);
        if reverted > 0 {
            tracing::debug!(scope = %id, reverted, "discarded staged changes");
        }
        Ok(reverted)
    }

    /// Force written data to stable storage
    pub(crate) fn sync_backing(&mut self) -> io::Result<()> {
        self.backend.sync()
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    pub fn subscribe(&mut self, interest: Interest) -> Subscription {
        self.changes.subscribe(interest)
    }

    pub(crate) fn publish(&mut self, event: &ChangeEvent) -> usize {
        self.changes.publish(event)
    }
}
