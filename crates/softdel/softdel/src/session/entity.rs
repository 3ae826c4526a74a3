use std::fmt;

use softdel_api::prelude::{Record, SessionError, SoftDelResult, Value};

/// Stable identity of an entity: its table and its primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub table: &'static str,
    pub primary_key: Value,
}

impl EntityKey {
    pub fn new(table: &'static str, primary_key: impl Into<Value>) -> Self {
        Self {
            table,
            primary_key: primary_key.into(),
        }
    }

    /// Returns the key of `record`, which must have its primary key set.
    pub fn of(record: &Record) -> SoftDelResult<Self> {
        let primary_key = record
            .primary_key()
            .cloned()
            .ok_or_else(|| SessionError::MissingPrimaryKey(record.table().to_string()))?;

        Ok(Self::new(record.table(), primary_key))
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.table, self.primary_key)
    }
}

/// Lifecycle state of a loaded entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// As loaded from the storage.
    Clean,
    /// To be updated on commit.
    Modified,
    /// To be deleted on commit.
    Removed,
}

/// Records a child whose foreign key was nulled by detaching it from its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detachment {
    /// Relationship of the parent the child was detached from.
    pub relation: &'static str,
    /// The child foreign key column.
    pub column: &'static str,
    /// Foreign key value before the detachment.
    pub original: Value,
    /// Whether the caller asked to keep the child as an unlinked row.
    pub intentional: bool,
}

/// An entity tracked by a [`Session`](super::Session).
#[derive(Debug, Clone)]
pub struct Entity {
    pub(super) record: Record,
    pub(super) snapshot: Record,
    pub(super) state: EntityState,
    pub(super) relation_changes: usize,
    pub(super) detachment: Option<Detachment>,
}

impl Entity {
    pub(super) fn loaded(record: Record) -> Self {
        Self {
            snapshot: record.clone(),
            record,
            state: EntityState::Clean,
            relation_changes: 0,
            detachment: None,
        }
    }

    /// Current in-memory values.
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Values as last loaded or committed.
    pub fn snapshot(&self) -> &Record {
        &self.snapshot
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Number of relationship collection changes since the entity was loaded.
    pub fn relation_changes(&self) -> usize {
        self.relation_changes
    }

    pub fn detachment(&self) -> Option<&Detachment> {
        self.detachment.as_ref()
    }

    /// Persisted columns whose value differs from the snapshot.
    pub fn changed_columns(&self) -> Vec<&'static str> {
        self.record.changed_columns(&self.snapshot)
    }

    /// Moves a clean entity to [`EntityState::Modified`].
    pub(super) fn touch(&mut self) {
        if self.state == EntityState::Clean {
            self.state = EntityState::Modified;
        }
    }

    /// Marks the current values as persisted.
    pub(super) fn settle(&mut self) {
        self.snapshot = self.record.clone();
        self.state = EntityState::Clean;
        self.relation_changes = 0;
        self.detachment = None;
    }

    /// Discards every in-memory change.
    pub(super) fn revert(&mut self) {
        self.record = self.snapshot.clone();
        self.state = EntityState::Clean;
        self.relation_changes = 0;
        self.detachment = None;
    }
}
