use std::collections::BTreeSet;
use std::sync::Arc;

use softdel_api::prelude::{SoftDelResult, Value};

use super::CascadeManager;
use crate::clock::Clock;
use crate::keys::KeyStrategyRegistry;
use crate::session::{Entity, EntityKey, FlushHook, Session};

/// Names of the bookkeeping columns maintained by [`SoftDeleteHook`].
///
/// A column which is not configured, or which a table does not define, is never stamped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampColumns {
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// Integer column incremented on every stamped update.
    pub version: Option<String>,
}

/// Before-commit hook turning deletes into deletion timestamp updates.
///
/// On each commit, with a single timestamp read from the clock, the hook
///
/// 1. assigns a primary key to new records which have none, through the key registry, and
///    stamps their creation timestamp;
/// 2. soft-deletes the children which were removed from a parent collection without being
///    intentionally unlinked, restoring their foreign key first;
/// 3. soft-deletes, through the [`CascadeManager`], every entity scheduled for removal whose
///    table has the deletion column;
/// 4. stamps the update timestamp, and bumps the version, of every modified entity whose
///    persisted columns changed.
///
/// A single visited set is shared by every cascade of the commit.
pub struct SoftDeleteHook {
    cascade: Arc<CascadeManager>,
    keys: Arc<KeyStrategyRegistry>,
    clock: Arc<dyn Clock>,
    columns: TimestampColumns,
}

impl std::fmt::Debug for SoftDeleteHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftDeleteHook")
            .field("cascade", &self.cascade)
            .field("keys", &self.keys)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl SoftDeleteHook {
    /// Creates a hook maintaining no bookkeeping column but the deletion one.
    pub fn new(
        cascade: Arc<CascadeManager>,
        keys: Arc<KeyStrategyRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cascade,
            keys,
            clock,
            columns: TimestampColumns::default(),
        }
    }

    pub fn with_columns(mut self, columns: TimestampColumns) -> Self {
        self.columns = columns;
        self
    }

    pub fn cascade(&self) -> &Arc<CascadeManager> {
        &self.cascade
    }

    pub fn keys(&self) -> &Arc<KeyStrategyRegistry> {
        &self.keys
    }

    pub fn columns(&self) -> &TimestampColumns {
        &self.columns
    }

    fn prepare_new(&self, session: &mut Session<'_>, now: u64) -> SoftDelResult<()> {
        for index in 0..session.new_records().len() {
            let record = &session.new_records()[index];
            let table = session.catalog().require(record.table())?;
            let key = match record.primary_key() {
                Some(_) => None,
                None => self.keys.generate_key(session.storage(), table)?,
            };

            let Some(record) = session.new_record_mut(index) else {
                continue;
            };
            if let (Some(key), Some(pk)) = (key, table.primary_key()) {
                tracing::trace!(table = table.name, %key, "assigned primary key");
                record.set(pk.name, key)?;
            }
            if let Some(column) = self.columns.created_at.as_deref()
                && record.get(column).is_some_and(Value::is_null)
            {
                record.set(column, Value::Timestamp(now))?;
            }
        }

        Ok(())
    }

    fn soft_delete_orphans(
        &self,
        session: &mut Session<'_>,
        now: u64,
        visited: &mut BTreeSet<EntityKey>,
    ) -> SoftDelResult<()> {
        for key in session.modified_keys() {
            let orphaned = session
                .entity(&key)
                .and_then(Entity::detachment)
                .is_some_and(|detachment| !detachment.intentional);
            if !orphaned {
                continue;
            }
            if !self
                .cascade
                .is_soft_deletable(session.catalog().require(key.table)?)
            {
                continue;
            }

            session.restore_detached(&key)?;
            let affected = self.cascade.cascade(session, &key, now, visited)?;
            tracing::debug!(entity = %key, affected = affected.len(), "soft-deleted orphaned child");
        }

        Ok(())
    }

    fn soft_delete_removed(
        &self,
        session: &mut Session<'_>,
        now: u64,
        visited: &mut BTreeSet<EntityKey>,
    ) -> SoftDelResult<()> {
        for key in session.removed_keys() {
            // rows without a deletion column are really deleted
            if !self.cascade.is_soft_deletable(session.catalog().require(key.table)?) {
                continue;
            }

            let affected = self.cascade.cascade(session, &key, now, visited)?;
            tracing::debug!(entity = %key, affected = affected.len(), "soft-deleted entity");
        }

        Ok(())
    }

    fn stamp_modified(&self, session: &mut Session<'_>, now: u64) -> SoftDelResult<()> {
        let deletion_column = self.cascade.column();
        for key in session.modified_keys() {
            let Some(entity) = session.entity(&key) else {
                continue;
            };

            // the deletion timestamp was just set
            let deleted = entity.snapshot().get(deletion_column).is_some_and(Value::is_null)
                && entity.record().get(deletion_column).is_some_and(|value| !value.is_null());
            let changed = entity
                .changed_columns()
                .into_iter()
                .any(|column| !self.is_bookkeeping(column));
            if deleted || !changed {
                continue;
            }

            let updated_at = self
                .columns
                .updated_at
                .as_deref()
                .filter(|column| entity.record().get(column).is_some());
            let version = self.columns.version.as_deref().and_then(|column| {
                entity
                    .record()
                    .get(column)
                    .map(|current| (column, next_version(current)))
            });

            if let Some(column) = updated_at {
                session.stamp(&key, column, Value::Timestamp(now))?;
            }
            if let Some((column, version)) = version {
                session.stamp(&key, column, version)?;
            }
            tracing::trace!(entity = %key, "stamped update");
        }

        Ok(())
    }

    fn is_bookkeeping(&self, column: &str) -> bool {
        [
            &self.columns.created_at,
            &self.columns.updated_at,
            &self.columns.version,
        ]
        .into_iter()
        .any(|configured| configured.as_deref() == Some(column))
    }
}

impl FlushHook for SoftDeleteHook {
    fn before_commit(&self, session: &mut Session<'_>) -> SoftDelResult<()> {
        let now = self.clock.now_millis();
        let mut visited = BTreeSet::new();

        self.prepare_new(session, now)?;
        self.soft_delete_orphans(session, now, &mut visited)?;
        self.soft_delete_removed(session, now, &mut visited)?;
        self.stamp_modified(session, now)
    }
}

fn next_version(current: &Value) -> Value {
    match current {
        Value::Int64(version) => Value::Int64(version.saturating_add(1)),
        Value::Uint64(version) => Value::Uint64(version.saturating_add(1)),
        _ => Value::Uint64(1),
    }
}
