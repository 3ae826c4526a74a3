//! This module contains the unit of work tracking entities between loads and commits.
//!
//! A [`Session`] keeps an identity map of the loaded entities, the new records to insert and
//! the bulk operations queued by the caller or by the flush hooks. Reads go through the
//! [`StatementInterceptor`]s, commits run the [`FlushHook`]s first and then send every write
//! to the storage as one atomic batch.

mod entity;

use std::collections::BTreeMap;
use std::sync::Arc;

use softdel_api::prelude::{
    Catalog, ColumnDef, Delete, Filter, Record, RelationDef, RelationKind, Select, SessionError,
    SoftDelError, SoftDelResult, Statement, Storage, StorageError, TableDef, Value, WriteOp,
};

pub use self::entity::{Detachment, Entity, EntityKey, EntityState};

/// Rewrites statements on their way to the storage.
pub trait StatementInterceptor: Send + Sync {
    fn intercept(&self, catalog: &Catalog, statement: Statement) -> Statement;
}

/// Runs over the unit of work right before its changes are written.
///
/// An error aborts the commit and rolls the session back.
pub trait FlushHook: Send + Sync {
    fn before_commit(&self, session: &mut Session<'_>) -> SoftDelResult<()>;
}

/// What a commit wrote to the storage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    /// Keys of the inserted entities, in insertion order.
    pub inserted: Vec<EntityKey>,
    pub updated: usize,
    pub deleted: usize,
}

/// A unit of work over a [`Storage`].
pub struct Session<'a> {
    storage: &'a mut dyn Storage,
    interceptors: Vec<Arc<dyn StatementInterceptor>>,
    hooks: Vec<Arc<dyn FlushHook>>,
    identity_map: BTreeMap<EntityKey, Entity>,
    new: Vec<Record>,
    queued: Vec<WriteOp>,
}

impl<'a> Session<'a> {
    pub fn new(storage: &'a mut dyn Storage) -> Self {
        Self {
            storage,
            interceptors: Vec::new(),
            hooks: Vec::new(),
            identity_map: BTreeMap::new(),
            new: Vec::new(),
            queued: Vec::new(),
        }
    }

    /// Registers an interceptor; interceptors run in registration order.
    pub fn add_interceptor(&mut self, interceptor: Arc<dyn StatementInterceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Registers a flush hook; hooks run in registration order.
    pub fn add_hook(&mut self, hook: Arc<dyn FlushHook>) {
        self.hooks.push(hook);
    }

    pub fn catalog(&self) -> &Catalog {
        self.storage.catalog()
    }

    pub fn storage(&self) -> &dyn Storage {
        &*self.storage
    }

    /// Runs every interceptor over `statement`.
    pub fn intercept(&self, statement: Statement) -> Statement {
        let catalog = self.storage.catalog();
        self.interceptors
            .iter()
            .fold(statement, |statement, interceptor| {
                interceptor.intercept(catalog, statement)
            })
    }

    /// Loads the entities matching `select` into the identity map and returns their keys.
    ///
    /// Entities already loaded keep their in-memory values.
    pub fn fetch(&mut self, select: Select) -> SoftDelResult<Vec<EntityKey>> {
        let select = match self.intercept(select.into()) {
            Statement::Select(select) => select,
            Statement::Delete(_) => {
                return Err(StorageError::Unsupported(
                    "select statement rewritten into a delete".to_string(),
                )
                .into());
            }
        };

        let rows = self.storage.select(&select)?;
        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            // the selected table always comes first in a joined row
            let Some(record) = row.into_iter().next() else {
                continue;
            };
            let key = EntityKey::of(&record)?;
            self.identity_map
                .entry(key.clone())
                .or_insert_with(|| Entity::loaded(record));
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        tracing::trace!(table = select.table, loaded = keys.len(), "fetched entities");

        Ok(keys)
    }

    /// Loads the entities matching `select` and returns a copy of their in-memory values.
    pub fn select(&mut self, select: Select) -> SoftDelResult<Vec<Record>> {
        let keys = self.fetch(select)?;
        Ok(keys
            .iter()
            .filter_map(|key| self.identity_map.get(key))
            .map(|entity| entity.record.clone())
            .collect())
    }

    /// Loads the entity of `table` with the given primary key.
    pub fn get(
        &mut self,
        table: &str,
        primary_key: impl Into<Value>,
    ) -> SoftDelResult<Option<Record>> {
        let table = self.catalog().require(table)?;
        let pk = primary_key_column(table)?;
        let select = Select::from(table.name).and_where(Filter::eq(
            &format!("{}.{}", table.name, pk.name),
            primary_key.into(),
        ));

        Ok(self.select(select)?.into_iter().next())
    }

    pub fn entity(&self, key: &EntityKey) -> Option<&Entity> {
        self.identity_map.get(key)
    }

    pub fn record(&self, key: &EntityKey) -> Option<&Record> {
        self.entity(key).map(Entity::record)
    }

    /// Returns whether `key` is in the identity map.
    pub fn is_loaded(&self, key: &EntityKey) -> bool {
        self.identity_map.contains_key(key)
    }

    /// Sets a column of a loaded entity.
    pub fn set(
        &mut self,
        key: &EntityKey,
        column: &str,
        value: impl Into<Value>,
    ) -> SoftDelResult<()> {
        let entity = self.entity_mut(key)?;
        entity.record.set(column, value.into())?;
        entity.touch();
        Ok(())
    }

    /// Schedules a new record for insertion.
    pub fn add(&mut self, record: Record) {
        self.new.push(record);
    }

    /// Schedules a loaded entity for deletion.
    pub fn delete(&mut self, key: &EntityKey) -> SoftDelResult<()> {
        self.mark_removed(key)
    }

    /// Removes `child` from the `relation` collection of `parent`, nulling its foreign key.
    ///
    /// The child is not meant to outlive its parent: a soft-delete hook restores its foreign
    /// key and soft-deletes it on commit.
    pub fn remove_child(
        &mut self,
        parent: &EntityKey,
        relation: &str,
        child: &EntityKey,
    ) -> SoftDelResult<()> {
        self.detach(parent, relation, child, false)
    }

    /// Like [`Session::remove_child`], but the child is kept as an unlinked row.
    pub fn unlink_child(
        &mut self,
        parent: &EntityKey,
        relation: &str,
        child: &EntityKey,
    ) -> SoftDelResult<()> {
        self.detach(parent, relation, child, true)
    }

    /// Links `parent` to `peer` through the association table of a many-to-many `relation`.
    pub fn link(
        &mut self,
        parent: &EntityKey,
        relation: &str,
        peer: &EntityKey,
    ) -> SoftDelResult<()> {
        let (association, local_column, remote_column) =
            self.association(parent, relation, peer)?;
        let mut record = Record::empty(association);
        record.set(local_column, parent.primary_key.clone())?;
        record.set(remote_column, peer.primary_key.clone())?;

        self.note_relation_change(parent)?;
        self.queued.push(WriteOp::Insert { record });
        Ok(())
    }

    /// Removes the association rows linking `parent` to `peer` through a many-to-many `relation`.
    pub fn unlink(
        &mut self,
        parent: &EntityKey,
        relation: &str,
        peer: &EntityKey,
    ) -> SoftDelResult<()> {
        let (association, local_column, remote_column) =
            self.association(parent, relation, peer)?;
        let filter = Filter::eq(local_column, parent.primary_key.clone())
            .and(Filter::eq(remote_column, peer.primary_key.clone()));

        self.note_relation_change(parent)?;
        self.queued.push(WriteOp::BulkDelete {
            table: association.name,
            filter: Some(filter),
        });
        Ok(())
    }

    /// Queues a bulk delete, after running it through the interceptors.
    pub fn bulk_delete(&mut self, delete: Delete) -> SoftDelResult<()> {
        match self.intercept(delete.into()) {
            Statement::Delete(delete) => {
                self.queued.push(WriteOp::BulkDelete {
                    table: delete.table,
                    filter: delete.filter,
                });
                Ok(())
            }
            Statement::Select(_) => Err(StorageError::Unsupported(
                "delete statement rewritten into a select".to_string(),
            )
            .into()),
        }
    }

    /// Records scheduled for insertion.
    pub fn new_records(&self) -> &[Record] {
        &self.new
    }

    pub fn new_record_mut(&mut self, index: usize) -> Option<&mut Record> {
        self.new.get_mut(index)
    }

    /// Queues a write, applied on commit after inserts and updates.
    pub fn queue(&mut self, op: WriteOp) {
        self.queued.push(op);
    }

    pub fn queued(&self) -> &[WriteOp] {
        &self.queued
    }

    /// Keys of the entities in the given state.
    pub fn keys_in_state(&self, state: EntityState) -> Vec<EntityKey> {
        self.identity_map
            .iter()
            .filter(|(_, entity)| entity.state == state)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn modified_keys(&self) -> Vec<EntityKey> {
        self.keys_in_state(EntityState::Modified)
    }

    pub fn removed_keys(&self) -> Vec<EntityKey> {
        self.keys_in_state(EntityState::Removed)
    }

    /// Sets a column of a loaded entity and schedules it for update, even if it was to be removed.
    pub fn stamp(&mut self, key: &EntityKey, column: &str, value: Value) -> SoftDelResult<()> {
        let entity = self.entity_mut(key)?;
        entity.record.set(column, value)?;
        entity.state = EntityState::Modified;
        Ok(())
    }

    /// Schedules a loaded entity for deletion.
    pub fn mark_removed(&mut self, key: &EntityKey) -> SoftDelResult<()> {
        self.entity_mut(key)?.state = EntityState::Removed;
        Ok(())
    }

    /// Restores the foreign key of a detached entity and returns the detachment, if any.
    pub fn restore_detached(&mut self, key: &EntityKey) -> SoftDelResult<Option<Detachment>> {
        let entity = self.entity_mut(key)?;
        let Some(detachment) = entity.detachment.take() else {
            return Ok(None);
        };
        entity
            .record
            .set(detachment.column, detachment.original.clone())?;

        Ok(Some(detachment))
    }

    /// Brings the loaded entities of `table` in line with a bulk update nulling `column` where it
    /// equals `value`.
    ///
    /// Clean entities are evicted from the identity map; dirty ones get `column` nulled in memory,
    /// so that their pending update agrees with the bulk one. Returns how many were affected.
    pub fn invalidate_children(
        &mut self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> SoftDelResult<usize> {
        let affected = self
            .identity_map
            .iter()
            .filter(|(key, entity)| key.table == table && entity.record.get(column) == Some(value))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();

        for key in &affected {
            let entity = self.entity_mut(key)?;
            if entity.state == EntityState::Clean {
                self.identity_map.remove(key);
            } else {
                entity.record.set(column, Value::Null)?;
            }
        }

        Ok(affected.len())
    }

    /// Runs the flush hooks and writes every pending change in one atomic batch.
    ///
    /// Writes are ordered as inserts, updates, queued operations and deletes. On failure nothing is
    /// written and the session is rolled back.
    pub fn commit(&mut self) -> SoftDelResult<CommitSummary> {
        let hooks = self.hooks.clone();
        for hook in hooks {
            if let Err(err) = hook.before_commit(self) {
                tracing::warn!(error = %err, "flush hook failed; rolling back session");
                self.rollback();
                return Err(err);
            }
        }

        let (ops, inserted, summary) = match self.write_ops() {
            Ok(batch) => batch,
            Err(err) => {
                self.rollback();
                return Err(err);
            }
        };
        if let Err(err) = self.storage.apply(&ops) {
            tracing::warn!(error = %err, "storage rejected the batch; rolling back session");
            self.rollback();
            return Err(err);
        }

        self.identity_map
            .retain(|_, entity| entity.state != EntityState::Removed);
        for entity in self.identity_map.values_mut() {
            entity.settle();
        }
        for (key, record) in summary.inserted.iter().cloned().zip(inserted) {
            self.identity_map.insert(key, Entity::loaded(record));
        }
        tracing::debug!(
            inserted = summary.inserted.len(),
            updated = summary.updated,
            deleted = summary.deleted,
            "committed session"
        );

        Ok(summary)
    }

    /// Discards every pending change; loaded entities revert to their last persisted values.
    pub fn rollback(&mut self) {
        self.new.clear();
        self.queued.clear();
        for entity in self.identity_map.values_mut() {
            entity.revert();
        }
        tracing::debug!("session rolled back");
    }

    fn write_ops(&mut self) -> SoftDelResult<(Vec<WriteOp>, Vec<Record>, CommitSummary)> {
        let mut summary = CommitSummary::default();
        let mut ops = Vec::new();

        let mut inserted = std::mem::take(&mut self.new);
        for record in inserted.iter_mut() {
            self.assign_sequence(record)?;
            summary.inserted.push(EntityKey::of(record)?);
            ops.push(WriteOp::Insert {
                record: record.clone(),
            });
        }

        for entity in self
            .identity_map
            .values()
            .filter(|entity| entity.state == EntityState::Modified)
        {
            // relationship changes alone write nothing
            if entity.changed_columns().is_empty() {
                continue;
            }
            let primary_key = entity
                .snapshot
                .primary_key()
                .cloned()
                .ok_or_else(|| SessionError::MissingPrimaryKey(entity.record.table().to_string()))?;
            ops.push(WriteOp::Update {
                primary_key,
                record: entity.record.clone(),
            });
            summary.updated += 1;
        }

        for mut op in std::mem::take(&mut self.queued) {
            if let WriteOp::Insert { record } = &mut op {
                self.assign_sequence(record)?;
            }
            ops.push(op);
        }

        for key in self.removed_keys() {
            ops.push(WriteOp::Delete {
                table: key.table,
                primary_key: key.primary_key,
            });
            summary.deleted += 1;
        }

        Ok((ops, inserted, summary))
    }

    /// Allocates a native auto-increment key for a record inserted without one.
    fn assign_sequence(&mut self, record: &mut Record) -> SoftDelResult<()> {
        if record.primary_key().is_some() {
            return Ok(());
        }

        let table = self.catalog().require(record.table())?;
        let pk = primary_key_column(table)?;
        if !pk.data_type.is_integer() {
            return Err(SessionError::MissingPrimaryKey(table.name.to_string()).into());
        }
        let sequence = self.storage.next_sequence(table.name)?;
        record.set(pk.name, Value::Uint64(sequence))?;

        Ok(())
    }

    fn detach(
        &mut self,
        parent: &EntityKey,
        relation: &str,
        child: &EntityKey,
        intentional: bool,
    ) -> SoftDelResult<()> {
        let relation = self.relation(parent.table, relation)?;
        let column = match relation.kind {
            RelationKind::HasOne { foreign_column } | RelationKind::HasMany { foreign_column }
                if child.table == relation.target =>
            {
                foreign_column
            }
            _ => return Err(invalid_relation(parent.table, relation)),
        };
        if !self.is_loaded(parent) {
            return Err(SessionError::EntityNotLoaded(parent.to_string()).into());
        }

        let entity = self.entity_mut(child)?;
        let original = entity.record.get(column).cloned().unwrap_or(Value::Null);
        if original != parent.primary_key {
            return Err(invalid_relation(parent.table, relation));
        }
        entity.record.set(column, Value::Null)?;
        entity.detachment = Some(Detachment {
            relation: relation.name,
            column,
            original,
            intentional,
        });
        entity.touch();

        self.note_relation_change(parent)
    }

    fn association(
        &self,
        parent: &EntityKey,
        relation: &str,
        peer: &EntityKey,
    ) -> SoftDelResult<(&'static TableDef, &'static str, &'static str)> {
        let relation = self.relation(parent.table, relation)?;
        match relation.kind {
            RelationKind::ManyToMany {
                association,
                local_column,
                remote_column,
            } if peer.table == relation.target => Ok((
                self.catalog().require(association)?,
                local_column,
                remote_column,
            )),
            _ => Err(invalid_relation(parent.table, relation)),
        }
    }

    fn relation(&self, table: &str, name: &str) -> SoftDelResult<&'static RelationDef> {
        self.catalog()
            .require(table)?
            .relation(name)
            .ok_or_else(|| {
                SessionError::UnknownRelation {
                    table: table.to_string(),
                    relation: name.to_string(),
                }
                .into()
            })
    }

    fn note_relation_change(&mut self, key: &EntityKey) -> SoftDelResult<()> {
        let entity = self.entity_mut(key)?;
        entity.relation_changes += 1;
        entity.touch();
        Ok(())
    }

    fn entity_mut(&mut self, key: &EntityKey) -> SoftDelResult<&mut Entity> {
        self.identity_map
            .get_mut(key)
            .ok_or_else(|| SessionError::EntityNotLoaded(key.to_string()).into())
    }
}

fn primary_key_column(table: &TableDef) -> SoftDelResult<&'static ColumnDef> {
    table
        .primary_key()
        .ok_or_else(|| SessionError::MissingPrimaryKey(table.name.to_string()).into())
}

fn invalid_relation(table: &str, relation: &RelationDef) -> SoftDelError {
    SessionError::InvalidRelation {
        table: table.to_string(),
        relation: relation.name.to_string(),
    }
    .into()
}
