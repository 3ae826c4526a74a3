use std::collections::BTreeSet;
use std::sync::Arc;

use softdel_api::prelude::{
    CascadeError, Catalog, ConfigError, Filter, OnDelete, RelationDef, RelationKind, Select,
    SessionError, SoftDelResult, TableDef, Value, WriteOp,
};

use crate::session::{EntityKey, EntityState, Session};

/// Creates the cascade manager shared by the soft-delete hooks of a process.
pub fn configure_cascade(deletion_column: impl Into<String>) -> Arc<CascadeManager> {
    let manager = CascadeManager::new(deletion_column);
    tracing::info!(column = %manager.column, "configured soft-delete cascade");
    Arc::new(manager)
}

/// Propagates a soft-delete across the relationships of an entity, following the
/// [`OnDelete`] policy of each relationship.
#[derive(Debug, Clone)]
pub struct CascadeManager {
    column: String,
}

impl CascadeManager {
    pub fn new(deletion_column: impl Into<String>) -> Self {
        Self {
            column: deletion_column.into(),
        }
    }

    /// Name of the deletion timestamp column.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Whether rows of `table` are soft-deleted rather than removed.
    pub fn is_soft_deletable(&self, table: &TableDef) -> bool {
        table.has_column(&self.column)
    }

    /// Rejects tables whose relationships let the engine hard-delete orphans, since that would
    /// remove the rows the soft-delete is meant to keep.
    pub fn check_relations(&self, table: &TableDef) -> Result<(), CascadeError> {
        match table.relations.iter().find(|relation| relation.delete_orphan) {
            Some(relation) => Err(CascadeError::InvalidConfiguration {
                table: table.name.to_string(),
                relation: relation.name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Checks the relationships of every soft-deletable table of `catalog`.
    pub fn validate(&self, catalog: &Catalog) -> SoftDelResult<()> {
        let mut soft_tables = 0;
        for table in catalog.tables() {
            if !self.is_soft_deletable(table) {
                continue;
            }
            soft_tables += 1;
            self.check_relations(table)?;

            for relation in table.relations {
                let column = match (relation.policy(), relation.kind) {
                    (
                        OnDelete::SetNull,
                        RelationKind::HasOne { foreign_column }
                        | RelationKind::HasMany { foreign_column },
                    ) => foreign_column,
                    _ => continue,
                };
                let target = catalog.require(relation.target)?;
                if target.column(column).is_some_and(|col| !col.nullable) {
                    return Err(CascadeError::SetNullOnRequiredColumn {
                        table: table.name.to_string(),
                        relation: relation.name.to_string(),
                        column: column.to_string(),
                    }
                    .into());
                }
            }
        }

        if soft_tables == 0 {
            return Err(ConfigError::UnknownDeletionColumn(self.column.clone()).into());
        }
        tracing::debug!(column = %self.column, soft_tables, "validated cascade configuration");

        Ok(())
    }

    /// Soft-deletes the entity identified by `key` and propagates the deletion.
    ///
    /// Every entity reached is recorded in `visited`, so that cyclic relationships terminate;
    /// an entity already visited is skipped. Entities of tables without the deletion column are
    /// scheduled for removal instead. Returns the entities whose deletion timestamp was set.
    ///
    /// The PROTECT relationships of every entity the deletion would reach are checked first:
    /// when one blocks, the session is left as it was.
    pub fn cascade(
        &self,
        session: &mut Session<'_>,
        key: &EntityKey,
        timestamp: u64,
        visited: &mut BTreeSet<EntityKey>,
    ) -> SoftDelResult<Vec<EntityKey>> {
        if visited.contains(key) {
            return Ok(vec![]);
        }

        self.check_protected(session, key, &mut visited.clone())?;
        self.propagate(session, key, timestamp, visited)
    }

    /// Walks the CASCADE_DELETE closure of `key` without mutating anything, failing on the
    /// first PROTECT relationship which still has live rows.
    fn check_protected(
        &self,
        session: &mut Session<'_>,
        key: &EntityKey,
        seen: &mut BTreeSet<EntityKey>,
    ) -> SoftDelResult<()> {
        if !seen.insert(key.clone()) {
            return Ok(());
        }

        let table = session.catalog().require(key.table)?;
        self.check_relations(table)?;
        if !session.is_loaded(key) {
            return Err(SessionError::EntityNotLoaded(key.to_string()).into());
        }

        for relation in table
            .relations
            .iter()
            .filter(|relation| relation.policy() == OnDelete::Protect)
        {
            if let Some(blocking) = self.related_keys(session, key, relation)?.first() {
                tracing::warn!(entity = %key, relation = relation.name, blocking = %blocking, "delete blocked by protected relation");
                return Err(CascadeError::Protected {
                    table: table.name.to_string(),
                    relation: relation.name.to_string(),
                    blocking_table: relation.target.to_string(),
                }
                .into());
            }
        }

        for relation in table
            .relations
            .iter()
            .filter(|relation| relation.policy() == OnDelete::CascadeDelete)
        {
            for related in self.related_keys(session, key, relation)? {
                self.check_protected(session, &related, seen)?;
            }
        }

        Ok(())
    }

    fn propagate(
        &self,
        session: &mut Session<'_>,
        key: &EntityKey,
        timestamp: u64,
        visited: &mut BTreeSet<EntityKey>,
    ) -> SoftDelResult<Vec<EntityKey>> {
        if !visited.insert(key.clone()) {
            return Ok(vec![]);
        }

        let table = session.catalog().require(key.table)?;
        let mut affected = Vec::new();
        if self.is_soft_deletable(table) {
            session.stamp(key, &self.column, Value::Timestamp(timestamp))?;
            affected.push(key.clone());
        } else {
            session.mark_removed(key)?;
        }
        tracing::debug!(entity = %key, "cascading delete");

        for relation in table.relations {
            match (relation.policy(), relation.kind) {
                (OnDelete::CascadeDelete, _) => {
                    for related in self.related_keys(session, key, relation)? {
                        affected.extend(self.propagate(session, &related, timestamp, visited)?);
                    }
                }
                (
                    OnDelete::SetNull,
                    RelationKind::HasOne { foreign_column }
                    | RelationKind::HasMany { foreign_column },
                ) => {
                    session.queue(WriteOp::BulkUpdate {
                        table: relation.target,
                        patch: vec![(foreign_column, Value::Null)],
                        filter: Some(Filter::eq(foreign_column, key.primary_key.clone())),
                    });
                    let invalidated = session.invalidate_children(
                        relation.target,
                        foreign_column,
                        &key.primary_key,
                    )?;
                    tracing::trace!(entity = %key, relation = relation.name, invalidated, "nulled child foreign keys");
                }
                (
                    OnDelete::SetNull | OnDelete::Unlink,
                    RelationKind::ManyToMany {
                        association,
                        local_column,
                        ..
                    },
                ) => {
                    session.queue(WriteOp::BulkDelete {
                        table: association,
                        filter: Some(Filter::eq(local_column, key.primary_key.clone())),
                    });
                }
                // a belongs-to parent holds no row pointing at this entity
                (OnDelete::SetNull | OnDelete::Unlink, RelationKind::BelongsTo { .. })
                | (OnDelete::Unlink, RelationKind::HasOne { .. } | RelationKind::HasMany { .. })
                | (OnDelete::Protect | OnDelete::DoNothing, _) => {}
            }
        }

        Ok(affected)
    }

    /// Loads the live entities related to `key` through `relation`.
    ///
    /// Entities already deleted in memory are not returned.
    fn related_keys(
        &self,
        session: &mut Session<'_>,
        key: &EntityKey,
        relation: &RelationDef,
    ) -> SoftDelResult<Vec<EntityKey>> {
        let target = session.catalog().require(relation.target)?;
        let target_pk = target
            .primary_key()
            .ok_or_else(|| SessionError::MissingPrimaryKey(target.name.to_string()))?;

        let select = match relation.kind {
            RelationKind::BelongsTo { local_column } => {
                let Some(parent) = session
                    .record(key)
                    .and_then(|record| record.get(local_column))
                    .filter(|value| !value.is_null())
                    .cloned()
                else {
                    return Ok(vec![]);
                };
                Select::from(target.name).and_where(Filter::eq(
                    &qualified(target.name, target_pk.name),
                    parent,
                ))
            }
            RelationKind::HasOne { foreign_column } | RelationKind::HasMany { foreign_column } => {
                Select::from(target.name).and_where(Filter::eq(
                    &qualified(target.name, foreign_column),
                    key.primary_key.clone(),
                ))
            }
            RelationKind::ManyToMany {
                association,
                local_column,
                remote_column,
            } => Select::from(target.name)
                .join(
                    association,
                    &qualified(target.name, target_pk.name),
                    &qualified(association, remote_column),
                )
                .and_where(Filter::eq(
                    &qualified(association, local_column),
                    key.primary_key.clone(),
                )),
        };
        let select = if self.is_soft_deletable(target) {
            select.and_where(Filter::is_null(&qualified(target.name, &self.column)))
        } else {
            select
        };

        let mut keys = session.fetch(select.include_deleted())?;
        keys.retain(|related| {
            session.entity(related).is_some_and(|entity| {
                entity.state() != EntityState::Removed
                    && entity
                        .record()
                        .get(&self.column)
                        .is_none_or(Value::is_null)
            })
        });

        Ok(keys)
    }
}

fn qualified(table: &str, column: &str) -> String {
    format!("{table}.{column}")
}

#[cfg(test)]
mod test {

    use softdel_api::prelude::{SoftDelError, Storage, StorageError};

    use super::*;
    use crate::memory::MemoryStorage;
    use crate::tests::{self, DELETED_AT};

    const NOW: u64 = 1_700_000_000_000;

    fn load(session: &mut Session<'_>, table: &'static str, id: u64) -> EntityKey {
        session
            .get(table, id)
            .expect("should load")
            .expect("seeded row");
        EntityKey::new(table, id)
    }

    fn deleted_at(storage: &MemoryStorage, table: &str, id: u64) -> Option<Value> {
        storage
            .row(table, &Value::Uint64(id))
            .and_then(|row| row.get(DELETED_AT))
            .cloned()
    }

    #[test]
    fn test_should_cascade_delete_user() {
        let mut storage = tests::seeded_storage();
        let manager = CascadeManager::new(DELETED_AT);
        let mut session = Session::new(&mut storage);
        let alice = load(&mut session, "users", 1);

        let mut visited = BTreeSet::new();
        let affected = manager
            .cascade(&mut session, &alice, NOW, &mut visited)
            .expect("should cascade");
        let mut affected = affected
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        affected.sort();
        assert_eq!(
            affected,
            vec![
                "comments#100",
                "comments#103",
                "posts#10",
                "posts#11",
                "users#1"
            ]
        );
        // attachments carry no deletion column
        assert_eq!(
            session.removed_keys(),
            vec![EntityKey::new("attachments", 200u64)]
        );

        let summary = session.commit().expect("should commit");
        assert_eq!(summary.updated, 5);
        assert_eq!(summary.deleted, 1);
        drop(session);

        let stamped = Some(Value::Timestamp(NOW));
        assert_eq!(deleted_at(&storage, "users", 1), stamped);
        assert_eq!(deleted_at(&storage, "posts", 10), stamped);
        assert_eq!(deleted_at(&storage, "posts", 11), stamped);
        assert_eq!(deleted_at(&storage, "posts", 20), Some(Value::Null));
        assert_eq!(deleted_at(&storage, "comments", 100), stamped);
        assert_eq!(deleted_at(&storage, "comments", 103), stamped);
        assert_eq!(deleted_at(&storage, "comments", 101), Some(Value::Null));
        assert_eq!(deleted_at(&storage, "profiles", 300), Some(Value::Null));
        assert!(storage.row("attachments", &Value::Uint64(200)).is_none());
        assert!(storage.row("attachments", &Value::Uint64(201)).is_some());
    }

    #[test]
    fn test_should_set_null_on_children() {
        let mut storage = tests::seeded_storage();
        let manager = CascadeManager::new(DELETED_AT);
        let mut session = Session::new(&mut storage);
        let alice = load(&mut session, "users", 1);
        // loaded and clean: evicted by the bulk update
        let comment = load(&mut session, "comments", 101);

        manager
            .cascade(&mut session, &alice, NOW, &mut BTreeSet::new())
            .expect("should cascade");
        assert!(!session.is_loaded(&comment));
        session.commit().expect("should commit");
        drop(session);

        for id in [101u64, 103] {
            assert_eq!(
                storage
                    .row("comments", &Value::Uint64(id))
                    .and_then(|row| row.get("author_id")),
                Some(&Value::Null)
            );
        }
        // authored by Carol
        assert_eq!(
            storage
                .row("comments", &Value::Uint64(102))
                .and_then(|row| row.get("author_id")),
            Some(&Value::Uint64(3))
        );
    }

    #[test]
    fn test_should_unlink_association_rows() {
        let mut storage = tests::seeded_storage();
        let manager = CascadeManager::new(DELETED_AT);
        let mut session = Session::new(&mut storage);
        let alice = load(&mut session, "users", 1);

        manager
            .cascade(&mut session, &alice, NOW, &mut BTreeSet::new())
            .expect("should cascade");
        session.commit().expect("should commit");
        drop(session);

        let links = storage
            .rows("user_roles")
            .iter()
            .filter_map(|row| row.primary_key().cloned())
            .collect::<Vec<_>>();
        assert_eq!(links, vec![Value::Uint64(502)]);
        // peers are never touched
        assert_eq!(deleted_at(&storage, "roles", 1), Some(Value::Null));
        assert_eq!(deleted_at(&storage, "roles", 2), Some(Value::Null));
    }

    #[test]
    fn test_should_block_protected_delete() {
        let mut storage = tests::seeded_storage();
        let manager = CascadeManager::new(DELETED_AT);
        let mut session = Session::new(&mut storage);
        let bob = load(&mut session, "users", 2);

        let err = manager
            .cascade(&mut session, &bob, NOW, &mut BTreeSet::new())
            .expect_err("bob has invoices");
        assert!(matches!(
            err,
            SoftDelError::Cascade(CascadeError::Protected { table, relation, blocking_table })
                if table == "users" && relation == "invoices" && blocking_table == "invoices"
        ));
        // nothing was stamped before the check
        assert_eq!(
            session.entity(&bob).map(|entity| entity.state()),
            Some(EntityState::Clean)
        );
        assert!(session.queued().is_empty());
    }

    #[test]
    fn test_should_block_protected_delete_below_top_level() {
        let mut storage = tests::locked_storage();
        let manager = CascadeManager::new(DELETED_AT);
        let mut session = Session::new(&mut storage);
        let project = load(&mut session, "projects", 1);

        let mut visited = BTreeSet::new();
        let err = manager
            .cascade(&mut session, &project, NOW, &mut visited)
            .expect_err("task 11 is locked");
        assert!(matches!(
            err,
            SoftDelError::Cascade(CascadeError::Protected { table, relation, blocking_table })
                if table == "tasks" && relation == "locks" && blocking_table == "task_locks"
        ));

        // no entity of the walk was touched
        for key in [
            project.clone(),
            EntityKey::new("tasks", 10u64),
            EntityKey::new("tasks", 11u64),
        ] {
            let entity = session.entity(&key).expect("loaded by the walk");
            assert_eq!(entity.state(), EntityState::Clean, "{key} was modified");
            assert_eq!(entity.record().get(DELETED_AT), Some(&Value::Null));
        }
        assert!(session.queued().is_empty());
        assert!(visited.is_empty());
    }

    #[test]
    fn test_should_cascade_unprotected_project() {
        let mut storage = tests::locked_storage();
        let manager = CascadeManager::new(DELETED_AT);
        let mut session = Session::new(&mut storage);
        let project = load(&mut session, "projects", 2);

        let affected = manager
            .cascade(&mut session, &project, NOW, &mut BTreeSet::new())
            .expect("task 20 is not locked");
        assert_eq!(affected, vec![project, EntityKey::new("tasks", 20u64)]);
    }

    #[test]
    fn test_should_not_block_on_soft_deleted_protected_rows() {
        let mut storage = tests::seeded_storage();
        let mut invoice = storage
            .row("invoices", &Value::Uint64(400))
            .cloned()
            .expect("seeded invoice");
        invoice
            .set(DELETED_AT, Value::Timestamp(NOW - 1))
            .expect("known column");
        storage
            .apply(&[WriteOp::Update {
                primary_key: Value::Uint64(400),
                record: invoice,
            }])
            .expect("should update");

        let manager = CascadeManager::new(DELETED_AT);
        let mut session = Session::new(&mut storage);
        let bob = load(&mut session, "users", 2);
        let affected = manager
            .cascade(&mut session, &bob, NOW, &mut BTreeSet::new())
            .expect("invoice is already deleted");
        assert!(affected.contains(&bob));
    }

    #[test]
    fn test_should_terminate_on_cycles() {
        let mut storage = tests::seeded_storage();
        let manager = CascadeManager::new(DELETED_AT);
        let mut session = Session::new(&mut storage);
        let node = load(&mut session, "nodes_a", 1);

        let mut visited = BTreeSet::new();
        let affected = manager
            .cascade(&mut session, &node, NOW, &mut visited)
            .expect("should terminate");
        assert_eq!(
            affected,
            vec![EntityKey::new("nodes_a", 1u64), EntityKey::new("nodes_b", 1u64)]
        );
        assert_eq!(visited.len(), 2);

        // a second walk with the same visited set is a no-op
        assert!(
            manager
                .cascade(&mut session, &node, NOW, &mut visited)
                .expect("already visited")
                .is_empty()
        );
    }

    #[test]
    fn test_should_reject_delete_orphan_relations() {
        let manager = CascadeManager::new(DELETED_AT);
        let err = manager
            .check_relations(&tests::LEGACY_ACCOUNTS)
            .expect_err("delete orphan");
        assert!(matches!(
            err,
            CascadeError::InvalidConfiguration { relation, .. } if relation == "sessions"
        ));
        assert!(manager.check_relations(&tests::USERS).is_ok());
    }

    #[test]
    fn test_should_validate_catalog() {
        let manager = CascadeManager::new(DELETED_AT);
        assert!(manager.validate(&tests::catalog()).is_ok());

        assert!(matches!(
            manager.validate(&tests::legacy_catalog()),
            Err(SoftDelError::Cascade(CascadeError::InvalidConfiguration { .. }))
        ));
        assert!(matches!(
            manager.validate(&tests::strict_catalog()),
            Err(SoftDelError::Cascade(CascadeError::SetNullOnRequiredColumn { column, .. }))
                if column == "owner_id"
        ));
        assert!(matches!(
            CascadeManager::new("removed_on").validate(&tests::catalog()),
            Err(SoftDelError::Config(ConfigError::UnknownDeletionColumn(column)))
                if column == "removed_on"
        ));
    }

    #[test]
    fn test_should_require_loaded_entity() {
        let mut storage = tests::seeded_storage();
        let manager = CascadeManager::new(DELETED_AT);
        let mut session = Session::new(&mut storage);
        assert!(matches!(
            manager.cascade(
                &mut session,
                &EntityKey::new("users", 1u64),
                NOW,
                &mut BTreeSet::new()
            ),
            Err(SoftDelError::Session(SessionError::EntityNotLoaded(_)))
        ));
        assert!(matches!(
            manager.cascade(
                &mut session,
                &EntityKey::new("ghosts", 1u64),
                NOW,
                &mut BTreeSet::new()
            ),
            Err(SoftDelError::Storage(StorageError::TableNotFound(_)))
        ));
    }

    #[test]
    fn test_should_share_manager() {
        let manager = configure_cascade(DELETED_AT);
        assert_eq!(manager.column(), DELETED_AT);
        assert!(manager.is_soft_deletable(&tests::USERS));
        assert!(!manager.is_soft_deletable(&tests::USER_ROLES));
    }
}
