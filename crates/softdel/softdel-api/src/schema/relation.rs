use super::OnDelete;

/// Cardinality and join columns of a relationship.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationKind {
    /// This table holds `local_column`, pointing at the target's primary key.
    BelongsTo { local_column: &'static str },
    /// At most one row of the target points at this table through `foreign_column`.
    HasOne { foreign_column: &'static str },
    /// Any number of rows of the target point at this table through `foreign_column`.
    HasMany { foreign_column: &'static str },
    /// Rows are linked through the `association` table, where `local_column` points at
    /// this table and `remote_column` at the target.
    ManyToMany {
        association: &'static str,
        local_column: &'static str,
        remote_column: &'static str,
    },
}

/// Defines a relationship from a table to a target table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelationDef {
    /// Name of the relationship (e.g., "posts").
    pub name: &'static str,
    /// Name of the target table.
    pub target: &'static str,
    pub kind: RelationKind,
    /// Explicit on-delete policy tag, if any.
    pub on_delete: Option<OnDelete>,
    /// Whether the persistence engine itself hard-deletes orphans of this relationship.
    pub delete_orphan: bool,
}

impl RelationDef {
    /// Creates an untagged relationship.
    pub const fn new(name: &'static str, target: &'static str, kind: RelationKind) -> Self {
        Self {
            name,
            target,
            kind,
            on_delete: None,
            delete_orphan: false,
        }
    }

    /// Tags the relationship with an on-delete policy.
    pub const fn on_delete(self, policy: OnDelete) -> Self {
        Self {
            on_delete: Some(policy),
            ..self
        }
    }

    /// Enables the engine native delete-orphan cascade on this relationship.
    pub const fn delete_orphan(self) -> Self {
        Self {
            delete_orphan: true,
            ..self
        }
    }

    /// Returns the effective on-delete policy.
    pub const fn policy(&self) -> OnDelete {
        match self.on_delete {
            Some(policy) => policy,
            None => OnDelete::default_for(&self.kind),
        }
    }
}
