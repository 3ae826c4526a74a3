use serde::{Deserialize, Serialize};

use super::RelationKind;

/// Policy applied to a relationship when the owning entity is soft-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnDelete {
    /// Recursively soft-delete the related entities.
    CascadeDelete,
    /// Null the child-side foreign key and invalidate loaded children.
    SetNull,
    /// Abort the whole operation if any related row exists.
    Protect,
    /// Remove only the association rows of a many-to-many relationship.
    Unlink,
    /// No propagation.
    DoNothing,
}

impl OnDelete {
    /// Policy used for a relationship which carries no explicit tag.
    pub const fn default_for(kind: &RelationKind) -> Self {
        match kind {
            RelationKind::ManyToMany { .. } => OnDelete::Unlink,
            RelationKind::BelongsTo { .. }
            | RelationKind::HasOne { .. }
            | RelationKind::HasMany { .. } => OnDelete::DoNothing,
        }
    }
}
