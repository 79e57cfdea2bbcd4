//! Role entity and the permission bitmask.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Permission flags.
///
/// Each flag is an independent bit; a role's `permissions` column is
/// the bitwise OR of its granted flags. Higher roles are supersets of
/// lower ones by convention, not by enforced hierarchy.
pub struct Permission;

impl Permission {
    /// Follow other users.
    pub const FOLLOW: i32 = 0x01;
    /// Comment on posts.
    pub const COMMENT: i32 = 0x02;
    /// Write posts.
    pub const WRITE: i32 = 0x04;
    /// Moderate comments.
    pub const MODERATE: i32 = 0x08;
    /// Full administrative access.
    pub const ADMIN: i32 = 0x10;
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "role")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub name: String,

    /// Exactly one role is the default assigned at registration.
    pub is_default: bool,

    /// Bitwise OR of granted [`Permission`] flags.
    pub permissions: i32,
}

impl Model {
    /// Whether this role holds every bit of `perm`.
    #[must_use]
    pub const fn has_permission(&self, perm: i32) -> bool {
        self.permissions & perm == perm
    }

    /// Grant a flag. Adding a flag already present is a no-op.
    pub const fn add_permission(&mut self, perm: i32) {
        self.permissions |= perm;
    }

    /// Revoke a flag. Removing an absent flag is a no-op.
    pub const fn remove_permission(&mut self, perm: i32) {
        self.permissions &= !perm;
    }

    /// Clear all flags.
    pub const fn reset_permissions(&mut self) {
        self.permissions = 0;
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user::Entity")]
    Users,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(permissions: i32) -> Model {
        Model {
            id: "r1".to_string(),
            name: "Test".to_string(),
            is_default: false,
            permissions,
        }
    }

    #[test]
    fn test_add_then_has() {
        let mut r = role(0);
        r.add_permission(Permission::FOLLOW);
        assert!(r.has_permission(Permission::FOLLOW));
        assert!(!r.has_permission(Permission::ADMIN));
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut r = role(0);
        r.add_permission(Permission::WRITE);
        r.add_permission(Permission::WRITE);
        assert_eq!(r.permissions, Permission::WRITE);
    }

    #[test]
    fn test_remove_after_add() {
        let mut r = role(0);
        r.add_permission(Permission::MODERATE);
        r.remove_permission(Permission::MODERATE);
        assert!(!r.has_permission(Permission::MODERATE));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut r = role(Permission::FOLLOW);
        r.remove_permission(Permission::ADMIN);
        assert_eq!(r.permissions, Permission::FOLLOW);
    }

    #[test]
    fn test_combined_flags() {
        let mut r = role(0);
        r.add_permission(Permission::FOLLOW | Permission::COMMENT | Permission::WRITE);
        assert!(r.has_permission(Permission::FOLLOW));
        assert!(r.has_permission(Permission::COMMENT | Permission::WRITE));
        assert!(!r.has_permission(Permission::COMMENT | Permission::ADMIN));
    }

    #[test]
    fn test_reset_clears_all() {
        let mut r = role(Permission::FOLLOW | Permission::ADMIN);
        r.reset_permissions();
        assert_eq!(r.permissions, 0);
    }
}
