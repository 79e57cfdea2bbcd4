//! Role service.

use iblog_common::{AppError, AppResult, IdGenerator};
use iblog_db::{
    entities::{Permission, role},
    repositories::RoleRepository,
};
use sea_orm::Set;

/// The three built-in roles and their permission sets.
const BUILTIN_ROLES: [(&str, i32, bool); 3] = [
    (
        "User",
        Permission::FOLLOW | Permission::COMMENT | Permission::WRITE,
        true,
    ),
    (
        "Moderator",
        Permission::FOLLOW | Permission::COMMENT | Permission::WRITE | Permission::MODERATE,
        false,
    ),
    (
        "Administrator",
        Permission::FOLLOW
            | Permission::COMMENT
            | Permission::WRITE
            | Permission::MODERATE
            | Permission::ADMIN,
        false,
    ),
];

/// Role service for business logic.
#[derive(Clone)]
pub struct RoleService {
    role_repo: RoleRepository,
    id_gen: IdGenerator,
}

impl RoleService {
    /// Create a new role service.
    #[must_use]
    pub fn new(role_repo: RoleRepository) -> Self {
        Self {
            role_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create or refresh the built-in roles.
    ///
    /// Safe to run at every startup: existing roles keep their IDs and
    /// have their permission sets and default flag rewritten, so adding
    /// a permission to a built-in role takes effect on upgrade.
    pub async fn insert_roles(&self) -> AppResult<()> {
        for (name, permissions, is_default) in BUILTIN_ROLES {
            match self.role_repo.find_by_name(name).await? {
                Some(existing) => {
                    let model = role::ActiveModel {
                        id: Set(existing.id),
                        name: Set(existing.name),
                        is_default: Set(is_default),
                        permissions: Set(permissions),
                    };
                    self.role_repo.update(model).await?;
                }
                None => {
                    let model = role::ActiveModel {
                        id: Set(self.id_gen.generate()),
                        name: Set(name.to_string()),
                        is_default: Set(is_default),
                        permissions: Set(permissions),
                    };
                    self.role_repo.create(model).await?;
                }
            }
            tracing::debug!(role = name, "Ensured built-in role");
        }
        Ok(())
    }

    /// Get the default role assigned at registration.
    pub async fn default_role(&self) -> AppResult<role::Model> {
        self.role_repo
            .find_default()
            .await?
            .ok_or_else(|| AppError::Internal("No default role configured".to_string()))
    }

    /// Find a role by name.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<role::Model>> {
        self.role_repo.find_by_name(name).await
    }

    /// Get a role by ID.
    pub async fn get_by_id(&self, id: &str) -> AppResult<role::Model> {
        self.role_repo.get_by_id(id).await
    }

    /// List all roles.
    pub async fn all(&self) -> AppResult<Vec<role::Model>> {
        self.role_repo.all().await
    }
}
