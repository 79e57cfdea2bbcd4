//! Role repository.

use std::sync::Arc;

use crate::entities::{Role, role};
use iblog_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

/// Role repository for database operations.
#[derive(Clone)]
pub struct RoleRepository {
    db: Arc<DatabaseConnection>,
}

impl RoleRepository {
    /// Create a new role repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a role by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<role::Model>> {
        Role::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a role by ID, failing when absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<role::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role {id}")))
    }

    /// Find a role by its unique name.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<role::Model>> {
        Role::find()
            .filter(role::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the default role assigned at registration.
    pub async fn find_default(&self) -> AppResult<Option<role::Model>> {
        Role::find()
            .filter(role::Column::IsDefault.eq(true))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List all roles.
    pub async fn all(&self) -> AppResult<Vec<role::Model>> {
        Role::find()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new role.
    pub async fn create(&self, model: role::ActiveModel) -> AppResult<role::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update an existing role.
    pub async fn update(&self, model: role::ActiveModel) -> AppResult<role::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::Permission;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_role(id: &str, name: &str, is_default: bool, permissions: i32) -> role::Model {
        role::Model {
            id: id.to_string(),
            name: name.to_string(),
            is_default,
            permissions,
        }
    }

    #[tokio::test]
    async fn test_find_by_name_found() {
        let role = create_test_role(
            "r1",
            "User",
            true,
            Permission::FOLLOW | Permission::COMMENT | Permission::WRITE,
        );

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[role.clone()]])
                .into_connection(),
        );

        let repo = RoleRepository::new(db);
        let found = repo.find_by_name("User").await.unwrap().unwrap();

        assert_eq!(found.id, "r1");
        assert!(found.is_default);
        assert!(found.has_permission(Permission::WRITE));
        assert!(!found.has_permission(Permission::ADMIN));
    }

    #[tokio::test]
    async fn test_find_by_name_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<role::Model>::new()])
                .into_connection(),
        );

        let repo = RoleRepository::new(db);
        assert!(repo.find_by_name("Missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_default() {
        let role = create_test_role("r1", "User", true, Permission::FOLLOW);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[role]])
                .into_connection(),
        );

        let repo = RoleRepository::new(db);
        let found = repo.find_default().await.unwrap().unwrap();
        assert_eq!(found.name, "User");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<role::Model>::new()])
                .into_connection(),
        );

        let repo = RoleRepository::new(db);
        let result = repo.get_by_id("missing").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
