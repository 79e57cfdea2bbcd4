//! Follow repository.

use std::sync::Arc;

use crate::entities::{Follow, follow, user};
use crate::repositories::Paged;
use iblog_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, JoinType,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};

/// Follow repository for database operations.
#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    /// Create a new follow repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a follow edge by its (follower, followed) pair.
    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        followed_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FollowedId.eq(followed_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check whether a follow edge exists.
    pub async fn is_following(&self, follower_id: &str, followed_id: &str) -> AppResult<bool> {
        Ok(self.find_by_pair(follower_id, followed_id).await?.is_some())
    }

    /// Create a new follow edge.
    pub async fn create(&self, model: follow::ActiveModel) -> AppResult<follow::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a follow edge by pair, a no-op when absent.
    pub async fn delete_by_pair(&self, follower_id: &str, followed_id: &str) -> AppResult<()> {
        let edge = self.find_by_pair(follower_id, followed_id).await?;
        if let Some(f) = edge {
            f.delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }

    /// Delete every edge referencing a user, in both directions.
    ///
    /// The schema cascades these on user deletion; this exists for
    /// callers removing a user's graph without deleting the row.
    pub async fn delete_all_for_user(&self, user_id: &str) -> AppResult<u64> {
        let result = Follow::delete_many()
            .filter(
                Condition::any()
                    .add(follow::Column::FollowerId.eq(user_id))
                    .add(follow::Column::FollowedId.eq(user_id)),
            )
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Count users following `user_id` (includes the self-follow).
    pub async fn count_followers(&self, user_id: &str) -> AppResult<u64> {
        Follow::find()
            .filter(follow::Column::FollowedId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count users `user_id` is following (includes the self-follow).
    pub async fn count_following(&self, user_id: &str) -> AppResult<u64> {
        Follow::find()
            .filter(follow::Column::FollowerId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Page of users following `user_id`, most recent first.
    pub async fn page_followers(
        &self,
        user_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<user::Model>> {
        let query = user::Entity::find()
            .join_rev(JoinType::InnerJoin, follow::Relation::Follower.def())
            .filter(follow::Column::FollowedId.eq(user_id))
            .order_by_desc(follow::Column::CreatedAt);

        let paginator = query.paginate(self.db.as_ref(), per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Paged { items, total })
    }

    /// Page of users `user_id` is following, most recent first.
    pub async fn page_following(
        &self,
        user_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<user::Model>> {
        let query = user::Entity::find()
            .join_rev(JoinType::InnerJoin, follow::Relation::Followed.def())
            .filter(follow::Column::FollowerId.eq(user_id))
            .order_by_desc(follow::Column::CreatedAt);

        let paginator = query.paginate(self.db.as_ref(), per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Paged { items, total })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_follow(follower_id: &str, followed_id: &str) -> follow::Model {
        follow::Model {
            follower_id: follower_id.to_string(),
            followed_id: followed_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_pair_found() {
        let edge = create_test_follow("user1", "user2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[edge.clone()]])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        let result = repo.find_by_pair("user1", "user2").await.unwrap();

        assert!(result.is_some());
        let found = result.unwrap();
        assert_eq!(found.follower_id, "user1");
        assert_eq!(found.followed_id, "user2");
    }

    #[tokio::test]
    async fn test_find_by_pair_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<follow::Model>::new()])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        assert!(repo.find_by_pair("user1", "user3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_is_following_true() {
        let edge = create_test_follow("user1", "user2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[edge]])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        assert!(repo.is_following("user1", "user2").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_following_false() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<follow::Model>::new()])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        assert!(!repo.is_following("user1", "user3").await.unwrap());
    }

    #[tokio::test]
    async fn test_self_follow_is_an_ordinary_edge() {
        let edge = create_test_follow("user1", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[edge]])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        assert!(repo.is_following("user1", "user1").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_by_pair_absent_is_noop() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<follow::Model>::new()])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        repo.delete_by_pair("user1", "user3").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_all_for_user_removes_both_directions() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 3,
                }])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        let removed = repo.delete_all_for_user("user2").await.unwrap();
        assert_eq!(removed, 3);
    }
}
