//! Comment repository.

use std::sync::Arc;

use crate::entities::{Comment, User, comment, user};
use crate::repositories::Paged;
use iblog_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Select, SelectTwo,
};

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a comment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a comment by ID, failing when absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<comment::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::CommentNotFound(id.to_string()))
    }

    /// Create a new comment.
    pub async fn create(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update an existing comment.
    pub async fn update(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a comment.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let comment = self.find_by_id(id).await?;
        if let Some(c) = comment {
            c.delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }

    /// Count comments on a post.
    pub async fn count_for_post(&self, post_id: &str) -> AppResult<u64> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Page of a post's comments in conversation order, oldest first.
    pub async fn page_for_post(
        &self,
        post_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<comment::Model>> {
        let query = Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::CreatedAt);
        self.paginate(query, page, per_page).await
    }

    /// Page of all comments for moderation, newest first.
    pub async fn page_all(&self, page: u64, per_page: u64) -> AppResult<Paged<comment::Model>> {
        let query = Comment::find().order_by_desc(comment::Column::CreatedAt);
        self.paginate(query, page, per_page).await
    }

    /// Page of a post's comments with their authors, oldest first.
    pub async fn page_for_post_with_authors(
        &self,
        post_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<(comment::Model, Option<user::Model>)>> {
        let query = Comment::find()
            .find_also_related(User)
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::CreatedAt);
        self.paginate_with_authors(query, page, per_page).await
    }

    /// Page of all comments with their authors, newest first.
    pub async fn page_all_with_authors(
        &self,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<(comment::Model, Option<user::Model>)>> {
        let query = Comment::find()
            .find_also_related(User)
            .order_by_desc(comment::Column::CreatedAt);
        self.paginate_with_authors(query, page, per_page).await
    }

    async fn paginate_with_authors(
        &self,
        query: SelectTwo<Comment, User>,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<(comment::Model, Option<user::Model>)>> {
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

    async fn paginate(
        &self,
        query: Select<Comment>,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<comment::Model>> {
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
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_comment(id: &str, post_id: &str, body: &str) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            body: body.to_string(),
            body_html: format!("<p>{body}</p>"),
            created_at: Utc::now().into(),
            disabled: false,
            author_id: "u1".to_string(),
            post_id: post_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_found() {
        let comment = create_test_comment("c1", "p1", "nice post");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[comment.clone()]])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let found = repo.get_by_id("c1").await.unwrap();
        assert_eq!(found.post_id, "p1");
        assert!(!found.disabled);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<comment::Model>::new()])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let result = repo.get_by_id("missing").await;
        match result {
            Err(AppError::CommentNotFound(id)) => assert_eq!(id, "missing"),
            _ => panic!("Expected CommentNotFound error"),
        }
    }

    #[tokio::test]
    async fn test_page_for_post_returns_items_and_total() {
        let comments = vec![
            create_test_comment("c1", "p1", "first"),
            create_test_comment("c2", "p1", "second"),
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(2))
                }]])
                .append_query_results([comments.clone()])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let paged = repo.page_for_post("p1", 1, 30).await.unwrap();
        assert_eq!(paged.total, 2);
        assert_eq!(paged.items[0].id, "c1");
    }

    #[tokio::test]
    async fn test_count_for_post() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(7))
                }]])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        assert_eq!(repo.count_for_post("p1").await.unwrap(), 7);
    }
}
