//! Post repository.

use std::sync::Arc;

use crate::entities::{Post, User, follow, post, user};
use crate::repositories::Paged;
use iblog_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, SelectTwo,
};

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a post by ID, failing when absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update an existing post.
    pub async fn update(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a post. Its comments go with it via the cascading key.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let post = self.find_by_id(id).await?;
        if let Some(p) = post {
            p.delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }

    /// Count all posts.
    pub async fn count(&self) -> AppResult<u64> {
        Post::find()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count posts by an author.
    pub async fn count_by_author(&self, author_id: &str) -> AppResult<u64> {
        Post::find()
            .filter(post::Column::AuthorId.eq(author_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Page of all posts, newest first.
    pub async fn page_all(&self, page: u64, per_page: u64) -> AppResult<Paged<post::Model>> {
        let query = Post::find().order_by_desc(post::Column::CreatedAt);
        self.paginate(query, page, per_page).await
    }

    /// Page of an author's posts, newest first.
    pub async fn page_by_author(
        &self,
        author_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<post::Model>> {
        let query = Post::find()
            .filter(post::Column::AuthorId.eq(author_id))
            .order_by_desc(post::Column::CreatedAt);
        self.paginate(query, page, per_page).await
    }

    /// Page of posts authored by users `user_id` follows, newest first.
    ///
    /// The self-follow edge makes the user's own posts appear here.
    pub async fn page_followed(
        &self,
        user_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<post::Model>> {
        let query = Post::find()
            .join_rev(
                JoinType::InnerJoin,
                follow::Entity::belongs_to(post::Entity)
                    .from(follow::Column::FollowedId)
                    .to(post::Column::AuthorId)
                    .into(),
            )
            .filter(follow::Column::FollowerId.eq(user_id))
            .order_by_desc(post::Column::CreatedAt);
        self.paginate(query, page, per_page).await
    }

    /// Page of all posts with their authors, newest first.
    pub async fn page_all_with_authors(
        &self,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<(post::Model, Option<user::Model>)>> {
        let query = Post::find()
            .find_also_related(User)
            .order_by_desc(post::Column::CreatedAt);
        self.paginate_with_authors(query, page, per_page).await
    }

    /// Page of followed authors' posts with their authors, newest first.
    pub async fn page_followed_with_authors(
        &self,
        user_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<(post::Model, Option<user::Model>)>> {
        let query = Post::find()
            .find_also_related(User)
            .join_rev(
                JoinType::InnerJoin,
                follow::Entity::belongs_to(post::Entity)
                    .from(follow::Column::FollowedId)
                    .to(post::Column::AuthorId)
                    .into(),
            )
            .filter(follow::Column::FollowerId.eq(user_id))
            .order_by_desc(post::Column::CreatedAt);
        self.paginate_with_authors(query, page, per_page).await
    }

    async fn paginate_with_authors(
        &self,
        query: SelectTwo<Post, User>,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<(post::Model, Option<user::Model>)>> {
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
        query: Select<Post>,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<post::Model>> {
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
