//! Post service.

use chrono::Utc;
use iblog_common::{AppError, AppResult, IdGenerator};
use iblog_db::{
    entities::{Permission, post, role, user},
    repositories::{Paged, PostRepository},
};
use iblog_markdown::render_post;
use sea_orm::{IntoActiveModel, Set};
use serde::Deserialize;
use validator::Validate;

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    id_gen: IdGenerator,
}

/// Input for creating or editing a post.
#[derive(Debug, Deserialize, Validate)]
pub struct PostInput {
    #[validate(length(min = 1, max = 65536))]
    pub body: String,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub fn new(post_repo: PostRepository) -> Self {
        Self {
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Publish a new post. Requires the `WRITE` permission.
    ///
    /// The Markdown body is rendered and sanitized once at write time;
    /// readers only ever see the stored HTML.
    pub async fn create(
        &self,
        author_id: &str,
        author_role: &role::Model,
        input: PostInput,
    ) -> AppResult<post::Model> {
        if !author_role.has_permission(Permission::WRITE) {
            return Err(AppError::Forbidden);
        }
        input.validate()?;
        if input.body.trim().is_empty() {
            return Err(AppError::BadRequest("Post body cannot be empty".to_string()));
        }

        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            body_html: Set(render_post(&input.body)),
            body: Set(input.body),
            created_at: Set(Utc::now().fixed_offset()),
            author_id: Set(author_id.to_string()),
        };
        self.post_repo.create(model).await
    }

    /// Edit a post's body. Allowed for the author and administrators.
    pub async fn update(
        &self,
        post_id: &str,
        editor_id: &str,
        editor_role: &role::Model,
        input: PostInput,
    ) -> AppResult<post::Model> {
        let post = self.post_repo.get_by_id(post_id).await?;
        if post.author_id != editor_id && !editor_role.has_permission(Permission::ADMIN) {
            return Err(AppError::Forbidden);
        }
        input.validate()?;
        if input.body.trim().is_empty() {
            return Err(AppError::BadRequest("Post body cannot be empty".to_string()));
        }

        let mut model = post.into_active_model();
        model.body_html = Set(render_post(&input.body));
        model.body = Set(input.body);
        self.post_repo.update(model).await
    }

    /// Get a post by ID, failing when absent.
    pub async fn get_by_id(&self, post_id: &str) -> AppResult<post::Model> {
        self.post_repo.get_by_id(post_id).await
    }

    /// Page of all posts, newest first.
    pub async fn timeline(&self, page: u64, per_page: u64) -> AppResult<Paged<post::Model>> {
        self.post_repo.page_all(page, per_page).await
    }

    /// Page of one author's posts, newest first.
    pub async fn by_author(
        &self,
        author_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<post::Model>> {
        self.post_repo.page_by_author(author_id, page, per_page).await
    }

    /// Page of posts from followed authors, newest first. The user's
    /// own posts are included via the self-follow edge.
    pub async fn followed_timeline(
        &self,
        user_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<post::Model>> {
        self.post_repo.page_followed(user_id, page, per_page).await
    }

    /// Timeline with each post's author resolved, for the HTML pages.
    pub async fn timeline_with_authors(
        &self,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<(post::Model, Option<user::Model>)>> {
        self.post_repo.page_all_with_authors(page, per_page).await
    }

    /// Followed timeline with each post's author resolved.
    pub async fn followed_timeline_with_authors(
        &self,
        user_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<(post::Model, Option<user::Model>)>> {
        self.post_repo
            .page_followed_with_authors(user_id, page, per_page)
            .await
    }

    /// Number of posts by an author.
    pub async fn count_by_author(&self, author_id: &str) -> AppResult<u64> {
        self.post_repo.count_by_author(author_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn role_with(permissions: i32) -> role::Model {
        role::Model {
            id: "r1".to_string(),
            name: "Test".to_string(),
            is_default: false,
            permissions,
        }
    }

    fn test_post(id: &str, author_id: &str) -> post::Model {
        post::Model {
            id: id.to_string(),
            body: "hello".to_string(),
            body_html: "<p>hello</p>".to_string(),
            created_at: Utc::now().into(),
            author_id: author_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_without_write_permission() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = PostService::new(PostRepository::new(db));

        let result = service
            .create(
                "u1",
                &role_with(Permission::FOLLOW | Permission::COMMENT),
                PostInput {
                    body: "hello".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_body() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = PostService::new(PostRepository::new(db));

        let result = service
            .create(
                "u1",
                &role_with(Permission::WRITE),
                PostInput {
                    body: "   \n  ".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_update_by_non_author_without_admin() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_post("p1", "u1")]])
                .into_connection(),
        );
        let service = PostService::new(PostRepository::new(db));

        let result = service
            .update(
                "p1",
                "u2",
                &role_with(Permission::WRITE),
                PostInput {
                    body: "edited".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_update_by_admin_who_is_not_author() {
        let edited = post::Model {
            body: "edited".to_string(),
            body_html: "<p>edited</p>".to_string(),
            ..test_post("p1", "u1")
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_post("p1", "u1")]])
                .append_query_results([[edited]])
                .into_connection(),
        );
        let service = PostService::new(PostRepository::new(db));

        let updated = service
            .update(
                "p1",
                "admin",
                &role_with(Permission::WRITE | Permission::ADMIN),
                PostInput {
                    body: "edited".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.body_html, "<p>edited</p>");
    }
}
