//! Comment service.

use chrono::Utc;
use iblog_common::{AppError, AppResult, IdGenerator};
use iblog_db::{
    entities::{Permission, comment, role, user},
    repositories::{CommentRepository, Paged, PostRepository},
};
use iblog_markdown::render_comment;
use sea_orm::{IntoActiveModel, Set};
use serde::Deserialize;
use validator::Validate;

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    post_repo: PostRepository,
    id_gen: IdGenerator,
}

/// Input for writing a comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(length(min = 1, max = 8192))]
    pub body: String,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub fn new(comment_repo: CommentRepository, post_repo: PostRepository) -> Self {
        Self {
            comment_repo,
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Comment on a post. Requires the `COMMENT` permission.
    pub async fn create(
        &self,
        post_id: &str,
        author_id: &str,
        author_role: &role::Model,
        input: CommentInput,
    ) -> AppResult<comment::Model> {
        if !author_role.has_permission(Permission::COMMENT) {
            return Err(AppError::Forbidden);
        }
        input.validate()?;
        if input.body.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Comment body cannot be empty".to_string(),
            ));
        }

        // Fails with PostNotFound when the post does not exist.
        self.post_repo.get_by_id(post_id).await?;

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            body_html: Set(render_comment(&input.body)),
            body: Set(input.body),
            created_at: Set(Utc::now().fixed_offset()),
            disabled: Set(false),
            author_id: Set(author_id.to_string()),
            post_id: Set(post_id.to_string()),
        };
        self.comment_repo.create(model).await
    }

    /// Get a comment by ID, failing when absent.
    pub async fn get_by_id(&self, comment_id: &str) -> AppResult<comment::Model> {
        self.comment_repo.get_by_id(comment_id).await
    }

    /// Page of a post's comments, oldest first.
    ///
    /// Disabled comments stay in the listing; the presentation layer
    /// replaces their body with a moderation notice.
    pub async fn for_post(
        &self,
        post_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<comment::Model>> {
        self.comment_repo.page_for_post(post_id, page, per_page).await
    }

    /// Page of all comments across every post, newest first.
    pub async fn latest(&self, page: u64, per_page: u64) -> AppResult<Paged<comment::Model>> {
        self.comment_repo.page_all(page, per_page).await
    }

    /// Page of all comments for the moderation queue, newest first.
    /// Requires the `MODERATE` permission.
    pub async fn moderation_queue(
        &self,
        moderator_role: &role::Model,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<comment::Model>> {
        if !moderator_role.has_permission(Permission::MODERATE) {
            return Err(AppError::Forbidden);
        }
        self.comment_repo.page_all(page, per_page).await
    }

    /// Enable or disable a comment. Requires the `MODERATE` permission.
    pub async fn set_disabled(
        &self,
        comment_id: &str,
        disabled: bool,
        moderator_role: &role::Model,
    ) -> AppResult<comment::Model> {
        if !moderator_role.has_permission(Permission::MODERATE) {
            return Err(AppError::Forbidden);
        }

        let comment = self.comment_repo.get_by_id(comment_id).await?;
        let mut model = comment.into_active_model();
        model.disabled = Set(disabled);
        self.comment_repo.update(model).await
    }

    /// A post's comments with their authors resolved, oldest first.
    pub async fn for_post_with_authors(
        &self,
        post_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<(comment::Model, Option<user::Model>)>> {
        self.comment_repo
            .page_for_post_with_authors(post_id, page, per_page)
            .await
    }

    /// Moderation queue with authors resolved. Requires `MODERATE`.
    pub async fn moderation_queue_with_authors(
        &self,
        moderator_role: &role::Model,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<(comment::Model, Option<user::Model>)>> {
        if !moderator_role.has_permission(Permission::MODERATE) {
            return Err(AppError::Forbidden);
        }
        self.comment_repo.page_all_with_authors(page, per_page).await
    }

    /// Number of comments on a post.
    pub async fn count_for_post(&self, post_id: &str) -> AppResult<u64> {
        self.comment_repo.count_for_post(post_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use iblog_db::entities::post;
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

    fn test_comment(id: &str, disabled: bool) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            body: "nice".to_string(),
            body_html: "nice".to_string(),
            created_at: Utc::now().into(),
            disabled,
            author_id: "u1".to_string(),
            post_id: "p1".to_string(),
        }
    }

    fn service(comment_db_results: Vec<Vec<comment::Model>>) -> CommentService {
        let mut mock = MockDatabase::new(DatabaseBackend::Postgres);
        for rows in comment_db_results {
            mock = mock.append_query_results([rows]);
        }
        let comment_db = Arc::new(mock.into_connection());
        let post_db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        CommentService::new(
            CommentRepository::new(comment_db),
            PostRepository::new(post_db),
        )
    }

    #[tokio::test]
    async fn test_create_without_comment_permission() {
        let svc = service(vec![]);
        let result = svc
            .create(
                "p1",
                "u1",
                &role_with(Permission::FOLLOW),
                CommentInput {
                    body: "hi".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_create_on_missing_post() {
        let comment_db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );
        let svc = CommentService::new(
            CommentRepository::new(comment_db),
            PostRepository::new(post_db),
        );

        let result = svc
            .create(
                "missing",
                "u1",
                &role_with(Permission::COMMENT),
                CommentInput {
                    body: "hi".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::PostNotFound(_))));
    }

    #[tokio::test]
    async fn test_moderation_queue_requires_permission() {
        let svc = service(vec![]);
        let result = svc
            .moderation_queue(&role_with(Permission::COMMENT), 1, 30)
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_set_disabled_requires_permission() {
        let svc = service(vec![]);
        let result = svc
            .set_disabled("c1", true, &role_with(Permission::COMMENT))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_set_disabled_updates_flag() {
        let svc = service(vec![
            vec![test_comment("c1", false)],
            vec![test_comment("c1", true)],
        ]);
        let updated = svc
            .set_disabled("c1", true, &role_with(Permission::MODERATE))
            .await
            .unwrap();
        assert!(updated.disabled);
    }
}
