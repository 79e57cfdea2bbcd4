//! Follow service.

use chrono::Utc;
use iblog_common::{AppError, AppResult};
use iblog_db::{
    entities::{follow, user},
    repositories::{FollowRepository, Paged, UserRepository},
};
use sea_orm::Set;

/// Follow service for business logic.
#[derive(Clone)]
pub struct FollowService {
    follow_repo: FollowRepository,
    user_repo: UserRepository,
}

impl FollowService {
    /// Create a new follow service.
    #[must_use]
    pub const fn new(follow_repo: FollowRepository, user_repo: UserRepository) -> Self {
        Self {
            follow_repo,
            user_repo,
        }
    }

    /// Follow a user. Following someone already followed is a no-op.
    pub async fn follow(&self, follower_id: &str, followed_id: &str) -> AppResult<()> {
        // Fails with UserNotFound when the target does not exist.
        self.user_repo.get_by_id(followed_id).await?;

        if self.follow_repo.is_following(follower_id, followed_id).await? {
            return Ok(());
        }

        let model = follow::ActiveModel {
            follower_id: Set(follower_id.to_string()),
            followed_id: Set(followed_id.to_string()),
            created_at: Set(Utc::now().fixed_offset()),
        };
        self.follow_repo.create(model).await?;
        Ok(())
    }

    /// Unfollow a user. Unfollowing someone not followed is a no-op.
    ///
    /// The self-follow edge cannot be removed; it keeps the user's own
    /// posts in their followed timeline.
    pub async fn unfollow(&self, follower_id: &str, followed_id: &str) -> AppResult<()> {
        if follower_id == followed_id {
            return Err(AppError::BadRequest(
                "Cannot unfollow yourself".to_string(),
            ));
        }

        self.user_repo.get_by_id(followed_id).await?;
        self.follow_repo
            .delete_by_pair(follower_id, followed_id)
            .await
    }

    /// Check whether `follower_id` follows `followed_id`.
    ///
    /// Unknown users are simply not followed by anyone.
    pub async fn is_following(&self, follower_id: &str, followed_id: &str) -> AppResult<bool> {
        self.follow_repo.is_following(follower_id, followed_id).await
    }

    /// Check whether `user_id` is followed by `other_id`.
    pub async fn is_followed_by(&self, user_id: &str, other_id: &str) -> AppResult<bool> {
        self.follow_repo.is_following(other_id, user_id).await
    }

    /// Page of a user's followers.
    pub async fn followers(
        &self,
        user_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<user::Model>> {
        self.follow_repo
            .page_followers(user_id, page, per_page)
            .await
    }

    /// Page of the users a user follows.
    pub async fn following(
        &self,
        user_id: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<Paged<user::Model>> {
        self.follow_repo
            .page_following(user_id, page, per_page)
            .await
    }

    /// Number of followers, the self-follow included.
    pub async fn follower_count(&self, user_id: &str) -> AppResult<u64> {
        self.follow_repo.count_followers(user_id).await
    }

    /// Number of followed users, the self-follow included.
    pub async fn following_count(&self, user_id: &str) -> AppResult<u64> {
        self.follow_repo.count_following(user_id).await
    }
}
