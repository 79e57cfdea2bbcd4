//! Repositories exposing typed query methods over the entities.

mod comment;
mod follow;
mod post;
mod role;
mod user;

pub use comment::CommentRepository;
pub use follow::FollowRepository;
pub use post::PostRepository;
pub use role::RoleRepository;
pub use user::UserRepository;

/// One page of results together with the total row count.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    /// Items on this page (empty when the page is out of range).
    pub items: Vec<T>,
    /// Total number of matching rows across all pages.
    pub total: u64,
}
