//! Database entities.

pub mod comment;
pub mod follow;
pub mod post;
pub mod role;
pub mod user;

pub use comment::Entity as Comment;
pub use follow::Entity as Follow;
pub use post::Entity as Post;
pub use role::Entity as Role;
pub use role::Permission;
pub use user::Entity as User;
