//! Business logic services.

pub mod account;
pub mod comment;
pub mod follow;
pub mod mailer;
pub mod post;
pub mod role;

pub use account::{
    AccountService, AdminUpdateProfileInput, RegisterInput, UpdateProfileInput, gravatar_hash,
};
pub use comment::{CommentInput, CommentService};
pub use follow::FollowService;
pub use mailer::MailerService;
pub use post::{PostInput, PostService};
pub use role::RoleService;
