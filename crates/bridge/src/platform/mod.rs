//! Message platform
//!
//! The bridge only needs a handful of platform operations. They sit behind
//! [`MessagePlatform`] so handlers can be exercised without a live server.

mod mattermost;
mod model;

pub use mattermost::MattermostClient;
pub use model::{Action, ActionIntegration, Attachment, Field, Post, User};

use async_trait::async_trait;

use crate::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePlatform: Send + Sync {
    /// The account the bridge posts as.
    async fn current_user(&self) -> Result<User>;
    async fn get_user(&self, user_id: &str) -> Result<User>;

    async fn create_post(&self, post: Post) -> Result<Post>;
    async fn get_post(&self, post_id: &str) -> Result<Post>;
    async fn update_post(&self, post: Post) -> Result<Post>;

    /// Look up `channel` in `team`, creating it as an open channel if missing.
    /// Returns the channel ID.
    async fn ensure_channel(&self, team: &str, channel: &str) -> Result<String>;
}
