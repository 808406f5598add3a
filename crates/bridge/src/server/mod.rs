mod actions;
mod commands;
mod routes;
mod webhook;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    alertmanager::AlertmanagerClient,
    config::ReconcilePolicy,
    platform::{Attachment, MessagePlatform, Post},
    registry::ConfigurationRegistry,
    Result,
};

pub use actions::{reconcile_attachments, rewrite_post, ActionCallback, ActionContext};
pub use commands::{dispatch, CommandRequest, CommandResponse};

/// Per-process settings the handlers need besides the registry.
#[derive(Debug, Clone, Default)]
pub struct BridgeSettings {
    pub bot_user_id: String,
    /// Base URL Mattermost uses to reach this service for action callbacks.
    pub public_url: String,
    pub command_token: Option<String>,
    pub reconcile: ReconcilePolicy,
    /// `override_username` / `override_icon_url` for bot posts.
    pub post_username: Option<String>,
    pub post_icon_url: Option<String>,
}

pub struct AppState {
    pub registry: Arc<ConfigurationRegistry>,
    pub alertmanager: AlertmanagerClient,
    pub platform: Arc<dyn MessagePlatform>,
    pub settings: BridgeSettings,
}

impl AppState {
    /// A post authored by the bot carrying `attachments`.
    fn bot_post(&self, channel_id: &str, attachments: Vec<Attachment>) -> Post {
        let mut post = Post::new(channel_id, self.settings.bot_user_id.as_str());
        post.add_prop("from_webhook", "true");
        if let Some(username) = &self.settings.post_username {
            post.add_prop("override_username", username.as_str());
        }
        if let Some(icon_url) = &self.settings.post_icon_url {
            post.add_prop("override_icon_url", icon_url.as_str());
        }
        post.set_attachments(attachments);
        post
    }
}

pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub fn build_router(self) -> Router {
        Router::new()
            .route("/", get(routes::root))
            .route("/metrics", get(routes::metrics))
            .route("/api/webhook", post(webhook::handle_webhook))
            .route("/api/expire", post(actions::handle_expire_action))
            .route("/api/command", post(commands::handle_command))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(self.state)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockMessagePlatform;

    fn state(post_username: Option<&str>, post_icon_url: Option<&str>) -> AppState {
        AppState {
            registry: Arc::new(ConfigurationRegistry::default()),
            alertmanager: AlertmanagerClient::default(),
            platform: Arc::new(MockMessagePlatform::new()),
            settings: BridgeSettings {
                bot_user_id: "bot".to_string(),
                post_username: post_username.map(str::to_string),
                post_icon_url: post_icon_url.map(str::to_string),
                ..Default::default()
            },
        }
    }

    #[test]
    fn bot_posts_carry_display_overrides() {
        let post = state(Some("Alertmanager"), Some("http://icons/am.png"))
            .bot_post("chan-1", vec![Attachment::default()]);
        assert_eq!(post.user_id, "bot");
        assert_eq!(post.props["from_webhook"], "true");
        assert_eq!(post.props["override_username"], "Alertmanager");
        assert_eq!(post.props["override_icon_url"], "http://icons/am.png");
    }

    #[test]
    fn unset_overrides_are_left_out() {
        let post = state(None, None).bot_post("chan-1", vec![]);
        assert!(!post.props.contains_key("override_username"));
        assert!(!post.props.contains_key("override_icon_url"));
    }
}
