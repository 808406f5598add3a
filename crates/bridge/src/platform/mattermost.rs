use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{MessagePlatform, Post, User};
use crate::{Error, Result};

/// Mattermost REST API v4 client authenticated with a bot access token.
///
/// Platform calls are not retried; only Alertmanager calls are.
#[derive(Debug, Clone)]
pub struct MattermostClient {
    base_url: String,
    token: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Serialize)]
struct NewChannel<'a> {
    team_id: &'a str,
    name: &'a str,
    display_name: &'a str,
    #[serde(rename = "type")]
    channel_type: &'a str,
}

impl MattermostClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v4{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.token)
    }

    async fn send<T: DeserializeOwned>(&self, what: &str, builder: RequestBuilder) -> Result<T> {
        let response = self.authed(builder).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Platform(format!("{} failed with {}: {}", what, status, body)));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl MessagePlatform for MattermostClient {
    async fn current_user(&self) -> Result<User> {
        self.send("get current user", self.client.get(self.url("/users/me")))
            .await
    }

    async fn get_user(&self, user_id: &str) -> Result<User> {
        let url = self.url(&format!("/users/{}", user_id));
        self.send("get user", self.client.get(url)).await
    }

    async fn create_post(&self, post: Post) -> Result<Post> {
        debug!("Creating post in channel {}", post.channel_id);
        self.send("create post", self.client.post(self.url("/posts")).json(&post))
            .await
    }

    async fn get_post(&self, post_id: &str) -> Result<Post> {
        let url = self.url(&format!("/posts/{}", post_id));
        self.send("get post", self.client.get(url)).await
    }

    async fn update_post(&self, post: Post) -> Result<Post> {
        let url = self.url(&format!("/posts/{}", post.id));
        self.send("update post", self.client.put(url).json(&post))
            .await
    }

    async fn ensure_channel(&self, team: &str, channel: &str) -> Result<String> {
        let team_url = self.url(&format!("/teams/name/{}", team));
        let team: IdOnly = self.send("get team", self.client.get(team_url)).await?;

        let channel_url = self.url(&format!("/teams/{}/channels/name/{}", team.id, channel));
        match self
            .send::<IdOnly>("get channel", self.client.get(channel_url))
            .await
        {
            Ok(existing) => Ok(existing.id),
            Err(Error::NotFound(_)) => {
                let body = NewChannel {
                    team_id: &team.id,
                    name: channel,
                    display_name: channel,
                    channel_type: "O",
                };
                let created: IdOnly = self
                    .send("create channel", self.client.post(self.url("/channels")).json(&body))
                    .await?;
                info!("Created alert channel {} ({})", channel, created.id);
                Ok(created.id)
            }
            Err(e) => Err(e),
        }
    }
}
