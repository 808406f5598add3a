use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Whether the original post is rewritten when expiring its silence failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Rewrite the post regardless of the expiration outcome.
    #[default]
    Always,
    /// Only rewrite the post once the backend confirmed the expiration.
    OnSuccess,
}

impl ReconcilePolicy {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "on_success" | "on-success" => ReconcilePolicy::OnSuccess,
            _ => ReconcilePolicy::Always,
        }
    }
}

pub const DEFAULT_POST_USERNAME: &str = "Alertmanager";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub mattermost: MattermostConfig,
    pub alert_config_path: PathBuf,
    #[serde(default)]
    pub reconcile: ReconcilePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
    /// Externally reachable base URL of this service, used in action buttons.
    pub public_url: String,
    /// Token Mattermost sends along with slash commands.
    pub command_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MattermostConfig {
    pub url: String,
    pub token: String,
    /// Display name shown on bot posts instead of the bot account name.
    pub post_username: Option<String>,
    pub post_icon_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let addr = std::env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let config = Config {
            server: ServerConfig {
                public_url: std::env::var("PUBLIC_URL")
                    .unwrap_or_else(|_| format!("http://{}", addr)),
                addr,
                command_token: std::env::var("SLASH_COMMAND_TOKEN")
                    .ok()
                    .filter(|t| !t.is_empty()),
            },
            mattermost: MattermostConfig {
                url: std::env::var("MATTERMOST_URL")
                    .unwrap_or_else(|_| "http://localhost:8065".to_string()),
                token: std::env::var("MATTERMOST_TOKEN").unwrap_or_default(),
                post_username: Some(
                    std::env::var("POST_USERNAME")
                        .unwrap_or_else(|_| DEFAULT_POST_USERNAME.to_string()),
                )
                .filter(|v| !v.is_empty()),
                post_icon_url: std::env::var("POST_ICON_URL")
                    .ok()
                    .filter(|v| !v.is_empty()),
            },
            alert_config_path: std::env::var("ALERT_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("alertmanagers.yaml")),
            reconcile: std::env::var("RECONCILE_POLICY")
                .map(|v| ReconcilePolicy::parse(&v))
                .unwrap_or_default(),
        };

        if config.mattermost.token.is_empty() {
            return Err(Error::Config(
                "MATTERMOST_TOKEN must be set to the bot access token".to_string(),
            ));
        }
        if config.server.command_token.is_none() {
            tracing::warn!("SLASH_COMMAND_TOKEN is not set. Slash commands will not be authenticated.");
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8080".to_string(),
                public_url: "http://localhost:8080".to_string(),
                command_token: None,
            },
            mattermost: MattermostConfig {
                url: "http://localhost:8065".to_string(),
                token: String::new(),
                post_username: Some(DEFAULT_POST_USERNAME.to_string()),
                post_icon_url: None,
            },
            alert_config_path: PathBuf::from("alertmanagers.yaml"),
            reconcile: ReconcilePolicy::default(),
        }
    }
}

/// Connection profile for one Alertmanager instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "alertmanagerurl")]
    pub alertmanager_url: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub token: String,
}

impl AlertConfig {
    pub fn validate(&self) -> Result<()> {
        if self.team.is_empty() {
            return Err(Error::Config(format!("alert config {}: must set a Team", self.id)));
        }
        if self.channel.is_empty() {
            return Err(Error::Config(format!("alert config {}: must set a Channel", self.id)));
        }
        if self.token.is_empty() {
            return Err(Error::Config(format!("alert config {}: must set a Token", self.id)));
        }
        if self.alertmanager_url.is_empty() {
            return Err(Error::Config(format!(
                "alert config {}: must set the AlertManager URL",
                self.id
            )));
        }
        url::Url::parse(&self.alertmanager_url).map_err(|e| {
            Error::Config(format!(
                "alert config {}: invalid AlertManager URL {:?}: {}",
                self.id, self.alertmanager_url, e
            ))
        })?;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

#[derive(Debug, Default, Deserialize)]
struct AlertConfigFile {
    #[serde(default)]
    alertmanagers: BTreeMap<String, AlertConfig>,
}

/// Parse the Alertmanager configuration file. Map keys become config IDs.
pub fn parse_alert_configs(contents: &str) -> Result<Vec<AlertConfig>> {
    let file: AlertConfigFile = serde_yaml::from_str(contents)?;
    Ok(file
        .alertmanagers
        .into_iter()
        .map(|(id, mut config)| {
            config.id = id;
            config
        })
        .collect())
}

pub fn load_alert_configs(path: &Path) -> Result<Vec<AlertConfig>> {
    let contents = std::fs::read_to_string(path)?;
    parse_alert_configs(&contents)
}
