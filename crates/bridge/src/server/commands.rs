//! `/alertmanager` slash command.

use axum::{
    extract::{Form, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use super::{routes::invalid_token, AppState};
use crate::{
    alertmanager::SilenceState,
    config::AlertConfig,
    format, metrics,
    platform::Attachment,
    registry::tokens_match,
    Result,
};

const HELP_TEXT: &str = "run:
\t/alertmanager alerts - to list the existing alerts
\t/alertmanager silences - to list the existing silences
\t/alertmanager expire_silence <CONFIG_ID> <SILENCE_ID> - to expire the specified silence
\t/alertmanager status - to list the version and uptime of the Alertmanager instances
\t/alertmanager help - to get this help
";

/// Form fields Mattermost sends for a slash command.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub response_type: String,
    pub text: String,
}

impl CommandResponse {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: "ephemeral".to_string(),
            text: text.into(),
        }
    }

    pub fn in_channel(text: impl Into<String>) -> Self {
        Self {
            response_type: "in_channel".to_string(),
            text: text.into(),
        }
    }
}

/// `POST /api/command`
pub async fn handle_command(
    State(state): State<Arc<AppState>>,
    Form(request): Form<CommandRequest>,
) -> Response {
    if let Some(expected) = &state.settings.command_token {
        if !tokens_match(&request.token, expected) {
            return invalid_token();
        }
    }
    Json(dispatch(&state, &request).await).into_response()
}

pub async fn dispatch(state: &AppState, request: &CommandRequest) -> CommandResponse {
    let mut words = request.text.split_whitespace();
    let Some(action) = words.next() else {
        return CommandResponse::ephemeral(
            "Missing command, please run `/alertmanager help` to check all commands available.",
        );
    };
    debug!("Dispatching /alertmanager {} for user {}", action, request.user_id);

    match action {
        "alerts" => list_alerts(state, request).await,
        "silences" => list_silences(state, request).await,
        "status" => status(state, request).await,
        "expire_silence" => {
            let params: Vec<&str> = words.collect();
            expire_silence(state, &params).await
        }
        _ => CommandResponse::ephemeral(HELP_TEXT),
    }
}

/// Post one message per backend with attachments, collecting every error.
async fn publish(
    state: &AppState,
    channel_id: &str,
    what: &str,
    results: Vec<(AlertConfig, Result<Vec<Attachment>>)>,
    nothing_found: &str,
) -> CommandResponse {
    let mut errors = Vec::new();
    let mut posted = 0;

    for (config, result) in results {
        let attachments = match result {
            Ok(attachments) => attachments,
            Err(e) => {
                errors.push(format!("failed to get {} from {}: {}", what, config.id, e));
                continue;
            }
        };
        if attachments.is_empty() {
            continue;
        }

        let post = state.bot_post(channel_id, attachments);
        match state.platform.create_post(post).await {
            Ok(_) => {
                posted += 1;
                metrics::POSTS_TOTAL
                    .with_label_values(&["create", "success"])
                    .inc();
            }
            Err(e) => {
                error!("Failed to post {} for {}: {}", what, config.id, e);
                metrics::POSTS_TOTAL
                    .with_label_values(&["create", "failure"])
                    .inc();
                errors.push(format!("Error creating the {} post for {}", what, config.id));
            }
        }
    }

    if !errors.is_empty() {
        return CommandResponse::ephemeral(errors.join("\n"));
    }
    if posted == 0 {
        return CommandResponse::ephemeral(nothing_found);
    }
    CommandResponse::ephemeral("")
}

async fn list_alerts(state: &AppState, request: &CommandRequest) -> CommandResponse {
    let configs = state.registry.configs().await;
    let fetched = join_all(
        configs
            .iter()
            .map(|c| state.alertmanager.list_alerts(&c.alertmanager_url)),
    )
    .await;

    let now = Utc::now();
    let results: Vec<_> = configs
        .into_iter()
        .zip(fetched)
        .map(|(config, result)| {
            let attachments = result.map(|alerts| {
                alerts
                    .iter()
                    .map(|alert| format::alert_attachment(&config, alert, now))
                    .collect()
            });
            (config, attachments)
        })
        .collect();

    publish(state, &request.channel_id, "alerts", results, "No alerts right now! :tada:").await
}

async fn list_silences(state: &AppState, request: &CommandRequest) -> CommandResponse {
    let configs = state.registry.configs().await;
    let fetched = join_all(
        configs
            .iter()
            .map(|c| state.alertmanager.list_silences(&c.alertmanager_url)),
    )
    .await;

    let now = Utc::now();
    let results: Vec<_> = configs
        .into_iter()
        .zip(fetched)
        .map(|(config, result)| {
            let callback_url = expire_url(&state.settings.public_url, &config.token);
            let attachments = result.map(|silences| {
                silences
                    .iter()
                    .filter(|s| s.status.state != SilenceState::Expired)
                    .map(|s| {
                        format::silence_attachment(&config, s, &callback_url, &request.user_id, now)
                    })
                    .collect()
            });
            (config, attachments)
        })
        .collect();

    publish(
        state,
        &request.channel_id,
        "silences",
        results,
        "No active or pending silences right now.",
    )
    .await
}

async fn status(state: &AppState, request: &CommandRequest) -> CommandResponse {
    let configs = state.registry.configs().await;
    let fetched = join_all(
        configs
            .iter()
            .map(|c| state.alertmanager.status(&c.alertmanager_url)),
    )
    .await;

    let now = Utc::now();
    let results: Vec<_> = configs
        .into_iter()
        .zip(fetched)
        .map(|(config, result)| {
            let attachments =
                result.map(|status| vec![format::status_attachment(&config, &status, now)]);
            (config, attachments)
        })
        .collect();

    publish(
        state,
        &request.channel_id,
        "status",
        results,
        "No Alertmanager instances are configured.",
    )
    .await
}

async fn expire_silence(state: &AppState, params: &[&str]) -> CommandResponse {
    let [config_id, silence_id] = params else {
        return CommandResponse::ephemeral(
            "Usage: /alertmanager expire_silence <CONFIG_ID> <SILENCE_ID>",
        );
    };

    let Some(config) = state.registry.get(config_id).await else {
        return CommandResponse::ephemeral(format!(
            "Alertmanager configuration {} not found",
            config_id
        ));
    };

    match state
        .alertmanager
        .expire_silence(silence_id, &config.alertmanager_url)
        .await
    {
        Ok(()) => {
            metrics::SILENCES_EXPIRED_TOTAL
                .with_label_values(&["success"])
                .inc();
            CommandResponse::in_channel(format!("Silence {} expired.", silence_id))
        }
        Err(e) => {
            metrics::SILENCES_EXPIRED_TOTAL
                .with_label_values(&["failure"])
                .inc();
            CommandResponse::in_channel(format!("failed to expire the silence: {}", e))
        }
    }
}

/// Callback URL for the expire button of silences from one config.
pub fn expire_url(public_url: &str, token: &str) -> String {
    let token: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
    format!("{}/api/expire?token={}", public_url.trim_end_matches('/'), token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expire_url_escapes_token() {
        assert_eq!(
            expire_url("http://bridge:8080/", "a+b/c"),
            "http://bridge:8080/api/expire?token=a%2Bb%2Fc"
        );
    }

    #[test]
    fn response_constructors() {
        assert_eq!(CommandResponse::ephemeral("x").response_type, "ephemeral");
        assert_eq!(CommandResponse::in_channel("x").response_type, "in_channel");
    }
}
