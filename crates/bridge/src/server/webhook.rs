use axum::{
    body::Bytes,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use http::StatusCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{
    routes::{invalid_token, resolve_token, TokenQuery},
    AppState,
};
use crate::{alertmanager::WebhookMessage, format, metrics};

/// `POST /api/webhook?token=...`
///
/// Only a bad token or payload is reported to the caller. Posting is fire and
/// forget: failures are logged and the notification is still acknowledged.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
    body: Bytes,
) -> Response {
    let Some(config) = resolve_token(&state, &query).await else {
        metrics::WEBHOOKS_RECEIVED_TOTAL
            .with_label_values(&["rejected"])
            .inc();
        return invalid_token();
    };

    info!("Received alertmanager notification for {}", config.id);

    let message: WebhookMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            error!("Failed to decode webhook message for {}: {}", config.id, e);
            metrics::WEBHOOKS_RECEIVED_TOTAL
                .with_label_values(&["decode_failed"])
                .inc();
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    if message.is_empty() {
        metrics::WEBHOOKS_RECEIVED_TOTAL
            .with_label_values(&["decode_failed"])
            .inc();
        return StatusCode::BAD_REQUEST.into_response();
    }

    let Some(channel_id) = state.registry.channel_id(&config.id).await else {
        warn!("No channel provisioned for alert config {}, dropping notification", config.id);
        metrics::WEBHOOKS_RECEIVED_TOTAL
            .with_label_values(&["no_channel"])
            .inc();
        return StatusCode::OK.into_response();
    };

    let attachment = format::webhook_attachment(&config, &message, Utc::now());
    let post = state.bot_post(&channel_id, vec![attachment]);

    match state.platform.create_post(post).await {
        Ok(_) => {
            metrics::WEBHOOKS_RECEIVED_TOTAL
                .with_label_values(&["posted"])
                .inc();
            metrics::POSTS_TOTAL
                .with_label_values(&["create", "success"])
                .inc();
        }
        Err(e) => {
            error!("Failed to post notification for {}: {}", config.id, e);
            metrics::WEBHOOKS_RECEIVED_TOTAL
                .with_label_values(&["post_failed"])
                .inc();
            metrics::POSTS_TOTAL
                .with_label_values(&["create", "failure"])
                .inc();
        }
    }

    StatusCode::OK.into_response()
}
