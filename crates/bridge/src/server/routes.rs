use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Deserialize;

use super::AppState;
use crate::{config::AlertConfig, metrics, Error};

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

pub async fn root() -> &'static str {
    "Mattermost Alertmanager Bridge"
}

pub async fn metrics() -> String {
    metrics::gather_metrics()
}

/// Same response for missing and wrong tokens.
pub fn invalid_token() -> Response {
    (StatusCode::BAD_REQUEST, Error::Auth.to_string()).into_response()
}

/// Copy out the config owning the query token, if any.
pub async fn resolve_token(state: &AppState, query: &TokenQuery) -> Option<AlertConfig> {
    let token = query.token.as_deref().unwrap_or("");
    state.registry.resolve(token).await
}
