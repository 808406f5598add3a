//! Alertmanager API v2 client
//!
//! Each operation goes through the [`BackoffClient`] and owns the JSON
//! contract of its endpoint.

mod alerts;
pub mod retry;
mod silences;
mod status;
pub mod types;
pub mod webhook;

pub use retry::{BackendResponse, BackoffClient, BackoffPolicy};
pub use types::{
    resolved, Alert, AlertStatus, Matcher, Silence, SilenceState, StatusResponse, VersionInfo,
};
pub use webhook::{WebhookAlert, WebhookMessage};

use serde::de::DeserializeOwned;

use crate::Result;

#[derive(Debug, Clone, Default)]
pub struct AlertmanagerClient {
    http: BackoffClient,
}

impl AlertmanagerClient {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            http: BackoffClient::new(policy),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http.request(reqwest::Method::GET, url).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }
}

/// Join an endpoint path onto a configured base URL.
fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        assert_eq!(
            endpoint("http://am:9093/", "/api/v2/alerts"),
            "http://am:9093/api/v2/alerts"
        );
        assert_eq!(
            endpoint("http://am:9093", "/api/v2/alerts"),
            "http://am:9093/api/v2/alerts"
        );
    }
}
