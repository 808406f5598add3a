use tracing::debug;

use super::{endpoint, types::Alert, AlertmanagerClient};
use crate::Result;

impl AlertmanagerClient {
    /// List the alerts currently known to the Alertmanager at `alertmanager_url`.
    pub async fn list_alerts(&self, alertmanager_url: &str) -> Result<Vec<Alert>> {
        let alerts: Vec<Alert> = self
            .get_json(&endpoint(alertmanager_url, "/api/v2/alerts"))
            .await?;
        debug!("Fetched {} alerts from {}", alerts.len(), alertmanager_url);
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alertmanager::BackoffPolicy;
    use crate::Error;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn client() -> AlertmanagerClient {
        AlertmanagerClient::new(BackoffPolicy {
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(20),
            max_elapsed_time: Duration::from_millis(100),
            randomization_factor: 0.0,
            ..BackoffPolicy::default()
        })
    }

    #[tokio::test]
    async fn empty_array_is_not_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/alerts");
                then.status(200).body("[]");
            })
            .await;

        let alerts = client().list_alerts(&server.base_url()).await.unwrap();
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn decodes_alert_list() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/alerts");
                then.status(200).body(
                    r#"[{"labels": {"alertname": "DiskFull"}, "annotations": {},
                        "startsAt": "2024-05-01T10:00:00Z", "endsAt": "2999-01-01T00:00:00Z",
                        "status": {"state": "active"}}]"#,
                );
            })
            .await;

        let alerts = client().list_alerts(&server.base_url()).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].name(), "DiskFull");
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/alerts");
                then.status(200).body("{not json");
            })
            .await;

        let err = client().list_alerts(&server.base_url()).await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        mock.assert_hits_async(1).await;
    }
}
