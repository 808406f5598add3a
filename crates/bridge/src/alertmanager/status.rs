use super::{endpoint, types::StatusResponse, AlertmanagerClient};
use crate::Result;

impl AlertmanagerClient {
    /// Fetch version and uptime of the Alertmanager at `alertmanager_url`.
    pub async fn status(&self, alertmanager_url: &str) -> Result<StatusResponse> {
        self.get_json(&endpoint(alertmanager_url, "/api/v2/status"))
            .await
    }
}
