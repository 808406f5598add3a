use reqwest::{Method, StatusCode};
use tracing::info;
use url::Url;

use super::{endpoint, types::Silence, AlertmanagerClient};
use crate::{Error, Result};

impl AlertmanagerClient {
    /// List silences, most recently ending first.
    pub async fn list_silences(&self, alertmanager_url: &str) -> Result<Vec<Silence>> {
        let mut silences: Vec<Silence> = self
            .get_json(&endpoint(alertmanager_url, "/api/v2/silences"))
            .await?;
        sort_by_end_desc(&mut silences);
        Ok(silences)
    }

    /// Expire the silence `silence_id`.
    ///
    /// Expiring an already expired silence is up to the backend; callers
    /// should not treat a failure on a repeated call as fatal.
    pub async fn expire_silence(&self, silence_id: &str, alertmanager_url: &str) -> Result<()> {
        let url = silence_url(alertmanager_url, silence_id)?;
        let response = self.http.request(Method::DELETE, url.as_str()).await?;

        if response.status != StatusCode::OK {
            return Err(Error::BackendStatus {
                status: response.status.as_u16(),
                body: response.text(),
            });
        }

        info!("Expired silence {} on {}", silence_id, alertmanager_url);
        Ok(())
    }
}

/// `DELETE` target for one silence. The ID is a single percent-encoded path
/// segment, so it cannot address any other endpoint.
pub fn silence_url(alertmanager_url: &str, silence_id: &str) -> Result<Url> {
    if silence_id.is_empty() {
        return Err(Error::InvalidArgument(
            "silence ID cannot be empty".to_string(),
        ));
    }
    if silence_id == "." || silence_id == ".." {
        return Err(Error::InvalidArgument(format!(
            "invalid silence ID {:?}",
            silence_id
        )));
    }

    let mut url = Url::parse(alertmanager_url)
        .map_err(|e| Error::Config(format!("invalid Alertmanager URL {}: {}", alertmanager_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("Alertmanager URL {} cannot be a base", alertmanager_url)))?
        .pop_if_empty()
        .extend(["api", "v2", "silence", silence_id]);
    Ok(url)
}

/// Sort by `ends_at` descending; silences without an end sort last.
pub fn sort_by_end_desc(silences: &mut [Silence]) {
    silences.sort_by(|a, b| b.ends_at.cmp(&a.ends_at));
}
