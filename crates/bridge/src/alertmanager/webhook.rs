use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::is_zero_time;

// AlertManager webhook payload structures
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub alerts: Vec<WebhookAlert>,
    #[serde(rename = "groupLabels", default)]
    pub group_labels: HashMap<String, String>,
    #[serde(rename = "commonLabels", default)]
    pub common_labels: HashMap<String, String>,
    #[serde(rename = "commonAnnotations", default)]
    pub common_annotations: HashMap<String, String>,
    #[serde(rename = "externalURL", default)]
    pub external_url: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "groupKey", default)]
    pub group_key: String,
    #[serde(rename = "truncatedAlerts", default)]
    pub truncated_alerts: u64,
}

impl WebhookMessage {
    /// True for `{}` and other payloads that carry nothing to render.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
            && self.status.is_empty()
            && self.alerts.is_empty()
            && self.group_labels.is_empty()
            && self.common_labels.is_empty()
            && self.common_annotations.is_empty()
            && self.external_url.is_empty()
            && self.version.is_empty()
            && self.group_key.is_empty()
            && self.truncated_alerts == 0
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookAlert {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(rename = "startsAt")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "endsAt")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL", default)]
    pub generator_url: String,
    #[serde(default)]
    pub fingerprint: String,
}

impl WebhookAlert {
    pub fn is_resolved(&self) -> bool {
        self.status == "resolved"
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ends_at.filter(|ts| !is_zero_time(ts))
    }
}
