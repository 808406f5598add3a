use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Alert lifecycle as shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Firing => "firing",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertState {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub silenced_by: Vec<String>,
    #[serde(default)]
    pub inhibited_by: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Receiver {
    pub name: String,
}

/// An alert as returned by `GET /api/v2/alerts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL", default)]
    pub generator_url: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub receivers: Vec<Receiver>,
    #[serde(default)]
    pub status: AlertState,
}

impl Alert {
    pub fn name(&self) -> &str {
        self.labels.get("alertname").map(String::as_str).unwrap_or("")
    }

    /// Resolved once `endsAt` is set and no longer in the future.
    pub fn resolved(&self) -> bool {
        self.resolved_at(Utc::now())
    }

    pub fn resolved_at(&self, now: DateTime<Utc>) -> bool {
        match self.ends_at {
            Some(ends_at) if !is_zero_time(&ends_at) => ends_at <= now,
            _ => false,
        }
    }

    pub fn status(&self) -> AlertStatus {
        if self.resolved() {
            AlertStatus::Resolved
        } else {
            AlertStatus::Firing
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SilenceState {
    Pending,
    Active,
    Expired,
}

impl fmt::Display for SilenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SilenceState::Pending => "pending",
            SilenceState::Active => "active",
            SilenceState::Expired => "expired",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilenceStatus {
    pub state: SilenceState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matcher {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default = "default_true")]
    pub is_equal: bool,
}

fn default_true() -> bool {
    true
}

/// A silence as returned by `GET /api/v2/silences`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Silence {
    pub id: String,
    #[serde(default)]
    pub matchers: Vec<Matcher>,
    pub status: SilenceStatus,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created_by: String,
}

impl Silence {
    /// Alert name targeted by the silence, if it has an `alertname` matcher.
    pub fn alert_name(&self) -> Option<&str> {
        self.matchers
            .iter()
            .find(|m| m.name == "alertname")
            .map(|m| m.value.as_str())
    }
}

/// `false` while `ends_at` is unset, otherwise `true` once it is not after `now`.
pub fn resolved(silence: &Silence) -> bool {
    resolved_at(silence, Utc::now())
}

pub fn resolved_at(silence: &Silence, now: DateTime<Utc>) -> bool {
    match silence.ends_at {
        Some(ends_at) if !is_zero_time(&ends_at) => ends_at <= now,
        _ => false,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub build_date: String,
    #[serde(default)]
    pub build_user: String,
    #[serde(default)]
    pub go_version: String,
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub version: String,
}

/// Response of `GET /api/v2/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub uptime: DateTime<Utc>,
    #[serde(default)]
    pub version_info: VersionInfo,
}

/// Go encodes unset timestamps as `0001-01-01T00:00:00Z`.
pub fn is_zero_time(ts: &DateTime<Utc>) -> bool {
    ts.timestamp() <= ZERO_TIME_SECS
}

const ZERO_TIME_SECS: i64 = -62_135_596_800;
