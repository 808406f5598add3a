//! Message formatting
//!
//! Turns Alertmanager objects into Mattermost attachments.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::alertmanager::{
    types::resolved_at, Alert, AlertStatus, Silence, SilenceState, StatusResponse, WebhookAlert,
    WebhookMessage,
};
use crate::config::AlertConfig;
use crate::platform::{Action, ActionIntegration, Attachment, Field};

pub const COLOR_FIRING: &str = "#FF0000";
pub const COLOR_RESOLVED: &str = "#008000";
pub const COLOR_EXPIRED: &str = "#F0F8FF";
pub const COLOR_SILENCE_ACTIVE: &str = "#008000";
pub const COLOR_SILENCE_INACTIVE: &str = "#808080";

/// Label added to every rendered alert naming the config it came through.
pub const CONFIG_ID_LABEL: &str = "AlertManagerConfigId";

pub fn color_for(status: &str) -> &'static str {
    match status {
        "firing" => COLOR_FIRING,
        "resolved" => COLOR_RESOLVED,
        _ => COLOR_EXPIRED,
    }
}

/// Upper-case the first letter of every word, leaving the rest alone.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start && c.is_alphanumeric() {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.push(c);
            if c.is_whitespace() {
                at_word_start = true;
            }
        }
    }
    out
}

/// Human readable duration keeping the `limit` largest non-zero units,
/// e.g. `2 hours 5 minutes`.
pub fn humanize(duration: chrono::Duration, limit: usize) -> String {
    const UNITS: [(&str, i64); 5] = [
        ("week", 7 * 24 * 3600),
        ("day", 24 * 3600),
        ("hour", 3600),
        ("minute", 60),
        ("second", 1),
    ];

    let mut remaining = duration.num_seconds().abs();
    let mut parts = Vec::new();
    for (name, secs) in UNITS {
        let count = remaining / secs;
        remaining %= secs;
        if count > 0 {
            let plural = if count == 1 { "" } else { "s" };
            parts.push(format!("{} {}{}", count, name, plural));
        }
    }
    if parts.is_empty() {
        return "0 seconds".to_string();
    }
    parts.truncate(limit.max(1));
    parts.join(" ")
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S UTC").to_string()
}

fn sorted_entries(map: &HashMap<String, String>) -> Vec<(&String, &String)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort();
    entries
}

fn bold_lines(entries: &[(&String, &String)]) -> String {
    entries
        .iter()
        .map(|(k, v)| format!("**{}:** {}\n", title_case(k), v))
        .collect()
}

/// Two fields per webhook alert: a status banner with annotations and
/// timing, then the labels tagged with the config ID.
pub fn webhook_alert_fields(
    config: &AlertConfig,
    alert: &WebhookAlert,
    external_url: &str,
    receiver: &str,
    now: DateTime<Utc>,
) -> Vec<Field> {
    let upper = alert.status.to_uppercase();
    let status_title = if alert.status == "firing" {
        format!(":fire: {} :fire:", upper)
    } else {
        upper
    };

    let mut msg = bold_lines(&sorted_entries(&alert.annotations));
    msg.push_str(" \n");
    if let Some(starts_at) = alert.starts_at {
        msg.push_str(&format!(
            "**Started at:** {} ({} ago)\n",
            format_timestamp(&starts_at),
            humanize(now - starts_at, 2)
        ));
    }
    if alert.is_resolved() {
        if let Some(ends_at) = alert.ended_at() {
            msg.push_str(&format!(
                "**Ended at:** {} ({} ago)\n",
                format_timestamp(&ends_at),
                humanize(now - ends_at, 2)
            ));
        }
    }
    msg.push_str(" \n");
    msg.push_str(&format!(
        "Generated by a [Prometheus Alert]({}) and sent to the [Alertmanager]({}) '{}' receiver.",
        alert.generator_url, external_url, receiver
    ));

    let mut labels = alert.labels.clone();
    labels.insert(CONFIG_ID_LABEL.to_string(), config.id.clone());
    let labels_msg = bold_lines(&sorted_entries(&labels));

    vec![
        Field::new(status_title, msg, true),
        Field::new("", labels_msg, true),
    ]
}

pub fn webhook_attachment(config: &AlertConfig, message: &WebhookMessage, now: DateTime<Utc>) -> Attachment {
    let fields = message
        .alerts
        .iter()
        .flat_map(|alert| {
            webhook_alert_fields(config, alert, &message.external_url, &message.receiver, now)
        })
        .collect();

    Attachment {
        fields,
        color: color_for(&message.status).to_string(),
        ..Default::default()
    }
}

/// Attachment for one alert in the `alerts` command listing.
pub fn alert_attachment(config: &AlertConfig, alert: &Alert, now: DateTime<Utc>) -> Attachment {
    let status = if alert.resolved_at(now) {
        AlertStatus::Resolved
    } else {
        AlertStatus::Firing
    };

    let mut fields = vec![Field::new("Status", status.as_str(), false)];
    for (k, v) in sorted_entries(&alert.annotations) {
        fields.push(Field::new(title_case(k), v.as_str(), true));
    }
    for (k, v) in sorted_entries(&alert.labels) {
        fields.push(Field::new(title_case(k), v.as_str(), true));
    }
    if let Some(starts_at) = alert.starts_at {
        fields.push(Field::new(
            "Started at",
            format!("{} ({} ago)", format_timestamp(&starts_at), humanize(now - starts_at, 2)),
            false,
        ));
    }
    if status == AlertStatus::Resolved {
        if let Some(ends_at) = alert.ends_at {
            fields.push(Field::new("Ended at", format_timestamp(&ends_at), false));
        }
    }
    fields.push(Field::new("Alertmanager", config.id.as_str(), false));

    Attachment {
        title: alert.name().to_string(),
        title_link: alert.generator_url.clone(),
        fields,
        color: color_for(status.as_str()).to_string(),
        ..Default::default()
    }
}

/// Action ID of the expire button for `silence_id`. Mattermost resolves a
/// click by action ID within the post, so every button in a listing needs
/// its own.
pub fn expire_action_id(silence_id: &str) -> String {
    let suffix: String = silence_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    format!("expire{}", suffix)
}

/// Attachment for a silence with an "Expire Silence" button posting back to
/// `expire_url`.
pub fn silence_attachment(
    config: &AlertConfig,
    silence: &Silence,
    expire_url: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> Attachment {
    let mut fields = Vec::new();
    if let Some(name) = silence.alert_name() {
        fields.push(Field::new("Alert Name", name, false));
    }
    let matchers: Vec<String> = silence
        .matchers
        .iter()
        .filter(|m| m.name != "alertname")
        .map(|m| {
            let op = match (m.is_equal, m.is_regex) {
                (true, false) => "=",
                (false, false) => "!=",
                (true, true) => "=~",
                (false, true) => "!~",
            };
            format!("{}{}\"{}\"", m.name, op, m.value)
        })
        .collect();
    fields.push(Field::new("State", silence.status.state.to_string(), false));
    fields.push(Field::new("Matchers", matchers.join(" "), false));

    if resolved_at(silence, now) {
        if let (Some(starts_at), Some(ends_at)) = (silence.starts_at, silence.ends_at) {
            fields.push(Field::new(
                "",
                format!(
                    "**Ended**: {} ago\n**Duration**: {}",
                    humanize(now - ends_at, 2),
                    humanize(ends_at - starts_at, 2)
                ),
                false,
            ));
        }
    } else {
        let mut timing = String::new();
        if let Some(starts_at) = silence.starts_at {
            timing.push_str(&format!("**Started**: {} ago\n", humanize(now - starts_at, 2)));
        }
        if let Some(ends_at) = silence.ends_at {
            timing.push_str(&format!("**Ends**: in {}\n", humanize(ends_at - now, 2)));
        }
        fields.push(Field::new("🔕", timing, false));
    }
    fields.push(Field::new("Comments", silence.comment.as_str(), false));
    fields.push(Field::new("Created by", silence.created_by.as_str(), false));
    fields.push(Field::new("Alertmanager", config.id.as_str(), false));

    let color = if silence.status.state == SilenceState::Active {
        COLOR_SILENCE_ACTIVE
    } else {
        COLOR_SILENCE_INACTIVE
    };

    let mut context = Map::new();
    context.insert("action".to_string(), Value::from("expire"));
    context.insert("silence_id".to_string(), Value::from(silence.id.as_str()));
    context.insert("user_id".to_string(), Value::from(user_id));

    Attachment {
        title: silence.id.clone(),
        fields,
        color: color.to_string(),
        actions: Some(vec![Action {
            id: expire_action_id(&silence.id),
            name: "Expire Silence".to_string(),
            action_type: "button".to_string(),
            integration: Some(ActionIntegration {
                url: expire_url.to_string(),
                context,
            }),
        }]),
        ..Default::default()
    }
}

pub fn status_attachment(config: &AlertConfig, status: &StatusResponse, now: DateTime<Utc>) -> Attachment {
    Attachment {
        title: config.id.clone(),
        fields: vec![
            Field::new("AlertManager Version", status.version_info.version.as_str(), false),
            Field::new("AlertManager Uptime", humanize(now - status.uptime, 3), false),
        ],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alertmanager::types::{Matcher, SilenceStatus};
    use chrono::Duration;

    fn config() -> AlertConfig {
        AlertConfig {
            id: "c1".to_string(),
            alertmanager_url: "http://am:9093".to_string(),
            channel: "ops".to_string(),
            team: "infra".to_string(),
            token: "T1".to_string(),
        }
    }

    #[test]
    fn title_cases_words_without_lowering() {
        assert_eq!(title_case("summary"), "Summary");
        assert_eq!(title_case("runbook url"), "Runbook Url");
        assert_eq!(title_case("alertName"), "AlertName");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn humanize_limits_units() {
        let d = Duration::hours(26) + Duration::minutes(5) + Duration::seconds(9);
        assert_eq!(humanize(d, 2), "1 day 2 hours");
        assert_eq!(humanize(d, 3), "1 day 2 hours 5 minutes");
        assert_eq!(humanize(Duration::zero(), 2), "0 seconds");
        assert_eq!(humanize(Duration::seconds(-90), 2), "1 minute 30 seconds");
    }

    #[test]
    fn colors_by_status() {
        assert_eq!(color_for("firing"), COLOR_FIRING);
        assert_eq!(color_for("resolved"), COLOR_RESOLVED);
        assert_eq!(color_for("anything"), COLOR_EXPIRED);
    }

    #[test]
    fn webhook_fields_sort_and_tag_labels() {
        let now = Utc::now();
        let mut labels = HashMap::new();
        labels.insert("severity".to_string(), "page".to_string());
        labels.insert("alertname".to_string(), "InstanceDown".to_string());
        let mut annotations = HashMap::new();
        annotations.insert("summary".to_string(), "web-1 down".to_string());
        annotations.insert("description".to_string(), "no scrape".to_string());

        let alert = WebhookAlert {
            status: "firing".to_string(),
            labels,
            annotations,
            starts_at: Some(now - Duration::minutes(5)),
            ends_at: None,
            generator_url: "http://prom/graph".to_string(),
            fingerprint: String::new(),
        };

        let fields = webhook_alert_fields(&config(), &alert, "http://am:9093", "mm", now);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].title, ":fire: FIRING :fire:");
        let desc = fields[0].value.find("**Description:**").unwrap();
        let summary = fields[0].value.find("**Summary:**").unwrap();
        assert!(desc < summary);
        assert!(fields[0].value.contains("5 minutes ago"));
        assert!(!fields[0].value.contains("Ended at"));

        let labels = &fields[1].value;
        assert!(labels.contains("**AlertManagerConfigId:** c1"));
        let alertname = labels.find("**Alertname:**").unwrap();
        let severity = labels.find("**Severity:**").unwrap();
        assert!(alertname < severity);
    }

    #[test]
    fn resolved_webhook_alert_shows_end() {
        let now = Utc::now();
        let alert = WebhookAlert {
            status: "resolved".to_string(),
            labels: HashMap::new(),
            annotations: HashMap::new(),
            starts_at: Some(now - Duration::hours(1)),
            ends_at: Some(now - Duration::minutes(1)),
            generator_url: String::new(),
            fingerprint: String::new(),
        };
        let fields = webhook_alert_fields(&config(), &alert, "", "", now);
        assert_eq!(fields[0].title, "RESOLVED");
        assert!(fields[0].value.contains("**Ended at:**"));
    }

    #[test]
    fn silence_attachment_carries_expire_button() {
        let now = Utc::now();
        let silence = Silence {
            id: "abc123".to_string(),
            matchers: vec![
                Matcher {
                    name: "alertname".to_string(),
                    value: "InstanceDown".to_string(),
                    is_regex: false,
                    is_equal: true,
                },
                Matcher {
                    name: "instance".to_string(),
                    value: "web-.*".to_string(),
                    is_regex: true,
                    is_equal: true,
                },
            ],
            status: SilenceStatus {
                state: SilenceState::Active,
            },
            starts_at: Some(now - Duration::hours(1)),
            ends_at: Some(now + Duration::hours(1)),
            updated_at: None,
            comment: "deploy".to_string(),
            created_by: "alice".to_string(),
        };

        let attachment = silence_attachment(
            &config(),
            &silence,
            "http://bridge/api/expire?token=T1",
            "user-1",
            now,
        );
        assert_eq!(attachment.title, "abc123");
        assert_eq!(attachment.color, COLOR_SILENCE_ACTIVE);
        assert!(attachment
            .fields
            .iter()
            .any(|f| f.title == "Matchers" && f.value == "instance=~\"web-.*\""));

        let actions = attachment.actions.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].id, "expireabc123");
        assert_eq!(actions[0].silence_id(), Some("abc123"));
        assert_eq!(
            actions[0].integration.as_ref().unwrap().url,
            "http://bridge/api/expire?token=T1"
        );
    }

    #[test]
    fn buttons_in_one_listing_have_distinct_ids() {
        let now = Utc::now();
        let silences: Vec<Silence> = ["8f1c-01", "8f1c-02", "b7e2-aa"]
            .iter()
            .map(|id| Silence {
                id: id.to_string(),
                matchers: vec![],
                status: SilenceStatus {
                    state: SilenceState::Active,
                },
                starts_at: None,
                ends_at: Some(now + Duration::hours(1)),
                updated_at: None,
                comment: String::new(),
                created_by: String::new(),
            })
            .collect();

        let ids: Vec<String> = silences
            .iter()
            .map(|s| silence_attachment(&config(), s, "http://bridge/api/expire", "u1", now))
            .flat_map(|a| a.actions.unwrap_or_default())
            .map(|action| action.id)
            .collect();

        assert_eq!(ids, ["expire8f1c01", "expire8f1c02", "expireb7e2aa"]);
        assert!(ids.iter().all(|id| id.chars().all(|c| c.is_ascii_alphanumeric())));
    }
}
