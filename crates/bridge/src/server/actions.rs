//! Interactive "Expire Silence" button callbacks.

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{
    routes::{invalid_token, resolve_token, TokenQuery},
    AppState,
};
use crate::{
    config::ReconcilePolicy,
    format::{self, COLOR_EXPIRED},
    metrics,
    platform::{Attachment, Field, Post},
};

/// Props carried over when a post is rewritten.
const RETAINED_PROPS: [&str; 2] = ["override_username", "override_icon_url"];

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ActionContext {
    #[serde(default)]
    pub silence_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub action: String,
}

/// Body Mattermost posts when a button is pressed.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ActionCallback {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub context: Option<ActionContext>,
}

impl ActionCallback {
    pub fn silence_id(&self) -> &str {
        self.context
            .as_ref()
            .map(|c| c.silence_id.as_str())
            .unwrap_or("")
    }
}

fn ephemeral(message: impl Into<String>) -> Response {
    Json(json!({ "ephemeral_text": message.into() })).into_response()
}

/// `POST /api/expire?token=...`
pub async fn handle_expire_action(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
    body: Bytes,
) -> Response {
    let Some(config) = resolve_token(&state, &query).await else {
        return invalid_token();
    };

    info!("Received expire silence action for {}", config.id);

    let callback: ActionCallback = match serde_json::from_slice(&body) {
        Ok(callback) => callback,
        Err(e) => {
            warn!("Failed to decode action callback: {}", e);
            return ephemeral("We could not decode the action");
        }
    };
    let silence_id = callback.silence_id();
    if silence_id.is_empty() {
        return ephemeral("Silence ID cannot be empty");
    }

    let expired = state
        .alertmanager
        .expire_silence(silence_id, &config.alertmanager_url)
        .await;

    let reply = match &expired {
        Ok(()) => {
            metrics::SILENCES_EXPIRED_TOTAL
                .with_label_values(&["success"])
                .inc();
            format!("Silence {} expired.", silence_id)
        }
        Err(e) => {
            warn!("Failed to expire silence {} on {}: {}", silence_id, config.id, e);
            metrics::SILENCES_EXPIRED_TOTAL
                .with_label_values(&["failure"])
                .inc();
            format!("failed to expire the silence: {}", e)
        }
    };

    if expired.is_ok() || state.settings.reconcile == ReconcilePolicy::Always {
        reconcile_post(&state, &callback, silence_id).await;
    }

    ephemeral(reply)
}

/// Rewrite the post that carried the button so it no longer offers to
/// expire `silence_id`. The expiration itself is never rolled back.
async fn reconcile_post(state: &AppState, callback: &ActionCallback, silence_id: &str) {
    let original = match state.platform.get_post(&callback.post_id).await {
        Ok(post) => post,
        Err(e) => {
            error!("Failed to fetch post {} for update: {}", callback.post_id, e);
            return;
        }
    };

    let attachments = original.attachment_values();
    if !attachments
        .iter()
        .any(|value| matching_attachment(value, silence_id).is_some())
    {
        info!("Post {} has no action for silence {}", original.id, silence_id);
        return;
    }

    let expired_by = match state.platform.get_user(&callback.user_id).await {
        Ok(user) => format!("Silence expired by {}", user.username),
        Err(_) => "Silence expired".to_string(),
    };

    let attachments = reconcile_attachments(attachments, silence_id, &expired_by, Utc::now());
    let updated = rewrite_post(&original, attachments);

    match state.platform.update_post(updated).await {
        Ok(_) => metrics::POSTS_TOTAL
            .with_label_values(&["update", "success"])
            .inc(),
        Err(e) => {
            error!("Failed to update post {}: {}", original.id, e);
            metrics::POSTS_TOTAL
                .with_label_values(&["update", "failure"])
                .inc();
        }
    }
}

fn offers_expiry_of(attachment: &Attachment, silence_id: &str) -> bool {
    attachment
        .actions
        .as_ref()
        .is_some_and(|actions| actions.iter().any(|a| a.silence_id() == Some(silence_id)))
}

/// Decoded attachment, if `value` is one offering to expire `silence_id`.
fn matching_attachment(value: &Value, silence_id: &str) -> Option<Attachment> {
    let attachment: Attachment = serde_json::from_value(value.clone()).ok()?;
    offers_expiry_of(&attachment, silence_id).then_some(attachment)
}

/// Replace every attachment offering to expire `silence_id` with its expired
/// form. All other entries, including ones that do not decode, pass through
/// as they were.
pub fn reconcile_attachments(
    attachments: Vec<Value>,
    silence_id: &str,
    expired_by: &str,
    now: DateTime<Utc>,
) -> Vec<Value> {
    attachments
        .into_iter()
        .map(|value| {
            let Some(mut expired) = matching_attachment(&value, silence_id) else {
                return value;
            };
            expired.actions = None;
            expired.color = COLOR_EXPIRED.to_string();
            expired.fields.push(Field::new(
                "Expired by",
                format!("{} at {}", expired_by, format::format_timestamp(&now)),
                false,
            ));
            serde_json::to_value(&expired).unwrap_or(value)
        })
        .collect()
}

/// Same post id, channel and author with new attachments. Only allow-listed
/// props survive.
pub fn rewrite_post(original: &Post, attachments: Vec<Value>) -> Post {
    let mut updated = Post {
        id: original.id.clone(),
        channel_id: original.channel_id.clone(),
        user_id: original.user_id.clone(),
        ..Default::default()
    };
    updated.add_prop("from_webhook", "true");
    for prop in RETAINED_PROPS {
        if let Some(value) = original.props.get(prop) {
            updated.add_prop(prop, value.clone());
        }
    }
    updated.set_attachment_values(attachments);
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Action, ActionIntegration};
    use serde_json::Map;

    fn button_for(silence_id: &str) -> Attachment {
        let mut context = Map::new();
        context.insert("silence_id".to_string(), Value::from(silence_id));
        Attachment {
            title: silence_id.to_string(),
            color: "#008000".to_string(),
            fields: vec![Field::new("State", "active", false)],
            actions: Some(vec![Action {
                id: format::expire_action_id(silence_id),
                name: "Expire Silence".to_string(),
                action_type: "button".to_string(),
                integration: Some(ActionIntegration {
                    url: "http://bridge/api/expire?token=T1".to_string(),
                    context,
                }),
            }]),
            ..Default::default()
        }
    }

    fn value_of(attachment: &Attachment) -> Value {
        serde_json::to_value(attachment).unwrap()
    }

    #[test]
    fn only_matching_attachment_is_expired() {
        let plain = Attachment {
            text: "no actions".to_string(),
            ..Default::default()
        };
        let attachments = vec![
            value_of(&button_for("abc123")),
            value_of(&button_for("other")),
            value_of(&plain),
        ];

        let out = reconcile_attachments(attachments, "abc123", "Silence expired by alice", Utc::now());

        assert_eq!(out.len(), 3);
        let expired: Attachment = serde_json::from_value(out[0].clone()).unwrap();
        assert!(expired.actions.is_none());
        assert_eq!(expired.color, COLOR_EXPIRED);
        let last = expired.fields.last().unwrap();
        assert_eq!(last.title, "Expired by");
        assert!(last.value.starts_with("Silence expired by alice at "));

        assert_eq!(out[1], value_of(&button_for("other")));
        assert_eq!(out[2], value_of(&plain));
    }

    #[test]
    fn entries_outside_the_model_pass_through_verbatim() {
        let mut matching = value_of(&button_for("s1"));
        matching["footer"] = Value::from("silence footer");
        let note = json!({
            "id": 2,
            "text": "unrelated note",
            "fields": null,
            "footer": "kept?"
        });
        let odd = json!({"fields": [{"title": "n", "value": 42}]});

        let out = reconcile_attachments(
            vec![matching, note.clone(), odd.clone()],
            "s1",
            "Silence expired",
            Utc::now(),
        );

        assert_eq!(out.len(), 3);
        assert_eq!(out[0]["footer"], "silence footer");
        assert!(out[0].get("actions").is_none());
        assert_eq!(out[1], note);
        assert_eq!(out[2], odd);
    }

    #[test]
    fn rewrite_keeps_identity_and_allow_listed_props() {
        let mut original = Post::new("chan-1", "bot-1");
        original.id = "post-1".to_string();
        original.add_prop("override_username", "alertmanager");
        original.add_prop("secret_internal", "drop me");

        let updated = rewrite_post(&original, vec![]);
        assert_eq!(updated.id, "post-1");
        assert_eq!(updated.channel_id, "chan-1");
        assert_eq!(updated.user_id, "bot-1");
        assert_eq!(updated.props["from_webhook"], "true");
        assert_eq!(updated.props["override_username"], "alertmanager");
        assert!(!updated.props.contains_key("secret_internal"));
    }

    #[test]
    fn callback_without_context_has_empty_silence_id() {
        let callback: ActionCallback =
            serde_json::from_str(r#"{"user_id": "u1", "post_id": "p1"}"#).unwrap();
        assert_eq!(callback.silence_id(), "");
    }
}
