use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Mattermost writes empty slices as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Slack-compatible attachment field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub short: bool,
}

impl Field {
    pub fn new(title: impl Into<String>, value: impl Into<String>, short: bool) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            short,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionIntegration {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// Interactive button attached to a post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub action_type: String,
    #[serde(default)]
    pub integration: Option<ActionIntegration>,
}

impl Action {
    pub fn silence_id(&self) -> Option<&str> {
        self.integration
            .as_ref()
            .and_then(|i| i.context.get("silence_id"))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fallback: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pretext: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title_link: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
    /// Keys this model does not name (footer, author, images, ...), kept so a
    /// rewritten post loses nothing.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub props: Map<String, Value>,
}

impl Post {
    pub fn new(channel_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Raw entries of `props.attachments`, in order.
    pub fn attachment_values(&self) -> Vec<Value> {
        self.props
            .get("attachments")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    /// Typed view of `props.attachments`. Entries that do not decode are
    /// skipped here; use [`Post::attachment_values`] to keep them.
    pub fn attachments(&self) -> Vec<Attachment> {
        self.attachment_values()
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()
    }

    pub fn set_attachments(&mut self, attachments: Vec<Attachment>) {
        let values = attachments
            .iter()
            .filter_map(|a| serde_json::to_value(a).ok())
            .collect();
        self.set_attachment_values(values);
    }

    pub fn set_attachment_values(&mut self, values: Vec<Value>) {
        self.props
            .insert("attachments".to_string(), Value::Array(values));
    }

    pub fn add_prop(&mut self, key: &str, value: impl Into<Value>) {
        self.props.insert(key.to_string(), value.into());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
}
