use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::identity::{MEMORY_ID_KEY, SESSION_ID_KEY, USER_ID_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One fragment of a message. Only text and structured data are understood;
/// anything else (files, future kinds) is carried as `Unsupported` and ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
    Data { data: Value },
    #[serde(other)]
    Unsupported,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn data(data: Value) -> Self {
        Part::Data { data }
    }
}

fn message_kind() -> String {
    "message".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default)]
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default = "message_kind")]
    pub kind: String,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    pub fn agent_text(text: impl Into<String>) -> Self {
        Self::new(Role::Agent, vec![Part::text(text)])
    }

    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role,
            parts,
            message_id: Uuid::now_v7().to_string(),
            task_id: None,
            context_id: None,
            metadata: None,
            kind: message_kind(),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// All text parts joined by newlines, trimmed.
    pub fn text_content(&self) -> String {
        let mut content = String::new();
        for part in &self.parts {
            if let Part::Text { text } = part {
                content.push_str(text);
                content.push('\n');
            }
        }
        content.trim().to_string()
    }

    /// The first data part holding a JSON object, used as prompt context.
    pub fn context_map(&self) -> Option<&Map<String, Value>> {
        self.parts.iter().find_map(|part| match part {
            Part::Data { data } => data.as_object(),
            _ => None,
        })
    }
}

/// Synchronous analysis request: one prompt, optional context, optional
/// identifiers for conversation continuity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// What to analyze (e.g. "Analyze canary rollout shop/web")
    #[serde(default)]
    pub prompt: String,
    /// Key/value pairs listed under "Context:" in the prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub context: Option<Map<String, Value>>,
    /// Caller identity; doubles as the memory key when no memoryId is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Explicit conversation memory key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,
    /// Client session identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl AnalysisRequest {
    /// Express the request as a protocol message so it takes the same path
    /// through identity resolution and prompt assembly.
    pub fn into_message(self) -> Message {
        let mut metadata = Map::new();
        for (key, value) in [
            (MEMORY_ID_KEY, self.memory_id),
            (USER_ID_KEY, self.user_id),
            (SESSION_ID_KEY, self.session_id),
        ] {
            if let Some(value) = value {
                metadata.insert(key.to_string(), Value::String(value));
            }
        }

        let mut parts = vec![Part::text(self.prompt)];
        if let Some(context) = self.context {
            parts.push(Part::data(Value::Object(context)));
        }

        let message = Message::new(Role::User, parts);
        if metadata.is_empty() {
            message
        } else {
            message.with_metadata(metadata)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_parts_are_joined_and_trimmed() {
        let message = Message::new(
            Role::User,
            vec![
                Part::text("  Analyze canary"),
                Part::data(json!({"namespace": "shop"})),
                Part::text("for pod web-2  "),
            ],
        );
        assert_eq!(message.text_content(), "Analyze canary\nfor pod web-2");
    }

    #[test]
    fn message_without_text_has_empty_content() {
        let message = Message::new(Role::User, vec![Part::data(json!([1, 2]))]);
        assert_eq!(message.text_content(), "");
        assert!(message.context_map().is_none());
    }

    #[test]
    fn deserializes_a2a_wire_shape_and_ignores_file_parts() {
        let message: Message = serde_json::from_value(json!({
            "role": "user",
            "kind": "message",
            "messageId": "msg-1",
            "contextId": "ctx-1",
            "metadata": {"memoryId": "m1"},
            "parts": [
                {"kind": "text", "text": "hello"},
                {"kind": "file", "file": {"uri": "https://example.com/x"}}
            ]
        }))
        .unwrap();
        assert_eq!(message.message_id, "msg-1");
        assert_eq!(message.context_id.as_deref(), Some("ctx-1"));
        assert_eq!(message.parts[1], Part::Unsupported);
        assert_eq!(message.text_content(), "hello");
    }

    #[test]
    fn analysis_request_maps_identifiers_into_metadata() {
        let request = AnalysisRequest {
            prompt: "check rollout".to_string(),
            context: Some(json!({"rollout": "web"}).as_object().cloned().unwrap()),
            user_id: Some("u1".to_string()),
            memory_id: None,
            session_id: Some("s1".to_string()),
        };
        let message = request.into_message();
        let metadata = message.metadata.as_ref().unwrap();
        assert_eq!(metadata.get("userId"), Some(&json!("u1")));
        assert_eq!(metadata.get("sessionId"), Some(&json!("s1")));
        assert!(!metadata.contains_key("memoryId"));
        assert_eq!(message.text_content(), "check rollout");
        assert_eq!(message.context_map().unwrap().get("rollout"), Some(&json!("web")));
    }

    #[test]
    fn analysis_request_without_identifiers_has_no_metadata() {
        let message = AnalysisRequest {
            prompt: "x".to_string(),
            ..Default::default()
        }
        .into_message();
        assert!(message.metadata.is_none());
    }
}
