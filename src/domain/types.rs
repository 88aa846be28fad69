use serde::{Deserialize, Serialize};

pub type IsoTimestamp = String;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: IsoTimestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
}

/// Full message history of one backend session, as returned by the history,
/// post and `session.sync` payloads.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct ChatSessionSnapshot {
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub message_count: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MessagePayload {
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
}

impl MessagePayload {
    pub fn user(content: &str, author_name: Option<&str>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.to_string(),
            author_name: author_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(ToOwned::to_owned),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Open => "Live",
            Self::Closed => "Offline",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_uses_wire_field_names() {
        let raw = r#"{"id":"m1","role":"assistant","content":"hello","created_at":"2026-02-01T10:00:00Z","author_name":null}"#;
        let message: ChatMessage = serde_json::from_str(raw).expect("message parses");
        assert_eq!(message.role, ChatRole::Assistant);
        assert_eq!(message.author_name, None);
        assert_eq!(message.created_at, "2026-02-01T10:00:00Z");
    }

    #[test]
    fn payload_omits_missing_author() {
        let payload = MessagePayload::user("hi", Some("   "));
        let text = serde_json::to_string(&payload).expect("encode");
        assert_eq!(text, r#"{"role":"user","content":"hi"}"#);

        let payload = MessagePayload::user("hi", Some(" Ada "));
        let text = serde_json::to_string(&payload).expect("encode");
        assert_eq!(text, r#"{"role":"user","content":"hi","author_name":"Ada"}"#);
    }

    #[test]
    fn connection_labels_match_status_bar() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
        assert_eq!(ConnectionState::Open.label(), "Live");
        assert_eq!(ConnectionState::Closed.label(), "Offline");
    }
}
