use crate::domain::{ChatMessage, ChatSessionSnapshot};
use serde::Deserialize;
use thiserror::Error;

/// Inbound frame vocabulary of the per-session stream.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "session.sync")]
    SessionSync { session: ChatSessionSnapshot },

    #[serde(rename = "message.created")]
    MessageCreated {
        session_id: String,
        message: ChatMessage,
    },

    #[serde(rename = "session.cleared")]
    SessionCleared { session_id: String },

    #[serde(rename = "error")]
    Error { detail: String },
}

#[derive(Debug, Error)]
#[error("malformed stream frame: {0}")]
pub struct ParseStreamEventError(#[from] serde_json::Error);

pub fn parse_stream_event(text: &str) -> Result<StreamEvent, ParseStreamEventError> {
    Ok(serde_json::from_str::<StreamEvent>(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatRole;

    #[test]
    fn parses_every_event_tag() {
        let sync = parse_stream_event(
            r#"{"type":"session.sync","session":{"session_id":"abc","messages":[]}}"#,
        )
        .expect("sync");
        assert!(matches!(
            sync,
            StreamEvent::SessionSync { session } if session.session_id == "abc"
        ));

        let created = parse_stream_event(
            r#"{"type":"message.created","session_id":"abc","message":{"id":"m1","role":"user","content":"hi","created_at":"2026-02-01T10:00:00Z"}}"#,
        )
        .expect("created");
        let StreamEvent::MessageCreated { message, .. } = created else {
            panic!("expected message.created");
        };
        assert_eq!(message.role, ChatRole::User);

        let cleared =
            parse_stream_event(r#"{"type":"session.cleared","session_id":"abc"}"#).expect("clear");
        assert_eq!(
            cleared,
            StreamEvent::SessionCleared {
                session_id: "abc".to_string()
            }
        );

        let error = parse_stream_event(
            r#"{"type":"error","detail":"Invalid message payload.","errors":[]}"#,
        )
        .expect("error");
        assert_eq!(
            error,
            StreamEvent::Error {
                detail: "Invalid message payload.".to_string()
            }
        );
    }

    #[test]
    fn rejects_non_json_and_unknown_tags() {
        assert!(parse_stream_event("not json").is_err());
        assert!(parse_stream_event(r#"{"type":"presence.joined"}"#).is_err());
    }
}
