use serde_json::Value;
use thiserror::Error;

pub const GENERIC_TRANSPORT_ERROR: &str = "Unexpected error while communicating with the chat API";

/// The single error shape callers of the chat API see.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub status: Option<u16>,
}

impl TransportError {
    pub fn network(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let message = if detail.trim().is_empty() {
            GENERIC_TRANSPORT_ERROR.to_string()
        } else {
            detail
        };
        Self {
            message,
            status: None,
        }
    }

    pub fn from_response(status: u16, body: &str) -> Self {
        let fallback = format!("Request failed with status code {status}");
        Self {
            message: message_from_body(body).unwrap_or(fallback),
            status: Some(status),
        }
    }

    pub fn decode(detail: impl std::fmt::Display) -> Self {
        Self {
            message: format!("invalid response from the chat API: {detail}"),
            status: None,
        }
    }
}

/// Priority: `detail` string, `message` string, JSON string body, raw text body.
pub fn message_from_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => ["detail", "message"]
            .into_iter()
            .find_map(|key| {
                map.get(key)
                    .and_then(Value::as_str)
                    .filter(|text| !text.is_empty())
            })
            .map(ToOwned::to_owned),
        Ok(Value::String(text)) if !text.is_empty() => Some(text),
        Ok(_) => None,
        Err(_) => Some(trimmed.to_string()),
    }
}
