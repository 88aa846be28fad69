use thiserror::Error;

pub const MAX_CONTENT_CHARS: usize = 4000;
pub const MAX_AUTHOR_CHARS: usize = 64;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutgoingMessage {
    pub content: String,
    pub author_name: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum LocalValidationError {
    #[error("message is empty")]
    EmptyContent,

    #[error("message is too long ({len} characters, max {max})", max = MAX_CONTENT_CHARS)]
    ContentTooLong { len: usize },

    #[error("display name is too long ({len} characters, max {max})", max = MAX_AUTHOR_CHARS)]
    AuthorTooLong { len: usize },

    #[error("set a display name first (/name <name>)")]
    MissingIdentity,
}

/// Checks a composer draft against the limits the backend enforces.
pub fn validate_outgoing(
    draft: &str,
    author_name: Option<&str>,
    identity_required: bool,
) -> Result<OutgoingMessage, LocalValidationError> {
    let content = draft.trim();
    if content.is_empty() {
        return Err(LocalValidationError::EmptyContent);
    }
    let len = content.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Err(LocalValidationError::ContentTooLong { len });
    }

    let author_name = author_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned);
    if let Some(name) = &author_name {
        let len = name.chars().count();
        if len > MAX_AUTHOR_CHARS {
            return Err(LocalValidationError::AuthorTooLong { len });
        }
    }
    if identity_required && author_name.is_none() {
        return Err(LocalValidationError::MissingIdentity);
    }

    Ok(OutgoingMessage {
        content: content.to_string(),
        author_name,
    })
}
