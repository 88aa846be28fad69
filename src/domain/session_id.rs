use crate::domain::DEFAULT_SCOPE;
use uuid::Uuid;

pub const SESSION_STORAGE_KEY: &str = "chatsystem.session-id";

pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Trimmed id, or `None` when nothing usable is left.
pub fn normalize_session_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn session_storage_key(scope: &str) -> String {
    if scope == DEFAULT_SCOPE {
        SESSION_STORAGE_KEY.to_string()
    } else {
        format!("{SESSION_STORAGE_KEY}.{scope}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_is_namespaced_per_scope() {
        assert_eq!(session_storage_key("default"), "chatsystem.session-id");
        assert_eq!(
            session_storage_key("global-lobby"),
            "chatsystem.session-id.global-lobby"
        );
    }

    #[test]
    fn normalize_trims_and_rejects_blank() {
        assert_eq!(normalize_session_id("  abc \n"), Some("abc".to_string()));
        assert_eq!(normalize_session_id("   "), None);
    }

    #[test]
    fn generated_ids_are_distinct_uuids() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
