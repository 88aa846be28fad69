use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/v1";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub const API_URL_ENV: &str = "CHATSYNC_API_URL";
pub const STATE_DIR_ENV: &str = "CHATSYNC_STATE_DIR";
pub const HTTP_TIMEOUT_ENV: &str = "CHATSYNC_HTTP_TIMEOUT_SECS";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiConfig {
    base_url: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn from_env() -> Self {
        let base_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut config = Self::new(&base_url);
        if let Some(secs) = std::env::var(HTTP_TIMEOUT_ENV)
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// `{base}/chat/sessions/{id}[/{tail}]` with the id as one encoded path
    /// segment, so HTTP and stream addresses always agree.
    pub fn session_url(&self, session_id: &str, tail: Option<&str>) -> Result<Url, String> {
        let mut url = Url::parse(&self.base_url).map_err(|error| error.to_string())?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| format!("cannot build session url from {}", self.base_url))?;
            segments
                .pop_if_empty()
                .extend(["chat", "sessions", session_id]);
            if let Some(tail) = tail {
                segments.push(tail);
            }
        }
        Ok(url)
    }

    /// Streaming address for a session: `https` maps to `wss`, anything else to `ws`.
    pub fn stream_url(&self, session_id: &str) -> Result<Url, String> {
        let mut url = self.session_url(session_id, Some("ws"))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| format!("cannot derive stream url from {}", self.base_url))?;
        Ok(url)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

#[derive(Debug, Error)]
pub enum ResolveStateDirError {
    #[error("home directory not found")]
    HomeDirNotFound,
}

pub fn resolve_state_dir() -> Result<PathBuf, ResolveStateDirError> {
    if let Some(override_dir) = std::env::var_os(STATE_DIR_ENV) {
        return Ok(PathBuf::from(override_dir));
    }

    let Some(home) = dirs::home_dir() else {
        return Err(ResolveStateDirError::HomeDirNotFound);
    };
    Ok(home.join(".chatsync"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_slash_and_joins_paths() {
        let config = ApiConfig::new("https://chat.example.com/v1/");
        assert_eq!(config.base_url(), "https://chat.example.com/v1");
        assert_eq!(
            config
                .session_url("abc", Some("messages"))
                .expect("url")
                .as_str(),
            "https://chat.example.com/v1/chat/sessions/abc/messages"
        );
        assert_eq!(
            config.endpoint("healthz"),
            "https://chat.example.com/v1/healthz"
        );
    }

    #[test]
    fn stream_url_swaps_scheme() {
        let secure = ApiConfig::new("https://chat.example.com/v1");
        assert_eq!(
            secure
                .stream_url("abc")
                .expect("url")
                .as_str(),
            "wss://chat.example.com/v1/chat/sessions/abc/ws"
        );

        let plain = ApiConfig::new("http://localhost:8000/v1");
        assert_eq!(
            plain
                .stream_url("abc")
                .expect("url")
                .as_str(),
            "ws://localhost:8000/v1/chat/sessions/abc/ws"
        );
    }

    #[test]
    fn stream_url_rejects_garbage_base() {
        let config = ApiConfig::new("not a url");
        assert!(config.stream_url("a").is_err());
        assert!(config.session_url("a", None).is_err());
    }

    #[test]
    fn session_ids_are_encoded_as_a_single_segment() {
        let config = ApiConfig::new("http://localhost:8000/v1");
        assert_eq!(
            config.session_url("team/alpha?x#y", None).expect("url").as_str(),
            "http://localhost:8000/v1/chat/sessions/team%2Falpha%3Fx%23y"
        );
        assert_eq!(
            config
                .session_url("my room", Some("messages"))
                .expect("url")
                .as_str(),
            "http://localhost:8000/v1/chat/sessions/my%20room/messages"
        );
        assert_eq!(
            config.stream_url("my room").expect("url").as_str(),
            "ws://localhost:8000/v1/chat/sessions/my%20room/ws"
        );
    }
}
