use crate::domain::{
    ChatSessionSnapshot, ConnectionState, MessagePayload, SessionSummary, parse_stream_event,
};
use crate::infra::{
    ApiConfig, ChatTransport, StreamSink, StreamSubscription, TransportError,
};
use futures_util::{SinkExt as _, StreamExt as _};
use log::{debug, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

const BIN_NAME: &str = "chatsync";

#[derive(Debug, Error)]
pub enum ClientInitError {
    #[error("failed to build tokio runtime: {0}")]
    Runtime(#[from] io::Error),
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// REST calls over a blocking `ureq` agent; live streams run as
/// `tokio-tungstenite` tasks on a small runtime owned by the client.
pub struct HttpChatClient {
    config: ApiConfig,
    agent: ureq::Agent,
    runtime: tokio::runtime::Runtime,
}

impl HttpChatClient {
    pub fn new(config: ApiConfig) -> Result<Self, ClientInitError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("chatsync-stream")
            .enable_all()
            .build()?;
        let agent = make_agent(config.timeout);
        Ok(Self {
            config,
            agent,
            runtime,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, TransportError> {
        self.get_json("/chat/sessions")
    }

    pub fn health_check(&self) -> Result<HealthStatus, TransportError> {
        self.get_json("/healthz")
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        self.get_json_at(&self.config.endpoint(path))
    }

    fn session_endpoint(&self, session_id: &str, tail: Option<&str>) -> Result<String, TransportError> {
        self.config
            .session_url(session_id, tail)
            .map(String::from)
            .map_err(TransportError::network)
    }

    fn get_json_at<T: DeserializeOwned>(&self, url: &str) -> Result<T, TransportError> {
        let result = self
            .agent
            .get(url)
            .header("User-Agent", &user_agent())
            .header("Accept", "application/json")
            .call();
        decode_json(&checked_body(result)?)
    }
}

impl ChatTransport for HttpChatClient {
    fn fetch_history(&self, session_id: &str) -> Result<ChatSessionSnapshot, TransportError> {
        self.get_json_at(&self.session_endpoint(session_id, Some("messages"))?)
    }

    fn post_message(
        &self,
        session_id: &str,
        payload: &MessagePayload,
    ) -> Result<ChatSessionSnapshot, TransportError> {
        let url = self.session_endpoint(session_id, Some("messages"))?;
        let result = self
            .agent
            .post(&url)
            .header("User-Agent", &user_agent())
            .header("Accept", "application/json")
            .send_json(payload);
        decode_json(&checked_body(result)?)
    }

    fn delete_session(&self, session_id: &str) -> Result<(), TransportError> {
        let url = self.session_endpoint(session_id, None)?;
        let result = self
            .agent
            .delete(&url)
            .header("User-Agent", &user_agent())
            .call();
        checked_body(result)?;
        Ok(())
    }

    fn open_stream(&self, session_id: &str, sink: StreamSink) -> StreamSubscription {
        let url = match self.config.stream_url(session_id) {
            Ok(url) => url,
            Err(error) => {
                warn!("unable to open chat stream for session {session_id}: {error}");
                sink.state(ConnectionState::Closed);
                return StreamSubscription::inert();
            }
        };

        sink.state(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.runtime.spawn(run_stream(url, sink, shutdown_rx));
        StreamSubscription::new(move || {
            let _ = shutdown_tx.send(true);
        })
    }
}

async fn run_stream(url: Url, sink: StreamSink, mut shutdown_rx: watch::Receiver<bool>) {
    let subscription = sink.subscription();
    let connect = tokio::select! {
        biased;
        _ = shutdown_rx.changed() => {
            debug!("chat stream #{subscription} closed before handshake");
            return;
        }
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
    };

    let mut ws = match connect {
        Ok((ws, _response)) => ws,
        Err(error) => {
            debug!("chat stream #{subscription} connect failed: {error}");
            sink.state(ConnectionState::Closed);
            return;
        }
    };
    debug!("chat stream #{subscription} open: {url}");
    sink.state(ConnectionState::Open);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                let _ = ws.send(Message::Close(None)).await;
                debug!("chat stream #{subscription} closed by owner");
                break;
            }
            msg = ws.next() => {
                let Some(msg) = msg else {
                    break;
                };
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(error) => {
                        debug!("chat stream #{subscription} error: {error}");
                        break;
                    }
                };
                match msg {
                    Message::Text(text) => match parse_stream_event(&text) {
                        Ok(event) => {
                            if !sink.event(event) {
                                let _ = ws.send(Message::Close(None)).await;
                                break;
                            }
                        }
                        Err(error) => warn!("chat stream #{subscription}: dropping frame: {error}"),
                    },
                    Message::Binary(bytes) => {
                        warn!(
                            "chat stream #{subscription}: dropping {} byte binary frame",
                            bytes.len()
                        );
                    }
                    Message::Ping(bytes) => {
                        if ws.send(Message::Pong(bytes)).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    sink.state(ConnectionState::Closed);
}

fn user_agent() -> String {
    format!("{BIN_NAME}/{}", env!("CARGO_PKG_VERSION"))
}

fn make_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    config.into()
}

fn checked_body(
    result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
) -> Result<String, TransportError> {
    let mut response = result.map_err(|error| TransportError::network(error.to_string()))?;
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|error| TransportError::network(error.to_string()))?;
    if !(200..300).contains(&status) {
        return Err(TransportError::from_response(status, &body));
    }
    Ok(body)
}

fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T, TransportError> {
    serde_json::from_str::<T>(body).map_err(TransportError::decode)
}
