use crate::domain::{ChatSessionSnapshot, ConnectionState, MessagePayload, StreamEvent};
use crate::infra::TransportError;
use std::fmt;
use std::sync::mpsc::Sender;

pub type SubscriptionId = u64;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StreamSignalKind {
    Event(StreamEvent),
    State(ConnectionState),
}

/// One callback from a live subscription, tagged with the subscription it
/// came from so late deliveries can be told apart from current ones.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StreamSignal {
    pub subscription: SubscriptionId,
    pub kind: StreamSignalKind,
}

#[derive(Clone, Debug)]
pub struct StreamSink {
    subscription: SubscriptionId,
    tx: Sender<StreamSignal>,
}

impl StreamSink {
    pub fn new(subscription: SubscriptionId, tx: Sender<StreamSignal>) -> Self {
        Self { subscription, tx }
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Returns `false` once the receiving side is gone.
    pub fn event(&self, event: StreamEvent) -> bool {
        self.send(StreamSignalKind::Event(event))
    }

    pub fn state(&self, state: ConnectionState) -> bool {
        self.send(StreamSignalKind::State(state))
    }

    fn send(&self, kind: StreamSignalKind) -> bool {
        self.tx
            .send(StreamSignal {
                subscription: self.subscription,
                kind,
            })
            .is_ok()
    }
}

/// Disposer for a live subscription. Closing is idempotent and dropping closes.
pub struct StreamSubscription {
    closer: Option<Box<dyn FnOnce() + Send>>,
}

impl StreamSubscription {
    pub fn new(closer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            closer: Some(Box::new(closer)),
        }
    }

    pub fn inert() -> Self {
        Self { closer: None }
    }

    pub fn close(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_none()
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for StreamSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSubscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// What the synchronization core needs from the backend.
pub trait ChatTransport {
    fn fetch_history(&self, session_id: &str) -> Result<ChatSessionSnapshot, TransportError>;

    fn post_message(
        &self,
        session_id: &str,
        payload: &MessagePayload,
    ) -> Result<ChatSessionSnapshot, TransportError>;

    fn delete_session(&self, session_id: &str) -> Result<(), TransportError>;

    /// Reports `Connecting` before returning, then `Open`/`Closed` and events
    /// through `sink` as they happen.
    fn open_stream(&self, session_id: &str, sink: StreamSink) -> StreamSubscription;
}
