use crate::domain::{
    ChatStore, DEFAULT_SCOPE, MessagePayload, ScopeState, apply_stream_event,
    generate_session_id, normalize_session_id, session_storage_key,
};
use crate::infra::{
    ChatTransport, KeyValueStorage, StreamSignal, StreamSignalKind, StreamSink,
    StreamSubscription, SubscriptionId, TransportError,
};
use log::{debug, warn};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Duration;

pub const LOBBY_SCOPE: &str = "global-lobby";
pub const LOBBY_SESSION_ID: &str = "global-lobby";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SyncOptions {
    pub scope: String,
    /// Pins the scope to this id; user actions can never change it.
    pub required_session_id: Option<String>,
    pub persist: bool,
    pub storage_key: Option<String>,
}

impl SyncOptions {
    pub fn scoped(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            required_session_id: None,
            persist: true,
            storage_key: None,
        }
    }

    pub fn pinned(scope: &str, session_id: &str) -> Self {
        Self {
            scope: scope.to_string(),
            required_session_id: Some(session_id.to_string()),
            persist: false,
            storage_key: None,
        }
    }

    pub fn lobby() -> Self {
        Self::pinned(LOBBY_SCOPE, LOBBY_SESSION_ID)
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn with_storage_key(mut self, key: &str) -> Self {
        self.storage_key = Some(key.to_string());
        self
    }

    fn resolved_storage_key(&self) -> String {
        self.storage_key
            .clone()
            .unwrap_or_else(|| session_storage_key(&self.scope))
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::scoped(DEFAULT_SCOPE)
    }
}

#[derive(Debug)]
struct ActiveStream {
    id: SubscriptionId,
    session_id: String,
    subscription: StreamSubscription,
}

/// Binds one scope of a [`ChatStore`] to the backend: resolves the session
/// id, loads history, keeps exactly one live subscription and turns its
/// signals into store transitions.
///
/// The store is passed into every call, so all mutation happens on the
/// caller's thread.
pub struct SessionSync<T: ChatTransport> {
    options: SyncOptions,
    storage_key: String,
    transport: Arc<T>,
    storage: Arc<dyn KeyValueStorage>,
    tx: Sender<StreamSignal>,
    rx: Receiver<StreamSignal>,
    next_subscription: SubscriptionId,
    active: Option<ActiveStream>,
}

impl<T: ChatTransport> SessionSync<T> {
    pub fn new(options: SyncOptions, transport: Arc<T>, storage: Arc<dyn KeyValueStorage>) -> Self {
        let (tx, rx) = channel::<StreamSignal>();
        let storage_key = options.resolved_storage_key();
        Self {
            options,
            storage_key,
            transport,
            storage,
            tx,
            rx,
            next_subscription: 1,
            active: None,
        }
    }

    pub fn scope(&self) -> &str {
        &self.options.scope
    }

    pub fn is_pinned(&self) -> bool {
        self.options.required_session_id.is_some()
    }

    pub fn state<'a>(&self, store: &'a ChatStore) -> &'a ScopeState {
        store.scope(&self.options.scope)
    }

    pub fn bound_session_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.session_id.as_str())
    }

    /// Brings the scope in line with its options: pins or resolves the
    /// session id and, when it differs from the bound one, replaces the live
    /// subscription and reloads history.
    pub fn reconcile(&mut self, store: &mut ChatStore) {
        let scope = self.options.scope.clone();

        match &self.options.required_session_id {
            Some(required) => {
                if store.scope(&scope).session_id != *required {
                    store.reset_for_session(&scope, required);
                }
            }
            None => {
                if !store.scope(&scope).has_session() {
                    let next = self
                        .stored_session_id()
                        .unwrap_or_else(generate_session_id);
                    store.set_session_id(&scope, &next);
                }
            }
        }

        let session_id = store.scope(&scope).session_id.clone();
        if self.bound_session_id() == Some(session_id.as_str()) {
            return;
        }
        self.persist_session_id(&session_id);
        self.bind(store, session_id);
    }

    /// Applies every queued stream signal. Signals from a subscription that
    /// is no longer active are discarded.
    pub fn pump(&mut self, store: &mut ChatStore) -> usize {
        let mut applied = 0usize;
        while let Ok(signal) = self.rx.try_recv() {
            if self.apply_signal(store, signal) {
                applied += 1;
            }
        }
        applied
    }

    /// Like [`Self::pump`], but waits up to `timeout` for the first signal.
    pub fn wait_and_pump(&mut self, store: &mut ChatStore, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(signal) => {
                let first = usize::from(self.apply_signal(store, signal));
                first + self.pump(store)
            }
            Err(_) => 0,
        }
    }

    pub fn send_user_message(
        &mut self,
        store: &mut ChatStore,
        content: &str,
        author_name: Option<&str>,
    ) -> Result<(), TransportError> {
        let scope = self.options.scope.clone();
        let session_id = store.scope(&scope).session_id.clone();
        if session_id.is_empty() {
            return Ok(());
        }

        let payload = MessagePayload::user(content, author_name);
        store.begin_send(&scope);
        match self.transport.post_message(&session_id, &payload) {
            Ok(session) => {
                store.finish_send(&scope, Ok(session.messages));
                Ok(())
            }
            Err(error) => {
                store.finish_send(&scope, Err(error.message.clone()));
                Err(error)
            }
        }
    }

    pub fn clear_conversation(&mut self, store: &mut ChatStore) -> Result<(), TransportError> {
        let scope = self.options.scope.clone();
        let session_id = store.scope(&scope).session_id.clone();
        if session_id.is_empty() {
            return Ok(());
        }

        store.begin_clear(&scope);
        match self.transport.delete_session(&session_id) {
            Ok(()) => {
                store.finish_clear(&scope, Ok(()));
                Ok(())
            }
            Err(error) => {
                store.finish_clear(&scope, Err(error.message.clone()));
                Err(error)
            }
        }
    }

    /// Switches to `preferred_id` (trimmed) or a fresh id. Returns whether
    /// the active session changed.
    pub fn start_new_session(&mut self, store: &mut ChatStore, preferred_id: Option<&str>) -> bool {
        if self.is_pinned() {
            return false;
        }
        let next = preferred_id
            .and_then(normalize_session_id)
            .unwrap_or_else(generate_session_id);
        self.activate(store, next)
    }

    pub fn join_session(&mut self, store: &mut ChatStore, target_id: &str) -> bool {
        if self.is_pinned() {
            return false;
        }
        let Some(next) = normalize_session_id(target_id) else {
            return false;
        };
        self.activate(store, next)
    }

    /// Closes the live subscription, e.g. when the view goes away.
    pub fn shutdown(&mut self) {
        self.teardown();
    }

    fn activate(&mut self, store: &mut ChatStore, next: String) -> bool {
        let scope = self.options.scope.clone();
        if store.scope(&scope).session_id == next {
            return false;
        }
        store.reset_for_session(&scope, &next);
        self.reconcile(store);
        true
    }

    fn bind(&mut self, store: &mut ChatStore, session_id: String) {
        self.teardown();
        let scope = self.options.scope.clone();

        store.begin_load(&scope);

        let id = self.next_subscription;
        self.next_subscription += 1;
        debug!("scope {scope}: subscribing to session {session_id} (#{id})");
        let subscription = self
            .transport
            .open_stream(&session_id, StreamSink::new(id, self.tx.clone()));
        self.active = Some(ActiveStream {
            id,
            session_id: session_id.clone(),
            subscription,
        });

        let result = self
            .transport
            .fetch_history(&session_id)
            .map(|session| session.messages)
            .map_err(|error| {
                warn!("scope {scope}: history load failed: {error}");
                error.message
            });
        store.finish_load(&scope, result);
    }

    fn teardown(&mut self) {
        if let Some(mut active) = self.active.take() {
            debug!(
                "scope {}: closing subscription #{} for session {}",
                self.options.scope, active.id, active.session_id
            );
            active.subscription.close();
        }
    }

    fn apply_signal(&mut self, store: &mut ChatStore, signal: StreamSignal) -> bool {
        let Some(active) = &self.active else {
            return false;
        };
        if signal.subscription != active.id {
            debug!(
                "scope {}: dropping signal from stale subscription #{}",
                self.options.scope, signal.subscription
            );
            return false;
        }

        match signal.kind {
            StreamSignalKind::Event(event) => {
                apply_stream_event(store, &self.options.scope, event);
            }
            StreamSignalKind::State(state) => {
                store.set_connection_state(&self.options.scope, state);
            }
        }
        true
    }

    fn stored_session_id(&self) -> Option<String> {
        if !self.options.persist {
            return None;
        }
        self.storage
            .get(&self.storage_key)
            .as_deref()
            .and_then(normalize_session_id)
    }

    fn persist_session_id(&self, session_id: &str) {
        if !self.options.persist {
            return;
        }
        if let Err(error) = self.storage.set(&self.storage_key, session_id) {
            warn!("failed to persist session id for scope {}: {error}", self.options.scope);
        }
    }
}

impl<T: ChatTransport> Drop for SessionSync<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}
