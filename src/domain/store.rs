use crate::domain::{ChatMessage, ConnectionState, StreamEvent};
use std::collections::BTreeMap;

pub const DEFAULT_SCOPE: &str = "default";

pub const LOAD_FAILED_FALLBACK: &str = "Unable to load chat history";
pub const SEND_FAILED_FALLBACK: &str = "Unable to send message right now";
pub const CLEAR_FAILED_FALLBACK: &str = "Unable to clear the current session";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScopeState {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    pub is_loading: bool,
    pub is_sending: bool,
    pub error: Option<String>,
    pub connection_state: ConnectionState,
    /// Bumped on every mutation so views can tell when to re-render.
    pub revision: u64,
}

impl ScopeState {
    pub const fn new() -> Self {
        Self {
            session_id: String::new(),
            messages: Vec::new(),
            is_loading: false,
            is_sending: false,
            error: None,
            connection_state: ConnectionState::Idle,
            revision: 0,
        }
    }

    pub fn has_session(&self) -> bool {
        !self.session_id.is_empty()
    }

    pub fn contains_message(&self, id: &str) -> bool {
        self.messages.iter().any(|message| message.id == id)
    }
}

impl Default for ScopeState {
    fn default() -> Self {
        Self::new()
    }
}

static FALLBACK_SCOPE_STATE: ScopeState = ScopeState::new();

/// Per-scope conversation state. Scopes are created on first mutation.
#[derive(Clone, Debug, Default)]
pub struct ChatStore {
    scopes: BTreeMap<String, ScopeState>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view; an unknown scope reads as the default state.
    pub fn scope(&self, scope: &str) -> &ScopeState {
        self.scopes.get(scope).unwrap_or(&FALLBACK_SCOPE_STATE)
    }

    pub fn scope_names(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    fn touch(&mut self, scope: &str) -> &mut ScopeState {
        let state = self.scopes.entry(scope.to_string()).or_default();
        state.revision = state.revision.wrapping_add(1);
        state
    }

    pub fn set_session_id(&mut self, scope: &str, session_id: &str) {
        self.touch(scope).session_id = session_id.to_string();
    }

    pub fn sync_messages(&mut self, scope: &str, messages: Vec<ChatMessage>) {
        let state = self.touch(scope);
        state.messages = messages;
        state.error = None;
    }

    /// Returns `false` when a message with the same id is already present.
    pub fn append_message(&mut self, scope: &str, message: ChatMessage) -> bool {
        if self.scope(scope).contains_message(&message.id) {
            self.scopes.entry(scope.to_string()).or_default();
            return false;
        }
        self.touch(scope).messages.push(message);
        true
    }

    pub fn reset_messages(&mut self, scope: &str) {
        self.touch(scope).messages.clear();
    }

    pub fn set_error(&mut self, scope: &str, error: Option<String>) {
        self.touch(scope).error = error;
    }

    pub fn set_connection_state(&mut self, scope: &str, connection_state: ConnectionState) {
        self.touch(scope).connection_state = connection_state;
    }

    /// Tears the scope down before a new session id takes over.
    pub fn reset_for_session(&mut self, scope: &str, session_id: &str) {
        let state = self.touch(scope);
        state.messages.clear();
        state.error = None;
        state.connection_state = ConnectionState::Idle;
        state.session_id = session_id.to_string();
    }

    pub fn begin_load(&mut self, scope: &str) {
        let state = self.touch(scope);
        state.is_loading = true;
        state.error = None;
    }

    pub fn finish_load(&mut self, scope: &str, result: Result<Vec<ChatMessage>, String>) {
        let state = self.touch(scope);
        state.is_loading = false;
        match result {
            Ok(messages) => {
                state.messages = messages;
                state.error = None;
            }
            Err(error) => state.error = Some(non_empty_or(error, LOAD_FAILED_FALLBACK)),
        }
    }

    pub fn begin_send(&mut self, scope: &str) {
        let state = self.touch(scope);
        state.is_sending = true;
        state.error = None;
    }

    /// On success, merges the returned history: anything not seen yet is
    /// appended in server order.
    pub fn finish_send(&mut self, scope: &str, result: Result<Vec<ChatMessage>, String>) {
        self.touch(scope).is_sending = false;
        match result {
            Ok(messages) => {
                for message in messages {
                    self.append_message(scope, message);
                }
            }
            Err(error) => {
                self.touch(scope).error = Some(non_empty_or(error, SEND_FAILED_FALLBACK));
            }
        }
    }

    pub fn begin_clear(&mut self, scope: &str) {
        self.touch(scope).error = None;
    }

    pub fn finish_clear(&mut self, scope: &str, result: Result<(), String>) {
        let state = self.touch(scope);
        match result {
            Ok(()) => {
                state.messages.clear();
                state.error = None;
            }
            Err(error) => state.error = Some(non_empty_or(error, CLEAR_FAILED_FALLBACK)),
        }
    }
}

fn non_empty_or(error: String, fallback: &str) -> String {
    if error.trim().is_empty() {
        fallback.to_string()
    } else {
        error
    }
}

/// Maps one inbound stream event onto the scope's state.
pub fn apply_stream_event(store: &mut ChatStore, scope: &str, event: StreamEvent) {
    match event {
        StreamEvent::SessionSync { session } => {
            store.sync_messages(scope, session.messages);
        }
        StreamEvent::MessageCreated { message, .. } => {
            store.append_message(scope, message);
        }
        StreamEvent::SessionCleared { .. } => {
            store.reset_messages(scope);
        }
        StreamEvent::Error { detail } => {
            store.set_error(scope, Some(detail));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatRole, ChatSessionSnapshot};

    fn message(id: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            role: ChatRole::User,
            content: content.to_string(),
            created_at: "2026-02-01T10:00:00Z".to_string(),
            author_name: None,
        }
    }

    fn ids(store: &ChatStore, scope: &str) -> Vec<String> {
        store
            .scope(scope)
            .messages
            .iter()
            .map(|message| message.id.clone())
            .collect()
    }

    #[test]
    fn unknown_scope_reads_as_default_without_inserting() {
        let store = ChatStore::new();
        let state = store.scope("nowhere");
        assert_eq!(state, &ScopeState::default());
        assert_eq!(store.scope_names().count(), 0);
    }

    #[test]
    fn append_is_idempotent_for_any_delivery_order() {
        let mut store = ChatStore::new();
        let deliveries = ["a", "b", "a", "c", "b", "b", "a"];
        for id in deliveries {
            store.append_message(DEFAULT_SCOPE, message(id, id));
        }
        assert_eq!(ids(&store, DEFAULT_SCOPE), vec!["a", "b", "c"]);
        assert!(!store.append_message(DEFAULT_SCOPE, message("c", "again")));
        assert_eq!(store.scope(DEFAULT_SCOPE).messages[2].content, "c");
    }

    #[test]
    fn sync_replaces_list_and_clears_error() {
        let mut store = ChatStore::new();
        store.append_message(DEFAULT_SCOPE, message("old", "x"));
        store.set_error(DEFAULT_SCOPE, Some("boom".to_string()));

        store.sync_messages(DEFAULT_SCOPE, vec![message("n1", "1"), message("n2", "2")]);

        assert_eq!(ids(&store, DEFAULT_SCOPE), vec!["n1", "n2"]);
        assert_eq!(store.scope(DEFAULT_SCOPE).error, None);
    }

    #[test]
    fn reset_empties_regardless_of_size() {
        let mut store = ChatStore::new();
        for i in 0..50 {
            store.append_message(DEFAULT_SCOPE, message(&i.to_string(), "x"));
        }
        store.reset_messages(DEFAULT_SCOPE);
        assert!(store.scope(DEFAULT_SCOPE).messages.is_empty());

        store.reset_messages("fresh");
        assert!(store.scope("fresh").messages.is_empty());
    }

    #[test]
    fn reset_for_session_clears_state_and_goes_idle() {
        let mut store = ChatStore::new();
        store.set_session_id(DEFAULT_SCOPE, "one");
        store.append_message(DEFAULT_SCOPE, message("m1", "x"));
        store.set_error(DEFAULT_SCOPE, Some("stale".to_string()));
        store.set_connection_state(DEFAULT_SCOPE, ConnectionState::Open);

        store.reset_for_session(DEFAULT_SCOPE, "two");

        let state = store.scope(DEFAULT_SCOPE);
        assert_eq!(state.session_id, "two");
        assert!(state.messages.is_empty());
        assert_eq!(state.error, None);
        assert_eq!(state.connection_state, ConnectionState::Idle);
    }

    #[test]
    fn load_failure_keeps_messages_and_uses_fallback_for_blank_errors() {
        let mut store = ChatStore::new();
        store.append_message(DEFAULT_SCOPE, message("m1", "x"));

        store.begin_load(DEFAULT_SCOPE);
        assert!(store.scope(DEFAULT_SCOPE).is_loading);
        store.finish_load(DEFAULT_SCOPE, Err(" ".to_string()));

        let state = store.scope(DEFAULT_SCOPE);
        assert!(!state.is_loading);
        assert_eq!(state.error.as_deref(), Some(LOAD_FAILED_FALLBACK));
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn send_success_merges_returned_history_once() {
        let mut store = ChatStore::new();
        store.append_message(DEFAULT_SCOPE, message("m1", "earlier"));

        store.begin_send(DEFAULT_SCOPE);
        assert!(store.scope(DEFAULT_SCOPE).is_sending);
        store.finish_send(
            DEFAULT_SCOPE,
            Ok(vec![message("m1", "earlier"), message("m2", "hi")]),
        );
        // The stream echo of the same message must not duplicate it.
        store.append_message(DEFAULT_SCOPE, message("m2", "hi"));

        let state = store.scope(DEFAULT_SCOPE);
        assert!(!state.is_sending);
        assert_eq!(ids(&store, DEFAULT_SCOPE), vec!["m1", "m2"]);
    }

    #[test]
    fn send_failure_sets_error_and_clears_flag() {
        let mut store = ChatStore::new();
        store.begin_send(DEFAULT_SCOPE);
        store.finish_send(DEFAULT_SCOPE, Err("Network down".to_string()));
        let state = store.scope(DEFAULT_SCOPE);
        assert!(!state.is_sending);
        assert_eq!(state.error.as_deref(), Some("Network down"));
    }

    #[test]
    fn clear_failure_keeps_messages() {
        let mut store = ChatStore::new();
        store.append_message(DEFAULT_SCOPE, message("m1", "x"));
        store.begin_clear(DEFAULT_SCOPE);
        store.finish_clear(DEFAULT_SCOPE, Err("offline".to_string()));
        let state = store.scope(DEFAULT_SCOPE);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.error.as_deref(), Some("offline"));

        store.finish_clear(DEFAULT_SCOPE, Ok(()));
        let state = store.scope(DEFAULT_SCOPE);
        assert!(state.messages.is_empty());
        assert_eq!(state.error, None);
    }

    #[test]
    fn stream_events_only_touch_their_scope() {
        let mut store = ChatStore::new();
        store.append_message("default", message("m1", "private"));
        store.append_message("global-lobby", message("g1", "lobby"));

        apply_stream_event(
            &mut store,
            "default",
            StreamEvent::SessionCleared {
                session_id: "abc".to_string(),
            },
        );

        assert!(store.scope("default").messages.is_empty());
        assert_eq!(ids(&store, "global-lobby"), vec!["g1"]);
    }

    #[test]
    fn stream_error_keeps_messages_and_sync_clears_it() {
        let mut store = ChatStore::new();
        store.append_message(DEFAULT_SCOPE, message("m1", "x"));
        apply_stream_event(
            &mut store,
            DEFAULT_SCOPE,
            StreamEvent::Error {
                detail: "Invalid message payload.".to_string(),
            },
        );
        assert_eq!(store.scope(DEFAULT_SCOPE).messages.len(), 1);
        assert_eq!(
            store.scope(DEFAULT_SCOPE).error.as_deref(),
            Some("Invalid message payload.")
        );

        apply_stream_event(
            &mut store,
            DEFAULT_SCOPE,
            StreamEvent::SessionSync {
                session: ChatSessionSnapshot {
                    session_id: "abc".to_string(),
                    messages: vec![message("m2", "y")],
                },
            },
        );
        assert_eq!(ids(&store, DEFAULT_SCOPE), vec!["m2"]);
        assert_eq!(store.scope(DEFAULT_SCOPE).error, None);
    }

    #[test]
    fn every_mutation_bumps_revision() {
        let mut store = ChatStore::new();
        store.set_session_id(DEFAULT_SCOPE, "abc");
        let first = store.scope(DEFAULT_SCOPE).revision;
        store.set_connection_state(DEFAULT_SCOPE, ConnectionState::Connecting);
        assert!(store.scope(DEFAULT_SCOPE).revision > first);
    }
}
