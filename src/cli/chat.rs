use crate::app::{QuickAccount, SessionSync, SyncOptions};
use crate::cli::CliRunError;
use crate::domain::{ChatStore, validate_outgoing};
use crate::infra::{ChatTransport, KeyValueStorage};
use crate::ui::{ThemeMode, TranscriptView};
use crossterm::style::Stylize;
use log::debug;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const CHAT_HELP: &str = "commands:\n  /new [id]     start a fresh conversation (or switch to id)\n  /join <id>    join an existing conversation\n  /clear        delete every message in this conversation\n  /name <name>  set your display name (empty to reset)\n  /theme        toggle light/dark colors\n  /status       show session and connection details\n  /quit         leave";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChatInput {
    Empty,
    Message(String),
    New(Option<String>),
    Join(String),
    Clear,
    Name(String),
    Theme,
    Status,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_chat_input(line: &str) -> ChatInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ChatInput::Empty;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return ChatInput::Message(trimmed.to_string());
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));
    match name {
        "new" => ChatInput::New((!rest.is_empty()).then(|| rest.to_string())),
        "join" if !rest.is_empty() => ChatInput::Join(rest.to_string()),
        "clear" => ChatInput::Clear,
        "name" => ChatInput::Name(rest.to_string()),
        "theme" => ChatInput::Theme,
        "status" => ChatInput::Status,
        "help" | "?" => ChatInput::Help,
        "quit" | "exit" | "q" => ChatInput::Quit,
        _ => ChatInput::Unknown(trimmed.to_string()),
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Flow {
    Continue,
    Quit,
}

/// One terminal conversation: the store, its synchronization core and the
/// printing state that goes with it.
struct ChatScreen<T: ChatTransport> {
    store: ChatStore,
    sync: SessionSync<T>,
    storage: Arc<dyn KeyValueStorage>,
    account: QuickAccount,
    theme: ThemeMode,
    view: TranscriptView,
    last_revision: Option<u64>,
    identity_required: bool,
}

impl<T: ChatTransport> ChatScreen<T> {
    fn new(options: SyncOptions, transport: Arc<T>, storage: Arc<dyn KeyValueStorage>) -> Self {
        let identity_required = options.required_session_id.is_some();
        Self {
            store: ChatStore::new(),
            sync: SessionSync::new(options, transport, storage.clone()),
            account: QuickAccount::load(storage.clone()),
            theme: ThemeMode::load(storage.as_ref()),
            storage,
            view: TranscriptView::new(),
            last_revision: None,
            identity_required,
        }
    }

    fn render(&mut self, out: &mut impl Write) -> io::Result<()> {
        let state = self.sync.state(&self.store);
        if self.last_revision == Some(state.revision) {
            return Ok(());
        }
        self.last_revision = Some(state.revision);

        let palette = self.theme.palette();
        for line in self.view.update(state, self.account.viewer_name()) {
            writeln!(out, "{}", line.render(&palette))?;
        }
        out.flush()
    }

    fn notice(&self, out: &mut impl Write, text: &str) -> io::Result<()> {
        writeln!(out, "{}", text.with(self.theme.palette().muted))?;
        out.flush()
    }

    fn handle(&mut self, input: ChatInput, out: &mut impl Write) -> Result<Flow, CliRunError> {
        match input {
            ChatInput::Empty => {}
            ChatInput::Message(draft) => {
                match validate_outgoing(&draft, self.account.viewer_name(), self.identity_required) {
                    Ok(message) => {
                        let sent = self.sync.send_user_message(
                            &mut self.store,
                            &message.content,
                            message.author_name.as_deref(),
                        );
                        if let Err(error) = sent {
                            debug!("send failed: {error}");
                            self.view.forget_error();
                        }
                    }
                    Err(error) => self.notice(out, &error.to_string())?,
                }
            }
            ChatInput::New(preferred) => {
                if self.sync.is_pinned() {
                    self.notice(out, "this conversation is pinned")?;
                } else {
                    self.sync.start_new_session(&mut self.store, preferred.as_deref());
                }
            }
            ChatInput::Join(target) => {
                if self.sync.is_pinned() {
                    self.notice(out, "this conversation is pinned")?;
                } else if !self.sync.join_session(&mut self.store, &target) {
                    self.notice(out, "already in that conversation")?;
                }
            }
            ChatInput::Clear => {
                if let Err(error) = self.sync.clear_conversation(&mut self.store) {
                    debug!("clear failed: {error}");
                    self.view.forget_error();
                }
            }
            ChatInput::Name(name) => {
                self.account.save(&name)?;
                let text = format!("you are {}", self.account.display_name());
                self.notice(out, &text)?;
            }
            ChatInput::Theme => {
                self.theme = self.theme.toggle();
                self.theme.save(self.storage.as_ref())?;
                let text = format!("theme: {}", self.theme.as_str());
                self.notice(out, &text)?;
            }
            ChatInput::Status => {
                let state = self.sync.state(&self.store);
                let text = format!(
                    "session {} | {} | {} messages | you are {}",
                    state.session_id,
                    state.connection_state.label(),
                    state.messages.len(),
                    self.account.display_name()
                );
                self.notice(out, &text)?;
            }
            ChatInput::Help => self.notice(out, CHAT_HELP)?,
            ChatInput::Quit => return Ok(Flow::Quit),
            ChatInput::Unknown(command) => {
                self.notice(out, &format!("unknown command: {command} (try /help)"))?;
            }
        }
        Ok(Flow::Continue)
    }
}

/// Runs a conversation until `/quit` or end of input.
pub(super) fn run_interactive<T: ChatTransport>(
    transport: Arc<T>,
    storage: Arc<dyn KeyValueStorage>,
    options: SyncOptions,
    session_id: Option<&str>,
) -> Result<(), CliRunError> {
    let scope = options.scope.clone();
    let mut screen = ChatScreen::new(options, transport, storage);
    if let Some(session_id) = session_id {
        screen.store.set_session_id(&scope, session_id);
    }
    screen.sync.reconcile(&mut screen.store);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    screen.notice(&mut out, "type a message, /help for commands")?;
    if screen.identity_required && !screen.account.is_ready() {
        screen.notice(&mut out, "set a display name with /name <name> to start chatting")?;
    }

    let input = spawn_line_reader();
    'session: loop {
        screen.sync.wait_and_pump(&mut screen.store, POLL_INTERVAL);
        screen.render(&mut out)?;

        loop {
            match input.try_recv() {
                Ok(line) => {
                    if screen.handle(parse_chat_input(&line), &mut out)? == Flow::Quit {
                        break 'session;
                    }
                    screen.sync.pump(&mut screen.store);
                    screen.render(&mut out)?;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'session,
            }
        }
    }

    screen.sync.shutdown();
    Ok(())
}

fn spawn_line_reader() -> Receiver<String> {
    let (tx, rx) = channel::<String>();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatMessage, ChatSessionSnapshot, ConnectionState, MessagePayload};
    use crate::infra::{MemoryStorage, StreamSink, StreamSubscription, TransportError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        posted: Mutex<Vec<MessagePayload>>,
    }

    impl ChatTransport for RecordingTransport {
        fn fetch_history(&self, session_id: &str) -> Result<ChatSessionSnapshot, TransportError> {
            Ok(ChatSessionSnapshot {
                session_id: session_id.to_string(),
                messages: Vec::new(),
            })
        }

        fn post_message(
            &self,
            session_id: &str,
            payload: &MessagePayload,
        ) -> Result<ChatSessionSnapshot, TransportError> {
            let mut posted = self.posted.lock().expect("posted");
            posted.push(payload.clone());
            let messages = posted
                .iter()
                .enumerate()
                .map(|(index, payload)| ChatMessage {
                    id: format!("m{index}"),
                    role: payload.role,
                    content: payload.content.clone(),
                    created_at: "2026-02-01T10:00:00Z".to_string(),
                    author_name: payload.author_name.clone(),
                })
                .collect();
            Ok(ChatSessionSnapshot {
                session_id: session_id.to_string(),
                messages,
            })
        }

        fn delete_session(&self, _session_id: &str) -> Result<(), TransportError> {
            Err(TransportError::from_response(500, ""))
        }

        fn open_stream(&self, _session_id: &str, sink: StreamSink) -> StreamSubscription {
            sink.state(ConnectionState::Connecting);
            StreamSubscription::inert()
        }
    }

    fn screen(options: SyncOptions) -> (ChatScreen<RecordingTransport>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let mut screen = ChatScreen::new(options, transport.clone(), Arc::new(MemoryStorage::new()));
        screen.sync.reconcile(&mut screen.store);
        (screen, transport)
    }

    #[test]
    fn parses_slash_commands_and_plain_messages() {
        assert_eq!(parse_chat_input("   "), ChatInput::Empty);
        assert_eq!(parse_chat_input(" hello "), ChatInput::Message("hello".to_string()));
        assert_eq!(parse_chat_input("/new"), ChatInput::New(None));
        assert_eq!(
            parse_chat_input("/new  team-sync "),
            ChatInput::New(Some("team-sync".to_string()))
        );
        assert_eq!(parse_chat_input("/join abc"), ChatInput::Join("abc".to_string()));
        assert_eq!(parse_chat_input("/join"), ChatInput::Unknown("/join".to_string()));
        assert_eq!(parse_chat_input("/name"), ChatInput::Name(String::new()));
        assert_eq!(parse_chat_input("/quit"), ChatInput::Quit);
        assert_eq!(parse_chat_input("/dance"), ChatInput::Unknown("/dance".to_string()));
    }

    #[test]
    fn lobby_requires_a_name_before_sending() {
        let (mut screen, transport) = screen(SyncOptions::lobby());
        let mut out = Vec::new();

        screen
            .handle(ChatInput::Message("hi all".to_string()), &mut out)
            .expect("handle");
        assert!(transport.posted.lock().expect("posted").is_empty());
        assert!(String::from_utf8_lossy(&out).contains("set a display name first"));

        screen.handle(ChatInput::Name(" Ada ".to_string()), &mut out).expect("name");
        screen
            .handle(ChatInput::Message("hi all".to_string()), &mut out)
            .expect("handle");
        let posted = transport.posted.lock().expect("posted");
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].author_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn pinned_conversation_refuses_to_switch() {
        let (mut screen, _transport) = screen(SyncOptions::lobby());
        let mut out = Vec::new();
        screen.handle(ChatInput::New(None), &mut out).expect("handle");
        screen.handle(ChatInput::Join("abc".to_string()), &mut out).expect("handle");
        assert_eq!(screen.sync.state(&screen.store).session_id, "global-lobby");
        assert!(String::from_utf8_lossy(&out).contains("pinned"));
    }

    #[test]
    fn failed_clear_reprints_the_error_banner() {
        let (mut screen, _transport) = screen(SyncOptions::default());
        let mut out = Vec::new();

        screen.handle(ChatInput::Clear, &mut out).expect("clear");
        screen.render(&mut out).expect("render");
        screen.handle(ChatInput::Clear, &mut out).expect("clear");
        screen.render(&mut out).expect("render");

        let printed = String::from_utf8_lossy(&out);
        assert_eq!(
            printed.matches("Request failed with status code 500").count(),
            2
        );
    }

    #[test]
    fn quit_stops_the_loop() {
        let (mut screen, _transport) = screen(SyncOptions::default());
        let mut out = Vec::new();
        assert_eq!(screen.handle(ChatInput::Quit, &mut out).expect("quit"), Flow::Quit);
    }
}
