mod chat;

use crate::app::{QuickAccount, SyncOptions};
use crate::domain::{ChatMessage, DEFAULT_SCOPE};
use crate::infra::{
    ApiConfig, ChatTransport, ClientInitError, FileStorage, HttpChatClient, KeyValueStorage,
    ResolveStateDirError, StorageError, TransportError,
};
use crate::ui::{ThemeMode, author_label, format_clock};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub use chat::{ChatInput, parse_chat_input};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    Command(CliCommand),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliCommand {
    Chat {
        session_id: Option<String>,
        scope: String,
        persist: bool,
    },
    Lobby,
    History {
        session_id: String,
    },
    Sessions,
    Health,
    Account(AccountAction),
    Theme(ThemeAction),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AccountAction {
    Show,
    Set(String),
    Reset,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ThemeAction {
    Show,
    Set(ThemeMode),
    Toggle,
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("unknown subcommand: {0}")]
    UnknownSubcommand(String),

    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing value for flag: {0}")]
    MissingFlagValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidFlagValue { flag: String, value: String },

    #[error("missing argument: {0}")]
    MissingArgument(String),

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(CliInvocation::PrintHelp);
    }
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        return Ok(CliInvocation::PrintVersion);
    }

    let mut iter = args.iter().skip(1);
    let Some(subcommand) = iter.next() else {
        return Ok(CliInvocation::Command(default_chat()));
    };
    if subcommand.starts_with('-') {
        let mut rest = vec![subcommand];
        rest.extend(iter);
        return parse_chat_flags(rest.into_iter()).map(CliInvocation::Command);
    }

    let command = match subcommand.as_str() {
        "chat" => parse_chat_flags(iter)?,
        "lobby" => {
            reject_extra(iter)?;
            CliCommand::Lobby
        }
        "history" => {
            let mut session_id: Option<String> = None;
            for arg in iter {
                if arg.starts_with('-') {
                    return Err(CliParseError::UnknownFlag(arg.to_string()));
                }
                if session_id.is_some() {
                    return Err(CliParseError::UnexpectedArgument(arg.to_string()));
                }
                session_id = crate::domain::normalize_session_id(arg);
            }
            let session_id =
                session_id.ok_or_else(|| CliParseError::MissingArgument("session-id".to_string()))?;
            CliCommand::History { session_id }
        }
        "sessions" => {
            reject_extra(iter)?;
            CliCommand::Sessions
        }
        "health" => {
            reject_extra(iter)?;
            CliCommand::Health
        }
        "account" => {
            let rest = iter.collect::<Vec<_>>();
            let action = match rest.first().map(|arg| arg.as_str()) {
                None | Some("show") => AccountAction::Show,
                Some("reset") => AccountAction::Reset,
                Some("set") => {
                    let name = rest[1..]
                        .iter()
                        .map(|arg| arg.as_str())
                        .collect::<Vec<_>>()
                        .join(" ");
                    if name.trim().is_empty() {
                        return Err(CliParseError::MissingArgument("name".to_string()));
                    }
                    return Ok(CliInvocation::Command(CliCommand::Account(AccountAction::Set(
                        name.trim().to_string(),
                    ))));
                }
                Some(other) => return Err(CliParseError::UnexpectedArgument(other.to_string())),
            };
            if let Some(extra) = rest.get(1) {
                return Err(CliParseError::UnexpectedArgument(extra.to_string()));
            }
            CliCommand::Account(action)
        }
        "theme" => {
            let rest = iter.collect::<Vec<_>>();
            let action = match rest.first().map(|arg| arg.as_str()) {
                None => ThemeAction::Show,
                Some("toggle") => ThemeAction::Toggle,
                Some(value) => ThemeAction::Set(ThemeMode::parse(value).ok_or_else(|| {
                    CliParseError::InvalidFlagValue {
                        flag: "theme".to_string(),
                        value: value.to_string(),
                    }
                })?),
            };
            if let Some(extra) = rest.get(1) {
                return Err(CliParseError::UnexpectedArgument(extra.to_string()));
            }
            CliCommand::Theme(action)
        }
        other => return Err(CliParseError::UnknownSubcommand(other.to_string())),
    };
    Ok(CliInvocation::Command(command))
}

fn default_chat() -> CliCommand {
    CliCommand::Chat {
        session_id: None,
        scope: DEFAULT_SCOPE.to_string(),
        persist: true,
    }
}

fn parse_chat_flags<'a>(
    mut args: impl Iterator<Item = &'a String>,
) -> Result<CliCommand, CliParseError> {
    let mut session_id: Option<String> = None;
    let mut scope = DEFAULT_SCOPE.to_string();
    let mut persist = true;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--session" | "-s" => {
                let value = args
                    .next()
                    .ok_or_else(|| CliParseError::MissingFlagValue("--session".to_string()))?;
                session_id = Some(non_blank("--session", value)?);
            }
            "--scope" => {
                let value = args
                    .next()
                    .ok_or_else(|| CliParseError::MissingFlagValue("--scope".to_string()))?;
                scope = non_blank("--scope", value)?;
            }
            "--no-persist" => {
                persist = false;
            }
            _ if arg.starts_with('-') => {
                return Err(CliParseError::UnknownFlag(arg.to_string()));
            }
            _ => {
                return Err(CliParseError::UnexpectedArgument(arg.to_string()));
            }
        }
    }

    Ok(CliCommand::Chat {
        session_id,
        scope,
        persist,
    })
}

fn non_blank(flag: &str, value: &str) -> Result<String, CliParseError> {
    crate::domain::normalize_session_id(value).ok_or_else(|| CliParseError::InvalidFlagValue {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}

fn reject_extra<'a>(mut args: impl Iterator<Item = &'a String>) -> Result<(), CliParseError> {
    match args.next() {
        Some(arg) if arg.starts_with('-') => Err(CliParseError::UnknownFlag(arg.to_string())),
        Some(arg) => Err(CliParseError::UnexpectedArgument(arg.to_string())),
        None => Ok(()),
    }
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error(transparent)]
    ClientInit(#[from] ClientInitError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    StateDir(#[from] ResolveStateDirError),

    #[error(transparent)]
    WriteOutput(#[from] io::Error),

    #[error("the lobby needs a display name.\nHint: run `chatsync account set <name>` first.")]
    MissingAccount,
}

/// Everything a command needs from the environment.
pub struct CliContext {
    pub config: ApiConfig,
    pub state_dir: PathBuf,
}

impl CliContext {
    pub fn from_env() -> Result<Self, CliRunError> {
        Ok(Self {
            config: ApiConfig::from_env(),
            state_dir: crate::infra::resolve_state_dir()?,
        })
    }

    fn storage(&self) -> Arc<dyn KeyValueStorage> {
        Arc::new(FileStorage::in_state_dir(&self.state_dir))
    }

    fn client(&self) -> Result<Arc<HttpChatClient>, CliRunError> {
        Ok(Arc::new(HttpChatClient::new(self.config.clone())?))
    }
}

pub fn run(command: CliCommand, context: &CliContext) -> Result<(), CliRunError> {
    match command {
        CliCommand::Chat {
            session_id,
            scope,
            persist,
        } => {
            let options = SyncOptions::scoped(&scope).with_persist(persist);
            chat::run_interactive(
                context.client()?,
                context.storage(),
                options,
                session_id.as_deref(),
            )
        }
        CliCommand::Lobby => {
            let storage = context.storage();
            if !QuickAccount::load(storage.clone()).is_ready() {
                return Err(CliRunError::MissingAccount);
            }
            chat::run_interactive(context.client()?, storage, SyncOptions::lobby(), None)
        }
        other => run_printing(other, context),
    }
}

fn run_printing(command: CliCommand, context: &CliContext) -> Result<(), CliRunError> {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    match command {
        CliCommand::Chat { .. } | CliCommand::Lobby => Ok(()),
        CliCommand::History { session_id } => {
            let client = context.client()?;
            let session = client.fetch_history(&session_id)?;
            for message in &session.messages {
                if !write_line(&mut out, &history_line(message))? {
                    return Ok(());
                }
            }
            out.flush()?;
            Ok(())
        }
        CliCommand::Sessions => {
            let client = context.client()?;
            for summary in client.list_sessions()? {
                let line = format!("{}\t{}", summary.session_id, summary.message_count);
                if !write_line(&mut out, &line)? {
                    return Ok(());
                }
            }
            out.flush()?;
            Ok(())
        }
        CliCommand::Health => {
            let client = context.client()?;
            let health = client.health_check()?;
            write_line(
                &mut out,
                &format!("{}\t{}", health.status, client.config().base_url()),
            )?;
            out.flush()?;
            Ok(())
        }
        CliCommand::Account(action) => {
            let mut account = QuickAccount::load(context.storage());
            match action {
                AccountAction::Show => {}
                AccountAction::Set(name) => account.save(&name)?,
                AccountAction::Reset => account.reset()?,
            }
            write_line(&mut out, account.display_name())?;
            out.flush()?;
            Ok(())
        }
        CliCommand::Theme(action) => {
            let storage = context.storage();
            let current = ThemeMode::load(storage.as_ref());
            let next = match action {
                ThemeAction::Show => current,
                ThemeAction::Set(mode) => mode,
                ThemeAction::Toggle => current.toggle(),
            };
            if action != ThemeAction::Show {
                next.save(storage.as_ref())?;
            }
            write_line(&mut out, next.as_str())?;
            out.flush()?;
            Ok(())
        }
    }
}

/// `created_at<TAB>label<TAB>content`, one message per line.
fn history_line(message: &ChatMessage) -> String {
    let clock = format_clock(&message.created_at);
    let content = message.content.replace('\n', " ");
    format!("{clock}\t{}\t{content}", author_label(message))
}

fn write_line(out: &mut impl Write, line: &str) -> io::Result<bool> {
    match writeln!(out, "{line}") {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(false),
        Err(error) => Err(error),
    }
}
