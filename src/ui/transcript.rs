use crate::domain::{ChatMessage, ChatRole, ConnectionState, ScopeState};
use crate::ui::Palette;
use crossterm::style::Stylize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

pub fn author_label(message: &ChatMessage) -> String {
    match message.author_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => message.role.label().to_string(),
    }
}

/// A message is the viewer's own when its author matches the viewer name
/// (case-insensitive). Without a viewer name every user message counts.
pub fn is_outbound(message: &ChatMessage, viewer_name: Option<&str>) -> bool {
    let viewer = viewer_name.map(str::trim).unwrap_or_default();
    if viewer.is_empty() {
        return message.role == ChatRole::User;
    }
    let author = message.author_name.as_deref().map(str::trim).unwrap_or_default();
    !author.is_empty() && author.to_lowercase() == viewer.to_lowercase()
}

/// `HH:MM` in the timestamp's own offset; empty when unparseable.
pub fn format_clock(created_at: &str) -> String {
    let Ok(at) = OffsetDateTime::parse(created_at.trim(), &Rfc3339) else {
        return String::new();
    };
    at.format(format_description!("[hour]:[minute]"))
        .unwrap_or_default()
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TranscriptLine {
    Session(String),
    Divider,
    Message {
        label: String,
        clock: String,
        content: String,
        outbound: bool,
    },
    Error(String),
    Status(ConnectionState),
}

impl TranscriptLine {
    fn message(message: &ChatMessage, viewer_name: Option<&str>) -> Self {
        Self::Message {
            label: author_label(message),
            clock: format_clock(&message.created_at),
            content: message.content.clone(),
            outbound: is_outbound(message, viewer_name),
        }
    }

    pub fn render(&self, palette: &Palette) -> String {
        match self {
            Self::Session(id) => format!(
                "{} {}",
                "session".with(palette.muted),
                id.as_str().with(palette.accent).bold()
            ),
            Self::Divider => format!("{}", "────────".with(palette.muted)),
            Self::Message {
                label,
                clock,
                content,
                outbound,
            } => {
                let color = if *outbound { palette.outbound } else { palette.fg };
                let clock = if clock.is_empty() {
                    String::new()
                } else {
                    format!("{} ", clock.as_str().with(palette.muted))
                };
                format!(
                    "{clock}{} {}",
                    format!("{label}:").with(color).bold(),
                    content.as_str().with(color)
                )
            }
            Self::Error(message) => format!("{}", format!("! {message}").with(palette.error)),
            Self::Status(state) => {
                let color = match state {
                    ConnectionState::Open => palette.success,
                    ConnectionState::Closed => palette.error,
                    ConnectionState::Idle | ConnectionState::Connecting => palette.muted,
                };
                format!("{}", format!("[{}]", state.label()).with(color))
            }
        }
    }
}

/// Turns successive scope snapshots into the lines a scrolling terminal
/// still needs to print.
#[derive(Debug, Default)]
pub struct TranscriptView {
    session_id: String,
    printed: Vec<String>,
    last_error: Option<String>,
    last_connection: Option<ConnectionState>,
}

impl TranscriptView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next update print the current error again, even if unchanged.
    pub fn forget_error(&mut self) {
        self.last_error = None;
    }

    pub fn update(&mut self, state: &ScopeState, viewer_name: Option<&str>) -> Vec<TranscriptLine> {
        let mut lines = Vec::new();

        if state.session_id != self.session_id {
            self.session_id = state.session_id.clone();
            if !self.printed.is_empty() {
                lines.push(TranscriptLine::Divider);
                self.printed.clear();
            }
            if !self.session_id.is_empty() {
                lines.push(TranscriptLine::Session(self.session_id.clone()));
            }
        }

        if self.last_connection != Some(state.connection_state) {
            self.last_connection = Some(state.connection_state);
            lines.push(TranscriptLine::Status(state.connection_state));
        }

        let extends_printed = self.printed.len() <= state.messages.len()
            && self
                .printed
                .iter()
                .zip(&state.messages)
                .all(|(id, message)| *id == message.id);
        let start = if extends_printed {
            self.printed.len()
        } else {
            lines.push(TranscriptLine::Divider);
            self.printed.clear();
            0
        };
        for message in &state.messages[start..] {
            self.printed.push(message.id.clone());
            lines.push(TranscriptLine::message(message, viewer_name));
        }

        if state.error != self.last_error {
            self.last_error = state.error.clone();
            if let Some(error) = &state.error {
                lines.push(TranscriptLine::Error(error.clone()));
            }
        }

        lines
    }
}
