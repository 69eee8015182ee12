//! Line-oriented terminal rendering for the host binary.

use std::io::{self, Write};

use chrono::{DateTime, Local};

use crate::models::message::{ChatMessage, Role};
use crate::transcript::Transcript;

/// Label shown for assistant messages.
pub const ASSISTANT_LABEL: &str = "grok";

/// Label shown for user messages.
pub const USER_LABEL: &str = "you";

/// Shown while at least one request is awaiting a reply.
pub const THINKING_NOTICE: &str = "Grok is thinking...";

/// Local wall-clock time of a message, `--:--:--` if out of range.
#[must_use]
pub fn format_time(timestamp_millis: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_millis).map_or_else(
        || "--:--:--".to_owned(),
        |utc| utc.with_timezone(&Local).format("%H:%M:%S").to_string(),
    )
}

/// One display line for `message`.
#[must_use]
pub fn format_message(message: &ChatMessage) -> String {
    let label = match message.role {
        Role::User => USER_LABEL,
        Role::Assistant => ASSISTANT_LABEL,
    };
    format!(
        "[{}] {label}> {}",
        format_time(message.timestamp),
        message.content
    )
}

/// Write one message.
///
/// # Errors
///
/// Propagates write failures on `out`.
pub fn render_message<W: Write>(out: &mut W, message: &ChatMessage) -> io::Result<()> {
    writeln!(out, "{}", format_message(message))?;
    out.flush()
}

/// Write the whole transcript, oldest first.
///
/// # Errors
///
/// Propagates write failures on `out`.
pub fn render_transcript<W: Write>(out: &mut W, transcript: &Transcript) -> io::Result<()> {
    for message in transcript.messages() {
        writeln!(out, "{}", format_message(message))?;
    }
    out.flush()
}

/// Write a status notice.
///
/// # Errors
///
/// Propagates write failures on `out`.
pub fn render_notice<W: Write>(out: &mut W, notice: &str) -> io::Result<()> {
    writeln!(out, "*** {notice}")?;
    out.flush()
}
