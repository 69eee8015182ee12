//! Unit tests for terminal rendering.

use chat_bridge::frontend::{
    format_message, format_time, render_message, render_notice, render_transcript,
    ASSISTANT_LABEL, USER_LABEL,
};
use chat_bridge::models::message::{ChatMessage, Role};
use chat_bridge::transcript::Transcript;

#[test]
fn format_time_uses_clock_layout() {
    let text = format_time(1_700_000_000_000);

    assert_eq!(text.len(), 8);
    assert_eq!(text.as_bytes()[2], b':');
    assert_eq!(text.as_bytes()[5], b':');
}

#[test]
fn format_time_out_of_range_uses_placeholder() {
    assert_eq!(format_time(i64::MAX), "--:--:--");
}

#[test]
fn format_message_labels_by_role() {
    let user = ChatMessage::new("1", Role::User, "hello");
    let assistant = ChatMessage::new("1_reply", Role::Assistant, "hi there");

    let user_line = format_message(&user);
    let assistant_line = format_message(&assistant);

    assert!(user_line.starts_with('['));
    assert!(user_line.ends_with(&format!("] {USER_LABEL}> hello")));
    assert!(assistant_line.ends_with(&format!("] {ASSISTANT_LABEL}> hi there")));
}

#[test]
fn render_message_writes_one_line() {
    let mut out = Vec::new();

    render_message(&mut out, &ChatMessage::new("1", Role::User, "hello")).unwrap();

    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.ends_with("you> hello\n"));
}

#[test]
fn render_transcript_writes_entries_oldest_first() {
    let mut transcript = Transcript::new();
    transcript.append(ChatMessage::new("1", Role::User, "first"));
    transcript.append(ChatMessage::new("1_reply", Role::Assistant, "second"));
    let mut out = Vec::new();

    render_transcript(&mut out, &transcript).unwrap();

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("you> first"));
    assert!(lines[1].ends_with("grok> second"));
}

#[test]
fn render_notice_marks_status_lines() {
    let mut out = Vec::new();

    render_notice(&mut out, "Lost connection to backend; please restart the app.").unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "*** Lost connection to backend; please restart the app.\n"
    );
}
