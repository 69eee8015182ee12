//! Unit tests for the backend reader and writer tasks over in-memory pipes.

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use chat_bridge::bridge::{BridgeEvent, EventHub};
use chat_bridge::protocol::envelope::{HistoryEntry, RequestEnvelope};
use chat_bridge::protocol::reader::{run_reader, ReaderExit};
use chat_bridge::protocol::router::ResponseRouter;
use chat_bridge::protocol::writer::run_writer;
use chat_bridge::models::message::Role;
use chat_bridge::AppError;

fn drain(rx: &mut tokio::sync::broadcast::Receiver<BridgeEvent>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let BridgeEvent::Reply(message) = event {
            out.push((message.id, message.content));
        }
    }
    out
}

#[tokio::test]
async fn reader_routes_valid_lines_and_skips_malformed_ones() {
    let hub = EventHub::new(16);
    let mut rx = hub.subscribe();
    let input: &[u8] = b"{\"id\":\"1\",\"reply\":\"hi\"}\nnot json\n\n{\"id\":\"2\",\"reply\":\"there\"}\n";

    let report = run_reader(input, ResponseRouter::new(hub), CancellationToken::new()).await;

    assert_eq!(report.exit, ReaderExit::Eof);
    assert_eq!(report.lines, 4);
    assert_eq!(report.dispatched, 2);
    assert_eq!(
        drain(&mut rx),
        [
            ("1_reply".to_owned(), "hi".to_owned()),
            ("2_reply".to_owned(), "there".to_owned()),
        ]
    );
}

#[tokio::test]
async fn reader_flushes_unterminated_tail_at_eof() {
    let hub = EventHub::new(16);
    let mut rx = hub.subscribe();
    let input: &[u8] = b"{\"id\":\"1\",\"reply\":\"hi\"}\n{\"id\":2,\"error\":\"boom\"}";

    let report = run_reader(input, ResponseRouter::new(hub), CancellationToken::new()).await;

    assert_eq!(report.exit, ReaderExit::Eof);
    assert_eq!(report.dispatched, 2);
    assert_eq!(
        drain(&mut rx),
        [
            ("1_reply".to_owned(), "hi".to_owned()),
            ("2_error".to_owned(), "Error: boom".to_owned()),
        ]
    );
}

#[tokio::test]
async fn reader_survives_invalid_utf8_line() {
    let hub = EventHub::new(16);
    let mut rx = hub.subscribe();
    let input: &[u8] = b"\xff\xfe\n{\"id\":\"1\",\"reply\":\"ok\"}\n";

    let report = run_reader(input, ResponseRouter::new(hub), CancellationToken::new()).await;

    assert_eq!(report.exit, ReaderExit::Eof);
    assert_eq!(drain(&mut rx), [("1_reply".to_owned(), "ok".to_owned())]);
}

#[tokio::test]
async fn cancelled_reader_routes_nothing() {
    let hub = EventHub::new(16);
    let mut rx = hub.subscribe();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let input: &[u8] = b"{\"id\":\"1\",\"reply\":\"hi\"}\n";

    let report = run_reader(input, ResponseRouter::new(hub), cancel).await;

    assert_eq!(report.exit, ReaderExit::Cancelled);
    assert_eq!(report.lines, 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn writer_emits_one_compact_line_per_request() {
    let (host_end, mut backend_end) = tokio::io::duplex(4096);
    let (tx, rx) = mpsc::unbounded_channel();

    let writer = tokio::spawn(run_writer(host_end, rx, CancellationToken::new()));
    tx.send(RequestEnvelope::new("1", "hello")).unwrap();
    tx.send(
        RequestEnvelope::new("2", "again").with_history(vec![HistoryEntry {
            role: Role::User,
            content: "hello".into(),
        }]),
    )
    .unwrap();
    drop(tx);

    writer.await.unwrap().expect("writer finishes cleanly");
    let mut written = String::new();
    backend_end.read_to_string(&mut written).await.unwrap();

    assert_eq!(
        written,
        "{\"id\":\"1\",\"message\":\"hello\"}\n\
         {\"id\":\"2\",\"message\":\"again\",\"messages\":[{\"role\":\"user\",\"content\":\"hello\"}]}\n"
    );
}

#[tokio::test]
async fn writer_escapes_newlines_inside_message_text() {
    let (host_end, mut backend_end) = tokio::io::duplex(4096);
    let (tx, rx) = mpsc::unbounded_channel();

    let writer = tokio::spawn(run_writer(host_end, rx, CancellationToken::new()));
    tx.send(RequestEnvelope::new("1", "line one\nline two")).unwrap();
    drop(tx);
    writer.await.unwrap().unwrap();

    let mut written = String::new();
    backend_end.read_to_string(&mut written).await.unwrap();
    assert_eq!(written.matches('\n').count(), 1);
    assert!(written.contains("line one\\nline two"));
}

#[tokio::test]
async fn writer_stops_on_cancellation() {
    let (host_end, _backend_end) = tokio::io::duplex(64);
    let (_tx, rx) = mpsc::unbounded_channel::<RequestEnvelope>();
    let cancel = CancellationToken::new();
    cancel.cancel();

    run_writer(host_end, rx, cancel).await.expect("cancelled writer exits cleanly");
}

#[tokio::test]
async fn writer_reports_io_error_when_backend_end_is_gone() {
    let (host_end, backend_end) = tokio::io::duplex(64);
    drop(backend_end);
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(RequestEnvelope::new("1", "hello")).unwrap();

    let result = run_writer(host_end, rx, CancellationToken::new()).await;

    assert!(matches!(result, Err(AppError::Io(_))));
}
