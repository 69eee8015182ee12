#![forbid(unsafe_code)]

//! `chat-bridge` — terminal chat host binary.
//!
//! Checks the credential, discovers a backend runtime, spawns the backend
//! script, then runs a line-oriented chat loop on the terminal until EOF,
//! `/quit`, or a shutdown signal. Any startup failure is fatal: the message
//! is printed and the process exits with status 1 before the chat loop
//! starts.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use chat_bridge::backend::supervisor::BackendSupervisor;
use chat_bridge::boundary::ErrorBoundary;
use chat_bridge::bridge::{Bridge, BridgeEvent, EventHub, RequestSink};
use chat_bridge::frontend::{render_message, render_notice, render_transcript, THINKING_NOTICE};
use chat_bridge::session::ChatSession;
use chat_bridge::{AppError, BridgeConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "chat-bridge", about = "Terminal chat host for a local LLM backend", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the project root holding the backend script and virtualenv.
    #[arg(long)]
    project_root: Option<PathBuf>,
}

/// What the input loop should do after a line of user input.
enum InputOutcome {
    Continue,
    Quit,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }
    info!("chat-bridge bootstrap");

    let outcome = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))
        .and_then(|runtime| runtime.block_on(run(args)));

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, fatal = err.is_fatal(), "chat-bridge stopped with an error");
            eprintln!("chat-bridge cannot continue: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load_from_path(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(root) = args.project_root {
        config.project_root = root;
    }
    config.validate()?;
    info!(project_root = %config.project_root.display(), "configuration loaded");

    // ── Start the backend (fail fast) ───────────────────
    let hub = EventHub::new(config.event_capacity);
    let mut events = hub.subscribe();
    let supervisor = Arc::new(BackendSupervisor::start(&config, hub.clone()).await?);
    let sink: Arc<dyn RequestSink> = Arc::clone(&supervisor) as Arc<dyn RequestSink>;
    let bridge = Bridge::new(sink, hub);
    info!("backend ready");

    // ── Chat loop ───────────────────────────────────────
    let mut session = ChatSession::new(config.include_history);
    let mut boundary = ErrorBoundary::new();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }

            line = input.next_line() => match line {
                Ok(Some(text)) => {
                    if let InputOutcome::Quit =
                        handle_input(&text, &bridge, &mut session, &mut boundary).await
                    {
                        break;
                    }
                }
                Ok(None) => {
                    info!("input closed");
                    break;
                }
                Err(err) => {
                    warn!(%err, "failed to read terminal input");
                    break;
                }
            },

            event = events.recv() => match event {
                Ok(event) => {
                    session.apply(event.clone());
                    paint(&mut boundary, |out| match &event {
                        BridgeEvent::Reply(message) => render_message(out, message),
                        BridgeEvent::ConnectionLost { message, .. } => render_notice(out, message),
                    });
                }
                Err(RecvError::Lagged(skipped)) => {
                    let notice = session.events_missed(skipped);
                    paint(&mut boundary, |out| render_notice(out, &notice));
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    supervisor.shutdown().await;
    info!("chat-bridge shut down");
    Ok(())
}

/// Handle one line typed by the user.
async fn handle_input(
    text: &str,
    bridge: &Bridge,
    session: &mut ChatSession,
    boundary: &mut ErrorBoundary,
) -> InputOutcome {
    match text.trim() {
        "/quit" => return InputOutcome::Quit,
        "/restart" => {
            boundary.reset();
            paint(boundary, |out| render_transcript(out, session.transcript()));
            return InputOutcome::Continue;
        }
        _ => {}
    }

    let request = match session.submit(text) {
        Ok(request) => request,
        Err(AppError::EmptyMessage) => return InputOutcome::Continue,
        Err(err) => {
            paint(boundary, |out| render_notice(out, &err.to_string()));
            return InputOutcome::Continue;
        }
    };

    let request_id = request.id.clone();
    let was_loading = session.pending_count() > 1;
    match bridge.send_to_backend(request).await {
        Ok(()) => {
            if !was_loading {
                paint(boundary, |out| render_notice(out, THINKING_NOTICE));
            }
        }
        Err(err) => {
            session.abandon(&request_id);
            warn!(%err, id = %request_id, "request not delivered");
            paint(boundary, |out| render_notice(out, &err.to_string()));
        }
    }
    InputOutcome::Continue
}

/// Run one render pass to stdout inside the error boundary.
fn paint<F>(boundary: &mut ErrorBoundary, render: F)
where
    F: FnOnce(&mut std::io::StdoutLock<'static>) -> std::io::Result<()>,
{
    let mut out = std::io::stdout().lock();
    if boundary.guard(|| render(&mut out)).is_none() {
        if let Some(lines) = boundary.fallback_view() {
            for line in lines {
                // Best effort: stdout itself may be what failed.
                let _ = writeln!(out, "{line}");
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
