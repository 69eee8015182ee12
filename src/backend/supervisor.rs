//! Backend supervisor.
//!
//! Owns exactly one backend process per application run. The raw process
//! handle never leaves this module: callers see a [`BackendStatus`] and the
//! [`send`](BackendSupervisor::send) / [`shutdown`](BackendSupervisor::shutdown)
//! operations.
//!
//! Two background tasks serve a running backend:
//! - the writer ([`run_writer`]) drains the outbound request channel into
//!   the child's stdin;
//! - the session task runs the reader ([`run_reader`]) over stdout and
//!   watches for process exit.
//!
//! On exit the session task lets the reader drain what the process already
//! wrote (bounded by [`EXIT_DRAIN_GRACE`]), stops it, and only then publishes
//! [`BridgeEvent::ConnectionLost`] for a non-zero exit. Observers therefore
//! never see a reply after the connection-lost notice. There is no restart.

use std::future::Future;
use std::pin::Pin;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, ChildStdout};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::backend::discovery;
use crate::backend::spawner::{spawn_backend, BackendCommand, BackendProcess};
use crate::bridge::{BridgeEvent, EventHub, RequestSink};
use crate::config::BridgeConfig;
use crate::protocol::envelope::RequestEnvelope;
use crate::protocol::reader::run_reader;
use crate::protocol::router::ResponseRouter;
use crate::protocol::writer::run_writer;
use crate::{AppError, Result};

/// How long the reader may keep draining stdout after the process exited.
pub const EXIT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Lifecycle of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    /// The process is running and accepting requests.
    Running,
    /// The process exited on its own.
    Exited {
        /// Exit code, `None` when terminated by a signal.
        exit_code: Option<i32>,
    },
    /// The host killed the process during shutdown.
    ShutDown,
}

impl BackendStatus {
    /// Whether requests can currently be written.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// How the process left the `Running` state.
enum ProcessExit {
    Exited(std::io::Result<ExitStatus>),
    Killed,
}

/// Supervisor for the single backend process.
#[derive(Debug)]
pub struct BackendSupervisor {
    status: watch::Receiver<BackendStatus>,
    outbound: mpsc::UnboundedSender<RequestEnvelope>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BackendSupervisor {
    /// Run the startup sequence and spawn the backend.
    ///
    /// 1. Require the credential in the environment.
    /// 2. Discover a runtime.
    /// 3. Spawn the backend script with it.
    ///
    /// The credential is checked first, so a missing credential never leads
    /// to a probe or a spawn. Failures are not retried.
    ///
    /// # Errors
    ///
    /// - [`AppError::Credential`] — the credential variable is missing.
    /// - [`AppError::RuntimeNotFound`] — no candidate passed its probe.
    /// - [`AppError::Spawn`] — the OS refused to start the process.
    pub async fn start(config: &BridgeConfig, hub: EventHub) -> Result<Self> {
        config.require_credential()?;
        let runtime = discovery::discover(config).await?;
        let command = BackendCommand::for_runtime(&runtime, config);
        Self::spawn(&command, hub, config.connection_lost_message.clone())
    }

    /// Spawn `command` and start serving it.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Spawn`] if the process cannot be started.
    pub fn spawn(command: &BackendCommand, hub: EventHub, lost_message: String) -> Result<Self> {
        let BackendProcess {
            child,
            stdin,
            stdout,
        } = spawn_backend(command)?;

        let (status_tx, status_rx) = watch::channel(BackendStatus::Running);
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let writer_cancel = cancel.child_token();

        let writer_token = writer_cancel.clone();
        let writer = tokio::spawn(async move {
            if let Err(err) = run_writer(stdin, msg_rx, writer_token).await {
                warn!(%err, "backend writer stopped");
            }
        });

        let session = tokio::spawn(supervise(
            Session {
                child,
                stdout,
                router: ResponseRouter::new(hub.clone()),
                hub,
                lost_message,
                status_tx,
                writer_cancel,
            },
            cancel.clone(),
        ));

        Ok(Self {
            status: status_rx,
            outbound: msg_tx,
            cancel,
            tasks: Mutex::new(vec![writer, session]),
        })
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> BackendStatus {
        *self.status.borrow()
    }

    /// Whether the backend is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status().is_running()
    }

    /// Watch lifecycle transitions.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<BackendStatus> {
        self.status.clone()
    }

    /// Wait until the backend leaves the `Running` state.
    pub async fn stopped(&self) -> BackendStatus {
        let mut rx = self.status.clone();
        // The wait guard borrows `rx`; copy the status out before returning.
        let status = match rx.wait_for(|status| !status.is_running()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        status
    }

    /// Write `request` to the backend as one NDJSON line.
    ///
    /// Never waits: the request is queued for the writer and success means
    /// only that. A backend that stops reading stdin cannot stall callers.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BackendUnavailable`] if the process has stopped or
    /// its input stream is closed.
    pub fn send(&self, request: RequestEnvelope) -> Result<()> {
        let status = self.status();
        if !status.is_running() {
            return Err(AppError::BackendUnavailable(format!(
                "backend is not running ({status:?})"
            )));
        }

        self.outbound
            .send(request)
            .map_err(|_| AppError::BackendUnavailable("backend input stream is closed".into()))
    }

    /// Forcibly terminate the backend. In-flight requests are abandoned.
    ///
    /// Idempotent; later calls return once the first has finished.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            if let Err(err) = task.await {
                error!(%err, "backend task ended abnormally");
            }
        }
        info!(status = ?self.status(), "backend supervisor shut down");
    }
}

impl Drop for BackendSupervisor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl RequestSink for BackendSupervisor {
    fn send(&self, request: RequestEnvelope) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(std::future::ready(BackendSupervisor::send(self, request)))
    }
}

/// Everything the session task owns for one process.
struct Session {
    child: Child,
    stdout: ChildStdout,
    router: ResponseRouter,
    hub: EventHub,
    lost_message: String,
    status_tx: watch::Sender<BackendStatus>,
    writer_cancel: CancellationToken,
}

/// Read stdout and wait for exit; publish the outcome.
async fn supervise(session: Session, cancel: CancellationToken) {
    let Session {
        mut child,
        stdout,
        router,
        hub,
        lost_message,
        status_tx,
        writer_cancel,
    } = session;

    let reader_cancel = CancellationToken::new();
    let mut reader = tokio::spawn(run_reader(stdout, router, reader_cancel.clone()));

    let exit = tokio::select! {
        result = child.wait() => ProcessExit::Exited(result),
        () = cancel.cancelled() => {
            info!("shutdown requested, killing backend");
            if let Err(err) = child.kill().await {
                warn!(%err, "failed to kill backend process");
            }
            ProcessExit::Killed
        }
    };

    // Release the handle before anything else observes the new state.
    drop(child);
    writer_cancel.cancel();
    let status = match &exit {
        ProcessExit::Exited(Ok(exit_status)) => BackendStatus::Exited {
            exit_code: exit_status.code(),
        },
        ProcessExit::Exited(Err(_)) => BackendStatus::Exited { exit_code: None },
        ProcessExit::Killed => BackendStatus::ShutDown,
    };
    status_tx.send_replace(status);

    if matches!(exit, ProcessExit::Killed) {
        reader_cancel.cancel();
    }
    let report = if let Ok(joined) = tokio::time::timeout(EXIT_DRAIN_GRACE, &mut reader).await {
        joined
    } else {
        warn!("backend stdout still open after exit, abandoning buffered output");
        reader_cancel.cancel();
        reader.await
    };
    match report {
        Ok(report) => info!(
            exit = ?report.exit,
            lines = report.lines,
            dispatched = report.dispatched,
            "backend reader finished"
        ),
        Err(err) => error!(%err, "backend reader task ended abnormally"),
    }

    match exit {
        ProcessExit::Exited(Ok(exit_status)) if exit_status.success() => {
            info!("backend process exited normally");
        }
        ProcessExit::Exited(Ok(exit_status)) => {
            warn!(status = %exit_status, "backend process exited abnormally");
            hub.publish(BridgeEvent::ConnectionLost {
                exit_code: exit_status.code(),
                message: lost_message,
            });
        }
        ProcessExit::Exited(Err(err)) => {
            warn!(%err, "error waiting for backend process");
            hub.publish(BridgeEvent::ConnectionLost {
                exit_code: None,
                message: lost_message,
            });
        }
        ProcessExit::Killed => {}
    }
}
