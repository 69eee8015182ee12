//! Backend process spawner.
//!
//! Starts the backend with stdin and stdout piped for NDJSON and stderr
//! inherited so backend diagnostics show up in the host's own log output.
//! `kill_on_drop(true)` guarantees the child never outlives its handle.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::info;

use crate::backend::discovery::DiscoveredRuntime;
use crate::config::BridgeConfig;
use crate::{AppError, Result};

/// What to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCommand {
    /// Executable.
    pub program: PathBuf,
    /// Arguments after the program.
    pub args: Vec<OsString>,
    /// Working directory; inherits the host's when `None`.
    pub current_dir: Option<PathBuf>,
}

impl BackendCommand {
    /// Launch `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// The interpreter running the configured backend script from the
    /// project root.
    #[must_use]
    pub fn for_runtime(runtime: &DiscoveredRuntime, config: &BridgeConfig) -> Self {
        Self::new(runtime.program.clone())
            .arg(config.backend_script_path())
            .current_dir(config.project_root.clone())
    }
}

/// A freshly spawned backend with its stdio pipes split out.
#[derive(Debug)]
pub struct BackendProcess {
    /// Child process handle; dropping it kills the process.
    pub child: Child,
    /// Backend input for request lines.
    pub stdin: ChildStdin,
    /// Backend output carrying response lines.
    pub stdout: ChildStdout,
}

/// Spawn the backend described by `command`.
///
/// Must be called within a tokio runtime.
///
/// # Errors
///
/// - `AppError::Spawn("failed to spawn backend: …")` — OS spawn failure.
/// - `AppError::Spawn("failed to capture backend …")` — a pipe was not
///   created.
pub fn spawn_backend(command: &BackendCommand) -> Result<BackendProcess> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args);

    if let Some(dir) = &command.current_dir {
        cmd.current_dir(dir);
    }

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|err| {
        AppError::Spawn(format!(
            "failed to spawn backend {}: {err}",
            command.program.display()
        ))
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture backend stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture backend stdout".into()))?;

    info!(
        program = %command.program.display(),
        pid = child.id(),
        "backend process spawned"
    );

    Ok(BackendProcess {
        child,
        stdin,
        stdout,
    })
}
