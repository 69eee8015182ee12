//! Backend runtime discovery.
//!
//! Candidates are probed in a fixed order: interpreters inside project-local
//! virtualenvs first, then system-wide executables. The first candidate whose
//! `--version` probe succeeds within the timeout and reports a `Python …`
//! version string is selected.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::{AppError, Result};

/// Version string prefix a usable runtime must report.
pub const VERSION_PREFIX: &str = "Python";

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    /// Interpreter inside a project-local virtualenv.
    Virtualenv,
    /// Executable resolved through `PATH`.
    System,
}

/// One executable to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeCandidate {
    /// Path or bare command name.
    pub program: PathBuf,
    /// Origin of the candidate.
    pub source: CandidateSource,
}

/// A runtime that passed its probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredRuntime {
    /// Executable to launch the backend with.
    pub program: PathBuf,
    /// Reported version, e.g. `Python 3.12.1`.
    pub version: String,
    /// Origin of the selected candidate.
    pub source: CandidateSource,
}

/// Interpreter location inside a virtualenv directory.
#[must_use]
pub fn venv_interpreter(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}

/// Candidates in probe order.
///
/// Virtualenv interpreters are listed only when the file exists; system
/// candidates are always listed.
#[must_use]
pub fn candidates(config: &BridgeConfig) -> Vec<RuntimeCandidate> {
    let venvs = config
        .venv_dirs
        .iter()
        .map(|dir| venv_interpreter(&config.project_root.join(dir)))
        .filter(|path| path.is_file())
        .map(|program| RuntimeCandidate {
            program,
            source: CandidateSource::Virtualenv,
        });

    let system = config
        .runtime_candidates
        .iter()
        .map(|name| RuntimeCandidate {
            program: PathBuf::from(name),
            source: CandidateSource::System,
        });

    venvs.chain(system).collect()
}

/// Run `<program> --version` and return the version string if usable.
///
/// Older interpreters print the version on stderr, so both streams are
/// checked.
pub async fn probe(program: &Path, timeout: Duration) -> Option<String> {
    let mut cmd = Command::new(program);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            debug!(program = %program.display(), %err, "runtime probe failed to run");
            return None;
        }
        Err(_elapsed) => {
            debug!(program = %program.display(), ?timeout, "runtime probe timed out");
            return None;
        }
    };

    if !output.status.success() {
        debug!(program = %program.display(), status = %output.status, "runtime probe exited unsuccessfully");
        return None;
    }

    [output.stdout, output.stderr]
        .iter()
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_owned())
        .find(|text| text.starts_with(VERSION_PREFIX))
}

/// Probe candidates in order and return the first usable one.
///
/// # Errors
///
/// Returns [`AppError::RuntimeNotFound`] listing every probed candidate when
/// none is usable.
pub async fn discover(config: &BridgeConfig) -> Result<DiscoveredRuntime> {
    let timeout = config.probe_timeout();
    let candidates = candidates(config);

    for candidate in &candidates {
        if let Some(version) = probe(&candidate.program, timeout).await {
            info!(
                program = %candidate.program.display(),
                %version,
                source = ?candidate.source,
                "backend runtime selected"
            );
            return Ok(DiscoveredRuntime {
                program: candidate.program.clone(),
                version,
                source: candidate.source,
            });
        }
    }

    let tried = candidates
        .iter()
        .map(|c| c.program.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(AppError::RuntimeNotFound(format!(
        "no usable runtime among [{tried}]"
    )))
}
