//! Bridge configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::{AppError, Result};

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_backend_script() -> PathBuf {
    PathBuf::from("python").join("backend.py")
}

fn default_venv_dirs() -> Vec<String> {
    vec![".venv".into(), "venv".into()]
}

#[cfg(windows)]
fn default_runtime_candidates() -> Vec<String> {
    vec!["python".into(), "py".into(), "python3".into()]
}

#[cfg(not(windows))]
fn default_runtime_candidates() -> Vec<String> {
    vec!["python3".into(), "python".into()]
}

fn default_credential_env() -> String {
    "XAI_API_KEY".into()
}

fn default_probe_timeout_seconds() -> u64 {
    5
}

fn default_connection_lost_message() -> String {
    "Lost connection to backend; please restart the app.".into()
}

fn default_event_capacity() -> usize {
    64
}

/// Host configuration parsed from `chat-bridge.toml`.
///
/// Every field has a default, so an empty document (or no file at all) yields
/// a usable configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct BridgeConfig {
    /// Directory that holds the backend script and any project-local virtualenv.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    /// Backend script, relative to `project_root` unless absolute.
    #[serde(default = "default_backend_script")]
    pub backend_script: PathBuf,
    /// Project-local virtualenv directories probed before system runtimes.
    #[serde(default = "default_venv_dirs")]
    pub venv_dirs: Vec<String>,
    /// System-wide runtime executables, in preference order.
    #[serde(default = "default_runtime_candidates")]
    pub runtime_candidates: Vec<String>,
    /// Environment variable holding the API credential.
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
    /// Upper bound on a single `--version` probe.
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,
    /// Notice delivered to observers when the backend exits abnormally.
    #[serde(default = "default_connection_lost_message")]
    pub connection_lost_message: String,
    /// Send prior transcript entries with each request for context.
    #[serde(default)]
    pub include_history: bool,
    /// Capacity of the observer broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            backend_script: default_backend_script(),
            venv_dirs: default_venv_dirs(),
            runtime_candidates: default_runtime_candidates(),
            credential_env: default_credential_env(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
            connection_lost_message: default_connection_lost_message(),
            include_history: false,
            event_capacity: default_event_capacity(),
        }
    }
}

impl BridgeConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Absolute-or-root-relative path of the backend script.
    #[must_use]
    pub fn backend_script_path(&self) -> PathBuf {
        if self.backend_script.is_absolute() {
            self.backend_script.clone()
        } else {
            self.project_root.join(&self.backend_script)
        }
    }

    /// Probe timeout as a [`Duration`].
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    /// Read the API credential from the environment.
    ///
    /// The value itself is never logged.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Credential` if the variable is unset, not valid
    /// unicode, or blank.
    pub fn require_credential(&self) -> Result<String> {
        match env::var(&self.credential_env) {
            Ok(value) if !value.trim().is_empty() => {
                debug!(var = %self.credential_env, "credential present");
                Ok(value)
            }
            Ok(_) => Err(AppError::Credential(format!(
                "{} environment variable is empty",
                self.credential_env
            ))),
            Err(_) => Err(AppError::Credential(format!(
                "{} environment variable is not set",
                self.credential_env
            ))),
        }
    }

    /// Validate invariants that serde defaults cannot express.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.credential_env.trim().is_empty() {
            return Err(AppError::Config("credential_env must not be empty".into()));
        }

        if self.probe_timeout_seconds == 0 {
            return Err(AppError::Config(
                "probe_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.event_capacity == 0 {
            return Err(AppError::Config(
                "event_capacity must be greater than zero".into(),
            ));
        }

        if self.venv_dirs.is_empty() && self.runtime_candidates.is_empty() {
            return Err(AppError::Config(
                "at least one of venv_dirs or runtime_candidates must be set".into(),
            ));
        }

        Ok(())
    }
}
