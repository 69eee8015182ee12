//! Integration tests for the fail-fast startup sequence.

use serial_test::serial;
use tempfile::TempDir;

use chat_bridge::backend::supervisor::BackendSupervisor;
use chat_bridge::bridge::EventHub;
use chat_bridge::AppError;

use super::test_helpers::{config_in, venv_python, write_script};

#[tokio::test]
#[serial]
async fn missing_credential_fails_before_any_probe() {
    let dir = TempDir::new().unwrap();
    let python = venv_python(dir.path());
    let marker = dir.path().join("probed");
    write_script(
        &python,
        &format!("touch '{}'; echo 'Python 3.12.1'", marker.display()),
    );
    std::env::remove_var("CHAT_BRIDGE_STARTUP_ABSENT_KEY");
    let mut config = config_in(dir.path(), &[]);
    config.credential_env = "CHAT_BRIDGE_STARTUP_ABSENT_KEY".into();

    let err = BackendSupervisor::start(&config, EventHub::new(4))
        .await
        .expect_err("startup must fail");

    assert!(matches!(err, AppError::Credential(_)));
    assert!(err.is_fatal());
    assert!(!marker.exists(), "no runtime may be probed without a credential");
}

#[tokio::test]
#[serial]
async fn credential_present_but_no_runtime_is_runtime_not_found() {
    let dir = TempDir::new().unwrap();
    std::env::set_var("CHAT_BRIDGE_STARTUP_PRESENT_KEY", "sk-test");
    let mut config = config_in(dir.path(), &["chat-bridge-no-such-runtime"]);
    config.credential_env = "CHAT_BRIDGE_STARTUP_PRESENT_KEY".into();

    let result = BackendSupervisor::start(&config, EventHub::new(4)).await;
    std::env::remove_var("CHAT_BRIDGE_STARTUP_PRESENT_KEY");

    assert!(matches!(result, Err(AppError::RuntimeNotFound(_))));
}

#[tokio::test]
#[serial]
async fn discovered_runtime_launches_backend_script_in_project_root() {
    let dir = TempDir::new().unwrap();
    let args_file = dir.path().join("launch.txt");
    write_script(
        &venv_python(dir.path()),
        &format!(
            "if [ \"$1\" = \"--version\" ]; then echo 'Python 3.12.1'; exit 0; fi\n\
             printf '%s\\n%s\\n' \"$1\" \"$(pwd)\" > '{}'\n\
             exit 0",
            args_file.display()
        ),
    );
    std::env::set_var("CHAT_BRIDGE_STARTUP_LAUNCH_KEY", "sk-test");
    let mut config = config_in(dir.path(), &[]);
    config.credential_env = "CHAT_BRIDGE_STARTUP_LAUNCH_KEY".into();

    let supervisor = BackendSupervisor::start(&config, EventHub::new(4))
        .await
        .expect("backend starts");
    std::env::remove_var("CHAT_BRIDGE_STARTUP_LAUNCH_KEY");
    tokio::time::timeout(super::test_helpers::STEP_TIMEOUT, supervisor.stopped())
        .await
        .expect("fake backend exits");
    supervisor.shutdown().await;

    let recorded = std::fs::read_to_string(&args_file).expect("backend ran");
    let mut lines = recorded.lines();
    assert_eq!(
        lines.next(),
        Some(config.backend_script_path().to_str().unwrap())
    );
    let cwd = std::path::PathBuf::from(lines.next().unwrap());
    assert_eq!(
        cwd.canonicalize().unwrap(),
        dir.path().canonicalize().unwrap()
    );
}
