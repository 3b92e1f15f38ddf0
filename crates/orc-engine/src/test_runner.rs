//! TestRunner (section 4.12): auto-detects the test framework by file
//! markers unless an explicit command is configured, runs it with a
//! timeout, and reports a `GateResult`.

use std::path::Path;

use orc_core::events::GateResult;
use orc_process::run_and_capture;
use tokio::process::Command;

/// Detect the test command from file markers at the workspace root.
/// Returns `None` when nothing recognizable is present — the caller
/// treats that as "skip testing", not a failure.
pub fn detect_command(workspace_root: &Path) -> Option<String> {
    if workspace_root.join("Cargo.toml").is_file() {
        return Some("cargo test".to_string());
    }
    if workspace_root.join("package.json").is_file() {
        return Some("npm test".to_string());
    }
    if workspace_root.join("pytest.ini").is_file()
        || workspace_root.join("setup.py").is_file()
        || workspace_root.join("pyproject.toml").is_file()
    {
        return Some("pytest".to_string());
    }
    if workspace_root.join("go.mod").is_file() {
        return Some("go test ./...".to_string());
    }
    None
}

/// Run `command` in `workspace_root` via the shell, returning a
/// `GateResult`. `timeout` is advisory here: the underlying process runner
/// applies its own idle-timeout watchdog; this is the wall-clock cap on
/// top of it.
pub async fn run_tests(workspace_root: &Path, command: &str, timeout: std::time::Duration) -> GateResult {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(workspace_root);

    let result = tokio::time::timeout(timeout, run_and_capture(cmd)).await;
    match result {
        Ok(Ok(execution)) => GateResult { success: execution.exit_code == 0, output: execution.output },
        Ok(Err(e)) => GateResult { success: false, output: format!("failed to run tests: {e}") },
        Err(_) => GateResult { success: false, output: format!("test command timed out after {timeout:?}") },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cargo_project() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Cargo.toml"), "[package]").unwrap();
        assert_eq!(detect_command(tmp.path()), Some("cargo test".to_string()));
    }

    #[test]
    fn detects_node_project() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("package.json"), "{}").unwrap();
        assert_eq!(detect_command(tmp.path()), Some("npm test".to_string()));
    }

    #[test]
    fn no_markers_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(detect_command(tmp.path()), None);
    }

    #[tokio::test]
    async fn successful_command_is_a_success_gate() {
        let tmp = tempfile::tempdir().unwrap();
        let result = run_tests(tmp.path(), "true", std::time::Duration::from_secs(5)).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn failing_command_is_a_failure_gate() {
        let tmp = tempfile::tempdir().unwrap();
        let result = run_tests(tmp.path(), "false", std::time::Duration::from_secs(5)).await;
        assert!(!result.success);
    }
}
