//! End-to-end tests for the `orc` binary. Spawns the built binary against a
//! scratch workspace, without depending on any actually-installed AI CLI
//! tool: these scenarios only exercise config loading, adapter-chain
//! resolution, and session listing, none of which shell out to
//! `claude`/`codex`/`gemini`.

use std::process::Command;

fn orc_cmd(tmp: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_orc"));
    cmd.arg("--cd").arg(tmp);
    cmd
}

#[test]
fn session_list_on_empty_workspace_succeeds_with_no_output() {
    let tmp = tempfile::tempdir().unwrap();
    let output = orc_cmd(tmp.path()).args(["session", "list"]).output().expect("run orc");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).trim().is_empty());
}

#[test]
fn run_without_configured_agents_fails_with_a_clear_message() {
    let tmp = tempfile::tempdir().unwrap();
    let output = orc_cmd(tmp.path()).args(["run", "create hello.py"]).output().expect("run orc");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no adapters configured") || stderr.contains("agents.* adapter chains"), "{stderr}");
}

#[test]
fn run_rejects_an_empty_task_argument() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("orchestra.json"),
        r#"{"agents": {"architect": ["claude-code"], "executor": ["claude-code"], "auditor": ["claude-code"], "consultant": ["claude-code"]}}"#,
    )
    .unwrap();

    let output = orc_cmd(tmp.path()).args(["run", ""]).output().expect("run orc");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("empty task"));
}

#[test]
fn resume_of_unknown_session_id_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let output = orc_cmd(tmp.path()).args(["resume", "does-not-exist"]).output().expect("run orc");
    assert!(!output.status.success());
}
