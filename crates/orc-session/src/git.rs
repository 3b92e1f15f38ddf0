//! `GitCommitter`: the terminal commit gate. Shells out to the `git`
//! binary directly (no git library), the same way the reference codebase
//! drives its own commit trail.

use std::path::Path;
use std::process::Command;

use orc_core::error::EngineError;

fn run_git(workspace_root: &Path, args: &[&str]) -> Result<std::process::Output, EngineError> {
    Command::new("git")
        .args(args)
        .current_dir(workspace_root)
        .output()
        .map_err(|e| EngineError::Io { path: workspace_root.display().to_string(), source: e })
}

/// Run `git init` in `workspace_root` if it is not already a repository.
pub fn ensure_git_init(workspace_root: &Path) -> Result<(), EngineError> {
    if workspace_root.join(".git").is_dir() {
        return Ok(());
    }
    let output = run_git(workspace_root, &["init"])?;
    if !output.status.success() {
        return Err(EngineError::Config(format!(
            "git init failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

/// Result of a commit attempt: `Some(short_hash)` on a real commit,
/// `None` when there was nothing staged to commit (not an error).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { short_hash: String },
    NothingToCommit,
}

/// Render the commit message template, substituting `{task}`.
pub fn render_commit_message(template: &str, task: &str) -> String {
    template.replace("{task}", task)
}

/// Stage the given workspace-relative paths and commit them with `message`.
/// Returns `NothingToCommit` rather than an error when the stage is empty
/// after `git add`, mirroring what a developer running the same commands
/// locally would see.
pub fn commit_files(
    workspace_root: &Path,
    relative_paths: &[String],
    message: &str,
) -> Result<CommitOutcome, EngineError> {
    ensure_git_init(workspace_root)?;

    if relative_paths.is_empty() {
        return Ok(CommitOutcome::NothingToCommit);
    }

    let mut add_args = vec!["add", "--"];
    add_args.extend(relative_paths.iter().map(String::as_str));
    let add_output = run_git(workspace_root, &add_args)?;
    if !add_output.status.success() {
        return Err(EngineError::Config(format!(
            "git add failed: {}",
            String::from_utf8_lossy(&add_output.stderr)
        )));
    }

    let diff_output = run_git(workspace_root, &["diff", "--cached", "--quiet"])?;
    if diff_output.status.success() {
        // exit 0 means no staged differences
        return Ok(CommitOutcome::NothingToCommit);
    }

    let commit_output = run_git(workspace_root, &["commit", "-m", message])?;
    if !commit_output.status.success() {
        return Err(EngineError::Config(format!(
            "git commit failed: {}",
            String::from_utf8_lossy(&commit_output.stderr)
        )));
    }

    let rev_output = run_git(workspace_root, &["rev-parse", "--short", "HEAD"])?;
    if !rev_output.status.success() {
        return Err(EngineError::Config(format!(
            "git rev-parse failed: {}",
            String::from_utf8_lossy(&rev_output.stderr)
        )));
    }
    let short_hash = String::from_utf8_lossy(&rev_output.stdout).trim().to_string();
    Ok(CommitOutcome::Committed { short_hash })
}

/// `git log --oneline --follow` for one path, most recent first.
pub fn history(workspace_root: &Path, relative_path: &str, limit: usize) -> Result<Vec<String>, EngineError> {
    let max_count = format!("-{limit}");
    let output = run_git(
        workspace_root,
        &["log", "--oneline", "--follow", &max_count, "--", relative_path],
    )?;
    if !output.status.success() {
        return Err(EngineError::Config(format!(
            "git log failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn init_test_repo(dir: &Path) {
        ensure_git_init(dir).unwrap();
        run_git(dir, &["config", "user.email", "test@example.com"]).unwrap();
        run_git(dir, &["config", "user.name", "Test"]).unwrap();
    }

    #[test]
    fn render_commit_message_substitutes_task() {
        let msg = render_commit_message("orc: {task}", "add hello.py");
        assert_eq!(msg, "orc: add hello.py");
    }

    #[test]
    fn ensure_git_init_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        ensure_git_init(tmp.path()).unwrap();
        assert!(tmp.path().join(".git").is_dir());
        ensure_git_init(tmp.path()).unwrap();
    }

    #[test]
    fn commit_files_creates_commit_and_returns_short_hash() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());
        fs::write(tmp.path().join("hello.py"), "print('hi')\n").unwrap();

        let outcome =
            commit_files(tmp.path(), &["hello.py".to_string()], "orc: write hello.py").unwrap();
        match outcome {
            CommitOutcome::Committed { short_hash } => assert!(!short_hash.is_empty()),
            CommitOutcome::NothingToCommit => panic!("expected a commit"),
        }
    }

    #[test]
    fn commit_files_with_no_paths_is_nothing_to_commit() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());
        let outcome = commit_files(tmp.path(), &[], "orc: noop").unwrap();
        assert_eq!(outcome, CommitOutcome::NothingToCommit);
    }

    #[test]
    fn commit_files_unchanged_file_is_nothing_to_commit() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());
        fs::write(tmp.path().join("hello.py"), "print('hi')\n").unwrap();
        commit_files(tmp.path(), &["hello.py".to_string()], "first").unwrap();

        let outcome = commit_files(tmp.path(), &["hello.py".to_string()], "second").unwrap();
        assert_eq!(outcome, CommitOutcome::NothingToCommit);
    }
}
