//! Durable session storage and the git commit gate.
//!
//! Sessions live one-per-run under `<workspace_root>/.orchestra/<session_id>/`,
//! each guarded by its own advisory lock (`orc-lock`) so two processes never
//! drive the same session concurrently.

pub mod git;
pub mod store;

pub use git::{commit_files, ensure_git_init, history, render_commit_message, CommitOutcome};
pub use store::{sanitize_path_component, SessionHandle, SessionStore};
