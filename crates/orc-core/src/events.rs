//! The engine's callback/event surface (SPEC_FULL.md section 6). Every
//! method has a no-op default so a host only overrides what it cares about.
//! The engine itself stays host-agnostic and never logs directly; a host
//! that wants a log of a run installs an `EngineObserver` that forwards each
//! event through `tracing` (see `orc-cli`'s `TracingObserver`).

use crate::types::{AuditStatus, Phase, Role};

/// Outcome of a completed phase, passed to `on_phase_complete`.
#[derive(Clone, Copy, Debug)]
pub struct PhaseOutcome {
    pub success: bool,
    pub duration_ms: u64,
}

/// Outcome of a test-runner or git-commit gate.
#[derive(Clone, Debug)]
pub struct GateResult {
    pub success: bool,
    pub output: String,
}

/// Filesystem event kind surfaced by `WatchEngine`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchEventKind {
    Add,
    Change,
    Unlink,
}

pub trait EngineObserver: Send + Sync {
    fn on_phase_start(&self, _phase: Phase, _role_label: &str) {}
    fn on_phase_complete(&self, _phase: Phase, _role_label: &str, _outcome: PhaseOutcome) {}
    fn on_error(&self, _phase: Phase, _message: &str) {}
    fn on_iteration(&self, _n: u32, _max: u32) {}

    fn on_file_start(&self, _path: &str, _index: usize, _total: usize) {}
    fn on_file_complete(&self, _path: &str, _success: bool, _duration_ms: u64) {}
    fn on_parallel_progress(&self, _completed: usize, _total: usize, _in_progress: &[String]) {}

    fn on_file_audit(&self, _path: &str, _status: AuditStatus, _issue_count: usize) {}

    fn on_syntax_check(&self, _path: &str, _valid: bool, _error: Option<&str>) {}
    fn on_consultant(&self, _path: &str, _reason: &str) {}

    fn on_adapter_fallback(&self, _from: &str, _to: &str, _reason: &str, _role: Role) {}

    fn on_recovery_start(&self, _failed_files: &[String]) {}
    fn on_recovery_attempt(&self, _attempt: u32, _max: u32, _remaining: usize) {}
    fn on_file_reverted(&self, _path: &str) {}
    fn on_file_deleted(&self, _path: &str) {}
    fn on_recovery_complete(&self, _success: bool, _recovered: &[String], _failed: &[String]) {}

    fn on_watch_change(&self, _path: &str, _event: WatchEventKind) {}
    fn on_watch_rerun(&self, _trigger: &str, _run_count: u32) {}

    fn on_test_start(&self, _command: &str) {}
    fn on_test_complete(&self, _result: &GateResult) {}
    fn on_commit_start(&self, _files: &[String]) {}
    fn on_commit_complete(&self, _result: &GateResult) {}

    fn on_resume(&self, _session_id: &str, _phase: Phase, _iteration: u32) {}
    fn on_config_loaded(&self, _path: &str) {}
}

/// An observer that does nothing; used where no host hook is registered.
#[derive(Default, Clone, Copy)]
pub struct NullObserver;

impl EngineObserver for NullObserver {}
