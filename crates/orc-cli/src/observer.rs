//! Logs every engine event via `tracing` rather than rendering a dashboard:
//! a structured log, not a UI.

use orc_core::events::{EngineObserver, GateResult, PhaseOutcome, WatchEventKind};
use orc_core::types::{AuditStatus, Phase, Role};

pub struct TracingObserver;

impl EngineObserver for TracingObserver {
    fn on_phase_start(&self, phase: Phase, role_label: &str) {
        tracing::info!(?phase, role = role_label, "phase started");
    }

    fn on_phase_complete(&self, phase: Phase, role_label: &str, outcome: PhaseOutcome) {
        tracing::info!(
            ?phase,
            role = role_label,
            success = outcome.success,
            duration_ms = outcome.duration_ms,
            "phase complete"
        );
    }

    fn on_error(&self, phase: Phase, message: &str) {
        tracing::error!(?phase, message, "engine error");
    }

    fn on_iteration(&self, n: u32, max: u32) {
        tracing::info!(iteration = n, max_iterations = max, "starting iteration");
    }

    fn on_file_start(&self, path: &str, index: usize, total: usize) {
        tracing::debug!(path, index, total, "file started");
    }

    fn on_file_complete(&self, path: &str, success: bool, duration_ms: u64) {
        tracing::debug!(path, success, duration_ms, "file complete");
    }

    fn on_parallel_progress(&self, completed: usize, total: usize, in_progress: &[String]) {
        tracing::debug!(completed, total, in_progress = ?in_progress, "parallel progress");
    }

    fn on_file_audit(&self, path: &str, status: AuditStatus, issue_count: usize) {
        tracing::info!(path, ?status, issue_count, "file audited");
    }

    fn on_syntax_check(&self, path: &str, valid: bool, error: Option<&str>) {
        if valid {
            tracing::debug!(path, "syntax check passed");
        } else {
            tracing::warn!(path, error, "syntax check failed");
        }
    }

    fn on_consultant(&self, path: &str, reason: &str) {
        tracing::info!(path, reason, "consultant rescue invoked");
    }

    fn on_adapter_fallback(&self, from: &str, to: &str, reason: &str, role: Role) {
        tracing::warn!(from, to, reason, %role, "adapter fallback");
    }

    fn on_recovery_start(&self, failed_files: &[String]) {
        tracing::warn!(failed_files = ?failed_files, "recovery started");
    }

    fn on_recovery_attempt(&self, attempt: u32, max: u32, remaining: usize) {
        tracing::info!(attempt, max_attempts = max, remaining, "recovery attempt");
    }

    fn on_file_reverted(&self, path: &str) {
        tracing::info!(path, "file reverted");
    }

    fn on_file_deleted(&self, path: &str) {
        tracing::info!(path, "file deleted");
    }

    fn on_recovery_complete(&self, success: bool, recovered: &[String], failed: &[String]) {
        tracing::info!(success, recovered = ?recovered, failed = ?failed, "recovery complete");
    }

    fn on_watch_change(&self, path: &str, event: WatchEventKind) {
        tracing::debug!(path, ?event, "watch change");
    }

    fn on_watch_rerun(&self, trigger: &str, run_count: u32) {
        tracing::info!(trigger, run_count, "watch-triggered rerun");
    }

    fn on_test_start(&self, command: &str) {
        tracing::info!(command, "test run started");
    }

    fn on_test_complete(&self, result: &GateResult) {
        tracing::info!(success = result.success, "test run complete");
    }

    fn on_commit_start(&self, files: &[String]) {
        tracing::info!(files = ?files, "commit started");
    }

    fn on_commit_complete(&self, result: &GateResult) {
        tracing::info!(success = result.success, "commit complete");
    }

    fn on_resume(&self, session_id: &str, phase: Phase, iteration: u32) {
        tracing::info!(session_id, ?phase, iteration, "resuming session");
    }

    fn on_config_loaded(&self, path: &str) {
        tracing::debug!(path, "project config loaded");
    }
}
