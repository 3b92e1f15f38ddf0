//! The orchestration state machine: Architect -> Approval -> Executor ->
//! Auditor -> Fixer -> Tester -> Committer, plus the Watch and Recovery
//! engines that run around it (sections 4.8-4.12).
//!
//! [`PipelineEngine`] is the entry point. It owns the project config, the
//! per-role adapters, and the host's observer/approval hooks, and drives a
//! [`orc_session::SessionHandle`] through `orc_core`'s phase transition
//! table until it reaches a terminal phase.

pub mod approval;
pub mod auditor;
pub mod consultant;
pub mod executor;
pub mod fix;
pub mod pipeline;
pub mod prompts;
pub mod recovery;
pub mod test_runner;
pub mod watch;

pub use approval::{ApprovalHandler, AutoApprove};
pub use executor::FileOutcome;
pub use fix::FixOutcome;
pub use pipeline::PipelineEngine;
pub use recovery::{run_recovery, PreRunSnapshots, RecoveryOutcome};
pub use watch::{WatchEngine, DEFAULT_DEBOUNCE};
