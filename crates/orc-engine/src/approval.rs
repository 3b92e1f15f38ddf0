//! The plan-approval hook: `onPlanReady` in section 6, modeled as an async
//! callback trait rather than a bare function so a host can hold state
//! (e.g. a terminal prompt, a web socket) across the await point.

use async_trait::async_trait;
use orc_core::types::ApprovalDecision;

#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Present `plan_text` (already written to `plan_path`) to whatever
    /// approves plans, and await its decision.
    async fn handle_plan_approval(&self, plan_text: &str, plan_path: &std::path::Path) -> ApprovalDecision;
}

/// Approves every plan unchanged. Used for non-interactive runs
/// (`ArchitectSucceeded { interactive: false }` in the phase event).
#[derive(Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalHandler for AutoApprove {
    async fn handle_plan_approval(&self, _plan_text: &str, _plan_path: &std::path::Path) -> ApprovalDecision {
        ApprovalDecision::approve()
    }
}
