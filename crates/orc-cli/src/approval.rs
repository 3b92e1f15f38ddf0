//! Terminal plan-approval prompt, used when `--interactive` is passed.
//! Blocks on a blocking stdin read inside `spawn_blocking` so the async
//! engine loop isn't stalled by it.

use async_trait::async_trait;
use orc_core::types::ApprovalDecision;
use orc_engine::ApprovalHandler;
use std::io::Write;
use std::path::Path;

pub struct StdinApproval;

#[async_trait]
impl ApprovalHandler for StdinApproval {
    async fn handle_plan_approval(&self, plan_text: &str, plan_path: &Path) -> ApprovalDecision {
        println!("\n--- plan ({}) ---", plan_path.display());
        println!("{plan_text}");
        println!("--- end plan ---");

        let approved = tokio::task::spawn_blocking(|| {
            print!("approve this plan? [y/N] ");
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).is_ok() && matches!(line.trim(), "y" | "Y" | "yes")
        })
        .await
        .unwrap_or(false);

        if approved {
            ApprovalDecision::approve()
        } else {
            ApprovalDecision::reject()
        }
    }
}
