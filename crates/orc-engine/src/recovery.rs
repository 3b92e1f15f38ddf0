//! RecoveryEngine (section 4.10): a bounded rescue pass run after the audit
//! loop exits at `max_iterations` with unresolved critical/major issues.
//! Gated behind `recovery.autoActivate` (resolved open question, recorded
//! in `DESIGN.md`) — activation is the caller's responsibility, this
//! module only implements the bounded rescue itself.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use orc_adapter::{Adapter, AdapterRequest};
use orc_core::events::EngineObserver;
use orc_core::types::AuditIssue;

use crate::prompts::{recovery_patch_prompt, recovery_rewrite_prompt};

#[derive(Debug, Clone, Default)]
pub struct RecoveryOutcome {
    pub success: bool,
    pub recovered: Vec<String>,
    pub failed: Vec<String>,
}

/// Snapshot of a file's pre-run state: `Some(contents)` if it existed
/// before this run touched it, `None` if this run created it from
/// scratch (so a failed recovery with `auto_revert_on_failure` deletes it
/// instead of restoring stale contents).
pub type PreRunSnapshots = HashMap<String, Option<String>>;

/// Run recovery for every file in `failed_files`, each paired with its
/// unresolved issues. Tries a Consultant-guided full rewrite, then
/// targeted per-issue patching, then (if `auto_revert_on_failure`) reverts
/// or deletes the file.
pub async fn run_recovery(
    workspace_root: &Path,
    consultant: &dyn Adapter,
    plan_text: &str,
    failed_files: Vec<(String, Vec<AuditIssue>)>,
    snapshots: &PreRunSnapshots,
    max_attempts: u32,
    auto_revert_on_failure: bool,
    observer: &Arc<dyn EngineObserver>,
) -> RecoveryOutcome {
    let names: Vec<String> = failed_files.iter().map(|(f, _)| f.clone()).collect();
    observer.on_recovery_start(&names);

    let total = failed_files.len();
    let mut recovered = Vec::new();
    let mut failed = Vec::new();

    for (processed, (relative_path, issues)) in failed_files.into_iter().enumerate() {
        let remaining = total - processed;
        let destination = workspace_root.join(&relative_path);
        let mut rescued = false;

        for attempt in 1..=max_attempts {
            observer.on_recovery_attempt(attempt, max_attempts, remaining);

            let prompt = if attempt == 1 {
                recovery_rewrite_prompt(&relative_path, plan_text, &issues)
            } else if let Some(issue) = issues.first() {
                let current = std::fs::read_to_string(&destination).unwrap_or_default();
                recovery_patch_prompt(&relative_path, &current, issue)
            } else {
                break;
            };

            let Ok(response) = consultant.execute(AdapterRequest::new(prompt)).await else { continue };
            let code = orc_parse::sanitize(&response.output);
            if !orc_parse::looks_like_code(&relative_path, &code) {
                continue;
            }
            if let Some(parent) = destination.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if std::fs::write(&destination, &code).is_err() {
                continue;
            }
            let check = orc_parse::validate_syntax(&relative_path, &destination).await;
            if check.valid {
                rescued = true;
                break;
            }
        }

        if rescued {
            recovered.push(relative_path);
            continue;
        }

        if auto_revert_on_failure {
            match snapshots.get(&relative_path) {
                Some(Some(original)) => {
                    let _ = std::fs::write(&destination, original);
                    observer.on_file_reverted(&relative_path);
                }
                _ => {
                    let _ = std::fs::remove_file(&destination);
                    observer.on_file_deleted(&relative_path);
                }
            }
        }
        failed.push(relative_path);
    }

    let success = failed.is_empty();
    observer.on_recovery_complete(success, &recovered, &failed);
    RecoveryOutcome { success, recovered, failed }
}
