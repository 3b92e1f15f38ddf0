//! Auditor phase (section 4.8.4): batched (sequential mode) or per-file
//! (parallel mode), merged identically either way via `AuditResult::merge`.

use std::path::Path;

use orc_adapter::{Adapter, AdapterRequest};
use orc_core::types::AuditResult;

use crate::prompts::{auditor_prompt_batched, auditor_prompt_per_file};

/// Read every generated file's current contents for inclusion in the
/// batched prompt. Missing files (e.g. the Executor failed before writing
/// them) are reported as empty rather than failing the whole audit.
fn read_files(workspace_root: &Path, relative_paths: &[String]) -> Vec<(String, String)> {
    relative_paths
        .iter()
        .map(|path| {
            let contents = std::fs::read_to_string(workspace_root.join(path)).unwrap_or_default();
            (path.clone(), contents)
        })
        .collect()
}

/// Batched audit: one adapter call covering every generated file.
pub async fn audit_batched(
    workspace_root: &Path,
    auditor: &dyn Adapter,
    plan_text: &str,
    relative_paths: &[String],
) -> AuditResult {
    let files = read_files(workspace_root, relative_paths);
    let prompt = auditor_prompt_batched(plan_text, &files);
    match auditor.execute(AdapterRequest::new(prompt)).await {
        Ok(response) => orc_parse::parse_audit_response(&response.output),
        Err(e) => synthesize_adapter_failure(&e.to_string()),
    }
}

/// Per-file audit: one adapter call per file, merged.
pub async fn audit_one_file(
    workspace_root: &Path,
    auditor: &dyn Adapter,
    plan_text: &str,
    relative_path: &str,
) -> AuditResult {
    let contents = std::fs::read_to_string(workspace_root.join(relative_path)).unwrap_or_default();
    let prompt = auditor_prompt_per_file(plan_text, relative_path, &contents);
    match auditor.execute(AdapterRequest::new(prompt)).await {
        Ok(response) => {
            let mut result = orc_parse::parse_audit_response(&response.output);
            for issue in &mut result.issues {
                if issue.file.is_empty() {
                    issue.file = relative_path.to_string();
                }
            }
            result
        }
        Err(e) => synthesize_adapter_failure(&e.to_string()),
    }
}

fn synthesize_adapter_failure(message: &str) -> AuditResult {
    use orc_core::types::{AuditIssue, AuditStatus, Severity};
    AuditResult {
        status: AuditStatus::NeedsWork,
        issues: vec![AuditIssue {
            file: String::new(),
            severity: Severity::Major,
            description: "auditor adapter call failed".to_string(),
            suggestion: message.to_string(),
        }],
        summary: "auditor could not be reached".to_string(),
    }
}
