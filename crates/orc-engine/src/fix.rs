//! Fix phase (section 4.8.5): re-read, re-prompt, sanitize, gate, rewrite,
//! re-validate, one pass per file with outstanding issues.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use orc_adapter::{Adapter, AdapterRequest};
use orc_core::events::EngineObserver;
use orc_core::types::AuditIssue;

use crate::prompts::fix_prompt;

/// Outcome of fixing one file.
#[derive(Debug, Clone)]
pub struct FixOutcome {
    pub relative_path: String,
    pub applied: bool,
}

/// Group issues by file, preserving the order files were first mentioned.
pub fn group_by_file(issues: &[AuditIssue]) -> Vec<(String, Vec<AuditIssue>)> {
    let mut order = Vec::new();
    let mut groups: HashMap<String, Vec<AuditIssue>> = HashMap::new();
    for issue in issues {
        if issue.file.is_empty() {
            continue;
        }
        if !groups.contains_key(&issue.file) {
            order.push(issue.file.clone());
        }
        groups.entry(issue.file.clone()).or_default().push(issue.clone());
    }
    order.into_iter().map(|file| { let issues = groups.remove(&file).unwrap_or_default(); (file, issues) }).collect()
}

/// Fix one file: re-read, build the fix prompt, sanitize the response,
/// gate it with `looks_like_code`, and only then write it back and
/// re-validate syntax. A response that doesn't look like code is dropped,
/// leaving the file untouched for the next audit pass to re-flag.
pub async fn fix_file(
    workspace_root: &Path,
    executor: &dyn Adapter,
    plan_text: &str,
    relative_path: &str,
    issues: &[AuditIssue],
    observer: &Arc<dyn EngineObserver>,
) -> FixOutcome {
    let destination = workspace_root.join(relative_path);
    let current = std::fs::read_to_string(&destination).unwrap_or_default();

    let prompt = fix_prompt(relative_path, &current, issues, plan_text);
    let response = match executor.execute(AdapterRequest::new(prompt)).await {
        Ok(response) => response,
        Err(_) => return FixOutcome { relative_path: relative_path.to_string(), applied: false },
    };

    let code = orc_parse::sanitize(&response.output);
    if !orc_parse::looks_like_code(relative_path, &code) {
        return FixOutcome { relative_path: relative_path.to_string(), applied: false };
    }

    if let Some(parent) = destination.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return FixOutcome { relative_path: relative_path.to_string(), applied: false };
        }
    }
    if std::fs::write(&destination, &code).is_err() {
        return FixOutcome { relative_path: relative_path.to_string(), applied: false };
    }

    let check = orc_parse::validate_syntax(relative_path, &destination).await;
    observer.on_syntax_check(relative_path, check.valid, check.error.as_deref());

    FixOutcome { relative_path: relative_path.to_string(), applied: true }
}
