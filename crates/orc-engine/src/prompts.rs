//! Prompt construction for the four roles (section 4.8.2–4.8.5, 4.9).
//! Kept as plain string builders, not a templating crate: every prompt here
//! is a short, fixed shape with a handful of interpolated fields.

use orc_core::types::{AuditIssue, FileDescriptor};

pub fn architect_prompt(task: &str, custom_context: Option<&str>) -> String {
    let mut prompt = format!(
        "You are the Architect. Produce a plan for the following task.\n\nTask: {task}\n\n\
         List every file to create or modify under a \"## Files to create\" heading, one per \
         line, as `path/to/file.ext: short description`.\n"
    );
    if let Some(context) = custom_context {
        prompt.push_str("\nAdditional context:\n");
        prompt.push_str(context);
        prompt.push('\n');
    }
    prompt
}

pub fn executor_prompt(plan_text: &str, descriptor: &FileDescriptor) -> String {
    format!(
        "You are the Executor. Using the plan below, write the complete contents of \
         `{path}` ({description}).\n\n\
         Respond with ONLY the file's code, starting with the first line of the file itself \
         (no narration before or after, no fenced-block language tag required but allowed).\n\n\
         Plan:\n{plan_text}\n",
        path = descriptor.relative_path,
        description = descriptor.human_description,
    )
}

pub fn fix_prompt(relative_path: &str, current_contents: &str, issues: &[AuditIssue], plan_text: &str) -> String {
    let mut issue_lines = String::new();
    for issue in issues {
        issue_lines.push_str(&format!(
            "- [{severity:?}] {description}{suggestion}\n",
            severity = issue.severity,
            description = issue.description,
            suggestion = if issue.suggestion.is_empty() {
                String::new()
            } else {
                format!(" — suggested fix: {}", issue.suggestion)
            },
        ));
    }
    format!(
        "You are the Executor, fixing issues raised by the Auditor in `{relative_path}`.\n\n\
         Current contents:\n```\n{current_contents}\n```\n\n\
         Issues to resolve:\n{issue_lines}\n\
         Plan (for context):\n{plan_text}\n\n\
         Respond with ONLY the corrected file's complete contents.\n"
    )
}

pub enum ConsultantReason {
    SyntaxError(String),
    Incomplete,
}

pub fn consultant_prompt(relative_path: &str, current_contents: &str, reason: &ConsultantReason) -> String {
    match reason {
        ConsultantReason::SyntaxError(error) => format!(
            "You are the Consultant. `{relative_path}` fails to parse:\n{error}\n\n\
             Current contents:\n```\n{current_contents}\n```\n\n\
             Respond with ONLY the corrected, syntactically valid file contents.\n"
        ),
        ConsultantReason::Incomplete => format!(
            "You are the Consultant. `{relative_path}` looks incomplete (unbalanced \
             braces, a TODO stub, or a trailing open string/docstring).\n\n\
             Current contents:\n```\n{current_contents}\n```\n\n\
             Respond with ONLY the complete file contents.\n"
        ),
    }
}

pub fn auditor_prompt_batched(plan_text: &str, files: &[(String, String)]) -> String {
    let mut body = String::new();
    for (path, contents) in files {
        body.push_str(&format!("### {path}\n```\n{contents}\n```\n\n"));
    }
    format!(
        "You are the Auditor. Review the generated files against the plan below and \
         respond with ONLY a JSON object: \
         {{\"status\": \"APPROVED\"|\"NEEDS_WORK\", \"issues\": [{{\"file\", \"severity\", \
         \"description\", \"suggestion\"}}], \"summary\": \"...\"}}.\n\n\
         Plan:\n{plan_text}\n\nGenerated files:\n{body}"
    )
}

pub fn auditor_prompt_per_file(plan_text: &str, relative_path: &str, contents: &str) -> String {
    format!(
        "You are the Auditor. Review this single generated file against the plan and \
         respond with ONLY a JSON object: \
         {{\"status\": \"APPROVED\"|\"NEEDS_WORK\", \"issues\": [...], \"summary\": \"...\"}}.\n\n\
         Plan:\n{plan_text}\n\n### {relative_path}\n```\n{contents}\n```\n"
    )
}

/// RecoveryEngine attempt 1: full rewrite from scratch given the plan and
/// the aggregated issue list, ignoring the broken current contents.
pub fn recovery_rewrite_prompt(relative_path: &str, plan_text: &str, issues: &[AuditIssue]) -> String {
    let mut issue_lines = String::new();
    for issue in issues {
        issue_lines.push_str(&format!("- [{:?}] {}\n", issue.severity, issue.description));
    }
    format!(
        "You are the Consultant, rescuing `{relative_path}` after repeated failed attempts. \
         Rewrite the file from scratch, ignoring its current broken contents.\n\n\
         Plan:\n{plan_text}\n\nOutstanding issues:\n{issue_lines}\n\
         Respond with ONLY the complete file contents.\n"
    )
}

/// RecoveryEngine attempt 2: one prompt per outstanding issue, targeted at
/// a minimal patch rather than a full rewrite.
pub fn recovery_patch_prompt(relative_path: &str, current_contents: &str, issue: &AuditIssue) -> String {
    format!(
        "You are the Consultant, applying a targeted fix to `{relative_path}`.\n\n\
         Current contents:\n```\n{current_contents}\n```\n\n\
         Issue: [{:?}] {}{}\n\n\
         Respond with ONLY the complete corrected file contents.\n",
        issue.severity,
        issue.description,
        if issue.suggestion.is_empty() { String::new() } else { format!(" — suggested fix: {}", issue.suggestion) },
    )
}
