//! Consultant subroutine (section 4.9): a cooperative, inline rescue
//! invoked by the Executor/Fix phases when a just-written file fails
//! `SyntaxValidator` or looks structurally incomplete. Does not touch
//! session phase — it runs entirely inside the calling file task.

use std::sync::Arc;

use orc_adapter::{Adapter, AdapterRequest};
use orc_core::events::EngineObserver;

use crate::prompts::{consultant_prompt, ConsultantReason};

/// Small bounded retry count for the rescue loop (section 4.8.3).
pub const MAX_CONSULTANT_ATTEMPTS: u32 = 2;

/// Heuristic incompleteness check: unbalanced braces/parens, a TODO-shaped
/// stub, or a trailing open triple-quoted docstring.
pub fn looks_incomplete(content: &str) -> bool {
    let trimmed = content.trim_end();
    if trimmed.is_empty() {
        return true;
    }
    if unbalanced(trimmed, '{', '}') || unbalanced(trimmed, '(', ')') || unbalanced(trimmed, '[', ']') {
        return true;
    }
    if trimmed.lines().last().is_some_and(|l| l.trim_start().starts_with("TODO")) {
        return true;
    }
    let triple_quote_count = trimmed.matches("\"\"\"").count();
    if triple_quote_count % 2 == 1 {
        return true;
    }
    false
}

fn unbalanced(content: &str, open: char, close: char) -> bool {
    let mut depth: i64 = 0;
    for c in content.chars() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
        }
    }
    depth != 0
}

/// Invoke the Consultant adapter once and return its sanitized output, or
/// `None` if the call itself failed (e.g. every fallback exhausted).
pub async fn rescue(
    consultant: &dyn Adapter,
    observer: &Arc<dyn EngineObserver>,
    relative_path: &str,
    current_contents: &str,
    reason: ConsultantReason,
) -> Option<String> {
    let reason_label = match &reason {
        ConsultantReason::SyntaxError(_) => "syntax_error",
        ConsultantReason::Incomplete => "incomplete",
    };
    observer.on_consultant(relative_path, reason_label);

    let prompt = consultant_prompt(relative_path, current_contents, &reason);
    let request = AdapterRequest::new(prompt);
    match consultant.execute(request).await {
        Ok(response) => Some(orc_parse::sanitize(&response.output)),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_braces_is_complete() {
        assert!(!looks_incomplete("fn main() {\n    println!(\"hi\");\n}\n"));
    }

    #[test]
    fn unbalanced_brace_is_incomplete() {
        assert!(looks_incomplete("fn main() {\n    println!(\"hi\");\n"));
    }

    #[test]
    fn trailing_todo_is_incomplete() {
        assert!(looks_incomplete("def f():\n    pass\nTODO: finish this\n"));
    }

    #[test]
    fn open_docstring_is_incomplete() {
        assert!(looks_incomplete("def f():\n    \"\"\"starts a docstring that never closes\n"));
    }

    #[test]
    fn empty_content_is_incomplete() {
        assert!(looks_incomplete(""));
    }
}
