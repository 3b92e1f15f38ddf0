//! Parses the Auditor's response into an `AuditResult`, per section 6's
//! wire format and the lenient-fallback policy recorded in `DESIGN.md`.

use orc_core::types::AuditResult;

/// Parse the Auditor's raw textual response into an `AuditResult`.
///
/// Tries strict JSON first. On failure, falls back to a best-effort scan
/// for the first balanced `{...}` span in the text and retries as JSON.
/// A response that still can't be parsed synthesizes a `NEEDS_WORK` result
/// carrying the raw text as its single issue, per the unparsable-audit
/// error-handling policy (section 7) — never a phase crash.
pub fn parse_audit_response(raw: &str) -> AuditResult {
    if let Ok(result) = serde_json::from_str::<AuditResult>(raw.trim()) {
        return result;
    }

    if let Some(span) = first_balanced_object(raw) {
        if let Ok(result) = serde_json::from_str::<AuditResult>(span) {
            return result;
        }
    }

    synthesize_unparsable(raw)
}

fn synthesize_unparsable(raw: &str) -> AuditResult {
    use orc_core::types::{AuditIssue, AuditStatus, Severity};
    AuditResult {
        status: AuditStatus::NeedsWork,
        issues: vec![AuditIssue {
            file: String::new(),
            severity: Severity::Major,
            description: "unparsable audit".to_string(),
            suggestion: raw.trim().to_string(),
        }],
        summary: "auditor response could not be parsed as JSON".to_string(),
    }
}

/// Scan for the first balanced `{...}` span, respecting string literals so
/// braces inside quoted text don't unbalance the scan.
fn first_balanced_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        let c = b as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
