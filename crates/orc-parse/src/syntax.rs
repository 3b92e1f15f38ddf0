//! Per-extension syntax validation (section 4.6): a cheap "looks-like-code"
//! gate ahead of an actual subprocess-backed validator for languages whose
//! tooling ships a compile-only check.

use std::path::Path;

use orc_process::run_and_capture;

/// Outcome of validating one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxCheck {
    pub valid: bool,
    pub error: Option<String>,
}

impl SyntaxCheck {
    fn ok() -> Self {
        Self { valid: true, error: None }
    }

    fn err(message: impl Into<String>) -> Self {
        Self { valid: false, error: Some(message.into()) }
    }
}

/// Cheap, language-aware gate run before the subprocess validator (and
/// standalone, for extensions with no validator at all): rejects prose
/// that slipped past `sanitize`.
pub fn looks_like_code(relative_path: &str, content: &str) -> bool {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return false;
    }
    match extension(relative_path) {
        "py" => {
            trimmed.starts_with("import ")
                || trimmed.starts_with("from ")
                || trimmed.starts_with("class ")
                || trimmed.starts_with("def ")
                || trimmed.starts_with('@')
                || trimmed.starts_with('#')
                || trimmed.starts_with("\"\"\"")
                || trimmed.starts_with('\'')
                || content.lines().any(|l| {
                    let l = l.trim_start();
                    l.starts_with(char::is_alphabetic) && l.contains('=') && !l.contains(' ')
                })
                || content.contains('=')
        }
        "txt" if relative_path.ends_with("requirements.txt") => {
            trimmed.starts_with(|c: char| c.is_alphanumeric())
        }
        "js" | "ts" | "jsx" | "tsx" => {
            trimmed.starts_with("import ")
                || trimmed.starts_with("export ")
                || trimmed.starts_with("const ")
                || trimmed.starts_with("let ")
                || trimmed.starts_with("var ")
                || trimmed.starts_with("function ")
                || trimmed.starts_with("class ")
                || trimmed.starts_with("//")
                || trimmed.starts_with("/*")
        }
        "json" => trimmed.starts_with('{') || trimmed.starts_with('['),
        _ => true, // unsupported extensions: no gate opinion
    }
}

fn extension(relative_path: &str) -> &str {
    Path::new(relative_path).extension().and_then(|e| e.to_str()).unwrap_or("")
}

/// Run the language validator appropriate for `relative_path`'s extension
/// against `absolute_path`'s on-disk contents. Extensions with no known
/// validator return `valid: true` unconditionally, per section 4.6.
pub async fn validate_syntax(relative_path: &str, absolute_path: &Path) -> SyntaxCheck {
    match extension(relative_path) {
        "py" => validate_python(absolute_path).await,
        "json" => validate_json(absolute_path),
        _ => SyntaxCheck::ok(),
    }
}

async fn validate_python(absolute_path: &Path) -> SyntaxCheck {
    let mut cmd = tokio::process::Command::new("python3");
    cmd.arg("-m").arg("py_compile").arg(absolute_path);
    match run_and_capture(cmd).await {
        Ok(result) if result.exit_code == 0 => SyntaxCheck::ok(),
        Ok(result) => SyntaxCheck::err(if result.stderr_output.trim().is_empty() {
            result.summary
        } else {
            result.stderr_output
        }),
        Err(e) => SyntaxCheck::err(format!("failed to invoke python3: {e}")),
    }
}

fn validate_json(absolute_path: &Path) -> SyntaxCheck {
    match std::fs::read_to_string(absolute_path) {
        Ok(content) => match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(_) => SyntaxCheck::ok(),
            Err(e) => SyntaxCheck::err(e.to_string()),
        },
        Err(e) => SyntaxCheck::err(format!("failed to read {}: {e}", absolute_path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn looks_like_code_accepts_python_import() {
        assert!(looks_like_code("hello.py", "import os\nprint('hi')\n"));
    }

    #[test]
    fn looks_like_code_rejects_empty_content() {
        assert!(!looks_like_code("hello.py", "   \n"));
    }

    #[test]
    fn looks_like_code_accepts_json_opener() {
        assert!(looks_like_code("data.json", "{\"key\": 1}"));
        assert!(!looks_like_code("data.json", "this is not json"));
    }

    #[test]
    fn looks_like_code_is_permissive_for_unsupported_extensions() {
        assert!(looks_like_code("README.md", "anything goes here"));
    }

    #[tokio::test]
    async fn validate_json_accepts_well_formed_document() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ok.json");
        fs::write(&path, "{\"a\": 1}").unwrap();
        let check = validate_syntax("ok.json", &path).await;
        assert!(check.valid);
    }

    #[tokio::test]
    async fn validate_json_rejects_malformed_document() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        let check = validate_syntax("bad.json", &path).await;
        assert!(!check.valid);
        assert!(check.error.is_some());
    }

    #[tokio::test]
    async fn validate_unsupported_extension_is_always_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.md");
        fs::write(&path, "anything").unwrap();
        let check = validate_syntax("notes.md", &path).await;
        assert!(check.valid);
    }
}
