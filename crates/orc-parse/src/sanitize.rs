//! Strips prose/fences around model-generated code, per section 4.5.
//! Lossless for already-clean output, and idempotent:
//! `sanitize(sanitize(x)) == sanitize(x)`.

const NARRATIVE_PREFIXES: &[&str] = &[
    "based on", "here's", "here is", "note:", "this code", "i've", "i have", "the above", "este código",
];

/// Line-start tokens that make a line look like the beginning of real
/// code for at least one supported language family.
const CODE_START_PREFIXES: &[&str] = &[
    "import ", "from ", "class ", "def ", "@", "#!", "\"\"\"", "'''", "#", "//", "/*",
    "const ", "let ", "var ", "function ", "export ", "package ", "use ", "fn ", "{", "[",
];

/// Remove the surrounding narration a model may emit around a fenced code
/// block or bare code, leaving only the code body.
pub fn sanitize(output: &str) -> String {
    let body = extract_fenced_block(output).unwrap_or_else(|| output.to_string());
    let trimmed_leading = trim_leading_narration(&body);
    let trimmed_trailing = trim_trailing_narration(&trimmed_leading);
    trimmed_trailing.trim().to_string()
}

/// If `output` contains a fenced code block (` ``` `, optionally with a
/// language tag on the opening fence), return the first block's body.
fn extract_fenced_block(output: &str) -> Option<String> {
    let start = output.find("```")?;
    let after_fence = &output[start + 3..];
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].to_string())
}

/// Drop leading lines until one looks like the start of real code.
fn trim_leading_narration(body: &str) -> String {
    let lines: Vec<&str> = body.lines().collect();
    let start = lines.iter().position(|l| looks_like_code_start(l)).unwrap_or(0);
    lines[start..].join("\n")
}

fn looks_like_code_start(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return false;
    }
    CODE_START_PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

/// Drop trailing narrative lines, stopping as soon as a line contains
/// code punctuation or starts with a letter/`@`/`#` (a forced stop, per
/// the documented heuristic).
fn trim_trailing_narration(body: &str) -> String {
    let mut lines: Vec<&str> = body.lines().collect();
    while let Some(last) = lines.last() {
        let trimmed = last.trim();
        if trimmed.is_empty() {
            lines.pop();
            continue;
        }
        let lower = trimmed.to_lowercase();
        let is_narrative = NARRATIVE_PREFIXES.iter().any(|p| lower.starts_with(p));
        let forces_stop = trimmed.contains(['{', '}', '(', ')', '[', ']', '\'', '"', ':', ','])
            || trimmed.starts_with(|c: char| c.is_alphabetic() || c == '@' || c == '#');
        if is_narrative && !forces_stop {
            lines.pop();
        } else {
            break;
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_code_passes_through_unchanged() {
        let code = "import os\n\ndef main():\n    pass\n";
        assert_eq!(sanitize(code), code.trim());
    }

    #[test]
    fn strips_fenced_block_with_language_tag() {
        let output = "Here's the file:\n```python\nimport os\nprint('hi')\n```\nLet me know if you need more.";
        assert_eq!(sanitize(output), "import os\nprint('hi')");
    }

    #[test]
    fn strips_fenced_block_without_language_tag() {
        let output = "```\nconst x = 1;\n```";
        assert_eq!(sanitize(output), "const x = 1;");
    }

    #[test]
    fn trims_leading_narrative_line_with_no_fence() {
        let output = "Here's the implementation you asked for\nimport sys\nsys.exit(0)";
        assert_eq!(sanitize(output), "import sys\nsys.exit(0)");
    }

    #[test]
    fn is_idempotent() {
        let output = "Based on your request:\n```js\nexport function add(a, b) {\n  return a + b;\n}\n```\nNote: tested locally.";
        let once = sanitize(output);
        let twice = sanitize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn forced_stop_keeps_trailing_code_like_line() {
        let output = "def f():\n    return {}\n";
        assert_eq!(sanitize(output), "def f():\n    return {}");
    }
}
