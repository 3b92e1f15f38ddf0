//! Extracts the ordered list of target files from the Architect's
//! free-form plan text, per section 4.4.

use orc_core::types::FileDescriptor;

/// Extensions recognized by the whole-document fallback scan. Kept short
/// and explicit rather than regex-driven: the heading-based strategy
/// should win for any well-formed plan, and this is a last resort.
const KNOWN_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "tsx", "jsx", "go", "rb", "java", "c", "cpp", "h", "hpp", "toml",
    "json", "yaml", "yml", "md", "txt", "sh", "sql",
];

const TARGET_HEADINGS: &[&str] = &["files to create", "files to create/modify", "files to modify"];

/// Parse `plan_text` into an ordered, deduplicated (by final path
/// component) list of `FileDescriptor`s. Tries the heading-scoped
/// extraction first; falls back to a whole-document token scan only if
/// the heading strategy yields nothing.
pub fn parse_plan(plan_text: &str) -> Vec<FileDescriptor> {
    let from_heading = parse_from_heading(plan_text);
    let descriptors = if from_heading.is_empty() {
        parse_fallback_scan(plan_text)
    } else {
        from_heading
    };
    dedupe_by_final_component(descriptors)
}

fn is_target_heading(line: &str) -> bool {
    let trimmed = line.trim_start_matches('#').trim().to_lowercase();
    TARGET_HEADINGS.iter().any(|h| trimmed == *h)
}

/// Scan the section following a recognized heading (until the next
/// heading line or EOF) for `**`path`**: desc`, `` `path`: desc ``, or
/// bare `path.ext: desc` list items.
fn parse_from_heading(plan_text: &str) -> Vec<FileDescriptor> {
    let mut descriptors = Vec::new();
    let mut in_section = false;

    for line in plan_text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            if is_target_heading(trimmed) {
                in_section = true;
                continue;
            }
            if in_section {
                break; // next heading ends the section
            }
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some(descriptor) = parse_list_item(trimmed) {
            descriptors.push(descriptor);
        }
    }

    descriptors
}

/// Parse one list-item line into a `(path, description)` pair, trying the
/// three documented item formats in order.
fn parse_list_item(line: &str) -> Option<FileDescriptor> {
    let line = line.trim_start_matches(['-', '*']).trim();
    if line.is_empty() {
        return None;
    }

    // `**`path`**: description`
    if let Some(rest) = line.strip_prefix("**`") {
        if let Some(end) = rest.find("`**") {
            let path = &rest[..end];
            let desc = rest[end + 3..].trim_start_matches(':').trim();
            return has_extension(path).then(|| FileDescriptor {
                relative_path: path.to_string(),
                human_description: desc.to_string(),
            });
        }
    }

    // `` `path`: description ``
    if let Some(rest) = line.strip_prefix('`') {
        if let Some(end) = rest.find('`') {
            let path = &rest[..end];
            let desc = rest[end + 1..].trim_start_matches(':').trim();
            return has_extension(path).then(|| FileDescriptor {
                relative_path: path.to_string(),
                human_description: desc.to_string(),
            });
        }
    }

    // bare `path.ext: description`
    if let Some((path, desc)) = line.split_once(':') {
        let path = path.trim();
        if has_extension(path) && !path.contains(' ') {
            return Some(FileDescriptor {
                relative_path: path.to_string(),
                human_description: desc.trim().to_string(),
            });
        }
    }

    None
}

fn has_extension(path: &str) -> bool {
    path.rsplit('.').next().map(|ext| !ext.is_empty() && ext != path).unwrap_or(false)
}

/// Whole-document fallback: scan whitespace-delimited tokens for anything
/// ending in a known extension, emitting each in first-seen order.
fn parse_fallback_scan(plan_text: &str) -> Vec<FileDescriptor> {
    let mut descriptors = Vec::new();
    for raw_token in plan_text.split_whitespace() {
        let token = raw_token.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '/' && c != '_' && c != '-');
        if token.is_empty() {
            continue;
        }
        let Some(ext) = token.rsplit('.').next() else { continue };
        if !KNOWN_EXTENSIONS.contains(&ext) {
            continue;
        }
        if ext == token {
            continue; // token was only an extension, no basename
        }
        descriptors.push(FileDescriptor {
            relative_path: token.to_string(),
            human_description: "extracted from plan".to_string(),
        });
    }
    descriptors
}

fn dedupe_by_final_component(descriptors: Vec<FileDescriptor>) -> Vec<FileDescriptor> {
    let mut seen = std::collections::HashSet::new();
    descriptors
        .into_iter()
        .filter(|d| {
            let key = d.relative_path.rsplit('/').next().unwrap_or(&d.relative_path).to_string();
            seen.insert(key)
        })
        .collect()
}
