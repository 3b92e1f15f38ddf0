//! Maps the tool names a project config's `agents.*` lists reference to
//! concrete `CliAdapter`s: `gemini-cli` -> `gemini`, `opencode` ->
//! `opencode`, `codex` -> `codex`, `claude-code` -> `claude`.

use orc_adapter::{Adapter, CliAdapter};
use orc_scheduler::AdapterRegistry;
use std::sync::Arc;

/// Build the registry of every built-in tool adapter, keyed by the same
/// names a project config's `agents.architect`/`executor`/`auditor`/
/// `consultant` lists use.
pub fn built_in_registry() -> AdapterRegistry {
    let mut registry: AdapterRegistry = AdapterRegistry::new();

    let tools: [(&str, &str, &str, &str); 4] = [
        ("claude-code", "claude", "claude-3-5-sonnet", "anthropic"),
        ("codex", "codex", "gpt-5-codex", "openai"),
        ("gemini-cli", "gemini", "gemini-2.5-pro", "google"),
        ("opencode", "opencode", "default", "opencode"),
    ];

    for (name, executable, model, provider) in tools {
        let adapter: Arc<dyn Adapter> = Arc::new(CliAdapter::new(name, executable, Vec::new(), model, provider));
        registry.insert(name.to_string(), adapter);
    }

    registry
}
