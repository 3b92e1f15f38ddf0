//! Project configuration: the JSON document read once at engine start
//! (SPEC_FULL.md section 6). Unlike the teacher's TOML project config, the
//! wire format here is JSON because the spec pins it down explicitly; the
//! "load what exists, default the rest via serde, validate eagerly
//! afterwards" shape is otherwise the same.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Policy for `AUTH` failures inside a fallback chain (SPEC_FULL.md open
/// question, decided): default is fail-fast since an auth failure usually
/// means the whole provider is unreachable, not just overloaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailurePolicy {
    FailFast,
    SkipToNext,
}

impl Default for AuthFailurePolicy {
    fn default() -> Self {
        Self::FailFast
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_max_concurrency", rename = "maxConcurrency")]
    pub max_concurrency: u32,
    #[serde(default = "default_max_iterations", rename = "maxIterations")]
    pub max_iterations: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
}

fn default_max_concurrency() -> u32 {
    3
}

fn default_max_iterations() -> u32 {
    5
}

fn default_timeout_ms() -> u64 {
    600_000
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            max_concurrency: default_max_concurrency(),
            max_iterations: default_max_iterations(),
            timeout: default_timeout_ms(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TestConfig {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default, rename = "runAfterGeneration")]
    pub run_after_generation: bool,
    #[serde(default = "default_test_timeout_ms")]
    pub timeout: u64,
}

fn default_test_timeout_ms() -> u64 {
    300_000
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default, rename = "autoCommit")]
    pub auto_commit: bool,
    #[serde(default = "default_commit_template", rename = "commitMessageTemplate")]
    pub commit_message_template: String,
}

fn default_commit_template() -> String {
    "orchestra: {task}".to_string()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self { auto_commit: false, commit_message_template: default_commit_template() }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_recovery_attempts", rename = "maxAttempts")]
    pub max_attempts: u32,
    #[serde(default = "default_recovery_timeout_ms")]
    pub timeout: u64,
    #[serde(default, rename = "autoRevertOnFailure")]
    pub auto_revert_on_failure: bool,
    /// Opt-in per the resolved open question: RecoveryEngine does not run
    /// automatically unless this is set.
    #[serde(default, rename = "autoActivate")]
    pub auto_activate: bool,
}

fn default_recovery_attempts() -> u32 {
    2
}

fn default_recovery_timeout_ms() -> u64 {
    180_000
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_recovery_attempts(),
            timeout: default_recovery_timeout_ms(),
            auto_revert_on_failure: false,
            auto_activate: false,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default)]
    pub architect: Vec<String>,
    #[serde(default)]
    pub executor: Vec<String>,
    #[serde(default)]
    pub auditor: Vec<String>,
    #[serde(default)]
    pub consultant: Vec<String>,
    #[serde(default)]
    pub auth_failure_policy: AuthFailurePolicy,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub test: TestConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionConfig::default(),
            test: TestConfig::default(),
            git: GitConfig::default(),
            languages: vec!["python".to_string()],
            recovery: RecoveryConfig::default(),
            agents: AgentsConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Load config from a JSON file at `path`. Returns the default config
    /// (not an error) if the file does not exist, matching the "project not
    /// yet configured" case the engine must tolerate at first run.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
        let config: ProjectConfig = serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
        Ok(config)
    }
}
