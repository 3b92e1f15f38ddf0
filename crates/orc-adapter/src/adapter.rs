//! The backend-agnostic contract over an external AI coding-assistant CLI.

use crate::error::AdapterError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// One call into an Adapter: a prompt plus optional output/working-dir hints.
#[derive(Clone, Debug)]
pub struct AdapterRequest {
    pub prompt: String,
    pub output_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl AdapterRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            output_path: None,
            working_dir: None,
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_output_path(mut self, path: PathBuf) -> Self {
        self.output_path = Some(path);
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The result of a successful `Adapter::execute` call.
#[derive(Clone, Debug)]
pub struct AdapterResponse {
    pub output: String,
    pub output_path: Option<PathBuf>,
    pub duration_ms: u64,
}

/// Metadata describing an adapter instance, used for logging, UI display,
/// and fallback decisions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub model: String,
    pub provider: String,
    pub mode: Option<String>,
}

/// Uniform "run one prompt, produce one output artifact" contract over an
/// external AI coding-assistant CLI.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Launch the backing tool, capture its primary textual output, and map
    /// the tool's exit status into success or a classified `AdapterError`.
    /// Must be safely re-runnable: callers may retry the same request.
    async fn execute(&self, request: AdapterRequest) -> Result<AdapterResponse, AdapterError>;

    /// Cheap health probe: endpoint reachability, credentials present, or
    /// simply that the backing executable resolves on `PATH`.
    async fn is_available(&self) -> bool;

    /// Metadata used for logging, UI display, and fallback decisions.
    fn info(&self) -> AdapterInfo;
}
