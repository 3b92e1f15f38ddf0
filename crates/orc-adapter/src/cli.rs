//! `CliAdapter`: drives one external AI coding-assistant CLI as a child
//! process. The prompt is written to the child's stdin; stdout is captured
//! as the primary output artifact and optionally also persisted to
//! `output_path`.

use crate::adapter::{Adapter, AdapterInfo, AdapterRequest, AdapterResponse};
use crate::error::{AdapterError, AdapterErrorKind};
use async_trait::async_trait;
use orc_process::{StreamMode, check_tool_installed, run_and_capture_with_stdin};
use std::time::Instant;
use tokio::process::Command;

/// A CLI-backed adapter: `executable [args...]`, fed the prompt on stdin.
#[derive(Clone, Debug)]
pub struct CliAdapter {
    name: String,
    executable: String,
    args: Vec<String>,
    model: String,
    provider: String,
    mode: Option<String>,
}

impl CliAdapter {
    pub fn new(
        name: impl Into<String>,
        executable: impl Into<String>,
        args: Vec<String>,
        model: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            args,
            model: model.into(),
            provider: provider.into(),
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }
}

#[async_trait]
impl Adapter for CliAdapter {
    async fn execute(
        &self,
        request: AdapterRequest,
    ) -> Result<AdapterResponse, AdapterError> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.args);
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }

        let result = tokio::time::timeout(
            request.timeout,
            run_and_capture_with_stdin(
                cmd,
                Some(request.prompt.clone().into_bytes()),
                StreamMode::BufferOnly,
            ),
        )
        .await
        .map_err(|_| AdapterError::new(AdapterErrorKind::Timeout, "adapter call exceeded timeout"))?
        .map_err(|e| AdapterError::new(AdapterErrorKind::Other, e.to_string()))?;

        if result.exit_code != 0 {
            return Err(AdapterError::from_process_failure(
                &result.stderr_output,
                result.exit_code,
                &result.summary,
            ));
        }

        if let Some(path) = &request.output_path {
            if let Err(e) = tokio::fs::write(path, &result.output).await {
                return Err(AdapterError::new(
                    AdapterErrorKind::Other,
                    format!("failed to write output to {}: {e}", path.display()),
                ));
            }
        }

        Ok(AdapterResponse {
            output: result.output,
            output_path: request.output_path,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn is_available(&self) -> bool {
        check_tool_installed(&self.executable).await.is_ok()
    }

    fn info(&self) -> AdapterInfo {
        AdapterInfo {
            name: self.name.clone(),
            model: self.model.clone(),
            provider: self.provider.clone(),
            mode: self.mode.clone(),
        }
    }
}
