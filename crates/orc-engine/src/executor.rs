//! Executor phase, per file (section 4.8.3): prompt → adapter call →
//! sanitize → write → validate, with the Consultant subroutine as an
//! inline rescue on syntax/incompleteness failure.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use orc_adapter::{Adapter, AdapterRequest};
use orc_core::events::EngineObserver;
use orc_core::types::FileDescriptor;
use orc_session::sanitize_path_component;

use crate::consultant::{looks_incomplete, rescue, MAX_CONSULTANT_ATTEMPTS};
use crate::prompts::{executor_prompt, ConsultantReason};

/// Mirrors `SessionHandle::temp_output_path` without borrowing the handle
/// itself, so callers fanning out across spawned tasks only need to carry
/// an owned session directory `PathBuf`.
fn temp_output_path(session_dir: &Path, relative_path: &str) -> std::path::PathBuf {
    session_dir.join(format!("temp_{}", sanitize_path_component(relative_path)))
}

/// Outcome of writing (and, if needed, rescuing) one target file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub relative_path: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Run the Executor for a single `FileDescriptor`: produce, sanitize,
/// write, and syntax-validate the target file, invoking the Consultant
/// rescue loop on failure. Never panics; adapter/IO failures are folded
/// into a failed `FileOutcome`.
pub async fn execute_file(
    workspace_root: &Path,
    session_dir: &Path,
    plan_text: &str,
    descriptor: &FileDescriptor,
    index: usize,
    total: usize,
    executor: &dyn Adapter,
    consultant: &dyn Adapter,
    observer: &Arc<dyn EngineObserver>,
) -> FileOutcome {
    let started = Instant::now();
    observer.on_file_start(&descriptor.relative_path, index, total);

    let outcome = run_file(workspace_root, session_dir, plan_text, descriptor, executor, consultant, observer).await;

    let duration_ms = started.elapsed().as_millis() as u64;
    observer.on_file_complete(&descriptor.relative_path, outcome.is_ok(), duration_ms);

    match outcome {
        Ok(()) => FileOutcome {
            relative_path: descriptor.relative_path.clone(),
            success: true,
            error: None,
            duration_ms,
        },
        Err(message) => FileOutcome {
            relative_path: descriptor.relative_path.clone(),
            success: false,
            error: Some(message),
            duration_ms,
        },
    }
}

async fn run_file(
    workspace_root: &Path,
    session_dir: &Path,
    plan_text: &str,
    descriptor: &FileDescriptor,
    executor: &dyn Adapter,
    consultant: &dyn Adapter,
    observer: &Arc<dyn EngineObserver>,
) -> Result<(), String> {
    let prompt = executor_prompt(plan_text, descriptor);
    let response = executor
        .execute(AdapterRequest::new(prompt))
        .await
        .map_err(|e| format!("executor adapter failed for {}: {e}", descriptor.relative_path))?;

    let temp_path = temp_output_path(session_dir, &descriptor.relative_path);
    if let Some(parent) = temp_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    std::fs::write(&temp_path, &response.output).map_err(|e| e.to_string())?;

    let mut code = orc_parse::sanitize(&response.output);
    let destination = workspace_root.join(&descriptor.relative_path);
    write_destination(&destination, &code)?;

    let mut remaining_attempts = MAX_CONSULTANT_ATTEMPTS;
    loop {
        let check = orc_parse::validate_syntax(&descriptor.relative_path, &destination).await;
        observer.on_syntax_check(&descriptor.relative_path, check.valid, check.error.as_deref());

        let reason = if !check.valid {
            Some(ConsultantReason::SyntaxError(check.error.clone().unwrap_or_default()))
        } else if looks_incomplete(&code) {
            Some(ConsultantReason::Incomplete)
        } else {
            None
        };

        let Some(reason) = reason else { return Ok(()) };
        if remaining_attempts == 0 {
            // Exhausted: leave the (invalid or incomplete) file in place
            // for the Auditor to surface, per section 4.8.3.
            return Ok(());
        }
        remaining_attempts -= 1;

        match rescue(consultant, observer, &descriptor.relative_path, &code, reason).await {
            Some(rescued) => {
                code = rescued;
                write_destination(&destination, &code)?;
            }
            None => return Ok(()),
        }
    }
}

fn write_destination(path: &Path, contents: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    std::fs::write(path, contents).map_err(|e| e.to_string())
}

/// Sequential mode: execute every descriptor in order, stopping at the
/// first failure (section 4.8.3: "sequential mode: a single file failure
/// fails the whole phase").
pub async fn execute_sequential(
    workspace_root: &Path,
    session_dir: &Path,
    plan_text: &str,
    descriptors: &[FileDescriptor],
    executor: &dyn Adapter,
    consultant: &dyn Adapter,
    observer: &Arc<dyn EngineObserver>,
) -> Result<Vec<FileOutcome>, FileOutcome> {
    let total = descriptors.len();
    let mut outcomes = Vec::with_capacity(total);
    for (index, descriptor) in descriptors.iter().enumerate() {
        let outcome = execute_file(
            workspace_root,
            session_dir,
            plan_text,
            descriptor,
            index,
            total,
            executor,
            consultant,
            observer,
        )
        .await;
        if !outcome.success {
            return Err(outcome);
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orc_adapter::{AdapterError, AdapterErrorKind, AdapterInfo, AdapterResponse};
    use orc_core::events::NullObserver;
    use orc_session::SessionStore;

    struct StaticAdapter(&'static str);

    #[async_trait]
    impl Adapter for StaticAdapter {
        async fn execute(&self, _request: AdapterRequest) -> Result<AdapterResponse, AdapterError> {
            Ok(AdapterResponse { output: self.0.to_string(), output_path: None, duration_ms: 0 })
        }
        async fn is_available(&self) -> bool {
            true
        }
        fn info(&self) -> AdapterInfo {
            AdapterInfo { name: "static".into(), model: "m".into(), provider: "p".into(), mode: None }
        }
    }

    struct FailingAdapter;

    #[async_trait]
    impl Adapter for FailingAdapter {
        async fn execute(&self, _request: AdapterRequest) -> Result<AdapterResponse, AdapterError> {
            Err(AdapterError::new(AdapterErrorKind::Other, "boom"))
        }
        async fn is_available(&self) -> bool {
            false
        }
        fn info(&self) -> AdapterInfo {
            AdapterInfo { name: "failing".into(), model: "m".into(), provider: "p".into(), mode: None }
        }
    }

    #[tokio::test]
    async fn writes_sanitized_output_to_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = store.init("task", 3).unwrap();
        let observer: Arc<dyn EngineObserver> = Arc::new(NullObserver);

        let executor = StaticAdapter("```\nprint('hello')\n```");
        let consultant = StaticAdapter("unused");
        let descriptor =
            FileDescriptor { relative_path: "hello.py".into(), human_description: "greet".into() };

        let outcome = execute_file(
            tmp.path(),
            session.dir(),
            "plan text",
            &descriptor,
            0,
            1,
            &executor,
            &consultant,
            &observer,
        )
        .await;

        assert!(outcome.success);
        let written = std::fs::read_to_string(tmp.path().join("hello.py")).unwrap();
        assert_eq!(written, "print('hello')");
    }

    #[tokio::test]
    async fn adapter_failure_yields_failed_outcome() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = store.init("task", 3).unwrap();
        let observer: Arc<dyn EngineObserver> = Arc::new(NullObserver);

        let executor = FailingAdapter;
        let consultant = StaticAdapter("unused");
        let descriptor =
            FileDescriptor { relative_path: "broken.py".into(), human_description: "x".into() };

        let outcome = execute_file(
            tmp.path(),
            session.dir(),
            "plan text",
            &descriptor,
            0,
            1,
            &executor,
            &consultant,
            &observer,
        )
        .await;

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn invalid_python_is_rescued_by_consultant() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = store.init("task", 3).unwrap();
        let observer: Arc<dyn EngineObserver> = Arc::new(NullObserver);

        // Missing closing paren: py_compile will reject this.
        let executor = StaticAdapter("print('unterminated'");
        let consultant = StaticAdapter("print('fixed')");
        let descriptor =
            FileDescriptor { relative_path: "fix_me.py".into(), human_description: "x".into() };

        let outcome = execute_file(
            tmp.path(),
            session.dir(),
            "plan text",
            &descriptor,
            0,
            1,
            &executor,
            &consultant,
            &observer,
        )
        .await;

        assert!(outcome.success);
        let written = std::fs::read_to_string(tmp.path().join("fix_me.py")).unwrap();
        assert_eq!(written, "print('fixed')");
    }
}
