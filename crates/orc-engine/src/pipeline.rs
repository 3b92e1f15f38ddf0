//! `PipelineEngine`: the state-machine driver (section 4.8). Two entry
//! points, `run` (classical sequential/parallel-fan-out phases) and
//! `run_pipeline` (per-file pipelined mode, section 4.8.6), sharing the
//! phase state machine defined in `orc-core`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use orc_adapter::{Adapter, AdapterRequest};
use orc_config::ProjectConfig;
use orc_core::error::EngineError;
use orc_core::events::{EngineObserver, PhaseOutcome};
use orc_core::types::{AuditResult, Checkpoint, CheckpointKind, FileDescriptor, Phase, PhaseEvent, Role, Severity};
use orc_session::{commit_files, render_commit_message, SessionHandle, SessionStore};

use crate::approval::ApprovalHandler;
use crate::auditor::{audit_batched, audit_one_file};
use crate::executor::{execute_file, execute_sequential};
use crate::fix::{fix_file, group_by_file};
use crate::prompts::architect_prompt;
use crate::recovery::{run_recovery, PreRunSnapshots};
use crate::test_runner;

const SNAPSHOTS_FILE: &str = "pre_run_snapshots.json";

/// Epoch milliseconds for `audit-<epochms>`/`fix-<epochms>` checkpoint
/// labels (section 3's convention). `orc-engine` has no `chrono`
/// dependency, so this goes through `SystemTime` directly.
fn epoch_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Everything the engine needs to drive one workspace's runs: the
/// project config, the four role adapters, and the host's observer and
/// approval hooks.
pub struct PipelineEngine {
    workspace_root: PathBuf,
    store: SessionStore,
    config: ProjectConfig,
    adapters: HashMap<Role, Arc<dyn Adapter>>,
    observer: Arc<dyn EngineObserver>,
    approval: Arc<dyn ApprovalHandler>,
    interactive: bool,
}

impl PipelineEngine {
    pub fn new(
        workspace_root: impl Into<PathBuf>,
        config: ProjectConfig,
        adapters: HashMap<Role, Arc<dyn Adapter>>,
        observer: Arc<dyn EngineObserver>,
        approval: Arc<dyn ApprovalHandler>,
        interactive: bool,
    ) -> Self {
        let workspace_root = workspace_root.into();
        let store = SessionStore::new(&workspace_root);
        Self { workspace_root, store, config, adapters, observer, approval, interactive }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn adapter(&self, role: Role) -> Arc<dyn Adapter> {
        self.adapters
            .get(&role)
            .unwrap_or_else(|| panic!("no adapter configured for role {role}"))
            .clone()
    }

    /// Start a fresh run for `task` and drive it to a terminal phase.
    pub async fn run(&self, task: &str) -> Result<SessionHandle, EngineError> {
        let mut session = self.store.init(task, self.config.execution.max_iterations)?;
        apply(&mut session, PhaseEvent::RunAccepted)?;
        session.save()?;
        let session = self.drive(session).await?;
        self.maybe_recover(&session).await?;
        Ok(session)
    }

    /// Resume an existing, non-terminal session from its persisted phase.
    pub async fn resume(&self, session_id: &str) -> Result<SessionHandle, EngineError> {
        let session = self.store.load(session_id)?;
        self.observer.on_resume(session_id, session.session().phase, session.session().iteration);
        let session = self.drive(session).await?;
        self.maybe_recover(&session).await?;
        Ok(session)
    }

    /// After a run lands in `MaxIterations` with unresolved major/critical
    /// issues, optionally run a bounded rescue pass (section 4.10). Gated
    /// behind `recovery.autoActivate`; does not change the session's phase,
    /// it only tries to leave the workspace in better shape on disk.
    async fn maybe_recover(&self, session: &SessionHandle) -> Result<(), EngineError> {
        if session.session().phase != Phase::MaxIterations || !self.config.recovery.auto_activate {
            return Ok(());
        }

        let raw = match std::fs::read_to_string(session.audit_result_path()) {
            Ok(raw) => raw,
            Err(_) => return Ok(()),
        };
        let Ok(audit) = serde_json::from_str::<AuditResult>(&raw) else { return Ok(()) };
        let failed_files: Vec<(String, Vec<orc_core::types::AuditIssue>)> = group_by_file(&audit.issues)
            .into_iter()
            .map(|(file, issues)| {
                let severe = issues.into_iter().filter(|i| i.severity >= Severity::Major).collect::<Vec<_>>();
                (file, severe)
            })
            .filter(|(_, issues)| !issues.is_empty())
            .collect();
        if failed_files.is_empty() {
            return Ok(());
        }

        let snapshots: PreRunSnapshots = std::fs::read_to_string(session.dir().join(SNAPSHOTS_FILE))
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        let plan_text = self.plan_text(session).unwrap_or_default();
        let consultant = self.adapter(Role::Consultant);
        run_recovery(
            &self.workspace_root,
            consultant.as_ref(),
            &plan_text,
            failed_files,
            &snapshots,
            self.config.recovery.max_attempts,
            self.config.recovery.auto_revert_on_failure,
            &self.observer,
        )
        .await;
        Ok(())
    }

    async fn drive(&self, mut session: SessionHandle) -> Result<SessionHandle, EngineError> {
        loop {
            let phase = session.session().phase;
            if phase.is_terminal() {
                return Ok(session);
            }
            let result = match phase {
                Phase::Init | Phase::Planning => self.run_architect(&mut session).await,
                Phase::AwaitingApproval => self.run_approval(&mut session).await,
                Phase::Executing => self.run_executing(&mut session).await,
                Phase::Auditing => self.run_auditing(&mut session).await,
                Phase::Fixing => self.run_fixing(&mut session).await,
                Phase::Testing => self.run_testing(&mut session).await,
                Phase::Committing => self.run_committing(&mut session).await,
                Phase::Rejected | Phase::Completed | Phase::Failed | Phase::MaxIterations => {
                    unreachable!("terminal phases are returned above")
                }
            };
            if let Err(e) = result {
                session.session_mut().record_error(e.to_string());
                let _ = session.save();
                return Err(e);
            }
            session.save()?;
        }
    }

    /// Read the plan artifact and parse it into its ordered file
    /// descriptor list. A plan with no extractable targets is a fatal
    /// parse error (`NO_TARGETS`, section 7), not silently empty work.
    fn descriptors(&self, session: &SessionHandle) -> Result<Vec<FileDescriptor>, EngineError> {
        let plan_path = session.plan_path();
        let plan_text = std::fs::read_to_string(&plan_path)
            .map_err(|e| EngineError::Io { path: plan_path.display().to_string(), source: e })?;
        let descriptors = orc_parse::parse_plan(&plan_text);
        if descriptors.is_empty() {
            return Err(EngineError::NoTargets);
        }
        Ok(descriptors)
    }

    fn plan_text(&self, session: &SessionHandle) -> Result<String, EngineError> {
        let plan_path = session.plan_path();
        std::fs::read_to_string(&plan_path).map_err(|e| EngineError::Io { path: plan_path.display().to_string(), source: e })
    }

    /// Record each target file's contents as they stand right before the
    /// Executor first touches them, so a later `RecoveryEngine` pass can
    /// revert to them (or know the file is new and should be deleted
    /// instead). Best-effort: a failure to persist the snapshot doesn't
    /// fail the run, it just disables auto-revert for this session.
    fn snapshot_pre_run(&self, session: &SessionHandle, descriptors: &[FileDescriptor]) {
        let snapshots: PreRunSnapshots = descriptors
            .iter()
            .map(|d| {
                let contents = std::fs::read_to_string(self.workspace_root.join(&d.relative_path)).ok();
                (d.relative_path.clone(), contents)
            })
            .collect();
        if let Ok(serialized) = serde_json::to_vec_pretty(&snapshots) {
            let _ = orc_lock::write_atomic(&session.dir().join(SNAPSHOTS_FILE), &serialized);
        }
    }

    async fn run_architect(&self, session: &mut SessionHandle) -> Result<(), EngineError> {
        let started = Instant::now();
        self.observer.on_phase_start(Phase::Planning, "architect");

        let task = session.session().task.clone();
        let adapter = self.adapter(Role::Architect);
        let prompt = architect_prompt(&task, None);

        let outcome = adapter.execute(AdapterRequest::new(prompt)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(response) => {
                let plan_text = orc_parse::sanitize(&response.output);
                std::fs::write(session.plan_path(), &plan_text)
                    .map_err(|e| EngineError::Io { path: session.plan_path().display().to_string(), source: e })?;
                session.session_mut().push_checkpoint("plan");
                apply(session, PhaseEvent::ArchitectSucceeded { interactive: self.interactive })?;
                self.observer.on_phase_complete(Phase::Planning, "architect", PhaseOutcome { success: true, duration_ms });
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                apply(session, PhaseEvent::ArchitectFailed)?;
                self.observer.on_error(Phase::Planning, &message);
                Err(EngineError::Config(message))
            }
        }
    }

    async fn run_approval(&self, session: &mut SessionHandle) -> Result<(), EngineError> {
        self.observer.on_phase_start(Phase::AwaitingApproval, "approval");
        let plan_text = self.plan_text(session)?;
        let decision = self.approval.handle_plan_approval(&plan_text, &session.plan_path()).await;

        if !decision.approved {
            apply(session, PhaseEvent::ApprovalRejected)?;
            self.observer.on_phase_complete(
                Phase::AwaitingApproval,
                "approval",
                PhaseOutcome { success: false, duration_ms: 0 },
            );
            return Ok(());
        }

        if let Some(edited) = &decision.edited_plan_text {
            std::fs::write(session.plan_path(), edited)
                .map_err(|e| EngineError::Io { path: session.plan_path().display().to_string(), source: e })?;
            session.session_mut().push_checkpoint("plan-edited");
            apply(session, PhaseEvent::ApprovalEdited)?;
        } else {
            apply(session, PhaseEvent::ApprovalGranted)?;
        }
        self.observer.on_phase_complete(
            Phase::AwaitingApproval,
            "approval",
            PhaseOutcome { success: true, duration_ms: 0 },
        );
        Ok(())
    }

    async fn run_executing(&self, session: &mut SessionHandle) -> Result<(), EngineError> {
        let started = Instant::now();
        self.observer.on_phase_start(Phase::Executing, "executor");

        // Iteration is 1-based once execution begins (section 3): entering
        // the audit loop for the first time counts as iteration 1, not 0.
        if session.session().iteration == 0 {
            session.session_mut().iteration = 1;
        }

        // Resuming into a crash that happened after files were written but
        // before the Auditor started (section 4.8.7): the last checkpoint
        // is already an `exec-*` one, so re-driving the Executor would
        // redo work the files on disk already reflect. Skip straight to
        // the Audit loop instead.
        let already_executed =
            matches!(session.session().checkpoints.last().map(Checkpoint::kind), Some(CheckpointKind::Exec));
        if already_executed {
            apply(session, PhaseEvent::ExecutionComplete)?;
            let duration_ms = started.elapsed().as_millis() as u64;
            self.observer.on_phase_complete(Phase::Executing, "executor", PhaseOutcome { success: true, duration_ms });
            return Ok(());
        }

        let descriptors = self.descriptors(session)?;
        let plan_text = self.plan_text(session)?;
        let executor = self.adapter(Role::Executor);
        let consultant = self.adapter(Role::Consultant);

        self.snapshot_pre_run(session, &descriptors);

        if self.config.execution.parallel {
            let pool = orc_concurrency::ConcurrencyPool::new(self.config.execution.max_concurrency as usize);
            let total = descriptors.len();
            let workspace_root = self.workspace_root.clone();
            let plan_text = plan_text.clone();
            let observer = self.observer.clone();
            let session_dir = session.dir().to_path_buf();
            let _results = pool
                .run(descriptors, None, None, move |descriptor, index| {
                    let workspace_root = workspace_root.clone();
                    let plan_text = plan_text.clone();
                    let executor = executor.clone();
                    let consultant = consultant.clone();
                    let observer = observer.clone();
                    let session_dir = session_dir.clone();
                    async move {
                        execute_file(
                            &workspace_root,
                            &session_dir,
                            &plan_text,
                            &descriptor,
                            index,
                            total,
                            executor.as_ref(),
                            consultant.as_ref(),
                            &observer,
                        )
                        .await
                    }
                })
                .await;
        } else {
            execute_sequential(
                &self.workspace_root,
                session.dir(),
                &plan_text,
                &descriptors,
                executor.as_ref(),
                consultant.as_ref(),
                &self.observer,
            )
            .await
            .map_err(|failed| EngineError::Config(format!("execution failed for {}", failed.relative_path)))?;
        }

        let iteration = session.session().iteration;
        session.session_mut().push_checkpoint(format!("exec-{iteration}"));
        apply(session, PhaseEvent::ExecutionComplete)?;
        let duration_ms = started.elapsed().as_millis() as u64;
        self.observer.on_phase_complete(Phase::Executing, "executor", PhaseOutcome { success: true, duration_ms });
        Ok(())
    }

    async fn run_auditing(&self, session: &mut SessionHandle) -> Result<(), EngineError> {
        let started = Instant::now();
        self.observer.on_phase_start(Phase::Auditing, "auditor");

        let descriptors = self.descriptors(session)?;
        let plan_text = self.plan_text(session)?;
        let auditor = self.adapter(Role::Auditor);
        let relative_paths: Vec<String> = descriptors.iter().map(|d| d.relative_path.clone()).collect();

        let result = if self.config.execution.parallel {
            let mut results = Vec::with_capacity(relative_paths.len());
            for path in &relative_paths {
                let audit = audit_one_file(&self.workspace_root, auditor.as_ref(), &plan_text, path).await;
                self.observer.on_file_audit(path, audit.status, audit.issues.len());
                results.push(audit);
            }
            AuditResult::merge(results)
        } else {
            audit_batched(&self.workspace_root, auditor.as_ref(), &plan_text, &relative_paths).await
        };

        let serialized = serde_json::to_vec_pretty(&result)
            .map_err(|e| EngineError::Corrupt(format!("failed to serialize audit result: {e}")))?;
        orc_lock::write_atomic(&session.audit_result_path(), &serialized)
            .map_err(|e| EngineError::Io { path: session.audit_result_path().display().to_string(), source: std::io::Error::other(e) })?;

        session.session_mut().push_checkpoint(format!("audit-{}", epoch_millis()));

        let duration_ms = started.elapsed().as_millis() as u64;

        if result.is_approved() {
            let testing_enabled = self.config.test.run_after_generation;
            let commit_enabled = self.config.git.auto_commit;
            apply(session, PhaseEvent::AuditApproved { testing_enabled, commit_enabled })?;
        } else {
            let iteration = session.session().iteration;
            let max_iterations = session.session().max_iterations;
            apply(session, PhaseEvent::AuditNeedsWork { iteration, max_iterations })?;
        }

        self.observer.on_phase_complete(Phase::Auditing, "auditor", PhaseOutcome { success: true, duration_ms });
        Ok(())
    }

    async fn run_fixing(&self, session: &mut SessionHandle) -> Result<(), EngineError> {
        let started = Instant::now();
        self.observer.on_phase_start(Phase::Fixing, "executor");

        let plan_text = self.plan_text(session)?;
        let executor = self.adapter(Role::Executor);

        let raw = std::fs::read_to_string(session.audit_result_path())
            .map_err(|e| EngineError::Io { path: session.audit_result_path().display().to_string(), source: e })?;
        let audit: AuditResult = serde_json::from_str(&raw).map_err(|e| EngineError::Corrupt(e.to_string()))?;

        for (relative_path, issues) in group_by_file(&audit.issues) {
            fix_file(&self.workspace_root, executor.as_ref(), &plan_text, &relative_path, &issues, &self.observer).await;
        }

        let iteration = session.session().iteration;
        session.session_mut().iteration = iteration + 1;
        session.session_mut().push_checkpoint(format!("fix-{}", epoch_millis()));
        apply(session, PhaseEvent::FixComplete)?;

        let duration_ms = started.elapsed().as_millis() as u64;
        self.observer.on_phase_complete(Phase::Fixing, "executor", PhaseOutcome { success: true, duration_ms });
        Ok(())
    }

    async fn run_testing(&self, session: &mut SessionHandle) -> Result<(), EngineError> {
        let started = Instant::now();
        self.observer.on_phase_start(Phase::Testing, "test-runner");

        let command = self
            .config
            .test
            .command
            .clone()
            .or_else(|| test_runner::detect_command(&self.workspace_root));

        let gate = match &command {
            Some(cmd) => {
                self.observer.on_test_start(cmd);
                let timeout = std::time::Duration::from_millis(self.config.test.timeout);
                test_runner::run_tests(&self.workspace_root, cmd, timeout).await
            }
            None => orc_core::events::GateResult { success: true, output: "no test command detected".to_string() },
        };
        self.observer.on_test_complete(&gate);

        let commit_enabled = self.config.git.auto_commit;
        if gate.success {
            apply(session, PhaseEvent::TestsPassed { commit_enabled })?;
        } else {
            apply(session, PhaseEvent::TestsFailed)?;
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        self.observer.on_phase_complete(Phase::Testing, "test-runner", PhaseOutcome { success: gate.success, duration_ms });
        Ok(())
    }

    async fn run_committing(&self, session: &mut SessionHandle) -> Result<(), EngineError> {
        let started = Instant::now();
        self.observer.on_phase_start(Phase::Committing, "git");

        let descriptors = self.descriptors(session)?;
        let relative_paths: Vec<String> = descriptors.iter().map(|d| d.relative_path.clone()).collect();
        self.observer.on_commit_start(&relative_paths);

        let message = render_commit_message(&self.config.git.commit_message_template, &session.session().task);
        let outcome = commit_files(&self.workspace_root, &relative_paths, &message);

        let gate = match &outcome {
            Ok(orc_session::CommitOutcome::Committed { short_hash }) => {
                orc_core::events::GateResult { success: true, output: format!("committed {short_hash}") }
            }
            Ok(orc_session::CommitOutcome::NothingToCommit) => {
                orc_core::events::GateResult { success: true, output: "nothing to commit".to_string() }
            }
            Err(e) => orc_core::events::GateResult { success: false, output: e.to_string() },
        };
        self.observer.on_commit_complete(&gate);

        if gate.success {
            apply(session, PhaseEvent::CommitComplete)?;
        } else {
            return Err(outcome.unwrap_err());
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        self.observer.on_phase_complete(Phase::Committing, "git", PhaseOutcome { success: true, duration_ms });
        Ok(())
    }

    /// Pipeline mode (section 4.8.6): per-file Execute→Audit→Fix
    /// interleaving instead of batched phases. File-level approval is
    /// memoized; already-approved files are skipped on later iterations.
    pub async fn run_pipeline(&self, task: &str) -> Result<SessionHandle, EngineError> {
        let mut session = self.store.init(task, self.config.execution.max_iterations)?;
        apply(&mut session, PhaseEvent::RunAccepted)?;
        session.save()?;

        self.run_architect(&mut session).await?;
        session.save()?;
        if session.session().phase == Phase::AwaitingApproval {
            self.run_approval(&mut session).await?;
            session.save()?;
        }
        if session.session().phase != Phase::Executing {
            return Ok(session);
        }

        let descriptors = self.descriptors(&session)?;
        let plan_text = self.plan_text(&session)?;
        let max_iterations = session.session().max_iterations;

        self.snapshot_pre_run(&session, &descriptors);

        let executor = self.adapter(Role::Executor);
        let consultant = self.adapter(Role::Consultant);
        let auditor = self.adapter(Role::Auditor);

        let pool = orc_concurrency::ConcurrencyPool::new(self.config.execution.max_concurrency as usize);
        let total = descriptors.len();
        let workspace_root = self.workspace_root.clone();
        let observer = self.observer.clone();
        let session_dir = session.dir().to_path_buf();

        let results = pool
            .run(descriptors, None, None, move |descriptor, index| {
                let workspace_root = workspace_root.clone();
                let plan_text = plan_text.clone();
                let executor = executor.clone();
                let consultant = consultant.clone();
                let auditor = auditor.clone();
                let observer = observer.clone();
                let session_dir = session_dir.clone();
                async move {
                    run_one_file_pipeline(
                        &workspace_root,
                        &session_dir,
                        &plan_text,
                        &descriptor,
                        index,
                        total,
                        max_iterations,
                        executor.as_ref(),
                        consultant.as_ref(),
                        auditor.as_ref(),
                        &observer,
                    )
                    .await
                }
            })
            .await;

        let all_approved = results.iter().all(|r| matches!(r, Some(true)));
        session.session_mut().push_checkpoint(format!("exec-{max_iterations}"));
        apply(&mut session, PhaseEvent::ExecutionComplete)?;

        if all_approved {
            let testing_enabled = self.config.test.run_after_generation;
            let commit_enabled = self.config.git.auto_commit;
            apply(&mut session, PhaseEvent::AuditApproved { testing_enabled, commit_enabled })?;
        } else {
            apply(&mut session, PhaseEvent::AuditNeedsWork { iteration: max_iterations, max_iterations })?;
        }
        session.save()?;

        if session.session().phase == Phase::Testing {
            self.run_testing(&mut session).await?;
            session.save()?;
        }
        if session.session().phase == Phase::Committing {
            self.run_committing(&mut session).await?;
            session.save()?;
        }

        session.session_mut().push_checkpoint("pipeline-complete");
        session.save()?;

        Ok(session)
    }
}

/// Execute → Audit → Fix-if-needed for one file, up to `max_iterations`.
/// Returns whether the file ended APPROVED.
#[allow(clippy::too_many_arguments)]
async fn run_one_file_pipeline(
    workspace_root: &std::path::Path,
    session_dir: &std::path::Path,
    plan_text: &str,
    descriptor: &FileDescriptor,
    index: usize,
    total: usize,
    max_iterations: u32,
    executor: &dyn Adapter,
    consultant: &dyn Adapter,
    auditor: &dyn Adapter,
    observer: &Arc<dyn EngineObserver>,
) -> bool {
    execute_file(workspace_root, session_dir, plan_text, descriptor, index, total, executor, consultant, observer)
        .await;

    for iteration in 1..=max_iterations {
        let audit = audit_one_file(workspace_root, auditor, plan_text, &descriptor.relative_path).await;
        observer.on_file_audit(&descriptor.relative_path, audit.status, audit.issues.len());
        if audit.is_approved() {
            return true;
        }
        if iteration == max_iterations {
            return false;
        }
        let issues = audit.issues_for(&descriptor.relative_path).into_iter().cloned().collect::<Vec<_>>();
        fix_file(workspace_root, executor, plan_text, &descriptor.relative_path, &issues, observer).await;
    }
    false
}

fn apply(session: &mut SessionHandle, event: PhaseEvent) -> Result<Phase, EngineError> {
    let from = session.session().phase;
    let event_label = event.to_string();
    session
        .session_mut()
        .apply(&event)
        .map_err(|_| EngineError::InvalidTransition { from, event: event_label })
}
