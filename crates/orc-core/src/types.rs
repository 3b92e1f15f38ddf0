//! Shared data model: the Session record, its phase state machine, and the
//! small structured payloads (file descriptors, audit issues) that flow
//! between engine components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The four pipeline roles, each backed by one adapter slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Architect,
    Executor,
    Auditor,
    Consultant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Architect => "architect",
            Self::Executor => "executor",
            Self::Auditor => "auditor",
            Self::Consultant => "consultant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a single role within the current session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleStatus {
    #[default]
    Idle,
    InProgress,
    Completed,
    Failed,
}

/// Per-role bookkeeping: current status plus the duration of its last call.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct RoleState {
    pub status: RoleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_duration_ms: Option<u64>,
}

/// Lifecycle phase of a session. See the phase transition table in
/// `SPEC_FULL.md` section 4.8.1 for the authoritative state diagram.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Init,
    Planning,
    AwaitingApproval,
    Rejected,
    Executing,
    Auditing,
    Fixing,
    MaxIterations,
    Testing,
    Committing,
    Completed,
    Failed,
}

/// An event driving a phase transition. Carried as data (rather than just a
/// bare string) so `PipelineEngine::apply` can pattern-match exhaustively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhaseEvent {
    RunAccepted,
    ArchitectSucceeded { interactive: bool },
    ArchitectFailed,
    ApprovalGranted,
    ApprovalRejected,
    ApprovalEdited,
    ExecutionComplete,
    ExecutionFailed,
    AuditApproved { testing_enabled: bool, commit_enabled: bool },
    AuditNeedsWork { iteration: u32, max_iterations: u32 },
    FixComplete,
    TestsPassed { commit_enabled: bool },
    TestsFailed,
    CommitComplete,
}

impl fmt::Display for PhaseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Phase {
    /// Whether this phase is terminal: no further transitions are possible
    /// and `can_resume` must read false.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Phase::Completed | Phase::Failed | Phase::Rejected | Phase::MaxIterations
        )
    }

    /// Attempt a phase transition driven by `event`. Mirrors the table in
    /// SPEC_FULL.md section 4.8.1; any combination not listed there is
    /// rejected rather than silently accepted.
    pub fn transition(&self, event: &PhaseEvent) -> Result<Phase, String> {
        use Phase::*;
        use PhaseEvent::*;
        match (self, event) {
            (Init, RunAccepted) => Ok(Planning),
            (Planning, ArchitectSucceeded { interactive: true }) => Ok(AwaitingApproval),
            (Planning, ArchitectSucceeded { interactive: false }) => Ok(Executing),
            (Planning, ArchitectFailed) => Ok(Failed),
            (AwaitingApproval, ApprovalGranted) => Ok(Executing),
            (AwaitingApproval, ApprovalRejected) => Ok(Rejected),
            (AwaitingApproval, ApprovalEdited) => Ok(Executing),
            (Executing, ExecutionComplete) => Ok(Auditing),
            (Executing, ExecutionFailed) => Ok(Failed),
            (Auditing, AuditApproved { testing_enabled: true, .. }) => Ok(Testing),
            (Auditing, AuditApproved { testing_enabled: false, commit_enabled: true }) => {
                Ok(Committing)
            }
            (Auditing, AuditApproved { testing_enabled: false, commit_enabled: false }) => {
                Ok(Completed)
            }
            (Auditing, AuditNeedsWork { iteration, max_iterations }) if iteration < max_iterations => {
                Ok(Fixing)
            }
            (Auditing, AuditNeedsWork { .. }) => Ok(MaxIterations),
            (Fixing, FixComplete) => Ok(Auditing),
            (Testing, TestsPassed { commit_enabled: true }) => Ok(Committing),
            (Testing, TestsPassed { commit_enabled: false }) => Ok(Completed),
            (Testing, TestsFailed) => Ok(Failed),
            (Committing, CommitComplete) => Ok(Completed),
            (current, event) => Err(format!(
                "no transition from {current:?} on event {event}"
            )),
        }
    }
}

/// A labeled, timestamped marker appended to a session for crash recovery.
/// Labels follow the convention documented in SPEC_FULL.md section 3:
/// `plan`, `plan-edited`, `exec-<n>`, `audit-<epochms>`, `fix-<epochms>`,
/// `pipeline-complete`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), timestamp: Utc::now() }
    }

    /// Resume-point classification used by `resume()`: pattern-match the
    /// label prefix rather than the exact string, since `exec-<n>` and
    /// `audit-<epochms>` vary per run.
    pub fn kind(&self) -> CheckpointKind {
        if self.label.starts_with("plan") {
            CheckpointKind::Plan
        } else if self.label.starts_with("exec") {
            CheckpointKind::Exec
        } else if self.label.starts_with("audit") {
            CheckpointKind::Audit
        } else if self.label.starts_with("fix") {
            CheckpointKind::Fix
        } else {
            CheckpointKind::Other
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckpointKind {
    Plan,
    Exec,
    Audit,
    Fix,
    Other,
}

/// The persistent unit of engine state for one task run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub task: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub phase: Phase,
    /// 1-based once execution begins; 0 before the first iteration starts.
    pub iteration: u32,
    pub max_iterations: u32,
    pub roles: HashMap<Role, RoleState>,
    pub checkpoints: Vec<Checkpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, task: impl Into<String>, max_iterations: u32) -> Self {
        let now = Utc::now();
        let mut roles = HashMap::new();
        for role in [Role::Architect, Role::Executor, Role::Auditor, Role::Consultant] {
            roles.insert(role, RoleState::default());
        }
        Self {
            session_id: session_id.into(),
            task: task.into(),
            created_at: now,
            last_activity: now,
            phase: Phase::Init,
            iteration: 0,
            max_iterations,
            roles,
            checkpoints: Vec::new(),
            last_error: None,
        }
    }

    /// True iff the session's persisted phase is non-terminal: `resume()`
    /// has somewhere to pick back up.
    pub fn can_resume(&self) -> bool {
        !self.phase.is_terminal()
    }

    pub fn set_role_status(&mut self, role: Role, status: RoleStatus) {
        self.roles.entry(role).or_default().status = status;
    }

    pub fn set_role_duration(&mut self, role: Role, duration_ms: u64) {
        self.roles.entry(role).or_default().last_duration_ms = Some(duration_ms);
    }

    pub fn push_checkpoint(&mut self, label: impl Into<String>) {
        self.checkpoints.push(Checkpoint::new(label));
        self.last_activity = Utc::now();
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.last_activity = Utc::now();
    }

    /// Apply a phase transition, touching `last_activity`. Returns the
    /// previous phase on success for logging by the caller.
    pub fn apply(&mut self, event: &PhaseEvent) -> Result<Phase, String> {
        let next = self.phase.transition(event)?;
        let previous = self.phase;
        self.phase = next;
        self.last_activity = Utc::now();
        Ok(previous)
    }
}

/// Generate a new, lexicographically-sortable session identifier.
pub fn new_session_id() -> String {
    ulid::Ulid::new().to_string()
}

/// Severity of an audit issue, used to decide Fix priority and Recovery
/// eligibility (only `major`/`critical` issues trigger RecoveryEngine).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

/// One structured criticism of a single generated file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditIssue {
    pub file: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
}

/// Overall audit verdict, either batched (whole run) or merged from
/// per-file audits in pipeline mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Approved,
    NeedsWork,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditResult {
    pub status: AuditStatus,
    #[serde(default)]
    pub issues: Vec<AuditIssue>,
    #[serde(default)]
    pub summary: String,
}

impl AuditResult {
    /// Per the data-model invariant: an empty-issues NEEDS_WORK is still
    /// NEEDS_WORK, never silently promoted to approved.
    pub fn is_approved(&self) -> bool {
        self.status == AuditStatus::Approved
    }

    pub fn issues_for(&self, file: &str) -> Vec<&AuditIssue> {
        self.issues.iter().filter(|i| i.file == file).collect()
    }

    /// Merge per-file audits (pipeline/parallel mode): APPROVED iff every
    /// input is approved; issues are unioned.
    pub fn merge(results: impl IntoIterator<Item = AuditResult>) -> AuditResult {
        let mut issues = Vec::new();
        let mut all_approved = true;
        let mut summaries = Vec::new();
        for r in results {
            if !r.is_approved() {
                all_approved = false;
            }
            summaries.push(r.summary);
            issues.extend(r.issues);
        }
        AuditResult {
            status: if all_approved { AuditStatus::Approved } else { AuditStatus::NeedsWork },
            issues,
            summary: summaries.join("; "),
        }
    }
}

/// `(relative_path, human_description)` extracted from the plan by
/// `PlanParser`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub relative_path: String,
    pub human_description: String,
}

/// The outcome of the user-facing (or auto-) plan approval hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub reason: Option<ApprovalReason>,
    pub edited_plan_text: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalReason {
    Rejected,
    Edit,
}

impl ApprovalDecision {
    pub fn approve() -> Self {
        Self { approved: true, reason: None, edited_plan_text: None }
    }

    pub fn reject() -> Self {
        Self { approved: false, reason: Some(ApprovalReason::Rejected), edited_plan_text: None }
    }

    pub fn edit(text: impl Into<String>) -> Self {
        Self {
            approved: true,
            reason: Some(ApprovalReason::Edit),
            edited_plan_text: Some(text.into()),
        }
    }
}

/// CLI-host exit codes, per SPEC_FULL.md section 6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Completed = 0,
    Failed = 1,
    MaxIterations = 2,
    PlanRejected = 3,
    TestsFailed = 4,
    CommitFailed = 5,
}

impl Phase {
    /// Map a terminal phase to the CLI exit code a host process should use.
    /// Returns `None` for non-terminal phases.
    pub fn exit_code(&self) -> Option<ExitCode> {
        match self {
            Phase::Completed => Some(ExitCode::Completed),
            Phase::Failed => Some(ExitCode::Failed),
            Phase::MaxIterations => Some(ExitCode::MaxIterations),
            Phase::Rejected => Some(ExitCode::PlanRejected),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let mut session = Session::new("01ARZ", "create hello.py", 3);
        session.apply(&PhaseEvent::RunAccepted).unwrap();
        assert_eq!(session.phase, Phase::Planning);
        session
            .apply(&PhaseEvent::ArchitectSucceeded { interactive: false })
            .unwrap();
        assert_eq!(session.phase, Phase::Executing);
        session.apply(&PhaseEvent::ExecutionComplete).unwrap();
        assert_eq!(session.phase, Phase::Auditing);
        session
            .apply(&PhaseEvent::AuditApproved { testing_enabled: false, commit_enabled: false })
            .unwrap();
        assert_eq!(session.phase, Phase::Completed);
        assert!(!session.can_resume());
    }

    #[test]
    fn needs_work_under_cap_goes_to_fixing() {
        let phase = Phase::Auditing;
        let next = phase
            .transition(&PhaseEvent::AuditNeedsWork { iteration: 1, max_iterations: 3 })
            .unwrap();
        assert_eq!(next, Phase::Fixing);
    }

    #[test]
    fn needs_work_at_cap_goes_to_max_iterations() {
        let phase = Phase::Auditing;
        let next = phase
            .transition(&PhaseEvent::AuditNeedsWork { iteration: 3, max_iterations: 3 })
            .unwrap();
        assert_eq!(next, Phase::MaxIterations);
        assert!(next.is_terminal());
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let phase = Phase::Init;
        let result = phase.transition(&PhaseEvent::ExecutionComplete);
        assert!(result.is_err());
    }

    #[test]
    fn rejected_and_failed_are_terminal_and_non_resumable() {
        let mut session = Session::new("01ARZ", "t", 3);
        session.phase = Phase::AwaitingApproval;
        session.apply(&PhaseEvent::ApprovalRejected).unwrap();
        assert_eq!(session.phase, Phase::Rejected);
        assert!(!session.can_resume());
    }

    #[test]
    fn checkpoint_kind_classification() {
        assert_eq!(Checkpoint::new("plan-edited").kind(), CheckpointKind::Plan);
        assert_eq!(Checkpoint::new("exec-3").kind(), CheckpointKind::Exec);
        assert_eq!(Checkpoint::new("audit-12345").kind(), CheckpointKind::Audit);
        assert_eq!(Checkpoint::new("fix-12345").kind(), CheckpointKind::Fix);
        assert_eq!(Checkpoint::new("pipeline-complete").kind(), CheckpointKind::Other);
    }

    #[test]
    fn audit_merge_requires_all_approved() {
        let a = AuditResult { status: AuditStatus::Approved, issues: vec![], summary: "ok".into() };
        let b = AuditResult {
            status: AuditStatus::NeedsWork,
            issues: vec![AuditIssue {
                file: "a.py".into(),
                severity: Severity::Major,
                description: "bug".into(),
                suggestion: "fix it".into(),
            }],
            summary: "needs work".into(),
        };
        let merged = AuditResult::merge([a, b]);
        assert!(!merged.is_approved());
        assert_eq!(merged.issues.len(), 1);
    }

    #[test]
    fn empty_issues_needs_work_stays_needs_work() {
        let r = AuditResult { status: AuditStatus::NeedsWork, issues: vec![], summary: String::new() };
        assert!(!r.is_approved());
    }
}
