use orc_core::types::{Phase, PhaseEvent, Role, RoleStatus};
use orc_session::{commit_files, ensure_git_init, CommitOutcome, SessionStore};
use std::fs;
use std::process::Command;

fn init_test_repo(dir: &std::path::Path) {
    ensure_git_init(dir).unwrap();
    Command::new("git").args(["config", "user.email", "test@example.com"]).current_dir(dir).output().unwrap();
    Command::new("git").args(["config", "user.name", "Test"]).current_dir(dir).output().unwrap();
}

#[test]
fn full_run_persists_across_reload_and_commits() {
    let tmp = tempfile::tempdir().unwrap();
    init_test_repo(tmp.path());
    let store = SessionStore::new(tmp.path());

    let mut handle = store.init("write hello.py", 3).unwrap();
    let session_id = handle.session().session_id.clone();

    handle.session_mut().apply(&PhaseEvent::RunAccepted).unwrap();
    handle.session_mut().set_role_status(Role::Architect, RoleStatus::InProgress);
    fs::write(handle.plan_path(), "## Files to Create\n- `hello.py`: say hi\n").unwrap();
    handle.session_mut().push_checkpoint("plan");
    handle.save().unwrap();
    drop(handle);

    let mut handle = store.load(&session_id).unwrap();
    assert_eq!(handle.session().phase, Phase::Planning);
    assert!(handle.plan_path().is_file());

    handle
        .session_mut()
        .apply(&PhaseEvent::ArchitectSucceeded { interactive: false })
        .unwrap();
    handle.session_mut().push_checkpoint("exec-1");
    handle.save().unwrap();
    drop(handle);

    let mut handle = store.load(&session_id).unwrap();
    assert_eq!(handle.session().phase, Phase::Executing);

    let target = tmp.path().join("hello.py");
    fs::write(&target, "print('hi')\n").unwrap();
    handle.session_mut().apply(&PhaseEvent::ExecutionComplete).unwrap();
    handle
        .session_mut()
        .apply(&PhaseEvent::AuditApproved { testing_enabled: false, commit_enabled: true })
        .unwrap();
    handle.save().unwrap();
    assert_eq!(handle.session().phase, Phase::Committing);

    let message = orc_session::render_commit_message("orc: {task}", &handle.session().task);
    let outcome = commit_files(tmp.path(), &["hello.py".to_string()], &message).unwrap();
    assert!(matches!(outcome, CommitOutcome::Committed { .. }));

    handle.session_mut().apply(&PhaseEvent::CommitComplete).unwrap();
    handle.save().unwrap();
    assert_eq!(handle.session().phase, Phase::Completed);
    assert!(!handle.can_resume());
}

#[test]
fn rejected_plan_is_terminal_and_listed() {
    let tmp = tempfile::tempdir().unwrap();
    let store = SessionStore::new(tmp.path());

    let mut handle = store.init("risky task", 3).unwrap();
    let session_id = handle.session().session_id.clone();
    handle.session_mut().apply(&PhaseEvent::RunAccepted).unwrap();
    handle
        .session_mut()
        .apply(&PhaseEvent::ArchitectSucceeded { interactive: true })
        .unwrap();
    handle.session_mut().apply(&PhaseEvent::ApprovalRejected).unwrap();
    handle.save().unwrap();
    drop(handle);

    let sessions = store.list_sessions().unwrap();
    assert_eq!(sessions, vec![session_id.clone()]);

    let reloaded = store.load(&session_id).unwrap();
    assert_eq!(reloaded.session().phase, Phase::Rejected);
    assert!(!reloaded.can_resume());
}
