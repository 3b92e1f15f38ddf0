//! `SessionStore`: durable session state under a per-session directory,
//! guarded by an advisory `flock` and written with the temp-then-rename
//! idiom from `orc-lock`.

use std::fs;
use std::path::{Path, PathBuf};

use orc_core::error::EngineError;
use orc_core::types::{new_session_id, Session};
use orc_lock::{acquire_session_lock, write_atomic, SessionLock};

const SESSIONS_DIR_NAME: &str = ".orchestra";
const SESSION_FILE: &str = "session.json";
const SESSION_FILE_CORRUPT: &str = "session.json.corrupt";

/// Replace path separators so a workspace-relative path can live as one
/// path component under the session directory, per the naming convention
/// in section 6 (`audit_<sanitized-path>.json`, `temp_<sanitized-path>`, ...).
pub fn sanitize_path_component(relative_path: &str) -> String {
    relative_path.replace(['/', '\\'], "_")
}

/// Resolves session directories under a workspace root and creates/loads/
/// lists/deletes session records there.
pub struct SessionStore {
    sessions_dir: PathBuf,
}

impl SessionStore {
    /// `workspace_root/.orchestra` holds one subdirectory per session.
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self { sessions_dir: workspace_root.as_ref().join(SESSIONS_DIR_NAME) }
    }

    pub fn sessions_root(&self) -> &Path {
        &self.sessions_dir
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(session_id)
    }

    /// Create a fresh session: phase `init`, iteration 0, directory created
    /// on disk, lock acquired and held for the lifetime of the handle.
    pub fn init(
        &self,
        task: impl Into<String>,
        max_iterations: u32,
    ) -> Result<SessionHandle, EngineError> {
        let session_id = new_session_id();
        let dir = self.session_dir(&session_id);
        fs::create_dir_all(&dir).map_err(|e| EngineError::Io { path: dir.display().to_string(), source: e })?;

        let lock = acquire_session_lock(&dir, "orc-session::init", "session init")
            .map_err(|e| EngineError::SessionLocked(e.to_string()))?;

        let session = Session::new(session_id, task, max_iterations);
        let handle = SessionHandle { session, dir, _lock: lock };
        handle.save()?;
        Ok(handle)
    }

    /// Load an existing session by id, acquiring the session lock.
    ///
    /// A `session.json` that fails to parse is renamed aside to
    /// `session.json.corrupt` (so the directory's other artifacts survive)
    /// and reported as `EngineError::Corrupt` rather than panicking.
    pub fn load(&self, session_id: &str) -> Result<SessionHandle, EngineError> {
        if session_id.trim().is_empty() || session_id.contains(['/', '\\']) {
            return Err(EngineError::InvalidSessionId(session_id.to_string()));
        }
        let dir = self.session_dir(session_id);
        if !dir.is_dir() {
            return Err(EngineError::SessionNotFound(session_id.to_string()));
        }

        let lock = acquire_session_lock(&dir, "orc-session::load", "session load")
            .map_err(|e| EngineError::SessionLocked(e.to_string()))?;

        let session_path = dir.join(SESSION_FILE);
        let raw = fs::read_to_string(&session_path)
            .map_err(|e| EngineError::Io { path: session_path.display().to_string(), source: e })?;
        let session: Session = serde_json::from_str(&raw).map_err(|e| {
            let corrupt_path = dir.join(SESSION_FILE_CORRUPT);
            let _ = fs::rename(&session_path, &corrupt_path);
            EngineError::Corrupt(format!("{session_id}: {e}"))
        })?;

        Ok(SessionHandle { session, dir, _lock: lock })
    }

    /// List session ids with a readable, parseable `session.json`. Sessions
    /// with corrupt state are skipped rather than failing the whole listing.
    pub fn list_sessions(&self) -> Result<Vec<String>, EngineError> {
        if !self.sessions_dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.sessions_dir)
            .map_err(|e| EngineError::Io { path: self.sessions_dir.display().to_string(), source: e })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::Io {
                path: self.sessions_dir.display().to_string(),
                source: e,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let session_path = entry.path().join(SESSION_FILE);
            if !session_path.is_file() {
                continue;
            }
            let Ok(raw) = fs::read_to_string(&session_path) else { continue };
            if serde_json::from_str::<Session>(&raw).is_ok() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Remove a session directory entirely. Does not check out a lock
    /// first: callers are expected to drop any held `SessionHandle` before
    /// deleting it.
    pub fn delete(&self, session_id: &str) -> Result<(), EngineError> {
        let dir = self.session_dir(session_id);
        if !dir.is_dir() {
            return Err(EngineError::SessionNotFound(session_id.to_string()));
        }
        fs::remove_dir_all(&dir).map_err(|e| EngineError::Io { path: dir.display().to_string(), source: e })
    }
}

/// An open session: the in-memory record, its directory, and the held
/// advisory lock. Dropping the handle releases the lock.
pub struct SessionHandle {
    session: Session,
    dir: PathBuf,
    _lock: SessionLock,
}

impl SessionHandle {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn can_resume(&self) -> bool {
        self.session.can_resume()
    }

    /// Persist the current in-memory record, atomically.
    pub fn save(&self) -> Result<(), EngineError> {
        let path = self.dir.join(SESSION_FILE);
        let contents = serde_json::to_vec_pretty(&self.session)
            .map_err(|e| EngineError::Corrupt(format!("failed to serialize session: {e}")))?;
        write_atomic(&path, &contents)
            .map_err(|e| EngineError::Io { path: path.display().to_string(), source: std::io::Error::other(e) })
    }

    pub fn plan_path(&self) -> PathBuf {
        self.dir.join("plan.md")
    }

    pub fn audit_result_path(&self) -> PathBuf {
        self.dir.join("audit-result.json")
    }

    pub fn per_file_audit_path(&self, relative_path: &str) -> PathBuf {
        self.dir.join(format!("audit_{}.json", sanitize_path_component(relative_path)))
    }

    pub fn temp_output_path(&self, relative_path: &str) -> PathBuf {
        self.dir.join(format!("temp_{}", sanitize_path_component(relative_path)))
    }

    pub fn fix_path(&self, relative_path: &str) -> PathBuf {
        self.dir.join(format!("fix_{}", sanitize_path_component(relative_path)))
    }

    pub fn consultant_path(&self, relative_path: &str) -> PathBuf {
        self.dir.join(format!("consultant_{}", sanitize_path_component(relative_path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_core::types::{Phase, PhaseEvent};

    #[test]
    fn init_creates_directory_and_persists_session() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let handle = store.init("write hello.py", 3).unwrap();

        assert!(handle.dir().is_dir());
        assert!(handle.dir().join("session.json").is_file());
        assert_eq!(handle.session().phase, Phase::Init);
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let mut handle = store.init("task", 2).unwrap();
        let session_id = handle.session().session_id.clone();
        handle.session_mut().apply(&PhaseEvent::RunAccepted).unwrap();
        handle.session_mut().push_checkpoint("plan");
        handle.save().unwrap();
        drop(handle);

        let reloaded = store.load(&session_id).unwrap();
        assert_eq!(reloaded.session().phase, Phase::Planning);
        assert_eq!(reloaded.session().checkpoints.len(), 1);
    }

    #[test]
    fn load_missing_session_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let err = store.load("01MISSING").unwrap_err();
        assert!(matches!(err, EngineError::SessionNotFound(_)));
    }

    #[test]
    fn load_rejects_traversal_in_session_id() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let err = store.load("../escape").unwrap_err();
        assert!(matches!(err, EngineError::InvalidSessionId(_)));
    }

    #[test]
    fn second_load_while_held_is_locked() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let handle = store.init("task", 2).unwrap();
        let session_id = handle.session().session_id.clone();

        let err = store.load(&session_id).unwrap_err();
        assert!(matches!(err, EngineError::SessionLocked(_)));
    }

    #[test]
    fn corrupt_session_file_is_renamed_aside_and_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let handle = store.init("task", 2).unwrap();
        let session_id = handle.session().session_id.clone();
        let dir = handle.dir().to_path_buf();
        drop(handle);

        fs::write(dir.join("session.json"), b"{ not json").unwrap();
        let err = store.load(&session_id).unwrap_err();
        assert!(matches!(err, EngineError::Corrupt(_)));
        assert!(dir.join("session.json.corrupt").is_file());
    }

    #[test]
    fn list_sessions_skips_corrupt_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let good = store.init("task one", 2).unwrap();
        let good_id = good.session().session_id.clone();
        drop(good);

        let bad_dir = store.session_dir("01BADSESSION");
        fs::create_dir_all(&bad_dir).unwrap();
        fs::write(bad_dir.join("session.json"), b"not json at all").unwrap();

        let ids = store.list_sessions().unwrap();
        assert_eq!(ids, vec![good_id]);
    }

    #[test]
    fn delete_removes_session_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let handle = store.init("task", 2).unwrap();
        let session_id = handle.session().session_id.clone();
        let dir = handle.dir().to_path_buf();
        drop(handle);

        store.delete(&session_id).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn artifact_paths_sanitize_separators() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let handle = store.init("task", 2).unwrap();

        let path = handle.per_file_audit_path("src/main.rs");
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "audit_src_main.rs.json");
    }
}
