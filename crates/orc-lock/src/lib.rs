//! File-based locking and crash-safe persistence using raw syscalls.
//! Independent crate with no internal dependencies beyond `orc-core`'s types.
//!
//! Uses raw `libc::flock` instead of an RAII-wrapping crate to avoid the
//! self-referential struct problem: a guard that borrows the lock owner
//! makes it impossible to store both in one struct without lifetime
//! gymnastics. By owning the `File` directly (which owns the fd), `Drop`
//! calls `flock(fd, LOCK_UN)` to release.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Diagnostic information written into the lock file so a blocked caller
/// can report who is holding it.
#[derive(Debug, Serialize, Deserialize)]
struct LockDiagnostic {
    pid: u32,
    holder: String,
    acquired_at: DateTime<Utc>,
    reason: String,
}

/// Session lock guard backed by `flock(2)`.
///
/// Holds the open `File` whose fd carries the advisory lock. On `Drop` the
/// lock is explicitly released via `flock(fd, LOCK_UN)`.
pub struct SessionLock {
    file: File,
    lock_path: PathBuf,
}

impl std::fmt::Debug for SessionLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLock").field("lock_path", &self.lock_path).finish()
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let fd = self.file.as_raw_fd();
        // SAFETY: `fd` is a valid file descriptor owned by `self.file`.
        unsafe {
            libc::flock(fd, libc::LOCK_UN);
        }
    }
}

impl SessionLock {
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

/// Acquire a non-blocking exclusive lock for a session.
///
/// Lock path: `{session_dir}/session.lock`.
///
/// On success, acquires the advisory lock and writes diagnostic JSON (pid,
/// holder, acquired_at, reason) into the file. On failure, the existing
/// diagnostic is read back so the caller can report which PID holds the
/// session (SPEC_FULL.md section 4.3: concurrent access to a session must
/// fail fast with a clear error, never corrupt state).
pub fn acquire_session_lock(session_dir: &Path, holder: &str, reason: &str) -> Result<SessionLock> {
    fs::create_dir_all(session_dir)
        .with_context(|| format!("failed to create session directory: {}", session_dir.display()))?;

    let lock_path = session_dir.join("session.lock");

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("failed to open lock file: {}", lock_path.display()))?;

    let fd = file.as_raw_fd();

    // SAFETY: `fd` is a valid file descriptor from the `File` just opened.
    let ret = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

    if ret == 0 {
        let mut lock = SessionLock { file, lock_path };

        let diagnostic = LockDiagnostic {
            pid: std::process::id(),
            holder: holder.to_string(),
            acquired_at: Utc::now(),
            reason: reason.to_string(),
        };

        let json = serde_json::to_string(&diagnostic).context("failed to serialize lock diagnostic")?;

        lock.file.set_len(0).context("failed to truncate lock file")?;
        lock.file.write_all(json.as_bytes()).context("failed to write lock diagnostic")?;
        lock.file.flush().context("failed to flush lock file")?;

        Ok(lock)
    } else {
        let mut diag_file =
            File::open(&lock_path).context("failed to open lock file to read diagnostic")?;
        let mut contents = String::new();
        diag_file.read_to_string(&mut contents).context("failed to read lock file")?;

        let error_msg = if let Ok(diagnostic) = serde_json::from_str::<LockDiagnostic>(&contents) {
            format!(
                "session locked by PID {} (holder: {}, reason: {}, acquired: {})",
                diagnostic.pid, diagnostic.holder, diagnostic.reason, diagnostic.acquired_at
            )
        } else {
            "session is locked (unable to read diagnostic info)".to_string()
        };

        Err(anyhow::anyhow!(error_msg))
    }
}

/// Write `contents` to `path` atomically: write to a sibling temp file in
/// the same directory, then `rename(2)` over the destination. A crash or
/// kill mid-write leaves the original file untouched since `rename` is a
/// single atomic filesystem operation on the same volume.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().context("path has no parent directory")?;
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory: {}", dir.display()))?;

    let file_name = path.file_name().context("path has no file name")?.to_string_lossy().into_owned();
    let tmp_path = dir.join(format!(".{file_name}.tmp-{}", std::process::id()));

    {
        let mut tmp_file = File::create(&tmp_path)
            .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;
        tmp_file.write_all(contents).context("failed to write temp file")?;
        tmp_file.sync_all().context("failed to fsync temp file")?;
    }

    fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to rename {} to {}", tmp_path.display(), path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_lock_succeeds_and_creates_file() {
        let temp_dir = tempdir().expect("tempdir");
        let session_dir = temp_dir.path();

        let lock = acquire_session_lock(session_dir, "engine", "running pipeline");
        assert!(lock.is_ok());
        assert!(lock.unwrap().lock_path().exists());
    }

    #[test]
    fn lock_path_follows_convention() {
        let temp_dir = tempdir().expect("tempdir");
        let session_dir = temp_dir.path();

        let lock = acquire_session_lock(session_dir, "engine", "task").expect("lock");
        assert_eq!(lock.lock_path(), session_dir.join("session.lock"));
    }

    #[test]
    fn second_lock_fails_with_diagnostic() {
        let temp_dir = tempdir().expect("tempdir");
        let session_dir = temp_dir.path();

        let _lock1 =
            acquire_session_lock(session_dir, "engine-a", "first run").expect("first lock succeeds");

        let result = acquire_session_lock(session_dir, "engine-b", "second run");
        assert!(result.is_err());

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("locked by PID"));
        assert!(err_msg.contains("first run"));
    }

    #[test]
    fn session_dir_created_automatically() {
        let temp_dir = tempdir().expect("tempdir");
        let session_dir = temp_dir.path().join("nested").join("session");

        assert!(!session_dir.exists());
        let lock = acquire_session_lock(&session_dir, "engine", "task");
        assert!(lock.is_ok());
        assert!(session_dir.exists());
    }

    #[test]
    fn lock_debug_format_contains_path() {
        let temp_dir = tempdir().expect("tempdir");
        let lock = acquire_session_lock(temp_dir.path(), "engine", "task").expect("lock");
        let debug = format!("{:?}", lock);
        assert!(debug.contains("SessionLock"));
    }

    #[test]
    fn write_atomic_creates_file_with_contents() {
        let temp_dir = tempdir().expect("tempdir");
        let path = temp_dir.path().join("session.json");

        write_atomic(&path, b"{\"ok\":true}").expect("write");
        let read_back = fs::read_to_string(&path).expect("read back");
        assert_eq!(read_back, "{\"ok\":true}");
    }

    #[test]
    fn write_atomic_overwrites_existing_file() {
        let temp_dir = tempdir().expect("tempdir");
        let path = temp_dir.path().join("session.json");

        write_atomic(&path, b"first").expect("first write");
        write_atomic(&path, b"second").expect("second write");

        let read_back = fs::read_to_string(&path).expect("read back");
        assert_eq!(read_back, "second");
    }

    #[test]
    fn write_atomic_leaves_no_temp_file_behind() {
        let temp_dir = tempdir().expect("tempdir");
        let path = temp_dir.path().join("session.json");

        write_atomic(&path, b"data").expect("write");

        let entries: Vec<_> = fs::read_dir(temp_dir.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["session.json".to_string()]);
    }

    #[test]
    fn write_atomic_creates_parent_directories() {
        let temp_dir = tempdir().expect("tempdir");
        let path = temp_dir.path().join("deep").join("nested").join("session.json");

        assert!(write_atomic(&path, b"data").is_ok());
        assert!(path.exists());
    }
}
