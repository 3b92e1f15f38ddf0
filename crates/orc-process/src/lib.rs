//! Process management: spawning adapter CLIs, tee'ing output, and enforcing
//! idle timeouts.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::warn;

/// Controls whether stdout is forwarded to stderr in real-time.
///
/// By default, stdout is both buffered and forwarded to stderr with a
/// `[stdout] ` prefix, letting a human watching the terminal tell "thinking"
/// from "hung". Set to `BufferOnly` to suppress real-time streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// Only buffer stdout; do not forward.
    BufferOnly,
    /// Buffer stdout AND forward each line to stderr with `[stdout] ` prefix (default).
    #[default]
    TeeToStderr,
}

/// Result of executing an adapter CLI invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Combined stdout output.
    pub output: String,
    /// Captured stderr output (tee'd to parent stderr in real-time).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr_output: String,
    /// Last non-empty line or truncated output (max 200 chars).
    pub summary: String,
    /// Exit code (137 if idle-timeout killed).
    pub exit_code: i32,
}

pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_STDIN_WRITE_TIMEOUT_SECS: u64 = 30;
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Spawn-time process control options.
#[derive(Debug, Clone, Copy)]
pub struct SpawnOptions {
    /// Max duration allowed for writing prompt payload to child stdin.
    pub stdin_write_timeout: Duration,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self { stdin_write_timeout: Duration::from_secs(DEFAULT_STDIN_WRITE_TIMEOUT_SECS) }
    }
}

/// Spawn a tool process without waiting for it to complete.
///
/// - Captures stdout and stderr (piped)
/// - Sets stdin to piped when `stdin_data` is provided, null otherwise
/// - Isolates the child in its own process group via `setsid` so the whole
///   subtree can be killed on idle timeout
/// - Enables `kill_on_drop` as a safety net against orphaned children
pub async fn spawn_tool(cmd: Command, stdin_data: Option<Vec<u8>>) -> Result<tokio::process::Child> {
    spawn_tool_with_options(cmd, stdin_data, SpawnOptions::default()).await
}

/// Spawn a tool process with explicit spawn options.
pub async fn spawn_tool_with_options(
    mut cmd: Command,
    stdin_data: Option<Vec<u8>>,
    spawn_options: SpawnOptions,
) -> Result<tokio::process::Child> {
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    if stdin_data.is_some() {
        cmd.stdin(std::process::Stdio::piped());
    } else {
        cmd.stdin(std::process::Stdio::null());
    }
    cmd.kill_on_drop(true);

    // SAFETY: setsid() is async-signal-safe and runs before exec.
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let mut child = cmd.spawn().context("failed to spawn adapter process")?;

    if let Some(data) = stdin_data {
        if let Some(mut stdin) = child.stdin.take() {
            let stdin_write_timeout = spawn_options.stdin_write_timeout;
            tokio::spawn(async move {
                match tokio::time::timeout(stdin_write_timeout, async {
                    stdin.write_all(&data).await?;
                    stdin.shutdown().await?;
                    Ok::<_, std::io::Error>(())
                })
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("stdin write error: {}", e),
                    Err(_) => {
                        warn!(timeout_secs = stdin_write_timeout.as_secs(), "stdin write timed out")
                    }
                }
            });
        } else {
            warn!("stdin was requested but no piped stdin handle was available");
        }
    }

    Ok(child)
}

/// Wait for a spawned child process and capture its output, with the
/// default idle timeout and no crash-recovery spool.
pub async fn wait_and_capture(
    child: tokio::process::Child,
    stream_mode: StreamMode,
) -> Result<ExecutionResult> {
    wait_and_capture_with_idle_timeout(
        child,
        stream_mode,
        Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        None,
    )
    .await
}

/// Wait for a spawned child process, capturing output and enforcing an idle
/// timeout. The process is killed only when stdout and stderr have both been
/// silent for the full `idle_timeout` duration; byte-level reads (not
/// `read_line`) mean a subprocess emitting partial output without a
/// trailing newline (a progress bar, a stream of dots) still resets the
/// timer and is never mistaken for a hang.
///
/// When `output_spool` is `Some`, every stdout chunk is appended to that
/// file with an explicit flush, so a caller can recover partial output even
/// if this future is itself killed (e.g. the host process is OOM-killed).
pub async fn wait_and_capture_with_idle_timeout(
    mut child: tokio::process::Child,
    stream_mode: StreamMode,
    idle_timeout: Duration,
    output_spool: Option<&Path>,
) -> Result<ExecutionResult> {
    let stdout = child.stdout.take().context("child has no stdout handle")?;
    let stderr = child.stderr.take();

    let mut spool_file = output_spool.and_then(|path| {
        use std::fs::OpenOptions;
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => Some(f),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to open output spool file");
                None
            }
        }
    });

    const READ_BUF_SIZE: usize = 4096;
    let mut stdout_reader = BufReader::new(stdout);
    let mut output = String::new();
    let mut stdout_line_buf = String::new();

    let mut stderr_output = String::new();
    let mut last_activity = Instant::now();
    let mut idle_timed_out = false;
    let timeout_note =
        format!("idle timeout: no stdout/stderr output for {}s; process killed", idle_timeout.as_secs());

    if let Some(stderr_handle) = stderr {
        let mut stderr_reader = BufReader::new(stderr_handle);
        let mut stderr_line_buf = String::new();

        let mut stdout_done = false;
        let mut stderr_done = false;
        let mut stdout_buf = [0u8; READ_BUF_SIZE];
        let mut stderr_buf = [0u8; READ_BUF_SIZE];

        while !stdout_done || !stderr_done {
            tokio::select! {
                result = stdout_reader.read(&mut stdout_buf), if !stdout_done => {
                    match result {
                        Ok(0) => {
                            flush_line_buf(&mut stdout_line_buf, &mut output, stream_mode);
                            stdout_done = true;
                        }
                        Ok(n) => {
                            last_activity = Instant::now();
                            let chunk = String::from_utf8_lossy(&stdout_buf[..n]);
                            spool_chunk(&mut spool_file, &stdout_buf[..n]);
                            accumulate_and_flush_lines(&chunk, &mut stdout_line_buf, &mut output, stream_mode);
                        }
                        Err(_) => {
                            flush_line_buf(&mut stdout_line_buf, &mut output, stream_mode);
                            stdout_done = true;
                        }
                    }
                }
                result = stderr_reader.read(&mut stderr_buf), if !stderr_done => {
                    match result {
                        Ok(0) => {
                            flush_stderr_buf(&mut stderr_line_buf, &mut stderr_output);
                            stderr_done = true;
                        }
                        Ok(n) => {
                            last_activity = Instant::now();
                            let chunk = String::from_utf8_lossy(&stderr_buf[..n]);
                            accumulate_and_flush_stderr(&chunk, &mut stderr_line_buf, &mut stderr_output);
                        }
                        Err(_) => {
                            flush_stderr_buf(&mut stderr_line_buf, &mut stderr_output);
                            stderr_done = true;
                        }
                    }
                }
                _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {
                    if last_activity.elapsed() >= idle_timeout {
                        idle_timed_out = true;
                        warn!(timeout_secs = idle_timeout.as_secs(), "killing adapter process due to idle timeout");
                        kill_child_process_group(&mut child);
                        break;
                    }
                }
            }
        }
    } else {
        let mut stdout_buf = [0u8; READ_BUF_SIZE];
        loop {
            tokio::select! {
                result = stdout_reader.read(&mut stdout_buf) => {
                    match result {
                        Ok(0) => {
                            flush_line_buf(&mut stdout_line_buf, &mut output, stream_mode);
                            break;
                        }
                        Ok(n) => {
                            last_activity = Instant::now();
                            let chunk = String::from_utf8_lossy(&stdout_buf[..n]);
                            spool_chunk(&mut spool_file, &stdout_buf[..n]);
                            accumulate_and_flush_lines(&chunk, &mut stdout_line_buf, &mut output, stream_mode);
                        }
                        Err(_) => {
                            flush_line_buf(&mut stdout_line_buf, &mut output, stream_mode);
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {
                    if last_activity.elapsed() >= idle_timeout {
                        idle_timed_out = true;
                        warn!(timeout_secs = idle_timeout.as_secs(), "killing adapter process due to idle timeout");
                        kill_child_process_group(&mut child);
                        break;
                    }
                }
            }
        }
    }

    let status = child.wait().await.context("failed to wait for adapter process")?;

    let mut exit_code = status.code().unwrap_or_else(|| {
        warn!("adapter process terminated by signal, using exit code 1");
        1
    });
    if idle_timed_out {
        exit_code = 137;
        if !stderr_output.is_empty() && !stderr_output.ends_with('\n') {
            stderr_output.push('\n');
        }
        stderr_output.push_str(&timeout_note);
        stderr_output.push('\n');
    }

    let summary = if idle_timed_out {
        timeout_note
    } else if exit_code == 0 {
        extract_summary(&output)
    } else {
        failure_summary(&output, &stderr_output, exit_code)
    };

    Ok(ExecutionResult { output, stderr_output, summary, exit_code })
}

/// Execute a command and capture output. Stderr passes through to the
/// parent; stdout is piped. Waits for completion.
pub async fn run_and_capture(cmd: Command) -> Result<ExecutionResult> {
    run_and_capture_with_stdin(cmd, None, StreamMode::BufferOnly).await
}

/// Execute a command and capture output, optionally writing prompt data to stdin.
#[tracing::instrument(skip_all)]
pub async fn run_and_capture_with_stdin(
    cmd: Command,
    stdin_data: Option<Vec<u8>>,
    stream_mode: StreamMode,
) -> Result<ExecutionResult> {
    let child = spawn_tool(cmd, stdin_data).await?;
    wait_and_capture_with_idle_timeout(child, stream_mode, Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS), None)
        .await
}

/// Check if an executable is installed by attempting to locate it via `which`.
pub async fn check_tool_installed(executable: &str) -> Result<()> {
    let output =
        Command::new("which").arg(executable).output().await.context("failed to execute 'which'")?;

    if !output.status.success() {
        anyhow::bail!("tool '{}' is not installed or not in PATH", executable);
    }

    Ok(())
}

fn spool_chunk(spool: &mut Option<std::fs::File>, bytes: &[u8]) {
    if let Some(f) = spool {
        use std::io::Write;
        let _ = f.write_all(bytes);
        let _ = f.flush();
    }
}

fn accumulate_and_flush_lines(chunk: &str, line_buf: &mut String, output: &mut String, stream_mode: StreamMode) {
    line_buf.push_str(chunk);
    while let Some(newline_pos) = line_buf.find('\n') {
        let line: String = line_buf.drain(..=newline_pos).collect();
        if stream_mode == StreamMode::TeeToStderr {
            eprint!("[stdout] {line}");
        }
        output.push_str(&line);
    }
}

fn flush_line_buf(line_buf: &mut String, output: &mut String, stream_mode: StreamMode) {
    if !line_buf.is_empty() {
        if stream_mode == StreamMode::TeeToStderr {
            eprint!("[stdout] {line_buf}");
        }
        output.push_str(line_buf);
        line_buf.clear();
    }
}

fn accumulate_and_flush_stderr(chunk: &str, line_buf: &mut String, stderr_output: &mut String) {
    line_buf.push_str(chunk);
    while let Some(newline_pos) = line_buf.find('\n') {
        let line: String = line_buf.drain(..=newline_pos).collect();
        eprint!("{line}");
        stderr_output.push_str(&line);
    }
}

fn flush_stderr_buf(line_buf: &mut String, stderr_output: &mut String) {
    if !line_buf.is_empty() {
        eprint!("{line_buf}");
        stderr_output.push_str(line_buf);
        line_buf.clear();
    }
}

fn kill_child_process_group(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: kill() is async-signal-safe; negative PID targets the process group.
            unsafe {
                libc::kill(-(pid as i32), libc::SIGKILL);
            }
            return;
        }
    }

    let _ = child.start_kill();
}

fn extract_summary(output: &str) -> String {
    truncate_line(last_non_empty_line(output), 200)
}

/// Build a summary for a failed execution (`exit_code != 0`): stdout's last
/// non-empty line, falling back to stderr's, falling back to `"exit code N"`.
fn failure_summary(stdout: &str, stderr: &str, exit_code: i32) -> String {
    let stdout_line = last_non_empty_line(stdout);
    if !stdout_line.is_empty() {
        return truncate_line(stdout_line, 200);
    }

    let stderr_line = last_non_empty_line(stderr);
    if !stderr_line.is_empty() {
        return truncate_line(stderr_line, 200);
    }

    format!("exit code {exit_code}")
}

fn last_non_empty_line(text: &str) -> &str {
    text.lines().rev().find(|line| !line.trim().is_empty()).unwrap_or("")
}

fn truncate_line(line: &str, max_chars: usize) -> String {
    if line.chars().nth(max_chars).is_none() {
        line.to_string()
    } else {
        let truncated: String = line.chars().take(max_chars - 3).collect();
        format!("{truncated}...")
    }
}
