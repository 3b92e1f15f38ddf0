//! WatchEngine (section 4.11): after a successful run that produced a
//! plan, watch the plan's target files (or a user-supplied pattern set)
//! and schedule a debounced re-run on filesystem change.
//!
//! Filesystem events come from `notify`'s recommended watcher, bridged
//! into a `tokio::sync::mpsc` channel; a single `tokio::time::sleep`
//! coalescing timer per watch session implements the 500 ms debounce.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use orc_core::error::EngineError;
use orc_core::events::{EngineObserver, WatchEventKind};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

fn classify(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(_) => Some(WatchEventKind::Add),
        EventKind::Modify(_) => Some(WatchEventKind::Change),
        EventKind::Remove(_) => Some(WatchEventKind::Unlink),
        _ => None,
    }
}

/// A running watch session. Dropping it stops the underlying OS watcher;
/// `stop_watch` is the clean, observable way to end the debounce loop.
pub struct WatchEngine {
    _watcher: RecommendedWatcher,
    stop: Arc<AtomicBool>,
}

impl WatchEngine {
    /// Start watching `paths` and invoke `on_rerun(run_count)` after each
    /// debounced burst of filesystem events settles.
    pub fn start<F, Fut>(
        paths: &[PathBuf],
        observer: Arc<dyn EngineObserver>,
        debounce: Duration,
        on_rerun: F,
    ) -> Result<Self, EngineError>
    where
        F: FnMut(u32) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = spawn_watcher(paths, tx)?;

        let stop = Arc::new(AtomicBool::new(false));
        tokio::spawn(debounce_loop(rx, observer, stop.clone(), debounce, on_rerun));

        Ok(Self { _watcher: watcher, stop })
    }

    /// Signal the debounce loop to stop after draining any in-flight
    /// event; the OS watcher itself is torn down when this value drops.
    pub fn stop_watch(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn spawn_watcher(
    paths: &[PathBuf],
    tx: UnboundedSender<(String, WatchEventKind)>,
) -> Result<RecommendedWatcher, EngineError> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let Ok(event) = res else { return };
        let Some(kind) = classify(&event.kind) else { return };
        for path in event.paths {
            let _ = tx.send((path.display().to_string(), kind));
        }
    })
    .map_err(|e| EngineError::Io { path: "<watcher>".to_string(), source: std::io::Error::other(e) })?;

    for path in paths {
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| EngineError::Io { path: path.display().to_string(), source: std::io::Error::other(e) })?;
    }

    Ok(watcher)
}

/// Core debounce loop, independent of the real `notify` watcher so it can
/// be driven directly in tests. Every received event resets a fresh
/// `debounce`-length timer; a rerun fires only once the channel has gone
/// quiet for that long.
async fn debounce_loop<F, Fut>(
    mut rx: UnboundedReceiver<(String, WatchEventKind)>,
    observer: Arc<dyn EngineObserver>,
    stop: Arc<AtomicBool>,
    debounce: Duration,
    mut on_rerun: F,
) where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut run_count: u32 = 0;
    let mut pending = false;

    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        tokio::select! {
            maybe_event = rx.recv() => {
                match maybe_event {
                    Some((path, kind)) => {
                        observer.on_watch_change(&path, kind);
                        pending = true;
                    }
                    None => return,
                }
            }
            _ = tokio::time::sleep(debounce), if pending => {
                pending = false;
                run_count += 1;
                observer.on_watch_rerun("debounced", run_count);
                on_rerun(run_count).await;
            }
        }
    }
}

/// Used by the engine to decide what to pass to `WatchEngine::start`: the
/// plan's target files, or a caller-supplied override pattern set.
pub fn watch_targets(plan_targets: &[String], workspace_root: &Path, overrides: Option<&[String]>) -> Vec<PathBuf> {
    let names = overrides.unwrap_or(plan_targets);
    names.iter().map(|p| workspace_root.join(p)).collect()
}
