//! `ConcurrencyPool`: bounded fan-out over a fixed-size worker budget, per
//! section 4.7. At most `max_concurrency` tasks run at once; results are
//! positionally stable by input index; a panicking task never takes down
//! the pool.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Fired after a task starts and after it completes, so a host can render
/// live progress without polling.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
    pub in_progress: usize,
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// A fixed-size worker budget over an input sequence.
pub struct ConcurrencyPool {
    max_concurrency: usize,
}

impl ConcurrencyPool {
    pub fn new(max_concurrency: usize) -> Self {
        Self { max_concurrency: max_concurrency.max(1) }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run `task` over every item in `items`, with at most
    /// `self.max_concurrency` in flight at a time. The semaphore-gated
    /// spawn achieves the spec's "shared counter, no shared mutable
    /// state" partitioning without a hand-rolled worker loop: each item
    /// is spawned as its own task, bounded by permits, and recovered by
    /// index regardless of completion order.
    ///
    /// `cancel`, when set, is polled once per item before it is spawned
    /// (a task boundary, per the cooperative-cancellation policy);
    /// already-running tasks are allowed to finish. A task that panics
    /// leaves `None` at its index rather than propagating the panic.
    pub async fn run<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        cancel: Option<Arc<AtomicBool>>,
        progress: Option<ProgressCallback>,
        task: F,
    ) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let task = Arc::new(task);
        let completed = Arc::new(AtomicUsize::new(0));
        let in_progress = Arc::new(AtomicUsize::new(0));

        let mut join_set = JoinSet::new();
        for (index, item) in items.into_iter().enumerate() {
            if cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed)) {
                break;
            }

            let semaphore = semaphore.clone();
            let task = task.clone();
            let completed = completed.clone();
            let in_progress = in_progress.clone();
            let progress = progress.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("pool semaphore never closes");

                in_progress.fetch_add(1, Ordering::SeqCst);
                emit(&progress, &completed, &in_progress, total);

                let result = task(item, index).await;

                in_progress.fetch_sub(1, Ordering::SeqCst);
                completed.fetch_add(1, Ordering::SeqCst);
                emit(&progress, &completed, &in_progress, total);

                (index, result)
            });
        }

        let mut results: Vec<Option<R>> = (0..total).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            if let Ok((index, result)) = joined {
                results[index] = Some(result);
            }
            // JoinError (panic or abort): leave the slot at None.
        }
        results
    }
}

fn emit(
    progress: &Option<ProgressCallback>,
    completed: &Arc<AtomicUsize>,
    in_progress: &Arc<AtomicUsize>,
    total: usize,
) {
    if let Some(cb) = progress {
        cb(ProgressEvent {
            completed: completed.load(Ordering::SeqCst),
            total,
            in_progress: in_progress.load(Ordering::SeqCst),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn results_are_positionally_stable_regardless_of_completion_order() {
        let pool = ConcurrencyPool::new(4);
        let items: Vec<u32> = (0..8).collect();
        let results = pool
            .run(items, None, None, |item, _index| async move {
                // Reverse the natural finish order: smaller items sleep longer.
                tokio::time::sleep(Duration::from_millis((8 - item) as u64)).await;
                item * 10
            })
            .await;

        let values: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[tokio::test]
    async fn never_exceeds_max_concurrency() {
        let pool = ConcurrencyPool::new(2);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let items: Vec<u32> = (0..6).collect();
        let current_for_task = current.clone();
        let peak_for_task = peak.clone();
        let _ = pool
            .run(items, None, None, move |_item, _index| {
                let current = current_for_task.clone();
                let peak = peak_for_task.clone();
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn panicking_task_leaves_none_without_failing_the_pool() {
        let pool = ConcurrencyPool::new(2);
        let items: Vec<u32> = vec![1, 2, 3];
        let results = pool
            .run(items, None, None, |item, _index| async move {
                if item == 2 {
                    panic!("boom");
                }
                item
            })
            .await;

        assert_eq!(results[0], Some(1));
        assert_eq!(results[1], None);
        assert_eq!(results[2], Some(3));
    }

    #[tokio::test]
    async fn cancellation_stops_unstarted_items() {
        let pool = ConcurrencyPool::new(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_for_task = cancel.clone();

        let items: Vec<u32> = (0..5).collect();
        let results = pool
            .run(items, Some(cancel.clone()), None, move |item, _index| {
                let cancel = cancel_for_task.clone();
                async move {
                    if item == 1 {
                        cancel.store(true, Ordering::SeqCst);
                    }
                    item
                }
            })
            .await;

        assert_eq!(results[0], Some(0));
        assert_eq!(results[1], Some(1));
        assert!(results[2..].iter().all(|r| r.is_none()));
    }

    #[tokio::test]
    async fn progress_callback_observes_monotonic_completion() {
        let pool = ConcurrencyPool::new(3);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_for_cb = seen.clone();
        let progress: ProgressCallback = Arc::new(move |event: ProgressEvent| {
            seen_for_cb.lock().unwrap().push(event.completed);
        });

        let items: Vec<u32> = (0..4).collect();
        let _ = pool.run(items, None, Some(progress), |item, _index| async move { item }).await;

        let log = seen.lock().unwrap();
        let max_completed = *log.iter().max().unwrap();
        assert_eq!(max_completed, 4);
        assert!(log.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn empty_input_completes_immediately() {
        let pool = ConcurrencyPool::new(4);
        let results: Vec<Option<u32>> = pool.run(Vec::new(), None, None, |item, _| async move { item }).await;
        assert!(results.is_empty());
    }
}
