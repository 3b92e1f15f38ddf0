//! `FallbackAdapter`: wraps an ordered, non-empty chain of Adapters and
//! advances through it on recoverable failures.

use crate::adapter::{Adapter, AdapterInfo, AdapterRequest, AdapterResponse};
use crate::error::{AdapterError, AdapterErrorKind};
use async_trait::async_trait;
use orc_core::events::EngineObserver;
use orc_core::types::Role;
use std::sync::Arc;

/// Policy for the `Auth` error kind, which is ambiguous: a single bad key
/// always fails, but a multi-provider chain may still want to try the next
/// member rather than abort the whole phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthFailurePolicy {
    FailFast,
    SkipToNext,
}

/// Wraps an ordered non-empty list of Adapters. On `execute`, tries each in
/// turn; on a recoverable failure, advances to the next. Returns immediately
/// on the first success. If every adapter fails, returns the last error
/// unchanged.
pub struct FallbackAdapter {
    chain: Vec<Arc<dyn Adapter>>,
    role: Role,
    auth_policy: AuthFailurePolicy,
    observer: Option<Arc<dyn EngineObserver>>,
}

impl FallbackAdapter {
    /// # Panics
    /// Panics if `chain` is empty — a fallback chain with no adapters is a
    /// configuration error the caller must not construct.
    pub fn new(chain: Vec<Arc<dyn Adapter>>, role: Role, auth_policy: AuthFailurePolicy) -> Self {
        assert!(!chain.is_empty(), "FallbackAdapter requires a non-empty adapter chain");
        Self { chain, role, auth_policy, observer: None }
    }

    pub fn with_observer(mut self, observer: Arc<dyn EngineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn should_advance(&self, kind: AdapterErrorKind) -> bool {
        match kind {
            AdapterErrorKind::RateLimit | AdapterErrorKind::Connect | AdapterErrorKind::Timeout => true,
            AdapterErrorKind::Auth => self.auth_policy == AuthFailurePolicy::SkipToNext,
            AdapterErrorKind::InvalidResponse | AdapterErrorKind::Other => false,
        }
    }
}

#[async_trait]
impl Adapter for FallbackAdapter {
    async fn execute(&self, request: AdapterRequest) -> Result<AdapterResponse, AdapterError> {
        let mut last_err: Option<AdapterError> = None;

        for (idx, adapter) in self.chain.iter().enumerate() {
            match adapter.execute(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let is_last = idx == self.chain.len() - 1;
                    let advance = self.should_advance(err.kind);

                    if !is_last && advance {
                        let from = adapter.info().name;
                        let to = self.chain[idx + 1].info().name;
                        if let Some(observer) = &self.observer {
                            observer.on_adapter_fallback(&from, &to, &err.message, self.role);
                        }
                        last_err = Some(err);
                        continue;
                    }

                    return Err(err);
                }
            }
        }

        // Unreachable for a non-empty chain: the loop above always either
        // returns Ok, returns Err directly, or continues until is_last.
        Err(last_err.unwrap_or_else(|| AdapterError::new(AdapterErrorKind::Other, "empty adapter chain")))
    }

    async fn is_available(&self) -> bool {
        for adapter in &self.chain {
            if adapter.is_available().await {
                return true;
            }
        }
        false
    }

    fn info(&self) -> AdapterInfo {
        self.chain[0].info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeAdapter {
        name: &'static str,
        outcome: Result<&'static str, AdapterErrorKind>,
        calls: AtomicUsize,
    }

    impl FakeAdapter {
        fn new(name: &'static str, outcome: Result<&'static str, AdapterErrorKind>) -> Arc<Self> {
            Arc::new(Self { name, outcome, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl Adapter for FakeAdapter {
        async fn execute(&self, _request: AdapterRequest) -> Result<AdapterResponse, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Ok(output) => {
                    Ok(AdapterResponse { output: output.to_string(), output_path: None, duration_ms: 1 })
                }
                Err(kind) => Err(AdapterError::new(kind, format!("{} failed", self.name))),
            }
        }

        async fn is_available(&self) -> bool {
            self.outcome.is_ok()
        }

        fn info(&self) -> AdapterInfo {
            AdapterInfo {
                name: self.name.to_string(),
                model: "fake".to_string(),
                provider: "fake".to_string(),
                mode: None,
            }
        }
    }

    #[tokio::test]
    async fn first_success_short_circuits_remaining_chain() {
        let first = FakeAdapter::new("first", Ok("first output"));
        let second = FakeAdapter::new("second", Ok("second output"));
        let chain: Vec<Arc<dyn Adapter>> = vec![first.clone(), second.clone()];
        let fallback = FallbackAdapter::new(chain, Role::Architect, AuthFailurePolicy::FailFast);

        let response = fallback.execute(AdapterRequest::new("prompt")).await.expect("execute");
        assert_eq!(response.output, "first output");
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rate_limit_advances_to_next_adapter() {
        let first = FakeAdapter::new("first", Err(AdapterErrorKind::RateLimit));
        let second = FakeAdapter::new("second", Ok("second output"));
        let chain: Vec<Arc<dyn Adapter>> = vec![first, second];
        let fallback = FallbackAdapter::new(chain, Role::Executor, AuthFailurePolicy::FailFast);

        let response = fallback.execute(AdapterRequest::new("prompt")).await.expect("execute");
        assert_eq!(response.output, "second output");
    }

    #[tokio::test]
    async fn auth_failure_fast_does_not_advance_by_default() {
        let first = FakeAdapter::new("first", Err(AdapterErrorKind::Auth));
        let second = FakeAdapter::new("second", Ok("second output"));
        let chain: Vec<Arc<dyn Adapter>> = vec![first, second.clone()];
        let fallback = FallbackAdapter::new(chain, Role::Auditor, AuthFailurePolicy::FailFast);

        let result = fallback.execute(AdapterRequest::new("prompt")).await;
        assert!(result.is_err());
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auth_failure_skip_to_next_advances() {
        let first = FakeAdapter::new("first", Err(AdapterErrorKind::Auth));
        let second = FakeAdapter::new("second", Ok("second output"));
        let chain: Vec<Arc<dyn Adapter>> = vec![first, second];
        let fallback = FallbackAdapter::new(chain, Role::Auditor, AuthFailurePolicy::SkipToNext);

        let response = fallback.execute(AdapterRequest::new("prompt")).await.expect("execute");
        assert_eq!(response.output, "second output");
    }

    #[tokio::test]
    async fn invalid_response_is_fatal_and_does_not_advance() {
        let first = FakeAdapter::new("first", Err(AdapterErrorKind::InvalidResponse));
        let second = FakeAdapter::new("second", Ok("second output"));
        let chain: Vec<Arc<dyn Adapter>> = vec![first, second.clone()];
        let fallback = FallbackAdapter::new(chain, Role::Consultant, AuthFailurePolicy::FailFast);

        let result = fallback.execute(AdapterRequest::new("prompt")).await;
        assert!(result.is_err());
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_adapters_failing_returns_last_error() {
        let first = FakeAdapter::new("first", Err(AdapterErrorKind::RateLimit));
        let second = FakeAdapter::new("second", Err(AdapterErrorKind::Connect));
        let chain: Vec<Arc<dyn Adapter>> = vec![first, second];
        let fallback = FallbackAdapter::new(chain, Role::Executor, AuthFailurePolicy::FailFast);

        let err = fallback.execute(AdapterRequest::new("prompt")).await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Connect);
    }

    #[tokio::test]
    async fn fallback_emits_observer_event_on_transition() {
        #[derive(Default)]
        struct RecordingObserver {
            events: Mutex<Vec<(String, String, Role)>>,
        }
        impl EngineObserver for RecordingObserver {
            fn on_adapter_fallback(&self, from: &str, to: &str, _reason: &str, role: Role) {
                self.events.lock().unwrap().push((from.to_string(), to.to_string(), role));
            }
        }

        let first = FakeAdapter::new("first", Err(AdapterErrorKind::Timeout));
        let second = FakeAdapter::new("second", Ok("second output"));
        let chain: Vec<Arc<dyn Adapter>> = vec![first, second];
        let observer = Arc::new(RecordingObserver::default());
        let fallback = FallbackAdapter::new(chain, Role::Executor, AuthFailurePolicy::FailFast)
            .with_observer(observer.clone());

        fallback.execute(AdapterRequest::new("prompt")).await.expect("execute");

        let events = observer.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], ("first".to_string(), "second".to_string(), Role::Executor));
    }

    #[test]
    #[should_panic(expected = "non-empty")]
    fn new_panics_on_empty_chain() {
        let chain: Vec<Arc<dyn Adapter>> = vec![];
        FallbackAdapter::new(chain, Role::Architect, AuthFailurePolicy::FailFast);
    }
}
