//! The adapter error taxonomy: a typed enum standing in for the
//! string-prefix convention (`RATE_LIMIT: ...`, `AUTH: ...`) so
//! `FallbackAdapter` branches on the variant while `Display` still renders
//! the human-readable sentinel-prefixed message callers expect to log.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterErrorKind {
    RateLimit,
    Auth,
    Timeout,
    Connect,
    InvalidResponse,
    Other,
}

impl AdapterErrorKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::RateLimit => "RATE_LIMIT",
            Self::Auth => "AUTH",
            Self::Timeout => "TIMEOUT",
            Self::Connect => "CONNECT",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::Other => "OTHER",
        }
    }

    /// Whether `FallbackAdapter` should move on to the next adapter in the
    /// chain for this kind, independent of the `AUTH` policy knob which
    /// applies only to `Auth` itself.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Connect | Self::Timeout)
    }
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Classify stderr/exit-code output from a spawned adapter CLI into the
/// taxonomy. Matching is deliberately loose (case-insensitive substrings)
/// since each backing CLI phrases these errors differently.
pub fn classify(stderr: &str, exit_code: i32) -> AdapterErrorKind {
    let lower = stderr.to_lowercase();

    if lower.contains("rate limit") || lower.contains("429") || lower.contains("too many requests") {
        return AdapterErrorKind::RateLimit;
    }
    if lower.contains("unauthorized")
        || lower.contains("authentication")
        || lower.contains("401")
        || lower.contains("invalid api key")
        || lower.contains("forbidden")
    {
        return AdapterErrorKind::Auth;
    }
    if lower.contains("timed out") || lower.contains("timeout") {
        return AdapterErrorKind::Timeout;
    }
    if lower.contains("connection refused")
        || lower.contains("could not connect")
        || lower.contains("network")
        || lower.contains("dns")
    {
        return AdapterErrorKind::Connect;
    }
    if lower.contains("invalid response") || lower.contains("malformed") || lower.contains("unexpected json") {
        return AdapterErrorKind::InvalidResponse;
    }
    if exit_code == 137 {
        return AdapterErrorKind::Timeout;
    }

    AdapterErrorKind::Other
}

/// An error returned by `Adapter::execute`: the classifier kind plus the
/// original message, formatted as `"{PREFIX}: {message}"` for logs.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub message: String,
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn from_process_failure(stderr: &str, exit_code: i32, summary: &str) -> Self {
        let kind = classify(stderr, exit_code);
        let message = if summary.is_empty() { format!("exit code {exit_code}") } else { summary.to_string() };
        Self::new(kind, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_rate_limit() {
        assert_eq!(classify("Error: 429 Too Many Requests", 1), AdapterErrorKind::RateLimit);
    }

    #[test]
    fn classify_auth() {
        assert_eq!(classify("401 Unauthorized: invalid API key", 1), AdapterErrorKind::Auth);
    }

    #[test]
    fn classify_timeout() {
        assert_eq!(classify("request timed out after 60s", 1), AdapterErrorKind::Timeout);
    }

    #[test]
    fn classify_connect() {
        assert_eq!(classify("Error: connection refused", 1), AdapterErrorKind::Connect);
    }

    #[test]
    fn classify_idle_kill_as_timeout() {
        assert_eq!(classify("", 137), AdapterErrorKind::Timeout);
    }

    #[test]
    fn classify_falls_back_to_other() {
        assert_eq!(classify("segmentation fault", 139), AdapterErrorKind::Other);
    }

    #[test]
    fn recoverable_kinds() {
        assert!(AdapterErrorKind::RateLimit.is_recoverable());
        assert!(AdapterErrorKind::Connect.is_recoverable());
        assert!(AdapterErrorKind::Timeout.is_recoverable());
        assert!(!AdapterErrorKind::Auth.is_recoverable());
        assert!(!AdapterErrorKind::InvalidResponse.is_recoverable());
        assert!(!AdapterErrorKind::Other.is_recoverable());
    }

    #[test]
    fn error_display_has_prefix() {
        let err = AdapterError::new(AdapterErrorKind::RateLimit, "slow down");
        assert_eq!(err.to_string(), "RATE_LIMIT: slow down");
    }
}
