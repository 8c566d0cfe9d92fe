use std::time::Duration;

use serde::Serialize;

/// Longest error description kept in the error histogram
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// Category of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The per-request timeout elapsed
    Timeout,
    /// The connection to the target (or proxy) could not be established
    Connect,
    /// Any other transport failure, reported after retries ran out
    Transport,
    /// The dispatcher task itself died
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Connect => "connect",
            ErrorKind::Transport => "transport",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Histogram key for failures: structured kind plus a bounded description
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ErrorKey {
    pub kind: ErrorKind,
    pub description: String,
}

impl ErrorKey {
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: bound_description(description.into()),
        }
    }

    /// Key every timeout is counted under
    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, "Timeout")
    }
}

impl std::fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description)
    }
}

/// Final result of one attempt, with all retries collapsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// An HTTP response was received; any status code counts
    Success { status: u16, latency: Duration },
    /// No response was received
    Failure { kind: ErrorKind, description: String },
}

impl AttemptOutcome {
    pub fn success(status: u16, latency: Duration) -> Self {
        AttemptOutcome::Success { status, latency }
    }

    pub fn failure(kind: ErrorKind, description: impl Into<String>) -> Self {
        AttemptOutcome::Failure {
            kind,
            description: bound_description(description.into()),
        }
    }

    pub fn timeout() -> Self {
        Self::failure(ErrorKind::Timeout, "Timeout")
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success { .. })
    }

    /// Histogram key for a failure, `None` for a success
    pub fn error_key(&self) -> Option<ErrorKey> {
        match self {
            AttemptOutcome::Success { .. } => None,
            AttemptOutcome::Failure { kind, description } => {
                Some(ErrorKey::new(*kind, description.clone()))
            }
        }
    }
}

/// Outcome of one attempt as forwarded to the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub attempt_id: u64,
    /// Transport tries consumed, including the final one
    pub tries: u32,
    pub outcome: AttemptOutcome,
}

fn bound_description(description: String) -> String {
    if description.chars().count() <= MAX_DESCRIPTION_LEN {
        return description;
    }
    description.chars().take(MAX_DESCRIPTION_LEN).collect()
}
