use std::time::Duration;

/// Classified result of one request attempt.
///
/// `elapsed` is measured from dispatch to completion or failure and is always present, even when
/// the attempt never produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub elapsed: Duration,
    pub kind: OutcomeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeKind {
    /// A 2xx response was received.
    Success { status: u16 },

    /// Either a non-2xx response (`status` is set) or a transport error such as a timeout or a
    /// refused connection (`status` is `None`).
    Failure {
        status: Option<u16>,
        reason: String,
    },
}

impl Outcome {
    /// Classifies a received response by its status code.
    #[must_use]
    pub fn from_status(status: u16, elapsed: Duration) -> Self {
        let kind = if (200..300).contains(&status) {
            OutcomeKind::Success { status }
        } else {
            OutcomeKind::Failure {
                status: Some(status),
                reason: format!("http status {status}"),
            }
        };
        Self { elapsed, kind }
    }

    #[must_use]
    pub fn transport_failure(reason: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            elapsed,
            kind: OutcomeKind::Failure {
                status: None,
                reason: reason.into(),
            },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.kind, OutcomeKind::Success { .. })
    }

    /// Status code of the response, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            OutcomeKind::Success { status } => Some(*status),
            OutcomeKind::Failure { status, .. } => *status,
        }
    }

    /// Latency sample contributed to aggregate statistics.
    ///
    /// Transport failures carry no completion signal and are left out of the latency population.
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.status().map(|_| self.elapsed)
    }

    #[must_use]
    pub fn error_reason(&self) -> Option<&str> {
        match &self.kind {
            OutcomeKind::Success { .. } => None,
            OutcomeKind::Failure { reason, .. } => Some(reason),
        }
    }
}
