use std::time::Duration;

use super::error::{Error, Result};
use super::executor::DEFAULT_REQUEST_TIMEOUT;
use super::target::{Payload, Target};

/// Pause between iterations of a duration-bound worker.
pub const DEFAULT_PAUSE: Duration = Duration::from_millis(10);

/// How many workers run and when each of them stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadShape {
    /// Every worker issues exactly `requests_per_worker` sequential requests.
    FixedFanOut { workers: u64, requests_per_worker: u64 },

    /// Every worker loops until `start + duration`.
    DurationBound { workers: u64, duration: Duration },
}

impl LoadShape {
    #[must_use]
    pub fn workers(&self) -> u64 {
        match self {
            Self::FixedFanOut { workers, .. } | Self::DurationBound { workers, .. } => *workers,
        }
    }

    /// Number of requests the shape will issue, when known up front.
    #[must_use]
    pub fn expected_total(&self) -> Option<u64> {
        match self {
            Self::FixedFanOut {
                workers,
                requests_per_worker,
            } => Some(workers.saturating_mul(*requests_per_worker)),
            Self::DurationBound { .. } => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers() == 0 {
            return Err(Error::InvalidWorkers);
        }
        match self {
            Self::FixedFanOut {
                requests_per_worker: 0,
                ..
            } => Err(Error::InvalidRequestsPerWorker),
            Self::DurationBound { duration, .. } if duration.is_zero() => {
                Err(Error::InvalidDuration)
            }
            _ => Ok(()),
        }
    }
}

/// Immutable description of one test.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub name: String,
    pub target: Target,
    pub payload: Payload,
    pub shape: LoadShape,
}

impl ScenarioConfig {
    pub fn new(name: impl Into<String>, target: Target, shape: LoadShape) -> Self {
        Self {
            name: name.into(),
            target,
            payload: Payload::Empty,
            shape,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.shape.validate()
    }
}

/// Knobs shared by every batch a driver runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverPolicy {
    /// Hard per-request bound; exceeding it is recorded as a transport failure.
    pub request_timeout: Duration,
    /// Pause between iterations of duration-bound workers.
    pub pause: Duration,
}

impl Default for DriverPolicy {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pause: DEFAULT_PAUSE,
        }
    }
}
