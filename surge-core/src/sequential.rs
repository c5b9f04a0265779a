use tracing::debug;

use super::error::{Error, Result};
use super::executor::RequestExecutor;
use super::metrics::{TestResult, aggregate};
use super::outcome::Outcome;
use super::target::{Payload, Target};
use super::transport::Transport;

/// One caller issuing identical requests back to back, e.g. to compare a cold first request with
/// warmed-up ones.
#[derive(Debug, Clone)]
pub struct SequentialReport {
    /// The first (cold) request, reported on its own.
    pub first: Outcome,
    /// Aggregate over the remaining requests; throughput is always `0`.
    pub warm: TestResult,
}

impl SequentialReport {
    /// `first / warm.avg`, when both are non-zero.
    #[must_use]
    pub fn speedup(&self) -> Option<f64> {
        if self.first.elapsed.is_zero() || self.warm.avg.is_zero() {
            return None;
        }
        Some(self.first.elapsed.as_nanos() as f64 / self.warm.avg.as_nanos() as f64)
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.warm.total + 1
    }

    #[must_use]
    pub fn successful(&self) -> u64 {
        self.warm.successful + u64::from(self.first.is_success())
    }
}

/// Issues `count` requests sequentially; request `i` uses the payload body for index `i`.
pub async fn run_sequential<T: Transport>(
    executor: &RequestExecutor<T>,
    name: impl Into<String>,
    target: &Target,
    payload: &Payload,
    count: u64,
) -> Result<SequentialReport> {
    if count == 0 {
        return Err(Error::InvalidCount);
    }

    let first = executor.execute(target, payload.for_request(0)).await;
    debug!(%target, elapsed = ?first.elapsed, "first sequential request finished");

    let mut warm = Vec::with_capacity((count - 1) as usize);
    for i in 1..count {
        warm.push(executor.execute(target, payload.for_request(i)).await);
    }

    Ok(SequentialReport {
        first,
        warm: aggregate(name, &warm, None),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::executor::DEFAULT_REQUEST_TIMEOUT;
    use crate::testing::{StubReply, StubTransport};

    fn executor(stub: StubTransport) -> RequestExecutor<StubTransport> {
        RequestExecutor::new(Arc::new(stub), DEFAULT_REQUEST_TIMEOUT)
    }

    #[tokio::test(start_paused = true)]
    async fn first_request_is_reported_separately() {
        // Cold miss then warm hits.
        let exec = executor(StubTransport::new(|i, _| {
            let delay = if i == 0 { 50 } else { 5 };
            StubReply::status(200).after(Duration::from_millis(delay))
        }));

        let target = Target::post("/validate");
        let report = run_sequential(&exec, "cache", &target, &Payload::Empty, 100)
            .await
            .unwrap();

        assert!(report.first.elapsed >= Duration::from_millis(50));
        assert_eq!(report.warm.total, 99);
        assert_eq!(report.total(), 100);
        assert_eq!(report.successful(), 100);
        assert_eq!(report.warm.throughput, 0.0);
        let speedup = report.speedup().unwrap();
        assert!(speedup > 5.0 && speedup <= 10.0, "speedup={speedup}");
    }

    #[tokio::test(start_paused = true)]
    async fn single_request_has_empty_warm_population() {
        let exec = executor(StubTransport::always_ok());

        let report = run_sequential(&exec, "one", &Target::health(), &Payload::Empty, 1)
            .await
            .unwrap();

        assert_eq!(report.warm.total, 0);
        assert_eq!(report.speedup(), None);
        assert_eq!(exec.transport().calls(), 1);
    }

    #[tokio::test]
    async fn zero_count_is_rejected() {
        let exec = executor(StubTransport::always_ok());
        let err = run_sequential(&exec, "none", &Target::health(), &Payload::Empty, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCount));
        assert_eq!(exec.transport().calls(), 0);
    }
}
