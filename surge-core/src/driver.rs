use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::{DriverPolicy, LoadShape};
use super::error::Result;
use super::executor::RequestExecutor;
use super::outcome::Outcome;
use super::target::{Payload, Target};
use super::transport::Transport;

/// Raw output of one batch, before aggregation.
#[derive(Debug, Clone)]
pub struct DriveReport {
    pub outcomes: Vec<Outcome>,
    /// Wall-clock time from spawning the first worker until the last one finished.
    pub elapsed: Duration,
    pub workers: u64,
    /// Workers that died before returning their outcomes; they contribute nothing.
    pub crashed_units: u64,
}

#[derive(Debug, Clone, Copy)]
enum UnitPlan {
    Fixed(u64),
    Until(Instant),
}

/// Runs a pool of worker units against one target and waits for all of them.
#[derive(Debug)]
pub struct ConcurrencyDriver<T> {
    executor: RequestExecutor<T>,
    pause: Duration,
}

impl<T> Clone for ConcurrencyDriver<T> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            pause: self.pause,
        }
    }
}

impl<T: Transport> ConcurrencyDriver<T> {
    pub fn new(executor: RequestExecutor<T>, pause: Duration) -> Self {
        Self { executor, pause }
    }

    pub fn from_policy(transport: std::sync::Arc<T>, policy: DriverPolicy) -> Self {
        Self::new(
            RequestExecutor::new(transport, policy.request_timeout),
            policy.pause,
        )
    }

    #[must_use]
    pub fn executor(&self) -> &RequestExecutor<T> {
        &self.executor
    }

    /// Spawns `shape.workers()` units and returns once every unit has terminated.
    ///
    /// A unit that panics is logged and counted in [`DriveReport::crashed_units`]; the batch still
    /// completes with the outcomes of the remaining units.
    pub async fn drive(
        &self,
        target: &Target,
        payload: &Payload,
        shape: LoadShape,
    ) -> Result<DriveReport> {
        shape.validate()?;

        let workers = shape.workers();
        let mut units: JoinSet<Vec<Outcome>> = JoinSet::new();

        let started = Instant::now();
        let plan = match shape {
            LoadShape::FixedFanOut {
                requests_per_worker,
                ..
            } => UnitPlan::Fixed(requests_per_worker),
            LoadShape::DurationBound { duration, .. } => UnitPlan::Until(started + duration),
        };
        debug!(%target, workers, ?shape, "spawning worker units");

        for _ in 0..workers {
            let executor = self.executor.clone();
            let target = target.clone();
            let payload = payload.clone();
            let pause = self.pause;

            units.spawn(async move {
                match plan {
                    UnitPlan::Fixed(requests) => {
                        run_fixed_unit(&executor, &target, &payload, requests).await
                    }
                    UnitPlan::Until(deadline) => {
                        run_timed_unit(&executor, &target, &payload, deadline, pause).await
                    }
                }
            });
        }

        let mut outcomes = Vec::with_capacity(shape.expected_total().unwrap_or(0) as usize);
        let mut crashed_units = 0u64;
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(batch) => outcomes.extend(batch),
                Err(err) => {
                    crashed_units += 1;
                    warn!(%target, error = %err, "worker unit crashed; dropping its outcomes");
                }
            }
        }
        let elapsed = started.elapsed();

        debug!(
            %target,
            requests = outcomes.len(),
            crashed_units,
            elapsed_ms = elapsed.as_millis() as u64,
            "worker units finished"
        );

        Ok(DriveReport {
            outcomes,
            elapsed,
            workers,
            crashed_units,
        })
    }
}

/// One fixed fan-out worker: `requests` strictly sequential attempts.
pub async fn run_fixed_unit<T: Transport>(
    executor: &RequestExecutor<T>,
    target: &Target,
    payload: &Payload,
    requests: u64,
) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(requests as usize);
    for i in 0..requests {
        outcomes.push(executor.execute(target, payload.for_request(i)).await);
    }
    outcomes
}

/// One duration-bound worker.
///
/// The deadline is checked before each iteration; a request already in flight when it passes is
/// allowed to finish.
pub async fn run_timed_unit<T: Transport>(
    executor: &RequestExecutor<T>,
    target: &Target,
    payload: &Payload,
    deadline: Instant,
    pause: Duration,
) -> Vec<Outcome> {
    let mut outcomes = Vec::new();
    let mut i = 0u64;
    while Instant::now() < deadline {
        outcomes.push(executor.execute(target, payload.for_request(i)).await);
        i += 1;
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
    outcomes
}
