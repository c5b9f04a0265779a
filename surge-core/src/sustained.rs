use std::fmt;
use std::time::Duration;

use tracing::info;

use super::config::{LoadShape, ScenarioConfig};
use super::error::Result;
use super::scenario::{ScenarioRun, ScenarioRunner};
use super::target::{Payload, Target};
use super::transport::Transport;

#[derive(Debug, Clone)]
pub struct SustainedConfig {
    pub name: String,
    pub workers: u64,
    pub duration: Duration,
    pub probe: Target,
    pub payload: Payload,
}

impl Default for SustainedConfig {
    fn default() -> Self {
        Self {
            name: "sustained load".to_string(),
            workers: 50,
            duration: Duration::from_secs(30),
            probe: Target::health(),
            payload: Payload::Empty,
        }
    }
}

impl SustainedConfig {
    fn scenario(&self) -> ScenarioConfig {
        ScenarioConfig::new(
            self.name.as_str(),
            self.probe.clone(),
            LoadShape::DurationBound {
                workers: self.workers,
                duration: self.duration,
            },
        )
        .with_payload(self.payload.clone())
    }
}

/// Holds a fixed worker pool against the probe for a wall-clock duration and aggregates once.
pub struct SustainedLoadController<T> {
    runner: ScenarioRunner<T>,
    config: SustainedConfig,
}

impl<T> fmt::Debug for SustainedLoadController<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SustainedLoadController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> SustainedLoadController<T> {
    pub fn new(runner: ScenarioRunner<T>, config: SustainedConfig) -> Result<Self> {
        config.scenario().validate()?;
        Ok(Self { runner, config })
    }

    #[must_use]
    pub fn config(&self) -> &SustainedConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<ScenarioRun> {
        info!(
            workers = self.config.workers,
            duration = ?self.config.duration,
            target = %self.config.probe,
            "sustained load starting"
        );
        self.runner.run(&self.config.scenario()).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Arc;

    use super::*;
    use crate::config::DriverPolicy;
    use crate::driver::ConcurrencyDriver;
    use crate::error::Error;
    use crate::testing::{StubReply, StubTransport};

    fn runner(stub: StubTransport) -> ScenarioRunner<StubTransport> {
        ScenarioRunner::new(ConcurrencyDriver::from_policy(
            Arc::new(stub),
            DriverPolicy::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn runs_for_the_configured_duration() {
        let stub = StubTransport::new(|_, _| {
            StubReply::status(200).after(Duration::from_millis(40))
        });
        let config = SustainedConfig {
            workers: 5,
            duration: Duration::from_secs(1),
            ..SustainedConfig::default()
        };
        let controller = SustainedLoadController::new(runner(stub), config).unwrap();

        let run = controller.run().await.unwrap();

        // 40ms request + 10ms pause: 20 iterations per worker.
        assert_eq!(run.result.total, 100);
        assert_eq!(run.result.successful, 100);
        assert!(run.result.duration >= Duration::from_secs(1));
        assert!(run.result.throughput > 0.0);
        assert_eq!(run.result.name, "sustained load");
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_the_run() {
        let stub = StubTransport::new(|i, _| {
            if i % 2 == 0 {
                StubReply::status(500)
            } else {
                StubReply::status(200)
            }
        });
        let config = SustainedConfig {
            workers: 1,
            duration: Duration::from_millis(500),
            ..SustainedConfig::default()
        };
        let controller = SustainedLoadController::new(runner(stub), config).unwrap();

        let run = controller.run().await.unwrap();

        assert_eq!(run.result.total, 50);
        assert_eq!(run.result.failed, 25);
    }

    #[test]
    fn debug_does_not_need_a_debug_transport() {
        let stub = StubTransport::always_ok();
        let controller = SustainedLoadController::new(runner(stub), SustainedConfig::default())
            .unwrap();
        let rendered = format!("{controller:?}");
        assert!(rendered.starts_with("SustainedLoadController { config: SustainedConfig"));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = SustainedConfig {
            workers: 0,
            ..SustainedConfig::default()
        };
        let err = SustainedLoadController::new(runner(StubTransport::always_ok()), config)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidWorkers));
    }
}
