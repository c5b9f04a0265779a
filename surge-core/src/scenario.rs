use tracing::info;

use super::config::ScenarioConfig;
use super::driver::ConcurrencyDriver;
use super::error::Result;
use super::metrics::{TestResult, aggregate};
use super::transport::Transport;

/// Result of one named scenario, plus driver bookkeeping that does not belong in [`TestResult`].
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    pub result: TestResult,
    pub workers: u64,
    pub crashed_units: u64,
}

impl ScenarioRun {
    /// `true` when every unit crashed and nothing was measured.
    #[must_use]
    pub fn all_units_crashed(&self) -> bool {
        self.workers > 0 && self.crashed_units == self.workers
    }
}

#[derive(Debug)]
pub struct ScenarioRunner<T> {
    driver: ConcurrencyDriver<T>,
}

impl<T> Clone for ScenarioRunner<T> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
        }
    }
}

impl<T: Transport> ScenarioRunner<T> {
    pub fn new(driver: ConcurrencyDriver<T>) -> Self {
        Self { driver }
    }

    #[must_use]
    pub fn driver(&self) -> &ConcurrencyDriver<T> {
        &self.driver
    }

    pub async fn run(&self, config: &ScenarioConfig) -> Result<ScenarioRun> {
        config.validate()?;

        let report = self
            .driver
            .drive(&config.target, &config.payload, config.shape)
            .await?;
        let result = aggregate(config.name.as_str(), &report.outcomes, Some(report.elapsed));

        info!(
            scenario = %config.name,
            target = %config.target,
            total = result.total,
            successful = result.successful,
            failed = result.failed,
            rps = result.throughput,
            "scenario finished"
        );

        Ok(ScenarioRun {
            result,
            workers: report.workers,
            crashed_units: report.crashed_units,
        })
    }
}
