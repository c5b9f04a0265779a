use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::config::{LoadShape, ScenarioConfig};
use super::error::{Error, Result};
use super::metrics::{TestResult, aggregate};
use super::scenario::ScenarioRunner;
use super::target::{Payload, Target};
use super::transport::Transport;

pub const DEFAULT_LEVELS: [u64; 8] = [10, 25, 50, 75, 100, 150, 200, 300];

/// Why an escalation run stopped at a given step (`None` while it keeps going).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    None,
    SuccessRateBelowThreshold,
    LatencyAboveThreshold,
    LevelsExhausted,
    Error,
}

impl StopReason {
    /// `true` when the target degraded (as opposed to running out of levels).
    #[must_use]
    pub fn is_degradation(self) -> bool {
        matches!(
            self,
            Self::SuccessRateBelowThreshold | Self::LatencyAboveThreshold
        )
    }
}

#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    /// Strictly increasing worker counts, tried in order.
    pub levels: Vec<u64>,
    pub requests_per_worker: u64,
    pub min_success_rate: f64,
    pub max_avg_latency: Duration,
    /// Pause between two levels.
    pub settle: Duration,
    pub probe: Target,
    pub payload: Payload,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS.to_vec(),
            requests_per_worker: 10,
            min_success_rate: 0.95,
            max_avg_latency: Duration::from_millis(100),
            settle: Duration::from_secs(1),
            probe: Target::health(),
            payload: Payload::Empty,
        }
    }
}

impl EscalationPolicy {
    pub fn validate(&self) -> Result<()> {
        let positive = self.levels.first().is_some_and(|&first| first > 0);
        let increasing = self.levels.windows(2).all(|w| w[0] < w[1]);
        if !positive || !increasing {
            return Err(Error::InvalidLevels);
        }
        if self.requests_per_worker == 0 {
            return Err(Error::InvalidRequestsPerWorker);
        }
        if !(0.0..=1.0).contains(&self.min_success_rate) {
            return Err(Error::InvalidSuccessRate(self.min_success_rate));
        }
        Ok(())
    }

    /// Stop predicates, first match wins.
    #[must_use]
    pub fn evaluate(&self, result: &TestResult) -> StopReason {
        if result.success_rate() < self.min_success_rate {
            StopReason::SuccessRateBelowThreshold
        } else if result.avg > self.max_avg_latency {
            StopReason::LatencyAboveThreshold
        } else {
            StopReason::None
        }
    }
}

#[derive(Debug, Clone)]
pub struct EscalationStep {
    pub level: u64,
    pub result: TestResult,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    Idle,
    Running { level_index: usize },
    Stopped(StopReason),
}

#[derive(Debug, Clone)]
pub struct EscalationReport {
    pub steps: Vec<EscalationStep>,
    pub stop_reason: StopReason,
}

impl EscalationReport {
    /// Highest level that ran without tripping a threshold.
    #[must_use]
    pub fn max_healthy_level(&self) -> Option<u64> {
        self.steps
            .iter()
            .filter(|s| matches!(s.stop_reason, StopReason::None | StopReason::LevelsExhausted))
            .map(|s| s.level)
            .max()
    }
}

/// Called with every step as soon as its level has been evaluated.
pub type StepFn = Arc<dyn Fn(&EscalationStep) + Send + Sync>;

/// Steps concurrency upward until the target degrades or the levels run out.
pub struct EscalationController<T> {
    runner: ScenarioRunner<T>,
    policy: EscalationPolicy,
    state: EscalationState,
    on_step: Option<StepFn>,
}

impl<T: Transport> EscalationController<T> {
    pub fn new(runner: ScenarioRunner<T>, policy: EscalationPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            runner,
            policy,
            state: EscalationState::Idle,
            on_step: None,
        })
    }

    #[must_use]
    pub fn with_observer(
        mut self,
        on_step: impl Fn(&EscalationStep) + Send + Sync + 'static,
    ) -> Self {
        self.on_step = Some(Arc::new(on_step));
        self
    }

    #[must_use]
    pub fn state(&self) -> EscalationState {
        self.state
    }

    #[must_use]
    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Runs levels in order until a stop predicate trips.
    ///
    /// A controller runs once; calling this again returns [`Error::ControllerFinished`].
    pub async fn run(&mut self) -> Result<EscalationReport> {
        match self.state {
            EscalationState::Idle => {}
            EscalationState::Stopped(reason) => return Err(Error::ControllerFinished(reason)),
            EscalationState::Running { .. } => {
                return Err(Error::ControllerFinished(StopReason::None));
            }
        }

        let levels = self.policy.levels.clone();
        let mut steps = Vec::with_capacity(levels.len());

        for (level_index, &level) in levels.iter().enumerate() {
            if level_index > 0 && !self.policy.settle.is_zero() {
                tokio::time::sleep(self.policy.settle).await;
            }
            self.state = EscalationState::Running { level_index };
            info!(level, "escalation level starting");

            let (result, mut stop_reason) = self.run_level(level).await;
            let is_last = level_index + 1 == levels.len();
            if stop_reason == StopReason::None && is_last {
                stop_reason = StopReason::LevelsExhausted;
            }

            info!(
                level,
                success_rate = result.success_rate(),
                avg_ms = result.avg.as_secs_f64() * 1000.0,
                rps = result.throughput,
                stop_reason = %stop_reason,
                "escalation level finished"
            );

            let step = EscalationStep {
                level,
                result,
                stop_reason,
            };
            if let Some(on_step) = &self.on_step {
                on_step(&step);
            }
            steps.push(step);

            if stop_reason != StopReason::None {
                self.state = EscalationState::Stopped(stop_reason);
                return Ok(EscalationReport { steps, stop_reason });
            }
        }

        // `validate` rejects an empty level list, so this only guards the type checker.
        self.state = EscalationState::Stopped(StopReason::LevelsExhausted);
        Ok(EscalationReport {
            steps,
            stop_reason: StopReason::LevelsExhausted,
        })
    }

    async fn run_level(&self, level: u64) -> (TestResult, StopReason) {
        let name = format!("escalation {level} workers");
        let config = ScenarioConfig::new(
            name.as_str(),
            self.policy.probe.clone(),
            LoadShape::FixedFanOut {
                workers: level,
                requests_per_worker: self.policy.requests_per_worker,
            },
        )
        .with_payload(self.policy.payload.clone());

        match self.runner.run(&config).await {
            Ok(run) if run.all_units_crashed() => {
                warn!(level, "every worker unit crashed; stopping escalation");
                (run.result, StopReason::Error)
            }
            Ok(run) => {
                let reason = self.policy.evaluate(&run.result);
                (run.result, reason)
            }
            Err(err) => {
                warn!(level, error = %err, "escalation level could not run");
                (aggregate(name, &[], None), StopReason::Error)
            }
        }
    }
}
