//! Load generation against a single HTTP target: concurrent request drivers, latency and
//! throughput aggregation, adaptive concurrency escalation, and lifecycle control of the process
//! under test.

mod config;
mod driver;
mod error;
mod escalation;
mod executor;
mod harness;
mod lifecycle;
mod metrics;
mod outcome;
mod scenario;
mod sequential;
mod sustained;
mod target;
mod transport;

#[cfg(test)]
mod testing;

pub use config::{DEFAULT_PAUSE, DriverPolicy, LoadShape, ScenarioConfig};
pub use driver::{ConcurrencyDriver, DriveReport, run_fixed_unit, run_timed_unit};
pub use error::{Error, Result};
pub use escalation::{
    DEFAULT_LEVELS, EscalationController, EscalationPolicy, EscalationReport, EscalationState,
    EscalationStep, StepFn, StopReason,
};
pub use executor::{DEFAULT_REQUEST_TIMEOUT, RequestExecutor};
pub use harness::{HarnessError, RunOutcome, supervise};
pub use lifecycle::{
    CommandLifecycle, CommandSpec, ExternalTarget, ProcessLifecycle, ReadinessProbe, Ready,
    StartupError,
};
pub use metrics::{ERROR_SAMPLE_LIMIT, SMALL_SAMPLE_MAX, TestResult, aggregate, percentile_95};
pub use outcome::{Outcome, OutcomeKind};
pub use scenario::{ScenarioRun, ScenarioRunner};
pub use sequential::{SequentialReport, run_sequential};
pub use sustained::{SustainedConfig, SustainedLoadController};
pub use target::{Payload, PayloadFn, Target};
pub use transport::{HttpTransport, ProbeRequest, ProbeResponse, Transport, TransportError};

/// Runner wired to the real HTTP transport.
pub type HttpScenarioRunner = ScenarioRunner<HttpTransport>;

/// Builds a [`ScenarioRunner`] over HTTP against `base_url`.
pub fn http_runner(
    base_url: impl Into<std::sync::Arc<str>>,
    policy: DriverPolicy,
) -> HttpScenarioRunner {
    let transport = std::sync::Arc::new(HttpTransport::new(base_url));
    ScenarioRunner::new(ConcurrencyDriver::from_policy(transport, policy))
}
