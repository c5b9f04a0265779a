use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context as _;
use surge_core::{
    DriverPolicy, EscalationController, EscalationPolicy, HttpScenarioRunner, HttpTransport,
    LoadShape, Payload, RequestExecutor, ScenarioConfig, StopReason, SustainedConfig,
    SustainedLoadController, Target, TestResult, http_runner, run_sequential,
};

use crate::cli::SuiteKind;
use crate::output::Reporter;
use crate::payloads::{VALIDATE_PATH, dangerous_tool_call, large_tool_call, safe_tool_call};
use crate::summary::SuiteSummary;

/// Success rate below which a checked scenario marks the run as degraded.
pub(crate) const MIN_SUCCESS_RATE: f64 = 0.95;

const SUSTAINED_DURATION: Duration = Duration::from_secs(20);

/// Whether a scenario's success rate decides the exit code. Informational scenarios are only
/// reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Checked,
    Informational,
}

pub(crate) struct SuiteContext {
    runner: HttpScenarioRunner,
    executor: RequestExecutor<HttpTransport>,
    reporter: Arc<dyn Reporter>,
    summary: Arc<Mutex<SuiteSummary>>,
    degraded: bool,
}

impl SuiteContext {
    pub(crate) fn new(
        base_url: &str,
        policy: DriverPolicy,
        reporter: Arc<dyn Reporter>,
        summary: Arc<Mutex<SuiteSummary>>,
    ) -> Self {
        let runner = http_runner(base_url, policy);
        let executor = runner.driver().executor().clone();
        Self {
            runner,
            executor,
            reporter,
            summary,
            degraded: false,
        }
    }

    fn record(&mut self, result: &TestResult, gate: Gate) {
        self.summary
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .add_result(result);
        if gate == Gate::Checked && result.success_rate() < MIN_SUCCESS_RATE {
            self.degraded = true;
        }
    }

    async fn fixed(
        &mut self,
        name: &str,
        target: Target,
        payload: Payload,
        workers: u64,
        requests_per_worker: u64,
        gate: Gate,
    ) -> anyhow::Result<()> {
        self.reporter.scenario_started(name);
        let config = ScenarioConfig::new(
            name,
            target,
            LoadShape::FixedFanOut {
                workers,
                requests_per_worker,
            },
        )
        .with_payload(payload);

        let run = self
            .runner
            .run(&config)
            .await
            .with_context(|| format!("scenario `{name}`"))?;
        self.reporter.scenario(&run.result);
        self.record(&run.result, gate);
        Ok(())
    }

    async fn cache_probe(&mut self, name: &str, count: u64) -> anyhow::Result<()> {
        self.reporter.scenario_started(name);
        let payload = Payload::json(&safe_tool_call())?;
        let report = run_sequential(
            &self.executor,
            name,
            &Target::post(VALIDATE_PATH),
            &payload,
            count,
        )
        .await
        .with_context(|| format!("scenario `{name}`"))?;

        self.reporter.sequential(&report);
        self.summary
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .add_sequential(&report);
        if (report.successful() as f64) < MIN_SUCCESS_RATE * report.total() as f64 {
            self.degraded = true;
        }
        Ok(())
    }

    async fn escalation(&mut self) -> anyhow::Result<()> {
        self.reporter.scenario_started("Concurrency Escalation");
        let reporter = self.reporter.clone();
        let summary = self.summary.clone();
        let mut controller =
            EscalationController::new(self.runner.clone(), EscalationPolicy::default())?
                .with_observer(move |step| {
                    reporter.escalation_step(step);
                    summary
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .add_result(&step.result);
                });

        let report = controller.run().await?;
        self.reporter.escalation(&report);
        if report.stop_reason == StopReason::Error {
            anyhow::bail!("escalation aborted: every worker unit crashed");
        }
        Ok(())
    }

    async fn sustained(&mut self) -> anyhow::Result<()> {
        let config = SustainedConfig {
            name: "Sustained Load".to_string(),
            duration: SUSTAINED_DURATION,
            ..SustainedConfig::default()
        };
        self.reporter.scenario_started(&config.name);
        let run = SustainedLoadController::new(self.runner.clone(), config)?
            .run()
            .await?;
        self.reporter.scenario(&run.result);
        self.record(&run.result, Gate::Checked);
        Ok(())
    }

    async fn memory_stress(&mut self) -> anyhow::Result<()> {
        let name = "Memory Stress";
        self.reporter.scenario_started(name);
        let payload = Payload::json(&large_tool_call())?;
        let payload_bytes = payload.first_len();
        let config = ScenarioConfig::new(
            name,
            Target::post(VALIDATE_PATH),
            LoadShape::FixedFanOut {
                workers: 20,
                requests_per_worker: 5,
            },
        )
        .with_payload(payload);

        let run = self.runner.run(&config).await?;
        self.reporter.memory_stress(&run.result, payload_bytes);
        self.record(&run.result, Gate::Checked);
        Ok(())
    }

    /// `true` once a checked scenario fell below [`MIN_SUCCESS_RATE`].
    pub(crate) fn degraded(&self) -> bool {
        self.degraded
    }
}

pub(crate) fn title(kind: SuiteKind) -> &'static str {
    match kind {
        SuiteKind::Load => "Load Test Suite",
        SuiteKind::Simple => "Simple Load Test Suite",
        SuiteKind::Stress => "Stress Test Suite",
    }
}

/// Runs every scenario of `kind` in order and returns whether the target degraded.
pub(crate) async fn run_suite(kind: SuiteKind, ctx: &mut SuiteContext) -> anyhow::Result<bool> {
    match kind {
        SuiteKind::Load => load(ctx).await?,
        SuiteKind::Simple => simple(ctx).await?,
        SuiteKind::Stress => stress(ctx).await?,
    }

    let summary = ctx
        .summary
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    ctx.reporter.summary(&summary);
    Ok(ctx.degraded())
}

async fn load(ctx: &mut SuiteContext) -> anyhow::Result<()> {
    let mixed = Payload::alternating_json(&safe_tool_call(), &dangerous_tool_call())?;

    ctx.fixed(
        "Health Check Endpoint",
        Target::health(),
        Payload::Empty,
        50,
        20,
        Gate::Checked,
    )
    .await?;
    ctx.fixed(
        "Policy Validation",
        Target::post(VALIDATE_PATH),
        mixed,
        30,
        10,
        Gate::Informational,
    )
    .await?;
    ctx.cache_probe("Cache Performance", 100).await?;
    ctx.fixed(
        "Stress Test",
        Target::health(),
        Payload::Empty,
        100,
        10,
        Gate::Checked,
    )
    .await?;
    Ok(())
}

async fn simple(ctx: &mut SuiteContext) -> anyhow::Result<()> {
    let safe = Payload::json(&safe_tool_call())?;
    let mixed = Payload::alternating_json(&safe_tool_call(), &dangerous_tool_call())?;

    ctx.fixed(
        "Health Check",
        Target::health(),
        Payload::Empty,
        25,
        20,
        Gate::Checked,
    )
    .await?;
    ctx.fixed(
        "Policy Validation",
        Target::post(VALIDATE_PATH),
        safe,
        20,
        15,
        Gate::Checked,
    )
    .await?;
    ctx.fixed(
        "Mixed Workload",
        Target::post(VALIDATE_PATH),
        mixed,
        15,
        10,
        Gate::Informational,
    )
    .await?;
    ctx.cache_probe("Cache Performance", 11).await?;
    Ok(())
}

async fn stress(ctx: &mut SuiteContext) -> anyhow::Result<()> {
    ctx.escalation().await?;
    ctx.sustained().await?;
    ctx.memory_stress().await?;
    Ok(())
}
