use std::future::Future;
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use surge_core::{
    CommandLifecycle, CommandSpec, DEFAULT_PAUSE, DriverPolicy, EscalationController,
    EscalationPolicy, ExternalTarget, HarnessError, LoadShape, Payload, ProcessLifecycle,
    ReadinessProbe, Ready, RunOutcome, StartupError, StopReason, SustainedConfig,
    SustainedLoadController, Target, http_runner, supervise,
};
use tracing::{debug, info};

use crate::cli::{EscalateArgs, SuiteArgs, SustainArgs, TargetArgs};
use crate::exit_codes::ExitCode;
use crate::output::{self, Reporter};
use crate::run_error::RunError;
use crate::suites::{self, MIN_SUCCESS_RATE, SuiteContext};
use crate::summary::SuiteSummary;

/// Either a child process surge owns or a target someone else runs.
enum TargetLifecycle {
    Spawned(CommandLifecycle),
    External(ExternalTarget),
}

impl TargetLifecycle {
    fn from_args(args: &TargetArgs) -> Self {
        let probe = ReadinessProbe::default().with_startup_timeout(args.startup_timeout);
        match &args.spawn {
            Some(program) => {
                let spec = args
                    .spawn_env
                    .iter()
                    .fold(
                        CommandSpec::new(program.as_str()).args(&args.spawn_args),
                        |spec, (k, v)| spec.env(k, v),
                    );
                Self::Spawned(CommandLifecycle::new(spec, args.target_url.as_str(), probe))
            }
            None => Self::External(ExternalTarget::new(args.target_url.as_str(), probe)),
        }
    }
}

impl ProcessLifecycle for TargetLifecycle {
    async fn start(&mut self) -> Result<Ready, StartupError> {
        match self {
            Self::Spawned(l) => l.start().await,
            Self::External(l) => l.start().await,
        }
    }

    async fn stop(&mut self) {
        match self {
            Self::Spawned(l) => l.stop().await,
            Self::External(l) => l.stop().await,
        }
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed the run is simply not interruptible.
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        debug!(error = %err, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}

fn validate_target(args: &TargetArgs) -> Result<(), RunError> {
    let url = args.target_url.as_str();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(RunError::InvalidInput(anyhow::anyhow!(
            "invalid --target-url `{url}` (expected an http:// or https:// URL)"
        )));
    }
    Ok(())
}

fn validate_probe(path: &str) -> Result<Target, RunError> {
    if !path.starts_with('/') {
        return Err(RunError::InvalidInput(anyhow::anyhow!(
            "invalid --probe `{path}` (expected a path starting with `/`)"
        )));
    }
    Ok(Target::get(path))
}

fn driver_policy(args: &TargetArgs) -> DriverPolicy {
    DriverPolicy {
        request_timeout: args.request_timeout,
        pause: DEFAULT_PAUSE,
    }
}

/// Runs `body` against the supervised target and maps every ending onto an exit code.
async fn supervised<F, Fut>(
    args: &TargetArgs,
    reporter: Arc<dyn Reporter>,
    summary: Arc<Mutex<SuiteSummary>>,
    body: F,
) -> Result<ExitCode, RunError>
where
    F: FnOnce(Ready) -> Fut,
    Fut: Future<Output = anyhow::Result<ExitCode>> + Send + 'static,
{
    let mut lifecycle = TargetLifecycle::from_args(args);
    let outcome = supervise(&mut lifecycle, ctrl_c(), |ready| {
        info!(
            base_url = %ready.base_url,
            waited = ?ready.waited,
            attempts = ready.attempts,
            "target ready"
        );
        body(ready)
    })
    .await;

    match outcome {
        Ok(RunOutcome::Completed(Ok(code))) => Ok(code),
        Ok(RunOutcome::Completed(Err(err))) => Err(RunError::RuntimeError(err)),
        Ok(RunOutcome::Interrupted) => {
            reporter.interrupted();
            let partial = summary
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone();
            if partial.scenarios > 0 {
                reporter.summary(&partial);
            }
            Ok(ExitCode::Interrupted)
        }
        Err(HarnessError::Startup(err)) => Err(RunError::StartupFailed(
            anyhow::Error::new(err).context("target did not become ready"),
        )),
        Err(err @ HarnessError::Crashed(_)) => Err(RunError::RuntimeError(err.into())),
    }
}

pub(crate) async fn suite(args: SuiteArgs) -> Result<ExitCode, RunError> {
    validate_target(&args.target)?;

    let reporter = output::reporter(args.target.output);
    let summary = Arc::new(Mutex::new(SuiteSummary::default()));
    let policy = driver_policy(&args.target);
    let kind = args.suite;

    reporter.run_started(suites::title(kind), &args.target.target_url);

    let body_reporter = reporter.clone();
    let body_summary = summary.clone();
    supervised(&args.target, reporter, summary, move |ready| async move {
        let mut ctx = SuiteContext::new(&ready.base_url, policy, body_reporter, body_summary);
        let degraded = suites::run_suite(kind, &mut ctx).await?;
        Ok(ExitCode::from_degraded(degraded))
    })
    .await
}

fn escalation_policy(args: &EscalateArgs) -> Result<EscalationPolicy, RunError> {
    let policy = EscalationPolicy {
        levels: args.levels.clone(),
        requests_per_worker: args.requests_per_worker,
        min_success_rate: args.min_success_rate,
        max_avg_latency: args.max_avg_latency,
        settle: args.settle,
        probe: validate_probe(&args.probe)?,
        payload: Payload::Empty,
    };
    policy
        .validate()
        .context("invalid escalation options")
        .map_err(RunError::InvalidInput)?;
    Ok(policy)
}

pub(crate) async fn escalate(args: EscalateArgs) -> Result<ExitCode, RunError> {
    validate_target(&args.target)?;
    let escalation = escalation_policy(&args)?;

    let reporter = output::reporter(args.target.output);
    let summary = Arc::new(Mutex::new(SuiteSummary::default()));
    let policy = driver_policy(&args.target);

    reporter.run_started("Concurrency Escalation", &args.target.target_url);

    let body_reporter = reporter.clone();
    let body_summary = summary.clone();
    supervised(&args.target, reporter, summary, move |ready| async move {
        let runner = http_runner(ready.base_url.as_str(), policy);
        let observer_reporter = body_reporter.clone();
        let mut controller = EscalationController::new(runner, escalation)?.with_observer(
            move |step| {
                observer_reporter.escalation_step(step);
                body_summary
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .add_result(&step.result);
            },
        );

        body_reporter.scenario_started("Concurrency Escalation");
        let report = controller.run().await?;
        body_reporter.escalation(&report);

        if report.stop_reason == StopReason::Error {
            anyhow::bail!("escalation aborted: every worker unit crashed");
        }
        Ok(ExitCode::from_degraded(report.max_healthy_level().is_none()))
    })
    .await
}

pub(crate) async fn sustain(args: SustainArgs) -> Result<ExitCode, RunError> {
    validate_target(&args.target)?;
    let config = SustainedConfig {
        name: "Sustained Load".to_string(),
        workers: args.workers,
        duration: args.duration,
        probe: validate_probe(&args.probe)?,
        payload: Payload::Empty,
    };
    LoadShape::DurationBound {
        workers: config.workers,
        duration: config.duration,
    }
    .validate()
    .context("invalid sustain options")
    .map_err(RunError::InvalidInput)?;

    let reporter = output::reporter(args.target.output);
    let summary = Arc::new(Mutex::new(SuiteSummary::default()));
    let policy = driver_policy(&args.target);

    reporter.run_started("Sustained Load", &args.target.target_url);

    let body_reporter = reporter.clone();
    let body_summary = summary.clone();
    supervised(&args.target, reporter, summary, move |ready| async move {
        let runner = http_runner(ready.base_url.as_str(), policy);
        body_reporter.scenario_started(&config.name);
        let run = SustainedLoadController::new(runner, config)?.run().await?;
        body_reporter.scenario(&run.result);

        let snapshot = {
            let mut summary = body_summary
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            summary.add_result(&run.result);
            summary.clone()
        };
        body_reporter.summary(&snapshot);

        Ok(ExitCode::from_degraded(
            run.result.success_rate() < MIN_SUCCESS_RATE,
        ))
    })
    .await
}
