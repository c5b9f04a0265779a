use std::future::Future;

use tracing::{info, warn};

use super::lifecycle::{ProcessLifecycle, Ready, StartupError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome<T> {
    Completed(T),
    Interrupted,
}

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("target failed to start: {0}")]
    Startup(#[from] StartupError),

    #[error("run aborted: {0}")]
    Crashed(String),
}

/// Starts the target, runs `body` against it and stops the target again.
///
/// `stop` is called exactly once, whether the body completes, panics, or `interrupt` resolves
/// first. A startup failure is returned without running the body.
pub async fn supervise<L, I, F, Fut, R>(
    lifecycle: &mut L,
    interrupt: I,
    body: F,
) -> Result<RunOutcome<R>, HarnessError>
where
    L: ProcessLifecycle,
    I: Future<Output = ()>,
    F: FnOnce(Ready) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
{
    tokio::pin!(interrupt);

    let started = tokio::select! {
        res = lifecycle.start() => Some(res),
        () = &mut interrupt => None,
    };
    let ready = match started {
        Some(Ok(ready)) => ready,
        Some(Err(err)) => {
            warn!(error = %err, "target failed to start");
            lifecycle.stop().await;
            return Err(err.into());
        }
        None => {
            info!("interrupted during startup");
            lifecycle.stop().await;
            return Ok(RunOutcome::Interrupted);
        }
    };

    let mut task = tokio::spawn(body(ready));
    let joined = tokio::select! {
        joined = &mut task => Some(joined),
        () = &mut interrupt => None,
    };

    let outcome = match joined {
        Some(Ok(value)) => Ok(RunOutcome::Completed(value)),
        Some(Err(err)) => {
            warn!(error = %err, "run body crashed");
            Err(HarnessError::Crashed(err.to_string()))
        }
        None => {
            info!("interrupted; cancelling run");
            task.abort();
            let _ = task.await;
            Ok(RunOutcome::Interrupted)
        }
    };

    lifecycle.stop().await;
    outcome
}
