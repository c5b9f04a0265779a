use std::future::Future;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::target::Target;
use super::transport::{HttpTransport, ProbeRequest, Transport};

/// The target answered its readiness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready {
    pub base_url: String,
    pub waited: Duration,
    pub attempts: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("target process exited before becoming healthy ({0})")]
    Exited(ExitStatus),

    #[error("target not healthy after {waited:?} ({attempts} attempts): {last_error}")]
    Unhealthy {
        waited: Duration,
        attempts: u32,
        last_error: String,
    },

    #[error("failed to poll target process: {0}")]
    Io(#[from] std::io::Error),
}

/// Start, health-check and stop of the system under test.
pub trait ProcessLifecycle: Send {
    /// Brings the target up and returns once it answers its readiness probe.
    fn start(&mut self) -> impl Future<Output = Result<Ready, StartupError>> + Send;

    /// Tears the target down. Safe to call after a failed or skipped `start`.
    fn stop(&mut self) -> impl Future<Output = ()> + Send;
}

/// Polls the probe endpoint with exponential backoff until it answers 2xx or the startup window
/// elapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessProbe {
    pub target: Target,
    pub startup_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self {
            target: Target::health(),
            startup_timeout: Duration::from_secs(30),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            request_timeout: Duration::from_secs(1),
        }
    }
}

impl ReadinessProbe {
    #[must_use]
    pub fn with_startup_timeout(mut self, startup_timeout: Duration) -> Self {
        self.startup_timeout = startup_timeout;
        self
    }

    /// `alive` runs before every attempt; an error from it aborts the wait.
    pub async fn wait<T: Transport>(
        &self,
        transport: &T,
        base_url: &str,
        mut alive: impl FnMut() -> Result<(), StartupError> + Send,
    ) -> Result<Ready, StartupError> {
        let started = Instant::now();
        let deadline = started + self.startup_timeout;
        let mut backoff = self.initial_backoff;
        let mut attempts = 0u32;

        loop {
            alive()?;
            attempts += 1;

            let req = ProbeRequest {
                method: self.target.method.clone(),
                path: self.target.path.clone(),
                body: None,
                timeout: self.request_timeout,
            };
            let last_error =
                match tokio::time::timeout(self.request_timeout, transport.send(req)).await {
                    Ok(Ok(res)) if (200..300).contains(&res.status) => {
                        let waited = started.elapsed();
                        info!(base_url, attempts, ?waited, "target is ready");
                        return Ok(Ready {
                            base_url: base_url.to_string(),
                            waited,
                            attempts,
                        });
                    }
                    Ok(Ok(res)) => format!("http status {}", res.status),
                    Ok(Err(err)) => err.to_string(),
                    Err(_) => format!("timeout: no response within {:?}", self.request_timeout),
                };

            let now = Instant::now();
            if now >= deadline {
                return Err(StartupError::Unhealthy {
                    waited: started.elapsed(),
                    attempts,
                    last_error,
                });
            }

            let pause = backoff.min(deadline - now);
            debug!(attempts, ?pause, error = %last_error, "target not ready yet");
            tokio::time::sleep(pause).await;
            backoff = backoff.saturating_mul(2).min(self.max_backoff);
        }
    }
}

/// Program to launch as the system under test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

/// Spawns the target as a child process and kills it on `stop`.
#[derive(Debug)]
pub struct CommandLifecycle {
    spec: CommandSpec,
    base_url: String,
    probe: ReadinessProbe,
    transport: HttpTransport,
    child: Option<Child>,
}

impl CommandLifecycle {
    pub fn new(spec: CommandSpec, base_url: impl Into<String>, probe: ReadinessProbe) -> Self {
        let base_url = base_url.into();
        Self {
            spec,
            transport: HttpTransport::new(base_url.as_str()),
            base_url,
            probe,
            child: None,
        }
    }

    /// OS process id of the running target, if any.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }
}

impl ProcessLifecycle for CommandLifecycle {
    async fn start(&mut self) -> Result<Ready, StartupError> {
        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args)
            .envs(self.spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| StartupError::Spawn {
            program: self.spec.program.clone(),
            source,
        })?;
        info!(program = %self.spec.program, pid = ?child.id(), "target process spawned");

        let child = self.child.insert(child);
        self.probe
            .wait(&self.transport, &self.base_url, || match child.try_wait()? {
                Some(status) => Err(StartupError::Exited(status)),
                None => Ok(()),
            })
            .await
    }

    async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => debug!(%status, "target process already exited"),
            _ => {
                if let Err(err) = child.kill().await {
                    warn!(error = %err, "failed to kill target process");
                } else {
                    info!("target process stopped");
                }
            }
        }
    }
}

/// A target that is already running somewhere; only its readiness is checked.
#[derive(Debug, Clone)]
pub struct ExternalTarget {
    base_url: String,
    probe: ReadinessProbe,
    transport: HttpTransport,
}

impl ExternalTarget {
    pub fn new(base_url: impl Into<String>, probe: ReadinessProbe) -> Self {
        let base_url = base_url.into();
        Self {
            transport: HttpTransport::new(base_url.as_str()),
            base_url,
            probe,
        }
    }
}

impl ProcessLifecycle for ExternalTarget {
    async fn start(&mut self) -> Result<Ready, StartupError> {
        self.probe
            .wait(&self.transport, &self.base_url, || Ok(()))
            .await
    }

    async fn stop(&mut self) {
        debug!(base_url = %self.base_url, "external target left running");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use surge_http::HttpTransportErrorKind;

    use super::*;
    use crate::testing::{StubReply, StubTransport};

    fn refused() -> StubReply {
        StubReply::error(HttpTransportErrorKind::Connect, "connection refused")
    }

    #[tokio::test(start_paused = true)]
    async fn backs_off_until_healthy() {
        let stub = StubTransport::new(|i, _| {
            if i < 3 {
                refused()
            } else {
                StubReply::status(200)
            }
        });

        let ready = ReadinessProbe::default()
            .wait(&stub, "http://target", || Ok(()))
            .await
            .unwrap();

        assert_eq!(ready.attempts, 4);
        assert_eq!(ready.base_url, "http://target");
        // 100ms + 200ms + 400ms of backoff.
        assert!(ready.waited >= Duration::from_millis(700));
        assert!(ready.waited < Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_is_capped() {
        let stub = StubTransport::new(|i, _| {
            if i < 6 {
                StubReply::status(503)
            } else {
                StubReply::status(200)
            }
        });

        let ready = ReadinessProbe::default()
            .wait(&stub, "http://target", || Ok(()))
            .await
            .unwrap();

        // 100 + 200 + 400 + 800 + 1000 + 1000.
        assert_eq!(ready.attempts, 7);
        assert!(ready.waited >= Duration::from_millis(3500));
        assert!(ready.waited < Duration::from_millis(3550));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_startup_window() {
        let stub = StubTransport::new(|_, _| refused());
        let probe = ReadinessProbe::default().with_startup_timeout(Duration::from_secs(1));

        let err = probe
            .wait(&stub, "http://target", || Ok(()))
            .await
            .unwrap_err();

        match err {
            StartupError::Unhealthy {
                waited,
                attempts,
                last_error,
            } => {
                // Attempts at 0, 100, 300, 700 and 1000ms.
                assert_eq!(attempts, 5);
                assert!(waited >= Duration::from_secs(1));
                assert_eq!(last_error, "connect: connection refused");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dead_process_aborts_the_wait() {
        let stub = StubTransport::new(|_, _| refused());
        let mut checks = 0;

        let err = ReadinessProbe::default()
            .wait(&stub, "http://target", || {
                checks += 1;
                if checks > 2 {
                    Err(StartupError::Io(std::io::Error::other("gone")))
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StartupError::Io(_)));
        assert_eq!(stub.calls(), 2);
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let mut lifecycle = CommandLifecycle::new(
            CommandSpec::new("/nonexistent/surge-target-binary"),
            "http://127.0.0.1:1",
            ReadinessProbe::default(),
        );

        let err = lifecycle.start().await.unwrap_err();
        assert!(matches!(err, StartupError::Spawn { .. }));
        assert_eq!(lifecycle.pid(), None);

        // Nothing to stop, but stop must still be callable.
        lifecycle.stop().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn early_exit_is_a_distinct_error() {
        let mut lifecycle = CommandLifecycle::new(
            CommandSpec::new("sh").args(["-c", "exit 3"]),
            "http://127.0.0.1:1",
            ReadinessProbe::default().with_startup_timeout(Duration::from_secs(10)),
        );

        let err = lifecycle.start().await.unwrap_err();
        match err {
            StartupError::Exited(status) => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected error: {other}"),
        }
        lifecycle.stop().await;
        assert_eq!(lifecycle.pid(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_kills_a_running_process() {
        let mut lifecycle = CommandLifecycle::new(
            CommandSpec::new("sleep").args(["30"]),
            "http://127.0.0.1:1",
            ReadinessProbe::default().with_startup_timeout(Duration::from_millis(300)),
        );

        let err = lifecycle.start().await.unwrap_err();
        assert!(matches!(err, StartupError::Unhealthy { .. }));
        assert!(lifecycle.pid().is_some());

        lifecycle.stop().await;
        assert_eq!(lifecycle.pid(), None);
    }
}
