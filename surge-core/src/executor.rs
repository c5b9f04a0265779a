use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use surge_http::HttpTransportErrorKind;
use tokio::time::Instant;

use super::outcome::Outcome;
use super::target::Target;
use super::transport::{ProbeRequest, Transport, TransportError};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Issues exactly one timed request per call and classifies it. Never retries and never returns
/// an error: transport problems and timeouts become [`Outcome`] failures.
#[derive(Debug)]
pub struct RequestExecutor<T> {
    transport: Arc<T>,
    timeout: Duration,
}

impl<T> Clone for RequestExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            timeout: self.timeout,
        }
    }
}

impl<T: Transport> RequestExecutor<T> {
    pub fn new(transport: Arc<T>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub async fn execute(&self, target: &Target, body: Option<Bytes>) -> Outcome {
        let req = ProbeRequest {
            method: target.method.clone(),
            path: target.path.clone(),
            body,
            timeout: self.timeout,
        };

        let started = Instant::now();
        // The transport gets the timeout too, but the bound is enforced here regardless of how
        // the transport treats it.
        let res = tokio::time::timeout(self.timeout, self.transport.send(req)).await;
        let elapsed = started.elapsed();

        match res {
            Ok(Ok(res)) => Outcome::from_status(res.status, elapsed),
            Ok(Err(err)) => Outcome::transport_failure(err.to_string(), elapsed),
            Err(_) => Outcome::transport_failure(
                TransportError::new(
                    HttpTransportErrorKind::Timeout,
                    format!("no response within {:?}", self.timeout),
                )
                .to_string(),
                elapsed,
            ),
        }
    }
}
