//! In-process [`Transport`] doubles for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use surge_http::HttpTransportErrorKind;

use crate::transport::{ProbeRequest, ProbeResponse, Transport, TransportError};

#[derive(Debug, Clone)]
pub(crate) struct StubReply {
    pub(crate) delay: Duration,
    pub(crate) result: Result<u16, TransportError>,
}

impl StubReply {
    pub(crate) fn status(status: u16) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(status),
        }
    }

    pub(crate) fn error(kind: HttpTransportErrorKind, message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(TransportError::new(kind, message)),
        }
    }

    pub(crate) fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type ReplyFn = dyn Fn(u64, &ProbeRequest) -> StubReply + Send + Sync;

/// Answers each probe from a closure that sees the global call index (0-based) and the request.
pub(crate) struct StubTransport {
    reply: Box<ReplyFn>,
    calls: AtomicU64,
    seen: Mutex<Vec<ProbeRequest>>,
}

impl StubTransport {
    pub(crate) fn new(
        reply: impl Fn(u64, &ProbeRequest) -> StubReply + Send + Sync + 'static,
    ) -> Self {
        Self {
            reply: Box::new(reply),
            calls: AtomicU64::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn always_ok() -> Self {
        Self::new(|_, _| StubReply::status(200))
    }

    pub(crate) fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub(crate) fn requests(&self) -> Vec<ProbeRequest> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Transport for StubTransport {
    async fn send(&self, req: ProbeRequest) -> Result<ProbeResponse, TransportError> {
        let idx = self.calls.fetch_add(1, Ordering::Relaxed);
        let reply = (self.reply)(idx, &req);
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(req);

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result.map(|status| ProbeResponse { status })
    }
}
