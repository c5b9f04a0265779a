use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use surge_http::{HttpClient, HttpRequest, HttpTransportErrorKind};

/// One probe handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub method: http::Method,
    pub path: Arc<str>,
    /// JSON body, if any.
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
}

/// The request never produced a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: HttpTransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: HttpTransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<surge_http::Error> for TransportError {
    fn from(err: surge_http::Error) -> Self {
        Self {
            kind: err.transport_error_kind(),
            message: err.to_string(),
        }
    }
}

/// Plain request/response channel to the system under test.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        req: ProbeRequest,
    ) -> impl Future<Output = Result<ProbeResponse, TransportError>> + Send;
}

/// [`Transport`] over HTTP/1.1 against a fixed base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: HttpClient,
    base_url: Arc<str>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<Arc<str>>) -> Self {
        Self::with_client(HttpClient::default(), base_url)
    }

    pub fn with_client(client: HttpClient, base_url: impl Into<Arc<str>>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for HttpTransport {
    async fn send(&self, req: ProbeRequest) -> Result<ProbeResponse, TransportError> {
        let url = surge_http::join_url(&self.base_url, &req.path);
        let mut http_req = HttpRequest::new(req.method, url).with_timeout(req.timeout);
        if let Some(body) = req.body {
            http_req = http_req.with_body(body).with_json_content_type();
        }

        let res = self.client.request(http_req).await?;
        Ok(ProbeResponse { status: res.status })
    }
}
