use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use super::error::Result;

/// Request method and path of a probe, relative to the target's base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub method: http::Method,
    pub path: Arc<str>,
}

impl Target {
    pub fn new(method: http::Method, path: impl Into<Arc<str>>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    pub fn get(path: impl Into<Arc<str>>) -> Self {
        Self::new(http::Method::GET, path)
    }

    pub fn post(path: impl Into<Arc<str>>) -> Self {
        Self::new(http::Method::POST, path)
    }

    /// The cheap probe endpoint (`GET /health`).
    #[must_use]
    pub fn health() -> Self {
        Self::get("/health")
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

pub type PayloadFn = Arc<dyn Fn(u64) -> Bytes + Send + Sync>;

/// JSON request body source. Bodies are encoded once up front and shared between workers.
#[derive(Clone, Default)]
pub enum Payload {
    #[default]
    Empty,

    Fixed(Bytes),

    /// Even request indices (within a worker) send `even`, odd indices send `odd`.
    Alternating { even: Bytes, odd: Bytes },

    /// Body computed from the request index within a worker.
    Generated(PayloadFn),
}

impl Payload {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::Fixed(Bytes::from(serde_json::to_vec(value)?)))
    }

    pub fn alternating_json<A, B>(even: &A, odd: &B) -> Result<Self>
    where
        A: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        Ok(Self::Alternating {
            even: Bytes::from(serde_json::to_vec(even)?),
            odd: Bytes::from(serde_json::to_vec(odd)?),
        })
    }

    pub fn generated(f: impl Fn(u64) -> Bytes + Send + Sync + 'static) -> Self {
        Self::Generated(Arc::new(f))
    }

    /// Body for the `index`-th request issued by one worker.
    #[must_use]
    pub fn for_request(&self, index: u64) -> Option<Bytes> {
        match self {
            Self::Empty => None,
            Self::Fixed(body) => Some(body.clone()),
            Self::Alternating { even, odd } => Some(if index % 2 == 0 {
                even.clone()
            } else {
                odd.clone()
            }),
            Self::Generated(f) => Some(f(index)),
        }
    }

    /// Size of the body sent for the first request, in bytes.
    #[must_use]
    pub fn first_len(&self) -> usize {
        self.for_request(0).map_or(0, |b| b.len())
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Fixed(body) => f.debug_tuple("Fixed").field(&body.len()).finish(),
            Self::Alternating { even, odd } => f
                .debug_struct("Alternating")
                .field("even", &even.len())
                .field("odd", &odd.len())
                .finish(),
            Self::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}
