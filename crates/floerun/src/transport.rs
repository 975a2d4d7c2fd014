//! # Transport Abstraction
//!
//! The byte pipe the invocation engines talk through.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: A transport knows nothing about frames, identities or
//!   retries. It moves opaque buffers along a `Route`.
//! - **Two Disciplines**: `Transport` blocks the calling thread for the full
//!   send/receive cycle. `AsyncTransport` splits the cycle into a send that
//!   yields a `RequestTicket` and a receive that awaits the reply for it.
//! - **Honest Failures**: A transport reports whether the bytes could have
//!   reached the peer. `ConnectFailed` promises they did not; every other
//!   variant makes no such promise.

use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::reference::InvocationMode;

/// Errors raised by the byte pipe itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No connection could be established; nothing was sent.
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    /// No reply arrived within the reference's timeout.
    #[error("request timed out")]
    Timeout,
    /// The connection dropped after the request may have been sent.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("socket error: {0}")]
    Socket(String),
}

impl TransportError {
    /// True when the request is known not to have reached the peer.
    pub fn is_unsent(&self) -> bool {
        matches!(self, TransportError::ConnectFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Features a transport can honor. A reference asking for a feature the
/// active transport lacks fails validation before anything is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub secure: bool,
    pub compress: bool,
    pub timeouts: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            secure: true,
            compress: true,
            timeouts: true,
        }
    }
}

/// Where and how one attempt should be delivered.
///
/// Built fresh for every attempt: `endpoints` is already filtered and ordered
/// by the reference's selection policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub endpoints: Vec<Endpoint>,
    /// Set for indirect references. Empty for well-known objects.
    pub adapter_id: Option<String>,
    pub timeout: Option<Duration>,
    pub secure: bool,
    pub compress: bool,
    pub mode: InvocationMode,
}

/// Correlates an asynchronous send with its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTicket(pub u64);

/// A blocking byte pipe.
pub trait Transport: Send + Sync + 'static {
    fn capabilities(&self) -> Capabilities;

    /// Sends `frame` and blocks until the reply bytes arrive.
    fn send_receive(&self, route: &Route, frame: &[u8]) -> Result<Vec<u8>>;

    /// Sends `frame` and returns once the bytes are accepted.
    ///
    /// Failures after acceptance are the transport's to swallow.
    fn send(&self, route: &Route, frame: &[u8]) -> Result<()>;
}

/// A non-blocking byte pipe.
///
/// This trait is designed to be object-safe (`Arc<dyn AsyncTransport>`).
#[async_trait::async_trait]
pub trait AsyncTransport: Send + Sync + 'static {
    fn capabilities(&self) -> Capabilities;

    /// Sends `frame`. Completes once the transport has accepted the bytes.
    ///
    /// When `expect_reply` is false the returned ticket is never received on.
    async fn send(&self, route: &Route, frame: Vec<u8>, expect_reply: bool) -> Result<RequestTicket>;

    /// Awaits the reply for `ticket`.
    async fn receive(&self, ticket: RequestTicket) -> Result<Vec<u8>>;

    /// Advisory: the caller no longer wants the reply for `ticket`.
    fn abandon(&self, ticket: RequestTicket);
}
