//! # Loopback Transport
//!
//! An in-process transport that hands every frame to a handler on the
//! caller's side and returns whatever bytes the handler produces.
//!
//! It implements both `Transport` and `AsyncTransport`, records every frame
//! and route it carried, and can hold async replies back until `release` so
//! races between replies and cancellation can be staged deterministically.
//!
//! ## Invariants
//! - Every `send` and `send_receive` runs the handler exactly once.
//! - A handler returning `ConnectFailed` fails the send itself. Any other
//!   handler failure is a reply-side failure.
//! - Abandoning a ticket drops its pending reply slot if nobody is receiving
//!   on it yet. A receiver already waiting still gets the late reply.

use std::fmt;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use floerpc::ReplyFrame;
use floerpc::RequestFrame;
use tokio::sync::oneshot;

use crate::transport;
use crate::transport::AsyncTransport;
use crate::transport::Capabilities;
use crate::transport::RequestTicket;
use crate::transport::Route;
use crate::transport::Transport;
use crate::transport::TransportError;

type Handler = Box<dyn Fn(&[u8]) -> transport::Result<Vec<u8>> + Send + Sync>;
type Outcome = transport::Result<Vec<u8>>;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Loopback {
    handler: Handler,
    capabilities: Capabilities,
    frames: Mutex<Vec<Vec<u8>>>,
    routes: Mutex<Vec<Route>>,
    sends: AtomicUsize,
    next_ticket: AtomicU64,
    pending: DashMap<RequestTicket, oneshot::Receiver<Outcome>>,
    holding: AtomicBool,
    held: Mutex<Vec<(oneshot::Sender<Outcome>, Outcome)>>,
    abandoned: Mutex<Vec<RequestTicket>>,
}

impl Loopback {
    /// A loopback offering every capability.
    pub fn new(handler: impl Fn(&[u8]) -> transport::Result<Vec<u8>> + Send + Sync + 'static) -> Self {
        Self::with_capabilities(Capabilities::all(), handler)
    }

    pub fn with_capabilities(
        capabilities: Capabilities,
        handler: impl Fn(&[u8]) -> transport::Result<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            capabilities,
            frames: Mutex::new(Vec::new()),
            routes: Mutex::new(Vec::new()),
            sends: AtomicUsize::new(0),
            next_ticket: AtomicU64::new(1),
            pending: DashMap::new(),
            holding: AtomicBool::new(false),
            held: Mutex::new(Vec::new()),
            abandoned: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with a successful reply carrying `body`.
    pub fn ok(body: &[u8]) -> floerpc::Result<Self> {
        let reply = ReplyFrame::ok(body)?.encode()?;
        Ok(Self::new(move |_| Ok(reply.clone())))
    }

    /// Decodes each request and encodes whatever reply `serve` builds for it.
    pub fn serve(
        serve: impl Fn(&RequestFrame) -> floerpc::Result<ReplyFrame> + Send + Sync + 'static,
    ) -> Self {
        Self::new(move |frame| {
            let request =
                RequestFrame::decode(frame).map_err(|e| TransportError::Socket(e.to_string()))?;
            serve(&request)
                .and_then(|reply| reply.encode())
                .map_err(|e| TransportError::Socket(e.to_string()))
        })
    }

    /// Holds back async replies until `release`.
    pub fn hold(&self) {
        self.holding.store(true, Ordering::Release);
    }

    /// Stops holding and delivers every held reply. Returns how many were held.
    pub fn release(&self) -> usize {
        self.holding.store(false, Ordering::Release);
        let held = std::mem::take(&mut *locked(&self.held));
        let count = held.len();
        for (tx, outcome) in held {
            // The receiver may have timed out in the meantime.
            let _ = tx.send(outcome);
        }
        count
    }

    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::Acquire)
    }

    /// Every frame carried so far, in order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        locked(&self.frames).clone()
    }

    /// Every frame carried so far, decoded.
    pub fn requests(&self) -> floerpc::Result<Vec<RequestFrame>> {
        locked(&self.frames)
            .iter()
            .map(|frame| RequestFrame::decode(frame))
            .collect()
    }

    pub fn routes(&self) -> Vec<Route> {
        locked(&self.routes).clone()
    }

    /// Replies sent or held that no receiver has claimed yet.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn abandoned_count(&self) -> usize {
        locked(&self.abandoned).len()
    }

    fn deliver(&self, route: &Route, frame: &[u8]) -> Outcome {
        self.sends.fetch_add(1, Ordering::AcqRel);
        locked(&self.frames).push(frame.to_vec());
        locked(&self.routes).push(route.clone());
        (self.handler)(frame)
    }
}

impl Transport for Loopback {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn send_receive(&self, route: &Route, frame: &[u8]) -> transport::Result<Vec<u8>> {
        self.deliver(route, frame)
    }

    fn send(&self, route: &Route, frame: &[u8]) -> transport::Result<()> {
        match self.deliver(route, frame) {
            Err(error) if error.is_unsent() => Err(error),
            Err(error) => {
                tracing::debug!(error = %error, "dropping oneway failure");
                Ok(())
            }
            Ok(_) => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl AsyncTransport for Loopback {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn send(
        &self,
        route: &Route,
        frame: Vec<u8>,
        expect_reply: bool,
    ) -> transport::Result<RequestTicket> {
        let outcome = match self.deliver(route, &frame) {
            Err(error) if error.is_unsent() => return Err(error),
            outcome => outcome,
        };

        let ticket = RequestTicket(self.next_ticket.fetch_add(1, Ordering::AcqRel));
        if !expect_reply {
            if let Err(error) = outcome {
                tracing::debug!(error = %error, "dropping oneway failure");
            }
            return Ok(ticket);
        }

        let (tx, rx) = oneshot::channel();
        self.pending.insert(ticket, rx);
        if self.holding.load(Ordering::Acquire) {
            locked(&self.held).push((tx, outcome));
        } else {
            let _ = tx.send(outcome);
        }
        Ok(ticket)
    }

    async fn receive(&self, ticket: RequestTicket) -> transport::Result<Vec<u8>> {
        let (_, rx) = self
            .pending
            .remove(&ticket)
            .ok_or_else(|| TransportError::ConnectionLost(format!("no reply pending for {:?}", ticket)))?;
        rx.await
            .map_err(|_| TransportError::ConnectionLost("reply channel closed".into()))?
    }

    fn abandon(&self, ticket: RequestTicket) {
        tracing::trace!(?ticket, "ticket abandoned");
        self.pending.remove(&ticket);
        locked(&self.abandoned).push(ticket);
    }
}

impl fmt::Debug for Loopback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loopback")
            .field("capabilities", &self.capabilities)
            .field("sends", &self.send_count())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
