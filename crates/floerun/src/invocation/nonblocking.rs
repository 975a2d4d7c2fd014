//! # Non-Blocking Invocation
//!
//! The same wire contract as the blocking engine, driven as a state machine on
//! a tokio task. The caller gets an `AsyncCall` handle back immediately.
//!
//! ## States
//! `Idle -> Sending -> AwaitingReply -> Completing -> Succeeded | Failed`
//!
//! - Oneway and datagram calls go from `Sending` straight to `Completing`.
//! - A retry goes back to `Idle` and re-encodes into the same buffer.
//!
//! ## Invariants
//! - **Exactly Once**: The callbacks live in the call's state behind one lock
//!   and are taken out exactly once, by completion or by `cancel`.
//! - **Isolated Callbacks**: A panic inside a callback is caught and logged.
//! - **Late Replies**: A reply that arrives after `cancel` is still decoded,
//!   then dropped without a callback.
//! - **Released Buffers**: The encode buffer is freed on the terminal transition.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use floerpc::Context;
use floerpc::OperationMode;
use floerpc::OutputStream;

use crate::error::Error;
use crate::error::Result;
use crate::invocation::Reply;
use crate::invocation::Request;
use crate::invocation::check_capabilities;
use crate::invocation::decode_reply;
use crate::invocation::encode;
use crate::invocation::route;
use crate::proxy::Proxy;
use crate::transport::AsyncTransport;
use crate::transport::RequestTicket;
use crate::transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Sending,
    AwaitingReply,
    Completing,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }
}

type Completion = Box<dyn FnOnce(Result<Reply>) + Send>;

/// The terminal callbacks of one call. Exactly one side runs.
pub struct Callbacks {
    complete: Completion,
}

impl Callbacks {
    pub fn new(
        on_success: impl FnOnce(Reply) + Send + 'static,
        on_failure: impl FnOnce(Error) + Send + 'static,
    ) -> Self {
        Self::from_fn(move |result| match result {
            Ok(reply) => on_success(reply),
            Err(error) => on_failure(error),
        })
    }

    pub fn from_fn(complete: impl FnOnce(Result<Reply>) + Send + 'static) -> Self {
        Self {
            complete: Box::new(complete),
        }
    }

    fn run(self, result: Result<Reply>) {
        let complete = self.complete;
        if std::panic::catch_unwind(AssertUnwindSafe(move || complete(result))).is_err() {
            tracing::error!("completion callback panicked");
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callbacks")
    }
}

struct CallState {
    phase: Phase,
    attempt: usize,
    ticket: Option<RequestTicket>,
    callbacks: Option<Callbacks>,
    out: Option<OutputStream>,
    cancelled: bool,
}

struct Call {
    state: Mutex<CallState>,
    transport: Arc<dyn AsyncTransport>,
}

impl Call {
    fn lock(&self) -> MutexGuard<'_, CallState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Runs the callbacks with `result` unless someone already did.
    fn finish(&self, result: Result<Reply>) -> bool {
        let callbacks = {
            let mut state = self.lock();
            let Some(callbacks) = state.callbacks.take() else {
                return false;
            };
            state.phase = Phase::Completing;
            state.ticket = None;
            state.out = None;
            callbacks
        };

        let succeeded = result.is_ok();
        callbacks.run(result);
        self.lock().phase = if succeeded { Phase::Succeeded } else { Phase::Failed };
        true
    }

    fn cancel(&self) -> bool {
        let (callbacks, ticket) = {
            let mut state = self.lock();
            let Some(callbacks) = state.callbacks.take() else {
                return false;
            };
            state.cancelled = true;
            state.phase = Phase::Completing;
            state.out = None;
            (callbacks, state.ticket)
        };

        if let Some(ticket) = ticket {
            self.transport.abandon(ticket);
        }
        callbacks.run(Err(Error::InvocationCanceled));
        self.lock().phase = Phase::Failed;
        true
    }
}

/// Handle to a call in flight.
#[derive(Clone)]
pub struct AsyncCall {
    call: Arc<Call>,
}

impl AsyncCall {
    /// Fails the call with `InvocationCanceled` unless it already completed.
    ///
    /// Returns `false` if the callbacks had already run.
    pub fn cancel(&self) -> bool {
        self.call.cancel()
    }

    pub fn phase(&self) -> Phase {
        self.call.lock().phase
    }

    pub fn is_completed(&self) -> bool {
        self.phase().is_terminal()
    }

    /// Number of attempts started so far.
    pub fn attempts(&self) -> usize {
        self.call.lock().attempt
    }
}

impl fmt::Debug for AsyncCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.call.lock();
        f.debug_struct("AsyncCall")
            .field("phase", &state.phase)
            .field("attempt", &state.attempt)
            .finish()
    }
}

/// Cancels the wrapped call when dropped.
pub(crate) struct CancelOnDrop(pub AsyncCall);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Validates the call and spawns its driver. Misuse fails here, before any
/// callback could run.
pub(crate) fn begin(
    proxy: &Proxy,
    operation: String,
    mode: OperationMode,
    params: Vec<u8>,
    context: Option<Context>,
    callbacks: Callbacks,
) -> Result<AsyncCall> {
    let instance = proxy.instance();
    let transport = instance.async_transport()?;
    let runtime = instance.runtime()?;

    let reference = proxy.reference();
    if reference.mode().is_batch() {
        return Err(Error::FeatureNotSupported(format!(
            "{:?} invocations on an async call",
            reference.mode()
        )));
    }
    check_capabilities(reference, transport.capabilities())?;

    let call = Arc::new(Call {
        state: Mutex::new(CallState {
            phase: Phase::Idle,
            attempt: 0,
            ticket: None,
            callbacks: Some(callbacks),
            out: Some(OutputStream::new()),
            cancelled: false,
        }),
        transport,
    });

    let driver = Arc::clone(&call);
    let proxy = proxy.clone();
    runtime.spawn(async move {
        let request = Request {
            operation: &operation,
            mode,
            params: &params,
            context: context.as_ref(),
        };
        let result = drive(&driver, &proxy, &request).await;
        if driver.is_cancelled() {
            tracing::trace!(operation = %operation, "call finished after cancel");
            return;
        }
        driver.finish(result);
    });

    Ok(AsyncCall { call })
}

async fn drive(call: &Call, proxy: &Proxy, request: &Request<'_>) -> Result<Reply> {
    loop {
        let error = match attempt(call, proxy, request).await {
            Ok(reply) => return Ok(reply),
            Err(error) => error,
        };
        if call.is_cancelled() {
            return Err(Error::InvocationCanceled);
        }

        let attempts = call.lock().attempt;
        let delay = proxy
            .instance()
            .proxy_factory()?
            .check_retry(error, request.mode, attempts)?;
        call.lock().phase = Phase::Idle;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

async fn attempt(call: &Call, proxy: &Proxy, request: &Request<'_>) -> Result<Reply> {
    let reference = proxy.reference();
    let route = route(reference)?;

    let (attempt_number, frame) = {
        let mut state = call.lock();
        if state.cancelled {
            return Err(Error::InvocationCanceled);
        }
        state.attempt += 1;
        state.phase = Phase::Sending;
        let attempt_number = state.attempt;
        let out = state.out.get_or_insert_with(OutputStream::new);
        out.reset();
        encode(out, proxy.instance(), reference, request)?;
        (attempt_number, out.as_bytes().to_vec())
    };
    tracing::debug!(
        operation = request.operation,
        attempt = attempt_number,
        bytes = frame.len(),
        "sending request"
    );

    let expect_reply = reference.mode().expects_reply();
    let ticket = call.transport.send(&route, frame, expect_reply).await?;
    if !expect_reply {
        return Ok(Reply::oneway());
    }

    {
        let mut state = call.lock();
        if state.cancelled {
            drop(state);
            call.transport.abandon(ticket);
            return Err(Error::InvocationCanceled);
        }
        state.phase = Phase::AwaitingReply;
        state.ticket = Some(ticket);
    }

    let received = match route.timeout {
        Some(limit) => match tokio::time::timeout(limit, call.transport.receive(ticket)).await {
            Ok(received) => received,
            Err(_) => {
                call.transport.abandon(ticket);
                Err(TransportError::Timeout)
            }
        },
        None => call.transport.receive(ticket).await,
    };

    let cancelled = {
        let mut state = call.lock();
        state.ticket = None;
        state.cancelled
    };
    let decoded = decode_reply(received?);
    if cancelled {
        tracing::trace!(operation = request.operation, "discarding reply received after cancel");
        return Err(Error::InvocationCanceled);
    }
    decoded
}
