//! # Blocking Invocation
//!
//! Runs a call to completion on the calling thread.
//!
//! ## Cycle
//! 1. Validate once: twoway or oneway only, and every feature the reference
//!    asks for must be offered by the transport.
//! 2. Per attempt: route, re-encode into the same buffer, send.
//! 3. Twoway calls block for the reply and decode it. Oneway calls return as
//!    soon as the transport accepts the bytes.
//! 4. On failure the proxy factory decides: sleep and retry, or surface.

use std::sync::Arc;

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
use crate::reference::InvocationMode;
use crate::transport::Transport;

pub(crate) struct BlockingInvocation<'a> {
    proxy: &'a Proxy,
    request: Request<'a>,
    out: OutputStream,
    attempt: usize,
}

impl<'a> BlockingInvocation<'a> {
    pub fn new(proxy: &'a Proxy, request: Request<'a>) -> Self {
        Self {
            proxy,
            request,
            out: OutputStream::new(),
            attempt: 0,
        }
    }

    pub fn invoke(mut self) -> Result<Reply> {
        let instance = Arc::clone(self.proxy.instance());
        let transport = instance.transport()?;
        self.validate(transport.as_ref())?;

        loop {
            self.attempt += 1;
            let error = match self.attempt_once(transport.as_ref()) {
                Ok(reply) => return Ok(reply),
                Err(error) => error,
            };
            let delay = instance
                .proxy_factory()?
                .check_retry(error, self.request.mode, self.attempt)?;
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }
    }

    fn validate(&self, transport: &dyn Transport) -> Result<()> {
        let reference = self.proxy.reference();
        match reference.mode() {
            InvocationMode::Twoway | InvocationMode::Oneway => {}
            other => {
                return Err(Error::FeatureNotSupported(format!(
                    "{:?} invocations on a blocking call",
                    other
                )));
            }
        }
        check_capabilities(reference, transport.capabilities())
    }

    fn attempt_once(&mut self, transport: &dyn Transport) -> Result<Reply> {
        let reference = self.proxy.reference();
        let route = route(reference)?;

        self.out.reset();
        encode(&mut self.out, self.proxy.instance(), reference, &self.request)?;
        let frame = self.out.as_bytes();
        tracing::debug!(
            operation = self.request.operation,
            attempt = self.attempt,
            bytes = frame.len(),
            "sending request"
        );

        if reference.mode().expects_reply() {
            decode_reply(transport.send_receive(&route, frame)?)
        } else {
            transport.send(&route, frame)?;
            Ok(Reply::oneway())
        }
    }
}
