//! # Proxy
//!
//! The application's handle to one remote object.
//!
//! A proxy binds a `Reference` to the instance that created it. It never
//! changes after construction: every `with_*` call returns a proxy over a
//! new (interned) reference, or a clone of `self` when nothing changed.
//! Proxies own no transport resources.
//!
//! ## Invariants
//! - Equality and hashing look at the reference only. Two proxies over equal
//!   references are equal even when they came from different call paths.
//! - The pseudo-operations are ordinary invocations with fixed names in
//!   `Nonmutating` mode. They share the encoding and retry rules of every
//!   other call.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;
use std::time::Duration;

use floerpc::Context;
use floerpc::Identity;
use floerpc::InputStream;
use floerpc::OperationMode;
use floerpc::OutputStream;
use tokio::sync::oneshot;

use crate::communicator::Communicator;
use crate::communicator::Instance;
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::error::Result;
use crate::invocation;
use crate::invocation::AsyncCall;
use crate::invocation::BlockingInvocation;
use crate::invocation::Callbacks;
use crate::invocation::CancelOnDrop;
use crate::invocation::Reply;
use crate::invocation::Request;
use crate::reference::EndpointSelection;
use crate::reference::InvocationMode;
use crate::reference::Reference;

/// Wire names of the pseudo-operations every object answers.
pub mod ops {
    pub const IS_A: &str = "ice_isA";
    pub const PING: &str = "ice_ping";
    pub const IDS: &str = "ice_ids";
    pub const ID: &str = "ice_id";
}

#[derive(Clone)]
pub struct Proxy {
    reference: Reference,
    instance: Arc<Instance>,
}

impl Proxy {
    pub(crate) fn new(reference: Reference, instance: Arc<Instance>) -> Self {
        Self { reference, instance }
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    pub fn communicator(&self) -> Communicator {
        Communicator::from_instance(Arc::clone(&self.instance))
    }

    pub fn identity(&self) -> &Identity {
        self.reference.identity()
    }

    pub fn facet(&self) -> &str {
        self.reference.facet()
    }

    pub fn mode(&self) -> InvocationMode {
        self.reference.mode()
    }

    pub fn is_twoway(&self) -> bool {
        self.mode() == InvocationMode::Twoway
    }

    fn with_reference(&self, reference: Reference) -> Proxy {
        if reference.ptr_eq(&self.reference) {
            return self.clone();
        }
        // A destroyed instance has no cache; the proxy still works as a value.
        let reference = match self.instance.reference_factory() {
            Ok(factory) => factory.intern(reference),
            Err(_) => reference,
        };
        Proxy::new(reference, Arc::clone(&self.instance))
    }

    // ========================================================================
    // Fluent Changes
    // ========================================================================

    pub fn with_identity(&self, identity: Identity) -> Proxy {
        self.with_reference(self.reference.change_identity(identity))
    }

    pub fn with_facet(&self, facet: impl Into<String>) -> Proxy {
        self.with_reference(self.reference.change_facet(facet))
    }

    pub fn with_context(&self, context: Context) -> Proxy {
        self.with_reference(self.reference.change_context(context))
    }

    pub fn with_mode(&self, mode: InvocationMode) -> Proxy {
        self.with_reference(self.reference.change_mode(mode))
    }

    pub fn with_twoway(&self) -> Proxy {
        self.with_mode(InvocationMode::Twoway)
    }

    pub fn with_oneway(&self) -> Proxy {
        self.with_mode(InvocationMode::Oneway)
    }

    pub fn with_batch_oneway(&self) -> Proxy {
        self.with_mode(InvocationMode::BatchOneway)
    }

    pub fn with_datagram(&self) -> Proxy {
        self.with_mode(InvocationMode::Datagram)
    }

    pub fn with_batch_datagram(&self) -> Proxy {
        self.with_mode(InvocationMode::BatchDatagram)
    }

    pub fn with_secure(&self, secure: bool) -> Proxy {
        self.with_reference(self.reference.change_secure(secure))
    }

    pub fn with_compress(&self, compress: bool) -> Proxy {
        self.with_reference(self.reference.change_compress(compress))
    }

    pub fn with_timeout(&self, timeout: Option<Duration>) -> Proxy {
        self.with_reference(self.reference.change_timeout(timeout))
    }

    pub fn with_endpoints(&self, endpoints: Vec<Endpoint>) -> Proxy {
        self.with_reference(self.reference.change_endpoints(endpoints))
    }

    pub fn with_adapter_id(&self, adapter_id: impl Into<String>) -> Proxy {
        self.with_reference(self.reference.change_adapter_id(adapter_id))
    }

    pub fn with_endpoint_selection(&self, selection: EndpointSelection) -> Proxy {
        self.with_reference(self.reference.change_endpoint_selection(selection))
    }

    pub fn with_connection_cached(&self, cached: bool) -> Proxy {
        self.with_reference(self.reference.change_connection_cached(cached))
    }

    pub fn with_prefer_secure(&self, prefer_secure: bool) -> Proxy {
        self.with_reference(self.reference.change_prefer_secure(prefer_secure))
    }

    pub fn with_locator_cache_timeout(&self, seconds: i32) -> Proxy {
        self.with_reference(self.reference.change_locator_cache_timeout(seconds))
    }

    pub fn with_locator(&self, locator: Option<&Proxy>) -> Proxy {
        let locator = locator.map(|p| p.reference.clone());
        self.with_reference(self.reference.change_locator(locator))
    }

    pub fn with_collocation_optimized(&self, optimized: bool) -> Proxy {
        self.with_reference(self.reference.change_collocation_optimized(optimized))
    }

    pub fn with_thread_per_connection(&self, enabled: bool) -> Proxy {
        self.with_reference(self.reference.change_thread_per_connection(enabled))
    }

    // ========================================================================
    // Invocation
    // ========================================================================

    /// Invokes `operation` on the calling thread.
    ///
    /// `params` is the encapsulation body. An explicit `context` replaces the
    /// merged default and per-proxy contexts.
    pub fn invoke(
        &self,
        operation: &str,
        mode: OperationMode,
        params: &[u8],
        context: Option<&Context>,
    ) -> Result<Reply> {
        let request = Request {
            operation,
            mode,
            params,
            context,
        };
        BlockingInvocation::new(self, request).invoke()
    }

    /// Starts `operation` without blocking. Exactly one side of `callbacks`
    /// runs, on the runtime's worker.
    ///
    /// # Errors
    /// Misuse (batch modes, unsupported features, no runtime or transport)
    /// fails here and no callback runs.
    pub fn begin_invoke(
        &self,
        operation: &str,
        mode: OperationMode,
        params: &[u8],
        context: Option<&Context>,
        callbacks: Callbacks,
    ) -> Result<AsyncCall> {
        invocation::begin(
            self,
            operation.to_owned(),
            mode,
            params.to_vec(),
            context.cloned(),
            callbacks,
        )
    }

    /// Awaits `operation` through the non-blocking engine. Dropping the future
    /// cancels the call.
    pub async fn invoke_async(
        &self,
        operation: &str,
        mode: OperationMode,
        params: &[u8],
        context: Option<&Context>,
    ) -> Result<Reply> {
        let (tx, rx) = oneshot::channel();
        let call = self.begin_invoke(
            operation,
            mode,
            params,
            context,
            Callbacks::from_fn(move |result| {
                let _ = tx.send(result);
            }),
        )?;
        let _cancel = CancelOnDrop(call);
        rx.await.map_err(|_| Error::InvocationCanceled)?
    }

    // ========================================================================
    // Pseudo-Operations
    // ========================================================================

    fn require_twoway(&self, operation: &str) -> Result<()> {
        if !self.is_twoway() {
            return Err(Error::TwowayOnly(operation.to_owned()));
        }
        Ok(())
    }

    pub fn is_a(&self, type_id: &str, context: Option<&Context>) -> Result<bool> {
        self.require_twoway(ops::IS_A)?;
        let params = string_param(type_id)?;
        let reply = self.invoke(ops::IS_A, OperationMode::Nonmutating, &params, context)?;
        results(ops::IS_A, reply)?.read_bool().map_err(Error::from)
    }

    /// Succeeds for oneway proxies as soon as the transport accepts the bytes.
    pub fn ping(&self, context: Option<&Context>) -> Result<()> {
        let reply = self.invoke(ops::PING, OperationMode::Nonmutating, &[], context)?;
        results(ops::PING, reply).map(drop)
    }

    pub fn ids(&self, context: Option<&Context>) -> Result<Vec<String>> {
        self.require_twoway(ops::IDS)?;
        let reply = self.invoke(ops::IDS, OperationMode::Nonmutating, &[], context)?;
        results(ops::IDS, reply)?.read_string_seq().map_err(Error::from)
    }

    pub fn id(&self, context: Option<&Context>) -> Result<String> {
        self.require_twoway(ops::ID)?;
        let reply = self.invoke(ops::ID, OperationMode::Nonmutating, &[], context)?;
        results(ops::ID, reply)?.read_string().map_err(Error::from)
    }

    pub async fn is_a_async(&self, type_id: &str, context: Option<&Context>) -> Result<bool> {
        self.require_twoway(ops::IS_A)?;
        let params = string_param(type_id)?;
        let reply = self
            .invoke_async(ops::IS_A, OperationMode::Nonmutating, &params, context)
            .await?;
        results(ops::IS_A, reply)?.read_bool().map_err(Error::from)
    }

    pub async fn ping_async(&self, context: Option<&Context>) -> Result<()> {
        let reply = self
            .invoke_async(ops::PING, OperationMode::Nonmutating, &[], context)
            .await?;
        results(ops::PING, reply).map(drop)
    }

    pub async fn ids_async(&self, context: Option<&Context>) -> Result<Vec<String>> {
        self.require_twoway(ops::IDS)?;
        let reply = self
            .invoke_async(ops::IDS, OperationMode::Nonmutating, &[], context)
            .await?;
        results(ops::IDS, reply)?.read_string_seq().map_err(Error::from)
    }

    pub async fn id_async(&self, context: Option<&Context>) -> Result<String> {
        self.require_twoway(ops::ID)?;
        let reply = self
            .invoke_async(ops::ID, OperationMode::Nonmutating, &[], context)
            .await?;
        results(ops::ID, reply)?.read_string().map_err(Error::from)
    }
}

fn string_param(value: &str) -> Result<Vec<u8>> {
    let mut out = OutputStream::new();
    out.write_string(value)?;
    Ok(out.to_bytes()?)
}

/// The pseudo-operations declare no user exceptions, so one in the reply is
/// reported as unknown.
fn results(operation: &str, reply: Reply) -> Result<InputStream> {
    if !reply.is_ok() {
        return Err(Error::UnknownUserException(format!(
            "{} raised an undeclared user exception",
            operation
        )));
    }
    Ok(InputStream::new(reply.body()?))
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Proxy {}

impl Hash for Proxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.reference, f)
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proxy({})", self.reference)
    }
}
