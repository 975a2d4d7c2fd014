//! # Communicator
//!
//! The explicit handle that owns every factory, the transports and the
//! default context. There is no process-wide instance; each `Communicator` is
//! independent.
//!
//! ## Lifecycle
//!
//! `Active -> DestroyInProgress -> Destroyed`, irreversibly.
//!
//! - The state flips under the lifecycle lock.
//! - Factories are torn down outside the lock, one at a time, so in-flight
//!   calls holding a factory never wait on `destroy`.
//! - Once `Destroyed`, every factory and transport accessor fails with
//!   `CommunicatorDestroyed`.
//! - `destroy` is idempotent: a second call returns `false` and does nothing.
//! - In debug builds, dropping the last handle to an instance that was never
//!   destroyed logs a warning.

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use floerpc::Context;
use floerpc::Identity;
use tokio::runtime::Handle;

use crate::builder::CommunicatorBuilder;
use crate::config::InstanceConfig;
use crate::endpoint::EndpointFactory;
use crate::error::Error;
use crate::error::Result;
use crate::factory::ReferenceFactory;
use crate::properties::Properties;
use crate::proxy::Proxy;
use crate::proxy_factory::ProxyFactory;
use crate::reference::InvocationMode;
use crate::reference::Location;
use crate::transport::AsyncTransport;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Active,
    DestroyInProgress,
    Destroyed,
}

#[derive(Clone)]
struct Factories {
    endpoint: Arc<EndpointFactory>,
    reference: Arc<ReferenceFactory>,
    proxy: Arc<ProxyFactory>,
}

struct Lifecycle {
    state: State,
    factories: Option<Factories>,
}

/// Shared state behind a communicator and every proxy it created.
pub struct Instance {
    properties: Properties,
    config: InstanceConfig,
    transport: Option<Arc<dyn Transport>>,
    async_transport: Option<Arc<dyn AsyncTransport>>,
    runtime: Option<Handle>,
    default_context: Mutex<Context>,
    lifecycle: Mutex<Lifecycle>,
}

impl Instance {
    pub(crate) fn new(
        properties: Properties,
        transport: Option<Arc<dyn Transport>>,
        async_transport: Option<Arc<dyn AsyncTransport>>,
        runtime: Option<Handle>,
    ) -> Result<Arc<Self>> {
        let config = InstanceConfig::from_properties(&properties)?;

        let endpoint = Arc::new(EndpointFactory::new(config.default_host.clone()));
        let reference = Arc::new(ReferenceFactory::new(&config, Arc::clone(&endpoint)));
        let proxy = Arc::new(ProxyFactory::new(config.retry.clone()));

        if let Some(locator) = &config.default_locator {
            reference.set_default_locator(reference.create_from_string(locator)?);
        }

        Ok(Arc::new(Self {
            properties,
            config,
            transport,
            async_transport,
            runtime,
            default_context: Mutex::new(Context::new()),
            lifecycle: Mutex::new(Lifecycle {
                state: State::Active,
                factories: Some(Factories {
                    endpoint,
                    reference,
                    proxy,
                }),
            }),
        }))
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn factories(&self) -> Result<Factories> {
        let lifecycle = self.lifecycle();
        match (&lifecycle.state, &lifecycle.factories) {
            (State::Destroyed, _) | (_, None) => Err(Error::CommunicatorDestroyed),
            (_, Some(factories)) => Ok(factories.clone()),
        }
    }

    fn check_alive(&self) -> Result<()> {
        if self.state() == State::Destroyed {
            return Err(Error::CommunicatorDestroyed);
        }
        Ok(())
    }

    pub fn state(&self) -> State {
        self.lifecycle().state
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    pub fn endpoint_factory(&self) -> Result<Arc<EndpointFactory>> {
        Ok(self.factories()?.endpoint)
    }

    pub fn reference_factory(&self) -> Result<Arc<ReferenceFactory>> {
        Ok(self.factories()?.reference)
    }

    pub fn proxy_factory(&self) -> Result<Arc<ProxyFactory>> {
        Ok(self.factories()?.proxy)
    }

    pub fn transport(&self) -> Result<Arc<dyn Transport>> {
        self.check_alive()?;
        self.transport
            .clone()
            .ok_or_else(|| Error::FeatureNotSupported("no blocking transport configured".into()))
    }

    pub fn async_transport(&self) -> Result<Arc<dyn AsyncTransport>> {
        self.check_alive()?;
        self.async_transport
            .clone()
            .ok_or_else(|| Error::FeatureNotSupported("no async transport configured".into()))
    }

    /// The runtime async calls are driven on: the configured handle, else the
    /// runtime of the calling task.
    pub fn runtime(&self) -> Result<Handle> {
        self.runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or_else(|| Error::FeatureNotSupported("no tokio runtime available".into()))
    }

    /// A copy of the default context.
    pub fn default_context(&self) -> Context {
        self.default_context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_default_context(&self, context: &Context) {
        *self
            .default_context
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = context.clone();
    }

    /// Returns `false` if destruction had already begun.
    pub fn destroy(&self) -> bool {
        let factories = {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state != State::Active {
                return false;
            }
            lifecycle.state = State::DestroyInProgress;
            lifecycle.factories.clone()
        };

        if let Some(factories) = factories {
            factories.proxy.destroy();
            factories.reference.destroy();
            factories.endpoint.destroy();
        }

        let mut lifecycle = self.lifecycle();
        lifecycle.factories = None;
        lifecycle.state = State::Destroyed;
        drop(lifecycle);

        tracing::debug!("communicator destroyed");
        true
    }
}

#[cfg(debug_assertions)]
impl Drop for Instance {
    fn drop(&mut self) {
        let state = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .state;
        if state != State::Destroyed {
            tracing::warn!(?state, "communicator dropped without destroy()");
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The application's handle to one instance.
#[derive(Debug, Clone)]
pub struct Communicator {
    instance: Arc<Instance>,
}

impl Communicator {
    pub fn builder() -> CommunicatorBuilder {
        CommunicatorBuilder::new()
    }

    pub(crate) fn from_instance(instance: Arc<Instance>) -> Self {
        Self { instance }
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Returns `false` if destruction had already begun.
    pub fn destroy(&self) -> bool {
        self.instance.destroy()
    }

    pub fn is_destroyed(&self) -> bool {
        self.instance.state() == State::Destroyed
    }

    pub fn properties(&self) -> &Properties {
        self.instance.properties()
    }

    pub fn string_to_proxy(&self, input: &str) -> Result<Option<Proxy>> {
        self.instance
            .proxy_factory()?
            .string_to_proxy(&self.instance, input)
    }

    pub fn proxy_to_string(&self, proxy: Option<&Proxy>) -> Result<String> {
        Ok(self.instance.proxy_factory()?.proxy_to_string(proxy))
    }

    pub fn property_to_proxy(&self, name: &str) -> Result<Option<Proxy>> {
        self.instance
            .proxy_factory()?
            .property_to_proxy(&self.instance, name)
    }

    /// A twoway proxy for `identity` at `location`, with this communicator's defaults.
    pub fn create_proxy(&self, identity: Identity, location: Location) -> Result<Proxy> {
        let reference = self.instance.reference_factory()?.create(
            identity,
            "",
            InvocationMode::Twoway,
            false,
            location,
        )?;
        self.instance
            .proxy_factory()?
            .reference_to_proxy(&self.instance, reference)
    }

    pub fn identity_to_string(&self, identity: &Identity) -> String {
        identity.to_string()
    }

    pub fn string_to_identity(&self, input: &str) -> Result<Identity> {
        Ok(Identity::parse(input)?)
    }

    pub fn default_context(&self) -> Context {
        self.instance.default_context()
    }

    pub fn set_default_context(&self, context: &Context) {
        self.instance.set_default_context(context);
    }
}
