//! # Communicator Builder
//!
//! Provides a fluent API for assembling a communicator from properties,
//! transports and an optional runtime handle.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::communicator::Communicator;
use crate::communicator::Instance;
use crate::error::Result;
use crate::loopback::Loopback;
use crate::properties::Properties;
use crate::transport::AsyncTransport;
use crate::transport::Transport;

#[derive(Default)]
pub struct CommunicatorBuilder {
    properties: Properties,
    transport: Option<Arc<dyn Transport>>,
    async_transport: Option<Arc<dyn AsyncTransport>>,
    runtime: Option<Handle>,
}

impl CommunicatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.set(key, value);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn async_transport(mut self, transport: Arc<dyn AsyncTransport>) -> Self {
        self.async_transport = Some(transport);
        self
    }

    /// Uses one loopback for both the blocking and the async engine.
    pub fn loopback(self, loopback: Arc<Loopback>) -> Self {
        self.transport(loopback.clone()).async_transport(loopback)
    }

    /// The runtime async calls are spawned on. Defaults to the caller's runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// # Errors
    /// Fails if a `Floe.*` property holds an invalid value or the default
    /// locator does not parse.
    pub fn build(self) -> Result<Communicator> {
        let instance = Instance::new(
            self.properties,
            self.transport,
            self.async_transport,
            self.runtime,
        )?;
        Ok(Communicator::from_instance(instance))
    }
}
