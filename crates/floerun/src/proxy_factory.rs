//! # Proxy Factory
//!
//! Turns strings and properties into proxies, and owns the retry policy that
//! both invocation engines consult after a failed attempt.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use floerpc::OperationMode;

use crate::communicator::Instance;
use crate::config::RetryPolicy;
use crate::error::Error;
use crate::error::Result;
use crate::proxy::Proxy;
use crate::reference::Reference;
use crate::retry;

#[derive(Debug)]
pub struct ProxyFactory {
    retry: RetryPolicy,
    destroyed: AtomicBool,
}

impl ProxyFactory {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            destroyed: AtomicBool::new(false),
        }
    }

    fn check(&self) -> Result<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(Error::CommunicatorDestroyed);
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn string_to_proxy(&self, instance: &Arc<Instance>, input: &str) -> Result<Option<Proxy>> {
        self.check()?;
        let reference = instance.reference_factory()?.create_from_string(input)?;
        Ok(reference.map(|r| Proxy::new(r, Arc::clone(instance))))
    }

    /// The empty string for the null proxy.
    pub fn proxy_to_string(&self, proxy: Option<&Proxy>) -> String {
        proxy.map(ToString::to_string).unwrap_or_default()
    }

    /// Reads a proxy string from property `name`, then applies the
    /// per-reference keys under `name`.
    pub fn property_to_proxy(&self, instance: &Arc<Instance>, name: &str) -> Result<Option<Proxy>> {
        self.check()?;
        let props = instance.properties();
        let Some(value) = props.get(name) else {
            return Ok(None);
        };
        let factory = instance.reference_factory()?;
        let Some(reference) = factory.create_from_string(value)? else {
            return Ok(None);
        };
        let reference = factory.create_from_properties(reference, name, props)?;
        Ok(Some(Proxy::new(reference, Arc::clone(instance))))
    }

    pub fn reference_to_proxy(&self, instance: &Arc<Instance>, reference: Reference) -> Result<Proxy> {
        self.check()?;
        Ok(Proxy::new(reference, Arc::clone(instance)))
    }

    /// Consumes the failure of attempt number `attempt` (1-based).
    ///
    /// Returns the delay to wait before trying again, or the error to surface.
    pub fn check_retry(&self, error: Error, mode: OperationMode, attempt: usize) -> Result<Duration> {
        self.check()?;
        if !retry::is_retryable(&error, mode) {
            tracing::debug!(attempt, error = %error, "not retryable");
            return Err(error);
        }
        match self.retry.delay_after(attempt) {
            Some(delay) => {
                tracing::debug!(attempt, ?delay, error = %error, "retrying");
                Ok(delay)
            }
            None => {
                tracing::debug!(attempt, error = %error, "retry limit reached");
                Err(error)
            }
        }
    }

    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
    }
}
