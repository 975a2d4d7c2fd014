//! # Reference Factory
//!
//! Builds references from fields, proxy strings and properties, applying the
//! communicator's defaults and interning the result.
//!
//! ## Proxy Strings
//!
//! ```text
//! identity [-f facet] [-t|-o|-O|-d|-D] [-s] [:endpoint]*
//! identity [-f facet] [-t|-o|-O|-d|-D] [-s] @ adapter-id
//! ```
//!
//! Tokens containing whitespace, `:` or `@` are wrapped in double quotes. An
//! identity with neither endpoints nor an adapter id names a well-known object.
//! An empty string, or a null identity, yields no reference.

use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use floerpc::Identity;
use floerpc::strings;

use crate::cache::ReferenceCache;
use crate::config::InstanceConfig;
use crate::endpoint::EndpointFactory;
use crate::error::Error;
use crate::error::Result;
use crate::properties::Properties;
use crate::reference::EndpointSelection;
use crate::reference::InvocationMode;
use crate::reference::Location;
use crate::reference::Reference;
use crate::reference::ReferenceData;
use crate::syntax::Scanner;
use crate::syntax::split_unquoted;

const STOP: &[char] = &[':', '@'];

/// Defaults stamped onto every reference this factory creates.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Defaults {
    endpoint_selection: EndpointSelection,
    prefer_secure: bool,
    collocation_optimized: bool,
    locator_cache_timeout: i32,
    thread_per_connection: bool,
}

#[derive(Debug)]
pub struct ReferenceFactory {
    defaults: Defaults,
    endpoints: Arc<EndpointFactory>,
    cache: ReferenceCache,
    default_locator: RwLock<Option<Reference>>,
    destroyed: AtomicBool,
}

impl ReferenceFactory {
    pub fn new(config: &InstanceConfig, endpoints: Arc<EndpointFactory>) -> Self {
        Self {
            defaults: Defaults {
                endpoint_selection: config.endpoint_selection,
                prefer_secure: config.prefer_secure,
                collocation_optimized: config.collocation_optimized,
                locator_cache_timeout: config.locator_cache_timeout,
                thread_per_connection: config.thread_per_connection,
            },
            endpoints,
            cache: ReferenceCache::new(),
            default_locator: RwLock::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    fn check(&self) -> Result<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(Error::CommunicatorDestroyed);
        }
        Ok(())
    }

    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    pub fn default_locator(&self) -> Option<Reference> {
        self.default_locator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sets the locator given to references created from now on.
    pub fn set_default_locator(&self, locator: Option<Reference>) {
        *self
            .default_locator
            .write()
            .unwrap_or_else(PoisonError::into_inner) = locator;
    }

    pub fn create(
        &self,
        identity: Identity,
        facet: impl Into<String>,
        mode: InvocationMode,
        secure: bool,
        location: Location,
    ) -> Result<Reference> {
        self.check()?;
        identity
            .validate()
            .map_err(|e| Error::proxy_parse(&identity.to_string(), e.to_string()))?;

        let mut data = ReferenceData::new(identity, location);
        data.facet = facet.into();
        data.mode = mode;
        data.secure = secure;
        data.endpoint_selection = self.defaults.endpoint_selection;
        data.prefer_secure = self.defaults.prefer_secure;
        data.collocation_optimized = self.defaults.collocation_optimized;
        data.locator_cache_timeout = self.defaults.locator_cache_timeout;
        data.thread_per_connection = self.defaults.thread_per_connection;
        data.locator = self.default_locator();
        Ok(self.cache.intern(data))
    }

    /// Parses a proxy string. Returns `None` for the null proxy.
    pub fn create_from_string(&self, input: &str) -> Result<Option<Reference>> {
        self.check()?;
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let fail = |reason: String| Error::proxy_parse(input, reason);
        let mut scanner = Scanner::new(trimmed);

        if matches!(scanner.peek(), Some(':') | Some('@')) {
            return Err(fail("missing identity".into()));
        }
        let raw = scanner.token(STOP).map_err(fail)?;
        let identity = Identity::parse(raw).map_err(|e| fail(e.to_string()))?;
        if identity.is_null() {
            return Ok(None);
        }

        let mut facet = String::new();
        let mut mode = InvocationMode::Twoway;
        let mut secure = false;
        loop {
            scanner.skip_whitespace();
            if matches!(scanner.peek(), None | Some(':') | Some('@')) {
                break;
            }
            let option = scanner.token(STOP).map_err(fail)?;
            match option {
                "-f" => {
                    scanner.skip_whitespace();
                    let arg = scanner.token(STOP).map_err(fail)?;
                    if arg.is_empty() {
                        return Err(fail("no argument for `-f`".into()));
                    }
                    facet = strings::unescape(arg).map_err(|e| fail(e.to_string()))?;
                }
                "-s" => secure = true,
                flag => {
                    mode = InvocationMode::from_flag(flag)
                        .ok_or_else(|| fail(format!("unknown option `{}`", flag)))?;
                }
            }
        }

        let location = match scanner.peek() {
            Some('@') => {
                scanner.advance();
                scanner.skip_whitespace();
                let raw = scanner.token(&[]).map_err(fail)?;
                scanner.skip_whitespace();
                if !scanner.at_end() {
                    return Err(fail("trailing characters after adapter id".into()));
                }
                let adapter_id = strings::unescape(raw).map_err(|e| fail(e.to_string()))?;
                if adapter_id.is_empty() {
                    return Err(fail("empty adapter id".into()));
                }
                Location::Indirect(adapter_id)
            }
            Some(':') => {
                scanner.advance();
                let mut endpoints = Vec::new();
                for part in split_unquoted(scanner.rest(), ':').map_err(fail)? {
                    if part.trim().is_empty() {
                        return Err(fail("empty endpoint".into()));
                    }
                    endpoints.push(self.endpoints.create(part)?);
                }
                Location::Direct(endpoints)
            }
            _ => Location::Indirect(String::new()),
        };

        self.create(identity, facet, mode, secure, location).map(Some)
    }

    /// Applies the per-reference keys under `prefix` to `base`.
    ///
    /// `<prefix>.Locator` is parsed as a proxy string and configured from
    /// `<prefix>.Locator.*` in turn. Unknown keys are logged and ignored.
    pub fn create_from_properties(
        &self,
        base: Reference,
        prefix: &str,
        props: &Properties,
    ) -> Result<Reference> {
        self.check()?;
        let lead = format!("{}.", prefix);
        let mut reference = base;

        for (key, value) in props.get_for_prefix(&lead) {
            let invalid = || Error::InvalidProperty {
                key: key.clone(),
                value: value.clone(),
            };
            let int = || value.trim().parse::<i32>().map_err(|_| invalid());

            match &key[lead.len()..] {
                "EndpointSelection" => {
                    let selection: EndpointSelection = value.parse().map_err(|_| invalid())?;
                    reference = reference.change_endpoint_selection(selection);
                }
                "ConnectionCached" => reference = reference.change_connection_cached(int()? > 0),
                "PreferSecure" => reference = reference.change_prefer_secure(int()? > 0),
                "LocatorCacheTimeout" => {
                    reference = reference.change_locator_cache_timeout(int()?)
                }
                "CollocationOptimized" => {
                    reference = reference.change_collocation_optimized(int()? > 0)
                }
                "ThreadPerConnection" => {
                    reference = reference.change_thread_per_connection(int()? > 0)
                }
                "Locator" => {
                    let locator = match self.create_from_string(&value)? {
                        Some(locator) => Some(self.create_from_properties(locator, &key, props)?),
                        None => None,
                    };
                    reference = reference.change_locator(locator);
                }
                suffix if suffix.starts_with("Locator.") => {}
                _ => tracing::warn!(property = %key, "unknown proxy property"),
            }
        }
        Ok(self.intern(reference))
    }

    pub fn intern(&self, reference: Reference) -> Reference {
        self.cache.intern_reference(reference)
    }

    /// Fails every later call with `CommunicatorDestroyed` and empties the cache.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.set_default_locator(None);
        self.cache.clear();
    }
}
