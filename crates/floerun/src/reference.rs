//! # References
//!
//! An immutable description of how to reach and invoke one remote object.
//!
//! ## Invariants
//! - **Immutable**: A `Reference` never changes after construction. Every
//!   `change_*` returns a new value, sharing nothing mutable with the old one.
//! - **Same When Unchanged**: `change_*` with the current value returns a clone
//!   of the same `Arc`, observable through `ptr_eq`.
//! - **Structural Equality**: Equality and hashing cover every field, so two
//!   references built by different paths from the same fields are interchangeable.
//! - **One Location**: A reference is either direct (endpoints) or indirect
//!   (adapter id), never both. An empty endpoint list is stored as the
//!   well-known location `Indirect("")`, so every location prints uniquely.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use floerpc::Context;
use floerpc::Identity;
use floerpc::strings;
use rand::seq::SliceRandom;

use crate::endpoint::Endpoint;
use crate::syntax::quote_if_needed;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum InvocationMode {
    #[default]
    Twoway,
    Oneway,
    BatchOneway,
    Datagram,
    BatchDatagram,
}

impl InvocationMode {
    /// Only twoway calls wait for a reply.
    pub fn expects_reply(self) -> bool {
        self == InvocationMode::Twoway
    }

    pub fn is_batch(self) -> bool {
        matches!(self, InvocationMode::BatchOneway | InvocationMode::BatchDatagram)
    }

    pub fn is_datagram(self) -> bool {
        matches!(self, InvocationMode::Datagram | InvocationMode::BatchDatagram)
    }

    /// The proxy-string option selecting this mode.
    pub fn flag(self) -> &'static str {
        match self {
            InvocationMode::Twoway => "-t",
            InvocationMode::Oneway => "-o",
            InvocationMode::BatchOneway => "-O",
            InvocationMode::Datagram => "-d",
            InvocationMode::BatchDatagram => "-D",
        }
    }

    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "-t" => Some(InvocationMode::Twoway),
            "-o" => Some(InvocationMode::Oneway),
            "-O" => Some(InvocationMode::BatchOneway),
            "-d" => Some(InvocationMode::Datagram),
            "-D" => Some(InvocationMode::BatchDatagram),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EndpointSelection {
    #[default]
    Random,
    Ordered,
}

impl FromStr for EndpointSelection {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.trim() {
            "Random" => Ok(EndpointSelection::Random),
            "Ordered" => Ok(EndpointSelection::Ordered),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Direct(Vec<Endpoint>),
    /// Resolved by a location service. Empty for well-known objects.
    Indirect(String),
}

impl Location {
    /// `Direct([])` names no endpoint at all; it is the well-known location.
    fn normalize(&mut self) {
        if matches!(self, Location::Direct(endpoints) if endpoints.is_empty()) {
            *self = Location::Indirect(String::new());
        }
    }
}

/// The fields of a reference.
///
/// References are built by `ReferenceFactory::create`, which stamps the
/// communicator's configured defaults onto these fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceData {
    pub identity: Identity,
    pub facet: String,
    pub context: Context,
    pub mode: InvocationMode,
    pub secure: bool,
    pub compress: bool,
    pub timeout: Option<Duration>,
    pub location: Location,
    pub endpoint_selection: EndpointSelection,
    pub connection_cached: bool,
    pub prefer_secure: bool,
    pub locator_cache_timeout: i32,
    pub locator: Option<Reference>,
    pub collocation_optimized: bool,
    pub thread_per_connection: bool,
}

impl ReferenceData {
    /// A twoway reference with every optional field at its default.
    pub fn new(identity: Identity, mut location: Location) -> Self {
        location.normalize();
        Self {
            identity,
            facet: String::new(),
            context: Context::new(),
            mode: InvocationMode::Twoway,
            secure: false,
            compress: false,
            timeout: None,
            location,
            endpoint_selection: EndpointSelection::Random,
            connection_cached: true,
            prefer_secure: false,
            locator_cache_timeout: -1,
            locator: None,
            collocation_optimized: true,
            thread_per_connection: false,
        }
    }
}

#[derive(Clone)]
pub struct Reference {
    data: Arc<ReferenceData>,
}

impl Reference {
    pub(crate) fn new(mut data: ReferenceData) -> Self {
        data.location.normalize();
        Self { data: Arc::new(data) }
    }

    pub(crate) fn from_arc(data: Arc<ReferenceData>) -> Self {
        Self { data }
    }

    pub(crate) fn arc(&self) -> &Arc<ReferenceData> {
        &self.data
    }

    pub fn data(&self) -> &ReferenceData {
        &self.data
    }

    /// True when both handles share one allocation.
    pub fn ptr_eq(&self, other: &Reference) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn identity(&self) -> &Identity {
        &self.data.identity
    }

    pub fn facet(&self) -> &str {
        &self.data.facet
    }

    pub fn context(&self) -> &Context {
        &self.data.context
    }

    pub fn mode(&self) -> InvocationMode {
        self.data.mode
    }

    pub fn secure(&self) -> bool {
        self.data.secure
    }

    pub fn compress(&self) -> bool {
        self.data.compress
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.data.timeout
    }

    pub fn location(&self) -> &Location {
        &self.data.location
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        match &self.data.location {
            Location::Direct(endpoints) => endpoints,
            Location::Indirect(_) => &[],
        }
    }

    pub fn adapter_id(&self) -> Option<&str> {
        match &self.data.location {
            Location::Direct(_) => None,
            Location::Indirect(adapter_id) => Some(adapter_id),
        }
    }

    pub fn is_indirect(&self) -> bool {
        matches!(self.data.location, Location::Indirect(_))
    }

    pub fn is_well_known(&self) -> bool {
        matches!(&self.data.location, Location::Indirect(id) if id.is_empty())
    }

    pub fn endpoint_selection(&self) -> EndpointSelection {
        self.data.endpoint_selection
    }

    pub fn connection_cached(&self) -> bool {
        self.data.connection_cached
    }

    pub fn prefer_secure(&self) -> bool {
        self.data.prefer_secure
    }

    pub fn locator_cache_timeout(&self) -> i32 {
        self.data.locator_cache_timeout
    }

    pub fn locator(&self) -> Option<&Reference> {
        self.data.locator.as_ref()
    }

    pub fn collocation_optimized(&self) -> bool {
        self.data.collocation_optimized
    }

    pub fn thread_per_connection(&self) -> bool {
        self.data.thread_per_connection
    }

    fn with(&self, f: impl FnOnce(&mut ReferenceData)) -> Reference {
        let mut next = (*self.data).clone();
        f(&mut next);
        next.location.normalize();
        if next == *self.data {
            self.clone()
        } else {
            Reference::new(next)
        }
    }

    pub fn change_identity(&self, identity: Identity) -> Reference {
        self.with(|d| d.identity = identity)
    }

    pub fn change_facet(&self, facet: impl Into<String>) -> Reference {
        let facet = facet.into();
        self.with(|d| d.facet = facet)
    }

    pub fn change_context(&self, context: Context) -> Reference {
        self.with(|d| d.context = context)
    }

    pub fn change_mode(&self, mode: InvocationMode) -> Reference {
        self.with(|d| d.mode = mode)
    }

    pub fn change_secure(&self, secure: bool) -> Reference {
        self.with(|d| d.secure = secure)
    }

    pub fn change_compress(&self, compress: bool) -> Reference {
        self.with(|d| d.compress = compress)
    }

    pub fn change_timeout(&self, timeout: Option<Duration>) -> Reference {
        self.with(|d| d.timeout = timeout)
    }

    /// Makes the reference direct. An empty list makes it well-known.
    pub fn change_endpoints(&self, endpoints: Vec<Endpoint>) -> Reference {
        self.with(|d| d.location = Location::Direct(endpoints))
    }

    /// Makes the reference indirect.
    pub fn change_adapter_id(&self, adapter_id: impl Into<String>) -> Reference {
        let adapter_id = adapter_id.into();
        self.with(|d| d.location = Location::Indirect(adapter_id))
    }

    pub fn change_endpoint_selection(&self, selection: EndpointSelection) -> Reference {
        self.with(|d| d.endpoint_selection = selection)
    }

    pub fn change_connection_cached(&self, cached: bool) -> Reference {
        self.with(|d| d.connection_cached = cached)
    }

    pub fn change_prefer_secure(&self, prefer_secure: bool) -> Reference {
        self.with(|d| d.prefer_secure = prefer_secure)
    }

    pub fn change_locator_cache_timeout(&self, seconds: i32) -> Reference {
        self.with(|d| d.locator_cache_timeout = seconds)
    }

    pub fn change_locator(&self, locator: Option<Reference>) -> Reference {
        self.with(|d| d.locator = locator)
    }

    pub fn change_collocation_optimized(&self, optimized: bool) -> Reference {
        self.with(|d| d.collocation_optimized = optimized)
    }

    pub fn change_thread_per_connection(&self, enabled: bool) -> Reference {
        self.with(|d| d.thread_per_connection = enabled)
    }

    /// The endpoints one attempt should try, in order.
    ///
    /// Secure references keep only secure endpoints. `Random` shuffles,
    /// `Ordered` keeps the declared order. `prefer_secure` then moves secure
    /// endpoints to the front, keeping relative order within each group.
    pub fn resolve_endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> = self
            .endpoints()
            .iter()
            .filter(|e| !self.data.secure || e.is_secure())
            .cloned()
            .collect();

        if self.data.endpoint_selection == EndpointSelection::Random {
            endpoints.shuffle(&mut rand::thread_rng());
        }
        if self.data.prefer_secure {
            endpoints.sort_by_key(|e| !e.is_secure());
        }
        endpoints
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.data == other.data
    }
}

impl Eq for Reference {}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.hash(state);
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference({})", self)
    }
}

/// Prints the proxy string form: `identity [-f facet] mode [-s] [:endpoint]*`
/// or `identity ... @ adapter`.
impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = &self.data;
        write!(f, "{}", quote_if_needed(&data.identity.to_string()))?;
        if !data.facet.is_empty() {
            write!(f, " -f {}", quote_if_needed(&strings::escape(&data.facet, "")))?;
        }
        write!(f, " {}", data.mode.flag())?;
        if data.secure {
            write!(f, " -s")?;
        }
        match &data.location {
            Location::Direct(endpoints) => {
                for endpoint in endpoints {
                    write!(f, ":{}", endpoint)?;
                }
            }
            Location::Indirect(adapter_id) if adapter_id.is_empty() => {}
            Location::Indirect(adapter_id) => {
                write!(f, " @ {}", quote_if_needed(&strings::escape(adapter_id, "")))?;
            }
        }
        Ok(())
    }
}
