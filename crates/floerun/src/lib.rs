//! # FloeRun
//!
//! The client core of the Floe object protocol: references, proxies and the
//! engines that carry invocations over a transport.
//!
//! ## Architecture
//!
//! - `Communicator` owns an `Instance`, which owns the endpoint, reference
//!   and proxy factories plus the transports.
//! - `Reference` is an immutable value; `Proxy` binds one to an instance.
//! - Invocations run either on the calling thread (`Proxy::invoke`) or as a
//!   state machine on a tokio task (`Proxy::begin_invoke`, `invoke_async`).
//!   Both produce byte-identical frames and share one retry decision.
//! - `Transport` and `AsyncTransport` are opaque byte pipes. `Loopback` is the
//!   in-process implementation.

pub mod builder;
pub mod cache;
pub mod communicator;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod factory;
pub mod invocation;
pub mod loopback;
pub mod properties;
pub mod proxy;
pub mod proxy_factory;
pub mod reference;
pub mod retry;
mod syntax;
pub mod transport;


pub use builder::CommunicatorBuilder;
pub use communicator::Communicator;
pub use error::Error;
pub use error::Result;
pub use invocation::AsyncCall;
pub use invocation::Callbacks;
pub use invocation::Phase;
pub use invocation::Reply;
pub use loopback::Loopback;
pub use properties::Properties;
pub use proxy::Proxy;
pub use reference::InvocationMode;
pub use reference::Location;
pub use reference::Reference;
