//! # FloeRPC
//!
//! The wire layer of the Floe object protocol.
//!
//! ## Architecture
//!
//! Everything here is transport-agnostic and synchronous: `OutputStream` and
//! `InputStream` encode the primitive types over `floepack::Buffer`, and
//! `frame` builds and parses the request and reply envelopes on top of them.
//! Nothing in this crate retries, blocks or allocates threads.
//!
//! ## Wire Constants
//!
//! Every frame begins with `MAGIC`, then protocol `1.0`, then encoding `1.0`.

use std::collections::BTreeMap;

mod error;
mod frame;
mod identity;
mod stream;
pub mod strings;


pub use error::Error;
pub use error::Result;
pub use frame::encapsulate;
pub use frame::OperationMode;
pub use frame::ReplyFrame;
pub use frame::ReplyPayload;
pub use frame::ReplyStatus;
pub use frame::RequestEncoder;
pub use frame::RequestFrame;
pub use frame::WireLocation;
pub use identity::Identity;
pub use stream::Encaps;
pub use stream::InputStream;
pub use stream::OutputStream;

/// Per-request key/value metadata. Ordered so encoding is deterministic.
pub type Context = BTreeMap<String, String>;

pub const MAGIC: [u8; 4] = [0x49, 0x63, 0x65, 0x50];
pub const PROTOCOL_MAJOR: u8 = 1;
pub const PROTOCOL_MINOR: u8 = 0;
pub const ENCODING_MAJOR: u8 = 1;
pub const ENCODING_MINOR: u8 = 0;

/// `[size:i32][major][minor]`
pub const ENCAPS_HEADER_SIZE: usize = 6;

/// `[magic:4][versions:4][size:i32][status:1]`
pub const REPLY_HEADER_SIZE: usize = 13;
