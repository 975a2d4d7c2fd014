//! # Protocol Frames
//!
//! Request and reply envelopes.
//!
//! ## Request
//! `[magic:4][proto major][proto minor][enc major][enc minor][operation:string]`
//! `[identity][facet:string-seq][location][mode:1][context][encapsulation]`
//!
//! ## Reply
//! `[magic:4][proto major][proto minor][enc major][enc minor][total size:i32]`
//! `[status:1][encapsulation | request-failed payload | unknown string]`
//!
//! ## Invariants
//! - **Panic Safety**: All decoding paths return `Result`, never panicking on bad data.
//! - **Exact Size**: A reply whose size field disagrees with its length is rejected.

use crate::error::Error;
use crate::error::Result;
use crate::identity::Identity;
use crate::stream::InputStream;
use crate::stream::OutputStream;
use crate::Context;
use crate::ENCODING_MAJOR;
use crate::ENCODING_MINOR;
use crate::MAGIC;
use crate::PROTOCOL_MAJOR;
use crate::PROTOCOL_MINOR;
use crate::REPLY_HEADER_SIZE;

/// How an operation may be retried by the caller.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OperationMode {
    #[default]
    Normal = 0,
    /// Does not modify object state.
    Nonmutating = 1,
    /// May be executed more than once with the same effect.
    Idempotent = 2,
}

impl OperationMode {
    pub fn from_u8(b: u8) -> Result<Self> {
        match b {
            0 => Ok(OperationMode::Normal),
            1 => Ok(OperationMode::Nonmutating),
            2 => Ok(OperationMode::Idempotent),
            _ => Err(Error::UnknownOperationMode(b)),
        }
    }

    /// True for modes that allow re-execution after the request may have reached the peer.
    pub fn is_idempotent(self) -> bool {
        matches!(self, OperationMode::Nonmutating | OperationMode::Idempotent)
    }
}

/// The status byte of a reply.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyStatus {
    Ok = 0,
    UserException = 1,
    ObjectNotExist = 2,
    FacetNotExist = 3,
    OperationNotExist = 4,
    UnknownLocalException = 5,
    UnknownUserException = 6,
    UnknownException = 7,
}

impl ReplyStatus {
    pub fn from_u8(b: u8) -> Result<Self> {
        match b {
            0 => Ok(ReplyStatus::Ok),
            1 => Ok(ReplyStatus::UserException),
            2 => Ok(ReplyStatus::ObjectNotExist),
            3 => Ok(ReplyStatus::FacetNotExist),
            4 => Ok(ReplyStatus::OperationNotExist),
            5 => Ok(ReplyStatus::UnknownLocalException),
            6 => Ok(ReplyStatus::UnknownUserException),
            7 => Ok(ReplyStatus::UnknownException),
            _ => Err(Error::UnknownReplyStatus(b)),
        }
    }

    fn is_request_failed(self) -> bool {
        matches!(
            self,
            ReplyStatus::ObjectNotExist | ReplyStatus::FacetNotExist | ReplyStatus::OperationNotExist
        )
    }

    fn is_unknown(self) -> bool {
        matches!(
            self,
            ReplyStatus::UnknownLocalException
                | ReplyStatus::UnknownUserException
                | ReplyStatus::UnknownException
        )
    }
}

/// Where the target object lives, as carried in a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WireLocation {
    /// Stringified endpoints, in the order the caller chose.
    Direct(Vec<String>),
    /// An adapter id to be resolved by a location service. Empty for well-known objects.
    Indirect(String),
}

impl WireLocation {
    const DIRECT: u8 = 0;
    const INDIRECT: u8 = 1;

    pub fn write_to(&self, out: &mut OutputStream) -> Result<()> {
        match self {
            WireLocation::Direct(endpoints) => {
                out.write_byte(Self::DIRECT)?;
                out.write_string_seq(endpoints)
            }
            WireLocation::Indirect(adapter_id) => {
                out.write_byte(Self::INDIRECT)?;
                out.write_string(adapter_id)
            }
        }
    }

    pub fn read_from(input: &mut InputStream) -> Result<Self> {
        match input.read_byte()? {
            Self::DIRECT => Ok(WireLocation::Direct(input.read_string_seq()?)),
            Self::INDIRECT => Ok(WireLocation::Indirect(input.read_string()?)),
            tag => Err(Error::Malformed(format!("unknown location tag {}", tag))),
        }
    }
}

fn write_header(out: &mut OutputStream) -> Result<()> {
    out.write_bytes(&MAGIC)?;
    out.write_byte(PROTOCOL_MAJOR)?;
    out.write_byte(PROTOCOL_MINOR)?;
    out.write_byte(ENCODING_MAJOR)?;
    out.write_byte(ENCODING_MINOR)
}

fn read_header(input: &mut InputStream) -> Result<()> {
    let magic = input.read_bytes(4)?;
    if magic[..] != MAGIC[..] {
        let mut found = [0u8; 4];
        found.copy_from_slice(&magic);
        return Err(Error::BadMagic(found));
    }
    let (major, minor) = (input.read_byte()?, input.read_byte()?);
    if major != PROTOCOL_MAJOR || minor > PROTOCOL_MINOR {
        return Err(Error::UnsupportedProtocol { major, minor });
    }
    let (major, minor) = (input.read_byte()?, input.read_byte()?);
    if major != ENCODING_MAJOR || minor > ENCODING_MINOR {
        return Err(Error::UnsupportedEncoding { major, minor });
    }
    Ok(())
}

fn write_facet(out: &mut OutputStream, facet: &str) -> Result<()> {
    if facet.is_empty() {
        out.write_size(0)
    } else {
        out.write_size(1)?;
        out.write_string(facet)
    }
}

fn read_facet(input: &mut InputStream) -> Result<String> {
    let mut path = input.read_string_seq()?;
    match path.len() {
        0 => Ok(String::new()),
        1 => Ok(path.remove(0)),
        n => Err(Error::Malformed(format!("facet path of length {}", n))),
    }
}

/// Encodes an outbound request frame.
pub struct RequestEncoder<'a> {
    pub operation: &'a str,
    pub identity: &'a Identity,
    pub facet: &'a str,
    pub location: &'a WireLocation,
    pub mode: OperationMode,
    pub context: &'a Context,
    /// Encapsulation body; the header is written here.
    pub params: &'a [u8],
}

impl<'a> RequestEncoder<'a> {
    /// Encode this request into `out`, appending to whatever is already there.
    pub fn encode(&self, out: &mut OutputStream) -> Result<()> {
        write_header(out)?;
        out.write_string(self.operation)?;
        self.identity.write_to(out)?;
        write_facet(out, self.facet)?;
        self.location.write_to(out)?;
        out.write_byte(self.mode as u8)?;
        out.write_context(self.context)?;
        out.write_encaps(self.params)
    }
}

/// A fully decoded inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub operation: String,
    pub identity: Identity,
    pub facet: String,
    pub location: WireLocation,
    pub mode: OperationMode,
    pub context: Context,
    /// Encapsulation body.
    pub params: Vec<u8>,
}

impl RequestFrame {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut input = InputStream::new(bytes.to_vec());
        read_header(&mut input)?;
        let operation = input.read_string()?;
        let identity = Identity::read_from(&mut input)?;
        let facet = read_facet(&mut input)?;
        let location = WireLocation::read_from(&mut input)?;
        let mode = OperationMode::from_u8(input.read_byte()?)?;
        let context = input.read_context()?;
        let params = input.read_encaps()?;
        if input.remaining() != 0 {
            return Err(Error::Malformed(format!("{} trailing bytes after request", input.remaining())));
        }
        Ok(Self { operation, identity, facet, location, mode, context, params })
    }
}

/// The body of a reply, shaped by its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPayload {
    /// `Ok` and `UserException`: the raw encapsulation, header included.
    Encapsulation(Vec<u8>),
    /// `ObjectNotExist`, `FacetNotExist`, `OperationNotExist`.
    RequestFailed {
        identity: Identity,
        facet: String,
        operation: String,
    },
    /// The three unknown statuses: an opaque diagnostic.
    Unknown(String),
}

/// A reply envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame {
    pub status: ReplyStatus,
    pub payload: ReplyPayload,
}

impl ReplyFrame {
    /// A successful reply carrying `body` as its result encapsulation.
    pub fn ok(body: &[u8]) -> Result<Self> {
        Ok(Self {
            status: ReplyStatus::Ok,
            payload: ReplyPayload::Encapsulation(encapsulate(body)?),
        })
    }

    /// A user exception reply carrying `body` as the exception encapsulation.
    pub fn user_exception(body: &[u8]) -> Result<Self> {
        Ok(Self {
            status: ReplyStatus::UserException,
            payload: ReplyPayload::Encapsulation(encapsulate(body)?),
        })
    }

    /// A request-failed reply. `status` must be one of the three not-exist statuses.
    pub fn request_failed(
        status: ReplyStatus,
        identity: Identity,
        facet: impl Into<String>,
        operation: impl Into<String>,
    ) -> Result<Self> {
        if !status.is_request_failed() {
            return Err(Error::Malformed(format!("{:?} is not a request-failed status", status)));
        }
        Ok(Self {
            status,
            payload: ReplyPayload::RequestFailed {
                identity,
                facet: facet.into(),
                operation: operation.into(),
            },
        })
    }

    /// An unknown-exception reply. `status` must be one of the three unknown statuses.
    pub fn unknown(status: ReplyStatus, diagnostic: impl Into<String>) -> Result<Self> {
        if !status.is_unknown() {
            return Err(Error::Malformed(format!("{:?} is not an unknown status", status)));
        }
        Ok(Self {
            status,
            payload: ReplyPayload::Unknown(diagnostic.into()),
        })
    }

    /// Encode this reply into a complete frame, patching the total size.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = OutputStream::new();
        write_header(&mut out)?;
        let size_at = out.len();
        out.write_int(0)?;
        out.write_byte(self.status as u8)?;
        match &self.payload {
            ReplyPayload::Encapsulation(encaps) => out.write_bytes(encaps)?,
            ReplyPayload::RequestFailed { identity, facet, operation } => {
                identity.write_to(&mut out)?;
                write_facet(&mut out, facet)?;
                out.write_string(operation)?;
            }
            ReplyPayload::Unknown(diagnostic) => out.write_string(diagnostic)?,
        }
        let total = i32::try_from(out.len()).map_err(|_| Error::SizeMismatch {
            declared: out.len(),
            actual: i32::MAX as usize,
        })?;
        out.patch_int(size_at, total)?;
        out.to_bytes()
    }

    /// Decode a reply frame: magic, versions, size, status, then the payload.
    pub fn decode(bytes: Vec<u8>) -> Result<Self> {
        let actual = bytes.len();
        if actual < REPLY_HEADER_SIZE {
            return Err(Error::SizeMismatch { declared: REPLY_HEADER_SIZE, actual });
        }
        let mut input = InputStream::new(bytes);
        read_header(&mut input)?;

        let declared = input.read_int()?;
        if declared < 0 {
            return Err(Error::NegativeSize(declared));
        }
        if declared as usize != actual {
            return Err(Error::SizeMismatch { declared: declared as usize, actual });
        }

        let status = ReplyStatus::from_u8(input.read_byte()?)?;
        let payload = match status {
            ReplyStatus::Ok | ReplyStatus::UserException => {
                ReplyPayload::Encapsulation(input.skip_encaps()?)
            }
            ReplyStatus::ObjectNotExist
            | ReplyStatus::FacetNotExist
            | ReplyStatus::OperationNotExist => {
                let identity = Identity::read_from(&mut input)?;
                let facet = read_facet(&mut input)?;
                let operation = input.read_string()?;
                ReplyPayload::RequestFailed { identity, facet, operation }
            }
            ReplyStatus::UnknownLocalException
            | ReplyStatus::UnknownUserException
            | ReplyStatus::UnknownException => ReplyPayload::Unknown(input.read_string()?),
        };

        if input.remaining() != 0 {
            return Err(Error::Malformed(format!("{} trailing bytes after reply", input.remaining())));
        }
        Ok(Self { status, payload })
    }
}

/// Wraps `body` in an encapsulation header.
pub fn encapsulate(body: &[u8]) -> Result<Vec<u8>> {
    let mut out = OutputStream::with_capacity(body.len() + crate::ENCAPS_HEADER_SIZE);
    out.write_encaps(body)?;
    out.to_bytes()
}
