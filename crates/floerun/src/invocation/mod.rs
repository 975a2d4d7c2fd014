//! # Invocation
//!
//! What the blocking and non-blocking engines share: request encoding,
//! context merging, per-attempt routing, capability checks and reply
//! decoding. Both engines produce byte-identical frames for the same call.

use std::borrow::Cow;

use floerpc::Context;
use floerpc::ENCAPS_HEADER_SIZE;
use floerpc::ENCODING_MAJOR;
use floerpc::ENCODING_MINOR;
use floerpc::InputStream;
use floerpc::OperationMode;
use floerpc::OutputStream;
use floerpc::ReplyFrame;
use floerpc::ReplyPayload;
use floerpc::ReplyStatus;
use floerpc::RequestEncoder;
use floerpc::WireLocation;

use crate::communicator::Instance;
use crate::error::Error;
use crate::error::Result;
use crate::reference::Location;
use crate::reference::Reference;
use crate::transport::Capabilities;
use crate::transport::Route;

mod blocking;
mod nonblocking;

pub(crate) use blocking::BlockingInvocation;
pub(crate) use nonblocking::CancelOnDrop;
pub(crate) use nonblocking::begin;
pub use nonblocking::AsyncCall;
pub use nonblocking::Callbacks;
pub use nonblocking::Phase;

/// The outcome of a call that reached the peer and came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    ok: bool,
    encapsulation: Vec<u8>,
}

impl Reply {
    pub(crate) fn new(ok: bool, encapsulation: Vec<u8>) -> Self {
        Self { ok, encapsulation }
    }

    /// The reply of a call that expects none: success with an empty result.
    pub(crate) fn oneway() -> Self {
        let header = vec![ENCAPS_HEADER_SIZE as u8, 0, 0, 0, ENCODING_MAJOR, ENCODING_MINOR];
        Self::new(true, header)
    }

    /// `false` when the encapsulation carries a user exception.
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// The full encapsulation, header included.
    pub fn encapsulation(&self) -> &[u8] {
        &self.encapsulation
    }

    pub fn into_encapsulation(self) -> Vec<u8> {
        self.encapsulation
    }

    /// A reader positioned at the start of the encapsulation.
    pub fn input(&self) -> InputStream {
        InputStream::new(self.encapsulation.clone())
    }

    /// The encapsulation body, header stripped.
    pub fn body(&self) -> Result<Vec<u8>> {
        Ok(self.input().read_encaps()?)
    }
}

/// One logical call, as the caller described it.
pub(crate) struct Request<'a> {
    pub operation: &'a str,
    pub mode: OperationMode,
    pub params: &'a [u8],
    pub context: Option<&'a Context>,
}

/// An explicit context wins outright. Otherwise the reference's context is
/// laid over the communicator's default context.
pub(crate) fn merge_context<'a>(
    explicit: Option<&'a Context>,
    instance: &Instance,
    reference: &Reference,
) -> Cow<'a, Context> {
    match explicit {
        Some(context) => Cow::Borrowed(context),
        None => {
            let mut merged = instance.default_context();
            merged.extend(
                reference
                    .context()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
            Cow::Owned(merged)
        }
    }
}

/// The location as declared on the reference, independent of per-attempt ordering.
pub(crate) fn wire_location(reference: &Reference) -> WireLocation {
    match reference.location() {
        Location::Direct(endpoints) => {
            WireLocation::Direct(endpoints.iter().map(ToString::to_string).collect())
        }
        Location::Indirect(adapter_id) => WireLocation::Indirect(adapter_id.clone()),
    }
}

pub(crate) fn encode(
    out: &mut OutputStream,
    instance: &Instance,
    reference: &Reference,
    request: &Request<'_>,
) -> Result<()> {
    let context = merge_context(request.context, instance, reference);
    let location = wire_location(reference);
    RequestEncoder {
        operation: request.operation,
        identity: reference.identity(),
        facet: reference.facet(),
        location: &location,
        mode: request.mode,
        context: &*context,
        params: request.params,
    }
    .encode(out)?;
    Ok(())
}

/// Resolves where this attempt goes.
///
/// # Errors
/// `NoEndpoint` when a direct reference has no usable endpoint.
pub(crate) fn route(reference: &Reference) -> Result<Route> {
    let adapter_id = reference.adapter_id().map(str::to_owned);
    let endpoints = reference.resolve_endpoints();
    if adapter_id.is_none() && endpoints.is_empty() {
        return Err(Error::NoEndpoint(reference.to_string()));
    }
    Ok(Route {
        endpoints,
        adapter_id,
        timeout: reference.timeout(),
        secure: reference.secure(),
        compress: reference.compress(),
        mode: reference.mode(),
    })
}

pub(crate) fn check_capabilities(reference: &Reference, caps: Capabilities) -> Result<()> {
    if reference.secure() && !caps.secure {
        return Err(Error::FeatureNotSupported("secure invocations".into()));
    }
    if reference.compress() && !caps.compress {
        return Err(Error::FeatureNotSupported("compression".into()));
    }
    if reference.timeout().is_some() && !caps.timeouts {
        return Err(Error::FeatureNotSupported("invocation timeouts".into()));
    }
    Ok(())
}

/// Maps a reply frame onto the caller's outcome.
///
/// `Ok` and `UserException` both succeed; the caller inspects `Reply::is_ok`.
/// Every other status becomes the matching error.
pub(crate) fn decode_reply(bytes: Vec<u8>) -> Result<Reply> {
    let frame = ReplyFrame::decode(bytes)?;
    match (frame.status, frame.payload) {
        (ReplyStatus::Ok, ReplyPayload::Encapsulation(encaps)) => Ok(Reply::new(true, encaps)),
        (ReplyStatus::UserException, ReplyPayload::Encapsulation(encaps)) => {
            Ok(Reply::new(false, encaps))
        }
        (
            ReplyStatus::ObjectNotExist,
            ReplyPayload::RequestFailed { identity, facet, operation },
        ) => Err(Error::ObjectNotExist { identity, facet, operation }),
        (
            ReplyStatus::FacetNotExist,
            ReplyPayload::RequestFailed { identity, facet, operation },
        ) => Err(Error::FacetNotExist { identity, facet, operation }),
        (
            ReplyStatus::OperationNotExist,
            ReplyPayload::RequestFailed { identity, facet, operation },
        ) => Err(Error::OperationNotExist { identity, facet, operation }),
        (ReplyStatus::UnknownLocalException, ReplyPayload::Unknown(text)) => {
            Err(Error::UnknownLocalException(text))
        }
        (ReplyStatus::UnknownUserException, ReplyPayload::Unknown(text)) => {
            Err(Error::UnknownUserException(text))
        }
        (ReplyStatus::UnknownException, ReplyPayload::Unknown(text)) => {
            Err(Error::UnknownException(text))
        }
        (status, _) => Err(Error::Protocol(floerpc::Error::Malformed(format!(
            "payload does not match status {:?}",
            status
        )))),
    }
}
