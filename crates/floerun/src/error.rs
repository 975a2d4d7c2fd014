//! # Error Definitions
//!
//! Every failure an invocation can end in, grouped into the classes the retry
//! policy reasons about.
//!
//! ## Classes
//! - **Framing**: bad bytes on the wire. Fatal to the attempt, never retried.
//! - **RequestFailed**: the peer could not find the object, facet or operation.
//! - **Unknown**: opaque diagnostics from the peer. Always surfaced.
//! - **LocalTransport**: connect failure, timeout, lost connection.
//! - **Misuse**: the caller asked for something this proxy cannot do.
//! - **Lifecycle**: the communicator is gone or the call was canceled.

use floerpc::Identity;

use crate::transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Framing,
    RequestFailed,
    Unknown,
    LocalTransport,
    Misuse,
    Lifecycle,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("protocol error: {0}")]
    Protocol(#[from] floerpc::Error),

    #[error("object `{identity}` does not exist (facet `{facet}`, operation `{operation}`)")]
    ObjectNotExist {
        identity: Identity,
        facet: String,
        operation: String,
    },
    #[error("facet `{facet}` does not exist on `{identity}` (operation `{operation}`)")]
    FacetNotExist {
        identity: Identity,
        facet: String,
        operation: String,
    },
    #[error("operation `{operation}` does not exist on `{identity}` (facet `{facet}`)")]
    OperationNotExist {
        identity: Identity,
        facet: String,
        operation: String,
    },

    #[error("unknown exception: {0}")]
    UnknownException(String),
    #[error("unknown local exception: {0}")]
    UnknownLocalException(String),
    #[error("unknown user exception: {0}")]
    UnknownUserException(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// A twoway-only operation was invoked through a proxy that expects no reply.
    #[error("operation `{0}` requires a twoway proxy")]
    TwowayOnly(String),
    #[error("no suitable endpoint for `{0}`")]
    NoEndpoint(String),
    #[error("invalid proxy `{input}`: {reason}")]
    ProxyParse { input: String, reason: String },
    #[error("invalid endpoint `{input}`: {reason}")]
    EndpointParse { input: String, reason: String },
    #[error("invalid value `{value}` for property `{key}`")]
    InvalidProperty { key: String, value: String },

    #[error("communicator destroyed")]
    CommunicatorDestroyed,
    #[error("invocation canceled")]
    InvocationCanceled,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Protocol(_) => ErrorClass::Framing,
            Error::ObjectNotExist { .. }
            | Error::FacetNotExist { .. }
            | Error::OperationNotExist { .. } => ErrorClass::RequestFailed,
            Error::UnknownException(_)
            | Error::UnknownLocalException(_)
            | Error::UnknownUserException(_) => ErrorClass::Unknown,
            Error::Transport(_) => ErrorClass::LocalTransport,
            Error::FeatureNotSupported(_)
            | Error::TwowayOnly(_)
            | Error::NoEndpoint(_)
            | Error::ProxyParse { .. }
            | Error::EndpointParse { .. }
            | Error::InvalidProperty { .. } => ErrorClass::Misuse,
            Error::CommunicatorDestroyed | Error::InvocationCanceled => ErrorClass::Lifecycle,
        }
    }

    pub(crate) fn proxy_parse(input: &str, reason: impl Into<String>) -> Self {
        Error::ProxyParse {
            input: input.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn endpoint_parse(input: &str, reason: impl Into<String>) -> Self {
        Error::EndpointParse {
            input: input.to_owned(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
