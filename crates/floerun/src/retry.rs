//! # Retry Classification
//!
//! Decides whether a failed attempt may be repeated. Both invocation engines
//! call this and nothing else to make that decision.
//!
//! | Failure | Retried |
//! |---------|---------|
//! | connect failure (nothing sent) | always |
//! | timeout | always |
//! | lost connection, socket error | only for `Nonmutating` and `Idempotent` |
//! | `ObjectNotExist` | always (the object may have moved) |
//! | anything else | never |

use floerpc::OperationMode;

use crate::error::Error;
use crate::transport::TransportError;

pub fn is_retryable(error: &Error, mode: OperationMode) -> bool {
    match error {
        Error::Transport(e) if e.is_unsent() => true,
        Error::Transport(TransportError::Timeout) => true,
        Error::Transport(_) => mode.is_idempotent(),
        Error::ObjectNotExist { .. } => true,
        _ => false,
    }
}
