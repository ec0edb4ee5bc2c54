//! Error types for tracer usage
//!
//! Every variant here is a programming mistake on the caller's side and is
//! returned synchronously. Conditions that cannot be raised into a live call
//! stack (leaked tracers, duplicate tag specification) go through the
//! diagnostic channel instead, see [`crate::diagnostics`].

use crate::kind::{Capability, TracerKind};
use crate::node::TracerState;
use std::thread::ThreadId;
use thiserror::Error;

/// Usage errors raised by tracer operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TracerError {
    /// Tracer touched from a thread other than the one that created it
    #[error("{tracer} was created on {owner:?}, but {caller:?} attempted an access")]
    ThreadAffinity {
        tracer: String,
        owner: ThreadId,
        caller: ThreadId,
    },

    /// Operation not allowed in the tracer's current state
    #[error("{tracer} has state {actual}, but needs {expected}")]
    InvalidState {
        tracer: String,
        actual: TracerState,
        expected: TracerState,
    },

    /// Entry field set after the tracer was started
    #[error("attempt to set entry field `{field}` on {tracer} too late")]
    EntryFieldTooLate { tracer: String, field: &'static str },

    /// Second error attached to the same tracer
    #[error("{tracer} is already marked as failed")]
    AlreadyFailed { tracer: String },

    /// Tracer ended while a directly nested child is still running
    #[error("ending tracer {tracer} that has un-ended children: {children:?}")]
    UnendedChildren { tracer: String, children: Vec<String> },

    /// Tracer ended while it is not the innermost active tracer
    #[error("attempt to end {tracer} while {active} was active")]
    OutOfOrderEnd { tracer: String, active: String },

    /// Non-entrypoint tracer started on a thread without an active path
    #[error("{tracer} cannot start a new path: no tracer is active on this thread")]
    NoActivePath { tracer: String },

    /// Capability not offered by this tracer kind
    #[error("{kind} tracer is not {capability}")]
    UnsupportedCapability {
        kind: TracerKind,
        capability: Capability,
    },

    /// Field not defined for this tracer kind
    #[error("{kind} tracer has no field `{field}`")]
    UnsupportedField {
        kind: TracerKind,
        field: &'static str,
    },

    /// Invalid argument passed to a constructor or setter
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
}

impl TracerError {
    /// Whether this error reports broken nesting of tracers on a path
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TracerError::UnendedChildren { .. }
                | TracerError::OutOfOrderEnd { .. }
                | TracerError::NoActivePath { .. }
        )
    }

    /// Whether this error reports a cross-thread access
    pub fn is_thread_affinity(&self) -> bool {
        matches!(self, TracerError::ThreadAffinity { .. })
    }

    /// Create an invalid argument error
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        TracerError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type for tracer operations
pub type TracerResult<T> = Result<T, TracerError>;

/// Reject strings that are empty or whitespace only
pub fn require_non_blank(name: &'static str, value: &str) -> TracerResult<()> {
    if value.trim().is_empty() {
        return Err(TracerError::invalid_argument(
            name,
            format!("expected non-empty string, but got {:?}", value),
        ));
    }
    Ok(())
}
