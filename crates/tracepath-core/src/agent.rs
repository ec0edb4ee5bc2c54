//! Agent capability interface
//!
//! The agent is the consumer of tracer lifecycle calls. Tracers drive it in
//! lock step with their own state machine. The engine never depends on what an
//! agent does with the calls, so the [`NullAgent`] and the strict
//! [`MockAgent`](crate::mock::MockAgent) are interchangeable.

use crate::diagnostics::{CallbackSlot, DiagnosticCallback};
use crate::kind::{TracerDetails, TracerUpdate};
use crate::tag::{IncomingTag, TagForm, TracerId};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use thiserror::Error;

/// Agent error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Agent is already initialized")]
    AlreadyInitialized,

    #[error("Agent is not initialized")]
    NotInitialized,
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Current state of the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Capturing data
    Active,
    /// Not capturing data right now, may resume later
    TemporarilyInactive,
    /// Will not capture data for the lifetime of the process
    PermanentlyInactive,
    /// Not initialized yet, or already shut down
    NotInitialized,
    /// State could not be determined
    Error,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentState::Active => "active",
            AgentState::TemporarilyInactive => "temporarily inactive",
            AgentState::PermanentlyInactive => "permanently inactive",
            AgentState::NotInitialized => "not initialized",
            AgentState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Consumer of tracer lifecycle calls
pub trait Agent: Send + Sync {
    /// Agent name
    fn name(&self) -> &str;

    /// Agent version, `-/-` if unknown
    fn version_string(&self) -> String;

    fn state(&self) -> AgentState;

    /// Whether an agent was found at all
    fn is_found(&self) -> bool;

    /// Whether the agent can serve this SDK version
    fn is_compatible(&self) -> bool;

    /// Initialize with `NAME=VALUE` options
    ///
    /// Returns the options the agent did not accept. Rejected options are
    /// warnings, not failures.
    fn initialize(&self, options: &[String]) -> AgentResult<Vec<String>>;

    fn shutdown(&self) -> AgentResult<()>;

    /// A tracer was created
    fn tracer_create(&self, id: TracerId, details: &TracerDetails);

    /// A kind-specific field was set
    fn tracer_update(&self, id: TracerId, update: &TracerUpdate);

    fn tracer_start(&self, id: TracerId);

    fn tracer_end(&self, id: TracerId);

    fn tracer_error(&self, id: TracerId, class: &str, message: &str);

    /// Outgoing tag of a started tracer; string tags are returned as ASCII
    fn tracer_get_outgoing_tag(&self, id: TracerId, form: TagForm) -> Vec<u8>;

    fn tracer_set_incoming_tag(&self, id: TracerId, tag: &IncomingTag);

    /// Replace the diagnostic callback
    fn set_logging_callback(&self, callback: Option<DiagnosticCallback>);

    fn logging_callback(&self) -> Option<DiagnosticCallback>;

    /// Get agent as Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Agent used when no real agent is available
///
/// Accepts every call and does nothing. Outgoing tags are empty.
#[derive(Debug, Default)]
pub struct NullAgent {
    callback: CallbackSlot,
}

impl NullAgent {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Agent for NullAgent {
    fn name(&self) -> &str {
        "null"
    }

    fn version_string(&self) -> String {
        "-/-".to_string()
    }

    fn state(&self) -> AgentState {
        AgentState::NotInitialized
    }

    fn is_found(&self) -> bool {
        false
    }

    fn is_compatible(&self) -> bool {
        false
    }

    fn initialize(&self, _options: &[String]) -> AgentResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn shutdown(&self) -> AgentResult<()> {
        Ok(())
    }

    fn tracer_create(&self, _id: TracerId, _details: &TracerDetails) {}

    fn tracer_update(&self, _id: TracerId, _update: &TracerUpdate) {}

    fn tracer_start(&self, _id: TracerId) {}

    fn tracer_end(&self, _id: TracerId) {}

    fn tracer_error(&self, _id: TracerId, _class: &str, _message: &str) {}

    fn tracer_get_outgoing_tag(&self, _id: TracerId, _form: TagForm) -> Vec<u8> {
        Vec::new()
    }

    fn tracer_set_incoming_tag(&self, _id: TracerId, _tag: &IncomingTag) {}

    fn set_logging_callback(&self, callback: Option<DiagnosticCallback>) {
        self.callback.set(callback);
    }

    fn logging_callback(&self) -> Option<DiagnosticCallback> {
        self.callback.get()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
