//! Tracepath Core - tracers, paths, tags and the agent interface
//!
//! This crate provides the correlation engine behind the tracepath SDK:
//!
//! - **Tracers**: handles on traced operations with a strict
//!   Created → Started → Ended lifecycle and thread affinity
//! - **Paths**: per-thread stacks of started tracers that build call trees
//! - **Tags**: transport encodings of tracer identity for cross-thread and
//!   cross-process stitching
//! - **Agents**: the consumer of tracer lifecycle calls

pub mod agent;
pub mod archive;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod kind;
pub mod metrics;
pub mod mock;
pub mod node;
pub mod path;
pub mod session;
pub mod tag;
pub mod tracer;

// Re-export commonly used types
pub use agent::{Agent, AgentError, AgentResult, AgentState, NullAgent};
pub use archive::PathArchive;
pub use config::{ConfigError, ConfigLoader, ConfigResult, SdkConfig};
pub use diagnostics::DiagnosticCallback;
pub use error::{TracerError, TracerResult};
pub use kind::{
    AttributeValue, Capability, Channel, ChannelType, DatabaseInfo, MessagingDestinationType,
    MessagingSystemInfo, TracerDetails, TracerKind, TracerUpdate, WebApplicationInfo,
};
pub use metrics::{SharedMetrics, TracerMetrics};
pub use mock::MockAgent;
pub use node::{ErrorInfo, LinkKind, NodeSnapshot, TracerNode, TracerState};
pub use session::{Session, SessionId};
pub use tag::{EncodedTag, InProcessLink, IncomingTag, TagForm, TracerId};
pub use tracer::{ScopeError, Tracer};

/// SDK version
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
