//! Tracepath SDK - instrument operations and correlate them across threads
//!
//! ```no_run
//! use tracepath_sdk::{get_sdk, initialize, shutdown, SdkConfig, TracerHandle};
//!
//! let result = initialize(&SdkConfig::default());
//! assert!(result.is_ok());
//!
//! let sdk = get_sdk();
//! let call = sdk
//!     .trace_incoming_remote_call("get", "OrderService", "orders:8080", Default::default())
//!     .unwrap();
//! call.trace(|_| Ok::<_, std::io::Error>(())).unwrap();
//!
//! shutdown().unwrap();
//! ```

pub mod init;
pub mod kv;
pub mod logging;
pub mod sdk;
pub mod tracers;

pub use init::{get_sdk, initialize, initialize_with_agent, shutdown, InitResult, InitStatus};
pub use kv::KeyValues;
pub use sdk::{IncomingRemoteCallOptions, IncomingTags, IncomingWebRequestOptions, Sdk};
pub use tracers::{
    CustomServiceTracer, DatabaseRequestTracer, Entrypoint, InProcessLinkTracer,
    IncomingMessageProcessTracer, IncomingMessageReceiveTracer, IncomingRemoteCallTracer,
    IncomingTaggable, IncomingWebRequestTracer, OutgoingMessageTracer, OutgoingRemoteCallTracer,
    OutgoingTaggable, OutgoingWebRequestTracer, TracerHandle,
};

// Types needed to call the SDK without depending on the core crate directly
pub use tracepath_core::kind::{database_vendor, messaging_vendor};
pub use tracepath_core::tag::{TAG_HTTP_HEADER_NAME, TAG_MESSAGE_PROPERTY_NAME};
pub use tracepath_core::{
    AgentState, AttributeValue, Channel, ChannelType, DatabaseInfo, DiagnosticCallback,
    InProcessLink, MessagingDestinationType, MessagingSystemInfo, ScopeError, SdkConfig,
    TracerError, TracerId, TracerKind, TracerResult, TracerState, WebApplicationInfo,
};
pub use tracepath_correlate::{ResolutionReport, TagResolver};

/// SDK version
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
