//! Process-wide SDK instance
//!
//! `initialize` and `shutdown` are reference counted: only the first
//! initialize creates the agent and applies options, and only the matching
//! last shutdown tears it down. Before initialization, and after the final
//! shutdown, [`get_sdk`] hands out an SDK backed by the null agent.

use crate::sdk::Sdk;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracepath_core::config::DiagnosticsSettings;
use tracepath_core::{Agent, AgentError, MockAgent, NullAgent, SdkConfig};
use tracing::{debug, info, warn};

/// Outcome of [`initialize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    /// The agent failed to initialize; the null agent is used instead
    InitError = -1,
    Initialized = 0,
    /// Initialized, but the agent rejected some options
    InitializedWithWarning = 1,
    /// An earlier initialize is still in effect; options were not applied
    AlreadyInitialized = 2,
}

impl InitStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InitStatus::InitError => "init error",
            InitStatus::Initialized => "initialized",
            InitStatus::InitializedWithWarning => "initialized with warning",
            InitStatus::AlreadyInitialized => "already initialized",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitResult {
    pub status: InitStatus,
    /// Agent error or rejected options
    pub error: Option<String>,
}

impl InitResult {
    fn new(status: InitStatus, error: Option<String>) -> Self {
        Self { status, error }
    }

    /// Whether an SDK is available, possibly with warnings
    pub fn is_ok(&self) -> bool {
        self.status != InitStatus::InitError
    }
}

struct GlobalState {
    refcount: usize,
    sdk: Option<Sdk>,
    /// Whether the agent itself initialized and needs a shutdown
    agent_initialized: bool,
}

static GLOBAL: Lazy<Mutex<GlobalState>> = Lazy::new(|| {
    Mutex::new(GlobalState {
        refcount: 0,
        sdk: None,
        agent_initialized: false,
    })
});

static NULL_SDK: Lazy<Sdk> = Lazy::new(Sdk::null);

/// Initialize the process-wide SDK from configuration
pub fn initialize(config: &SdkConfig) -> InitResult {
    initialize_with_agent(
        agent_for(&config.sdk.agent),
        &config.sdk.options,
        config.diagnostics.clone(),
    )
}

/// Agent for a configured name, matched the way config validation matches it
fn agent_for(name: &str) -> Arc<dyn Agent> {
    match name.trim().to_lowercase().as_str() {
        "mock" => Arc::new(MockAgent::new()),
        _ => Arc::new(NullAgent::new()),
    }
}

/// Initialize the process-wide SDK with a caller-supplied agent
///
/// `agent` and `options` are ignored if an earlier initialize is still in
/// effect.
pub fn initialize_with_agent(
    agent: Arc<dyn Agent>,
    options: &[String],
    settings: DiagnosticsSettings,
) -> InitResult {
    let mut global = GLOBAL.lock();
    global.refcount += 1;
    if global.refcount > 1 {
        debug!(target: "tracepath", refcount = global.refcount, "SDK already initialized");
        return InitResult::new(InitStatus::AlreadyInitialized, None);
    }

    let result = match agent.initialize(options) {
        Ok(rejected) if rejected.is_empty() => {
            global.sdk = Some(Sdk::with_settings(agent, settings));
            global.agent_initialized = true;
            InitResult::new(InitStatus::Initialized, None)
        }
        Ok(rejected) => {
            let message = format!("Agent rejected options: {}", rejected.join(", "));
            warn!(target: "tracepath", "{}", message);
            global.sdk = Some(Sdk::with_settings(agent, settings));
            global.agent_initialized = true;
            InitResult::new(InitStatus::InitializedWithWarning, Some(message))
        }
        Err(err) => {
            warn!(target: "tracepath", error = %err, "agent initialization failed, using null agent");
            global.sdk = Some(Sdk::with_settings(Arc::new(NullAgent::new()), settings));
            global.agent_initialized = false;
            InitResult::new(InitStatus::InitError, Some(err.to_string()))
        }
    };

    info!(target: "tracepath", status = %result.status, "SDK initialized");
    result
}

/// Release one initialize
///
/// The last release shuts the agent down and reverts [`get_sdk`] to the null
/// agent. A release without a matching initialize is an error.
pub fn shutdown() -> Result<(), AgentError> {
    let mut global = GLOBAL.lock();
    if global.refcount == 0 {
        return Err(AgentError::NotInitialized);
    }
    global.refcount -= 1;
    if global.refcount > 0 {
        return Ok(());
    }

    let sdk = global.sdk.take();
    let agent_initialized = std::mem::replace(&mut global.agent_initialized, false);
    drop(global);

    if let Some(sdk) = sdk {
        info!(target: "tracepath", "SDK shutting down");
        if agent_initialized {
            sdk.agent().shutdown()?;
        }
    }
    Ok(())
}

/// The process-wide SDK, or a null-agent SDK if none is initialized
pub fn get_sdk() -> Sdk {
    GLOBAL
        .lock()
        .sdk
        .clone()
        .unwrap_or_else(|| NULL_SDK.clone())
}
