//! Process-wide initialize and shutdown
//!
//! The SDK instance is global, so the whole lifecycle runs in one test.

use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tracepath_core::config::{ConfigLoader, DiagnosticsSettings};
use tracepath_core::{Agent, MockAgent};
use tracepath_sdk::{
    get_sdk, initialize, initialize_with_agent, shutdown, AgentState, InitStatus, TracerHandle,
};

#[test]
fn refcounted_lifecycle() {
    // Nothing initialized yet: a null-agent SDK that still builds paths
    assert!(shutdown().is_err());
    let sdk = get_sdk();
    assert_eq!(sdk.agent().name(), "null");
    let t = sdk.trace_custom_service("m", "s").unwrap();
    t.start().unwrap();
    t.end().unwrap();
    assert!(sdk.completed_paths().is_empty());

    // Options rejected by the agent are a warning
    let agent = Arc::new(MockAgent::new().rejecting_option("loglevelsdk"));
    let result = initialize_with_agent(
        agent.clone(),
        &["loglevelsdk=finest".to_string(), "tenant=demo".to_string()],
        DiagnosticsSettings::default(),
    );
    assert_eq!(result.status, InitStatus::InitializedWithWarning);
    assert_eq!(result.status.code(), 1);
    assert!(result.error.unwrap().contains("loglevelsdk=finest"));
    assert_eq!(get_sdk().agent_state(), AgentState::Active);

    // Second initialize only bumps the count
    let again = initialize_with_agent(
        Arc::new(MockAgent::new()),
        &[],
        DiagnosticsSettings::default(),
    );
    assert_eq!(again.status, InitStatus::AlreadyInitialized);
    assert_eq!(get_sdk().agent_version_string(), agent.version_string());

    shutdown().unwrap();
    assert_eq!(agent.state(), AgentState::Active);
    shutdown().unwrap();
    assert_eq!(agent.state(), AgentState::NotInitialized);
    assert_eq!(get_sdk().agent().name(), "null");

    // A failing agent is replaced by the null agent
    let broken = Arc::new(MockAgent::new().failing_initialize("no license"));
    let result = initialize_with_agent(broken, &[], DiagnosticsSettings::default());
    assert_eq!(result.status, InitStatus::InitError);
    assert!(!result.is_ok());
    assert!(result.error.unwrap().contains("no license"));
    assert_eq!(get_sdk().agent().name(), "null");
    shutdown().unwrap();

    // Config-driven initialize
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[sdk]\nagent = \"Mock\"\noptions = [\"tenant=demo\"]\n\n[diagnostics]\nleak_warnings = false\n",
    )
    .unwrap();
    let config = ConfigLoader::new().load_from_file(&path).unwrap();
    let result = initialize(&config);
    assert_eq!(result.status, InitStatus::Initialized);
    assert!(result.is_ok());

    let sdk = get_sdk();
    assert_eq!(sdk.agent().name(), "mock");
    assert!(!sdk.session().settings().leak_warnings);
    shutdown().unwrap();
    assert!(shutdown().is_err());
}
