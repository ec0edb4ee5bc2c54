//! Sessions
//!
//! A session bundles one agent with the archive of paths completed against
//! it and its metrics. Thread-local paths are keyed by session id.

use crate::agent::Agent;
use crate::archive::PathArchive;
use crate::config::DiagnosticsSettings;
use crate::diagnostics;
use crate::error::{require_non_blank, TracerResult};
use crate::kind::{AttributeValue, TracerDetails};
use crate::metrics::{create_metrics, SharedMetrics};
use crate::node::TracerNode;
use crate::path;
use crate::tag::InProcessLink;
use crate::tracer::Tracer;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Process-unique session identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Issue the next id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

struct SessionInner {
    id: SessionId,
    agent: Arc<dyn Agent>,
    archive: PathArchive,
    metrics: SharedMetrics,
    settings: DiagnosticsSettings,
}

/// Cheaply cloneable handle on a session
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self::with_settings(agent, DiagnosticsSettings::default())
    }

    pub fn with_settings(agent: Arc<dyn Agent>, settings: DiagnosticsSettings) -> Self {
        let id = SessionId::next();
        debug!(target: "tracepath", %id, agent = agent.name(), "session created");
        Self {
            inner: Arc::new(SessionInner {
                id,
                agent,
                archive: PathArchive::new(),
                metrics: create_metrics(),
                settings,
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.inner.agent
    }

    pub fn archive(&self) -> &PathArchive {
        &self.inner.archive
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.inner.metrics
    }

    pub fn settings(&self) -> &DiagnosticsSettings {
        &self.inner.settings
    }

    /// Report a condition through the diagnostic channel
    pub fn warn(&self, message: &str) {
        diagnostics::emit(self.inner.agent.logging_callback().as_ref(), message);
    }

    /// Create a tracer owned by the calling thread
    pub fn create_tracer(&self, details: TracerDetails) -> Tracer {
        Tracer::create(self, details)
    }

    /// Innermost tracer active on the calling thread
    pub fn active_tracer(&self) -> Option<Arc<TracerNode>> {
        path::current_top(self.id())
    }

    /// Attach a custom request attribute to the active tracer
    ///
    /// Without an active tracer the attribute is dropped with a diagnostic.
    pub fn add_custom_attribute(&self, key: &str, value: AttributeValue) -> TracerResult<()> {
        require_non_blank("key", key)?;
        match self.active_tracer() {
            Some(node) => node.add_attribute(key, value),
            None => self.warn(&format!(
                "No active tracer on this thread, dropping custom request attribute {:?}",
                key
            )),
        }
        Ok(())
    }

    /// Link to the tracer active on the calling thread, empty if there is none
    pub fn create_in_process_link(&self) -> InProcessLink {
        InProcessLink::new(self.active_tracer().map(|n| n.id()))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("agent", &self.inner.agent.name())
            .field("completed_paths", &self.inner.archive.len())
            .finish()
    }
}
