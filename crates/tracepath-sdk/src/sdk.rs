//! SDK facade
//!
//! [`Sdk`] is the factory for info objects and typed tracers, bound to one
//! [`Session`]. Constructors validate their input and return a tracer in the
//! `Created` state; a setup step that fails (a bad header, an empty protocol
//! name) ends the half-built tracer before the error is returned.

use crate::kv::KeyValues;
use crate::tracers::{
    CustomServiceTracer, DatabaseRequestTracer, IncomingMessageProcessTracer,
    IncomingMessageReceiveTracer, IncomingRemoteCallTracer, IncomingWebRequestTracer,
    InProcessLinkTracer, OutgoingMessageTracer, OutgoingRemoteCallTracer,
    OutgoingWebRequestTracer,
};
use std::sync::Arc;
use tracepath_core::config::DiagnosticsSettings;
use tracepath_core::{
    Agent, AgentState, AttributeValue, Channel, DatabaseInfo, DiagnosticCallback, InProcessLink,
    MessagingDestinationType, MessagingSystemInfo, NullAgent, Session, SharedMetrics, Tracer,
    TracerDetails, TracerNode, TracerResult, TracerUpdate, WebApplicationInfo,
};
use tracepath_correlate::{resolve_pending, TagResolver};

/// Tag received from a caller, in at most one form
///
/// Setting both forms is tolerated but ambiguous: neither is applied and a
/// diagnostic is emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingTags {
    pub string_tag: Option<String>,
    pub byte_tag: Option<Vec<u8>>,
}

impl IncomingTags {
    pub fn string(tag: impl Into<String>) -> Self {
        Self {
            string_tag: Some(tag.into()),
            byte_tag: None,
        }
    }

    pub fn bytes(tag: impl Into<Vec<u8>>) -> Self {
        Self {
            string_tag: None,
            byte_tag: Some(tag.into()),
        }
    }

    fn apply(&self, tracer: &Tracer) -> TracerResult<()> {
        tracer.apply_incoming_tags(self.string_tag.as_deref(), self.byte_tag.as_deref())
    }
}

/// Optional inputs of an incoming remote call
#[derive(Debug, Clone, Default)]
pub struct IncomingRemoteCallOptions {
    pub protocol_name: Option<String>,
    pub tags: IncomingTags,
}

/// Optional inputs of an incoming web request
#[derive(Debug, Clone, Default)]
pub struct IncomingWebRequestOptions {
    pub headers: KeyValues,
    pub remote_address: Option<String>,
    pub tags: IncomingTags,
}

/// Tracer factory bound to one session
#[derive(Debug, Clone)]
pub struct Sdk {
    session: Session,
}

impl Sdk {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            session: Session::new(agent),
        }
    }

    pub fn with_settings(agent: Arc<dyn Agent>, settings: DiagnosticsSettings) -> Self {
        Self {
            session: Session::with_settings(agent, settings),
        }
    }

    /// SDK backed by the null agent
    ///
    /// Nobody reads the archive of a process that never initialized, so
    /// completed paths are counted but not kept.
    pub fn null() -> Self {
        let settings = DiagnosticsSettings {
            retain_completed_paths: false,
            ..Default::default()
        };
        Self::with_settings(Arc::new(NullAgent::new()), settings)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        self.session.agent()
    }

    // Info objects

    pub fn create_database_info(
        &self,
        name: &str,
        vendor: &str,
        channel: Channel,
    ) -> TracerResult<DatabaseInfo> {
        DatabaseInfo::new(name, vendor, channel)
    }

    pub fn create_web_application_info(
        &self,
        virtual_host: &str,
        application_id: &str,
        context_root: &str,
    ) -> TracerResult<WebApplicationInfo> {
        WebApplicationInfo::new(virtual_host, application_id, context_root)
    }

    pub fn create_messaging_system_info(
        &self,
        vendor: &str,
        destination_name: &str,
        destination_type: MessagingDestinationType,
        channel: Channel,
    ) -> TracerResult<MessagingSystemInfo> {
        MessagingSystemInfo::new(vendor, destination_name, destination_type, channel)
    }

    // Tracers

    /// Create a tracer and run `setup` on it, ending it if setup fails
    fn build(
        &self,
        details: TracerDetails,
        setup: impl FnOnce(&Tracer) -> TracerResult<()>,
    ) -> TracerResult<Tracer> {
        let tracer = self.session.create_tracer(details);
        if let Err(err) = setup(&tracer) {
            // Still Created, so this cannot fail on the owning thread
            let _ = tracer.end();
            return Err(err);
        }
        Ok(tracer)
    }

    pub fn trace_incoming_remote_call(
        &self,
        method: &str,
        service: &str,
        endpoint: &str,
        options: IncomingRemoteCallOptions,
    ) -> TracerResult<IncomingRemoteCallTracer> {
        let details = TracerDetails::incoming_remote_call(method, service, endpoint)?;
        let tracer = self.build(details, |t| {
            if let Some(name) = options.protocol_name {
                t.update(TracerUpdate::ProtocolName(Some(name)))?;
            }
            options.tags.apply(t)
        })?;
        Ok(IncomingRemoteCallTracer::wrap(tracer))
    }

    pub fn trace_outgoing_remote_call(
        &self,
        method: &str,
        service: &str,
        endpoint: &str,
        channel: Channel,
        protocol_name: Option<&str>,
    ) -> TracerResult<OutgoingRemoteCallTracer> {
        let details = TracerDetails::outgoing_remote_call(method, service, endpoint, channel)?;
        let tracer = self.build(details, |t| match protocol_name {
            Some(name) => t.update(TracerUpdate::ProtocolName(Some(name.to_string()))),
            None => Ok(()),
        })?;
        Ok(OutgoingRemoteCallTracer::wrap(tracer))
    }

    pub fn trace_sql_database_request(
        &self,
        database: &DatabaseInfo,
        sql: &str,
    ) -> TracerResult<DatabaseRequestTracer> {
        let details = TracerDetails::database_request(database, sql)?;
        Ok(DatabaseRequestTracer::wrap(
            self.session.create_tracer(details),
        ))
    }

    pub fn trace_incoming_web_request(
        &self,
        application: &WebApplicationInfo,
        url: &str,
        method: &str,
        options: IncomingWebRequestOptions,
    ) -> TracerResult<IncomingWebRequestTracer> {
        let details = TracerDetails::incoming_web_request(application, url, method)?;
        let tracer = self.build(details, |t| {
            for (name, value) in options.headers {
                t.update(TracerUpdate::RequestHeader { name, value })?;
            }
            if let Some(address) = options.remote_address {
                t.update(TracerUpdate::RemoteAddress(Some(address)))?;
            }
            options.tags.apply(t)
        })?;
        Ok(IncomingWebRequestTracer::wrap(tracer))
    }

    pub fn trace_outgoing_web_request(
        &self,
        url: &str,
        method: &str,
        headers: impl Into<KeyValues>,
    ) -> TracerResult<OutgoingWebRequestTracer> {
        let details = TracerDetails::outgoing_web_request(url, method)?;
        let headers = headers.into();
        let tracer = self.build(details, |t| {
            for (name, value) in headers {
                t.update(TracerUpdate::RequestHeader { name, value })?;
            }
            Ok(())
        })?;
        Ok(OutgoingWebRequestTracer::wrap(tracer))
    }

    pub fn trace_outgoing_message(&self, system: &MessagingSystemInfo) -> OutgoingMessageTracer {
        OutgoingMessageTracer::wrap(
            self.session
                .create_tracer(TracerDetails::outgoing_message(system)),
        )
    }

    pub fn trace_incoming_message_receive(
        &self,
        system: &MessagingSystemInfo,
    ) -> IncomingMessageReceiveTracer {
        IncomingMessageReceiveTracer::wrap(
            self.session
                .create_tracer(TracerDetails::incoming_message_receive(system)),
        )
    }

    pub fn trace_incoming_message_process(
        &self,
        system: &MessagingSystemInfo,
        tags: IncomingTags,
    ) -> TracerResult<IncomingMessageProcessTracer> {
        let tracer = self.build(TracerDetails::incoming_message_process(system), |t| {
            tags.apply(t)
        })?;
        Ok(IncomingMessageProcessTracer::wrap(tracer))
    }

    pub fn trace_custom_service(
        &self,
        method: &str,
        service: &str,
    ) -> TracerResult<CustomServiceTracer> {
        let details = TracerDetails::custom_service(method, service)?;
        Ok(CustomServiceTracer::wrap(
            self.session.create_tracer(details),
        ))
    }

    /// Link naming the tracer active on the calling thread
    ///
    /// Hand it to another thread and pass it to
    /// [`trace_in_process_link`](Self::trace_in_process_link) there.
    pub fn create_in_process_link(&self) -> InProcessLink {
        self.session.create_in_process_link()
    }

    pub fn trace_in_process_link(&self, link: &InProcessLink) -> InProcessLinkTracer {
        InProcessLinkTracer::wrap(
            self.session
                .create_tracer(TracerDetails::in_process_link(link.target())),
        )
    }

    // Custom request attributes

    /// Attach an attribute to the tracer active on the calling thread
    pub fn add_custom_request_attribute(
        &self,
        key: &str,
        value: impl Into<AttributeValue>,
    ) -> TracerResult<()> {
        self.session.add_custom_attribute(key, value.into())
    }

    /// Attach up to `count` attributes, pairing `keys` with `values`
    pub fn add_custom_request_attributes<K, V>(
        &self,
        keys: &[K],
        values: &[V],
        count: usize,
    ) -> TracerResult<()>
    where
        K: AsRef<str>,
        V: Clone + Into<AttributeValue>,
    {
        for (key, value) in keys.iter().zip(values).take(count) {
            self.add_custom_request_attribute(key.as_ref(), value.clone())?;
        }
        Ok(())
    }

    // Agent

    /// Route SDK diagnostics to `callback`, or only to the log with `None`
    pub fn set_diagnostic_callback(&self, callback: Option<DiagnosticCallback>) {
        self.agent().set_logging_callback(callback);
    }

    pub fn agent_state(&self) -> AgentState {
        self.agent().state()
    }

    pub fn agent_version_string(&self) -> String {
        self.agent().version_string()
    }

    pub fn agent_found(&self) -> bool {
        self.agent().is_found()
    }

    pub fn agent_is_compatible(&self) -> bool {
        self.agent().is_compatible()
    }

    // Archive and correlation

    /// Roots of all paths completed so far
    pub fn completed_paths(&self) -> Vec<Arc<TracerNode>> {
        self.session.archive().roots()
    }

    /// Remove and return the completed roots
    ///
    /// Long-running callers drain periodically to keep the archive bounded.
    pub fn take_completed_paths(&self) -> Vec<Arc<TracerNode>> {
        self.session.archive().drain()
    }

    /// Link tagged nodes to their producers, returning those left unresolved
    pub fn resolve_pending(&self) -> Vec<Arc<TracerNode>> {
        resolve_pending(self.session.archive())
    }

    pub fn resolver(&self) -> TagResolver {
        TagResolver::new(self.session.clone())
    }

    pub fn metrics(&self) -> &SharedMetrics {
        self.session.metrics()
    }
}
