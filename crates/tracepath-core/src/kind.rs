//! Tracer kinds and their kind-specific fields
//!
//! Each kind carries only the fields that are legal for it. Setters reach the
//! details through [`TracerUpdate`], which knows which fields are entry fields
//! (settable only before start) and which kinds define them.

use crate::error::{require_non_blank, TracerError, TracerResult};
use crate::tag::TracerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of traced operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TracerKind {
    IncomingRemoteCall,
    OutgoingRemoteCall,
    DatabaseRequest,
    IncomingWebRequest,
    OutgoingWebRequest,
    OutgoingMessage,
    IncomingMessageReceive,
    IncomingMessageProcess,
    CustomService,
    InProcessLink,
}

impl TracerKind {
    /// Whether a tracer of this kind may start a new path
    pub fn is_entrypoint(&self) -> bool {
        !matches!(
            self,
            TracerKind::OutgoingRemoteCall
                | TracerKind::DatabaseRequest
                | TracerKind::OutgoingMessage
        )
    }

    /// Whether a tracer of this kind can hand out an outgoing tag
    pub fn has_outgoing_tag(&self) -> bool {
        matches!(
            self,
            TracerKind::OutgoingRemoteCall
                | TracerKind::OutgoingWebRequest
                | TracerKind::OutgoingMessage
        )
    }

    /// Whether a tracer of this kind accepts an incoming tag
    pub fn accepts_incoming_tag(&self) -> bool {
        matches!(
            self,
            TracerKind::IncomingRemoteCall
                | TracerKind::IncomingWebRequest
                | TracerKind::IncomingMessageProcess
        )
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::OutgoingTaggable => self.has_outgoing_tag(),
            Capability::IncomingTaggable => self.accepts_incoming_tag(),
            Capability::Entrypoint => self.is_entrypoint(),
        }
    }
}

impl fmt::Display for TracerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Optional capabilities a tracer kind may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    OutgoingTaggable,
    IncomingTaggable,
    Entrypoint,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Transport-layer channel type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    #[default]
    Other,
    /// Endpoint is `host:port`
    TcpIp,
    /// Endpoint is the socket path
    UnixDomainSocket,
    /// Endpoint is the pipe name
    NamedPipe,
    InProcess,
}

/// Communication channel to a remote service or database
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Channel {
    pub channel_type: ChannelType,
    pub endpoint: Option<String>,
}

impl Channel {
    pub fn new(channel_type: ChannelType, endpoint: Option<&str>) -> Self {
        Self {
            channel_type,
            endpoint: endpoint.map(str::to_string),
        }
    }
}

/// Well known database vendor names
pub mod database_vendor {
    pub const DB2: &str = "DB2";
    pub const H2: &str = "H2";
    pub const MARIADB: &str = "MariaDB";
    pub const MYSQL: &str = "MySQL";
    pub const ORACLE: &str = "Oracle";
    pub const POSTGRESQL: &str = "PostgreSQL";
    pub const SQLITE: &str = "sqlite";
    pub const SQLSERVER: &str = "SQL Server";
    pub const CASSANDRA: &str = "Cassandra";
    pub const REDSHIFT: &str = "Amazon Redshift";
}

/// Well known messaging vendor names
pub mod messaging_vendor {
    pub const ACTIVE_MQ: &str = "ActiveMQ";
    pub const ARTEMIS: &str = "Artemis";
    pub const HORNETQ: &str = "HornetQ";
    pub const MQSERIES: &str = "MQSeries";
    pub const RABBIT_MQ: &str = "RabbitMQ";
    pub const TIBCO: &str = "Tibco";
}

/// Database a request is sent to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub vendor: String,
    pub channel: Channel,
}

impl DatabaseInfo {
    pub fn new(name: &str, vendor: &str, channel: Channel) -> TracerResult<Self> {
        require_non_blank("name", name)?;
        require_non_blank("vendor", vendor)?;
        Ok(Self {
            name: name.to_string(),
            vendor: vendor.to_string(),
            channel,
        })
    }
}

/// Web application serving incoming web requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebApplicationInfo {
    pub virtual_host: String,
    pub application_id: String,
    pub context_root: String,
}

impl WebApplicationInfo {
    pub fn new(virtual_host: &str, application_id: &str, context_root: &str) -> TracerResult<Self> {
        require_non_blank("virtual_host", virtual_host)?;
        require_non_blank("application_id", application_id)?;
        require_non_blank("context_root", context_root)?;
        Ok(Self {
            virtual_host: virtual_host.to_string(),
            application_id: application_id.to_string(),
            context_root: context_root.to_string(),
        })
    }
}

/// Messaging destination type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagingDestinationType {
    /// Each message is received by one consumer
    Queue,
    /// Each message is received by all subscribers
    Topic,
}

/// Messaging system, destination and channel used for messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingSystemInfo {
    pub vendor: String,
    pub destination_name: String,
    pub destination_type: MessagingDestinationType,
    pub channel: Channel,
}

impl MessagingSystemInfo {
    pub fn new(
        vendor: &str,
        destination_name: &str,
        destination_type: MessagingDestinationType,
        channel: Channel,
    ) -> TracerResult<Self> {
        require_non_blank("vendor", vendor)?;
        require_non_blank("destination_name", destination_name)?;
        Ok(Self {
            vendor: vendor.to_string(),
            destination_name: destination_name.to_string(),
            destination_type,
            channel,
        })
    }
}

/// Value of a custom request attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Integer(v.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

/// Remote call fields, shared by the incoming and outgoing side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCall {
    pub method: String,
    pub service: String,
    pub endpoint: String,
    /// Only known on the calling side
    pub channel: Option<Channel>,
    pub protocol_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRequest {
    pub database: DatabaseInfo,
    pub sql: String,
    pub returned_row_count: Option<u64>,
    pub round_trip_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingWebRequest {
    pub application: WebApplicationInfo,
    pub url: String,
    pub method: String,
    pub request_headers: Vec<(String, String)>,
    pub response_headers: Vec<(String, String)>,
    pub parameters: Vec<(String, String)>,
    pub remote_address: Option<String>,
    pub status_code: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingWebRequest {
    pub url: String,
    pub method: String,
    pub request_headers: Vec<(String, String)>,
    pub response_headers: Vec<(String, String)>,
    pub status_code: Option<u16>,
}

/// Sent or processed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub system: MessagingSystemInfo,
    pub vendor_message_id: Option<String>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomService {
    pub method: String,
    pub service: String,
}

/// Kind-specific fields of a tracer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TracerDetails {
    IncomingRemoteCall(RemoteCall),
    OutgoingRemoteCall(RemoteCall),
    DatabaseRequest(DatabaseRequest),
    IncomingWebRequest(IncomingWebRequest),
    OutgoingWebRequest(OutgoingWebRequest),
    OutgoingMessage(Message),
    IncomingMessageReceive(MessagingSystemInfo),
    IncomingMessageProcess(Message),
    CustomService(CustomService),
    InProcessLink { target: Option<TracerId> },
}

impl TracerDetails {
    pub fn kind(&self) -> TracerKind {
        match self {
            TracerDetails::IncomingRemoteCall(_) => TracerKind::IncomingRemoteCall,
            TracerDetails::OutgoingRemoteCall(_) => TracerKind::OutgoingRemoteCall,
            TracerDetails::DatabaseRequest(_) => TracerKind::DatabaseRequest,
            TracerDetails::IncomingWebRequest(_) => TracerKind::IncomingWebRequest,
            TracerDetails::OutgoingWebRequest(_) => TracerKind::OutgoingWebRequest,
            TracerDetails::OutgoingMessage(_) => TracerKind::OutgoingMessage,
            TracerDetails::IncomingMessageReceive(_) => TracerKind::IncomingMessageReceive,
            TracerDetails::IncomingMessageProcess(_) => TracerKind::IncomingMessageProcess,
            TracerDetails::CustomService(_) => TracerKind::CustomService,
            TracerDetails::InProcessLink { .. } => TracerKind::InProcessLink,
        }
    }

    pub fn incoming_remote_call(method: &str, service: &str, endpoint: &str) -> TracerResult<Self> {
        Ok(TracerDetails::IncomingRemoteCall(RemoteCall::new(
            method, service, endpoint, None,
        )?))
    }

    pub fn outgoing_remote_call(
        method: &str,
        service: &str,
        endpoint: &str,
        channel: Channel,
    ) -> TracerResult<Self> {
        Ok(TracerDetails::OutgoingRemoteCall(RemoteCall::new(
            method,
            service,
            endpoint,
            Some(channel),
        )?))
    }

    pub fn database_request(database: &DatabaseInfo, sql: &str) -> TracerResult<Self> {
        require_non_blank("sql", sql)?;
        Ok(TracerDetails::DatabaseRequest(DatabaseRequest {
            database: database.clone(),
            sql: sql.to_string(),
            returned_row_count: None,
            round_trip_count: None,
        }))
    }

    pub fn incoming_web_request(
        application: &WebApplicationInfo,
        url: &str,
        method: &str,
    ) -> TracerResult<Self> {
        require_non_blank("url", url)?;
        require_non_blank("method", method)?;
        Ok(TracerDetails::IncomingWebRequest(IncomingWebRequest {
            application: application.clone(),
            url: url.to_string(),
            method: method.to_string(),
            request_headers: Vec::new(),
            response_headers: Vec::new(),
            parameters: Vec::new(),
            remote_address: None,
            status_code: None,
        }))
    }

    pub fn outgoing_web_request(url: &str, method: &str) -> TracerResult<Self> {
        require_non_blank("url", url)?;
        require_non_blank("method", method)?;
        Ok(TracerDetails::OutgoingWebRequest(OutgoingWebRequest {
            url: url.to_string(),
            method: method.to_string(),
            request_headers: Vec::new(),
            response_headers: Vec::new(),
            status_code: None,
        }))
    }

    pub fn outgoing_message(system: &MessagingSystemInfo) -> Self {
        TracerDetails::OutgoingMessage(Message::new(system))
    }

    pub fn incoming_message_receive(system: &MessagingSystemInfo) -> Self {
        TracerDetails::IncomingMessageReceive(system.clone())
    }

    pub fn incoming_message_process(system: &MessagingSystemInfo) -> Self {
        TracerDetails::IncomingMessageProcess(Message::new(system))
    }

    pub fn custom_service(method: &str, service: &str) -> TracerResult<Self> {
        require_non_blank("service_method", method)?;
        require_non_blank("service_name", service)?;
        Ok(TracerDetails::CustomService(CustomService {
            method: method.to_string(),
            service: service.to_string(),
        }))
    }

    pub fn in_process_link(target: Option<TracerId>) -> Self {
        TracerDetails::InProcessLink { target }
    }
}

impl RemoteCall {
    fn new(
        method: &str,
        service: &str,
        endpoint: &str,
        channel: Option<Channel>,
    ) -> TracerResult<Self> {
        require_non_blank("method", method)?;
        require_non_blank("service", service)?;
        require_non_blank("endpoint", endpoint)?;
        Ok(Self {
            method: method.to_string(),
            service: service.to_string(),
            endpoint: endpoint.to_string(),
            channel,
            protocol_name: None,
        })
    }
}

impl Message {
    fn new(system: &MessagingSystemInfo) -> Self {
        Self {
            system: system.clone(),
            vendor_message_id: None,
            correlation_id: None,
        }
    }
}

/// A single kind-specific field assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracerUpdate {
    ProtocolName(Option<String>),
    RequestHeader { name: String, value: String },
    ResponseHeader { name: String, value: String },
    Parameter { name: String, value: String },
    RemoteAddress(Option<String>),
    StatusCode(u16),
    ReturnedRowCount(u64),
    RoundTripCount(u64),
    VendorMessageId(String),
    CorrelationId(String),
}

impl TracerUpdate {
    /// Field name, for error messages
    pub fn field(&self) -> &'static str {
        match self {
            TracerUpdate::ProtocolName(_) => "protocol_name",
            TracerUpdate::RequestHeader { .. } => "request_header",
            TracerUpdate::ResponseHeader { .. } => "response_header",
            TracerUpdate::Parameter { .. } => "parameter",
            TracerUpdate::RemoteAddress(_) => "remote_address",
            TracerUpdate::StatusCode(_) => "status_code",
            TracerUpdate::ReturnedRowCount(_) => "returned_row_count",
            TracerUpdate::RoundTripCount(_) => "round_trip_count",
            TracerUpdate::VendorMessageId(_) => "vendor_message_id",
            TracerUpdate::CorrelationId(_) => "correlation_id",
        }
    }

    /// Entry fields describe how an operation was entered and must be set before start
    pub fn is_entry_field(&self) -> bool {
        matches!(
            self,
            TracerUpdate::ProtocolName(_)
                | TracerUpdate::RequestHeader { .. }
                | TracerUpdate::RemoteAddress(_)
        )
    }

    /// Check the value itself, independent of the target tracer
    pub fn validate(&self) -> TracerResult<()> {
        match self {
            TracerUpdate::RequestHeader { name, value }
            | TracerUpdate::ResponseHeader { name, value }
            | TracerUpdate::Parameter { name, value } => {
                require_non_blank("name", name)?;
                require_non_blank("value", value)
            }
            TracerUpdate::ProtocolName(Some(s)) | TracerUpdate::RemoteAddress(Some(s)) => {
                require_non_blank(self.field(), s)
            }
            _ => Ok(()),
        }
    }

    /// Write the field into the details; fails if the kind has no such field
    pub fn apply(self, details: &mut TracerDetails) -> TracerResult<()> {
        let kind = details.kind();
        let field = self.field();
        match (self, details) {
            (
                TracerUpdate::ProtocolName(p),
                TracerDetails::IncomingRemoteCall(rc) | TracerDetails::OutgoingRemoteCall(rc),
            ) => rc.protocol_name = p,

            (
                TracerUpdate::RequestHeader { name, value },
                TracerDetails::IncomingWebRequest(IncomingWebRequest {
                    request_headers, ..
                })
                | TracerDetails::OutgoingWebRequest(OutgoingWebRequest {
                    request_headers, ..
                }),
            ) => request_headers.push((name, value)),

            (
                TracerUpdate::ResponseHeader { name, value },
                TracerDetails::IncomingWebRequest(IncomingWebRequest {
                    response_headers, ..
                })
                | TracerDetails::OutgoingWebRequest(OutgoingWebRequest {
                    response_headers, ..
                }),
            ) => response_headers.push((name, value)),

            (
                TracerUpdate::StatusCode(code),
                TracerDetails::IncomingWebRequest(IncomingWebRequest { status_code, .. })
                | TracerDetails::OutgoingWebRequest(OutgoingWebRequest { status_code, .. }),
            ) => *status_code = Some(code),

            (TracerUpdate::Parameter { name, value }, TracerDetails::IncomingWebRequest(wr)) => {
                wr.parameters.push((name, value))
            }
            (TracerUpdate::RemoteAddress(addr), TracerDetails::IncomingWebRequest(wr)) => {
                wr.remote_address = addr
            }

            (TracerUpdate::ReturnedRowCount(n), TracerDetails::DatabaseRequest(db)) => {
                db.returned_row_count = Some(n)
            }
            (TracerUpdate::RoundTripCount(n), TracerDetails::DatabaseRequest(db)) => {
                db.round_trip_count = Some(n)
            }

            (
                TracerUpdate::VendorMessageId(id),
                TracerDetails::OutgoingMessage(msg) | TracerDetails::IncomingMessageProcess(msg),
            ) => msg.vendor_message_id = Some(id),
            (
                TracerUpdate::CorrelationId(id),
                TracerDetails::OutgoingMessage(msg) | TracerDetails::IncomingMessageProcess(msg),
            ) => msg.correlation_id = Some(id),

            _ => return Err(TracerError::UnsupportedField { kind, field }),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web_app() -> WebApplicationInfo {
        WebApplicationInfo::new("a", "b", "/b").unwrap()
    }

    #[test]
    fn test_capabilities() {
        assert!(TracerKind::IncomingRemoteCall.is_entrypoint());
        assert!(TracerKind::IncomingRemoteCall.accepts_incoming_tag());
        assert!(!TracerKind::IncomingRemoteCall.has_outgoing_tag());

        assert!(!TracerKind::OutgoingRemoteCall.is_entrypoint());
        assert!(TracerKind::OutgoingRemoteCall.has_outgoing_tag());

        assert!(!TracerKind::DatabaseRequest.is_entrypoint());
        assert!(!TracerKind::DatabaseRequest.supports(Capability::OutgoingTaggable));

        assert!(TracerKind::OutgoingWebRequest.is_entrypoint());
        assert!(TracerKind::OutgoingWebRequest.has_outgoing_tag());
    }

    #[test]
    fn test_details_validate_required_strings() {
        assert!(TracerDetails::incoming_remote_call("a", "b", "c").is_ok());
        assert!(TracerDetails::incoming_remote_call("a", "", "c").is_err());
        assert!(TracerDetails::outgoing_web_request("http://a/b", " ").is_err());
        assert!(TracerDetails::custom_service("", "svc").is_err());
        assert!(DatabaseInfo::new("db", "", Channel::default()).is_err());
    }

    #[test]
    fn test_database_info_endpoint_optional() {
        let info = DatabaseInfo::new("db", database_vendor::SQLITE, Channel::default()).unwrap();
        assert_eq!(info.channel.endpoint, None);
    }

    #[test]
    fn test_apply_headers_in_order() {
        let mut details = TracerDetails::incoming_web_request(&web_app(), "http://a/b", "GET").unwrap();
        for (k, v) in [("x", "xv"), ("y", "yv")] {
            TracerUpdate::RequestHeader {
                name: k.to_string(),
                value: v.to_string(),
            }
            .apply(&mut details)
            .unwrap();
        }
        TracerUpdate::StatusCode(200).apply(&mut details).unwrap();

        match details {
            TracerDetails::IncomingWebRequest(wr) => {
                assert_eq!(
                    wr.request_headers,
                    vec![
                        ("x".to_string(), "xv".to_string()),
                        ("y".to_string(), "yv".to_string())
                    ]
                );
                assert_eq!(wr.status_code, Some(200));
            }
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_apply_rejects_foreign_field() {
        let mut details = TracerDetails::custom_service("m", "s").unwrap();
        let err = TracerUpdate::RoundTripCount(1)
            .apply(&mut details)
            .unwrap_err();
        assert_eq!(
            err,
            TracerError::UnsupportedField {
                kind: TracerKind::CustomService,
                field: "round_trip_count",
            }
        );
    }

    #[test]
    fn test_entry_fields() {
        assert!(TracerUpdate::ProtocolName(None).is_entry_field());
        assert!(TracerUpdate::RemoteAddress(None).is_entry_field());
        assert!(!TracerUpdate::StatusCode(200).is_entry_field());
        assert!(!TracerUpdate::ReturnedRowCount(3).is_entry_field());
    }

    #[test]
    fn test_blank_entry_values_are_rejected() {
        for value in ["", "   ", "\t\n"] {
            let err = TracerUpdate::ProtocolName(Some(value.to_string()))
                .validate()
                .unwrap_err();
            assert!(matches!(
                err,
                TracerError::InvalidArgument { name: "protocol_name", .. }
            ));
            let err = TracerUpdate::RemoteAddress(Some(value.to_string()))
                .validate()
                .unwrap_err();
            assert!(matches!(
                err,
                TracerError::InvalidArgument { name: "remote_address", .. }
            ));
        }
        assert!(TracerUpdate::ProtocolName(None).validate().is_ok());
        assert!(TracerUpdate::RemoteAddress(Some("10.0.0.1:80".to_string()))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_details_serialize_with_kind_tag() {
        let details = TracerDetails::custom_service("m", "s").unwrap();
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["kind"], "custom_service");
        assert_eq!(json["service"], "s");
    }
}
