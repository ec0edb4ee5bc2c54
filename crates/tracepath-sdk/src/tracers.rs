//! Typed tracers
//!
//! One wrapper type per tracer kind. Each exposes only the setters legal for
//! its kind, and the capability traits say which tag operations it supports:
//! an [`OutgoingRemoteCallTracer`] can hand out tags, an
//! [`IncomingRemoteCallTracer`] can consume them, a [`DatabaseRequestTracer`]
//! does neither.

use crate::kv::KeyValues;
use std::fmt;
use std::sync::Arc;
use tracepath_core::{
    IncomingTag, ScopeError, Tracer, TracerId, TracerKind, TracerNode, TracerResult, TracerState,
    TracerUpdate,
};

/// Operations shared by every typed tracer
pub trait TracerHandle {
    /// Underlying untyped tracer
    fn tracer(&self) -> &Tracer;

    fn id(&self) -> TracerId {
        self.tracer().id()
    }

    fn kind(&self) -> TracerKind {
        self.tracer().kind()
    }

    fn state(&self) -> TracerState {
        self.tracer().state()
    }

    fn node(&self) -> &Arc<TracerNode> {
        self.tracer().node()
    }

    fn start(&self) -> TracerResult<()> {
        self.tracer().start()
    }

    fn end(&self) -> TracerResult<()> {
        self.tracer().end()
    }

    fn mark_failed(&self, class: &str, message: &str) -> TracerResult<()> {
        self.tracer().mark_failed(class, message)
    }

    fn mark_failed_with<E: fmt::Display + ?Sized>(&self, err: &E) -> TracerResult<()>
    where
        Self: Sized,
    {
        self.tracer().mark_failed_with(err)
    }

    /// Start, run `f` with this tracer, and end exactly once
    ///
    /// See [`Tracer::scoped`] for how errors and panics are attached.
    fn trace<T, E, F>(&self, f: F) -> Result<T, ScopeError<E>>
    where
        Self: Sized,
        E: fmt::Display,
        F: FnOnce(&Self) -> Result<T, E>,
    {
        self.tracer().scoped(|| f(self))
    }
}

/// Tracers that can hand a tag to the operation they call
pub trait OutgoingTaggable: TracerHandle {
    /// Tag for text carriers, e.g. the `X-Tracepath` HTTP header
    fn outgoing_string_tag(&self) -> TracerResult<String> {
        self.tracer().outgoing_string_tag()
    }

    fn outgoing_byte_tag(&self) -> TracerResult<Vec<u8>> {
        self.tracer().outgoing_byte_tag()
    }
}

/// Tracers that can consume a tag received from their caller
pub trait IncomingTaggable: TracerHandle {
    fn set_incoming_string_tag(&self, tag: &str) -> TracerResult<()> {
        self.tracer()
            .set_incoming_tag(IncomingTag::String(tag.to_string()))
    }

    fn set_incoming_byte_tag(&self, tag: &[u8]) -> TracerResult<()> {
        self.tracer().set_incoming_tag(IncomingTag::Bytes(tag.to_vec()))
    }
}

/// Tracers that may start a new path on a thread with none active
pub trait Entrypoint: TracerHandle {}

macro_rules! typed_tracer {
    ($(#[$meta:meta])* $name:ident => $kind:ident $(, $cap:ident)*) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            inner: Tracer,
        }

        impl $name {
            pub(crate) fn wrap(inner: Tracer) -> Self {
                debug_assert_eq!(inner.kind(), TracerKind::$kind);
                Self { inner }
            }

            /// Give up the typed view
            pub fn into_inner(self) -> Tracer {
                self.inner
            }
        }

        impl TracerHandle for $name {
            fn tracer(&self) -> &Tracer {
                &self.inner
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.inner, f)
            }
        }

        $(impl $cap for $name {})*
    };
}

typed_tracer!(
    /// Serving a remote call
    IncomingRemoteCallTracer => IncomingRemoteCall, IncomingTaggable, Entrypoint
);
typed_tracer!(
    /// Issuing a remote call
    OutgoingRemoteCallTracer => OutgoingRemoteCall, OutgoingTaggable
);
typed_tracer!(
    /// One SQL statement against a database
    DatabaseRequestTracer => DatabaseRequest
);
typed_tracer!(
    /// Serving an HTTP request
    IncomingWebRequestTracer => IncomingWebRequest, IncomingTaggable, Entrypoint
);
typed_tracer!(
    /// Issuing an HTTP request
    OutgoingWebRequestTracer => OutgoingWebRequest, OutgoingTaggable, Entrypoint
);
typed_tracer!(
    /// Sending a message
    OutgoingMessageTracer => OutgoingMessage, OutgoingTaggable
);
typed_tracer!(
    /// Blocking receive of a message
    IncomingMessageReceiveTracer => IncomingMessageReceive, Entrypoint
);
typed_tracer!(
    /// Processing a received message
    IncomingMessageProcessTracer => IncomingMessageProcess, IncomingTaggable, Entrypoint
);
typed_tracer!(
    CustomServiceTracer => CustomService, Entrypoint
);
typed_tracer!(
    /// Continuation of work handed over from another thread
    InProcessLinkTracer => InProcessLink, Entrypoint
);

fn add_pairs(
    tracer: &Tracer,
    pairs: KeyValues,
    update: fn(String, String) -> TracerUpdate,
) -> TracerResult<()> {
    for (name, value) in pairs {
        tracer.update(update(name, value))?;
    }
    Ok(())
}

fn request_header(name: String, value: String) -> TracerUpdate {
    TracerUpdate::RequestHeader { name, value }
}

fn response_header(name: String, value: String) -> TracerUpdate {
    TracerUpdate::ResponseHeader { name, value }
}

fn parameter(name: String, value: String) -> TracerUpdate {
    TracerUpdate::Parameter { name, value }
}

impl IncomingRemoteCallTracer {
    /// Only before start
    pub fn set_protocol_name(&self, name: &str) -> TracerResult<()> {
        self.inner
            .update(TracerUpdate::ProtocolName(Some(name.to_string())))
    }
}

impl OutgoingRemoteCallTracer {
    /// Only before start
    pub fn set_protocol_name(&self, name: &str) -> TracerResult<()> {
        self.inner
            .update(TracerUpdate::ProtocolName(Some(name.to_string())))
    }
}

impl DatabaseRequestTracer {
    pub fn set_returned_row_count(&self, count: u64) -> TracerResult<()> {
        self.inner.update(TracerUpdate::ReturnedRowCount(count))
    }

    pub fn set_round_trip_count(&self, count: u64) -> TracerResult<()> {
        self.inner.update(TracerUpdate::RoundTripCount(count))
    }
}

impl IncomingWebRequestTracer {
    /// Only before start
    pub fn add_request_headers(&self, headers: impl Into<KeyValues>) -> TracerResult<()> {
        add_pairs(&self.inner, headers.into(), request_header)
    }

    pub fn add_response_headers(&self, headers: impl Into<KeyValues>) -> TracerResult<()> {
        add_pairs(&self.inner, headers.into(), response_header)
    }

    pub fn add_parameters(&self, parameters: impl Into<KeyValues>) -> TracerResult<()> {
        add_pairs(&self.inner, parameters.into(), parameter)
    }

    /// Only before start
    pub fn set_remote_address(&self, address: &str) -> TracerResult<()> {
        self.inner
            .update(TracerUpdate::RemoteAddress(Some(address.to_string())))
    }

    pub fn set_status_code(&self, code: u16) -> TracerResult<()> {
        self.inner.update(TracerUpdate::StatusCode(code))
    }
}

impl OutgoingWebRequestTracer {
    /// Only before start
    pub fn add_request_headers(&self, headers: impl Into<KeyValues>) -> TracerResult<()> {
        add_pairs(&self.inner, headers.into(), request_header)
    }

    pub fn add_response_headers(&self, headers: impl Into<KeyValues>) -> TracerResult<()> {
        add_pairs(&self.inner, headers.into(), response_header)
    }

    pub fn set_status_code(&self, code: u16) -> TracerResult<()> {
        self.inner.update(TracerUpdate::StatusCode(code))
    }
}

impl OutgoingMessageTracer {
    pub fn set_vendor_message_id(&self, id: &str) -> TracerResult<()> {
        self.inner
            .update(TracerUpdate::VendorMessageId(id.to_string()))
    }

    pub fn set_correlation_id(&self, id: &str) -> TracerResult<()> {
        self.inner.update(TracerUpdate::CorrelationId(id.to_string()))
    }
}

impl IncomingMessageProcessTracer {
    pub fn set_vendor_message_id(&self, id: &str) -> TracerResult<()> {
        self.inner
            .update(TracerUpdate::VendorMessageId(id.to_string()))
    }

    pub fn set_correlation_id(&self, id: &str) -> TracerResult<()> {
        self.inner.update(TracerUpdate::CorrelationId(id.to_string()))
    }
}
