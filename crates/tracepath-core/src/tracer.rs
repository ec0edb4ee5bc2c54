//! Tracer handles
//!
//! A [`Tracer`] is the application's handle on one node. Every operation
//! checks thread affinity and the node's state before it touches the path or
//! the agent, so a rejected call leaves both unchanged.

use crate::error::{require_non_blank, TracerError, TracerResult};
use crate::kind::{Capability, TracerDetails, TracerKind, TracerUpdate};
use crate::node::{TracerNode, TracerState};
use crate::path;
use crate::session::Session;
use crate::tag::{decode_incoming, IncomingTag, TagForm, TracerId};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Message emitted when both tag forms are supplied
pub const BOTH_TAGS_MESSAGE: &str = "Both str_tag and byte_tag specified. Use only one!";

/// Error returned by scoped tracing
#[derive(Debug, Error)]
pub enum ScopeError<E> {
    /// The tracer could not be started or ended
    #[error(transparent)]
    Tracer(TracerError),

    /// The traced operation failed; the error is attached to the tracer
    #[error("{0}")]
    Operation(E),
}

impl<E> ScopeError<E> {
    /// The operation's own error, if that is what failed
    pub fn into_operation(self) -> Option<E> {
        match self {
            ScopeError::Operation(e) => Some(e),
            ScopeError::Tracer(_) => None,
        }
    }
}

/// Handle on a traced operation
pub struct Tracer {
    node: Arc<TracerNode>,
    session: Session,
}

impl Tracer {
    pub(crate) fn create(session: &Session, details: TracerDetails) -> Self {
        let link_target = match &details {
            TracerDetails::InProcessLink { target } => *target,
            _ => None,
        };
        let node = TracerNode::new(details, session.id());
        if let Some(target) = link_target {
            node.set_incoming_tag(Some(target));
        }

        session.agent().tracer_create(node.id(), &node.details());
        session.metrics().record_created(node.kind());
        debug!(target: "tracepath", tracer = %node, "tracer created");

        Self {
            node,
            session: session.clone(),
        }
    }

    pub fn id(&self) -> TracerId {
        self.node.id()
    }

    pub fn kind(&self) -> TracerKind {
        self.node.kind()
    }

    pub fn state(&self) -> TracerState {
        self.node.state()
    }

    /// Shared node, which outlives the handle once started
    pub fn node(&self) -> &Arc<TracerNode> {
        &self.node
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn checked<T>(&self, result: TracerResult<T>) -> TracerResult<T> {
        if let Err(err) = &result {
            self.session.metrics().record_usage_error();
            debug!(target: "tracepath", tracer = %self.node, error = %err, "tracer usage error");
        }
        result
    }

    fn require(&self, capability: Capability) -> TracerResult<()> {
        if !self.kind().supports(capability) {
            return Err(TracerError::UnsupportedCapability {
                kind: self.kind(),
                capability,
            });
        }
        Ok(())
    }

    /// Start the tracer on the calling thread's path
    pub fn start(&self) -> TracerResult<()> {
        self.checked(self.start_inner())
    }

    fn start_inner(&self) -> TracerResult<()> {
        self.node.check_thread()?;
        self.node.check_state(TracerState::Created)?;
        path::with_current(self.session.id(), true, |path| match path {
            Some(path) => path.push(&self.node),
            None => Err(TracerError::NoActivePath {
                tracer: self.node.to_string(),
            }),
        })?;

        self.node.set_state(TracerState::Started);
        self.session.agent().tracer_start(self.id());
        self.session.metrics().record_started();
        Ok(())
    }

    /// Set a kind-specific field
    pub fn update(&self, update: TracerUpdate) -> TracerResult<()> {
        self.checked(self.update_inner(update))
    }

    fn update_inner(&self, update: TracerUpdate) -> TracerResult<()> {
        self.node.check_thread()?;
        update.validate()?;
        match (self.state(), update.is_entry_field()) {
            (TracerState::Created, _) | (TracerState::Started, false) => {}
            (_, true) => {
                return Err(TracerError::EntryFieldTooLate {
                    tracer: self.node.to_string(),
                    field: update.field(),
                })
            }
            (actual, false) => {
                return Err(TracerError::InvalidState {
                    tracer: self.node.to_string(),
                    actual,
                    expected: TracerState::Started,
                })
            }
        }

        self.node
            .with_details_mut(|details| update.clone().apply(details))?;
        self.session.agent().tracer_update(self.id(), &update);
        Ok(())
    }

    /// Attach an error; only while started and only once
    pub fn mark_failed(&self, class: &str, message: &str) -> TracerResult<()> {
        self.checked(self.mark_failed_inner(class, message))
    }

    fn mark_failed_inner(&self, class: &str, message: &str) -> TracerResult<()> {
        self.node.check_thread()?;
        require_non_blank("error_class", class)?;
        self.node.check_state(TracerState::Started)?;
        self.node.set_error(class, message)?;

        self.session.agent().tracer_error(self.id(), class, message);
        self.session.metrics().record_failed();
        Ok(())
    }

    /// Attach `err`, using its type name as class and its display text as message
    pub fn mark_failed_with<E: fmt::Display + ?Sized>(&self, err: &E) -> TracerResult<()> {
        self.mark_failed(std::any::type_name::<E>(), &err.to_string())
    }

    /// End the tracer
    ///
    /// Ending twice is a no-op. A failed end leaves the tracer started.
    pub fn end(&self) -> TracerResult<()> {
        self.checked(self.end_inner())
    }

    fn end_inner(&self) -> TracerResult<()> {
        self.node.check_thread()?;
        match self.state() {
            TracerState::Ended => return Ok(()),
            TracerState::Created => {
                self.finish();
                return Ok(());
            }
            TracerState::Started => {}
        }

        let unended = self.node.unended_children();
        if !unended.is_empty() {
            return Err(TracerError::UnendedChildren {
                tracer: self.node.to_string(),
                children: unended,
            });
        }

        let root = path::with_current(self.session.id(), false, |path| match path {
            Some(path) => path.pop(&self.node),
            None => Err(TracerError::OutOfOrderEnd {
                tracer: self.node.to_string(),
                active: "nothing".to_string(),
            }),
        })?;

        self.finish();
        if let Some(root) = root {
            self.complete_path(root);
        }
        Ok(())
    }

    fn finish(&self) {
        self.node.set_state(TracerState::Ended);
        self.session.agent().tracer_end(self.id());
        self.session.metrics().record_ended();
    }

    fn complete_path(&self, root: Arc<TracerNode>) {
        if self.session.settings().log_completed_paths {
            debug!(target: "tracepath", "completed path\n{}", root.dump());
        }
        if self.session.settings().retain_completed_paths {
            self.session.archive().append(root);
        }
        self.session.metrics().record_path_completed();
    }

    /// Outgoing tag in the requested form
    pub fn outgoing_tag(&self, form: TagForm) -> TracerResult<Vec<u8>> {
        self.checked(self.outgoing_tag_inner(form))
    }

    fn outgoing_tag_inner(&self, form: TagForm) -> TracerResult<Vec<u8>> {
        self.node.check_thread()?;
        self.require(Capability::OutgoingTaggable)?;
        self.node.check_state(TracerState::Started)?;
        Ok(self
            .session
            .agent()
            .tracer_get_outgoing_tag(self.id(), form))
    }

    /// Outgoing tag as a string, for text carriers such as HTTP headers
    pub fn outgoing_string_tag(&self) -> TracerResult<String> {
        let bytes = self.outgoing_tag(TagForm::String)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Outgoing tag as bytes, for binary carriers
    pub fn outgoing_byte_tag(&self) -> TracerResult<Vec<u8>> {
        self.outgoing_tag(TagForm::Bytes)
    }

    /// Set the tag received from the caller; only before start
    pub fn set_incoming_tag(&self, tag: IncomingTag) -> TracerResult<()> {
        self.checked(self.set_incoming_tag_inner(tag))
    }

    fn set_incoming_tag_inner(&self, tag: IncomingTag) -> TracerResult<()> {
        self.node.check_thread()?;
        self.require(Capability::IncomingTaggable)?;
        self.node.check_state(TracerState::Created)?;

        let id = decode_incoming(&tag);
        if id.is_none() && !tag.is_empty() {
            debug!(target: "tracepath", tracer = %self.node, "incoming tag does not decode");
        }
        self.node.set_incoming_tag(id);
        self.session.agent().tracer_set_incoming_tag(self.id(), &tag);
        Ok(())
    }

    /// Apply at most one of a string or byte tag
    ///
    /// Supplying both is ambiguous: neither is applied and a diagnostic is
    /// emitted.
    pub fn apply_incoming_tags(
        &self,
        string_tag: Option<&str>,
        byte_tag: Option<&[u8]>,
    ) -> TracerResult<()> {
        match (string_tag, byte_tag) {
            (Some(_), Some(_)) => {
                self.session.warn(BOTH_TAGS_MESSAGE);
                Ok(())
            }
            (Some(s), None) => self.set_incoming_tag(IncomingTag::String(s.to_string())),
            (None, Some(b)) => self.set_incoming_tag(IncomingTag::Bytes(b.to_vec())),
            (None, None) => Ok(()),
        }
    }

    /// Start, run `f`, and end exactly once
    ///
    /// An `Err` from `f` is attached to the tracer. A panic is attached with
    /// class `panic` and resumed after the tracer has ended.
    pub fn scoped<T, E, F>(&self, f: F) -> Result<T, ScopeError<E>>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.start().map_err(ScopeError::Tracer)?;

        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => {
                self.end().map_err(ScopeError::Tracer)?;
                Ok(value)
            }
            Ok(Err(err)) => {
                // An error the operation already attached itself wins
                if self.node.error().is_none() {
                    if let Err(e) = self.mark_failed_with(&err) {
                        self.warn_unattached(&e);
                    }
                }
                self.end_after_failure();
                Err(ScopeError::Operation(err))
            }
            Err(payload) => {
                if self.node.error().is_none() {
                    if let Err(e) = self.mark_failed("panic", &panic_message(payload.as_ref())) {
                        self.warn_unattached(&e);
                    }
                }
                self.end_after_failure();
                panic::resume_unwind(payload)
            }
        }
    }

    /// Like [`Tracer::scoped`], handing the tracer to `f`
    pub fn trace<T, E, F>(&self, f: F) -> Result<T, ScopeError<E>>
    where
        E: fmt::Display,
        F: FnOnce(&Tracer) -> Result<T, E>,
    {
        self.scoped(|| f(self))
    }

    fn warn_unattached(&self, err: &TracerError) {
        self.session
            .warn(&format!("Failed to attach error to {}: {}", self.node, err));
    }

    fn end_after_failure(&self) {
        if let Err(err) = self.end() {
            self.session
                .warn(&format!("Failed to end {} after error: {}", self.node, err));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl fmt::Display for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.node, f)
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("node", &self.node.to_string())
            .field("state", &self.state())
            .field("session", &self.session.id())
            .finish()
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        if self.node.state() == TracerState::Ended {
            return;
        }
        // Another thread's path must not be touched, not even to release it
        if let Err(err) = self.node.check_thread() {
            self.session
                .warn(&format!("Tracer {} dropped on a foreign thread: {}", self.node, err));
            return;
        }
        match self.node.state() {
            TracerState::Ended => {}
            TracerState::Created => {
                // Never started: nothing to report, just release the agent side
                self.node.set_state(TracerState::Ended);
                self.session.agent().tracer_end(self.id());
            }
            TracerState::Started => {
                // The node stays on its path; a leak beats a wrong tree
                self.session.metrics().record_leaked();
                if self.session.settings().leak_warnings {
                    self.session
                        .warn(&format!("Un-ended tracer {} dropped", self.node));
                }
            }
        }
    }
}
