//! Tracer nodes - the vertices of a path tree
//!
//! A node is shared between its handle, its parent's children list and the
//! completed-path archive. Mutable fields sit behind a per-node mutex. No code
//! path holds two node locks at once: callers that walk the tree snapshot the
//! children first and recurse on the snapshot.

use crate::error::{TracerError, TracerResult};
use crate::kind::{AttributeValue, TracerDetails, TracerKind};
use crate::session::SessionId;
use crate::tag::TracerId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

/// Lifecycle state of a tracer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TracerState {
    Created,
    Started,
    Ended,
}

impl fmt::Display for TracerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TracerState::Created => write!(f, "CREATED"),
            TracerState::Started => write!(f, "STARTED"),
            TracerState::Ended => write!(f, "ENDED"),
        }
    }
}

/// How a child hangs below its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Started while the parent was the innermost active tracer
    Child,
    /// Linked by the resolver through a correlation tag
    TagLinked,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Child => write!(f, "CHILD"),
            LinkKind::TagLinked => write!(f, "TAG"),
        }
    }
}

/// Error attached to a tracer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub class: String,
    pub message: String,
}

#[derive(Debug)]
struct NodeInner {
    state: TracerState,
    details: TracerDetails,
    children: Vec<(LinkKind, Arc<TracerNode>)>,
    error: Option<ErrorInfo>,
    /// `Some(None)` once a tag was set that did not decode
    incoming_tag: Option<Option<TracerId>>,
    in_tag_resolved: bool,
    linked_parent: Option<Weak<TracerNode>>,
    attributes: Vec<(String, AttributeValue)>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

/// One traced operation
#[derive(Debug)]
pub struct TracerNode {
    id: TracerId,
    kind: TracerKind,
    owner: ThreadId,
    session: SessionId,
    created_at: DateTime<Utc>,
    inner: Mutex<NodeInner>,
}

impl TracerNode {
    /// Create a node owned by the calling thread
    pub fn new(details: TracerDetails, session: SessionId) -> Arc<Self> {
        Arc::new(Self {
            id: TracerId::new(),
            kind: details.kind(),
            owner: thread::current().id(),
            session,
            created_at: Utc::now(),
            inner: Mutex::new(NodeInner {
                state: TracerState::Created,
                details,
                children: Vec::new(),
                error: None,
                incoming_tag: None,
                in_tag_resolved: false,
                linked_parent: None,
                attributes: Vec::new(),
                started_at: None,
                ended_at: None,
            }),
        })
    }

    pub fn id(&self) -> TracerId {
        self.id
    }

    pub fn kind(&self) -> TracerKind {
        self.kind
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().ended_at
    }

    pub fn state(&self) -> TracerState {
        self.inner.lock().state
    }

    /// Fail unless called from the creating thread
    pub fn check_thread(&self) -> TracerResult<()> {
        let caller = thread::current().id();
        if caller != self.owner {
            return Err(TracerError::ThreadAffinity {
                tracer: self.to_string(),
                owner: self.owner,
                caller,
            });
        }
        Ok(())
    }

    /// Fail unless the tracer is in `expected` state
    pub fn check_state(&self, expected: TracerState) -> TracerResult<()> {
        let actual = self.state();
        if actual != expected {
            return Err(TracerError::InvalidState {
                tracer: self.to_string(),
                actual,
                expected,
            });
        }
        Ok(())
    }

    pub(crate) fn set_state(&self, state: TracerState) {
        let mut inner = self.inner.lock();
        match state {
            TracerState::Started => inner.started_at = Some(Utc::now()),
            TracerState::Ended => inner.ended_at = Some(Utc::now()),
            TracerState::Created => {}
        }
        inner.state = state;
    }

    /// Ordered snapshot of the children
    pub fn children(&self) -> Vec<(LinkKind, Arc<TracerNode>)> {
        self.inner.lock().children.clone()
    }

    pub(crate) fn add_child(&self, link: LinkKind, child: Arc<TracerNode>) {
        self.inner.lock().children.push((link, child));
    }

    /// Labels of Child-linked children that are still running
    pub fn unended_children(&self) -> Vec<String> {
        self.children()
            .into_iter()
            .filter(|(link, child)| {
                *link == LinkKind::Child && child.state() == TracerState::Started
            })
            .map(|(_, child)| child.to_string())
            .collect()
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.inner.lock().error.clone()
    }

    pub(crate) fn set_error(&self, class: &str, message: &str) -> TracerResult<()> {
        let mut inner = self.inner.lock();
        if inner.error.is_some() {
            return Err(TracerError::AlreadyFailed {
                tracer: self.to_string(),
            });
        }
        inner.error = Some(ErrorInfo {
            class: class.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    pub fn details(&self) -> TracerDetails {
        self.inner.lock().details.clone()
    }

    pub(crate) fn with_details_mut<R>(&self, f: impl FnOnce(&mut TracerDetails) -> R) -> R {
        f(&mut self.inner.lock().details)
    }

    /// Whether an incoming tag was set, decodable or not
    pub fn has_incoming_tag(&self) -> bool {
        self.inner.lock().incoming_tag.is_some()
    }

    /// Id carried by the incoming tag, if one was set and decoded
    pub fn incoming_tag_id(&self) -> Option<TracerId> {
        self.inner.lock().incoming_tag.flatten()
    }

    pub(crate) fn set_incoming_tag(&self, id: Option<TracerId>) {
        self.inner.lock().incoming_tag = Some(id);
    }

    pub fn is_in_tag_resolved(&self) -> bool {
        self.inner.lock().in_tag_resolved
    }

    /// Producer this node was linked to by the resolver
    pub fn linked_parent(&self) -> Option<Arc<TracerNode>> {
        self.inner
            .lock()
            .linked_parent
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Record that `producer` produced this node's incoming tag
    ///
    /// Must not be called while holding the producer's lock.
    pub fn mark_resolved(self: &Arc<Self>, producer: &Arc<TracerNode>) {
        {
            let mut inner = self.inner.lock();
            inner.in_tag_resolved = true;
            inner.linked_parent = Some(Arc::downgrade(producer));
        }
        producer.add_child(LinkKind::TagLinked, Arc::clone(self));
    }

    pub fn custom_attributes(&self) -> Vec<(String, AttributeValue)> {
        self.inner.lock().attributes.clone()
    }

    pub(crate) fn add_attribute(&self, key: &str, value: AttributeValue) {
        self.inner.lock().attributes.push((key.to_string(), value));
    }

    /// This node followed by all Child-linked descendants, depth first
    pub fn all_nodes_in_subtree(self: &Arc<Self>) -> Vec<Arc<TracerNode>> {
        let mut out = Vec::new();
        collect_subtree(self, &mut out);
        out
    }

    /// Human readable tree rendering, used in logs and test failures
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, "");
        out
    }

    fn dump_into(&self, out: &mut String, indent: &str) {
        let (state, tag, resolved, error, children) = {
            let inner = self.inner.lock();
            (
                inner.state,
                inner.incoming_tag,
                inner.in_tag_resolved,
                inner.error.clone(),
                inner.children.clone(),
            )
        };
        let _ = write!(out, "{}{}(S={}", indent, self, state);
        match tag {
            Some(Some(id)) => {
                let _ = write!(out, ",I={}{}", if resolved { "" } else { "!" }, id);
            }
            Some(None) => out.push_str(",I=!?"),
            None => {}
        }
        out.push(')');
        if let Some(err) = error {
            let _ = write!(out, "\n{} E={}: {}", indent, err.class, err.message);
        }
        let child_indent = format!("{}  ", indent);
        for (link, child) in children {
            let _ = write!(out, "\n{} {}\n", indent, link);
            child.dump_into(out, &child_indent);
        }
    }

    /// Serializable copy of this node and its Child-linked subtree
    ///
    /// Tag-linked children belong to another tree and are listed by id only.
    pub fn snapshot(&self) -> NodeSnapshot {
        let mut snapshot = {
            let inner = self.inner.lock();
            NodeSnapshot {
                id: self.id,
                state: inner.state,
                details: inner.details.clone(),
                error: inner.error.clone(),
                incoming_tag: inner.incoming_tag.flatten(),
                in_tag_resolved: inner.in_tag_resolved,
                attributes: inner.attributes.clone(),
                created_at: self.created_at,
                started_at: inner.started_at,
                ended_at: inner.ended_at,
                children: Vec::new(),
                tag_linked: Vec::new(),
            }
        };

        for (link, child) in self.children() {
            match link {
                LinkKind::Child => snapshot.children.push(child.snapshot()),
                LinkKind::TagLinked => snapshot.tag_linked.push(child.id()),
            }
        }
        snapshot
    }
}

fn collect_subtree(node: &Arc<TracerNode>, out: &mut Vec<Arc<TracerNode>>) {
    out.push(Arc::clone(node));
    for (link, child) in node.children() {
        if link == LinkKind::Child {
            collect_subtree(&child, out);
        }
    }
}

impl fmt::Display for TracerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.id)
    }
}

/// Serializable view of a completed tracer tree
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    /// Tracer id
    pub id: TracerId,

    /// State at snapshot time
    pub state: TracerState,

    /// Kind and kind-specific fields
    #[serde(flatten)]
    pub details: TracerDetails,

    /// Attached error
    pub error: Option<ErrorInfo>,

    /// Id carried by the incoming tag
    pub incoming_tag: Option<TracerId>,

    /// Whether the incoming tag was matched to its producer
    pub in_tag_resolved: bool,

    /// Custom request attributes, in insertion order
    pub attributes: Vec<(String, AttributeValue)>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,

    /// Child-linked children
    pub children: Vec<NodeSnapshot>,

    /// Ids of tag-linked children
    pub tag_linked: Vec<TracerId>,
}
