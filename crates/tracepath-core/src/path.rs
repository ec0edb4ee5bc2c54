//! Per-thread paths
//!
//! A path is the stack of started tracers on one thread for one session. Paths
//! live in thread-local storage keyed by session, so several sessions can be
//! in use on the same thread without seeing each other's tracers.

use crate::error::{TracerError, TracerResult};
use crate::kind::Capability;
use crate::node::{LinkKind, TracerNode, TracerState};
use crate::session::SessionId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

thread_local! {
    static PATHS: RefCell<HashMap<SessionId, Path>> = RefCell::new(HashMap::new());
}

/// Stack of started tracers on the calling thread
#[derive(Debug, Default)]
pub struct Path {
    stack: Vec<Arc<TracerNode>>,
}

impl Path {
    /// Innermost active tracer
    pub fn top(&self) -> Option<&Arc<TracerNode>> {
        self.stack.last()
    }

    /// Outermost tracer, the root of the tree being built
    pub fn root(&self) -> Option<&Arc<TracerNode>> {
        self.stack.first()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Push a created tracer, linking it below the current top
    ///
    /// On an empty path the tracer becomes the root of a new tree, which only
    /// entrypoint kinds may do.
    pub fn push(&mut self, node: &Arc<TracerNode>) -> TracerResult<()> {
        node.check_state(TracerState::Created)?;
        match self.stack.last() {
            Some(top) => top.add_child(LinkKind::Child, Arc::clone(node)),
            None if node.kind().supports(Capability::Entrypoint) => {}
            None => {
                return Err(TracerError::NoActivePath {
                    tracer: node.to_string(),
                })
            }
        }
        self.stack.push(Arc::clone(node));
        Ok(())
    }

    /// Pop `node`, which must be the top
    ///
    /// Returns the root if the path became empty.
    pub fn pop(&mut self, node: &Arc<TracerNode>) -> TracerResult<Option<Arc<TracerNode>>> {
        match self.stack.last() {
            Some(top) if Arc::ptr_eq(top, node) => {}
            Some(top) => {
                return Err(TracerError::OutOfOrderEnd {
                    tracer: node.to_string(),
                    active: top.to_string(),
                })
            }
            None => {
                return Err(TracerError::OutOfOrderEnd {
                    tracer: node.to_string(),
                    active: "nothing".to_string(),
                })
            }
        }
        let popped = self.stack.pop();
        Ok(if self.stack.is_empty() { popped } else { None })
    }
}

/// Run `f` with the calling thread's path for `session`
///
/// With `create` set a missing path is created first. A path left empty by `f`
/// is removed. `f` must not call back into this function.
pub fn with_current<R>(
    session: SessionId,
    create: bool,
    f: impl FnOnce(Option<&mut Path>) -> R,
) -> R {
    PATHS.with(|paths| {
        let mut paths = paths.borrow_mut();
        if create {
            paths.entry(session).or_default();
        }
        let result = f(paths.get_mut(&session));
        if paths.get(&session).is_some_and(Path::is_empty) {
            paths.remove(&session);
        }
        result
    })
}

/// Innermost active tracer of `session` on the calling thread
pub fn current_top(session: SessionId) -> Option<Arc<TracerNode>> {
    with_current(session, false, |path| path.and_then(|p| p.top().cloned()))
}

/// Depth of the calling thread's path for `session`, zero if there is none
pub fn current_depth(session: SessionId) -> usize {
    with_current(session, false, |path| path.map_or(0, |p| p.depth()))
}
