//! Completed-path archive
//!
//! Roots of paths whose stack emptied are appended here. The archive is the
//! only structure shared between application threads, so every access goes
//! through its lock.

use crate::node::{NodeSnapshot, TracerNode};
use crate::tag::TracerId;
use parking_lot::Mutex;
use std::sync::Arc;

/// Append-only list of completed path roots
#[derive(Debug, Default)]
pub struct PathArchive {
    roots: Mutex<Vec<Arc<TracerNode>>>,
}

impl PathArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, root: Arc<TracerNode>) {
        self.roots.lock().push(root);
    }

    /// Copy of the completed roots, in completion order
    pub fn roots(&self) -> Vec<Arc<TracerNode>> {
        self.roots.lock().clone()
    }

    /// Run `f` with the roots while holding the archive lock
    ///
    /// Appends from other threads wait until `f` returns.
    pub fn with_roots<R>(&self, f: impl FnOnce(&[Arc<TracerNode>]) -> R) -> R {
        let roots = self.roots.lock();
        f(&roots)
    }

    /// Every archived node: each root followed by its Child-linked subtree
    pub fn all_nodes(&self) -> Vec<Arc<TracerNode>> {
        self.with_roots(|roots| roots.iter().flat_map(|r| r.all_nodes_in_subtree()).collect())
    }

    /// Find an archived node by id
    pub fn find(&self, id: TracerId) -> Option<Arc<TracerNode>> {
        self.all_nodes().into_iter().find(|n| n.id() == id)
    }

    pub fn len(&self) -> usize {
        self.roots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.lock().is_empty()
    }

    /// Serializable copies of all completed trees
    pub fn snapshots(&self) -> Vec<NodeSnapshot> {
        self.roots().iter().map(|r| r.snapshot()).collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshots()).unwrap_or(serde_json::Value::Null)
    }

    /// Remove and return all archived roots, in completion order
    pub fn drain(&self) -> Vec<Arc<TracerNode>> {
        std::mem::take(&mut *self.roots.lock())
    }

    /// Drop all archived paths
    pub fn clear(&self) {
        self.roots.lock().clear();
    }
}
