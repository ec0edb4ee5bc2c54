//! Tag resolution
//!
//! Links every archived node that carries an incoming tag to the archived node
//! that produced it. Producers and consumers usually live in different trees
//! (another thread, another process' export), so the link is recorded as a
//! `TagLinked` child on the producer and a linked parent on the consumer.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracepath_core::{PathArchive, Session, TracerId, TracerNode};
use tracing::{debug, warn};

/// Outcome of one resolution pass
#[derive(Debug, Default)]
pub struct ResolutionReport {
    /// Nodes linked to their producer in this pass
    pub linked: Vec<Arc<TracerNode>>,

    /// Nodes whose tag matched no archived producer
    pub unresolved: Vec<Arc<TracerNode>>,
}

impl ResolutionReport {
    /// Whether every tagged node is linked
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub fn summary(&self) -> ResolutionSummary {
        ResolutionSummary {
            linked: self.linked.iter().map(|n| n.id()).collect(),
            unresolved: self.unresolved.iter().map(|n| n.id()).collect(),
        }
    }
}

/// Serializable ids of a [`ResolutionReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    pub linked: Vec<TracerId>,
    pub unresolved: Vec<TracerId>,
}

/// Link tagged nodes in `archive` and return those left unresolved
///
/// Nodes linked by an earlier pass are skipped, so repeated calls never add
/// duplicate links.
pub fn resolve_pending(archive: &PathArchive) -> Vec<Arc<TracerNode>> {
    resolve_archive(archive).unresolved
}

fn resolve_archive(archive: &PathArchive) -> ResolutionReport {
    archive.with_roots(|roots| {
        let nodes: Vec<Arc<TracerNode>> = roots
            .iter()
            .flat_map(|root| root.all_nodes_in_subtree())
            .collect();
        let by_id: HashMap<TracerId, Arc<TracerNode>> = nodes
            .iter()
            .map(|node| (node.id(), Arc::clone(node)))
            .collect();

        let mut report = ResolutionReport::default();
        for node in nodes {
            if !node.has_incoming_tag() || node.is_in_tag_resolved() {
                continue;
            }
            // Undecodable tags carry no id and can never resolve
            match node.incoming_tag_id().and_then(|id| by_id.get(&id)) {
                Some(producer) => {
                    node.mark_resolved(producer);
                    report.linked.push(node);
                }
                None => report.unresolved.push(node),
            }
        }
        report
    })
}

/// Resolver configuration
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// Emit a diagnostic for every unresolved tag
    pub warn_unresolved: bool,
}

/// Session-bound resolver that keeps the correlation metrics current
pub struct TagResolver {
    session: Session,
    config: ResolverConfig,
}

impl TagResolver {
    pub fn new(session: Session) -> Self {
        Self::with_config(session, ResolverConfig::default())
    }

    pub fn with_config(session: Session, config: ResolverConfig) -> Self {
        Self { session, config }
    }

    /// Run a resolution pass over the session's archive
    pub fn resolve(&self) -> ResolutionReport {
        let report = resolve_archive(self.session.archive());

        self.session
            .metrics()
            .record_resolution(report.linked.len() as u64, report.unresolved.len() as u64);
        debug!(
            target: "tracepath",
            linked = report.linked.len(),
            unresolved = report.unresolved.len(),
            "tag resolution pass"
        );

        if self.config.warn_unresolved {
            for node in &report.unresolved {
                warn!(target: "tracepath", tracer = %node, "incoming tag has no archived producer");
                self.session
                    .warn(&format!("Unresolved incoming tag on {}", node));
            }
        }
        report
    }
}
