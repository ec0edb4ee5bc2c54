//! Tag correlation across completed paths
//!
//! Paths end up in the archive as independent trees. This crate stitches
//! them together by matching each incoming tag to the tracer that issued it.

pub mod resolver;

pub use resolver::{
    resolve_pending, ResolutionReport, ResolutionSummary, ResolverConfig, TagResolver,
};
