//! The incremental matching network.
//!
//! Patterns compile into a shared DAG of filtering and aggregation stages
//! rooted at a single entry point. Tokens injected at the root flow forward
//! through type, attribute and edge checks into stores and merges, which hold
//! the canonical registers of currently valid bindings. Stages are shared
//! between patterns whose constraint prefixes coincide.

pub use builder::NetworkBuilder;
pub use stage::{AttrConstraint, MatchingNetwork, Stage, StageId, StageKind};

mod builder;
mod stage;

#[cfg(test)]
mod tests;
