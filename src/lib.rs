//! Incremental graph-pattern matching for rule-based simulation.
//!
//! Two engines cooperate over an attributed, linked node graph: a
//! token-propagating matching network that keeps the currently valid bindings
//! of every registered pattern up to date as the graph mutates, and an
//! Euler-tour connectivity index answering same-component queries under
//! online link/cut updates. Run Criterion benchmarks with `cargo bench` to
//! inspect reports under `target/criterion`.

pub mod bench_utils;
pub mod errors;
pub mod euler;
pub mod graph;
pub mod matcher;
pub mod network;
pub mod pattern;
pub mod schema;
pub mod token;
pub mod value;

pub use crate::errors::RuleGraphError;
pub use crate::euler::{CutOutcome, EulerTour, EulerTourIndex, TourId};
pub use crate::graph::{Graph, Node};
pub use crate::matcher::Matcher;
pub use crate::network::{MatchingNetwork, NetworkBuilder, StageId, StageKind};
pub use crate::pattern::{AttrQuery, Pattern, PatternQueries, RelQuery};
pub use crate::schema::{Cardinality, Schema, SchemaBuilder};
pub use crate::token::{Polarity, Token, TokenRegister};
pub use crate::value::CompareOp;
