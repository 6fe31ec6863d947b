//! Facade over the matching network: pattern registration and event ingestion.

use ahash::AHashMap;

use crate::{
    errors::RuleGraphError,
    graph::Graph,
    network::{MatchingNetwork, NetworkBuilder, StageId},
    pattern::Pattern,
    token::{BindingKey, Polarity, Token},
};

/// Owns the shared network and translates external graph mutations into
/// tokens injected at the root.
///
/// Event ordering contract: removal events must be injected while the
/// affected node still exists in the graph, so type checks can still evaluate
/// it on the way down.
#[derive(Debug, Default)]
pub struct Matcher {
    network: MatchingNetwork,
    terminals: AHashMap<String, StageId>,
}

impl Matcher {
    pub fn new() -> Self {
        Self {
            network: MatchingNetwork::new(),
            terminals: AHashMap::new(),
        }
    }

    pub fn network(&self) -> &MatchingNetwork {
        &self.network
    }

    /// Compile a pattern and wire it into the network. Constraint prefixes
    /// already present are reused rather than duplicated.
    pub fn add_pattern(&mut self, pattern: &Pattern) -> Result<&mut Self, RuleGraphError> {
        if self.terminals.contains_key(pattern.name()) {
            return Err(RuleGraphError::invalid_input(format!(
                "pattern already registered: {}",
                pattern.name()
            )));
        }
        let terminal = NetworkBuilder::wire(&mut self.network, pattern)?;
        self.terminals.insert(pattern.name().to_string(), terminal);
        Ok(self)
    }

    /// A node was added to the graph. All of its non-empty attributes count
    /// as modified so attribute checks evaluate the initial state.
    pub fn node_added(&mut self, graph: &Graph, id: &str) -> Result<(), RuleGraphError> {
        let attrs = graph.node(id)?.nonempty_scalar_attrs();
        self.network
            .propagate(graph, Token::node_event(Polarity::Add, id, attrs))
    }

    /// A node is about to be removed from the graph.
    pub fn node_removed(&mut self, graph: &Graph, id: &str) -> Result<(), RuleGraphError> {
        self.network
            .propagate(graph, Token::node_event(Polarity::Remove, id, []))
    }

    /// Scalar attributes of a node changed value.
    pub fn attrs_changed(
        &mut self,
        graph: &Graph,
        id: &str,
        attrs: impl IntoIterator<Item = String>,
    ) -> Result<(), RuleGraphError> {
        self.network
            .propagate(graph, Token::node_event(Polarity::Add, id, attrs))
    }

    /// A relation was added between two nodes. The role pair is announced in
    /// whichever orientation the caller holds it; it is normalized here.
    pub fn edge_added(
        &mut self,
        graph: &Graph,
        a: &str,
        attr_a: &str,
        attr_b: &str,
        b: &str,
    ) -> Result<(), RuleGraphError> {
        for token in edge_tokens(Polarity::Add, a, attr_a, attr_b, b) {
            self.network.propagate(graph, token)?;
        }
        Ok(())
    }

    /// A relation is about to be removed.
    pub fn edge_removed(
        &mut self,
        graph: &Graph,
        a: &str,
        attr_a: &str,
        attr_b: &str,
        b: &str,
    ) -> Result<(), RuleGraphError> {
        for token in edge_tokens(Polarity::Remove, a, attr_a, attr_b, b) {
            self.network.propagate(graph, token)?;
        }
        Ok(())
    }

    /// Currently valid bindings of a registered pattern, sorted.
    pub fn matches(&self, pattern: &str) -> Result<Vec<BindingKey>, RuleGraphError> {
        let terminal = self
            .terminals
            .get(pattern)
            .ok_or_else(|| RuleGraphError::not_found(format!("pattern {pattern}")))?;
        // query through `filter` so alias terminals (single-node patterns)
        // answer from their predecessor store
        let all = Token::from_bindings(Polarity::Add, BindingKey::new());
        Ok(self
            .network
            .filter(*terminal, &all)?
            .into_iter()
            .map(|token| token.bindings)
            .collect())
    }
}

/// Tokens for one edge mutation, with the role pair brought into the same
/// canonical orientation that relation queries compile to: the smaller
/// attribute name first, matching [`crate::euler::canonize_edge`]. A
/// symmetric pair admits both variable assignments, so it yields a token for
/// each node orientation.
fn edge_tokens(polarity: Polarity, a: &str, attr_a: &str, attr_b: &str, b: &str) -> Vec<Token> {
    if attr_a == attr_b {
        vec![
            Token::edge_event(polarity, a, attr_a, attr_b, b),
            Token::edge_event(polarity, b, attr_a, attr_b, a),
        ]
    } else if attr_a > attr_b {
        vec![Token::edge_event(polarity, b, attr_b, attr_a, a)]
    } else {
        vec![Token::edge_event(polarity, a, attr_a, attr_b, b)]
    }
}
