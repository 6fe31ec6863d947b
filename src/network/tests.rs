//! Unit tests for stage behavior and network building.

use serde_json::json;

use crate::{
    graph::Graph,
    pattern::Pattern,
    schema::{Cardinality, Schema},
    token::{Polarity, Token},
    value::CompareOp,
};

use super::{AttrConstraint, MatchingNetwork, NetworkBuilder, StageKind};

fn thing_schema() -> Schema {
    Schema::builder()
        .ty("Thing")
        .ty_extends("Widget", "Thing")
        .relation("Thing", "link", "Thing", "rlink", Cardinality::OneToOne)
        .build()
        .unwrap()
}

fn graph_with_node(attr: &str, value: serde_json::Value) -> Graph {
    let mut graph = Graph::new(thing_schema());
    graph.add_node("Thing", "n1").unwrap();
    graph.set_attr("n1", attr, value).unwrap();
    graph
}

/// root -> attr-check(x > 3) -> store, the scenario of the four-case policy.
fn attr_check_network() -> (MatchingNetwork, super::StageId) {
    let mut network = MatchingNetwork::new();
    let check = network.add_stage(
        StageKind::AttrCheck {
            constraints: vec![AttrConstraint {
                attr: "x".to_string(),
                op: CompareOp::Gt,
                value: json!(3),
            }],
        },
        network.root(),
    );
    let store = network.add_stage(StageKind::Store { arity: 1 }, check);
    (network, store)
}

#[test]
fn test_attr_check_satisfied_add_passes() {
    let graph = graph_with_node("x", json!(5));
    let (mut network, store) = attr_check_network();
    let token = Token::node_event(Polarity::Add, "n1", ["x".to_string()]);
    network.propagate(&graph, token).unwrap();
    assert_eq!(network.stage(store).register().len(), 1);
}

#[test]
fn test_attr_check_irrelevant_change_dropped() {
    let graph = graph_with_node("x", json!(5));
    let (mut network, store) = attr_check_network();
    let token = Token::node_event(Polarity::Add, "n1", ["y".to_string()]);
    network.propagate(&graph, token).unwrap();
    assert_eq!(network.stage(store).register().len(), 0);
}

#[test]
fn test_attr_check_failed_evaluation_inverts() {
    let mut graph = graph_with_node("x", json!(5));
    let (mut network, store) = attr_check_network();
    network
        .propagate(
            &graph,
            Token::node_event(Polarity::Add, "n1", ["x".to_string()]),
        )
        .unwrap();
    assert_eq!(network.stage(store).register().len(), 1);

    // the attribute change breaks the constraint: the add token comes out
    // inverted and retracts the stored match
    graph.set_attr("n1", "x", json!(1)).unwrap();
    network
        .propagate(
            &graph,
            Token::node_event(Polarity::Add, "n1", ["x".to_string()]),
        )
        .unwrap();
    assert_eq!(network.stage(store).register().len(), 0);
}

#[test]
fn test_attr_check_remove_always_passes() {
    let graph = graph_with_node("x", json!(1));
    let (mut network, store) = attr_check_network();
    // nothing stored yet, so the removal is a no-op at the store, but it must
    // reach the store rather than being dropped at the check
    let token = Token::node_event(Polarity::Remove, "n1", []);
    network.propagate(&graph, token.clone()).unwrap();
    assert_eq!(network.stage(store).register().len(), 0);
}

#[test]
fn test_store_ignores_duplicate_add_and_absent_remove() {
    let graph = graph_with_node("x", json!(5));
    let mut network = MatchingNetwork::new();
    let store = network.add_stage(StageKind::Store { arity: 1 }, network.root());
    let add = Token::node_event(Polarity::Add, "n1", []);
    network.propagate(&graph, add.clone()).unwrap();
    network.propagate(&graph, add.clone()).unwrap();
    assert_eq!(network.stage(store).register().len(), 1);
    let remove = Token::node_event(Polarity::Remove, "n1", []);
    network.propagate(&graph, remove.clone()).unwrap();
    network.propagate(&graph, remove).unwrap();
    assert_eq!(network.stage(store).register().len(), 0);
}

#[test]
fn test_edge_check_matches_role_pair_only() {
    let graph = graph_with_node("x", json!(5));
    let mut network = MatchingNetwork::new();
    let check = network.add_stage(
        StageKind::EdgeCheck {
            roles: ("link".to_string(), "rlink".to_string()),
        },
        network.root(),
    );
    let store = network.add_stage(StageKind::Store { arity: 2 }, check);
    network
        .propagate(
            &graph,
            Token::edge_event(Polarity::Add, "a", "link", "rlink", "b"),
        )
        .unwrap();
    network
        .propagate(
            &graph,
            Token::edge_event(Polarity::Add, "a", "sites", "molecule", "b"),
        )
        .unwrap();
    assert_eq!(network.stage(store).register().len(), 1);
}

#[test]
fn test_alias_renames_and_filters_through_predecessor() {
    let graph = graph_with_node("x", json!(5));
    let mut network = MatchingNetwork::new();
    let store = network.add_stage(StageKind::Store { arity: 1 }, network.root());
    let alias = network.add_stage(
        StageKind::Alias {
            vars: vec!["A".to_string()],
        },
        store,
    );
    network
        .propagate(&graph, Token::node_event(Polarity::Add, "n1", []))
        .unwrap();
    let query = Token::from_bindings(
        Polarity::Add,
        [("A".to_string(), "n1".to_string())].into_iter().collect(),
    );
    let hits = network.filter(alias, &query).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].get("A"), Some("n1"));
}

#[test]
fn test_builder_reuses_shared_prefixes() {
    let mut graph = Graph::new(thing_schema());
    graph.add_node("Widget", "A").unwrap();
    let pattern_a = Pattern::capture("pa", &graph, &["A"], false).unwrap();
    let mut graph_b = Graph::new(thing_schema());
    graph_b.add_node("Widget", "A").unwrap();
    let pattern_b = Pattern::capture("pb", &graph_b, &["A"], false).unwrap();

    let mut network = MatchingNetwork::new();
    NetworkBuilder::wire(&mut network, &pattern_a).unwrap();
    let after_first = network.len();
    NetworkBuilder::wire(&mut network, &pattern_b).unwrap();
    // identical constraint prefix: the second pattern adds no stages at all
    assert_eq!(network.len(), after_first);
}

#[test]
fn test_builder_shares_type_chain_across_distinct_patterns() {
    let mut graph = Graph::new(thing_schema());
    graph.add_node("Widget", "A").unwrap();
    graph.set_attr("A", "x", json!(1)).unwrap();
    let constrained = Pattern::capture("pa", &graph, &["A"], false).unwrap();

    let mut plain_graph = Graph::new(thing_schema());
    plain_graph.add_node("Widget", "A").unwrap();
    let plain = Pattern::capture("pb", &plain_graph, &["A"], false).unwrap();

    let mut network = MatchingNetwork::new();
    NetworkBuilder::wire(&mut network, &plain).unwrap();
    let after_first = network.len();
    NetworkBuilder::wire(&mut network, &constrained).unwrap();
    // the Thing -> Widget type chain is shared; only the attribute check and
    // its store/alias are new
    assert_eq!(network.len(), after_first + 3);
}

#[test]
fn test_merges_hold_no_cross_product_without_edges() {
    let mut graph = Graph::new(thing_schema());
    graph.add_node("Thing", "A").unwrap();
    graph.add_node("Thing", "B").unwrap();
    graph.add_relation("A", "link", "B").unwrap();
    let pattern = Pattern::capture("pair", &graph, &["A"], true).unwrap();

    let mut network = MatchingNetwork::new();
    let terminal = NetworkBuilder::wire(&mut network, &pattern).unwrap();

    let mut live = Graph::new(thing_schema());
    for id in ["x", "y", "z"] {
        live.add_node("Thing", id).unwrap();
    }
    for id in ["x", "y", "z"] {
        network
            .propagate(&live, Token::node_event(Polarity::Add, id, []))
            .unwrap();
    }
    // candidates alone produce no partial joins: every merge keys on the
    // relation, so registers stay empty until an edge arrives
    for i in 0..network.len() {
        let stage = network.stage(super::StageId(i));
        if matches!(stage.kind, StageKind::Merge { .. }) {
            assert!(stage.register().is_empty());
        }
    }

    live.add_relation("x", "link", "y").unwrap();
    network
        .propagate(
            &live,
            Token::edge_event(Polarity::Add, "x", "link", "rlink", "y"),
        )
        .unwrap();
    assert_eq!(network.stage(terminal).register().len(), 1);
}

#[test]
fn test_merge_joins_node_and_edge_bindings() {
    let mut graph = Graph::new(thing_schema());
    graph.add_node("Thing", "A").unwrap();
    graph.add_node("Thing", "B").unwrap();
    graph.add_relation("A", "link", "B").unwrap();
    let pattern = Pattern::capture("pair", &graph, &["A"], true).unwrap();

    let mut network = MatchingNetwork::new();
    let terminal = NetworkBuilder::wire(&mut network, &pattern).unwrap();

    let mut live = Graph::new(thing_schema());
    live.add_node("Thing", "x").unwrap();
    live.add_node("Thing", "y").unwrap();
    live.add_relation("x", "link", "y").unwrap();

    network
        .propagate(&live, Token::node_event(Polarity::Add, "x", []))
        .unwrap();
    network
        .propagate(&live, Token::node_event(Polarity::Add, "y", []))
        .unwrap();
    assert_eq!(network.stage(terminal).register().len(), 0);
    network
        .propagate(
            &live,
            Token::edge_event(Polarity::Add, "x", "link", "rlink", "y"),
        )
        .unwrap();
    assert_eq!(network.stage(terminal).register().len(), 1);

    network
        .propagate(
            &live,
            Token::edge_event(Polarity::Remove, "x", "link", "rlink", "y"),
        )
        .unwrap();
    assert_eq!(network.stage(terminal).register().len(), 0);
}
