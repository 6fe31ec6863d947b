//! Seeded data generators shared by benchmarks and randomized tests.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    graph::Graph,
    schema::{Cardinality, Schema},
};

/// Schema used by benchmarks: one self-linking node type with a numeric
/// attribute.
pub fn bench_schema() -> Schema {
    Schema::builder()
        .ty("Thing")
        .relation("Thing", "link", "Thing", "rlink", Cardinality::OneToOne)
        .build()
        .expect("static schema must build")
}

/// Node id for index `i`, shared by all generators.
pub fn node_id(i: usize) -> String {
    format!("n{i}")
}

/// A chain graph n0 - n1 - ... of `nodes` linked nodes.
pub fn chain_graph(nodes: usize) -> Graph {
    let mut graph = Graph::new(bench_schema());
    for i in 0..nodes {
        graph.add_node("Thing", node_id(i)).expect("fresh node id");
    }
    for i in 1..nodes {
        graph
            .add_relation(&node_id(i - 1), "link", &node_id(i))
            .expect("chain edges are distinct");
    }
    graph
}

/// One structural update against a forest of `nodes` singletons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForestOp {
    Connect(usize, usize),
    Disconnect(usize, usize),
}

/// A seeded random sequence of valid connect/disconnect operations: an edge
/// is only disconnected while present and only connected while absent, so
/// replaying the sequence against any connectivity structure is always legal.
pub fn random_forest_ops(nodes: usize, count: usize, seed: u64) -> Vec<ForestOp> {
    assert!(nodes >= 2);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut present: Vec<(usize, usize)> = Vec::new();
    let mut ops = Vec::with_capacity(count);
    for _ in 0..count {
        let remove = !present.is_empty() && rng.gen_bool(0.4);
        if remove {
            let idx = rng.gen_range(0..present.len());
            let (u, v) = present.swap_remove(idx);
            ops.push(ForestOp::Disconnect(u, v));
        } else {
            // rejection-sample an absent pair
            let mut pair = None;
            for _ in 0..64 {
                let u = rng.gen_range(0..nodes);
                let v = rng.gen_range(0..nodes);
                if u != v && !present.contains(&(u, v)) && !present.contains(&(v, u)) {
                    pair = Some((u, v));
                    break;
                }
            }
            let Some((u, v)) = pair else { continue };
            present.push((u, v));
            ops.push(ForestOp::Connect(u, v));
        }
    }
    ops
}
