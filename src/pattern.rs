//! Template subgraphs and their compilation into query families.
//!
//! A pattern is captured from a graph by transitive closure over non-empty
//! relation attributes and is immutable once compiled. Compilation emits three
//! deterministic query families (type, attribute, relation) so that two
//! structurally identical patterns always compile to identical query sets,
//! which is what lets the network builder discover shared prefixes.

use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{errors::RuleGraphError, graph::Graph, value::CompareOp};

/// One attribute constraint on a pattern node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttrQuery {
    pub node: String,
    pub attr: String,
    pub op: CompareOp,
    pub value: Value,
}

/// One undirected relation of the pattern, in canonical orientation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelQuery {
    pub node_a: String,
    pub attr_a: String,
    pub attr_b: String,
    pub node_b: String,
}

/// Compiled query families, keyed by pattern node id where applicable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternQueries {
    /// Per node: ancestor type chain, most general first.
    pub types: BTreeMap<String, Vec<String>>,
    /// Per node: attribute constraints in sorted attribute order.
    pub attrs: BTreeMap<String, Vec<AttrQuery>>,
    /// Each undirected relation exactly once.
    pub rels: Vec<RelQuery>,
}

/// A named, deduplicated template subgraph.
#[derive(Clone, Debug)]
pub struct Pattern {
    name: String,
    graph: Graph,
    constraints: Vec<AttrQuery>,
}

impl Pattern {
    /// Capture the subgraph reachable from `seeds` by transitive closure over
    /// non-empty relation attributes. With `recurse` false only the seeds are
    /// captured. Traversal is guarded by a visited set, so cyclic structures
    /// terminate and no node is captured twice.
    pub fn capture(
        name: impl Into<String>,
        source: &Graph,
        seeds: &[&str],
        recurse: bool,
    ) -> Result<Pattern, RuleGraphError> {
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut frontier: Vec<String> = seeds.iter().map(|s| s.to_string()).collect();
        while let Some(id) = frontier.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if !recurse {
                continue;
            }
            for attr in source.nonempty_relation_attrs(&id)? {
                for other in source.related(&id, &attr) {
                    if !visited.contains(&other) {
                        frontier.push(other);
                    }
                }
            }
        }

        let mut graph = Graph::new(source.schema().clone());
        let remap: AHashMap<String, String> =
            visited.iter().map(|id| (id.clone(), id.clone())).collect();
        for id in &visited {
            source.duplicate_node(id, &mut graph, id.clone())?;
        }
        if recurse {
            for id in &visited {
                source.duplicate_relations(id, &mut graph, &remap)?;
            }
        }
        Ok(Pattern {
            name: name.into(),
            graph,
            constraints: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Variable names of the pattern, sorted: one per captured node.
    pub fn variables(&self) -> Vec<String> {
        self.graph.node_ids()
    }

    /// Add an explicit attribute constraint, replacing the captured
    /// equality for that node/attribute. The operator name is parsed here so
    /// an unknown operator is rejected before the pattern is wired in.
    pub fn constrain(
        mut self,
        node: impl Into<String>,
        attr: impl Into<String>,
        op: &str,
        value: Value,
    ) -> Result<Pattern, RuleGraphError> {
        let node = node.into();
        if !self.graph.contains(&node) {
            return Err(RuleGraphError::not_found(format!("pattern node {node}")));
        }
        self.constraints.push(AttrQuery {
            node,
            attr: attr.into(),
            op: CompareOp::parse(op)?,
            value,
        });
        Ok(self)
    }

    /// Compile the three query families.
    pub fn compile(&self) -> Result<PatternQueries, RuleGraphError> {
        Ok(PatternQueries {
            types: self.type_queries()?,
            attrs: self.attr_queries()?,
            rels: self.rel_queries()?,
        })
    }

    fn type_queries(&self) -> Result<BTreeMap<String, Vec<String>>, RuleGraphError> {
        let mut queries = BTreeMap::new();
        for id in self.graph.node_ids() {
            let node = self.graph.node(&id)?;
            queries.insert(id, self.graph.schema().ancestry(&node.kind));
        }
        Ok(queries)
    }

    fn attr_queries(&self) -> Result<BTreeMap<String, Vec<AttrQuery>>, RuleGraphError> {
        let mut queries: BTreeMap<String, Vec<AttrQuery>> = BTreeMap::new();
        for id in self.graph.node_ids() {
            let node = self.graph.node(&id)?;
            let explicit: Vec<&AttrQuery> =
                self.constraints.iter().filter(|c| c.node == id).collect();
            let mut list: Vec<AttrQuery> = explicit.iter().map(|c| (*c).clone()).collect();
            for attr in node.nonempty_scalar_attrs() {
                if explicit.iter().any(|c| c.attr == attr) {
                    continue;
                }
                list.push(AttrQuery {
                    node: id.clone(),
                    attr: attr.clone(),
                    op: CompareOp::Eq,
                    value: node.get_attr(&attr).cloned().unwrap_or(Value::Null),
                });
            }
            list.sort_by(|a, b| a.attr.cmp(&b.attr));
            if !list.is_empty() {
                queries.insert(id, list);
            }
        }
        Ok(queries)
    }

    /// Emit each undirected relation exactly once: a node whose relations have
    /// all been visited is never revisited from the other end, and the
    /// direction is fixed by comparing the two attribute names.
    fn rel_queries(&self) -> Result<Vec<RelQuery>, RuleGraphError> {
        let mut queries = Vec::new();
        let mut processed: BTreeSet<String> = BTreeSet::new();
        for id in self.graph.node_ids() {
            let node = self.graph.node(&id)?;
            for attr in self.graph.nonempty_relation_attrs(&id)? {
                let inverse = self
                    .graph
                    .schema()
                    .inverse_of(&node.kind, &attr)
                    .ok_or_else(|| {
                        RuleGraphError::invalid_input(format!(
                            "no inverse for {}.{attr}",
                            node.kind
                        ))
                    })?
                    .to_string();
                for other in self.graph.related(&id, &attr) {
                    if processed.contains(&other) {
                        continue;
                    }
                    let query = if attr <= inverse {
                        RelQuery {
                            node_a: id.clone(),
                            attr_a: attr.clone(),
                            attr_b: inverse.clone(),
                            node_b: other,
                        }
                    } else {
                        RelQuery {
                            node_a: other,
                            attr_a: inverse.clone(),
                            attr_b: attr.clone(),
                            node_b: id.clone(),
                        }
                    };
                    queries.push(query);
                }
            }
            processed.insert(id);
        }
        Ok(queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cardinality, Schema};
    use serde_json::json;

    fn linked_schema() -> Schema {
        Schema::builder()
            .ty("Thing")
            .relation("Thing", "link", "Thing", "rlink", Cardinality::OneToOne)
            .build()
            .unwrap()
    }

    fn linked_graph() -> Graph {
        let mut graph = Graph::new(linked_schema());
        graph.add_node("Thing", "A").unwrap();
        graph.add_node("Thing", "B").unwrap();
        graph.set_attr("A", "count", json!(3)).unwrap();
        graph.add_relation("A", "link", "B").unwrap();
        graph
    }

    #[test]
    fn test_capture_closure_and_single_node() {
        let graph = linked_graph();
        let full = Pattern::capture("p", &graph, &["A"], true).unwrap();
        assert_eq!(full.variables(), vec!["A", "B"]);
        let single = Pattern::capture("q", &graph, &["A"], false).unwrap();
        assert_eq!(single.variables(), vec!["A"]);
    }

    #[test]
    fn test_relation_emitted_once_in_canonical_orientation() {
        let graph = linked_graph();
        let queries = Pattern::capture("p", &graph, &["A"], true)
            .unwrap()
            .compile()
            .unwrap();
        assert_eq!(
            queries.rels,
            vec![RelQuery {
                node_a: "A".into(),
                attr_a: "link".into(),
                attr_b: "rlink".into(),
                node_b: "B".into(),
            }]
        );
    }

    #[test]
    fn test_attr_queries_captured_as_equality() {
        let graph = linked_graph();
        let queries = Pattern::capture("p", &graph, &["A"], true)
            .unwrap()
            .compile()
            .unwrap();
        let a_attrs = queries.attrs.get("A").unwrap();
        assert_eq!(a_attrs.len(), 1);
        assert_eq!(a_attrs[0].attr, "count");
        assert_eq!(a_attrs[0].op, CompareOp::Eq);
        assert_eq!(a_attrs[0].value, json!(3));
        assert!(queries.attrs.get("B").is_none());
    }

    #[test]
    fn test_explicit_constraint_overrides_capture() {
        let graph = linked_graph();
        let queries = Pattern::capture("p", &graph, &["A"], true)
            .unwrap()
            .constrain("A", "count", "gt", json!(1))
            .unwrap()
            .compile()
            .unwrap();
        let a_attrs = queries.attrs.get("A").unwrap();
        assert_eq!(a_attrs.len(), 1);
        assert_eq!(a_attrs[0].op, CompareOp::Gt);
    }

    #[test]
    fn test_unknown_operator_rejected_at_compile_time() {
        let graph = linked_graph();
        let err = Pattern::capture("p", &graph, &["A"], true)
            .unwrap()
            .constrain("A", "count", "contains", json!(1));
        assert!(matches!(err, Err(RuleGraphError::UnknownOperator(_))));
    }
}
