//! In-memory attributed graph consumed by the matching core.
//!
//! Nodes carry a type name from an explicit [`Schema`] and a JSON map of
//! scalar attributes. Relations live in a symmetric adjacency table keyed by
//! `(node_id, attribute_name)`; every mutation maintains both directions using
//! the schema's inverse attribute name, so the core can treat relations as
//! plain directed edge records.

use std::collections::BTreeSet;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    errors::RuleGraphError,
    schema::{RelationDef, Schema},
};

/// A typed node with scalar attributes. Relations are stored on the graph,
/// not the node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: String,
    pub attrs: serde_json::Map<String, Value>,
}

impl Node {
    pub fn get_attr(&self, attr: &str) -> Option<&Value> {
        self.attrs.get(attr)
    }

    /// Names of non-null scalar attributes, sorted. The identity field is not
    /// an attribute.
    pub fn nonempty_scalar_attrs(&self) -> Vec<String> {
        let mut attrs: Vec<String> = self
            .attrs
            .iter()
            .filter(|(name, value)| name.as_str() != "id" && !value.is_null())
            .map(|(name, _)| name.clone())
            .collect();
        attrs.sort();
        attrs
    }
}

/// The live graph: schema-typed nodes plus the symmetric adjacency table.
#[derive(Clone, Debug)]
pub struct Graph {
    schema: Schema,
    nodes: AHashMap<String, Node>,
    adjacency: AHashMap<(String, String), BTreeSet<String>>,
}

impl Graph {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            nodes: AHashMap::new(),
            adjacency: AHashMap::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Node ids in sorted order.
    pub fn node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn add_node(
        &mut self,
        kind: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<(), RuleGraphError> {
        let (kind, id) = (kind.into(), id.into());
        if !self.schema.has_type(&kind) {
            return Err(RuleGraphError::invalid_input(format!(
                "unknown node type: {kind}"
            )));
        }
        if self.nodes.contains_key(&id) {
            return Err(RuleGraphError::invalid_input(format!(
                "node id already present: {id}"
            )));
        }
        self.nodes.insert(
            id.clone(),
            Node {
                id,
                kind,
                attrs: serde_json::Map::new(),
            },
        );
        Ok(())
    }

    pub fn remove_node(&mut self, id: &str) -> Result<Node, RuleGraphError> {
        if !self.nonempty_relation_attrs(id)?.is_empty() {
            return Err(RuleGraphError::invalid_input(format!(
                "node {id} still has relations"
            )));
        }
        self.nodes
            .remove(id)
            .ok_or_else(|| RuleGraphError::not_found(format!("node {id}")))
    }

    pub fn node(&self, id: &str) -> Result<&Node, RuleGraphError> {
        self.nodes
            .get(id)
            .ok_or_else(|| RuleGraphError::not_found(format!("node {id}")))
    }

    pub fn is_instance(&self, id: &str, type_name: &str) -> Result<bool, RuleGraphError> {
        let node = self.node(id)?;
        Ok(self.schema.is_instance(&node.kind, type_name))
    }

    pub fn set_attr(
        &mut self,
        id: &str,
        attr: impl Into<String>,
        value: Value,
    ) -> Result<(), RuleGraphError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| RuleGraphError::not_found(format!("node {id}")))?;
        node.attrs.insert(attr.into(), value);
        Ok(())
    }

    pub fn get_attr(&self, id: &str, attr: &str) -> Result<Option<&Value>, RuleGraphError> {
        Ok(self.node(id)?.get_attr(attr))
    }

    fn relation_def(&self, id: &str, attr: &str) -> Result<RelationDef, RuleGraphError> {
        let node = self.node(id)?;
        self.schema
            .relation(&node.kind, attr)
            .cloned()
            .ok_or_else(|| {
                RuleGraphError::invalid_input(format!(
                    "no relation attribute {attr} on type {}",
                    node.kind
                ))
            })
    }

    /// Connect `a --attr--> b`, and symmetrically `b --inverse--> a`.
    /// To-one cardinalities reject a second target on either side.
    pub fn add_relation(&mut self, a: &str, attr: &str, b: &str) -> Result<(), RuleGraphError> {
        let rel = self.relation_def(a, attr)?;
        if !self.is_instance(b, &rel.target_type)? {
            return Err(RuleGraphError::invalid_input(format!(
                "node {b} is not a {}",
                rel.target_type
            )));
        }
        let forward = (a.to_string(), attr.to_string());
        let backward = (b.to_string(), rel.inverse_attr.clone());
        if rel.cardinality.is_to_one() && !self.adjacency.get(&forward).is_none_or(BTreeSet::is_empty)
        {
            return Err(RuleGraphError::invalid_input(format!(
                "{a}.{attr} is to-one and already set"
            )));
        }
        if rel.cardinality.inverse().is_to_one()
            && !self.adjacency.get(&backward).is_none_or(BTreeSet::is_empty)
        {
            return Err(RuleGraphError::invalid_input(format!(
                "{b}.{} is to-one and already set",
                rel.inverse_attr
            )));
        }
        self.adjacency.entry(forward).or_default().insert(b.to_string());
        self.adjacency.entry(backward).or_default().insert(a.to_string());
        Ok(())
    }

    /// Disconnect `a --attr--> b` and its inverse.
    pub fn remove_relation(&mut self, a: &str, attr: &str, b: &str) -> Result<(), RuleGraphError> {
        let rel = self.relation_def(a, attr)?;
        let forward = (a.to_string(), attr.to_string());
        let backward = (b.to_string(), rel.inverse_attr.clone());
        let present = self
            .adjacency
            .get_mut(&forward)
            .is_some_and(|targets| targets.remove(b));
        if !present {
            return Err(RuleGraphError::not_found(format!("relation {a}.{attr} -> {b}")));
        }
        if let Some(targets) = self.adjacency.get_mut(&backward) {
            targets.remove(a);
        }
        Ok(())
    }

    /// Current targets of `id.attr`, in sorted order.
    pub fn related(&self, id: &str, attr: &str) -> Vec<String> {
        self.adjacency
            .get(&(id.to_string(), attr.to_string()))
            .map(|targets| targets.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Relation attribute names of a node with at least one target, sorted.
    pub fn nonempty_relation_attrs(&self, id: &str) -> Result<Vec<String>, RuleGraphError> {
        let node = self.node(id)?;
        Ok(self
            .schema
            .relation_attrs(&node.kind)
            .into_iter()
            .filter(|attr| !self.related(id, attr).is_empty())
            .collect())
    }

    /// Copy a node's scalar attributes into `target` under a new id.
    /// Relations are not copied; see [`Graph::duplicate_relations`].
    pub fn duplicate_node(
        &self,
        id: &str,
        target: &mut Graph,
        new_id: impl Into<String>,
    ) -> Result<(), RuleGraphError> {
        let node = self.node(id)?;
        let new_id = new_id.into();
        target.add_node(node.kind.clone(), new_id.clone())?;
        let copy = target
            .nodes
            .get_mut(&new_id)
            .ok_or_else(|| RuleGraphError::not_found(format!("node {new_id}")))?;
        copy.attrs = node.attrs.clone();
        Ok(())
    }

    /// Copy a node's relation edges into `target`, translating endpoints
    /// through `remap` (old id -> new id). Edges whose far endpoint is not in
    /// the remap are skipped; each undirected edge is laid down once.
    pub fn duplicate_relations(
        &self,
        id: &str,
        target: &mut Graph,
        remap: &AHashMap<String, String>,
    ) -> Result<(), RuleGraphError> {
        let new_id = remap
            .get(id)
            .ok_or_else(|| RuleGraphError::not_found(format!("no remap entry for {id}")))?;
        for attr in self.nonempty_relation_attrs(id)? {
            for other in self.related(id, &attr) {
                let Some(new_other) = remap.get(&other) else {
                    continue;
                };
                if target.related(new_id, &attr).contains(new_other) {
                    continue;
                }
                target.add_relation(new_id, &attr, new_other)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Cardinality;
    use serde_json::json;

    fn bond_schema() -> Schema {
        Schema::builder()
            .ty("Site")
            .ty("Bond")
            .relation("Bond", "sites", "Site", "bond", Cardinality::OneToMany)
            .build()
            .unwrap()
    }

    fn small_graph() -> Graph {
        let mut graph = Graph::new(bond_schema());
        graph.add_node("Site", "s1").unwrap();
        graph.add_node("Site", "s2").unwrap();
        graph.add_node("Bond", "b1").unwrap();
        graph.add_relation("b1", "sites", "s1").unwrap();
        graph.add_relation("b1", "sites", "s2").unwrap();
        graph
    }

    #[test]
    fn test_relations_are_symmetric() {
        let graph = small_graph();
        assert_eq!(graph.related("b1", "sites"), vec!["s1", "s2"]);
        assert_eq!(graph.related("s1", "bond"), vec!["b1"]);
        assert_eq!(graph.nonempty_relation_attrs("s2").unwrap(), vec!["bond"]);
    }

    #[test]
    fn test_to_one_cardinality_rejected() {
        let mut graph = small_graph();
        graph.add_node("Bond", "b2").unwrap();
        // s1.bond is many-to-one seen from the site: at most one bond
        let err = graph.add_relation("b2", "sites", "s1");
        assert!(matches!(err, Err(RuleGraphError::InvalidInput(_))));
    }

    #[test]
    fn test_remove_relation_clears_both_directions() {
        let mut graph = small_graph();
        graph.remove_relation("b1", "sites", "s1").unwrap();
        assert_eq!(graph.related("b1", "sites"), vec!["s2"]);
        assert!(graph.related("s1", "bond").is_empty());
        assert!(graph.remove_relation("b1", "sites", "s1").is_err());
    }

    #[test]
    fn test_remove_node_requires_no_relations() {
        let mut graph = small_graph();
        assert!(graph.remove_node("s1").is_err());
        graph.remove_relation("b1", "sites", "s1").unwrap();
        assert!(graph.remove_node("s1").is_ok());
    }

    #[test]
    fn test_duplicate_node_and_relations() {
        let graph = small_graph();
        let mut copy = Graph::new(bond_schema());
        let remap: AHashMap<String, String> = [("s1", "t1"), ("s2", "t2"), ("b1", "c1")]
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        for id in graph.node_ids() {
            let new_id = remap.get(&id).unwrap().clone();
            graph.duplicate_node(&id, &mut copy, new_id).unwrap();
        }
        for id in graph.node_ids() {
            graph.duplicate_relations(&id, &mut copy, &remap).unwrap();
        }
        assert_eq!(copy.related("c1", "sites"), vec!["t1", "t2"]);
        assert_eq!(copy.related("t1", "bond"), vec!["c1"]);
    }

    #[test]
    fn test_scalar_attrs_sorted_nonnull() {
        let mut graph = small_graph();
        graph.set_attr("s1", "ph", json!(true)).unwrap();
        graph.set_attr("s1", "count", json!(3)).unwrap();
        graph.set_attr("s1", "label", json!(null)).unwrap();
        let node = graph.node("s1").unwrap();
        assert_eq!(node.nonempty_scalar_attrs(), vec!["count", "ph"]);
    }
}
