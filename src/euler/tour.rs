//! A single Euler tour: the closed node sequence of one component.

use ahash::AHashSet;

use crate::errors::RuleGraphError;

use super::index::{Edge, TourId};

/// The closed walk of one connected component, plus its tree and spare edge
/// sets. A rooted tour starts and ends with the same node.
///
/// The sequence is a contiguous `Vec`; splices are O(n) in the tour length,
/// which stays small for the bounded components this engine tracks.
#[derive(Clone, Debug)]
pub struct EulerTour {
    id: TourId,
    seq: Vec<String>,
    edges: AHashSet<Edge>,
    spares: AHashSet<Edge>,
}

impl EulerTour {
    pub fn new(id: TourId, nodes: impl IntoIterator<Item = String>) -> Self {
        Self {
            id,
            seq: nodes.into_iter().collect(),
            edges: AHashSet::new(),
            spares: AHashSet::new(),
        }
    }

    /// Singleton component: a tour of exactly one node.
    pub fn singleton(id: TourId, node: impl Into<String>) -> Self {
        Self::new(id, [node.into()])
    }

    pub fn id(&self) -> TourId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn contains(&self, node: &str) -> bool {
        self.seq.iter().any(|n| n == node)
    }

    pub fn sequence(&self) -> &[String] {
        &self.seq
    }

    /// Distinct nodes of the tour, sorted.
    pub fn nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.seq.to_vec();
        nodes.sort();
        nodes.dedup();
        nodes
    }

    pub fn edges(&self) -> &AHashSet<Edge> {
        &self.edges
    }

    pub fn spares(&self) -> &AHashSet<Edge> {
        &self.spares
    }

    pub fn first_occurrence(&self, node: &str) -> Option<usize> {
        self.seq.iter().position(|n| n == node)
    }

    pub fn last_occurrence(&self, node: &str) -> Option<usize> {
        self.seq.iter().rposition(|n| n == node)
    }

    /// Index of the first adjacent occurrence of `u` directly followed by `v`.
    pub fn find_pair(&self, u: &str, v: &str) -> Option<usize> {
        self.seq
            .windows(2)
            .position(|pair| pair[0] == u && pair[1] == v)
    }

    pub fn is_rooted_at(&self, node: &str) -> bool {
        self.seq.first().is_some_and(|first| first == node)
            && self.seq.last().is_some_and(|last| last == node)
    }

    /// Rotate the closed sequence so it begins at offset `i`.
    pub fn rotate(&mut self, i: usize) -> Result<(), RuleGraphError> {
        if i >= self.seq.len() {
            return Err(RuleGraphError::sequence_bounds(format!(
                "rotate offset {i} past length {}",
                self.seq.len()
            )));
        }
        if i == 0 {
            return Ok(());
        }
        // seq[i..] ++ seq[1..i] ++ [seq[i]]: drop the duplicated old root,
        // close at the new one
        let mut rotated = Vec::with_capacity(self.seq.len());
        rotated.extend_from_slice(&self.seq[i..]);
        rotated.extend_from_slice(&self.seq[1..i]);
        rotated.push(self.seq[i].clone());
        self.seq = rotated;
        Ok(())
    }

    /// Rotate so the tour starts and ends at `node`.
    pub fn reroot(&mut self, node: &str) -> Result<(), RuleGraphError> {
        let i = self.first_occurrence(node).ok_or_else(|| {
            RuleGraphError::not_found(format!("node {node} not in tour {}", self.id))
        })?;
        self.rotate(i)
    }

    /// Rotate so the tour starts at the `u, v` boundary pair.
    pub fn reroot_pair(&mut self, u: &str, v: &str) -> Result<(), RuleGraphError> {
        let i = self.find_pair(u, v).ok_or_else(|| {
            RuleGraphError::not_found(format!("pair ({u}, {v}) not in tour {}", self.id))
        })?;
        self.rotate(i)
    }

    pub fn insert_sequence(
        &mut self,
        idx: usize,
        nodes: impl IntoIterator<Item = String>,
    ) -> Result<(), RuleGraphError> {
        if idx > self.seq.len() {
            return Err(RuleGraphError::sequence_bounds(format!(
                "insert offset {idx} past length {}",
                self.seq.len()
            )));
        }
        self.seq.splice(idx..idx, nodes);
        Ok(())
    }

    pub fn delete_sequence(&mut self, idx: usize, length: usize) -> Result<(), RuleGraphError> {
        if idx + length > self.seq.len() {
            return Err(RuleGraphError::sequence_bounds(format!(
                "delete range {idx}..{} past length {}",
                idx + length,
                self.seq.len()
            )));
        }
        self.seq.drain(idx..idx + length);
        Ok(())
    }

    pub fn extend_left(
        &mut self,
        nodes: impl IntoIterator<Item = String>,
    ) -> Result<(), RuleGraphError> {
        self.insert_sequence(0, nodes)
    }

    pub fn extend_right(
        &mut self,
        nodes: impl IntoIterator<Item = String>,
    ) -> Result<(), RuleGraphError> {
        self.insert_sequence(self.seq.len(), nodes)
    }

    pub fn shrink_left(&mut self, length: usize) -> Result<(), RuleGraphError> {
        self.delete_sequence(0, length)
    }

    pub fn shrink_right(&mut self, length: usize) -> Result<(), RuleGraphError> {
        let idx = self.seq.len().checked_sub(length).ok_or_else(|| {
            RuleGraphError::sequence_bounds(format!(
                "shrink {length} past length {}",
                self.seq.len()
            ))
        })?;
        self.delete_sequence(idx, length)
    }

    pub fn add_edges(&mut self, edges: impl IntoIterator<Item = Edge>) {
        self.edges.extend(edges);
    }

    pub fn add_spares(&mut self, spares: impl IntoIterator<Item = Edge>) {
        self.spares.extend(spares);
    }

    pub fn remove_edges<'a>(&mut self, edges: impl IntoIterator<Item = &'a Edge>) {
        for edge in edges {
            self.edges.remove(edge);
        }
    }

    /// Remove exactly the given spare edges; absent entries are ignored.
    pub fn remove_spares<'a>(&mut self, spares: impl IntoIterator<Item = &'a Edge>) {
        for spare in spares {
            self.spares.remove(spare);
        }
    }

    pub(super) fn set_sequence(&mut self, seq: Vec<String>) {
        self.seq = seq;
    }

    pub(super) fn take_parts(self) -> (Vec<String>, AHashSet<Edge>, AHashSet<Edge>) {
        (self.seq, self.edges, self.spares)
    }
}
