//! The tour index: node-to-tour mapping and structural link/cut updates.

use std::fmt;

use ahash::AHashSet;

use crate::errors::RuleGraphError;

use super::tour::EulerTour;

/// An edge as `(node1, attr1, attr2, node2)`: endpoint, its relation
/// attribute, the inverse attribute, the far endpoint.
pub type Edge = (String, String, String, String);

/// Stable identity of a tour within one index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TourId(pub u64);

impl fmt::Display for TourId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tour-{}", self.0)
    }
}

/// The logical reverse of an edge.
pub fn flip_edge(edge: &Edge) -> Edge {
    (
        edge.3.clone(),
        edge.2.clone(),
        edge.1.clone(),
        edge.0.clone(),
    )
}

/// Deterministic orientation: an edge and its reverse canonize identically.
/// Ordered by attribute pair first, then endpoint id on an attribute tie,
/// the same tie-break that fixes relation-query emission.
pub fn canonize_edge(edge: &Edge) -> Edge {
    let (node1, attr1, attr2, node2) = edge;
    let as_is = attr1 < attr2 || (attr1 == attr2 && node1 <= node2);
    if as_is { edge.clone() } else { flip_edge(edge) }
}

/// Result of removing an edge from the forest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CutOutcome {
    /// The component stayed connected: the edge was a spare, or a spare
    /// bridged the two sides and was promoted to a tree edge.
    Retained(TourId),
    /// The component split in two; `retained` is the larger side and keeps
    /// the original tour id.
    Split { retained: TourId, split_off: TourId },
}

/// Partition of the node universe into disjoint Euler tours.
#[derive(Clone, Debug, Default)]
pub struct EulerTourIndex {
    tours: ahash::AHashMap<TourId, EulerTour>,
    tour_map: ahash::AHashMap<String, TourId>,
    next_id: u64,
}

impl EulerTourIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> TourId {
        let id = TourId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn tour_count(&self) -> usize {
        self.tours.len()
    }

    /// Ids of all live tours, sorted.
    pub fn tour_ids(&self) -> Vec<TourId> {
        let mut ids: Vec<TourId> = self.tours.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn tour(&self, id: TourId) -> Result<&EulerTour, RuleGraphError> {
        self.tours
            .get(&id)
            .ok_or_else(|| RuleGraphError::unknown_tour(id.to_string()))
    }

    pub fn tour_of(&self, node: &str) -> Option<TourId> {
        self.tour_map.get(node).copied()
    }

    pub fn remap_nodes(
        &mut self,
        nodes: impl IntoIterator<Item = String>,
        tour: Option<TourId>,
    ) {
        for node in nodes {
            match tour {
                Some(id) => {
                    self.tour_map.insert(node, id);
                }
                None => {
                    self.tour_map.remove(&node);
                }
            }
        }
    }

    /// Register a tour without touching the node map.
    pub fn add_tour(&mut self, tour: EulerTour) -> Result<(), RuleGraphError> {
        if self.tours.contains_key(&tour.id()) {
            return Err(RuleGraphError::duplicate_tour(tour.id().to_string()));
        }
        self.tours.insert(tour.id(), tour);
        Ok(())
    }

    /// Deregister a tour without touching the node map.
    pub fn remove_tour(&mut self, id: TourId) -> Result<EulerTour, RuleGraphError> {
        self.tours
            .remove(&id)
            .ok_or_else(|| RuleGraphError::unknown_tour(id.to_string()))
    }

    /// Register a tour and map all its nodes to it.
    pub fn add_new_tour(&mut self, tour: EulerTour) -> Result<(), RuleGraphError> {
        let id = tour.id();
        let nodes = tour.nodes();
        self.add_tour(tour)?;
        self.remap_nodes(nodes, Some(id));
        Ok(())
    }

    /// Deregister a tour and unmap all its nodes.
    pub fn delete_existing_tour(&mut self, id: TourId) -> Result<EulerTour, RuleGraphError> {
        let tour = self.remove_tour(id)?;
        self.remap_nodes(tour.nodes(), None);
        Ok(tour)
    }

    /// Create the singleton tour of a newly added node. The caller must only
    /// do this for nodes without outstanding relations.
    pub fn create_tour(&mut self, node: impl Into<String>) -> Result<TourId, RuleGraphError> {
        let node = node.into();
        if let Some(existing) = self.tour_of(&node) {
            return Err(RuleGraphError::node_already_mapped(format!(
                "{node} is in {existing}"
            )));
        }
        let id = self.alloc_id();
        self.add_new_tour(EulerTour::singleton(id, node))?;
        Ok(id)
    }

    /// Drop the tour a node is mapped to. The caller must only do this for
    /// singleton tours whose node has no outstanding relations.
    pub fn delete_tour_of(&mut self, node: &str) -> Result<EulerTour, RuleGraphError> {
        let id = self
            .tour_of(node)
            .ok_or_else(|| RuleGraphError::unknown_tour(format!("no tour maps {node}")))?;
        self.delete_existing_tour(id)
    }

    /// True iff every listed node maps to the same tour. Vacuously true for
    /// an empty list; any unmapped node is not connected.
    pub fn is_connected(&self, nodes: &[&str]) -> bool {
        let Some(first) = nodes.first() else {
            return true;
        };
        let Some(expected) = self.tour_of(first) else {
            return false;
        };
        nodes[1..]
            .iter()
            .all(|node| self.tour_of(node) == Some(expected))
    }

    /// Merge two distinct tours into a new closed tour rooted at `u`:
    /// `t1` rerooted at `u`, `t2` rerooted at `v`, concatenated and closed.
    /// The result is not installed; see [`EulerTourIndex::update_link`].
    pub fn link(
        &mut self,
        t1: TourId,
        t2: TourId,
        u: &str,
        v: &str,
    ) -> Result<EulerTour, RuleGraphError> {
        if t1 == t2 {
            return Err(RuleGraphError::invalid_input(format!(
                "cannot link {t1} to itself"
            )));
        }
        let mut left = self.tour(t1)?.clone();
        let mut right = self.tour(t2)?.clone();
        if !left.contains(u) {
            return Err(RuleGraphError::not_found(format!("{u} not in {t1}")));
        }
        if !right.contains(v) {
            return Err(RuleGraphError::not_found(format!("{v} not in {t2}")));
        }
        left.reroot(u)?;
        right.reroot(v)?;
        let mut seq: Vec<String> = left.sequence().to_vec();
        seq.extend_from_slice(right.sequence());
        seq.push(u.to_string());
        let id = self.alloc_id();
        Ok(EulerTour::new(id, seq))
    }

    /// Split a tour along the tree edge between `u` and `v`. Returns the two
    /// sides as fresh, uninstalled tours ordered big-then-small: longer tour
    /// first, ties broken toward the lexicographically smaller first element.
    /// The indexed tour is left untouched.
    pub fn cut(
        &mut self,
        t: TourId,
        u: &str,
        v: &str,
    ) -> Result<(EulerTour, EulerTour), RuleGraphError> {
        let mut tour = self.tour(t)?.clone();
        tour.reroot_pair(u, v)?;
        let seq = tour.sequence();
        let v2 = tour.last_occurrence(v).ok_or_else(|| {
            RuleGraphError::not_found(format!("{v} not in {t}"))
        })?;
        let inner: Vec<String> = seq[1..=v2].to_vec();
        let outer: Vec<String> = seq[v2 + 1..].to_vec();
        let inner_closed = inner.first() == inner.last() && inner.first().is_some_and(|n| n == v);
        let outer_closed = outer.first() == outer.last() && outer.first().is_some_and(|n| n == u);
        if !inner_closed || !outer_closed {
            return Err(RuleGraphError::invalid_input(format!(
                "({u}, {v}) is not a tree edge of {t}"
            )));
        }
        let (first, second) = order_sequences(inner, outer);
        let big = EulerTour::new(self.alloc_id(), first);
        let small = EulerTour::new(self.alloc_id(), second);
        Ok((big, small))
    }

    /// Install the result of a [`link`](EulerTourIndex::link): the bigger of
    /// the two source tours survives and absorbs the merged sequence, the
    /// smaller side's edges (plus the new tree edge) and spares, and the
    /// smaller side's node mappings. Union-by-size keeps total remap work
    /// O(n log n) over any operation sequence.
    pub fn update_link(
        &mut self,
        t1: TourId,
        t2: TourId,
        linked: EulerTour,
        edge: Edge,
    ) -> Result<TourId, RuleGraphError> {
        let len1 = self.tour(t1)?.len();
        let len2 = self.tour(t2)?.len();
        let first1 = self.tour(t1)?.sequence().first().cloned().unwrap_or_default();
        let first2 = self.tour(t2)?.sequence().first().cloned().unwrap_or_default();
        let big_is_t1 = match len1.cmp(&len2) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => first1 <= first2,
        };
        let (big_id, small_id) = if big_is_t1 { (t1, t2) } else { (t2, t1) };

        let small = self.remove_tour(small_id)?;
        let small_nodes = small.nodes();
        let (_, small_edges, small_spares) = small.take_parts();
        let (seq, _, _) = linked.take_parts();
        let big = self
            .tours
            .get_mut(&big_id)
            .ok_or_else(|| RuleGraphError::unknown_tour(big_id.to_string()))?;
        big.set_sequence(seq);
        big.add_edges(small_edges.into_iter().chain([edge]));
        big.add_spares(small_spares);
        self.remap_nodes(small_nodes, Some(big_id));
        Ok(big_id)
    }

    /// Split a spare-edge set by side: fully inside `lhs`, fully inside
    /// `rhs`, or straddling both.
    pub fn partition_edge_set(
        edges: &AHashSet<Edge>,
        lhs_nodes: &[String],
        rhs_nodes: &[String],
    ) -> (AHashSet<Edge>, AHashSet<Edge>, AHashSet<Edge>) {
        let mut lhs = AHashSet::new();
        let mut straddling = AHashSet::new();
        let mut rhs = AHashSet::new();
        for edge in edges {
            let (node1, _, _, node2) = edge;
            let in_lhs = |n: &String| lhs_nodes.binary_search(n).is_ok();
            let in_rhs = |n: &String| rhs_nodes.binary_search(n).is_ok();
            if in_lhs(node1) && in_lhs(node2) {
                lhs.insert(edge.clone());
            } else if in_rhs(node1) && in_rhs(node2) {
                rhs.insert(edge.clone());
            } else {
                straddling.insert(edge.clone());
            }
        }
        (lhs, straddling, rhs)
    }

    /// Record a new edge between two mapped nodes: distinct tours are linked
    /// and merged, while an edge inside one tour becomes a spare.
    pub fn connect(
        &mut self,
        u: &str,
        attr1: &str,
        attr2: &str,
        v: &str,
    ) -> Result<TourId, RuleGraphError> {
        let tu = self
            .tour_of(u)
            .ok_or_else(|| RuleGraphError::unknown_tour(format!("no tour maps {u}")))?;
        let tv = self
            .tour_of(v)
            .ok_or_else(|| RuleGraphError::unknown_tour(format!("no tour maps {v}")))?;
        let edge = canonize_edge(&(
            u.to_string(),
            attr1.to_string(),
            attr2.to_string(),
            v.to_string(),
        ));
        if tu == tv {
            let tour = self
                .tours
                .get_mut(&tu)
                .ok_or_else(|| RuleGraphError::unknown_tour(tu.to_string()))?;
            tour.add_spares([edge]);
            return Ok(tu);
        }
        let linked = self.link(tu, tv, u, v)?;
        self.update_link(tu, tv, linked, edge)
    }

    /// Remove an edge. A spare disappears without structural change; a tree
    /// edge cuts the tour, after which a straddling spare may be promoted to
    /// re-link the two sides (the component never actually disconnected).
    pub fn disconnect(
        &mut self,
        u: &str,
        attr1: &str,
        attr2: &str,
        v: &str,
    ) -> Result<CutOutcome, RuleGraphError> {
        let t = self
            .tour_of(u)
            .ok_or_else(|| RuleGraphError::unknown_tour(format!("no tour maps {u}")))?;
        if self.tour_of(v) != Some(t) {
            return Err(RuleGraphError::invalid_input(format!(
                "{u} and {v} are not in the same tour"
            )));
        }
        let edge = canonize_edge(&(
            u.to_string(),
            attr1.to_string(),
            attr2.to_string(),
            v.to_string(),
        ));
        if self.tour(t)?.spares().contains(&edge) {
            let tour = self
                .tours
                .get_mut(&t)
                .ok_or_else(|| RuleGraphError::unknown_tour(t.to_string()))?;
            tour.remove_spares([&edge]);
            return Ok(CutOutcome::Retained(t));
        }
        if !self.tour(t)?.edges().contains(&edge) {
            return Err(RuleGraphError::not_found(format!(
                "edge between {u} and {v} not in {t}"
            )));
        }

        let (big, small) = self.cut(t, u, v)?;
        let big_nodes = big.nodes();
        let small_nodes = small.nodes();
        let old = self.tour(t)?;
        let mut tree_edges = old.edges().clone();
        tree_edges.remove(&edge);
        let (big_tree, cross_tree, small_tree) =
            Self::partition_edge_set(&tree_edges, &big_nodes, &small_nodes);
        debug_assert!(cross_tree.is_empty());
        let (big_spares, straddling, small_spares) =
            Self::partition_edge_set(old.spares(), &big_nodes, &small_nodes);

        let mut bridges: Vec<Edge> = straddling.iter().cloned().collect();
        bridges.sort();
        if let Some(bridge) = bridges.first().cloned() {
            // a spare still bridges the two sides: promote it to a tree edge
            // and stitch the tour back together
            let (bn, sn) = if big.contains(&bridge.0) {
                (bridge.0.clone(), bridge.3.clone())
            } else {
                (bridge.3.clone(), bridge.0.clone())
            };
            let mut left = big;
            let mut right = small;
            left.reroot(&bn)?;
            right.reroot(&sn)?;
            let mut seq: Vec<String> = left.sequence().to_vec();
            seq.extend_from_slice(right.sequence());
            seq.push(bn);
            let tour = self
                .tours
                .get_mut(&t)
                .ok_or_else(|| RuleGraphError::unknown_tour(t.to_string()))?;
            tour.set_sequence(seq);
            tour.remove_edges([&edge]);
            tour.add_edges([bridge.clone()]);
            tour.remove_spares([&bridge]);
            return Ok(CutOutcome::Retained(t));
        }

        // a genuine split: the big side keeps the tour id, the small side
        // becomes a new tour and pays the remap cost
        let small_id = small.id();
        let (small_seq, _, _) = small.take_parts();
        let mut split_off = EulerTour::new(small_id, small_seq);
        split_off.add_edges(small_tree);
        split_off.add_spares(small_spares);
        let tour = self
            .tours
            .get_mut(&t)
            .ok_or_else(|| RuleGraphError::unknown_tour(t.to_string()))?;
        let (big_seq, _, _) = big.take_parts();
        tour.set_sequence(big_seq);
        let stale: Vec<Edge> = tour
            .edges()
            .iter()
            .filter(|e| !big_tree.contains(*e))
            .cloned()
            .collect();
        tour.remove_edges(stale.iter());
        let stale_spares: Vec<Edge> = tour
            .spares()
            .iter()
            .filter(|e| !big_spares.contains(*e))
            .cloned()
            .collect();
        tour.remove_spares(stale_spares.iter());
        // only the split-off side is remapped; the retained side's nodes
        // already point at `t`
        self.add_new_tour(split_off)?;
        Ok(CutOutcome::Split {
            retained: t,
            split_off: small_id,
        })
    }
}

fn order_sequences(a: Vec<String>, b: Vec<String>) -> (Vec<String>, Vec<String>) {
    let a_first = match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => a.first() <= b.first(),
    };
    if a_first { (a, b) } else { (b, a) }
}
