//! Incremental wiring of compiled patterns into the shared network.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    errors::RuleGraphError,
    pattern::{Pattern, PatternQueries},
};

use super::stage::{AttrConstraint, MatchingNetwork, StageId, StageKind};

/// Builds or extends a [`MatchingNetwork`] from compiled pattern queries.
///
/// For every stage the builder first looks for an equivalent successor of the
/// current predecessor and only creates a new stage when none exists. N
/// overlapping patterns therefore share one stage per distinct constraint
/// prefix instead of one per pattern.
pub struct NetworkBuilder;

impl NetworkBuilder {
    /// Wire `pattern` into `network`, returning the pattern's terminal stage
    /// (the merge, or sole alias, whose register holds its complete matches).
    pub fn wire(
        network: &mut MatchingNetwork,
        pattern: &Pattern,
    ) -> Result<StageId, RuleGraphError> {
        let queries = pattern.compile()?;
        let mut node_aliases: BTreeMap<String, StageId> = BTreeMap::new();
        for (node, type_chain) in &queries.types {
            node_aliases.insert(
                node.clone(),
                Self::wire_node(network, &queries, node, type_chain),
            );
        }
        let mut rel_aliases: Vec<(String, String, StageId)> = Vec::new();
        for rel in &queries.rels {
            let alias = Self::wire_relation(
                network,
                (&rel.attr_a, &rel.attr_b),
                (&rel.node_a, &rel.node_b),
            );
            rel_aliases.push((rel.node_a.clone(), rel.node_b.clone(), alias));
        }
        let ordered = Self::join_order(&node_aliases, &rel_aliases);
        Self::wire_merges(network, ordered)
    }

    /// Order the aliases so that, where the pattern allows it, each one shares
    /// a variable with those already taken. Every merge is then a keyed join
    /// and intermediate registers never hold a cross product of unrelated
    /// candidates. Disconnected pattern components reseed the frontier and
    /// still join as a product; there is no key to join them on.
    fn join_order(
        node_aliases: &BTreeMap<String, StageId>,
        rel_aliases: &[(String, String, StageId)],
    ) -> Vec<StageId> {
        let mut ordered = Vec::with_capacity(node_aliases.len() + rel_aliases.len());
        let mut vars: BTreeSet<&str> = BTreeSet::new();
        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut rel_done = vec![false; rel_aliases.len()];

        while placed.len() < node_aliases.len() || rel_done.iter().any(|done| !done) {
            loop {
                if let Some((node, alias)) = node_aliases
                    .iter()
                    .find(|(node, _)| !placed.contains(node.as_str()) && vars.contains(node.as_str()))
                {
                    ordered.push(*alias);
                    placed.insert(node.as_str());
                    continue;
                }
                let connected = rel_aliases.iter().enumerate().find(|(i, (a, b, _))| {
                    !rel_done[*i] && (vars.contains(a.as_str()) || vars.contains(b.as_str()))
                });
                let Some((i, (a, b, alias))) = connected else {
                    break;
                };
                ordered.push(*alias);
                vars.insert(a.as_str());
                vars.insert(b.as_str());
                rel_done[i] = true;
            }
            // next connected component
            if let Some((node, alias)) = node_aliases
                .iter()
                .find(|(node, _)| !placed.contains(node.as_str()))
            {
                ordered.push(*alias);
                placed.insert(node.as_str());
                vars.insert(node.as_str());
            } else if let Some(i) = rel_done.iter().position(|done| !done) {
                let (a, b, alias) = &rel_aliases[i];
                ordered.push(*alias);
                vars.insert(a.as_str());
                vars.insert(b.as_str());
                rel_done[i] = true;
            }
        }
        ordered
    }

    /// root -> type checks (most general first) -> attribute check -> unary
    /// store -> alias carrying the pattern variable name.
    fn wire_node(
        network: &mut MatchingNetwork,
        queries: &PatternQueries,
        node: &str,
        type_chain: &[String],
    ) -> StageId {
        let mut current = network.root();
        for type_name in type_chain {
            current = Self::find_or_add(
                network,
                current,
                StageKind::TypeCheck {
                    type_name: type_name.clone(),
                },
            );
        }
        if let Some(attr_queries) = queries.attrs.get(node) {
            let constraints: Vec<AttrConstraint> = attr_queries
                .iter()
                .map(|q| AttrConstraint {
                    attr: q.attr.clone(),
                    op: q.op,
                    value: q.value.clone(),
                })
                .collect();
            current = Self::find_or_add(network, current, StageKind::AttrCheck { constraints });
        }
        current = Self::find_or_add(network, current, StageKind::Store { arity: 1 });
        Self::find_or_add(
            network,
            current,
            StageKind::Alias {
                vars: vec![node.to_string()],
            },
        )
    }

    /// root -> edge-type check -> binary store -> alias carrying both
    /// endpoint variable names.
    fn wire_relation(
        network: &mut MatchingNetwork,
        roles: (&str, &str),
        endpoints: (&str, &str),
    ) -> StageId {
        let mut current = network.root();
        current = Self::find_or_add(
            network,
            current,
            StageKind::EdgeCheck {
                roles: (roles.0.to_string(), roles.1.to_string()),
            },
        );
        current = Self::find_or_add(network, current, StageKind::Store { arity: 2 });
        Self::find_or_add(
            network,
            current,
            StageKind::Alias {
                vars: vec![endpoints.0.to_string(), endpoints.1.to_string()],
            },
        )
    }

    /// Left fold of binary merges over the aliases, in the order produced by
    /// [`NetworkBuilder::join_order`].
    fn wire_merges(
        network: &mut MatchingNetwork,
        aliases: Vec<StageId>,
    ) -> Result<StageId, RuleGraphError> {
        let mut terms = aliases.into_iter();
        let Some(mut current) = terms.next() else {
            return Err(RuleGraphError::invalid_input(
                "pattern compiled to no stages",
            ));
        };
        for term in terms {
            let mut vars = network.stage(current).variables();
            for var in network.stage(term).variables() {
                if !vars.contains(&var) {
                    vars.push(var);
                }
            }
            vars.sort();
            let kind = StageKind::Merge { vars };
            let existing = network.find_successor(current, &kind).filter(|merge| {
                let preds = &network.stage(*merge).predecessors;
                preds.contains(&current) && preds.contains(&term)
            });
            current = match existing {
                Some(merge) => merge,
                None => {
                    let merge = network.add_stage(kind, current);
                    network.connect(term, merge);
                    merge
                }
            };
        }
        Ok(current)
    }

    fn find_or_add(network: &mut MatchingNetwork, pred: StageId, kind: StageKind) -> StageId {
        match network.find_successor(pred, &kind) {
            Some(existing) => existing,
            None => network.add_stage(kind, pred),
        }
    }
}
