//! Stage variants, the network arena, and token propagation.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    errors::RuleGraphError,
    graph::Graph,
    token::{Polarity, Token, TokenRegister},
    value::CompareOp,
};

/// Index of a stage in the network arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub usize);

/// One watched attribute comparison of an attribute-check stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttrConstraint {
    pub attr: String,
    pub op: CompareOp,
    pub value: Value,
}

/// The closed set of stage behaviors.
#[derive(Clone, Debug, PartialEq)]
pub enum StageKind {
    /// Unique entry point; pass-through.
    Root,
    /// Passes tokens whose bound node is an instance of the type.
    TypeCheck { type_name: String },
    /// Incremental attribute filtering; see [`MatchingNetwork::propagate`].
    AttrCheck { constraints: Vec<AttrConstraint> },
    /// Passes edge tokens whose role pair equals the configured pair.
    EdgeCheck { roles: (String, String) },
    /// Renames positional variables to pattern variable names.
    Alias { vars: Vec<String> },
    /// Canonical register of currently valid k-ary bindings.
    Store { arity: usize },
    /// Joins two upstream binding sets into a combined register.
    Merge { vars: Vec<String> },
}

/// A stage node: behavior plus wiring plus (for stores and merges) the
/// register of currently valid bindings.
#[derive(Clone, Debug)]
pub struct Stage {
    pub id: StageId,
    pub kind: StageKind,
    pub predecessors: Vec<StageId>,
    pub successors: Vec<StageId>,
    register: TokenRegister,
}

impl Stage {
    /// Variable names this stage's tokens carry, where defined.
    pub fn variables(&self) -> Vec<String> {
        match &self.kind {
            StageKind::Alias { vars } | StageKind::Merge { vars } => vars.clone(),
            StageKind::Store { arity } => positional_keys(*arity)
                .iter()
                .map(|k| k.to_string())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn register(&self) -> &TokenRegister {
        &self.register
    }

    /// Cheap shape test: is this token relevant here at all? A failing check
    /// drops the token silently during propagation.
    fn entry_check(&self, token: &Token) -> bool {
        match &self.kind {
            StageKind::Root => true,
            StageKind::TypeCheck { .. } | StageKind::AttrCheck { .. } => {
                token.get("node").is_some()
            }
            StageKind::EdgeCheck { .. } => {
                token.edge_roles.is_some()
                    && token.get("node1").is_some()
                    && token.get("node2").is_some()
            }
            StageKind::Alias { vars } => positional_keys(vars.len())
                .iter()
                .all(|key| token.get(key).is_some()),
            StageKind::Store { arity } => positional_keys(*arity)
                .iter()
                .all(|key| token.get(key).is_some()),
            StageKind::Merge { vars } => {
                !token.bindings.is_empty()
                    && token.bindings.keys().all(|name| vars.contains(name))
            }
        }
    }
}

/// Positional variable names for k-ary stores and aliases.
pub fn positional_keys(arity: usize) -> &'static [&'static str] {
    match arity {
        1 => &["node"],
        2 => &["node1", "node2"],
        _ => &[],
    }
}

enum RegisterOp {
    Insert(Token),
    Remove(Token),
}

/// The shared matching network: an arena of stages wired root-first.
#[derive(Clone, Debug)]
pub struct MatchingNetwork {
    stages: Vec<Stage>,
}

impl Default for MatchingNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingNetwork {
    pub fn new() -> Self {
        Self {
            stages: vec![Stage {
                id: StageId(0),
                kind: StageKind::Root,
                predecessors: Vec::new(),
                successors: Vec::new(),
                register: TokenRegister::new(),
            }],
        }
    }

    pub fn root(&self) -> StageId {
        StageId(0)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage(&self, id: StageId) -> &Stage {
        &self.stages[id.0]
    }

    /// Append a stage as a successor of `pred`. Edges always point from
    /// predecessor to successor, so the arena stays acyclic by construction.
    pub fn add_stage(&mut self, kind: StageKind, pred: StageId) -> StageId {
        let id = StageId(self.stages.len());
        self.stages.push(Stage {
            id,
            kind,
            predecessors: vec![pred],
            successors: Vec::new(),
            register: TokenRegister::new(),
        });
        self.stages[pred.0].successors.push(id);
        id
    }

    /// Add a second (or later) predecessor edge.
    pub fn connect(&mut self, pred: StageId, succ: StageId) {
        if !self.stages[pred.0].successors.contains(&succ) {
            self.stages[pred.0].successors.push(succ);
        }
        if !self.stages[succ.0].predecessors.contains(&pred) {
            self.stages[succ.0].predecessors.push(pred);
        }
    }

    /// An existing successor of `pred` with exactly this behavior, if any.
    /// This is the prefix-reuse lookup: equal constraint under the same
    /// predecessor means the stage is shared, not duplicated.
    pub fn find_successor(&self, pred: StageId, kind: &StageKind) -> Option<StageId> {
        self.stages[pred.0]
            .successors
            .iter()
            .copied()
            .find(|succ| &self.stages[succ.0].kind == kind)
    }

    /// Inject a token at the root and run it to completion.
    ///
    /// Propagation is an explicit depth-first stack, reproducing the order of
    /// a recursive receive/process/send chain without growing the native call
    /// stack with network depth. Each frame carries the sending stage so that
    /// merges know which sibling register to consult.
    pub fn propagate(&mut self, graph: &Graph, token: Token) -> Result<(), RuleGraphError> {
        if token.bindings.is_empty() {
            return Err(RuleGraphError::malformed_token(
                "token carries no bindings",
            ));
        }
        let mut stack: Vec<(StageId, Option<StageId>, Token)> = vec![(self.root(), None, token)];
        while let Some((id, sender, token)) = stack.pop() {
            if !self.stage(id).entry_check(&token) {
                continue;
            }
            let (outputs, ops) = self.process(id, sender, graph, &token)?;
            for op in ops {
                match op {
                    RegisterOp::Insert(t) => self.stages[id.0].register.insert(t)?,
                    RegisterOp::Remove(t) => {
                        self.stages[id.0].register.remove(&t)?;
                    }
                }
            }
            // push in reverse so the first output reaches the first successor
            // first, matching the order of the recursive call chain
            for out in outputs.iter().rev() {
                for succ in self.stages[id.0].successors.iter().rev() {
                    stack.push((*succ, Some(id), out.clone()));
                }
            }
        }
        Ok(())
    }

    /// Stage-specific transformation. Never mutates the incoming token;
    /// register changes are returned and applied by the caller so that a
    /// failed operation leaves the stage untouched.
    fn process(
        &self,
        id: StageId,
        sender: Option<StageId>,
        graph: &Graph,
        token: &Token,
    ) -> Result<(Vec<Token>, Vec<RegisterOp>), RuleGraphError> {
        let stage = self.stage(id);
        match &stage.kind {
            StageKind::Root => Ok((vec![token.clone()], Vec::new())),

            StageKind::TypeCheck { type_name } => {
                let node_id = token.get("node").unwrap_or_default();
                let passes = graph
                    .is_instance(node_id, type_name)
                    .unwrap_or(false);
                if passes {
                    Ok((vec![token.clone()], Vec::new()))
                } else {
                    Ok((Vec::new(), Vec::new()))
                }
            }

            // Four cases, in priority order:
            //   removals always pass; irrelevant attribute changes drop;
            //   satisfied constraints pass; unsatisfied constraints pass with
            //   inverted polarity so downstream stores retract stale matches.
            StageKind::AttrCheck { constraints } => {
                if token.polarity == Polarity::Remove {
                    return Ok((vec![token.clone()], Vec::new()));
                }
                let watched = constraints
                    .iter()
                    .any(|c| token.modified_attrs.contains(&c.attr));
                if !watched {
                    return Ok((Vec::new(), Vec::new()));
                }
                let node_id = token.get("node").unwrap_or_default();
                let satisfied = constraints.iter().all(|c| {
                    match graph.get_attr(node_id, &c.attr) {
                        Ok(Some(current)) => c.op.eval(current, &c.value),
                        _ => false,
                    }
                });
                if satisfied {
                    Ok((vec![token.clone()], Vec::new()))
                } else {
                    Ok((vec![token.invert()], Vec::new()))
                }
            }

            StageKind::EdgeCheck { roles } => {
                let matches = token
                    .edge_roles
                    .as_ref()
                    .is_some_and(|pair| pair == roles);
                if matches {
                    Ok((vec![token.clone()], Vec::new()))
                } else {
                    Ok((Vec::new(), Vec::new()))
                }
            }

            StageKind::Alias { vars } => {
                let keymap: AHashMap<String, String> = positional_keys(vars.len())
                    .iter()
                    .zip(vars.iter())
                    .map(|(pos, var)| (pos.to_string(), var.clone()))
                    .collect();
                Ok((vec![token.rename(&keymap)], Vec::new()))
            }

            StageKind::Store { arity } => {
                let keys: Vec<String> = positional_keys(*arity)
                    .iter()
                    .map(|k| k.to_string())
                    .collect();
                let sub = Token::from_bindings(token.polarity, token.project(&keys).bindings);
                let existing = stage.register.get(&sub).cloned();
                match (token.polarity, existing) {
                    (Polarity::Add, None) => {
                        let canonical = Token::from_bindings(Polarity::Add, sub.bindings.clone());
                        Ok((vec![canonical.clone()], vec![RegisterOp::Insert(canonical)]))
                    }
                    (Polarity::Remove, Some(stored)) => {
                        Ok((vec![stored.invert()], vec![RegisterOp::Remove(stored)]))
                    }
                    // duplicate add or remove of an absent key: a no-effect
                    // event, not an error at this layer
                    _ => Ok((Vec::new(), Vec::new())),
                }
            }

            StageKind::Merge { vars } => {
                let sender = sender.ok_or_else(|| {
                    RuleGraphError::malformed_token("merge received a token with no sender")
                })?;
                self.process_merge(stage, sender, vars, token)
            }
        }
    }

    fn process_merge(
        &self,
        stage: &Stage,
        sender: StageId,
        vars: &[String],
        token: &Token,
    ) -> Result<(Vec<Token>, Vec<RegisterOp>), RuleGraphError> {
        match token.polarity {
            Polarity::Add => {
                let mut combos: Vec<Token> =
                    vec![Token::from_bindings(Polarity::Add, token.bindings.clone())];
                for pred in stage.predecessors.iter().filter(|p| **p != sender) {
                    let pred_vars = self.stage(*pred).variables();
                    let mut next = Vec::new();
                    for partial in &combos {
                        let query = partial.project(&pred_vars);
                        for hit in self.filter(*pred, &query)? {
                            let mut bindings = partial.bindings.clone();
                            for (name, id) in hit.bindings {
                                bindings.insert(name, id);
                            }
                            next.push(Token::from_bindings(Polarity::Add, bindings));
                        }
                    }
                    combos = next;
                }
                let mut outputs = Vec::new();
                let mut ops = Vec::new();
                for combo in combos {
                    if combo.bindings.len() != vars.len() || stage.register.contains(&combo) {
                        continue;
                    }
                    outputs.push(combo.clone());
                    ops.push(RegisterOp::Insert(combo));
                }
                Ok((outputs, ops))
            }
            Polarity::Remove => {
                let query = Token::from_bindings(Polarity::Remove, token.bindings.clone());
                let mut outputs = Vec::new();
                let mut ops = Vec::new();
                for victim in stage.register.filter(&query) {
                    outputs.push(victim.invert());
                    ops.push(RegisterOp::Remove(victim));
                }
                Ok((outputs, ops))
            }
        }
    }

    /// Ad hoc register query, independent of the add/remove token flow.
    /// Stores and merges answer from their registers; an alias maps the query
    /// back to its predecessor's shape and the results forward again.
    pub fn filter(&self, id: StageId, query: &Token) -> Result<Vec<Token>, RuleGraphError> {
        let stage = self.stage(id);
        match &stage.kind {
            StageKind::Store { arity } => {
                let keys: Vec<String> = positional_keys(*arity)
                    .iter()
                    .map(|k| k.to_string())
                    .collect();
                Ok(stage.register.filter(&query.project(&keys)))
            }
            StageKind::Merge { vars } => Ok(stage.register.filter(&query.project(vars))),
            StageKind::Alias { vars } => {
                let pred = *stage.predecessors.first().ok_or_else(|| {
                    RuleGraphError::invalid_input("alias stage has no predecessor")
                })?;
                let forward: AHashMap<String, String> = positional_keys(vars.len())
                    .iter()
                    .zip(vars.iter())
                    .map(|(pos, var)| (pos.to_string(), var.clone()))
                    .collect();
                let reverse: AHashMap<String, String> = forward
                    .iter()
                    .map(|(pos, var)| (var.clone(), pos.clone()))
                    .collect();
                let results = self.filter(pred, &query.rename(&reverse))?;
                Ok(results.iter().map(|t| t.rename(&forward)).collect())
            }
            _ => Err(RuleGraphError::invalid_input(
                "stage has no register to filter",
            )),
        }
    }
}
