//! Binding-event tokens and the register that indexes them.
//!
//! A token is an immutable record of a binding event: variable names mapped to
//! node ids, a polarity, and (for attribute events) the set of attribute names
//! that changed. Stages never mutate a received token; every transformation
//! produces a new one.

use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::RuleGraphError;

/// Whether a token asserts a new binding or retracts an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    Add,
    Remove,
}

impl Polarity {
    pub fn invert(&self) -> Polarity {
        match self {
            Polarity::Add => Polarity::Remove,
            Polarity::Remove => Polarity::Add,
        }
    }
}

/// Variable-name to node-id map; doubles as the register key.
pub type BindingKey = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub polarity: Polarity,
    pub bindings: BindingKey,
    /// The two relation attribute names of an edge event, in role order.
    pub edge_roles: Option<(String, String)>,
    pub modified_attrs: BTreeSet<String>,
}

impl Token {
    /// Token for a node-level event under the positional variable `node`.
    pub fn node_event(
        polarity: Polarity,
        node_id: impl Into<String>,
        modified_attrs: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut bindings = BTreeMap::new();
        bindings.insert("node".to_string(), node_id.into());
        Self {
            polarity,
            bindings,
            edge_roles: None,
            modified_attrs: modified_attrs.into_iter().collect(),
        }
    }

    /// Token for a relation add/remove under the positional variables
    /// `node1`/`node2`, carrying the attribute-role pair.
    pub fn edge_event(
        polarity: Polarity,
        node1: impl Into<String>,
        attr1: impl Into<String>,
        attr2: impl Into<String>,
        node2: impl Into<String>,
    ) -> Self {
        let mut bindings = BTreeMap::new();
        bindings.insert("node1".to_string(), node1.into());
        bindings.insert("node2".to_string(), node2.into());
        Self {
            polarity,
            bindings,
            edge_roles: Some((attr1.into(), attr2.into())),
            modified_attrs: BTreeSet::new(),
        }
    }

    pub fn from_bindings(polarity: Polarity, bindings: BindingKey) -> Self {
        Self {
            polarity,
            bindings,
            edge_roles: None,
            modified_attrs: BTreeSet::new(),
        }
    }

    pub fn get(&self, var: &str) -> Option<&str> {
        self.bindings.get(var).map(String::as_str)
    }

    pub fn has_all(&self, vars: &[String]) -> bool {
        vars.iter().all(|v| self.bindings.contains_key(v))
    }

    /// New token restricted to the given variables. Polarity and modified
    /// attributes carry over; edge roles do not survive projection.
    pub fn project(&self, vars: &[String]) -> Token {
        let bindings = self
            .bindings
            .iter()
            .filter(|(name, _)| vars.contains(name))
            .map(|(name, id)| (name.clone(), id.clone()))
            .collect();
        Token {
            polarity: self.polarity,
            bindings,
            edge_roles: None,
            modified_attrs: self.modified_attrs.clone(),
        }
    }

    /// New token with binding keys renamed through `keymap`; keys absent from
    /// the map are dropped.
    pub fn rename(&self, keymap: &AHashMap<String, String>) -> Token {
        let bindings = self
            .bindings
            .iter()
            .filter_map(|(name, id)| keymap.get(name).map(|new| (new.clone(), id.clone())))
            .collect();
        Token {
            polarity: self.polarity,
            bindings,
            edge_roles: None,
            modified_attrs: self.modified_attrs.clone(),
        }
    }

    pub fn invert(&self) -> Token {
        let mut token = self.clone();
        token.polarity = token.polarity.invert();
        token
    }

    /// Whether every binding of `query` is present here with the same value.
    pub fn subsumes(&self, query: &Token) -> bool {
        query
            .bindings
            .iter()
            .all(|(name, id)| self.bindings.get(name) == Some(id))
    }
}

/// Set-like index of tokens keyed by their binding map.
///
/// Insert and remove are fail-fast: a conflicting insert or a missing remove
/// is a caller bug, not an event to be absorbed.
#[derive(Clone, Debug, Default)]
pub struct TokenRegister {
    map: AHashMap<BindingKey, Token>,
}

impl TokenRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.map.contains_key(&token.bindings)
    }

    pub fn get(&self, token: &Token) -> Option<&Token> {
        self.map.get(&token.bindings)
    }

    pub fn insert(&mut self, token: Token) -> Result<(), RuleGraphError> {
        if self.map.contains_key(&token.bindings) {
            return Err(RuleGraphError::register_conflict(format!(
                "{:?}",
                token.bindings
            )));
        }
        self.map.insert(token.bindings.clone(), token);
        Ok(())
    }

    pub fn remove(&mut self, token: &Token) -> Result<Token, RuleGraphError> {
        self.map
            .remove(&token.bindings)
            .ok_or_else(|| RuleGraphError::register_missing(format!("{:?}", token.bindings)))
    }

    /// All stored tokens whose bindings are a superset of the query's.
    /// Results are sorted by binding key for deterministic iteration.
    pub fn filter(&self, query: &Token) -> Vec<Token> {
        let mut hits: Vec<Token> = self
            .map
            .values()
            .filter(|stored| stored.subsumes(query))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.bindings.cmp(&b.bindings));
        hits
    }

    pub fn tokens(&self) -> Vec<Token> {
        let mut all: Vec<Token> = self.map.values().cloned().collect();
        all.sort_by(|a, b| a.bindings.cmp(&b.bindings));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(pairs: &[(&str, &str)]) -> Token {
        let bindings = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Token::from_bindings(Polarity::Add, bindings)
    }

    #[test]
    fn test_register_exactness() {
        let mut register = TokenRegister::new();
        let a = binding(&[("A", "n1")]);
        let b = binding(&[("A", "n2")]);
        register.insert(a.clone()).unwrap();
        register.insert(b.clone()).unwrap();
        register.remove(&a).unwrap();
        assert_eq!(register.len(), 1);
        assert!(register.contains(&b));
        assert!(!register.contains(&a));
    }

    #[test]
    fn test_register_rejects_duplicate_add_and_absent_remove() {
        let mut register = TokenRegister::new();
        let token = binding(&[("A", "n1")]);
        register.insert(token.clone()).unwrap();
        assert!(matches!(
            register.insert(token.clone()),
            Err(RuleGraphError::RegisterKeyConflict(_))
        ));
        register.remove(&token).unwrap();
        assert!(matches!(
            register.remove(&token),
            Err(RuleGraphError::RegisterKeyMissing(_))
        ));
    }

    #[test]
    fn test_filter_by_subset() {
        let mut register = TokenRegister::new();
        register.insert(binding(&[("A", "n1"), ("B", "n2")])).unwrap();
        register.insert(binding(&[("A", "n1"), ("B", "n3")])).unwrap();
        register.insert(binding(&[("A", "n4"), ("B", "n2")])).unwrap();
        let hits = register.filter(&binding(&[("A", "n1")]));
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|t| t.get("A") == Some("n1")));
        let all = register.filter(&Token::from_bindings(Polarity::Add, BTreeMap::new()));
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_project_and_rename() {
        let token = binding(&[("node1", "a"), ("node2", "b")]);
        let projected = token.project(&["node1".to_string()]);
        assert_eq!(projected.get("node1"), Some("a"));
        assert_eq!(projected.bindings.len(), 1);

        let keymap: AHashMap<String, String> =
            [("node1".to_string(), "A".to_string()), ("node2".to_string(), "B".to_string())]
                .into_iter()
                .collect();
        let renamed = token.rename(&keymap);
        assert_eq!(renamed.get("A"), Some("a"));
        assert_eq!(renamed.get("B"), Some("b"));
        assert!(renamed.get("node1").is_none());
    }

    #[test]
    fn test_invert_round_trip() {
        let token = Token::node_event(Polarity::Add, "n1", ["x".to_string()]);
        let inverted = token.invert();
        assert_eq!(inverted.polarity, Polarity::Remove);
        assert_eq!(inverted.bindings, token.bindings);
        assert_eq!(inverted.invert(), token);
    }
}
