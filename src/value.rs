//! Comparison operators for attribute constraints.
//!
//! Operators form a closed set so that an unrecognized operator is rejected
//! when a pattern is compiled, never while tokens are flowing.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::RuleGraphError;

/// A comparison operator usable in an attribute constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl CompareOp {
    /// Parse an operator from its short name (`lt`, `le`, `eq`, `ne`, `ge`, `gt`).
    pub fn parse(name: &str) -> Result<Self, RuleGraphError> {
        match name {
            "lt" => Ok(CompareOp::Lt),
            "le" => Ok(CompareOp::Le),
            "eq" => Ok(CompareOp::Eq),
            "ne" => Ok(CompareOp::Ne),
            "ge" => Ok(CompareOp::Ge),
            "gt" => Ok(CompareOp::Gt),
            other => Err(RuleGraphError::unknown_operator(other)),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
        }
    }

    /// Evaluate `left OP right` over JSON scalars.
    ///
    /// Numbers compare numerically, strings lexicographically, booleans only
    /// under `Eq`/`Ne`. Incomparable operands evaluate to false rather than
    /// erroring; a constraint on a missing or mistyped attribute is simply an
    /// unmatched constraint.
    pub fn eval(&self, left: &Value, right: &Value) -> bool {
        match self {
            CompareOp::Eq => values_equal(left, right),
            CompareOp::Ne => !values_equal(left, right),
            ordered => match compare_values(left, right) {
                Some(ordering) => match ordered {
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                    CompareOp::Ge => ordering != Ordering::Less,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::Eq | CompareOp::Ne => unreachable!(),
                },
                None => false,
            },
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    // Numeric equality must not depend on integer vs. float representation.
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return a == b;
    }
    left == right
}

fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return a.partial_cmp(&b);
    }
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Some(a.cmp(b));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_operators() {
        assert_eq!(CompareOp::parse("lt").unwrap(), CompareOp::Lt);
        assert_eq!(CompareOp::parse("ge").unwrap(), CompareOp::Ge);
        assert!(matches!(
            CompareOp::parse("like"),
            Err(RuleGraphError::UnknownOperator(_))
        ));
    }

    #[test]
    fn test_numeric_comparison_across_representations() {
        assert!(CompareOp::Eq.eval(&json!(3), &json!(3.0)));
        assert!(CompareOp::Gt.eval(&json!(5), &json!(3)));
        assert!(CompareOp::Le.eval(&json!(2.5), &json!(3)));
        assert!(!CompareOp::Lt.eval(&json!(4), &json!(4)));
    }

    #[test]
    fn test_string_and_mixed_comparison() {
        assert!(CompareOp::Lt.eval(&json!("ab"), &json!("b")));
        assert!(CompareOp::Ne.eval(&json!("a"), &json!(1)));
        // ordered comparison of incomparable operands is false, not an error
        assert!(!CompareOp::Gt.eval(&json!("a"), &json!(1)));
        assert!(!CompareOp::Lt.eval(&json!(true), &json!(false)));
    }
}
