//! Static schema descriptor for typed nodes and their relations.
//!
//! Node types form a single-inheritance hierarchy; relation attributes are
//! declared once per direction pair and carry a cardinality plus the name of
//! the inverse attribute on the related type. The descriptor is built up front
//! and passed explicitly wherever type or relation metadata is needed; there
//! is no runtime introspection.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::RuleGraphError;

/// Cardinality of a relation attribute, seen from the declaring side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Whether the declaring side holds at most one target.
    pub fn is_to_one(&self) -> bool {
        matches!(self, Cardinality::OneToOne | Cardinality::ManyToOne)
    }

    pub fn inverse(&self) -> Cardinality {
        match self {
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }
}

/// A relation attribute declared on one node type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    pub type_name: String,
    pub attr: String,
    pub target_type: String,
    pub inverse_attr: String,
    pub cardinality: Cardinality,
}

#[derive(Clone, Debug, Default)]
struct TypeDef {
    parent: Option<String>,
    relations: HashMap<String, RelationDef>,
}

/// The full schema: type hierarchy plus relation declarations.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    types: HashMap<String, TypeDef>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Ancestor chain of a type, most general first, ending with the type
    /// itself. Unknown types yield an empty chain.
    pub fn ancestry(&self, name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(name);
        while let Some(ty) = current {
            match self.types.get(ty) {
                Some(def) => {
                    chain.push(ty.to_string());
                    current = def.parent.as_deref();
                }
                None => return Vec::new(),
            }
        }
        chain.reverse();
        chain
    }

    /// Whether `name` is `candidate` or a declared subtype of it.
    pub fn is_instance(&self, name: &str, candidate: &str) -> bool {
        let mut current = Some(name);
        while let Some(ty) = current {
            if ty == candidate {
                return true;
            }
            current = self.types.get(ty).and_then(|def| def.parent.as_deref());
        }
        false
    }

    /// Look up a relation attribute on a type, searching up the hierarchy so
    /// subtypes inherit their parents' relations.
    pub fn relation(&self, type_name: &str, attr: &str) -> Option<&RelationDef> {
        let mut current = Some(type_name);
        while let Some(ty) = current {
            let def = self.types.get(ty)?;
            if let Some(rel) = def.relations.get(attr) {
                return Some(rel);
            }
            current = def.parent.as_deref();
        }
        None
    }

    pub fn inverse_of(&self, type_name: &str, attr: &str) -> Option<&str> {
        self.relation(type_name, attr)
            .map(|rel| rel.inverse_attr.as_str())
    }

    /// All relation attribute names a type carries, own and inherited, sorted.
    pub fn relation_attrs(&self, type_name: &str) -> Vec<String> {
        let mut attrs = Vec::new();
        let mut current = Some(type_name);
        while let Some(ty) = current {
            let Some(def) = self.types.get(ty) else { break };
            attrs.extend(def.relations.keys().cloned());
            current = def.parent.as_deref();
        }
        attrs.sort();
        attrs.dedup();
        attrs
    }
}

/// Fluent construction of a [`Schema`], validated at `build` time.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: Vec<(String, Option<String>)>,
    relations: Vec<RelationDef>,
}

impl SchemaBuilder {
    /// Declare a root type.
    pub fn ty(mut self, name: impl Into<String>) -> Self {
        self.types.push((name.into(), None));
        self
    }

    /// Declare a subtype.
    pub fn ty_extends(mut self, name: impl Into<String>, parent: impl Into<String>) -> Self {
        self.types.push((name.into(), Some(parent.into())));
        self
    }

    /// Declare a relation pair: `a_type.a_attr` points at `b_type`, inversely
    /// reachable as `b_type.b_attr`. Both directions are registered.
    pub fn relation(
        mut self,
        a_type: impl Into<String>,
        a_attr: impl Into<String>,
        b_type: impl Into<String>,
        b_attr: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        let (a_type, a_attr) = (a_type.into(), a_attr.into());
        let (b_type, b_attr) = (b_type.into(), b_attr.into());
        // a self-symmetric relation (same type, same attr both ways, e.g. a
        // bond) is a single definition, not two
        let symmetric = a_type == b_type && a_attr == b_attr;
        self.relations.push(RelationDef {
            type_name: a_type.clone(),
            attr: a_attr.clone(),
            target_type: b_type.clone(),
            inverse_attr: b_attr.clone(),
            cardinality,
        });
        if !symmetric {
            self.relations.push(RelationDef {
                type_name: b_type,
                attr: b_attr,
                target_type: a_type,
                inverse_attr: a_attr,
                cardinality: cardinality.inverse(),
            });
        }
        self
    }

    pub fn build(self) -> Result<Schema, RuleGraphError> {
        let mut schema = Schema::default();
        for (name, parent) in self.types {
            if schema.types.contains_key(&name) {
                return Err(RuleGraphError::invalid_input(format!(
                    "type declared twice: {name}"
                )));
            }
            schema.types.insert(
                name,
                TypeDef {
                    parent,
                    relations: HashMap::new(),
                },
            );
        }
        for (name, def) in &schema.types {
            if let Some(parent) = &def.parent {
                if !schema.types.contains_key(parent) {
                    return Err(RuleGraphError::invalid_input(format!(
                        "type {name} extends unknown type {parent}"
                    )));
                }
            }
        }
        for rel in self.relations {
            if !schema.types.contains_key(&rel.target_type) {
                return Err(RuleGraphError::invalid_input(format!(
                    "relation {}.{} targets unknown type {}",
                    rel.type_name, rel.attr, rel.target_type
                )));
            }
            let Some(def) = schema.types.get_mut(&rel.type_name) else {
                return Err(RuleGraphError::invalid_input(format!(
                    "relation declared on unknown type {}",
                    rel.type_name
                )));
            };
            if def.relations.contains_key(&rel.attr) {
                return Err(RuleGraphError::invalid_input(format!(
                    "relation declared twice: {}.{}",
                    rel.type_name, rel.attr
                )));
            }
            def.relations.insert(rel.attr.clone(), rel);
        }
        // Detect inheritance cycles before anyone walks ancestry.
        for name in schema.types.keys() {
            let mut seen = 0usize;
            let mut current = Some(name.as_str());
            while let Some(ty) = current {
                seen += 1;
                if seen > schema.types.len() {
                    return Err(RuleGraphError::invalid_input(format!(
                        "inheritance cycle through type {name}"
                    )));
                }
                current = schema.types.get(ty).and_then(|d| d.parent.as_deref());
            }
        }
        Ok(schema)
    }
}
