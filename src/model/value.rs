// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Value descriptors: what is wanted ([`Requirement`]) and what can be made
//! ([`Specification`]).
//!
//! Both types are immutable and value-equal so they can be used directly as
//! keys in the concurrent indices. Ordering is derived so graphs and mappings
//! can be kept in `BTree*` collections and compared deterministically.
//!
//! # Examples
//!
//! ```rust
//! use depgraph_builder::model::{Requirement, Specification};
//!
//! let requirement = Requirement::new("PresentValue", "SEC-1")
//!     .with_constraint("Currency", ["USD"]);
//! let specification = Specification::new("PresentValue", "SEC-1", "pv_function")
//!     .with_property("Currency", "USD");
//!
//! assert!(specification.satisfies(&requirement));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifier of the thing a value is computed for (a security, a curve, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier of a computation function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionId(pub String);

impl FunctionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FunctionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Named constraints on a requirement.
///
/// Each property maps to the set of values that are acceptable. An empty set
/// is a wildcard: the property must be present on the specification but any
/// value will do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueProperties(pub BTreeMap<String, BTreeSet<String>>);

impl ValueProperties {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }

    /// True when every constraint is met by `properties`.
    pub fn is_satisfied_by(&self, properties: &BTreeMap<String, String>) -> bool {
        self.0.iter().all(|(name, allowed)| match properties.get(name) {
            Some(value) => allowed.is_empty() || allowed.contains(value),
            None => false,
        })
    }
}

/// A request for a value: name, target and constraints.
///
/// Equal requirements are the same resolution problem and share work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Requirement {
    pub value_name: String,
    pub target: TargetId,
    #[serde(default)]
    pub constraints: ValueProperties,
}

impl Requirement {
    pub fn new(value_name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            value_name: value_name.into(),
            target: TargetId::new(target),
            constraints: ValueProperties::new(),
        }
    }

    /// Adds a constraint allowing any of `values`; no values makes it a wildcard.
    pub fn with_constraint<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints
            .0
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.value_name, self.target)?;
        if !self.constraints.is_empty() {
            let rendered: Vec<String> = self
                .constraints
                .iter()
                .map(|(name, values)| {
                    if values.is_empty() {
                        format!("{}=*", name)
                    } else {
                        format!("{}={}", name, values.iter().cloned().collect::<Vec<_>>().join("|"))
                    }
                })
                .collect();
            write!(f, "{{{}}}", rendered.join(", "))?;
        }
        Ok(())
    }
}

/// A concrete, producible value: name, target, producing function and a
/// fully resolved property set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Specification {
    pub value_name: String,
    pub target: TargetId,
    pub function: FunctionId,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Specification {
    pub fn new(
        value_name: impl Into<String>,
        target: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        Self {
            value_name: value_name.into(),
            target: TargetId::new(target),
            function: FunctionId::new(function),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Whether this specification can be handed to whoever asked for `requirement`.
    pub fn satisfies(&self, requirement: &Requirement) -> bool {
        self.value_name == requirement.value_name
            && self.target == requirement.target
            && requirement.constraints.is_satisfied_by(&self.properties)
    }
}

impl fmt::Display for Specification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]<{}>", self.value_name, self.target, self.function)?;
        if !self.properties.is_empty() {
            let rendered: Vec<String> = self
                .properties
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();
            write!(f, "{{{}}}", rendered.join(", "))?;
        }
        Ok(())
    }
}
