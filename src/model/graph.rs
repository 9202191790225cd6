// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The immutable graph handed back to callers once construction reaches its
//! fixed point.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::value::{FunctionId, Requirement, Specification, TargetId};

/// Identity of a computation step: the function, what it runs against and
/// the inputs it consumes. Steps with the same key are one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeKey {
    pub function: FunctionId,
    pub target: TargetId,
    pub inputs: BTreeSet<Specification>,
}

/// A finalized computation step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GraphNode {
    pub function: FunctionId,
    pub target: TargetId,
    pub inputs: BTreeSet<Specification>,
    pub outputs: BTreeSet<Specification>,
}

impl GraphNode {
    pub fn from_key(key: NodeKey, outputs: BTreeSet<Specification>) -> Self {
        Self {
            function: key.function,
            target: key.target,
            inputs: key.inputs,
            outputs,
        }
    }
}

/// Node set plus the mapping from originally requested requirements to the
/// specifications that satisfy them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    calculation_configuration: String,
    nodes: BTreeSet<GraphNode>,
    terminal_outputs: BTreeMap<Requirement, Specification>,
}

impl DependencyGraph {
    pub fn new(
        calculation_configuration: impl Into<String>,
        nodes: BTreeSet<GraphNode>,
        terminal_outputs: BTreeMap<Requirement, Specification>,
    ) -> Self {
        Self {
            calculation_configuration: calculation_configuration.into(),
            nodes,
            terminal_outputs,
        }
    }

    pub fn calculation_configuration(&self) -> &str {
        &self.calculation_configuration
    }

    pub fn nodes(&self) -> &BTreeSet<GraphNode> {
        &self.nodes
    }

    pub fn terminal_outputs(&self) -> &BTreeMap<Requirement, Specification> {
        &self.terminal_outputs
    }

    /// Distinct specifications marked as terminal outputs.
    pub fn terminal_output_specifications(&self) -> BTreeSet<&Specification> {
        self.terminal_outputs.values().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node producing `specification`, if any.
    pub fn producer_of(&self, specification: &Specification) -> Option<&GraphNode> {
        self.nodes
            .iter()
            .find(|node| node.outputs.contains(specification))
    }
}
