// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{NodeKey, Requirement, ResolvedValue, Specification};
use crate::observability::messages::builder::{TargetResolved, TargetUnresolved};
use crate::observability::messages::StructuredLog;

/// Collects the outcome of every requested target.
///
/// The first resolution of a target wins. Its whole derivation is folded
/// into the node map, where steps shared between targets merge by key.
#[derive(Default)]
pub(crate) struct TerminalCollector {
    outputs: DashMap<Requirement, Specification>,
    nodes: DashMap<NodeKey, BTreeSet<Specification>>,
    unresolved: DashSet<Requirement>,
}

impl TerminalCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn resolved(&self, requirement: &Requirement, value: &ResolvedValue) {
        match self.outputs.entry(requirement.clone()) {
            Entry::Occupied(_) => return,
            Entry::Vacant(vacant) => {
                vacant.insert(value.specification().clone());
            }
        }
        // Only the caller that won the output slot folds its derivation in.
        value.walk(|step| {
            self.nodes
                .entry(step.node_key())
                .or_default()
                .insert(step.specification().clone());
        });
        self.unresolved.remove(requirement);
        TargetResolved {
            requirement,
            specification: value.specification(),
        }
        .log();
    }

    pub(crate) fn failed(&self, requirement: &Requirement) {
        if self.outputs.contains_key(requirement) {
            return;
        }
        self.unresolved.insert(requirement.clone());
        if self.outputs.contains_key(requirement) {
            self.unresolved.remove(requirement);
            return;
        }
        TargetUnresolved { requirement }.log();
    }

    pub(crate) fn outputs(&self) -> BTreeMap<Requirement, Specification> {
        self.outputs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub(crate) fn nodes(&self) -> BTreeMap<NodeKey, BTreeSet<Specification>> {
        self.nodes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub(crate) fn unresolved(&self) -> BTreeSet<Requirement> {
        self.unresolved.iter().map(|requirement| requirement.clone()).collect()
    }
}
