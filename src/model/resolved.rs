// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::model::graph::NodeKey;
use crate::model::value::{FunctionId, Specification, TargetId};

/// A specification together with the computation step that produces it.
///
/// Resolved inputs are carried along so the whole chain of steps behind a
/// terminal output can be turned into graph nodes once it is accepted.
/// Cloning is cheap; inputs are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    specification: Specification,
    function: FunctionId,
    priority: i32,
    inputs: Arc<[ResolvedValue]>,
}

impl ResolvedValue {
    pub fn new(
        specification: Specification,
        function: FunctionId,
        priority: i32,
        inputs: Vec<ResolvedValue>,
    ) -> Self {
        Self {
            specification,
            function,
            priority,
            inputs: inputs.into(),
        }
    }

    pub fn specification(&self) -> &Specification {
        &self.specification
    }

    pub fn function(&self) -> &FunctionId {
        &self.function
    }

    pub fn target(&self) -> &TargetId {
        &self.specification.target
    }

    /// Priority of the candidate this value came from; higher ranks first.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn inputs(&self) -> &[ResolvedValue] {
        &self.inputs
    }

    /// Identity of the computation step behind this value.
    pub fn node_key(&self) -> NodeKey {
        NodeKey {
            function: self.function.clone(),
            target: self.specification.target.clone(),
            inputs: self
                .inputs
                .iter()
                .map(|input| input.specification.clone())
                .collect::<BTreeSet<_>>(),
        }
    }

    /// Visits this value and every value it depends on, each step once.
    pub fn walk(&self, mut visit: impl FnMut(&ResolvedValue)) {
        let mut seen: BTreeSet<(NodeKey, Specification)> = BTreeSet::new();
        let mut stack: Vec<&ResolvedValue> = vec![self];
        while let Some(value) = stack.pop() {
            if !seen.insert((value.node_key(), value.specification.clone())) {
                continue;
            }
            visit(value);
            stack.extend(value.inputs.iter());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> ResolvedValue {
        ResolvedValue::new(
            Specification::new(name, "T", "source"),
            FunctionId::new("source"),
            0,
            vec![],
        )
    }

    #[test]
    fn test_walk_visits_shared_inputs_once() {
        let shared = leaf("Curve");
        let left = ResolvedValue::new(
            Specification::new("Left", "T", "left_fn"),
            FunctionId::new("left_fn"),
            0,
            vec![shared.clone()],
        );
        let right = ResolvedValue::new(
            Specification::new("Right", "T", "right_fn"),
            FunctionId::new("right_fn"),
            0,
            vec![shared],
        );
        let root = ResolvedValue::new(
            Specification::new("Root", "T", "root_fn"),
            FunctionId::new("root_fn"),
            0,
            vec![left, right],
        );

        let mut visited = Vec::new();
        root.walk(|value| visited.push(value.specification().value_name.clone()));

        assert_eq!(visited.len(), 4);
        assert_eq!(visited.iter().filter(|name| *name == "Curve").count(), 1);
    }

    #[test]
    fn test_node_key_uses_input_specifications() {
        let value = ResolvedValue::new(
            Specification::new("PV", "T", "pv"),
            FunctionId::new("pv"),
            3,
            vec![leaf("Curve"), leaf("Spot")],
        );

        let key = value.node_key();
        assert_eq!(key.function, FunctionId::new("pv"));
        assert_eq!(key.inputs.len(), 2);
        assert_eq!(value.priority(), 3);
    }
}
