// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use crate::config::FunctionConfig;
use crate::errors::CollaboratorError;
use crate::model::{FunctionId, Requirement, Specification, TargetId, ValueProperties};
use crate::traits::{Candidate, CompilationContext, FunctionResolver};

/// An input a function needs, relative to the requirement being resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDefinition {
    pub value_name: String,
    /// Fixed target; `None` means the target of the requirement.
    pub target: Option<TargetId>,
    pub constraints: ValueProperties,
}

impl InputDefinition {
    fn requirement_for(&self, target: &TargetId) -> Requirement {
        Requirement {
            value_name: self.value_name.clone(),
            target: self.target.clone().unwrap_or_else(|| target.clone()),
            constraints: self.constraints.clone(),
        }
    }
}

/// A catalogue entry: produces `value_name` (on `target`, or any target),
/// with the given output properties, from `inputs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub id: FunctionId,
    pub value_name: String,
    pub target: Option<TargetId>,
    pub priority: i32,
    pub inputs: Vec<InputDefinition>,
    pub properties: BTreeMap<String, String>,
}

impl FunctionDefinition {
    pub fn new(id: impl Into<String>, value_name: impl Into<String>, priority: i32) -> Self {
        Self {
            id: FunctionId::new(id),
            value_name: value_name.into(),
            target: None,
            priority,
            inputs: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn on_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(TargetId::new(target));
        self
    }

    /// Requires `value_name` on the same target as the output.
    pub fn with_input(self, value_name: impl Into<String>) -> Self {
        self.with_input_definition(InputDefinition {
            value_name: value_name.into(),
            target: None,
            constraints: ValueProperties::new(),
        })
    }

    pub fn with_input_definition(mut self, input: InputDefinition) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    fn matches(&self, requirement: &Requirement) -> bool {
        self.value_name == requirement.value_name
            && self
                .target
                .as_ref()
                .map_or(true, |target| *target == requirement.target)
    }

    fn candidate_for(&self, requirement: &Requirement) -> Candidate {
        let output = Specification {
            value_name: self.value_name.clone(),
            target: requirement.target.clone(),
            function: self.id.clone(),
            properties: self.properties.clone(),
        };
        self.inputs.iter().fold(
            Candidate::new(self.id.as_str(), self.priority, output),
            |candidate, input| candidate.with_input(input.requirement_for(&requirement.target)),
        )
    }
}

impl From<&FunctionConfig> for FunctionDefinition {
    fn from(config: &FunctionConfig) -> Self {
        let mut definition = FunctionDefinition::new(&config.id, &config.output, config.priority);
        definition.target = config.target.as_deref().map(TargetId::new);
        definition.properties = config.properties.clone();
        definition.inputs = config
            .inputs
            .iter()
            .map(|input| InputDefinition {
                value_name: input.value_name.clone(),
                target: input.target.as_deref().map(TargetId::new),
                constraints: ValueProperties(
                    input
                        .constraints
                        .iter()
                        .map(|(name, values)| (name.clone(), values.iter().cloned().collect()))
                        .collect(),
                ),
            })
            .collect();
        definition
    }
}

/// In-memory function catalogue.
///
/// Candidates come back in registration order; the task sorts them by
/// priority with a stable sort, so equal priorities keep that order.
#[derive(Debug, Clone, Default)]
pub struct FunctionRepository {
    functions: Vec<FunctionDefinition>,
}

impl FunctionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(functions: &[FunctionConfig]) -> Self {
        Self {
            functions: functions.iter().map(FunctionDefinition::from).collect(),
        }
    }

    pub fn add(&mut self, definition: FunctionDefinition) -> &mut Self {
        self.functions.push(definition);
        self
    }

    /// Shorthand for a function with no inputs.
    pub fn register(&mut self, id: impl Into<String>, value_name: impl Into<String>, priority: i32) -> &mut Self {
        self.add(FunctionDefinition::new(id, value_name, priority))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FunctionResolver for FunctionRepository {
    fn resolve_candidates(
        &self,
        requirement: &Requirement,
        _context: &CompilationContext<'_>,
    ) -> Result<Vec<Candidate>, CollaboratorError> {
        Ok(self
            .functions
            .iter()
            .filter(|function| function.matches(requirement))
            .map(|function| function.candidate_for(requirement))
            .collect())
    }
}
