//! Configuration validation for build scenarios.
//!
//! The builder tolerates almost anything at runtime: a requirement nothing
//! can produce simply stays unresolved. Validation catches the mistakes that
//! would make such an outcome certain, or ambiguous, before a build starts.
//!
//! # Checks
//!
//! 1. **Options**: `max_callback_depth` must be at least 1
//! 2. **Uniqueness**: function ids are unique
//! 3. **Names**: every function output, input, market data entry and target
//!    names a value; every target names a target
//! 4. **Self-dependency**: no function needs its own output on its own target
//!
//! All errors are collected rather than stopping at the first.
//!
//! # Examples
//!
//! ```rust
//! use depgraph_builder::config::{validate_config, Config, FunctionConfig};
//! use depgraph_builder::errors::ValidationError;
//! use std::collections::BTreeMap;
//!
//! let function = FunctionConfig {
//!     id: "pv".to_string(),
//!     output: "PV".to_string(),
//!     target: None,
//!     priority: 0,
//!     properties: BTreeMap::new(),
//!     inputs: vec![],
//! };
//! let config = Config {
//!     functions: vec![function.clone(), function],
//!     ..Config::default()
//! };
//!
//! let errors = validate_config(&config).unwrap_err();
//! assert_eq!(
//!     errors,
//!     vec![ValidationError::DuplicateFunctionId { function_id: "pv".to_string() }]
//! );
//! ```

use std::collections::HashSet;

use crate::config::Config;
use crate::errors::ValidationError;

pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.builder.max_callback_depth == 0 {
        errors.push(ValidationError::InvalidCallbackDepth {
            depth: config.builder.max_callback_depth,
        });
    }

    let mut seen = HashSet::new();
    for function in &config.functions {
        if !seen.insert(function.id.as_str()) {
            errors.push(ValidationError::DuplicateFunctionId {
                function_id: function.id.clone(),
            });
        }
        if function.output.trim().is_empty() {
            errors.push(ValidationError::EmptyValueName {
                location: format!("function '{}' output", function.id),
            });
        }
        for (position, input) in function.inputs.iter().enumerate() {
            if input.value_name.trim().is_empty() {
                errors.push(ValidationError::EmptyValueName {
                    location: format!("function '{}' input {}", function.id, position),
                });
                continue;
            }
            let same_target = input.target.is_none() || input.target == function.target;
            if input.value_name == function.output && same_target && input.constraints.is_empty() {
                errors.push(ValidationError::SelfDependency {
                    function_id: function.id.clone(),
                    value_name: input.value_name.clone(),
                });
            }
        }
    }

    for (position, entry) in config.market_data.iter().enumerate() {
        if entry.value_name.trim().is_empty() {
            errors.push(ValidationError::EmptyValueName {
                location: format!("market data entry {}", position),
            });
        }
    }

    for (position, target) in config.targets.iter().enumerate() {
        if target.value_name.trim().is_empty() {
            errors.push(ValidationError::EmptyValueName {
                location: format!("target {}", position),
            });
        }
        if target.target.trim().is_empty() {
            errors.push(ValidationError::MissingTarget {
                value_name: target.value_name.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
