// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors that can occur while validating a builder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Two catalogue entries share a function id.
    #[error("Duplicate function ID: '{function_id}'")]
    DuplicateFunctionId { function_id: String },

    /// A function, input, market data entry or target names no value.
    #[error("Empty value name in {location}")]
    EmptyValueName { location: String },

    /// A target requirement has no target identifier.
    #[error("Target requirement '{value_name}' has no target")]
    MissingTarget { value_name: String },

    /// Pump recursion must be allowed at least one level.
    #[error("max_callback_depth must be at least 1, got {depth}")]
    InvalidCallbackDepth { depth: usize },

    /// A function lists itself as producing one of its own inputs on the same
    /// target; every resolution through it would be rejected as a loop.
    #[error("Function '{function_id}' requires its own output '{value_name}'")]
    SelfDependency {
        function_id: String,
        value_name: String,
    },
}

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration validation failed:\n{}", render(.0))]
    Invalid(Vec<ValidationError>),
}

fn render(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
