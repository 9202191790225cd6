// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised by the pluggable collaborators while a work item runs.
//!
//! These never abort a build. They are caught where the work item runs,
//! deduplicated by equality and counted, so the type is a plain value:
//! `Clone + Eq + Hash`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum CollaboratorError {
    /// The function resolver could not produce candidates.
    #[error("function resolution failed: {message}")]
    Resolver { message: String },

    /// A specific function failed while describing its inputs or outputs.
    #[error("function '{function}' failed: {message}")]
    Function { function: String, message: String },

    /// The market data availability provider failed.
    #[error("market data availability check failed: {message}")]
    MarketData { message: String },

    /// A work item panicked; the payload message is kept when it is a string.
    #[error("work item panicked: {message}")]
    Panicked { message: String },
}

impl CollaboratorError {
    pub fn resolver(message: impl Into<String>) -> Self {
        Self::Resolver {
            message: message.into(),
        }
    }

    pub fn function(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Function {
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn market_data(message: impl Into<String>) -> Self {
        Self::MarketData {
            message: message.into(),
        }
    }

    /// Builds a `Panicked` error from a `catch_unwind` payload.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }
}
