// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Seams to the outside world consulted while a requirement is resolved.
//!
//! The builder never computes anything itself. It asks a [`FunctionResolver`]
//! which functions could produce a requirement and a [`MarketDataAvailability`]
//! provider whether the value is simply available as market data. Both are
//! called from worker threads, concurrently, so implementations must be
//! `Send + Sync` and deterministic for a given input.
//!
//! # Examples
//!
//! ```rust
//! use depgraph_builder::errors::CollaboratorError;
//! use depgraph_builder::model::{Requirement, Specification};
//! use depgraph_builder::traits::{Candidate, CompilationContext, FunctionResolver};
//!
//! struct SpotOnly;
//!
//! impl FunctionResolver for SpotOnly {
//!     fn resolve_candidates(
//!         &self,
//!         requirement: &Requirement,
//!         _context: &CompilationContext<'_>,
//!     ) -> Result<Vec<Candidate>, CollaboratorError> {
//!         if requirement.value_name != "Spot" {
//!             return Ok(vec![]);
//!         }
//!         let output = Specification::new("Spot", requirement.target.as_str(), "spot_fn");
//!         Ok(vec![Candidate::new("spot_fn", 0, output)])
//!     }
//! }
//! ```

use crate::errors::CollaboratorError;
use crate::model::{FunctionId, Requirement, Specification};

/// One way of producing a requirement: a function, how strongly it is
/// preferred, what it outputs and what it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub function: FunctionId,
    /// Higher values are tried first; equal priorities keep resolver order.
    pub priority: i32,
    pub output: Specification,
    pub inputs: Vec<Requirement>,
}

impl Candidate {
    pub fn new(function: impl Into<String>, priority: i32, output: Specification) -> Self {
        Self {
            function: FunctionId::new(function),
            priority,
            output,
            inputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, input: Requirement) -> Self {
        self.inputs.push(input);
        self
    }
}

/// Read-only view handed to the resolver for each requirement.
pub struct CompilationContext<'a> {
    calculation_configuration: &'a str,
    market_data: &'a dyn MarketDataAvailability,
}

impl<'a> CompilationContext<'a> {
    pub fn new(calculation_configuration: &'a str, market_data: &'a dyn MarketDataAvailability) -> Self {
        Self {
            calculation_configuration,
            market_data,
        }
    }

    pub fn calculation_configuration(&self) -> &str {
        self.calculation_configuration
    }

    /// The market data provider the build was configured with.
    pub fn market_data(&self) -> &dyn MarketDataAvailability {
        self.market_data
    }
}

/// Supplies candidate functions for a requirement.
pub trait FunctionResolver: Send + Sync {
    /// Returns every candidate that may produce `requirement`, in registration
    /// order. An empty list means nothing can produce it.
    fn resolve_candidates(
        &self,
        requirement: &Requirement,
        context: &CompilationContext<'_>,
    ) -> Result<Vec<Candidate>, CollaboratorError>;
}

/// Answers whether a requirement is satisfied directly by market data.
pub trait MarketDataAvailability: Send + Sync {
    /// The specification of the market data value, or `None` if the
    /// requirement must be computed.
    fn availability(&self, requirement: &Requirement) -> Result<Option<Specification>, CollaboratorError>;
}
