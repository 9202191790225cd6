// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::CollaboratorError;
use crate::model::{Requirement, Specification};
use crate::traits::{Candidate, CompilationContext, FunctionResolver, MarketDataAvailability};

/// A resolver that fails every lookup with the same function error.
pub struct FailingResolver {
    pub message: String,
}

impl FailingResolver {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl FunctionResolver for FailingResolver {
    fn resolve_candidates(
        &self,
        requirement: &Requirement,
        _context: &CompilationContext<'_>,
    ) -> Result<Vec<Candidate>, CollaboratorError> {
        Err(CollaboratorError::function(
            requirement.value_name.to_lowercase(),
            self.message.clone(),
        ))
    }
}

/// A resolver that panics on every lookup.
pub struct PanickingResolver {
    pub message: &'static str,
}

impl FunctionResolver for PanickingResolver {
    fn resolve_candidates(
        &self,
        _requirement: &Requirement,
        _context: &CompilationContext<'_>,
    ) -> Result<Vec<Candidate>, CollaboratorError> {
        panic!("{}", self.message)
    }
}

/// No market data is ever available.
pub struct NoMarketData;

impl MarketDataAvailability for NoMarketData {
    fn availability(&self, _requirement: &Requirement) -> Result<Option<Specification>, CollaboratorError> {
        Ok(None)
    }
}

/// Market data lookups always fail.
pub struct FailingMarketData;

impl MarketDataAvailability for FailingMarketData {
    fn availability(&self, _requirement: &Requirement) -> Result<Option<Specification>, CollaboratorError> {
        Err(CollaboratorError::market_data("feed unavailable"))
    }
}
