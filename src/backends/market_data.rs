// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::MarketDataConfig;
use crate::errors::CollaboratorError;
use crate::model::{Requirement, Specification};
use crate::traits::MarketDataAvailability;

/// Function id recorded on specifications sourced from market data.
pub const MARKET_DATA_FUNCTION: &str = "market_data";

/// A fixed set of available market data values.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketData {
    available: Vec<Specification>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(entries: &[MarketDataConfig]) -> Self {
        let mut market_data = Self::new();
        for entry in entries {
            let specification = entry
                .properties
                .iter()
                .fold(
                    Specification::new(&entry.value_name, &entry.target, MARKET_DATA_FUNCTION),
                    |specification, (name, value)| specification.with_property(name, value),
                );
            market_data.available.push(specification);
        }
        market_data
    }

    pub fn provide(&mut self, value_name: impl Into<String>, target: impl Into<String>) -> &mut Self {
        self.available
            .push(Specification::new(value_name, target, MARKET_DATA_FUNCTION));
        self
    }

    pub fn len(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}

impl MarketDataAvailability for StaticMarketData {
    fn availability(&self, requirement: &Requirement) -> Result<Option<Specification>, CollaboratorError> {
        Ok(self
            .available
            .iter()
            .find(|specification| specification.satisfies(requirement))
            .cloned())
    }
}
