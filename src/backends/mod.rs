// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Collaborator implementations for the dependency graph builder.
//!
//! The builder consults two pluggable collaborators while resolving: a
//! function resolver and a market data availability provider. This module
//! provides in-memory versions of both, built directly or from configuration.
//!
//! # Available Backends
//!
//! ## Function Repository
//! An in-memory catalogue of functions:
//! - **Matching**: by value name and, optionally, a fixed target
//! - **Ordering**: registration order; the builder applies priority
//! - **Use Case**: scenario files, tests, small embedded catalogues
//!
//! ## Static Market Data
//! A fixed set of values that are available without computation:
//! - **Matching**: value name, target and constraints against properties
//! - **Output**: specifications tagged with the `market_data` function
//!
//! ## Stub Backend (Test-Only)
//! Collaborators for failure-path tests (only available in test builds):
//! - **FailingResolver**: every lookup fails with the same error
//! - **PanickingResolver**: every lookup panics
//! - **NoMarketData** / **FailingMarketData**
//!
//! # Examples
//!
//! ```rust
//! use depgraph_builder::backends::{FunctionDefinition, FunctionRepository, StaticMarketData};
//!
//! let mut functions = FunctionRepository::new();
//! functions.add(FunctionDefinition::new("pv", "PV", 0).with_input("Spot"));
//!
//! let mut market_data = StaticMarketData::new();
//! market_data.provide("Spot", "AAPL");
//!
//! assert_eq!(functions.len(), 1);
//! assert_eq!(market_data.len(), 1);
//! ```

pub mod market_data;
pub mod repository;
#[cfg(test)]
pub mod stub;

pub use market_data::{StaticMarketData, MARKET_DATA_FUNCTION};
pub use repository::{FunctionDefinition, FunctionRepository, InputDefinition};
