// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::backends::{FunctionRepository, StaticMarketData};
use crate::config::Config;
use crate::engine::DependencyGraphBuilder;
use crate::traits::JobSpawner;

/// Builder runtime assembly - wires collaborators and a graph builder from
/// configuration.
///
/// The `RuntimeBuilder` turns a loaded [`Config`] into a ready
/// [`DependencyGraphBuilder`] backed by the in-memory function repository and
/// static market data described in the same file. Targets are not submitted;
/// the caller decides when.
///
/// # Examples
///
/// ```
/// use depgraph_builder::config::{Config, RuntimeBuilder};
///
/// let mut config = Config::default();
/// config.builder.max_additional_threads = Some(0);
///
/// let builder = RuntimeBuilder::from_config(&config);
/// builder.add_targets(config.target_requirements());
///
/// let graph = builder.get_graph().unwrap();
/// assert!(graph.is_empty());
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build a graph builder whose background jobs run on OS threads.
    pub fn from_config(cfg: &Config) -> DependencyGraphBuilder {
        let (functions, market_data) = Self::collaborators(cfg);
        DependencyGraphBuilder::new(functions, market_data, &cfg.builder)
    }

    /// Build a graph builder whose background jobs are launched by `spawner`.
    pub fn from_config_with_spawner(cfg: &Config, spawner: Arc<dyn JobSpawner>) -> DependencyGraphBuilder {
        let (functions, market_data) = Self::collaborators(cfg);
        DependencyGraphBuilder::with_spawner(functions, market_data, &cfg.builder, spawner)
    }

    fn collaborators(cfg: &Config) -> (Arc<FunctionRepository>, Arc<StaticMarketData>) {
        (
            Arc::new(FunctionRepository::from_config(&cfg.functions)),
            Arc::new(StaticMarketData::from_config(&cfg.market_data)),
        )
    }
}
