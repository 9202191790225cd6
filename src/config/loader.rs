// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_CALCULATION_CONFIGURATION, DEFAULT_MAX_CALLBACK_DEPTH, DEFAULT_SYNC_TIMEOUT_MS,
    DEFAULT_WAIT_INTERVAL_MS,
};
use crate::errors::ConfigError;
use crate::model::Requirement;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

/// A complete build scenario.
///
/// Describes how the builder runs, the function catalogue, the market data
/// that is available without computation, and the targets to resolve. It is
/// typically loaded from a YAML file; a `.toml` extension selects TOML.
///
/// # Fields
/// * `builder` - Builder options (optional, defaults apply)
/// * `functions` - Function catalogue entries
/// * `market_data` - Values available as market data
/// * `targets` - Requirements to resolve
///
/// # Example
/// ```yaml
/// builder:
///   calculation_configuration: eod
///   max_additional_threads: 4
/// functions:
///   - id: pv_discounting
///     output: PV
///     priority: 10
///     inputs:
///       - value_name: DiscountCurve
///         target: USD
/// market_data:
///   - value_name: DiscountCurve
///     target: USD
/// targets:
///   - value_name: PV
///     target: SWAP-1
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub builder: BuilderOptions,
    #[serde(default)]
    pub functions: Vec<FunctionConfig>,
    #[serde(default)]
    pub market_data: Vec<MarketDataConfig>,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl Config {
    pub fn target_requirements(&self) -> Vec<Requirement> {
        self.targets.iter().map(TargetConfig::to_requirement).collect()
    }
}

/// Options controlling one dependency graph build.
///
/// # Fields
/// * `calculation_configuration` - Name carried into the assembled graph
/// * `max_additional_threads` - Background jobs allowed besides the caller
///   (defaults to the available parallelism)
/// * `max_callback_depth` - Nested pumps run inline before being queued
/// * `blocking` - Whether `get_graph` waits for background jobs
/// * `wait_interval_ms` - Cap on the backoff while waiting
/// * `sync_timeout_ms` - Limit for synchronously added targets
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuilderOptions {
    pub calculation_configuration: String,
    pub max_additional_threads: Option<usize>,
    pub max_callback_depth: usize,
    pub blocking: bool,
    pub wait_interval_ms: u64,
    pub sync_timeout_ms: u64,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            calculation_configuration: DEFAULT_CALCULATION_CONFIGURATION.to_string(),
            max_additional_threads: None,
            max_callback_depth: DEFAULT_MAX_CALLBACK_DEPTH,
            blocking: true,
            wait_interval_ms: DEFAULT_WAIT_INTERVAL_MS,
            sync_timeout_ms: DEFAULT_SYNC_TIMEOUT_MS,
        }
    }
}

impl BuilderOptions {
    /// The configured thread limit, or the available parallelism.
    pub fn effective_max_additional_threads(&self) -> usize {
        self.max_additional_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    pub fn wait_interval(&self) -> Duration {
        Duration::from_millis(self.wait_interval_ms.max(1))
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }
}

/// One catalogue function.
///
/// # Example
/// ```yaml
/// id: pv_discounting
/// output: PV
/// target: SWAP-1      # optional; any target when omitted
/// priority: 10
/// properties:
///   Currency: USD
/// inputs:
///   - value_name: DiscountCurve
///     target: USD       # optional; the output's target when omitted
///     constraints:
///       Source: [BBG]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FunctionConfig {
    pub id: String,
    pub output: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub inputs: Vec<InputConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InputConfig {
    pub value_name: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub constraints: BTreeMap<String, Vec<String>>,
}

/// A value available as market data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MarketDataConfig {
    pub value_name: String,
    pub target: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// A requirement to resolve. An empty constraint value list is a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetConfig {
    pub value_name: String,
    pub target: String,
    #[serde(default)]
    pub constraints: BTreeMap<String, Vec<String>>,
}

impl TargetConfig {
    pub fn to_requirement(&self) -> Requirement {
        self.constraints.iter().fold(
            Requirement::new(&self.value_name, &self.target),
            |requirement, (name, values)| requirement.with_constraint(name, values.iter().cloned()),
        )
    }
}

/// Load a config from a YAML or TOML file, chosen by extension.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let is_toml = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map_or(false, |extension| extension.eq_ignore_ascii_case("toml"));
    let cfg: Config = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(cfg)
}

/// Load a config and check it for problems that would make a build
/// meaningless, reporting every problem found.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let cfg = load_config(path)?;
    crate::config::validate_config(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_config() {
        let yaml = r#"
functions:
  - id: pv
    output: PV
    inputs:
      - value_name: Spot
targets:
  - value_name: PV
    target: AAPL
"#;

        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.builder, BuilderOptions::default());
        assert_eq!(cfg.functions.len(), 1);
        assert_eq!(cfg.functions[0].priority, 0);
        assert_eq!(cfg.functions[0].inputs[0].target, None);
        assert_eq!(cfg.target_requirements(), vec![Requirement::new("PV", "AAPL")]);
    }

    #[test]
    fn test_partial_builder_options_keep_defaults() {
        let yaml = r#"
builder:
  max_additional_threads: 0
  blocking: false
"#;

        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.builder.max_additional_threads, Some(0));
        assert_eq!(cfg.builder.effective_max_additional_threads(), 0);
        assert!(!cfg.builder.blocking);
        assert_eq!(cfg.builder.max_callback_depth, DEFAULT_MAX_CALLBACK_DEPTH);
        assert_eq!(cfg.builder.calculation_configuration, DEFAULT_CALCULATION_CONFIGURATION);
    }

    #[test]
    fn test_default_thread_limit_is_positive() {
        assert!(BuilderOptions::default().effective_max_additional_threads() >= 1);
    }

    #[test]
    fn test_target_constraints_become_requirement_constraints() {
        let target = TargetConfig {
            value_name: "PV".to_string(),
            target: "SWAP-1".to_string(),
            constraints: BTreeMap::from([
                ("Currency".to_string(), vec!["USD".to_string()]),
                ("Curve".to_string(), vec![]),
            ]),
        };

        assert_eq!(
            target.to_requirement(),
            Requirement::new("PV", "SWAP-1")
                .with_constraint("Currency", ["USD"])
                .with_constraint("Curve", Vec::<String>::new())
        );
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let error = load_config("does/not/exist.yaml").unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
        assert!(error.to_string().contains("does/not/exist.yaml"));
    }
}
