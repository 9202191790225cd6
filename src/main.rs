// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use std::env;
use std::time::{Duration, Instant};

use depgraph_builder::config::{load_and_validate_config, Config, RuntimeBuilder};
use depgraph_builder::engine::{DependencyGraphBuilder, TokioSpawner};
use depgraph_builder::model::serialize::{to_json, to_text};
use depgraph_builder::model::DependencyGraph;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn";

/// Command line options for one build.
#[derive(Debug, PartialEq, Eq)]
struct CliOptions {
    scenario: String,
    threads: Option<usize>,
    json: bool,
    timeout: Option<Duration>,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} <scenario.yaml|scenario.toml> [--threads N] [--json] [--timeout-ms N]\n\
         Example: {} configs/swap-portfolio.yaml --threads 4",
        program, program
    )
}

fn parse_args(args: &[String]) -> Result<CliOptions> {
    let program = args.first().map(String::as_str).unwrap_or("depgraph-builder");
    let mut scenario = None;
    let mut threads = None;
    let mut json = false;
    let mut timeout = None;

    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--threads" => {
                let value = rest.next().context("--threads needs a value")?;
                threads = Some(value.parse().with_context(|| format!("invalid thread count '{}'", value))?);
            }
            "--timeout-ms" => {
                let value = rest.next().context("--timeout-ms needs a value")?;
                let millis: u64 = value.parse().with_context(|| format!("invalid timeout '{}'", value))?;
                timeout = Some(Duration::from_millis(millis));
            }
            "--json" => json = true,
            "-h" | "--help" => bail!(usage(program)),
            other if other.starts_with("--") => bail!("unknown option '{}'\n{}", other, usage(program)),
            other => {
                if scenario.replace(other.to_string()).is_some() {
                    bail!("only one scenario may be given\n{}", usage(program));
                }
            }
        }
    }

    let scenario = scenario.with_context(|| usage(program))?;
    Ok(CliOptions {
        scenario,
        threads,
        json,
        timeout,
    })
}

/// Submits every configured target and waits for the graph on a blocking
/// thread. A timeout cancels the build.
async fn build_graph(builder: DependencyGraphBuilder, config: &Config, timeout: Option<Duration>) -> Result<DependencyGraph> {
    builder.add_targets(config.target_requirements());

    let waiting = builder.clone();
    let handle = tokio::task::spawn_blocking(move || waiting.get_graph_blocking(true));
    let graph = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                builder.cancel_active_build();
                bail!("graph construction did not finish within {:?}", limit);
            }
        },
        None => handle.await,
    };
    Ok(graph.context("graph construction thread failed")??)
}

fn print_report(builder: &DependencyGraphBuilder, graph: &DependencyGraph, json: bool, elapsed: Duration) -> Result<()> {
    if json {
        println!("{}", to_json(graph)?);
        return Ok(());
    }

    println!("📋 Calculation configuration: {}", graph.calculation_configuration());
    println!("⚙️  Max additional threads: {}", builder.max_additional_threads());
    println!();
    print!("{}", to_text(graph));

    let unresolved = builder.unresolved_requirements();
    if !unresolved.is_empty() {
        println!();
        println!("❌ Unresolved targets:");
        for requirement in &unresolved {
            println!("   {}", requirement);
        }
    }

    let exceptions = builder.exceptions();
    if !exceptions.is_empty() {
        println!();
        println!("⚠️  Collaborator errors:");
        let mut counted: Vec<_> = exceptions.into_iter().collect();
        counted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));
        for (error, count) in counted {
            println!("   {} x{}", error, count);
        }
    }

    println!();
    println!("⏱️  Built in {:.2?}", elapsed);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args)?;

    let mut config = load_and_validate_config(&options.scenario)
        .with_context(|| format!("failed to load scenario '{}'", options.scenario))?;
    if let Some(threads) = options.threads {
        config.builder.max_additional_threads = Some(threads);
    }

    let start_time = Instant::now();
    let builder = RuntimeBuilder::from_config_with_spawner(&config, std::sync::Arc::new(TokioSpawner::current()));
    let graph = build_graph(builder.clone(), &config, options.timeout).await?;
    print_report(&builder, &graph, options.json, start_time.elapsed())
}
