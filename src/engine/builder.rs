// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The public face of the engine.
//!
//! A [`DependencyGraphBuilder`] accepts target requirements at any time, lets
//! background jobs resolve them, and hands back the assembled
//! [`DependencyGraph`] once nothing is left to do.
//!
//! ```text
//! add_target ──► run queue ──► jobs (≤ max_additional_threads) ──┐
//!                    ▲                                           │
//!                    └──── get_graph: caller drains as one more ─┘
//!                                         │
//!                          fixed point ──► assemble ──► DependencyGraph
//! ```

use crossbeam_channel::RecvTimeoutError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::BuilderOptions;
use crate::engine::assembly::assemble;
use crate::engine::context::BuildShared;
use crate::engine::pool::{self, ThreadSpawner, WorkerPool};
use crate::engine::producer::Callback;
use crate::engine::run_queue::WorkItem;
use crate::errors::{BuildError, CollaboratorError};
use crate::model::{DependencyGraph, Requirement, Specification};
use crate::observability::messages::builder::{TargetAdded, WaitingForBackgroundJobs};
use crate::observability::messages::StructuredLog;
use crate::traits::{FunctionResolver, JobSpawner, MarketDataAvailability};

const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(250);
const INITIAL_BACKOFF: Duration = Duration::from_millis(1);

/// Builds one dependency graph, concurrently and incrementally.
///
/// Cloning is cheap: clones share the same build.
#[derive(Clone)]
pub struct DependencyGraphBuilder {
    shared: Arc<BuildShared>,
    blocking: bool,
    wait_interval: Duration,
    sync_timeout: Duration,
}

impl DependencyGraphBuilder {
    /// Creates a builder whose background jobs run on dedicated OS threads.
    pub fn new(
        resolver: Arc<dyn FunctionResolver>,
        market_data: Arc<dyn MarketDataAvailability>,
        options: &BuilderOptions,
    ) -> Self {
        Self::with_spawner(resolver, market_data, options, Arc::new(ThreadSpawner))
    }

    pub fn with_spawner(
        resolver: Arc<dyn FunctionResolver>,
        market_data: Arc<dyn MarketDataAvailability>,
        options: &BuilderOptions,
        spawner: Arc<dyn JobSpawner>,
    ) -> Self {
        let pool = WorkerPool::new(options.effective_max_additional_threads(), spawner);
        let shared = BuildShared::new(
            options.calculation_configuration.clone(),
            options.max_callback_depth,
            resolver,
            market_data,
            pool,
        );
        Self {
            shared: Arc::new(shared),
            blocking: options.blocking,
            wait_interval: options.wait_interval(),
            sync_timeout: options.sync_timeout(),
        }
    }

    pub fn calculation_configuration(&self) -> &str {
        &self.shared.calculation_configuration
    }

    /// Submits a target. Returns immediately; resolution happens on
    /// background jobs or when the graph is requested.
    pub fn add_target(&self, requirement: Requirement) {
        self.submit(requirement, Callback::Terminal);
        pool::start_job(&self.shared);
    }

    pub fn add_targets(&self, requirements: impl IntoIterator<Item = Requirement>) {
        let mut submitted = 0;
        for requirement in requirements {
            self.submit(requirement, Callback::Terminal);
            submitted += 1;
        }
        for _ in 0..submitted {
            if !pool::start_job(&self.shared) {
                break;
            }
        }
    }

    fn submit(&self, requirement: Requirement, callback: Callback) {
        TargetAdded {
            requirement: &requirement,
        }
        .log();
        self.shared.queue.push(WorkItem::Target { requirement, callback });
    }

    /// Resolves a single target and waits for its first resolution.
    ///
    /// The calling thread helps drain the run queue while it waits. The
    /// target is recorded in the graph like any other.
    pub fn add_target_sync(&self, requirement: Requirement) -> Result<Specification, BuildError> {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        self.submit(requirement.clone(), Callback::Sync(sender));
        pool::start_job(&self.shared);

        let deadline = Instant::now() + self.sync_timeout;
        loop {
            if !pool::run_caller_job(&self.shared) {
                return Err(BuildError::Cancelled);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(remaining.min(SYNC_POLL_INTERVAL)) {
                Ok(Some(specification)) => return Ok(specification),
                Ok(None) => return Err(BuildError::Unsatisfiable(requirement)),
                Err(RecvTimeoutError::Disconnected) => return Err(BuildError::Stalled(requirement)),
                Err(RecvTimeoutError::Timeout) => {
                    if self.shared.is_graph_built() {
                        // Nothing left to run; a last look covers an answer
                        // that arrived just after the timeout.
                        return match receiver.try_recv() {
                            Ok(Some(specification)) => Ok(specification),
                            Ok(None) => Err(BuildError::Unsatisfiable(requirement)),
                            Err(_) => Err(BuildError::Stalled(requirement)),
                        };
                    }
                    if Instant::now() >= deadline {
                        return Err(BuildError::Timeout(requirement));
                    }
                }
            }
        }
    }

    pub fn max_additional_threads(&self) -> usize {
        self.shared.pool.max_additional_threads()
    }

    /// Takes effect immediately: raising the limit starts jobs for queued
    /// work, lowering it only stops new jobs from starting.
    pub fn set_max_additional_threads(&self, max_additional_threads: usize) {
        pool::set_max_additional_threads(&self.shared, max_additional_threads);
    }

    /// True once the queue is empty, no job is running and no task is left
    /// waiting on another. Tasks found waiting on each other are scheduled to
    /// give up their wait, so a later call can succeed.
    pub fn is_graph_built(&self) -> bool {
        self.shared.is_graph_built()
    }

    /// The graph if the build is at its fixed point. Never runs work on the
    /// calling thread.
    pub fn poll_graph(&self) -> Option<DependencyGraph> {
        self.is_graph_built()
            .then(|| assemble(&self.shared.calculation_configuration, &self.shared.terminal))
    }

    /// Retrieves the graph using the configured blocking mode.
    pub fn get_graph(&self) -> Result<DependencyGraph, BuildError> {
        self.get_graph_blocking(self.blocking)
    }

    /// Retrieves the graph, running queued work on the calling thread.
    ///
    /// While background jobs are still busy a blocking caller sleeps with a
    /// growing backoff capped at the wait interval; a non-blocking caller
    /// gets [`BuildError::Incomplete`] instead. A cancellation during the
    /// call yields [`BuildError::Cancelled`].
    pub fn get_graph_blocking(&self, blocking: bool) -> Result<DependencyGraph, BuildError> {
        let epoch = self.shared.pool.cancellation_epoch();
        let mut backoff = INITIAL_BACKOFF;
        loop {
            if self.shared.pool.cancellation_epoch() != epoch {
                return Err(BuildError::Cancelled);
            }
            if !self.shared.queue.is_empty() {
                if !pool::run_caller_job(&self.shared) {
                    return Err(BuildError::Cancelled);
                }
                continue;
            }
            if self.shared.is_graph_built() {
                return Ok(assemble(&self.shared.calculation_configuration, &self.shared.terminal));
            }
            if !self.shared.queue.is_empty() {
                // Stalled tasks were just released.
                continue;
            }
            if !blocking {
                return Err(BuildError::Incomplete);
            }
            WaitingForBackgroundJobs {
                active_jobs: self.shared.pool.active_jobs(),
                backoff,
            }
            .log();
            std::thread::sleep(backoff);
            backoff = (backoff * 2).min(self.wait_interval);
        }
    }

    /// Stops every job between work items and prevents new ones. Partial
    /// state is kept; raising the thread limit and requesting the graph
    /// again resumes the build.
    pub fn cancel_active_build(&self) {
        self.shared.pool.cancel();
    }

    /// Completed over scheduled work items; `None` until something has been
    /// scheduled. Advisory only.
    pub fn estimate_build_fraction(&self) -> Option<f64> {
        self.shared.queue.estimate_fraction()
    }

    /// Targets resolved so far and the specification each resolved to.
    pub fn value_requirement_mapping(&self) -> BTreeMap<Requirement, Specification> {
        self.shared.terminal.outputs()
    }

    /// Targets every resolution path failed for.
    pub fn unresolved_requirements(&self) -> BTreeSet<Requirement> {
        self.shared.terminal.unresolved()
    }

    /// Collaborator errors seen by finished work blocks, with occurrence
    /// counts.
    pub fn exceptions(&self) -> HashMap<CollaboratorError, usize> {
        self.shared.exceptions.snapshot()
    }

    #[cfg(test)]
    pub(crate) fn resolving_task_count(&self, requirement: &Requirement) -> usize {
        self.shared.index.tasks_resolving(requirement).len()
    }

    #[cfg(test)]
    pub(crate) fn producing_task_count(&self, specification: &Specification) -> usize {
        self.shared.index.tasks_producing(specification).len()
    }

    #[cfg(test)]
    pub(crate) fn task_count(&self) -> usize {
        self.shared.index.task_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::NoMarketData;
    use crate::backends::{FunctionDefinition, FunctionRepository};

    fn builder(repository: FunctionRepository, threads: usize) -> DependencyGraphBuilder {
        let options = BuilderOptions {
            max_additional_threads: Some(threads),
            ..BuilderOptions::default()
        };
        DependencyGraphBuilder::new(Arc::new(repository), Arc::new(NoMarketData), &options)
    }

    #[test]
    fn test_empty_builder_is_built() {
        let builder = builder(FunctionRepository::new(), 0);

        assert!(builder.is_graph_built());
        assert_eq!(builder.estimate_build_fraction(), None);
        let graph = builder.get_graph().unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn test_targets_wait_for_caller_without_threads() {
        let mut repository = FunctionRepository::new();
        repository.register("pv", "PV", 0);
        let builder = builder(repository, 0);

        builder.add_target(Requirement::new("PV", "SWAP-1"));

        assert!(!builder.is_graph_built());
        assert!(builder.poll_graph().is_none());
        assert_eq!(builder.estimate_build_fraction(), Some(0.0));

        let graph = builder.get_graph_blocking(false).unwrap();
        assert_eq!(graph.terminal_outputs().len(), 1);
        assert_eq!(builder.estimate_build_fraction(), Some(1.0));
    }

    #[test]
    fn test_non_blocking_retrieval_releases_tasks_waiting_on_each_other() {
        let mut repository = FunctionRepository::new();
        repository
            .add(FunctionDefinition::new("a_from_b", "A", 10).with_input("B"))
            .register("a_direct", "A", 0)
            .add(FunctionDefinition::new("b_from_a", "B", 10).with_input("A"))
            .register("b_direct", "B", 0);
        let builder = builder(repository, 0);

        builder.add_targets([Requirement::new("A", "T"), Requirement::new("B", "T")]);
        let graph = builder.get_graph_blocking(false).unwrap();

        assert_eq!(graph.terminal_outputs().len(), 2);
        assert!(builder.is_graph_built());
        assert!(builder.unresolved_requirements().is_empty());
    }

    #[test]
    fn test_set_max_additional_threads_is_reported() {
        let builder = builder(FunctionRepository::new(), 0);
        builder.set_max_additional_threads(3);
        assert_eq!(builder.max_additional_threads(), 3);
    }

    #[test]
    fn test_calculation_configuration_reaches_graph() {
        let options = BuilderOptions {
            calculation_configuration: "eod".to_string(),
            max_additional_threads: Some(0),
            ..BuilderOptions::default()
        };
        let builder =
            DependencyGraphBuilder::new(Arc::new(FunctionRepository::new()), Arc::new(NoMarketData), &options);

        assert_eq!(builder.calculation_configuration(), "eod");
        assert_eq!(builder.get_graph().unwrap().calculation_configuration(), "eod");
    }
}
