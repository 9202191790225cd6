// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph builder lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Targets being added and their final outcome
//! * Background construction jobs starting, stopping and failing to start
//! * Cancellation and waiting on background work
//! * Assembly of the finished dependency graph

use crate::model::{Requirement, Specification};
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A target requirement was submitted to the builder.
///
/// # Log Level
/// `debug!` - Routine, one per target
pub struct TargetAdded<'a> {
    pub requirement: &'a Requirement,
}

impl Display for TargetAdded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Added target {}", self.requirement)
    }
}

impl StructuredLog for TargetAdded<'_> {
    fn log(&self) {
        tracing::debug!(requirement = %self.requirement, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("target_added", span_name = name, requirement = %self.requirement)
    }
}

/// A target requirement was resolved and recorded as a terminal output.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use depgraph_builder::model::{Requirement, Specification};
/// use depgraph_builder::observability::messages::builder::TargetResolved;
///
/// let requirement = Requirement::new("PV", "SWAP-1");
/// let specification = Specification::new("PV", "SWAP-1", "pv_fn");
/// let msg = TargetResolved {
///     requirement: &requirement,
///     specification: &specification,
/// };
///
/// assert_eq!(msg.to_string(), "Resolved target PV[SWAP-1] to PV[SWAP-1]<pv_fn>");
/// ```
pub struct TargetResolved<'a> {
    pub requirement: &'a Requirement,
    pub specification: &'a Specification,
}

impl Display for TargetResolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Resolved target {} to {}", self.requirement, self.specification)
    }
}

impl StructuredLog for TargetResolved<'_> {
    fn log(&self) {
        tracing::info!(
            requirement = %self.requirement,
            specification = %self.specification,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "target_resolved",
            span_name = name,
            requirement = %self.requirement,
            specification = %self.specification,
        )
    }
}

/// Every path for a target requirement was exhausted.
///
/// # Log Level
/// `warn!` - The graph will be missing this output
pub struct TargetUnresolved<'a> {
    pub requirement: &'a Requirement,
}

impl Display for TargetUnresolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Couldn't resolve {}", self.requirement)
    }
}

impl StructuredLog for TargetUnresolved<'_> {
    fn log(&self) {
        tracing::warn!(requirement = %self.requirement, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("target_unresolved", span_name = name, requirement = %self.requirement)
    }
}

/// A background construction job started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct BuildJobStarted {
    pub job_id: u64,
    pub active_jobs: usize,
}

impl Display for BuildJobStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Building job {} started ({} active)",
            self.job_id, self.active_jobs
        )
    }
}

impl StructuredLog for BuildJobStarted {
    fn log(&self) {
        tracing::info!(job_id = self.job_id, active_jobs = self.active_jobs, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "build_job",
            span_name = name,
            job_id = self.job_id,
            active_jobs = self.active_jobs,
        )
    }
}

/// A construction job ran out of work or was cancelled.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use depgraph_builder::observability::messages::builder::BuildJobStopped;
///
/// let msg = BuildJobStopped {
///     job_id: 7,
///     completed: 120,
///     cancelled: false,
/// };
///
/// assert_eq!(msg.to_string(), "Building job 7 stopped after 120 operations");
/// ```
pub struct BuildJobStopped {
    pub job_id: u64,
    pub completed: u64,
    pub cancelled: bool,
}

impl Display for BuildJobStopped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.cancelled {
            write!(
                f,
                "Building job {} cancelled after {} operations",
                self.job_id, self.completed
            )
        } else {
            write!(
                f,
                "Building job {} stopped after {} operations",
                self.job_id, self.completed
            )
        }
    }
}

impl StructuredLog for BuildJobStopped {
    fn log(&self) {
        tracing::info!(
            job_id = self.job_id,
            completed = self.completed,
            cancelled = self.cancelled,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "build_job_stopped",
            span_name = name,
            job_id = self.job_id,
            completed = self.completed,
            cancelled = self.cancelled,
        )
    }
}

/// The spawner could not launch a construction job.
///
/// # Log Level
/// `error!` - Failure requiring attention; work continues on other threads
pub struct BuildJobSpawnFailed<'a> {
    pub spawner: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for BuildJobSpawnFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to start building job with {} spawner: {}",
            self.spawner, self.error
        )
    }
}

impl StructuredLog for BuildJobSpawnFailed<'_> {
    fn log(&self) {
        tracing::error!(spawner = self.spawner, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "build_job_spawn_failed",
            span_name = name,
            spawner = self.spawner,
            error = %self.error,
        )
    }
}

/// The active build was cancelled by the caller.
///
/// # Log Level
/// `info!` - Important operational event
pub struct BuildCancelled {
    pub cancelled_jobs: usize,
}

impl Display for BuildCancelled {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cancelled active build; {} jobs poisoned", self.cancelled_jobs)
    }
}

impl StructuredLog for BuildCancelled {
    fn log(&self) {
        tracing::info!(cancelled_jobs = self.cancelled_jobs, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("build_cancelled", span_name = name, cancelled_jobs = self.cancelled_jobs)
    }
}

/// The background thread limit changed.
///
/// # Log Level
/// `debug!` - Configuration change
pub struct MaxAdditionalThreadsChanged {
    pub max_additional_threads: usize,
    pub pending_items: usize,
}

impl Display for MaxAdditionalThreadsChanged {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Max additional threads set to {} with {} pending work items",
            self.max_additional_threads, self.pending_items
        )
    }
}

impl StructuredLog for MaxAdditionalThreadsChanged {
    fn log(&self) {
        tracing::debug!(
            max_additional_threads = self.max_additional_threads,
            pending_items = self.pending_items,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "max_additional_threads",
            span_name = name,
            max_additional_threads = self.max_additional_threads,
            pending_items = self.pending_items,
        )
    }
}

/// The caller has no work to help with and is waiting on background jobs.
///
/// # Log Level
/// `debug!` - Repeats while waiting
pub struct WaitingForBackgroundJobs {
    pub active_jobs: usize,
    pub backoff: Duration,
}

impl Display for WaitingForBackgroundJobs {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Waiting {:?} for {} background jobs",
            self.backoff, self.active_jobs
        )
    }
}

impl StructuredLog for WaitingForBackgroundJobs {
    fn log(&self) {
        tracing::debug!(
            active_jobs = self.active_jobs,
            backoff_ms = self.backoff.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "waiting_for_background_jobs",
            span_name = name,
            active_jobs = self.active_jobs,
            backoff = ?self.backoff,
        )
    }
}

/// The finished dependency graph was assembled.
///
/// # Log Level
/// `info!` - Important operational event
pub struct GraphAssembled<'a> {
    pub calculation_configuration: &'a str,
    pub node_count: usize,
    pub terminal_output_count: usize,
}

impl Display for GraphAssembled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Assembled dependency graph for {}: {} nodes, {} terminal outputs",
            self.calculation_configuration, self.node_count, self.terminal_output_count
        )
    }
}

impl StructuredLog for GraphAssembled<'_> {
    fn log(&self) {
        tracing::info!(
            calculation_configuration = self.calculation_configuration,
            node_count = self.node_count,
            terminal_output_count = self.terminal_output_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "graph_assembled",
            span_name = name,
            calculation_configuration = self.calculation_configuration,
            node_count = self.node_count,
            terminal_output_count = self.terminal_output_count,
        )
    }
}
