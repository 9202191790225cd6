// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for requirement resolution events.
//!
//! These are emitted from inside resolution tasks and aggregating resolvers,
//! so most sit at `debug!` or `trace!`. Collaborator failures and panics are
//! the exception: they are counted in the build's exception map and also
//! logged at `warn!`.

use crate::errors::CollaboratorError;
use crate::model::{FunctionId, Requirement, Specification};
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A new resolution task was inserted into the index.
///
/// # Log Level
/// `debug!` - One per distinct (requirement, parent) pair
pub struct TaskCreated<'a> {
    pub task_id: u64,
    pub requirement: &'a Requirement,
    pub parent: Option<u64>,
}

impl Display for TaskCreated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.parent {
            Some(parent) => write!(
                f,
                "Created task {} for {} under task {}",
                self.task_id, self.requirement, parent
            ),
            None => write!(f, "Created root task {} for {}", self.task_id, self.requirement),
        }
    }
}

impl StructuredLog for TaskCreated<'_> {
    fn log(&self) {
        tracing::debug!(
            task_id = self.task_id,
            requirement = %self.requirement,
            parent = ?self.parent,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "resolve_task",
            span_name = name,
            task_id = self.task_id,
            requirement = %self.requirement,
            parent = ?self.parent,
        )
    }
}

/// Depending on a requirement would have introduced a loop.
///
/// # Log Level
/// `debug!` - Expected while exploring alternatives
///
/// # Example
/// ```
/// use depgraph_builder::model::Requirement;
/// use depgraph_builder::observability::messages::resolution::RequirementLoopRejected;
///
/// let requirement = Requirement::new("Curve", "USD");
/// let msg = RequirementLoopRejected { requirement: &requirement, dependent: 4 };
///
/// assert_eq!(msg.to_string(), "Can't introduce a requirement loop on Curve[USD] from task 4");
/// ```
pub struct RequirementLoopRejected<'a> {
    pub requirement: &'a Requirement,
    pub dependent: u64,
}

impl Display for RequirementLoopRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Can't introduce a requirement loop on {} from task {}",
            self.requirement, self.dependent
        )
    }
}

impl StructuredLog for RequirementLoopRejected<'_> {
    fn log(&self) {
        tracing::debug!(
            requirement = %self.requirement,
            dependent = self.dependent,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "requirement_loop_rejected",
            span_name = name,
            requirement = %self.requirement,
            dependent = self.dependent,
        )
    }
}

/// The function resolver returned candidates for a task.
///
/// # Log Level
/// `trace!` - High volume
pub struct CandidatesFound<'a> {
    pub requirement: &'a Requirement,
    pub count: usize,
}

impl Display for CandidatesFound<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Found {} candidate functions for {}", self.count, self.requirement)
    }
}

impl StructuredLog for CandidatesFound<'_> {
    fn log(&self) {
        tracing::trace!(requirement = %self.requirement, count = self.count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "candidates_found",
            span_name = name,
            requirement = %self.requirement,
            count = self.count,
        )
    }
}

/// A candidate function was not applied.
///
/// # Log Level
/// `debug!` - Expected while exploring alternatives
pub struct CandidateSkipped<'a> {
    pub requirement: &'a Requirement,
    pub function: &'a FunctionId,
    pub reason: &'a str,
}

impl Display for CandidateSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Skipping {} for {}: {}",
            self.function, self.requirement, self.reason
        )
    }
}

impl StructuredLog for CandidateSkipped<'_> {
    fn log(&self) {
        tracing::debug!(
            requirement = %self.requirement,
            function = %self.function,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "candidate_skipped",
            span_name = name,
            requirement = %self.requirement,
            function = %self.function,
            reason = self.reason,
        )
    }
}

/// Another task already produces the specification; its producer is reused.
///
/// # Log Level
/// `debug!` - Routine sharing of work
pub struct ProducerReused<'a> {
    pub specification: &'a Specification,
    pub task_id: u64,
}

impl Display for ProducerReused<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task {} reusing existing producer of {}",
            self.task_id, self.specification
        )
    }
}

impl StructuredLog for ProducerReused<'_> {
    fn log(&self) {
        tracing::debug!(
            specification = %self.specification,
            task_id = self.task_id,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "producer_reused",
            span_name = name,
            specification = %self.specification,
            task_id = self.task_id,
        )
    }
}

/// Every existing task for a requirement failed; a fallback task takes over.
///
/// # Log Level
/// `debug!` - Expected while exploring alternatives
pub struct FallbackTaskCreated<'a> {
    pub requirement: &'a Requirement,
    pub task_id: u64,
}

impl Display for FallbackTaskCreated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Creating fallback task {} for {}", self.task_id, self.requirement)
    }
}

impl StructuredLog for FallbackTaskCreated<'_> {
    fn log(&self) {
        tracing::debug!(
            requirement = %self.requirement,
            task_id = self.task_id,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "fallback_task",
            span_name = name,
            requirement = %self.requirement,
            task_id = self.task_id,
        )
    }
}

/// A requirement was satisfied directly from market data.
///
/// # Log Level
/// `debug!` - Routine
pub struct MarketDataSatisfied<'a> {
    pub requirement: &'a Requirement,
    pub specification: &'a Specification,
}

impl Display for MarketDataSatisfied<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Requirement {} satisfied by market data {}",
            self.requirement, self.specification
        )
    }
}

impl StructuredLog for MarketDataSatisfied<'_> {
    fn log(&self) {
        tracing::debug!(
            requirement = %self.requirement,
            specification = %self.specification,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "market_data_satisfied",
            span_name = name,
            requirement = %self.requirement,
            specification = %self.specification,
        )
    }
}

/// A task ran out of alternatives.
///
/// # Log Level
/// `trace!` - High volume
pub struct TaskExhausted<'a> {
    pub task_id: u64,
    pub requirement: &'a Requirement,
    pub produced: usize,
}

impl Display for TaskExhausted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task {} for {} exhausted after {} results",
            self.task_id, self.requirement, self.produced
        )
    }
}

impl StructuredLog for TaskExhausted<'_> {
    fn log(&self) {
        tracing::trace!(
            task_id = self.task_id,
            requirement = %self.requirement,
            produced = self.produced,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "task_exhausted",
            span_name = name,
            task_id = self.task_id,
            requirement = %self.requirement,
            produced = self.produced,
        )
    }
}

/// Nothing was left to run while tasks still waited on each other; one of
/// them gives up its wait and moves on.
///
/// # Log Level
/// `debug!` - Happens when targets can be derived from one another
///
/// # Example
/// ```
/// use depgraph_builder::model::Requirement;
/// use depgraph_builder::observability::messages::resolution::WaitLoopBroken;
///
/// let requirement = Requirement::new("Curve", "USD");
/// let msg = WaitLoopBroken { task_id: 7, requirement: &requirement, waiting_on: 1 };
///
/// assert_eq!(msg.to_string(), "Task 7 for Curve[USD] stopped waiting on 1 stalled tasks");
/// ```
pub struct WaitLoopBroken<'a> {
    pub task_id: u64,
    pub requirement: &'a Requirement,
    pub waiting_on: usize,
}

impl Display for WaitLoopBroken<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task {} for {} stopped waiting on {} stalled tasks",
            self.task_id, self.requirement, self.waiting_on
        )
    }
}

impl StructuredLog for WaitLoopBroken<'_> {
    fn log(&self) {
        tracing::debug!(
            task_id = self.task_id,
            requirement = %self.requirement,
            waiting_on = self.waiting_on,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "wait_loop_broken",
            span_name = name,
            task_id = self.task_id,
            requirement = %self.requirement,
            waiting_on = self.waiting_on,
        )
    }
}

/// A collaborator failed or a work item panicked.
///
/// # Log Level
/// `warn!` - Counted in the exception map; the build continues
pub struct CollaboratorFailed<'a> {
    pub error: &'a CollaboratorError,
}

impl Display for CollaboratorFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Graph builder exception: {}", self.error)
    }
}

impl StructuredLog for CollaboratorFailed<'_> {
    fn log(&self) {
        tracing::warn!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("collaborator_failed", span_name = name, error = %self.error)
    }
}
