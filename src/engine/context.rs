// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Building contexts and the state they share.
//!
//! [`BuildShared`] is everything a build has in common: collaborators,
//! indices, the run queue, the pool, the terminal collector and the exception
//! accumulator. A [`BuildingContext`] is one worker's handle on it for one
//! block of work. It adds what must not be shared: a callback depth counter
//! and an exception cache that is merged back when the block ends.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::engine::aggregate::RequirementResolver;
use crate::engine::exceptions::{ExceptionAccumulator, ExceptionCache};
use crate::engine::index::TaskIndex;
use crate::engine::pool::{self, WorkerPool};
use crate::engine::producer::{Callback, Producer, Pump};
use crate::engine::run_queue::{RunQueue, WorkItem};
use crate::engine::task::ResolveTask;
use crate::engine::terminal::TerminalCollector;
use crate::errors::CollaboratorError;
use crate::model::{Requirement, ResolvedValue, Specification};
use crate::observability::messages::resolution::{CollaboratorFailed, RequirementLoopRejected, TaskCreated};
use crate::observability::messages::StructuredLog;
use crate::traits::{Candidate, CompilationContext, FunctionResolver, MarketDataAvailability};

pub(crate) struct BuildShared {
    pub(crate) calculation_configuration: String,
    pub(crate) max_callback_depth: usize,
    pub(crate) resolver: Arc<dyn FunctionResolver>,
    pub(crate) market_data: Arc<dyn MarketDataAvailability>,
    pub(crate) index: TaskIndex,
    pub(crate) queue: RunQueue,
    pub(crate) pool: WorkerPool,
    pub(crate) terminal: TerminalCollector,
    pub(crate) exceptions: ExceptionAccumulator,
    next_id: AtomicU64,
    /// Serializes wait-loop releases between concurrent fixed-point checks.
    settling: Mutex<()>,
}

impl BuildShared {
    pub(crate) fn new(
        calculation_configuration: String,
        max_callback_depth: usize,
        resolver: Arc<dyn FunctionResolver>,
        market_data: Arc<dyn MarketDataAvailability>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            calculation_configuration,
            max_callback_depth,
            resolver,
            market_data,
            index: TaskIndex::new(),
            queue: RunQueue::new(),
            pool,
            terminal: TerminalCollector::new(),
            exceptions: ExceptionAccumulator::new(),
            next_id: AtomicU64::new(0),
            settling: Mutex::new(()),
        }
    }

    /// Identifiers for tasks, callbacks and jobs; unique per builder.
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Queues `item`. A worker is only started when the queue already held
    /// work: an item added to an empty queue is picked up by whoever is
    /// running the step that produced it.
    pub(crate) fn enqueue(self: &Arc<Self>, item: WorkItem) {
        if !self.queue.push(item) {
            pool::start_job(self);
        }
    }

    /// No job is registered, nothing is queued and no task is left waiting.
    ///
    /// Tasks can end up waiting on each other when targets are derivable from
    /// one another. Once everything else has run, one of them is told to stop
    /// waiting and the build is not yet considered done.
    pub(crate) fn is_graph_built(self: &Arc<Self>) -> bool {
        if !self.is_quiet() {
            return false;
        }
        let _settling = self.settling.lock();
        if !self.is_quiet() {
            return false;
        }
        match self.index.stalled_task() {
            None => true,
            Some((task, attempt)) => {
                self.enqueue(WorkItem::BreakWait { task, attempt });
                pool::start_job(self);
                false
            }
        }
    }

    fn is_quiet(&self) -> bool {
        self.pool.registered_jobs() == 0 && self.queue.is_empty()
    }
}

impl Drop for BuildShared {
    fn drop(&mut self) {
        self.index.release();
    }
}

/// Per-worker view of a build.
pub struct BuildingContext {
    shared: Arc<BuildShared>,
    exceptions: ExceptionCache,
    depth: usize,
}

impl BuildingContext {
    pub(crate) fn new(shared: Arc<BuildShared>) -> Self {
        Self {
            shared,
            exceptions: ExceptionCache::new(),
            depth: 0,
        }
    }

    pub(crate) fn shared(&self) -> &Arc<BuildShared> {
        &self.shared
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.shared.next_id()
    }

    /// Schedules a task's first run.
    pub(crate) fn run(&self, task: Arc<ResolveTask>) {
        self.shared.enqueue(WorkItem::Task(task));
    }

    /// Runs `pump` now, or defers it to the run queue once the callback
    /// stack is past the configured depth.
    pub(crate) fn pump(&mut self, pump: Pump) {
        self.depth += 1;
        if self.depth > self.shared.max_callback_depth {
            self.shared.enqueue(WorkItem::Pump(pump));
        } else {
            pump.run(self);
        }
        self.depth -= 1;
    }

    pub(crate) fn resolved(
        &mut self,
        callback: &Callback,
        requirement: &Requirement,
        value: ResolvedValue,
        pump: Pump,
    ) {
        self.depth += 1;
        callback.resolved(self, requirement, value, pump);
        self.depth -= 1;
    }

    pub(crate) fn failed(&mut self, callback: &Callback, requirement: &Requirement) {
        self.depth += 1;
        callback.failed(self, requirement);
        self.depth -= 1;
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// Resets the callback depth after a panic unwound past its decrements.
    pub(crate) fn restore_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    pub(crate) fn should_defer(&self) -> bool {
        self.depth > self.shared.max_callback_depth
    }

    pub(crate) fn defer_drain(&self, task: Arc<ResolveTask>) {
        self.shared.enqueue(WorkItem::Drain(task));
    }

    /// Records a collaborator error; equal errors are counted, not repeated.
    pub(crate) fn exception(&mut self, error: CollaboratorError) {
        CollaboratorFailed { error: &error }.log();
        self.exceptions.record(error);
    }

    pub(crate) fn merge_exceptions(&mut self) {
        self.shared.exceptions.merge(&mut self.exceptions);
    }

    pub(crate) fn resolve_candidates(&self, requirement: &Requirement) -> Result<Vec<Candidate>, CollaboratorError> {
        let context = CompilationContext::new(&self.shared.calculation_configuration, self.shared.market_data.as_ref());
        self.shared.resolver.resolve_candidates(requirement, &context)
    }

    pub(crate) fn market_data_availability(
        &self,
        requirement: &Requirement,
    ) -> Result<Option<Specification>, CollaboratorError> {
        self.shared.market_data.availability(requirement)
    }

    pub(crate) fn declare_producing(
        &self,
        specification: &Specification,
        task: &Arc<ResolveTask>,
        producer: Producer,
    ) -> Producer {
        self.shared.index.declare_producing(specification, task, producer)
    }

    /// Returns the task for (requirement, parent), scheduling it if new.
    pub(crate) fn get_or_create_task(
        &mut self,
        requirement: &Requirement,
        parent: Option<&Arc<ResolveTask>>,
    ) -> Arc<ResolveTask> {
        let shared = Arc::clone(&self.shared);
        let (task, created) = shared.index.get_or_create_task(requirement, parent.map(|parent| parent.id()), || {
            ResolveTask::new(shared.next_id(), requirement.clone(), parent)
        });
        if created {
            TaskCreated {
                task_id: task.id(),
                requirement,
                parent: task.parent_id(),
            }
            .log();
            self.run(Arc::clone(&task));
        }
        task
    }

    /// Finds or starts the work that resolves `requirement` for `dependent`.
    ///
    /// * A requirement already on the dependent's chain is rejected.
    /// * An existing task whose ancestors the dependent's chain covers is
    ///   shared directly.
    /// * Other existing tasks are wrapped in an aggregating resolver, which
    ///   falls back to the dependent's own task if they all fail.
    /// * Otherwise a new task is created.
    pub(crate) fn resolve_requirement(
        &mut self,
        requirement: &Requirement,
        dependent: Option<&Arc<ResolveTask>>,
    ) -> Producer {
        if let Some(dependent) = dependent {
            if dependent.has_parent_requirement(requirement) {
                RequirementLoopRejected {
                    requirement,
                    dependent: dependent.id(),
                }
                .log();
                return Producer::Failed(requirement.clone());
            }
        }

        let existing: Vec<Arc<ResolveTask>> = self
            .shared
            .index
            .tasks_resolving(requirement)
            .into_iter()
            .filter(|task| dependent.map_or(true, |dependent| !dependent.has_parent_task(task.id())))
            .collect();
        if existing.is_empty() {
            return Producer::Task(self.get_or_create_task(requirement, dependent));
        }

        let covered = existing.iter().find(|task| match dependent {
            Some(dependent) => dependent.ancestry().covers_ancestors_of(task.ancestry()),
            None => task.parent_id().is_none(),
        });
        if let Some(task) = covered {
            return Producer::Task(Arc::clone(task));
        }

        let resolver = RequirementResolver::new(requirement.clone(), dependent);
        for task in &existing {
            resolver.add_task(self, task);
        }
        resolver.start(self);
        Producer::Aggregate(resolver)
    }
}
