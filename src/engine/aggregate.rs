// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Aggregating resolver: one producer over several existing tasks for the
//! same requirement.
//!
//! When a requirement is already being resolved under other parents, those
//! tasks are shared instead of starting from scratch. Their results may be
//! limited by loops in their own ancestry, so once every member is exhausted
//! the resolver falls back, exactly once, to the task for its own dependent.
//!
//! ```text
//!        pending = 1 (start token) + members
//!   Gathering ──pending hits 0──► Fallback ──fallback member ends──► Done
//!                                    │
//!                                    └──fallback task already a member──► Done
//! ```

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::engine::ancestry::TaskId;
use crate::engine::context::BuildingContext;
use crate::engine::producer::{Callback, Producer, ProducerCore, Pump};
use crate::engine::task::ResolveTask;
use crate::model::{Requirement, ResolvedValue};
use crate::observability::messages::resolution::FallbackTaskCreated;
use crate::observability::messages::StructuredLog;

const GATHERING: u8 = 0;
const FALLBACK: u8 = 1;
const DONE: u8 = 2;

#[derive(Default)]
struct Members {
    tasks: HashSet<TaskId>,
    fallback: Option<TaskId>,
    /// Pumps of members that delivered and may have more, oldest first.
    pumps: VecDeque<Pump>,
}

pub(crate) struct RequirementResolver {
    core: ProducerCore,
    requirement: Requirement,
    /// `None` for resolvers serving a target directly.
    dependent: Option<Weak<ResolveTask>>,
    pending: AtomicUsize,
    phase: AtomicU8,
    members: Mutex<Members>,
}

impl RequirementResolver {
    pub(crate) fn new(requirement: Requirement, dependent: Option<&Arc<ResolveTask>>) -> Arc<Self> {
        Arc::new(Self {
            core: ProducerCore::new(requirement.clone()),
            requirement,
            dependent: dependent.map(Arc::downgrade),
            pending: AtomicUsize::new(1),
            phase: AtomicU8::new(GATHERING),
            members: Mutex::new(Members::default()),
        })
    }

    pub(crate) fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    pub(crate) fn core(&self) -> &ProducerCore {
        &self.core
    }

    pub(crate) fn member_ids(&self) -> Vec<TaskId> {
        self.members.lock().tasks.iter().copied().collect()
    }

    fn producer(self: &Arc<Self>) -> Producer {
        Producer::Aggregate(Arc::clone(self))
    }

    /// Adds `task` as a member; a task already present is ignored.
    pub(crate) fn add_task(self: &Arc<Self>, ctx: &mut BuildingContext, task: &Arc<ResolveTask>) {
        if !self.members.lock().tasks.insert(task.id()) {
            return;
        }
        self.pending.fetch_add(1, Ordering::AcqRel);
        Producer::Task(Arc::clone(task)).add_callback(ctx, Callback::member(self, task.id()));
    }

    /// Releases the start token once every initial member has been added.
    pub(crate) fn start(self: &Arc<Self>, ctx: &mut BuildingContext) {
        self.release_pending(ctx);
    }

    pub(crate) fn member_resolved(
        self: &Arc<Self>,
        ctx: &mut BuildingContext,
        task_id: TaskId,
        value: ResolvedValue,
        pump: Pump,
    ) {
        if self.core.is_finished() {
            return;
        }
        let callback_id = pump.callback_id();
        self.members.lock().pumps.push_back(pump);
        if self.core.push_unique_result(ctx, &self.producer(), value) {
            return;
        }
        // Another member already offered this value; skip straight to the
        // member's next alternative.
        let pump = {
            let mut members = self.members.lock();
            members
                .pumps
                .iter()
                .position(|pump| pump.callback_id() == callback_id)
                .and_then(|position| members.pumps.remove(position))
        };
        if let Some(pump) = pump {
            tracing::trace!(task_id, requirement = %self.requirement, "Skipping duplicate member result");
            ctx.pump(pump);
        }
    }

    pub(crate) fn member_failed(self: &Arc<Self>, ctx: &mut BuildingContext, task_id: TaskId) {
        let is_fallback = self.members.lock().fallback == Some(task_id);
        if is_fallback {
            self.complete(ctx);
            return;
        }
        if self.core.has_waiting() {
            self.pump_next_member(ctx);
        }
        self.release_pending(ctx);
    }

    /// A dependent wants another alternative.
    pub(crate) fn pump_source(self: &Arc<Self>, ctx: &mut BuildingContext) {
        self.pump_next_member(ctx);
    }

    fn pump_next_member(self: &Arc<Self>, ctx: &mut BuildingContext) {
        let pump = self.members.lock().pumps.pop_front();
        if let Some(pump) = pump {
            ctx.pump(pump);
        }
    }

    fn release_pending(self: &Arc<Self>, ctx: &mut BuildingContext) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.enter_fallback(ctx);
        }
    }

    fn enter_fallback(self: &Arc<Self>, ctx: &mut BuildingContext) {
        if self
            .phase
            .compare_exchange(GATHERING, FALLBACK, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let dependent = match &self.dependent {
            Some(weak) => match weak.upgrade() {
                Some(task) => Some(task),
                None => {
                    self.complete(ctx);
                    return;
                }
            },
            None => None,
        };
        let task = ctx.get_or_create_task(&self.requirement, dependent.as_ref());
        let is_new = {
            let mut members = self.members.lock();
            if members.tasks.insert(task.id()) {
                members.fallback = Some(task.id());
                true
            } else {
                false
            }
        };
        if is_new {
            FallbackTaskCreated {
                requirement: &self.requirement,
                task_id: task.id(),
            }
            .log();
            Producer::Task(Arc::clone(&task)).add_callback(ctx, Callback::member(self, task.id()));
        } else {
            self.complete(ctx);
        }
    }

    fn complete(&self, ctx: &mut BuildingContext) {
        self.phase.store(DONE, Ordering::Release);
        self.core.finish(ctx);
    }
}
