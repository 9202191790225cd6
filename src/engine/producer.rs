// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The producer / callback protocol that carries results between tasks.
//!
//! A producer offers a sequence of resolved values for one requirement. Each
//! registered callback walks that sequence at its own pace:
//!
//! ```text
//! add_callback ──► resolved(value₀, pump) ──pump──► resolved(value₁, pump) ──pump──► failed
//!       │
//!       └────────► failed            (nothing was ever produced)
//! ```
//!
//! A callback receives one delivery per offer and asks for the next one by
//! running the pump it was handed. Because a callback only hears from a
//! producer after registering or after pumping, two deliveries to the same
//! callback never overlap. `failed` is final: after it, the callback is
//! forgotten.
//!
//! Results are buffered in a [`ProducerCore`], so late registrations replay
//! from the first value and a finished producer answers immediately. The core
//! lock is never held while calling out.

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

use crate::engine::aggregate::RequirementResolver;
use crate::engine::ancestry::TaskId;
use crate::engine::context::BuildingContext;
use crate::engine::task::{ResolveTask, TaskEvent};
use crate::model::{Requirement, ResolvedValue, Specification};

pub(crate) type CallbackId = u64;

/// Anything that can be asked for resolutions of a requirement.
#[derive(Clone)]
pub(crate) enum Producer {
    Task(Arc<ResolveTask>),
    Aggregate(Arc<RequirementResolver>),
    /// Rejects every callback; used when depending on the requirement would
    /// introduce a loop.
    Failed(Requirement),
}

impl Producer {
    pub(crate) fn requirement(&self) -> &Requirement {
        match self {
            Producer::Task(task) => task.requirement(),
            Producer::Aggregate(resolver) => resolver.requirement(),
            Producer::Failed(requirement) => requirement,
        }
    }

    /// Tasks whose results this producer forwards.
    pub(crate) fn task_ids(&self) -> Vec<TaskId> {
        match self {
            Producer::Task(task) => vec![task.id()],
            Producer::Aggregate(resolver) => resolver.member_ids(),
            Producer::Failed(_) => Vec::new(),
        }
    }

    fn core(&self) -> Option<&ProducerCore> {
        match self {
            Producer::Task(task) => Some(task.core()),
            Producer::Aggregate(resolver) => Some(resolver.core()),
            Producer::Failed(_) => None,
        }
    }

    /// Registers `callback`. Returns `None` when the callback was already
    /// told there is nothing to produce.
    pub(crate) fn add_callback(&self, ctx: &mut BuildingContext, callback: Callback) -> Option<CallbackHandle> {
        match self.core() {
            Some(core) => core.add_callback(ctx, self, callback),
            None => {
                ctx.failed(&callback, self.requirement());
                None
            }
        }
    }

    pub(crate) fn cancel(&self, callback_id: CallbackId) {
        if let Some(core) = self.core() {
            core.cancel(callback_id);
        }
    }

    fn pump_callback(&self, ctx: &mut BuildingContext, callback_id: CallbackId) {
        if let Some(core) = self.core() {
            core.pump(ctx, self, callback_id);
        }
    }

    /// Asks whatever feeds the buffer for one more result.
    fn pump_source(&self, ctx: &mut BuildingContext) {
        match self {
            Producer::Task(task) => task.post(ctx, TaskEvent::Pump),
            Producer::Aggregate(resolver) => resolver.pump_source(ctx),
            Producer::Failed(_) => {}
        }
    }

    pub(crate) fn same_as(&self, other: &Producer) -> bool {
        match (self, other) {
            (Producer::Task(a), Producer::Task(b)) => Arc::ptr_eq(a, b),
            (Producer::Aggregate(a), Producer::Aggregate(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Receiver of resolution outcomes.
///
/// Task and resolver references are weak: a producer never keeps its
/// dependents alive.
#[derive(Clone)]
pub(crate) enum Callback {
    /// Records terminal outputs for a requested target.
    Terminal,
    /// One input of a task's current function application.
    Input {
        task: Weak<ResolveTask>,
        attempt: u64,
        index: usize,
    },
    /// A task reusing another task's derivation of the same specification.
    Delegate { task: Weak<ResolveTask>, attempt: u64 },
    /// A member task feeding an aggregating resolver.
    Member {
        resolver: Weak<RequirementResolver>,
        task_id: TaskId,
    },
    /// A synchronously added target: recorded like `Terminal`, and the first
    /// outcome is also sent to the waiting caller.
    Sync(Sender<Option<Specification>>),
}

impl Callback {
    pub(crate) fn input(task: &Arc<ResolveTask>, attempt: u64, index: usize) -> Self {
        Callback::Input {
            task: Arc::downgrade(task),
            attempt,
            index,
        }
    }

    pub(crate) fn delegate(task: &Arc<ResolveTask>, attempt: u64) -> Self {
        Callback::Delegate {
            task: Arc::downgrade(task),
            attempt,
        }
    }

    pub(crate) fn member(resolver: &Arc<RequirementResolver>, task_id: TaskId) -> Self {
        Callback::Member {
            resolver: Arc::downgrade(resolver),
            task_id,
        }
    }

    pub(crate) fn resolved(
        &self,
        ctx: &mut BuildingContext,
        requirement: &Requirement,
        value: ResolvedValue,
        pump: Pump,
    ) {
        match self {
            Callback::Terminal => ctx.shared().terminal.resolved(requirement, &value),
            Callback::Input { task, attempt, index } => {
                if let Some(task) = task.upgrade() {
                    task.post(
                        ctx,
                        TaskEvent::InputResolved {
                            attempt: *attempt,
                            index: *index,
                            value,
                            pump,
                        },
                    );
                }
            }
            Callback::Delegate { task, attempt } => {
                if let Some(task) = task.upgrade() {
                    task.post(
                        ctx,
                        TaskEvent::DelegateResolved {
                            attempt: *attempt,
                            value,
                            pump,
                        },
                    );
                }
            }
            Callback::Member { resolver, task_id } => {
                if let Some(resolver) = resolver.upgrade() {
                    resolver.member_resolved(ctx, *task_id, value, pump);
                }
            }
            Callback::Sync(sender) => {
                ctx.shared().terminal.resolved(requirement, &value);
                // Only the first outcome matters; later ones are dropped.
                let _ = sender.try_send(Some(value.specification().clone()));
            }
        }
    }

    pub(crate) fn failed(&self, ctx: &mut BuildingContext, requirement: &Requirement) {
        match self {
            Callback::Terminal => ctx.shared().terminal.failed(requirement),
            Callback::Input { task, attempt, index } => {
                if let Some(task) = task.upgrade() {
                    task.post(
                        ctx,
                        TaskEvent::InputFailed {
                            attempt: *attempt,
                            index: *index,
                        },
                    );
                }
            }
            Callback::Delegate { task, attempt } => {
                if let Some(task) = task.upgrade() {
                    task.post(ctx, TaskEvent::DelegateFailed { attempt: *attempt });
                }
            }
            Callback::Member { resolver, task_id } => {
                if let Some(resolver) = resolver.upgrade() {
                    resolver.member_failed(ctx, *task_id);
                }
            }
            Callback::Sync(sender) => {
                ctx.shared().terminal.failed(requirement);
                let _ = sender.try_send(None);
            }
        }
    }
}

/// A registered callback; cancelling it stops further deliveries.
#[derive(Clone)]
pub(crate) struct CallbackHandle {
    producer: Producer,
    id: CallbackId,
}

impl CallbackHandle {
    pub(crate) fn cancel(&self) {
        self.producer.cancel(self.id);
    }
}

/// Requests the next value for one callback of one producer.
#[derive(Clone)]
pub(crate) struct Pump {
    producer: Producer,
    callback_id: CallbackId,
}

impl Pump {
    fn new(producer: &Producer, callback_id: CallbackId) -> Self {
        Self {
            producer: producer.clone(),
            callback_id,
        }
    }

    pub(crate) fn callback_id(&self) -> CallbackId {
        self.callback_id
    }

    pub(crate) fn run(self, ctx: &mut BuildingContext) {
        self.producer.pump_callback(ctx, self.callback_id);
    }
}

struct Slot {
    id: CallbackId,
    callback: Callback,
    /// Index of the next result this callback has not seen.
    next: usize,
    /// Pumped (or newly registered) with nothing buffered to give it.
    waiting: bool,
}

struct CoreState {
    results: Vec<ResolvedValue>,
    slots: Vec<Slot>,
    finished: bool,
    /// The source is working on a result nobody has received yet.
    requested: bool,
}

/// Result buffer and callback bookkeeping shared by tasks and resolvers.
pub(crate) struct ProducerCore {
    requirement: Requirement,
    state: Mutex<CoreState>,
}

enum Delivery {
    Resolved(Callback, ResolvedValue),
    Failed(Callback),
    PumpSource,
    Nothing,
}

impl ProducerCore {
    pub(crate) fn new(requirement: Requirement) -> Self {
        Self {
            requirement,
            state: Mutex::new(CoreState {
                results: Vec::new(),
                slots: Vec::new(),
                finished: false,
                requested: true,
            }),
        }
    }

    fn add_callback(
        &self,
        ctx: &mut BuildingContext,
        owner: &Producer,
        callback: Callback,
    ) -> Option<CallbackHandle> {
        let id = ctx.next_id();
        let delivery = {
            let mut state = self.state.lock();
            if let Some(first) = state.results.first().cloned() {
                state.slots.push(Slot {
                    id,
                    callback: callback.clone(),
                    next: 1,
                    waiting: false,
                });
                Delivery::Resolved(callback, first)
            } else if state.finished {
                Delivery::Failed(callback)
            } else {
                state.slots.push(Slot {
                    id,
                    callback,
                    next: 0,
                    waiting: true,
                });
                Delivery::Nothing
            }
        };
        match delivery {
            Delivery::Resolved(callback, value) => {
                ctx.resolved(&callback, &self.requirement, value, Pump::new(owner, id));
            }
            Delivery::Failed(callback) => {
                ctx.failed(&callback, &self.requirement);
                return None;
            }
            Delivery::PumpSource | Delivery::Nothing => {}
        }
        Some(CallbackHandle {
            producer: owner.clone(),
            id,
        })
    }

    /// Buffers `value` and hands it to every callback waiting for it.
    pub(crate) fn push_result(&self, ctx: &mut BuildingContext, owner: &Producer, value: ResolvedValue) {
        self.push(ctx, owner, value, false);
    }

    /// As [`push_result`](Self::push_result), but an equal value already in
    /// the buffer is not offered again. Returns false if it was dropped.
    pub(crate) fn push_unique_result(
        &self,
        ctx: &mut BuildingContext,
        owner: &Producer,
        value: ResolvedValue,
    ) -> bool {
        self.push(ctx, owner, value, true)
    }

    fn push(&self, ctx: &mut BuildingContext, owner: &Producer, value: ResolvedValue, unique: bool) -> bool {
        let waiting: Vec<(CallbackId, Callback)> = {
            let mut state = self.state.lock();
            if state.finished || (unique && state.results.contains(&value)) {
                return false;
            }
            state.results.push(value.clone());
            state.requested = false;
            let next = state.results.len();
            state
                .slots
                .iter_mut()
                .filter(|slot| slot.waiting)
                .map(|slot| {
                    slot.waiting = false;
                    slot.next = next;
                    (slot.id, slot.callback.clone())
                })
                .collect()
        };
        for (id, callback) in waiting {
            ctx.resolved(&callback, &self.requirement, value.clone(), Pump::new(owner, id));
        }
        true
    }

    fn pump(&self, ctx: &mut BuildingContext, owner: &Producer, callback_id: CallbackId) {
        let delivery = {
            let mut state = self.state.lock();
            let CoreState {
                results,
                slots,
                finished,
                requested,
            } = &mut *state;
            match slots.iter().position(|slot| slot.id == callback_id) {
                None => Delivery::Nothing,
                Some(position) if slots[position].waiting => Delivery::Nothing,
                Some(position) => {
                    let slot = &mut slots[position];
                    if let Some(value) = results.get(slot.next).cloned() {
                        slot.next += 1;
                        Delivery::Resolved(slot.callback.clone(), value)
                    } else if *finished {
                        Delivery::Failed(slots.remove(position).callback)
                    } else {
                        slot.waiting = true;
                        if *requested {
                            Delivery::Nothing
                        } else {
                            *requested = true;
                            Delivery::PumpSource
                        }
                    }
                }
            }
        };
        match delivery {
            Delivery::Resolved(callback, value) => {
                ctx.resolved(&callback, &self.requirement, value, Pump::new(owner, callback_id));
            }
            Delivery::Failed(callback) => ctx.failed(&callback, &self.requirement),
            Delivery::PumpSource => owner.pump_source(ctx),
            Delivery::Nothing => {}
        }
    }

    /// Marks the sequence complete; every waiting callback is told so.
    pub(crate) fn finish(&self, ctx: &mut BuildingContext) {
        let waiting: Vec<Callback> = {
            let mut state = self.state.lock();
            if state.finished {
                return;
            }
            state.finished = true;
            let (waiting, rest): (Vec<Slot>, Vec<Slot>) =
                std::mem::take(&mut state.slots).into_iter().partition(|slot| slot.waiting);
            state.slots = rest;
            waiting.into_iter().map(|slot| slot.callback).collect()
        };
        for callback in waiting {
            ctx.failed(&callback, &self.requirement);
        }
    }

    pub(crate) fn cancel(&self, callback_id: CallbackId) {
        self.state.lock().slots.retain(|slot| slot.id != callback_id);
    }

    pub(crate) fn result_count(&self) -> usize {
        self.state.lock().results.len()
    }

    /// True if some callback has been pumped and is still waiting.
    pub(crate) fn has_waiting(&self) -> bool {
        self.state.lock().slots.iter().any(|slot| slot.waiting)
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.state.lock().finished
    }
}
