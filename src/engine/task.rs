// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Resolution tasks: the unit of work that turns one requirement, in the
//! context of one parent chain, into a sequence of resolved values.
//!
//! # State machine
//!
//! ```text
//! Created ─Run─► market data? ──yes──► Resolved(exhausted)
//!                    │ no
//!                    ▼
//!             candidates (priority desc, stable)
//!                    │
//!        ┌──► next candidate ──none──► Failed / Exhausted
//!        │           │
//!        │   declare output ──reusable producer──► Delegating ──┐
//!        │           │                                          │
//!        │   resolve inputs ──► Applying ──all inputs──► Resolved(more) ◄─┘
//!        │                          │                     │  ▲
//!        └──── input failed ◄───────┘            Pumped ──┘  │
//!        └──── nothing left to pump ◄─────────────────────────┘
//! ```
//!
//! # Serialization
//!
//! Everything that happens to a task arrives as a [`TaskEvent`] in its
//! mailbox. Whichever thread posts to an idle mailbox becomes its drainer and
//! handles events until the mailbox is empty; other posters only enqueue. A
//! task's state is therefore only ever touched by one thread at a time, even
//! though its inputs may be delivered from any worker. When the building
//! context is already deep in nested callbacks the drain is handed to the
//! run queue instead of starting here.
//!
//! A panic while handling an event finishes the task, so its dependents hear
//! a failure instead of waiting on it forever.

use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::engine::ancestry::{Ancestry, TaskId};
use crate::engine::context::BuildingContext;
use crate::engine::producer::{Callback, CallbackHandle, Producer, ProducerCore, Pump};
use crate::errors::CollaboratorError;
use crate::model::{Requirement, ResolvedValue, Specification};
use crate::observability::messages::resolution::{
    CandidateSkipped, CandidatesFound, MarketDataSatisfied, ProducerReused, TaskExhausted, WaitLoopBroken,
};
use crate::observability::messages::StructuredLog;
use crate::traits::Candidate;

/// Messages delivered to a task's mailbox.
pub(crate) enum TaskEvent {
    Run,
    InputResolved {
        attempt: u64,
        index: usize,
        value: ResolvedValue,
        pump: Pump,
    },
    InputFailed {
        attempt: u64,
        index: usize,
    },
    DelegateResolved {
        attempt: u64,
        value: ResolvedValue,
        pump: Pump,
    },
    DelegateFailed {
        attempt: u64,
    },
    /// A dependent wants another alternative.
    Pump,
    /// The build went quiet while this task was still waiting; stop waiting.
    BreakWait {
        attempt: u64,
    },
}

#[derive(Default)]
struct Mailbox {
    events: VecDeque<TaskEvent>,
    draining: bool,
}

struct InputSlot {
    producer: Producer,
    handle: Option<CallbackHandle>,
    value: Option<ResolvedValue>,
    pump: Option<Pump>,
    exhausted: bool,
}

struct Application {
    candidate: Candidate,
    inputs: Vec<InputSlot>,
    produced: bool,
    /// Input currently asked for its next alternative.
    pumping: Option<usize>,
}

impl Application {
    fn resolved_value(&self) -> ResolvedValue {
        ResolvedValue::new(
            self.candidate.output.clone(),
            self.candidate.function.clone(),
            self.candidate.priority,
            self.inputs.iter().filter_map(|input| input.value.clone()).collect(),
        )
    }
}

struct Delegation {
    specification: Specification,
    producer: Producer,
    handle: Option<CallbackHandle>,
    pump: Option<Pump>,
    matched: bool,
}

#[derive(Default)]
enum Active {
    #[default]
    Idle,
    Applying(Application),
    Delegating(Delegation),
}

#[derive(Default)]
struct TaskState {
    started: bool,
    finished: bool,
    candidates: Vec<Candidate>,
    next_candidate: usize,
    /// Bumped whenever the current candidate is abandoned; events tagged with
    /// an older attempt are stale.
    attempt: u64,
    active: Active,
}

pub(crate) struct ResolveTask {
    ancestry: Ancestry,
    core: ProducerCore,
    mailbox: Mutex<Mailbox>,
    state: Mutex<TaskState>,
}

impl ResolveTask {
    pub(crate) fn new(id: TaskId, requirement: Requirement, parent: Option<&Arc<ResolveTask>>) -> Arc<Self> {
        let ancestry = match parent {
            Some(parent) => parent.ancestry.child(id, requirement.clone()),
            None => Ancestry::root(id, requirement.clone()),
        };
        Arc::new(Self {
            ancestry,
            core: ProducerCore::new(requirement),
            mailbox: Mutex::new(Mailbox::default()),
            state: Mutex::new(TaskState::default()),
        })
    }

    pub(crate) fn id(&self) -> TaskId {
        self.ancestry.task_id()
    }

    pub(crate) fn requirement(&self) -> &Requirement {
        self.ancestry.requirement()
    }

    pub(crate) fn parent_id(&self) -> Option<TaskId> {
        self.ancestry.parent().map(Ancestry::task_id)
    }

    pub(crate) fn ancestry(&self) -> &Ancestry {
        &self.ancestry
    }

    pub(crate) fn core(&self) -> &ProducerCore {
        &self.core
    }

    /// True if this task or an ancestor resolves `requirement`.
    pub(crate) fn has_parent_requirement(&self, requirement: &Requirement) -> bool {
        self.ancestry.contains_requirement(requirement)
    }

    /// True if `task_id` is this task or one of its ancestors.
    pub(crate) fn has_parent_task(&self, task_id: TaskId) -> bool {
        self.ancestry.contains_task(task_id)
    }

    /// Queues `event`, then drains the mailbox here unless another thread
    /// already is or the context is too deep.
    pub(crate) fn post(self: &Arc<Self>, ctx: &mut BuildingContext, event: TaskEvent) {
        {
            let mut mailbox = self.mailbox.lock();
            mailbox.events.push_back(event);
            if mailbox.draining {
                return;
            }
            mailbox.draining = true;
        }
        if ctx.should_defer() {
            ctx.defer_drain(Arc::clone(self));
        } else {
            self.drain(ctx);
        }
    }

    /// Handles queued events until the mailbox is empty. The caller must own
    /// the draining flag.
    pub(crate) fn drain(self: &Arc<Self>, ctx: &mut BuildingContext) {
        loop {
            let event = {
                let mut mailbox = self.mailbox.lock();
                match mailbox.events.pop_front() {
                    Some(event) => event,
                    None => {
                        mailbox.draining = false;
                        return;
                    }
                }
            };
            let mut state = self.state.lock();
            let depth = ctx.depth();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handle(ctx, &mut state, event)));
            if let Err(payload) = outcome {
                ctx.restore_depth(depth);
                ctx.exception(CollaboratorError::from_panic(payload.as_ref()));
                if !state.finished {
                    self.finish(ctx, &mut state);
                }
            }
        }
    }

    /// When this task is blocked on other producers: the attempt the wait
    /// belongs to and the tasks behind those producers.
    pub(crate) fn awaited(&self) -> Option<(u64, Vec<TaskId>)> {
        let state = self.state.lock();
        if state.finished {
            return None;
        }
        let producers: Vec<&Producer> = match &state.active {
            Active::Applying(application) if !application.produced => application
                .inputs
                .iter()
                .filter(|input| input.value.is_none())
                .map(|input| &input.producer)
                .collect(),
            Active::Applying(application) => match application.pumping {
                Some(index) => application.inputs.iter().skip(index).take(1).map(|input| &input.producer).collect(),
                None => return None,
            },
            Active::Delegating(delegation) if !delegation.matched || delegation.pump.is_none() => {
                vec![&delegation.producer]
            }
            _ => return None,
        };
        Some((state.attempt, producers.into_iter().flat_map(Producer::task_ids).collect()))
    }

    fn handle(self: &Arc<Self>, ctx: &mut BuildingContext, state: &mut TaskState, event: TaskEvent) {
        if state.finished {
            return;
        }
        match event {
            TaskEvent::Run => self.start(ctx, state),
            TaskEvent::InputResolved {
                attempt,
                index,
                value,
                pump,
            } if attempt == state.attempt => self.input_resolved(ctx, state, index, value, pump),
            TaskEvent::InputFailed { attempt, index } if attempt == state.attempt => {
                self.input_failed(ctx, state, index)
            }
            TaskEvent::DelegateResolved { attempt, value, pump } if attempt == state.attempt => {
                self.delegate_resolved(ctx, state, value, pump)
            }
            TaskEvent::DelegateFailed { attempt } if attempt == state.attempt => self.next_candidate(ctx, state),
            TaskEvent::Pump => self.pumped(ctx, state),
            TaskEvent::BreakWait { attempt } if attempt == state.attempt => self.break_wait(ctx, state),
            _ => {}
        }
    }

    fn producer(self: &Arc<Self>) -> Producer {
        Producer::Task(Arc::clone(self))
    }

    fn start(self: &Arc<Self>, ctx: &mut BuildingContext, state: &mut TaskState) {
        if state.started {
            return;
        }
        state.started = true;

        match ctx.market_data_availability(self.requirement()) {
            Ok(Some(specification)) => {
                MarketDataSatisfied {
                    requirement: self.requirement(),
                    specification: &specification,
                }
                .log();
                let value = ResolvedValue::new(specification.clone(), specification.function.clone(), 0, vec![]);
                self.core.push_result(ctx, &self.producer(), value);
                self.finish(ctx, state);
                return;
            }
            Ok(None) => {}
            Err(error) => ctx.exception(error),
        }

        match ctx.resolve_candidates(self.requirement()) {
            Ok(mut candidates) => {
                CandidatesFound {
                    requirement: self.requirement(),
                    count: candidates.len(),
                }
                .log();
                candidates.sort_by_key(|candidate| Reverse(candidate.priority));
                state.candidates = candidates;
                self.next_candidate(ctx, state);
            }
            Err(error) => {
                ctx.exception(error);
                self.finish(ctx, state);
            }
        }
    }

    fn next_candidate(self: &Arc<Self>, ctx: &mut BuildingContext, state: &mut TaskState) {
        Self::abandon(state);
        loop {
            state.attempt += 1;
            let Some(candidate) = state.candidates.get(state.next_candidate).cloned() else {
                self.finish(ctx, state);
                return;
            };
            state.next_candidate += 1;

            if !candidate.output.satisfies(self.requirement()) {
                CandidateSkipped {
                    requirement: self.requirement(),
                    function: &candidate.function,
                    reason: "output does not satisfy the requirement",
                }
                .log();
                continue;
            }

            let own = self.producer();
            let declared = ctx.declare_producing(&candidate.output, self, own.clone());
            if !declared.same_as(&own) {
                ProducerReused {
                    specification: &candidate.output,
                    task_id: self.id(),
                }
                .log();
                state.active = Active::Delegating(Delegation {
                    specification: candidate.output.clone(),
                    producer: declared.clone(),
                    handle: None,
                    pump: None,
                    matched: false,
                });
                let handle = declared.add_callback(ctx, Callback::delegate(self, state.attempt));
                if let Active::Delegating(delegation) = &mut state.active {
                    delegation.handle = handle;
                }
                return;
            }

            let inputs: Vec<InputSlot> = candidate
                .inputs
                .iter()
                .map(|input| InputSlot {
                    producer: ctx.resolve_requirement(input, Some(self)),
                    handle: None,
                    value: None,
                    pump: None,
                    exhausted: false,
                })
                .collect();
            let application = Application {
                candidate,
                inputs,
                produced: false,
                pumping: None,
            };

            if application.inputs.is_empty() {
                let value = application.resolved_value();
                state.active = Active::Applying(Application {
                    produced: true,
                    ..application
                });
                self.core.push_result(ctx, &own, value);
                return;
            }

            // Callbacks go on only once every input has a producer; deliveries
            // made while registering wait in the mailbox until this returns.
            state.active = Active::Applying(application);
            let attempt = state.attempt;
            if let Active::Applying(application) = &mut state.active {
                for (index, input) in application.inputs.iter_mut().enumerate() {
                    input.handle = input.producer.add_callback(ctx, Callback::input(self, attempt, index));
                }
            }
            return;
        }
    }

    fn input_resolved(
        self: &Arc<Self>,
        ctx: &mut BuildingContext,
        state: &mut TaskState,
        index: usize,
        value: ResolvedValue,
        pump: Pump,
    ) {
        let Active::Applying(application) = &mut state.active else {
            return;
        };
        let Some(input) = application.inputs.get_mut(index) else {
            return;
        };
        input.value = Some(value);
        input.pump = Some(pump);

        let ready = if application.produced {
            if application.pumping == Some(index) {
                application.pumping = None;
                true
            } else {
                false
            }
        } else if application.inputs.iter().all(|input| input.value.is_some()) {
            application.produced = true;
            true
        } else {
            false
        };
        if ready {
            let value = application.resolved_value();
            self.core.push_result(ctx, &self.producer(), value);
        }
    }

    fn input_failed(self: &Arc<Self>, ctx: &mut BuildingContext, state: &mut TaskState, index: usize) {
        let Active::Applying(application) = &mut state.active else {
            return;
        };
        let Some(input) = application.inputs.get_mut(index) else {
            return;
        };
        input.exhausted = true;
        input.handle = None;
        input.pump = None;

        if !application.produced {
            CandidateSkipped {
                requirement: self.requirement(),
                function: &application.candidate.function,
                reason: "an input could not be resolved",
            }
            .log();
            self.next_candidate(ctx, state);
        } else if application.pumping == Some(index) {
            application.pumping = None;
            self.pump_next_input(ctx, state);
        }
    }

    fn delegate_resolved(
        self: &Arc<Self>,
        ctx: &mut BuildingContext,
        state: &mut TaskState,
        value: ResolvedValue,
        pump: Pump,
    ) {
        let Active::Delegating(delegation) = &mut state.active else {
            return;
        };
        if value.specification() == &delegation.specification {
            delegation.matched = true;
            delegation.pump = Some(pump);
            self.core.push_result(ctx, &self.producer(), value);
        } else if delegation.matched {
            // The other task has moved past this specification.
            self.next_candidate(ctx, state);
        } else {
            ctx.pump(pump);
        }
    }

    fn pumped(self: &Arc<Self>, ctx: &mut BuildingContext, state: &mut TaskState) {
        let produced = match &mut state.active {
            Active::Applying(application) => application.produced,
            Active::Delegating(delegation) => {
                if let Some(pump) = delegation.pump.take() {
                    ctx.pump(pump);
                }
                return;
            }
            Active::Idle => false,
        };
        if produced {
            self.pump_next_input(ctx, state);
        }
    }

    /// Asks the first input that may still have alternatives for its next
    /// one; moves on to the next candidate when none is left.
    fn pump_next_input(self: &Arc<Self>, ctx: &mut BuildingContext, state: &mut TaskState) {
        let pump = match &mut state.active {
            Active::Applying(application) => {
                match application
                    .inputs
                    .iter()
                    .position(|input| !input.exhausted && input.pump.is_some())
                {
                    Some(index) => {
                        application.pumping = Some(index);
                        application.inputs[index].pump.take()
                    }
                    None => None,
                }
            }
            _ => None,
        };
        match pump {
            Some(pump) => ctx.pump(pump),
            None => self.next_candidate(ctx, state),
        }
    }

    /// Gives up the current wait: an input being pumped is treated as
    /// exhausted, anything else moves on to the next candidate.
    fn break_wait(self: &Arc<Self>, ctx: &mut BuildingContext, state: &mut TaskState) {
        let (waiting_on, pumping) = match &mut state.active {
            Active::Applying(application) if application.produced => {
                let Some(index) = application.pumping.take() else {
                    return;
                };
                if let Some(input) = application.inputs.get_mut(index) {
                    input.exhausted = true;
                    input.pump = None;
                    if let Some(handle) = input.handle.take() {
                        handle.cancel();
                    }
                }
                (1, true)
            }
            Active::Applying(application) => (
                application.inputs.iter().filter(|input| input.value.is_none()).count(),
                false,
            ),
            Active::Delegating(delegation) if delegation.matched && delegation.pump.is_some() => return,
            Active::Delegating(_) => (1, false),
            Active::Idle => return,
        };
        WaitLoopBroken {
            task_id: self.id(),
            requirement: self.requirement(),
            waiting_on,
        }
        .log();
        if pumping {
            self.pump_next_input(ctx, state);
        } else {
            self.next_candidate(ctx, state);
        }
    }

    /// Stops listening to whatever the current candidate depended on.
    fn abandon(state: &mut TaskState) {
        match std::mem::take(&mut state.active) {
            Active::Applying(application) => {
                for input in application.inputs {
                    if let Some(handle) = input.handle {
                        handle.cancel();
                    }
                }
            }
            Active::Delegating(delegation) => {
                if let Some(handle) = delegation.handle {
                    handle.cancel();
                }
            }
            Active::Idle => {}
        }
    }

    fn finish(self: &Arc<Self>, ctx: &mut BuildingContext, state: &mut TaskState) {
        state.finished = true;
        Self::abandon(state);
        TaskExhausted {
            task_id: self.id(),
            requirement: self.requirement(),
            produced: self.core.result_count(),
        }
        .log();
        self.core.finish(ctx);
    }

    /// Clears candidate and dependency state once the build is discarded.
    pub(crate) fn release(&self) {
        *self.state.lock() = TaskState::default();
        self.mailbox.lock().events.clear();
    }
}
