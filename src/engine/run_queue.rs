// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::engine::context::BuildingContext;
use crate::engine::producer::{Callback, Pump};
use crate::engine::task::{ResolveTask, TaskEvent};
use crate::model::Requirement;

/// A schedulable step of graph construction.
pub(crate) enum WorkItem {
    /// A requested target; `callback` hears its outcome.
    Target { requirement: Requirement, callback: Callback },
    /// First run of a newly created task.
    Task(Arc<ResolveTask>),
    /// A pump deferred because the callback stack was too deep.
    Pump(Pump),
    /// A mailbox drain deferred for the same reason; the draining flag is
    /// already held on behalf of whoever runs it.
    Drain(Arc<ResolveTask>),
    /// Releases a task stuck waiting once nothing else is left to run.
    BreakWait { task: Arc<ResolveTask>, attempt: u64 },
}

impl WorkItem {
    pub(crate) fn run(self, ctx: &mut BuildingContext) {
        match self {
            WorkItem::Target { requirement, callback } => {
                let producer = ctx.resolve_requirement(&requirement, None);
                producer.add_callback(ctx, callback);
            }
            WorkItem::Task(task) => task.post(ctx, TaskEvent::Run),
            WorkItem::Pump(pump) => pump.run(ctx),
            WorkItem::Drain(task) => task.drain(ctx),
            WorkItem::BreakWait { task, attempt } => task.post(ctx, TaskEvent::BreakWait { attempt }),
        }
    }
}

/// Lock-free FIFO of work items shared by every worker.
///
/// Both channel ends live here, so sending can never fail and popping never
/// blocks. Scheduled and completed counters feed the progress estimate.
pub(crate) struct RunQueue {
    sender: Sender<WorkItem>,
    receiver: Receiver<WorkItem>,
    scheduled: AtomicU64,
    completed: AtomicU64,
}

impl RunQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            scheduled: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    /// Appends `item`; returns true if the queue looked empty beforehand.
    pub(crate) fn push(&self, item: WorkItem) -> bool {
        let was_empty = self.receiver.is_empty();
        // The receiver is owned alongside the sender, so the channel is never
        // disconnected.
        let _ = self.sender.send(item);
        self.scheduled.fetch_add(1, Ordering::Relaxed);
        was_empty
    }

    pub(crate) fn pop(&self) -> Option<WorkItem> {
        self.receiver.try_recv().ok()
    }

    pub(crate) fn mark_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.receiver.len()
    }

    pub(crate) fn scheduled_steps(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }

    pub(crate) fn completed_steps(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Completed over scheduled steps, or `None` before anything was
    /// scheduled.
    pub(crate) fn estimate_fraction(&self) -> Option<f64> {
        let scheduled = self.scheduled_steps();
        if scheduled == 0 {
            return None;
        }
        Some(self.completed_steps() as f64 / scheduled as f64)
    }
}
