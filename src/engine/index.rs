// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Shared, concurrently updated indices of resolution work.
//!
//! * requirement -> tasks resolving it, one per parent task
//! * specification -> tasks (and their producers) deriving it
//!
//! The index also answers which task to release when the build has gone
//! quiet with tasks still waiting on one another.
//!
//! Both are `DashMap`s; every update is an insert-if-absent performed under
//! the shard guard for its key, so two threads racing to create the same task
//! or declare the same specification agree on a single winner.

use dashmap::DashMap;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::engine::ancestry::TaskId;
use crate::engine::producer::Producer;
use crate::engine::task::ResolveTask;
use crate::model::{Requirement, Specification};

#[derive(Default)]
pub(crate) struct TaskIndex {
    requirements: DashMap<Requirement, BTreeMap<Option<TaskId>, Arc<ResolveTask>>>,
    specifications: DashMap<Specification, Vec<(Arc<ResolveTask>, Producer)>>,
}

impl TaskIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the task for (requirement, parent), creating it with `create`
    /// if absent. The flag is true only for the caller whose task was inserted.
    pub(crate) fn get_or_create_task(
        &self,
        requirement: &Requirement,
        parent: Option<TaskId>,
        create: impl FnOnce() -> Arc<ResolveTask>,
    ) -> (Arc<ResolveTask>, bool) {
        let mut tasks = self.requirements.entry(requirement.clone()).or_default();
        let mut created = false;
        let task = tasks
            .entry(parent)
            .or_insert_with(|| {
                created = true;
                create()
            })
            .clone();
        (task, created)
    }

    /// Snapshot of the tasks resolving `requirement`, oldest first.
    pub(crate) fn tasks_resolving(&self, requirement: &Requirement) -> Vec<Arc<ResolveTask>> {
        let mut tasks: Vec<Arc<ResolveTask>> = self
            .requirements
            .get(requirement)
            .map(|tasks| tasks.values().cloned().collect())
            .unwrap_or_default();
        tasks.sort_by_key(|task| task.id());
        tasks
    }

    /// Records that `task` derives `specification` through `producer`.
    ///
    /// If `task` already declared the specification, or another task whose
    /// ancestors are covered by `task`'s chain already derives it, that
    /// producer is returned instead and nothing is recorded.
    pub(crate) fn declare_producing(
        &self,
        specification: &Specification,
        task: &Arc<ResolveTask>,
        producer: Producer,
    ) -> Producer {
        let mut producers = self.specifications.entry(specification.clone()).or_default();
        if let Some((_, existing)) = producers.iter().find(|(owner, _)| owner.id() == task.id()) {
            return existing.clone();
        }
        let reusable = producers.iter().find(|(owner, _)| {
            !task.ancestry().contains_task(owner.id()) && task.ancestry().covers_ancestors_of(owner.ancestry())
        });
        if let Some((_, existing)) = reusable {
            return existing.clone();
        }
        producers.push((Arc::clone(task), producer.clone()));
        producer
    }

    /// Snapshot of the tasks declared as producing `specification`.
    pub(crate) fn tasks_producing(&self, specification: &Specification) -> Vec<(Arc<ResolveTask>, Producer)> {
        self.specifications
            .get(specification)
            .map(|producers| producers.clone())
            .unwrap_or_default()
    }

    pub(crate) fn task_count(&self) -> usize {
        self.requirements.iter().map(|tasks| tasks.len()).sum()
    }

    /// Picks the task to release when nothing is left to run but tasks still
    /// wait: the newest task on a wait cycle, or else the newest waiting
    /// task. Returned with the attempt its wait belongs to.
    pub(crate) fn stalled_task(&self) -> Option<(Arc<ResolveTask>, u64)> {
        let tasks: Vec<Arc<ResolveTask>> = self
            .requirements
            .iter()
            .flat_map(|tasks| tasks.values().cloned().collect::<Vec<_>>())
            .collect();
        let mut waiting: BTreeMap<TaskId, (Arc<ResolveTask>, u64, Vec<TaskId>)> = BTreeMap::new();
        for task in tasks {
            if let Some((attempt, awaited)) = task.awaited() {
                waiting.insert(task.id(), (task, attempt, awaited));
            }
        }
        let chosen = waiting
            .keys()
            .rev()
            .copied()
            .find(|&task_id| waits_on_itself(&waiting, task_id))
            .or_else(|| waiting.keys().next_back().copied())?;
        waiting.remove(&chosen).map(|(task, attempt, _)| (task, attempt))
    }

    /// Drops the state held by every task so producer references between
    /// tasks do not outlive the build.
    pub(crate) fn release(&self) {
        for tasks in self.requirements.iter() {
            for task in tasks.values() {
                task.release();
            }
        }
        self.specifications.clear();
    }
}

fn waits_on_itself(waiting: &BTreeMap<TaskId, (Arc<ResolveTask>, u64, Vec<TaskId>)>, task_id: TaskId) -> bool {
    let mut seen = HashSet::new();
    let mut stack: Vec<TaskId> = waiting
        .get(&task_id)
        .map(|(_, _, awaited)| awaited.clone())
        .unwrap_or_default();
    while let Some(next) = stack.pop() {
        if next == task_id {
            return true;
        }
        if seen.insert(next) {
            if let Some((_, _, awaited)) = waiting.get(&next) {
                stack.extend(awaited.iter().copied());
            }
        }
    }
    false
}
