// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Immutable parent chains for resolution tasks.
//!
//! Every task carries a link to itself and, through it, to the chain of tasks
//! that caused it to exist. Links are shared, never mutated, and walked
//! iteratively, so a chain can be consulted from any thread and its depth is
//! bounded only by the requirement nesting of the catalogue.

use std::sync::Arc;

use crate::model::Requirement;

pub type TaskId = u64;

#[derive(Debug)]
struct Link {
    task_id: TaskId,
    requirement: Requirement,
    parent: Option<Ancestry>,
}

/// A task and all of its ancestors, nearest first.
#[derive(Debug, Clone)]
pub struct Ancestry(Arc<Link>);

impl Ancestry {
    pub fn root(task_id: TaskId, requirement: Requirement) -> Self {
        Self(Arc::new(Link {
            task_id,
            requirement,
            parent: None,
        }))
    }

    pub fn child(&self, task_id: TaskId, requirement: Requirement) -> Self {
        Self(Arc::new(Link {
            task_id,
            requirement,
            parent: Some(self.clone()),
        }))
    }

    pub fn task_id(&self) -> TaskId {
        self.0.task_id
    }

    pub fn requirement(&self) -> &Requirement {
        &self.0.requirement
    }

    pub fn parent(&self) -> Option<&Ancestry> {
        self.0.parent.as_ref()
    }

    /// This link followed by each ancestor.
    pub fn iter(&self) -> AncestryIter<'_> {
        AncestryIter { next: Some(self) }
    }

    /// True if this task or any ancestor resolves `requirement`.
    pub fn contains_requirement(&self, requirement: &Requirement) -> bool {
        self.iter().any(|link| link.requirement() == requirement)
    }

    /// True if `task_id` is this task or one of its ancestors.
    pub fn contains_task(&self, task_id: TaskId) -> bool {
        self.iter().any(|link| link.task_id() == task_id)
    }

    /// True when every ancestor of `other` (excluding `other` itself)
    /// resolves a requirement that also appears in this chain.
    ///
    /// A task whose ancestors are covered can only have been blocked by loops
    /// that would block this chain too, so its results are interchangeable
    /// with ones derived here.
    pub fn covers_ancestors_of(&self, other: &Ancestry) -> bool {
        other
            .parent()
            .map_or(true, |parent| parent.iter().all(|link| self.contains_requirement(link.requirement())))
    }

    pub fn depth(&self) -> usize {
        self.iter().count()
    }
}

pub struct AncestryIter<'a> {
    next: Option<&'a Ancestry>,
}

impl<'a> Iterator for AncestryIter<'a> {
    type Item = &'a Ancestry;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}
