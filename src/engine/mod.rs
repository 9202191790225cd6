//! Concurrent dependency graph construction.
//!
//! Each distinct requirement is resolved by a `ResolveTask` that tries
//! candidate functions in priority order. Requirements already being resolved
//! elsewhere are shared through the task index, and when more than
//! one task could answer, a `RequirementResolver` merges them.
//! Every unit of work goes through one run queue drained by a bounded pool of
//! background jobs plus any caller waiting on the graph.

mod aggregate;
mod ancestry;
mod assembly;
mod builder;
mod context;
mod exceptions;
mod index;
mod pool;
mod producer;
mod run_queue;
mod task;
mod terminal;

#[cfg(test)]
mod integration_tests;

pub use builder::DependencyGraphBuilder;
pub use pool::{ThreadSpawner, TokioSpawner};
