// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::model::Requirement;

/// Conditions surfaced to callers of the graph builder.
///
/// Only caller-level operations return these. Failures inside the build are
/// absorbed: an unresolvable requirement is simply missing from the terminal
/// outputs and collaborator errors are counted in the exception map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Every candidate path for the requirement was exhausted.
    #[error("could not resolve {0}")]
    Unsatisfiable(Requirement),

    /// Retrieval was non-blocking and background workers have not reached
    /// the fixed point yet. The graph is incomplete, not unsatisfiable.
    #[error("dependency graph construction incomplete; background workers still running")]
    Incomplete,

    /// The build was cancelled before the fixed point was reached.
    #[error("dependency graph building cancelled before completion")]
    Cancelled,

    /// Synchronous single-target resolution did not finish in time.
    #[error("timeout waiting for failure or resolution of {0}")]
    Timeout(Requirement),

    /// Construction reached its fixed point without ever reporting on the
    /// requirement.
    #[error("graph construction stopped without failure or resolution of {0}")]
    Stalled(Requirement),
}
