// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod graph;
pub mod resolved;
pub mod serialize;
pub mod value;

pub use graph::{DependencyGraph, GraphNode, NodeKey};
pub use resolved::ResolvedValue;
pub use value::{FunctionId, Requirement, Specification, TargetId, ValueProperties};
