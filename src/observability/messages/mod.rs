// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] so the same event can be emitted with its fields attached
//! or opened as a span.
//!
//! # Organization
//!
//! * `builder` - Builder lifecycle: targets, jobs, cancellation, graph assembly
//! * `resolution` - Per-requirement resolution events inside tasks and resolvers
//!
//! # Usage Pattern
//!
//! ```rust
//! use depgraph_builder::observability::messages::builder::GraphAssembled;
//! use depgraph_builder::observability::messages::StructuredLog;
//!
//! let msg = GraphAssembled {
//!     calculation_configuration: "Default",
//!     node_count: 12,
//!     terminal_output_count: 3,
//! };
//!
//! msg.log();
//! ```

use tracing::Span;

pub mod builder;
pub mod resolution;

/// A message that knows its own log level and structured fields.
pub trait StructuredLog {
    /// Emits the message as a tracing event at its level.
    fn log(&self);

    /// Opens a span carrying the message fields.
    fn span(&self, name: &str) -> Span;
}
