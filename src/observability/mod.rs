// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Message types follow a struct-based pattern with a `Display` implementation
//! and a [`messages::StructuredLog`] implementation, so log lines are defined
//! in one place and carry their fields as structured data.
//!
//! # Architecture
//!
//! * `messages::builder` - Builder lifecycle events
//! * `messages::resolution` - Requirement resolution events
//!
//! # Usage
//!
//! ```rust
//! use depgraph_builder::model::Requirement;
//! use depgraph_builder::observability::messages::builder::TargetUnresolved;
//!
//! let requirement = Requirement::new("PresentValue", "SWAP-1");
//! let msg = TargetUnresolved { requirement: &requirement };
//!
//! tracing::warn!("{}", msg);
//! ```

pub mod messages;
