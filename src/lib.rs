// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // function catalogue + market data
pub mod config;     // scenarios + runtime wiring
pub mod engine;     // concurrent graph builder
pub mod errors;     // error handling
pub mod model;      // requirements, specifications, graphs
pub mod observability;
pub mod traits;     // collaborator seams
