// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod build;
mod collaborator;
mod config;

pub use build::BuildError;
pub use collaborator::CollaboratorError;
pub use config::{ConfigError, ValidationError};
