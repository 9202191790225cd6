// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Deduplicated, counted collaborator errors.
//!
//! Each building context records into its own [`ExceptionCache`] without any
//! synchronization. When the context's block of work ends the cache is
//! merged into the builder-wide [`ExceptionAccumulator`] under a short lock.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::errors::CollaboratorError;

/// Thread-local error counts for one building context.
#[derive(Debug, Default)]
pub struct ExceptionCache {
    counts: HashMap<CollaboratorError, usize>,
}

impl ExceptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the first copy of an error; later equal errors bump its count.
    pub fn record(&mut self, error: CollaboratorError) {
        *self.counts.entry(error).or_insert(0) += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn take(&mut self) -> HashMap<CollaboratorError, usize> {
        std::mem::take(&mut self.counts)
    }
}

/// Builder-wide error counts, merged from finished contexts.
#[derive(Debug, Default)]
pub struct ExceptionAccumulator {
    counts: Mutex<HashMap<CollaboratorError, usize>>,
}

impl ExceptionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&self, cache: &mut ExceptionCache) {
        if cache.is_empty() {
            return;
        }
        let local = cache.take();
        let mut counts = self.counts.lock();
        for (error, count) in local {
            *counts.entry(error).or_insert(0) += count;
        }
    }

    pub fn snapshot(&self) -> HashMap<CollaboratorError, usize> {
        self.counts.lock().clone()
    }
}
