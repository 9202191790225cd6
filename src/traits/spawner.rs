// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// A unit of background graph construction.
pub type BuildJob = Box<dyn FnOnce() + Send + 'static>;

/// Launches background construction jobs.
///
/// The pool decides when a job is needed and how many may run; the spawner
/// only decides where it runs. A job runs until the run queue is drained or
/// it is cancelled, so implementations should hand it a thread that may
/// block.
pub trait JobSpawner: Send + Sync {
    fn spawn(&self, job: BuildJob) -> std::io::Result<()>;

    fn name(&self) -> &'static str;
}
