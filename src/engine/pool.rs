// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Background jobs that drain the run queue.
//!
//! The pool never owns threads. It counts active jobs, caps them at
//! `max_additional_threads`, and asks a [`JobSpawner`] to run each one. A
//! caller blocked in `get_graph` joins in as one more, uncounted, job.
//!
//! Every job (background or caller) registers a [`CancellationToken`];
//! cancelling the build cancels them all and bumps an epoch so a waiting
//! caller can tell its wait was interrupted.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::engine::context::{BuildShared, BuildingContext};
use crate::engine::run_queue::WorkItem;
use crate::errors::CollaboratorError;
use crate::observability::messages::builder::{
    BuildCancelled, BuildJobSpawnFailed, BuildJobStarted, BuildJobStopped, MaxAdditionalThreadsChanged,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{BuildJob, JobSpawner};

pub(crate) struct WorkerPool {
    active: AtomicUsize,
    max_additional_threads: AtomicUsize,
    jobs: Mutex<HashMap<u64, CancellationToken>>,
    cancellation_epoch: AtomicU64,
    spawner: Arc<dyn JobSpawner>,
}

impl WorkerPool {
    pub(crate) fn new(max_additional_threads: usize, spawner: Arc<dyn JobSpawner>) -> Self {
        Self {
            active: AtomicUsize::new(0),
            max_additional_threads: AtomicUsize::new(max_additional_threads),
            jobs: Mutex::new(HashMap::new()),
            cancellation_epoch: AtomicU64::new(0),
            spawner,
        }
    }

    pub(crate) fn active_jobs(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Background and caller jobs that have not yet deregistered.
    pub(crate) fn registered_jobs(&self) -> usize {
        self.jobs.lock().len()
    }

    pub(crate) fn max_additional_threads(&self) -> usize {
        self.max_additional_threads.load(Ordering::Acquire)
    }

    pub(crate) fn cancellation_epoch(&self) -> u64 {
        self.cancellation_epoch.load(Ordering::Acquire)
    }

    /// Claims a slot for one more background job if the limit allows.
    fn try_reserve(&self) -> bool {
        let mut active = self.active.load(Ordering::Acquire);
        loop {
            if active >= self.max_additional_threads.load(Ordering::Acquire) {
                return false;
            }
            match self
                .active
                .compare_exchange(active, active + 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(current) => active = current,
            }
        }
    }

    fn register(&self, job_id: u64) -> CancellationToken {
        let token = CancellationToken::new();
        self.jobs.lock().insert(job_id, token.clone());
        token
    }

    fn deregister(&self, job_id: u64) {
        self.jobs.lock().remove(&job_id);
    }

    /// Stops all work: no new background jobs, every registered job poisoned.
    /// Returns how many jobs were told to stop.
    pub(crate) fn cancel(&self) -> usize {
        self.max_additional_threads.store(0, Ordering::Release);
        let cancelled_jobs = {
            let jobs = self.jobs.lock();
            for token in jobs.values() {
                token.cancel();
            }
            jobs.len()
        };
        self.cancellation_epoch.fetch_add(1, Ordering::AcqRel);
        BuildCancelled { cancelled_jobs }.log();
        cancelled_jobs
    }
}

/// Starts a background job if the queue warrants one and the limit allows.
pub(crate) fn start_job(shared: &Arc<BuildShared>) -> bool {
    let pool = &shared.pool;
    if !pool.try_reserve() {
        return false;
    }
    let job_id = shared.next_id();
    let token = pool.register(job_id);
    let job_shared = Arc::clone(shared);
    let job: BuildJob = Box::new(move || run_background_job(job_shared, job_id, token));
    match pool.spawner.spawn(job) {
        Ok(()) => true,
        Err(error) => {
            pool.deregister(job_id);
            pool.active.fetch_sub(1, Ordering::AcqRel);
            BuildJobSpawnFailed {
                spawner: pool.spawner.name(),
                error: &error,
            }
            .log();
            false
        }
    }
}

/// Applies a new thread limit and starts jobs for work already queued.
pub(crate) fn set_max_additional_threads(shared: &Arc<BuildShared>, max_additional_threads: usize) {
    shared
        .pool
        .max_additional_threads
        .store(max_additional_threads, Ordering::Release);
    let pending_items = shared.queue.len();
    MaxAdditionalThreadsChanged {
        max_additional_threads,
        pending_items,
    }
    .log();
    for _ in 0..pending_items.min(max_additional_threads) {
        if !start_job(shared) {
            break;
        }
    }
}

fn run_background_job(shared: Arc<BuildShared>, job_id: u64, token: CancellationToken) {
    BuildJobStarted {
        job_id,
        active_jobs: shared.pool.active_jobs(),
    }
    .log();
    let mut completed = 0;
    loop {
        completed += drain(&shared, &token);
        shared.pool.active.fetch_sub(1, Ordering::AcqRel);
        // Work queued onto an empty queue after the last pop starts no job of
        // its own, so look again before leaving.
        if token.is_cancelled() || shared.queue.is_empty() || !shared.pool.try_reserve() {
            break;
        }
    }
    shared.pool.deregister(job_id);
    BuildJobStopped {
        job_id,
        completed,
        cancelled: token.is_cancelled(),
    }
    .log();
}

/// Runs queued work on the calling thread until the queue is empty.
/// Returns false if the build was cancelled meanwhile.
pub(crate) fn run_caller_job(shared: &Arc<BuildShared>) -> bool {
    let job_id = shared.next_id();
    let token = shared.pool.register(job_id);
    let completed = drain(shared, &token);
    shared.pool.deregister(job_id);
    tracing::trace!(job_id, completed, "Caller job finished");
    !token.is_cancelled()
}

/// Pops and runs items until the queue is empty or `token` is cancelled.
fn drain(shared: &Arc<BuildShared>, token: &CancellationToken) -> u64 {
    let mut completed = 0;
    let mut ctx = BuildingContext::new(Arc::clone(shared));
    while !token.is_cancelled() {
        let Some(item) = shared.queue.pop() else {
            break;
        };
        completed += 1;
        if !execute(&mut ctx, item) {
            // A panic may have left the context mid-callback; start afresh.
            ctx.merge_exceptions();
            ctx = BuildingContext::new(Arc::clone(shared));
        }
    }
    ctx.merge_exceptions();
    completed
}

/// Runs one item, catching a panic at the item boundary.
fn execute(ctx: &mut BuildingContext, item: WorkItem) -> bool {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| item.run(ctx)));
    ctx.shared().queue.mark_completed();
    match outcome {
        Ok(()) => true,
        Err(payload) => {
            ctx.exception(CollaboratorError::from_panic(payload.as_ref()));
            false
        }
    }
}

/// Runs each job on a dedicated, named OS thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSpawner;

impl JobSpawner for ThreadSpawner {
    fn spawn(&self, job: BuildJob) -> std::io::Result<()> {
        std::thread::Builder::new()
            .name("depgraph-build".to_string())
            .spawn(job)
            .map(|_| ())
    }

    fn name(&self) -> &'static str {
        "thread"
    }
}

/// Runs each job on a Tokio runtime's blocking pool.
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl JobSpawner for TokioSpawner {
    fn spawn(&self, job: BuildJob) -> std::io::Result<()> {
        self.handle.spawn_blocking(job);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tokio-blocking"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RefusingSpawner;

    impl JobSpawner for RefusingSpawner {
        fn spawn(&self, _job: BuildJob) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no threads today"))
        }

        fn name(&self) -> &'static str {
            "refusing"
        }
    }

    #[test]
    fn test_reservation_respects_limit() {
        let pool = WorkerPool::new(2, Arc::new(ThreadSpawner));
        assert!(pool.try_reserve());
        assert!(pool.try_reserve());
        assert!(!pool.try_reserve());
        assert_eq!(pool.active_jobs(), 2);
    }

    #[test]
    fn test_zero_limit_never_reserves() {
        let pool = WorkerPool::new(0, Arc::new(ThreadSpawner));
        assert!(!pool.try_reserve());
    }

    #[test]
    fn test_cancel_poisons_registered_jobs_and_bumps_epoch() {
        let pool = WorkerPool::new(4, Arc::new(ThreadSpawner));
        let first = pool.register(1);
        let second = pool.register(2);

        assert_eq!(pool.cancel(), 2);
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        assert_eq!(pool.cancellation_epoch(), 1);
        assert_eq!(pool.max_additional_threads(), 0);
    }

    #[test]
    fn test_spawn_failure_releases_reservation() {
        use crate::backends::stub::{FailingResolver, NoMarketData};

        let shared = Arc::new(BuildShared::new(
            "default".to_string(),
            16,
            Arc::new(FailingResolver::new("unused")),
            Arc::new(NoMarketData),
            WorkerPool::new(1, Arc::new(RefusingSpawner)),
        ));

        assert!(!start_job(&shared));
        assert_eq!(shared.pool.active_jobs(), 0);
        assert_eq!(shared.pool.registered_jobs(), 0);
    }

    #[test]
    fn test_thread_spawner_runs_job() {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        ThreadSpawner
            .spawn(Box::new(move || {
                let _ = sender.send(42);
            }))
            .unwrap();
        assert_eq!(receiver.recv_timeout(std::time::Duration::from_secs(5)), Ok(42));
    }
}
