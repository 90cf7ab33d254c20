// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! One dedicated OS thread per stream.
//!
//! Each stream owns a bounded crossbeam channel of `queue_depth` jobs and
//! a worker that drains it in order. Workers are created suspended: the
//! lanes exist from construction, so work can be queued early, but no
//! thread runs until [`WorkerPool::start`].
//!
//! ```text
//!  enqueue(stream#k, job) ──► [ bounded lane k ] ──► dsp-stream-k thread
//!                                                     catch_unwind(job)
//! ```
//!
//! Before start, a full lane is reported as [`StreamError::QueueFull`]:
//! blocking there would wait on a worker that does not exist yet. After
//! start, `enqueue` blocks until the lane has room.
//!
//! `shutdown` drops the senders, so each worker finishes what is already
//! queued, sees the channel disconnect and exits; then it is joined.

use crate::worker::panic_message;
use crate::{Job, StreamError, StreamHandle, WorkerPool, WorkerPoolConfig};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

struct PoolState {
    /// `None` once shut down.
    senders: Option<Vec<Sender<Job>>>,
    /// Receivers waiting for their worker; emptied by `start`.
    parked: Vec<(StreamHandle, Receiver<Job>)>,
    workers: Vec<JoinHandle<()>>,
}

/// Thread-per-stream worker pool.
pub struct ThreadWorkerPool {
    config: WorkerPoolConfig,
    handles: Vec<StreamHandle>,
    started: AtomicBool,
    state: Mutex<PoolState>,
}

impl ThreadWorkerPool {
    /// Creates the lanes. No thread is spawned until `start`.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let handles = config.handles();
        let mut senders = Vec::with_capacity(handles.len());
        let mut parked = Vec::with_capacity(handles.len());
        for &h in &handles {
            let (tx, rx) = channel::bounded(config.queue_depth);
            senders.push(tx);
            parked.push((h, rx));
        }
        debug!(
            workers = config.workers,
            queue_depth = config.queue_depth,
            "thread worker pool created"
        );
        Ok(Self {
            config,
            handles,
            started: AtomicBool::new(false),
            state: Mutex::new(PoolState {
                senders: Some(senders),
                parked,
                workers: Vec::new(),
            }),
        })
    }

    /// Sizing this pool was built with.
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Jobs currently waiting on `stream`.
    pub fn pending(&self, stream: StreamHandle) -> usize {
        self.state
            .lock()
            .senders
            .as_ref()
            .and_then(|s| s.get(stream.index()))
            .map_or(0, Sender::len)
    }

    fn sender(&self, stream: StreamHandle) -> Result<Sender<Job>, StreamError> {
        let state = self.state.lock();
        let senders = state.senders.as_ref().ok_or(StreamError::ShutDown)?;
        senders
            .get(stream.index())
            .cloned()
            .ok_or(StreamError::UnknownStream(stream))
    }
}

impl WorkerPool for ThreadWorkerPool {
    fn name(&self) -> &'static str {
        "threads"
    }

    fn stream_handles(&self) -> Vec<StreamHandle> {
        self.handles.clone()
    }

    fn start(&self) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        if self.started.load(Ordering::Acquire) {
            return Ok(());
        }
        if state.senders.is_none() {
            return Err(StreamError::ShutDown);
        }

        let mut parked = std::mem::take(&mut state.parked).into_iter();
        while let Some((stream, jobs)) = parked.next() {
            let lane = jobs.clone();
            match thread::Builder::new()
                .name(format!("dsp-stream-{}", stream.index()))
                .stack_size(self.config.stack_size)
                .spawn(move || worker_loop(stream, lane))
            {
                Ok(handle) => state.workers.push(handle),
                Err(source) => {
                    // Lanes without a worker stay parked for the next start.
                    state.parked.push((stream, jobs));
                    state.parked.extend(parked);
                    error!(%stream, error = %source, "failed to spawn stream worker");
                    return Err(StreamError::SpawnFailed { stream, source });
                }
            }
        }

        self.started.store(true, Ordering::Release);
        info!(
            workers = state.workers.len(),
            stack_size = self.config.stack_size,
            "thread worker pool started"
        );
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    fn enqueue(&self, stream: StreamHandle, job: Job) -> Result<(), StreamError> {
        let lane = self.sender(stream)?;
        if self.started.load(Ordering::Acquire) {
            lane.send(job).map_err(|_| StreamError::ShutDown)
        } else {
            lane.try_send(job).map_err(|e| match e {
                TrySendError::Full(_) => StreamError::QueueFull {
                    stream,
                    depth: self.config.queue_depth,
                },
                TrySendError::Disconnected(_) => StreamError::ShutDown,
            })
        }
    }

    fn shutdown(&self) {
        let (workers, dropped) = {
            let mut state = self.state.lock();
            if state.senders.take().is_none() {
                return;
            }
            self.started.store(false, Ordering::Release);
            let dropped: usize = state.parked.drain(..).map(|(_, rx)| rx.len()).sum();
            (std::mem::take(&mut state.workers), dropped)
        };

        if dropped > 0 {
            warn!(jobs = dropped, "worker pool shut down before start; queued jobs dropped");
        }
        let current = thread::current().id();
        for worker in workers {
            if worker.thread().id() == current {
                // Shutdown from inside a job; the worker exits on its own.
                continue;
            }
            if worker.join().is_err() {
                error!("stream worker terminated abnormally");
            }
        }
        info!("thread worker pool shut down");
    }
}

impl Drop for ThreadWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadWorkerPool")
            .field("config", &self.config)
            .field("started", &self.is_started())
            .finish()
    }
}

fn worker_loop(stream: StreamHandle, jobs: Receiver<Job>) {
    debug!(%stream, "stream worker running");
    for job in jobs.iter() {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
            error!(%stream, message = panic_message(panic.as_ref()), "job panicked");
        }
    }
    debug!(%stream, "stream worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::sync::Arc;
    use std::time::Duration;

    fn pool(workers: usize, queue_depth: usize) -> ThreadWorkerPool {
        ThreadWorkerPool::new(WorkerPoolConfig {
            workers,
            stack_size: 128 * 1024,
            queue_depth,
        })
        .unwrap()
    }

    #[test]
    fn test_fifo_per_stream() {
        let p = pool(2, 64);
        p.start().unwrap();
        let log = Arc::new(PlMutex::new(Vec::new()));
        let s = StreamHandle::new(1);
        for i in 0..50 {
            let log = Arc::clone(&log);
            p.enqueue(s, Box::new(move || log.lock().push(i))).unwrap();
        }
        p.drain(s).unwrap();
        assert_eq!(*log.lock(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_queued_before_start_runs_after_start() {
        let p = pool(1, 8);
        let log = Arc::new(PlMutex::new(Vec::new()));
        let l = Arc::clone(&log);
        p.enqueue(StreamHandle::new(0), Box::new(move || l.lock().push(1)))
            .unwrap();
        assert!(log.lock().is_empty());

        p.start().unwrap();
        p.start().unwrap(); // idempotent
        p.drain(StreamHandle::new(0)).unwrap();
        assert_eq!(*log.lock(), vec![1]);
    }

    #[test]
    fn test_full_queue_before_start() {
        let p = pool(1, 2);
        let s = StreamHandle::new(0);
        p.enqueue(s, Box::new(|| {})).unwrap();
        p.enqueue(s, Box::new(|| {})).unwrap();
        assert_eq!(p.pending(s), 2);
        assert!(matches!(
            p.enqueue(s, Box::new(|| {})),
            Err(StreamError::QueueFull { depth: 2, .. })
        ));
    }

    #[test]
    fn test_sync_orders_streams() {
        let p = pool(2, 64);
        p.start().unwrap();
        let (a, b) = (StreamHandle::new(0), StreamHandle::new(1));
        let log = Arc::new(PlMutex::new(Vec::new()));

        let l = Arc::clone(&log);
        p.enqueue(a, Box::new(move || {
            thread::sleep(Duration::from_millis(30));
            l.lock().push("src");
        }))
        .unwrap();
        p.sync_from_to(a, b).unwrap();
        let l = Arc::clone(&log);
        p.enqueue(b, Box::new(move || l.lock().push("dst"))).unwrap();

        p.drain(b).unwrap();
        assert_eq!(*log.lock(), vec!["src", "dst"]);
    }

    #[test]
    fn test_panicking_job_keeps_worker() {
        let p = pool(1, 8);
        p.start().unwrap();
        let s = StreamHandle::new(0);
        p.enqueue(s, Box::new(|| panic!("job failure"))).unwrap();
        p.drain(s).unwrap();
    }

    #[test]
    fn test_shutdown_finishes_queued_work() {
        let p = pool(1, 16);
        p.start().unwrap();
        let count = Arc::new(PlMutex::new(0));
        for _ in 0..10 {
            let c = Arc::clone(&count);
            p.enqueue(StreamHandle::new(0), Box::new(move || *c.lock() += 1))
                .unwrap();
        }
        p.shutdown();
        assert_eq!(*count.lock(), 10);
        assert!(!p.is_started());
        assert!(matches!(
            p.enqueue(StreamHandle::new(0), Box::new(|| {})),
            Err(StreamError::ShutDown)
        ));
        assert!(matches!(p.start(), Err(StreamError::ShutDown)));
    }

    #[test]
    fn test_failed_spawn_keeps_unstarted_lanes() {
        // A stack this large cannot be mapped, so spawning is expected to fail.
        let p = ThreadWorkerPool::new(WorkerPoolConfig {
            workers: 2,
            stack_size: 1 << 46,
            queue_depth: 4,
        })
        .unwrap();
        let s = StreamHandle::new(1);
        p.enqueue(s, Box::new(|| {})).unwrap();

        match p.start() {
            Err(StreamError::SpawnFailed { .. }) => {
                assert!(!p.is_started());
                let state = p.state.lock();
                assert_eq!(state.parked.len() + state.workers.len(), 2);
                assert!(state.parked.iter().any(|(h, rx)| *h == s && rx.len() == 1));
            }
            // Hosts that overcommit address space may still spawn.
            other => assert!(other.is_ok()),
        }
    }

    #[test]
    fn test_unknown_stream() {
        let p = pool(1, 4);
        assert!(matches!(
            p.enqueue(StreamHandle::new(5), Box::new(|| {})),
            Err(StreamError::UnknownStream(_))
        ));
    }
}
