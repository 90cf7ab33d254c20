// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Stream bookkeeping and dispatch.
//!
//! The [`StreamPool`] hands out the fixed set of stream handles exposed by
//! its [`WorkerPool`], records the active stream, routes work to the right
//! lane and places cross-stream edges.
//!
//! ```text
//!            create_stream()                free_stream(h)
//!   Free ───────────────────────► Assigned ───────────────► Free
//! ```
//!
//! The free list is LIFO: the most recently freed handle is handed out
//! first.

use crate::{Job, StreamError, StreamHandle, StreamTarget, WorkerPool};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Snapshot of stream pool counters.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StreamStats {
    /// Number of streams the pool was built with.
    pub capacity: usize,
    /// Streams currently free.
    pub free: usize,
    /// Streams currently assigned.
    pub assigned: usize,
    /// Jobs queued on a stream.
    pub dispatched: u64,
    /// Jobs run inline on the caller.
    pub inline_runs: u64,
    /// Cross-stream edges placed.
    pub syncs: u64,
    /// Blocking stream drains.
    pub drains: u64,
}

#[derive(Debug)]
struct Assignment {
    free: Vec<StreamHandle>,
    assigned: HashSet<StreamHandle>,
    active: Option<StreamHandle>,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    inline_runs: AtomicU64,
    syncs: AtomicU64,
    drains: AtomicU64,
}

/// The stream pool and dispatcher.
pub struct StreamPool {
    workers: Arc<dyn WorkerPool>,
    capacity: usize,
    state: Mutex<Assignment>,
    counters: Counters,
}

impl StreamPool {
    /// Builds a pool over every stream `workers` exposes. All start Free.
    pub fn new(workers: Arc<dyn WorkerPool>) -> Self {
        let mut free = workers.stream_handles();
        // Pop order hands out stream#0 first.
        free.reverse();
        let capacity = free.len();
        Self {
            workers,
            capacity,
            state: Mutex::new(Assignment {
                free,
                assigned: HashSet::with_capacity(capacity),
                active: None,
            }),
            counters: Counters::default(),
        }
    }

    /// Assigns a free stream to the caller.
    pub fn create_stream(&self) -> Result<StreamHandle, StreamError> {
        let mut state = self.state.lock();
        let handle = state.free.pop().ok_or(StreamError::Exhausted {
            capacity: self.capacity,
        })?;
        state.assigned.insert(handle);
        debug!(stream = %handle, free = state.free.len(), "stream created");
        Ok(handle)
    }

    /// Returns an assigned stream to the free list. If it was the active
    /// stream, the active stream falls back to inline.
    pub fn free_stream(&self, handle: StreamHandle) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        if !state.assigned.remove(&handle) {
            return Err(StreamError::NotAssigned(handle));
        }
        if state.active == Some(handle) {
            state.active = None;
        }
        state.free.push(handle);
        debug!(stream = %handle, free = state.free.len(), "stream freed");
        Ok(())
    }

    /// Records the active stream. `None` makes inline the active target.
    pub fn set_stream(&self, handle: Option<StreamHandle>) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        if let Some(h) = handle {
            if !state.assigned.contains(&h) {
                return Err(StreamError::NotAssigned(h));
            }
        }
        state.active = handle;
        Ok(())
    }

    /// The active stream, if any.
    pub fn active_stream(&self) -> Option<StreamHandle> {
        self.state.lock().active
    }

    /// Resolves a target to a concrete stream (`None` meaning inline).
    pub fn resolve(&self, target: StreamTarget) -> Result<Option<StreamHandle>, StreamError> {
        let state = self.state.lock();
        match target {
            StreamTarget::Inline => Ok(None),
            StreamTarget::Active => Ok(state.active),
            StreamTarget::Stream(h) if state.assigned.contains(&h) => Ok(Some(h)),
            StreamTarget::Stream(h) => Err(StreamError::NotAssigned(h)),
        }
    }

    /// Runs `job` on `target`.
    ///
    /// Inline work runs before this returns. Stream work is queued behind
    /// everything previously dispatched to the same stream.
    pub fn dispatch<F>(&self, job: F, target: StreamTarget) -> Result<(), StreamError>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.resolve(target)? {
            None => {
                self.counters.inline_runs.fetch_add(1, Ordering::Relaxed);
                job();
                Ok(())
            }
            Some(stream) => {
                let job: Job = Box::new(job);
                self.workers.enqueue(stream, job)?;
                self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    /// Orders work already on `src` before work later queued on `dst`.
    pub fn sync_from_to(&self, src: StreamTarget, dst: StreamTarget) -> Result<(), StreamError> {
        let (src, dst) = (self.resolve(src)?, self.resolve(dst)?);
        match (src, dst) {
            // Inline work has already completed.
            (None, _) => Ok(()),
            (Some(s), None) => self.drain(s),
            (Some(s), Some(d)) if s == d => Ok(()),
            (Some(s), Some(d)) => {
                self.workers.sync_from_to(s, d)?;
                self.counters.syncs.fetch_add(1, Ordering::Relaxed);
                debug!(src = %s, dst = %d, "stream edge placed");
                Ok(())
            }
        }
    }

    /// Blocks until `target` has run everything queued on it so far.
    pub fn synchronize(&self, target: StreamTarget) -> Result<(), StreamError> {
        match self.resolve(target)? {
            None => Ok(()),
            Some(s) => self.drain(s),
        }
    }

    /// Starts the worker pool. Idempotent.
    pub fn start(&self) -> Result<(), StreamError> {
        self.workers.start()
    }

    /// Whether the worker pool is running.
    pub fn is_started(&self) -> bool {
        self.workers.is_started()
    }

    /// Shuts the worker pool down.
    pub fn shutdown(&self) {
        self.workers.shutdown();
    }

    /// Number of streams.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Streams currently free.
    pub fn free_count(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Streams currently assigned.
    pub fn assigned_count(&self) -> usize {
        self.state.lock().assigned.len()
    }

    /// Whether `handle` is currently assigned.
    pub fn is_assigned(&self, handle: StreamHandle) -> bool {
        self.state.lock().assigned.contains(&handle)
    }

    /// The underlying worker pool.
    pub fn worker_pool(&self) -> &Arc<dyn WorkerPool> {
        &self.workers
    }

    /// Returns a snapshot of counters.
    pub fn stats(&self) -> StreamStats {
        let (free, assigned) = {
            let state = self.state.lock();
            (state.free.len(), state.assigned.len())
        };
        StreamStats {
            capacity: self.capacity,
            free,
            assigned,
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            inline_runs: self.counters.inline_runs.load(Ordering::Relaxed),
            syncs: self.counters.syncs.load(Ordering::Relaxed),
            drains: self.counters.drains.load(Ordering::Relaxed),
        }
    }

    fn drain(&self, stream: StreamHandle) -> Result<(), StreamError> {
        self.workers.drain(stream)?;
        self.counters.drains.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl std::fmt::Debug for StreamPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPool")
            .field("worker_pool", &self.workers.name())
            .field("capacity", &self.capacity)
            .field("state", &*self.state.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InlineWorkerPool, WorkerPoolConfig};
    use std::sync::atomic::AtomicUsize;

    fn pool(n: usize) -> StreamPool {
        let workers = InlineWorkerPool::new(WorkerPoolConfig {
            workers: n,
            ..Default::default()
        })
        .unwrap();
        StreamPool::new(Arc::new(workers))
    }

    #[test]
    fn test_create_until_exhausted() {
        let p = pool(2);
        let a = p.create_stream().unwrap();
        let b = p.create_stream().unwrap();
        assert_eq!(a, StreamHandle::new(0));
        assert_ne!(a, b);
        assert!(matches!(
            p.create_stream(),
            Err(StreamError::Exhausted { capacity: 2 })
        ));
    }

    #[test]
    fn test_freed_handle_is_reused() {
        let p = pool(3);
        let _a = p.create_stream().unwrap();
        let b = p.create_stream().unwrap();
        p.free_stream(b).unwrap();
        assert_eq!(p.create_stream().unwrap(), b);
    }

    #[test]
    fn test_free_unassigned() {
        let p = pool(2);
        let a = p.create_stream().unwrap();
        p.free_stream(a).unwrap();
        assert!(matches!(p.free_stream(a), Err(StreamError::NotAssigned(_))));
        assert_eq!(p.free_count(), 2);
    }

    #[test]
    fn test_active_stream_reset_on_free() {
        let p = pool(2);
        let a = p.create_stream().unwrap();
        p.set_stream(Some(a)).unwrap();
        assert_eq!(p.resolve(StreamTarget::Active).unwrap(), Some(a));
        p.free_stream(a).unwrap();
        assert_eq!(p.active_stream(), None);
        assert_eq!(p.resolve(StreamTarget::Active).unwrap(), None);
    }

    #[test]
    fn test_set_stream_requires_assignment() {
        let p = pool(2);
        assert!(p.set_stream(Some(StreamHandle::new(1))).is_err());
        assert!(p.set_stream(None).is_ok());
    }

    #[test]
    fn test_dispatch_targets() {
        let p = pool(2);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        p.dispatch(move || { h.fetch_add(1, Ordering::SeqCst); }, StreamTarget::Inline)
            .unwrap();

        let s = p.create_stream().unwrap();
        let h = Arc::clone(&hits);
        p.dispatch(move || { h.fetch_add(1, Ordering::SeqCst); }, s.into())
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        let stats = p.stats();
        assert_eq!(stats.inline_runs, 1);
        assert_eq!(stats.dispatched, 1);

        assert!(matches!(
            p.dispatch(|| {}, StreamTarget::Stream(StreamHandle::new(1))),
            Err(StreamError::NotAssigned(_))
        ));
    }

    #[test]
    fn test_synchronize_before_start() {
        let p = pool(1);
        let s = p.create_stream().unwrap();
        assert!(matches!(p.synchronize(s.into()), Err(StreamError::NotStarted)));
        assert!(p.synchronize(StreamTarget::Inline).is_ok());
        p.start().unwrap();
        assert!(p.synchronize(s.into()).is_ok());
        assert_eq!(p.stats().drains, 1);
    }

    #[test]
    fn test_sync_same_stream_is_noop() {
        let p = pool(1);
        let s = p.create_stream().unwrap();
        p.sync_from_to(s.into(), s.into()).unwrap();
        p.sync_from_to(StreamTarget::Inline, s.into()).unwrap();
        assert_eq!(p.stats().syncs, 0);
    }
}
