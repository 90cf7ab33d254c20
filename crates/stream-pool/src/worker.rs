// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The worker pool capability.
//!
//! A worker pool owns one FIFO lane per stream and whatever executes it.
//! The stream pool only needs the operations on [`WorkerPool`]; the
//! cross-stream edge and the drain are expressed in terms of `enqueue`
//! with a rendezvous channel, so implementations get them for free.

use crate::{StreamError, StreamHandle};
use crossbeam::channel;

/// A unit of work queued on a stream. Arguments are captured by the
/// closure.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Sizing of a worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Number of streams (one worker each).
    pub workers: usize,
    /// Stack size of each worker thread in bytes.
    pub stack_size: usize,
    /// Maximum pending jobs per stream.
    pub queue_depth: usize,
}

impl WorkerPoolConfig {
    /// Rejects zero workers or a zero queue depth.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.workers == 0 {
            return Err(StreamError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.workers > u32::MAX as usize {
            return Err(StreamError::InvalidConfig(format!(
                "too many workers ({})",
                self.workers
            )));
        }
        if self.queue_depth == 0 {
            return Err(StreamError::InvalidConfig(
                "queue_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn handles(&self) -> Vec<StreamHandle> {
        (0..self.workers as u32).map(StreamHandle::new).collect()
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 6,
            stack_size: 256 * 1024,
            queue_depth: 1024,
        }
    }
}

/// Executes jobs on per-stream FIFO lanes.
pub trait WorkerPool: Send + Sync {
    /// Short implementation name for logs and attributes.
    fn name(&self) -> &'static str;

    /// Every stream this pool serves, in index order.
    fn stream_handles(&self) -> Vec<StreamHandle>;

    /// Number of workers.
    fn worker_count(&self) -> usize {
        self.stream_handles().len()
    }

    /// Brings the workers up. Calling it again is a no-op.
    fn start(&self) -> Result<(), StreamError>;

    /// Whether [`start`](Self::start) has completed and the pool is not
    /// shut down.
    fn is_started(&self) -> bool;

    /// Appends `job` to the lane of `stream`.
    fn enqueue(&self, stream: StreamHandle, job: Job) -> Result<(), StreamError>;

    /// Stops accepting work, lets queued work finish and releases workers.
    fn shutdown(&self);

    /// Orders everything already queued on `src` before anything queued on
    /// `dst` after this call.
    fn sync_from_to(&self, src: StreamHandle, dst: StreamHandle) -> Result<(), StreamError> {
        let (signal, wait) = channel::bounded::<()>(1);
        self.enqueue(
            src,
            Box::new(move || {
                let _ = signal.send(());
            }),
        )?;
        self.enqueue(
            dst,
            Box::new(move || {
                // An error means the signal job was dropped unrun.
                let _ = wait.recv();
            }),
        )
    }

    /// Blocks until everything queued on `stream` so far has run.
    fn drain(&self, stream: StreamHandle) -> Result<(), StreamError> {
        if !self.is_started() {
            return Err(StreamError::NotStarted);
        }
        let (signal, wait) = channel::bounded::<()>(1);
        self.enqueue(
            stream,
            Box::new(move || {
                let _ = signal.send(());
            }),
        )?;
        wait.recv().map_err(|_| StreamError::WorkerLost(stream))
    }
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}
