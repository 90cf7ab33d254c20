// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A worker pool without threads.
//!
//! Every job runs to completion on the thread that enqueues it, so each
//! stream is trivially FIFO and cross-stream edges are already satisfied.
//! Used on hosts where spawning workers is undesirable, and in tests.

use crate::worker::panic_message;
use crate::{Job, StreamError, StreamHandle, WorkerPool, WorkerPoolConfig};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

/// Runs every job immediately on the caller.
#[derive(Debug)]
pub struct InlineWorkerPool {
    handles: Vec<StreamHandle>,
    started: AtomicBool,
    shut_down: AtomicBool,
}

impl InlineWorkerPool {
    /// Creates a pool exposing `config.workers` streams.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, StreamError> {
        config.validate()?;
        Ok(Self {
            handles: config.handles(),
            started: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        })
    }
}

impl WorkerPool for InlineWorkerPool {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn stream_handles(&self) -> Vec<StreamHandle> {
        self.handles.clone()
    }

    fn start(&self) -> Result<(), StreamError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(StreamError::ShutDown);
        }
        if !self.started.swap(true, Ordering::AcqRel) {
            info!(streams = self.handles.len(), "inline worker pool started");
        }
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.shut_down.load(Ordering::Acquire)
    }

    fn enqueue(&self, stream: StreamHandle, job: Job) -> Result<(), StreamError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(StreamError::ShutDown);
        }
        if stream.index() >= self.handles.len() {
            return Err(StreamError::UnknownStream(stream));
        }
        if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
            error!(%stream, message = panic_message(panic.as_ref()), "job panicked");
        }
        Ok(())
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
    }
}
