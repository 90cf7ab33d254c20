// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # stream-pool
//!
//! Execution streams for the DSP device layer.
//!
//! A stream is an ordered lane of work. The pool exposes a fixed number of
//! them, each backed by one worker of a [`WorkerPool`]:
//!
//! - [`ThreadWorkerPool`]: a dedicated thread per stream with a bounded
//!   queue. Threads are spawned by `start()`.
//! - [`InlineWorkerPool`]: runs jobs on the calling thread.
//!
//! [`StreamPool`] tracks which handles are free or assigned, the active
//! stream, and routes [`StreamTarget`]s to lanes. Work on one stream runs in
//! submission order; across streams there is no order unless
//! [`StreamPool::sync_from_to`] places an edge.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use stream_pool::{StreamPool, StreamTarget, ThreadWorkerPool, WorkerPoolConfig};
//!
//! let workers = ThreadWorkerPool::new(WorkerPoolConfig { workers: 2, ..Default::default() }).unwrap();
//! let pool = StreamPool::new(Arc::new(workers));
//! pool.start().unwrap();
//!
//! let s = pool.create_stream().unwrap();
//! pool.dispatch(|| println!("on a stream"), StreamTarget::Stream(s)).unwrap();
//! pool.synchronize(StreamTarget::Stream(s)).unwrap();
//! pool.free_stream(s).unwrap();
//! ```

mod error;
mod handle;
mod inline;
mod pool;
mod threaded;
mod worker;

pub use error::StreamError;
pub use handle::{StreamHandle, StreamTarget};
pub use inline::InlineWorkerPool;
pub use pool::{StreamPool, StreamStats};
pub use threaded::ThreadWorkerPool;
pub use worker::{Job, WorkerPool, WorkerPoolConfig};
