// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for streams and worker pools.

use crate::StreamHandle;

/// Errors raised by the stream pool and its worker pool.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Every stream handle is already assigned.
    #[error("all {capacity} streams are in use")]
    Exhausted { capacity: usize },

    /// The handle is not currently assigned to a caller.
    #[error("{0} is not assigned")]
    NotAssigned(StreamHandle),

    /// The handle does not belong to this pool.
    #[error("{0} does not belong to this pool")]
    UnknownStream(StreamHandle),

    /// The operation needs a started worker pool.
    #[error("worker pool has not been started")]
    NotStarted,

    /// The worker pool has been shut down.
    #[error("worker pool has been shut down")]
    ShutDown,

    /// A stream queue is full and the pool is not running to drain it.
    #[error("queue of {stream} is full ({depth} pending jobs)")]
    QueueFull { stream: StreamHandle, depth: usize },

    /// The OS refused to create a worker thread.
    #[error("failed to spawn worker for {stream}: {source}")]
    SpawnFailed {
        stream: StreamHandle,
        #[source]
        source: std::io::Error,
    },

    /// A worker went away while a caller waited on it.
    #[error("worker for {0} exited before signalling")]
    WorkerLost(StreamHandle),

    /// Worker pool configuration is unusable.
    #[error("invalid worker pool configuration: {0}")]
    InvalidConfig(String),
}
