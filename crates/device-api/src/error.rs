// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the device API.

use memory_manager::MemoryError;
use stream_pool::StreamError;
use tensor_core::{Device, TensorError};

/// Errors returned by [`DeviceApi`](crate::DeviceApi) operations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceApiError {
    /// The device descriptor does not name this backend.
    #[error("invalid device '{0}': expected a hexagon or cpu device")]
    InvalidDevice(Device),

    /// Source and destination of a copy do not match.
    #[error("incompatible copy: {0}")]
    IncompatibleCopy(String),

    /// Allocation, lookup or buffer access failed.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    /// Stream bookkeeping or worker pool failure.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// Shape arithmetic failed.
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse error category, stable across the wrapped error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidDevice,
    NotFound,
    ResourceExhausted,
    InvalidArgument,
    InvalidState,
    Config,
    Internal,
}

impl DeviceApiError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceApiError::InvalidDevice(_) => ErrorKind::InvalidDevice,
            DeviceApiError::IncompatibleCopy(_) | DeviceApiError::Tensor(_) => {
                ErrorKind::InvalidArgument
            }
            DeviceApiError::Config(_) => ErrorKind::Config,
            DeviceApiError::Memory(e) => match e {
                MemoryError::UnknownBuffer(_) | MemoryError::UnknownAddress(_) => {
                    ErrorKind::NotFound
                }
                MemoryError::ScratchExhausted { .. } => ErrorKind::ResourceExhausted,
                MemoryError::DuplicateAddress(_) | MemoryError::AllocationFailed { .. } => {
                    ErrorKind::Internal
                }
                _ => ErrorKind::InvalidArgument,
            },
            DeviceApiError::Stream(e) => match e {
                StreamError::Exhausted { .. } | StreamError::QueueFull { .. } => {
                    ErrorKind::ResourceExhausted
                }
                StreamError::NotAssigned(_)
                | StreamError::UnknownStream(_)
                | StreamError::NotStarted
                | StreamError::ShutDown => ErrorKind::InvalidState,
                StreamError::SpawnFailed { .. } | StreamError::WorkerLost(_) => {
                    ErrorKind::Internal
                }
                StreamError::InvalidConfig(_) => ErrorKind::Config,
            },
        }
    }
}
