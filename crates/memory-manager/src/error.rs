// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for memory management.

use crate::{AllocationKind, BufferId, DataPtr};
use tensor_core::Device;

/// Errors that can occur during allocation, lookup, release and copy.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Attempted to allocate a zero-sized buffer.
    #[error("cannot allocate zero-sized buffer")]
    ZeroSizedAllocation,

    /// The requested alignment is zero or not a power of two.
    #[error("alignment {alignment} is not a power of two")]
    InvalidAlignment { alignment: usize },

    /// A human-readable size string could not be parsed.
    #[error("invalid size '{input}': {detail}")]
    InvalidSize { input: String, detail: String },

    /// The memory scope tag is not recognised.
    #[error("unknown memory scope '{scope}'")]
    UnknownScope { scope: String },

    /// A scratch allocation was requested with a non-scratch scope.
    #[error("memory scope '{scope}' is not a scratch scope")]
    NotScratchScope { scope: String },

    /// Scoped memory only supports 0-d, 1-d and 2-d physical shapes.
    #[error("scope '{scope}' supports physical ranks 0 to 2, got rank {rank}")]
    UnsupportedRank { scope: String, rank: usize },

    /// Shape byte size computation failed.
    #[error(transparent)]
    Shape(#[from] tensor_core::TensorError),

    /// The scratch region cannot satisfy the request.
    #[error("scratch memory exhausted: requested {requested} bytes, {available} of {capacity} available")]
    ScratchExhausted {
        requested: usize,
        available: usize,
        capacity: usize,
    },

    /// The host allocator returned null.
    #[error("host allocation of {bytes} bytes (alignment {alignment}) failed")]
    AllocationFailed { bytes: usize, alignment: usize },

    /// The handle is not registered (never allocated, already freed, or stale).
    #[error("buffer {0} is not registered")]
    UnknownBuffer(BufferId),

    /// No live buffer has this base address.
    #[error("no buffer registered at address {0}")]
    UnknownAddress(DataPtr),

    /// A second live buffer claimed an address that is already registered.
    #[error("address {0} is already registered")]
    DuplicateAddress(DataPtr),

    /// A kind-specific free was called with a buffer of another kind.
    #[error("buffer {id} is a {actual} allocation, expected {expected}")]
    KindMismatch {
        id: BufferId,
        expected: AllocationKind,
        actual: AllocationKind,
    },

    /// The buffer was allocated for another device.
    #[error("buffer {id} belongs to {owner}, not {requested}")]
    DeviceMismatch {
        id: BufferId,
        owner: Device,
        requested: Device,
    },

    /// The operation needs a single contiguous block.
    #[error("buffer at {0} is not contiguous")]
    NotContiguous(DataPtr),

    /// A copy range exceeds the bounds of one of its endpoints.
    #[error("copy of {len} bytes at offset {offset} exceeds buffer of {size} bytes")]
    OutOfBounds { offset: usize, len: usize, size: usize },
}
