// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! Buffer ownership tracking and allocation policies for a DSP-class
//! co-processor with a small bounded fast-memory ("scratch") region.
//!
//! # Key Components
//!
//! - [`BufferRegistry`]: generation-checked arena mapping [`BufferId`]s to
//!   their owners, with a unique base-address index.
//! - [`DeviceBuffer`]: the allocation object. Flat (one contiguous block)
//!   or N-d (physical shape kept, possibly several discontiguous blocks).
//! - [`BufferManager`]: flat, scoped/Nd, scratch and workspace allocation
//!   over one registry, plus the kind-checked frees.
//! - [`ScratchRegion`] / [`ScratchLease`]: bounded capacity accounting.
//!   A lease gives its bytes back when dropped.
//! - [`ScopeTable`]: which memory scope tags are recognised.
//! - [`ByteSize`]: human-readable sizes (`"4M"`, `"256K"`).
//! - [`AllocationStats`]: per-kind counts and peak usage.
//!
//! # Ownership Model
//!
//! ```text
//! BufferManager::allocate_*()
//!       │
//!       ▼
//!   BufferRecord { Arc<DeviceBuffer>, kind, device } ──► registry slot
//!       │                                   │
//!       │  free(id)                         │ clone held by a queued copy
//!       ▼                                   ▼
//!   slot generation bumped           storage (and scratch lease)
//!                                    dropped with the last Arc
//! ```
//!
//! # Example
//! ```
//! use memory_manager::{BufferManager, ByteSize, ScopeTable};
//! use tensor_core::{DType, Device, Shape};
//!
//! let mm = BufferManager::new(ByteSize::from_kb(64), ScopeTable::default(), 2048).unwrap();
//! let dev = Device::hexagon(0);
//!
//! let a = mm.allocate_flat(dev, 1024, 64, DType::U8).unwrap();
//! let t = mm
//!     .allocate_nd(dev, &Shape::matrix(4, 16), DType::F32, Some("global.vtcm"))
//!     .unwrap();
//! assert_eq!(mm.scratch().used_bytes(), 256);
//!
//! mm.free(a).unwrap();
//! mm.free(t).unwrap();
//! assert_eq!(mm.scratch().used_bytes(), 0);
//! ```

mod allocator;
mod buffer;
mod error;
pub mod registry;
mod scope;
mod scratch;
mod size;
mod stats;
mod storage;

pub use allocator::{AllocationKind, BufferInfo, BufferManager, BufferRecord};
pub use buffer::{BufferLayout, DeviceBuffer};
pub use error::MemoryError;
pub use registry::{BufferId, BufferRegistry, DataPtr};
pub use scope::{MemoryScope, ScopeTable, DEFAULT_SCRATCH_SCOPE, GLOBAL_SCOPE};
pub use scratch::{ScratchLease, ScratchRegion};
pub use size::ByteSize;
pub use stats::AllocationStats;
