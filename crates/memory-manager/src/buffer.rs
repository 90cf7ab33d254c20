// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The allocation object behind every registered buffer.
//!
//! A [`DeviceBuffer`] is built by one of two factories:
//!
//! - [`DeviceBuffer::flat`]: one contiguous block of `bytes`.
//! - [`DeviceBuffer::nd`]: a physical N-d layout. Rank 0 and rank 1 are a
//!   single block; rank 2 is `shape[0]` separately allocated blocks of
//!   `shape[1]` elements each. Blocks of the same buffer are not adjacent
//!   in memory, so byte offsets into such a buffer are meaningless and
//!   copies must walk block by block.
//!
//! # Access model
//! Buffers are shared as `Arc<DeviceBuffer>` between the registry and any
//! copy queued on a stream. Contents are only read or written through the
//! copy methods below. Each buffer carries a reader-writer lock over its
//! bytes: reads take it shared, writes take it exclusive. A copy between
//! two buffers locks them in base-address order; a copy within one buffer
//! locks it once. Streams still decide the order of conflicting copies;
//! the lock only keeps each copy whole.

use crate::scratch::ScratchLease;
use crate::storage::AlignedBlock;
use crate::{DataPtr, MemoryError, MemoryScope};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tensor_core::{DType, Shape, TensorError};

/// How a buffer's bytes are laid out physically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferLayout {
    /// One contiguous block.
    Flat { bytes: usize },
    /// `nallocs` blocks of `block_bytes` each, from a physical shape.
    Blocked {
        shape: Shape,
        nallocs: usize,
        block_bytes: usize,
    },
}

/// A contiguous run of bytes used while walking buffers block by block.
#[derive(Clone, Copy)]
struct Region {
    ptr: *mut u8,
    len: usize,
}

/// An allocation object: storage plus the metadata needed to address it.
pub struct DeviceBuffer {
    layout: BufferLayout,
    dtype: DType,
    scope: MemoryScope,
    alignment: usize,
    blocks: Vec<AlignedBlock>,
    /// Guards the bytes behind `blocks`.
    access: RwLock<()>,
    lease: Option<ScratchLease>,
}

impl DeviceBuffer {
    /// Builds a flat, global-scope allocation.
    pub fn flat(bytes: usize, alignment: usize, dtype: DType) -> Result<Self, MemoryError> {
        check_alignment(alignment)?;
        if bytes == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }
        let block = AlignedBlock::zeroed(bytes, alignment)?;
        Ok(Self {
            layout: BufferLayout::Flat { bytes },
            dtype,
            scope: MemoryScope::Global,
            alignment,
            blocks: vec![block],
            access: RwLock::new(()),
            lease: None,
        })
    }

    /// Builds an allocation that keeps the physical `shape` and `scope`.
    ///
    /// `lease` is the scratch capacity paid for this buffer, if any; it is
    /// held for as long as the storage lives.
    pub fn nd(
        shape: &Shape,
        dtype: DType,
        scope: MemoryScope,
        alignment: usize,
        lease: Option<ScratchLease>,
    ) -> Result<Self, MemoryError> {
        check_alignment(alignment)?;
        let (nallocs, block_bytes) = Self::physical_layout(shape, dtype, &scope)?;
        let blocks = (0..nallocs)
            .map(|_| AlignedBlock::zeroed(block_bytes, alignment))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            layout: BufferLayout::Blocked {
                shape: shape.clone(),
                nallocs,
                block_bytes,
            },
            dtype,
            scope,
            alignment,
            blocks,
            access: RwLock::new(()),
            lease,
        })
    }

    /// Computes `(number of blocks, bytes per block)` for a physical shape.
    pub fn physical_layout(
        shape: &Shape,
        dtype: DType,
        scope: &MemoryScope,
    ) -> Result<(usize, usize), MemoryError> {
        let elem = dtype.size_bytes();
        let (nallocs, row_elems) = match shape.dims() {
            [] => (1, 1),
            [n] => (1, *n),
            [rows, cols] => (*rows, *cols),
            _ => {
                return Err(MemoryError::UnsupportedRank {
                    scope: scope.tag().to_string(),
                    rank: shape.rank(),
                })
            }
        };
        let block_bytes = row_elems
            .checked_mul(elem)
            .ok_or_else(|| TensorError::SizeOverflow {
                shape: shape.clone(),
            })?;
        if nallocs == 0 || block_bytes == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }
        // Total must also be representable.
        shape.size_bytes(dtype)?;
        Ok((nallocs, block_bytes))
    }

    /// Base address: the first byte of the first block.
    pub fn base_address(&self) -> DataPtr {
        DataPtr::new(self.blocks[0].as_ptr() as usize)
    }

    /// Total bytes across all blocks.
    pub fn size_bytes(&self) -> usize {
        self.blocks.iter().map(AlignedBlock::len).sum()
    }

    /// Physical layout.
    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    /// Element type hint.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Memory scope.
    pub fn scope(&self) -> &MemoryScope {
        &self.scope
    }

    /// Alignment of every block.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Number of separately allocated blocks.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// `true` if the buffer is a single block.
    pub fn is_contiguous(&self) -> bool {
        self.blocks.len() == 1
    }

    /// Scratch bytes held by this buffer (0 for general memory).
    pub fn scratch_bytes(&self) -> usize {
        self.lease.as_ref().map_or(0, ScratchLease::bytes)
    }

    /// Copies the first `bytes` of `src` into the first `bytes` of `self`,
    /// walking both sides block by block.
    pub fn copy_from(&self, src: &DeviceBuffer, bytes: usize) -> Result<(), MemoryError> {
        check_range(0, bytes, src.size_bytes())?;
        check_range(0, bytes, self.size_bytes())?;
        let _guards = self.lock_copy(src);
        // SAFETY: both region lists describe live blocks and cover `bytes`;
        // the guards exclude every other access to either buffer's bytes.
        unsafe { copy_regions(&src.regions(), &self.regions(), bytes) };
        Ok(())
    }

    /// Linear copy of `len` bytes between two contiguous buffers.
    pub fn copy_range_from(
        &self,
        dst_offset: usize,
        src: &DeviceBuffer,
        src_offset: usize,
        len: usize,
    ) -> Result<(), MemoryError> {
        if !src.is_contiguous() {
            return Err(MemoryError::NotContiguous(src.base_address()));
        }
        if !self.is_contiguous() {
            return Err(MemoryError::NotContiguous(self.base_address()));
        }
        check_range(src_offset, len, src.size_bytes())?;
        check_range(dst_offset, len, self.size_bytes())?;
        let _guards = self.lock_copy(src);
        // SAFETY: ranges were bounds-checked against single live blocks and
        // the guards exclude concurrent access.
        // `ptr::copy` tolerates overlap when src and dst are the same buffer.
        unsafe {
            std::ptr::copy(
                src.blocks[0].as_ptr().add(src_offset),
                self.blocks[0].as_ptr().add(dst_offset),
                len,
            );
        }
        Ok(())
    }

    /// Fills the start of the buffer from host memory.
    pub fn write_from_host(&self, data: &[u8]) -> Result<(), MemoryError> {
        check_range(0, data.len(), self.size_bytes())?;
        let src = [Region {
            ptr: data.as_ptr() as *mut u8,
            len: data.len(),
        }];
        let _guard = self.access.write();
        // SAFETY: the host region is only read; device regions are live and
        // exclusively locked.
        unsafe { copy_regions(&src, &self.regions(), data.len()) };
        Ok(())
    }

    /// Reads the start of the buffer into host memory.
    pub fn read_into_host(&self, out: &mut [u8]) -> Result<(), MemoryError> {
        check_range(0, out.len(), self.size_bytes())?;
        let dst = [Region {
            ptr: out.as_mut_ptr(),
            len: out.len(),
        }];
        let _guard = self.access.read();
        // SAFETY: `out` is exclusively borrowed; device regions are live and
        // no writer holds the lock.
        unsafe { copy_regions(&self.regions(), &dst, out.len()) };
        Ok(())
    }

    /// Locks `self` for writing and `src` for reading, lower base address
    /// first. A copy within one buffer takes a single write lock.
    fn lock_copy<'a>(
        &'a self,
        src: &'a DeviceBuffer,
    ) -> (RwLockWriteGuard<'a, ()>, Option<RwLockReadGuard<'a, ()>>) {
        if std::ptr::eq(self, src) {
            return (self.access.write(), None);
        }
        if src.base_address() < self.base_address() {
            let read = src.access.read();
            (self.access.write(), Some(read))
        } else {
            let write = self.access.write();
            (write, Some(src.access.read()))
        }
    }

    fn regions(&self) -> Vec<Region> {
        self.blocks
            .iter()
            .map(|b| Region {
                ptr: b.as_ptr(),
                len: b.len(),
            })
            .collect()
    }
}

impl std::fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("base", &self.base_address())
            .field("layout", &self.layout)
            .field("dtype", &self.dtype)
            .field("scope", &self.scope)
            .field("scratch_bytes", &self.scratch_bytes())
            .finish()
    }
}

fn check_alignment(alignment: usize) -> Result<(), MemoryError> {
    if alignment.is_power_of_two() {
        Ok(())
    } else {
        Err(MemoryError::InvalidAlignment { alignment })
    }
}

fn check_range(offset: usize, len: usize, size: usize) -> Result<(), MemoryError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(MemoryError::OutOfBounds { offset, len, size }),
    }
}

/// Copies `bytes` from the concatenation of `src` regions into the
/// concatenation of `dst` regions.
///
/// # Safety
/// Every region must be valid for its length and both lists must cover at
/// least `bytes`.
unsafe fn copy_regions(src: &[Region], dst: &[Region], bytes: usize) {
    let (mut si, mut so) = (0, 0);
    let (mut di, mut doff) = (0, 0);
    let mut remaining = bytes;
    while remaining > 0 {
        let s = src[si];
        let d = dst[di];
        let n = (s.len - so).min(d.len - doff).min(remaining);
        std::ptr::copy(s.ptr.add(so), d.ptr.add(doff), n);
        so += n;
        doff += n;
        remaining -= n;
        if so == s.len {
            si += 1;
            so = 0;
        }
        if doff == d.len {
            di += 1;
            doff = 0;
        }
    }
}
