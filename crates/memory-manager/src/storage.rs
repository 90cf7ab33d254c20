// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Aligned, zero-initialised host blocks backing device buffers.

use crate::MemoryError;
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// One contiguous heap block with a caller-chosen alignment.
pub(crate) struct AlignedBlock {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl AlignedBlock {
    /// Allocates `bytes` zeroed bytes aligned to `alignment`.
    ///
    /// `bytes` must be non-zero and `alignment` a power of two; callers
    /// validate both before getting here.
    pub(crate) fn zeroed(bytes: usize, alignment: usize) -> Result<Self, MemoryError> {
        debug_assert!(bytes > 0);
        let layout = Layout::from_size_align(bytes, alignment)
            .map_err(|_| MemoryError::InvalidAlignment { alignment })?;
        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(MemoryError::AllocationFailed { bytes, alignment })?;
        Ok(Self { ptr, layout })
    }

    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub(crate) fn len(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for AlignedBlock {
    fn drop(&mut self) {
        // SAFETY: ptr was returned by alloc_zeroed with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

// The block exclusively owns its allocation. Its bytes are only touched
// through `DeviceBuffer`, which serialises access with its own lock.
unsafe impl Send for AlignedBlock {}
unsafe impl Sync for AlignedBlock {}
