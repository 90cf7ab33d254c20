// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation statistics for profiling and diagnostics.
//!
//! [`AllocationStats`] tracks cumulative metrics about how the buffer
//! manager is being used: per-kind allocation counts, live and peak bytes,
//! and scratch exhaustion events. Useful for sizing the scratch region.

use crate::AllocationKind;

/// Cumulative statistics about buffer manager usage.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AllocationStats {
    /// Total number of successful allocations.
    pub total_allocations: u64,
    /// Flat allocations.
    pub flat_allocations: u64,
    /// Shape/scope-aware allocations.
    pub scoped_allocations: u64,
    /// Scratch allocations.
    pub scratch_allocations: u64,
    /// Workspace allocations.
    pub workspace_allocations: u64,
    /// Total number of frees.
    pub total_deallocations: u64,
    /// Allocation requests that failed for any reason.
    pub failed_allocations: u64,
    /// Requests rejected because the scratch region was full.
    pub scratch_exhausted: u64,
    /// Bytes currently held by live buffers.
    pub live_bytes: usize,
    /// High-water mark of `live_bytes`.
    pub peak_live_bytes: usize,
    /// Total bytes ever allocated.
    pub cumulative_allocated_bytes: u64,
}

impl AllocationStats {
    /// Records a successful allocation of `bytes`.
    pub(crate) fn record_allocation(&mut self, kind: AllocationKind, bytes: usize) {
        self.total_allocations += 1;
        match kind {
            AllocationKind::Flat => self.flat_allocations += 1,
            AllocationKind::Scoped => self.scoped_allocations += 1,
            AllocationKind::Scratch => self.scratch_allocations += 1,
            AllocationKind::Workspace => self.workspace_allocations += 1,
        }
        self.cumulative_allocated_bytes += bytes as u64;
        self.live_bytes += bytes;
        if self.live_bytes > self.peak_live_bytes {
            self.peak_live_bytes = self.live_bytes;
        }
    }

    /// Records a free of a buffer holding `bytes`.
    pub(crate) fn record_deallocation(&mut self, bytes: usize) {
        self.total_deallocations += 1;
        self.live_bytes = self.live_bytes.saturating_sub(bytes);
    }

    /// Records a failed allocation request.
    pub(crate) fn record_failure(&mut self) {
        self.failed_allocations += 1;
    }

    /// Records a request rejected by the scratch region.
    pub(crate) fn record_scratch_exhausted(&mut self) {
        self.failed_allocations += 1;
        self.scratch_exhausted += 1;
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        let peak_kb = self.peak_live_bytes as f64 / 1024.0;
        format!(
            "Allocations: {} total ({} flat, {} scoped, {} scratch, {} workspace), \
             {} failed ({} scratch exhausted), {} deallocations, peak {:.1} KB",
            self.total_allocations,
            self.flat_allocations,
            self.scoped_allocations,
            self.scratch_allocations,
            self.workspace_allocations,
            self.failed_allocations,
            self.scratch_exhausted,
            self.total_deallocations,
            peak_kb,
        )
    }
}
