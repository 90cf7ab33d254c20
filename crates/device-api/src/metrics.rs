// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device metrics.
//!
//! [`DeviceMetrics`] is a point-in-time snapshot combining allocator, stream
//! and copy counters. It serializes to JSON for the CLI's `--json` output.

use memory_manager::AllocationStats;
use std::sync::atomic::{AtomicU64, Ordering};
use stream_pool::StreamStats;

use crate::CopyPath;

/// Copy counters.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CopyStats {
    /// Device copies on the linear path.
    pub linear: u64,
    /// Device copies on the layout-aware path.
    pub layout_aware: u64,
    /// Host to device transfers.
    pub host_to_device: u64,
    /// Device to host transfers.
    pub device_to_host: u64,
    /// Copies queued on a stream rather than run inline.
    pub queued: u64,
    /// Total bytes moved or queued.
    pub bytes: u64,
}

#[derive(Debug, Default)]
pub(crate) struct CopyCounters {
    linear: AtomicU64,
    layout_aware: AtomicU64,
    host_to_device: AtomicU64,
    device_to_host: AtomicU64,
    queued: AtomicU64,
    bytes: AtomicU64,
}

impl CopyCounters {
    pub(crate) fn record_device(&self, path: CopyPath, bytes: usize, queued: bool) {
        match path {
            CopyPath::Linear => self.linear.fetch_add(1, Ordering::Relaxed),
            CopyPath::LayoutAware => self.layout_aware.fetch_add(1, Ordering::Relaxed),
        };
        if queued {
            self.queued.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_host(&self, to_device: bool, bytes: usize) {
        if to_device {
            self.host_to_device.fetch_add(1, Ordering::Relaxed);
        } else {
            self.device_to_host.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CopyStats {
        CopyStats {
            linear: self.linear.load(Ordering::Relaxed),
            layout_aware: self.layout_aware.load(Ordering::Relaxed),
            host_to_device: self.host_to_device.load(Ordering::Relaxed),
            device_to_host: self.device_to_host.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of everything the device layer counts.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeviceMetrics {
    /// Worker pool implementation name.
    pub worker_pool: String,
    /// Whether the worker pool is running.
    pub started: bool,
    /// Live registered buffers.
    pub live_buffers: usize,
    /// Scratch region capacity in bytes.
    pub scratch_capacity: usize,
    /// Scratch bytes in use.
    pub scratch_used: usize,
    /// Scratch high-water mark.
    pub scratch_peak: usize,
    pub allocations: AllocationStats,
    pub streams: StreamStats,
    pub copies: CopyStats,
}

impl DeviceMetrics {
    /// Scratch utilisation as a fraction in `[0.0, 1.0]`.
    pub fn scratch_utilisation(&self) -> f64 {
        if self.scratch_capacity == 0 {
            return 0.0;
        }
        self.scratch_used as f64 / self.scratch_capacity as f64
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        format!(
            "Device: {} pool ({}), {} live buffers, scratch {}/{} B ({:.0}%, peak {} B)\n\
             {}\n\
             Streams: {}/{} assigned, {} dispatched, {} inline, {} syncs, {} drains\n\
             Copies: {} linear, {} layout-aware, {} h2d, {} d2h, {} queued, {} bytes",
            self.worker_pool,
            if self.started { "running" } else { "stopped" },
            self.live_buffers,
            self.scratch_used,
            self.scratch_capacity,
            self.scratch_utilisation() * 100.0,
            self.scratch_peak,
            self.allocations.summary(),
            self.streams.assigned,
            self.streams.capacity,
            self.streams.dispatched,
            self.streams.inline_runs,
            self.streams.syncs,
            self.streams.drains,
            self.copies.linear,
            self.copies.layout_aware,
            self.copies.host_to_device,
            self.copies.device_to_host,
            self.copies.queued,
            self.copies.bytes,
        )
    }
}
