// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bounded scratch (fast-memory) region accounting.
//!
//! The [`ScratchRegion`] models the small low-latency memory local to the
//! DSP. It:
//!
//! 1. Enforces a hard capacity. Requests that do not fit fail with
//!    [`MemoryError::ScratchExhausted`]; they are never redirected to
//!    general memory.
//! 2. Hands out [`ScratchLease`]s. A lease is the RAII token for reserved
//!    capacity and gives it back when dropped, so capacity returns exactly
//!    when the storage it accounts for is released.
//!
//! ```text
//! ScratchRegion::reserve(bytes)
//!       │
//!       ▼
//!   ScratchLease  ◄─── held by the DeviceBuffer it pays for
//!       │
//!       │  drop()
//!       ▼
//!   RegionInner::release()  ──► used -= bytes
//! ```

use crate::{ByteSize, MemoryError};
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared region state; leases hold an `Arc` to it.
struct RegionInner {
    capacity: usize,
    usage: Mutex<Usage>,
}

#[derive(Debug, Default)]
struct Usage {
    used: usize,
    peak: usize,
}

impl RegionInner {
    fn release(&self, bytes: usize) {
        let mut usage = self.usage.lock();
        usage.used = usage.used.saturating_sub(bytes);
        tracing::trace!(bytes, used = usage.used, "scratch capacity released");
    }
}

/// The bounded scratch region.
///
/// # Example
/// ```
/// use memory_manager::{ByteSize, ScratchRegion};
///
/// let region = ScratchRegion::new(ByteSize::from_kb(4));
/// let lease = region.reserve(3 * 1024).unwrap();
/// assert!(region.reserve(2 * 1024).is_err());
///
/// drop(lease);
/// assert_eq!(region.used_bytes(), 0);
/// ```
#[derive(Clone)]
pub struct ScratchRegion {
    inner: Arc<RegionInner>,
}

impl ScratchRegion {
    /// Creates a region with the given capacity.
    pub fn new(capacity: ByteSize) -> Self {
        Self {
            inner: Arc::new(RegionInner {
                capacity: capacity.as_bytes(),
                usage: Mutex::new(Usage::default()),
            }),
        }
    }

    /// Reserves `bytes` of capacity.
    pub fn reserve(&self, bytes: usize) -> Result<ScratchLease, MemoryError> {
        let mut usage = self.inner.usage.lock();
        let available = self.inner.capacity - usage.used;
        if bytes > available {
            return Err(MemoryError::ScratchExhausted {
                requested: bytes,
                available,
                capacity: self.inner.capacity,
            });
        }
        usage.used += bytes;
        usage.peak = usage.peak.max(usage.used);
        Ok(ScratchLease {
            region: Arc::clone(&self.inner),
            bytes,
        })
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Bytes currently reserved.
    pub fn used_bytes(&self) -> usize {
        self.inner.usage.lock().used
    }

    /// Bytes still available.
    pub fn available_bytes(&self) -> usize {
        self.inner.capacity - self.used_bytes()
    }

    /// High-water mark of reserved bytes.
    pub fn peak_bytes(&self) -> usize {
        self.inner.usage.lock().peak
    }
}

impl std::fmt::Debug for ScratchRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchRegion")
            .field("capacity", &self.capacity())
            .field("used_bytes", &self.used_bytes())
            .finish()
    }
}

/// Reserved scratch capacity, returned to the region on drop.
pub struct ScratchLease {
    region: Arc<RegionInner>,
    bytes: usize,
}

impl ScratchLease {
    /// Number of bytes this lease accounts for.
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for ScratchLease {
    fn drop(&mut self) {
        self.region.release(self.bytes);
    }
}

impl std::fmt::Debug for ScratchLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchLease")
            .field("bytes", &self.bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_release() {
        let region = ScratchRegion::new(ByteSize::from_kb(1));
        let lease = region.reserve(512).unwrap();
        assert_eq!(lease.bytes(), 512);
        assert_eq!(region.used_bytes(), 512);
        assert_eq!(region.available_bytes(), 512);

        drop(lease);
        assert_eq!(region.used_bytes(), 0);
    }

    #[test]
    fn test_exhausted() {
        let region = ScratchRegion::new(ByteSize::from_bytes(1024));
        let _a = region.reserve(512).unwrap();
        let _b = region.reserve(512).unwrap();

        let result = region.reserve(1);
        assert!(matches!(
            result,
            Err(MemoryError::ScratchExhausted {
                requested: 1,
                available: 0,
                capacity: 1024
            })
        ));
    }

    #[test]
    fn test_request_larger_than_capacity() {
        let region = ScratchRegion::new(ByteSize::from_kb(4));
        assert!(region.reserve(4 * 1024 + 1).is_err());
        assert_eq!(region.used_bytes(), 0);
    }

    #[test]
    fn test_peak_tracking() {
        let region = ScratchRegion::new(ByteSize::from_kb(4));
        let a = region.reserve(1000).unwrap();
        let b = region.reserve(2000).unwrap();
        drop(a);
        drop(b);
        assert_eq!(region.peak_bytes(), 3000);
        assert_eq!(region.used_bytes(), 0);
    }

    #[test]
    fn test_clone_shares_accounting() {
        let region = ScratchRegion::new(ByteSize::from_kb(1));
        let other = region.clone();
        let _lease = other.reserve(1024).unwrap();
        assert_eq!(region.available_bytes(), 0);
    }
}
