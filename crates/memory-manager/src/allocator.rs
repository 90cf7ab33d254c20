// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The buffer manager: every allocation policy over one registry.
//!
//! [`BufferManager`] owns the [`BufferRegistry`], the bounded
//! [`ScratchRegion`] and the [`ScopeTable`]. It implements four allocation
//! policies:
//!
//! 1. **Flat**: a contiguous block of `bytes` at a caller-chosen alignment.
//! 2. **Scoped/Nd**: global scope flattens the shape and allocates flat at
//!    the default alignment; a scratch scope keeps the physical shape and
//!    draws capacity from the scratch region.
//! 3. **Scratch**: always in the scratch region; never falls back to
//!    general memory.
//! 4. **Workspace**: flat at the default alignment, tagged so that only
//!    [`BufferManager::free_workspace`] or the generic `free` accept it.
//!
//! Storage is constructed before the registry lock is taken and inserted
//! under it, so a failed construction never leaves a registry entry and a
//! failed registration drops the storage again.
//!
//! # Thread Safety
//! `BufferManager` is `Send + Sync`. The registry and statistics share one
//! `parking_lot::Mutex`; scratch accounting has its own.

use crate::registry::{BufferId, BufferRegistry, DataPtr};
use crate::{
    AllocationStats, ByteSize, DeviceBuffer, MemoryError, MemoryScope, ScopeTable, ScratchRegion,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tensor_core::{DType, Device, Shape};
use tracing::debug;

/// Which allocation policy produced a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationKind {
    Flat,
    Scoped,
    Scratch,
    Workspace,
}

impl fmt::Display for AllocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AllocationKind::Flat => "flat",
            AllocationKind::Scoped => "scoped",
            AllocationKind::Scratch => "scratch",
            AllocationKind::Workspace => "workspace",
        };
        f.write_str(s)
    }
}

/// Registry entry: the allocation object and who asked for it.
#[derive(Debug, Clone)]
pub struct BufferRecord {
    /// Shared storage. Queued copies hold their own clone.
    pub buffer: Arc<DeviceBuffer>,
    /// Policy that produced the buffer.
    pub kind: AllocationKind,
    /// Device the buffer was allocated for.
    pub device: Device,
}

/// Serializable description of a live buffer.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BufferInfo {
    pub id: BufferId,
    pub address: DataPtr,
    pub kind: AllocationKind,
    pub device: Device,
    pub scope: String,
    pub dtype: DType,
    pub size_bytes: usize,
    pub num_blocks: usize,
    pub alignment: usize,
    pub contiguous: bool,
}

struct ManagerState {
    registry: BufferRegistry<BufferRecord>,
    stats: AllocationStats,
}

/// Allocates, tracks and releases device buffers.
pub struct BufferManager {
    scopes: ScopeTable,
    scratch: ScratchRegion,
    default_alignment: usize,
    state: Mutex<ManagerState>,
}

impl BufferManager {
    /// Creates a manager with a scratch region of `scratch_capacity`.
    ///
    /// Fails if `default_alignment` is not a power of two.
    pub fn new(
        scratch_capacity: ByteSize,
        scopes: ScopeTable,
        default_alignment: usize,
    ) -> Result<Self, MemoryError> {
        if !default_alignment.is_power_of_two() {
            return Err(MemoryError::InvalidAlignment {
                alignment: default_alignment,
            });
        }
        Ok(Self {
            scopes,
            scratch: ScratchRegion::new(scratch_capacity),
            default_alignment,
            state: Mutex::new(ManagerState {
                registry: BufferRegistry::new(),
                stats: AllocationStats::default(),
            }),
        })
    }

    /// Flat allocation of `bytes` aligned to `alignment`.
    pub fn allocate_flat(
        &self,
        device: Device,
        bytes: usize,
        alignment: usize,
        dtype: DType,
    ) -> Result<BufferId, MemoryError> {
        let result = DeviceBuffer::flat(bytes, alignment, dtype)
            .and_then(|buffer| self.insert(device, buffer, AllocationKind::Flat));
        self.track(result)
    }

    /// Shape- and scope-aware allocation.
    ///
    /// Unset or `"global"` scope flattens `shape` and allocates flat at the
    /// default alignment. A scratch scope keeps the physical shape (rank 2
    /// or less) and is charged to the scratch region.
    pub fn allocate_nd(
        &self,
        device: Device,
        shape: &Shape,
        dtype: DType,
        scope: Option<&str>,
    ) -> Result<BufferId, MemoryError> {
        let result = self.scopes.resolve(scope).and_then(|scope| match scope {
            MemoryScope::Global => {
                let bytes = shape.size_bytes(dtype)?;
                let buffer = DeviceBuffer::flat(bytes, self.default_alignment, dtype)?;
                self.insert(device, buffer, AllocationKind::Scoped)
            }
            scratch @ MemoryScope::Scratch(_) => {
                let buffer = self.build_scratch(shape, dtype, scratch)?;
                self.insert(device, buffer, AllocationKind::Scoped)
            }
        });
        self.track(result)
    }

    /// Allocation in the scratch region. `scope` defaults to the first
    /// configured scratch tag and must name a scratch scope if given.
    pub fn allocate_scratch(
        &self,
        device: Device,
        shape: &Shape,
        dtype: DType,
        scope: Option<&str>,
    ) -> Result<BufferId, MemoryError> {
        let result = self
            .scopes
            .resolve_scratch(scope)
            .and_then(|scope| self.build_scratch(shape, dtype, scope))
            .and_then(|buffer| self.insert(device, buffer, AllocationKind::Scratch));
        self.track(result)
    }

    /// Flat scratch-pad allocation at the default alignment.
    pub fn allocate_workspace(
        &self,
        device: Device,
        bytes: usize,
        dtype: DType,
    ) -> Result<BufferId, MemoryError> {
        let result = DeviceBuffer::flat(bytes, self.default_alignment, dtype)
            .and_then(|buffer| self.insert(device, buffer, AllocationKind::Workspace));
        self.track(result)
    }

    /// Releases a buffer of any kind.
    pub fn free(&self, id: BufferId) -> Result<(), MemoryError> {
        let record = {
            let mut state = self.state.lock();
            let record = state.registry.unregister(id)?;
            state.stats.record_deallocation(record.buffer.size_bytes());
            record
        };
        debug!(%id, kind = %record.kind, "freed buffer");
        // Storage (and any scratch lease) goes once queued copies are done.
        drop(record);
        Ok(())
    }

    /// Releases a buffer produced by [`allocate_scratch`](Self::allocate_scratch).
    ///
    /// The handle and address are gone on return. The scratch capacity comes
    /// back when the storage is dropped, which waits for any copy still
    /// queued against the buffer; synchronize its stream first to reuse the
    /// capacity at once.
    pub fn free_scratch(&self, id: BufferId) -> Result<(), MemoryError> {
        self.free_kind(id, AllocationKind::Scratch)
    }

    /// Releases a buffer produced by [`allocate_workspace`](Self::allocate_workspace).
    pub fn free_workspace(&self, id: BufferId) -> Result<(), MemoryError> {
        self.free_kind(id, AllocationKind::Workspace)
    }

    /// Returns a clone of the registry entry for `id`.
    pub fn resolve(&self, id: BufferId) -> Result<BufferRecord, MemoryError> {
        self.state.lock().registry.resolve(id).cloned()
    }

    /// Maps a raw base address back to its buffer.
    pub fn lookup_address(&self, address: DataPtr) -> Result<BufferId, MemoryError> {
        self.state.lock().registry.lookup_address(address)
    }

    /// Returns the base address of `id`.
    pub fn base_address(&self, id: BufferId) -> Result<DataPtr, MemoryError> {
        self.state.lock().registry.address_of(id)
    }

    /// Describes a live buffer.
    pub fn info(&self, id: BufferId) -> Result<BufferInfo, MemoryError> {
        let record = self.resolve(id)?;
        let buffer = &record.buffer;
        Ok(BufferInfo {
            id,
            address: buffer.base_address(),
            kind: record.kind,
            device: record.device,
            scope: buffer.scope().tag().to_string(),
            dtype: buffer.dtype(),
            size_bytes: buffer.size_bytes(),
            num_blocks: buffer.num_blocks(),
            alignment: buffer.alignment(),
            contiguous: buffer.is_contiguous(),
        })
    }

    /// Number of live buffers.
    pub fn live_buffers(&self) -> usize {
        self.state.lock().registry.len()
    }

    /// Returns a snapshot of allocation statistics.
    pub fn stats(&self) -> AllocationStats {
        self.state.lock().stats.clone()
    }

    /// The recognised scopes.
    pub fn scopes(&self) -> &ScopeTable {
        &self.scopes
    }

    /// The scratch region.
    pub fn scratch(&self) -> &ScratchRegion {
        &self.scratch
    }

    /// Alignment used by Nd-global and workspace allocations.
    pub fn default_alignment(&self) -> usize {
        self.default_alignment
    }

    fn build_scratch(
        &self,
        shape: &Shape,
        dtype: DType,
        scope: MemoryScope,
    ) -> Result<DeviceBuffer, MemoryError> {
        let (nallocs, block_bytes) = DeviceBuffer::physical_layout(shape, dtype, &scope)?;
        let lease = self.scratch.reserve(nallocs * block_bytes)?;
        DeviceBuffer::nd(shape, dtype, scope, self.default_alignment, Some(lease))
    }

    fn insert(
        &self,
        device: Device,
        buffer: DeviceBuffer,
        kind: AllocationKind,
    ) -> Result<BufferId, MemoryError> {
        let address = buffer.base_address();
        let bytes = buffer.size_bytes();
        let scope = buffer.scope().tag().to_string();
        let record = BufferRecord {
            buffer: Arc::new(buffer),
            kind,
            device,
        };

        let mut state = self.state.lock();
        let id = state.registry.register(address, record)?;
        state.stats.record_allocation(kind, bytes);
        drop(state);

        debug!(%id, %address, %kind, bytes, scope = %scope, %device, "allocated buffer");
        Ok(id)
    }

    fn free_kind(&self, id: BufferId, expected: AllocationKind) -> Result<(), MemoryError> {
        let record = {
            let mut state = self.state.lock();
            let actual = state.registry.resolve(id)?.kind;
            if actual != expected {
                return Err(MemoryError::KindMismatch {
                    id,
                    expected,
                    actual,
                });
            }
            let record = state.registry.unregister(id)?;
            state.stats.record_deallocation(record.buffer.size_bytes());
            record
        };
        debug!(%id, kind = %record.kind, "freed buffer");
        drop(record);
        Ok(())
    }

    fn track(&self, result: Result<BufferId, MemoryError>) -> Result<BufferId, MemoryError> {
        if let Err(ref e) = result {
            let mut state = self.state.lock();
            match e {
                MemoryError::ScratchExhausted { .. } => state.stats.record_scratch_exhausted(),
                _ => state.stats.record_failure(),
            }
            debug!(error = %e, "allocation failed");
        }
        result
    }
}

impl fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferManager")
            .field("scopes", &self.scopes)
            .field("scratch", &self.scratch)
            .field("default_alignment", &self.default_alignment)
            .field("live_buffers", &self.live_buffers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> BufferManager {
        BufferManager::new(ByteSize::from_kb(64), ScopeTable::default(), 2048).unwrap()
    }

    fn dev() -> Device {
        Device::hexagon(0)
    }

    #[test]
    fn test_flat_allocation() {
        let m = manager();
        let id = m.allocate_flat(dev(), 1024, 64, DType::U8).unwrap();
        let info = m.info(id).unwrap();
        assert_eq!(info.size_bytes, 1024);
        assert_eq!(info.address.as_usize() % 64, 0);
        assert_eq!(info.kind, AllocationKind::Flat);
        assert_eq!(m.lookup_address(info.address).unwrap(), id);
    }

    #[test]
    fn test_free_then_free_again_is_unknown() {
        let m = manager();
        let id = m.allocate_flat(dev(), 1024, 64, DType::U8).unwrap();
        let addr = m.base_address(id).unwrap();
        m.free(id).unwrap();
        assert!(matches!(m.lookup_address(addr), Err(MemoryError::UnknownAddress(_))));
        assert!(matches!(m.free(id), Err(MemoryError::UnknownBuffer(_))));
        assert_eq!(m.live_buffers(), 0);
    }

    #[test]
    fn test_nd_global_is_flattened() {
        let m = manager();
        let id = m
            .allocate_nd(dev(), &Shape::matrix(4, 256), DType::F32, Some("global"))
            .unwrap();
        let info = m.info(id).unwrap();
        assert_eq!(info.size_bytes, 4096);
        assert!(info.contiguous);
        assert_eq!(info.alignment, 2048);
        assert_eq!(info.scope, "global");

        // Any rank is fine for the global scope.
        let id3 = m
            .allocate_nd(dev(), &Shape::new(vec![2, 3, 4]), DType::I8, None)
            .unwrap();
        assert_eq!(m.info(id3).unwrap().size_bytes, 24);
    }

    #[test]
    fn test_nd_scratch_scope_keeps_blocks() {
        let m = manager();
        let id = m
            .allocate_nd(dev(), &Shape::matrix(4, 8), DType::F32, Some("global.vtcm"))
            .unwrap();
        let info = m.info(id).unwrap();
        assert_eq!(info.num_blocks, 4);
        assert!(!info.contiguous);
        assert_eq!(info.kind, AllocationKind::Scoped);
        assert_eq!(m.scratch().used_bytes(), 128);

        m.free(id).unwrap();
        assert_eq!(m.scratch().used_bytes(), 0);
    }

    #[test]
    fn test_nd_rejects_rank_three_and_unknown_scope() {
        let m = manager();
        let r = m.allocate_nd(dev(), &Shape::new(vec![2, 2, 2]), DType::U8, Some("global.vtcm"));
        assert!(matches!(r, Err(MemoryError::UnsupportedRank { rank: 3, .. })));
        let r = m.allocate_nd(dev(), &Shape::vector(4), DType::U8, Some("texture"));
        assert!(matches!(r, Err(MemoryError::UnknownScope { .. })));
        assert_eq!(m.live_buffers(), 0);
        assert_eq!(m.stats().failed_allocations, 2);
    }

    #[test]
    fn test_scratch_exhaustion_is_not_redirected() {
        let m = BufferManager::new(ByteSize::from_kb(1), ScopeTable::default(), 64).unwrap();
        let r = m.allocate_scratch(dev(), &Shape::vector(2048), DType::U8, None);
        assert!(matches!(r, Err(MemoryError::ScratchExhausted { .. })));
        assert_eq!(m.live_buffers(), 0);
        assert_eq!(m.scratch().used_bytes(), 0);
        assert_eq!(m.stats().scratch_exhausted, 1);
    }

    #[test]
    fn test_scratch_rejects_global_scope() {
        let m = manager();
        let r = m.allocate_scratch(dev(), &Shape::vector(8), DType::U8, Some("global"));
        assert!(matches!(r, Err(MemoryError::NotScratchScope { .. })));
    }

    #[test]
    fn test_free_scratch_kind_checked() {
        let m = manager();
        let flat = m.allocate_flat(dev(), 64, 64, DType::U8).unwrap();
        let r = m.free_scratch(flat);
        assert!(matches!(r, Err(MemoryError::KindMismatch { .. })));
        // No side effect.
        assert!(m.resolve(flat).is_ok());

        let s = m.allocate_scratch(dev(), &Shape::vector(64), DType::U8, None).unwrap();
        assert_eq!(m.scratch().used_bytes(), 64);
        m.free_scratch(s).unwrap();
        assert_eq!(m.scratch().used_bytes(), 0);
    }

    #[test]
    fn test_scratch_capacity_follows_last_reference() {
        let m = BufferManager::new(ByteSize::from_kb(1), ScopeTable::default(), 64).unwrap();
        let s = m.allocate_scratch(dev(), &Shape::vector(1024), DType::U8, None).unwrap();
        let pending = m.resolve(s).unwrap();
        m.free_scratch(s).unwrap();

        assert!(m.resolve(s).is_err());
        assert_eq!(m.scratch().used_bytes(), 1024);
        assert!(matches!(
            m.allocate_scratch(dev(), &Shape::vector(1024), DType::U8, None),
            Err(MemoryError::ScratchExhausted { .. })
        ));

        drop(pending);
        assert_eq!(m.scratch().used_bytes(), 0);
        assert!(m.allocate_scratch(dev(), &Shape::vector(1024), DType::U8, None).is_ok());
    }

    #[test]
    fn test_workspace_roundtrip() {
        let m = manager();
        let w = m.allocate_workspace(dev(), 100, DType::U8).unwrap();
        let info = m.info(w).unwrap();
        assert_eq!(info.kind, AllocationKind::Workspace);
        assert_eq!(info.alignment, 2048);
        assert!(matches!(
            m.free_scratch(w),
            Err(MemoryError::KindMismatch { .. })
        ));
        m.free_workspace(w).unwrap();
        assert!(m.free_workspace(w).is_err());
    }

    #[test]
    fn test_generic_free_accepts_any_kind() {
        let m = manager();
        let s = m.allocate_scratch(dev(), &Shape::scalar(), DType::F32, None).unwrap();
        let w = m.allocate_workspace(dev(), 16, DType::U8).unwrap();
        m.free(s).unwrap();
        m.free(w).unwrap();
        assert_eq!(m.stats().total_deallocations, 2);
    }

    #[test]
    fn test_live_addresses_unique() {
        let m = manager();
        let ids: Vec<_> = (0..16)
            .map(|i| m.allocate_flat(dev(), 32 + i, 16, DType::U8).unwrap())
            .collect();
        let mut addrs: Vec<_> = ids.iter().map(|id| m.base_address(*id).unwrap()).collect();
        addrs.sort();
        addrs.dedup();
        assert_eq!(addrs.len(), 16);
    }

    #[test]
    fn test_zero_size_and_bad_alignment() {
        let m = manager();
        assert!(matches!(
            m.allocate_flat(dev(), 0, 64, DType::U8),
            Err(MemoryError::ZeroSizedAllocation)
        ));
        assert!(matches!(
            m.allocate_flat(dev(), 8, 3, DType::U8),
            Err(MemoryError::InvalidAlignment { alignment: 3 })
        ));
        assert!(BufferManager::new(ByteSize::from_kb(1), ScopeTable::default(), 100).is_err());
    }

    #[test]
    fn test_record_keeps_storage_alive_after_free() {
        let m = manager();
        let id = m.allocate_flat(dev(), 8, 8, DType::U8).unwrap();
        let record = m.resolve(id).unwrap();
        record.buffer.write_from_host(&[7; 8]).unwrap();
        m.free(id).unwrap();

        let mut out = [0u8; 8];
        record.buffer.read_into_host(&mut out).unwrap();
        assert_eq!(out, [7; 8]);
    }
}
