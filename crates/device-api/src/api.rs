// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The device API facade.
//!
//! [`DeviceApi`] is the single entry point a tensor runtime talks to. It
//! validates the device on every call, then routes to one of three
//! collaborators:
//!
//! ```text
//!                    ┌──────────────────────┐
//!   allocate_* ────► │ BufferManager        │ registry, scratch region
//!   free_*           └──────────────────────┘
//!                    ┌──────────────────────┐
//!   copy* ─────────► │ copy engine          │ validate now, run inline
//!                    └──────────┬───────────┘ or queue on a stream
//!                               ▼
//!   *_stream ──────► ┌──────────────────────┐
//!   dispatch         │ StreamPool           │ over a WorkerPool
//!                    └──────────────────────┘
//! ```
//!
//! There is no global instance; callers own the facade and share it behind
//! an `Arc` when several threads use it.

use crate::copy::{self, PreparedCopy};
use crate::metrics::CopyCounters;
use crate::{
    AttrKind, AttrValue, DeviceApiConfig, DeviceApiError, DeviceMetrics, TensorDescriptor,
    WorkerPoolKind,
};
use memory_manager::{BufferId, BufferInfo, BufferManager, DataPtr, MemoryError};
use std::sync::Arc;
use stream_pool::{
    InlineWorkerPool, StreamHandle, StreamPool, StreamTarget, ThreadWorkerPool, WorkerPool,
};
use tensor_core::{DType, Device, DeviceKind, Shape};
use tracing::{debug, error};

/// Name reported by [`AttrKind::DeviceName`].
pub const DEVICE_NAME: &str = "hexagon";

/// Returns `true` for devices this backend serves.
pub fn is_valid_device(device: Device) -> bool {
    matches!(device.kind, DeviceKind::Hexagon | DeviceKind::Cpu)
}

/// The device API.
///
/// # Example
/// ```
/// use device_api::{DeviceApi, DeviceApiConfig, StreamTarget, TensorDescriptor, WorkerPoolKind};
/// use tensor_core::{DType, Device, Shape};
///
/// let api = DeviceApi::new(DeviceApiConfig {
///     worker_pool: WorkerPoolKind::Inline,
///     ..Default::default()
/// })
/// .unwrap();
/// let dev = Device::hexagon(0);
///
/// let shape = Shape::matrix(4, 256);
/// let a = api.allocate_nd(dev, &shape, DType::F32, None).unwrap();
/// let b = api.allocate_nd(dev, &shape, DType::F32, Some("global.vtcm")).unwrap();
/// assert_eq!(api.buffer_info(a).unwrap().size_bytes, 4096);
///
/// let from = TensorDescriptor::new(a, dev, shape.clone(), DType::F32);
/// let to = TensorDescriptor::new(b, dev, shape, DType::F32);
/// api.copy(&from, &to, StreamTarget::Inline).unwrap();
///
/// api.free(dev, a).unwrap();
/// api.free(dev, b).unwrap();
/// ```
pub struct DeviceApi {
    config: DeviceApiConfig,
    memory: BufferManager,
    streams: StreamPool,
    copies: CopyCounters,
}

impl DeviceApi {
    /// Builds a facade with the worker pool named by `config.worker_pool`.
    ///
    /// Worker threads are not started; call [`start`](Self::start).
    pub fn new(config: DeviceApiConfig) -> Result<Self, DeviceApiError> {
        config.validate()?;
        let sizing = config.worker_pool_config()?;
        let workers: Arc<dyn WorkerPool> = match config.worker_pool {
            WorkerPoolKind::Threads => Arc::new(ThreadWorkerPool::new(sizing)?),
            WorkerPoolKind::Inline => Arc::new(InlineWorkerPool::new(sizing)?),
        };
        Self::with_worker_pool(config, workers)
    }

    /// Builds a facade over a caller-provided worker pool.
    ///
    /// The pool's stream count takes precedence over `worker_threads`.
    pub fn with_worker_pool(
        config: DeviceApiConfig,
        workers: Arc<dyn WorkerPool>,
    ) -> Result<Self, DeviceApiError> {
        config.validate()?;
        let memory = BufferManager::new(
            config.parse_scratch_capacity()?,
            config.scope_table(),
            config.default_alignment,
        )?;
        tracing::info!(
            "device api created: {} worker pool with {} streams, scratch {}",
            workers.name(),
            workers.worker_count(),
            config.scratch_capacity
        );
        Ok(Self {
            config,
            memory,
            streams: StreamPool::new(workers),
            copies: CopyCounters::default(),
        })
    }

    // ── Device ────────────────────────────────────────────────

    /// Validates `device`. There is no per-thread device state to update.
    pub fn set_device(&self, device: Device) -> Result<(), DeviceApiError> {
        self.check_device(device)
    }

    /// Queries a device attribute.
    ///
    /// `Exist` reports 0 for a foreign device instead of failing.
    /// Unsupported attributes report `Int(0)`.
    pub fn get_attribute(&self, device: Device, kind: AttrKind) -> Result<AttrValue, DeviceApiError> {
        if !is_valid_device(device) {
            return match kind {
                AttrKind::Exist => Ok(AttrValue::Int(0)),
                _ => Err(DeviceApiError::InvalidDevice(device)),
            };
        }
        let value = match kind {
            AttrKind::Exist => AttrValue::Int(1),
            AttrKind::DeviceName => AttrValue::Str(DEVICE_NAME.to_string()),
            AttrKind::MultiProcessorCount => {
                AttrValue::Int(self.streams.worker_pool().worker_count() as i64)
            }
            AttrKind::MaxSharedMemoryPerBlock => {
                AttrValue::Int(self.memory.scratch().capacity() as i64)
            }
            _ => AttrValue::Int(0),
        };
        Ok(value)
    }

    /// Blocks until `stream` has drained.
    pub fn stream_synchronize(
        &self,
        device: Device,
        stream: StreamTarget,
    ) -> Result<(), DeviceApiError> {
        self.check_device(device)?;
        Ok(self.streams.synchronize(stream)?)
    }

    // ── Allocation ────────────────────────────────────────────

    /// Flat allocation of `bytes` aligned to `alignment`.
    pub fn allocate(
        &self,
        device: Device,
        bytes: usize,
        alignment: usize,
        dtype: DType,
    ) -> Result<BufferId, DeviceApiError> {
        self.check_device(device)?;
        Ok(self.memory.allocate_flat(device, bytes, alignment, dtype)?)
    }

    /// Releases a buffer of any kind.
    pub fn free(&self, device: Device, id: BufferId) -> Result<(), DeviceApiError> {
        self.check_device(device)?;
        self.check_owner(device, id)?;
        Ok(self.memory.free(id)?)
    }

    /// Flat scratch-pad allocation at the default alignment.
    pub fn allocate_workspace(
        &self,
        device: Device,
        bytes: usize,
        dtype: DType,
    ) -> Result<BufferId, DeviceApiError> {
        self.check_device(device)?;
        Ok(self.memory.allocate_workspace(device, bytes, dtype)?)
    }

    /// Releases a workspace buffer; other kinds are rejected untouched.
    pub fn free_workspace(&self, device: Device, id: BufferId) -> Result<(), DeviceApiError> {
        self.check_device(device)?;
        self.check_owner(device, id)?;
        Ok(self.memory.free_workspace(id)?)
    }

    /// Shape- and scope-aware allocation.
    pub fn allocate_nd(
        &self,
        device: Device,
        shape: &Shape,
        dtype: DType,
        scope: Option<&str>,
    ) -> Result<BufferId, DeviceApiError> {
        self.check_device(device)?;
        Ok(self.memory.allocate_nd(device, shape, dtype, scope)?)
    }

    /// Allocation in the scratch region.
    pub fn allocate_scratch(
        &self,
        device: Device,
        shape: &Shape,
        dtype: DType,
        scope: Option<&str>,
    ) -> Result<BufferId, DeviceApiError> {
        self.check_device(device)?;
        Ok(self.memory.allocate_scratch(device, shape, dtype, scope)?)
    }

    /// Releases a scratch buffer; other kinds are rejected untouched.
    ///
    /// Scratch capacity returns once no queued copy references the buffer.
    pub fn free_scratch(&self, device: Device, id: BufferId) -> Result<(), DeviceApiError> {
        self.check_device(device)?;
        self.check_owner(device, id)?;
        Ok(self.memory.free_scratch(id)?)
    }

    // ── Copies ────────────────────────────────────────────────

    /// Tensor-level copy. Validated now; runs inline or on `stream`.
    pub fn copy(
        &self,
        from: &TensorDescriptor,
        to: &TensorDescriptor,
        stream: StreamTarget,
    ) -> Result<(), DeviceApiError> {
        self.check_device(from.device)?;
        self.check_device(to.device)?;
        let prepared = copy::prepare_tensor_copy(&self.memory, from, to)?;
        self.submit(prepared, stream)
    }

    /// Byte-range copy between raw base addresses of contiguous global
    /// buffers.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_bytes(
        &self,
        from: DataPtr,
        from_offset: usize,
        to: DataPtr,
        to_offset: usize,
        size: usize,
        dev_from: Device,
        dev_to: Device,
        stream: StreamTarget,
    ) -> Result<(), DeviceApiError> {
        self.check_device(dev_from)?;
        self.check_device(dev_to)?;
        let prepared = copy::prepare_byte_copy(
            &self.memory,
            from,
            from_offset,
            to,
            to_offset,
            size,
            dev_from,
            dev_to,
        )?;
        self.submit(prepared, stream)
    }

    /// Copies host bytes into the buffer named by `to`. Synchronous.
    pub fn copy_from_host(&self, data: &[u8], to: &TensorDescriptor) -> Result<(), DeviceApiError> {
        self.check_device(to.device)?;
        let record = self.memory.resolve(to.data)?;
        let bytes = self.host_transfer_size(to, data.len())?;
        copy::check_descriptor(&record, to, bytes, "destination")?;
        record.buffer.write_from_host(data)?;
        self.copies.record_host(true, bytes);
        Ok(())
    }

    /// Copies the buffer named by `from` into host memory. Synchronous.
    ///
    /// Work already queued on streams is not waited for; synchronize first
    /// when the source is written by a stream. A copy in flight on the same
    /// buffer is never observed half done.
    pub fn copy_to_host(&self, from: &TensorDescriptor, out: &mut [u8]) -> Result<(), DeviceApiError> {
        self.check_device(from.device)?;
        let record = self.memory.resolve(from.data)?;
        let bytes = self.host_transfer_size(from, out.len())?;
        copy::check_descriptor(&record, from, bytes, "source")?;
        record.buffer.read_into_host(out)?;
        self.copies.record_host(false, bytes);
        Ok(())
    }

    // ── Streams ───────────────────────────────────────────────

    /// Assigns a free stream.
    pub fn create_stream(&self, device: Device) -> Result<StreamHandle, DeviceApiError> {
        self.check_device(device)?;
        Ok(self.streams.create_stream()?)
    }

    /// Returns an assigned stream to the pool.
    pub fn free_stream(&self, device: Device, stream: StreamHandle) -> Result<(), DeviceApiError> {
        self.check_device(device)?;
        Ok(self.streams.free_stream(stream)?)
    }

    /// Sets the active stream; `None` makes inline the active target.
    pub fn set_stream(
        &self,
        device: Device,
        stream: Option<StreamHandle>,
    ) -> Result<(), DeviceApiError> {
        self.check_device(device)?;
        Ok(self.streams.set_stream(stream)?)
    }

    /// Orders work already on `src` before work later queued on `dst`.
    pub fn sync_stream_from_to(
        &self,
        device: Device,
        src: StreamTarget,
        dst: StreamTarget,
    ) -> Result<(), DeviceApiError> {
        self.check_device(device)?;
        Ok(self.streams.sync_from_to(src, dst)?)
    }

    /// Runs `job` on `target`. Arguments travel inside the closure.
    pub fn dispatch<F>(
        &self,
        device: Device,
        job: F,
        target: StreamTarget,
    ) -> Result<(), DeviceApiError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.check_device(device)?;
        Ok(self.streams.dispatch(job, target)?)
    }

    /// Starts the worker pool. Idempotent.
    pub fn start(&self, device: Device) -> Result<(), DeviceApiError> {
        self.check_device(device)?;
        Ok(self.streams.start()?)
    }

    /// Finishes queued work and stops the worker pool.
    pub fn shutdown(&self) {
        self.streams.shutdown();
    }

    // ── Introspection ─────────────────────────────────────────

    /// Base address of a live buffer.
    pub fn base_address(&self, id: BufferId) -> Result<DataPtr, DeviceApiError> {
        Ok(self.memory.base_address(id)?)
    }

    /// Describes a live buffer.
    pub fn buffer_info(&self, id: BufferId) -> Result<BufferInfo, DeviceApiError> {
        Ok(self.memory.info(id)?)
    }

    /// Maps a raw base address back to its buffer.
    pub fn resolve_address(&self, address: DataPtr) -> Result<BufferId, DeviceApiError> {
        Ok(self.memory.lookup_address(address)?)
    }

    /// The active stream, if any.
    pub fn active_stream(&self) -> Option<StreamHandle> {
        self.streams.active_stream()
    }

    /// Whether the worker pool is running.
    pub fn is_started(&self) -> bool {
        self.streams.is_started()
    }

    /// The buffer manager behind the allocation entry points.
    pub fn memory(&self) -> &BufferManager {
        &self.memory
    }

    /// Configuration this facade was built from.
    pub fn config(&self) -> &DeviceApiConfig {
        &self.config
    }

    /// Snapshot of allocator, stream and copy counters.
    pub fn metrics(&self) -> DeviceMetrics {
        let scratch = self.memory.scratch();
        DeviceMetrics {
            worker_pool: self.streams.worker_pool().name().to_string(),
            started: self.streams.is_started(),
            live_buffers: self.memory.live_buffers(),
            scratch_capacity: scratch.capacity(),
            scratch_used: scratch.used_bytes(),
            scratch_peak: scratch.peak_bytes(),
            allocations: self.memory.stats(),
            streams: self.streams.stats(),
            copies: self.copies.snapshot(),
        }
    }

    fn check_device(&self, device: Device) -> Result<(), DeviceApiError> {
        if is_valid_device(device) {
            Ok(())
        } else {
            Err(DeviceApiError::InvalidDevice(device))
        }
    }

    fn check_owner(&self, device: Device, id: BufferId) -> Result<(), DeviceApiError> {
        let owner = self.memory.resolve(id)?.device;
        if owner != device {
            return Err(MemoryError::DeviceMismatch {
                id,
                owner,
                requested: device,
            }
            .into());
        }
        Ok(())
    }

    fn host_transfer_size(
        &self,
        desc: &TensorDescriptor,
        host_len: usize,
    ) -> Result<usize, DeviceApiError> {
        let bytes = desc.size_bytes()?;
        if bytes != host_len {
            return Err(DeviceApiError::IncompatibleCopy(format!(
                "host buffer is {host_len} bytes, tensor {} {} is {bytes} bytes",
                desc.shape, desc.dtype
            )));
        }
        Ok(bytes)
    }

    fn submit(&self, prepared: PreparedCopy, stream: StreamTarget) -> Result<(), DeviceApiError> {
        let (path, bytes) = (prepared.path(), prepared.bytes());
        match self.streams.resolve(stream)? {
            None => {
                prepared.run()?;
                self.copies.record_device(path, bytes, false);
            }
            Some(handle) => {
                self.streams.dispatch(
                    move || {
                        if let Err(e) = prepared.run() {
                            error!(stream = %handle, error = %e, "queued copy failed");
                        }
                    },
                    StreamTarget::Stream(handle),
                )?;
                self.copies.record_device(path, bytes, true);
                debug!(stream = %handle, bytes, ?path, "copy queued");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for DeviceApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceApi")
            .field("memory", &self.memory)
            .field("streams", &self.streams)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> DeviceApi {
        DeviceApi::new(DeviceApiConfig {
            worker_pool: WorkerPoolKind::Inline,
            worker_threads: 2,
            scratch_capacity: "16K".into(),
            ..Default::default()
        })
        .unwrap()
    }

    fn dev() -> Device {
        Device::hexagon(0)
    }

    #[test]
    fn test_device_validity() {
        assert!(is_valid_device(Device::hexagon(3)));
        assert!(is_valid_device(Device::cpu(0)));
        assert!(!is_valid_device(Device::new(DeviceKind::Cuda, 0)));
    }

    #[test]
    fn test_invalid_device_rejected_before_side_effects() {
        let a = api();
        let cuda = Device::new(DeviceKind::Cuda, 0);
        assert!(matches!(
            a.allocate(cuda, 64, 64, DType::U8),
            Err(DeviceApiError::InvalidDevice(_))
        ));
        assert!(a.create_stream(cuda).is_err());
        assert!(matches!(a.start(cuda), Err(DeviceApiError::InvalidDevice(_))));
        assert!(!a.is_started());

        let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = std::sync::Arc::clone(&ran);
        assert!(matches!(
            a.dispatch(
                cuda,
                move || flag.store(true, std::sync::atomic::Ordering::SeqCst),
                StreamTarget::Inline,
            ),
            Err(DeviceApiError::InvalidDevice(_))
        ));
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(a.metrics().live_buffers, 0);
        assert_eq!(a.metrics().streams.assigned, 0);
        assert_eq!(a.metrics().streams.inline_runs, 0);
    }

    #[test]
    fn test_attributes() {
        let a = api();
        assert_eq!(a.get_attribute(dev(), AttrKind::Exist).unwrap(), AttrValue::Int(1));
        assert_eq!(
            a.get_attribute(dev(), AttrKind::DeviceName).unwrap(),
            AttrValue::Str("hexagon".into())
        );
        assert_eq!(
            a.get_attribute(dev(), AttrKind::MultiProcessorCount).unwrap(),
            AttrValue::Int(2)
        );
        assert_eq!(
            a.get_attribute(dev(), AttrKind::MaxSharedMemoryPerBlock).unwrap(),
            AttrValue::Int(16 * 1024)
        );
        assert_eq!(a.get_attribute(dev(), AttrKind::WarpSize).unwrap(), AttrValue::Int(0));

        let cuda = Device::new(DeviceKind::Cuda, 0);
        assert_eq!(a.get_attribute(cuda, AttrKind::Exist).unwrap(), AttrValue::Int(0));
        assert!(a.get_attribute(cuda, AttrKind::DeviceName).is_err());
    }

    #[test]
    fn test_host_transfer_roundtrip_through_scratch() {
        let a = api();
        let shape = Shape::matrix(3, 5);
        let id = a.allocate_scratch(dev(), &shape, DType::U8, None).unwrap();
        let desc = TensorDescriptor::new(id, dev(), shape, DType::U8).with_scope("global.vtcm");

        let data: Vec<u8> = (100..115).collect();
        a.copy_from_host(&data, &desc).unwrap();
        let mut out = vec![0u8; 15];
        a.copy_to_host(&desc, &mut out).unwrap();
        assert_eq!(out, data);

        let m = a.metrics();
        assert_eq!(m.copies.host_to_device, 1);
        assert_eq!(m.copies.device_to_host, 1);
    }

    #[test]
    fn test_host_transfer_size_mismatch() {
        let a = api();
        let id = a.allocate(dev(), 16, 16, DType::U8).unwrap();
        let desc = TensorDescriptor::new(id, dev(), Shape::vector(16), DType::U8);
        assert!(a.copy_from_host(&[0; 8], &desc).is_err());
    }

    #[test]
    fn test_copy_on_stream_with_inline_pool() {
        let a = api();
        a.start(dev()).unwrap();
        let s = a.create_stream(dev()).unwrap();
        let x = a.allocate(dev(), 8, 8, DType::U8).unwrap();
        let y = a.allocate(dev(), 8, 8, DType::U8).unwrap();
        let dx = TensorDescriptor::new(x, dev(), Shape::vector(8), DType::U8);
        let dy = TensorDescriptor::new(y, dev(), Shape::vector(8), DType::U8);

        a.copy_from_host(&[3; 8], &dx).unwrap();
        a.copy(&dx, &dy, s.into()).unwrap();
        a.stream_synchronize(dev(), s.into()).unwrap();

        let mut out = [0u8; 8];
        a.copy_to_host(&dy, &mut out).unwrap();
        assert_eq!(out, [3; 8]);
        assert_eq!(a.metrics().copies.queued, 1);
    }

    #[test]
    fn test_free_from_other_device_is_rejected() {
        let a = api();
        let other = Device::hexagon(1);
        let flat = a.allocate(dev(), 64, 64, DType::U8).unwrap();
        let tile = a.allocate_scratch(dev(), &Shape::vector(64), DType::U8, None).unwrap();
        let ws = a.allocate_workspace(dev(), 64, DType::U8).unwrap();

        let err = a.free(other, flat).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
        assert!(a.free_scratch(other, tile).is_err());
        assert!(a.free_workspace(other, ws).is_err());
        assert_eq!(a.metrics().live_buffers, 3);

        a.free(dev(), flat).unwrap();
        a.free_scratch(dev(), tile).unwrap();
        a.free_workspace(dev(), ws).unwrap();
        assert_eq!(a.metrics().live_buffers, 0);
    }

    #[test]
    fn test_resolve_address() {
        let a = api();
        let id = a.allocate_workspace(dev(), 32, DType::U8).unwrap();
        let addr = a.base_address(id).unwrap();
        assert_eq!(a.resolve_address(addr).unwrap(), id);
        a.free_workspace(dev(), id).unwrap();
        assert!(a.resolve_address(addr).is_err());
    }
}
