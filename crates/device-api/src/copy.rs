// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The copy engine.
//!
//! Copies are validated against the registry on the calling thread and
//! turned into a [`PreparedCopy`], which holds its own references to both
//! endpoints. Running it is infallible in practice and may happen later on
//! a stream worker, even after the caller freed the handles.
//!
//! Path selection:
//!
//! | source scope | destination scope | path |
//! |---|---|---|
//! | global | global | [`CopyPath::Linear`] |
//! | scratch | any | [`CopyPath::LayoutAware`] |
//! | any | scratch | [`CopyPath::LayoutAware`] |

use crate::{DeviceApiError, TensorDescriptor};
use memory_manager::{BufferManager, BufferRecord, DataPtr, DeviceBuffer, MemoryScope};
use std::sync::Arc;
use tensor_core::Device;
use tracing::trace;

/// How bytes are moved between two buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyPath {
    /// One contiguous range to another.
    Linear,
    /// Block by block, honouring each side's physical layout.
    LayoutAware,
}

/// Picks the copy path from the registered scopes of both endpoints.
pub fn select_path(src: &MemoryScope, dst: &MemoryScope) -> CopyPath {
    if src.is_global() && dst.is_global() {
        CopyPath::Linear
    } else {
        CopyPath::LayoutAware
    }
}

#[derive(Debug)]
enum CopyOp {
    Whole { bytes: usize },
    Range {
        src_offset: usize,
        dst_offset: usize,
        len: usize,
    },
}

/// A validated copy, ready to run.
#[derive(Debug)]
pub struct PreparedCopy {
    src: Arc<DeviceBuffer>,
    dst: Arc<DeviceBuffer>,
    op: CopyOp,
    path: CopyPath,
}

impl PreparedCopy {
    /// Path chosen for this copy.
    pub fn path(&self) -> CopyPath {
        self.path
    }

    /// Bytes this copy moves.
    pub fn bytes(&self) -> usize {
        match self.op {
            CopyOp::Whole { bytes } => bytes,
            CopyOp::Range { len, .. } => len,
        }
    }

    /// Moves the bytes.
    pub fn run(&self) -> Result<(), DeviceApiError> {
        trace!(path = ?self.path, bytes = self.bytes(), "running copy");
        match (&self.op, self.path) {
            (CopyOp::Whole { bytes }, CopyPath::Linear) => {
                self.dst.copy_range_from(0, &self.src, 0, *bytes)?
            }
            (CopyOp::Whole { bytes }, CopyPath::LayoutAware) => {
                self.dst.copy_from(&self.src, *bytes)?
            }
            (
                CopyOp::Range {
                    src_offset,
                    dst_offset,
                    len,
                },
                _,
            ) => self
                .dst
                .copy_range_from(*dst_offset, &self.src, *src_offset, *len)?,
        }
        Ok(())
    }
}

/// Validates a tensor-level copy.
///
/// Devices are assumed already checked for validity by the caller.
pub fn prepare_tensor_copy(
    memory: &BufferManager,
    from: &TensorDescriptor,
    to: &TensorDescriptor,
) -> Result<PreparedCopy, DeviceApiError> {
    let bytes = from.size_bytes()?;
    let to_bytes = to.size_bytes()?;
    if bytes != to_bytes {
        return Err(DeviceApiError::IncompatibleCopy(format!(
            "source is {bytes} bytes ({} {}), destination is {to_bytes} bytes ({} {})",
            from.shape, from.dtype, to.shape, to.dtype
        )));
    }

    let src = memory.resolve(from.data)?;
    let dst = memory.resolve(to.data)?;
    check_descriptor(&src, from, bytes, "source")?;
    check_descriptor(&dst, to, bytes, "destination")?;

    let path = select_path(src.buffer.scope(), dst.buffer.scope());
    trace!(src = %from.data, dst = %to.data, bytes, ?path, "tensor copy prepared");
    Ok(PreparedCopy {
        src: src.buffer,
        dst: dst.buffer,
        op: CopyOp::Whole { bytes },
        path,
    })
}

/// Validates a byte-range copy between raw base addresses.
#[allow(clippy::too_many_arguments)]
pub fn prepare_byte_copy(
    memory: &BufferManager,
    from: DataPtr,
    from_offset: usize,
    to: DataPtr,
    to_offset: usize,
    size: usize,
    dev_from: Device,
    dev_to: Device,
) -> Result<PreparedCopy, DeviceApiError> {
    let src = memory.resolve(memory.lookup_address(from)?)?;
    let dst = memory.resolve(memory.lookup_address(to)?)?;

    for (record, device, side) in [(&src, dev_from, "source"), (&dst, dev_to, "destination")] {
        if record.device != device {
            return Err(DeviceApiError::IncompatibleCopy(format!(
                "{side} buffer belongs to {}, not {device}",
                record.device
            )));
        }
        if !record.buffer.scope().is_global() || !record.buffer.is_contiguous() {
            return Err(DeviceApiError::IncompatibleCopy(format!(
                "{side} buffer at {} is not a contiguous global buffer",
                record.buffer.base_address()
            )));
        }
    }
    check_range(from_offset, size, src.buffer.size_bytes(), "source")?;
    check_range(to_offset, size, dst.buffer.size_bytes(), "destination")?;

    trace!(%from, %to, size, "byte copy prepared");
    Ok(PreparedCopy {
        src: src.buffer,
        dst: dst.buffer,
        op: CopyOp::Range {
            src_offset: from_offset,
            dst_offset: to_offset,
            len: size,
        },
        path: CopyPath::Linear,
    })
}

/// Checks that `desc` is a valid view of `record` covering `bytes`.
pub(crate) fn check_descriptor(
    record: &BufferRecord,
    desc: &TensorDescriptor,
    bytes: usize,
    side: &str,
) -> Result<(), DeviceApiError> {
    let buffer = &record.buffer;
    if desc.device != record.device {
        return Err(DeviceApiError::IncompatibleCopy(format!(
            "{side} descriptor names {}, buffer belongs to {}",
            desc.device, record.device
        )));
    }
    if let Some(tag) = desc.scope.as_deref() {
        if tag != buffer.scope().tag() {
            return Err(DeviceApiError::IncompatibleCopy(format!(
                "{side} descriptor scope '{tag}' does not match buffer scope '{}'",
                buffer.scope()
            )));
        }
    }
    if bytes > buffer.size_bytes() {
        return Err(DeviceApiError::IncompatibleCopy(format!(
            "{side} descriptor covers {bytes} bytes, buffer holds {}",
            buffer.size_bytes()
        )));
    }
    if !buffer.is_contiguous() && bytes != buffer.size_bytes() {
        return Err(DeviceApiError::IncompatibleCopy(format!(
            "{side} buffer is tiled; a copy must cover all {} bytes",
            buffer.size_bytes()
        )));
    }
    Ok(())
}

fn check_range(offset: usize, len: usize, size: usize, side: &str) -> Result<(), DeviceApiError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(DeviceApiError::IncompatibleCopy(format!(
            "{side} range {offset}..+{len} exceeds buffer of {size} bytes"
        ))),
    }
}
