// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor descriptors: a buffer viewed with a logical shape.

use memory_manager::BufferId;
use tensor_core::{DType, Device, Shape, TensorError};

/// Describes one side of a tensor-level copy.
///
/// The descriptor does not own the buffer; `data` must name a live
/// allocation on `device`. When `scope` is set it must match the scope the
/// buffer was allocated in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDescriptor {
    pub data: BufferId,
    pub device: Device,
    pub shape: Shape,
    pub dtype: DType,
    pub scope: Option<String>,
}

impl TensorDescriptor {
    /// A descriptor without a scope tag.
    pub fn new(data: BufferId, device: Device, shape: Shape, dtype: DType) -> Self {
        Self {
            data,
            device,
            shape,
            dtype,
            scope: None,
        }
    }

    /// Sets the scope tag.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Logical size in bytes.
    pub fn size_bytes(&self) -> Result<usize, TensorError> {
        self.shape.size_bytes(self.dtype)
    }
}
