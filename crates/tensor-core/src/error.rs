// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for descriptor parsing and size computation.

use crate::Shape;

/// Errors produced while building or interpreting tensor descriptors.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// A textual descriptor (device, dtype) could not be parsed.
    #[error("cannot parse {what} from '{input}'")]
    Parse { what: &'static str, input: String },

    /// The byte size of a shape does not fit in `usize`.
    #[error("byte size of shape {shape} overflows")]
    SizeOverflow { shape: Shape },
}
