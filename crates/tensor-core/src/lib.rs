// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Vocabulary types shared by every layer of the DSP device runtime.
//!
//! This crate provides:
//! - [`Device`] / [`DeviceKind`] — the logical compute target an operation
//!   is addressed to.
//! - [`DType`] — supported element data types and their sizes.
//! - [`Shape`] — N-dimensional shape descriptors with overflow-checked
//!   byte-size computation.
//!
//! It owns no memory and performs no I/O; the allocators in
//! `memory-manager` and the facade in `device-api` build on these types.

mod device;
mod dtype;
mod error;
mod shape;

pub use device::{Device, DeviceKind};
pub use dtype::DType;
pub use error::TensorError;
pub use shape::Shape;
