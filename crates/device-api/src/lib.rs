// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # device-api
//!
//! The device API a generic tensor runtime uses to drive a DSP-class
//! co-processor ("Hexagon") with a small bounded fast-memory region.
//!
//! For every tensor operation it answers three questions: where the
//! storage lives, how it is addressed, and on which execution context the
//! work runs. It composes:
//! - `memory-manager` for buffer ownership and the allocation policies.
//! - `stream-pool` for streams, dispatch and cross-stream ordering.
//! - the copy engine in this crate for linear and layout-aware copies.
//!
//! # Configuration
//! A [`DeviceApiConfig`] is loaded from TOML or built in code. Defaults
//! give six streams, a 4 MiB scratch region and 2048-byte alignment.
//!
//! # Errors
//! Every operation returns [`DeviceApiError`]. Use
//! [`DeviceApiError::kind`] to branch on the category without matching
//! the wrapped per-crate errors.

mod api;
mod attr;
mod config;
mod copy;
mod descriptor;
mod error;
mod metrics;

pub use api::{is_valid_device, DeviceApi, DEVICE_NAME};
pub use attr::{AttrKind, AttrValue};
pub use config::{DeviceApiConfig, WorkerPoolKind};
pub use copy::{select_path, CopyPath};
pub use descriptor::TensorDescriptor;
pub use error::{DeviceApiError, ErrorKind};
pub use metrics::{CopyStats, DeviceMetrics};

pub use memory_manager::{BufferId, BufferInfo, DataPtr};
pub use stream_pool::{StreamHandle, StreamTarget};
