// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device descriptors.
//!
//! A [`Device`] names a logical compute target. The DSP is usually
//! reached as a sub-target of the host code generator, so requests may
//! arrive tagged either as [`DeviceKind::Hexagon`] or as
//! [`DeviceKind::Cpu`]; which kinds are acceptable is decided by the
//! facade, not here.

use crate::TensorError;
use std::fmt;
use std::str::FromStr;

/// The family of a compute target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Generic host CPU.
    Cpu,
    /// The DSP co-processor.
    Hexagon,
    /// A CUDA GPU.
    Cuda,
    /// An OpenCL device.
    OpenCl,
    /// A Vulkan device.
    Vulkan,
}

impl DeviceKind {
    /// Returns the lowercase label used in `kind:id` notation.
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Cpu => "cpu",
            DeviceKind::Hexagon => "hexagon",
            DeviceKind::Cuda => "cuda",
            DeviceKind::OpenCl => "opencl",
            DeviceKind::Vulkan => "vulkan",
        }
    }
}

/// A logical compute target: a device family plus an ordinal.
///
/// # Examples
/// ```
/// use tensor_core::{Device, DeviceKind};
///
/// let dev: Device = "hexagon:0".parse().unwrap();
/// assert_eq!(dev, Device::hexagon(0));
/// assert_eq!(dev.kind, DeviceKind::Hexagon);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Device {
    /// Device family.
    pub kind: DeviceKind,
    /// Ordinal within the family.
    pub id: u32,
}

impl Device {
    /// Creates a device descriptor.
    pub fn new(kind: DeviceKind, id: u32) -> Self {
        Self { kind, id }
    }

    /// Shorthand for a DSP device.
    pub fn hexagon(id: u32) -> Self {
        Self::new(DeviceKind::Hexagon, id)
    }

    /// Shorthand for a host CPU device.
    pub fn cpu(id: u32) -> Self {
        Self::new(DeviceKind::Cpu, id)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

impl FromStr for Device {
    type Err = TensorError;

    /// Parses `kind` or `kind:id` (id defaults to 0).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TensorError::Parse {
            what: "device",
            input: s.to_string(),
        };
        let lower = s.trim().to_lowercase();
        let (kind_str, id_str) = match lower.split_once(':') {
            Some((k, i)) => (k, Some(i)),
            None => (lower.as_str(), None),
        };
        let kind = match kind_str {
            "cpu" | "llvm" => DeviceKind::Cpu,
            "hexagon" | "dsp" => DeviceKind::Hexagon,
            "cuda" => DeviceKind::Cuda,
            "opencl" => DeviceKind::OpenCl,
            "vulkan" => DeviceKind::Vulkan,
            _ => return Err(err()),
        };
        let id = match id_str {
            Some(i) => i.parse().map_err(|_| err())?,
            None => 0,
        };
        Ok(Self { kind, id })
    }
}
