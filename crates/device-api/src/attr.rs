// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device attribute queries.

use std::fmt;
use std::str::FromStr;

/// Attributes a tensor runtime may ask any device backend about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrKind {
    Exist,
    MaxThreadsPerBlock,
    WarpSize,
    MaxSharedMemoryPerBlock,
    ComputeVersion,
    DeviceName,
    MaxClockRate,
    MultiProcessorCount,
    MaxThreadDimensions,
    MaxRegistersPerBlock,
    GcnArch,
    ApiVersion,
    DriverVersion,
    L2CacheSizeBytes,
    TotalGlobalMemory,
    AvailableGlobalMemory,
}

impl AttrKind {
    /// Every attribute, in declaration order.
    pub const ALL: [AttrKind; 16] = [
        AttrKind::Exist,
        AttrKind::MaxThreadsPerBlock,
        AttrKind::WarpSize,
        AttrKind::MaxSharedMemoryPerBlock,
        AttrKind::ComputeVersion,
        AttrKind::DeviceName,
        AttrKind::MaxClockRate,
        AttrKind::MultiProcessorCount,
        AttrKind::MaxThreadDimensions,
        AttrKind::MaxRegistersPerBlock,
        AttrKind::GcnArch,
        AttrKind::ApiVersion,
        AttrKind::DriverVersion,
        AttrKind::L2CacheSizeBytes,
        AttrKind::TotalGlobalMemory,
        AttrKind::AvailableGlobalMemory,
    ];

    /// Snake-case name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            AttrKind::Exist => "exist",
            AttrKind::MaxThreadsPerBlock => "max_threads_per_block",
            AttrKind::WarpSize => "warp_size",
            AttrKind::MaxSharedMemoryPerBlock => "max_shared_memory_per_block",
            AttrKind::ComputeVersion => "compute_version",
            AttrKind::DeviceName => "device_name",
            AttrKind::MaxClockRate => "max_clock_rate",
            AttrKind::MultiProcessorCount => "multi_processor_count",
            AttrKind::MaxThreadDimensions => "max_thread_dimensions",
            AttrKind::MaxRegistersPerBlock => "max_registers_per_block",
            AttrKind::GcnArch => "gcn_arch",
            AttrKind::ApiVersion => "api_version",
            AttrKind::DriverVersion => "driver_version",
            AttrKind::L2CacheSizeBytes => "l2_cache_size_bytes",
            AttrKind::TotalGlobalMemory => "total_global_memory",
            AttrKind::AvailableGlobalMemory => "available_global_memory",
        }
    }
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttrKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        AttrKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| format!("unknown attribute '{s}'"))
    }
}

/// Value of a device attribute.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Str(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_roundtrip() {
        for k in AttrKind::ALL {
            assert_eq!(k.as_str().parse::<AttrKind>().unwrap(), k);
        }
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!("Device-Name".parse::<AttrKind>().unwrap(), AttrKind::DeviceName);
        assert!("bogus".parse::<AttrKind>().is_err());
    }

    #[test]
    fn test_value_json() {
        assert_eq!(serde_json::to_string(&AttrValue::Int(3)).unwrap(), "3");
        assert_eq!(
            serde_json::to_string(&AttrValue::Str("hexagon".into())).unwrap(),
            "\"hexagon\""
        );
    }
}
