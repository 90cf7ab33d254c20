// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Supported tensor element data types.

use crate::TensorError;
use std::fmt;
use std::str::FromStr;

/// Enumerates the element types a device buffer can be allocated for.
///
/// Flat allocations only use the dtype as a type hint; Nd allocations use
/// [`DType::size_bytes`] to turn a shape into a physical block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 64-bit IEEE 754 floating point.
    F64,
    /// 32-bit IEEE 754 floating point.
    F32,
    /// 16-bit IEEE 754 floating point.
    F16,
    /// 16-bit brain floating point.
    BF16,
    /// 32-bit signed integer.
    I32,
    /// 16-bit signed integer.
    I16,
    /// 8-bit signed integer (quantised activations and weights).
    I8,
    /// 8-bit unsigned integer.
    U8,
}

impl DType {
    /// Returns the size of a single element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::F64 => 8,
            DType::F32 | DType::I32 => 4,
            DType::F16 | DType::BF16 | DType::I16 => 2,
            DType::I8 | DType::U8 => 1,
        }
    }

    /// Returns a human-readable label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::F64 => "f64",
            DType::F32 => "f32",
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::I32 => "i32",
            DType::I16 => "i16",
            DType::I8 => "i8",
            DType::U8 => "u8",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DType {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "f64" | "float64" => Ok(DType::F64),
            "f32" | "float32" => Ok(DType::F32),
            "f16" | "float16" => Ok(DType::F16),
            "bf16" | "bfloat16" => Ok(DType::BF16),
            "i32" | "int32" => Ok(DType::I32),
            "i16" | "int16" => Ok(DType::I16),
            "i8" | "int8" => Ok(DType::I8),
            "u8" | "uint8" => Ok(DType::U8),
            _ => Err(TensorError::Parse {
                what: "dtype",
                input: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(DType::F64.size_bytes(), 8);
        assert_eq!(DType::F32.size_bytes(), 4);
        assert_eq!(DType::BF16.size_bytes(), 2);
        assert_eq!(DType::U8.size_bytes(), 1);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("float32".parse::<DType>().unwrap(), DType::F32);
        assert_eq!("F16".parse::<DType>().unwrap(), DType::F16);
        assert_eq!(" int8 ".parse::<DType>().unwrap(), DType::I8);
        assert!("complex64".parse::<DType>().is_err());
    }

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(DType::BF16.to_string(), "bf16");
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&DType::I16).unwrap();
        assert_eq!(json, "\"i16\"");
        let back: DType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DType::I16);
    }
}
