// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Human-readable byte sizes.
//!
//! [`ByteSize`] is used for every size that appears in configuration:
//! scratch-region capacity and worker stack size.

use crate::MemoryError;
use std::fmt;

const KB: usize = 1024;
const MB: usize = 1024 * KB;
const GB: usize = 1024 * MB;

/// A non-zero number of bytes.
///
/// # Parsing
/// Supports human-readable strings with binary suffixes:
/// - `"256K"` or `"256KB"` → 256 × 1024 bytes
/// - `"4M"` or `"4MB"` → 4 × 1024² bytes
/// - `"1G"` or `"1GB"` → 1 × 1024³ bytes
/// - `"2048"` or `"2048B"` → raw byte count
///
/// # Examples
/// ```
/// use memory_manager::ByteSize;
///
/// let s = ByteSize::parse("256K").unwrap();
/// assert_eq!(s.as_bytes(), 256 * 1024);
/// assert_eq!(s.to_string(), "256 KB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ByteSize {
    bytes: usize,
}

impl ByteSize {
    /// Creates a size from a byte count.
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    /// Creates a size from kilobytes.
    pub fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * KB }
    }

    /// Creates a size from megabytes.
    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MB }
    }

    /// Returns the size in bytes.
    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Parses a human-readable size string. Case-insensitive.
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        let invalid = |detail: &str| MemoryError::InvalidSize {
            input: s.to_string(),
            detail: detail.to_string(),
        };

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty string"));
        }

        let upper = trimmed.to_uppercase();
        let (num_str, multiplier) = if let Some(n) = upper.strip_suffix("GB") {
            (n, GB)
        } else if let Some(n) = upper.strip_suffix('G') {
            (n, GB)
        } else if let Some(n) = upper.strip_suffix("MB") {
            (n, MB)
        } else if let Some(n) = upper.strip_suffix('M') {
            (n, MB)
        } else if let Some(n) = upper.strip_suffix("KB") {
            (n, KB)
        } else if let Some(n) = upper.strip_suffix('K') {
            (n, KB)
        } else if let Some(n) = upper.strip_suffix('B') {
            (n, 1)
        } else {
            (upper.as_str(), 1)
        };

        let value: usize = num_str
            .trim()
            .parse()
            .map_err(|_| invalid("expected a number followed by an optional K, M or G suffix"))?;
        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("value overflows"))?;
        if bytes == 0 {
            return Err(invalid("size must be non-zero"));
        }

        Ok(Self { bytes })
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes >= GB && self.bytes % GB == 0 {
            write!(f, "{} GB", self.bytes / GB)
        } else if self.bytes >= MB && self.bytes % MB == 0 {
            write!(f, "{} MB", self.bytes / MB)
        } else if self.bytes >= KB && self.bytes % KB == 0 {
            write!(f, "{} KB", self.bytes / KB)
        } else {
            write!(f, "{} B", self.bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(ByteSize::parse("256K").unwrap().as_bytes(), 256 * 1024);
        assert_eq!(ByteSize::parse("256kb").unwrap().as_bytes(), 256 * 1024);
        assert_eq!(ByteSize::parse("4M").unwrap(), ByteSize::from_mb(4));
        assert_eq!(ByteSize::parse("1GB").unwrap().as_bytes(), 1 << 30);
        assert_eq!(ByteSize::parse("2048B").unwrap().as_bytes(), 2048);
    }

    #[test]
    fn test_parse_raw_bytes() {
        assert_eq!(ByteSize::parse("65536").unwrap(), ByteSize::from_kb(64));
    }

    #[test]
    fn test_parse_with_whitespace() {
        assert_eq!(ByteSize::parse("  16K ").unwrap(), ByteSize::from_kb(16));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ByteSize::parse("").is_err());
        assert!(ByteSize::parse("lots").is_err());
        assert!(ByteSize::parse("0K").is_err());
        assert!(ByteSize::parse("99999999999999999999G").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ByteSize::from_mb(4).to_string(), "4 MB");
        assert_eq!(ByteSize::from_kb(256).to_string(), "256 KB");
        assert_eq!(ByteSize::from_bytes(100).to_string(), "100 B");
        assert_eq!(ByteSize::from_bytes(1536).to_string(), "1536 B");
    }

    #[test]
    fn test_serde_roundtrip() {
        let s = ByteSize::from_kb(256);
        let json = serde_json::to_string(&s).unwrap();
        let back: ByteSize = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
