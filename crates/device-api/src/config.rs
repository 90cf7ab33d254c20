// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device API configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! worker_pool = "threads"
//! worker_threads = 6
//! worker_stack_size = "256K"
//! queue_depth = 1024
//! scratch_capacity = "4M"
//! scratch_scopes = ["global.vtcm"]
//! default_alignment = 2048
//! ```
//!
//! Every field is optional; missing fields take the defaults above.

use crate::DeviceApiError;
use memory_manager::{ByteSize, ScopeTable, DEFAULT_SCRATCH_SCOPE, GLOBAL_SCOPE};
use std::path::Path;
use stream_pool::WorkerPoolConfig;

/// Which worker pool implementation backs the streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerPoolKind {
    /// One OS thread per stream.
    #[default]
    Threads,
    /// Jobs run on the caller.
    Inline,
}

/// Configuration for a [`DeviceApi`](crate::DeviceApi) instance.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceApiConfig {
    /// Worker pool implementation.
    pub worker_pool: WorkerPoolKind,
    /// Number of streams, one worker each.
    pub worker_threads: usize,
    /// Stack size per worker thread (human-readable, e.g. `"256K"`).
    pub worker_stack_size: String,
    /// Pending jobs allowed per stream.
    pub queue_depth: usize,
    /// Scratch region capacity (human-readable, e.g. `"4M"`).
    pub scratch_capacity: String,
    /// Scope tags served from the scratch region. The first is the default.
    pub scratch_scopes: Vec<String>,
    /// Alignment of Nd-global and workspace allocations.
    pub default_alignment: usize,
}

impl DeviceApiConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, DeviceApiError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DeviceApiError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, DeviceApiError> {
        toml::from_str(toml_str)
            .map_err(|e| DeviceApiError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, DeviceApiError> {
        toml::to_string_pretty(self)
            .map_err(|e| DeviceApiError::Config(format!("TOML serialise error: {e}")))
    }

    /// Checks every field; returns the first problem found.
    pub fn validate(&self) -> Result<(), DeviceApiError> {
        if self.worker_threads == 0 {
            return Err(DeviceApiError::Config("worker_threads must be at least 1".into()));
        }
        if self.queue_depth == 0 {
            return Err(DeviceApiError::Config("queue_depth must be at least 1".into()));
        }
        if !self.default_alignment.is_power_of_two() {
            return Err(DeviceApiError::Config(format!(
                "default_alignment {} is not a power of two",
                self.default_alignment
            )));
        }
        self.parse_stack_size()?;
        self.parse_scratch_capacity()?;

        if self.scratch_scopes.is_empty() {
            return Err(DeviceApiError::Config(
                "scratch_scopes must name at least one scope".into(),
            ));
        }
        for (i, scope) in self.scratch_scopes.iter().enumerate() {
            if scope.is_empty() || scope == GLOBAL_SCOPE {
                return Err(DeviceApiError::Config(format!(
                    "'{scope}' cannot be a scratch scope"
                )));
            }
            if self.scratch_scopes[..i].contains(scope) {
                return Err(DeviceApiError::Config(format!(
                    "scratch scope '{scope}' listed twice"
                )));
            }
        }
        Ok(())
    }

    /// Parses the scratch capacity into a [`ByteSize`].
    pub fn parse_scratch_capacity(&self) -> Result<ByteSize, DeviceApiError> {
        ByteSize::parse(&self.scratch_capacity)
            .map_err(|e| DeviceApiError::Config(format!("invalid scratch_capacity: {e}")))
    }

    /// Parses the worker stack size into a [`ByteSize`].
    pub fn parse_stack_size(&self) -> Result<ByteSize, DeviceApiError> {
        ByteSize::parse(&self.worker_stack_size)
            .map_err(|e| DeviceApiError::Config(format!("invalid worker_stack_size: {e}")))
    }

    /// Worker pool sizing derived from this config.
    pub fn worker_pool_config(&self) -> Result<WorkerPoolConfig, DeviceApiError> {
        Ok(WorkerPoolConfig {
            workers: self.worker_threads,
            stack_size: self.parse_stack_size()?.as_bytes(),
            queue_depth: self.queue_depth,
        })
    }

    /// The recognised scratch scopes.
    pub fn scope_table(&self) -> ScopeTable {
        ScopeTable::new(self.scratch_scopes.iter().cloned())
    }
}

impl Default for DeviceApiConfig {
    fn default() -> Self {
        Self {
            worker_pool: WorkerPoolKind::Threads,
            worker_threads: 6,
            worker_stack_size: "256K".to_string(),
            queue_depth: 1024,
            scratch_capacity: "4M".to_string(),
            scratch_scopes: vec![DEFAULT_SCRATCH_SCOPE.to_string()],
            default_alignment: 2048,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = DeviceApiConfig::default();
        assert_eq!(c.worker_threads, 6);
        assert_eq!(c.queue_depth, 1024);
        assert_eq!(c.default_alignment, 2048);
        assert_eq!(c.worker_pool, WorkerPoolKind::Threads);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_parse_sizes() {
        let c = DeviceApiConfig::default();
        assert_eq!(c.parse_scratch_capacity().unwrap().as_bytes(), 4 * 1024 * 1024);
        assert_eq!(c.worker_pool_config().unwrap().stack_size, 256 * 1024);
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
worker_pool = "inline"
worker_threads = 2
scratch_capacity = "64K"
"#;
        let c = DeviceApiConfig::from_toml(toml).unwrap();
        assert_eq!(c.worker_pool, WorkerPoolKind::Inline);
        assert_eq!(c.worker_threads, 2);
        assert_eq!(c.scratch_capacity, "64K");
        // Unspecified fields keep their defaults.
        assert_eq!(c.queue_depth, 1024);
        assert_eq!(c.scratch_scopes, vec!["global.vtcm".to_string()]);
    }

    #[test]
    fn test_from_toml_rejects_unknown_field() {
        assert!(DeviceApiConfig::from_toml("memory_budget = \"1G\"").is_err());
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = DeviceApiConfig {
            scratch_scopes: vec!["global.vtcm".into(), "local.tcm".into()],
            ..Default::default()
        };
        let back = DeviceApiConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_validate_rejections() {
        let bad = [
            DeviceApiConfig {
                worker_threads: 0,
                ..Default::default()
            },
            DeviceApiConfig {
                queue_depth: 0,
                ..Default::default()
            },
            DeviceApiConfig {
                default_alignment: 1000,
                ..Default::default()
            },
            DeviceApiConfig {
                scratch_capacity: "lots".into(),
                ..Default::default()
            },
            DeviceApiConfig {
                scratch_scopes: vec!["global".into()],
                ..Default::default()
            },
            DeviceApiConfig {
                scratch_scopes: vec!["a".into(), "a".into()],
                ..Default::default()
            },
            DeviceApiConfig {
                scratch_scopes: vec![],
                ..Default::default()
            },
        ];
        for c in bad {
            assert!(
                matches!(c.validate(), Err(DeviceApiError::Config(_))),
                "expected rejection of {c:?}"
            );
        }
    }

    #[test]
    fn test_scope_table() {
        let c = DeviceApiConfig {
            scratch_scopes: vec!["local.tcm".into()],
            ..Default::default()
        };
        let t = c.scope_table();
        assert_eq!(t.scratch_tags(), &["local.tcm".to_string()]);
    }
}
