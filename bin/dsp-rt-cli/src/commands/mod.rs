// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and shared helpers.

pub mod bench;
pub mod config;
pub mod info;

use anyhow::Context;
use device_api::DeviceApiConfig;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_thread_names(verbose >= 2)
        .init();
}

/// Loads `path` if given, otherwise the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<DeviceApiConfig> {
    let config = match path {
        Some(p) => DeviceApiConfig::from_file(p)
            .with_context(|| format!("loading configuration from {}", p.display()))?,
        None => DeviceApiConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}
