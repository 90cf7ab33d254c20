// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `dsp-rt config` command: emit the default configuration.

use device_api::DeviceApiConfig;
use std::path::PathBuf;

pub async fn execute(output: Option<PathBuf>) -> anyhow::Result<()> {
    let toml = DeviceApiConfig::default().to_toml()?;
    match output {
        Some(path) => {
            std::fs::write(&path, &toml)?;
            println!("  Wrote default configuration to {}", path.display());
        }
        None => print!("{toml}"),
    }
    Ok(())
}
