// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `dsp-rt info` command: attributes and configuration.

use anyhow::anyhow;
use device_api::{AttrKind, DeviceApi};
use std::path::Path;
use tensor_core::Device;

pub async fn execute(
    config_path: Option<&Path>,
    attr: Option<String>,
    device: String,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let device: Device = device
        .parse()
        .map_err(|e| anyhow!("invalid device '{device}': {e}"))?;
    let api = DeviceApi::new(config)?;

    if let Some(name) = attr {
        let kind: AttrKind = name.parse().map_err(|e: String| anyhow!(e))?;
        println!("{}", api.get_attribute(device, kind)?);
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║           dsp-rt · Device Info                       ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    println!("  Device: {device}");
    println!("  {:<30} {:>12}", "Attribute", "Value");
    println!("  {}", "-".repeat(43));
    for kind in AttrKind::ALL {
        match api.get_attribute(device, kind) {
            Ok(v) => println!("  {:<30} {:>12}", kind.as_str(), v.to_string()),
            Err(e) => println!("  {:<30} {:>12}", kind.as_str(), format!("{:?}", e.kind())),
        }
    }
    println!();

    let config = api.config();
    println!("  Configuration:");
    println!("   Worker pool:       {:?}", config.worker_pool);
    println!("   Worker threads:    {}", config.worker_threads);
    println!("   Stack size:        {}", config.worker_stack_size);
    println!("   Queue depth:       {}", config.queue_depth);
    println!("   Scratch capacity:  {}", config.scratch_capacity);
    println!("   Scratch scopes:    {}", config.scratch_scopes.join(", "));
    println!("   Default alignment: {}", config.default_alignment);
    println!();

    Ok(())
}
