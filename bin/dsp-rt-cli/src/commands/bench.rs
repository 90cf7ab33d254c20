// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `dsp-rt bench` command: exercise allocation, copies and dispatch.
//!
//! Phase 1 round-trips a tensor between general memory and a scratch tile
//! on every stream, with a cross-stream edge per round. Phase 2 runs
//! concurrent callers that allocate and free on one shared facade. The
//! final metrics are printed as a summary or as JSON.

use anyhow::{bail, Context};
use device_api::{DeviceApi, StreamTarget, TensorDescriptor};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tensor_core::{DType, Device, Shape};

const TILE: (usize, usize) = (32, 128);

pub async fn execute(
    config_path: Option<&Path>,
    streams: usize,
    iterations: usize,
    callers: usize,
    json: bool,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    if streams == 0 || streams > config.worker_threads {
        bail!(
            "--streams must be between 1 and worker_threads ({})",
            config.worker_threads
        );
    }

    let api = Arc::new(DeviceApi::new(config)?);
    let dev = Device::hexagon(0);
    api.start(dev)?;

    if !json {
        println!("╔══════════════════════════════════════════════════════╗");
        println!("║           dsp-rt · Dispatch Exercise                 ║");
        println!("╚══════════════════════════════════════════════════════╝");
        println!();
        println!("  Streams: {streams}, iterations: {iterations}, callers: {callers}");
        println!();
    }

    // ── Phase 1: copies across streams ─────────────────────────
    let started = Instant::now();
    let copy_bytes = run_stream_rounds(&api, dev, streams, iterations)?;
    let phase1 = started.elapsed();

    // ── Phase 2: concurrent callers ────────────────────────────
    let started = Instant::now();
    let mut tasks = Vec::with_capacity(callers);
    for caller in 0..callers {
        let api = Arc::clone(&api);
        tasks.push(tokio::task::spawn_blocking(move || {
            caller_loop(&api, dev, caller, iterations)
        }));
    }
    for task in tasks {
        task.await.context("caller task panicked")??;
    }
    let phase2 = started.elapsed();

    let metrics = api.metrics();
    api.shutdown();

    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }

    println!(
        "  Phase 1: {:>8.2} ms, {:.1} MB copied",
        phase1.as_secs_f64() * 1000.0,
        copy_bytes as f64 / (1024.0 * 1024.0)
    );
    println!(
        "  Phase 2: {:>8.2} ms, {} allocate/free pairs",
        phase2.as_secs_f64() * 1000.0,
        callers * iterations
    );
    println!();
    for line in metrics.summary().lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}

fn run_stream_rounds(
    api: &DeviceApi,
    dev: Device,
    streams: usize,
    iterations: usize,
) -> anyhow::Result<usize> {
    let shape = Shape::matrix(TILE.0, TILE.1);
    let dtype = DType::F16;
    let bytes = shape.size_bytes(dtype)?;

    let mut lanes = Vec::with_capacity(streams);
    for _ in 0..streams {
        let stream = api.create_stream(dev)?;
        let host = api.allocate_nd(dev, &shape, dtype, None)?;
        let tile = api.allocate_scratch(dev, &shape, dtype, None)?;
        let d_host = TensorDescriptor::new(host, dev, shape.clone(), dtype);
        let d_tile = TensorDescriptor::new(tile, dev, shape.clone(), dtype);
        let seed: Vec<u8> = (0..bytes).map(|i| (i % 251) as u8).collect();
        api.copy_from_host(&seed, &d_host)?;
        lanes.push((stream, d_host, d_tile, seed));
    }

    // Each round queues four jobs per stream. Drain before the queues can
    // fill, since a blocked enqueue would stall the edge it is waiting on.
    let batch = (api.config().queue_depth / 8).max(1);
    for round in 0..iterations {
        for (i, (stream, d_host, d_tile, _)) in lanes.iter().enumerate() {
            api.copy(d_host, d_tile, StreamTarget::Stream(*stream))?;
            api.copy(d_tile, d_host, StreamTarget::Stream(*stream))?;
            let (next, _, _, _) = &lanes[(i + 1) % lanes.len()];
            if next != stream {
                api.sync_stream_from_to(dev, (*stream).into(), (*next).into())?;
            }
        }
        tracing::trace!(round, "round queued");
        if (round + 1) % batch == 0 {
            for (stream, _, _, _) in &lanes {
                api.stream_synchronize(dev, (*stream).into())?;
            }
        }
    }

    let mut check = vec![0u8; bytes];
    for (stream, d_host, d_tile, seed) in lanes {
        api.stream_synchronize(dev, stream.into())?;
        api.copy_to_host(&d_host, &mut check)?;
        if check != seed {
            bail!("data mismatch after round trips on {stream}");
        }
        api.free_scratch(dev, d_tile.data)?;
        api.free(dev, d_host.data)?;
        api.free_stream(dev, stream)?;
    }
    Ok(bytes * 2 * iterations * streams)
}

fn caller_loop(api: &DeviceApi, dev: Device, caller: usize, iterations: usize) -> anyhow::Result<()> {
    for i in 0..iterations {
        let len = 64 + ((caller * 31 + i * 17) % 4096);
        let id = api.allocate_workspace(dev, len, DType::U8)?;
        api.free_workspace(dev, id)?;
    }
    Ok(())
}
