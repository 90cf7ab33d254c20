// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # dsp-rt
//!
//! Command-line interface for the DSP device layer.
//!
//! ## Usage
//! ```bash
//! # Show device attributes and the active configuration
//! dsp-rt info
//! dsp-rt --config dsp.toml info --attr max_shared_memory_per_block
//!
//! # Exercise allocation, copies and dispatch across streams
//! dsp-rt bench --streams 4 --iterations 200 --callers 4 --json
//!
//! # Print or write the default configuration
//! dsp-rt config --output dsp.toml
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dsp-rt",
    about = "Memory and dispatch layer for DSP co-processors",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print device attributes and the effective configuration.
    Info {
        /// Query a single attribute (e.g. "device_name").
        #[arg(short, long)]
        attr: Option<String>,

        /// Device to query, as "kind[:id]".
        #[arg(short, long, default_value = "hexagon:0")]
        device: String,
    },

    /// Run an allocation, copy and dispatch exercise.
    Bench {
        /// Streams to spread work over.
        #[arg(short, long, default_value_t = 4)]
        streams: usize,

        /// Copy rounds per stream.
        #[arg(short, long, default_value_t = 100)]
        iterations: usize,

        /// Concurrent callers allocating and freeing buffers.
        #[arg(long, default_value_t = 4)]
        callers: usize,

        /// Print the final metrics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration as TOML.
    Config {
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Info { attr, device } => {
            commands::info::execute(cli.config.as_deref(), attr, device).await
        }
        Commands::Bench {
            streams,
            iterations,
            callers,
            json,
        } => {
            commands::bench::execute(cli.config.as_deref(), streams, iterations, callers, json)
                .await
        }
        Commands::Config { output } => commands::config::execute(output).await,
    }
}
