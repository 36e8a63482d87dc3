// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! `rnnparams`: inspect recurrent parameter layouts and run the round-trip
//! sweep.

use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use mind_rnn::rnn::{
    BiasMode, BiasPlacement, CellType, Direction, InputMode, RnnConfig, RnnParams, Slot,
    SlotRange,
};
use mind_rnn::sweep::{run_sweep, SweepGrid, SweepOptions};
use mind_rnn::{BackendTarget, DataType};

#[derive(Parser, Debug)]
#[command(author, version, about = "Recurrent parameter layout inspector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every slot of the parameter buffer with its offset and shape.
    Layout(LayoutArgs),
    /// Write and read back every slot over a grid of configurations.
    Sweep(SweepArgs),
}

#[derive(Args, Debug)]
struct LayoutArgs {
    /// TOML file describing the network; overrides the shape flags.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Cell type.
    #[arg(long, value_enum, ignore_case = true, default_value_t = CellType::Lstm)]
    cell: CellType,
    #[arg(long, default_value_t = 4)]
    hidden_size: usize,
    #[arg(long, default_value_t = 1)]
    num_layers: usize,
    #[arg(long, default_value_t = 4)]
    input_size: usize,
    /// Run both directions per layer.
    #[arg(long)]
    bidirectional: bool,
    /// Skip the layer-0 input projection.
    #[arg(long)]
    skip_input: bool,
    /// Store a bias vector per weight matrix.
    #[arg(long)]
    bias: bool,
    /// Bias placement.
    #[arg(long, value_enum, ignore_case = true, default_value_t = BiasPlacement::Interleaved)]
    bias_placement: BiasPlacement,
    /// Element type used for byte sizes.
    #[arg(long, value_enum, ignore_case = true, default_value_t = DataType::F32)]
    dtype: DataType,
    /// Output format.
    #[arg(long, value_enum, ignore_case = true, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// Backend holding the swept buffers.
    #[arg(long, value_enum, ignore_case = true, default_value_t = BackendTarget::OpenCl)]
    backend: BackendTarget,
    /// TOML file with the parameter grid.
    #[arg(long, value_name = "FILE", conflicts_with = "small")]
    grid: Option<PathBuf>,
    /// Use the reduced grid.
    #[arg(long)]
    small: bool,
}

#[derive(Serialize)]
struct LayoutReport<'a> {
    config: &'a RnnConfig,
    dtype: DataType,
    total_elements: usize,
    total_bytes: usize,
    slots: Vec<SlotEntry>,
}

#[derive(Serialize)]
struct SlotEntry {
    slot: Slot,
    #[serde(flatten)]
    range: SlotRange,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Layout(args) => run_layout(&args),
        Command::Sweep(args) => run_sweep_command(&args),
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run_layout(args: &LayoutArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => RnnConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => config_from_flags(args)?,
    };
    let dtype = args.dtype;
    let params = RnnParams::new(config)?;
    let layout = params.layout();

    match args.format {
        OutputFormat::Json => {
            let report = LayoutReport {
                config: params.config(),
                dtype,
                total_elements: layout.total_size(),
                total_bytes: layout.total_bytes(dtype),
                slots: layout
                    .iter()
                    .map(|(slot, range)| SlotEntry { slot, range })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            println!("# {}", params.config());
            println!("{:<20} {:>10} {:>8} {:>10}", "slot", "offset", "len", "shape");
            for (slot, range) in layout.iter() {
                println!(
                    "{:<20} {:>10} {:>8} {:>10}",
                    slot.to_string(),
                    range.offset,
                    range.len,
                    format!("{}x{}", range.rows, range.cols)
                );
            }
            println!(
                "total: {} elements, {} bytes ({dtype})",
                layout.total_size(),
                layout.total_bytes(dtype)
            );
        }
    }
    Ok(())
}

fn run_sweep_command(args: &SweepArgs) -> Result<()> {
    let backend = args.backend;
    let grid = match (&args.grid, args.small) {
        (Some(path), _) => {
            let src = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&src).with_context(|| format!("parsing {}", path.display()))?
        }
        (None, true) => SweepGrid::small(),
        (None, false) => SweepGrid::default(),
    };

    match run_sweep(&SweepOptions { backend, grid }) {
        Ok(report) => {
            println!(
                "sweep passed on {backend}: {} configs, {} slots, {} elements",
                report.configs, report.slots, report.elements
            );
            Ok(())
        }
        Err(failure) => {
            eprintln!("sweep failures detected:");
            for msg in failure.0.iter() {
                eprintln!("- {msg}");
            }
            bail!("{} configuration(s) failed", failure.0.len())
        }
    }
}

fn config_from_flags(args: &LayoutArgs) -> Result<RnnConfig> {
    let config = RnnConfig::new(args.cell, args.hidden_size, args.num_layers, args.input_size)?
        .with_direction(if args.bidirectional {
            Direction::Bidirectional
        } else {
            Direction::Unidirectional
        })
        .with_input_mode(if args.skip_input {
            InputMode::Skip
        } else {
            InputMode::Linear
        })
        .with_bias_mode(if args.bias {
            BiasMode::Present
        } else {
            BiasMode::None
        })
        .with_bias_placement(args.bias_placement);
    Ok(config)
}
