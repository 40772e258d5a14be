//! Run command - Call an entry point of a guest module.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;

use weft::prelude::*;

use crate::OutputFormat;
use crate::settings::{Settings, parse_hex};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Path to the guest module (.wasm or .wat)
    #[arg(required = true)]
    pub module: PathBuf,

    /// Entry point to call, as `(ptr: i32, len: i32) -> i64`
    #[arg(short = 'e', long, default_value = "execute_block")]
    pub entry: String,

    /// Input bytes as hex
    #[arg(short, long, conflicts_with = "input_file")]
    pub input: Option<String>,

    /// Read raw input bytes from a file
    #[arg(long)]
    pub input_file: Option<PathBuf>,

    /// Memory limit in bytes (overrides the settings file)
    #[arg(long)]
    pub memory_limit: Option<usize>,

    /// Fuel limit (overrides the settings file)
    #[arg(long)]
    pub fuel_limit: Option<u64>,

    /// Execution timeout in seconds (overrides the settings file)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Heap start (overrides `__heap_base`)
    #[arg(long)]
    pub heap_base: Option<u32>,

    /// Show execution metrics
    #[arg(long)]
    pub metrics: bool,
}

/// What a run produced.
#[derive(Debug, Serialize)]
struct RunReport {
    module: String,
    entry: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trapped_in: Option<&'static str>,
    metrics: RunMetrics,
}

#[derive(Debug, Serialize)]
struct RunMetrics {
    duration_ms: f64,
    host_calls: u64,
    fuel_consumed: u64,
}

impl RunArgs {
    fn input(&self) -> Result<Vec<u8>> {
        if let Some(path) = &self.input_file {
            return std::fs::read(path)
                .with_context(|| format!("Failed to read input from {}", path.display()));
        }
        match &self.input {
            Some(text) => parse_hex(text).context("Invalid --input"),
            None => Ok(Vec::new()),
        }
    }

    fn runtime(&self, settings: &Settings) -> Result<WeftRuntime> {
        let mut builder = settings.builder()?;
        if let Some(bytes) = self.memory_limit {
            builder = builder.with_memory_limit(bytes);
        }
        if let Some(fuel) = self.fuel_limit {
            builder = builder.with_fuel_limit(fuel);
        }
        if let Some(secs) = self.timeout {
            builder = builder.with_timeout(Duration::from_secs(secs));
        }
        if let Some(heap_base) = self.heap_base {
            builder = builder.with_heap_base(heap_base);
        }
        builder.build().context("Failed to create runtime")
    }
}

/// Execute the run command.
pub fn execute(args: RunArgs, settings: &Settings, format: OutputFormat, quiet: bool) -> Result<()> {
    let input = args.input()?;
    let runtime = args.runtime(settings)?;

    let module = runtime
        .load_file(&args.module)
        .context("Failed to load module")?;

    if !module.has_export(&args.entry) {
        bail!("Module has no export named '{}'", args.entry);
    }

    if !quiet {
        tracing::info!(
            module = %args.module.display(),
            entry = %args.entry,
            input_len = input.len(),
            "Executing entry point"
        );
    }

    let mut instance = runtime
        .instantiate(&module)
        .context("Failed to instantiate module")?;

    let start = Instant::now();
    let result = instance.call(&args.entry, &input);
    let duration = start.elapsed();

    let metrics = instance.metrics();
    let report = RunReport {
        module: args.module.display().to_string(),
        entry: args.entry.clone(),
        success: result.is_ok(),
        output: result.as_ref().ok().map(hex::encode),
        error: result.as_ref().err().map(|e| e.to_string()),
        trapped_in: result
            .as_ref()
            .err()
            .and_then(WeftError::host_trap)
            .map(|trap| trap.import),
        metrics: RunMetrics {
            duration_ms: duration.as_secs_f64() * 1000.0,
            host_calls: metrics.host_calls,
            fuel_consumed: metrics.fuel_consumed,
        },
    };

    match format {
        OutputFormat::Human => {
            match &report.output {
                Some(output) => println!("0x{}", output),
                None => {
                    if let Some(error) = &report.error {
                        println!("Execution failed: {}", error);
                    }
                    if let Some(import) = report.trapped_in {
                        println!("  Trapped in: {}", import);
                    }
                }
            }
            if args.metrics {
                println!("\nMetrics:");
                println!("  Duration: {:?}", duration);
                println!("  Host calls: {}", report.metrics.host_calls);
                println!("  Fuel consumed: {}", report.metrics.fuel_consumed);
            }
        }
        OutputFormat::Json | OutputFormat::JsonCompact => {
            println!("{}", format.to_json(&report)?);
        }
    }

    result
        .map(drop)
        .map_err(|e| anyhow::anyhow!("Execution failed: {}", e))
}
