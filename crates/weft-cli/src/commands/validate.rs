//! Validate command - Check a guest module against the host function table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use weft::prelude::*;
use weft_core::ImportKind;
use weft_host::imports;

use crate::OutputFormat;
use crate::settings::Settings;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the guest module (.wasm or .wat)
    #[arg(required = true)]
    pub module: PathBuf,

    /// Entry points the module must export
    #[arg(short = 'e', long = "entry")]
    pub entries: Vec<String>,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Validation result.
#[derive(Debug, Serialize)]
struct ValidationResult {
    valid: bool,
    path: String,
    module_name: Option<String>,
    exports: usize,
    host_functions: usize,
    warnings: Vec<String>,
    errors: Vec<String>,
}

/// Execute the validate command.
pub fn execute(args: ValidateArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let runtime = settings
        .builder()?
        .build()
        .context("Failed to create runtime")?;

    let mut result = ValidationResult {
        valid: true,
        path: args.module.display().to_string(),
        module_name: None,
        exports: 0,
        host_functions: 0,
        warnings: Vec::new(),
        errors: Vec::new(),
    };

    // Loading checks every import against the table.
    match runtime.load_file(&args.module) {
        Ok(module) => {
            result.module_name = module.name().map(String::from);
            result.exports = module.exports().len();
            result.host_functions = module
                .imports()
                .iter()
                .filter(|i| matches!(i.kind, ImportKind::Function { .. }))
                .count();

            for entry in &args.entries {
                if !module.has_export(entry) {
                    result.errors.push(format!("Missing entry point '{}'", entry));
                }
            }

            if !module.has_export(imports::HEAP_BASE) {
                result.warnings.push(format!(
                    "Module does not export '{}'; the heap will start at the end of its initial memory",
                    imports::HEAP_BASE
                ));
            }

            if module.memory_import().is_some() && module.exports_memory(imports::MEMORY) {
                result.warnings.push(
                    "Module both imports and exports memory; the imported memory is used"
                        .to_string(),
                );
            }
        }
        Err(e) => {
            result.errors.push(e.to_string());
        }
    }

    if args.strict {
        result.errors.append(&mut result.warnings);
    }
    result.valid = result.errors.is_empty();

    match format {
        OutputFormat::Human => {
            if result.valid {
                println!("Module is valid: {}", args.module.display());
                if let Some(name) = &result.module_name {
                    println!("  Name: {}", name);
                }
                println!("  Exports: {}", result.exports);
                println!("  Host functions used: {}", result.host_functions);

                if !result.warnings.is_empty() {
                    println!("\nWarnings:");
                    for warning in &result.warnings {
                        println!("  - {}", warning);
                    }
                }
            } else {
                println!("Module is INVALID: {}", args.module.display());
                for error in &result.errors {
                    println!("  Error: {}", error);
                }
            }
        }
        OutputFormat::Json | OutputFormat::JsonCompact => {
            println!("{}", format.to_json(&result)?);
        }
    }

    if result.valid {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Validation failed"))
    }
}
