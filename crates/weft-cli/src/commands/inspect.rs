//! Inspect command - Show a guest module's imports, exports and memory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use weft::prelude::*;
use weft_core::{ExportInfo, ExportKind, ImportInfo, ImportKind};
use weft_host::{ImportResolution, imports};

use crate::OutputFormat;
use crate::settings::Settings;

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Path to the guest module (.wasm or .wat)
    #[arg(required = true)]
    pub module: PathBuf,

    /// Show exports
    #[arg(long)]
    pub exports: bool,

    /// Show imports
    #[arg(long)]
    pub imports: bool,

    /// Show memory information
    #[arg(long)]
    pub memory: bool,

    /// Show all information
    #[arg(long, short)]
    pub all: bool,
}

/// Inspection result.
#[derive(Debug, Serialize)]
struct InspectionResult {
    path: String,
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exports: Option<Vec<ExportDisplay>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    imports: Option<Vec<ImportDisplay>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory: Option<MemoryDisplay>,
}

#[derive(Debug, Serialize)]
struct ExportDisplay {
    name: String,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImportDisplay {
    module: String,
    name: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'static str>,
    resolution: &'static str,
}

#[derive(Debug, Serialize)]
struct MemoryDisplay {
    /// "imported" or "exported".
    source: &'static str,
    min_pages: u64,
    max_pages: Option<u64>,
    heap_base_export: bool,
}

impl From<&ExportInfo> for ExportDisplay {
    fn from(info: &ExportInfo) -> Self {
        let (kind, signature) = match &info.kind {
            ExportKind::Function { params, results } => (
                "function".to_string(),
                Some(format!("({}) -> ({})", params, results)),
            ),
            ExportKind::Memory => ("memory".to_string(), None),
            ExportKind::Global => ("global".to_string(), None),
            ExportKind::Table => ("table".to_string(), None),
        };

        Self {
            name: info.name.clone(),
            kind,
            signature,
        }
    }
}

fn import_display(info: &ImportInfo, resolution: ImportResolution) -> ImportDisplay {
    ImportDisplay {
        module: info.module.clone(),
        name: info.name.clone(),
        kind: info.kind.as_str(),
        category: imports::category(&info.name),
        resolution: match resolution {
            ImportResolution::HostFunction => "host function",
            ImportResolution::HostMemory => "host memory",
            ImportResolution::Unresolved => "unresolved",
        },
    }
}

fn memory_display(module: &ValidatedModule) -> Option<MemoryDisplay> {
    let heap_base_export = module.has_export(imports::HEAP_BASE);
    if let Some(ImportKind::Memory {
        min_pages,
        max_pages,
    }) = module.memory_import().map(|i| &i.kind)
    {
        return Some(MemoryDisplay {
            source: "imported",
            min_pages: *min_pages,
            max_pages: *max_pages,
            heap_base_export,
        });
    }
    module.metadata().memories.first().map(|m| MemoryDisplay {
        source: "exported",
        min_pages: m.min_pages,
        max_pages: m.max_pages,
        heap_base_export,
    })
}

/// Execute the inspect command.
pub fn execute(args: InspectArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let runtime = settings
        .builder()?
        .build()
        .context("Failed to create runtime")?;

    // Loaded without the import check so unresolved imports can be listed.
    let module = runtime
        .loader()
        .load_file(&args.module)
        .context("Failed to load module")?;

    let show_all = args.all || (!args.exports && !args.imports && !args.memory);

    let mut result = InspectionResult {
        path: args.module.display().to_string(),
        name: module.name().map(String::from),
        exports: None,
        imports: None,
        memory: None,
    };

    if show_all || args.exports {
        result.exports = Some(module.exports().iter().map(ExportDisplay::from).collect());
    }

    if show_all || args.imports {
        result.imports = Some(
            runtime
                .resolve_imports(&module)
                .into_iter()
                .map(|(info, resolution)| import_display(info, resolution))
                .collect(),
        );
    }

    if show_all || args.memory {
        result.memory = memory_display(&module);
    }

    match format {
        OutputFormat::Human => {
            println!("Module: {}", args.module.display());
            if let Some(name) = &result.name {
                println!("Name: {}", name);
            }
            println!();

            if let Some(exports) = &result.exports {
                println!("Exports ({}):", exports.len());
                for export in exports {
                    if let Some(sig) = &export.signature {
                        println!("  {} [{}]: {}", export.name, export.kind, sig);
                    } else {
                        println!("  {} [{}]", export.name, export.kind);
                    }
                }
                println!();
            }

            if let Some(imports) = &result.imports {
                println!("Imports ({}):", imports.len());
                for import in imports {
                    println!(
                        "  {}::{} [{}] {} ({})",
                        import.module,
                        import.name,
                        import.kind,
                        import.category.unwrap_or("-"),
                        import.resolution
                    );
                }
                println!();
            }

            if show_all || args.memory {
                match &result.memory {
                    Some(memory) => {
                        let max = memory
                            .max_pages
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| "unbounded".to_string());
                        println!(
                            "Memory ({}): {} - {} pages, __heap_base {}",
                            memory.source,
                            memory.min_pages,
                            max,
                            if memory.heap_base_export { "exported" } else { "not exported" }
                        );
                    }
                    None => println!("Memory: none"),
                }
            }
        }
        OutputFormat::Json | OutputFormat::JsonCompact => {
            println!("{}", format.to_json(&result)?);
        }
    }

    Ok(())
}
