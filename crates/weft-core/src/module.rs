//! Guest module loading and inspection.

use std::path::Path;

use tracing::{debug, info};
use wasmtime::{ExternType, Module};

use crate::engine::SharedEngine;
use crate::error::{ModuleError, ModuleResult};

/// A compiled module together with the import/export facts the host needs
/// before instantiating it.
#[derive(Clone)]
pub struct ValidatedModule {
    inner: Module,
    metadata: ModuleMetadata,
}

impl ValidatedModule {
    /// Get a reference to the underlying Wasmtime module.
    pub fn inner(&self) -> &Module {
        &self.inner
    }

    /// Get the module metadata.
    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    /// Get the module name, if set.
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    /// Get the list of exports.
    pub fn exports(&self) -> &[ExportInfo] {
        &self.metadata.exports
    }

    /// Get the list of imports.
    pub fn imports(&self) -> &[ImportInfo] {
        &self.metadata.imports
    }

    /// Check if the module has a specific export.
    pub fn has_export(&self, name: &str) -> bool {
        self.metadata.exports.iter().any(|e| e.name == name)
    }

    /// Check if the module requires a specific import.
    pub fn requires_import(&self, module: &str, name: &str) -> bool {
        self.metadata
            .imports
            .iter()
            .any(|i| i.module == module && i.name == name)
    }

    /// The imported memory, if the module imports one.
    pub fn memory_import(&self) -> Option<&ImportInfo> {
        self.metadata
            .imports
            .iter()
            .find(|i| matches!(i.kind, ImportKind::Memory { .. }))
    }

    /// Whether the module exports a memory under `name`.
    pub fn exports_memory(&self, name: &str) -> bool {
        self.metadata
            .exports
            .iter()
            .any(|e| e.name == name && e.kind == ExportKind::Memory)
    }
}

impl std::fmt::Debug for ValidatedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedModule")
            .field("name", &self.metadata.name)
            .field("exports", &self.metadata.exports.len())
            .field("imports", &self.metadata.imports.len())
            .finish()
    }
}

/// Metadata extracted from a WASM module.
#[derive(Debug, Clone, Default)]
pub struct ModuleMetadata {
    /// Module name, if specified.
    pub name: Option<String>,
    /// List of exported items.
    pub exports: Vec<ExportInfo>,
    /// List of required imports.
    pub imports: Vec<ImportInfo>,
    /// Exported memories.
    pub memories: Vec<MemoryInfo>,
}

/// Information about an exported item.
#[derive(Debug, Clone)]
pub struct ExportInfo {
    /// Export name.
    pub name: String,
    /// Type of the export.
    pub kind: ExportKind,
}

/// The kind of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportKind {
    /// A function export.
    Function {
        /// Number of parameters.
        params: usize,
        /// Number of results.
        results: usize,
    },
    /// A memory export.
    Memory,
    /// A global export.
    Global,
    /// A table export.
    Table,
}

/// Information about a required import.
#[derive(Debug, Clone)]
pub struct ImportInfo {
    /// Import module name.
    pub module: String,
    /// Import name.
    pub name: String,
    /// Type of the import.
    pub kind: ImportKind,
}

/// The kind of an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    /// A function import.
    Function {
        /// Number of parameters.
        params: usize,
        /// Number of results.
        results: usize,
    },
    /// A memory import with its declared limits.
    Memory {
        /// Declared minimum in pages.
        min_pages: u64,
        /// Declared maximum in pages, if any.
        max_pages: Option<u64>,
    },
    /// A global import.
    Global,
    /// A table import.
    Table,
}

impl ImportKind {
    /// Short lowercase name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function { .. } => "func",
            Self::Memory { .. } => "memory",
            Self::Global => "global",
            Self::Table => "table",
        }
    }
}

/// Information about a memory definition.
#[derive(Debug, Clone)]
pub struct MemoryInfo {
    /// Minimum memory size in pages (64KB each).
    pub min_pages: u64,
    /// Maximum memory size in pages, if specified.
    pub max_pages: Option<u64>,
    /// Whether this is a 64-bit memory.
    pub memory64: bool,
}

/// Compiles guest modules with a shared engine.
pub struct ModuleLoader {
    engine: SharedEngine,
}

impl ModuleLoader {
    /// Create a new module loader with the given engine.
    pub fn new(engine: SharedEngine) -> Self {
        Self { engine }
    }

    /// Load and validate a module from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid WASM module.
    pub fn load_bytes(&self, bytes: &[u8]) -> ModuleResult<ValidatedModule> {
        debug!(size = bytes.len(), "Loading WASM module from bytes");

        let module = Module::new(self.engine.inner(), bytes)?;
        let metadata = extract_metadata(&module);

        info!(
            name = ?metadata.name,
            exports = metadata.exports.len(),
            imports = metadata.imports.len(),
            "Loaded WASM module"
        );

        Ok(ValidatedModule {
            inner: module,
            metadata,
        })
    }

    /// Load and validate a module from a `.wasm` or `.wat` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid module.
    pub fn load_file(&self, path: &Path) -> ModuleResult<ValidatedModule> {
        debug!(path = %path.display(), "Loading WASM module from file");

        let bytes = std::fs::read(path)?;
        let is_text = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wat"));

        if is_text {
            let text = String::from_utf8(bytes).map_err(|e| ModuleError::Invalid(e.to_string()))?;
            self.load_wat(&text)
        } else {
            self.load_bytes(&bytes)
        }
    }

    /// Load and validate a module from WAT (WebAssembly Text) format.
    ///
    /// # Errors
    ///
    /// Returns an error if the WAT is invalid.
    pub fn load_wat(&self, wat: &str) -> ModuleResult<ValidatedModule> {
        debug!(size = wat.len(), "Loading WASM module from WAT");

        let wasm = wat::parse_str(wat).map_err(|e| ModuleError::Invalid(e.to_string()))?;
        self.load_bytes(&wasm)
    }
}

fn extract_metadata(module: &Module) -> ModuleMetadata {
    let name = module.name().map(String::from);

    let exports = module
        .exports()
        .map(|export| ExportInfo {
            name: export.name().to_string(),
            kind: export_kind(export.ty()),
        })
        .collect();

    let imports = module
        .imports()
        .map(|import| ImportInfo {
            module: import.module().to_string(),
            name: import.name().to_string(),
            kind: import_kind(import.ty()),
        })
        .collect();

    let memories = module
        .exports()
        .filter_map(|export| match export.ty() {
            ExternType::Memory(mem) => Some(MemoryInfo {
                min_pages: mem.minimum(),
                max_pages: mem.maximum(),
                memory64: mem.is_64(),
            }),
            _ => None,
        })
        .collect();

    ModuleMetadata {
        name,
        exports,
        imports,
        memories,
    }
}

fn export_kind(ty: ExternType) -> ExportKind {
    match ty {
        ExternType::Func(func) => ExportKind::Function {
            params: func.params().len(),
            results: func.results().len(),
        },
        ExternType::Memory(_) => ExportKind::Memory,
        ExternType::Global(_) => ExportKind::Global,
        ExternType::Table(_) => ExportKind::Table,
    }
}

fn import_kind(ty: ExternType) -> ImportKind {
    match ty {
        ExternType::Func(func) => ImportKind::Function {
            params: func.params().len(),
            results: func.results().len(),
        },
        ExternType::Memory(mem) => ImportKind::Memory {
            min_pages: mem.minimum(),
            max_pages: mem.maximum(),
        },
        ExternType::Global(_) => ImportKind::Global,
        ExternType::Table(_) => ImportKind::Table,
    }
}
