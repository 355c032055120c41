use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Store schema version. Readers reject metadata written by a newer major.
pub const SCHEMA_VERSION: u32 = 2;

/// Maximum file size (in bytes) the walker will admit by default.
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Library-level error type. Variants follow the failure taxonomy: input and
/// conflict errors never mutate persisted state; provider and store errors
/// mark the affected index `failed` before propagating.
#[derive(Debug, Error)]
pub enum SeekError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("{0}")]
    Conflict(String),

    #[error("index '{0}' not found")]
    UnknownIndex(String),

    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("summarization provider error: {0}")]
    Summarizer(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("schema version {found} is newer than supported {supported}")]
    SchemaNewer { found: u32, supported: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl SeekError {
    pub fn input(msg: impl Into<String>) -> Self {
        SeekError::Input(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        SeekError::Conflict(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        SeekError::Provider(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SeekError>;

// ---------------------------------------------------------------------------
// Index metadata (persisted as meta.json in each index directory)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Building,
    Ready,
    Failed,
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexStatus::Building => "building",
            IndexStatus::Ready => "ready",
            IndexStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Persistent description of one index. All chunks, symbols, dependencies,
/// call edges, and file metadata records belong to exactly one index, and all
/// vectors in one index share `dimensions` and `model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub root: PathBuf,
    pub model: String,
    pub dimensions: usize,
    pub status: IndexStatus,
    pub schema_version: u32,
    pub created_at: String,
    pub updated_at: String,
    pub chunk_count: usize,
    /// Monotone counter bumped each time the index reaches `ready`.
    pub generation: u64,
}

// ---------------------------------------------------------------------------
// Walker output
// ---------------------------------------------------------------------------

/// A file admitted by the walker, in deterministic traversal order.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub abs_path: PathBuf,
    pub rel_path: String,
    pub size: u64,
    pub ext: String,
}

// ---------------------------------------------------------------------------
// Chunks
// ---------------------------------------------------------------------------

/// A contiguous text window produced by the chunker; the unit of embedding
/// and vector search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub path: String,
    pub rel_path: String,
    /// Hash of the source file the chunk was cut from, not of the chunk text.
    pub content_hash: String,
    pub chunk_index: usize,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    pub start_line: usize,
    pub end_line: usize,
    pub ext: String,
    pub created_at: String,
}

/// A chunk returned from vector search, scored by cosine distance
/// (smaller is better). Similarity is `1.0 - distance`.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    #[serde(rename = "_score")]
    pub distance: f32,
}

// ---------------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    ArrowFunction,
    Method,
    Class,
    Interface,
    TypeAlias,
    Enum,
    EnumMember,
    Property,
    Variable,
    Event,
    Import,
    Export,
    Module,
    Namespace,
}

impl SymbolKind {
    pub fn label(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::ArrowFunction => "arrow_function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::TypeAlias => "type_alias",
            SymbolKind::Enum => "enum",
            SymbolKind::EnumMember => "enum_member",
            SymbolKind::Property => "property",
            SymbolKind::Variable => "variable",
            SymbolKind::Event => "event",
            SymbolKind::Import => "import",
            SymbolKind::Export => "export",
            SymbolKind::Module => "module",
            SymbolKind::Namespace => "namespace",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(SymbolKind::Function),
            "arrow_function" => Some(SymbolKind::ArrowFunction),
            "method" => Some(SymbolKind::Method),
            "class" => Some(SymbolKind::Class),
            "interface" => Some(SymbolKind::Interface),
            "type_alias" => Some(SymbolKind::TypeAlias),
            "enum" => Some(SymbolKind::Enum),
            "enum_member" => Some(SymbolKind::EnumMember),
            "property" => Some(SymbolKind::Property),
            "variable" => Some(SymbolKind::Variable),
            "event" => Some(SymbolKind::Event),
            "import" => Some(SymbolKind::Import),
            "export" => Some(SymbolKind::Export),
            "module" => Some(SymbolKind::Module),
            "namespace" => Some(SymbolKind::Namespace),
            _ => None,
        }
    }
}

/// Start/end position of a symbol in its source file. Lines are 1-based,
/// columns 0-based (tree-sitter convention).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

/// A named program entity extracted from one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    /// Stable id derived from (rel_path, qualified name, kind).
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub path: String,
    pub rel_path: String,
    pub range: SourceRange,
    pub is_exported: bool,
    pub is_default_export: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// Containing class/interface/enum symbol id, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub modifiers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_model: Option<String>,
}

// ---------------------------------------------------------------------------
// Dependencies (import/export edges)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Import,
    ImportType,
    DynamicImport,
    Require,
    Export,
    ExportFrom,
    ReExport,
}

impl DependencyKind {
    pub fn label(&self) -> &'static str {
        match self {
            DependencyKind::Import => "import",
            DependencyKind::ImportType => "import_type",
            DependencyKind::DynamicImport => "dynamic_import",
            DependencyKind::Require => "require",
            DependencyKind::Export => "export",
            DependencyKind::ExportFrom => "export_from",
            DependencyKind::ReExport => "re_export",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "import" => Some(DependencyKind::Import),
            "import_type" => Some(DependencyKind::ImportType),
            "dynamic_import" => Some(DependencyKind::DynamicImport),
            "require" => Some(DependencyKind::Require),
            "export" => Some(DependencyKind::Export),
            "export_from" => Some(DependencyKind::ExportFrom),
            "re_export" => Some(DependencyKind::ReExport),
            _ => None,
        }
    }
}

/// One name moved across a module boundary by an import or export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportedName {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub is_type_only: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_namespace: bool,
}

/// An import/export edge from a source file to a target module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    /// The importing file (relative path).
    pub source: String,
    /// Target module string exactly as written in source.
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<String>,
    pub kind: DependencyKind,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub names: Vec<ImportedName>,
    pub line: usize,
    /// True when the target is a bare specifier (not `./`, `../`, or `/`).
    pub is_external: bool,
}

impl Dependency {
    /// A module specifier is external unless it is relative or absolute.
    pub fn classify_external(target: &str) -> bool {
        !(target.starts_with("./") || target.starts_with("../") || target.starts_with('/'))
    }
}

// ---------------------------------------------------------------------------
// Call edges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Function,
    Method,
    Constructor,
}

impl CallKind {
    pub fn label(&self) -> &'static str {
        match self {
            CallKind::Function => "function",
            CallKind::Method => "method",
            CallKind::Constructor => "constructor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(CallKind::Function),
            "method" => Some(CallKind::Method),
            "constructor" => Some(CallKind::Constructor),
            _ => None,
        }
    }
}

/// A call site attributed to its lexically enclosing caller. Callee names are
/// stored as strings and resolved lazily; the daemon rebuilds adjacency maps
/// from these rows on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEdge {
    pub id: String,
    /// Enclosing symbol id, or the file's synthetic top-level id.
    pub caller_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_name: Option<String>,
    pub caller_path: String,
    pub callee_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callee_path: Option<String>,
    pub line: usize,
    pub column: usize,
    pub kind: CallKind,
    pub is_method_call: bool,
    /// Receiver expression rendered as a dotted path, e.g. `this.client`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    pub arg_count: usize,
}

// ---------------------------------------------------------------------------
// Indexing report
// ---------------------------------------------------------------------------

/// Counters returned by an indexing run. Update-only counters stay zero in
/// create mode.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub files_processed: usize,
    pub chunks_created: usize,
    pub files_skipped: usize,
    pub files_updated: usize,
    pub files_added: usize,
    pub files_deleted: usize,
    pub symbols: usize,
    pub dependencies: usize,
    pub calls: usize,
    pub summarized: usize,
    pub summarization_skipped: bool,
}

// ---------------------------------------------------------------------------
// Store statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub chunks: usize,
    pub files: usize,
    pub symbols: usize,
    pub dependencies: usize,
    pub calls: usize,
    pub symbols_by_kind: std::collections::BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_classification() {
        assert!(Dependency::classify_external("lodash"));
        assert!(Dependency::classify_external("@scope/pkg"));
        assert!(!Dependency::classify_external("./util"));
        assert!(!Dependency::classify_external("../lib/util"));
        assert!(!Dependency::classify_external("/abs/path"));
    }

    #[test]
    fn test_symbol_kind_round_trip() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::ArrowFunction,
            SymbolKind::Method,
            SymbolKind::Class,
            SymbolKind::Interface,
            SymbolKind::TypeAlias,
            SymbolKind::Enum,
            SymbolKind::EnumMember,
            SymbolKind::Property,
            SymbolKind::Variable,
            SymbolKind::Event,
            SymbolKind::Import,
            SymbolKind::Export,
            SymbolKind::Module,
            SymbolKind::Namespace,
        ] {
            assert_eq!(SymbolKind::parse(kind.label()), Some(kind));
        }
        assert_eq!(SymbolKind::parse("widget"), None);
    }

    #[test]
    fn test_index_status_serde() {
        let json = serde_json::to_string(&IndexStatus::Building).unwrap();
        assert_eq!(json, "\"building\"");
        let back: IndexStatus = serde_json::from_str("\"ready\"").unwrap();
        assert_eq!(back, IndexStatus::Ready);
    }
}
