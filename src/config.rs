//! Runtime configuration: tool home layout and per-root settings.
//!
//! The tool home (`CODESEEK_HOME`, default `~/.codeseek`) holds everything the
//! engine persists: per-index databases, the embedding cache, daemon PID
//! files, logs, and sockets. Per-root settings load from `.codeseek.toml` at
//! the indexed root, overlaid on built-in defaults.

use crate::types::{Result, SeekError, MAX_FILE_SIZE};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const TOOL_IGNORE_FILE: &str = ".codeseekignore";
pub const CONFIG_FILE: &str = ".codeseek.toml";

// ---------------------------------------------------------------------------
// Tool home
// ---------------------------------------------------------------------------

/// Resolve the tool home directory. `CODESEEK_HOME` wins; otherwise
/// `~/.codeseek`.
pub fn tool_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("CODESEEK_HOME") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs::home_dir()
        .map(|h| h.join(".codeseek"))
        .ok_or_else(|| SeekError::input("could not determine home directory; set CODESEEK_HOME"))
}

/// Well-known subdirectories of the tool home.
#[derive(Debug, Clone)]
pub struct HomeDirs {
    pub db: PathBuf,
    pub cache: PathBuf,
    pub pids: PathBuf,
    pub logs: PathBuf,
    pub sockets: PathBuf,
}

impl HomeDirs {
    /// Resolve and create the home layout.
    pub fn open() -> Result<Self> {
        let home = tool_home()?;
        let dirs = HomeDirs {
            db: home.join("db"),
            cache: home.join("cache"),
            pids: home.join("pids"),
            logs: home.join("logs"),
            sockets: home.join("sockets"),
        };
        for dir in [&dirs.db, &dirs.cache, &dirs.pids, &dirs.logs, &dirs.sockets] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(dirs)
    }

    pub fn index_dir(&self, index: &str) -> PathBuf {
        self.db.join(index)
    }

    pub fn socket_path(&self, index: &str) -> PathBuf {
        self.sockets.join(format!("{index}.sock"))
    }

    pub fn pid_path(&self, index: &str) -> PathBuf {
        self.pids.join(format!("{index}.json"))
    }

    pub fn log_path(&self, index: &str) -> PathBuf {
        self.logs.join(format!("{index}.log"))
    }

    pub fn cache_db(&self) -> PathBuf {
        self.cache.join("embeddings.db")
    }
}

// ---------------------------------------------------------------------------
// Per-root settings
// ---------------------------------------------------------------------------

/// Settings controlling one indexing run. `.codeseek.toml` fields override
/// the defaults below.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Soft upper bound on estimated tokens per chunk.
    pub max_tokens: usize,
    /// Lower bound on trailing context reused by the next chunk.
    pub overlap_tokens: usize,
    /// Embedding model identifier, `provider:model`.
    pub model: String,
    /// Cache misses are embedded in batches of this size.
    pub embed_batch_size: usize,
    /// Chunks are flushed to the store in batches of this size.
    pub db_batch_size: usize,
    /// Per-file artifact production fans out across at most this many workers.
    pub concurrency: usize,
    /// Extra exclude globs applied after the built-in list.
    pub exclude: Vec<String>,
    /// Globs for files that must never be indexed (key material etc.).
    pub secret_patterns: Vec<String>,
    pub max_file_size: u64,
    pub include_dotfiles: bool,
    /// Honor `.gitignore` and the tool ignore file at the root.
    pub respect_ignore_files: bool,
    /// Summarization model, `provider:model`. None disables summarization.
    pub summary_model: Option<String>,
    pub resummarize: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_tokens: 400,
            overlap_tokens: 50,
            model: "ollama:nomic-embed-text".to_string(),
            embed_batch_size: 32,
            db_batch_size: 200,
            concurrency: 10,
            exclude: Vec::new(),
            secret_patterns: Vec::new(),
            max_file_size: MAX_FILE_SIZE,
            include_dotfiles: false,
            respect_ignore_files: true,
            summary_model: None,
            resummarize: false,
        }
    }
}

/// Raw TOML shape. Every field optional so partial configs overlay cleanly.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    max_tokens: Option<usize>,
    overlap_tokens: Option<usize>,
    model: Option<String>,
    embed_batch_size: Option<usize>,
    db_batch_size: Option<usize>,
    concurrency: Option<usize>,
    exclude: Option<Vec<String>>,
    secret_patterns: Option<Vec<String>>,
    max_file_size: Option<u64>,
    include_dotfiles: Option<bool>,
    respect_ignore_files: Option<bool>,
    summary_model: Option<String>,
    resummarize: Option<bool>,
}

impl Settings {
    /// Load settings for a root: defaults overlaid with `.codeseek.toml`
    /// when present. A malformed config is an input error, not a silent
    /// fallback.
    pub fn load(root: &Path) -> Result<Self> {
        let mut settings = Settings::default();
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(settings);
        }
        let raw = std::fs::read_to_string(&path)?;
        let file: FileConfig = toml::from_str(&raw)
            .map_err(|e| SeekError::input(format!("{}: {e}", path.display())))?;

        if let Some(v) = file.max_tokens {
            settings.max_tokens = v;
        }
        if let Some(v) = file.overlap_tokens {
            settings.overlap_tokens = v;
        }
        if let Some(v) = file.model {
            settings.model = v;
        }
        if let Some(v) = file.embed_batch_size {
            settings.embed_batch_size = v.max(1);
        }
        if let Some(v) = file.db_batch_size {
            settings.db_batch_size = v.max(1);
        }
        if let Some(v) = file.concurrency {
            settings.concurrency = v.max(1);
        }
        if let Some(v) = file.exclude {
            settings.exclude = v;
        }
        if let Some(v) = file.secret_patterns {
            settings.secret_patterns = v;
        }
        if let Some(v) = file.max_file_size {
            settings.max_file_size = v;
        }
        if let Some(v) = file.include_dotfiles {
            settings.include_dotfiles = v;
        }
        if let Some(v) = file.respect_ignore_files {
            settings.respect_ignore_files = v;
        }
        if file.summary_model.is_some() {
            settings.summary_model = file.summary_model;
        }
        if let Some(v) = file.resummarize {
            settings.resummarize = v;
        }

        if settings.overlap_tokens >= settings.max_tokens {
            return Err(SeekError::input(format!(
                "overlap_tokens ({}) must be smaller than max_tokens ({})",
                settings.overlap_tokens, settings.max_tokens
            )));
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(dir.path()).unwrap();
        assert_eq!(s.max_tokens, 400);
        assert_eq!(s.overlap_tokens, 50);
        assert!(s.respect_ignore_files);
    }

    #[test]
    fn test_config_overlay() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "max_tokens = 800\nexclude = [\"*.gen.ts\"]\nmodel = \"mock:384\"\n",
        )
        .unwrap();
        let s = Settings::load(dir.path()).unwrap();
        assert_eq!(s.max_tokens, 800);
        assert_eq!(s.exclude, vec!["*.gen.ts".to_string()]);
        assert_eq!(s.model, "mock:384");
        // untouched fields keep defaults
        assert_eq!(s.embed_batch_size, 32);
    }

    #[test]
    fn test_overlap_must_be_below_max() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "max_tokens = 50\noverlap_tokens = 50\n")
            .unwrap();
        assert!(Settings::load(dir.path()).is_err());
    }

    #[test]
    fn test_malformed_config_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "max_tokens = \"lots\"").unwrap();
        let err = Settings::load(dir.path()).unwrap_err();
        assert!(matches!(err, SeekError::Input(_)));
    }
}
