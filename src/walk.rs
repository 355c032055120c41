//! File enumeration with layered ignore semantics.
//!
//! Produces the candidate set for indexing in a deterministic depth-first
//! order (directory entries sorted lexicographically) so progress reporting
//! and write order are reproducible run to run.

use crate::config::{Settings, TOOL_IGNORE_FILE};
use crate::types::{Result, SeekError, WalkedFile};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

// ---------------------------------------------------------------------------
// Built-in filters
// ---------------------------------------------------------------------------

/// Directory names never descended into, regardless of ignore files.
const SKIP_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "__pycache__",
    "target",
    "dist",
    "build",
    "out",
    ".next",
    ".nuxt",
    ".cache",
    ".turbo",
    "vendor",
    "coverage",
    ".venv",
    "venv",
];

/// File names and patterns excluded by default: lockfiles, minified output,
/// and known-sensitive material.
const SKIP_PATTERNS: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "go.sum",
    "*.min.js",
    "*.min.css",
    "*.map",
    ".env",
    ".env.*",
    "*.pem",
    "*.key",
    "*.p12",
    "*.pfx",
    "id_rsa*",
    "*.keystore",
];

/// Extensions treated as binary and dropped without content sniffing.
const BINARY_EXTS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svgz", "pdf", "zip", "tar", "gz", "bz2",
    "xz", "zst", "7z", "rar", "jar", "war", "class", "o", "a", "so", "dylib", "dll", "exe", "bin",
    "wasm", "pyc", "pyo", "db", "sqlite", "sqlite3", "parquet", "ttf", "otf", "woff", "woff2",
    "eot", "mp3", "mp4", "avi", "mov", "mkv", "wav", "flac", "ogg", "webm", "heic",
];

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| SeekError::input(format!("bad ignore pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| SeekError::input(format!("could not compile ignore patterns: {e}")))
}

fn builtin_globset() -> GlobSet {
    let patterns: Vec<String> = SKIP_PATTERNS.iter().map(|s| s.to_string()).collect();
    // Built-in patterns are static and known-good.
    build_globset(&patterns).expect("built-in skip patterns must compile")
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

/// Enumerate regular files under `root`, applying the exclusion layers in
/// order: built-ins, user excludes, secret patterns, per-root ignore files,
/// dotfile policy, size cap, binary-extension drop.
///
/// Unreadable directories and unstatable files are skipped with a warning;
/// a missing root is an input error.
pub fn walk(root: &Path, settings: &Settings) -> Result<Vec<WalkedFile>> {
    if !root.is_dir() {
        return Err(SeekError::input(format!("path not found: {}", root.display())));
    }

    let builtin = builtin_globset();
    let user_excludes = build_globset(&settings.exclude)?;
    let secrets = build_globset(&settings.secret_patterns)?;
    let binary_exts: HashSet<&str> = BINARY_EXTS.iter().copied().collect();

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(!settings.include_dotfiles)
        .follow_links(false)
        .git_global(false)
        .git_exclude(false)
        .git_ignore(settings.respect_ignore_files)
        .require_git(false)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b));
    if settings.respect_ignore_files {
        // Custom ignore files outrank .gitignore, so the tool file can
        // re-include what gitignore dropped.
        builder.add_custom_ignore_filename(TOOL_IGNORE_FILE);
    } else {
        builder.ignore(false);
    }
    builder.filter_entry(|entry| {
        if entry.file_type().is_some_and(|ft| ft.is_dir()) {
            let name = entry.file_name().to_string_lossy();
            return !SKIP_DIRS.contains(&name.as_ref());
        }
        true
    });

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let abs_path = entry.path().to_path_buf();
        let rel_path = abs_path
            .strip_prefix(root)
            .unwrap_or(&abs_path)
            .to_string_lossy()
            .replace('\\', "/");
        let file_name = abs_path.file_name().map(|n| n.to_string_lossy().to_string());

        let matches_layer = |set: &GlobSet| {
            set.is_match(&rel_path)
                || file_name.as_deref().map(|n| set.is_match(n)).unwrap_or(false)
        };
        if matches_layer(&builtin) || matches_layer(&user_excludes) || matches_layer(&secrets) {
            continue;
        }

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                warn!(path = %abs_path.display(), error = %e, "skipping unstatable file");
                continue;
            }
        };
        if size > settings.max_file_size {
            continue;
        }

        let ext = abs_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if binary_exts.contains(ext.as_str()) {
            continue;
        }

        files.push(WalkedFile { abs_path, rel_path, size, ext });
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn settings() -> Settings {
        Settings::default()
    }

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_walk_is_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.txt", "b");
        touch(dir.path(), "a.txt", "a");
        touch(dir.path(), "src/lib.ts", "export {}");

        let files = walk(dir.path(), &settings()).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["a.txt", "b.txt", "src/lib.ts"]);
        assert_eq!(files[2].ext, "ts");
    }

    #[test]
    fn test_builtin_dirs_and_lockfiles_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "node_modules/pkg/index.js", "x");
        touch(dir.path(), "target/debug/out.txt", "x");
        touch(dir.path(), "package-lock.json", "{}");
        touch(dir.path(), "app.min.js", "x");
        touch(dir.path(), "main.ts", "x");

        let files = walk(dir.path(), &settings()).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["main.ts"]);
    }

    #[test]
    fn test_secret_patterns_and_dotfiles() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), ".env", "TOKEN=x");
        touch(dir.path(), "deploy.pem", "---");
        touch(dir.path(), ".hidden.txt", "x");
        touch(dir.path(), "visible.txt", "x");

        let mut s = settings();
        s.secret_patterns = vec!["deploy.*".to_string()];
        let files = walk(dir.path(), &s).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["visible.txt"]);

        s.include_dotfiles = true;
        let files = walk(dir.path(), &s).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        // .env stays excluded by the built-in sensitive list even with
        // dotfiles included.
        assert_eq!(rels, vec![".hidden.txt", "visible.txt"]);
    }

    #[test]
    fn test_gitignore_and_tool_override() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), ".gitignore", "generated/*\n");
        touch(dir.path(), TOOL_IGNORE_FILE, "!generated/keep.ts\n");
        touch(dir.path(), "generated/drop.ts", "x");
        touch(dir.path(), "generated/keep.ts", "x");
        touch(dir.path(), "main.ts", "x");

        let files = walk(dir.path(), &settings()).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert!(rels.contains(&"generated/keep.ts"), "tool file should re-include: {rels:?}");
        assert!(!rels.contains(&"generated/drop.ts"), "gitignore should drop: {rels:?}");
        assert!(rels.contains(&"main.ts"));
    }

    #[test]
    fn test_size_cap_and_binary_ext() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "big.txt", &"x".repeat(2048));
        touch(dir.path(), "small.txt", "x");
        touch(dir.path(), "logo.png", "x");

        let mut s = settings();
        s.max_file_size = 1024;
        let files = walk(dir.path(), &s).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["small.txt"]);
    }

    #[test]
    fn test_missing_root_is_input_error() {
        let err = walk(Path::new("/nonexistent/codeseek-root"), &settings()).unwrap_err();
        assert!(matches!(err, SeekError::Input(_)));
    }

    #[test]
    fn test_bad_user_pattern_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings();
        s.exclude = vec!["[".to_string()];
        assert!(matches!(walk(dir.path(), &s).unwrap_err(), SeekError::Input(_)));
    }
}
