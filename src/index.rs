//! Indexing orchestrator: walker → hasher → chunker → embedder → store.
//!
//! Three modes: `create` (target must not exist), `update` (incremental
//! against the stored `path → hash` map), `retry` (purge a failed index and
//! rebuild). Per-file artifact production (read, hash, chunk, extract) fans
//! out across a bounded rayon pool in walk order; embedding resolution and
//! store writes stay sequential so write order follows walker order and each
//! file's metadata upsert happens after its chunk writes.

use crate::cache::EmbeddingCache;
use crate::chunk::{chunk_file, ChunkLimits};
use crate::config::{HomeDirs, Settings};
use crate::embed::EmbeddingProvider;
use crate::extract::{self, Extraction, Language};
use crate::hash::{hash_bytes, stable_id};
use crate::store::Store;
use crate::summarize::{Summarizer, SymbolContext};
use crate::tokenizer::EstimateTokenizer;
use crate::types::{
    Chunk, IndexMeta, IndexReport, IndexStatus, Result, SeekError, Symbol, SymbolKind, WalkedFile,
};
use crate::walk::walk;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    Create,
    Update,
    Retry,
}

// ---------------------------------------------------------------------------
// Per-file artifacts (produced in parallel, consumed in walk order)
// ---------------------------------------------------------------------------

enum Artifact {
    /// Content hash matches the stored one; nothing to do.
    Unchanged { file: WalkedFile },
    /// New or changed content with its chunks and code-intel streams.
    Fresh {
        file: WalkedFile,
        hash: String,
        previously_indexed: bool,
        chunks: Vec<Chunk>,
        extraction: Option<Extraction>,
        content: String,
    },
    /// Read failed after the walk admitted the file.
    Unreadable { file: WalkedFile },
}

fn produce_artifact(
    file: &WalkedFile,
    prior: &HashMap<String, String>,
    settings: &Settings,
    update_mode: bool,
) -> Artifact {
    let bytes = match std::fs::read(&file.abs_path) {
        Ok(b) => b,
        Err(e) => {
            warn!(path = %file.abs_path.display(), error = %e, "skipping unreadable file");
            return Artifact::Unreadable { file: file.clone() };
        }
    };
    let hash = hash_bytes(&bytes);
    let abs = file.abs_path.to_string_lossy().to_string();
    let previously_indexed = prior.contains_key(&abs);
    if update_mode && prior.get(&abs).map(String::as_str) == Some(hash.as_str()) {
        return Artifact::Unchanged { file: file.clone() };
    }

    let content = String::from_utf8_lossy(&bytes).to_string();
    let limits = ChunkLimits {
        max_tokens: settings.max_tokens,
        overlap_tokens: settings.overlap_tokens,
    };
    let pieces = chunk_file(&content, &file.ext, limits, &EstimateTokenizer);
    let now = chrono::Utc::now().to_rfc3339();
    let chunks: Vec<Chunk> = pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| Chunk {
            id: stable_id(&[&file.rel_path, &i.to_string(), &hash]),
            path: abs.clone(),
            rel_path: file.rel_path.clone(),
            content_hash: hash.clone(),
            chunk_index: i,
            content: piece.content,
            embedding: Vec::new(),
            start_line: piece.start_line,
            end_line: piece.end_line,
            ext: file.ext.clone(),
            created_at: now.clone(),
        })
        .collect();

    let extraction = if Language::is_code_ext(&file.ext) {
        Some(extract::extract(&content, &abs, &file.rel_path, &file.ext))
    } else {
        None
    };

    Artifact::Fresh {
        file: file.clone(),
        hash,
        previously_indexed,
        chunks,
        extraction,
        content,
    }
}

// ---------------------------------------------------------------------------
// Relative import resolution
// ---------------------------------------------------------------------------

/// Collapse `.` and `..` segments of a slash-joined relative path.
fn normalize_rel(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

const RESOLVE_EXTS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "sol", "py", "rs", "go", "java", "c", "h", "cpp",
    "hpp",
];

/// Resolve a relative module specifier against the walked file set: the
/// target as written, then with each known extension, then as a directory
/// index. External specifiers stay unresolved.
fn resolve_target(
    source_rel: &str,
    target: &str,
    files: &std::collections::HashSet<String>,
) -> Option<String> {
    let base = match source_rel.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    };
    let joined = if base.is_empty() {
        normalize_rel(target)
    } else {
        normalize_rel(&format!("{base}/{target}"))
    };
    if files.contains(&joined) {
        return Some(joined);
    }
    for ext in RESOLVE_EXTS {
        let with_ext = format!("{joined}.{ext}");
        if files.contains(&with_ext) {
            return Some(with_ext);
        }
        let as_index = format!("{joined}/index.{ext}");
        if files.contains(&as_index) {
            return Some(as_index);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Embedding resolution (cache in front of the provider)
// ---------------------------------------------------------------------------

/// Fill every chunk's vector, looking up the cache per chunk and embedding
/// misses in provider batches. Provider failures are fatal.
fn resolve_embeddings(
    chunks: &mut [Chunk],
    provider: &dyn EmbeddingProvider,
    cache: &mut EmbeddingCache,
    batch_size: usize,
) -> Result<()> {
    let model = provider.model_id().to_string();
    let mut misses: Vec<usize> = Vec::new();
    for (i, chunk) in chunks.iter_mut().enumerate() {
        match cache.get(&model, &chunk.content)? {
            Some(vector) => chunk.embedding = vector,
            None => misses.push(i),
        }
    }

    for batch in misses.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|&i| chunks[i].content.clone()).collect();
        let vectors = provider.embed(&texts)?;
        if vectors.len() != texts.len() {
            return Err(SeekError::provider(format!(
                "{model}: expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        let entries: Vec<(&str, &[f32])> = batch
            .iter()
            .zip(&vectors)
            .map(|(&i, v)| (chunks[i].content.as_str(), v.as_slice()))
            .collect();
        cache.put_batch(&model, &entries)?;
        for (&i, vector) in batch.iter().zip(vectors) {
            chunks[i].embedding = vector;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct IndexJob<'a> {
    pub home: &'a HomeDirs,
    pub name: &'a str,
    /// Required for `create`; `update`/`retry` fall back to the stored root.
    pub root: Option<&'a Path>,
    pub mode: IndexMode,
    pub settings: &'a Settings,
}

pub fn run_index(
    job: &IndexJob,
    provider: &dyn EmbeddingProvider,
    cache: &mut EmbeddingCache,
    summarizer: Option<&dyn Summarizer>,
) -> Result<IndexReport> {
    let mut store = open_target(job, provider)?;
    let root = store.meta().root.clone();
    store.set_status(IndexStatus::Building)?;

    match index_into(&mut store, &root, job, provider, cache, summarizer) {
        Ok(report) => {
            store.set_status(IndexStatus::Ready)?;
            info!(
                index = job.name,
                files = report.files_processed,
                chunks = report.chunks_created,
                "indexing complete"
            );
            Ok(report)
        }
        Err(e) => {
            // best effort: the failure we report is the original one
            let _ = store.set_status(IndexStatus::Failed);
            Err(e)
        }
    }
}

/// Mode checks happen before any state mutation so conflicts leave the
/// persisted index untouched.
fn open_target(job: &IndexJob, provider: &dyn EmbeddingProvider) -> Result<Store> {
    match job.mode {
        IndexMode::Create => {
            let root = job
                .root
                .ok_or_else(|| SeekError::input("create requires a root path"))?;
            let root = root
                .canonicalize()
                .map_err(|_| SeekError::input(format!("path not found: {}", root.display())))?;
            let dimensions = provider.dimensions()?;
            Store::create(job.home, job.name, &root, provider.model_id(), dimensions)
        }
        IndexMode::Update => {
            let store = Store::open(job.home, job.name)?;
            if store.meta().status == IndexStatus::Failed {
                return Err(SeekError::conflict(format!(
                    "index '{}' is failed; run retry to restart it",
                    job.name
                )));
            }
            if store.meta().model != provider.model_id() {
                warn!(
                    index = job.name,
                    stored = store.meta().model.as_str(),
                    requested = provider.model_id(),
                    "embedding model differs from the one the index was built with"
                );
            }
            Ok(store)
        }
        IndexMode::Retry => {
            let mut store = Store::open(job.home, job.name)?;
            if store.meta().status != IndexStatus::Failed {
                return Err(SeekError::conflict(format!(
                    "index '{}' is {}; retry only applies to failed indexes",
                    job.name,
                    store.meta().status
                )));
            }
            store.delete_all_chunks()?;
            store.clear_code_intel()?;
            Ok(store)
        }
    }
}

fn index_into(
    store: &mut Store,
    root: &Path,
    job: &IndexJob,
    provider: &dyn EmbeddingProvider,
    cache: &mut EmbeddingCache,
    summarizer: Option<&dyn Summarizer>,
) -> Result<IndexReport> {
    let settings = job.settings;
    let update_mode = job.mode == IndexMode::Update;
    let mut report = IndexReport::default();
    report.summarization_skipped = summarizer.is_none();

    let prior = if job.mode == IndexMode::Create {
        HashMap::new()
    } else {
        store.all_file_hashes()?
    };

    let files = walk(root, settings)?;
    debug!(index = job.name, files = files.len(), "walk complete");
    let rel_paths: std::collections::HashSet<String> =
        files.iter().map(|f| f.rel_path.clone()).collect();

    // Parallel artifact production in walk order, bounded by the configured
    // concurrency cap.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.concurrency.max(1))
        .build()
        .map_err(|e| SeekError::input(format!("could not build worker pool: {e}")))?;
    let artifacts: Vec<Artifact> = pool.install(|| {
        use rayon::prelude::*;
        files
            .par_iter()
            .map(|f| produce_artifact(f, &prior, settings, update_mode))
            .collect()
    });

    // Sequential write phase. Chunks buffer into db_batch_size flushes; the
    // file-metadata upsert for a file is queued with its last chunk and runs
    // right after that flush.
    let mut pending_chunks: Vec<Chunk> = Vec::new();
    let mut pending_meta: Vec<(String, String, usize)> = Vec::new();
    let mut seen_paths: Vec<String> = Vec::new();

    macro_rules! flush_pending {
        () => {
            if !pending_chunks.is_empty() || !pending_meta.is_empty() {
                if !pending_chunks.is_empty() {
                    store.add_chunks(&pending_chunks)?;
                    pending_chunks.clear();
                }
                for (path, hash, count) in pending_meta.drain(..) {
                    store.upsert_file_meta(&path, &hash, count)?;
                }
            }
        };
    }

    for artifact in artifacts {
        match artifact {
            Artifact::Unreadable { .. } => {}
            Artifact::Unchanged { file } => {
                report.files_processed += 1;
                report.files_skipped += 1;
                seen_paths.push(file.abs_path.to_string_lossy().to_string());
            }
            Artifact::Fresh {
                file,
                hash,
                previously_indexed,
                mut chunks,
                extraction,
                content,
            } => {
                report.files_processed += 1;
                let abs = file.abs_path.to_string_lossy().to_string();
                seen_paths.push(abs.clone());

                if previously_indexed {
                    report.files_updated += 1;
                    store.delete_chunks_by_file(&abs)?;
                    store.delete_code_intel_by_file(&file.rel_path)?;
                } else {
                    report.files_added += 1;
                }

                resolve_embeddings(&mut chunks, provider, cache, settings.embed_batch_size)?;
                report.chunks_created += chunks.len();
                let chunk_count = chunks.len();
                pending_chunks.extend(chunks);
                pending_meta.push((abs, hash, chunk_count));
                if pending_chunks.len() >= settings.db_batch_size {
                    flush_pending!();
                }

                if let Some(mut extraction) = extraction {
                    // code intel rows are written after the file's chunks
                    flush_pending!();
                    for dep in &mut extraction.dependencies {
                        if !dep.is_external {
                            dep.resolved_path =
                                resolve_target(&dep.source, &dep.target, &rel_paths);
                        }
                    }
                    report.symbols += extraction.symbols.len();
                    report.dependencies += extraction.dependencies.len();
                    report.calls += extraction.calls.len();
                    store.add_symbols(&extraction.symbols)?;
                    store.add_dependencies(&extraction.dependencies)?;
                    store.add_calls(&extraction.calls)?;

                    if let Some(summarizer) = summarizer {
                        report.summarized += summarize_symbols(
                            store,
                            summarizer,
                            &extraction.symbols,
                            &content,
                            settings.resummarize,
                        );
                    }
                }
            }
        }
    }
    flush_pending!();

    // Deletion sweep: anything indexed before but absent from this walk.
    let seen: std::collections::HashSet<&str> =
        seen_paths.iter().map(String::as_str).collect();
    for (path, _) in prior.iter() {
        if seen.contains(path.as_str()) {
            continue;
        }
        store.delete_chunks_by_file(path)?;
        store.delete_file_meta(path)?;
        let rel = Path::new(path)
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| path.clone());
        store.delete_code_intel_by_file(&rel)?;
        report.files_deleted += 1;
    }

    Ok(report)
}

/// Summarize freshly extracted symbols. Imports/exports are skipped, as are
/// symbols that already carry a summary unless `resummarize` is set.
/// Failures are logged and never abort indexing.
fn summarize_symbols(
    store: &mut Store,
    summarizer: &dyn Summarizer,
    symbols: &[Symbol],
    content: &str,
    resummarize: bool,
) -> usize {
    let lines: Vec<&str> = content.lines().collect();
    let mut count = 0usize;
    for sym in symbols {
        if matches!(sym.kind, SymbolKind::Import | SymbolKind::Export) {
            continue;
        }
        if sym.summary.is_some() && !resummarize {
            continue;
        }
        let start = sym.range.start_line.saturating_sub(1).min(lines.len());
        let end = sym.range.end_line.min(lines.len()).min(start + 60);
        let code = lines[start..end].join("\n");
        let ctx = SymbolContext {
            name: &sym.name,
            kind: sym.kind.label(),
            signature: sym.signature.as_deref(),
            documentation: sym.documentation.as_deref(),
            code: &code,
        };
        match summarizer.summarize_symbol(&ctx) {
            Ok(summary) => {
                if store
                    .update_symbol_summary(&sym.id, &summary, summarizer.model_id())
                    .is_ok()
                {
                    count += 1;
                }
            }
            Err(e) => {
                warn!(symbol = sym.name.as_str(), error = %e, "summarization failed");
            }
        }
    }
    count
}

/// Convenience: metadata for an index without holding the store open.
pub fn index_meta(home: &HomeDirs, name: &str) -> Result<IndexMeta> {
    Ok(Store::open(home, name)?.meta().clone())
}
