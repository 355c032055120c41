//! Per-index vector + metadata store.
//!
//! One directory per index under `<home>/db/<name>/`: a `meta.json` sidecar
//! (written atomically via write-then-rename) and an SQLite database holding
//! the chunk, file-metadata, symbol, dependency, and call-edge tables.
//! Vector search is brute-force cosine over the chunk embeddings; the store
//! reports cosine distance (smaller is better) and callers translate to
//! similarity as `1 − distance`.

use crate::cache::{bytes_to_vector, vector_to_bytes};
use crate::config::HomeDirs;
use crate::embed::cosine_distance;
use crate::types::{
    CallEdge, CallKind, Chunk, DependencyKind, IndexMeta, IndexStatus, Result, ScoredChunk,
    SeekError, StoreStats, Symbol, SymbolKind, SCHEMA_VERSION,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

const META_FILE: &str = "meta.json";
const DB_FILE: &str = "index.db";

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    id           TEXT PRIMARY KEY,
    path         TEXT NOT NULL,
    rel_path     TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    chunk_index  INTEGER NOT NULL,
    content      TEXT NOT NULL,
    embedding    BLOB NOT NULL,
    start_line   INTEGER NOT NULL,
    end_line     INTEGER NOT NULL,
    ext          TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    UNIQUE (path, chunk_index)
);
CREATE INDEX IF NOT EXISTS idx_chunks_path ON chunks(path);

CREATE TABLE IF NOT EXISTS file_meta (
    path         TEXT PRIMARY KEY,
    content_hash TEXT NOT NULL,
    chunk_count  INTEGER NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS symbols (
    id             TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    kind           TEXT NOT NULL,
    path           TEXT NOT NULL,
    rel_path       TEXT NOT NULL,
    start_line     INTEGER NOT NULL,
    start_col      INTEGER NOT NULL,
    end_line       INTEGER NOT NULL,
    end_col        INTEGER NOT NULL,
    exported       INTEGER NOT NULL,
    default_export INTEGER NOT NULL,
    signature      TEXT,
    doc            TEXT,
    parent_id      TEXT,
    modifiers      TEXT NOT NULL DEFAULT '[]',
    summary        TEXT,
    summary_model  TEXT
);
CREATE INDEX IF NOT EXISTS idx_symbols_rel_path ON symbols(rel_path);
CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);

CREATE TABLE IF NOT EXISTS dependencies (
    id            TEXT PRIMARY KEY,
    source        TEXT NOT NULL,
    target        TEXT NOT NULL,
    resolved_path TEXT,
    kind          TEXT NOT NULL,
    names         TEXT NOT NULL DEFAULT '[]',
    line          INTEGER NOT NULL,
    external      INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_dependencies_source ON dependencies(source);

CREATE TABLE IF NOT EXISTS call_edges (
    id          TEXT PRIMARY KEY,
    caller_id   TEXT NOT NULL,
    caller_name TEXT,
    caller_path TEXT NOT NULL,
    callee_name TEXT NOT NULL,
    callee_id   TEXT,
    callee_path TEXT,
    line        INTEGER NOT NULL,
    col         INTEGER NOT NULL,
    kind        TEXT NOT NULL,
    method_call INTEGER NOT NULL,
    receiver    TEXT,
    arg_count   INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_call_edges_caller_path ON call_edges(caller_path);
CREATE INDEX IF NOT EXISTS idx_call_edges_callee_name ON call_edges(callee_name);
";

// ---------------------------------------------------------------------------
// Symbol listing filter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SymbolFilter {
    pub kind: Option<SymbolKind>,
    pub rel_path: Option<String>,
    pub exported: Option<bool>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Store {
    conn: Connection,
    dir: PathBuf,
    meta: IndexMeta,
}

impl Store {
    /// Create a new index. Fails with a conflict if the name already exists.
    pub fn create(
        home: &HomeDirs,
        name: &str,
        root: &Path,
        model: &str,
        dimensions: usize,
    ) -> Result<Store> {
        validate_index_name(name)?;
        let dir = home.index_dir(name);
        if dir.join(META_FILE).exists() {
            return Err(SeekError::conflict(format!(
                "index '{name}' already exists; use update, or delete it first"
            )));
        }
        std::fs::create_dir_all(&dir)?;
        let now = chrono::Utc::now().to_rfc3339();
        let meta = IndexMeta {
            name: name.to_string(),
            root: root.to_path_buf(),
            model: model.to_string(),
            dimensions,
            status: IndexStatus::Building,
            schema_version: SCHEMA_VERSION,
            created_at: now.clone(),
            updated_at: now,
            chunk_count: 0,
            generation: 0,
        };
        write_meta(&dir, &meta)?;

        let conn = open_db(&dir)?;
        debug!(index = name, dir = %dir.display(), "index created");
        Ok(Store { conn, dir, meta })
    }

    /// Open an existing index.
    pub fn open(home: &HomeDirs, name: &str) -> Result<Store> {
        let dir = home.index_dir(name);
        let meta = read_meta(&dir, name)?;
        let conn = open_db(&dir)?;
        Ok(Store { conn, dir, meta })
    }

    /// Delete an index directory and everything in it.
    pub fn delete(home: &HomeDirs, name: &str) -> Result<()> {
        let dir = home.index_dir(name);
        if !dir.join(META_FILE).exists() {
            return Err(SeekError::UnknownIndex(name.to_string()));
        }
        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    /// All index metadata records under the home, sorted by name.
    pub fn list(home: &HomeDirs) -> Result<Vec<IndexMeta>> {
        let mut out = Vec::new();
        if !home.db.exists() {
            return Ok(out);
        }
        for entry in std::fs::read_dir(&home.db)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Ok(meta) = read_meta(&entry.path(), &name) {
                out.push(meta);
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    /// Transition the index status. Reaching `ready` refreshes the chunk
    /// count and bumps the generation counter.
    pub fn set_status(&mut self, status: IndexStatus) -> Result<()> {
        self.meta.status = status;
        self.meta.updated_at = chrono::Utc::now().to_rfc3339();
        if status == IndexStatus::Ready {
            self.meta.chunk_count = self.count_chunks()?;
            self.meta.generation += 1;
        }
        write_meta(&self.dir, &self.meta)
    }

    // -----------------------------------------------------------------------
    // Chunk table
    // -----------------------------------------------------------------------

    pub fn add_chunks(&mut self, chunks: &[Chunk]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO chunks
                 (id, path, rel_path, content_hash, chunk_index, content, embedding,
                  start_line, end_line, ext, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.id,
                    chunk.path,
                    chunk.rel_path,
                    chunk.content_hash,
                    chunk.chunk_index as i64,
                    chunk.content,
                    vector_to_bytes(&chunk.embedding),
                    chunk.start_line as i64,
                    chunk.end_line as i64,
                    chunk.ext,
                    chunk.created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Top-k chunks by cosine distance to the query vector.
    pub fn search_by_vector(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, path, rel_path, content_hash, chunk_index, content, embedding,
                    start_line, end_line, ext, created_at
             FROM chunks",
        )?;
        let mut scored: Vec<ScoredChunk> = stmt
            .query_map([], |row| {
                let chunk = chunk_from_row(row)?;
                Ok(chunk)
            })?
            .filter_map(|r| r.ok())
            .map(|chunk| {
                let distance = cosine_distance(query, &chunk.embedding);
                ScoredChunk { chunk, distance }
            })
            .collect();
        scored.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn get_chunks_by_file(&self, path: &str) -> Result<Vec<Chunk>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, path, rel_path, content_hash, chunk_index, content, embedding,
                    start_line, end_line, ext, created_at
             FROM chunks WHERE path = ?1 ORDER BY chunk_index",
        )?;
        let rows = stmt
            .query_map(params![path], chunk_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_chunks_by_file(&mut self, path: &str) -> Result<usize> {
        let removed =
            self.conn.execute("DELETE FROM chunks WHERE path = ?1", params![path])?;
        Ok(removed)
    }

    pub fn delete_all_chunks(&mut self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM chunks", [])?;
        self.conn.execute("DELETE FROM file_meta", [])?;
        Ok(removed)
    }

    pub fn count_chunks(&self) -> Result<usize> {
        let n: usize = self.conn.query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))?;
        Ok(n)
    }

    // -----------------------------------------------------------------------
    // File metadata table
    // -----------------------------------------------------------------------

    pub fn upsert_file_meta(&self, path: &str, hash: &str, chunk_count: usize) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO file_meta (path, content_hash, chunk_count, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![path, hash, chunk_count as i64, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete_file_meta(&self, path: &str) -> Result<()> {
        self.conn.execute("DELETE FROM file_meta WHERE path = ?1", params![path])?;
        Ok(())
    }

    pub fn get_file_meta(&self, path: &str) -> Result<Option<(String, usize)>> {
        let row = self
            .conn
            .query_row(
                "SELECT content_hash, chunk_count FROM file_meta WHERE path = ?1",
                params![path],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as usize)),
            )
            .optional()?;
        Ok(row)
    }

    /// Map of `path → content hash` for change detection. Falls back to
    /// scanning the chunk table when the metadata table is empty but chunks
    /// exist (indexes written before the metadata table was introduced).
    pub fn all_file_hashes(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT path, content_hash FROM file_meta")?;
        let map: HashMap<String, String> = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
            .collect::<std::result::Result<_, _>>()?;
        if !map.is_empty() {
            return Ok(map);
        }
        if self.count_chunks()? == 0 {
            return Ok(map);
        }
        debug!(index = self.meta.name.as_str(), "file_meta empty, scanning chunks for hashes");
        let mut stmt =
            self.conn.prepare("SELECT DISTINCT path, content_hash FROM chunks")?;
        let map = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(map)
    }

    pub fn count_files(&self) -> Result<usize> {
        let n: usize =
            self.conn.query_row("SELECT COUNT(*) FROM file_meta", [], |r| r.get(0))?;
        Ok(n)
    }

    // -----------------------------------------------------------------------
    // Symbols
    // -----------------------------------------------------------------------

    pub fn add_symbols(&mut self, symbols: &[Symbol]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO symbols
                 (id, name, kind, path, rel_path, start_line, start_col, end_line, end_col,
                  exported, default_export, signature, doc, parent_id, modifiers,
                  summary, summary_model)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            )?;
            for sym in symbols {
                stmt.execute(params![
                    sym.id,
                    sym.name,
                    sym.kind.label(),
                    sym.path,
                    sym.rel_path,
                    sym.range.start_line as i64,
                    sym.range.start_col as i64,
                    sym.range.end_line as i64,
                    sym.range.end_col as i64,
                    sym.is_exported as i64,
                    sym.is_default_export as i64,
                    sym.signature,
                    sym.documentation,
                    sym.parent_id,
                    serde_json::to_string(&sym.modifiers)?,
                    sym.summary,
                    sym.summary_model,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn list_symbols(&self, filter: &SymbolFilter) -> Result<Vec<Symbol>> {
        let mut sql = String::from(
            "SELECT id, name, kind, path, rel_path, start_line, start_col, end_line, end_col,
                    exported, default_export, signature, doc, parent_id, modifiers,
                    summary, summary_model
             FROM symbols WHERE 1=1",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(kind) = filter.kind {
            sql.push_str(" AND kind = ?");
            args.push(Box::new(kind.label().to_string()));
        }
        if let Some(rel) = &filter.rel_path {
            sql.push_str(" AND rel_path = ?");
            args.push(Box::new(rel.clone()));
        }
        if let Some(exported) = filter.exported {
            sql.push_str(" AND exported = ?");
            args.push(Box::new(exported as i64));
        }
        sql.push_str(" ORDER BY rel_path, start_line");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args), symbol_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Case-insensitive substring match on symbol names.
    pub fn search_symbols_by_name(&self, needle: &str) -> Result<Vec<Symbol>> {
        let pattern = format!("%{}%", needle.replace('%', "\\%").replace('_', "\\_"));
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, name, kind, path, rel_path, start_line, start_col, end_line, end_col,
                    exported, default_export, signature, doc, parent_id, modifiers,
                    summary, summary_model
             FROM symbols WHERE name LIKE ?1 ESCAPE '\\'
             ORDER BY rel_path, start_line",
        )?;
        let rows = stmt
            .query_map(params![pattern], symbol_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_symbol_summary(&self, id: &str, summary: &str, model: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE symbols SET summary = ?2, summary_model = ?3 WHERE id = ?1",
            params![id, summary, model],
        )?;
        Ok(())
    }

    pub fn all_symbols(&self) -> Result<Vec<Symbol>> {
        self.list_symbols(&SymbolFilter::default())
    }

    // -----------------------------------------------------------------------
    // Dependencies
    // -----------------------------------------------------------------------

    pub fn add_dependencies(&mut self, deps: &[crate::types::Dependency]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO dependencies
                 (id, source, target, resolved_path, kind, names, line, external)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for dep in deps {
                stmt.execute(params![
                    dep.id,
                    dep.source,
                    dep.target,
                    dep.resolved_path,
                    dep.kind.label(),
                    serde_json::to_string(&dep.names)?,
                    dep.line as i64,
                    dep.is_external as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn all_dependencies(&self) -> Result<Vec<crate::types::Dependency>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, source, target, resolved_path, kind, names, line, external
             FROM dependencies ORDER BY source, line",
        )?;
        let rows = stmt
            .query_map([], dependency_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Adjacency map over import edges: source file → target module strings
    /// (resolved path when available).
    pub fn dependency_graph(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut graph: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for dep in self.all_dependencies()? {
            let target = dep.resolved_path.clone().unwrap_or_else(|| dep.target.clone());
            graph.entry(dep.source).or_default().push(target);
        }
        for targets in graph.values_mut() {
            targets.sort();
            targets.dedup();
        }
        Ok(graph)
    }

    // -----------------------------------------------------------------------
    // Call edges
    // -----------------------------------------------------------------------

    pub fn add_calls(&mut self, calls: &[CallEdge]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO call_edges
                 (id, caller_id, caller_name, caller_path, callee_name, callee_id, callee_path,
                  line, col, kind, method_call, receiver, arg_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for call in calls {
                stmt.execute(params![
                    call.id,
                    call.caller_id,
                    call.caller_name,
                    call.caller_path,
                    call.callee_name,
                    call.callee_id,
                    call.callee_path,
                    call.line as i64,
                    call.column as i64,
                    call.kind.label(),
                    call.is_method_call as i64,
                    call.receiver,
                    call.arg_count as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn all_calls(&self) -> Result<Vec<CallEdge>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, caller_id, caller_name, caller_path, callee_name, callee_id, callee_path,
                    line, col, kind, method_call, receiver, arg_count
             FROM call_edges ORDER BY caller_path, line",
        )?;
        let rows = stmt
            .query_map([], call_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Adjacency map over resolved call edges: caller file → callee files.
    pub fn call_graph(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut graph: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut stmt = self.conn.prepare(
            "SELECT caller_path, callee_path FROM call_edges WHERE callee_path IS NOT NULL",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (from, to) = row?;
            graph.entry(from).or_default().push(to);
        }
        for targets in graph.values_mut() {
            targets.sort();
            targets.dedup();
        }
        Ok(graph)
    }

    // -----------------------------------------------------------------------
    // Per-file deletion and bulk clear
    // -----------------------------------------------------------------------

    /// Remove code-intel rows produced from one file.
    pub fn delete_code_intel_by_file(&mut self, rel_path: &str) -> Result<()> {
        self.conn.execute("DELETE FROM symbols WHERE rel_path = ?1", params![rel_path])?;
        self.conn.execute("DELETE FROM dependencies WHERE source = ?1", params![rel_path])?;
        self.conn.execute("DELETE FROM call_edges WHERE caller_path = ?1", params![rel_path])?;
        Ok(())
    }

    pub fn clear_code_intel(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM symbols", [])?;
        self.conn.execute("DELETE FROM dependencies", [])?;
        self.conn.execute("DELETE FROM call_edges", [])?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> Result<StoreStats> {
        let chunks = self.count_chunks()?;
        let files = self.count_files()?;
        let symbols: usize =
            self.conn.query_row("SELECT COUNT(*) FROM symbols", [], |r| r.get(0))?;
        let dependencies: usize =
            self.conn.query_row("SELECT COUNT(*) FROM dependencies", [], |r| r.get(0))?;
        let calls: usize =
            self.conn.query_row("SELECT COUNT(*) FROM call_edges", [], |r| r.get(0))?;

        let mut symbols_by_kind = BTreeMap::new();
        let mut stmt =
            self.conn.prepare("SELECT kind, COUNT(*) FROM symbols GROUP BY kind")?;
        let rows = stmt.query_map([], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as usize))
        })?;
        for row in rows {
            let (kind, count) = row?;
            symbols_by_kind.insert(kind, count);
        }

        Ok(StoreStats { chunks, files, symbols, dependencies, calls, symbols_by_kind })
    }
}

// ---------------------------------------------------------------------------
// meta.json handling
// ---------------------------------------------------------------------------

fn validate_index_name(name: &str) -> Result<()> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(SeekError::input(format!(
            "index name '{name}' must be non-empty and use only [A-Za-z0-9._-]"
        )));
    }
    Ok(())
}

fn write_meta(dir: &Path, meta: &IndexMeta) -> Result<()> {
    let tmp = dir.join(format!("{META_FILE}.tmp"));
    let body = serde_json::to_string_pretty(meta)?;
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, dir.join(META_FILE))?;
    Ok(())
}

fn read_meta(dir: &Path, name: &str) -> Result<IndexMeta> {
    let path = dir.join(META_FILE);
    if !path.exists() {
        return Err(SeekError::UnknownIndex(name.to_string()));
    }
    let raw = std::fs::read_to_string(&path)?;
    let meta: IndexMeta = serde_json::from_str(&raw)?;
    if meta.schema_version > SCHEMA_VERSION {
        return Err(SeekError::SchemaNewer {
            found: meta.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(meta)
}

fn open_db(dir: &Path) -> Result<Connection> {
    let conn = Connection::open(dir.join(DB_FILE))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(conn)
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn chunk_from_row(row: &Row) -> rusqlite::Result<Chunk> {
    Ok(Chunk {
        id: row.get(0)?,
        path: row.get(1)?,
        rel_path: row.get(2)?,
        content_hash: row.get(3)?,
        chunk_index: row.get::<_, i64>(4)? as usize,
        content: row.get(5)?,
        embedding: bytes_to_vector(&row.get::<_, Vec<u8>>(6)?),
        start_line: row.get::<_, i64>(7)? as usize,
        end_line: row.get::<_, i64>(8)? as usize,
        ext: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn symbol_from_row(row: &Row) -> rusqlite::Result<Symbol> {
    let kind_label: String = row.get(2)?;
    let modifiers_json: String = row.get(14)?;
    Ok(Symbol {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: SymbolKind::parse(&kind_label).unwrap_or(SymbolKind::Variable),
        path: row.get(3)?,
        rel_path: row.get(4)?,
        range: crate::types::SourceRange {
            start_line: row.get::<_, i64>(5)? as usize,
            start_col: row.get::<_, i64>(6)? as usize,
            end_line: row.get::<_, i64>(7)? as usize,
            end_col: row.get::<_, i64>(8)? as usize,
        },
        is_exported: row.get::<_, i64>(9)? != 0,
        is_default_export: row.get::<_, i64>(10)? != 0,
        signature: row.get(11)?,
        documentation: row.get(12)?,
        parent_id: row.get(13)?,
        modifiers: serde_json::from_str(&modifiers_json).unwrap_or_default(),
        summary: row.get(15)?,
        summary_model: row.get(16)?,
    })
}

fn dependency_from_row(row: &Row) -> rusqlite::Result<crate::types::Dependency> {
    let kind_label: String = row.get(4)?;
    let names_json: String = row.get(5)?;
    Ok(crate::types::Dependency {
        id: row.get(0)?,
        source: row.get(1)?,
        target: row.get(2)?,
        resolved_path: row.get(3)?,
        kind: DependencyKind::parse(&kind_label).unwrap_or(DependencyKind::Import),
        names: serde_json::from_str(&names_json).unwrap_or_default(),
        line: row.get::<_, i64>(6)? as usize,
        is_external: row.get::<_, i64>(7)? != 0,
    })
}

fn call_from_row(row: &Row) -> rusqlite::Result<CallEdge> {
    let kind_label: String = row.get(9)?;
    Ok(CallEdge {
        id: row.get(0)?,
        caller_id: row.get(1)?,
        caller_name: row.get(2)?,
        caller_path: row.get(3)?,
        callee_name: row.get(4)?,
        callee_id: row.get(5)?,
        callee_path: row.get(6)?,
        line: row.get::<_, i64>(7)? as usize,
        column: row.get::<_, i64>(8)? as usize,
        kind: CallKind::parse(&kind_label).unwrap_or(CallKind::Function),
        is_method_call: row.get::<_, i64>(10)? != 0,
        receiver: row.get(11)?,
        arg_count: row.get::<_, i64>(12)? as usize,
    })
}
