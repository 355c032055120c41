//! Resident query daemon.
//!
//! One daemon per index: on start it loads the full symbol and call-edge
//! streams into memory (adjacency maps included), opens the embedding client
//! for the index's model, and answers line-delimited JSON-RPC 2.0 over a UNIX
//! socket at `<home>/sockets/<index>.sock`. Graph queries run entirely
//! in-memory; `search` and `similar` delegate to the store's vector search
//! through `spawn_blocking`.

use crate::config::HomeDirs;
use crate::embed::{create_provider, EmbeddingProvider};
use crate::rerank::mmr_rerank;
use crate::store::Store;
use crate::types::{CallEdge, Result, SeekError, StoreStats, Symbol, SymbolKind};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_DIVERSITY: f32 = 0.7;
pub const DEFAULT_IMPACT_DEPTH: usize = 3;

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const SERVER_ERROR: i64 = -32000;

/// Kinds that never count as dead code: bindings that exist for their side
/// effects or as entry points rather than to be called.
const DEAD_CODE_EXEMPT: &[SymbolKind] = &[
    SymbolKind::Import,
    SymbolKind::Export,
    SymbolKind::Module,
    SymbolKind::Namespace,
    SymbolKind::EnumMember,
    SymbolKind::Property,
    SymbolKind::Variable,
    SymbolKind::Event,
];

// ---------------------------------------------------------------------------
// In-memory graph
// ---------------------------------------------------------------------------

/// Everything the daemon preloads at start. Rebuilt only by restarting the
/// daemon; a concurrent reindex invalidates these views.
pub struct DaemonState {
    pub index_name: String,
    pub model: String,
    symbols: Vec<Symbol>,
    calls: Vec<CallEdge>,
    symbols_by_id: HashMap<String, usize>,
    /// lowercase name → symbol indices
    symbols_by_name: HashMap<String, Vec<usize>>,
    /// lowercase callee name → call indices
    calls_by_callee: HashMap<String, Vec<usize>>,
    /// file-level adjacency induced by resolved calls and imports
    file_out: BTreeMap<String, BTreeSet<String>>,
    file_in: BTreeMap<String, BTreeSet<String>>,
    stats: StoreStats,
}

impl DaemonState {
    pub fn load(store: &Store) -> Result<DaemonState> {
        let meta = store.meta();
        let symbols = store.all_symbols()?;
        let calls = store.all_calls()?;
        let stats = store.stats()?;

        let mut symbols_by_id = HashMap::new();
        let mut symbols_by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, sym) in symbols.iter().enumerate() {
            symbols_by_id.insert(sym.id.clone(), i);
            symbols_by_name.entry(sym.name.to_lowercase()).or_default().push(i);
        }

        let mut calls_by_callee: HashMap<String, Vec<usize>> = HashMap::new();
        let mut file_out: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut file_in: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (i, call) in calls.iter().enumerate() {
            calls_by_callee
                .entry(call.callee_name.to_lowercase())
                .or_default()
                .push(i);
            if let Some(callee_path) = &call.callee_path {
                if callee_path != &call.caller_path {
                    file_out
                        .entry(call.caller_path.clone())
                        .or_default()
                        .insert(callee_path.clone());
                    file_in
                        .entry(callee_path.clone())
                        .or_default()
                        .insert(call.caller_path.clone());
                }
            }
        }
        for dep in store.all_dependencies()? {
            if let Some(resolved) = &dep.resolved_path {
                if resolved != &dep.source {
                    file_out.entry(dep.source.clone()).or_default().insert(resolved.clone());
                    file_in.entry(resolved.clone()).or_default().insert(dep.source.clone());
                }
            }
        }

        info!(
            index = meta.name.as_str(),
            symbols = symbols.len(),
            calls = calls.len(),
            "graph loaded"
        );

        Ok(DaemonState {
            index_name: meta.name.clone(),
            model: meta.model.clone(),
            symbols,
            calls,
            symbols_by_id,
            symbols_by_name,
            calls_by_callee,
            file_out,
            file_in,
            stats,
        })
    }

    /// Symbols whose name contains the needle (case-insensitive).
    fn matching_symbols(&self, needle: &str) -> Vec<&Symbol> {
        let lower = needle.to_lowercase();
        self.symbols
            .iter()
            .filter(|s| s.name.to_lowercase().contains(&lower))
            .collect()
    }

    /// Call sites whose callee matches the needle by name or resolved id.
    fn matching_calls(&self, needle: &str) -> Vec<&CallEdge> {
        let lower = needle.to_lowercase();
        let matching_ids: HashSet<&str> = self
            .matching_symbols(needle)
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        self.calls
            .iter()
            .filter(|c| {
                c.callee_name.to_lowercase().contains(&lower)
                    || c.callee_id.as_deref().is_some_and(|id| matching_ids.contains(id))
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Graph query handlers (fully in-memory)
    // -----------------------------------------------------------------------

    pub fn ping(&self) -> Value {
        json!({ "pong": true, "indexName": self.index_name })
    }

    pub fn callers(&self, symbol: &str) -> Value {
        let sites: Vec<Value> = self
            .matching_calls(symbol)
            .into_iter()
            .map(|c| {
                json!({
                    "file": c.caller_path,
                    "line": c.line,
                    "column": c.column,
                    "caller": c.caller_name,
                    "callee": c.callee_name,
                    "callType": c.kind.label(),
                    "isMethodCall": c.is_method_call,
                    "receiver": c.receiver,
                    "argCount": c.arg_count,
                })
            })
            .collect();
        json!({ "symbol": symbol, "count": sites.len(), "callers": sites })
    }

    /// BFS over reverse call edges: who breaks when `symbol` changes.
    pub fn impact(&self, symbol: &str, depth: usize) -> Value {
        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier: HashSet<String> = HashSet::new();
        for sym in self.matching_symbols(symbol) {
            frontier.insert(sym.name.to_lowercase());
        }
        if frontier.is_empty() {
            frontier.insert(symbol.to_lowercase());
        }
        visited.extend(frontier.iter().cloned());

        let mut levels: Vec<Value> = Vec::new();
        for level in 1..=depth.max(1) {
            let mut next: HashSet<String> = HashSet::new();
            let mut entries: Vec<Value> = Vec::new();
            for target in &frontier {
                let Some(call_indices) = self.calls_by_callee.get(target) else {
                    continue;
                };
                for &ci in call_indices {
                    let call = &self.calls[ci];
                    let caller_name = call.caller_name.clone();
                    entries.push(json!({
                        "caller": caller_name,
                        "file": call.caller_path,
                        "line": call.line,
                        "callee": call.callee_name,
                    }));
                    if let Some(name) = &call.caller_name {
                        // attribute to the leaf scope name
                        let leaf = name.rsplit('.').next().unwrap_or(name).to_lowercase();
                        if visited.insert(leaf.clone()) {
                            next.insert(leaf);
                        }
                    }
                }
            }
            if entries.is_empty() {
                break;
            }
            levels.push(json!({ "depth": level, "sites": entries }));
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }
        json!({ "symbol": symbol, "levels": levels })
    }

    pub fn deps(&self, file: &str) -> Value {
        // match by exact rel_path or suffix so `auth.ts` finds `src/auth.ts`
        let resolve = |name: &str| -> Option<String> {
            if self.file_out.contains_key(name) || self.file_in.contains_key(name) {
                return Some(name.to_string());
            }
            self.file_out
                .keys()
                .chain(self.file_in.keys())
                .find(|k| k.ends_with(name))
                .cloned()
        };
        let key = resolve(file).unwrap_or_else(|| file.to_string());
        let depends_on: Vec<&String> =
            self.file_out.get(&key).map(|s| s.iter().collect()).unwrap_or_default();
        let depended_by: Vec<&String> =
            self.file_in.get(&key).map(|s| s.iter().collect()).unwrap_or_default();
        json!({ "file": key, "dependsOn": depends_on, "dependedOnBy": depended_by })
    }

    /// Non-exported symbols with no inbound call edges, excluding kinds that
    /// are not call targets.
    pub fn dead(&self, kind: Option<SymbolKind>) -> Value {
        let called_ids: HashSet<&str> = self
            .calls
            .iter()
            .filter_map(|c| c.callee_id.as_deref())
            .collect();
        let called_names: HashSet<String> =
            self.calls.iter().map(|c| c.callee_name.to_lowercase()).collect();

        let dead: Vec<Value> = self
            .symbols
            .iter()
            .filter(|s| !s.is_exported)
            .filter(|s| !DEAD_CODE_EXEMPT.contains(&s.kind))
            .filter(|s| kind.is_none() || kind == Some(s.kind))
            .filter(|s| {
                !called_ids.contains(s.id.as_str())
                    && !called_names.contains(&s.name.to_lowercase())
            })
            .map(|s| {
                json!({
                    "name": s.name,
                    "kind": s.kind.label(),
                    "file": s.rel_path,
                    "line": s.range.start_line,
                })
            })
            .collect();
        json!({ "count": dead.len(), "symbols": dead })
    }

    /// Cycles in the file-level graph induced by calls and resolved imports.
    pub fn cycles(&self) -> Value {
        const MAX_CYCLES: usize = 50;
        let mut cycles: Vec<Vec<String>> = Vec::new();
        let mut done: HashSet<String> = HashSet::new();

        for start in self.file_out.keys() {
            if done.contains(start) || cycles.len() >= MAX_CYCLES {
                continue;
            }
            // DFS with an explicit stack carrying the path
            let mut stack: Vec<(String, Vec<String>)> =
                vec![(start.clone(), vec![start.clone()])];
            let mut seen_from_start: HashSet<String> = HashSet::new();
            while let Some((node, path)) = stack.pop() {
                if cycles.len() >= MAX_CYCLES {
                    break;
                }
                let Some(nexts) = self.file_out.get(&node) else {
                    continue;
                };
                for next in nexts {
                    if let Some(pos) = path.iter().position(|p| p == next) {
                        let mut cycle: Vec<String> = path[pos..].to_vec();
                        cycle.push(next.clone());
                        // canonical rotation avoids reporting the same loop
                        // once per participant
                        if !cycles.iter().any(|c| same_cycle(c, &cycle)) {
                            cycles.push(cycle);
                        }
                        continue;
                    }
                    if seen_from_start.insert(next.clone()) {
                        let mut next_path = path.clone();
                        next_path.push(next.clone());
                        stack.push((next.clone(), next_path));
                    }
                }
            }
            done.insert(start.clone());
        }

        json!({ "count": cycles.len(), "cycles": cycles })
    }

    pub fn symbols_query(
        &self,
        kind: Option<SymbolKind>,
        file: Option<&str>,
        exported: Option<bool>,
    ) -> Value {
        let list: Vec<Value> = self
            .symbols
            .iter()
            .filter(|s| kind.is_none() || kind == Some(s.kind))
            .filter(|s| {
                file.is_none()
                    || file.is_some_and(|f| s.rel_path == f || s.rel_path.ends_with(f))
            })
            .filter(|s| exported.is_none() || exported == Some(s.is_exported))
            .map(|s| {
                json!({
                    "id": s.id,
                    "name": s.name,
                    "kind": s.kind.label(),
                    "file": s.rel_path,
                    "line": s.range.start_line,
                    "exported": s.is_exported,
                    "signature": s.signature,
                    "summary": s.summary,
                })
            })
            .collect();
        json!({ "count": list.len(), "symbols": list })
    }

    pub fn stats_query(&self) -> Value {
        json!({
            "indexName": self.index_name,
            "model": self.model,
            "chunks": self.stats.chunks,
            "files": self.stats.files,
            "symbols": self.stats.symbols,
            "dependencies": self.stats.dependencies,
            "calls": self.stats.calls,
            "symbolsByKind": self.stats.symbols_by_kind,
        })
    }

    /// The embeddable text for `similar`: the symbol's signature when there
    /// is one, otherwise its name.
    pub fn similar_seed(&self, symbol: &str) -> Option<(&Symbol, String)> {
        let lower = symbol.to_lowercase();
        let exact = self
            .symbols_by_name
            .get(&lower)
            .and_then(|ids| ids.first())
            .map(|&i| &self.symbols[i]);
        let sym = exact.or_else(|| self.matching_symbols(symbol).into_iter().next())?;
        let text = sym.signature.clone().unwrap_or_else(|| sym.name.clone());
        Some((sym, text))
    }

    pub fn symbol_by_id(&self, id: &str) -> Option<&Symbol> {
        self.symbols_by_id.get(id).map(|&i| &self.symbols[i])
    }
}

/// Two cycle paths describe the same loop if one is a rotation of the other.
fn same_cycle(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() || a.len() < 2 {
        return a == b;
    }
    let core_a = &a[..a.len() - 1];
    let core_b = &b[..b.len() - 1];
    if core_a.len() != core_b.len() {
        return false;
    }
    (0..core_a.len()).any(|shift| {
        core_a
            .iter()
            .cycle()
            .skip(shift)
            .take(core_a.len())
            .eq(core_b.iter())
    })
}

// ---------------------------------------------------------------------------
// JSON-RPC plumbing
// ---------------------------------------------------------------------------

fn rpc_ok(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn rpc_err(id: Value, code: i64, message: String) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

fn param_str(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Serialize a reranked result list for the wire, dropping raw vectors.
fn search_results(mut hits: Vec<crate::types::ScoredChunk>) -> Value {
    let out: Vec<Value> = hits
        .iter_mut()
        .map(|h| {
            h.chunk.embedding.clear();
            json!({
                "path": h.chunk.path,
                "relPath": h.chunk.rel_path,
                "chunkIndex": h.chunk.chunk_index,
                "startLine": h.chunk.start_line,
                "endLine": h.chunk.end_line,
                "content": h.chunk.content,
                "_score": h.distance,
                "similarity": 1.0 - h.distance,
            })
        })
        .collect();
    json!({ "count": out.len(), "results": out })
}

/// Shared handler context for one daemon process.
pub struct Daemon {
    pub state: Arc<DaemonState>,
    pub store: Arc<Mutex<Store>>,
    pub provider: Arc<dyn EmbeddingProvider>,
}

impl Daemon {
    pub fn open(home: &HomeDirs, index: &str) -> Result<Daemon> {
        let store = Store::open(home, index)?;
        let state = DaemonState::load(&store)?;
        let provider = create_provider(&state.model)?;
        Ok(Daemon {
            state: Arc::new(state),
            store: Arc::new(Mutex::new(store)),
            provider: Arc::from(provider),
        })
    }

    /// Handle one complete request line, producing one response line.
    pub async fn dispatch_line(&self, line: &str) -> String {
        let parsed: std::result::Result<Value, _> = serde_json::from_str(line.trim());
        let request = match parsed {
            Ok(v) => v,
            Err(e) => {
                return rpc_err(Value::Null, PARSE_ERROR, format!("parse error: {e}"))
                    .to_string()
            }
        };
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let params = request.get("params").cloned().unwrap_or_else(|| json!({}));

        const METHODS: &[&str] = &[
            "ping", "search", "callers", "impact", "deps", "dead", "similar", "cycles",
            "symbols", "stats",
        ];
        if !METHODS.contains(&method) {
            return rpc_err(id, METHOD_NOT_FOUND, format!("method '{method}' not found"))
                .to_string();
        }

        match self.handle(method, &params).await {
            Ok(result) => rpc_ok(id, result).to_string(),
            Err(e) => rpc_err(id, SERVER_ERROR, e.to_string()).to_string(),
        }
    }

    async fn handle(&self, method: &str, params: &Value) -> Result<Value> {
        let state = &self.state;
        match method {
            "ping" => Ok(state.ping()),
            "callers" => {
                let symbol = param_str(params, "symbol")
                    .ok_or_else(|| SeekError::input("callers requires 'symbol'"))?;
                Ok(state.callers(&symbol))
            }
            "impact" => {
                let symbol = param_str(params, "symbol")
                    .ok_or_else(|| SeekError::input("impact requires 'symbol'"))?;
                let depth = params
                    .get("depth")
                    .and_then(|d| d.as_u64())
                    .map(|d| d as usize)
                    .unwrap_or(DEFAULT_IMPACT_DEPTH);
                Ok(state.impact(&symbol, depth))
            }
            "deps" => {
                let file = param_str(params, "file")
                    .ok_or_else(|| SeekError::input("deps requires 'file'"))?;
                Ok(state.deps(&file))
            }
            "dead" => {
                let kind = match param_str(params, "kind") {
                    Some(k) => Some(
                        SymbolKind::parse(&k)
                            .ok_or_else(|| SeekError::input(format!("unknown kind '{k}'")))?,
                    ),
                    None => None,
                };
                Ok(state.dead(kind))
            }
            "cycles" => Ok(state.cycles()),
            "symbols" => {
                let kind = match param_str(params, "kind") {
                    Some(k) => Some(
                        SymbolKind::parse(&k)
                            .ok_or_else(|| SeekError::input(format!("unknown kind '{k}'")))?,
                    ),
                    None => None,
                };
                let file = param_str(params, "file");
                let exported = params.get("exported").and_then(|e| e.as_bool());
                Ok(state.symbols_query(kind, file.as_deref(), exported))
            }
            "stats" => Ok(state.stats_query()),
            "search" => {
                let query = param_str(params, "query")
                    .ok_or_else(|| SeekError::input("search requires 'query'"))?;
                let limit = params
                    .get("limit")
                    .and_then(|l| l.as_u64())
                    .map(|l| l as usize)
                    .unwrap_or(DEFAULT_SEARCH_LIMIT);
                let diversity = params
                    .get("diversity")
                    .and_then(|d| d.as_f64())
                    .map(|d| d as f32)
                    .unwrap_or(DEFAULT_DIVERSITY);
                self.search(query, limit, diversity).await
            }
            "similar" => {
                let symbol = param_str(params, "symbol")
                    .ok_or_else(|| SeekError::input("similar requires 'symbol'"))?;
                let limit = params
                    .get("limit")
                    .and_then(|l| l.as_u64())
                    .map(|l| l as usize)
                    .unwrap_or(DEFAULT_SEARCH_LIMIT);
                self.similar(symbol, limit).await
            }
            other => Err(SeekError::input(format!("unhandled method '{other}'"))),
        }
    }

    async fn search(&self, query: String, limit: usize, diversity: f32) -> Result<Value> {
        if !(0.0..=1.0).contains(&diversity) {
            return Err(SeekError::input(format!(
                "diversity must be within [0, 1], got {diversity}"
            )));
        }
        let provider = Arc::clone(&self.provider);
        let store = Arc::clone(&self.store);
        let hits = tokio::task::spawn_blocking(move || -> Result<Vec<crate::types::ScoredChunk>> {
            let vectors = provider.embed(&[query])?;
            let qvec = vectors
                .into_iter()
                .next()
                .ok_or_else(|| SeekError::provider("empty query embedding".to_string()))?;
            let store = store.lock().expect("store mutex poisoned");
            store.search_by_vector(&qvec, limit)
        })
        .await
        .map_err(|e| SeekError::provider(format!("search task failed: {e}")))??;

        let reranked = mmr_rerank(hits, diversity)?;
        Ok(search_results(reranked))
    }

    async fn similar(&self, symbol: String, limit: usize) -> Result<Value> {
        let Some((sym, seed)) = self.state.similar_seed(&symbol) else {
            return Err(SeekError::input(format!("no symbol matching '{symbol}'")));
        };
        let self_path = sym.rel_path.clone();
        let (self_start, self_end) = (sym.range.start_line, sym.range.end_line);

        let provider = Arc::clone(&self.provider);
        let store = Arc::clone(&self.store);
        let fetch = limit + 5; // headroom for self-matches we drop below
        let hits = tokio::task::spawn_blocking(move || -> Result<Vec<crate::types::ScoredChunk>> {
            let vectors = provider.embed(&[seed])?;
            let qvec = vectors
                .into_iter()
                .next()
                .ok_or_else(|| SeekError::provider("empty seed embedding".to_string()))?;
            let store = store.lock().expect("store mutex poisoned");
            store.search_by_vector(&qvec, fetch)
        })
        .await
        .map_err(|e| SeekError::provider(format!("similar task failed: {e}")))??;

        let filtered: Vec<crate::types::ScoredChunk> = hits
            .into_iter()
            .filter(|h| {
                !(h.chunk.rel_path == self_path
                    && h.chunk.start_line <= self_end
                    && h.chunk.end_line >= self_start)
            })
            .take(limit)
            .collect();
        Ok(search_results(filtered))
    }
}

// ---------------------------------------------------------------------------
// Socket server (unix)
// ---------------------------------------------------------------------------

/// Run the daemon for one index until SIGTERM/SIGINT. Binds the well-known
/// socket, serves connections (one in-flight request per connection,
/// responses in receipt order), then removes the socket file on shutdown.
#[cfg(unix)]
pub async fn run_daemon(home: &HomeDirs, index: &str) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixListener;

    let daemon = Arc::new(Daemon::open(home, index)?);
    let socket_path = home.socket_path(index);
    if socket_path.exists() {
        // stale socket from an unclean shutdown
        std::fs::remove_file(&socket_path)?;
    }
    let listener = UnixListener::bind(&socket_path)?;
    info!(index = index, socket = %socket_path.display(), "daemon listening");

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let daemon = Arc::clone(&daemon);
                tokio::spawn(async move {
                    let (read_half, mut write_half) = stream.into_split();
                    let mut lines = BufReader::new(read_half).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let mut response = daemon.dispatch_line(&line).await;
                        response.push('\n');
                        if write_half.write_all(response.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
            _ = sigterm.recv() => {
                info!(index = index, "SIGTERM, shutting down");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!(index = index, "SIGINT, shutting down");
                break;
            }
        }
    }

    drop(listener);
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EmbeddingCache;
    use crate::config::{HomeDirs, Settings};
    use crate::embed::create_provider;
    use crate::index::{run_index, IndexJob, IndexMode};
    use std::path::Path;

    fn test_home(dir: &Path) -> HomeDirs {
        let home = HomeDirs {
            db: dir.join("db"),
            cache: dir.join("cache"),
            pids: dir.join("pids"),
            logs: dir.join("logs"),
            sockets: dir.join("sockets"),
        };
        for d in [&home.db, &home.cache, &home.pids, &home.logs, &home.sockets] {
            std::fs::create_dir_all(d).unwrap();
        }
        home
    }

    /// Index a small fixture: auth.ts defines validateUser plus two exported
    /// callers; register.ts imports and calls it.
    fn fixture_daemon(dir: &Path) -> Daemon {
        let repo = dir.join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::write(
            repo.join("auth.ts"),
            r#"function validateUser(id: string): boolean {
    return id.length > 0;
}

export function checkAuth(id: string): boolean {
    return validateUser(id);
}

export function handleLogin(id: string): boolean {
    if (!validateUser(id)) { return false; }
    return true;
}

function unusedHelper() { return 42; }
"#,
        )
        .unwrap();
        std::fs::write(
            repo.join("register.ts"),
            r#"import { validateUser } from './auth';

export function register(id: string) {
    return validateUser(id);
}
"#,
        )
        .unwrap();

        let home = test_home(dir);
        let settings = Settings { model: "mock:16".to_string(), ..Settings::default() };
        let provider = create_provider("mock:16").unwrap();
        let mut cache = EmbeddingCache::open(&home.cache_db()).unwrap();
        run_index(
            &IndexJob {
                home: &home,
                name: "t",
                root: Some(&repo),
                mode: IndexMode::Create,
                settings: &settings,
            },
            provider.as_ref(),
            &mut cache,
            None,
        )
        .unwrap();

        Daemon::open(&home, "t").unwrap()
    }

    #[tokio::test]
    async fn test_ping_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = fixture_daemon(dir.path());
        let response = daemon
            .dispatch_line(r#"{ "jsonrpc": "2.0", "id": 1, "method": "ping" }"#)
            .await;
        let v: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(v["jsonrpc"], "2.0");
        assert_eq!(v["id"], 1);
        assert_eq!(v["result"]["pong"], true);
        assert_eq!(v["result"]["indexName"], "t");
    }

    #[tokio::test]
    async fn test_callers_finds_three_sites() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = fixture_daemon(dir.path());
        let response = daemon
            .dispatch_line(
                r#"{"jsonrpc":"2.0","id":2,"method":"callers","params":{"symbol":"validateUser"}}"#,
            )
            .await;
        let v: Value = serde_json::from_str(&response).unwrap();
        let callers = v["result"]["callers"].as_array().unwrap();
        assert!(callers.len() >= 3, "expected >= 3 call sites, got {}", callers.len());
        for site in callers {
            assert!(site["file"].is_string());
            assert!(site["line"].as_u64().unwrap() > 0);
        }
        assert!(
            callers.iter().any(|c| c["caller"].is_string()),
            "at least one caller name must be resolved"
        );
    }

    #[tokio::test]
    async fn test_impact_walks_reverse_edges() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = fixture_daemon(dir.path());
        let response = daemon
            .dispatch_line(
                r#"{"jsonrpc":"2.0","id":3,"method":"impact","params":{"symbol":"validateUser","depth":2}}"#,
            )
            .await;
        let v: Value = serde_json::from_str(&response).unwrap();
        let levels = v["result"]["levels"].as_array().unwrap();
        assert!(!levels.is_empty());
        let first = levels[0]["sites"].as_array().unwrap();
        assert!(first.iter().any(|s| s["caller"] == "checkAuth"));
    }

    #[tokio::test]
    async fn test_dead_code_excludes_called_and_exported() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = fixture_daemon(dir.path());
        let response = daemon
            .dispatch_line(r#"{"jsonrpc":"2.0","id":4,"method":"dead"}"#)
            .await;
        let v: Value = serde_json::from_str(&response).unwrap();
        let names: Vec<&str> = v["result"]["symbols"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"unusedHelper"), "got {names:?}");
        assert!(!names.contains(&"validateUser"), "called symbols are not dead");
        assert!(!names.contains(&"checkAuth"), "exported symbols are not dead");
    }

    #[tokio::test]
    async fn test_symbols_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = fixture_daemon(dir.path());
        let response = daemon
            .dispatch_line(
                r#"{"jsonrpc":"2.0","id":5,"method":"symbols","params":{"kind":"function","exported":true}}"#,
            )
            .await;
        let v: Value = serde_json::from_str(&response).unwrap();
        let names: Vec<&str> = v["result"]["symbols"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"checkAuth"));
        assert!(names.contains(&"handleLogin"));
        assert!(!names.contains(&"validateUser"));
    }

    #[tokio::test]
    async fn test_stats_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = fixture_daemon(dir.path());

        let response = daemon
            .dispatch_line(r#"{"jsonrpc":"2.0","id":6,"method":"stats"}"#)
            .await;
        let v: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(v["result"]["model"], "mock:16");
        assert!(v["result"]["symbols"].as_u64().unwrap() > 0);
        assert!(v["result"]["symbolsByKind"]["function"].as_u64().unwrap() >= 3);

        let response = daemon
            .dispatch_line(
                r#"{"jsonrpc":"2.0","id":7,"method":"search","params":{"query":"validate user","limit":3}}"#,
            )
            .await;
        let v: Value = serde_json::from_str(&response).unwrap();
        let results = v["result"]["results"].as_array().unwrap();
        assert!(!results.is_empty());
        assert!(results.len() <= 3);
        assert!(results[0]["_score"].is_number());
    }

    #[tokio::test]
    async fn test_deps_and_cycles_over_resolved_imports() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        // a.ts and b.ts import each other; c.ts imports a.ts
        std::fs::write(repo.join("a.ts"), "import { b } from './b';\nexport function a() { return b(); }\n").unwrap();
        std::fs::write(repo.join("b.ts"), "import { a } from './a';\nexport function b() { return a(); }\n").unwrap();
        std::fs::write(repo.join("c.ts"), "import { a } from './a';\nexport function c() { return a(); }\n").unwrap();

        let home = test_home(dir.path());
        let settings = Settings { model: "mock:16".to_string(), ..Settings::default() };
        let provider = create_provider("mock:16").unwrap();
        let mut cache = EmbeddingCache::open(&home.cache_db()).unwrap();
        run_index(
            &IndexJob {
                home: &home,
                name: "g",
                root: Some(&repo),
                mode: IndexMode::Create,
                settings: &settings,
            },
            provider.as_ref(),
            &mut cache,
            None,
        )
        .unwrap();
        let daemon = Daemon::open(&home, "g").unwrap();

        let response = daemon
            .dispatch_line(r#"{"jsonrpc":"2.0","id":1,"method":"deps","params":{"file":"a.ts"}}"#)
            .await;
        let v: Value = serde_json::from_str(&response).unwrap();
        let depends_on: Vec<&str> = v["result"]["dependsOn"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d.as_str().unwrap())
            .collect();
        let depended_by: Vec<&str> = v["result"]["dependedOnBy"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d.as_str().unwrap())
            .collect();
        assert_eq!(depends_on, vec!["b.ts"]);
        assert!(depended_by.contains(&"b.ts"));
        assert!(depended_by.contains(&"c.ts"));

        let response = daemon
            .dispatch_line(r#"{"jsonrpc":"2.0","id":2,"method":"cycles"}"#)
            .await;
        let v: Value = serde_json::from_str(&response).unwrap();
        let cycles = v["result"]["cycles"].as_array().unwrap();
        assert_eq!(cycles.len(), 1, "a.ts <-> b.ts is the only cycle: {cycles:?}");
        let cycle: Vec<&str> =
            cycles[0].as_array().unwrap().iter().map(|f| f.as_str().unwrap()).collect();
        assert!(cycle.contains(&"a.ts") && cycle.contains(&"b.ts"));
    }

    #[tokio::test]
    async fn test_error_codes() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = fixture_daemon(dir.path());

        let response = daemon.dispatch_line("this is not json").await;
        let v: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(v["error"]["code"], -32700);

        let response = daemon
            .dispatch_line(r#"{"jsonrpc":"2.0","id":8,"method":"teleport"}"#)
            .await;
        let v: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(v["error"]["code"], -32601);

        let response = daemon
            .dispatch_line(
                r#"{"jsonrpc":"2.0","id":9,"method":"search","params":{"query":"x","diversity":2.5}}"#,
            )
            .await;
        let v: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(v["error"]["code"], -32000);
        assert!(v["error"]["message"].as_str().unwrap().contains("diversity"));
    }

    #[tokio::test]
    async fn test_similar_drops_self() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = fixture_daemon(dir.path());
        let response = daemon
            .dispatch_line(
                r#"{"jsonrpc":"2.0","id":10,"method":"similar","params":{"symbol":"checkAuth","limit":5}}"#,
            )
            .await;
        let v: Value = serde_json::from_str(&response).unwrap();
        let results = v["result"]["results"].as_array().unwrap();
        // the chunk containing checkAuth itself must not be returned
        for r in results {
            let path = r["relPath"].as_str().unwrap();
            let start = r["startLine"].as_u64().unwrap() as usize;
            let end = r["endLine"].as_u64().unwrap() as usize;
            let is_self = path == "auth.ts" && start <= 7 && end >= 5;
            assert!(!is_self, "self chunk leaked into similar results");
        }
    }

    #[test]
    fn test_same_cycle_rotation() {
        let a = vec!["a".to_string(), "b".to_string(), "c".to_string(), "a".to_string()];
        let b = vec!["b".to_string(), "c".to_string(), "a".to_string(), "b".to_string()];
        let c = vec!["a".to_string(), "c".to_string(), "b".to_string(), "a".to_string()];
        assert!(same_cycle(&a, &b));
        assert!(!same_cycle(&a, &c));
    }
}
