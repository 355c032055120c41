//! AST-driven code intelligence extraction.
//!
//! One parse per file feeds three output streams: symbols, dependencies
//! (import/export edges), and call edges. Each supported language gets a
//! monomorphic extractor behind the `Language` dispatch; all of them emit the
//! common schema in [`crate::types`]. Parse failures degrade to empty streams
//! so indexing never stops on a broken file.

mod langs;
mod solidity;
mod ts;

use crate::hash::stable_id;
use crate::types::{CallEdge, CallKind, Dependency, SourceRange, Symbol, SymbolKind};
use tree_sitter::{Node, Parser};

// ---------------------------------------------------------------------------
// Language dispatch
// ---------------------------------------------------------------------------

/// Supported languages, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    JavaScript,
    TypeScript,
    Tsx,
    Solidity,
    Rust,
    Go,
    Python,
    C,
    Cpp,
    Java,
}

impl Language {
    pub fn from_ext(ext: &str) -> Option<Self> {
        match ext {
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "sol" => Some(Language::Solidity),
            "rs" => Some(Language::Rust),
            "go" => Some(Language::Go),
            "py" | "pyi" => Some(Language::Python),
            "c" | "h" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some(Language::Cpp),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    pub fn ts_language(&self) -> tree_sitter::Language {
        match self {
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::Solidity => tree_sitter_solidity::LANGUAGE.into(),
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::C => tree_sitter_c::LANGUAGE.into(),
            Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            Language::Java => tree_sitter_java::LANGUAGE.into(),
        }
    }

    /// True when the extension maps to a supported language.
    pub fn is_code_ext(ext: &str) -> bool {
        Language::from_ext(ext).is_some()
    }
}

// ---------------------------------------------------------------------------
// Extraction output
// ---------------------------------------------------------------------------

/// The three streams emitted from one parse.
#[derive(Debug, Default)]
pub struct Extraction {
    pub symbols: Vec<Symbol>,
    pub dependencies: Vec<Dependency>,
    pub calls: Vec<CallEdge>,
}

/// Synthetic caller id used for call sites at file scope.
pub fn top_level_id(rel_path: &str) -> String {
    stable_id(&[rel_path, "<toplevel>"])
}

/// Extract symbols, dependencies, and calls from one file. Unsupported
/// extensions and parse failures yield empty streams.
pub fn extract(content: &str, abs_path: &str, rel_path: &str, ext: &str) -> Extraction {
    let lang = match Language::from_ext(ext) {
        Some(l) => l,
        None => return Extraction::default(),
    };

    let mut parser = Parser::new();
    if parser.set_language(&lang.ts_language()).is_err() {
        return Extraction::default();
    }
    let tree = match parser.parse(content, None) {
        Some(t) => t,
        None => return Extraction::default(),
    };

    let mut ctx = Ctx::new(content.as_bytes(), abs_path, rel_path);
    let root = tree.root_node();
    match lang {
        Language::JavaScript | Language::TypeScript | Language::Tsx => {
            ts::extract(&root, &mut ctx)
        }
        Language::Solidity => solidity::extract(&root, &mut ctx),
        Language::Rust
        | Language::Go
        | Language::Python
        | Language::C
        | Language::Cpp
        | Language::Java => langs::extract(&root, lang, &mut ctx),
    }

    ctx.finish()
}

// ---------------------------------------------------------------------------
// Shared walk context
// ---------------------------------------------------------------------------

/// One frame of the lexical scope stack used to attribute call sites.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    /// Display name, e.g. `UserService.findOne`.
    pub name: String,
    /// Symbol id of the scope owner, when the scope corresponds to a symbol.
    pub symbol_id: Option<String>,
}

/// Mutable extraction state shared by all language front ends.
pub(crate) struct Ctx<'a> {
    pub src: &'a [u8],
    pub path: &'a str,
    pub rel_path: &'a str,
    pub symbols: Vec<Symbol>,
    pub dependencies: Vec<Dependency>,
    pub calls: Vec<CallEdge>,
    scopes: Vec<Scope>,
    top_id: String,
}

impl<'a> Ctx<'a> {
    fn new(src: &'a [u8], path: &'a str, rel_path: &'a str) -> Self {
        Ctx {
            src,
            path,
            rel_path,
            symbols: Vec::new(),
            dependencies: Vec::new(),
            calls: Vec::new(),
            scopes: Vec::new(),
            top_id: top_level_id(rel_path),
        }
    }

    pub fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.src).unwrap_or("")
    }

    pub fn push_scope(&mut self, name: String, symbol_id: Option<String>) {
        self.scopes.push(Scope { name, symbol_id });
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn scope_name(&self) -> Option<&str> {
        self.scopes.last().map(|s| s.name.as_str())
    }

    /// Qualified name for a new symbol inside the current scope.
    pub fn qualify(&self, name: &str) -> String {
        match self.scope_name() {
            Some(scope) => format!("{scope}.{name}"),
            None => name.to_string(),
        }
    }

    pub fn symbol_id(&self, qualified: &str, kind: SymbolKind) -> String {
        stable_id(&[self.rel_path, qualified, kind.label()])
    }

    /// Add a symbol and return its id.
    #[allow(clippy::too_many_arguments)]
    pub fn add_symbol(
        &mut self,
        name: &str,
        qualified: &str,
        kind: SymbolKind,
        range: SourceRange,
        exported: bool,
        default_export: bool,
        signature: Option<String>,
        documentation: Option<String>,
        parent_id: Option<String>,
        modifiers: Vec<String>,
    ) -> String {
        let id = self.symbol_id(qualified, kind);
        self.symbols.push(Symbol {
            id: id.clone(),
            name: name.to_string(),
            kind,
            path: self.path.to_string(),
            rel_path: self.rel_path.to_string(),
            range,
            is_exported: exported,
            is_default_export: default_export,
            signature,
            documentation,
            parent_id,
            modifiers,
            summary: None,
            summary_model: None,
        });
        id
    }

    pub fn add_dependency(&mut self, dep: DependencyDraft) {
        let id = stable_id(&[
            self.rel_path,
            &dep.target,
            dep.kind.label(),
            &dep.line.to_string(),
        ]);
        let is_external = Dependency::classify_external(&dep.target);
        self.dependencies.push(Dependency {
            id,
            source: self.rel_path.to_string(),
            target: dep.target,
            resolved_path: None,
            kind: dep.kind,
            names: dep.names,
            line: dep.line,
            is_external,
        });
    }

    /// Record a call site attributed to the innermost scope (or file scope).
    #[allow(clippy::too_many_arguments)]
    pub fn add_call(
        &mut self,
        callee_name: String,
        line: usize,
        column: usize,
        kind: CallKind,
        is_method_call: bool,
        receiver: Option<String>,
        arg_count: usize,
    ) {
        let (caller_id, caller_name) = match self.scopes.last() {
            Some(scope) => (
                scope.symbol_id.clone().unwrap_or_else(|| self.top_id.clone()),
                Some(scope.name.clone()),
            ),
            None => (self.top_id.clone(), None),
        };
        let id = stable_id(&[
            self.rel_path,
            caller_name.as_deref().unwrap_or("<toplevel>"),
            &callee_name,
            &line.to_string(),
            &column.to_string(),
        ]);
        self.calls.push(CallEdge {
            id,
            caller_id,
            caller_name,
            caller_path: self.rel_path.to_string(),
            callee_name,
            callee_id: None,
            callee_path: None,
            line,
            column,
            kind,
            is_method_call,
            receiver,
            arg_count,
        });
    }

    /// Resolve same-file callees by name and seal the output. Cross-file
    /// resolution stays lazy; the daemon builds its own adjacency maps.
    fn finish(mut self) -> Extraction {
        use std::collections::HashMap;
        let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, sym) in self.symbols.iter().enumerate() {
            if matches!(
                sym.kind,
                SymbolKind::Function
                    | SymbolKind::ArrowFunction
                    | SymbolKind::Method
                    | SymbolKind::Class
            ) {
                by_name.entry(sym.name.as_str()).or_default().push(i);
            }
        }

        let mut resolutions: Vec<(usize, String, String)> = Vec::new();
        for (ci, call) in self.calls.iter().enumerate() {
            let Some(candidates) = by_name.get(call.callee_name.as_str()) else {
                continue;
            };
            // Constructors resolve to classes, everything else to callables.
            let want_class = call.kind == CallKind::Constructor;
            let hit = candidates.iter().find(|&&si| {
                let is_class = self.symbols[si].kind == SymbolKind::Class;
                is_class == want_class
            });
            if let Some(&si) = hit {
                resolutions.push((
                    ci,
                    self.symbols[si].id.clone(),
                    self.symbols[si].rel_path.clone(),
                ));
            }
        }
        for (ci, id, path) in resolutions {
            self.calls[ci].callee_id = Some(id);
            self.calls[ci].callee_path = Some(path);
        }

        Extraction {
            symbols: self.symbols,
            dependencies: self.dependencies,
            calls: self.calls,
        }
    }
}

/// Dependency fields an extractor fills in before ids are assigned.
pub(crate) struct DependencyDraft {
    pub target: String,
    pub kind: crate::types::DependencyKind,
    pub names: Vec<crate::types::ImportedName>,
    pub line: usize,
}

// ---------------------------------------------------------------------------
// Shared node helpers
// ---------------------------------------------------------------------------

pub(crate) fn range_of(node: Node) -> SourceRange {
    SourceRange {
        start_line: node.start_position().row + 1,
        start_col: node.start_position().column,
        end_line: node.end_position().row + 1,
        end_col: node.end_position().column,
    }
}

/// Nearest preceding doc comment: the run of comment siblings immediately
/// above the node, markers stripped. Declarations wrapped in an export
/// statement look the comment up on the wrapper.
pub(crate) fn preceding_doc(node: Node, src: &[u8]) -> Option<String> {
    let anchor = match node.parent() {
        Some(p) if p.kind() == "export_statement" => p,
        _ => node,
    };
    let mut lines: Vec<String> = Vec::new();
    let mut expect_row = anchor.start_position().row;
    let mut prev = anchor.prev_sibling();
    while let Some(p) = prev {
        let kind = p.kind();
        if !(kind == "comment" || kind.ends_with("_comment")) {
            break;
        }
        if p.end_position().row + 1 < expect_row {
            break;
        }
        let text = p.utf8_text(src).unwrap_or("").trim().to_string();
        lines.push(text);
        expect_row = p.start_position().row;
        prev = p.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    let cleaned = lines
        .iter()
        .flat_map(|c| c.lines())
        .map(clean_comment_line)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn clean_comment_line(line: &str) -> String {
    let t = line.trim();
    let t = t.strip_prefix("/**").unwrap_or(t);
    let t = t.strip_suffix("*/").unwrap_or(t);
    let t = t.strip_prefix("/*").unwrap_or(t);
    let t = t.strip_prefix("///").unwrap_or(t);
    let t = t.strip_prefix("//").unwrap_or(t);
    let t = t.strip_prefix('*').unwrap_or(t);
    let t = t.strip_prefix('#').unwrap_or(t);
    t.trim().to_string()
}

/// Signature text: the node's source from its start up to (exclusive) its
/// body, reconstructed from the original span rather than re-formatted.
pub(crate) fn signature_before_body(node: Node, src: &[u8]) -> Option<String> {
    let start = node.start_byte();
    let end = match node.child_by_field_name("body") {
        Some(body) => body.start_byte(),
        None => node.end_byte(),
    };
    if end <= start {
        return None;
    }
    let text = std::str::from_utf8(&src[start..end]).ok()?;
    let sig = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let sig = sig.trim().trim_end_matches('{').trim().to_string();
    if sig.is_empty() {
        None
    } else {
        Some(sig)
    }
}

/// Render an expression as a dotted receiver path: identifiers and member
/// chains become `a.b.c`, `this` stays `this`, calls in the chain render as
/// `name()`. Anything else is the node text truncated to a sane length.
pub(crate) fn dotted_path(node: Node, src: &[u8]) -> String {
    fn render(node: Node, src: &[u8], out: &mut String) {
        match node.kind() {
            "identifier" | "this" | "super" | "property_identifier" | "field_identifier"
            | "shorthand_property_identifier" | "type_identifier" => {
                out.push_str(node.utf8_text(src).unwrap_or(""));
            }
            "member_expression" | "field_expression" | "attribute" | "selector_expression" => {
                let object = node
                    .child_by_field_name("object")
                    .or_else(|| node.child_by_field_name("value"))
                    .or_else(|| node.child_by_field_name("operand"));
                let property = node
                    .child_by_field_name("property")
                    .or_else(|| node.child_by_field_name("field"))
                    .or_else(|| node.child_by_field_name("attribute"));
                if let Some(obj) = object {
                    render(obj, src, out);
                }
                if let Some(prop) = property {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(prop.utf8_text(src).unwrap_or(""));
                }
            }
            "call_expression" | "call" | "method_invocation" => {
                let func = node
                    .child_by_field_name("function")
                    .or_else(|| node.child_by_field_name("name"));
                if let Some(f) = func {
                    render(f, src, out);
                }
                out.push_str("()");
            }
            "parenthesized_expression" => {
                if let Some(inner) = node.named_child(0) {
                    render(inner, src, out);
                }
            }
            _ => {
                let text = node.utf8_text(src).unwrap_or("");
                let mut t: String = text.chars().take(40).collect();
                if text.chars().count() > 40 {
                    t.push('…');
                }
                out.push_str(&t);
            }
        }
    }
    let mut out = String::new();
    render(node, src, &mut out);
    out
}

/// Strip matching quotes from a string-literal source span.
pub(crate) fn unquote(text: &str) -> String {
    let t = text.trim();
    let t = t
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| t.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .or_else(|| t.strip_prefix('`').and_then(|s| s.strip_suffix('`')))
        .unwrap_or(t);
    t.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_ext() {
        assert_eq!(Language::from_ext("ts"), Some(Language::TypeScript));
        assert_eq!(Language::from_ext("tsx"), Some(Language::Tsx));
        assert_eq!(Language::from_ext("sol"), Some(Language::Solidity));
        assert_eq!(Language::from_ext("rs"), Some(Language::Rust));
        assert_eq!(Language::from_ext("md"), None);
        assert!(Language::is_code_ext("go"));
        assert!(!Language::is_code_ext("toml"));
    }

    #[test]
    fn test_unsupported_ext_yields_empty_streams() {
        let out = extract("hello world", "/r/notes.txt", "notes.txt", "txt");
        assert!(out.symbols.is_empty());
        assert!(out.dependencies.is_empty());
        assert!(out.calls.is_empty());
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"./util\""), "./util");
        assert_eq!(unquote("'lodash'"), "lodash");
        assert_eq!(unquote("bare"), "bare");
    }

    #[test]
    fn test_top_level_id_is_stable() {
        assert_eq!(top_level_id("a/b.ts"), top_level_id("a/b.ts"));
        assert_ne!(top_level_id("a/b.ts"), top_level_id("a/c.ts"));
    }
}
