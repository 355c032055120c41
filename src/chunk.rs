//! Bounded, overlapping text chunking.
//!
//! Three strategies selected by file type: plain text (greedy windows with
//! sentence-aware split points), Markdown (header sections, atomic code
//! fences, frontmatter attached to the first chunk), and code (top-level AST
//! boundaries packed greedily, plain-text fallback on parse failure).

use crate::extract::Language;
use crate::tokenizer::Tokenizer;
use tree_sitter::{Node, Parser};

/// How far (in bytes) a split point may wander from its target looking for a
/// sentence terminator or whitespace.
const SPLIT_SLACK: usize = 100;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// The primary construct enclosed by a code chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Construct {
    pub kind: String,
    pub name: String,
    pub parent: Option<String>,
}

/// One chunk cut from a file, before embedding.
#[derive(Debug, Clone)]
pub struct ChunkPiece {
    pub content: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    pub end_line: usize,
    /// True when a code file fell back to plain-text chunking.
    pub fallback: bool,
    pub construct: Option<Construct>,
    /// Enclosing Markdown headers, outermost first.
    pub header_path: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkLimits {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Chunk one file's content according to its extension.
pub fn chunk_file(
    content: &str,
    ext: &str,
    limits: ChunkLimits,
    tok: &dyn Tokenizer,
) -> Vec<ChunkPiece> {
    if content.trim().is_empty() {
        return Vec::new();
    }
    match ext {
        "md" | "markdown" | "mdx" => chunk_markdown(content, limits, tok),
        _ if Language::is_code_ext(ext) => chunk_code(content, ext, limits, tok),
        _ => chunk_plain(content, limits, tok),
    }
}

// ---------------------------------------------------------------------------
// Line bookkeeping
// ---------------------------------------------------------------------------

struct LineIndex {
    /// Byte offset of each line start.
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        LineIndex { starts }
    }

    /// 1-based line containing the byte offset.
    fn line_at(&self, byte: usize) -> usize {
        match self.starts.binary_search(&byte) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}

fn floor_char(text: &str, mut i: usize) -> usize {
    if i >= text.len() {
        return text.len();
    }
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

// ---------------------------------------------------------------------------
// Plain text
// ---------------------------------------------------------------------------

/// Largest char-boundary `end` such that `text[start..end]` stays within the
/// token budget, found by binary search. Window counts are monotone in the
/// end position, which is what makes the search valid.
fn grow_to_budget(text: &str, start: usize, max_tokens: usize, tok: &dyn Tokenizer) -> usize {
    if tok.count_tokens(&text[start..]) <= max_tokens {
        return text.len();
    }
    // invariant: count(start..lo) <= max_tokens < count(start..hi)
    let mut lo = start;
    let mut hi = text.len();
    while hi - lo > 1 {
        let mid = ceil_char(text, lo + (hi - lo) / 2);
        if mid <= lo || mid >= hi {
            break;
        }
        if tok.count_tokens(&text[start..mid]) <= max_tokens {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    // a window always advances by at least one character
    lo.max(ceil_char(text, start + 1))
}

/// Start of the next window: the largest position whose suffix up to `end`
/// still carries at least `overlap_tokens` of trailing context.
fn retreat_by_overlap(
    text: &str,
    start: usize,
    end: usize,
    overlap_tokens: usize,
    tok: &dyn Tokenizer,
) -> usize {
    if overlap_tokens == 0 {
        return end;
    }
    if tok.count_tokens(&text[start..end]) <= overlap_tokens {
        return start;
    }
    // invariant: count(lo..end) >= overlap_tokens > count(hi..end)
    let mut lo = start;
    let mut hi = end;
    while hi - lo > 1 {
        let mid = ceil_char(text, lo + (hi - lo) / 2);
        if mid <= lo || mid >= hi {
            break;
        }
        if tok.count_tokens(&text[mid..end]) >= overlap_tokens {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Byte ranges of greedy windows over `text`, sized by the injected token
/// counter. Boundaries prefer sentence terminators near the budgeted target,
/// then whitespace, then a hard split. Each successive window starts
/// `max − overlap` tokens after the previous start.
fn plain_ranges(text: &str, limits: ChunkLimits, tok: &dyn Tokenizer) -> Vec<(usize, usize)> {
    let max_tokens = limits.max_tokens.max(1);
    let overlap = limits.overlap_tokens.min(max_tokens.saturating_sub(1));
    let mut ranges = Vec::new();
    let mut start = 0usize;

    while start < text.len() {
        let target = grow_to_budget(text, start, max_tokens, tok);
        if target >= text.len() {
            ranges.push((start, text.len()));
            break;
        }
        let end = pick_split(text, start, target);
        ranges.push((start, end));
        let next = retreat_by_overlap(text, start, end, overlap, tok);
        start = if next > start { next } else { end };
    }
    ranges
}

fn pick_split(text: &str, start: usize, target: usize) -> usize {
    let lo = target.saturating_sub(SPLIT_SLACK).max(start + 1);
    let hi = (target + SPLIT_SLACK).min(text.len());

    let bytes = text.as_bytes();
    let mut best_sentence: Option<usize> = None;
    let mut best_space: Option<usize> = None;
    for pos in lo..hi {
        let distance = pos.abs_diff(target);
        let b = bytes[pos];
        if matches!(b, b'.' | b'!' | b'?' | b'\n') {
            let candidate = ceil_char(text, pos + 1);
            if candidate > start
                && best_sentence.is_none_or(|b: usize| distance < b.abs_diff(target))
            {
                best_sentence = Some(candidate);
            }
        } else if b.is_ascii_whitespace() {
            let candidate = ceil_char(text, pos + 1);
            if candidate > start && best_space.is_none_or(|b: usize| distance < b.abs_diff(target))
            {
                best_space = Some(candidate);
            }
        }
    }

    best_sentence
        .or(best_space)
        .unwrap_or_else(|| floor_char(text, target).max(start + 1))
}

fn pieces_from_ranges(
    text: &str,
    base_offset: usize,
    ranges: &[(usize, usize)],
    lines: &LineIndex,
    fallback: bool,
) -> Vec<ChunkPiece> {
    ranges
        .iter()
        .filter(|(s, e)| e > s && !text[*s..*e].trim().is_empty())
        .map(|&(s, e)| ChunkPiece {
            content: text[s..e].to_string(),
            start_line: lines.line_at(base_offset + s),
            end_line: lines.line_at(base_offset + e.saturating_sub(1)),
            fallback,
            construct: None,
            header_path: Vec::new(),
        })
        .collect()
}

fn chunk_plain(content: &str, limits: ChunkLimits, tok: &dyn Tokenizer) -> Vec<ChunkPiece> {
    let lines = LineIndex::new(content);
    let ranges = plain_ranges(content, limits, tok);
    pieces_from_ranges(content, 0, &ranges, &lines, false)
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

struct MdSection {
    start: usize,
    end: usize,
    header_path: Vec<String>,
}

fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

fn atx_header(line: &str) -> Option<(usize, String)> {
    let t = line.trim_start();
    let hashes = t.bytes().take_while(|&b| b == b'#').count();
    if (1..=6).contains(&hashes) && t.as_bytes().get(hashes) == Some(&b' ') {
        Some((hashes, t[hashes..].trim().trim_end_matches('#').trim().to_string()))
    } else {
        None
    }
}

fn chunk_markdown(content: &str, limits: ChunkLimits, tok: &dyn Tokenizer) -> Vec<ChunkPiece> {
    let lines_index = LineIndex::new(content);

    // Frontmatter: the first `---`-delimited block, attached to chunk 0.
    let mut body_start = 0usize;
    let mut frontmatter: Option<String> = None;
    if content.starts_with("---\n") || content == "---" {
        let mut offset = 4.min(content.len());
        for line in content[4.min(content.len())..].split_inclusive('\n') {
            let end = offset + line.len();
            if line.trim_end() == "---" {
                frontmatter = Some(content[..end].trim_end().to_string());
                body_start = end;
                break;
            }
            offset = end;
        }
    }

    // Cut sections at ATX headers outside code fences, tracking the header
    // stack for hierarchy metadata.
    let mut sections: Vec<MdSection> = Vec::new();
    let mut header_stack: Vec<(usize, String)> = Vec::new();
    let mut section_start = body_start;
    let mut section_path: Vec<String> = Vec::new();
    let mut in_fence = false;
    let mut offset = body_start;

    for line in content[body_start..].split_inclusive('\n') {
        if is_fence(line) {
            in_fence = !in_fence;
        } else if !in_fence {
            if let Some((level, title)) = atx_header(line) {
                if offset > section_start {
                    sections.push(MdSection {
                        start: section_start,
                        end: offset,
                        header_path: section_path.clone(),
                    });
                }
                header_stack.retain(|(l, _)| *l < level);
                header_stack.push((level, title));
                section_path = header_stack.iter().map(|(_, t)| t.clone()).collect();
                section_start = offset;
            }
        }
        offset += line.len();
    }
    if content.len() > section_start {
        sections.push(MdSection {
            start: section_start,
            end: content.len(),
            header_path: section_path,
        });
    }

    // Emit chunks per section, splitting oversize sections without ever
    // cutting inside a fence.
    let mut pieces = Vec::new();
    for section in &sections {
        let text = &content[section.start..section.end];
        if text.trim().is_empty() {
            continue;
        }
        if tok.count_tokens(text) <= limits.max_tokens {
            pieces.push(ChunkPiece {
                content: text.to_string(),
                start_line: lines_index.line_at(section.start),
                end_line: lines_index.line_at(section.end.saturating_sub(1)),
                fallback: false,
                construct: None,
                header_path: section.header_path.clone(),
            });
        } else {
            for mut piece in
                split_section(text, section.start, &lines_index, limits, tok)
            {
                piece.header_path = section.header_path.clone();
                pieces.push(piece);
            }
        }
    }

    if let Some(fm) = frontmatter {
        match pieces.first_mut() {
            Some(first) => {
                first.content = format!("{fm}\n{}", first.content);
                first.start_line = 1;
            }
            None => pieces.push(ChunkPiece {
                content: fm,
                start_line: 1,
                end_line: lines_index.line_at(body_start.saturating_sub(1)),
                fallback: false,
                construct: None,
                header_path: Vec::new(),
            }),
        }
    }

    pieces
}

/// Split an oversize Markdown section: fenced blocks are atomic segments,
/// prose runs split by the plain-text rule, everything packed greedily.
fn split_section(
    text: &str,
    base_offset: usize,
    lines: &LineIndex,
    limits: ChunkLimits,
    tok: &dyn Tokenizer,
) -> Vec<ChunkPiece> {
    // Segment the section into (range, is_fence) runs.
    let mut segments: Vec<(usize, usize, bool)> = Vec::new();
    let mut seg_start = 0usize;
    let mut in_fence = false;
    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        if is_fence(line) {
            if in_fence {
                // closing fence line belongs to the block
                segments.push((seg_start, offset + line.len(), true));
                seg_start = offset + line.len();
                in_fence = false;
            } else {
                if offset > seg_start {
                    segments.push((seg_start, offset, false));
                }
                seg_start = offset;
                in_fence = true;
            }
        }
        offset += line.len();
    }
    if text.len() > seg_start {
        segments.push((seg_start, text.len(), in_fence));
    }

    // Greedy packing with per-segment overflow handling.
    let mut pieces = Vec::new();
    let mut acc_start: Option<usize> = None;
    let mut acc_end = 0usize;

    let flush = |pieces: &mut Vec<ChunkPiece>, start: usize, end: usize| {
        if end > start && !text[start..end].trim().is_empty() {
            pieces.push(ChunkPiece {
                content: text[start..end].to_string(),
                start_line: lines.line_at(base_offset + start),
                end_line: lines.line_at(base_offset + end - 1),
                fallback: false,
                construct: None,
                header_path: Vec::new(),
            });
        }
    };

    for &(s, e, fenced) in &segments {
        let seg_tokens = tok.count_tokens(&text[s..e]);
        let acc_tokens = acc_start
            .map(|a| tok.count_tokens(&text[a..acc_end]))
            .unwrap_or(0);

        if acc_start.is_some() && acc_tokens + seg_tokens > limits.max_tokens {
            flush(&mut pieces, acc_start.take().unwrap(), acc_end);
        }

        if seg_tokens > limits.max_tokens {
            if let Some(a) = acc_start.take() {
                flush(&mut pieces, a, acc_end);
            }
            if fenced {
                // never split a fence — the block stays one oversize chunk
                flush(&mut pieces, s, e);
            } else {
                let sub = plain_ranges(&text[s..e], limits, tok);
                for (rs, re) in sub {
                    flush(&mut pieces, s + rs, s + re);
                }
            }
        } else {
            if acc_start.is_none() {
                acc_start = Some(s);
            }
            acc_end = e;
        }
    }
    if let Some(a) = acc_start {
        flush(&mut pieces, a, acc_end);
    }

    pieces
}

// ---------------------------------------------------------------------------
// Code (AST-aware)
// ---------------------------------------------------------------------------

struct Boundary {
    start: usize,
    end: usize,
    construct: Option<Construct>,
}

fn node_construct(node: Node, src: &[u8]) -> Option<Construct> {
    let name_of = |n: Node| -> String {
        n.child_by_field_name("name")
            .and_then(|x| x.utf8_text(src).ok())
            .unwrap_or("")
            .to_string()
    };
    let kind = node.kind();
    let made = |kind: &str, name: String| {
        Some(Construct { kind: kind.to_string(), name, parent: None })
    };
    match kind {
        "function_declaration" | "generator_function_declaration" | "function_item"
        | "function_definition" => made("function", name_of(node)),
        "method_declaration" | "constructor_definition" => made("function", name_of(node)),
        "class_declaration" | "abstract_class_declaration" | "class_definition"
        | "class_specifier" | "contract_declaration" | "struct_item" | "struct_declaration" => {
            made("class", name_of(node))
        }
        "library_declaration" => made("class", name_of(node)),
        "interface_declaration" | "trait_item" => made("interface", name_of(node)),
        "type_alias_declaration" | "type_item" | "type_definition" => made("type", name_of(node)),
        "enum_declaration" | "enum_item" | "enum_specifier" => made("enum", name_of(node)),
        "impl_item" => {
            let name = node
                .child_by_field_name("type")
                .and_then(|t| t.utf8_text(src).ok())
                .unwrap_or("")
                .to_string();
            made("class", name)
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            for decl in node.children(&mut cursor) {
                if decl.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(value) = decl.child_by_field_name("value") {
                    if matches!(
                        value.kind(),
                        "arrow_function" | "function_expression" | "function"
                    ) {
                        return made("arrow_function", name_of(decl));
                    }
                }
            }
            None
        }
        "export_statement" => node
            .child_by_field_name("declaration")
            .and_then(|d| node_construct(d, src)),
        "import_statement" | "import_directive" | "use_declaration" | "import_declaration"
        | "import_from_statement" | "preproc_include" => made("imports", String::new()),
        _ => None,
    }
}

fn chunk_code(
    content: &str,
    ext: &str,
    limits: ChunkLimits,
    tok: &dyn Tokenizer,
) -> Vec<ChunkPiece> {
    let lang = match Language::from_ext(ext) {
        Some(l) => l,
        None => return chunk_plain(content, limits, tok),
    };

    let mut parser = Parser::new();
    let fallback = |pieces: &mut Vec<ChunkPiece>| {
        let lines = LineIndex::new(content);
        let ranges = plain_ranges(content, limits, tok);
        pieces.extend(pieces_from_ranges(content, 0, &ranges, &lines, true));
    };

    if parser.set_language(&lang.ts_language()).is_err() {
        let mut pieces = Vec::new();
        fallback(&mut pieces);
        return pieces;
    }
    let tree = match parser.parse(content, None) {
        Some(t) => t,
        None => {
            let mut pieces = Vec::new();
            fallback(&mut pieces);
            return pieces;
        }
    };

    let src = content.as_bytes();
    let root = tree.root_node();

    // Top-level boundaries, each spanning from the previous boundary's end so
    // chunks cover the whole file. Consecutive import/export statements merge
    // into one boundary.
    let mut boundaries: Vec<Boundary> = Vec::new();
    let mut prev_end = 0usize;
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        let construct = node_construct(child, src);
        let start = prev_end;
        let end = ceil_char(content, child.end_byte()).max(start);
        prev_end = end;

        let merge = construct.as_ref().is_some_and(|c| c.kind == "imports")
            && boundaries
                .last()
                .and_then(|b| b.construct.as_ref())
                .is_some_and(|c| c.kind == "imports");
        if merge {
            boundaries.last_mut().unwrap().end = end;
        } else {
            boundaries.push(Boundary { start, end, construct });
        }
    }
    if content.len() > prev_end {
        boundaries.push(Boundary { start: prev_end, end: content.len(), construct: None });
    }

    let recognized = boundaries.iter().any(|b| b.construct.is_some());
    if boundaries.is_empty() || (root.has_error() && !recognized) {
        // Unparseable body: plain-text chunks marked as fallback.
        let mut pieces = Vec::new();
        fallback(&mut pieces);
        return pieces;
    }

    let lines = LineIndex::new(content);
    let mut pieces: Vec<ChunkPiece> = Vec::new();
    let mut acc: Vec<&Boundary> = Vec::new();
    let mut acc_tokens = 0usize;

    let flush = |pieces: &mut Vec<ChunkPiece>, acc: &mut Vec<&Boundary>| {
        if acc.is_empty() {
            return;
        }
        let start = acc.first().unwrap().start;
        let end = acc.last().unwrap().end;
        if !content[start..end].trim().is_empty() {
            let construct = acc.iter().find_map(|b| b.construct.clone());
            pieces.push(ChunkPiece {
                content: content[start..end].to_string(),
                start_line: lines.line_at(start),
                end_line: lines.line_at(end.saturating_sub(1)),
                fallback: false,
                construct,
                header_path: Vec::new(),
            });
        }
        acc.clear();
    };

    for boundary in &boundaries {
        let text = &content[boundary.start..boundary.end];
        let tokens = tok.count_tokens(text);

        if tokens > limits.max_tokens {
            // A single construct larger than the budget: flush what we have
            // and split the construct by the plain-text rule, keeping its
            // identity on every piece.
            flush(&mut pieces, &mut acc);
            acc_tokens = 0;
            let ranges = plain_ranges(text, limits, tok);
            for (rs, re) in ranges {
                let piece_text = &text[rs..re];
                if piece_text.trim().is_empty() {
                    continue;
                }
                pieces.push(ChunkPiece {
                    content: piece_text.to_string(),
                    start_line: lines.line_at(boundary.start + rs),
                    end_line: lines.line_at(boundary.start + re.saturating_sub(1)),
                    fallback: false,
                    construct: boundary.construct.clone(),
                    header_path: Vec::new(),
                });
            }
            continue;
        }

        if acc_tokens + tokens > limits.max_tokens {
            flush(&mut pieces, &mut acc);
            acc_tokens = 0;
        }
        acc.push(boundary);
        acc_tokens += tokens;
    }
    flush(&mut pieces, &mut acc);

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::EstimateTokenizer;

    const TOK: EstimateTokenizer = EstimateTokenizer;

    fn limits(max: usize, overlap: usize) -> ChunkLimits {
        ChunkLimits { max_tokens: max, overlap_tokens: overlap }
    }

    #[test]
    fn test_empty_file_zero_chunks() {
        assert!(chunk_file("", "txt", limits(100, 10), &TOK).is_empty());
        assert!(chunk_file("   \n  ", "txt", limits(100, 10), &TOK).is_empty());
    }

    #[test]
    fn test_small_file_single_chunk() {
        let text = "Short note."; // well under 100 tokens
        let pieces = chunk_file(text, "txt", limits(100, 10), &TOK);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].content, text);
        assert_eq!(pieces[0].start_line, 1);
    }

    #[test]
    fn test_exact_budget_is_one_chunk_and_one_over_is_two() {
        // the estimate counts ceil(len/4): 40 bytes = exactly 10 tokens
        let at = "a".repeat(40);
        assert_eq!(chunk_file(&at, "txt", limits(10, 2), &TOK).len(), 1);

        let over = "a".repeat(41);
        let pieces = chunk_file(&over, "txt", limits(10, 2), &TOK);
        assert_eq!(pieces.len(), 2);
        // consecutive chunks share at least the configured trailing context
        let first = &pieces[0].content;
        let second = &pieces[1].content;
        let shared = (0..=first.len().min(second.len()))
            .rev()
            .find(|&k| second.starts_with(&first[first.len() - k..]))
            .unwrap();
        assert!(
            TOK.count_tokens(&first[first.len() - shared..]) >= 2,
            "chunks must overlap by at least overlap_tokens"
        );
    }

    #[test]
    fn test_plain_windows_are_sized_by_the_injected_tokenizer() {
        // counts words, not bytes — a very different tokens-per-byte ratio
        // than the estimate's len/4
        struct WordTokenizer;
        impl Tokenizer for WordTokenizer {
            fn count_tokens(&self, text: &str) -> usize {
                text.split_whitespace().count()
            }
            fn name(&self) -> &str {
                "words"
            }
        }

        let text: String = (0..60).map(|i| format!("alpha{i:02} ")).collect();
        let pieces = chunk_file(&text, "txt", limits(10, 2), &WordTokenizer);

        // 10-word windows advancing ~8 words each: roughly 8 chunks. The
        // byte-based estimate would have produced 40-byte (~5 word) windows
        // and far more chunks.
        assert!(
            (6..=9).contains(&pieces.len()),
            "expected word-budgeted windows, got {} chunks",
            pieces.len()
        );
        let tok = WordTokenizer;
        for (i, piece) in pieces.iter().enumerate() {
            let words = tok.count_tokens(&piece.content);
            assert!(words <= 12, "chunk {i} exceeds the word budget: {words}");
            if i + 1 < pieces.len() {
                assert!(words >= 9, "chunk {i} underfills the word budget: {words}");
            }
        }
    }

    #[test]
    fn test_plain_split_prefers_sentence_boundary() {
        let mut text = String::new();
        for _ in 0..12 {
            text.push_str("This sentence is about forty bytes long ok. ");
        }
        let pieces = chunk_file(&text, "txt", limits(50, 5), &TOK);
        assert!(pieces.len() >= 2);
        // the first chunk ends just after a sentence terminator
        let trimmed = pieces[0].content.trim_end();
        assert!(trimmed.ends_with('.'), "got: …{:?}", &trimmed[trimmed.len() - 10..]);
    }

    #[test]
    fn test_coverage_of_plain_chunks() {
        let text: String = (0..120).map(|i| format!("word{i} ")).collect();
        let pieces = chunk_file(&text, "txt", limits(20, 4), &TOK);
        // every word appears in some chunk
        for i in [0, 30, 60, 90, 119] {
            let needle = format!("word{i}");
            assert!(
                pieces.iter().any(|p| p.content.contains(&needle)),
                "missing {needle}"
            );
        }
        for window in pieces.windows(2) {
            assert!(window[0].start_line <= window[1].start_line);
            assert!(window[0].start_line <= window[0].end_line);
        }
    }

    #[test]
    fn test_markdown_sections_and_header_path() {
        let md = "# Title\n\nIntro text.\n\n## Setup\n\nInstall things.\n\n### Details\n\nMore text.\n\n## Usage\n\nRun it.\n";
        let pieces = chunk_file(md, "md", limits(500, 10), &TOK);
        let setup = pieces.iter().find(|p| p.content.contains("Install")).unwrap();
        assert_eq!(setup.header_path, vec!["Title".to_string(), "Setup".to_string()]);
        let details = pieces.iter().find(|p| p.content.contains("More text")).unwrap();
        assert_eq!(
            details.header_path,
            vec!["Title".to_string(), "Setup".to_string(), "Details".to_string()]
        );
        let usage = pieces.iter().find(|p| p.content.contains("Run it")).unwrap();
        assert_eq!(usage.header_path, vec!["Title".to_string(), "Usage".to_string()]);
    }

    #[test]
    fn test_markdown_frontmatter_attached_to_first_chunk() {
        let md = "---\ntitle: Doc\n---\n# Heading\n\nBody.\n";
        let pieces = chunk_file(md, "md", limits(500, 10), &TOK);
        assert!(pieces[0].content.starts_with("---\ntitle: Doc\n---"));
        assert!(pieces[0].content.contains("# Heading"));
    }

    #[test]
    fn test_markdown_fence_is_atomic_and_headers_inside_ignored() {
        let mut md = String::from("# Doc\n\n");
        md.push_str("```\n# not a header\n");
        for i in 0..60 {
            md.push_str(&format!("line {i} of fenced code block content\n"));
        }
        md.push_str("```\n\ntail prose\n");
        let pieces = chunk_file(&md, "md", limits(40, 5), &TOK);

        // fence must land in exactly one chunk, fully balanced
        let with_fence: Vec<_> =
            pieces.iter().filter(|p| p.content.contains("# not a header")).collect();
        assert_eq!(with_fence.len(), 1);
        let fence_chunk = with_fence[0];
        assert_eq!(fence_chunk.content.matches("```").count(), 2, "fences stay balanced");
        // no section split happened at the fake header
        assert!(pieces.iter().all(|p| !p.header_path.contains(&"not a header".to_string())));
    }

    #[test]
    fn test_code_chunk_carries_construct() {
        let src = r#"
import { a } from './a';
import { b } from './b';

export function first() {
    return 1;
}

export class Widget {
    render() { return 2; }
}
"#;
        let pieces = chunk_file(src, "ts", limits(500, 10), &TOK);
        assert!(!pieces.is_empty());
        assert!(pieces.iter().all(|p| !p.fallback));
        // everything fits in one chunk; the primary construct is the import
        // group, and the full text is covered
        let joined: String = pieces.iter().map(|p| p.content.as_str()).collect();
        assert!(joined.contains("function first"));
        assert!(joined.contains("class Widget"));
    }

    #[test]
    fn test_code_packs_by_boundary() {
        // Each function is ~100 bytes (25 tokens); budget of 30 tokens packs
        // one function per chunk.
        let mut src = String::new();
        for i in 0..4 {
            src.push_str(&format!(
                "function fn{i}() {{\n    const value{i} = {i} + {i};\n    return value{i} * 2 + {i};\n}}\n\n"
            ));
        }
        let pieces = chunk_file(&src, "ts", limits(30, 5), &TOK);
        assert!(pieces.len() >= 4, "expected one chunk per function, got {}", pieces.len());
        let c0 = pieces[0].construct.as_ref().unwrap();
        assert_eq!(c0.kind, "function");
        assert_eq!(c0.name, "fn0");
    }

    #[test]
    fn test_oversize_function_splits_with_identity() {
        let mut body = String::new();
        for i in 0..80 {
            body.push_str(&format!("    console.log(\"line number {i} with padding\");\n"));
        }
        let src = format!("function huge() {{\n{body}}}\n");
        let pieces = chunk_file(&src, "ts", limits(50, 5), &TOK);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(!piece.fallback);
            let c = piece.construct.as_ref().unwrap();
            assert_eq!(c.name, "huge");
        }
    }

    #[test]
    fn test_unparseable_code_falls_back() {
        let src = ")))((( not : even ; close {{{ to ::: typescript ]]]";
        let pieces = chunk_file(src, "ts", limits(100, 10), &TOK);
        assert!(!pieces.is_empty());
        assert!(pieces.iter().all(|p| p.fallback), "fallback flag must be set");
    }
}
