//! PDF chunk extraction
//!
//! The primary path walks the document structure with lopdf: Info
//! dictionary metadata, the outline tree, per-page text, and a columnar
//! table heuristic over each page. If structured extraction fails, a
//! fallback pass scans raw content streams for text operators and yields
//! page and table chunks only.

use crate::errors::IngestionError;
use lectern_common::models::{Chunk, ChunkKind, ChunkMetadata};
use lopdf::{Dictionary, Document, Object, ObjectId};
use regex_lite::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Metadata below this rendered length is considered noise and dropped
const MIN_METADATA_CHARS: usize = 20;

/// Outline recursion guard
const MAX_OUTLINE_DEPTH: usize = 8;

/// Extract chunks from a PDF file.
///
/// Chunk order: metadata (if meaningful), table of contents (if present),
/// then per page its text chunk followed by any table chunks.
pub fn parse_pdf(path: &Path, source: &str) -> Result<Vec<Chunk>, IngestionError> {
    match parse_structured(path, source) {
        Ok(chunks) => Ok(chunks),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Structured PDF extraction failed, falling back to content-stream scan"
            );
            parse_content_streams(path, source)
        }
    }
}

fn pdf_err(path: &Path, message: impl Into<String>) -> IngestionError {
    IngestionError::PdfParseError {
        path: path.display().to_string(),
        message: message.into(),
    }
}

/// Primary path: structured extraction via lopdf
fn parse_structured(path: &Path, source: &str) -> Result<Vec<Chunk>, IngestionError> {
    let doc = Document::load(path).map_err(|e| pdf_err(path, format!("Failed to load PDF: {e}")))?;

    let mut chunks = Vec::new();

    if let Some(rendered) = render_metadata(&doc) {
        chunks.push(Chunk::new(
            rendered,
            ChunkMetadata::new(source, ChunkKind::Metadata),
        ));
    }

    if let Some(rendered) = render_toc(&doc) {
        chunks.push(Chunk::new(
            rendered,
            ChunkMetadata::new(source, ChunkKind::Toc),
        ));
    }

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    for (&page_num, _) in pages.iter() {
        let text = match doc.extract_text(&[page_num]) {
            Ok(text) => text,
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract text from page, skipping");
                continue;
            }
        };
        push_page_chunks(&mut chunks, &text, source, page_num);
    }

    if chunks.is_empty() {
        return Err(pdf_err(path, "No content extracted from PDF"));
    }

    Ok(chunks)
}

/// Append the page chunk and any detected table chunks for one page.
///
/// Pages whose extracted text is blank produce nothing, tables included.
fn push_page_chunks(chunks: &mut Vec<Chunk>, text: &str, source: &str, page_num: u32) {
    if text.trim().is_empty() {
        return;
    }

    chunks.push(Chunk::new(
        text.to_string(),
        ChunkMetadata::page(source, page_num),
    ));

    for (table_index, rendered) in detect_tables(text).into_iter().enumerate() {
        chunks.push(Chunk::new(
            rendered,
            ChunkMetadata::table(source, page_num, table_index),
        ));
    }
}

// ---------------------------------------------------------------------------
// Document metadata
// ---------------------------------------------------------------------------

fn render_metadata(doc: &Document) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;
    let dict = resolve_dict(doc, info)?;

    let mut rendered = String::from("Document Metadata:\n");
    for (key, value) in dict.iter() {
        if let Some(text) = object_text(doc, value) {
            if !text.trim().is_empty() {
                rendered.push_str(&format!("{}: {}\n", String::from_utf8_lossy(key), text.trim()));
            }
        }
    }

    (rendered.chars().count() > MIN_METADATA_CHARS).then_some(rendered)
}

// ---------------------------------------------------------------------------
// Table of contents
// ---------------------------------------------------------------------------

struct OutlineEntry {
    depth: usize,
    title: String,
    page: Option<u32>,
}

fn render_toc(doc: &Document) -> Option<String> {
    let catalog = doc.catalog().ok()?;
    let outlines = catalog.get(b"Outlines").ok()?;
    let outlines_dict = resolve_dict(doc, outlines)?;

    let page_numbers: BTreeMap<ObjectId, u32> = doc
        .get_pages()
        .into_iter()
        .map(|(num, id)| (id, num))
        .collect();

    let mut entries = Vec::new();
    let mut visited = HashSet::new();
    if let Ok(first) = outlines_dict.get(b"First") {
        collect_outline_entries(doc, first, 1, &page_numbers, &mut visited, &mut entries);
    }

    if entries.is_empty() {
        return None;
    }

    let mut rendered = String::from("Table of Contents:\n");
    for entry in entries {
        let indent = "  ".repeat(entry.depth - 1);
        match entry.page {
            Some(page) => rendered.push_str(&format!("{indent}• {} (Page {page})\n", entry.title)),
            None => rendered.push_str(&format!("{indent}• {}\n", entry.title)),
        }
    }

    Some(rendered)
}

fn collect_outline_entries(
    doc: &Document,
    node: &Object,
    depth: usize,
    pages: &BTreeMap<ObjectId, u32>,
    visited: &mut HashSet<ObjectId>,
    out: &mut Vec<OutlineEntry>,
) {
    if depth > MAX_OUTLINE_DEPTH {
        return;
    }

    let mut current = node.as_reference().ok();
    while let Some(id) = current {
        if !visited.insert(id) {
            return;
        }
        let Ok(dict) = doc.get_object(id).and_then(|o| o.as_dict()) else {
            return;
        };

        let title = dict
            .get(b"Title")
            .ok()
            .and_then(|o| object_text(doc, o))
            .unwrap_or_default();
        if !title.trim().is_empty() {
            out.push(OutlineEntry {
                depth,
                title: title.trim().to_string(),
                page: resolve_destination_page(doc, dict, pages),
            });
        }

        if let Ok(first) = dict.get(b"First") {
            collect_outline_entries(doc, first, depth + 1, pages, visited, out);
        }

        current = dict.get(b"Next").ok().and_then(|o| o.as_reference().ok());
    }
}

/// Best-effort mapping of an outline entry's destination to a 1-based page
fn resolve_destination_page(
    doc: &Document,
    dict: &Dictionary,
    pages: &BTreeMap<ObjectId, u32>,
) -> Option<u32> {
    let dest = if let Ok(dest) = dict.get(b"Dest") {
        Some(dest.clone())
    } else if let Ok(action) = dict.get(b"A") {
        resolve_dict(doc, action).and_then(|a| a.get(b"D").ok().cloned())
    } else {
        None
    }?;

    let dest = match dest {
        Object::Reference(id) => doc.get_object(id).ok()?.clone(),
        other => other,
    };

    let array = match dest {
        Object::Array(array) => array,
        _ => return None,
    };

    match array.first()? {
        Object::Reference(page_id) => pages.get(page_id).copied(),
        Object::Integer(index) => u32::try_from(*index).ok().map(|i| i + 1),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Object helpers
// ---------------------------------------------------------------------------

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => doc.get_object(*id).ok().and_then(|o| o.as_dict().ok()),
        _ => None,
    }
}

/// Text content of a string object, following a single reference hop
fn object_text(doc: &Document, obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::String(bytes, _) => Some(decode_text_string(bytes)),
            _ => None,
        },
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE when BOM-prefixed, lossy UTF-8 otherwise
fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Table detection
// ---------------------------------------------------------------------------

fn column_gap() -> &'static Regex {
    static COLUMN_GAP: OnceLock<Regex> = OnceLock::new();
    COLUMN_GAP.get_or_init(|| Regex::new(r" {2,}").expect("static regex"))
}

/// Detect columnar regions in extracted page text.
///
/// A table row is a line splitting into 2+ cells on pipes, tabs, or runs of
/// 2+ spaces; 2+ consecutive rows form a table. Each table renders as
/// `Table content:` plus rows joined with `" | "`, empty cells kept empty.
fn detect_tables(text: &str) -> Vec<String> {
    let mut tables = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        if let Some(cells) = split_row(line) {
            rows.push(cells);
        } else {
            flush_table(&mut rows, &mut tables);
        }
    }
    flush_table(&mut rows, &mut tables);

    tables
}

fn flush_table(rows: &mut Vec<Vec<String>>, tables: &mut Vec<String>) {
    if rows.len() >= 2 {
        let mut rendered = String::from("Table content:\n");
        for row in rows.iter() {
            rendered.push_str(&row.join(" | "));
            rendered.push('\n');
        }
        tables.push(rendered);
    }
    rows.clear();
}

fn split_row(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let cells: Vec<String> = if trimmed.contains('|') {
        trimmed.split('|').map(|c| c.trim().to_string()).collect()
    } else if trimmed.contains('\t') {
        trimmed.split('\t').map(|c| c.trim().to_string()).collect()
    } else {
        column_gap()
            .split(trimmed)
            .map(|c| c.trim().to_string())
            .collect()
    };

    (cells.len() >= 2).then_some(cells)
}

// ---------------------------------------------------------------------------
// Fallback: content-stream scan
// ---------------------------------------------------------------------------

/// Fallback path: scan raw content streams for text-showing operators.
/// Produces page and table chunks only — no metadata, no TOC.
fn parse_content_streams(path: &Path, source: &str) -> Result<Vec<Chunk>, IngestionError> {
    let doc = Document::load(path).map_err(|e| pdf_err(path, format!("Failed to load PDF: {e}")))?;

    let mut chunks = Vec::new();
    for (&page_num, &page_id) in doc.get_pages().iter() {
        let content = match doc.get_page_content(page_id) {
            Ok(content) => content,
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to read page content, skipping");
                continue;
            }
        };
        let text = extract_text_from_content(&content);
        push_page_chunks(&mut chunks, &text, source, page_num);
    }

    if chunks.is_empty() {
        return Err(pdf_err(path, "No text content extracted from PDF"));
    }

    Ok(chunks)
}

/// Extract text from a PDF content stream.
///
/// Looks for text between BT and ET operators.
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current_text = String::new();

    for line in content_str.lines() {
        let trimmed = line.trim();

        if trimmed == "BT" {
            in_text_block = true;
            continue;
        }

        if trimmed == "ET" {
            in_text_block = false;
            if !current_text.is_empty() {
                text.push_str(&current_text);
                text.push(' ');
                current_text.clear();
            }
            continue;
        }

        if in_text_block {
            // Text showing operators: Tj, TJ, ', "
            if let Some(text_content) = extract_text_from_operator(trimmed) {
                current_text.push_str(&text_content);
            }
        }
    }

    text
}

/// Extract text from a PDF text operator line
fn extract_text_from_operator(line: &str) -> Option<String> {
    // Handle (text) Tj operator
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        if let Some(start) = line.find('(') {
            if let Some(end) = line.rfind(')') {
                let text = &line[start + 1..end];
                return Some(decode_pdf_string(text));
            }
        }
    }

    // Handle [(text) num (text) num] TJ operator (array of text)
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut in_paren = false;
        let mut current = String::new();

        for ch in line.chars() {
            match ch {
                '(' => {
                    in_paren = true;
                }
                ')' => {
                    in_paren = false;
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                }
                _ if in_paren => {
                    current.push(ch);
                }
                _ => {}
            }
        }

        if !result.is_empty() {
            return Some(result);
        }
    }

    None
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('(') => result.push('('),
                Some(')') => result.push(')'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream};

    fn build_three_page_pdf(path: &Path) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let page_lines: [&[&str]; 3] = [
            &["Photosynthesis converts light into chemical energy."],
            &[
                "Measured constants follow.",
                "mass    9.1    kg",
                "speed    3.0    m",
            ],
            &["Conclusions are summarized on this final page."],
        ];

        let mut kids: Vec<Object> = Vec::new();
        for lines in page_lines {
            let mut operations = Vec::new();
            let mut y = 750;
            for line in lines {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
                operations.push(Operation::new("Td", vec![50.into(), y.into()]));
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                operations.push(Operation::new("ET", vec![]));
                y -= 14;
            }

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_three_page_pdf_yields_tagged_page_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        build_three_page_pdf(&path);

        let chunks = parse_pdf(&path, "report.pdf").unwrap();

        let pages: Vec<u32> = chunks
            .iter()
            .filter(|c| c.metadata.kind == ChunkKind::Page)
            .filter_map(|c| c.metadata.page)
            .collect();
        assert_eq!(pages, vec![1, 2, 3]);

        // Table detection depends on the extraction path preserving line
        // breaks; when a table is found it must be tagged page 2, index 0.
        for table in chunks.iter().filter(|c| c.metadata.kind == ChunkKind::Table) {
            assert_eq!(table.metadata.page, Some(2));
            assert_eq!(table.metadata.table_index, Some(0));
            assert!(table.content.starts_with("Table content:\n"));
        }

        assert!(chunks.iter().all(|c| c.metadata.source == "report.pdf"));
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string("Hello\\nWorld"), "Hello\nWorld");
        assert_eq!(decode_pdf_string("Test\\(paren\\)"), "Test(paren)");
    }

    #[test]
    fn test_decode_utf16_text_string() {
        // BOM + "Hi"
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_text_string(&bytes), "Hi");
        assert_eq!(decode_text_string(b"plain"), "plain");
    }

    #[test]
    fn test_content_stream_extraction() {
        let content = b"BT\n(Hello) Tj\n(World) Tj\nET\n";
        let text = extract_text_from_content(content);
        assert_eq!(text, "HelloWorld ");
    }

    #[test]
    fn test_tj_array_operator() {
        let extracted = extract_text_from_operator("[(He) -20 (llo)] TJ").unwrap();
        assert_eq!(extracted, "Hello");
    }

    #[test]
    fn test_detect_tables_on_columnar_lines() {
        let text = "Introduction text line\nName    Value    Unit\nmass    9.1      kg\nspeed   3.0      m/s\nClosing prose.";
        let tables = detect_tables(text);
        assert_eq!(tables.len(), 1);
        assert!(tables[0].starts_with("Table content:\n"));
        assert!(tables[0].contains("mass | 9.1 | kg"));
    }

    #[test]
    fn test_single_columnar_line_is_not_a_table() {
        let text = "prose line\nName    Value\nmore prose";
        assert!(detect_tables(text).is_empty());
    }

    #[test]
    fn test_missing_cells_render_empty() {
        let cells = split_row("alpha | | gamma").unwrap();
        assert_eq!(cells, vec!["alpha", "", "gamma"]);
    }

    #[test]
    fn test_page_chunks_skip_blank_pages() {
        let mut chunks = Vec::new();
        push_page_chunks(&mut chunks, "   \n  ", "r.pdf", 1);
        assert!(chunks.is_empty());

        push_page_chunks(&mut chunks, "Some page text", "r.pdf", 2);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.kind, ChunkKind::Page);
        assert_eq!(chunks[0].metadata.page, Some(2));
    }

    #[test]
    fn test_table_chunks_tagged_with_page_and_index() {
        let mut chunks = Vec::new();
        let text = "header\ncol_a    col_b\n1    2\n";
        push_page_chunks(&mut chunks, text, "r.pdf", 2);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].metadata.kind, ChunkKind::Table);
        assert_eq!(chunks[1].metadata.page, Some(2));
        assert_eq!(chunks[1].metadata.table_index, Some(0));
    }
}
