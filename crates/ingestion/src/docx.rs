//! DOCX paragraph extraction
//!
//! A .docx file is a ZIP archive; the body lives in `word/document.xml` as
//! `<w:p>` paragraph elements whose text is split across `<w:t>` runs.
//! Runs are concatenated per paragraph so the chunker sees the same
//! paragraph boundaries the author wrote.

use crate::errors::IngestionError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;
use std::path::Path;

/// Decompressed size limit for the document body (zip-bomb protection)
const MAX_DOCUMENT_XML_BYTES: u64 = 50 * 1024 * 1024;

/// Extract paragraphs from a .docx file, in document order
pub fn extract_paragraphs(path: &Path) -> Result<Vec<String>, IngestionError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| IngestionError::DocxParseError(format!("not a zip archive: {e}")))?;

    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| IngestionError::DocxParseError("word/document.xml not found".to_string()))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_DOCUMENT_XML_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| IngestionError::DocxParseError(e.to_string()))?;
    if xml.len() as u64 >= MAX_DOCUMENT_XML_BYTES {
        return Err(IngestionError::DocxParseError(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    paragraphs_from_xml(&xml)
}

fn paragraphs_from_xml(xml: &[u8]) -> Result<Vec<String>, IngestionError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text_run = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                b"t" => in_text_run = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                let text = t
                    .unescape()
                    .map_err(|e| IngestionError::DocxParseError(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(IngestionError::DocxParseError(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_split_on_w_p() {
        let xml = br#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>First </w:t></w:r><w:r><w:t>paragraph.</w:t></w:r></w:p>
                <w:p><w:r><w:t>Second paragraph.</w:t></w:r></w:p>
                <w:p/>
              </w:body>
            </w:document>"#;

        let paragraphs = paragraphs_from_xml(xml).unwrap();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0], "First paragraph.");
        assert_eq!(paragraphs[1], "Second paragraph.");
    }

    #[test]
    fn test_entities_unescaped() {
        let xml = br#"<w:document xmlns:w="ns"><w:body>
            <w:p><w:r><w:t>AT&amp;T &lt;results&gt;</w:t></w:r></w:p>
        </w:body></w:document>"#;

        let paragraphs = paragraphs_from_xml(xml).unwrap();
        assert_eq!(paragraphs, vec!["AT&T <results>"]);
    }

    #[test]
    fn test_non_zip_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.docx");
        std::fs::write(&path, b"plain text, not a zip").unwrap();

        let err = extract_paragraphs(&path).unwrap_err();
        assert!(matches!(err, IngestionError::DocxParseError(_)));
    }
}
