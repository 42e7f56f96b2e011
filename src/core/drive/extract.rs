// =============================================================================
// DOCUMENT TEXT EXTRACTION
// =============================================================================
//
// Pure byte-to-text extractors for the binary formats we download from Drive.
// Nothing here touches the network or applies the truncation budget; the
// search service truncates once, centrally, after extraction.

use super::models::DriveError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

/// Extracts text from a PDF, reading only the first `page_limit` pages.
///
/// The page cap is a cost bound independent of the document's real length: a
/// resume's useful content lives up front, and every extra page is token
/// budget the model pays for downstream.
pub fn pdf_text(bytes: &[u8], page_limit: usize) -> Result<String, DriveError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| DriveError::ExtractionFailed(format!("could not parse PDF: {}", e)))?;
    Ok(first_pages(&pages, page_limit))
}

/// Concatenates the leading `limit` pages into one string.
fn first_pages(pages: &[String], limit: usize) -> String {
    pages
        .iter()
        .take(limit)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .concat()
}

/// Extracts the linear text stream from a .docx file.
///
/// A .docx is a zip container; the body lives in `word/document.xml`. We walk
/// the XML events collecting text runs and emit a newline at each paragraph
/// end, which is enough structure for a language model to read.
pub fn docx_text(bytes: &[u8]) -> Result<String, DriveError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DriveError::ExtractionFailed(format!("not a valid .docx container: {}", e)))?;

    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| {
            DriveError::ExtractionFailed(format!("missing word/document.xml in .docx: {}", e))
        })?
        .read_to_string(&mut document_xml)
        .map_err(|e| DriveError::ExtractionFailed(format!("unreadable document body: {}", e)))?;

    let mut reader = Reader::from_reader(document_xml.as_bytes());
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => {
                let run = e.unescape().map_err(|e| {
                    DriveError::ExtractionFailed(format!("bad text run in .docx: {}", e))
                })?;
                text.push_str(&run);
            }
            // Paragraph and explicit line breaks become newlines.
            Ok(Event::End(e)) if e.name().as_ref() == b"w:p" => text.push('\n'),
            Ok(Event::Empty(e)) if e.name().as_ref() == b"w:br" => text.push('\n'),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DriveError::ExtractionFailed(format!(
                    "malformed document XML: {}",
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

/// Caps `text` at `max_chars` characters (not bytes, so multi-byte content
/// never splits mid-character). Applied uniformly as the last step of every
/// extraction strategy.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
