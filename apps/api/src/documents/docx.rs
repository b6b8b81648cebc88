//! DOCX reader: yields the plain text of every paragraph in document order.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Declared content type accepted for uploads.
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("not a valid DOCX archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("failed to read document part: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document XML: {0}")]
    Xml(String),
}

/// Extracts paragraph texts from a DOCX file.
///
/// Every `w:p` produces one string, including empty paragraphs and those inside
/// tables. Runs are concatenated; tabs and breaks inside runs become `\t` and `\n`.
/// Text box paragraphs follow the paragraph that anchors them.
pub fn read_paragraphs(bytes: &[u8]) -> Result<Vec<String>, DocxError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive.by_name(DOCUMENT_PART)?.read_to_string(&mut xml)?;
    paragraphs_from_xml(&xml)
}

/// Subtrees that never contribute paragraph text: paragraph properties (tab stop
/// definitions live there) and the legacy copy Word writes for every text box.
const SKIPPED: [&[u8]; 2] = [b"w:pPr", b"mc:Fallback"];

#[derive(Default)]
struct OpenParagraph {
    text: String,
    /// Closed text box paragraphs anchored inside this one.
    nested: Vec<String>,
}

fn close_paragraph(open: &mut [OpenParagraph], paragraphs: &mut Vec<String>, done: OpenParagraph) {
    let target = match open.last_mut() {
        Some(host) => &mut host.nested,
        None => paragraphs,
    };
    target.push(done.text);
    target.extend(done.nested);
}

fn paragraphs_from_xml(xml: &str) -> Result<Vec<String>, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    // Open paragraphs; text boxes can nest a paragraph inside another.
    let mut open: Vec<OpenParagraph> = Vec::new();
    let mut skip_depth = 0usize;
    let mut open_runs = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                if skip_depth > 0 || SKIPPED.iter().any(|skipped| *skipped == name.as_ref()) {
                    skip_depth += 1;
                    continue;
                }
                match name.as_ref() {
                    b"w:p" => open.push(OpenParagraph::default()),
                    b"w:r" => open_runs += 1,
                    b"w:t" => in_text = true,
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                    continue;
                }
                match e.name().as_ref() {
                    b"w:p" => {
                        if let Some(done) = open.pop() {
                            close_paragraph(&mut open, &mut paragraphs, done);
                        }
                    }
                    b"w:r" => open_runs = open_runs.saturating_sub(1),
                    b"w:t" => in_text = false,
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) if skip_depth == 0 => match e.name().as_ref() {
                b"w:p" => close_paragraph(&mut open, &mut paragraphs, OpenParagraph::default()),
                b"w:tab" if open_runs > 0 => {
                    if let Some(current) = open.last_mut() {
                        current.text.push('\t');
                    }
                }
                b"w:br" | b"w:cr" if open_runs > 0 => {
                    if let Some(current) = open.last_mut() {
                        current.text.push('\n');
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_text && skip_depth == 0 => {
                let chunk = t.unescape().map_err(|e| DocxError::Xml(e.to_string()))?;
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&chunk);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(DocxError::Xml(format!(
                    "at position {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    Ok(paragraphs)
}
