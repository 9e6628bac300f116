//! Plain-text extraction from uploaded document bytes
//!
//! Pure functions of their input: no filesystem or network access. The
//! pipeline wraps `extract` in a blocking task with a time bound, since PDF
//! parsing can stall on pathological fonts.

use crate::error::{Error, Result};
use crate::types::DocumentFormat;

pub struct TextExtractor;

impl TextExtractor {
    /// Extract plain text from raw bytes in the declared format.
    ///
    /// Fails with `CorruptDocument` when parsing yields no recoverable text.
    /// A plain-text file may legitimately be empty; for PDF and DOCX an
    /// empty result means the parser recovered nothing.
    pub fn extract(data: &[u8], format: DocumentFormat) -> Result<String> {
        let text = match format {
            DocumentFormat::Pdf => Self::extract_pdf(data)?,
            DocumentFormat::Docx => Self::extract_docx(data)?,
            DocumentFormat::Txt => Self::extract_txt(data),
        };

        let text = normalize(&text);
        if text.is_empty() && format != DocumentFormat::Txt {
            return Err(Error::CorruptDocument(format!(
                "no recoverable text in {} document",
                format.as_str()
            )));
        }
        Ok(text)
    }

    fn extract_pdf(data: &[u8]) -> Result<String> {
        match pdf_extract::extract_text_from_mem(data) {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!("pdf-extract failed: {}, trying lopdf fallback", e);
                Self::extract_pdf_fallback(data)
            }
        }
    }

    /// Fallback extraction scanning content streams directly with lopdf.
    fn extract_pdf_fallback(data: &[u8]) -> Result<String> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::CorruptDocument(format!("failed to load PDF: {}", e)))?;

        let mut all_text = String::new();
        for (page_num, page_id) in doc.get_pages() {
            match doc.get_page_content(page_id) {
                Ok(content) => {
                    let text = text_from_content_stream(&content);
                    if !text.is_empty() {
                        all_text.push_str(&text);
                        all_text.push('\n');
                    }
                }
                Err(e) => {
                    tracing::debug!("no content for PDF page {}: {}", page_num, e);
                }
            }
        }

        if all_text.trim().is_empty() {
            return Err(Error::CorruptDocument(
                "PDF has no extractable text; it may be image-based or encrypted".into(),
            ));
        }
        Ok(all_text)
    }

    fn extract_docx(data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::CorruptDocument(format!("failed to read DOCX: {}", e)))?;

        let mut content = String::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
                for child in paragraph.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(text) = child {
                                content.push_str(&text.text);
                            }
                        }
                    }
                }
                content.push('\n');
            }
        }
        Ok(content)
    }

    fn extract_txt(data: &[u8]) -> String {
        String::from_utf8_lossy(data).into_owned()
    }
}

/// Fold typographic characters to ASCII, drop control characters, and
/// collapse blank lines. Keeps line-internal whitespace intact so chunk
/// passages stay byte-slices of this text.
fn normalize(text: &str) -> String {
    let folded = text
        .replace('\0', "")
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2014}', "--")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{2026}', "...")
        .replace('\u{00A0}', " ")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl");

    folded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull text out of a PDF content stream: strings shown between BT/ET via
/// the Tj/TJ operators.
fn text_from_content_stream(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in content_str.lines() {
        let line = line.trim();
        if line == "BT" {
            in_text_block = true;
            continue;
        }
        if line == "ET" {
            in_text_block = false;
            continue;
        }
        if in_text_block && (line.ends_with("Tj") || line.ends_with("TJ")) {
            if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
                if start < end {
                    let decoded = line[start + 1..end]
                        .replace("\\n", "\n")
                        .replace("\\(", "(")
                        .replace("\\)", ")")
                        .replace("\\\\", "\\");
                    text.push_str(&decoded);
                    text.push(' ');
                }
            }
        }
    }

    text
}
