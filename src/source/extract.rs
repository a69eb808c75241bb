//! Attachment text extraction
//!
//! Unsupported formats yield `None`; that is never an error.

use scraper::{Html, Selector};
use tracing::debug;

/// Essence of a content type: `text/html; charset=utf-8` -> `text/html`
fn essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

/// Guess a content type from a file name or URL extension
pub fn guess_mime(path: &str) -> Option<&'static str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())?;
    match extension.as_str() {
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        "htm" | "html" => Some("text/html"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "odt" => Some("application/vnd.oasis.opendocument.text"),
        _ => None,
    }
}

/// File extension to store an attachment under; `pdf` when nothing is known
pub fn extension_for(mime: Option<&str>) -> &'static str {
    match mime.map(essence).as_deref() {
        Some("text/plain") => "txt",
        Some("text/html") | Some("application/xhtml+xml") => "html",
        Some("application/msword") => "doc",
        Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document") => "docx",
        Some("application/vnd.oasis.opendocument.text") => "odt",
        _ => "pdf",
    }
}

/// Whether this build reads text from PDF attachments
pub fn pdf_supported() -> bool {
    cfg!(feature = "pdf")
}

/// Text of an attachment, or `None` when the format is unsupported or the
/// result is blank
pub fn extract_text(bytes: &[u8], mime_hint: Option<&str>) -> Option<String> {
    let mime = mime_hint.map(essence)?;
    let text = match mime.as_str() {
        "text/plain" => Some(String::from_utf8_lossy(bytes).into_owned()),
        "text/html" | "application/xhtml+xml" => Some(html_text(&String::from_utf8_lossy(bytes))),
        "application/pdf" => pdf_text(bytes),
        other => {
            debug!(mime = other, "No text extraction for attachment type");
            None
        }
    };
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn html_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());
    root.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(feature = "pdf")]
fn pdf_text(bytes: &[u8]) -> Option<String> {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => Some(text),
        Err(e) => {
            debug!(error = %e, "PDF text extraction failed");
            None
        }
    }
}

#[cfg(not(feature = "pdf"))]
fn pdf_text(_bytes: &[u8]) -> Option<String> {
    debug!("Built without the pdf feature; skipping PDF text");
    None
}
