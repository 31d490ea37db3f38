//! Plain-text extraction (§4.4, §6 `extract_text` contract).
//!
//! Real PDF text-layer extraction is out of scope here, so the only local
//! implementation handles content that is already text (`.txt`/`.md`/
//! UTF-8-decodable bytes) and reports `ExtractorUnsupported` for anything
//! else (notably PDFs), which the orchestrator uses to re-route the
//! evidence to the image analyzer (§4.4).

use async_trait::async_trait;

use crate::error::Error;
use crate::extract::ExtractResult;

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extracts plain text from `bytes` whose declared MIME type is `mime`.
    /// Returns `Err(Error::ExtractorUnsupported)` for content this
    /// implementation cannot turn into text (§6).
    async fn extract_text(&self, bytes: &[u8], mime: &str) -> ExtractResult;
}

/// Treats anything UTF-8 decodable and not a binary document format as
/// already-extracted text; everything else (PDF, images, office binary
/// formats) is `ExtractorUnsupported`.
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    fn is_text_like(mime: &str) -> bool {
        mime.starts_with("text/") || mime == "application/rtf"
    }
}

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract_text(&self, bytes: &[u8], mime: &str) -> ExtractResult {
        if !Self::is_text_like(mime) {
            return Err(Error::ExtractorUnsupported(format!(
                "no local extractor for MIME type {mime}"
            )));
        }
        match std::str::from_utf8(bytes) {
            Ok(text) if !text.trim().is_empty() => Ok(text.to_string()),
            Ok(_) => Err(Error::ExtractorUnsupported("extracted text was empty".to_string())),
            Err(_) => Err(Error::ExtractorUnsupported("content is not valid UTF-8 text".to_string())),
        }
    }
}
