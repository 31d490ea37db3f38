//! Pluggable text-extraction and email-parsing contracts (C12, §6).
//!
//! The document analyzer never reads file bytes directly: it goes through a
//! `TextExtractor`, and the email analyzer through an `EmailParser`. Both are
//! traits with one local implementation sufficient to drive the pipeline
//! end-to-end (§1 treats PDF text extraction and MIME parsing as external
//! collaborators; this crate ships the minimal real implementation needed
//! to exercise the rest of the pipeline rather than a stub).

pub mod email;
pub mod text;

pub use email::{EmailParser, ParsedEmail, RfcEmailParser};
pub use text::{PlainTextExtractor, TextExtractor};

use crate::error::Error;

/// Result of a text-extraction attempt, mirroring the `str | Unsupported`
/// contract in §6: an extractor never returns an error for "this file has no
/// text", only for genuine I/O/decoding failures, since "no text" is
/// expected to reroute the evidence to the image analyzer.
pub type ExtractResult = Result<String, Error>;
