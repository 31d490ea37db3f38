//! Evidence identity, metadata, and chain-of-custody records.
//!
//! Chain-of-custody actions are a fixed enum rather than free text, and
//! timestamps are `chrono::DateTime<Utc>` so custody ordering can compare
//! directly rather than through a secondary parse step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::Error;
use crate::models::validate::validate_sha256;

// Re-exported so callers building a `UnifiedAnalysis` can reach the legal
// significance band through this module alongside `TypedAnalysis`, without
// a separate import from `models::analysis`.
pub use crate::models::analysis::LegalSignificance;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Evidence type, determined from extension and content sniffing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Document,
    Image,
    Email,
    Pdf,
    Audio,
    Video,
    Other,
}

impl EvidenceType {
    /// Sniff the type from a filename extension. PDFs are tentatively typed
    /// `Pdf` here; the document analyzer re-routes to `Image` if text
    /// extraction fails (§4.4).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "md" | "doc" | "docx" | "rtf" | "odt" => EvidenceType::Document,
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tiff" | "webp" => EvidenceType::Image,
            "eml" | "msg" => EvidenceType::Email,
            "pdf" => EvidenceType::Pdf,
            "mp3" | "wav" | "m4a" | "flac" => EvidenceType::Audio,
            "mp4" | "mov" | "avi" | "mkv" => EvidenceType::Video,
            _ => EvidenceType::Other,
        }
    }
}

/// Immutable, per-evidence file metadata. Written once at ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    pub byte_size: u64,
    pub mime: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub extension: String,
    pub sha256: String,
}

impl FileMetadata {
    pub fn validate(&self) -> Result<(), Error> {
        validate_sha256(&self.sha256)?;
        if self.byte_size == 0 {
            return Err(Error::ValidationError("byte size must be >= 1".to_string()));
        }
        if self.filename.is_empty() {
            return Err(Error::ValidationError("filename must not be empty".to_string()));
        }
        Ok(())
    }
}

/// An append-only chain-of-custody action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CustodyAction {
    Ingest,
    Analyze,
    CaseAssociate,
    Export,
    Reanalyze,
    Prune,
}

/// One event in a sha256's chain-of-custody log. Events are totally ordered
/// by `(timestamp, insertion order)`; the insertion order is implicit in the
/// position within the persisted `Vec`, which is why the log is append-only
/// and never sorted or re-ordered in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainOfCustodyEvent {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: CustodyAction,
    pub note: String,
}

impl ChainOfCustodyEvent {
    pub fn new(actor: impl Into<String>, action: CustodyAction, note: impl Into<String>) -> Self {
        Self { timestamp: Utc::now(), actor: actor.into(), action, note: note.into() }
    }
}

/// Exactly one of the three typed analyses a `UnifiedAnalysis` may carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypedAnalysis {
    Document(crate::models::analysis::DocumentAnalysis),
    Email(crate::models::analysis::EmailThreadAnalysis),
    Image(crate::models::analysis::ImageAnalysis),
}

/// The per-evidence analysis record (`analysis.v1.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedAnalysis {
    pub schema_version: String,
    pub evidence_type: EvidenceType,
    pub analysis_timestamp: DateTime<Utc>,
    pub file_metadata: FileMetadata,
    pub case_ids: BTreeSet<String>,
    pub analysis: TypedAnalysis,
    pub labels: BTreeSet<String>,
    pub chain_of_custody: Vec<ChainOfCustodyEvent>,
}

impl UnifiedAnalysis {
    pub fn new(
        evidence_type: EvidenceType,
        file_metadata: FileMetadata,
        analysis: TypedAnalysis,
        case_ids: BTreeSet<String>,
        labels: BTreeSet<String>,
        chain_of_custody: Vec<ChainOfCustodyEvent>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            evidence_type,
            analysis_timestamp: Utc::now(),
            file_metadata,
            case_ids,
            analysis,
            labels,
            chain_of_custody,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.schema_version.split('.').next() != SCHEMA_VERSION.split('.').next() {
            return Err(Error::ValidationError(format!(
                "unsupported schema major version: {}",
                self.schema_version
            )));
        }
        self.file_metadata.validate()?;
        match &self.analysis {
            TypedAnalysis::Document(d) => d.validate()?,
            TypedAnalysis::Email(e) => e.validate()?,
            TypedAnalysis::Image(i) => i.validate()?,
        }
        Ok(())
    }
}
