//! Per-evidence-type analyzers (C4, §4.4).
//!
//! Each analyzer is a plain async function, not a trait object or class
//! hierarchy: `EvidenceType` dispatch is a `match` in the orchestrator
//! mapping type to analyzer function, per the §9 redesign note replacing
//! dynamic dispatch with a tagged match. Every analyzer is generic over
//! `P: AiProvider` rather than `&dyn AiProvider`, because [`AiProvider`]'s
//! methods are themselves generic over the response type and are therefore
//! not object-safe.

pub mod document;
pub mod email;
pub mod image;

pub use document::analyze_document;
pub use email::analyze_email;
pub use image::analyze_image;

/// One evidence item's worth of analysis failure, recorded by the
/// orchestrator rather than aborting the run (§4.4 error policy, §7).
#[derive(Debug, Clone)]
pub struct AnalysisFailure {
    pub sha256: String,
    pub message: String,
}
