//! Cross-evidence correlation engine (C5, §4.5).
//!
//! Pure and deterministic given a snapshot of a case's analyses: entity
//! canonicalization, timeline reconstruction, temporal sequences, and
//! timeline gaps never call the AI port. The optional AI entity-resolution
//! pass and the pattern detector (C6, [`crate::pattern`]) are the only parts
//! of correlation that touch it, and are both attached by the caller
//! ([`crate::orchestrator`]) rather than from inside this module, keeping
//! the staged, read-only shape the §9 design note calls for.

pub mod canonicalize;
pub mod extract;
pub mod resolve;
pub mod sequences;
pub mod timeline;

use chrono::Utc;

use crate::config::Config;
use crate::error::Error;
use crate::models::correlation::CorrelationAnalysis;
use crate::models::evidence::{UnifiedAnalysis, SCHEMA_VERSION};
use crate::store::EvidenceStore;

/// Builds entity correlations, the reconstructed timeline, temporal
/// sequences, and timeline gaps for `case_id`. Does not call the AI port;
/// `legal_patterns` is left `None` for the caller to fill in via
/// [`crate::pattern::detect_patterns`].
pub async fn correlate(
    store: &EvidenceStore,
    case_id: &str,
    config: &Config,
) -> Result<CorrelationAnalysis, Error> {
    let analyses = store.case_analyses(case_id).await?;
    correlate_analyses(store, case_id, &analyses, config).await
}

/// Same as [`correlate`] but over an already-loaded snapshot, so callers
/// (tests, the AI-resolution pass) can compute correlation without a second
/// store read.
pub async fn correlate_analyses(
    store: &EvidenceStore,
    case_id: &str,
    analyses: &[UnifiedAnalysis],
    config: &Config,
) -> Result<CorrelationAnalysis, Error> {
    let entity_correlations = extract::correlate_entities(analyses);

    let mut timeline_events = Vec::new();
    for analysis in analyses {
        let exif_date = store
            .get_exif(&analysis.file_metadata.sha256)
            .await?
            .and_then(|e| e.date_time_original);
        timeline_events.extend(timeline::events_for(analysis, exif_date));
    }
    timeline::sort_events(&mut timeline_events);

    let temporal_sequences =
        sequences::temporal_sequences(&timeline_events, config.temporal_sequence_window_hours);
    let timeline_gaps = sequences::timeline_gaps(&timeline_events, config.timeline_gap_threshold_hours);

    let analysis = CorrelationAnalysis {
        schema_version: SCHEMA_VERSION.to_string(),
        case_id: case_id.to_string(),
        evidence_count: analyses.len(),
        entity_correlations,
        timeline_events,
        temporal_sequences,
        timeline_gaps,
        legal_patterns: None,
        analysis_timestamp: Utc::now(),
    };
    analysis.validate()?;
    Ok(analysis)
}
