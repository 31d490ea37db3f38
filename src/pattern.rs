//! AI-assisted legal pattern detector (C6, §4.6).
//!
//! Given a bounded slice of a case's correlations — the top 20 entities by
//! occurrence, the most recent 30 timeline events, and the first 10
//! per-evidence summaries — asks the AI port for contradictions,
//! corroboration, and evidence gaps. Never fatal to the surrounding
//! correlation run: any AI failure leaves `legal_patterns` `None`, and any
//! sha256 the model names that is not actually in the case is dropped with
//! a warning rather than rejecting the whole response.

use std::collections::HashSet;

use crate::ai::{prompts, AiProvider};
use crate::models::correlation::{CorrelatedEntity, LegalPatternAnalysis, TimelineEvent};
use crate::models::evidence::{TypedAnalysis, UnifiedAnalysis};

const MAX_ENTITIES: usize = 20;
const MAX_EVENTS: usize = 30;
const MAX_SUMMARIES: usize = 10;

/// One-line summary pulled directly from an evidence item's own analysis,
/// not the fuller `EvidenceSummary` the summary aggregator builds.
fn summary_for(analysis: &UnifiedAnalysis) -> String {
    let body = match &analysis.analysis {
        TypedAnalysis::Document(d) => d.summary.clone(),
        TypedAnalysis::Email(e) => e.thread_summary.clone(),
        TypedAnalysis::Image(i) => i.scene_description.clone(),
    };
    format!("{}: {}", analysis.file_metadata.sha256, body)
}

fn build_context(entities: &[CorrelatedEntity], events: &[TimelineEvent], analyses: &[UnifiedAnalysis]) -> String {
    let top_entities: Vec<&CorrelatedEntity> = entities.iter().take(MAX_ENTITIES).collect();
    let recent_events: Vec<&TimelineEvent> = {
        let mut sorted: Vec<&TimelineEvent> = events.iter().filter(|e| !e.is_ingestion_artifact()).collect();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sorted.into_iter().take(MAX_EVENTS).collect()
    };
    let summaries: Vec<String> = analyses.iter().take(MAX_SUMMARIES).map(summary_for).collect();

    let entities_text = top_entities
        .iter()
        .map(|e| format!("- {} ({:?}, seen in {} items)", e.entity_name, e.entity_type, e.occurrence_count))
        .collect::<Vec<_>>()
        .join("\n");
    let events_text = recent_events
        .iter()
        .map(|e| format!("- {} [{}] {} (sha256={})", e.timestamp.to_rfc3339(), e.event_type, e.description, e.evidence_sha256))
        .collect::<Vec<_>>()
        .join("\n");
    let summaries_text = summaries.join("\n");

    format!(
        "Entities:\n{entities_text}\n\nRecent events:\n{events_text}\n\nEvidence summaries:\n{summaries_text}"
    )
}

/// Runs the pattern detector for one case. `analyses` should be the same
/// snapshot used to build `entities`/`events` so sha256 validation below is
/// meaningful. Returns `Ok(None)` on any AI failure; never propagates the AI
/// error to the caller, consistent with "the rest of CorrelationAnalysis is
/// unaffected" (§4.6).
pub async fn detect_patterns<P: AiProvider>(
    provider: &P,
    entities: &[CorrelatedEntity],
    events: &[TimelineEvent],
    analyses: &[UnifiedAnalysis],
) -> Option<LegalPatternAnalysis> {
    let context = build_context(entities, events, analyses);
    let prompt = format!("{}\n\n{}", prompts::legal_pattern_system_prompt(), context);

    let mut result: LegalPatternAnalysis = match provider.generate_structured(&prompt, "legal_pattern_analysis").await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "pattern detector call failed, leaving legal_patterns null");
            return None;
        }
    };

    let known_shas: HashSet<&str> = analyses.iter().map(|a| a.file_metadata.sha256.as_str()).collect();

    let before = result.contradictions.len();
    result.contradictions.retain(|c| {
        let ok = known_shas.contains(c.statement_1_source.as_str()) && known_shas.contains(c.statement_2_source.as_str());
        if !ok {
            tracing::warn!(
                source_1 = %c.statement_1_source,
                source_2 = %c.statement_2_source,
                "dropping contradiction referencing a sha256 not present in this case"
            );
        }
        ok
    });
    if result.contradictions.len() != before {
        tracing::debug!(dropped = before - result.contradictions.len(), "dropped invalid contradiction references");
    }

    result.corroboration.retain_mut(|link| {
        let before_len = link.supporting_evidence.len();
        link.supporting_evidence.retain(|sha| known_shas.contains(sha.as_str()));
        if link.supporting_evidence.len() != before_len {
            tracing::warn!("dropped unknown sha256 reference(s) from corroboration link");
        }
        link.supporting_evidence.len() >= 2
    });

    if result.validate().is_err() {
        tracing::warn!("pattern detector response failed validation after pruning unknown references");
        return None;
    }

    Some(result)
}
