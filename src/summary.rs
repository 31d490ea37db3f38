//! Case summary aggregator (C7, §4.7).
//!
//! Runs correlation (C5 + C6), extracts a type-specific [`EvidenceSummary`]
//! per evidence item, computes every `overall_assessment` aggregate, and
//! optionally produces an executive summary via map-reduce chunking for
//! cases too large for a single AI call.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use regex::RegexSet;

use crate::ai::{prompts, AiProvider};
use crate::config::Config;
use crate::correlation;
use crate::error::Error;
use crate::models::analysis::{CommunicationPattern, LegalSignificance};
use crate::models::correlation::CorrelatedEntityType;
use crate::models::evidence::{EvidenceType, TypedAnalysis, UnifiedAnalysis, SCHEMA_VERSION};
use crate::models::summary::{
    CaseSummary, ChunkSummary, EvidenceSummary, ExecutiveSummaryResponse, ImageOcrAggregate,
    OverallAssessment, ParticipantPower, QuotedStatement, RelationshipEdge, RelationshipEdgeType,
};
use crate::pattern;
use crate::store::EvidenceStore;

/// §4.7 step 4 single-call threshold: cases with `evidence_count <= 50` get
/// one executive-summary call; larger cases go through map-reduce chunking.
/// Independent of `config.map_reduce_chunk_size`, which only governs how the
/// map-reduce path partitions its chunks.
const SINGLE_CALL_EVIDENCE_THRESHOLD: usize = 50;

/// Builds the type-specific rollup for one evidence item (§4.7 step 2).
fn evidence_summary_for(analysis: &UnifiedAnalysis) -> EvidenceSummary {
    let sha = analysis.file_metadata.sha256.clone();
    match &analysis.analysis {
        TypedAnalysis::Document(d) => EvidenceSummary {
            evidence_sha256: sha,
            evidence_type: EvidenceType::Document,
            key_points: vec![d.summary.clone()],
            legal_significance: d.legal_significance,
            risk_flags: d.risk_flags.clone(),
            confidence: d.confidence_overall,
        },
        TypedAnalysis::Email(e) => EvidenceSummary {
            evidence_sha256: sha,
            evidence_type: EvidenceType::Email,
            key_points: vec![e.thread_summary.clone()],
            legal_significance: e.legal_significance,
            risk_flags: e.risk_flags.clone(),
            confidence: e.confidence_overall,
        },
        TypedAnalysis::Image(i) => EvidenceSummary {
            evidence_sha256: sha,
            evidence_type: EvidenceType::Image,
            key_points: vec![i.scene_description.clone()],
            legal_significance: i.potential_evidence_value,
            risk_flags: i.risk_flags.clone(),
            confidence: i.confidence_overall,
        },
    }
}

/// Power-dynamics rollup, averaged per distinct email address across every
/// email analysis in the case (§4.7 `power_dynamics`).
fn power_dynamics(analyses: &[UnifiedAnalysis]) -> Vec<ParticipantPower> {
    let mut by_address: BTreeMap<String, (u32, f64, usize, BTreeSet<String>)> = BTreeMap::new();
    for analysis in analyses {
        let TypedAnalysis::Email(email) = &analysis.analysis else { continue };
        for p in &email.participants {
            let entry = by_address.entry(p.email_address.clone()).or_insert((0, 0.0, 0, BTreeSet::new()));
            entry.0 += p.message_count;
            entry.1 += p.deference_score;
            entry.2 += 1;
            entry.3.extend(p.dominant_topics.iter().cloned());
        }
    }
    by_address
        .into_iter()
        .map(|(email_address, (message_count, deference_sum, occurrences, topics))| ParticipantPower {
            email_address,
            message_count,
            average_deference_score: deference_sum / occurrences.max(1) as f64,
            dominant_topics: topics.into_iter().collect(),
        })
        .collect()
}

/// Quoted statements surfaced from document entities carrying `quoted_text`
/// (§4.7 `quoted_statements`).
fn quoted_statements(analyses: &[UnifiedAnalysis]) -> Vec<QuotedStatement> {
    let mut quotes = Vec::new();
    for analysis in analyses {
        let TypedAnalysis::Document(doc) = &analysis.analysis else { continue };
        for entity in &doc.entities {
            let Some(quote) = &entity.quoted_text else { continue };
            quotes.push(QuotedStatement {
                speaker: entity.name.clone(),
                quote: quote.clone(),
                evidence_sha256: analysis.file_metadata.sha256.clone(),
            });
        }
    }
    quotes
}

fn communication_patterns(analyses: &[UnifiedAnalysis]) -> BTreeMap<CommunicationPattern, usize> {
    let mut counts = BTreeMap::new();
    for analysis in analyses {
        if let TypedAnalysis::Email(email) = &analysis.analysis {
            *counts.entry(email.communication_pattern).or_insert(0) += 1;
        }
    }
    counts
}

/// Groups image OCR text by its own scene's dominant detected-object class
/// (§4.7 `image_ocr`); images whose OCR text is empty contribute nothing.
fn image_ocr(analyses: &[UnifiedAnalysis]) -> Vec<ImageOcrAggregate> {
    let mut by_class: BTreeMap<String, (Vec<String>, LegalSignificance)> = BTreeMap::new();
    for analysis in analyses {
        let TypedAnalysis::Image(image) = &analysis.analysis else { continue };
        if image.detected_text.trim().is_empty() {
            continue;
        }
        let object_class = image.detected_objects.first().cloned().unwrap_or_else(|| "unclassified".to_string());
        let entry = by_class
            .entry(object_class)
            .or_insert_with(|| (Vec::new(), LegalSignificance::Low));
        entry.0.push(image.detected_text.clone());
        if image.potential_evidence_value > entry.1 {
            entry.1 = image.potential_evidence_value;
        }
    }
    by_class
        .into_iter()
        .map(|(object_class, (samples, value))| ImageOcrAggregate {
            object_class,
            detected_text_samples: samples,
            highest_evidential_value: value,
        })
        .collect()
}

/// Matches each document entity's free-text `relationship` field against the
/// four known relationship patterns (§4.7 ambient note) with one compiled
/// `RegexSet`, reused across every entity instead of recompiling per call.
fn relationship_network(analyses: &[UnifiedAnalysis]) -> Vec<RelationshipEdge> {
    let patterns = [
        r"(?i)sent email to (.+)",
        r"(?i)reported to (.+)",
        r"(?i)escalated to (.+)",
        r"(?i)cc'd (.+)",
    ];
    let edge_types = [
        RelationshipEdgeType::SentEmailTo,
        RelationshipEdgeType::ReportedTo,
        RelationshipEdgeType::EscalatedTo,
        RelationshipEdgeType::Cced,
    ];
    let set = RegexSet::new(patterns).expect("valid relationship regex set");
    let compiled: Vec<regex::Regex> = patterns.iter().map(|p| regex::Regex::new(p).expect("valid regex")).collect();

    let mut edges = Vec::new();
    for analysis in analyses {
        let TypedAnalysis::Document(doc) = &analysis.analysis else { continue };
        for entity in &doc.entities {
            let Some(relationship) = &entity.relationship else { continue };
            for matched_index in set.matches(relationship).iter() {
                if let Some(captures) = compiled[matched_index].captures(relationship) {
                    edges.push(RelationshipEdge {
                        from: entity.name.clone(),
                        to: captures.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
                        edge_type: edge_types[matched_index],
                        evidence_sha256: analysis.file_metadata.sha256.clone(),
                    });
                }
            }
        }
    }
    edges
}

fn overall_assessment(
    analyses: &[UnifiedAnalysis],
    correlation_result: &crate::models::correlation::CorrelationAnalysis,
) -> OverallAssessment {
    let confidences: Vec<f64> = analyses
        .iter()
        .map(|a| match &a.analysis {
            TypedAnalysis::Document(d) => d.confidence_overall,
            TypedAnalysis::Email(e) => e.confidence_overall,
            TypedAnalysis::Image(i) => i.confidence_overall,
        })
        .collect();
    let overall_confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };

    let mut legal_significance_distribution: BTreeMap<LegalSignificance, usize> = BTreeMap::new();
    let mut evidence_type_distribution: BTreeMap<EvidenceType, usize> = BTreeMap::new();
    let mut risk_flag_breakdown: BTreeMap<String, usize> = BTreeMap::new();
    for analysis in analyses {
        *evidence_type_distribution.entry(analysis.evidence_type).or_insert(0) += 1;
        let (significance, risk_flags) = match &analysis.analysis {
            TypedAnalysis::Document(d) => (d.legal_significance, &d.risk_flags),
            TypedAnalysis::Email(e) => (e.legal_significance, &e.risk_flags),
            TypedAnalysis::Image(i) => (i.potential_evidence_value, &i.risk_flags),
        };
        *legal_significance_distribution.entry(significance).or_insert(0) += 1;
        for flag in risk_flags {
            *risk_flag_breakdown.entry(flag.clone()).or_insert(0) += 1;
        }
    }
    let overall_legal_significance = legal_significance_distribution
        .keys()
        .max()
        .copied()
        .unwrap_or(LegalSignificance::Low);

    OverallAssessment {
        overall_confidence,
        legal_significance_distribution,
        overall_legal_significance,
        risk_flag_breakdown,
        entity_correlations_found: correlation_result.entity_correlations.len(),
        timeline_events_count: correlation_result.timeline_events.len(),
        temporal_sequences_count: correlation_result.temporal_sequences.len(),
        timeline_gaps_count: correlation_result.timeline_gaps.len(),
        evidence_type_distribution,
        power_dynamics: power_dynamics(analyses),
        quoted_statements: quoted_statements(analyses),
        communication_patterns: communication_patterns(analyses),
        image_ocr: image_ocr(analyses),
        relationship_network: relationship_network(analyses),
    }
}

fn chunk_context(chunk: &[EvidenceSummary]) -> String {
    chunk
        .iter()
        .map(|s| format!("- {} ({:?}, {:?}): {}", s.evidence_sha256, s.evidence_type, s.legal_significance, s.key_points.join("; ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generates the executive summary: a single call when the case has at most
/// `SINGLE_CALL_EVIDENCE_THRESHOLD` evidence summaries, else map-reduce
/// chunking at `config.map_reduce_chunk_size` summaries per chunk (§4.7 step
/// 4). Returns `None` if the AI port is unconfigured or any call fails,
/// leaving the rest of the summary intact.
async fn generate_executive_summary<P: AiProvider>(
    provider: &P,
    summaries: &[EvidenceSummary],
    correlation_result: &crate::models::correlation::CorrelationAnalysis,
    case_type: prompts::CaseType,
    chunk_size: usize,
) -> Option<ExecutiveSummaryResponse> {
    let reduction_context = if summaries.len() <= SINGLE_CALL_EVIDENCE_THRESHOLD {
        chunk_context(summaries)
    } else {
        let mut chunk_summaries = Vec::new();
        for (chunk_index, chunk) in summaries.chunks(chunk_size).enumerate() {
            let prompt = format!("{}\n\n{}", prompts::chunk_summary_system_prompt(), chunk_context(chunk));
            match provider.generate_structured::<ChunkSummary>(&prompt, "chunk_summary").await {
                Ok(mut cs) => {
                    cs.chunk_index = chunk_index;
                    chunk_summaries.push(cs);
                }
                Err(e) => {
                    tracing::warn!(error = %e, chunk_index, "chunk summary call failed, skipping chunk");
                }
            }
        }
        chunk_summaries
            .into_iter()
            .map(|cs| format!("Chunk {}: {}\nFindings: {}", cs.chunk_index, cs.summary, cs.notable_findings.join("; ")))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let entities_text = correlation_result
        .entity_correlations
        .iter()
        .map(|e| e.entity_name.clone())
        .collect::<Vec<_>>()
        .join(", ");
    let prompt = format!(
        "{}\n\nKey correlated entities: {entities_text}\n\nEvidence findings:\n{reduction_context}",
        prompts::executive_summary_system_prompt(case_type)
    );

    match provider.generate_structured::<ExecutiveSummaryResponse>(&prompt, "executive_summary").await {
        Ok(resp) if resp.validate().is_ok() => Some(resp),
        Ok(_) => {
            tracing::warn!("executive summary response failed validation, omitting");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "executive summary call failed, omitting");
            None
        }
    }
}

/// Builds the full `CaseSummary` for `case_id`: runs correlation (including
/// the pattern detector), computes the evidence-level and case-level
/// rollups, and attempts an executive summary if `provider` is given.
pub async fn build_case_summary<P: AiProvider>(
    store: &EvidenceStore,
    case_id: &str,
    config: &Config,
    provider: Option<&P>,
    case_type: prompts::CaseType,
) -> Result<CaseSummary, Error> {
    let analyses = store.case_analyses(case_id).await?;
    let mut correlation_result = correlation::correlate_analyses(store, case_id, &analyses, config).await?;

    if let Some(provider) = provider {
        correlation_result.legal_patterns = pattern::detect_patterns(
            provider,
            &correlation_result.entity_correlations,
            &correlation_result.timeline_events,
            &analyses,
        )
        .await;
    }

    let evidence_summaries: Vec<EvidenceSummary> = analyses.iter().map(evidence_summary_for).collect();
    let assessment = overall_assessment(&analyses, &correlation_result);

    let executive_summary = match provider {
        Some(provider) => {
            generate_executive_summary(provider, &evidence_summaries, &correlation_result, case_type, config.map_reduce_chunk_size).await
        }
        None => None,
    };

    let evidence_types: BTreeSet<EvidenceType> = analyses.iter().map(|a| a.evidence_type).collect();

    let summary = CaseSummary {
        schema_version: SCHEMA_VERSION.to_string(),
        case_id: case_id.to_string(),
        generation_timestamp: Utc::now(),
        evidence_count: analyses.len(),
        evidence_types,
        evidence_summaries,
        correlation_result,
        overall_assessment: assessment,
        executive_summary,
    };
    summary.validate()?;
    Ok(summary)
}

/// Resolves the correlated-entity type most relevant to a relationship edge
/// endpoint name, used only by tests to sanity-check the regex set above.
#[cfg(test)]
fn entity_type_hint(name: &str) -> CorrelatedEntityType {
    if name.contains('@') {
        CorrelatedEntityType::EmailAddress
    } else {
        CorrelatedEntityType::Person
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::{DocumentAnalysis, DocumentType, Entity, EntityType, Sentiment};
    use crate::models::evidence::FileMetadata;

    fn doc_with_relationship(sha: &str, relationship: &str) -> UnifiedAnalysis {
        let metadata = FileMetadata {
            filename: "a.txt".into(),
            byte_size: 1,
            mime: "text/plain".into(),
            created: chrono::Utc::now(),
            modified: chrono::Utc::now(),
            extension: "txt".into(),
            sha256: sha.to_string(),
        };
        UnifiedAnalysis::new(
            EvidenceType::Document,
            metadata,
            TypedAnalysis::Document(DocumentAnalysis {
                summary: "s".into(),
                entities: vec![Entity {
                    name: "Jane Doe".into(),
                    entity_type: EntityType::Person,
                    confidence: 0.8,
                    context: "ctx".into(),
                    relationship: Some(relationship.to_string()),
                    quoted_text: None,
                    associated_event: None,
                }],
                document_type: DocumentType::Letter,
                sentiment: Sentiment::Neutral,
                legal_significance: LegalSignificance::Medium,
                risk_flags: vec![],
                confidence_overall: 0.8,
            }),
            BTreeSet::new(),
            BTreeSet::new(),
            vec![],
        )
    }

    #[test]
    fn relationship_network_parses_escalated_to() {
        let analyses = vec![doc_with_relationship(&"a".repeat(64), "escalated to HR Director")];
        let edges = relationship_network(&analyses);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge_type, RelationshipEdgeType::EscalatedTo);
        assert_eq!(edges[0].to, "HR Director");
        assert_eq!(entity_type_hint(&edges[0].from), CorrelatedEntityType::Person);
    }

    #[test]
    fn relationship_network_parses_cced() {
        let analyses = vec![doc_with_relationship(&"a".repeat(64), "cc'd Legal Team")];
        let edges = relationship_network(&analyses);
        assert_eq!(edges[0].edge_type, RelationshipEdgeType::Cced);
    }

    #[tokio::test]
    async fn build_case_summary_without_provider_has_no_executive_summary() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvidenceStore::new(dir.path());
        let config = Config::default();
        let summary = build_case_summary::<crate::ai::mock::MockAiProvider>(
            &store,
            "C1",
            &config,
            None,
            prompts::CaseType::Generic,
        )
        .await
        .unwrap();
        assert!(summary.executive_summary.is_none());
        assert_eq!(summary.evidence_count, 0);
    }
}
