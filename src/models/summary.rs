//! Case-level summary artifacts (§3, §4.7).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::analysis::{CommunicationPattern, LegalSignificance};
use crate::models::correlation::CorrelationAnalysis;
use crate::models::evidence::EvidenceType;
use crate::models::validate::validate_confidence;

/// A short, type-specific rollup of one evidence item's analysis, used as
/// aggregation input for the executive summary and the map-reduce chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub evidence_sha256: String,
    pub evidence_type: EvidenceType,
    pub key_points: Vec<String>,
    pub legal_significance: LegalSignificance,
    pub risk_flags: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskAssessment {
    Low,
    Medium,
    High,
    Critical,
}

/// Output of a single map-reduce chunk call (§4.7 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub chunk_index: usize,
    pub summary: String,
    pub notable_findings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutiveSummaryResponse {
    pub executive_summary: String,
    /// 3 to 5 entries.
    pub key_findings: Vec<String>,
    pub legal_implications: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub risk_assessment: RiskAssessment,
    pub confidence_overall: f64,
}

impl ExecutiveSummaryResponse {
    pub fn validate(&self) -> Result<(), Error> {
        validate_confidence(self.confidence_overall)?;
        if !(3..=5).contains(&self.key_findings.len()) {
            return Err(Error::ValidationError(format!(
                "key_findings must have 3-5 entries, got {}",
                self.key_findings.len()
            )));
        }
        Ok(())
    }
}

/// Power-dynamics rollup for a single email participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantPower {
    pub email_address: String,
    pub message_count: u32,
    pub average_deference_score: f64,
    pub dominant_topics: Vec<String>,
}

/// A quoted statement attributed to a person, surfaced from document
/// entities carrying a `quoted_text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotedStatement {
    pub speaker: String,
    pub quote: String,
    pub evidence_sha256: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipEdgeType {
    SentEmailTo,
    ReportedTo,
    EscalatedTo,
    Cced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub from: String,
    pub to: String,
    pub edge_type: RelationshipEdgeType,
    pub evidence_sha256: String,
}

/// Aggregate OCR text grouped by detected-object class, with the highest
/// evidential value seen for that class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageOcrAggregate {
    pub object_class: String,
    pub detected_text_samples: Vec<String>,
    pub highest_evidential_value: LegalSignificance,
}

/// Everything under `overall_assessment` in §4.7 step 3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallAssessment {
    pub overall_confidence: f64,
    pub legal_significance_distribution: BTreeMap<LegalSignificance, usize>,
    pub overall_legal_significance: LegalSignificance,
    pub risk_flag_breakdown: BTreeMap<String, usize>,
    pub entity_correlations_found: usize,
    pub timeline_events_count: usize,
    pub temporal_sequences_count: usize,
    pub timeline_gaps_count: usize,
    pub evidence_type_distribution: BTreeMap<EvidenceType, usize>,
    pub power_dynamics: Vec<ParticipantPower>,
    pub quoted_statements: Vec<QuotedStatement>,
    pub communication_patterns: BTreeMap<CommunicationPattern, usize>,
    pub image_ocr: Vec<ImageOcrAggregate>,
    pub relationship_network: Vec<RelationshipEdge>,
}

impl OverallAssessment {
    pub fn validate(&self) -> Result<(), Error> {
        validate_confidence(self.overall_confidence)
    }
}

// `CommunicationPattern` is used as a `BTreeMap` key above, which requires a
// total order its primary (analysis) declaration doesn't otherwise need.
// `LegalSignificance` and `EvidenceType` already derive `Ord` where declared.
impl PartialOrd for CommunicationPattern {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for CommunicationPattern {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSummary {
    pub schema_version: String,
    pub case_id: String,
    pub generation_timestamp: DateTime<Utc>,
    pub evidence_count: usize,
    pub evidence_types: BTreeSet<EvidenceType>,
    pub evidence_summaries: Vec<EvidenceSummary>,
    pub correlation_result: CorrelationAnalysis,
    pub overall_assessment: OverallAssessment,
    pub executive_summary: Option<ExecutiveSummaryResponse>,
}

impl CaseSummary {
    pub fn validate(&self) -> Result<(), Error> {
        if self.schema_version.split('.').next()
            != crate::models::evidence::SCHEMA_VERSION.split('.').next()
        {
            return Err(Error::ValidationError("unsupported schema major version".to_string()));
        }
        self.correlation_result.validate()?;
        self.overall_assessment.validate()?;
        if let Some(exec) = &self.executive_summary {
            exec.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executive_summary_requires_three_to_five_findings() {
        let mut resp = ExecutiveSummaryResponse {
            executive_summary: "s".into(),
            key_findings: vec!["a".into(), "b".into()],
            legal_implications: vec![],
            recommended_actions: vec![],
            risk_assessment: RiskAssessment::Medium,
            confidence_overall: 0.5,
        };
        assert!(resp.validate().is_err());
        resp.key_findings.push("c".into());
        assert!(resp.validate().is_ok());
    }

    #[test]
    fn communication_pattern_has_stable_ordering_for_btreemap_keys() {
        let mut map = BTreeMap::new();
        map.insert(CommunicationPattern::Hostile, 1);
        map.insert(CommunicationPattern::Professional, 2);
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec![&CommunicationPattern::Professional, &CommunicationPattern::Hostile]);
    }
}
