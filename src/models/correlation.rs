//! Cross-evidence correlation artifacts (§3, §4.5, §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::analysis::{CommunicationPattern, LegalSignificance};
use crate::models::evidence::EvidenceType;
use crate::models::validate::{round4, validate_confidence, validate_sha256};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CorrelatedEntityType {
    Person,
    Organization,
    EmailAddress,
    Other,
}

impl CorrelatedEntityType {
    /// Fixed tie-break order for the plurality vote in §4.5: person >
    /// organization > email_address > other.
    fn tie_break_rank(self) -> u8 {
        match self {
            CorrelatedEntityType::Person => 0,
            CorrelatedEntityType::Organization => 1,
            CorrelatedEntityType::EmailAddress => 2,
            CorrelatedEntityType::Other => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceOccurrence {
    pub evidence_sha256: String,
    pub original_name: String,
    pub confidence: f64,
    pub context: String,
    #[serde(rename = "type")]
    pub entity_type: CorrelatedEntityType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedEntity {
    pub entity_name: String,
    pub entity_type: CorrelatedEntityType,
    pub occurrence_count: usize,
    pub confidence_average: f64,
    pub evidence_occurrences: Vec<EvidenceOccurrence>,
}

impl CorrelatedEntity {
    /// Builds a `CorrelatedEntity` from a bucket of raw occurrences,
    /// applying the §4.5 dedup/aggregation rules: keep the
    /// highest-confidence occurrence per evidence item, require at least
    /// two unique evidence items, average confidence over the kept set,
    /// vote for the plurality type (ties broken by the fixed order), and
    /// display the longest original name seen.
    pub fn from_occurrences(occurrences: Vec<EvidenceOccurrence>) -> Option<Self> {
        use std::collections::HashMap;

        let mut best_per_evidence: HashMap<String, EvidenceOccurrence> = HashMap::new();
        for occ in occurrences {
            best_per_evidence
                .entry(occ.evidence_sha256.clone())
                .and_modify(|existing| {
                    if occ.confidence > existing.confidence {
                        *existing = occ.clone();
                    }
                })
                .or_insert(occ);
        }

        if best_per_evidence.len() < 2 {
            return None;
        }

        let mut kept: Vec<EvidenceOccurrence> = best_per_evidence.into_values().collect();
        kept.sort_by(|a, b| a.evidence_sha256.cmp(&b.evidence_sha256));

        let confidence_average =
            round4(kept.iter().map(|o| o.confidence).sum::<f64>() / kept.len() as f64);

        let mut type_counts: HashMap<CorrelatedEntityType, usize> = HashMap::new();
        for occ in &kept {
            *type_counts.entry(occ.entity_type).or_insert(0) += 1;
        }
        let max_count = type_counts.values().copied().max().unwrap_or(0);
        let entity_type = type_counts
            .into_iter()
            .filter(|(_, count)| *count == max_count)
            .map(|(ty, _)| ty)
            .min_by_key(|ty| ty.tie_break_rank())
            .unwrap_or(CorrelatedEntityType::Other);

        let entity_name = kept
            .iter()
            .max_by_key(|o| o.original_name.len())
            .map(|o| o.original_name.clone())
            .unwrap_or_default();

        Some(Self {
            entity_name,
            entity_type,
            occurrence_count: kept.len(),
            confidence_average,
            evidence_occurrences: kept,
        })
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.occurrence_count < 2 {
            return Err(Error::ValidationError(
                "correlated entity must have occurrence_count >= 2".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for occ in &self.evidence_occurrences {
            validate_sha256(&occ.evidence_sha256)?;
            validate_confidence(occ.confidence)?;
            if !seen.insert(&occ.evidence_sha256) {
                return Err(Error::ValidationError(
                    "evidence_occurrences must be unique per sha256".to_string(),
                ));
            }
        }
        if seen.len() != self.occurrence_count {
            return Err(Error::ValidationError(
                "occurrence_count must equal the number of unique evidence_occurrences".to_string(),
            ));
        }
        validate_confidence(self.confidence_average)
    }
}

/// Per-event AI classification, copied from the source analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiClassification {
    pub pattern: Option<CommunicationPattern>,
    pub risk_flags: Vec<String>,
    pub legal_significance: Option<LegalSignificance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub evidence_sha256: String,
    pub evidence_type: EvidenceType,
    pub event_type: String,
    pub description: String,
    pub confidence: f64,
    pub ai_classification: Option<AiClassification>,
}

impl TimelineEvent {
    /// Event types that exist purely because of ingestion/analysis
    /// bookkeeping rather than anything forensically meaningful; excluded
    /// from temporal-sequence anchors/members and from gap computation
    /// (§4.5, resolving the §9 Open Question in favor of consistent
    /// exclusion everywhere, including the pattern-detector context).
    pub const INGESTION_ARTIFACT_TYPES: &'static [&'static str] =
        &["file_created", "file_modified", "analysis_performed"];

    pub fn is_ingestion_artifact(&self) -> bool {
        Self::INGESTION_ARTIFACT_TYPES.contains(&self.event_type.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SequenceSignificance {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalSequence {
    pub anchor_index: usize,
    pub related_indices: Vec<usize>,
    pub significance: SequenceSignificance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GapSignificance {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineGap {
    pub before_index: usize,
    pub after_index: usize,
    pub gap_duration_days: f64,
    pub significance: GapSignificance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionType {
    Factual,
    Temporal,
    Attribution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contradiction {
    pub statement_1: String,
    pub statement_1_source: String,
    pub statement_2: String,
    pub statement_2_source: String,
    pub contradiction_type: ContradictionType,
    pub severity: f64,
    pub explanation: String,
}

impl Contradiction {
    pub fn validate(&self) -> Result<(), Error> {
        validate_sha256(&self.statement_1_source)?;
        validate_sha256(&self.statement_2_source)?;
        validate_confidence(self.severity)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CorroborationStrength {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorroborationLink {
    pub claim: String,
    pub supporting_evidence: Vec<String>,
    pub corroboration_strength: CorroborationStrength,
    pub explanation: String,
}

impl CorroborationLink {
    pub fn validate(&self) -> Result<(), Error> {
        if self.supporting_evidence.len() < 2 {
            return Err(Error::ValidationError(
                "corroboration link requires at least 2 supporting evidence items".to_string(),
            ));
        }
        for sha in &self.supporting_evidence {
            validate_sha256(sha)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalPatternAnalysis {
    pub contradictions: Vec<Contradiction>,
    pub corroboration: Vec<CorroborationLink>,
    pub evidence_gaps: Vec<String>,
    pub pattern_summary: String,
    pub confidence: f64,
}

impl LegalPatternAnalysis {
    pub fn validate(&self) -> Result<(), Error> {
        validate_confidence(self.confidence)?;
        for c in &self.contradictions {
            c.validate()?;
        }
        for c in &self.corroboration {
            c.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationAnalysis {
    pub schema_version: String,
    pub case_id: String,
    pub evidence_count: usize,
    pub entity_correlations: Vec<CorrelatedEntity>,
    /// Sorted ascending by timestamp, stable on ties by (sha256, event_type).
    pub timeline_events: Vec<TimelineEvent>,
    pub temporal_sequences: Vec<TemporalSequence>,
    pub timeline_gaps: Vec<TimelineGap>,
    pub legal_patterns: Option<LegalPatternAnalysis>,
    pub analysis_timestamp: DateTime<Utc>,
}

impl CorrelationAnalysis {
    pub fn validate(&self) -> Result<(), Error> {
        if self.schema_version.split('.').next()
            != crate::models::evidence::SCHEMA_VERSION.split('.').next()
        {
            return Err(Error::ValidationError("unsupported schema major version".to_string()));
        }
        for e in &self.entity_correlations {
            e.validate()?;
        }
        let mut last: Option<&DateTime<Utc>> = None;
        for event in &self.timeline_events {
            if let Some(prev) = last {
                if event.timestamp < *prev {
                    return Err(Error::ValidationError(
                        "timeline_events must be non-decreasing in timestamp".to_string(),
                    ));
                }
            }
            last = Some(&event.timestamp);
            validate_confidence(event.confidence)?;
        }
        if let Some(patterns) = &self.legal_patterns {
            patterns.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(sha: &str, name: &str, confidence: f64, ty: CorrelatedEntityType) -> EvidenceOccurrence {
        EvidenceOccurrence {
            evidence_sha256: sha.to_string(),
            original_name: name.to_string(),
            confidence,
            context: "ctx".to_string(),
            entity_type: ty,
        }
    }

    #[test]
    fn correlated_entity_requires_two_unique_evidence_items() {
        let single = vec![occ(&"a".repeat(64), "John Smith", 0.9, CorrelatedEntityType::Person)];
        assert!(CorrelatedEntity::from_occurrences(single).is_none());
    }

    #[test]
    fn correlated_entity_averages_confidence_and_picks_longest_name() {
        let occurrences = vec![
            occ(&"a".repeat(64), "John Q. Smith", 0.9, CorrelatedEntityType::Person),
            occ(&"b".repeat(64), "Smith, John", 0.8, CorrelatedEntityType::Person),
        ];
        let entity = CorrelatedEntity::from_occurrences(occurrences).unwrap();
        assert_eq!(entity.occurrence_count, 2);
        assert_eq!(entity.confidence_average, 0.85);
        assert_eq!(entity.entity_name, "John Q. Smith");
    }

    #[test]
    fn correlated_entity_keeps_highest_confidence_per_evidence() {
        let sha = "c".repeat(64);
        let occurrences = vec![
            occ(&sha, "Jane Doe", 0.4, CorrelatedEntityType::Person),
            occ(&sha, "Jane Doe", 0.9, CorrelatedEntityType::Person),
            occ(&"d".repeat(64), "Jane Doe", 0.5, CorrelatedEntityType::Person),
        ];
        let entity = CorrelatedEntity::from_occurrences(occurrences).unwrap();
        assert_eq!(entity.occurrence_count, 2);
        assert_eq!(entity.confidence_average, 0.7);
    }

    #[test]
    fn entity_type_vote_ties_break_to_fixed_order() {
        let occurrences = vec![
            occ(&"a".repeat(64), "Acme Corp", 0.9, CorrelatedEntityType::Organization),
            occ(&"b".repeat(64), "Acme Corp", 0.9, CorrelatedEntityType::Person),
        ];
        let entity = CorrelatedEntity::from_occurrences(occurrences).unwrap();
        assert_eq!(entity.entity_type, CorrelatedEntityType::Person);
    }
}
