//! Correlation extraction: turns per-evidence analyses into raw entity
//! occurrences, then buckets and aggregates them into [`CorrelatedEntity`]
//! values (§4.5).

use std::collections::HashMap;

use regex::Regex;

use crate::correlation::canonicalize::VariantIndex;
use crate::models::analysis::EntityType;
use crate::models::correlation::{CorrelatedEntity, CorrelatedEntityType, EvidenceOccurrence};
use crate::models::evidence::{TypedAnalysis, UnifiedAnalysis};

/// Confidence assigned to weak OCR n-gram signals (§4.5: "only as a weak
/// signal, lowest confidence band").
const IMAGE_OCR_SIGNAL_CONFIDENCE: f64 = 0.3;

fn correlated_type_for(entity_type: EntityType) -> Option<CorrelatedEntityType> {
    match entity_type {
        EntityType::Person => Some(CorrelatedEntityType::Person),
        EntityType::Organization => Some(CorrelatedEntityType::Organization),
        _ => None,
    }
}

fn is_email_like(name: &str) -> bool {
    name.contains('@') && name.contains('.')
}

/// Extracts raw occurrences from one evidence item's analysis. Documents
/// contribute person/organization/email-address entities; emails
/// contribute one occurrence per participant (display name and address
/// separately); images contribute capitalized OCR n-grams as a weak signal.
pub fn occurrences_for(analysis: &UnifiedAnalysis) -> Vec<(String, EvidenceOccurrence)> {
    let sha = analysis.file_metadata.sha256.clone();
    match &analysis.analysis {
        TypedAnalysis::Document(doc) => doc
            .entities
            .iter()
            .filter_map(|e| {
                let entity_type = if is_email_like(&e.name) {
                    CorrelatedEntityType::EmailAddress
                } else {
                    correlated_type_for(e.entity_type)?
                };
                Some((
                    e.name.clone(),
                    EvidenceOccurrence {
                        evidence_sha256: sha.clone(),
                        original_name: e.name.clone(),
                        confidence: e.confidence,
                        context: e.context.clone(),
                        entity_type,
                    },
                ))
            })
            .collect(),
        TypedAnalysis::Email(email) => email
            .participants
            .iter()
            .flat_map(|p| {
                let mut occs = Vec::new();
                if let Some(display_name) = &p.display_name {
                    occs.push((
                        display_name.clone(),
                        EvidenceOccurrence {
                            evidence_sha256: sha.clone(),
                            original_name: display_name.clone(),
                            confidence: 0.85,
                            context: format!("{:?} on email thread", p.role),
                            entity_type: CorrelatedEntityType::Person,
                        },
                    ));
                }
                occs.push((
                    p.email_address.clone(),
                    EvidenceOccurrence {
                        evidence_sha256: sha.clone(),
                        original_name: p.email_address.clone(),
                        confidence: 0.95,
                        context: format!("{:?} on email thread", p.role),
                        entity_type: CorrelatedEntityType::EmailAddress,
                    },
                ));
                occs
            })
            .collect(),
        TypedAnalysis::Image(image) => capitalized_ngrams(&image.detected_text)
            .into_iter()
            .map(|name| {
                (
                    name.clone(),
                    EvidenceOccurrence {
                        evidence_sha256: sha.clone(),
                        original_name: name,
                        confidence: IMAGE_OCR_SIGNAL_CONFIDENCE,
                        context: "capitalized token in OCR text".to_string(),
                        entity_type: CorrelatedEntityType::Other,
                    },
                )
            })
            .collect(),
    }
}

/// Extracts runs of 2-3 consecutive capitalized tokens from OCR text, a
/// weak proxy for proper names/orgs visible in a photographed document.
fn capitalized_ngrams(text: &str) -> Vec<String> {
    let word_re = Regex::new(r"^[A-Z][a-zA-Z'.-]*$").expect("valid regex");
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if word_re.is_match(tokens[i]) {
            let mut j = i + 1;
            while j < tokens.len() && word_re.is_match(tokens[j]) && j - i < 3 {
                j += 1;
            }
            if j - i >= 2 {
                out.push(tokens[i..j].join(" "));
            }
            i = j.max(i + 1);
        } else {
            i += 1;
        }
    }
    out
}

/// Buckets every occurrence across all analyses in a case by canonical
/// variant and emits one [`CorrelatedEntity`] per bucket meeting the §4.5
/// floor (≥2 unique evidence items), sorted by
/// `(occurrence_count desc, confidence_average desc)`.
pub fn correlate_entities(analyses: &[UnifiedAnalysis]) -> Vec<CorrelatedEntity> {
    let mut index = VariantIndex::new();
    let mut buckets: HashMap<usize, Vec<EvidenceOccurrence>> = HashMap::new();

    for analysis in analyses {
        for (raw_name, occurrence) in occurrences_for(analysis) {
            let bucket = index.bucket_for(&raw_name);
            buckets.entry(bucket).or_default().push(occurrence);
        }
    }

    let mut entities: Vec<CorrelatedEntity> = buckets
        .into_values()
        .filter_map(CorrelatedEntity::from_occurrences)
        .collect();

    entities.sort_by(|a, b| {
        b.occurrence_count
            .cmp(&a.occurrence_count)
            .then(b.confidence_average.total_cmp(&a.confidence_average))
    });

    entities
}

/// Collects one representative occurrence per canonicalization bucket that
/// *failed* the §4.5 occurrence floor (i.e. every occurrence in the bucket
/// comes from a single evidence item), restricted to `Person` entities.
/// These are the ambiguous singleton mentions AI-assisted entity resolution
/// (`correlation::resolve`) is meant to reconcile — entities that already
/// cleared the floor via string canonicalization alone have no need for it.
pub fn singleton_person_occurrences(analyses: &[UnifiedAnalysis]) -> Vec<EvidenceOccurrence> {
    let mut index = VariantIndex::new();
    let mut buckets: HashMap<usize, Vec<EvidenceOccurrence>> = HashMap::new();

    for analysis in analyses {
        for (raw_name, occurrence) in occurrences_for(analysis) {
            if occurrence.entity_type != CorrelatedEntityType::Person {
                continue;
            }
            let bucket = index.bucket_for(&raw_name);
            buckets.entry(bucket).or_default().push(occurrence);
        }
    }

    let mut singletons = Vec::new();
    for occurrences in buckets.into_values() {
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
        if best_per_evidence.len() == 1 {
            singletons.extend(best_per_evidence.into_values());
        }
    }
    singletons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::{DocumentAnalysis, DocumentType, Entity, Sentiment};
    use crate::models::evidence::{EvidenceType, FileMetadata, LegalSignificance};
    use std::collections::BTreeSet;

    fn doc_analysis(sha: &str, entity_name: &str, confidence: f64) -> UnifiedAnalysis {
        let metadata = FileMetadata {
            filename: "doc.txt".into(),
            byte_size: 10,
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
                    name: entity_name.to_string(),
                    entity_type: EntityType::Person,
                    confidence,
                    context: "ctx".into(),
                    relationship: None,
                    quoted_text: None,
                    associated_event: None,
                }],
                document_type: DocumentType::Letter,
                sentiment: Sentiment::Neutral,
                legal_significance: LegalSignificance::Medium,
                risk_flags: vec![],
                confidence_overall: confidence,
            }),
            BTreeSet::new(),
            BTreeSet::new(),
            vec![],
        )
    }

    #[test]
    fn correlates_same_entity_across_two_documents_by_canonical_name() {
        let d1 = doc_analysis(&"1".repeat(64), "John Q. Smith", 0.9);
        let d2 = doc_analysis(&"2".repeat(64), "Smith, John", 0.8);
        let correlated = correlate_entities(&[d1, d2]);
        assert_eq!(correlated.len(), 1);
        assert_eq!(correlated[0].occurrence_count, 2);
        assert_eq!(correlated[0].entity_name, "John Q. Smith");
        assert_eq!(correlated[0].confidence_average, 0.85);
    }

    #[test]
    fn single_document_mention_does_not_correlate() {
        let d1 = doc_analysis(&"1".repeat(64), "Solo Mention", 0.9);
        let correlated = correlate_entities(&[d1]);
        assert!(correlated.is_empty());
    }

    #[test]
    fn capitalized_ngrams_extracts_runs_of_two_or_more() {
        let ngrams = capitalized_ngrams("scanned at Acme Corp headquarters by John Smith yesterday");
        assert!(ngrams.contains(&"Acme Corp".to_string()));
        assert!(ngrams.contains(&"John Smith".to_string()));
    }
}
