//! Optional AI-assisted entity resolution (§4.5).
//!
//! After string canonicalization, ambiguous person entities that did *not*
//! already collide on a canonical variant can be reconciled by asking the
//! AI port a strict "same entity?" question. Bounded to `max_pairs`
//! candidates for cost; conservative bias (false negatives preferred).

use serde::{Deserialize, Serialize};

use crate::ai::{prompts, AiProvider};
use crate::error::Error;
use crate::models::correlation::{CorrelatedEntity, CorrelatedEntityType, EvidenceOccurrence};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntityResolutionVerdict {
    pub is_same_entity: bool,
    pub confidence: f64,
    pub reasoning: String,
    pub supporting_signals: Vec<String>,
    pub conflicting_signals: Vec<String>,
}

/// A candidate pair of not-yet-correlated person entities that share only a
/// first name (or similarly weak overlap), worth an AI opinion.
#[derive(Debug, Clone)]
pub struct CandidatePair {
    pub a: CorrelatedEntity,
    pub b: CorrelatedEntity,
}

/// Finds candidate pairs among singleton person mentions (entities that
/// individually failed the §4.5 occurrence floor, so they never became a
/// `CorrelatedEntity` through string canonicalization alone) that share a
/// first token, up to `max_pairs`.
pub fn find_candidate_pairs(singletons: &[EvidenceOccurrence], max_pairs: usize) -> Vec<CandidatePair> {
    let mut pairs = Vec::new();
    for i in 0..singletons.len() {
        if pairs.len() >= max_pairs {
            break;
        }
        for j in (i + 1)..singletons.len() {
            if pairs.len() >= max_pairs {
                break;
            }
            let a = &singletons[i];
            let b = &singletons[j];
            if a.entity_type != CorrelatedEntityType::Person || b.entity_type != CorrelatedEntityType::Person {
                continue;
            }
            if a.evidence_sha256 == b.evidence_sha256 {
                continue;
            }
            let first_a = a.original_name.split_whitespace().next().unwrap_or("").to_lowercase();
            let first_b = b.original_name.split_whitespace().next().unwrap_or("").to_lowercase();
            if first_a.is_empty() || first_a != first_b {
                continue;
            }
            pairs.push(CandidatePair {
                a: CorrelatedEntity {
                    entity_name: a.original_name.clone(),
                    entity_type: CorrelatedEntityType::Person,
                    occurrence_count: 1,
                    confidence_average: a.confidence,
                    evidence_occurrences: vec![a.clone()],
                },
                b: CorrelatedEntity {
                    entity_name: b.original_name.clone(),
                    entity_type: CorrelatedEntityType::Person,
                    occurrence_count: 1,
                    confidence_average: b.confidence,
                    evidence_occurrences: vec![b.clone()],
                },
            });
        }
    }
    pairs
}

/// Asks `provider` whether a candidate pair is the same real person.
/// Conservative by construction: a common-first-name-only match requires a
/// unique identifier (email, org, role) among `supporting_signals`, enforced
/// here rather than trusted blindly from the model's `is_same_entity` flag.
pub async fn resolve_pair<P: AiProvider>(
    provider: &P,
    pair: &CandidatePair,
) -> Result<EntityResolutionVerdict, Error> {
    let prompt = format!(
        "{}\n\nEntity A: {} (context: {})\nEntity B: {} (context: {})",
        prompts::entity_resolution_system_prompt(),
        pair.a.entity_name,
        pair.a.evidence_occurrences.first().map(|o| o.context.as_str()).unwrap_or(""),
        pair.b.entity_name,
        pair.b.evidence_occurrences.first().map(|o| o.context.as_str()).unwrap_or(""),
    );
    let mut verdict: EntityResolutionVerdict =
        provider.generate_structured(&prompt, "entity_resolution").await?;

    let has_unique_identifier = verdict
        .supporting_signals
        .iter()
        .any(|s| s.contains('@') || s.to_lowercase().contains("org") || s.to_lowercase().contains("role"));
    if verdict.is_same_entity && !has_unique_identifier {
        verdict.is_same_entity = false;
        verdict.conflicting_signals.push(
            "downgraded: first-name-only match without a unique supporting identifier".to_string(),
        );
    }
    Ok(verdict)
}

/// Runs AI resolution over up to `max_pairs` candidates drawn from
/// `singletons`, returning merged pairs as a vec of (entity_a, entity_b,
/// verdict) for the caller to fold back into the correlation result.
pub async fn resolve_candidates<P: AiProvider>(
    provider: &P,
    singletons: &[EvidenceOccurrence],
    max_pairs: usize,
) -> Vec<(CandidatePair, EntityResolutionVerdict)> {
    let pairs = find_candidate_pairs(singletons, max_pairs);
    let mut results = Vec::new();
    for pair in pairs {
        match resolve_pair(provider, &pair).await {
            Ok(verdict) => results.push((pair, verdict)),
            Err(e) => {
                tracing::warn!(error = %e, "entity resolution call failed, skipping pair");
            }
        }
    }
    results
}

/// Folds AI-confirmed pairs (`verdict.is_same_entity`) into
/// [`CorrelatedEntity`] values ready to merge into a case's
/// `entity_correlations`. Confirmed pairs sharing an occurrence (by
/// `(evidence_sha256, original_name)`) are merged into one cluster so a
/// chain of confirmations (A matches B, B matches C) produces a single
/// entity rather than two overlapping ones. Each cluster is built through
/// [`CorrelatedEntity::from_occurrences`], which re-applies the §4.5
/// dedup/aggregation rules (kept-per-evidence, confidence average, plurality
/// type vote, longest display name) over the merged occurrence set.
pub fn merge_confirmed(resolved: &[(CandidatePair, EntityResolutionVerdict)]) -> Vec<CorrelatedEntity> {
    fn occ_key(o: &EvidenceOccurrence) -> (String, String) {
        (o.evidence_sha256.clone(), o.original_name.clone())
    }

    let mut clusters: Vec<Vec<EvidenceOccurrence>> = Vec::new();

    for (pair, verdict) in resolved {
        if !verdict.is_same_entity {
            continue;
        }
        let a = pair.a.evidence_occurrences.first().cloned();
        let b = pair.b.evidence_occurrences.first().cloned();
        let (Some(a), Some(b)) = (a, b) else { continue };

        let existing = clusters.iter().position(|cluster| {
            cluster.iter().any(|o| occ_key(o) == occ_key(&a) || occ_key(o) == occ_key(&b))
        });
        match existing {
            Some(idx) => {
                let cluster = &mut clusters[idx];
                if !cluster.iter().any(|o| occ_key(o) == occ_key(&a)) {
                    cluster.push(a);
                }
                if !cluster.iter().any(|o| occ_key(o) == occ_key(&b)) {
                    cluster.push(b);
                }
            }
            None => clusters.push(vec![a, b]),
        }
    }

    clusters.into_iter().filter_map(CorrelatedEntity::from_occurrences).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockAiProvider;

    fn occ(sha: &str, name: &str) -> EvidenceOccurrence {
        EvidenceOccurrence {
            evidence_sha256: sha.to_string(),
            original_name: name.to_string(),
            confidence: 0.7,
            context: "mentioned alone".to_string(),
            entity_type: CorrelatedEntityType::Person,
        }
    }

    #[test]
    fn finds_candidates_sharing_a_first_name() {
        let singletons = vec![occ(&"a".repeat(64), "John Roberts"), occ(&"b".repeat(64), "John Fields")];
        let pairs = find_candidate_pairs(&singletons, 50);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn does_not_pair_entities_from_the_same_evidence_item() {
        let sha = "a".repeat(64);
        let singletons = vec![occ(&sha, "John Roberts"), occ(&sha, "John Fields")];
        assert!(find_candidate_pairs(&singletons, 50).is_empty());
    }

    #[tokio::test]
    async fn downgrades_same_entity_without_a_unique_identifier() {
        let fixture = serde_json::json!({
            "is_same_entity": true,
            "confidence": 0.6,
            "reasoning": "Both named John",
            "supporting_signals": ["shared first name"],
            "conflicting_signals": []
        });
        let provider = MockAiProvider::empty().with_fixture("entity_resolution", fixture);
        let pair = CandidatePair {
            a: CorrelatedEntity {
                entity_name: "John Roberts".into(),
                entity_type: CorrelatedEntityType::Person,
                occurrence_count: 1,
                confidence_average: 0.7,
                evidence_occurrences: vec![occ(&"a".repeat(64), "John Roberts")],
            },
            b: CorrelatedEntity {
                entity_name: "John Fields".into(),
                entity_type: CorrelatedEntityType::Person,
                occurrence_count: 1,
                confidence_average: 0.7,
                evidence_occurrences: vec![occ(&"b".repeat(64), "John Fields")],
            },
        };
        let verdict = resolve_pair(&provider, &pair).await.unwrap();
        assert!(!verdict.is_same_entity);
    }

    fn confirmed_verdict() -> EntityResolutionVerdict {
        EntityResolutionVerdict {
            is_same_entity: true,
            confidence: 0.9,
            reasoning: "same person".into(),
            supporting_signals: vec!["same email".into()],
            conflicting_signals: vec![],
        }
    }

    #[test]
    fn merge_confirmed_produces_a_correlated_entity_from_two_singletons() {
        let pair = CandidatePair {
            a: CorrelatedEntity {
                entity_name: "John Roberts".into(),
                entity_type: CorrelatedEntityType::Person,
                occurrence_count: 1,
                confidence_average: 0.7,
                evidence_occurrences: vec![occ(&"a".repeat(64), "John Roberts")],
            },
            b: CorrelatedEntity {
                entity_name: "J. Roberts".into(),
                entity_type: CorrelatedEntityType::Person,
                occurrence_count: 1,
                confidence_average: 0.6,
                evidence_occurrences: vec![occ(&"b".repeat(64), "J. Roberts")],
            },
        };
        let merged = merge_confirmed(&[(pair, confirmed_verdict())]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].occurrence_count, 2);
        assert_eq!(merged[0].entity_name, "John Roberts");
    }

    #[test]
    fn merge_confirmed_chains_overlapping_pairs_into_one_cluster() {
        let a = occ(&"a".repeat(64), "John Roberts");
        let b = occ(&"b".repeat(64), "John R.");
        let c = occ(&"c".repeat(64), "J. Roberts");
        let pair_ab = CandidatePair {
            a: CorrelatedEntity {
                entity_name: a.original_name.clone(),
                entity_type: CorrelatedEntityType::Person,
                occurrence_count: 1,
                confidence_average: a.confidence,
                evidence_occurrences: vec![a.clone()],
            },
            b: CorrelatedEntity {
                entity_name: b.original_name.clone(),
                entity_type: CorrelatedEntityType::Person,
                occurrence_count: 1,
                confidence_average: b.confidence,
                evidence_occurrences: vec![b.clone()],
            },
        };
        let pair_bc = CandidatePair {
            a: CorrelatedEntity {
                entity_name: b.original_name.clone(),
                entity_type: CorrelatedEntityType::Person,
                occurrence_count: 1,
                confidence_average: b.confidence,
                evidence_occurrences: vec![b.clone()],
            },
            b: CorrelatedEntity {
                entity_name: c.original_name.clone(),
                entity_type: CorrelatedEntityType::Person,
                occurrence_count: 1,
                confidence_average: c.confidence,
                evidence_occurrences: vec![c.clone()],
            },
        };
        let merged = merge_confirmed(&[(pair_ab, confirmed_verdict()), (pair_bc, confirmed_verdict())]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].occurrence_count, 3);
    }

    #[test]
    fn merge_confirmed_ignores_unconfirmed_pairs() {
        let pair = CandidatePair {
            a: CorrelatedEntity {
                entity_name: "John Roberts".into(),
                entity_type: CorrelatedEntityType::Person,
                occurrence_count: 1,
                confidence_average: 0.7,
                evidence_occurrences: vec![occ(&"a".repeat(64), "John Roberts")],
            },
            b: CorrelatedEntity {
                entity_name: "John Fields".into(),
                entity_type: CorrelatedEntityType::Person,
                occurrence_count: 1,
                confidence_average: 0.7,
                evidence_occurrences: vec![occ(&"b".repeat(64), "John Fields")],
            },
        };
        let verdict = EntityResolutionVerdict {
            is_same_entity: false,
            confidence: 0.4,
            reasoning: "different people".into(),
            supporting_signals: vec![],
            conflicting_signals: vec!["different orgs".into()],
        };
        assert!(merge_confirmed(&[(pair, verdict)]).is_empty());
    }
}
