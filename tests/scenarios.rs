//! Scenario-level integration tests (§8).
//!
//! Each test exercises the pipeline end-to-end against a tempdir-backed
//! `EvidenceStore`, using `MockAiProvider` fixtures wherever the scenario
//! needs AI output and hand-built `UnifiedAnalysis` values where the
//! scenario is really about the correlation/summary math rather than the
//! analyzer call itself (matching the unit-test convention already used
//! throughout `src/correlation` and `src/summary.rs`).

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use evidence_toolkit::ai::mock::MockAiProvider;
use evidence_toolkit::ai::prompts::CaseType;
use evidence_toolkit::config::Config;
use evidence_toolkit::correlation;
use evidence_toolkit::models::analysis::{
    CommunicationPattern, DocumentAnalysis, DocumentType, EmailThreadAnalysis, Entity, EntityType,
    LegalSignificance, Participant, ParticipantRole, AuthorityLevel, Sentiment,
};
use evidence_toolkit::models::evidence::{EvidenceType, FileMetadata, TypedAnalysis, UnifiedAnalysis};
use evidence_toolkit::orchestrator;
use evidence_toolkit::store::EvidenceStore;
use evidence_toolkit::summary::build_case_summary;

fn metadata(sha: &str, filename: &str) -> FileMetadata {
    FileMetadata {
        filename: filename.to_string(),
        byte_size: 100,
        mime: "text/plain".to_string(),
        created: Utc::now(),
        modified: Utc::now(),
        extension: "txt".to_string(),
        sha256: sha.to_string(),
    }
}

fn document_with_entities(sha: &str, entities: Vec<Entity>) -> UnifiedAnalysis {
    UnifiedAnalysis::new(
        EvidenceType::Document,
        metadata(sha, &format!("{sha}.txt")),
        TypedAnalysis::Document(DocumentAnalysis {
            summary: "summary text".to_string(),
            entities,
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

fn date_entity(date: &str, associated_event: &str) -> Entity {
    Entity {
        name: date.to_string(),
        entity_type: EntityType::Date,
        confidence: 0.9,
        context: "ctx".to_string(),
        relationship: None,
        quoted_text: None,
        associated_event: Some(associated_event.to_string()),
    }
}

fn person_entity(name: &str) -> Entity {
    Entity {
        name: name.to_string(),
        entity_type: EntityType::Person,
        confidence: 0.9,
        context: "ctx".to_string(),
        relationship: None,
        quoted_text: None,
        associated_event: None,
    }
}

fn document_fixture() -> serde_json::Value {
    serde_json::json!({
        "summary": "A single-page complaint letter.",
        "entities": [{
            "name": "Jane Doe",
            "type": "person",
            "confidence": 0.92,
            "context": "complainant",
            "relationship": null,
            "quoted_text": null,
            "associated_event": null
        }],
        "document_type": "letter",
        "sentiment": "neutral",
        "legal_significance": "medium",
        "risk_flags": [],
        "confidence_overall": 0.88
    })
}

/// S1: ingesting and analyzing a single document into a single case produces
/// a schema-valid analysis, a correlation result with no cross-evidence
/// entities (only one item), and a case summary with an executive summary.
#[tokio::test]
async fn s1_single_document_single_case_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let source_dir = dir.path().join("incoming");
    tokio::fs::create_dir_all(&source_dir).await.unwrap();
    tokio::fs::write(source_dir.join("complaint.txt"), b"I am writing to report retaliation.")
        .await
        .unwrap();

    let store = Arc::new(EvidenceStore::new(dir.path().join("store")));
    let ingest_report = orchestrator::run_ingest(&store, &source_dir, "CASE-1", "tester").await.unwrap();
    assert_eq!(ingest_report.ingested, 1);

    let shas = store.list_case("CASE-1").await.unwrap();
    assert_eq!(shas.len(), 1);

    let provider = Arc::new(
        MockAiProvider::empty()
            .with_fixture("document_analysis", document_fixture())
            .with_fixture(
                "executive_summary",
                serde_json::json!({
                    "executive_summary": "One item of evidence reviewed.",
                    "key_findings": ["finding a", "finding b", "finding c"],
                    "legal_implications": ["implication"],
                    "recommended_actions": ["action"],
                    "risk_assessment": "low",
                    "confidence_overall": 0.7
                }),
            ),
    );
    let config = Config::default();
    let cancellation = CancellationToken::new();

    let analyze_report = orchestrator::run_analyze(
        Arc::clone(&store),
        Arc::clone(&provider),
        shas.clone(),
        &config,
        false,
        "tester",
        &cancellation,
    )
    .await;
    assert_eq!(analyze_report.analyzed, 1);
    assert!(analyze_report.analyze_failures.is_empty());

    let correlation_result =
        orchestrator::run_correlate(&store, "CASE-1", &config, Some(provider.as_ref()), false).await.unwrap();
    assert_eq!(correlation_result.evidence_count, 1);
    assert!(correlation_result.entity_correlations.is_empty());

    let summary =
        orchestrator::run_summarize(&store, "CASE-1", &config, Some(provider.as_ref()), CaseType::Generic)
            .await
            .unwrap();
    assert_eq!(summary.evidence_count, 1);
    assert!(summary.executive_summary.is_some());
}

/// S2: three documents mentioning name variants of the same person
/// ("John Q. Smith", "Smith, John", "J. Smith") canonicalize into one
/// correlated entity with all three evidence items represented.
#[tokio::test]
async fn s2_entity_canonicalization_merges_name_variants() {
    let dir = tempfile::tempdir().unwrap();
    let store = EvidenceStore::new(dir.path());
    let config = Config::default();

    let analyses = vec![
        document_with_entities(&"1".repeat(64), vec![person_entity("John Q. Smith")]),
        document_with_entities(&"2".repeat(64), vec![person_entity("Smith, John")]),
        document_with_entities(&"3".repeat(64), vec![person_entity("J. Smith")]),
    ];
    for analysis in &analyses {
        store.put_analysis(&analysis.file_metadata.sha256, analysis.clone(), "tester").await.unwrap();
        store.associate_case(&analysis.file_metadata.sha256, "CASE-2", "tester").await.unwrap();
    }

    let result = correlation::correlate(&store, "CASE-2", &config).await.unwrap();
    assert_eq!(result.entity_correlations.len(), 1);
    assert_eq!(result.entity_correlations[0].occurrence_count, 3);
    assert_eq!(result.entity_correlations[0].entity_name, "John Q. Smith");
}

/// S3: re-ingesting byte-identical content is a no-op on raw storage; the
/// pipeline reports it as a skipped duplicate rather than a new item.
#[tokio::test]
async fn s3_duplicate_ingest_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("incoming");
    tokio::fs::create_dir_all(&source).await.unwrap();
    tokio::fs::write(source.join("evidence.txt"), b"identical bytes").await.unwrap();

    let store = EvidenceStore::new(dir.path().join("store"));
    let first = orchestrator::run_ingest(&store, &source, "CASE-3", "tester").await.unwrap();
    assert_eq!(first.ingested, 1);
    assert_eq!(first.ingest_skipped_duplicates, 0);

    let second = orchestrator::run_ingest(&store, &source, "CASE-3", "tester").await.unwrap();
    assert_eq!(second.ingested, 0);
    assert_eq!(second.ingest_skipped_duplicates, 1);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.raw_items, 1);
}

fn email_with_pattern(sha: &str, pattern: CommunicationPattern) -> UnifiedAnalysis {
    UnifiedAnalysis::new(
        EvidenceType::Email,
        metadata(sha, &format!("{sha}.eml")),
        TypedAnalysis::Email(EmailThreadAnalysis {
            thread_summary: "Escalating workplace conduct thread.".to_string(),
            participants: vec![
                Participant {
                    email_address: "manager@example.com".to_string(),
                    display_name: Some("Manager".to_string()),
                    role: ParticipantRole::Sender,
                    authority_level: AuthorityLevel::Management,
                    message_count: 2,
                    deference_score: 0.1,
                    dominant_topics: vec!["conduct".to_string()],
                },
                Participant {
                    email_address: "employee@example.com".to_string(),
                    display_name: Some("Employee".to_string()),
                    role: ParticipantRole::Recipient,
                    authority_level: AuthorityLevel::Employee,
                    message_count: 1,
                    deference_score: 0.8,
                    dominant_topics: vec!["conduct".to_string()],
                },
            ],
            communication_pattern: pattern,
            sentiment_progression: vec![0.6, 0.3, 0.1],
            escalation_events: vec![],
            legal_significance: LegalSignificance::High,
            risk_flags: vec!["harassment".to_string()],
            timeline_reconstruction: vec![],
            confidence_overall: 0.85,
        }),
        BTreeSet::new(),
        BTreeSet::new(),
        vec![],
    )
}

/// S4: an escalating email thread's communication pattern surfaces in the
/// case summary's `overall_assessment.communication_patterns` rollup.
#[tokio::test]
async fn s4_email_thread_escalation_surfaces_in_summary() {
    let dir = tempfile::tempdir().unwrap();
    let store = EvidenceStore::new(dir.path());
    let config = Config::default();

    let analysis = email_with_pattern(&"4".repeat(64), CommunicationPattern::Escalating);
    store
        .put_analysis(&analysis.file_metadata.sha256, analysis.clone(), "tester")
        .await
        .unwrap();
    store.associate_case(&analysis.file_metadata.sha256, "CASE-4", "tester").await.unwrap();

    let summary =
        build_case_summary::<MockAiProvider>(&store, "CASE-4", &config, None, CaseType::Employment)
            .await
            .unwrap();
    assert_eq!(
        summary.overall_assessment.communication_patterns.get(&CommunicationPattern::Escalating),
        Some(&1)
    );
    assert_eq!(summary.overall_assessment.power_dynamics.len(), 2);
}

/// S5: two retaliation-flagged documents close together in time form a
/// temporal sequence; a third, months later, does not join it.
#[tokio::test]
async fn s5_temporal_retaliation_pattern_groups_nearby_events() {
    let dir = tempfile::tempdir().unwrap();
    let store = EvidenceStore::new(dir.path());
    let config = Config::default();

    let retaliatory = |sha: &str, date: &str| {
        UnifiedAnalysis::new(
            EvidenceType::Document,
            metadata(sha, &format!("{sha}.txt")),
            TypedAnalysis::Document(DocumentAnalysis {
                summary: "s".to_string(),
                entities: vec![date_entity(date, "retaliatory action")],
                document_type: DocumentType::Letter,
                sentiment: Sentiment::Hostile,
                legal_significance: LegalSignificance::High,
                risk_flags: vec!["retaliation".to_string()],
                confidence_overall: 0.8,
            }),
            BTreeSet::new(),
            BTreeSet::new(),
            vec![],
        )
    };

    let analyses = vec![
        retaliatory(&"5".repeat(64), "2024-01-01"),
        retaliatory(&"6".repeat(64), "2024-01-02"),
        retaliatory(&"7".repeat(64), "2024-06-01"),
    ];
    for analysis in &analyses {
        store.put_analysis(&analysis.file_metadata.sha256, analysis.clone(), "tester").await.unwrap();
        store.associate_case(&analysis.file_metadata.sha256, "CASE-5", "tester").await.unwrap();
    }

    let result = correlation::correlate(&store, "CASE-5", &config).await.unwrap();
    assert!(!result.temporal_sequences.is_empty());

    let jan_event_index = result
        .timeline_events
        .iter()
        .position(|e| e.event_type == "semantic_event" && e.timestamp.format("%Y-%m-%d").to_string() == "2024-01-01")
        .unwrap();
    let sequence_covering_jan_1 = result
        .temporal_sequences
        .iter()
        .find(|s| s.anchor_index == jan_event_index)
        .expect("2024-01-01 semantic event should anchor a sequence");
    assert!(!sequence_covering_jan_1.related_indices.is_empty(), "2024-01-02 should fall within the 72h window");

    let june_event_index = result
        .timeline_events
        .iter()
        .position(|e| e.event_type == "semantic_event" && e.timestamp.format("%Y-%m-%d").to_string() == "2024-06-01")
        .unwrap();
    let sequence_covering_june = result
        .temporal_sequences
        .iter()
        .find(|s| s.anchor_index == june_event_index)
        .expect("June event is itself retaliation-flagged, so it anchors its own sequence");
    assert!(sequence_covering_june.related_indices.is_empty(), "no other event falls within 72h of June 1st");
}

/// S6: two non-ingestion-artifact events separated by more than the
/// configured gap threshold (default 168h) produce a recorded timeline gap.
#[tokio::test]
async fn s6_timeline_gap_detected_across_a_long_silence() {
    let dir = tempfile::tempdir().unwrap();
    let store = EvidenceStore::new(dir.path());
    let config = Config::default();

    let with_date = |sha: &str, date: &str| {
        document_with_entities(sha, vec![date_entity(date, "notable event")])
    };

    let analyses = vec![with_date(&"8".repeat(64), "2024-01-01"), with_date(&"9".repeat(64), "2024-03-01")];
    for analysis in &analyses {
        store.put_analysis(&analysis.file_metadata.sha256, analysis.clone(), "tester").await.unwrap();
        store.associate_case(&analysis.file_metadata.sha256, "CASE-6", "tester").await.unwrap();
    }

    let result = correlation::correlate(&store, "CASE-6", &config).await.unwrap();
    assert!(!result.timeline_gaps.is_empty());
    assert_eq!(
        result.timeline_gaps[0].significance,
        evidence_toolkit::models::correlation::GapSignificance::High
    );
}

/// S7: a case large enough to exceed one map-reduce chunk (default chunk
/// size 30) is summarized by chunking evidence summaries and combining the
/// per-chunk results into one executive summary.
#[tokio::test]
async fn s7_large_case_summarized_via_map_reduce_chunking() {
    let dir = tempfile::tempdir().unwrap();
    let store = EvidenceStore::new(dir.path());
    let config = Config::default();

    for i in 0..75 {
        let sha = format!("{:064x}", i);
        let analysis = document_with_entities(&sha, vec![person_entity(&format!("Witness {i}"))]);
        store.put_analysis(&sha, analysis, "tester").await.unwrap();
        store.associate_case(&sha, "CASE-7", "tester").await.unwrap();
    }

    let provider = MockAiProvider::empty()
        .with_fixture(
            "chunk_summary",
            serde_json::json!({"chunk_index": 0, "summary": "chunk summary", "notable_findings": ["x"]}),
        )
        .with_fixture(
            "executive_summary",
            serde_json::json!({
                "executive_summary": "Large case reviewed across multiple chunks.",
                "key_findings": ["a", "b", "c"],
                "legal_implications": ["imp"],
                "recommended_actions": ["act"],
                "risk_assessment": "medium",
                "confidence_overall": 0.75
            }),
        );

    let summary = build_case_summary(&store, "CASE-7", &config, Some(&provider), CaseType::Generic).await.unwrap();
    assert_eq!(summary.evidence_count, 75);
    assert!(summary.executive_summary.is_some());

    let calls = provider.calls();
    let chunk_calls = calls.iter().filter(|c| *c == "chunk_summary").count();
    let expected_chunks = (75 + config.map_reduce_chunk_size - 1) / config.map_reduce_chunk_size;
    assert_eq!(chunk_calls, expected_chunks);
    assert_eq!(calls.iter().filter(|c| *c == "executive_summary").count(), 1);
}

/// S8: when the AI provider has no fixture registered (the unavailable/
/// misconfigured case), per-item analysis fails without corrupting the
/// store, and summarization without a provider simply omits the executive
/// summary rather than failing outright.
#[tokio::test]
async fn s8_ai_unavailable_degrades_without_corrupting_state() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("incoming");
    tokio::fs::create_dir_all(&source).await.unwrap();
    tokio::fs::write(source.join("a.txt"), b"some content").await.unwrap();

    let store = Arc::new(EvidenceStore::new(dir.path().join("store")));
    orchestrator::run_ingest(&store, &source, "CASE-8", "tester").await.unwrap();
    let shas = store.list_case("CASE-8").await.unwrap();

    let provider = Arc::new(MockAiProvider::empty());
    let config = Config::default();
    let cancellation = CancellationToken::new();

    let report = orchestrator::run_analyze(
        Arc::clone(&store),
        Arc::clone(&provider),
        shas,
        &config,
        false,
        "tester",
        &cancellation,
    )
    .await;
    assert_eq!(report.analyzed, 0);
    assert_eq!(report.analyze_failures.len(), 1);
    assert_eq!(report.exit_code(), 1);

    // No analysis was persisted for the failed item.
    let sha = store.list_case("CASE-8").await.unwrap().remove(0);
    assert!(store.get_analysis(&sha).await.unwrap().is_none());

    // Summarization with no provider at all still succeeds, just with no
    // executive summary and an empty evidence_summaries list (no analyses
    // exist yet to summarize).
    let summary =
        build_case_summary::<MockAiProvider>(&store, "CASE-8", &config, None, CaseType::Generic)
            .await
            .unwrap();
    assert!(summary.executive_summary.is_none());
    assert_eq!(summary.evidence_count, 0);
}
