//! Timeline reconstruction (§4.5).
//!
//! Emits [`TimelineEvent`]s from file metadata, analysis timestamps, email
//! dates, EXIF `DateTimeOriginal`, and document date entities with an
//! `associated_event`. Sorted ascending by timestamp, stable on ties by
//! `(evidence_sha256, event_type)`.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::models::analysis::EntityType;
use crate::models::correlation::{AiClassification, TimelineEvent};
use crate::models::evidence::{EvidenceType, TypedAnalysis, UnifiedAnalysis};

/// Parses a date string in any of the formats §4.5 names: ISO (`YYYY-MM-DD`
/// or RFC 3339), `DD/MM/YYYY`, `"Nth Month YYYY"`, or `"Month YYYY"` (year
/// resolved to the 1st). Returns `None` (skipped silently, per §4.5) for
/// anything else.
pub fn parse_flexible_date(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%d/%m/%Y") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    let stripped = strip_ordinal_suffix(text);

    if let Ok(date) = NaiveDate::parse_from_str(&stripped, "%d %B %Y") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("1 {stripped}"), "%d %B %Y") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    None
}

/// Strips an ordinal suffix (`1st`/`2nd`/`3rd`/`4th`/...) from the leading
/// day-of-month token, e.g. `"3rd March 2024"` -> `"3 March 2024"`.
fn strip_ordinal_suffix(text: &str) -> String {
    let mut words = text.split_whitespace();
    let Some(first) = words.next() else { return text.to_string() };
    let rest: Vec<&str> = words.collect();

    let trimmed: String = first
        .trim_end_matches(|c: char| c.is_alphabetic())
        .to_string();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return text.to_string();
    }

    let mut out = vec![trimmed];
    out.extend(rest);
    out.join(" ")
}

fn ai_classification_for(analysis: &UnifiedAnalysis) -> Option<AiClassification> {
    match &analysis.analysis {
        TypedAnalysis::Document(d) => Some(AiClassification {
            pattern: None,
            risk_flags: d.risk_flags.clone(),
            legal_significance: Some(d.legal_significance),
        }),
        TypedAnalysis::Email(e) => Some(AiClassification {
            pattern: Some(e.communication_pattern),
            risk_flags: e.risk_flags.clone(),
            legal_significance: Some(e.legal_significance),
        }),
        TypedAnalysis::Image(i) => Some(AiClassification {
            pattern: None,
            risk_flags: i.risk_flags.clone(),
            legal_significance: Some(i.potential_evidence_value),
        }),
    }
}

/// Builds every timeline event derivable from one evidence item's analysis
/// and metadata. `exif_date_original` is passed in separately since it comes
/// from an optional sidecar file the store reads, not from the analysis.
pub fn events_for(analysis: &UnifiedAnalysis, exif_date_original: Option<DateTime<Utc>>) -> Vec<TimelineEvent> {
    let sha = analysis.file_metadata.sha256.clone();
    let evidence_type = analysis.evidence_type;
    let classification = ai_classification_for(analysis);
    let mut events = Vec::new();

    events.push(TimelineEvent {
        timestamp: analysis.file_metadata.created,
        evidence_sha256: sha.clone(),
        evidence_type,
        event_type: "file_created".to_string(),
        description: format!("{} created", analysis.file_metadata.filename),
        confidence: 1.0,
        ai_classification: None,
    });
    if analysis.file_metadata.modified != analysis.file_metadata.created {
        events.push(TimelineEvent {
            timestamp: analysis.file_metadata.modified,
            evidence_sha256: sha.clone(),
            evidence_type,
            event_type: "file_modified".to_string(),
            description: format!("{} modified", analysis.file_metadata.filename),
            confidence: 1.0,
            ai_classification: None,
        });
    }
    events.push(TimelineEvent {
        timestamp: analysis.analysis_timestamp,
        evidence_sha256: sha.clone(),
        evidence_type,
        event_type: "analysis_performed".to_string(),
        description: "AI analysis recorded".to_string(),
        confidence: 1.0,
        ai_classification: None,
    });

    if let Some(exif_date) = exif_date_original {
        events.push(TimelineEvent {
            timestamp: exif_date,
            evidence_sha256: sha.clone(),
            evidence_type,
            event_type: "photo_taken".to_string(),
            description: "EXIF DateTimeOriginal".to_string(),
            confidence: 0.9,
            ai_classification: classification.clone(),
        });
    }

    match &analysis.analysis {
        TypedAnalysis::Email(email) => {
            if let Some(first_hint) = email.timeline_reconstruction.first() {
                if let Some(date) = parse_flexible_date(first_hint) {
                    events.push(TimelineEvent {
                        timestamp: date,
                        evidence_sha256: sha.clone(),
                        evidence_type,
                        event_type: "communication".to_string(),
                        description: email.thread_summary.clone(),
                        confidence: 0.8,
                        ai_classification: classification.clone(),
                    });
                }
            } else {
                events.push(TimelineEvent {
                    timestamp: analysis.analysis_timestamp,
                    evidence_sha256: sha.clone(),
                    evidence_type,
                    event_type: "communication".to_string(),
                    description: email.thread_summary.clone(),
                    confidence: 0.8,
                    ai_classification: classification.clone(),
                });
            }
        }
        TypedAnalysis::Document(doc) => {
            for entity in &doc.entities {
                if entity.entity_type != EntityType::Date {
                    continue;
                }
                let Some(associated_event) = &entity.associated_event else { continue };
                let Some(date) = parse_flexible_date(&entity.name) else { continue };
                events.push(TimelineEvent {
                    timestamp: date,
                    evidence_sha256: sha.clone(),
                    evidence_type,
                    event_type: "semantic_event".to_string(),
                    description: associated_event.clone(),
                    confidence: entity.confidence,
                    ai_classification: classification.clone(),
                });
            }
        }
        TypedAnalysis::Image(_) => {}
    }

    events
}

/// Sorts events ascending by timestamp, stable on ties by
/// `(evidence_sha256, event_type)` (§4.5, §5).
pub fn sort_events(events: &mut [TimelineEvent]) {
    events.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.evidence_sha256.cmp(&b.evidence_sha256))
            .then_with(|| a.event_type.cmp(&b.event_type))
    });
}
