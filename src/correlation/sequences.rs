//! Temporal sequences and timeline gaps (§4.5).

use chrono::Duration;

use crate::models::analysis::{CommunicationPattern, LegalSignificance};
use crate::models::correlation::{
    GapSignificance, SequenceSignificance, TemporalSequence, TimelineEvent, TimelineGap,
};

const RETALIATION_RISK_FLAGS: &[&str] = &["retaliation", "harassment", "discrimination", "threatening"];

fn is_anchor(event: &TimelineEvent) -> bool {
    if event.is_ingestion_artifact() {
        return false;
    }
    let Some(classification) = &event.ai_classification else { return false };
    let significant_legal = matches!(
        classification.legal_significance,
        Some(LegalSignificance::Critical) | Some(LegalSignificance::High)
    );
    let risky_flag = classification.risk_flags.iter().any(|f| RETALIATION_RISK_FLAGS.contains(&f.as_str()));
    let hostile_pattern =
        matches!(classification.pattern, Some(CommunicationPattern::Hostile) | Some(CommunicationPattern::Retaliatory));
    significant_legal || risky_flag || hostile_pattern
}

fn significance_for(events: &[&TimelineEvent]) -> SequenceSignificance {
    let has_critical = events.iter().any(|e| {
        e.ai_classification
            .as_ref()
            .map(|c| {
                c.legal_significance == Some(LegalSignificance::Critical)
                    || c.risk_flags.iter().any(|f| f == "retaliation" || f == "harassment" || f == "discrimination" || f == "threatening")
            })
            .unwrap_or(false)
    });
    if has_critical {
        return SequenceSignificance::High;
    }
    if events.len() >= 3 {
        return SequenceSignificance::Medium;
    }
    SequenceSignificance::Low
}

/// Groups events within a rolling `window_hours` window of each anchor event
/// (§4.5: legal_significance critical/high, a retaliation-adjacent risk
/// flag, or a hostile/retaliatory communication pattern). Ingestion-artifact
/// events are excluded both as anchors and as members. `events` must already
/// be sorted ascending by timestamp.
pub fn temporal_sequences(events: &[TimelineEvent], window_hours: i64) -> Vec<TemporalSequence> {
    let window = Duration::hours(window_hours);
    let mut sequences = Vec::new();

    for (anchor_index, anchor) in events.iter().enumerate() {
        if !is_anchor(anchor) {
            continue;
        }

        let related_indices: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(i, e)| {
                *i != anchor_index
                    && !e.is_ingestion_artifact()
                    && e.timestamp >= anchor.timestamp
                    && e.timestamp - anchor.timestamp <= window
            })
            .map(|(i, _)| i)
            .collect();

        let mut window_events: Vec<&TimelineEvent> = vec![anchor];
        window_events.extend(related_indices.iter().map(|&i| &events[i]));

        sequences.push(TemporalSequence {
            anchor_index,
            related_indices,
            significance: significance_for(&window_events),
        });
    }

    sequences
}

/// Records a gap for every consecutive pair of forensically relevant events
/// (excluding ingestion artifacts) separated by more than
/// `gap_threshold_hours` (§4.5: default 168h / 7 days).
pub fn timeline_gaps(events: &[TimelineEvent], gap_threshold_hours: i64) -> Vec<TimelineGap> {
    let relevant: Vec<(usize, &TimelineEvent)> =
        events.iter().enumerate().filter(|(_, e)| !e.is_ingestion_artifact()).collect();

    let mut gaps = Vec::new();
    for pair in relevant.windows(2) {
        let (before_index, before) = pair[0];
        let (after_index, after) = pair[1];
        let gap = after.timestamp - before.timestamp;
        if gap.num_hours() <= gap_threshold_hours {
            continue;
        }
        let gap_duration_days = gap.num_minutes() as f64 / (24.0 * 60.0);
        let significance = if gap_duration_days >= 30.0 {
            GapSignificance::High
        } else if gap_duration_days >= 14.0 {
            GapSignificance::Medium
        } else {
            GapSignificance::Low
        };
        gaps.push(TimelineGap { before_index, after_index, gap_duration_days, significance });
    }
    gaps
}
