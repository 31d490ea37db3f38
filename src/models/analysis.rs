//! Per-item typed analyses produced by the document/email/image analyzers (§3).

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::validate::{round4, validate_confidence};

/// Legal significance band, shared by documents, email threads, and images.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LegalSignificance {
    Low,
    Medium,
    High,
    Critical,
}

/// The fixed risk-flag vocabulary. Kept as an open string set in the wire
/// format (callers intersect against this list) rather than a closed enum,
/// since the AI provider emits free-text tags that are checked against it.
pub const RISK_FLAGS: &[&str] = &[
    "retaliation",
    "harassment",
    "discrimination",
    "threatening",
    "fraud",
    "spoliation",
    "privilege_waiver",
    "confidentiality_breach",
    "obstruction",
    "other",
];

pub fn is_known_risk_flag(flag: &str) -> bool {
    RISK_FLAGS.contains(&flag)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Organization,
    Date,
    LegalTerm,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub confidence: f64,
    pub context: String,
    pub relationship: Option<String>,
    pub quoted_text: Option<String>,
    pub associated_event: Option<String>,
}

impl Entity {
    pub fn validate(&self) -> Result<(), Error> {
        validate_confidence(self.confidence)?;
        if self.name.trim().is_empty() {
            return Err(Error::ValidationError("entity name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Email,
    Letter,
    Contract,
    Filing,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Hostile,
    Neutral,
    Professional,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub summary: String,
    pub entities: Vec<Entity>,
    pub document_type: DocumentType,
    pub sentiment: Sentiment,
    pub legal_significance: LegalSignificance,
    pub risk_flags: Vec<String>,
    pub confidence_overall: f64,
}

impl DocumentAnalysis {
    pub fn validate(&self) -> Result<(), Error> {
        validate_confidence(self.confidence_overall)?;
        for entity in &self.entities {
            entity.validate()?;
        }
        for flag in &self.risk_flags {
            if !is_known_risk_flag(flag) {
                return Err(Error::ValidationError(format!("unknown risk flag: {flag}")));
            }
        }
        Ok(())
    }

    /// Rounds every confidence value to 4 decimal places in place, per the
    /// serialization discipline in SPEC_FULL §3.
    pub fn round_confidences(&mut self) {
        self.confidence_overall = round4(self.confidence_overall);
        for entity in &mut self.entities {
            entity.confidence = round4(entity.confidence);
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Sender,
    Recipient,
    Cc,
    Bcc,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityLevel {
    Executive,
    Management,
    Employee,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub email_address: String,
    pub display_name: Option<String>,
    pub role: ParticipantRole,
    pub authority_level: AuthorityLevel,
    pub message_count: u32,
    pub deference_score: f64,
    pub dominant_topics: Vec<String>,
}

impl Participant {
    pub fn validate(&self) -> Result<(), Error> {
        validate_confidence(self.deference_score)?;
        if self.email_address.trim().is_empty() {
            return Err(Error::ValidationError("participant email must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationPattern {
    Professional,
    Escalating,
    Hostile,
    Retaliatory,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EscalationType {
    ToneChange,
    NewRecipient,
    AuthorityEscalation,
    Threat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationEvent {
    pub message_position: u32,
    #[serde(rename = "type")]
    pub escalation_type: EscalationType,
    pub confidence: f64,
    pub description: String,
}

impl EscalationEvent {
    pub fn validate(&self) -> Result<(), Error> {
        validate_confidence(self.confidence)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailThreadAnalysis {
    pub thread_summary: String,
    pub participants: Vec<Participant>,
    pub communication_pattern: CommunicationPattern,
    /// One entry per message, each in `[0, 1]`.
    pub sentiment_progression: Vec<f64>,
    /// Ascending by `message_position`.
    pub escalation_events: Vec<EscalationEvent>,
    pub legal_significance: LegalSignificance,
    pub risk_flags: Vec<String>,
    /// Free-form timeline hints emitted by the analyzer; reconciled into
    /// full `TimelineEvent`s by the correlation engine.
    pub timeline_reconstruction: Vec<String>,
    pub confidence_overall: f64,
}

impl EmailThreadAnalysis {
    pub fn validate(&self) -> Result<(), Error> {
        validate_confidence(self.confidence_overall)?;
        for participant in &self.participants {
            participant.validate()?;
        }
        for s in &self.sentiment_progression {
            validate_confidence(*s)?;
        }
        for event in &self.escalation_events {
            event.validate()?;
        }
        for flag in &self.risk_flags {
            if !is_known_risk_flag(flag) {
                return Err(Error::ValidationError(format!("unknown risk flag: {flag}")));
            }
        }
        let mut last_position = None;
        for event in &self.escalation_events {
            if let Some(prev) = last_position {
                if event.message_position < prev {
                    return Err(Error::ValidationError(
                        "escalation_events must be ascending by message_position".to_string(),
                    ));
                }
            }
            last_position = Some(event.message_position);
        }
        Ok(())
    }

    pub fn round_confidences(&mut self) {
        self.confidence_overall = round4(self.confidence_overall);
        for p in &mut self.participants {
            p.deference_score = round4(p.deference_score);
        }
        for s in &mut self.sentiment_progression {
            *s = round4(*s);
        }
        for e in &mut self.escalation_events {
            e.confidence = round4(e.confidence);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub scene_description: String,
    pub detected_text: String,
    pub detected_objects: Vec<String>,
    pub people_present: u32,
    pub timestamps_visible: Vec<String>,
    pub potential_evidence_value: LegalSignificance,
    pub risk_flags: Vec<String>,
    pub confidence_overall: f64,
}

impl ImageAnalysis {
    pub fn validate(&self) -> Result<(), Error> {
        validate_confidence(self.confidence_overall)?;
        for flag in &self.risk_flags {
            if !is_known_risk_flag(flag) {
                return Err(Error::ValidationError(format!("unknown risk flag: {flag}")));
            }
        }
        Ok(())
    }

    pub fn round_confidences(&mut self) {
        self.confidence_overall = round4(self.confidence_overall);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entity(confidence: f64) -> Entity {
        Entity {
            name: "John Smith".into(),
            entity_type: EntityType::Person,
            confidence,
            context: "mentioned in paragraph 2".into(),
            relationship: None,
            quoted_text: None,
            associated_event: None,
        }
    }

    #[test]
    fn document_analysis_rejects_unknown_risk_flag() {
        let doc = DocumentAnalysis {
            summary: "s".into(),
            entities: vec![sample_entity(0.9)],
            document_type: DocumentType::Letter,
            sentiment: Sentiment::Neutral,
            legal_significance: LegalSignificance::Medium,
            risk_flags: vec!["not_a_real_flag".into()],
            confidence_overall: 0.5,
        };
        assert!(doc.validate().is_err());
    }

    #[test]
    fn email_analysis_rejects_out_of_order_escalations() {
        let mut analysis = EmailThreadAnalysis {
            thread_summary: "s".into(),
            participants: vec![],
            communication_pattern: CommunicationPattern::Escalating,
            sentiment_progression: vec![0.8, 0.3],
            escalation_events: vec![
                EscalationEvent {
                    message_position: 2,
                    escalation_type: EscalationType::NewRecipient,
                    confidence: 0.9,
                    description: "cc'd HR".into(),
                },
                EscalationEvent {
                    message_position: 1,
                    escalation_type: EscalationType::ToneChange,
                    confidence: 0.7,
                    description: "tone shifted".into(),
                },
            ],
            legal_significance: LegalSignificance::High,
            risk_flags: vec![],
            timeline_reconstruction: vec![],
            confidence_overall: 0.8,
        };
        assert!(analysis.validate().is_err());
        analysis.escalation_events.reverse();
        assert!(analysis.validate().is_ok());
    }

    #[test]
    fn round_confidences_rounds_to_four_decimals() {
        let mut doc = DocumentAnalysis {
            summary: "s".into(),
            entities: vec![sample_entity(0.123_456_7)],
            document_type: DocumentType::Other,
            sentiment: Sentiment::Neutral,
            legal_significance: LegalSignificance::Low,
            risk_flags: vec![],
            confidence_overall: 0.987_654_3,
        };
        doc.round_confidences();
        assert_eq!(doc.confidence_overall, 0.9877);
        assert_eq!(doc.entities[0].confidence, 0.1235);
    }
}
