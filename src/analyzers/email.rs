//! Email analyzer (§4.4).
//!
//! Parses headers and body via an [`EmailParser`], then asks the AI port for
//! a structured [`EmailThreadAnalysis`] covering the whole thread (quoted
//! history and all) rather than re-deriving per-message structure locally —
//! the model is in a better position to segment a quoted thread into
//! messages than a hand-rolled quote-stripper would be.

use crate::ai::{prompts, AiProvider};
use crate::error::Error;
use crate::extract::EmailParser;
use crate::models::analysis::EmailThreadAnalysis;
use crate::models::evidence::FileMetadata;

pub async fn analyze_email<P: AiProvider>(
    bytes: &[u8],
    _metadata: &FileMetadata,
    parser: &dyn EmailParser,
    provider: &P,
) -> Result<EmailThreadAnalysis, Error> {
    let parsed = parser.parse(bytes).await?;

    let system_prompt = prompts::email_analysis_system_prompt();
    let user_context = prompts::email_analysis_user_context(&parsed.headers_text(), &parsed.body);
    let prompt = format!("{system_prompt}\n\n{user_context}");

    let mut analysis: EmailThreadAnalysis =
        provider.generate_structured(&prompt, "email_analysis").await?;
    analysis.validate()?;
    analysis.round_confidences();
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockAiProvider;
    use crate::models::analysis::CommunicationPattern;

    const SAMPLE: &str = "From: Manager <manager@example.com>\r\n\
To: Employee <employee@example.com>\r\n\
Cc: HR <hr@example.com>\r\n\
Subject: Re: Conduct\r\n\
Date: Fri, 1 Mar 2024 09:00:00 +0000\r\n\
\r\n\
This needs to stop immediately.\r\n";

    fn sample_metadata() -> FileMetadata {
        FileMetadata {
            filename: "thread.eml".into(),
            byte_size: SAMPLE.len() as u64,
            mime: "message/rfc822".into(),
            created: chrono::Utc::now(),
            modified: chrono::Utc::now(),
            extension: "eml".into(),
            sha256: "c".repeat(64),
        }
    }

    #[tokio::test]
    async fn analyzes_parsed_thread_via_structured_generation() {
        let fixture = serde_json::json!({
            "thread_summary": "Escalating exchange about workplace conduct.",
            "participants": [
                {
                    "email_address": "manager@example.com",
                    "display_name": "Manager",
                    "role": "sender",
                    "authority_level": "management",
                    "message_count": 2,
                    "deference_score": 0.1,
                    "dominant_topics": ["conduct"]
                },
                {
                    "email_address": "employee@example.com",
                    "display_name": "Employee",
                    "role": "recipient",
                    "authority_level": "employee",
                    "message_count": 1,
                    "deference_score": 0.8,
                    "dominant_topics": ["conduct"]
                }
            ],
            "communication_pattern": "escalating",
            "sentiment_progression": [0.6, 0.4, 0.1],
            "escalation_events": [{
                "message_position": 2,
                "type": "new_recipient",
                "confidence": 0.9,
                "description": "HR cc'd on final message"
            }],
            "legal_significance": "high",
            "risk_flags": ["harassment"],
            "timeline_reconstruction": [],
            "confidence_overall": 0.85
        });
        let provider = MockAiProvider::empty().with_fixture("email_analysis", fixture);
        let metadata = sample_metadata();
        let analysis =
            analyze_email(SAMPLE.as_bytes(), &metadata, &crate::extract::RfcEmailParser, &provider)
                .await
                .unwrap();
        assert_eq!(analysis.communication_pattern, CommunicationPattern::Escalating);
        assert_eq!(analysis.sentiment_progression.len(), 3);
        assert_eq!(analysis.escalation_events[0].message_position, 2);
    }
}
