//! Document analyzer (§4.4).
//!
//! A pure function over extracted text: delegates to the AI port with a
//! domain prompt and decodes the response as [`DocumentAnalysis`]. If the
//! extractor reports `ExtractorUnsupported` or returns only whitespace, the
//! caller (the orchestrator) re-routes the evidence to the image analyzer
//! rather than this function retrying anything itself.

use crate::ai::prompts;
use crate::ai::AiProvider;
use crate::error::Error;
use crate::extract::TextExtractor;
use crate::models::analysis::DocumentAnalysis;
use crate::models::evidence::FileMetadata;

/// Extracts text via `extractor`, then asks `provider` for a structured
/// [`DocumentAnalysis`]. Confidences are rounded to 4 decimals before
/// returning, satisfying the serialization discipline at the analyzer
/// boundary rather than leaving it to the caller.
pub async fn analyze_document<P: AiProvider>(
    bytes: &[u8],
    metadata: &FileMetadata,
    extractor: &dyn TextExtractor,
    provider: &P,
) -> Result<DocumentAnalysis, Error> {
    let text = extractor.extract_text(bytes, &metadata.mime).await?;

    let system_prompt = prompts::document_analysis_system_prompt();
    let user_context = prompts::document_analysis_user_context(&text, metadata);
    let prompt = format!("{system_prompt}\n\n{user_context}");

    let mut analysis: DocumentAnalysis =
        provider.generate_structured(&prompt, "document_analysis").await?;
    analysis.validate()?;
    analysis.round_confidences();
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockAiProvider;
    use crate::extract::PlainTextExtractor;
    use crate::models::analysis::{DocumentType, Sentiment};
    use crate::models::evidence::LegalSignificance;

    fn sample_metadata() -> FileMetadata {
        FileMetadata {
            filename: "complaint.txt".into(),
            byte_size: 42,
            mime: "text/plain".into(),
            created: chrono::Utc::now(),
            modified: chrono::Utc::now(),
            extension: "txt".into(),
            sha256: "a".repeat(64),
        }
    }

    fn fixture() -> serde_json::Value {
        serde_json::json!({
            "summary": "Employee complaint about retaliation.",
            "entities": [{
                "name": "Jane Doe",
                "type": "person",
                "confidence": 0.95,
                "context": "complainant",
                "relationship": null,
                "quoted_text": null,
                "associated_event": null
            }],
            "document_type": "letter",
            "sentiment": "hostile",
            "legal_significance": "high",
            "risk_flags": ["retaliation"],
            "confidence_overall": 0.9123456
        })
    }

    #[tokio::test]
    async fn analyzes_extracted_text_and_rounds_confidences() {
        let provider = MockAiProvider::empty().with_fixture("document_analysis", fixture());
        let metadata = sample_metadata();
        let analysis = analyze_document(b"I was retaliated against.", &metadata, &PlainTextExtractor, &provider)
            .await
            .unwrap();
        assert_eq!(analysis.document_type, DocumentType::Letter);
        assert_eq!(analysis.sentiment, Sentiment::Hostile);
        assert_eq!(analysis.legal_significance, LegalSignificance::High);
        assert_eq!(analysis.confidence_overall, 0.9123);
    }

    #[tokio::test]
    async fn unsupported_extraction_surfaces_as_an_error() {
        let provider = MockAiProvider::empty();
        let mut metadata = sample_metadata();
        metadata.mime = "application/pdf".to_string();
        let result = analyze_document(b"%PDF-1.4", &metadata, &PlainTextExtractor, &provider).await;
        assert!(matches!(result, Err(Error::ExtractorUnsupported(_))));
    }
}
