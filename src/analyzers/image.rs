//! Image analyzer (§4.4).
//!
//! A pure function that hands the raw image bytes to the AI port's vision
//! operation, returning a structured [`ImageAnalysis`]. Also the fallback
//! target when the document analyzer's text extractor reports
//! `ExtractorUnsupported` (non-text-bearing PDFs are re-typed to `image` by
//! the orchestrator, not by this function).

use crate::ai::{prompts, AiProvider, ImageInput};
use crate::error::Error;
use crate::models::analysis::ImageAnalysis;
use crate::models::evidence::FileMetadata;

pub async fn analyze_image<P: AiProvider>(
    bytes: &[u8],
    metadata: &FileMetadata,
    provider: &P,
) -> Result<ImageAnalysis, Error> {
    let system_prompt = prompts::image_analysis_system_prompt();
    let user_prompt = prompts::image_analysis_user_prompt(metadata);
    let prompt = format!("{system_prompt}\n\n{user_prompt}");

    let image = ImageInput { bytes, mime: &metadata.mime };
    let mut analysis: ImageAnalysis =
        provider.generate_vision(&prompt, image, "image_analysis").await?;
    analysis.validate()?;
    analysis.round_confidences();
    Ok(analysis)
}
