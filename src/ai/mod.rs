//! AI provider port (C3, §4.3).
//!
//! The pipeline never talks to a concrete AI SDK directly: every analyzer
//! and the pattern detector/summary aggregator go through this trait, so a
//! deterministic [`mock::MockAiProvider`] can stand in during tests without
//! conditional compilation anywhere else. The trait exposes exactly two
//! operations — structured JSON generation and a vision variant for image
//! analysis — rather than a broader free-text/streaming surface.

pub mod any;
pub mod mock;
pub mod openai;
pub mod prompts;
pub mod retry;

pub use any::AnyProvider;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// A single image to be analyzed, as raw bytes plus its declared MIME type.
pub struct ImageInput<'a> {
    pub bytes: &'a [u8],
    pub mime: &'a str,
}

/// Port to an AI backend capable of returning schema-constrained JSON.
///
/// Implementations must map provider-specific failure modes onto
/// [`Error`]'s AI variants so the retry wrapper and the orchestrator's
/// per-item error handling stay provider-agnostic.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Sends `prompt` and decodes the response as `T`. `schema_name` is
    /// included in provider requests that support named JSON schemas
    /// (currently informational for the mock and OpenAI chat-completions
    /// implementations) and in error messages.
    async fn generate_structured<T>(&self, prompt: &str, schema_name: &str) -> Result<T, Error>
    where
        T: DeserializeOwned + Send;

    /// Sends `prompt` alongside an image and decodes the response as `T`.
    async fn generate_vision<T>(
        &self,
        prompt: &str,
        image: ImageInput<'_>,
        schema_name: &str,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned + Send;
}

/// Extracts the first top-level JSON object or array from `text`, for
/// providers that wrap structured output in prose or markdown fences.
pub(crate) fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let fenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end_matches("```").trim())
        .unwrap_or(trimmed);

    let start = fenced.find(['{', '[']);
    let Some(start) = start else { return fenced };
    let opening = fenced.as_bytes()[start];
    let closing = if opening == b'{' { b'}' } else { b']' };
    match fenced.rfind(closing as char) {
        Some(end) if end >= start => &fenced[start..=end],
        _ => fenced,
    }
}
