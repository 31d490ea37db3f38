//! Runtime-selected [`AiProvider`] for the CLI binary.
//!
//! `AiProvider`'s methods are generic over the response type, so the trait is
//! not object-safe and cannot be boxed as `dyn AiProvider` (§4.3 ambient
//! note). The CLI nonetheless needs to pick a backend at runtime from
//! [`crate::config::AiBackend`], so this enum does the one-time dispatch: it
//! implements `AiProvider` itself, matching on its variant in each call and
//! delegating to the concrete provider.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::ai::mock::MockAiProvider;
use crate::ai::openai::OpenAiProvider;
use crate::ai::retry::RetryProvider;
use crate::ai::{AiProvider, ImageInput};
use crate::error::Error;

pub enum AnyProvider {
    OpenAi(RetryProvider<OpenAiProvider>),
    Mock(RetryProvider<MockAiProvider>),
}

#[async_trait]
impl AiProvider for AnyProvider {
    async fn generate_structured<T>(&self, prompt: &str, schema_name: &str) -> Result<T, Error>
    where
        T: DeserializeOwned + Send,
    {
        match self {
            AnyProvider::OpenAi(p) => p.generate_structured(prompt, schema_name).await,
            AnyProvider::Mock(p) => p.generate_structured(prompt, schema_name).await,
        }
    }

    async fn generate_vision<T>(
        &self,
        prompt: &str,
        image: ImageInput<'_>,
        schema_name: &str,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned + Send,
    {
        match self {
            AnyProvider::OpenAi(p) => p.generate_vision(prompt, image, schema_name).await,
            AnyProvider::Mock(p) => p.generate_vision(prompt, image, schema_name).await,
        }
    }
}
