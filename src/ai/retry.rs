//! Retry wrapper around any [`AiProvider`]. Only errors
//! `Error::is_retryable()` marks as transient (timeouts, rate limits) are
//! retried; everything else (refusals, schema mismatches, missing config)
//! fails on the first attempt.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::time::sleep;

use crate::ai::{AiProvider, ImageInput};
use crate::config::RetryConfig;
use crate::error::Error;

pub struct RetryProvider<P> {
    inner: P,
    config: RetryConfig,
}

impl<P> RetryProvider<P> {
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<P: AiProvider> AiProvider for RetryProvider<P> {
    async fn generate_structured<T>(&self, prompt: &str, schema_name: &str) -> Result<T, Error>
    where
        T: DeserializeOwned + Send,
    {
        let mut last_error = None;
        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                let delay = self.config.delay_for_attempt(attempt);
                tracing::debug!(attempt, ?delay, schema_name, "retrying AI call");
                sleep(delay).await;
            }
            match self.inner.generate_structured(prompt, schema_name).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(attempt, schema_name, error = %e, "AI call failed, will retry");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or(Error::AiIncomplete("retry attempts exhausted".to_string())))
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
        let mut last_error = None;
        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                let delay = self.config.delay_for_attempt(attempt);
                tracing::debug!(attempt, ?delay, schema_name, "retrying AI vision call");
                sleep(delay).await;
            }
            let image = ImageInput { bytes: image.bytes, mime: image.mime };
            match self.inner.generate_vision(prompt, image, schema_name).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(attempt, schema_name, error = %e, "AI vision call failed, will retry");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or(Error::AiIncomplete("retry attempts exhausted".to_string())))
    }
}
