//! HTTP-backed `AiProvider` against an OpenAI-compatible chat-completions
//! endpoint, with a vision variant (image content blocks) alongside the
//! plain structured-generation call.

use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ai::{extract_json, AiProvider, ImageInput};
use crate::error::Error;

pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
    timeout: std::time::Duration,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, Error> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.0,
            response_format: ResponseFormat { format_type: "json_object".to_string() },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(std::time::Duration::from_secs);
            return Err(Error::AiRateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AiRefusal(format!("provider returned {status}: {body}")));
        }

        let parsed: ChatResponse = response.json().await.map_err(map_reqwest_error)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::AiIncomplete("provider returned no choices".to_string()))
    }

    fn decode<T: DeserializeOwned>(text: &str, schema_name: &str) -> Result<T, Error> {
        serde_json::from_str(extract_json(&text))
            .map_err(|e| Error::AiIncomplete(format!("response did not match {schema_name} schema: {e}")))
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn generate_structured<T>(&self, prompt: &str, schema_name: &str) -> Result<T, Error>
    where
        T: DeserializeOwned + Send,
    {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: vec![ContentPart::Text { text: prompt.to_string() }],
        }];
        let text = self.chat(messages).await?;
        Self::decode(&text, schema_name)
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
        let encoded = base64::engine::general_purpose::STANDARD.encode(image.bytes);
        let data_url = format!("data:{};base64,{}", image.mime, encoded);
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: vec![
                ContentPart::Text { text: prompt.to_string() },
                ContentPart::ImageUrl { image_url: ImageUrl { url: data_url } },
            ],
        }];
        let text = self.chat(messages).await?;
        Self::decode(&text, schema_name)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::AiTimeout(std::time::Duration::from_secs(0))
    } else {
        Error::AiIncomplete(format!("HTTP transport error: {e}"))
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Deserialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_strips_markdown_fences_before_parsing() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Sample {
            value: u32,
        }
        let text = "```json\n{\"value\": 3}\n```";
        let decoded: Sample = OpenAiProvider::decode(text, "sample").unwrap();
        assert_eq!(decoded, Sample { value: 3 });
    }
}
