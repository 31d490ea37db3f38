//! Deterministic fake [`AiProvider`], used by default (§4.10 `Config`
//! defaults to `AiBackend::Mock`) and throughout the test suite so pipeline
//! behavior can be asserted without network access. Fixtures are keyed by
//! schema name so each analyzer call site can be given its own
//! deterministic answer.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ai::{extract_json, AiProvider, ImageInput};
use crate::error::Error;

/// A fixture-driven fake. Lookup is by `schema_name`; when no fixture is
/// registered for a name the call fails with `AiIncomplete`, mirroring how a
/// real provider failing schema validation would be reported.
pub struct MockAiProvider {
    fixtures: HashMap<String, Value>,
    calls: Mutex<Vec<String>>,
}

impl MockAiProvider {
    pub fn empty() -> Self {
        Self { fixtures: HashMap::new(), calls: Mutex::new(Vec::new()) }
    }

    pub fn with_fixture(mut self, schema_name: impl Into<String>, value: Value) -> Self {
        self.fixtures.insert(schema_name.into(), value);
        self
    }

    /// Schema names requested so far, in call order. Useful for asserting an
    /// analyzer invoked the AI provider the expected number of times.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock call log poisoned").clone()
    }

    fn resolve<T: DeserializeOwned>(&self, schema_name: &str) -> Result<T, Error> {
        self.calls.lock().expect("mock call log poisoned").push(schema_name.to_string());
        let value = self
            .fixtures
            .get(schema_name)
            .ok_or_else(|| Error::AiIncomplete(format!("no mock fixture registered for {schema_name}")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| Error::AiIncomplete(format!("fixture for {schema_name} does not match schema: {e}")))
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate_structured<T>(&self, _prompt: &str, schema_name: &str) -> Result<T, Error>
    where
        T: DeserializeOwned + Send,
    {
        self.resolve(schema_name)
    }

    async fn generate_vision<T>(
        &self,
        _prompt: &str,
        _image: ImageInput<'_>,
        schema_name: &str,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned + Send,
    {
        self.resolve(schema_name)
    }
}

/// Extracts JSON from free-text fixtures registered as raw strings, exposed
/// for providers/tests that build fixtures from prose rather than `json!`.
pub fn parse_fixture_text<T: DeserializeOwned>(text: &str) -> Result<T, Error> {
    serde_json::from_str(extract_json(text)).map_err(|e| Error::AiIncomplete(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[tokio::test]
    async fn resolves_a_registered_fixture() {
        let mock = MockAiProvider::empty().with_fixture("sample", serde_json::json!({"value": 9}));
        let result: Sample = mock.generate_structured("prompt", "sample").await.unwrap();
        assert_eq!(result, Sample { value: 9 });
        assert_eq!(mock.calls(), vec!["sample".to_string()]);
    }

    #[tokio::test]
    async fn missing_fixture_is_an_incomplete_error() {
        let mock = MockAiProvider::empty();
        let result: Result<Sample, Error> = mock.generate_structured("prompt", "sample").await;
        assert!(matches!(result, Err(Error::AiIncomplete(_))));
    }
}
