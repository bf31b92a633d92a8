//! HTTP-backed generation and evaluation.
//!
//! The backend exposes one endpoint per capability: `generate-report`
//! returns an artifact handle, `evaluate-report` returns a 0–100 score for
//! a handle. Both sit behind the same function gateway as the session
//! endpoints.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::errors::EngineError;
use crate::generation::{Evaluator, GenerationEngine, GenerationRequest};

pub struct HttpGenerationBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    artifact_id: String,
}

#[derive(Debug, Deserialize)]
struct EvaluateResponse {
    score: u8,
}

impl HttpGenerationBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/functions/v1/{}",
            self.base_url.trim_end_matches('/'),
            name
        )
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        name: &str,
        session_id: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<T, EngineError> {
        let mut request = self.client.post(self.endpoint(name)).json(body);
        if let Some(id) = session_id {
            request = request.header("x-session-id", id);
        }
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| EngineError(format!("{name}: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError(format!("{name}: HTTP {status}: {message}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| EngineError(format!("{name}: malformed response: {err}")))
    }
}

#[async_trait]
impl GenerationEngine for HttpGenerationBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, EngineError> {
        let body = serde_json::json!({
            "sessionId": request.session_id,
            "engine": request.engine.as_str(),
            "templateId": request.template_id,
            "mappingId": request.mapping_id,
            "longTextStrategy": request.long_text_strategy,
        });
        let response: GenerateResponse = self
            .post_json("generate-report", Some(&request.session_id), &body)
            .await?;
        Ok(response.artifact_id)
    }
}

#[async_trait]
impl Evaluator for HttpGenerationBackend {
    async fn evaluate(&self, artifact_id: &str) -> Result<u8, EngineError> {
        let body = serde_json::json!({ "artifactId": artifact_id });
        let response: EvaluateResponse =
            self.post_json("evaluate-report", None, &body).await?;
        Ok(response.score)
    }
}
