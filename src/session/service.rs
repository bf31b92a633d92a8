//! Remote-backed session accessor.
//!
//! The backend owns the canonical session (id, `current_step`, chat history);
//! this module fetches it, applies strategy updates and clones prior
//! mappings. Every remote failure — transport, non-2xx, or a 2xx body with
//! `success: false` — comes back as a [`ServiceError`] value so the
//! orchestrator can render it without per-call exception handling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::session::state::LongTextStrategy;
use crate::workflow::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// The canonical, backend-owned session record. Its `current_step` is the
/// source of truth whenever the client's optimistic step diverges.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSession {
    pub id: String,
    pub current_step: Step,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Mapping metadata the backend returns alongside the session, used to
/// decide whether a prior mapping is reusable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteMapping {
    #[serde(default)]
    pub template_path: Option<String>,
    #[serde(default)]
    pub mapping_json: Option<serde_json::Value>,
    #[serde(default)]
    pub long_text_strategy: Option<LongTextStrategy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub session: Option<RemoteSession>,
    #[serde(default)]
    pub mapping: Option<RemoteMapping>,
}

/// Result of cloning a prior mapping into the current session. A carried
/// `has_fetched_data` lets the workflow skip the fetch checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyMappingResult {
    pub has_fetched_data: bool,
}

/// Capability interface to the session backend.
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, ServiceError>;

    async fn update_long_text_strategy(
        &self,
        session_id: &str,
        strategy: LongTextStrategy,
    ) -> Result<(), ServiceError>;

    async fn copy_mapping(
        &self,
        session_id: &str,
        source_mapping_id: &str,
    ) -> Result<CopyMappingResult, ServiceError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AckResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CopyMappingResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    has_fetched_data: bool,
}

/// HTTP implementation of [`SessionApi`].
pub struct SessionService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SessionService {
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
        session_id: &str,
        body: &serde_json::Value,
    ) -> Result<T, ServiceError> {
        let url = self.endpoint(name);
        let mut request = self
            .client
            .post(&url)
            .header("x-session-id", session_id)
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|err| ServiceError::Transport {
            endpoint: name.to_string(),
            message: err.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                endpoint: name.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| ServiceError::Malformed {
                endpoint: name.to_string(),
                message: err.to_string(),
            })
    }
}

#[async_trait]
impl SessionApi for SessionService {
    async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, ServiceError> {
        self.post_json("get-session", session_id, &serde_json::json!({}))
            .await
    }

    async fn update_long_text_strategy(
        &self,
        session_id: &str,
        strategy: LongTextStrategy,
    ) -> Result<(), ServiceError> {
        let body = serde_json::json!({
            "action": "update_strategy",
            "long_text_strategy": strategy,
        });
        let ack: AckResponse = self.post_json("get-session", session_id, &body).await?;
        if ack.success {
            Ok(())
        } else {
            Err(ServiceError::Backend {
                endpoint: "get-session".to_string(),
                message: ack
                    .error
                    .unwrap_or_else(|| "strategy update rejected".to_string()),
            })
        }
    }

    async fn copy_mapping(
        &self,
        session_id: &str,
        source_mapping_id: &str,
    ) -> Result<CopyMappingResult, ServiceError> {
        let body = serde_json::json!({ "sourceMappingId": source_mapping_id });
        let response: CopyMappingResponse =
            self.post_json("copy-mapping", session_id, &body).await?;
        if response.success {
            Ok(CopyMappingResult {
                has_fetched_data: response.has_fetched_data,
            })
        } else {
            Err(ServiceError::Backend {
                endpoint: "copy-mapping".to_string(),
                message: response
                    .error
                    .unwrap_or_else(|| "mapping copy rejected".to_string()),
            })
        }
    }
}
