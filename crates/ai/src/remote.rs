//! HTTP client for an external inference service.
//!
//! Contract: `POST {base}/infer` with `{case_id, notes, images, context}` and a JSON
//! body carrying at least `findings: [..]`; `GET {base}/health` for reachability.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::provider::{HealthCheck, InferenceProvider, ProviderHealth};
use crate::result::{InferenceError, InferenceRequest, InferenceResult};

const USER_AGENT: &str = concat!("caseflow/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct InferBody<'a> {
    case_id: String,
    notes: Option<&'a str>,
    images: Vec<&'a str>,
    context: Option<&'a str>,
}

/// Provider backed by a remote inference service.
#[derive(Debug, Clone)]
pub struct RemoteInferenceProvider {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RemoteInferenceProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InferenceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn normalize(&self, request: &InferenceRequest, data: JsonValue) -> Result<InferenceResult, InferenceError> {
        let findings = match data.get("findings") {
            None | Some(JsonValue::Null) => Vec::new(),
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(_) => return Err(InferenceError::InvalidFindings),
        };

        let text = |key: &str| {
            data.get(key)
                .and_then(JsonValue::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(InferenceResult {
            case_id: text("case_id").unwrap_or_else(|| request.case_id.to_string()),
            summary: text("summary").unwrap_or_default(),
            findings,
            confidence: data.get("confidence").and_then(JsonValue::as_f64).unwrap_or(0.0),
            run_mode: text("run_mode").unwrap_or_else(|| "remote".to_string()),
            model_source: text("model_source").unwrap_or_else(|| self.base_url.clone()),
            generated_token_count: data
                .get("generated_token_count")
                .and_then(JsonValue::as_u64)
                .unwrap_or(0),
            used_fallback: data
                .get("used_fallback")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false),
            raw_text: text("raw_text"),
            raw_text_with_markup: text("raw_text_with_markup"),
        })
    }
}

#[async_trait::async_trait]
impl InferenceProvider for RemoteInferenceProvider {
    async fn infer(&self, request: &InferenceRequest) -> Result<InferenceResult, InferenceError> {
        let body = InferBody {
            case_id: request.case_id.to_string(),
            notes: request.notes_text(),
            images: request.images.iter().map(|i| i.locator.as_str()).collect(),
            context: request.context.as_deref(),
        };

        tracing::debug!(
            case_id = %request.case_id,
            images = body.images.len(),
            has_context = body.context.is_some(),
            "calling remote inference"
        );

        let response = self
            .http_client
            .post(format!("{}/infer", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout(self.timeout)
                } else {
                    InferenceError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| InferenceError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(InferenceError::HttpStatus {
                status: status.as_u16(),
                body: raw.chars().take(200).collect(),
            });
        }

        let data: JsonValue =
            serde_json::from_str(&raw).map_err(|e| InferenceError::InvalidJson(e.to_string()))?;
        if !data.is_object() {
            return Err(InferenceError::InvalidJson("expected a json object".to_string()));
        }

        self.normalize(request, data)
    }
}

#[async_trait::async_trait]
impl HealthCheck for RemoteInferenceProvider {
    async fn health(&self) -> ProviderHealth {
        let url = format!("{}/health", self.base_url);
        match self.http_client.get(&url).send().await {
            Ok(resp) => {
                let body = resp.text().await.unwrap_or_default();
                let detail = if body.is_empty() {
                    JsonValue::String(String::new())
                } else {
                    serde_json::from_str(&body)
                        .unwrap_or_else(|_| JsonValue::String("non_json_response".to_string()))
                };
                ProviderHealth {
                    reachable: true,
                    detail,
                }
            }
            Err(e) => ProviderHealth {
                reachable: false,
                detail: serde_json::json!({ "error": e.to_string() }),
            },
        }
    }
}
