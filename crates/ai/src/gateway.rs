//! Single entry point the pipeline uses to reach whichever provider is configured.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::mock::MockInferenceProvider;
use crate::provider::{HealthCheck, InferenceProvider, InferenceSettings, ProviderHealth, ProviderKind};
use crate::remote::RemoteInferenceProvider;
use crate::result::{InferenceError, InferenceRequest, InferenceResult};

/// Answer to a gateway ping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayPing {
    pub provider: &'static str,
    pub reachable: bool,
    pub detail: serde_json::Value,
}

/// Bounded, provider-agnostic inference calls.
///
/// The gateway enforces the modality precondition and the configured timeout
/// regardless of what the provider itself does.
#[derive(Clone)]
pub struct InferenceGateway {
    provider: Arc<dyn InferenceProvider>,
    health_check: Option<Arc<dyn HealthCheck>>,
    kind: ProviderKind,
    timeout: Duration,
}

impl std::fmt::Debug for InferenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceGateway")
            .field("kind", &self.kind)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl InferenceGateway {
    pub fn new(provider: Arc<dyn InferenceProvider>, kind: ProviderKind, timeout: Duration) -> Self {
        Self {
            provider,
            health_check: None,
            kind,
            timeout,
        }
    }

    /// Attach a reachability check used by [`ping`](Self::ping).
    pub fn with_health_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.health_check = Some(check);
        self
    }

    /// Deterministic mock gateway with the default timeout.
    pub fn mock() -> Self {
        Self::new(
            Arc::new(MockInferenceProvider::new()),
            ProviderKind::Mock,
            InferenceSettings::default().timeout,
        )
    }

    pub fn from_settings(settings: &InferenceSettings) -> Result<Self, InferenceError> {
        match settings.provider {
            ProviderKind::Mock => Ok(Self::new(
                Arc::new(MockInferenceProvider::new()),
                ProviderKind::Mock,
                settings.timeout,
            )),
            ProviderKind::Remote => {
                let remote = Arc::new(RemoteInferenceProvider::new(
                    settings.base_url.clone(),
                    settings.timeout,
                )?);
                Ok(Self::new(remote.clone(), ProviderKind::Remote, settings.timeout)
                    .with_health_check(remote))
            }
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub async fn invoke(&self, request: &InferenceRequest) -> Result<InferenceResult, InferenceError> {
        if !request.has_modalities() {
            return Err(InferenceError::MissingModalities);
        }

        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.timeout, self.provider.infer(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(InferenceError::Timeout(self.timeout)),
        };

        match &outcome {
            Ok(result) => tracing::info!(
                case_id = %request.case_id,
                provider = self.kind.as_str(),
                findings = result.findings.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "inference completed"
            ),
            Err(err) => tracing::warn!(
                case_id = %request.case_id,
                provider = self.kind.as_str(),
                code = err.code(),
                error = %err,
                "inference failed"
            ),
        }

        outcome
    }

    /// In-process providers without a health check are always ready.
    pub async fn ping(&self) -> GatewayPing {
        let ProviderHealth { reachable, detail } = match &self.health_check {
            Some(check) => check.health().await,
            None => ProviderHealth {
                reachable: true,
                detail: serde_json::json!({ "status": "ready" }),
            },
        };
        GatewayPing {
            provider: self.kind.as_str(),
            reachable,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use caseflow_core::CaseId;

    use super::*;

    struct SlowProvider;

    #[async_trait::async_trait]
    impl InferenceProvider for SlowProvider {
        async fn infer(&self, _request: &InferenceRequest) -> Result<InferenceResult, InferenceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(InferenceError::Unreachable("never".into()))
        }
    }

    #[tokio::test]
    async fn rejects_requests_without_modalities() {
        let gateway = InferenceGateway::mock();
        let err = gateway
            .invoke(&InferenceRequest::new(CaseId::new()).with_notes("  "))
            .await
            .unwrap_err();
        assert_eq!(err, InferenceError::MissingModalities);
    }

    #[tokio::test(start_paused = true)]
    async fn enforces_the_timeout() {
        let gateway = InferenceGateway::new(
            Arc::new(SlowProvider),
            ProviderKind::Remote,
            Duration::from_secs(2),
        );
        let err = gateway
            .invoke(&InferenceRequest::new(CaseId::new()).with_notes("notes"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "inference_timeout");
    }

    #[tokio::test]
    async fn mock_ping_is_ready() {
        let ping = InferenceGateway::mock().ping().await;
        assert_eq!(ping.provider, "mock");
        assert!(ping.reachable);
    }

    #[test]
    fn builds_remote_gateway_from_settings() {
        let settings = InferenceSettings {
            provider: ProviderKind::Remote,
            ..InferenceSettings::default()
        };
        let gateway = InferenceGateway::from_settings(&settings).unwrap();
        assert_eq!(gateway.kind(), ProviderKind::Remote);
    }
}
