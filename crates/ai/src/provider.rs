use std::time::Duration;

use serde::Serialize;

use crate::result::{InferenceError, InferenceRequest, InferenceResult};

/// A black-box inference capability.
///
/// Implementations turn case text/images (plus optional retrieval context) into a
/// normalized [`InferenceResult`] or a typed [`InferenceError`]. They must not
/// touch job state; the pipeline decides what a failure means.
#[async_trait::async_trait]
pub trait InferenceProvider: Send + Sync + 'static {
    async fn infer(&self, request: &InferenceRequest) -> Result<InferenceResult, InferenceError>;
}

/// Reachability check for providers that live out of process.
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync + 'static {
    async fn health(&self) -> ProviderHealth;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderHealth {
    pub reachable: bool,
    pub detail: serde_json::Value,
}

/// Which provider the process was configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Mock,
    Remote,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Mock => "mock",
            ProviderKind::Remote => "remote",
        }
    }
}

impl core::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(ProviderKind::Mock),
            "remote" | "external" => Ok(ProviderKind::Remote),
            other => Err(format!("unknown inference provider: {other}")),
        }
    }
}

/// Inference configuration, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceSettings {
    pub provider: ProviderKind,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            base_url: "http://127.0.0.1:9000".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_accepts_aliases() {
        assert_eq!("MOCK".parse::<ProviderKind>().unwrap(), ProviderKind::Mock);
        assert_eq!("external".parse::<ProviderKind>().unwrap(), ProviderKind::Remote);
        assert!("gpu".parse::<ProviderKind>().is_err());
    }
}
