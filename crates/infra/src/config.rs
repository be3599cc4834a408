//! Process configuration, read once from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use caseflow_ai::{InferenceSettings, ProviderKind, DEFAULT_TOP_K};
use caseflow_observability::LogFormat;

use crate::pipeline::PipelineSettings;

pub const DEFAULT_API_KEY: &str = "dev-local-key";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `None` runs every store in memory.
    pub database_url: Option<String>,
    pub artifact_dir: PathBuf,
    pub api_key: String,
    pub bind_addr: SocketAddr,
    pub inference: InferenceSettings,
    pub poll_interval: Duration,
    pub pipeline: PipelineSettings,
    pub log_format: LogFormat,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match get("INFERENCE_PROVIDER") {
            Some(value) => value.parse::<ProviderKind>().map_err(|_| ConfigError::Invalid {
                key: "INFERENCE_PROVIDER",
                value,
            })?,
            None => ProviderKind::Mock,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            artifact_dir: get("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/artifacts")),
            api_key: get("API_KEY").unwrap_or_else(|| DEFAULT_API_KEY.to_string()),
            bind_addr: parse_or(get("BIND_ADDR"), "BIND_ADDR", || {
                SocketAddr::from(([0, 0, 0, 0], 8080))
            })?,
            inference: InferenceSettings {
                provider,
                base_url: get("INFERENCE_BASE_URL")
                    .unwrap_or_else(|| InferenceSettings::default().base_url),
                timeout: Duration::from_secs(parse_or(
                    get("INFERENCE_TIMEOUT_SECONDS"),
                    "INFERENCE_TIMEOUT_SECONDS",
                    || 30,
                )?),
            },
            poll_interval: Duration::from_secs(parse_or(
                get("WORKER_POLL_SECONDS"),
                "WORKER_POLL_SECONDS",
                || 2,
            )?),
            pipeline: PipelineSettings {
                retrieval_top_k: parse_or(get("RETRIEVAL_TOP_K"), "RETRIEVAL_TOP_K", || DEFAULT_TOP_K)?,
                downgrade_blocked: parse_bool(get("QC_DOWNGRADE_BLOCKED"), "QC_DOWNGRADE_BLOCKED")?,
            },
            log_format: parse_or(get("LOG_FORMAT"), "LOG_FORMAT", LogFormat::default)?,
        })
    }
}

fn parse_or<T, D>(raw: Option<String>, key: &'static str, default: D) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    D: FnOnce() -> T,
{
    match raw {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default()),
    }
}

fn parse_bool(raw: Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::Invalid {
            key,
            value: raw.unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_run_in_memory_with_the_mock() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.database_url, None);
        assert_eq!(s.inference.provider, ProviderKind::Mock);
        assert_eq!(s.inference.timeout, Duration::from_secs(30));
        assert_eq!(s.poll_interval, Duration::from_secs(2));
        assert_eq!(s.pipeline, PipelineSettings::default());
        assert_eq!(s.bind_addr.port(), 8080);
        assert_eq!(s.api_key, "dev-local-key");
        assert_eq!(s.log_format, LogFormat::Json);
    }

    #[test]
    fn reads_overrides() {
        let s = settings(&[
            ("INFERENCE_PROVIDER", "external"),
            ("INFERENCE_BASE_URL", "http://infer:9000"),
            ("INFERENCE_TIMEOUT_SECONDS", "5"),
            ("QC_DOWNGRADE_BLOCKED", "TRUE"),
            ("RETRIEVAL_TOP_K", "7"),
            ("DATABASE_URL", "postgres://localhost/caseflow"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();
        assert_eq!(s.inference.provider, ProviderKind::Remote);
        assert_eq!(s.inference.base_url, "http://infer:9000");
        assert_eq!(s.inference.timeout, Duration::from_secs(5));
        assert!(s.pipeline.downgrade_blocked);
        assert_eq!(s.pipeline.retrieval_top_k, 7);
        assert!(s.database_url.is_some());
        assert_eq!(s.log_format, LogFormat::Pretty);
    }

    #[test]
    fn rejects_malformed_values() {
        assert_eq!(
            settings(&[("WORKER_POLL_SECONDS", "soon")]).unwrap_err(),
            ConfigError::Invalid {
                key: "WORKER_POLL_SECONDS",
                value: "soon".into()
            }
        );
        assert!(settings(&[("QC_DOWNGRADE_BLOCKED", "maybe")]).is_err());
        assert!(settings(&[("INFERENCE_PROVIDER", "gpu")]).is_err());
        assert!(settings(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
