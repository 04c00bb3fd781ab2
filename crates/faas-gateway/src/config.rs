//! Deployment parameters (§6), loaded from the environment.

use std::time::Duration;

use faas_common::{FaasError, Result};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_seconds(key: &str, default_secs: u64) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .map_err(|_| FaasError::Validation(format!("{key} must be an integer number of seconds, got {raw}")))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}

/// Everything the gateway and reaper need at startup, read once from the
/// environment (optionally populated by a `.env` file via `dotenvy`).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub artifact_root: String,
    pub idle_threshold: Duration,
    pub sweep_interval: Duration,
    pub health_probe_timeout: Duration,
    pub url_resolution_timeout: Duration,
    pub database_url: String,
    pub listen_addr: String,
}

impl GatewayConfig {
    /// Reads every parameter from the process environment. `DATABASE_URL`
    /// and `ARTIFACT_ROOT` have no default: a missing value is a
    /// `Validation` failure rather than a silent fallback to a path that may
    /// not exist on the host.
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            FaasError::Validation("DATABASE_URL must be set".to_string())
        })?;
        let artifact_root = std::env::var("ARTIFACT_ROOT").map_err(|_| {
            FaasError::Validation("ARTIFACT_ROOT must be set".to_string())
        })?;

        Ok(Self {
            artifact_root,
            idle_threshold: parse_seconds("IDLE_THRESHOLD_SECS", 300)?,
            sweep_interval: parse_seconds("SWEEP_INTERVAL_SECS", 60)?,
            health_probe_timeout: parse_seconds("HEALTH_PROBE_TIMEOUT_SECS", 30)?,
            url_resolution_timeout: parse_seconds("URL_RESOLUTION_TIMEOUT_SECS", 5)?,
            database_url,
            listen_addr: env_or("LISTEN_ADDR", "0.0.0.0:8080"),
        })
    }
}
