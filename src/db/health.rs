//! Health reporting for the SurrealDB client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which endpoint a health check hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckMethod {
    /// `GET /health`, no payload
    Simple,
    /// `GET /version`, reports the server version
    Version,
    /// Timed `GET /version`
    Detailed,
}

/// Tuning for [`SurrealClient`](super::SurrealClient) health checks
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    pub enabled: bool,
    pub method: HealthCheckMethod,
    /// Per-request timeout for health endpoints, independent of the
    /// client's query timeout
    pub timeout: Duration,
    pub enable_retries: bool,
    /// Attempts after the first one
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Fall back to `/health` once when `/version` fails
    pub enable_fallback: bool,
    /// Answers slower than this count as degraded
    pub degraded_threshold_ms: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            method: HealthCheckMethod::Version,
            timeout: Duration::from_secs(5),
            enable_retries: true,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            enable_fallback: true,
            degraded_threshold_ms: 1000,
        }
    }
}

/// Outcome class of a health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    /// Answered, but above the degraded threshold
    Degraded,
    /// No answer or an error answer
    Unhealthy,
}

impl HealthStatus {
    /// Status code a readiness endpoint should report
    pub fn to_http_status_code(&self) -> u16 {
        if self.is_operational() {
            200
        } else {
            503
        }
    }

    /// Whether the server can take traffic
    pub fn is_operational(&self) -> bool {
        !matches!(self, HealthStatus::Unhealthy)
    }
}

/// How a [`HealthCheckResult`] was obtained
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckMetadata {
    pub check_method: HealthCheckMethod,
    pub was_retry: bool,
    pub retry_count: u32,
    pub used_fallback: bool,
}

/// Report of one health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub response_time_ms: u64,
    /// Reported by `/version` checks
    pub server_version: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
    pub metadata: HealthCheckMetadata,
}

impl HealthCheckResult {
    fn new(
        status: HealthStatus,
        elapsed: Duration,
        method: HealthCheckMethod,
        server_version: Option<String>,
        error: Option<String>,
    ) -> Self {
        Self {
            status,
            response_time_ms: elapsed.as_millis() as u64,
            server_version,
            timestamp: Utc::now(),
            error,
            metadata: HealthCheckMetadata {
                check_method: method,
                was_retry: false,
                retry_count: 0,
                used_fallback: false,
            },
        }
    }

    /// A check that got an answer; slow answers are degraded
    pub(crate) fn answered(
        elapsed: Duration,
        method: HealthCheckMethod,
        server_version: Option<String>,
        degraded_threshold_ms: u64,
    ) -> Self {
        let status = if elapsed.as_millis() as u64 > degraded_threshold_ms {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        Self::new(status, elapsed, method, server_version, None)
    }

    pub(crate) fn failed(elapsed: Duration, method: HealthCheckMethod, error: String) -> Self {
        Self::new(HealthStatus::Unhealthy, elapsed, method, None, Some(error))
    }

    pub(crate) fn after_attempts(mut self, retry_count: u32, used_fallback: bool) -> Self {
        self.metadata = HealthCheckMetadata {
            retry_count,
            was_retry: retry_count > 0,
            used_fallback,
            ..self.metadata
        };
        self
    }
}
