//! SurrealDB over HTTP
//!
//! [`SurrealClient`] implements [`DocumentStore`] with the `/key` endpoints
//! for record access and `/sql` for queries, and checks server health
//! through `/health` and `/version`.

use crate::db::health::{HealthCheckConfig, HealthCheckMethod, HealthCheckResult};
use crate::db::{DocumentStore, QueryParams};
use crate::error::{Result, StoreError};
use crate::record_id::RecordId;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Connection settings for a SurrealDB server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurrealConfig {
    /// Base URL of the HTTP endpoint, e.g. `http://localhost:8000`
    pub url: String,
    /// Namespace sent with every request
    pub namespace: String,
    /// Database sent with every request
    pub database: String,
    /// Username for basic auth
    pub username: Option<String>,
    /// Password for basic auth
    pub password: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for SurrealConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            namespace: "radolfzell".to_string(),
            database: "events".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// One statement's outcome in a SurrealDB HTTP response
#[derive(Debug, Deserialize)]
struct StatementResponse {
    status: String,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    detail: Option<String>,
}

/// SurrealDB client speaking the HTTP API
pub struct SurrealClient {
    http: reqwest::Client,
    base: Url,
    config: SurrealConfig,
    token: Option<String>,
    health_config: HealthCheckConfig,
}

impl SurrealClient {
    /// Create a client with default health check configuration
    ///
    /// No request is made; use one of the health checks to verify the
    /// server is reachable.
    pub fn new(config: SurrealConfig) -> Result<Self> {
        Self::with_health_config(config, HealthCheckConfig::default())
    }

    /// Create a client with custom health check configuration
    pub fn with_health_config(
        config: SurrealConfig,
        health_config: HealthCheckConfig,
    ) -> Result<Self> {
        let base = Url::parse(&config.url)
            .map_err(|e| StoreError::ConfigError(format!("invalid url {}: {}", config.url, e)))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::ConfigError(format!(
                "url {} cannot be used as a base",
                config.url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::ConfigError(e.to_string()))?;

        info!(
            "Configured SurrealDB client for {} (ns: {}, db: {})",
            config.url, config.namespace, config.database
        );

        Ok(Self {
            http,
            base,
            config,
            token: None,
            health_config,
        })
    }

    /// Authenticate requests with a bearer token instead of basic auth
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Replace or drop the bearer token
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn config(&self) -> &SurrealConfig {
        &self.config
    }

    /// Get the current health check configuration
    pub fn health_config(&self) -> &HealthCheckConfig {
        &self.health_config
    }

    /// Update the health check configuration
    pub fn set_health_config(&mut self, config: HealthCheckConfig) {
        self.health_config = config;
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header("surreal-ns", &self.config.namespace)
            .header("surreal-db", &self.config.database);

        match (&self.token, &self.config.username) {
            (Some(token), _) => request.bearer_auth(token),
            (None, Some(user)) => request.basic_auth(user, self.config.password.as_ref()),
            (None, None) => request,
        }
    }

    fn transport_error(&self, e: reqwest::Error, context: &str) -> StoreError {
        if e.is_timeout() {
            StoreError::TimeoutError {
                timeout_seconds: self.config.timeout.as_secs(),
                context: context.to_string(),
            }
        } else {
            StoreError::ConnectionError(format!("{}: {}", context, e))
        }
    }

    /// Send a request and return the result of its final statement
    async fn execute(&self, request: RequestBuilder, context: &str) -> Result<Value> {
        debug!("SurrealDB request: {}", context);

        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(e, context))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::AuthenticationError(format!(
                "{}: {}",
                context, body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::QueryError(format!(
                "{} failed with HTTP {}: {}",
                context, status, body
            )));
        }

        let statements: Vec<StatementResponse> = response
            .json()
            .await
            .map_err(|e| StoreError::SerializationError(format!("{}: {}", context, e)))?;

        final_result(statements, context)
    }

    /// `GET /health`
    ///
    /// `Ok(true)` on a success status, an error otherwise.
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .request(Method::GET, self.endpoint(&["health"]))
            .timeout(self.health_config.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e, "health check"))?;

        let status = response.status();
        debug!("GET /health answered {}", status);
        if status.is_success() {
            Ok(true)
        } else {
            Err(StoreError::ConnectionError(format!(
                "health endpoint answered {}",
                status
            )))
        }
    }

    /// `GET /version`, returning the trimmed version string
    pub async fn server_version(&self) -> Result<String> {
        let response = self
            .request(Method::GET, self.endpoint(&["version"]))
            .timeout(self.health_config.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e, "version check"))?;

        let status = response.status();
        debug!("GET /version answered {}", status);
        if !status.is_success() {
            return Err(StoreError::QueryError(format!(
                "version endpoint answered {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        Ok(body.trim().to_string())
    }

    /// One timed `/version` check; failures end up in the result
    pub async fn health_check_detailed(&self) -> HealthCheckResult {
        let result = self.probe(HealthCheckMethod::Detailed).await;
        if let Some(error) = &result.error {
            error!("SurrealDB health check failed: {}", error);
        }
        result
    }

    /// Run the configured check, retrying and falling back as configured
    ///
    /// A failed `/version` check is answered by `/health` once when
    /// fallback is on. Retries wait `retry_delay` between attempts.
    pub async fn health_check_with_retry(&self) -> HealthCheckResult {
        let config = &self.health_config;
        let retries = if config.enable_retries {
            config.max_retries
        } else {
            0
        };
        let mut fallback_used = false;
        let mut attempt = 0;

        loop {
            let mut result = self.probe(config.method).await;

            let may_fall_back = config.enable_fallback
                && !fallback_used
                && config.method != HealthCheckMethod::Simple;
            if !result.status.is_operational() && may_fall_back {
                warn!(
                    "{:?} health check failed, trying GET /health",
                    config.method
                );
                fallback_used = true;
                result = self.probe(HealthCheckMethod::Simple).await;
            }

            if result.status.is_operational() || attempt >= retries {
                return result.after_attempts(attempt, fallback_used);
            }

            attempt += 1;
            warn!(
                "SurrealDB unhealthy, retry {}/{} in {:?}",
                attempt, retries, config.retry_delay
            );
            tokio::time::sleep(config.retry_delay).await;
        }
    }

    async fn probe(&self, method: HealthCheckMethod) -> HealthCheckResult {
        let started = Instant::now();
        let outcome = match method {
            HealthCheckMethod::Simple => self.health_check().await.map(|_| None),
            HealthCheckMethod::Version | HealthCheckMethod::Detailed => {
                self.server_version().await.map(Some)
            }
        };

        match outcome {
            Ok(version) => HealthCheckResult::answered(
                started.elapsed(),
                method,
                version,
                self.health_config.degraded_threshold_ms,
            ),
            Err(e) => HealthCheckResult::failed(started.elapsed(), method, e.to_string()),
        }
    }
}

#[async_trait]
impl DocumentStore for SurrealClient {
    async fn select_table(&self, table: &str) -> Result<Vec<Value>> {
        let request = self.request(Method::GET, self.endpoint(&["key", table]));
        let result = self.execute(request, &format!("select {}", table)).await?;
        Ok(into_rows(result))
    }

    async fn select_record(&self, id: &RecordId) -> Result<Option<Value>> {
        let request = self.request(Method::GET, self.endpoint(&["key", id.table(), id.id()]));
        let result = self.execute(request, &format!("select {}", id)).await?;
        Ok(into_rows(result).into_iter().next())
    }

    async fn query(&self, sql: &str, params: &QueryParams) -> Result<Vec<Value>> {
        let body = bind_params(sql, params)?;
        let request = self
            .request(Method::POST, self.endpoint(&["sql"]))
            .body(body);
        let result = self.execute(request, "query").await?;
        Ok(into_rows(result))
    }

    async fn create(&self, table: &str, data: Value) -> Result<Value> {
        let (url, body) = match explicit_id(table, data)? {
            (Some(id), body) => (self.endpoint(&["key", table, id.id()]), body),
            (None, body) => (self.endpoint(&["key", table]), body),
        };
        let request = self.request(Method::POST, url).json(&body);
        let result = self.execute(request, &format!("create in {}", table)).await?;
        first_row(result, table)
    }

    async fn update(&self, id: &RecordId, data: Value) -> Result<Value> {
        let request = self
            .request(Method::PUT, self.endpoint(&["key", id.table(), id.id()]))
            .json(&data);
        let result = self.execute(request, &format!("update {}", id)).await?;
        first_row(result, id.table())
    }

    async fn merge(&self, id: &RecordId, data: Value) -> Result<Value> {
        let request = self
            .request(Method::PATCH, self.endpoint(&["key", id.table(), id.id()]))
            .json(&data);
        let result = self.execute(request, &format!("merge {}", id)).await?;
        first_row(result, id.table())
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        let request = self.request(Method::DELETE, self.endpoint(&["key", id.table(), id.id()]));
        self.execute(request, &format!("delete {}", id)).await?;
        Ok(())
    }
}

/// Fail on the first `ERR` statement, otherwise return the last result
fn final_result(statements: Vec<StatementResponse>, context: &str) -> Result<Value> {
    if let Some(failed) = statements.iter().find(|s| s.status != "OK") {
        let message = failed
            .detail
            .clone()
            .or_else(|| failed.result.as_str().map(str::to_string))
            .unwrap_or_else(|| failed.result.to_string());
        return Err(StoreError::QueryError(format!("{}: {}", context, message)));
    }

    Ok(statements
        .into_iter()
        .last()
        .map(|s| s.result)
        .unwrap_or(Value::Null))
}

fn into_rows(result: Value) -> Vec<Value> {
    match result {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn first_row(result: Value, table: &str) -> Result<Value> {
    into_rows(result)
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::QueryError(format!("no record returned for {}", table)))
}

/// Split an explicit `id` out of create content
fn explicit_id(table: &str, data: Value) -> Result<(Option<RecordId>, Value)> {
    let Value::Object(mut fields) = data else {
        return Ok((None, data));
    };

    let id = match fields.remove("id") {
        Some(Value::String(raw)) => {
            let id: RecordId = raw.parse()?;
            if id.table() != table {
                return Err(StoreError::QueryError(format!(
                    "record {} does not belong to table {}",
                    id, table
                )));
            }
            Some(id)
        }
        Some(Value::Null) | None => None,
        Some(other) => {
            return Err(StoreError::InvalidRecordId(other.to_string()));
        }
    };

    Ok((id, Value::Object(fields)))
}

/// Prefix `sql` with one `LET $name = <json>;` per parameter
fn bind_params(sql: &str, params: &QueryParams) -> Result<String> {
    let mut body = String::new();

    for (name, value) in params {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(StoreError::QueryError(format!(
                "invalid parameter name: {}",
                name
            )));
        }
        body.push_str(&format!("LET ${} = {};\n", name, value));
    }

    body.push_str(sql);
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invalid_url_is_config_error() {
        let config = SurrealConfig {
            url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            SurrealClient::new(config),
            Err(StoreError::ConfigError(_))
        ));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = SurrealClient::new(SurrealConfig {
            url: "http://db.example:8000/surreal/".to_string(),
            ..Default::default()
        })
        .unwrap();

        let url = client.endpoint(&["key", "event", "a b"]);
        assert_eq!(url.as_str(), "http://db.example:8000/surreal/key/event/a%20b");
    }

    #[test]
    fn test_bind_params() {
        let mut params = QueryParams::new();
        params.insert("term".to_string(), json!("See"));
        params.insert("limit".to_string(), json!(10));

        let body = bind_params("SELECT * FROM event WHERE title @@ $term LIMIT $limit", &params).unwrap();
        assert_eq!(
            body,
            "LET $limit = 10;\nLET $term = \"See\";\nSELECT * FROM event WHERE title @@ $term LIMIT $limit"
        );

        let mut bad = QueryParams::new();
        bad.insert("x; DELETE event".to_string(), json!(1));
        assert!(bind_params("SELECT 1", &bad).is_err());
    }

    #[test]
    fn test_final_result_reports_errors() {
        let ok = vec![
            StatementResponse { status: "OK".into(), result: Value::Null, detail: None },
            StatementResponse { status: "OK".into(), result: json!([1, 2]), detail: None },
        ];
        assert_eq!(final_result(ok, "q").unwrap(), json!([1, 2]));

        let failed = vec![StatementResponse {
            status: "ERR".into(),
            result: json!("There was a problem with the database"),
            detail: None,
        }];
        let err = final_result(failed, "q").unwrap_err();
        assert!(matches!(err, StoreError::QueryError(ref m) if m.contains("problem")));
    }

    #[test]
    fn test_explicit_id() {
        let (id, body) = explicit_id("event", json!({ "id": "event:fest", "title": "x" })).unwrap();
        assert_eq!(id.unwrap().id(), "fest");
        assert_eq!(body, json!({ "title": "x" }));

        let (id, _) = explicit_id("event", json!({ "title": "x" })).unwrap();
        assert!(id.is_none());

        assert!(explicit_id("event", json!({ "id": "topic:1" })).is_err());
    }
}
