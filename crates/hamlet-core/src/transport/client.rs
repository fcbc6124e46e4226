//! HTTP client for the decision backend

use crate::transport::{
    DecisionBackend, DecisionRequest, DecisionResponse, EnvironmentUpdate, PrimeProfileRequest,
    PrimeRequest, RegisterAgentRequest,
};
use async_trait::async_trait;
use hamlet_common::{BackendConfig, HamletError, Result};
use reqwest::Method;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP transport to the decision backend with a flat-delay retry policy.
///
/// Transport-level failures (connect errors, timeouts) are retried up to
/// `max_retries` times with a constant `retry_delay` between attempts; the
/// delay is deliberately not exponential. A well-formed 4xx/5xx response is
/// an application error and is returned to the caller without retrying.
/// Exhausting retries marks the client disconnected; receiving any response
/// afterwards marks it connected again.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
    connected: AtomicBool,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| HamletError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            connected: AtomicBool::new(true),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
        })
    }

    /// Observability counters: (successful, failed) requests so far.
    pub fn request_counts(&self) -> (u64, u64) {
        (
            self.successful_requests.load(Ordering::Relaxed),
            self.failed_requests.load(Ordering::Relaxed),
        )
    }

    /// Issue one request with retries, returning the response body on 2xx.
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let mut request = self.http.request(method.clone(), &url);
            if let Some(json) = body {
                request = request.json(json);
            }

            match request.send().await {
                Ok(response) => {
                    // Any well-formed response means the transport works.
                    let was_disconnected = !self.connected.swap(true, Ordering::Relaxed);
                    if was_disconnected {
                        debug!(url = %url, "backend reachable again");
                    }

                    let status = response.status();
                    let text = response.text().await.map_err(|e| {
                        self.failed_requests.fetch_add(1, Ordering::Relaxed);
                        HamletError::Transport(format!("failed to read response body: {}", e))
                    })?;

                    if status.is_success() {
                        self.successful_requests.fetch_add(1, Ordering::Relaxed);
                        return Ok(text);
                    }

                    // Application errors are surfaced, never retried.
                    self.failed_requests.fetch_add(1, Ordering::Relaxed);
                    return Err(HamletError::Application {
                        status: status.as_u16(),
                        body: text,
                    });
                }
                Err(err) => {
                    if attempt <= self.max_retries {
                        warn!(
                            url = %url,
                            attempt,
                            max_retries = self.max_retries,
                            error = %err,
                            "transport failure, retrying after flat delay"
                        );
                        tokio::time::sleep(self.retry_delay).await;
                        continue;
                    }

                    self.connected.store(false, Ordering::Relaxed);
                    self.failed_requests.fetch_add(1, Ordering::Relaxed);
                    return Err(HamletError::Transport(format!(
                        "{} {} failed after {} attempts: {}",
                        method, url, attempt, err
                    )));
                }
            }
        }
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<String> {
        self.send(Method::POST, path, Some(body)).await
    }
}

#[async_trait]
impl DecisionBackend for BackendClient {
    async fn register_agent(&self, agent_id: &str, initial_location: &str) -> Result<()> {
        let body = serde_json::to_value(RegisterAgentRequest {
            agent_id: agent_id.to_string(),
            initial_location: initial_location.to_string(),
        })?;
        self.post_json("/agent/register", &body).await?;
        Ok(())
    }

    async fn deregister_agent(&self, agent_id: &str) -> Result<()> {
        self.post_json(
            &format!("/agent/{}/deregister", agent_id),
            &Value::Object(Default::default()),
        )
        .await?;
        Ok(())
    }

    async fn generate(&self, request: &DecisionRequest) -> Result<DecisionResponse> {
        let body = serde_json::to_value(request)?;
        let text = self.post_json("/generate", &body).await?;
        let response: DecisionResponse = serde_json::from_str(&text)?;
        Ok(response)
    }

    async fn prime(&self, agent_ids: &[String], force: bool) -> Result<()> {
        let body = serde_json::to_value(PrimeRequest {
            agent_ids: agent_ids.to_vec(),
            force,
        })?;
        self.post_json("/agents/prime", &body).await?;
        Ok(())
    }

    async fn prime_profile(&self, agent_id: &str, force: bool) -> Result<()> {
        let body = serde_json::to_value(PrimeProfileRequest { force })?;
        self.post_json(&format!("/profiles/{}", agent_id), &body)
            .await?;
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        self.send(Method::GET, "/health", None).await?;
        Ok(())
    }

    async fn push_environment(&self, update: &EnvironmentUpdate) -> Result<()> {
        let body = serde_json::to_value(update)?;
        self.post_json("/env/update", &body).await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
