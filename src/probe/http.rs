//! HTTP probe implementation.

use async_trait::async_trait;
use reqwest::Method;
use std::time::Duration;

use super::{not_configured, timed, Probe, ProbeError, Reply};
use crate::store::HealthSample;

/// A fully described request to send on every check.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Probe that sends one request: 2xx is healthy, any other status degraded,
/// no response at all is down.
pub struct HttpProbe {
    label: String,
    request: Option<HttpRequest>,
    missing_message: String,
    timeout: Duration,
}

impl HttpProbe {
    /// `request` is `None` when the endpoint or its credentials are not
    /// configured; `missing_message` is reported in that case.
    pub fn new(
        label: impl Into<String>,
        request: Option<HttpRequest>,
        missing_message: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            request,
            missing_message: missing_message.into(),
            timeout,
        }
    }

    /// Plain GET against a health URL.
    pub fn get(label: &str, url: Option<String>, timeout: Duration) -> Self {
        Self::new(
            label,
            url.map(HttpRequest::get),
            format!("{} URL not configured", label),
            timeout,
        )
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<Reply, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        let mut builder = client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(self.timeout)
            } else {
                ProbeError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Ok(Reply::Degraded(format!(
                "{} returned status {}",
                self.label,
                status.as_u16()
            )));
        }

        // Read the full body to measure complete transfer time
        let _body = response
            .bytes()
            .await
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        Ok(Reply::Healthy(format!("{} is healthy", self.label)))
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn name(&self) -> &str {
        &self.label
    }

    fn is_configured(&self) -> bool {
        self.request.is_some()
    }

    async fn check(&self) -> HealthSample {
        let Some(request) = &self.request else {
            return not_configured(self.missing_message.as_str());
        };

        let sample = timed(self.timeout, self.attempt(request)).await;
        if !sample.status.is_healthy() {
            tracing::warn!(
                "HTTP probe {} is {}: {}",
                self.label,
                sample.status,
                sample.message.as_deref().unwrap_or_default()
            );
        }
        sample
    }
}
