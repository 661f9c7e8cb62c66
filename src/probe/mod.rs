//! Probe module for dependency health checks.
//!
//! Supports HTTP endpoints, MongoDB, Redis and a composite LLM probe. Every
//! probe goes through [`timed`], which owns the deadline and turns whatever
//! happened into a [`HealthSample`]; errors never escape a probe.

mod composite;
mod datastore;
mod http;
mod llm;

pub use composite::*;
pub use datastore::*;
pub use http::*;
pub use llm::*;

use crate::config::ProbeSettings;
use crate::store::{HealthSample, ServiceId};

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{0}")]
    NotConfigured(String),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("command failed: {0}")]
    Command(String),
}

/// What a reachable dependency said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Healthy(String),
    Degraded(String),
}

/// One health check against one dependency.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Human-readable name, used in composite failure messages.
    fn name(&self) -> &str;

    /// `false` when required endpoints or credentials are missing.
    fn is_configured(&self) -> bool;

    async fn check(&self) -> HealthSample;
}

/// A probe bound to the service it reports for.
#[derive(Clone)]
pub struct RegisteredProbe {
    pub id: ServiceId,
    pub probe: Arc<dyn Probe>,
}

impl RegisteredProbe {
    pub fn new(id: ServiceId, probe: impl Probe + 'static) -> Self {
        Self {
            id,
            probe: Arc::new(probe),
        }
    }
}

/// Run `attempt` under `deadline` and classify the outcome.
///
/// Latency is the elapsed time even when the attempt failed or timed out.
pub async fn timed<F>(deadline: Duration, attempt: F) -> HealthSample
where
    F: Future<Output = Result<Reply, ProbeError>>,
{
    let start = Instant::now();
    let outcome = tokio::time::timeout(deadline, attempt).await;
    let elapsed = start.elapsed();

    match outcome {
        Ok(Ok(Reply::Healthy(message))) => HealthSample::healthy(elapsed, message),
        Ok(Ok(Reply::Degraded(message))) => HealthSample::degraded(elapsed, message),
        Ok(Err(e)) => HealthSample::down(Some(elapsed), e.to_string()),
        Err(_) => HealthSample::down(Some(elapsed), ProbeError::Timeout(deadline).to_string()),
    }
}

/// Sample for a probe whose configuration is incomplete. No attempt is made,
/// so there is no latency.
pub fn not_configured(message: impl Into<String>) -> HealthSample {
    HealthSample::down(None, ProbeError::NotConfigured(message.into()).to_string())
}

/// Build one probe per service from the given settings.
pub fn build_probes(settings: &ProbeSettings) -> Vec<RegisteredProbe> {
    let timeout = settings.timeout;

    ServiceId::ALL
        .into_iter()
        .map(|id| match id {
            ServiceId::Mongodb => {
                RegisteredProbe::new(id, MongoProbe::new(settings.mongodb_uri.clone(), timeout))
            }
            ServiceId::Redis => {
                RegisteredProbe::new(id, RedisProbe::new(settings.redis.connection_url(), timeout))
            }
            ServiceId::Orchestration => RegisteredProbe::new(
                id,
                HttpProbe::get("Orchestration service", settings.orchestration_url.clone(), timeout),
            ),
            ServiceId::Services => RegisteredProbe::new(
                id,
                HttpProbe::get("Backend services", settings.services_url.clone(), timeout),
            ),
            ServiceId::Crons => RegisteredProbe::new(
                id,
                HttpProbe::get("Cron jobs service", settings.crons_url.clone(), timeout),
            ),
            ServiceId::Frontend => RegisteredProbe::new(
                id,
                HttpProbe::get("Frontend", settings.frontend_url.clone(), timeout),
            ),
            ServiceId::Llm => RegisteredProbe::new(id, llm_probe(settings)),
        })
        .collect()
}
