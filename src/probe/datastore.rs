//! Datastore probes: MongoDB ping and Redis PING.
//!
//! Both keep one long-lived client per process. The client is created by the
//! first check that needs it; checks that arrive while creation is in flight
//! wait for that same creation. A failed creation leaves the cell empty so
//! the next check tries again.

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::error::ErrorKind as MongoErrorKind;
use mongodb::options::ClientOptions;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::{not_configured, timed, Probe, ProbeError, Reply};
use crate::store::HealthSample;

// ============================================================================
// MongoDB
// ============================================================================

pub struct MongoProbe {
    uri: Option<String>,
    timeout: Duration,
    client: OnceCell<mongodb::Client>,
}

impl MongoProbe {
    pub fn new(uri: Option<String>, timeout: Duration) -> Self {
        Self {
            uri,
            timeout,
            client: OnceCell::new(),
        }
    }

    async fn client(&self, uri: &str) -> Result<&mongodb::Client, ProbeError> {
        self.client
            .get_or_try_init(|| async {
                tracing::info!("MongoProbe: creating client");
                let mut options = ClientOptions::parse(uri)
                    .await
                    .map_err(|e| ProbeError::Network(e.to_string()))?;
                options.server_selection_timeout = Some(self.timeout);
                options.connect_timeout = Some(self.timeout);
                options.app_name = Some("statusboard".to_string());

                mongodb::Client::with_options(options).map_err(|e| ProbeError::Network(e.to_string()))
            })
            .await
    }

    async fn attempt(&self, uri: &str) -> Result<Reply, ProbeError> {
        let client = self.client(uri).await?;

        match client.database("admin").run_command(doc! { "ping": 1 }).await {
            Ok(_) => Ok(Reply::Healthy("MongoDB is responsive".to_string())),
            Err(e) => match e.kind.as_ref() {
                MongoErrorKind::Command(cmd) => Ok(Reply::Degraded(format!(
                    "MongoDB ping failed with code {}: {}",
                    cmd.code, cmd.message
                ))),
                MongoErrorKind::Authentication { message, .. } => {
                    Err(ProbeError::Command(message.clone()))
                }
                _ => Err(ProbeError::Network(e.to_string())),
            },
        }
    }
}

#[async_trait]
impl Probe for MongoProbe {
    fn name(&self) -> &str {
        "MongoDB"
    }

    fn is_configured(&self) -> bool {
        self.uri.is_some()
    }

    async fn check(&self) -> HealthSample {
        let Some(uri) = self.uri.as_deref() else {
            return not_configured("MongoDB URI not configured");
        };

        let sample = timed(self.timeout, self.attempt(uri)).await;
        if !sample.status.is_healthy() {
            tracing::warn!(
                "MongoDB probe is {}: {}",
                sample.status,
                sample.message.as_deref().unwrap_or_default()
            );
        }
        sample
    }
}

// ============================================================================
// Redis
// ============================================================================

pub struct RedisProbe {
    url: Option<String>,
    timeout: Duration,
    connection: OnceCell<ConnectionManager>,
}

impl RedisProbe {
    /// `url` is the full connection URL including credentials.
    pub fn new(url: Option<String>, timeout: Duration) -> Self {
        Self {
            url,
            timeout,
            connection: OnceCell::new(),
        }
    }

    async fn connection(&self, url: &str) -> Result<ConnectionManager, ProbeError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                tracing::info!("RedisProbe: opening connection");
                let client = redis::Client::open(url).map_err(|e| ProbeError::Network(e.to_string()))?;
                ConnectionManager::new(client)
                    .await
                    .map_err(|e| ProbeError::Network(e.to_string()))
            })
            .await?;

        Ok(manager.clone())
    }

    async fn attempt(&self, url: &str) -> Result<Reply, ProbeError> {
        let mut conn = self.connection(url).await?;

        let reply: Result<String, redis::RedisError> = redis::cmd("PING").query_async(&mut conn).await;
        match reply {
            Ok(pong) if pong == "PONG" => Ok(Reply::Healthy("Cache is responsive".to_string())),
            Ok(other) => Ok(Reply::Degraded(format!("Unexpected PING reply: {}", other))),
            Err(e) => match e.kind() {
                redis::ErrorKind::ResponseError => Ok(Reply::Degraded(format!("Redis PING failed: {}", e))),
                redis::ErrorKind::AuthenticationFailed => Err(ProbeError::Command(e.to_string())),
                _ => Err(ProbeError::Network(e.to_string())),
            },
        }
    }
}

#[async_trait]
impl Probe for RedisProbe {
    fn name(&self) -> &str {
        "Redis"
    }

    fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    async fn check(&self) -> HealthSample {
        let Some(url) = self.url.as_deref() else {
            return not_configured("Redis configuration incomplete");
        };

        let sample = timed(self.timeout, self.attempt(url)).await;
        if !sample.status.is_healthy() {
            tracing::warn!(
                "Redis probe is {}: {}",
                sample.status,
                sample.message.as_deref().unwrap_or_default()
            );
        }
        sample
    }
}
