//! Health data model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// A monitored dependency.
///
/// The set is closed: every variant owns a slot in the [`Store`](super::Store)
/// from startup, so there is no way to ask for a service that isn't tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceId {
    Mongodb,
    Redis,
    Orchestration,
    Services,
    Crons,
    Frontend,
    Llm,
}

impl ServiceId {
    /// Every service, in declaration order.
    pub const ALL: [ServiceId; 7] = [
        ServiceId::Mongodb,
        ServiceId::Redis,
        ServiceId::Orchestration,
        ServiceId::Services,
        ServiceId::Crons,
        ServiceId::Frontend,
        ServiceId::Llm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceId::Mongodb => "mongodb",
            ServiceId::Redis => "redis",
            ServiceId::Orchestration => "orchestration",
            ServiceId::Services => "services",
            ServiceId::Crons => "crons",
            ServiceId::Frontend => "frontend",
            ServiceId::Llm => "llm",
        }
    }

    /// Position of this service in [`ServiceId::ALL`].
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown service: {0}")]
pub struct UnknownService(pub String);

impl FromStr for ServiceId {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownService(s.to_string()))
    }
}

/// Tri-state health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Down,
}

impl HealthState {
    pub fn is_healthy(self) -> bool {
        self == HealthState::Healthy
    }

    /// Fold many states into one process-wide status.
    ///
    /// Healthy only if everything is healthy; any `Down` wins over any
    /// number of `Degraded`.
    pub fn rollup<I>(states: I) -> HealthState
    where
        I: IntoIterator<Item = HealthState>,
    {
        let mut any_degraded = false;
        for state in states {
            match state {
                HealthState::Down => return HealthState::Down,
                HealthState::Degraded => any_degraded = true,
                HealthState::Healthy => {}
            }
        }

        if any_degraded {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Down => "down",
        };
        f.write_str(s)
    }
}

/// One timestamped probe result. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    pub timestamp: DateTime<Utc>,
    pub status: HealthState,
    /// Round-trip time in milliseconds, `None` when no attempt was made.
    pub latency: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthSample {
    pub fn new(status: HealthState, latency: Option<Duration>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            status,
            latency: latency.map(duration_to_millis),
            message: Some(message.into()),
        }
    }

    pub fn healthy(latency: Duration, message: impl Into<String>) -> Self {
        Self::new(HealthState::Healthy, Some(latency), message)
    }

    pub fn degraded(latency: Duration, message: impl Into<String>) -> Self {
        Self::new(HealthState::Degraded, Some(latency), message)
    }

    pub fn down(latency: Option<Duration>, message: impl Into<String>) -> Self {
        Self::new(HealthState::Down, latency, message)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

fn duration_to_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Latest known state of one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub name: ServiceId,
    pub status: HealthState,
    pub latency: Option<u64>,
    pub last_checked: DateTime<Utc>,
    pub message: Option<String>,
}

impl ServiceStatus {
    /// Placeholder shown before the first probe cycle completes.
    pub fn not_yet_checked(name: ServiceId, at: DateTime<Utc>) -> Self {
        Self {
            name,
            status: HealthState::Down,
            latency: None,
            last_checked: at,
            message: Some("Not yet checked".to_string()),
        }
    }

    pub fn from_sample(name: ServiceId, sample: &HealthSample) -> Self {
        Self {
            name,
            status: sample.status,
            latency: sample.latency,
            last_checked: sample.timestamp,
            message: sample.message.clone(),
        }
    }
}

/// Derived statistics over a look-back window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    /// Percentage of healthy samples, `0` for an empty window.
    pub uptime: f64,
    pub average_latency: Option<f64>,
}

/// Every service's status plus the rolled-up overall status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub services: BTreeMap<ServiceId, ServiceStatus>,
    pub last_update: DateTime<Utc>,
    pub overall_status: HealthState,
}

impl HealthReport {
    pub fn from_statuses<I>(statuses: I, last_update: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = ServiceStatus>,
    {
        let services: BTreeMap<_, _> = statuses.into_iter().map(|s| (s.name, s)).collect();
        let overall_status = HealthState::rollup(services.values().map(|s| s.status));

        Self {
            services,
            last_update,
            overall_status,
        }
    }
}
