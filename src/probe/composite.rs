//! Composite probe: several sub-probes folded into one sample.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;

use super::Probe;
use crate::store::{HealthSample, HealthState};

/// Runs every member concurrently. Healthy only if all members are healthy,
/// otherwise down. Latency comes from the first member.
pub struct CompositeProbe {
    name: String,
    members: Vec<Arc<dyn Probe>>,
    ok_message: String,
    failure_prefix: String,
}

impl CompositeProbe {
    pub fn new(
        name: impl Into<String>,
        members: Vec<Arc<dyn Probe>>,
        ok_message: impl Into<String>,
        failure_prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            members,
            ok_message: ok_message.into(),
            failure_prefix: failure_prefix.into(),
        }
    }

    fn fold(&self, samples: &[HealthSample]) -> HealthSample {
        let failing: Vec<&str> = self
            .members
            .iter()
            .zip(samples)
            .filter(|(_, sample)| !sample.status.is_healthy())
            .map(|(member, _)| member.name())
            .collect();

        let (status, message) = if failing.is_empty() {
            (HealthState::Healthy, self.ok_message.clone())
        } else {
            (
                HealthState::Down,
                format!("{}: {}", self.failure_prefix, failing.join(", ")),
            )
        };

        HealthSample {
            timestamp: Utc::now(),
            status,
            latency: samples.first().and_then(|s| s.latency),
            message: Some(message),
        }
    }
}

#[async_trait]
impl Probe for CompositeProbe {
    fn name(&self) -> &str {
        &self.name
    }

    /// Configured as long as any member is.
    fn is_configured(&self) -> bool {
        self.members.iter().any(|m| m.is_configured())
    }

    async fn check(&self) -> HealthSample {
        let samples = join_all(self.members.iter().map(|m| m.check())).await;
        self.fold(&samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Fixed {
        name: &'static str,
        status: HealthState,
        latency_ms: Option<u64>,
    }

    #[async_trait]
    impl Probe for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn is_configured(&self) -> bool {
            self.latency_ms.is_some()
        }

        async fn check(&self) -> HealthSample {
            HealthSample::new(self.status, self.latency_ms.map(Duration::from_millis), "fixed")
        }
    }

    fn member(name: &'static str, status: HealthState, latency_ms: Option<u64>) -> Arc<dyn Probe> {
        Arc::new(Fixed { name, status, latency_ms })
    }

    fn llm_like(members: Vec<Arc<dyn Probe>>) -> CompositeProbe {
        CompositeProbe::new("LLM", members, "All LLM services are healthy", "Some LLM services are down")
    }

    #[tokio::test]
    async fn test_all_healthy() {
        let probe = llm_like(vec![
            member("Gemini", HealthState::Healthy, Some(120)),
            member("OpenAI", HealthState::Healthy, Some(80)),
        ]);

        let sample = probe.check().await;
        assert_eq!(sample.status, HealthState::Healthy);
        assert_eq!(sample.latency, Some(120));
        assert_eq!(sample.message.as_deref(), Some("All LLM services are healthy"));
    }

    #[tokio::test]
    async fn test_degraded_member_folds_to_down() {
        let probe = llm_like(vec![
            member("Gemini", HealthState::Healthy, Some(120)),
            member("OpenAI", HealthState::Degraded, Some(80)),
            member("Azure OpenAI", HealthState::Down, None),
        ]);

        let sample = probe.check().await;
        assert_eq!(sample.status, HealthState::Down);
        assert_eq!(sample.latency, Some(120));
        assert_eq!(
            sample.message.as_deref(),
            Some("Some LLM services are down: OpenAI, Azure OpenAI")
        );
    }

    #[tokio::test]
    async fn test_latency_always_from_first_member() {
        let probe = llm_like(vec![
            member("Gemini", HealthState::Down, None),
            member("OpenAI", HealthState::Healthy, Some(80)),
        ]);

        let sample = probe.check().await;
        assert_eq!(sample.latency, None);
        assert_eq!(sample.message.as_deref(), Some("Some LLM services are down: Gemini"));
        assert!(probe.is_configured());
    }

    #[test]
    fn test_unconfigured_when_no_member_is() {
        let probe = llm_like(vec![
            member("Gemini", HealthState::Down, None),
            member("OpenAI", HealthState::Down, None),
        ]);
        assert!(!probe.is_configured());
    }
}
