//! One sampling cycle: every probe, concurrently, straight into the store.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::probe::{Probe, RegisteredProbe};
use crate::store::{HealthReport, HealthSample, ServiceId, Store};

/// Extra time a probe gets beyond its own deadline before the sampler gives
/// up on it.
const GUARD_GRACE: Duration = Duration::from_secs(1);

/// Runs the registered probes and records their samples.
pub struct Sampler {
    store: Arc<Store>,
    probes: Vec<RegisteredProbe>,
    deadline: Duration,
}

impl Sampler {
    pub fn new(store: Arc<Store>, probes: Vec<RegisteredProbe>, probe_timeout: Duration) -> Self {
        Self {
            store,
            probes,
            deadline: probe_timeout.saturating_add(GUARD_GRACE),
        }
    }

    pub fn probe(&self, id: ServiceId) -> Option<&RegisteredProbe> {
        self.probes.iter().find(|p| p.id == id)
    }

    /// Probe everything once and return the resulting state of every service.
    ///
    /// Each probe runs in its own task and writes its sample as soon as it
    /// finishes. A task that panics or overruns the guard deadline still
    /// records a `down` sample. The report is read back from the store, so a
    /// sample the store rejected as out of order never shows up in it.
    pub async fn run_cycle(&self) -> HealthReport {
        let tasks: Vec<_> = self
            .probes
            .iter()
            .map(|registered| {
                let id = registered.id;
                let probe = registered.probe.clone();
                let store = self.store.clone();
                let deadline = self.deadline;

                let handle = tokio::spawn(async move {
                    let sample = guarded(id, probe, deadline).await;
                    record(&store, id, sample);
                });
                (id, handle)
            })
            .collect();

        for (id, handle) in tasks {
            if let Err(e) = handle.await {
                tracing::error!("Sampler: probe task for {} failed: {}", id, e);
                let sample = HealthSample::down(None, format!("probe task failed: {}", e));
                record(&self.store, id, sample);
            }
        }

        HealthReport::from_statuses(self.store.all_statuses(), Utc::now())
    }

    /// Run one service's probe without recording the result.
    pub async fn check_one(&self, id: ServiceId) -> Option<(HealthSample, bool)> {
        let registered = self.probe(id)?;
        let configured = registered.probe.is_configured();
        let sample = guarded(id, registered.probe.clone(), self.deadline).await;
        Some((sample, configured))
    }
}

fn record(store: &Store, id: ServiceId, sample: HealthSample) {
    if !store.update_service_status(id, sample) {
        tracing::debug!("Sampler: {} already has a newer sample, keeping it", id);
    }
}

async fn guarded(id: ServiceId, probe: Arc<dyn Probe>, deadline: Duration) -> HealthSample {
    // Add jitter to avoid thundering herd
    let jitter = rand::random::<u64>() % 100;
    tokio::time::sleep(Duration::from_millis(jitter)).await;

    let start = Instant::now();
    match tokio::time::timeout(deadline, probe.check()).await {
        Ok(sample) => sample,
        Err(_) => {
            tracing::warn!("Sampler: probe for {} overran {:?}", id, deadline);
            HealthSample::down(
                Some(start.elapsed()),
                format!("probe did not complete within {:?}", deadline),
            )
        }
    }
}
