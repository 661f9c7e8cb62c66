//! In-memory aggregation store.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::models::*;
use super::window::{HistoryWindow, WindowLimits};

/// Per-service state. `history` is always locked before `current` so that
/// same-service updates are serialized end to end.
struct Slot {
    current: RwLock<ServiceStatus>,
    history: RwLock<HistoryWindow>,
}

/// Thread-safe store of current status and bounded history per service.
pub struct Store {
    slots: Vec<Slot>,
    limits: WindowLimits,
}

impl Store {
    /// Create a store with a "not yet checked" entry for every service.
    pub fn new(limits: WindowLimits) -> Self {
        let now = Utc::now();
        let slots = ServiceId::ALL
            .into_iter()
            .map(|id| Slot {
                current: RwLock::new(ServiceStatus::not_yet_checked(id, now)),
                history: RwLock::new(HistoryWindow::new()),
            })
            .collect();

        Self { slots, limits }
    }

    fn slot(&self, id: ServiceId) -> &Slot {
        &self.slots[id.index()]
    }

    // --- Writes ---

    /// Record a new sample as both the current status and a history point.
    ///
    /// Samples older than the newest one already recorded are dropped and
    /// `false` is returned.
    pub fn update_service_status(&self, id: ServiceId, sample: HealthSample) -> bool {
        let slot = self.slot(id);
        let mut history = slot.history.write();

        let status = ServiceStatus::from_sample(id, &sample);
        if !history.push(sample, &self.limits, Utc::now()) {
            tracing::warn!(
                "Store: dropping out-of-order sample for {} (checked at {})",
                id,
                status.last_checked
            );
            return false;
        }

        *slot.current.write() = status;
        true
    }

    // --- Reads ---

    pub fn get_service_status(&self, id: ServiceId) -> ServiceStatus {
        self.slot(id).current.read().clone()
    }

    /// Current status of every service, in [`ServiceId::ALL`] order.
    pub fn all_statuses(&self) -> Vec<ServiceStatus> {
        ServiceId::ALL
            .into_iter()
            .map(|id| self.get_service_status(id))
            .collect()
    }

    /// Last known state of everything, without probing.
    pub fn snapshot(&self) -> HealthReport {
        let statuses = self.all_statuses();
        let last_update = statuses
            .iter()
            .map(|s| s.last_checked)
            .max()
            .unwrap_or_else(Utc::now);
        HealthReport::from_statuses(statuses, last_update)
    }

    /// Samples from the last `hours`, oldest first.
    pub fn get_historical_data(&self, id: ServiceId, hours: f64) -> Vec<HealthSample> {
        self.slot(id).history.read().since(hours, Utc::now())
    }

    /// Samples from the last `hours` and their aggregates, from a single
    /// read of the window.
    pub fn history_with_stats(&self, id: ServiceId, hours: f64) -> (Vec<HealthSample>, AggregateStats) {
        let samples = self.get_historical_data(id, hours);
        let stats = AggregateStats::from_samples(&samples);
        (samples, stats)
    }

    pub fn stats(&self, id: ServiceId, hours: f64) -> AggregateStats {
        self.history_with_stats(id, hours).1
    }

    pub fn calculate_uptime(&self, id: ServiceId, hours: f64) -> f64 {
        self.stats(id, hours).uptime
    }

    pub fn get_average_latency(&self, id: ServiceId, hours: f64) -> Option<f64> {
        self.stats(id, hours).average_latency
    }

    /// A copy of every service's window.
    pub fn get_all_historical_data(&self) -> BTreeMap<ServiceId, HistoryWindow> {
        ServiceId::ALL
            .into_iter()
            .map(|id| (id, self.slot(id).history.read().clone()))
            .collect()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(WindowLimits::default())
    }
}
