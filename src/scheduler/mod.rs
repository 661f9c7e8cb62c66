//! Scheduler module for running sampling cycles on a timer.

mod sampler;

pub use sampler::*;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

/// Periodically triggers a full sampling cycle.
pub struct Scheduler {
    sampler: Arc<Sampler>,
    interval: Duration,
    stop: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

impl Scheduler {
    pub fn new(sampler: Arc<Sampler>, interval: Duration) -> Self {
        Self {
            sampler,
            interval,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the background sampling loop. The first cycle runs immediately.
    pub async fn start(&self) {
        let mut stop = self.stop.lock().await;
        if stop.is_some() {
            return; // Already running
        }

        let (tx, _) = broadcast::channel(1);
        let stop_rx = tx.subscribe();
        *stop = Some(tx);

        tracing::info!("Scheduler: sampling every {:?}", self.interval);
        tokio::spawn(run_sampling_loop(self.sampler.clone(), self.interval, stop_rx));
    }

    /// Stop the background sampling loop.
    pub async fn stop(&self) {
        if let Some(tx) = self.stop.lock().await.take() {
            let _ = tx.send(());
            tracing::info!("Scheduler: stopped");
        }
    }
}

async fn run_sampling_loop(sampler: Arc<Sampler>, period: Duration, mut stop_rx: broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = interval.tick() => {
                let report = sampler.run_cycle().await;
                let healthy = report.services.values().filter(|s| s.status.is_healthy()).count();
                tracing::info!(
                    "Sampling cycle complete: {} ({}/{} healthy)",
                    report.overall_status,
                    healthy,
                    report.services.len()
                );
            }
        }
    }
}
