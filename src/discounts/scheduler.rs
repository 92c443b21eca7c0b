use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::discounts::service::DiscountService;

/// Background loop that runs the discount sweep on a fixed interval.
///
/// The guard mutex is shared with the manual sweep endpoint; a tick that
/// finds a sweep already running is skipped rather than queued, so two
/// passes never overlap.
pub struct DiscountSweeper {
    service: DiscountService,
    period: Duration,
    guard: Arc<Mutex<()>>,
}

impl DiscountSweeper {
    pub fn new(service: DiscountService, period: Duration, guard: Arc<Mutex<()>>) -> Self {
        Self {
            service,
            period,
            guard,
        }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(period_secs = self.period.as_secs(), "discount sweeper started");

        loop {
            interval.tick().await;

            let Ok(_lock) = self.guard.try_lock() else {
                tracing::debug!("sweep already in progress, skipping tick");
                continue;
            };

            if let Err(err) = self.service.run_sweep(Utc::now()).await {
                tracing::error!(error = %err, "discount sweep failed");
            }
        }
    }
}
