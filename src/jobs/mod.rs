use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        if self.context.memory_limiter.is_some() {
            tokio::spawn(Self::rate_limit_purge_job(Arc::clone(&self)));
        }
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Drop aged-out in-process rate limit windows (runs every 5 minutes)
    async fn rate_limit_purge_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            let purged = tasks::purge_rate_limit_windows(&scheduler.context).await;
            crate::metrics::record_background_job("rate_limit_purge", true);
            if purged > 0 {
                debug!("Purged {} idle rate limit window(s)", purged);
            }
        }
    }

    /// Verify the post store is reachable (runs every minute)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(60));

        loop {
            interval.tick().await;

            match tasks::health_check(&scheduler.context).await {
                Ok(()) => crate::metrics::record_background_job("health_check", true),
                Err(e) => {
                    crate::metrics::record_background_job("health_check", false);
                    error!("Health check failed: {}", e);
                }
            }
        }
    }
}
