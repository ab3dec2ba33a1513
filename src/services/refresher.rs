use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::ApiError;
use crate::services::query_client::QueryClient;

/// Background reconciliation loop.
///
/// Invalidation only marks entries stale; this worker periodically refetches
/// every stale entry so subscribed readers converge on server truth without
/// issuing reads themselves.
pub struct RefreshWorker {
    client: Arc<QueryClient>,
    interval: Duration,
}

impl RefreshWorker {
    pub fn new(client: Arc<QueryClient>, interval: Duration) -> Self {
        Self { client, interval }
    }

    /// Run forever, refreshing stale entries once per interval. Errors are
    /// logged and the loop continues.
    pub async fn start(self) {
        info!("starting refresh worker (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            match self.run_once().await {
                Ok(0) => {}
                Ok(refreshed) => info!("refreshed {} stale entries", refreshed),
                Err(e) => warn!("refresh pass failed: {}", e),
            }
        }
    }

    /// One reconciliation pass; returns how many entries were refreshed.
    pub async fn run_once(&self) -> Result<usize, ApiError> {
        let stale = self.client.cache().stale_keys();
        let mut refreshed = 0;
        for key in stale {
            match self.client.refresh(&key).await {
                Ok(()) => refreshed += 1,
                Err(e) => {
                    // Keep going; the entry stays stale and is retried on the
                    // next pass.
                    warn!("refresh of {:?} failed: {}", key, e);
                }
            }
        }
        Ok(refreshed)
    }
}
