use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::CacheError;
use crate::memory::IntelligenceCache;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Background job that periodically removes expired cache entries.
///
/// Owned by whoever started it. `shutdown` stops it and waits for the loop to
/// exit; dropping the sweeper cancels it without waiting.
pub struct CacheSweeper {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    /// Spawn the sweep loop on the current tokio runtime.
    pub fn start(cache: Arc<IntelligenceCache>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let handle = tokio::spawn(sweep_loop(cache, interval, cancel.clone()));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Returns a CancellationToken that can be used to stop the sweeper.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn shutdown(mut self) -> Result<(), CacheError> {
        self.cancel.cancel();
        match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| CacheError::Sweeper(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn sweep_loop(cache: Arc<IntelligenceCache>, interval: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Cache sweeper shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                let removed = cache.sweep_expired().await;
                if removed > 0 {
                    tracing::info!(removed, "Removed expired cache entries");
                } else {
                    tracing::trace!("Cache sweep found nothing to remove");
                }
            }
        }
    }
}
