//! Minimum-spacing pacer for upstream requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct PacerInner {
    last_request: Option<Instant>,
    min_spacing: Duration,
}

/// Serializes upstream calls so consecutive requests are at least
/// `min_spacing` apart, across every clone.
///
/// The mutex is held for the whole wait, so concurrent callers queue up
/// and each gets its own full spacing window. A deferral is a designed
/// wait, not an error.
#[derive(Clone)]
pub struct RequestPacer {
    inner: Arc<Mutex<PacerInner>>,
}

impl RequestPacer {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PacerInner {
                last_request: None,
                min_spacing,
            })),
        }
    }

    /// Wait out the remainder of the spacing window, then stamp the clock.
    pub async fn pace(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(last) = inner.last_request {
            let elapsed = last.elapsed();
            if elapsed < inner.min_spacing {
                let wait = inner.min_spacing - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "pacing upstream request");
                tokio::time::sleep(wait).await;
            }
        }
        inner.last_request = Some(Instant::now());
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_call_does_not_wait() {
        let pacer = RequestPacer::new(Duration::from_secs(60));
        let start = Instant::now();
        pacer.pace().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_second_call_is_spaced() {
        let pacer = RequestPacer::new(Duration::from_millis(50));
        pacer.pace().await;
        let start = Instant::now();
        pacer.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn test_clones_share_the_window() {
        let pacer = RequestPacer::new(Duration::from_millis(50));
        pacer.pace().await;
        let clone = pacer.clone();
        let start = Instant::now();
        clone.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(45));
    }
}
