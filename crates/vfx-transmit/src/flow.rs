//! Per-business submission spacing.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use vfx_core::BusinessId;

/// Remembers each business's last submission attempt and delays the next
/// one until the configured interval has elapsed.
///
/// Uses tokio's clock so paused-time tests observe real spacing.
#[derive(Debug, Default)]
pub struct FlowControl {
    last_attempt: DashMap<BusinessId, Instant>,
}

impl FlowControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left before `business_id` may submit again.
    pub fn remaining(&self, business_id: &BusinessId, interval: Duration) -> Duration {
        self.last_attempt
            .get(business_id)
            .map(|last| (*last + interval).saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Sleep until the business may submit, then record the attempt.
    ///
    /// Callers serialize submissions per business, so no two waits for the
    /// same business overlap.
    pub async fn wait_turn(&self, business_id: &BusinessId, interval: Duration) {
        let wait = self.remaining(business_id, interval);
        if !wait.is_zero() {
            tracing::debug!(
                business_id = %business_id,
                wait_ms = wait.as_millis() as u64,
                "flow control delaying submission"
            );
            tokio::time::sleep(wait).await;
        }
        self.last_attempt.insert(business_id.clone(), Instant::now());
    }
}
