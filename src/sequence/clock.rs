use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Time source for dwell timing.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep_until(&self, deadline: Instant);

    async fn sleep(&self, d: Duration) {
        self.sleep_until(self.now() + d).await;
    }
}

/// Tokio's timer. Under a paused runtime (`#[tokio::test(start_paused = true)]`) time only
/// advances when every task is idle, which makes it a virtual clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}
