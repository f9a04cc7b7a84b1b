//! Process-wide pacing of upstream requests.

use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum spacing (plus random jitter) between consecutive upstream calls.
///
/// Callers reserve the next free slot under a short lock and then sleep
/// outside of it, so waiting callers queue up in reservation order.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    jitter: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    #[must_use]
    pub fn new(min_interval: Duration, jitter: Duration) -> Self {
        Self {
            min_interval,
            jitter,
            next_slot: Mutex::new(None),
        }
    }

    /// Waits until this caller may issue a request and returns how long it slept.
    pub async fn wait(&self) -> Duration {
        let delay = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next_slot.filter(|slot| *slot > now).unwrap_or(now);
            *next_slot = Some(slot + self.min_interval + sample_jitter(self.jitter));
            slot.saturating_duration_since(now)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        delay
    }
}

/// Uniform sample in `[0, max)`; zero when `max` is zero.
pub(crate) fn sample_jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    max.mul_f64(rand::thread_rng().gen_range(0.0..1.0))
}
