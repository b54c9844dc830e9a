use rand::Rng;
use std::time::Duration;

use crate::config::TimingConfig;

/// Delay from the start of one poll cycle to the start of the next: the poll
/// interval plus a random jitter. Jitter is clipped at
/// [`TimingConfig::renewal_deadline`] so that a slow cycle still renews
/// before the lease written by the previous one expires.
pub fn next_poll_delay(timing: &TimingConfig) -> Duration {
    if timing.max_jitter.is_zero() {
        return timing.poll_interval;
    }
    let mut rng = rand::thread_rng();
    let jitter_ms = rng.gen_range(0..=timing.max_jitter.as_millis() as u64);
    (timing.poll_interval + Duration::from_millis(jitter_ms)).min(timing.renewal_deadline())
}
