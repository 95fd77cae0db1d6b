//! Periodic state push.
//!
//! The scheduler is polled once per supervisor quantum with the current
//! time. It fires when at least `interval` has passed since the last
//! fire and then restarts the interval from *now*, so lateness carries
//! over instead of being caught up.

use serde_json::{Value, json};
use tracing::trace;

use crate::client::StreamClient;
use crate::output::OutputState;

/// Event name used for state pushes.
pub const STATE_EVENT: &str = "state";

/// Default push interval in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 2_000;

#[derive(Debug, Clone)]
pub struct HeartbeatScheduler {
    interval_ms: u64,
    event: String,
    last_fire_ms: u64,
}

impl Default for HeartbeatScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL_MS)
    }
}

impl HeartbeatScheduler {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            event: STATE_EVENT.to_string(),
            last_fire_ms: 0,
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Returns `Some(now_ms)` when a push is due, and records the fire.
    pub fn poll(&mut self, now_ms: u64) -> Option<u64> {
        if now_ms.saturating_sub(self.last_fire_ms) < self.interval_ms {
            return None;
        }
        self.last_fire_ms = now_ms;
        Some(now_ms)
    }

    /// Poll and, when due, publish the state snapshot on `client`.
    ///
    /// Returns whether the scheduler fired, whether or not the client
    /// was connected to send it.
    pub fn tick(&mut self, now_ms: u64, output: &OutputState, client: &StreamClient) -> bool {
        let Some(now) = self.poll(now_ms) else {
            return false;
        };
        let sent = client.publish(&self.event, state_payload(now, output.get()));
        trace!(now, sent, "heartbeat");
        true
    }
}

/// Arguments of a state push: `[{"now": <ms>, "state": <bool>}]`.
pub fn state_payload(now_ms: u64, on: bool) -> Vec<Value> {
    vec![json!({ "now": now_ms, "state": on })]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_five_times_over_ten_seconds() {
        let mut hb = HeartbeatScheduler::new(2_000);
        let fires: Vec<u64> = (0..=10_000)
            .step_by(500)
            .filter_map(|t| hb.poll(t))
            .collect();
        assert_eq!(fires, vec![2_000, 4_000, 6_000, 8_000, 10_000]);
        assert!(fires.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn at_most_once_per_poll_and_no_catch_up() {
        let mut hb = HeartbeatScheduler::new(2_000);
        // A long stall fires once, not once per missed interval.
        assert_eq!(hb.poll(9_000), Some(9_000));
        assert_eq!(hb.poll(9_000), None);
        assert_eq!(hb.poll(10_999), None);
        assert_eq!(hb.poll(11_000), Some(11_000));
    }

    #[test]
    fn interval_restarts_from_fire_time() {
        let mut hb = HeartbeatScheduler::new(2_000);
        assert_eq!(hb.poll(1_500), None);
        assert_eq!(hb.poll(2_300), Some(2_300));
        // 4000 would be on schedule, but the next slot is 2300 + 2000.
        assert_eq!(hb.poll(4_000), None);
        assert_eq!(hb.poll(4_300), Some(4_300));
    }

    #[test]
    fn clock_going_backwards_does_not_fire() {
        let mut hb = HeartbeatScheduler::new(2_000);
        assert_eq!(hb.poll(5_000), Some(5_000));
        assert_eq!(hb.poll(100), None);
    }

    #[test]
    fn payload_carries_time_and_level() {
        assert_eq!(
            state_payload(4_000, true),
            vec![json!({"now": 4000, "state": true})]
        );
    }
}
