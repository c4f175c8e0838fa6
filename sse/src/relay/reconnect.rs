//! Reconnection scheduler: at most one pending reconnect timer per relay.

use super::{Relay, RelayState};
use log::*;
use tokio::task::AbortHandle;

pub(super) struct PendingReconnect {
    seq: u64,
    timer: AbortHandle,
}

impl Relay {
    /// Replace any pending reconnect with a new one after the current backoff delay.
    pub(super) fn schedule_reconnect_locked(&self, state: &mut RelayState) {
        if state.shut_down {
            return;
        }
        Self::cancel_reconnect_locked(state);

        state.reconnect_seq += 1;
        let seq = state.reconnect_seq;
        let delay = state.backoff.current();
        info!("Reconnecting upstream in {} ms", delay.as_millis());

        let relay = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            relay.fire_reconnect(seq);
        });
        state.reconnect = Some(PendingReconnect {
            seq,
            timer: timer.abort_handle(),
        });
    }

    pub(super) fn cancel_reconnect_locked(state: &mut RelayState) {
        if let Some(pending) = state.reconnect.take() {
            pending.timer.abort();
        }
    }

    /// Connect, then grow the delay for the next wait. Growth does not depend on
    /// whether this connect succeeds; the connector resets it once data flows.
    fn fire_reconnect(&self, seq: u64) {
        let mut state = self.lock_state();
        // A timer that was replaced but had already woken up does nothing
        if !matches!(&state.reconnect, Some(pending) if pending.seq == seq) {
            return;
        }
        state.reconnect = None;

        self.connect_locked(&mut state);
        state.backoff.grow();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::UpstreamState;
    use clap::Parser;
    use service::config::Config;
    use std::time::Duration;

    fn relay(floor_ms: u64) -> Relay {
        // Port 9 (discard) refuses connections, so every attempt fails fast
        let config = Config::parse_from([
            "sse_relay",
            "--target-url",
            "http://127.0.0.1:9/events",
            "--reconnect-floor-ms",
            &floor_ms.to_string(),
        ]);
        Relay::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_rescheduling_replaces_pending_timer() {
        let relay = relay(60_000);
        let mut state = relay.lock_state();

        relay.schedule_reconnect_locked(&mut state);
        let first = state.reconnect.as_ref().map(|p| p.seq);
        relay.schedule_reconnect_locked(&mut state);
        let second = state.reconnect.as_ref().map(|p| p.seq);

        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
        assert_eq!(state.reconnect_seq, 2);
        drop(state);
        relay.shutdown();
    }

    #[tokio::test]
    async fn test_stale_timer_does_nothing() {
        let relay = relay(60_000);
        {
            let mut state = relay.lock_state();
            relay.schedule_reconnect_locked(&mut state);
            relay.schedule_reconnect_locked(&mut state);
        }

        relay.fire_reconnect(1);

        let state = relay.lock_state();
        assert_eq!(state.upstream, UpstreamState::Disconnected);
        assert!(state.reconnect.is_some());
        assert_eq!(state.backoff.current(), Duration::from_millis(60_000));
        drop(state);
        relay.shutdown();
    }

    #[tokio::test]
    async fn test_firing_connects_then_grows_backoff() {
        let relay = relay(1_000);
        {
            let mut state = relay.lock_state();
            relay.schedule_reconnect_locked(&mut state);
        }

        relay.fire_reconnect(1);

        let state = relay.lock_state();
        assert_eq!(state.upstream, UpstreamState::Connecting);
        assert!(state.reconnect.is_none());
        assert_eq!(state.backoff.current(), Duration::from_millis(1_500));
        drop(state);
        relay.shutdown();
    }

    #[tokio::test]
    async fn test_consecutive_failures_follow_backoff_curve() {
        let relay = relay(20);
        relay.start();

        // Failed attempts: 0, 20, 50, 95, 162 ms ... each failure waits the grown delay
        tokio::time::sleep(Duration::from_millis(400)).await;

        // Every attempt after the first came from a timer, and each timer grew the delay once
        let state = relay.lock_state();
        let attempts = state.attempt;
        assert!(attempts >= 3, "only {attempts} attempts in 400 ms");
        let growth_steps = (attempts - 1) as i32;
        let expected = (20f64 * 1.5f64.powi(growth_steps)).min(30_000f64).floor() as u64;
        assert_eq!(
            state.backoff.current(),
            Duration::from_millis(expected),
            "after {attempts} attempts"
        );
        assert!(state.cursor.is_none());
        drop(state);
        relay.shutdown();
    }

    #[tokio::test]
    async fn test_no_reconnect_after_shutdown() {
        let relay = relay(10);
        relay.shutdown();

        let mut state = relay.lock_state();
        relay.schedule_reconnect_locked(&mut state);
        assert!(state.reconnect.is_none());
    }
}
