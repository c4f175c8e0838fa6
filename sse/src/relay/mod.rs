//! The relay controller: one upstream subscription fanned out to many
//! downstream subscribers.
//!
//! All mutable relay state (upstream state, cursor, backoff, pending reconnect)
//! lives in one `RelayState` behind a single mutex. The lock is never held
//! across an `.await`; every transition happens atomically between suspension
//! points of the upstream task and the reconnect timer.

mod reconnect;
mod upstream;

use crate::backoff::Backoff;
use crate::connection::Subscription;
use crate::error::Error;
use crate::manager::Manager;
use crate::message::RelayEvent;
use log::*;
use reconnect::PendingReconnect;
use serde::Serialize;
use service::config::Config;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;
use upstream::UpstreamClient;

pub use upstream::parse_header_line;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamState {
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot served by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    pub upstream_connected: bool,
    pub clients: usize,
    pub last_event_id: Option<String>,
}

/// Handle to the relay. Cloning is cheap and every clone drives the same relay.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<Inner>,
}

struct Inner {
    upstream: UpstreamClient,
    manager: Manager,
    state: Mutex<RelayState>,
}

struct RelayState {
    upstream: UpstreamState,
    /// Incremented for every connection attempt; a finished attempt only
    /// touches the state if it is still the current one.
    attempt: u64,
    upstream_task: Option<AbortHandle>,
    cursor: Option<String>,
    backoff: Backoff,
    reconnect: Option<PendingReconnect>,
    reconnect_seq: u64,
    shut_down: bool,
}

impl Relay {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let upstream = UpstreamClient::new(config)?;
        let backoff = Backoff::new(
            config.reconnect_floor(),
            config.reconnect_ceiling(),
            config.reconnect_growth,
        );

        Ok(Self {
            inner: Arc::new(Inner {
                upstream,
                manager: Manager::new(),
                state: Mutex::new(RelayState {
                    upstream: UpstreamState::Disconnected,
                    attempt: 0,
                    upstream_task: None,
                    cursor: None,
                    backoff,
                    reconnect: None,
                    reconnect_seq: 0,
                    shut_down: false,
                }),
            }),
        })
    }

    /// Connect upstream now unless a connection is already in progress or established.
    pub fn start(&self) {
        info!("Starting upstream relay for {}", self.inner.upstream.target_url());
        self.connect();
    }

    /// Open the upstream connection. A no-op while connecting or connected, so at
    /// most one upstream request is ever in flight.
    pub fn connect(&self) {
        let mut state = self.lock_state();
        self.connect_locked(&mut state);
    }

    /// Register a downstream client and make sure the upstream is being pursued.
    ///
    /// A reconnect that is already scheduled is left to its timer, so client
    /// churn cannot bypass the backoff.
    pub fn subscribe(&self) -> Subscription {
        let subscription = self.inner.manager.subscribe();

        let mut state = self.lock_state();
        if state.upstream == UpstreamState::Disconnected && state.reconnect.is_none() {
            self.connect_locked(&mut state);
        }
        subscription
    }

    /// Push a record to every downstream client without touching the cursor.
    pub fn broadcast(&self, event: &RelayEvent) {
        self.inner.manager.broadcast(event);
    }

    pub fn upstream_state(&self) -> UpstreamState {
        self.lock_state().upstream
    }

    pub fn status(&self) -> RelayStatus {
        let state = self.lock_state();
        RelayStatus {
            upstream_connected: state.upstream != UpstreamState::Disconnected,
            clients: self.inner.manager.client_count(),
            last_event_id: state.cursor.clone(),
        }
    }

    /// Abort the in-flight upstream attempt and any pending reconnect. Best effort:
    /// nothing here can fail, and the stream is not drained.
    pub fn shutdown(&self) {
        let mut state = self.lock_state();
        state.shut_down = true;
        Self::cancel_reconnect_locked(&mut state);
        if let Some(task) = state.upstream_task.take() {
            task.abort();
        }
        state.upstream = UpstreamState::Disconnected;
        info!("Upstream relay shut down");
    }

    fn lock_state(&self) -> MutexGuard<'_, RelayState> {
        // The state stays consistent even if a holder panicked: every
        // transition is a handful of plain assignments.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
