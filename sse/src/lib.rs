//! Server-Sent Events relay core.
//!
//! Holds one upstream SSE subscription and re-broadcasts every record it
//! receives to any number of downstream SSE clients. Downstream churn never
//! touches the upstream connection, and upstream failures never reach the
//! downstream clients; they just stop receiving until the relay reconnects.
//!
//! # Architecture
//!
//! - **Single upstream**: exactly one connection attempt is in flight at a time.
//!   It resumes with `Last-Event-ID` set to the last id seen.
//! - **Reconnect on any termination**: a clean end of stream is treated like an
//!   error and answered with a reconnect after an exponential backoff
//!   (2 s growing by 1.5x up to 30 s by default, reset once data flows).
//! - **Best-effort fan-out**: each client gets an unbounded channel; a client
//!   whose channel is closed is evicted at the next broadcast.
//! - **No replay**: a client only sees records that arrive after it subscribed.
//!
//! # Message Flow
//!
//! 1. `Relay::start` (or the first `Relay::subscribe`) opens the upstream GET
//! 2. Each body chunk goes through the `EventStreamParser`
//! 3. Every completed record advances the cursor when it has an id
//! 4. The `Manager` serializes the record once and pushes it to every client
//! 5. The `web` crate renders each payload as a `data: <json>` SSE frame
//!
//! # Modules
//!
//! - `message`: the relayed `RelayEvent` record
//! - `parser`: incremental `text/event-stream` parser
//! - `connection`: `ConnectionRegistry` and the self-unregistering `Subscription`
//! - `manager`: serialization and broadcast over the registry
//! - `backoff`: bounded exponential reconnect delay
//! - `relay`: the `Relay` controller, upstream connector and reconnect scheduler
//! - `error`: relay error kinds

pub mod backoff;
pub mod connection;
pub mod error;
pub mod manager;
pub mod message;
pub mod parser;
pub mod relay;

pub use manager::Manager;
pub use relay::{Relay, RelayStatus, UpstreamState};
