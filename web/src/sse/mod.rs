//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the downstream stream.
//! The relay itself (upstream connector, registry, broadcast) lives in the
//! `sse` crate.

pub mod handler;
