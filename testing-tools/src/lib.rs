// Testing Tools Library
//
// This crate provides testing utilities for the SSE relay.
// Currently includes:
// - relay-test-client: end-to-end checks against a running relay

pub mod health_client;
pub mod output;
pub mod scenarios;
pub mod sse_client;
