//! Upstream connector: owns the single streaming GET to the target URL.

use super::{Relay, RelayState, UpstreamState};
use crate::error::{ConfigErrorKind, Error, UpstreamErrorKind};
use crate::message::RelayEvent;
use crate::parser::EventStreamParser;
use futures_util::StreamExt;
use log::*;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL, CONNECTION};
use reqwest::Url;
use service::config::Config;
use std::time::Duration;

const LAST_EVENT_ID: &str = "last-event-id";

pub(super) struct UpstreamClient {
    http: reqwest::Client,
    target_url: Url,
    headers: HeaderMap,
    idle_timeout: Option<Duration>,
}

impl UpstreamClient {
    pub(super) fn new(config: &Config) -> Result<Self, Error> {
        let target_url = Url::parse(config.target_url()).map_err(|e| {
            error!("Invalid upstream target URL {:?}: {e}", config.target_url());
            Error::config(ConfigErrorKind::InvalidTargetUrl).with_source(e)
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        for line in config.upstream_headers() {
            let (name, value) = parse_header_line(line)?;
            headers.insert(name, value);
        }

        // No total timeout: the response body is meant to stay open indefinitely
        let http = reqwest::Client::builder()
            .connect_timeout(config.upstream_connect_timeout())
            .user_agent(format!("sse-relay/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(ConfigErrorKind::HttpClient).with_source(e))?;

        Ok(Self {
            http,
            target_url,
            headers,
            idle_timeout: config.upstream_idle_timeout(),
        })
    }

    pub(super) fn target_url(&self) -> &Url {
        &self.target_url
    }

    fn request_headers(&self, cursor: Option<&str>) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Some(value) = cursor.and_then(|id| HeaderValue::from_str(id).ok()) {
            headers.insert(LAST_EVENT_ID, value);
        }
        headers
    }

    async fn open(&self, cursor: Option<&str>) -> Result<reqwest::Response, Error> {
        let response = self
            .http
            .get(self.target_url.clone())
            .headers(self.request_headers(cursor))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::upstream(UpstreamErrorKind::Rejected(status.as_u16())));
        }
        Ok(response)
    }
}

/// Parse a configured `Name: value` header line.
pub fn parse_header_line(line: &str) -> Result<(HeaderName, HeaderValue), Error> {
    let invalid = || Error::config(ConfigErrorKind::InvalidHeader(line.to_string()));

    let (name, value) = line.split_once(':').ok_or_else(invalid)?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|_| invalid())?;
    Ok((name, value))
}

impl Relay {
    /// Start a connection attempt unless one is already in flight.
    pub(super) fn connect_locked(&self, state: &mut RelayState) {
        if state.shut_down || state.upstream != UpstreamState::Disconnected {
            return;
        }
        Self::cancel_reconnect_locked(state);

        state.upstream = UpstreamState::Connecting;
        state.attempt += 1;
        let attempt = state.attempt;
        let cursor = state.cursor.clone();

        match &cursor {
            Some(id) => info!(
                "Connecting upstream: {} (Last-Event-ID: {id})",
                self.inner.upstream.target_url()
            ),
            None => info!("Connecting upstream: {}", self.inner.upstream.target_url()),
        }

        let relay = self.clone();
        let task = tokio::spawn(async move { relay.run_attempt(attempt, cursor).await });
        state.upstream_task = Some(task.abort_handle());
    }

    /// Drive one attempt to its end, then hand over to the reconnection scheduler.
    /// An aborted attempt never gets here, so cancellation does not reconnect.
    async fn run_attempt(self, attempt: u64, cursor: Option<String>) {
        match self.stream_upstream(attempt, cursor.as_deref()).await {
            Ok(()) => warn!("Upstream ended naturally. Scheduling reconnect..."),
            Err(e) => error!("Upstream error: {e}"),
        }

        let mut state = self.lock_state();
        if state.attempt != attempt {
            return;
        }
        state.upstream = UpstreamState::Disconnected;
        state.upstream_task = None;
        self.schedule_reconnect_locked(&mut state);
    }

    async fn stream_upstream(&self, attempt: u64, cursor: Option<&str>) -> Result<(), Error> {
        let upstream = &self.inner.upstream;
        let response = upstream.open(cursor).await?;

        {
            let mut state = self.lock_state();
            if state.attempt != attempt {
                return Ok(());
            }
            state.upstream = UpstreamState::Connected;
            state.backoff.reset();
        }
        info!("Upstream connected ({})", response.status());

        let mut body = response.bytes_stream();
        let mut parser = EventStreamParser::new();

        loop {
            let next = match upstream.idle_timeout {
                Some(idle) => tokio::time::timeout(idle, body.next())
                    .await
                    .map_err(|_| Error::upstream(UpstreamErrorKind::IdleTimeout))?,
                None => body.next().await,
            };

            let Some(chunk) = next else {
                return Ok(());
            };
            let chunk =
                chunk.map_err(|e| Error::upstream(UpstreamErrorKind::Stream).with_source(e))?;

            for record in parser.feed(&chunk)? {
                self.dispatch(record);
            }
        }
    }

    /// Advance the cursor, then fan the record out.
    fn dispatch(&self, record: RelayEvent) {
        if let Some(id) = record.cursor_id() {
            self.lock_state().cursor = Some(id.to_string());
        }
        self.inner.manager.broadcast(&record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use clap::Parser;

    fn client(extra: &[&str]) -> UpstreamClient {
        let mut args = vec!["sse_relay", "--target-url", "http://localhost:9000/events"];
        for &header in extra {
            args.push("--upstream-headers");
            args.push(header);
        }
        UpstreamClient::new(&Config::parse_from(args)).unwrap()
    }

    #[test]
    fn test_parse_header_line_trims_name_and_value() {
        let (name, value) = parse_header_line("  Authorization :  Bearer abc ").unwrap();
        assert_eq!(name.as_str(), "authorization");
        assert_eq!(value, "Bearer abc");
    }

    #[test]
    fn test_parse_header_line_keeps_colons_in_value() {
        let (name, value) = parse_header_line("X-Origin: http://example.com:8080").unwrap();
        assert_eq!(name.as_str(), "x-origin");
        assert_eq!(value, "http://example.com:8080");
    }

    #[test]
    fn test_parse_header_line_rejects_malformed_lines() {
        for line in ["no-colon", "bad name: x", ": empty-name"] {
            let err = parse_header_line(line).unwrap_err();
            assert_eq!(
                err.error_kind,
                ErrorKind::Config(ConfigErrorKind::InvalidHeader(line.to_string()))
            );
        }
    }

    #[test]
    fn test_request_headers_without_cursor() {
        let headers = client(&[]).request_headers(None);

        assert_eq!(headers[ACCEPT], "text/event-stream");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
        assert_eq!(headers[CONNECTION], "keep-alive");
        assert!(!headers.contains_key("last-event-id"));
    }

    #[test]
    fn test_request_headers_resume_from_cursor() {
        let headers = client(&[]).request_headers(Some("42"));
        assert_eq!(headers["last-event-id"], "42");
    }

    #[test]
    fn test_configured_headers_are_added() {
        let headers =
            client(&["X-Api-Key: secret", "Accept: text/event-stream"]).request_headers(None);

        assert_eq!(headers["x-api-key"], "secret");
        assert_eq!(headers.get_all(ACCEPT).iter().count(), 1);
    }

    #[test]
    fn test_invalid_header_fails_client_construction() {
        let config = Config::parse_from([
            "sse_relay",
            "--target-url",
            "http://localhost:9000/events",
            "--upstream-headers",
            "missing separator",
        ]);

        let err = UpstreamClient::new(&config).err().expect("expected an error");
        assert_eq!(
            err.error_kind,
            ErrorKind::Config(ConfigErrorKind::InvalidHeader("missing separator".to_string()))
        );
    }
}
