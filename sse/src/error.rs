//! Error types for the relay.
//!
//! Follows the same layout as the other crates in this workspace: a root
//! `Error` struct carrying an `error_kind` tree and an optional `source`.
//! Upstream errors never leave the relay; they are logged and answered with a
//! scheduled reconnect. Config errors surface from `Relay::new` at startup.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Upstream(UpstreamErrorKind),
    Config(ConfigErrorKind),
}

/// Ways a single upstream connection attempt can end badly.
#[derive(Debug, PartialEq)]
pub enum UpstreamErrorKind {
    /// The upstream answered with a non-success status code.
    Rejected(u16),
    /// The request could not be sent or the connection could not be made.
    Network,
    /// Reading the body failed after the stream had started.
    Stream,
    /// No bytes arrived within the configured idle timeout.
    IdleTimeout,
    /// A line grew past the parser's limit without a terminator.
    LineTooLong,
}

#[derive(Debug, PartialEq)]
pub enum ConfigErrorKind {
    InvalidTargetUrl,
    InvalidHeader(String),
    HttpClient,
}

impl Error {
    pub fn upstream(kind: UpstreamErrorKind) -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::Upstream(kind),
        }
    }

    pub fn config(kind: ConfigErrorKind) -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::Config(kind),
        }
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Upstream(UpstreamErrorKind::Rejected(status)) => {
                write!(f, "Upstream bad response: {status}")?
            }
            ErrorKind::Upstream(kind) => write!(f, "Upstream error: {kind:?}")?,
            ErrorKind::Config(ConfigErrorKind::InvalidHeader(line)) => {
                write!(f, "Config error: invalid upstream header {line:?}")?
            }
            ErrorKind::Config(kind) => write!(f, "Config error: {kind:?}")?,
        }

        match &self.source {
            Some(source) => write!(f, " ({source})"),
            None => Ok(()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_builder() {
            ErrorKind::Config(ConfigErrorKind::HttpClient)
        } else if err.is_body() || err.is_decode() {
            ErrorKind::Upstream(UpstreamErrorKind::Stream)
        } else if let Some(status) = err.status() {
            ErrorKind::Upstream(UpstreamErrorKind::Rejected(status.as_u16()))
        } else {
            ErrorKind::Upstream(UpstreamErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display_includes_status() {
        let err = Error::upstream(UpstreamErrorKind::Rejected(503));
        assert_eq!(err.to_string(), "Upstream bad response: 503");
    }

    #[test]
    fn test_display_appends_source() {
        let err = Error::upstream(UpstreamErrorKind::Stream)
            .with_source(std::io::Error::other("connection reset"));
        assert_eq!(err.to_string(), "Upstream error: Stream (connection reset)");
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn test_invalid_header_display_quotes_line() {
        let err = Error::config(ConfigErrorKind::InvalidHeader("no-colon".to_string()));
        assert_eq!(
            err.to_string(),
            "Config error: invalid upstream header \"no-colon\""
        );
    }
}
