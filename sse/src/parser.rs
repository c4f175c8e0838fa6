//! Incremental parser for the upstream `text/event-stream` body.
//!
//! - `event:` sets the record name, defaulting to `message`
//! - `data:` lines are joined with `\n`
//! - `id:` sets the record id (values containing NUL are ignored)
//! - lines starting with `:` are comments (upstream keep-alives)
//! - a blank line ends the record; records without any `data:` line are dropped
//!
//! Lines may end in `\n`, `\r\n` or `\r`. Bytes are buffered until a full line is
//! available, so multi-byte characters split across chunks decode correctly.
//! A parser lives for one upstream connection; each attempt starts a new one.

use crate::error::{Error, UpstreamErrorKind};
use crate::message::{RelayEvent, DEFAULT_EVENT_NAME};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Longest line buffered while waiting for its terminator.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Default)]
pub struct EventStreamParser {
    buffer: Vec<u8>,
    seen_first_line: bool,
    /// The previous chunk ended in CR, so a leading LF belongs to that line.
    skip_lf: bool,
    event: String,
    data: String,
    has_data: bool,
    id: Option<String>,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk from the upstream body and return every record it completes.
    ///
    /// Fails once an unterminated line grows past `MAX_LINE_BYTES`. Records
    /// completed by that same chunk are discarded with it; the cursor has not
    /// moved past them, so a resumed connection receives them again.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<RelayEvent>, Error> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(line) = self.next_line() {
            if let Some(record) = self.process_line(&line) {
                records.push(record);
            }
        }

        if self.buffer.len() > MAX_LINE_BYTES {
            return Err(Error::upstream(UpstreamErrorKind::LineTooLong));
        }
        Ok(records)
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        if self.skip_lf && !self.buffer.is_empty() {
            self.skip_lf = false;
            if self.buffer[0] == b'\n' {
                self.buffer.remove(0);
            }
        }

        let end = self.buffer.iter().position(|b| *b == b'\n' || *b == b'\r')?;
        let terminator = match (self.buffer[end], self.buffer.get(end + 1)) {
            (b'\r', Some(b'\n')) => 2,
            (b'\r', None) => {
                self.skip_lf = true;
                1
            }
            _ => 1,
        };

        let mut line: Vec<u8> = self.buffer.drain(..end + terminator).collect();
        line.truncate(end);

        if !self.seen_first_line {
            self.seen_first_line = true;
            if line.starts_with(BOM) {
                line.drain(..BOM.len());
            }
        }
        Some(line)
    }

    fn process_line(&mut self, line: &[u8]) -> Option<RelayEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        let line = String::from_utf8_lossy(line);
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_ref(), ""),
        };

        match field {
            "event" => self.event = value.to_string(),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            // `retry` only concerns browser EventSource reconnection; the relay has its own backoff.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<RelayEvent> {
        let event = std::mem::take(&mut self.event);
        let data = std::mem::take(&mut self.data);
        let id = self.id.take();

        if !std::mem::take(&mut self.has_data) {
            return None;
        }

        let event = if event.is_empty() {
            DEFAULT_EVENT_NAME.to_string()
        } else {
            event
        };
        Some(RelayEvent { event, id, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_event() {
        let mut parser = EventStreamParser::new();
        let records = parser.feed(b"event: message\nid: 1\ndata: hello\n\n").unwrap();

        assert_eq!(
            records,
            vec![RelayEvent::new("message", Some("1".to_string()), "hello")]
        );
    }

    #[test]
    fn test_missing_event_name_defaults_to_message() {
        let mut parser = EventStreamParser::new();
        let records = parser.feed(b"data: payload\n\n").unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event, "message");
        assert_eq!(records[0].id, None);
    }

    #[test]
    fn test_multiline_data_is_joined_with_newlines() {
        let mut parser = EventStreamParser::new();
        let records = parser.feed(b"data: line1\ndata: line2\ndata:line3\n\n").unwrap();

        assert_eq!(records[0].data, "line1\nline2\nline3");
    }

    #[test]
    fn test_data_is_not_trimmed_beyond_one_space() {
        let mut parser = EventStreamParser::new();
        let records = parser.feed(b"data:   {\"k\": \"v\"}  \n\n").unwrap();

        assert_eq!(records[0].data, "  {\"k\": \"v\"}  ");
    }

    #[test]
    fn test_comments_and_unknown_fields_are_ignored() {
        let mut parser = EventStreamParser::new();
        let records = parser
            .feed(b": ping\n\nretry: 1000\nfoo: bar\nevent: tick\ndata: 1\n\n")
            .unwrap();

        assert_eq!(records, vec![RelayEvent::new("tick", None, "1")]);
    }

    #[test]
    fn test_record_without_data_is_dropped() {
        let mut parser = EventStreamParser::new();
        let records = parser.feed(b"event: empty\nid: 7\n\ndata: next\n\n").unwrap();

        // The id and name of the dropped record do not leak into the next one
        assert_eq!(records, vec![RelayEvent::new("message", None, "next")]);
    }

    #[test]
    fn test_chunked_input_across_field_boundary() {
        let mut parser = EventStreamParser::new();

        assert!(parser.feed(b"event: test\nda").unwrap().is_empty());
        let records = parser.feed(b"ta: hello\n\n").unwrap();

        assert_eq!(records, vec![RelayEvent::new("test", None, "hello")]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let mut parser = EventStreamParser::new();
        let text = "data: 안녕\n\n".as_bytes();
        let (first, second) = text.split_at(8);

        assert!(parser.feed(first).unwrap().is_empty());
        let records = parser.feed(second).unwrap();

        assert_eq!(records[0].data, "안녕");
    }

    #[test]
    fn test_crlf_and_cr_line_endings() {
        let mut parser = EventStreamParser::new();
        let records = parser
            .feed(b"event: a\r\ndata: 1\r\n\r\nevent: b\rdata: 2\r\r")
            .unwrap();

        assert_eq!(
            records,
            vec![RelayEvent::new("a", None, "1"), RelayEvent::new("b", None, "2")]
        );
    }

    #[test]
    fn test_trailing_cr_dispatches_without_waiting_for_next_chunk() {
        let mut parser = EventStreamParser::new();

        let records = parser.feed(b"data: x\r\r").unwrap();
        assert_eq!(records, vec![RelayEvent::new("message", None, "x")]);

        // A following LF completes the CRLF pair instead of ending an empty line
        assert!(parser.feed(b"\ndata: y\r").unwrap().is_empty());
        let records = parser.feed(b"\n\r\n").unwrap();
        assert_eq!(records, vec![RelayEvent::new("message", None, "y")]);
    }

    #[test]
    fn test_unterminated_line_over_limit_is_an_error() {
        let mut parser = EventStreamParser::new();
        let mut chunk = b"data: ".to_vec();
        chunk.resize(MAX_LINE_BYTES + 1, b'a');

        let err = parser.feed(&chunk).unwrap_err();
        assert_eq!(
            err.error_kind,
            crate::error::ErrorKind::Upstream(UpstreamErrorKind::LineTooLong)
        );
    }

    #[test]
    fn test_long_terminated_line_is_accepted() {
        let mut parser = EventStreamParser::new();
        let mut chunk = b"data: ".to_vec();
        chunk.resize(MAX_LINE_BYTES, b'a');
        chunk.extend_from_slice(b"\n\n");

        let records = parser.feed(&chunk).unwrap();
        assert_eq!(records[0].data.len(), MAX_LINE_BYTES - "data: ".len());
    }

    #[test]
    fn test_crlf_split_between_chunks() {
        let mut parser = EventStreamParser::new();

        assert!(parser.feed(b"data: x\r").unwrap().is_empty());
        let records = parser.feed(b"\n\r\n").unwrap();

        assert_eq!(records, vec![RelayEvent::new("message", None, "x")]);
    }

    #[test]
    fn test_multiple_events_in_one_chunk_keep_order() {
        let mut parser = EventStreamParser::new();
        let records = parser
            .feed(b"id: 1\ndata: a\n\nid: 2\ndata: b\n\nid: 3\ndata: c\n\n")
            .unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_leading_bom_is_skipped() {
        let mut parser = EventStreamParser::new();
        let records = parser.feed(b"\xEF\xBB\xBFdata: hi\n\n").unwrap();

        assert_eq!(records, vec![RelayEvent::new("message", None, "hi")]);
    }

    #[test]
    fn test_id_with_nul_is_ignored() {
        let mut parser = EventStreamParser::new();
        let records = parser.feed(b"id: a\0b\ndata: x\n\n").unwrap();

        assert_eq!(records[0].id, None);
    }
}
