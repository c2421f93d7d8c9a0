//! Reconstructs a request/response record from a raw transaction dump.
//!
//! A dump is plain text: the request URL on the first line, then the request
//! header block, a blank line, the response header block, a blank line and
//! the response body. Bodies captured with chunked transfer encoding may
//! carry the chunk length on their first line and a terminating length on
//! their last line; those two markers are dropped.
//!
//! Parsing never fails. Missing sections simply leave fields empty.

use crate::domain::model::ParsedInteraction;

/// Section transitions only happen on blank lines past this index, so an
/// empty line right after the URL does not end the request header.
const MIN_TRANSITION_INDEX: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    AwaitingUrl,
    InRequestHeader,
    AwaitingResponseStatus,
    InResponseHeader,
    InResponseBody { start: usize },
}

struct InteractionParser {
    section: Section,
    body_end: usize,
    header: Vec<String>,
    body: Vec<String>,
    parsed: ParsedInteraction,
}

impl InteractionParser {
    fn new(body_end: usize) -> Self {
        Self {
            section: Section::AwaitingUrl,
            body_end,
            header: Vec::new(),
            body: Vec::new(),
            parsed: ParsedInteraction::default(),
        }
    }

    fn step(&mut self, index: usize, line: &str) {
        let blank = line.trim().is_empty();

        self.section = match self.section {
            Section::AwaitingUrl => {
                if !blank {
                    self.parsed.url = line.trim().to_string();
                }
                Section::InRequestHeader
            }
            Section::InRequestHeader if blank => {
                if index > MIN_TRANSITION_INDEX {
                    self.parsed.request_header = self.flush_header();
                    Section::AwaitingResponseStatus
                } else {
                    Section::InRequestHeader
                }
            }
            Section::InRequestHeader => {
                self.header.push(line.to_string());
                Section::InRequestHeader
            }
            // Consecutive blank lines after the request header are ignored.
            Section::AwaitingResponseStatus if blank => Section::AwaitingResponseStatus,
            Section::AwaitingResponseStatus => {
                if let Some((version, code, message)) = split_status_line(line) {
                    self.parsed.response_http_version = version;
                    self.parsed.response_status_code = code;
                    self.parsed.response_status_message = message;
                }
                self.header.push(line.to_string());
                Section::InResponseHeader
            }
            Section::InResponseHeader if blank && index > MIN_TRANSITION_INDEX => {
                self.parsed.response_header = self.flush_header();
                self.body.clear();
                Section::InResponseBody { start: index + 1 }
            }
            Section::InResponseHeader => {
                if !blank {
                    self.header.push(line.to_string());
                }
                Section::InResponseHeader
            }
            Section::InResponseBody { start } => {
                let at_edge = index == start || index == self.body_end;
                if !(at_edge && is_chunk_marker(line)) {
                    self.body.push(format!("{}\n", line));
                }
                Section::InResponseBody { start }
            }
        };
    }

    fn flush_header(&mut self) -> String {
        let joined = self.header.join("\n");
        self.header.clear();
        joined
    }

    fn finish(mut self) -> ParsedInteraction {
        self.parsed.response_body = self.body.join("\n");
        self.parsed
    }
}

/// Splits `HTTP/1.1 404 Not Found` into version, code and message. Returns
/// `None` when the line has fewer than three space separated tokens.
fn split_status_line(line: &str) -> Option<(String, String, String)> {
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() < 3 {
        return None;
    }
    Some((
        parts[0].to_string(),
        parts[1].to_string(),
        parts[2..].join(" "),
    ))
}

/// A chunk length line: bare hex digits that fit in a `u64`.
fn is_chunk_marker(line: &str) -> bool {
    !line.is_empty()
        && line.bytes().all(|b| b.is_ascii_hexdigit())
        && u64::from_str_radix(line, 16).is_ok()
}

/// Index of the last line before the run of blank lines left by the file's
/// terminating newline(s). With exactly one trailing newline this is
/// `lines.len() - 2`.
fn last_content_index(lines: &[&str]) -> usize {
    lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .unwrap_or(0)
}

/// Parses the full content of a capture file.
///
/// Lines are split on `\n`; a trailing `\r` is treated as part of the line
/// terminator.
pub fn parse_interaction(raw: &[u8]) -> ParsedInteraction {
    let text = String::from_utf8_lossy(raw);
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let mut parser = InteractionParser::new(last_content_index(&lines));
    for (index, line) in lines.iter().enumerate() {
        parser.step(index, line);
    }

    let parsed = parser.finish();
    tracing::debug!(
        "Parsed interaction for '{}' (status {}, {} body bytes)",
        parsed.url,
        if parsed.response_status_code.is_empty() {
            "-"
        } else {
            parsed.response_status_code.as_str()
        },
        parsed.response_body.len()
    );
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(body: &str) -> String {
        format!(
            "GET /x HTTP/1.1\n\
             \n\
             GET /x HTTP/1.1\n\
             Host: example.com\n\
             Accept: */*\n\
             \n\
             HTTP/1.1 200 OK\n\
             Content-Type: text/plain\n\
             \n\
             {}",
            body
        )
    }

    #[test]
    fn test_url_is_trimmed_first_line() {
        let parsed = parse_interaction(b"  GET /x HTTP/1.1  \n\nHost: a\nX: 1\n\nHTTP/1.1 200 OK\n\nbody\n");
        assert_eq!(parsed.url, "GET /x HTTP/1.1");
    }

    #[test]
    fn test_sections_are_split_on_blank_lines() {
        let parsed = parse_interaction(dump("hello\nworld\n").as_bytes());

        assert_eq!(
            parsed.request_header,
            "GET /x HTTP/1.1\nHost: example.com\nAccept: */*"
        );
        assert_eq!(parsed.response_header, "HTTP/1.1 200 OK\nContent-Type: text/plain");
        assert_eq!(parsed.response_http_version, "HTTP/1.1");
        assert_eq!(parsed.response_status_code, "200");
        assert_eq!(parsed.response_status_message, "OK");
        // each body entry keeps its newline and entries are joined by another one
        assert_eq!(parsed.response_body, "hello\n\nworld\n\n\n");
    }

    #[test]
    fn test_multi_word_status_message() {
        let raw = "GET /missing HTTP/1.1\n\nHost: a\nAccept: */*\n\nHTTP/1.1 404 Not Found\nServer: x\n\nnope\n";
        let parsed = parse_interaction(raw.as_bytes());

        assert_eq!(parsed.response_http_version, "HTTP/1.1");
        assert_eq!(parsed.response_status_code, "404");
        assert_eq!(parsed.response_status_message, "Not Found");
    }

    #[test]
    fn test_short_status_line_leaves_fields_empty() {
        let raw = "GET / HTTP/1.1\n\nHost: a\nAccept: */*\n\nHTTP/2 200\nServer: x\n\nok\n";
        let parsed = parse_interaction(raw.as_bytes());

        assert!(parsed.response_http_version.is_empty());
        assert!(parsed.response_status_code.is_empty());
        assert!(parsed.response_status_message.is_empty());
        assert_eq!(parsed.response_header, "HTTP/2 200\nServer: x");
    }

    #[test]
    fn test_chunk_markers_dropped_only_at_body_edges() {
        let parsed = parse_interaction(dump("1a3\nfirst\n1a3\nlast\n1a3\n").as_bytes());

        assert_eq!(parsed.response_body, "first\n\n1a3\n\nlast\n\n\n");
    }

    #[test]
    fn test_zero_terminator_is_dropped() {
        let parsed = parse_interaction(dump("2b\n{\"ok\":true}\n0\n").as_bytes());
        assert_eq!(parsed.response_body, "{\"ok\":true}\n\n\n");
    }

    #[test]
    fn test_hex_looking_body_line_in_the_middle_is_kept() {
        let parsed = parse_interaction(dump("text\ncafe\nmore\n").as_bytes());
        assert_eq!(parsed.response_body, "text\n\ncafe\n\nmore\n\n\n");
    }

    #[test]
    fn test_early_blank_line_does_not_end_request_header() {
        // blank at index 3 is still below the transition threshold
        let raw = "GET /a HTTP/1.1\nHost: a\nAccept: */*\n\nX-Trace: 1\n\nHTTP/1.1 204 No Content\n\n";
        let parsed = parse_interaction(raw.as_bytes());

        assert_eq!(parsed.request_header, "Host: a\nAccept: */*\nX-Trace: 1");
        assert_eq!(parsed.response_status_code, "204");
        assert_eq!(parsed.response_status_message, "No Content");
    }

    #[test]
    fn test_blank_line_inside_body_is_kept() {
        let parsed = parse_interaction(dump("hello\n\nworld\n").as_bytes());

        assert_eq!(parsed.response_header, "HTTP/1.1 200 OK\nContent-Type: text/plain");
        assert_eq!(parsed.response_body, "hello\n\n\n\nworld\n\n\n");
    }

    #[test]
    fn test_consecutive_blank_lines_trigger_one_transition() {
        let raw = "GET /a HTTP/1.1\n\nHost: a\nAccept: */*\n\n\n\nHTTP/1.1 200 OK\nServer: x\n\n\nbody\n";
        let parsed = parse_interaction(raw.as_bytes());

        assert_eq!(parsed.request_header, "Host: a\nAccept: */*");
        assert_eq!(parsed.response_header, "HTTP/1.1 200 OK\nServer: x");
        assert_eq!(parsed.response_body, "\n\nbody\n\n\n");
    }

    #[test]
    fn test_truncated_dump_degrades_to_partial_record() {
        let parsed = parse_interaction(b"GET /a HTTP/1.1\n\nHost: a\n");

        assert_eq!(parsed.url, "GET /a HTTP/1.1");
        assert!(parsed.request_header.is_empty());
        assert!(parsed.response_header.is_empty());
        assert!(parsed.response_body.is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_interaction(b""), ParsedInteraction::default());
    }

    #[test]
    fn test_crlf_line_endings() {
        let raw = "GET /x HTTP/1.1\r\n\r\nHost: a\r\nAccept: */*\r\n\r\nHTTP/1.1 200 OK\r\nServer: x\r\n\r\n5\r\nhello\r\n0\r\n";
        let parsed = parse_interaction(raw.as_bytes());

        assert_eq!(parsed.response_status_message, "OK");
        assert_eq!(parsed.response_header, "HTTP/1.1 200 OK\nServer: x");
        assert_eq!(parsed.response_body, "hello\n\n\n");
    }

    #[test]
    fn test_body_end_without_trailing_newline() {
        let parsed = parse_interaction(dump("4\nbody\n0").as_bytes());
        assert_eq!(parsed.response_body, "body\n");
    }

    #[test]
    fn test_is_chunk_marker() {
        assert!(is_chunk_marker("1a3"));
        assert!(is_chunk_marker("0"));
        assert!(is_chunk_marker("FFFF"));
        assert!(!is_chunk_marker(""));
        assert!(!is_chunk_marker("+1a"));
        assert!(!is_chunk_marker("0x1a"));
        assert!(!is_chunk_marker("1a3 "));
        assert!(!is_chunk_marker("fffffffffffffffff"));
    }
}
