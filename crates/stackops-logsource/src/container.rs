//! Container log adapter.
//!
//! Reads `/containers/{id}/logs` from the container engine API over its unix
//! socket (through `curl`). Pagination tokens are the RFC3339 timestamps the
//! engine prefixes to every line when `timestamps=1`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::entry::{Direction, FetchPage, LogEntry, LogStream, TargetId};
use crate::error::LogSourceError;
use crate::process::ProcessRunner;
use crate::source::{finalize_page, LogSource};

/// Size of the frame header the engine puts in front of every chunk of a
/// non-TTY container's combined output.
const FRAME_HEADER_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct ContainerSourceConfig {
    pub socket_path: PathBuf,
    pub api_version: String,
    pub curl_binary: String,
}

impl Default for ContainerSourceConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/var/run/docker.sock"),
            api_version: "v1.43".to_owned(),
            curl_binary: "curl".to_owned(),
        }
    }
}

/// [`LogSource`] for container stdout/stderr.
pub struct ContainerLogSource {
    runner: Arc<dyn ProcessRunner>,
    config: ContainerSourceConfig,
}

impl ContainerLogSource {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: ContainerSourceConfig) -> Self {
        Self { runner, config }
    }

    /// Full engine URL for one page request.
    pub fn logs_url(
        &self,
        container: &str,
        direction: Direction,
        from_token: &str,
        page_size: usize,
    ) -> Result<String, LogSourceError> {
        let mut url = format!(
            "http://localhost/{}/containers/{}/logs?stdout=1&stderr=1&timestamps=1",
            self.config.api_version,
            encode_path_segment(container)
        );
        if from_token.is_empty() {
            url.push_str(&format!("&tail={page_size}"));
            return Ok(url);
        }
        let position = token_to_unix(from_token)?;
        match direction {
            // The engine applies `tail` before `until`, so the two cannot be
            // combined. Everything up to the boundary is read and
            // `finalize_page` keeps the newest lines.
            Direction::Backward => {
                url.push_str(&format!("&until={position}"));
            }
            Direction::Forward => {
                url.push_str(&format!("&since={position}"));
            }
        }
        Ok(url)
    }

    fn curl_args(&self, url: String) -> Vec<String> {
        vec![
            "--silent".to_owned(),
            "--show-error".to_owned(),
            "--fail".to_owned(),
            "--unix-socket".to_owned(),
            self.config.socket_path.display().to_string(),
            url,
        ]
    }
}

#[async_trait]
impl LogSource for ContainerLogSource {
    fn name(&self) -> &'static str {
        "container"
    }

    async fn fetch(
        &self,
        target: &TargetId,
        direction: Direction,
        from_token: &str,
        page_size: usize,
    ) -> Result<FetchPage, LogSourceError> {
        let url = self.logs_url(&target.name, direction, from_token, page_size)?;
        let body = self
            .runner
            .run(&self.config.curl_binary, &self.curl_args(url))
            .await
            .map_err(|err| match err {
                LogSourceError::Unavailable { message } if message.contains("404") => {
                    LogSourceError::NotFound {
                        target: target.to_string(),
                    }
                }
                other => other,
            })?;

        // The engine already returns lines oldest first in every direction.
        let entries = parse_log_body(&body, Utc::now());
        tracing::debug!(
            log_target = %target,
            %direction,
            lines = entries.len(),
            "container logs fetched"
        );
        Ok(finalize_page(entries, direction, from_token, page_size))
    }
}

/// Split the engine's combined stream into `(stream, payload)` frames.
///
/// A body that does not start with a valid frame header (TTY containers)
/// is returned as a single stdout payload.
pub fn demux(body: &[u8]) -> Vec<(LogStream, &[u8])> {
    if !looks_multiplexed(body) {
        if body.is_empty() {
            return Vec::new();
        }
        return vec![(LogStream::Stdout, body)];
    }

    let mut frames = Vec::new();
    let mut rest = body;
    while rest.len() >= FRAME_HEADER_LEN {
        let stream = match rest[0] {
            2 => LogStream::Stderr,
            _ => LogStream::Stdout,
        };
        let len = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let end = FRAME_HEADER_LEN.saturating_add(len).min(rest.len());
        frames.push((stream, &rest[FRAME_HEADER_LEN..end]));
        rest = &rest[end..];
    }
    frames
}

fn looks_multiplexed(body: &[u8]) -> bool {
    body.len() >= FRAME_HEADER_LEN && body[0] <= 2 && body[1..4] == [0, 0, 0]
}

/// Decode a logs response into entries, one per line.
pub fn parse_log_body(body: &[u8], fetched_at: DateTime<Utc>) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    for (stream, payload) in demux(body) {
        let text = String::from_utf8_lossy(payload);
        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            entries.push(parse_line(line, stream, fetched_at));
        }
    }
    entries
}

/// Parse `<rfc3339> <message>`. Lines without a leading timestamp are kept
/// and stamped with the fetch time.
pub fn parse_line(line: &str, stream: LogStream, fetched_at: DateTime<Utc>) -> LogEntry {
    if let Some((stamp, message)) = line.split_once(' ') {
        if let Ok(ts) = DateTime::parse_from_rfc3339(stamp) {
            return LogEntry {
                timestamp: ts.with_timezone(&Utc),
                stream,
                origin: None,
                message: message.to_owned(),
                token: stamp.to_owned(),
            };
        }
    }
    LogEntry {
        timestamp: fetched_at,
        stream,
        origin: None,
        message: line.to_owned(),
        token: fetched_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
    }
}

/// Convert an RFC3339 token to the `seconds.nanoseconds` form the engine
/// accepts for `since` / `until`.
pub fn token_to_unix(token: &str) -> Result<String, LogSourceError> {
    let ts = DateTime::parse_from_rfc3339(token).map_err(|_| LogSourceError::InvalidToken {
        token: token.to_owned(),
    })?;
    Ok(format!("{}.{:09}", ts.timestamp(), ts.timestamp_subsec_nanos()))
}

fn encode_path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn frame(stream: u8, payload: &str) -> Vec<u8> {
        let mut out = vec![stream, 0, 0, 0];
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload.as_bytes());
        out
    }

    fn fetched_at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_800_000_000, 0).single().unwrap_or_default()
    }

    #[test]
    fn demux_splits_stdout_and_stderr_frames() {
        let mut body = frame(1, "2024-01-01T00:00:00.1Z out\n");
        body.extend(frame(2, "2024-01-01T00:00:00.2Z err\n"));
        let entries = parse_log_body(&body, fetched_at());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stream, LogStream::Stdout);
        assert_eq!(entries[0].message, "out");
        assert_eq!(entries[0].token, "2024-01-01T00:00:00.1Z");
        assert_eq!(entries[1].stream, LogStream::Stderr);
        assert_eq!(entries[1].message, "err");
    }

    #[test]
    fn tty_body_is_read_as_raw_stdout() {
        let body = b"2024-01-01T00:00:00Z hello\r\n2024-01-01T00:00:01Z world\n";
        let entries = parse_log_body(body, fetched_at());
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.stream == LogStream::Stdout));
        assert_eq!(entries[0].message, "hello");
    }

    #[test]
    fn truncated_frame_is_kept_up_to_available_bytes() {
        let mut body = frame(1, "2024-01-01T00:00:00Z complete\n");
        body.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 100]);
        body.extend_from_slice(b"2024-01-01T00:00:01Z partial");
        let entries = parse_log_body(&body, fetched_at());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].message, "partial");
    }

    #[test]
    fn line_without_timestamp_uses_fetch_time() {
        let entry = parse_line("panic: boom", LogStream::Stderr, fetched_at());
        assert_eq!(entry.message, "panic: boom");
        assert_eq!(entry.timestamp, fetched_at());
        assert_eq!(entry.token, "2027-01-15T08:00:00.000000000Z");
    }

    #[test]
    fn token_conversion_keeps_nanoseconds() {
        let unix = token_to_unix("2024-01-01T00:00:00.123456789Z");
        assert_eq!(unix, Ok("1704067200.123456789".to_owned()));
        assert!(matches!(
            token_to_unix("yesterday"),
            Err(LogSourceError::InvalidToken { .. })
        ));
    }

    #[test]
    fn urls_follow_direction() {
        let source = ContainerLogSource::new(
            Arc::new(crate::process::SystemProcessRunner),
            ContainerSourceConfig::default(),
        );
        let initial = source.logs_url("web", Direction::Backward, "", 500);
        assert_eq!(
            initial,
            Ok("http://localhost/v1.43/containers/web/logs?stdout=1&stderr=1&timestamps=1&tail=500".to_owned())
        );

        let backward = source.logs_url("web", Direction::Backward, "2024-01-01T00:00:00Z", 500);
        assert!(matches!(&backward, Ok(url) if url.ends_with("&until=1704067200.000000000")));

        let forward = source.logs_url("my app", Direction::Forward, "2024-01-01T00:00:00Z", 500);
        assert!(matches!(&forward, Ok(url) if url.contains("/containers/my%20app/") && url.ends_with("&since=1704067200.000000000")));
    }
}
