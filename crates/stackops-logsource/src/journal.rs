//! systemd journal adapter.
//!
//! Shells out to `journalctl -o json`, one JSON object per line. Pagination
//! tokens are journal cursors (`__CURSOR`), which are opaque.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::entry::{Direction, FetchPage, LogEntry, LogStream, TargetId};
use crate::error::LogSourceError;
use crate::process::ProcessRunner;
use crate::source::{finalize_page, LogSource};

/// [`LogSource`] for systemd units.
pub struct JournalLogSource {
    runner: Arc<dyn ProcessRunner>,
    binary: String,
}

impl JournalLogSource {
    pub fn new(runner: Arc<dyn ProcessRunner>, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }
}

/// Build the `journalctl` arguments for one page.
///
/// `--cursor` is inclusive, so paged requests ask for one extra record and
/// the record at the cursor is stripped afterwards.
pub fn journal_args(
    unit: &str,
    direction: Direction,
    from_token: &str,
    page_size: usize,
) -> Vec<String> {
    let mut args = vec![
        "--unit".to_owned(),
        unit.to_owned(),
        "--output=json".to_owned(),
        "--no-pager".to_owned(),
    ];
    if from_token.is_empty() {
        args.push(format!("--lines={page_size}"));
        return args;
    }
    args.push(format!("--cursor={from_token}"));
    if direction == Direction::Backward {
        args.push("--reverse".to_owned());
    }
    args.push(format!("--lines={}", page_size + 1));
    args
}

#[async_trait]
impl LogSource for JournalLogSource {
    fn name(&self) -> &'static str {
        "journal"
    }

    async fn fetch(
        &self,
        target: &TargetId,
        direction: Direction,
        from_token: &str,
        page_size: usize,
    ) -> Result<FetchPage, LogSourceError> {
        let args = journal_args(&target.name, direction, from_token, page_size);
        let stdout = self.runner.run(&self.binary, &args).await?;
        let mut entries = parse_journal_output(&String::from_utf8_lossy(&stdout));
        if direction == Direction::Backward && !from_token.is_empty() {
            // `--reverse` yields newest first.
            entries.reverse();
        }
        tracing::debug!(
            log_target = %target,
            %direction,
            records = entries.len(),
            "journal fetched"
        );
        Ok(finalize_page(entries, direction, from_token, page_size))
    }
}

#[derive(Debug, Deserialize)]
struct JournalRecord {
    #[serde(rename = "__CURSOR")]
    cursor: String,
    #[serde(rename = "__REALTIME_TIMESTAMP")]
    realtime_us: String,
    #[serde(rename = "MESSAGE", default)]
    message: Value,
    #[serde(rename = "_HOSTNAME", default)]
    hostname: Option<String>,
    #[serde(rename = "_SYSTEMD_UNIT", default)]
    unit: Option<String>,
}

/// Parse `journalctl -o json` output. Records that fail to parse are dropped.
pub fn parse_journal_output(output: &str) -> Vec<LogEntry> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<JournalRecord>(line) {
            Ok(record) => record_to_entry(record),
            Err(err) => {
                tracing::trace!(error = %err, "dropping malformed journal record");
                None
            }
        })
        .collect()
}

fn record_to_entry(record: JournalRecord) -> Option<LogEntry> {
    let micros: i64 = record.realtime_us.trim().parse().ok()?;
    let timestamp: DateTime<Utc> = Utc.timestamp_micros(micros).single()?;
    let origin = record
        .hostname
        .filter(|h| !h.is_empty())
        .or(record.unit.filter(|u| !u.is_empty()));
    Some(LogEntry {
        timestamp,
        stream: LogStream::Unspecified,
        origin,
        message: message_text(&record.message)?,
        token: record.cursor,
    })
}

/// `MESSAGE` is a string, or an array of bytes when it is not valid UTF-8.
fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim_end_matches('\n').to_owned()),
        Value::Array(items) => {
            let bytes: Vec<u8> = items
                .iter()
                .filter_map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect();
            Some(
                String::from_utf8_lossy(&bytes)
                    .trim_end_matches('\n')
                    .to_owned(),
            )
        }
        Value::Null => Some(String::new()),
        _ => None,
    }
}
