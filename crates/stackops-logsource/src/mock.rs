//! In-memory log source for testing.
//!
//! Behaves like a real provider: boundaries are inclusive (so the shared
//! duplicate stripping is exercised), the target can grow while being
//! viewed, and every call is recorded.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::entry::{Direction, FetchPage, LogEntry, LogStream, TargetId};
use crate::error::LogSourceError;
use crate::source::{finalize_page, LogSource};

/// A recorded call to the mock source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub target: TargetId,
    pub direction: Direction,
    pub from_token: String,
    pub page_size: usize,
}

/// Mock implementation of [`LogSource`].
pub struct MockLogSource {
    logs: Mutex<HashMap<TargetId, Vec<LogEntry>>>,
    calls: Mutex<Vec<MockCall>>,
    next_error: Mutex<Option<LogSourceError>>,
    delay: Duration,
}

impl Default for MockLogSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLogSource {
    pub fn new() -> Self {
        Self {
            logs: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_error: Mutex::new(None),
            delay: Duration::ZERO,
        }
    }

    /// Seed `target` with `count` sequential entries.
    pub fn with_target(self, target: TargetId, count: usize) -> Self {
        self.append(&target, count);
        self
    }

    /// Delay every fetch (to exercise timeouts and in-flight races).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next fetch with `err`.
    pub fn fail_next(&self, err: LogSourceError) {
        match self.next_error.lock() {
            Ok(mut e) => *e = Some(err),
            Err(poisoned) => *poisoned.into_inner() = Some(err),
        }
    }

    /// Append `count` new entries to `target`, as if it kept logging.
    pub fn append(&self, target: &TargetId, count: usize) {
        let mut logs = match self.logs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entries = logs.entry(target.clone()).or_default();
        let start = entries.len();
        entries.extend((start..start + count).map(|seq| mock_entry(target, seq)));
    }

    /// Return all recorded calls.
    pub fn calls(&self) -> Vec<MockCall> {
        match self.calls.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn call_count(&self) -> usize {
        match self.calls.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn record(&self, call: MockCall) {
        match self.calls.lock() {
            Ok(mut guard) => guard.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }

    fn take_error(&self) -> Option<LogSourceError> {
        match self.next_error.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn slice(
        &self,
        target: &TargetId,
        direction: Direction,
        from_token: &str,
        page_size: usize,
    ) -> Result<Vec<LogEntry>, LogSourceError> {
        let logs = match self.logs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entries = logs.get(target).ok_or_else(|| LogSourceError::NotFound {
            target: target.to_string(),
        })?;

        if from_token.is_empty() {
            let start = entries.len().saturating_sub(page_size);
            return Ok(entries[start..].to_vec());
        }

        let idx = entries
            .iter()
            .position(|e| e.token == from_token)
            .ok_or_else(|| LogSourceError::InvalidToken {
                token: from_token.to_owned(),
            })?;
        match direction {
            Direction::Backward => {
                let start = (idx + 1).saturating_sub(page_size + 1);
                Ok(entries[start..=idx].to_vec())
            }
            Direction::Forward => {
                let end = (idx + page_size + 1).min(entries.len());
                Ok(entries[idx..end].to_vec())
            }
        }
    }
}

/// Token for the `seq`-th entry of a mock target. Zero-padded so tokens sort
/// the same way entries do.
pub fn mock_token(seq: usize) -> String {
    format!("{seq:08}")
}

fn mock_entry(target: &TargetId, seq: usize) -> LogEntry {
    let secs = 1_700_000_000 + i64::try_from(seq).unwrap_or(i64::MAX - 1_700_000_000);
    LogEntry {
        timestamp: Utc.timestamp_opt(secs, 0).single().unwrap_or_default(),
        stream: if seq % 7 == 0 {
            LogStream::Stderr
        } else {
            LogStream::Stdout
        },
        origin: Some(target.name.clone()),
        message: format!("{} line {seq}", target.name),
        token: mock_token(seq),
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch(
        &self,
        target: &TargetId,
        direction: Direction,
        from_token: &str,
        page_size: usize,
    ) -> Result<FetchPage, LogSourceError> {
        self.record(MockCall {
            target: target.clone(),
            direction,
            from_token: from_token.to_owned(),
            page_size,
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = self.take_error() {
            return Err(err);
        }
        let entries = self.slice(target, direction, from_token, page_size)?;
        Ok(finalize_page(entries, direction, from_token, page_size))
    }
}
