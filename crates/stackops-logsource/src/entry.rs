//! Log entries, targets, and the request/result pair exchanged between the
//! scrollback engine and a [`LogSource`](crate::source::LogSource).

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::LogSourceError;

/// Kind of process whose logs are being viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKind {
    Container,
    Service,
}

impl TargetKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Service => "service",
        }
    }
}

/// Identity of one log target: a container or a systemd unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId {
    pub kind: TargetKind,
    pub name: String,
}

impl TargetId {
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Container,
            name: name.into(),
        }
    }

    pub fn service(name: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Service,
            name: name.into(),
        }
    }

    /// Parse `container:<name>` / `service:<unit>`. A bare name is a service
    /// when it ends in `.service`, otherwise a container.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }
        match spec.split_once(':') {
            Some(("container", name)) if !name.trim().is_empty() => {
                Some(Self::container(name.trim()))
            }
            Some(("service", name)) if !name.trim().is_empty() => Some(Self::service(name.trim())),
            Some(("container" | "service", _)) => None,
            _ if spec.ends_with(".service") => Some(Self::service(spec)),
            _ => Some(Self::container(spec)),
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.label(), self.name)
    }
}

/// Output stream an entry was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
    Unspecified,
}

impl LogStream {
    pub fn label(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Unspecified => "",
        }
    }
}

/// One immutable unit of log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub stream: LogStream,
    pub origin: Option<String>,
    pub message: String,
    /// Provider position of this entry; pagination resumes from exactly here.
    pub token: String,
}

impl LogEntry {
    /// Number of terminal lines this entry occupies when rendered.
    pub fn line_count(&self) -> usize {
        self.message.split('\n').count()
    }

    /// Render the entry as one or more lines (joined with `\n`).
    pub fn format(&self, show_metadata: bool) -> String {
        if !show_metadata {
            return self.message.clone();
        }
        let mut prefix = self
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let stream = self.stream.label();
        if !stream.is_empty() {
            prefix.push_str(" [");
            prefix.push_str(stream);
            prefix.push(']');
        }
        if let Some(origin) = self.origin.as_deref().filter(|o| !o.is_empty()) {
            prefix.push(' ');
            prefix.push_str(origin);
        }
        self.message
            .split('\n')
            .map(|line| format!("{prefix} {line}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Pagination direction relative to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Older entries, prepended to the buffer.
    Backward,
    /// Newer entries, appended to the buffer.
    Forward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backward => f.write_str("backward"),
            Self::Forward => f.write_str("forward"),
        }
    }
}

/// A request for one page of entries in one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub target: TargetId,
    /// Buffer generation the request was issued for.
    pub epoch: u64,
    pub direction: Direction,
    /// Empty means "most recent page".
    pub from_token: String,
    /// Background fetch; the view does not jump to show its content.
    pub is_prefetch: bool,
}

impl FetchRequest {
    /// Initial load of the most recent page. Tracked as a backward fetch so
    /// no backward prefetch can be issued until it lands.
    pub fn initial(target: TargetId, epoch: u64) -> Self {
        Self {
            target,
            epoch,
            direction: Direction::Backward,
            from_token: String::new(),
            is_prefetch: false,
        }
    }

    /// A backward fetch without a token. An empty-token forward fetch is a
    /// follow poll on an empty buffer, not an initial load.
    pub fn is_initial(&self) -> bool {
        self.from_token.is_empty() && self.direction == Direction::Backward
    }
}

/// One page of entries as returned by a source, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchPage {
    pub entries: Vec<LogEntry>,
    pub oldest_token: String,
    pub newest_token: String,
    /// `entries.len() >= page_size`. A heuristic: a provider whose last page
    /// is exactly full reports `true` once more than it should.
    pub has_more: bool,
}

impl FetchPage {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Asynchronous outcome of a [`FetchRequest`], merged exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub request: FetchRequest,
    pub outcome: Result<FetchPage, LogSourceError>,
}
