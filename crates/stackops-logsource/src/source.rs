//! The log source capability and the page-shaping rules every adapter shares.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::entry::{Direction, FetchPage, FetchRequest, LogEntry, TargetId, TargetKind};
use crate::error::LogSourceError;

/// A paginated, read-only provider of log entries.
///
/// Contract for `fetch`:
/// - empty `from_token`: the most recent `page_size` entries (direction ignored);
/// - `Backward`: entries strictly older than `from_token`;
/// - `Forward`: entries newer than `from_token`.
///
/// Entries are always returned oldest first and never include the entry
/// whose token equals `from_token`. Implementations are stateless and may be
/// called concurrently for different targets.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        target: &TargetId,
        direction: Direction,
        from_token: &str,
        page_size: usize,
    ) -> Result<FetchPage, LogSourceError>;
}

/// Run `request` against `source`, failing with `Timeout` once `timeout`
/// elapses. The provider call is dropped on timeout; it is not signalled.
pub async fn fetch_with_timeout(
    source: &dyn LogSource,
    request: &FetchRequest,
    page_size: usize,
    timeout: Duration,
) -> Result<FetchPage, LogSourceError> {
    let call = source.fetch(
        &request.target,
        request.direction,
        &request.from_token,
        page_size,
    );
    match tokio::time::timeout(timeout, call).await {
        Ok(outcome) => outcome,
        Err(_) => Err(LogSourceError::Timeout {
            target: request.target.to_string(),
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Shape provider output (already oldest first) into a [`FetchPage`].
///
/// Drops the entry at `from_token` (providers treat the boundary
/// inclusively), caps the page at `page_size` keeping the end adjacent to the
/// request position, and derives `has_more` from whether the page is full.
pub fn finalize_page(
    mut entries: Vec<LogEntry>,
    direction: Direction,
    from_token: &str,
    page_size: usize,
) -> FetchPage {
    if !from_token.is_empty() {
        entries.retain(|entry| entry.token != from_token);
    }

    let page_size = page_size.max(1);
    if entries.len() > page_size {
        if direction == Direction::Forward && !from_token.is_empty() {
            entries.truncate(page_size);
        } else {
            let excess = entries.len() - page_size;
            entries.drain(..excess);
        }
    }

    let oldest_token = entries.first().map(|e| e.token.clone()).unwrap_or_default();
    let newest_token = entries.last().map(|e| e.token.clone()).unwrap_or_default();
    let has_more = entries.len() >= page_size;
    FetchPage {
        entries,
        oldest_token,
        newest_token,
        has_more,
    }
}

/// Dispatches on [`TargetKind`] so one viewer can browse containers and
/// services side by side.
pub struct SourceRouter {
    containers: Arc<dyn LogSource>,
    services: Arc<dyn LogSource>,
}

impl SourceRouter {
    pub fn new(containers: Arc<dyn LogSource>, services: Arc<dyn LogSource>) -> Self {
        Self {
            containers,
            services,
        }
    }

    fn route(&self, kind: TargetKind) -> &dyn LogSource {
        match kind {
            TargetKind::Container => self.containers.as_ref(),
            TargetKind::Service => self.services.as_ref(),
        }
    }
}

#[async_trait]
impl LogSource for SourceRouter {
    fn name(&self) -> &'static str {
        "router"
    }

    async fn fetch(
        &self,
        target: &TargetId,
        direction: Direction,
        from_token: &str,
        page_size: usize,
    ) -> Result<FetchPage, LogSourceError> {
        let source = self.route(target.kind);
        tracing::trace!(
            source = source.name(),
            log_target = %target,
            %direction,
            "routing fetch"
        );
        source.fetch(target, direction, from_token, page_size).await
    }
}
