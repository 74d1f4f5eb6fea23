//! Scrollback buffer: a bounded, ordered window over one target's log.
//!
//! The buffer owns the entries and the pagination state for both directions
//! and decides which fetches are needed. It never performs I/O; every method
//! that wants more data returns a [`FetchRequest`] for the caller to run.
//!
//! Invariants:
//! - entries are stored oldest to newest;
//! - at most one fetch per direction is in flight;
//! - an empty fetch result marks that direction exhausted until the buffer
//!   is re-initialized (or trimming discards entries on that side).

use std::collections::VecDeque;

use stackops_logsource::{Direction, FetchPage, FetchRequest, LogEntry, TargetId};

use crate::config::ScrollbackLimits;

pub const START_OF_LOGS_MARKER: &str = "──── start of logs ────";
pub const END_OF_LOGS_MARKER: &str = "──── end of logs ────";
pub const WATCHING_MARKER: &str = "──── watching for new logs ────";

#[derive(Debug, Clone)]
pub struct ScrollbackBuffer {
    limits: ScrollbackLimits,
    target: Option<TargetId>,
    epoch: u64,
    entries: VecDeque<LogEntry>,
    /// Sum of `line_count()` over `entries`.
    entry_lines: usize,
    backward_token: String,
    forward_token: String,
    has_more_backward: bool,
    has_more_forward: bool,
    backward_exhausted: bool,
    forward_exhausted: bool,
    backward_in_flight: bool,
    forward_in_flight: bool,
    follow_active: bool,
}

impl ScrollbackBuffer {
    pub fn new(limits: ScrollbackLimits) -> Self {
        Self {
            limits,
            target: None,
            epoch: 0,
            entries: VecDeque::new(),
            entry_lines: 0,
            backward_token: String::new(),
            forward_token: String::new(),
            has_more_backward: false,
            has_more_forward: false,
            backward_exhausted: false,
            forward_exhausted: false,
            backward_in_flight: false,
            forward_in_flight: false,
            follow_active: false,
        }
    }

    /// Reset all state for `target`. History is assumed to exist behind the
    /// first page and nothing ahead of "now".
    pub fn initialize(&mut self, target: TargetId, target_size: usize) {
        self.teardown();
        self.limits.target_size = target_size;
        self.target = Some(target);
        self.has_more_backward = true;
        self.has_more_forward = false;
    }

    /// Clear entries and pagination state. Results of fetches issued before
    /// this call no longer match [`accepts`](Self::accepts).
    pub fn teardown(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.target = None;
        self.entries.clear();
        self.entry_lines = 0;
        self.backward_token.clear();
        self.forward_token.clear();
        self.has_more_backward = false;
        self.has_more_forward = false;
        self.backward_exhausted = false;
        self.forward_exhausted = false;
        self.backward_in_flight = false;
        self.forward_in_flight = false;
        self.follow_active = false;
    }

    pub fn target(&self) -> Option<&TargetId> {
        self.target.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn limits(&self) -> &ScrollbackLimits {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn backward_token(&self) -> &str {
        &self.backward_token
    }

    pub fn forward_token(&self) -> &str {
        &self.forward_token
    }

    pub fn has_more_backward(&self) -> bool {
        self.has_more_backward
    }

    pub fn has_more_forward(&self) -> bool {
        self.has_more_forward
    }

    pub fn in_flight(&self, direction: Direction) -> bool {
        match direction {
            Direction::Backward => self.backward_in_flight,
            Direction::Forward => self.forward_in_flight,
        }
    }

    pub fn follow_active(&self) -> bool {
        self.follow_active
    }

    /// Whether `request` was issued for the current target and generation.
    pub fn accepts(&self, request: &FetchRequest) -> bool {
        self.epoch == request.epoch && self.target.as_ref() == Some(&request.target)
    }

    /// Request the most recent page. `None` while another load is running.
    pub fn begin_initial_load(&mut self) -> Option<FetchRequest> {
        let target = self.target.clone()?;
        if self.backward_in_flight {
            return None;
        }
        self.backward_in_flight = true;
        Some(FetchRequest::initial(target, self.epoch))
    }

    /// Build a request for `direction` and mark it in flight. `None` when a
    /// fetch for that direction is already outstanding or there is nothing
    /// to page from.
    pub fn request_page(&mut self, direction: Direction, is_prefetch: bool) -> Option<FetchRequest> {
        let target = self.target.clone()?;
        let from_token = match direction {
            Direction::Backward => {
                if self.backward_in_flight
                    || !self.has_more_backward
                    || self.backward_token.is_empty()
                {
                    return None;
                }
                self.backward_in_flight = true;
                self.backward_token.clone()
            }
            Direction::Forward => {
                if self.forward_in_flight
                    || !self.has_more_forward
                    || self.forward_token.is_empty()
                {
                    return None;
                }
                self.forward_in_flight = true;
                self.forward_token.clone()
            }
        };
        Some(FetchRequest {
            target,
            epoch: self.epoch,
            direction,
            from_token,
            is_prefetch,
        })
    }

    pub fn should_prefetch_backward(&self) -> bool {
        self.entries.len() < self.limits.target_size
            && self.has_more_backward
            && !self.backward_token.is_empty()
            && !self.backward_in_flight
    }

    fn backfill_request(&mut self) -> Option<FetchRequest> {
        if self.should_prefetch_backward() {
            self.request_page(Direction::Backward, true)
        } else {
            None
        }
    }

    /// Store the first page. Ignored unless the buffer is empty.
    pub fn apply_initial(&mut self, page: FetchPage) -> Option<FetchRequest> {
        self.backward_in_flight = false;
        if !self.entries.is_empty() {
            tracing::debug!("initial page arrived for a non-empty buffer; ignored");
            return None;
        }
        if page.entries.is_empty() {
            self.has_more_backward = false;
            self.backward_exhausted = true;
            self.has_more_forward = false;
            return None;
        }
        self.extend_back(page.entries);
        self.sync_tokens();
        self.has_more_backward = true;
        self.has_more_forward = false;
        self.backfill_request()
    }

    /// Prepend an older page. Returns a further backfill request while the
    /// buffer is under its target size.
    pub fn apply_backward(&mut self, from_token: &str, page: FetchPage) -> Option<FetchRequest> {
        self.backward_in_flight = false;
        let first_token = self.entries.front().map(|e| e.token.clone());
        let entries: Vec<LogEntry> = page
            .entries
            .into_iter()
            .filter(|e| e.token != from_token && Some(&e.token) != first_token.as_ref())
            .collect();

        if entries.is_empty() {
            self.has_more_backward = false;
            self.backward_exhausted = true;
            return None;
        }

        for entry in entries.into_iter().rev() {
            self.entry_lines += entry.line_count();
            self.entries.push_front(entry);
        }
        self.sync_tokens();
        self.has_more_backward = !self.backward_exhausted && page.has_more;
        self.backfill_request()
    }

    /// Append a newer page. Never chains another forward fetch.
    ///
    /// A follow poll on an empty buffer asks for the most recent page, so
    /// its result is stored like an initial page: a full page means older
    /// entries were skipped, and the origin boundary is reopened with a
    /// backfill request.
    pub fn apply_forward(&mut self, from_token: &str, page: FetchPage) -> Option<FetchRequest> {
        self.forward_in_flight = false;
        if from_token.is_empty() && self.entries.is_empty() {
            return self.apply_first_poll(page);
        }
        let last_token = self.entries.back().map(|e| e.token.clone());
        let entries: Vec<LogEntry> = page
            .entries
            .into_iter()
            .filter(|e| {
                (from_token.is_empty() || e.token != from_token)
                    && Some(&e.token) != last_token.as_ref()
            })
            .collect();

        if entries.is_empty() {
            self.has_more_forward = false;
            self.forward_exhausted = true;
            return None;
        }

        self.extend_back(entries);
        self.sync_tokens();
        self.has_more_forward = !self.forward_exhausted && page.has_more;
        None
    }

    fn apply_first_poll(&mut self, page: FetchPage) -> Option<FetchRequest> {
        if page.entries.is_empty() {
            return None;
        }
        self.extend_back(page.entries);
        self.sync_tokens();
        self.has_more_forward = false;
        if page.has_more {
            self.backward_exhausted = false;
            self.has_more_backward = true;
            return self.backfill_request();
        }
        None
    }

    /// A fetch failed: release its direction without touching boundaries.
    pub fn apply_error(&mut self, direction: Direction) {
        match direction {
            Direction::Backward => self.backward_in_flight = false,
            Direction::Forward => self.forward_in_flight = false,
        }
    }

    fn extend_back(&mut self, entries: Vec<LogEntry>) {
        for entry in entries {
            self.entry_lines += entry.line_count();
            self.entries.push_back(entry);
        }
    }

    fn sync_tokens(&mut self) {
        if let Some(first) = self.entries.front() {
            self.backward_token.clone_from(&first.token);
        }
        if let Some(last) = self.entries.back() {
            self.forward_token.clone_from(&last.token);
        }
    }

    /// Prefetch requests for a view at `viewport_offset` (first visible
    /// rendered line). A direction is requested when the view is within
    /// `prefetch_lead_viewports` viewports of that edge.
    pub fn check_prefetch_needs(
        &mut self,
        viewport_offset: usize,
        viewport_height: usize,
        total_rendered_height: usize,
    ) -> Vec<FetchRequest> {
        let lead = self
            .limits
            .prefetch_lead_viewports
            .saturating_mul(viewport_height.max(1));
        let mut requests = Vec::new();

        if viewport_offset < lead {
            if let Some(request) = self.request_page(Direction::Backward, true) {
                requests.push(request);
            }
        }

        let below = total_rendered_height.saturating_sub(viewport_offset.saturating_add(viewport_height));
        if below < lead && !self.follow_active {
            if let Some(request) = self.request_page(Direction::Forward, true) {
                requests.push(request);
            }
        }
        requests
    }

    /// Drop entries far from the visible range once the buffer exceeds
    /// `max_buffer_entries`. Returns the number of rendered lines removed
    /// above the view; the caller subtracts it from its scroll offset.
    pub fn trim(&mut self, viewport_offset: usize, viewport_height: usize) -> usize {
        let total = self.entries.len();
        if total <= self.limits.max_buffer_entries {
            return 0;
        }

        let height = viewport_height.max(1);
        let (first_visible, last_visible) = self.visible_entry_range(viewport_offset, height);
        let keep = (self.limits.viewports_to_keep.saturating_mul(height) / 3)
            .max(self.limits.page_size);
        let keep_start = first_visible.saturating_sub(keep);
        let keep_end = last_visible.saturating_add(keep).saturating_add(1).min(total);

        let mut remove_top = keep_start;
        let mut remove_bottom = total.saturating_sub(keep_end);
        // An outstanding fetch would land next to the discarded range.
        if remove_top < self.limits.min_trim_entries || self.backward_in_flight {
            remove_top = 0;
        }
        if remove_bottom < self.limits.min_trim_entries
            || self.forward_in_flight
            || self.follow_active
        {
            remove_bottom = 0;
        }
        if remove_top == 0 && remove_bottom == 0 {
            return 0;
        }

        let mut lines_removed_top = 0;
        if remove_top > 0 {
            if !self.has_more_backward {
                lines_removed_top += 1;
            }
            for entry in self.entries.drain(..remove_top) {
                lines_removed_top += entry.line_count();
                self.entry_lines -= entry.line_count();
            }
            self.has_more_backward = true;
            self.backward_exhausted = false;
        }
        if remove_bottom > 0 {
            let start = self.entries.len() - remove_bottom;
            for entry in self.entries.drain(start..) {
                self.entry_lines -= entry.line_count();
            }
            self.has_more_forward = true;
            self.forward_exhausted = false;
        }
        self.sync_tokens();

        tracing::debug!(
            removed_top = remove_top,
            removed_bottom = remove_bottom,
            remaining = self.entries.len(),
            "trimmed scrollback"
        );
        lines_removed_top
    }

    /// Indices of the first and last entries touched by the rendered line
    /// range starting at `offset`.
    fn visible_entry_range(&self, offset: usize, height: usize) -> (usize, usize) {
        let last_index = self.entries.len().saturating_sub(1);
        let top = usize::from(!self.has_more_backward);
        let first_line = offset.saturating_sub(top);
        let last_line = offset.saturating_add(height).saturating_sub(1).saturating_sub(top);

        let mut first = None;
        let mut cursor = 0usize;
        for (idx, entry) in self.entries.iter().enumerate() {
            let next = cursor + entry.line_count();
            if first.is_none() && first_line < next {
                first = Some(idx);
            }
            if last_line < next {
                return (first.unwrap_or(idx), idx);
            }
            cursor = next;
        }
        (first.unwrap_or(last_index), last_index)
    }

    pub fn start_follow(&mut self) -> bool {
        let changed = !self.follow_active;
        self.follow_active = true;
        changed
    }

    pub fn stop_follow(&mut self) -> bool {
        let changed = self.follow_active;
        self.follow_active = false;
        changed
    }

    /// Forward poll for follow mode. `None` when not following or a forward
    /// fetch is still outstanding.
    pub fn follow_tick(&mut self) -> Option<FetchRequest> {
        if !self.follow_active || self.forward_in_flight {
            return None;
        }
        let target = self.target.clone()?;
        if self.forward_token.is_empty() && (self.backward_in_flight || !self.entries.is_empty()) {
            return None;
        }
        self.forward_in_flight = true;
        Some(FetchRequest {
            target,
            epoch: self.epoch,
            direction: Direction::Forward,
            from_token: self.forward_token.clone(),
            is_prefetch: true,
        })
    }

    fn top_marker(&self) -> Option<&'static str> {
        (!self.has_more_backward).then_some(START_OF_LOGS_MARKER)
    }

    fn bottom_marker(&self) -> Option<&'static str> {
        if self.has_more_forward {
            None
        } else if self.follow_active {
            Some(WATCHING_MARKER)
        } else {
            Some(END_OF_LOGS_MARKER)
        }
    }

    /// Total rendered lines including boundary markers.
    pub fn rendered_line_count(&self) -> usize {
        self.entry_lines
            + usize::from(self.top_marker().is_some())
            + usize::from(self.bottom_marker().is_some())
    }

    /// All rendered lines, markers included.
    pub fn render_lines(&self, show_metadata: bool) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.rendered_line_count());
        if let Some(marker) = self.top_marker() {
            lines.push(marker.to_owned());
        }
        for entry in &self.entries {
            lines.extend(entry.format(show_metadata).split('\n').map(str::to_owned));
        }
        if let Some(marker) = self.bottom_marker() {
            lines.push(marker.to_owned());
        }
        lines
    }

    pub fn render(&self, show_metadata: bool) -> String {
        self.render_lines(show_metadata).join("\n")
    }

    /// Rendered lines `[offset, offset + height)` without formatting the
    /// rest of the buffer.
    pub fn window(&self, offset: usize, height: usize, show_metadata: bool) -> Vec<String> {
        let end = offset.saturating_add(height);
        let mut out = Vec::with_capacity(height);
        let mut line = 0usize;

        if let Some(marker) = self.top_marker() {
            if line >= offset && line < end {
                out.push(marker.to_owned());
            }
            line += 1;
        }
        for entry in &self.entries {
            if line >= end {
                return out;
            }
            let count = entry.line_count();
            if line + count > offset {
                for (i, text) in entry.format(show_metadata).split('\n').enumerate() {
                    let at = line + i;
                    if at >= offset && at < end {
                        out.push(text.to_owned());
                    }
                }
            }
            line += count;
        }
        if let Some(marker) = self.bottom_marker() {
            if line >= offset && line < end {
                out.push(marker.to_owned());
            }
        }
        out
    }
}
