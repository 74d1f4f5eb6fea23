//! View controller: the `(state, event) -> effects` core of the log viewer.
//!
//! The controller owns the [`ScrollbackBuffer`] for the selected target and
//! the scroll position over its rendered lines. It never performs I/O; fetches
//! and timers are returned as [`Effect`]s and their outcomes come back as
//! [`ViewerEvent::FetchCompleted`] and [`ViewerEvent::FollowTick`].

use std::time::Duration;

use stackops_logsource::{Direction, FetchRequest, FetchResult, TargetId};

use crate::buffer::ScrollbackBuffer;
use crate::config::ScrollbackLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Choosing a target.
    List,
    /// Scrollback over the selected target.
    Viewing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    /// Replace the selectable targets (list mode).
    SetTargets(Vec<TargetId>),
    /// Move the list highlight by a signed amount.
    MoveSelection(isize),
    /// Open the highlighted target.
    SelectHighlighted,
    /// Open a specific target.
    SelectTarget(TargetId),
    ScrollUp(usize),
    ScrollDown(usize),
    /// Scroll up one viewport; at the top of the buffer, fetch an older page.
    PageOlder,
    /// Scroll down one viewport; at the bottom, fetch a newer page.
    PageNewer,
    ScrollToTop,
    ScrollToBottom,
    ScrollLeft(usize),
    ScrollRight(usize),
    ToggleFollow,
    ToggleMetadata,
    DismissError,
    Resize { width: u16, height: u16 },
    Back,
    Quit,
    FetchCompleted(FetchResult),
    FollowTick,
}

impl ViewerEvent {
    fn is_key_input(&self) -> bool {
        !matches!(
            self,
            Self::SetTargets(_)
                | Self::Resize { .. }
                | Self::FetchCompleted(_)
                | Self::FollowTick
                | Self::Quit
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Fetch(FetchRequest),
    StartFollowTimer(Duration),
    StopFollowTimer,
    Quit,
}

/// Render-ready view of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub state: ViewState,
    pub status: String,
    pub lines: Vec<String>,
    pub error: Option<String>,
    pub loading: bool,
}

#[derive(Debug, Clone)]
pub struct ViewController {
    buffer: ScrollbackBuffer,
    follow_interval: Duration,
    state: ViewState,
    /// Direction of the user-triggered fetch the view is waiting on.
    loading: Option<Direction>,
    targets: Vec<TargetId>,
    highlighted: usize,
    offset: usize,
    h_offset: usize,
    width: u16,
    height: u16,
    show_metadata: bool,
    error: Option<String>,
    quitting: bool,
}

impl ViewController {
    pub fn new(limits: ScrollbackLimits, follow_interval: Duration) -> Self {
        Self {
            buffer: ScrollbackBuffer::new(limits),
            follow_interval,
            state: ViewState::List,
            loading: None,
            targets: Vec::new(),
            highlighted: 0,
            offset: 0,
            h_offset: 0,
            width: 80,
            height: 24,
            show_metadata: false,
            error: None,
            quitting: false,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn quitting(&self) -> bool {
        self.quitting
    }

    pub fn buffer(&self) -> &ScrollbackBuffer {
        &self.buffer
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn horizontal_offset(&self) -> usize {
        self.h_offset
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn show_metadata(&self) -> bool {
        self.show_metadata
    }

    pub fn targets(&self) -> &[TargetId] {
        &self.targets
    }

    /// Rows available for log lines (one row is the status line).
    pub fn viewport_height(&self) -> usize {
        usize::from(self.height.saturating_sub(1)).max(1)
    }

    fn max_offset(&self) -> usize {
        self.buffer
            .rendered_line_count()
            .saturating_sub(self.viewport_height())
    }

    fn at_bottom(&self) -> bool {
        self.offset >= self.max_offset()
    }

    fn clamp_offset(&mut self) {
        self.offset = self.offset.min(self.max_offset());
    }

    pub fn update(&mut self, event: ViewerEvent) -> Vec<Effect> {
        if self.quitting {
            return Vec::new();
        }
        if self.loading.is_some() && event.is_key_input() {
            return Vec::new();
        }

        match event {
            ViewerEvent::Quit => self.quit(),
            ViewerEvent::Resize { width, height } => {
                self.resize(width, height);
                Vec::new()
            }
            ViewerEvent::SetTargets(targets) => {
                self.targets = targets;
                self.highlighted = self.highlighted.min(self.targets.len().saturating_sub(1));
                Vec::new()
            }
            ViewerEvent::FetchCompleted(result) => self.merge(result),
            ViewerEvent::FollowTick => self.follow_tick(),
            event => match self.state {
                ViewState::List => self.update_list(event),
                ViewState::Viewing => self.update_viewing(event),
            },
        }
    }

    fn update_list(&mut self, event: ViewerEvent) -> Vec<Effect> {
        match event {
            ViewerEvent::MoveSelection(delta) => {
                if !self.targets.is_empty() {
                    let last = self.targets.len() - 1;
                    self.highlighted = self.highlighted.saturating_add_signed(delta).min(last);
                }
                Vec::new()
            }
            ViewerEvent::SelectHighlighted => match self.targets.get(self.highlighted).cloned() {
                Some(target) => self.select(target),
                None => Vec::new(),
            },
            ViewerEvent::SelectTarget(target) => self.select(target),
            ViewerEvent::DismissError => {
                self.error = None;
                Vec::new()
            }
            ViewerEvent::Back => self.quit(),
            _ => Vec::new(),
        }
    }

    fn update_viewing(&mut self, event: ViewerEvent) -> Vec<Effect> {
        let following = self.buffer.follow_active();
        match event {
            ViewerEvent::ScrollUp(lines) if !following => {
                self.offset = self.offset.saturating_sub(lines);
                self.after_view_change()
            }
            ViewerEvent::ScrollDown(lines) if !following => {
                self.offset = self.offset.saturating_add(lines);
                self.clamp_offset();
                self.after_view_change()
            }
            ViewerEvent::ScrollToTop if !following => {
                self.offset = 0;
                self.after_view_change()
            }
            ViewerEvent::ScrollToBottom if !following => {
                self.offset = self.max_offset();
                self.after_view_change()
            }
            ViewerEvent::PageOlder if !following => self.page_older(),
            ViewerEvent::PageNewer if !following => self.page_newer(),
            ViewerEvent::ScrollLeft(cols) => {
                self.h_offset = self.h_offset.saturating_sub(cols);
                Vec::new()
            }
            ViewerEvent::ScrollRight(cols) => {
                let widest = self.widest_visible_line();
                let limit = widest.saturating_sub(usize::from(self.width));
                self.h_offset = self.h_offset.saturating_add(cols).min(limit);
                Vec::new()
            }
            ViewerEvent::ToggleMetadata => {
                self.show_metadata = !self.show_metadata;
                Vec::new()
            }
            ViewerEvent::ToggleFollow => self.toggle_follow(),
            ViewerEvent::DismissError => {
                self.error = None;
                Vec::new()
            }
            ViewerEvent::Back => {
                let mut effects = Vec::new();
                if self.buffer.stop_follow() {
                    tracing::info!("follow stopped");
                    effects.push(Effect::StopFollowTimer);
                }
                self.state = ViewState::List;
                effects
            }
            ViewerEvent::SelectTarget(target) => self.select(target),
            _ => Vec::new(),
        }
    }

    fn select(&mut self, target: TargetId) -> Vec<Effect> {
        if let Some(pos) = self.targets.iter().position(|t| t == &target) {
            self.highlighted = pos;
        }
        self.state = ViewState::Viewing;
        if self.buffer.target() == Some(&target) {
            return Vec::new();
        }

        tracing::info!(log_target = %target, "switching log target");
        let mut effects = Vec::new();
        if self.buffer.follow_active() {
            effects.push(Effect::StopFollowTimer);
        }
        let target_size = self.buffer.limits().target_size;
        self.buffer.initialize(target, target_size);
        self.offset = 0;
        self.h_offset = 0;
        self.error = None;
        if let Some(request) = self.buffer.begin_initial_load() {
            self.loading = Some(Direction::Backward);
            effects.push(Effect::Fetch(request));
        }
        effects
    }

    fn quit(&mut self) -> Vec<Effect> {
        self.quitting = true;
        self.loading = None;
        self.buffer.teardown();
        vec![Effect::Quit]
    }

    fn page_older(&mut self) -> Vec<Effect> {
        if self.offset > 0 {
            self.offset = self.offset.saturating_sub(self.viewport_height());
            return self.after_view_change();
        }
        if !self.buffer.has_more_backward() {
            return Vec::new();
        }
        if self.buffer.in_flight(Direction::Backward) {
            // Wait on the prefetch already running.
            self.loading = Some(Direction::Backward);
            return Vec::new();
        }
        match self.buffer.request_page(Direction::Backward, false) {
            Some(request) => {
                self.loading = Some(Direction::Backward);
                vec![Effect::Fetch(request)]
            }
            None => Vec::new(),
        }
    }

    fn page_newer(&mut self) -> Vec<Effect> {
        if !self.at_bottom() {
            self.offset = self.offset.saturating_add(self.viewport_height());
            self.clamp_offset();
            return self.after_view_change();
        }
        if !self.buffer.has_more_forward() {
            return Vec::new();
        }
        if self.buffer.in_flight(Direction::Forward) {
            self.loading = Some(Direction::Forward);
            return Vec::new();
        }
        match self.buffer.request_page(Direction::Forward, false) {
            Some(request) => {
                self.loading = Some(Direction::Forward);
                vec![Effect::Fetch(request)]
            }
            None => Vec::new(),
        }
    }

    fn toggle_follow(&mut self) -> Vec<Effect> {
        if self.buffer.follow_active() {
            self.buffer.stop_follow();
            tracing::info!("follow stopped");
            return vec![Effect::StopFollowTimer];
        }
        self.buffer.start_follow();
        tracing::info!(interval_ms = self.follow_interval.as_millis() as u64, "follow started");
        self.offset = self.max_offset();
        let mut effects = vec![Effect::StartFollowTimer(self.follow_interval)];
        if let Some(request) = self.buffer.follow_tick() {
            effects.push(Effect::Fetch(request));
        }
        effects
    }

    fn follow_tick(&mut self) -> Vec<Effect> {
        if self.state != ViewState::Viewing {
            return Vec::new();
        }
        match self.buffer.follow_tick() {
            Some(request) => vec![Effect::Fetch(request)],
            None => Vec::new(),
        }
    }

    fn resize(&mut self, width: u16, height: u16) {
        let was_bottom = self.at_bottom();
        let old_max = self.max_offset();
        let old_offset = self.offset;
        self.width = width;
        self.height = height;
        let new_max = self.max_offset();
        self.offset = if was_bottom || self.buffer.follow_active() {
            new_max
        } else if old_max == 0 {
            0
        } else {
            // Keep the same relative position, rounded to nearest.
            (old_offset * new_max + old_max / 2) / old_max
        };
        self.clamp_offset();
    }

    fn merge(&mut self, result: FetchResult) -> Vec<Effect> {
        let FetchResult { request, outcome } = result;
        if !self.buffer.accepts(&request) {
            tracing::debug!(
                log_target = %request.target,
                direction = %request.direction,
                "dropping stale fetch result"
            );
            return Vec::new();
        }

        let direction = request.direction;
        let user_requested = !request.is_prefetch || self.loading == Some(direction);
        if self.loading == Some(direction) {
            self.loading = None;
        }

        let page = match outcome {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!(
                    log_target = %request.target,
                    direction = %direction,
                    error = %err,
                    "log fetch failed"
                );
                self.buffer.apply_error(direction);
                self.error = Some(if err.is_transient() {
                    format!("{err} (page again to retry)")
                } else {
                    err.to_string()
                });
                return Vec::new();
            }
        };

        tracing::debug!(
            log_target = %request.target,
            direction = %direction,
            entries = page.entries.len(),
            has_more = page.has_more,
            "log fetch completed"
        );

        let height = self.viewport_height();
        let before = self.buffer.rendered_line_count();
        let mut effects = Vec::new();

        if request.is_initial() {
            let follow_up = self.buffer.apply_initial(page);
            self.offset = self.max_offset();
            effects.extend(follow_up.map(Effect::Fetch));
        } else {
            match direction {
                Direction::Backward => {
                    let follow_up = self.buffer.apply_backward(&request.from_token, page);
                    let added = self.buffer.rendered_line_count().saturating_sub(before);
                    self.offset = if user_requested {
                        added.saturating_sub(height)
                    } else {
                        self.offset.saturating_add(added)
                    };
                    effects.extend(follow_up.map(Effect::Fetch));
                }
                Direction::Forward => {
                    let follow_up = self.buffer.apply_forward(&request.from_token, page);
                    effects.extend(follow_up.map(Effect::Fetch));
                    if self.buffer.follow_active() {
                        self.offset = self.max_offset();
                    } else if user_requested {
                        self.offset = before;
                    }
                }
            }
        }
        self.clamp_offset();
        effects.extend(self.after_view_change());
        effects
    }

    /// Re-evaluate trimming and prefetching for the current position.
    fn after_view_change(&mut self) -> Vec<Effect> {
        let height = self.viewport_height();
        let removed = self.buffer.trim(self.offset, height);
        self.offset = self.offset.saturating_sub(removed);
        if self.buffer.follow_active() {
            self.offset = self.max_offset();
        }
        self.clamp_offset();

        let total = self.buffer.rendered_line_count();
        self.buffer
            .check_prefetch_needs(self.offset, height, total)
            .into_iter()
            .map(Effect::Fetch)
            .collect()
    }

    fn widest_visible_line(&self) -> usize {
        self.buffer
            .window(self.offset, self.viewport_height(), self.show_metadata)
            .iter()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        match self.state {
            ViewState::List => self.list_snapshot(),
            ViewState::Viewing => self.viewing_snapshot(),
        }
    }

    fn list_snapshot(&self) -> ViewSnapshot {
        let lines = if self.targets.is_empty() {
            vec!["no log targets found".to_owned()]
        } else {
            self.targets
                .iter()
                .enumerate()
                .map(|(idx, target)| {
                    let cursor = if idx == self.highlighted { ">" } else { " " };
                    format!("{cursor} {target}")
                })
                .collect()
        };
        ViewSnapshot {
            state: ViewState::List,
            status: format!("{} targets | enter: view | q: quit", self.targets.len()),
            lines,
            error: self.error.clone(),
            loading: false,
        }
    }

    fn viewing_snapshot(&self) -> ViewSnapshot {
        let width = usize::from(self.width);
        let lines = self
            .buffer
            .window(self.offset, self.viewport_height(), self.show_metadata)
            .iter()
            .map(|line| line.chars().skip(self.h_offset).take(width).collect())
            .collect();

        ViewSnapshot {
            state: ViewState::Viewing,
            status: self.status_line(),
            lines,
            error: self.error.clone(),
            loading: self.loading.is_some(),
        }
    }

    fn status_line(&self) -> String {
        let target = self
            .buffer
            .target()
            .map(ToString::to_string)
            .unwrap_or_default();
        let mut parts = vec![target, format!("{} entries", self.buffer.len())];
        if self.buffer.follow_active() {
            parts.push("following".to_owned());
        }
        if self.loading.is_some() {
            parts.push("loading...".to_owned());
        }
        let older = if self.buffer.has_more_backward() { "older: more" } else { "older: start" };
        let newer = if self.buffer.has_more_forward() { "newer: more" } else { "newer: end" };
        parts.push(format!("{older}, {newer}"));
        if self.h_offset > 0 {
            parts.push(format!("col {}", self.h_offset + 1));
        }
        parts.join(" | ")
    }
}
