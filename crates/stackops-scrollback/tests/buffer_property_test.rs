#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Property tests: random interleavings of paging, follow polls, log growth,
//! out-of-order result delivery and trims keep the buffer ordered, free of
//! duplicates, and never have two fetches in flight for one direction.

use proptest::prelude::*;

use stackops_logsource::mock::mock_token;
use stackops_logsource::{
    finalize_page, Direction, FetchPage, FetchRequest, LogEntry, LogStream, TargetId,
};
use stackops_scrollback::{ScrollbackBuffer, ScrollbackLimits};

const PAGE: usize = 5;
const HEIGHT: usize = 10;

fn limits() -> ScrollbackLimits {
    ScrollbackLimits {
        page_size: PAGE,
        target_size: 10,
        max_buffer_entries: 40,
        prefetch_lead_viewports: 1,
        viewports_to_keep: 3,
        min_trim_entries: 5,
    }
}

fn entry(seq: usize, lines: usize) -> LogEntry {
    let message = (0..lines.max(1))
        .map(|i| format!("entry {seq} part {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    LogEntry {
        timestamp: Default::default(),
        stream: LogStream::Stdout,
        origin: None,
        message,
        token: mock_token(seq),
    }
}

/// Serve a page the way an inclusive-boundary provider does.
fn serve(log: &[LogEntry], request: &FetchRequest) -> FetchPage {
    let token = request.from_token.as_str();
    let slice = if token.is_empty() {
        log[log.len().saturating_sub(PAGE)..].to_vec()
    } else {
        let idx = log.iter().position(|e| e.token == token).expect("known token");
        match request.direction {
            Direction::Backward => log[(idx + 1).saturating_sub(PAGE + 1)..=idx].to_vec(),
            Direction::Forward => log[idx..(idx + PAGE + 1).min(log.len())].to_vec(),
        }
    };
    finalize_page(slice, request.direction, token, PAGE)
}

#[derive(Debug, Clone)]
enum Op {
    Older,
    Newer,
    Grow(usize),
    Follow,
    Prefetch(usize),
    /// Resolve the oldest (false) or newest (true) pending request.
    Resolve(bool),
    Trim(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Older),
        Just(Op::Newer),
        (1usize..12).prop_map(Op::Grow),
        Just(Op::Follow),
        (0usize..200).prop_map(Op::Prefetch),
        any::<bool>().prop_map(Op::Resolve),
        (0usize..200).prop_map(Op::Trim),
    ]
}

struct Model {
    log: Vec<LogEntry>,
    buf: ScrollbackBuffer,
    pending: Vec<FetchRequest>,
}

impl Model {
    fn new(initial: usize) -> Self {
        let log: Vec<LogEntry> = (0..initial).map(|seq| entry(seq, 1 + seq % 3)).collect();
        let mut buf = ScrollbackBuffer::new(limits());
        buf.initialize(TargetId::container("web"), limits().target_size);
        let first = buf.begin_initial_load().expect("initial request");
        Self {
            log,
            buf,
            pending: vec![first],
        }
    }

    fn push(&mut self, request: Option<FetchRequest>) {
        if let Some(request) = request {
            self.pending.push(request);
        }
    }

    fn resolve(&mut self, newest: bool) {
        if self.pending.is_empty() {
            return;
        }
        let request = if newest {
            self.pending.pop().expect("non-empty")
        } else {
            self.pending.remove(0)
        };
        assert!(self.buf.accepts(&request));
        let page = serve(&self.log, &request);
        if request.is_initial() {
            let next = self.buf.apply_initial(page);
            self.push(next);
        } else if request.direction == Direction::Backward {
            let next = self.buf.apply_backward(&request.from_token, page);
            self.push(next);
        } else {
            let next = self.buf.apply_forward(&request.from_token, page);
            self.push(next);
        }
    }

    fn step(&mut self, op: Op) {
        match op {
            Op::Older => {
                let next = self.buf.request_page(Direction::Backward, false);
                self.push(next);
            }
            Op::Newer => {
                let next = self.buf.request_page(Direction::Forward, false);
                self.push(next);
            }
            Op::Grow(n) => {
                let start = self.log.len();
                self.log
                    .extend((start..start + n).map(|seq| entry(seq, 1 + seq % 3)));
            }
            Op::Follow => {
                self.buf.start_follow();
                let next = self.buf.follow_tick();
                self.push(next);
            }
            Op::Prefetch(offset) => {
                let total = self.buf.rendered_line_count();
                let offset = offset % total.max(1);
                let requests = self.buf.check_prefetch_needs(offset, HEIGHT, total);
                self.pending.extend(requests);
            }
            Op::Resolve(newest) => self.resolve(newest),
            Op::Trim(offset) => {
                let total = self.buf.rendered_line_count();
                let _ = self.buf.trim(offset % total.max(1), HEIGHT);
            }
        }
    }

    fn check(&self) {
        let tokens: Vec<&str> = self.buf.entries().map(|e| e.token.as_str()).collect();
        for pair in tokens.windows(2) {
            assert!(pair[0] < pair[1], "out of order or duplicate: {pair:?}");
        }
        for direction in [Direction::Backward, Direction::Forward] {
            let outstanding = self
                .pending
                .iter()
                .filter(|r| r.direction == direction)
                .count();
            assert!(outstanding <= 1, "{outstanding} {direction} fetches in flight");
            assert_eq!(outstanding == 1, self.buf.in_flight(direction));
        }
    }
}

proptest! {
    #[test]
    fn merges_keep_entries_ordered_and_unique(
        initial in 1usize..60,
        ops in prop::collection::vec(op(), 1..80),
    ) {
        let mut model = Model::new(initial);
        model.check();
        for op in ops {
            model.step(op);
            model.check();
        }
    }

    #[test]
    fn trim_keeps_visible_lines_in_place(
        count in 41usize..120,
        exhausted in any::<bool>(),
        offset_seed in 0usize..10_000,
        height in 1usize..20,
    ) {
        let entries: Vec<LogEntry> = (0..count).map(|seq| entry(seq, 1 + seq % 3)).collect();
        let mut buf = ScrollbackBuffer::new(limits());
        buf.initialize(TargetId::container("web"), limits().target_size);
        let _ = buf.begin_initial_load();
        let _ = buf.apply_initial(finalize_page(entries, Direction::Backward, "", count));
        if exhausted {
            let oldest = buf.backward_token().to_owned();
            if let Some(request) = buf.request_page(Direction::Backward, true) {
                let _ = buf.apply_backward(&request.from_token, FetchPage::empty());
            }
            prop_assert_eq!(buf.backward_token(), oldest.as_str());
        }

        let total = buf.rendered_line_count();
        let offset = offset_seed % total.saturating_sub(height).max(1);
        let before = buf.window(offset, height, false);
        let removed = buf.trim(offset, height);
        prop_assert!(removed <= offset);
        let after = buf.window(offset - removed, height, false);
        prop_assert_eq!(before, after);
    }

    #[test]
    fn repeated_prefetch_checks_issue_one_request_per_direction(
        initial in 1usize..40,
        offset in 0usize..100,
    ) {
        let mut model = Model::new(initial);
        model.resolve(false);
        // Fail whatever backfill the initial page triggered.
        for request in std::mem::take(&mut model.pending) {
            model.buf.apply_error(request.direction);
        }
        let total = model.buf.rendered_line_count();
        let first = model.buf.check_prefetch_needs(offset % total.max(1), HEIGHT, total);
        let second = model.buf.check_prefetch_needs(offset % total.max(1), HEIGHT, total);
        model.pending.extend(first);
        model.pending.extend(second);
        model.check();
    }
}
