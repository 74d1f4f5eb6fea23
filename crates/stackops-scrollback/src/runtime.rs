//! Effect runner: executes controller effects on tokio.
//!
//! Fetches run as spawned tasks and report back over a channel; the follow
//! ticker is a tokio interval. [`EffectRunner::next_event`] turns both into
//! [`ViewerEvent`]s for the single loop that owns the controller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use stackops_logsource::{fetch_with_timeout, FetchRequest, FetchResult, LogSource};

use crate::controller::{Effect, ViewController, ViewerEvent};

pub struct EffectRunner {
    source: Arc<dyn LogSource>,
    page_size: usize,
    fetch_timeout: Duration,
    results_tx: mpsc::UnboundedSender<FetchResult>,
    results_rx: mpsc::UnboundedReceiver<FetchResult>,
    follow: Option<Interval>,
    dispatched: usize,
}

impl EffectRunner {
    pub fn new(source: Arc<dyn LogSource>, page_size: usize, fetch_timeout: Duration) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            source,
            page_size,
            fetch_timeout,
            results_tx,
            results_rx,
            follow: None,
            dispatched: 0,
        }
    }

    /// Total fetches spawned so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn follow_active(&self) -> bool {
        self.follow.is_some()
    }

    /// Run `effects`. Returns `true` once a quit effect is seen.
    pub fn apply(&mut self, effects: Vec<Effect>) -> bool {
        let mut quit = false;
        for effect in effects {
            match effect {
                Effect::Fetch(request) => self.spawn_fetch(request),
                Effect::StartFollowTimer(period) => {
                    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.follow = Some(interval);
                }
                Effect::StopFollowTimer => self.follow = None,
                Effect::Quit => {
                    self.follow = None;
                    quit = true;
                }
            }
        }
        quit
    }

    /// Feed `event` to `controller` and run the resulting effects.
    pub fn handle(&mut self, controller: &mut ViewController, event: ViewerEvent) -> bool {
        let effects = controller.update(event);
        self.apply(effects)
    }

    fn spawn_fetch(&mut self, request: FetchRequest) {
        tracing::debug!(
            log_target = %request.target,
            direction = %request.direction,
            from_token = %request.from_token,
            prefetch = request.is_prefetch,
            "dispatching log fetch"
        );
        self.dispatched += 1;
        let source = Arc::clone(&self.source);
        let tx = self.results_tx.clone();
        let page_size = self.page_size;
        let timeout = self.fetch_timeout;
        tokio::spawn(async move {
            let outcome = fetch_with_timeout(source.as_ref(), &request, page_size, timeout).await;
            if tx.send(FetchResult { request, outcome }).is_err() {
                tracing::debug!("viewer gone; fetch result discarded");
            }
        });
    }

    /// Wait for the next fetch result or follow tick.
    pub async fn next_event(&mut self) -> ViewerEvent {
        let follow = &mut self.follow;
        let results = &mut self.results_rx;
        tokio::select! {
            Some(result) = results.recv() => ViewerEvent::FetchCompleted(result),
            () = tick(follow) => ViewerEvent::FollowTick,
        }
    }

    /// A fetch result if one is ready, without waiting.
    pub fn try_next_result(&mut self) -> Option<FetchResult> {
        self.results_rx.try_recv().ok()
    }
}

async fn tick(follow: &mut Option<Interval>) {
    match follow {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
