//! Interactive loop: terminal input and fetch results feed one controller.

use std::sync::Arc;

use crossterm::event::{self, Event};
use tokio::sync::mpsc;

use stackops_logsource::container::ContainerLogSource;
use stackops_logsource::journal::JournalLogSource;
use stackops_logsource::process::{ProcessRunner, SystemProcessRunner};
use stackops_logsource::{LogSource, SourceRouter, TargetId};
use stackops_scrollback::{EffectRunner, ViewController, ViewState, ViewerConfig, ViewerEvent};

use crate::args::ParsedArgs;
use crate::discovery::discover_targets;
use crate::keymap::{is_interrupt, map_terminal_event};
use crate::terminal::{draw, terminal_size, TerminalSession};

pub fn build_source(runner: Arc<dyn ProcessRunner>, config: &ViewerConfig) -> Arc<dyn LogSource> {
    let containers = Arc::new(ContainerLogSource::new(
        Arc::clone(&runner),
        config.container.clone(),
    ));
    let services = Arc::new(JournalLogSource::new(runner, config.journalctl_binary.clone()));
    Arc::new(SourceRouter::new(containers, services))
}

/// Events fed to a fresh controller before the first draw.
pub fn startup_events(targets: Vec<TargetId>, width: u16, height: u16) -> Vec<ViewerEvent> {
    let mut events = vec![ViewerEvent::Resize { width, height }];
    let only = if targets.len() == 1 {
        targets.first().cloned()
    } else {
        None
    };
    events.push(ViewerEvent::SetTargets(targets));
    if let Some(target) = only {
        events.push(ViewerEvent::SelectTarget(target));
    }
    events
}

pub async fn run(config: ViewerConfig, args: ParsedArgs) -> Result<(), String> {
    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemProcessRunner);
    let targets = if args.targets.is_empty() {
        discover_targets(runner.as_ref()).await
    } else {
        args.targets.clone()
    };

    let source = build_source(runner, &config);
    let mut controller = ViewController::new(config.limits, config.follow_interval);
    let mut effects = EffectRunner::new(source, config.limits.page_size, config.fetch_timeout);

    let mut session =
        TerminalSession::enter().map_err(|err| format!("enter terminal mode: {err}"))?;
    let (mut width, mut height) =
        terminal_size().map_err(|err| format!("read terminal size: {err}"))?;
    for event in startup_events(targets, width, height) {
        effects.handle(&mut controller, event);
    }

    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<Event>();
    std::thread::spawn(move || forward_terminal_events(input_tx));

    let mut pending_follow = args.follow;
    loop {
        draw(&mut session.stdout, &controller.snapshot(), width, height)
            .map_err(|err| format!("render frame: {err}"))?;
        if controller.quitting() {
            break;
        }

        let event = tokio::select! {
            input = input_rx.recv() => {
                let Some(input) = input else { break };
                if is_interrupt(&input) {
                    break;
                }
                if let Event::Resize(w, h) = input {
                    width = w;
                    height = h;
                }
                match map_terminal_event(&input, controller.state()) {
                    Some(event) => event,
                    None => continue,
                }
            }
            event = effects.next_event() => event,
        };
        if effects.handle(&mut controller, event) {
            break;
        }

        if pending_follow
            && controller.state() == ViewState::Viewing
            && !controller.is_loading()
        {
            pending_follow = false;
            effects.handle(&mut controller, ViewerEvent::ToggleFollow);
        }
    }

    Ok(())
}

fn forward_terminal_events(tx: mpsc::UnboundedSender<Event>) {
    loop {
        match event::read() {
            Ok(event) => {
                if tx.send(event).is_err() {
                    return;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "terminal input closed");
                return;
            }
        }
    }
}
