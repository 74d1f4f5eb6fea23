//! stackops-scrollback: bidirectional, prefetching scrollback over a log
//! source.
//!
//! - `buffer`: the bounded entry window and its pagination state
//! - `controller`: the `(state, event) -> effects` view state machine
//! - `runtime`: runs fetch and timer effects on tokio
//! - `config`, `logging`: viewer configuration and tracing setup

pub mod buffer;
pub mod config;
pub mod controller;
pub mod logging;
pub mod runtime;

pub use buffer::ScrollbackBuffer;
pub use config::{load_config, ConfigError, ScrollbackLimits, ViewerConfig};
pub use controller::{Effect, ViewController, ViewSnapshot, ViewState, ViewerEvent};
pub use runtime::EffectRunner;

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "stackops-scrollback"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_label_is_stable() {
        assert_eq!(crate_label(), "stackops-scrollback");
    }
}
