//! stackops-logsource: paginated log providers behind one fetch contract.
//!
//! Provides the `LogSource` trait with implementations for:
//! - `ContainerLogSource`: container engine logs, timestamp tokens
//! - `JournalLogSource`: systemd journal, opaque cursor tokens
//! - `MockLogSource`: in-memory provider for tests
//!
//! `SourceRouter` picks the adapter for a target by its kind.

pub mod container;
pub mod entry;
pub mod error;
pub mod journal;
pub mod mock;
pub mod process;
pub mod source;

pub use entry::{
    Direction, FetchPage, FetchRequest, FetchResult, LogEntry, LogStream, TargetId, TargetKind,
};
pub use error::LogSourceError;
pub use source::{fetch_with_timeout, finalize_page, LogSource, SourceRouter};

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "stackops-logsource"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_label_is_stable() {
        assert_eq!(crate_label(), "stackops-logsource");
    }
}
