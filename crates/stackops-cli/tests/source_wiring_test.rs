#![allow(clippy::expect_used, clippy::unwrap_used)]

//! The CLI's source wiring routes each target kind to its provider binary.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use stackops_cli::app::build_source;
use stackops_logsource::process::ProcessRunner;
use stackops_logsource::{Direction, LogSourceError, TargetId};
use stackops_scrollback::ViewerConfig;

#[derive(Default)]
struct RecordingRunner {
    programs: Mutex<Vec<String>>,
}

#[async_trait]
impl ProcessRunner for RecordingRunner {
    async fn run(&self, program: &str, _args: &[String]) -> Result<Vec<u8>, LogSourceError> {
        self.programs.lock().unwrap().push(program.to_owned());
        if program.ends_with("journalctl") {
            Ok(br#"{"__CURSOR":"c1","__REALTIME_TIMESTAMP":"1700000000000000","MESSAGE":"hello"}"#.to_vec())
        } else {
            Ok(Vec::new())
        }
    }
}

#[tokio::test]
async fn services_use_journalctl_and_containers_use_curl() {
    let runner = Arc::new(RecordingRunner::default());
    let mut config = ViewerConfig::with_data_dir(PathBuf::from("/tmp/stackops-test"));
    config.journalctl_binary = "/usr/bin/journalctl".to_owned();
    let source = build_source(runner.clone(), &config);

    let page = source
        .fetch(&TargetId::service("app.service"), Direction::Backward, "", 50)
        .await
        .unwrap();
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.entries[0].message, "hello");

    let page = source
        .fetch(&TargetId::container("web"), Direction::Backward, "", 50)
        .await
        .unwrap();
    assert!(page.entries.is_empty());

    assert_eq!(
        *runner.programs.lock().unwrap(),
        vec!["/usr/bin/journalctl".to_owned(), "curl".to_owned()]
    );
}
