#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use stackops_scrollback::{load_config, ConfigError};

#[test]
fn explicit_config_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs.yaml");
    std::fs::write(
        &path,
        "data_dir: /var/lib/stackops\nscrollback:\n  page_size: 250\n  target_size: 2500\n  fetch_timeout_ms: 3000\nsources:\n  container_socket: /run/podman/podman.sock\n",
    )
    .unwrap();

    let (cfg, used) = load_config(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(used.as_deref(), Some(path.as_path()));
    assert_eq!(cfg.limits.page_size, 250);
    assert_eq!(cfg.limits.target_size, 2500);
    assert_eq!(cfg.fetch_timeout, Duration::from_secs(3));
    assert_eq!(
        cfg.container.socket_path,
        std::path::PathBuf::from("/run/podman/podman.sock")
    );
    assert_eq!(
        cfg.logging.file,
        std::path::PathBuf::from("/var/lib/stackops/logs/stackops-logs.log")
    );
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    let err = load_config(Some(path.to_str().unwrap())).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn invalid_limits_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs.yaml");
    std::fs::write(&path, "scrollback:\n  page_size: 900\n  target_size: 100\n").unwrap();

    let err = load_config(Some(path.to_str().unwrap())).unwrap_err();
    match err {
        ConfigError::Invalid { message } => assert!(message.contains("target_size")),
        other => panic!("expected invalid config, got {other:?}"),
    }
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs.yaml");
    std::fs::write(&path, "scrollback: [not, a, map\n").unwrap();

    let err = load_config(Some(path.to_str().unwrap())).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}
