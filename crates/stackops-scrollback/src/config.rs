use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use stackops_logsource::container::ContainerSourceConfig;

/// Pagination and memory limits for one scrollback buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollbackLimits {
    /// Entries requested per fetch.
    pub page_size: usize,
    /// Backward prefetching stops once the buffer holds this many entries.
    pub target_size: usize,
    /// Trimming starts above this many entries.
    pub max_buffer_entries: usize,
    /// Prefetch when the view is this many viewports from a buffer edge.
    pub prefetch_lead_viewports: usize,
    /// Viewports kept around the visible range when trimming.
    pub viewports_to_keep: usize,
    /// Edges with fewer removable entries than this are left alone.
    pub min_trim_entries: usize,
}

impl Default for ScrollbackLimits {
    fn default() -> Self {
        Self {
            page_size: 500,
            target_size: 5000,
            max_buffer_entries: 20_000,
            prefetch_lead_viewports: 5,
            viewports_to_keep: 10,
            min_trim_entries: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file: PathBuf,
}

/// Root configuration for the log viewer.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub data_dir: PathBuf,
    pub limits: ScrollbackLimits,
    pub follow_interval: Duration,
    pub fetch_timeout: Duration,
    pub container: ContainerSourceConfig,
    pub journalctl_binary: String,
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {message}")]
    Parse { message: String },
    #[error("invalid config: {message}")]
    Invalid { message: String },
}

impl ViewerConfig {
    pub fn default_from_env() -> Self {
        let home = std::env::var("HOME").unwrap_or_default();
        let data_dir = if home.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(&home)
                .join(".local")
                .join("share")
                .join("stackops")
        };
        Self::with_data_dir(data_dir)
    }

    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let log_file = data_dir.join("logs").join("stackops-logs.log");
        Self {
            data_dir,
            limits: ScrollbackLimits::default(),
            follow_interval: Duration::from_millis(500),
            fetch_timeout: Duration::from_secs(10),
            container: ContainerSourceConfig::default(),
            journalctl_binary: "journalctl".to_owned(),
            logging: LoggingConfig {
                level: "info".to_owned(),
                format: "console".to_owned(),
                file: log_file,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.page_size == 0 {
            return invalid("page_size must be at least 1");
        }
        if limits.target_size < limits.page_size {
            return invalid("target_size must be at least page_size");
        }
        if limits.max_buffer_entries < limits.target_size {
            return invalid("max_buffer_entries must be at least target_size");
        }
        if limits.prefetch_lead_viewports == 0 {
            return invalid("prefetch_lead_viewports must be at least 1");
        }
        if limits.viewports_to_keep == 0 {
            return invalid("viewports_to_keep must be at least 1");
        }
        if self.follow_interval < Duration::from_millis(100) {
            return invalid("follow_interval must be at least 100ms");
        }
        if self.fetch_timeout.is_zero() {
            return invalid("fetch_timeout must be greater than 0");
        }
        match self.logging.level.to_lowercase().trim() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return invalid("logging.level must be one of trace, debug, info, warn, error"),
        }
        match self.logging.format.to_lowercase().trim() {
            "console" | "json" => {}
            _ => return invalid("logging.format must be one of console, json"),
        }
        Ok(())
    }
}

fn invalid(message: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid {
        message: message.to_owned(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    #[serde(default)]
    data_dir: String,
    #[serde(default)]
    scrollback: PartialScrollbackConfig,
    #[serde(default)]
    sources: PartialSourcesConfig,
    #[serde(default)]
    logging: PartialLoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
struct PartialScrollbackConfig {
    #[serde(default)]
    page_size: usize,
    #[serde(default)]
    target_size: usize,
    #[serde(default)]
    max_buffer_entries: usize,
    #[serde(default)]
    prefetch_lead_viewports: usize,
    #[serde(default)]
    viewports_to_keep: usize,
    #[serde(default)]
    min_trim_entries: usize,
    #[serde(default)]
    follow_interval_ms: u64,
    #[serde(default)]
    fetch_timeout_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
struct PartialSourcesConfig {
    #[serde(default)]
    container_socket: String,
    #[serde(default)]
    container_api_version: String,
    #[serde(default)]
    curl_binary: String,
    #[serde(default)]
    journalctl_binary: String,
}

#[derive(Debug, Default, Deserialize)]
struct PartialLoggingConfig {
    #[serde(default)]
    level: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    file: String,
}

/// Load config with precedence defaults < config file < environment.
///
/// An explicit `config_file` must be readable; the default location is
/// optional. Returns the config and the file it was read from, if any.
pub fn load_config(
    config_file: Option<&str>,
) -> Result<(ViewerConfig, Option<PathBuf>), ConfigError> {
    let mut cfg = ViewerConfig::default_from_env();

    let explicit = config_file
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from);

    let (path_to_try, required) = match explicit {
        Some(path) => (Some(path), true),
        None => (default_config_path(), false),
    };

    let mut used = None;
    if let Some(path) = path_to_try {
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                apply_yaml(&mut cfg, &text)?;
                used = Some(path);
            }
            Err(source) => {
                if required {
                    return Err(ConfigError::Read { path, source });
                }
            }
        }
    }

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    cfg.validate()?;
    Ok((cfg, used))
}

/// Merge a YAML document over `cfg`. Zero and empty values keep the current
/// setting.
pub fn apply_yaml(cfg: &mut ViewerConfig, text: &str) -> Result<(), ConfigError> {
    let partial: PartialConfig = serde_yaml::from_str(text).map_err(|err| ConfigError::Parse {
        message: err.to_string(),
    })?;
    apply_partial(cfg, partial);
    Ok(())
}

fn apply_partial(cfg: &mut ViewerConfig, partial: PartialConfig) {
    if !partial.data_dir.trim().is_empty() {
        let data_dir = expand_tilde(partial.data_dir.trim());
        if cfg.logging.file.starts_with(&cfg.data_dir) {
            cfg.logging.file = data_dir.join("logs").join("stackops-logs.log");
        }
        cfg.data_dir = data_dir;
    }

    let sb = partial.scrollback;
    set_nonzero(&mut cfg.limits.page_size, sb.page_size);
    set_nonzero(&mut cfg.limits.target_size, sb.target_size);
    set_nonzero(&mut cfg.limits.max_buffer_entries, sb.max_buffer_entries);
    set_nonzero(
        &mut cfg.limits.prefetch_lead_viewports,
        sb.prefetch_lead_viewports,
    );
    set_nonzero(&mut cfg.limits.viewports_to_keep, sb.viewports_to_keep);
    set_nonzero(&mut cfg.limits.min_trim_entries, sb.min_trim_entries);
    if sb.follow_interval_ms > 0 {
        cfg.follow_interval = Duration::from_millis(sb.follow_interval_ms);
    }
    if sb.fetch_timeout_ms > 0 {
        cfg.fetch_timeout = Duration::from_millis(sb.fetch_timeout_ms);
    }

    let sources = partial.sources;
    if !sources.container_socket.trim().is_empty() {
        cfg.container.socket_path = expand_tilde(sources.container_socket.trim());
    }
    set_nonempty(
        &mut cfg.container.api_version,
        &sources.container_api_version,
    );
    set_nonempty(&mut cfg.container.curl_binary, &sources.curl_binary);
    set_nonempty(&mut cfg.journalctl_binary, &sources.journalctl_binary);

    let logging = partial.logging;
    set_nonempty(&mut cfg.logging.level, &logging.level);
    set_nonempty(&mut cfg.logging.format, &logging.format);
    if !logging.file.trim().is_empty() {
        cfg.logging.file = expand_tilde(logging.file.trim());
    }
}

/// Apply `STACKOPS_LOGS_*` overrides. Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut ViewerConfig, lookup: impl Fn(&str) -> Option<String>) {
    let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

    if let Some(v) = number("STACKOPS_LOGS_PAGE_SIZE").and_then(|v| usize::try_from(v).ok()) {
        set_nonzero(&mut cfg.limits.page_size, v);
    }
    if let Some(v) = number("STACKOPS_LOGS_BUFFER_CAP").and_then(|v| usize::try_from(v).ok()) {
        set_nonzero(&mut cfg.limits.max_buffer_entries, v);
    }
    if let Some(ms) = number("STACKOPS_LOGS_FOLLOW_INTERVAL_MS").filter(|ms| *ms > 0) {
        cfg.follow_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = number("STACKOPS_LOGS_FETCH_TIMEOUT_MS").filter(|ms| *ms > 0) {
        cfg.fetch_timeout = Duration::from_millis(ms);
    }
    if let Some(level) = lookup("STACKOPS_LOGS_LEVEL") {
        set_nonempty(&mut cfg.logging.level, &level);
    }
}

fn set_nonzero(slot: &mut usize, value: usize) {
    if value > 0 {
        *slot = value;
    }
}

fn set_nonempty(slot: &mut String, value: &str) {
    if !value.trim().is_empty() {
        *slot = value.trim().to_owned();
    }
}

fn default_config_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            return Some(PathBuf::from(xdg).join("stackops").join("logs.yaml"));
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        if !home.trim().is_empty() {
            return Some(
                PathBuf::from(home)
                    .join(".config")
                    .join("stackops")
                    .join("logs.yaml"),
            );
        }
    }
    None
}

fn expand_tilde(input: &str) -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_default();
    if home.is_empty() {
        return PathBuf::from(input);
    }
    if input == "~" {
        return PathBuf::from(home);
    }
    match input.strip_prefix("~/") {
        Some(rest) => Path::new(&home).join(rest),
        None => PathBuf::from(input),
    }
}
