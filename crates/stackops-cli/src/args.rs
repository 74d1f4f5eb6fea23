use stackops_logsource::TargetId;
use stackops_scrollback::ViewerConfig;

pub const HELP_TEXT: &str = "\
Browse container and service logs with bidirectional scrollback.

Usage:
  stackops-logs [flags] [target...]

Targets:
  container:<name>   container logs from the container engine
  service:<unit>     systemd journal for a unit
  <name>             container:<name> unless it ends in .service

With no targets, running containers and loaded services are listed.

Flags:
  -c, --config <path>          config file (default ~/.config/stackops/logs.yaml)
  -f, --follow                 follow the first opened target
  -n, --page-size <n>          entries per fetch
      --buffer-cap <n>         entries kept in memory before trimming
      --follow-interval-ms <n> follow poll interval
      --log-level <level>      trace, debug, info, warn or error
  -h, --help                   show this help

Keys:
  up/down j/k  scroll     pgup/pgdn  page (fetches at the edges)
  home/end     jump       left/right horizontal scroll
  f  follow    m  metadata    x  dismiss error
  esc  back    q  quit
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Help,
    Run(ParsedArgs),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub config: Option<String>,
    pub targets: Vec<TargetId>,
    pub follow: bool,
    pub page_size: Option<usize>,
    pub buffer_cap: Option<usize>,
    pub follow_interval_ms: Option<u64>,
    pub log_level: Option<String>,
}

impl ParsedArgs {
    /// Flags take precedence over file and environment settings.
    pub fn apply_to(&self, cfg: &mut ViewerConfig) {
        if let Some(page_size) = self.page_size {
            cfg.limits.page_size = page_size;
        }
        if let Some(cap) = self.buffer_cap {
            cfg.limits.max_buffer_entries = cap;
        }
        if let Some(ms) = self.follow_interval_ms {
            cfg.follow_interval = std::time::Duration::from_millis(ms);
        }
        if let Some(level) = &self.log_level {
            cfg.logging.level.clone_from(level);
        }
    }
}

pub fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut parsed = ParsedArgs::default();
    let mut index = 0usize;

    while let Some(token) = args.get(index) {
        match token.as_str() {
            "-h" | "--help" | "help" => return Ok(Invocation::Help),
            "-c" | "--config" => {
                parsed.config = Some(take_value(args, index, "--config")?);
                index += 2;
            }
            "-f" | "--follow" => {
                parsed.follow = true;
                index += 1;
            }
            "-n" | "--page-size" => {
                parsed.page_size = Some(parse_number(args, index, "--page-size")?);
                index += 2;
            }
            "--buffer-cap" => {
                parsed.buffer_cap = Some(parse_number(args, index, "--buffer-cap")?);
                index += 2;
            }
            "--follow-interval-ms" => {
                parsed.follow_interval_ms =
                    Some(parse_number(args, index, "--follow-interval-ms")?);
                index += 2;
            }
            "--log-level" => {
                parsed.log_level = Some(take_value(args, index, "--log-level")?);
                index += 2;
            }
            flag if flag.starts_with('-') => {
                return Err(format!("error: unknown argument '{flag}'"));
            }
            value => {
                let target = TargetId::parse(value)
                    .ok_or_else(|| format!("error: invalid target '{value}'"))?;
                parsed.targets.push(target);
                index += 1;
            }
        }
    }

    Ok(Invocation::Run(parsed))
}

fn take_value(args: &[String], index: usize, flag: &str) -> Result<String, String> {
    match args.get(index + 1) {
        Some(value) if !value.starts_with('-') => Ok(value.clone()),
        _ => Err(format!("error: missing value for {flag}")),
    }
}

fn parse_number<T: std::str::FromStr>(args: &[String], index: usize, flag: &str) -> Result<T, String> {
    let raw = take_value(args, index, flag)?;
    raw.parse::<T>()
        .map_err(|_| format!("error: invalid value '{raw}' for {flag}"))
}
