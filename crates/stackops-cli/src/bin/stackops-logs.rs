use std::process::ExitCode;

use stackops_cli::app;
use stackops_cli::args::{parse_args, Invocation, HELP_TEXT};
use stackops_scrollback::config::load_config;
use stackops_scrollback::logging::init_logging;

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(Invocation::Help) => {
            print!("{HELP_TEXT}");
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Run(args)) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };

    let (mut config, config_path) = match load_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("stackops-logs: {err}");
            return ExitCode::FAILURE;
        }
    };
    args.apply_to(&mut config);
    if let Err(err) = config.validate() {
        eprintln!("stackops-logs: {err}");
        return ExitCode::FAILURE;
    }
    if let Err(err) = init_logging(&config.logging) {
        eprintln!("stackops-logs: {err}");
        return ExitCode::FAILURE;
    }
    tracing::info!(
        config = ?config_path,
        page_size = config.limits.page_size,
        buffer_cap = config.limits.max_buffer_entries,
        "starting log viewer"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("stackops-logs: start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(app::run(config, args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "log viewer failed");
            eprintln!("stackops-logs: {err}");
            ExitCode::FAILURE
        }
    }
}
