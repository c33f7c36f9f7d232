use std::process::ExitCode;

use clap::Parser;
use filesort::cli::{Cli, run_cli};
use filesort::config::FileSortConfig;
use filesort::logging::init_logging;
use filesort::output::OutputFormatter;
use filesort::progress::StopSignal;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match FileSortConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_logging("warn");
            OutputFormatter::error(&format!("Error loading configuration: {}", e));
            return ExitCode::FAILURE;
        }
    };
    cli.apply_to(&mut config);
    init_logging(cli.log_level(&config));

    // Ctrl-C ends an organize after the current file; the partial run is
    // still logged and can be undone.
    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_stop.stop()) {
        tracing::warn!(error = %e, "Failed to set Ctrl-C handler");
    }

    let source = cli.source_dir();
    let dest = cli.dest_dir();
    match run_cli(cli.command(), &source, &dest, &config, cli.quiet, &stop) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("Error: {}", e));
            ExitCode::FAILURE
        }
    }
}
