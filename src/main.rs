//! phork - a forking PHP REPL

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::{OwoColorize, Stream::Stderr};
use tracing::debug;

use phork::cli::{Cli, Commands};
use phork::logging::{self, LogConfig};
use phork::repl::run_session;
use phork::theme;

/// Program entry point: parses CLI arguments, sets up colors and logging,
/// then either prints shell completions or runs the REPL.
///
/// Errors are printed with their cause chain and the process exits with 1.
fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        theme::disable_colors();
    }

    let log_config = match cli.log_level {
        Some(ref filter) => LogConfig::new().with_filter(filter.clone()),
        None => LogConfig::from_verbosity(cli.verbose),
    };
    logging::init(log_config.with_env_overrides());

    let result = match cli.command {
        Some(Commands::Completions(ref args)) => {
            args.generate();
            Ok(())
        }
        None => cmd_repl(&cli),
    };

    if let Err(e) = result {
        eprintln!(
            "{}: {}",
            "error"
                .if_supports_color(Stderr, |text| text.red())
                .if_supports_color(Stderr, |text| text.bold()),
            e
        );
        for cause in e.chain().skip(1) {
            eprintln!(
                "  {}: {}",
                "caused by".if_supports_color(Stderr, |text| text.yellow()),
                cause
            );
        }
        std::process::exit(1);
    }
}

/// Run an interactive session with the configuration from the command line.
fn cmd_repl(cli: &Cli) -> Result<()> {
    let config = cli.session_config();
    let exit = run_session(&config).context("REPL session failed")?;
    debug!(?exit, "Session ended");
    Ok(())
}
