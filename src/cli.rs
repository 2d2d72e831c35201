//! Command-line interface definitions using clap.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::config::{RcConfig, SessionConfig};
use crate::inspect::InspectorKind;
use crate::paths;

/// A forking PHP REPL: every statement runs in its own process.
#[derive(Parser, Debug)]
#[command(name = "phork")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Files to require before the first prompt.
    #[arg(value_name = "FILE")]
    pub includes: Vec<PathBuf>,

    /// Additional files to require, comma separated.
    #[arg(short, long, value_name = "FILES", value_delimiter = ',')]
    pub require: Vec<PathBuf>,

    /// Prompt text shown after the statement counter.
    #[arg(long, default_value = "> ")]
    pub prompt: String,

    /// How returned values are displayed.
    #[arg(long, value_enum, default_value_t = InspectorKind::Dump)]
    pub inspector: InspectorKind,

    /// PHP binary used for evaluation.
    #[arg(long, env = "PHORK_PHP", default_value = "php")]
    pub php: PathBuf,

    /// Path to the history file.
    #[arg(long, default_value_os_t = paths::default_history_path())]
    pub history_file: PathBuf,

    /// Do not read or write history.
    #[arg(long)]
    pub no_history: bool,

    /// Do not load .phorkrc files.
    #[arg(long)]
    pub no_rc: bool,

    /// Load every .phorkrc found ($HOME, then the working directory)
    /// instead of only the first.
    #[arg(long, conflicts_with = "no_rc")]
    pub cascade_rc: bool,

    /// Enable verbose logging (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log filter, e.g. `debug` or `phork::worker=trace`.
    #[arg(long, value_name = "FILTER", conflicts_with = "verbose")]
    pub log_level: Option<String>,

    /// Disable colored output.
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands. Without one, phork starts the REPL.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

/// Arguments for shell completions.
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate and print completions to stdout.
    pub fn generate(&self) {
        clap_complete::generate(
            self.shell,
            &mut Cli::command(),
            "phork",
            &mut std::io::stdout(),
        );
    }
}

impl Cli {
    /// Build the session configuration from the parsed flags.
    pub fn session_config(&self) -> SessionConfig {
        let history_path =
            (!self.no_history).then(|| paths::expand_tilde(&self.history_file));
        let rc = (!self.no_rc).then(|| RcConfig::new().cascade(self.cascade_rc));
        let requires = self
            .includes
            .iter()
            .chain(&self.require)
            .map(paths::expand_tilde)
            .collect();

        SessionConfig {
            prompt: self.prompt.clone(),
            history_path,
            requires,
            inspector: self.inspector,
            php: paths::expand_tilde(&self.php),
            rc,
        }
    }
}
