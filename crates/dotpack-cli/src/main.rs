#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use dotpack_core::paths;
use dotpack_core::Config;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dotpack")]
#[command(author, version, about = "Package manager front end for .NET workspaces", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    /// Workspace root to discover projects in
    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,

    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true, env = paths::CONFIG_ENV, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Host the mediator over stdin/stdout (one JSON message per line)
    Serve {
        /// Quiet period before a search is sent to the feed
        #[arg(long, value_name = "MS")]
        debounce_ms: Option<u64>,

        /// Upper bound for one install/uninstall across all targets
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,

        /// dotnet executable used for install/uninstall
        #[arg(long, default_value = "dotnet", value_name = "PATH")]
        dotnet: PathBuf,
    },

    /// List the projects discovered in the workspace
    Projects {
        /// Report the installed version of this package
        #[arg(long, value_name = "ID")]
        package: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = Config::load(cli.config.as_deref()).into_diagnostic()?;

    let root = match &cli.workspace {
        Some(root) => root.clone(),
        None => paths::workspace_root(&config.workspace_root)
            .unwrap_or_else(|| config.workspace_root.clone()),
    };

    Ok(config.with_workspace_root(root))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Commands::Version) | None) {
        return commands::version::run();
    }

    logging::init(cli.verbose, cli.json_logs);
    let config = load_config(&cli)?;

    match cli.command {
        Some(Commands::Serve {
            debounce_ms,
            timeout_secs,
            dotnet,
        }) => {
            let mut config = config;
            if let Some(ms) = debounce_ms {
                config = config.with_search_debounce_ms(ms);
            }
            if let Some(secs) = timeout_secs {
                config = config.with_operation_timeout_secs(secs);
            }
            config.validate().into_diagnostic()?;
            commands::serve::run(config, dotnet)
        }
        Some(Commands::Projects { package, json }) => {
            commands::projects::run(&config, package.as_deref(), json)
        }
        Some(Commands::Version) | None => unreachable!(), // Handled above
    }
}
