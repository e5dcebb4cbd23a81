mod commands;
mod error;
mod logging;

use clap::Parser;

/// The DomainLang workspace dependency manager.
#[derive(clap::Parser, Debug)]
#[command(name = "dlang", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Increase log verbosity. Repeatable.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Decrease log verbosity. Repeatable; -qq silences everything but errors.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Emit machine-readable JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable ANSI color codes in output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Never touch the network or modify model.lock; fail if model.yaml
    /// has drifted from it. Applies to install/add/update/upgrade.
    #[arg(long, global = true)]
    pub frozen_lock: bool,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Scaffold a new workspace manifest.
    Init,
    /// Install every dependency named in model.yaml.
    Install,
    /// Add a dependency to model.yaml and install it.
    Add { specifier: String },
    /// Remove a dependency from model.yaml and model.lock.
    Remove { alias: String },
    /// Re-resolve branch-pinned dependencies to their current commit.
    Update { alias: Option<String> },
    /// Bump tag-pinned dependencies to their latest available tag.
    Upgrade { alias: Option<String> },
    /// Report which dependencies have a newer tag available.
    Outdated,
    /// Remove every entry from the package cache.
    #[command(name = "cache-clear")]
    CacheClear,
}

fn main() {
    let cli = Cli::parse();
    let _guard = logging::init(&cli.global);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(commands::dispatch(cli.command, &cli.global));
    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(e.exit_code());
    }
}
