mod cli;
mod config;
mod events;
mod handlers;
mod logger;
mod session;
mod shell;
mod terminal;
mod utils;
mod vfs;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use handlers::{batch, exec, replay, shell as local_shell};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Shell => local_shell::handle_shell(&cli.config),
        Commands::Exec { command } => exec::handle_exec(&cli.config, &command),
        Commands::Batch { scripts } => batch::handle_batch(&cli.config, &scripts),
        Commands::Replay { log, dump, realtime } => replay::handle_replay(&log, dump, realtime),
    }
}
