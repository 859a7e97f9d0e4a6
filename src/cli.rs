use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "honeyshell", version, about = "Honeyshell: emulated shell sessions with full recording")]
pub struct Cli {
    /// Directory holding honeyshell.toml and .env
    #[arg(short, long, global = true, default_value = ".")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive session on this terminal
    #[command(visible_alias = "sh")]
    Shell,

    /// Run one command line non-interactively, stdin is captured
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Run script files as independent non-interactive sessions
    Batch {
        #[arg(required = true)]
        scripts: Vec<PathBuf>,
    },

    /// Print a recorded session log
    Replay {
        log: PathBuf,

        /// List every record with direction and timestamp
        #[arg(short, long)]
        dump: bool,

        /// Keep the original pacing between records
        #[arg(short, long)]
        realtime: bool,
    },
}
