use std::{net::SocketAddr, path::PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::settings::SettingsArgs;

#[derive(Debug, Parser)]
#[command(
    name = "fileseek",
    version,
    about = "Incremental semantic search over your local documents"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true, env = "FILESEEK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API
    Serve(ServeArgs),
    /// Index a directory (incremental)
    Index(IndexArgs),
    /// Search indexed documents
    Search(SearchArgs),
    /// Show index statistics
    Status(StatusArgs),
    /// List indexed files
    Files(FilesArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Serve --

#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "FILESEEK_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Directory to index
    pub directory: PathBuf,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Number of results to return (defaults to --default-results)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Output only file paths (one per line)
    #[arg(long)]
    pub files: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Files --

#[derive(Debug, Parser)]
pub struct FilesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "fileseek",
            &mut std::io::stdout(),
        );
    }
}
