use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "revstore",
    about = "Inspect and edit revstore mounts",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Mount file (`.toml` or `.json`)
    #[arg(short, long, global = true, default_value = "revstore.toml")]
    pub config: PathBuf,

    /// Give up on locks and I/O after this many milliseconds (0 = never)
    #[arg(long, global = true, default_value = "5000")]
    pub timeout_ms: u64,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List configured mounts
    Mounts,
    /// Check whether a key exists
    Exists(KeyArgs),
    /// Print the value stored under a key
    Get(GetArgs),
    /// Store a value under a key
    Put(PutArgs),
}

/// Addresses one key: `<mount> <key>` below an optional relative path.
#[derive(Args, Debug)]
pub struct KeyArgs {
    pub mount: String,
    pub key: String,
    /// Path under the mount's home path
    #[arg(short, long, default_value = "")]
    pub path: String,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub target: KeyArgs,
    /// Write the value to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PutArgs {
    #[command(flatten)]
    pub target: KeyArgs,
    /// Value to store
    #[arg(long, conflicts_with = "file")]
    pub value: Option<String>,
    /// Read the value from this file (stdin when neither is given)
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}
