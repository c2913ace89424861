//! CLI definitions using clap.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use keel::builder::bootstrap::DriverFlags;
use keel::builder::token::LanguageStandard;

/// keel - a self-hosting C/C++ build driver
#[derive(Parser)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub flags: DriverFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a source tree and link (or archive) the objects
    Build(BuildArgs),

    /// Compile and link driver programs next to their sources
    Driver(DriverBuildArgs),

    /// Run a driver program, rebuilding it first if its source changed
    Run(RunArgs),

    /// Show the selected toolchain
    Toolchain,

    /// Remove build outputs
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Source directory, searched recursively
    #[arg(long, default_value = "src")]
    pub src: PathBuf,

    /// Object directory
    #[arg(long, default_value = "bin/int")]
    pub obj: PathBuf,

    /// Output executable or library (defaults to bin/main)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Archive the objects into a static library instead of linking
    #[arg(long)]
    pub lib: bool,

    /// Compile one file at a time
    #[arg(long)]
    pub sequential: bool,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct DriverBuildArgs {
    /// Driver sources to build
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Language standard (defaults to driver.standard, then c++17)
    #[arg(long)]
    pub std: Option<LanguageStandard>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Driver source; the program sits next to it (defaults to driver.source)
    pub source: Option<PathBuf>,

    /// Arguments for the driver program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<OsString>,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Object directory
    #[arg(long, default_value = "bin/int")]
    pub obj: PathBuf,

    /// Output to remove as well
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
