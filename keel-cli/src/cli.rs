//! CLI argument definitions using clap.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use keel_schema::Dialect;
use std::path::PathBuf;

/// Keel CLI - migration synthesis from model descriptions
#[derive(Parser, Debug)]
#[command(name = "keel")]
#[command(version)]
#[command(about = "Keel CLI - migration synthesis from model descriptions", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Options shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Environment override from keel.toml
    #[arg(short, long, global = true, env = "KEEL_ENV")]
    pub env: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new Keel project
    Init(InitArgs),

    /// Generate migrations from model descriptions
    Generate(GenerateArgs),

    /// Show the migration ledger
    Status(StatusArgs),

    /// Display version information
    Version,
}

// =============================================================================
// Init Command
// =============================================================================

/// Arguments for the `init` command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to initialize the project (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Target SQL dialect
    #[arg(short, long, default_value = "sqlite")]
    pub dialect: DialectArg,

    /// Skip writing an example model
    #[arg(long)]
    pub no_example: bool,

    /// Overwrite an existing keel.toml
    #[arg(short, long)]
    pub force: bool,
}

/// Supported SQL dialects
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DialectArg {
    #[default]
    Sqlite,
    Mysql,
    #[value(alias = "postgresql")]
    Postgres,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Postgres => Dialect::Postgres,
        }
    }
}

// =============================================================================
// Generate Command
// =============================================================================

/// Arguments for the `generate` command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Generate migrations for a single model file
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Project root containing keel.toml
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Target SQL dialect (overrides keel.toml)
    #[arg(short, long)]
    pub dialect: Option<DialectArg>,

    /// Models directory (overrides keel.toml)
    #[arg(long)]
    pub models: Option<PathBuf>,

    /// Migrations directory (overrides keel.toml)
    #[arg(long)]
    pub migrations: Option<PathBuf>,

    /// Render narrowing changes as declared instead of widening them
    #[arg(long)]
    pub allow_narrowing: bool,

    /// Print the migrations without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

// =============================================================================
// Status Command
// =============================================================================

/// Arguments for the `status` command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Project root containing keel.toml
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Migrations directory (overrides keel.toml)
    #[arg(long)]
    pub migrations: Option<PathBuf>,
}
