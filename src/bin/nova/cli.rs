//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use nova::util::shell::ColorChoice;

/// Nova - a dependency-graph-driven build orchestrator for C/C++ projects
#[derive(Parser)]
#[command(name = "nova")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change to DIR before doing anything
    #[arg(short = 'C', value_name = "DIR", global = true)]
    pub directory: Option<PathBuf>,

    /// Path to the outermost manifest
    #[arg(short = 'f', long = "file", value_name = "MANIFEST", global = true)]
    pub manifest: Option<PathBuf>,

    /// Set an environment variable for configuration and recipes
    #[arg(short = 'D', value_name = "KEY=VALUE", value_parser = parse_define, global = true)]
    pub define: Vec<(String, String)>,

    /// Build the release profile (default: debug)
    #[arg(long, global = true)]
    pub release: bool,

    /// Print every target and debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, value_name = "WHEN", default_value = "auto", global = true)]
    pub color: ColorChoice,

    /// Output format for build events
    #[arg(long, value_enum, value_name = "FMT", global = true)]
    pub message_format: Option<MessageFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bring a target up to date
    Build(BuildArgs),

    /// Build the outermost namespace's `@clean` target
    Clean(CleanArgs),

    /// List namespaces, their defaults and targets
    Targets(TargetsArgs),

    /// Show the accumulated flags of a namespace
    Flags(FlagsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Target to build: `name`, `@pseudo`, `namespace|target` or a path
    pub target: Option<String>,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Kill any recipe process running longer than SECS
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct TargetsArgs {
    /// Only list this namespace
    pub namespace: Option<String>,

    /// Also list source files and other targets without a recipe
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct FlagsArgs {
    /// Namespace to inspect
    pub namespace: String,
}

fn parse_define(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("missing variable name in `{s}`")),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}
