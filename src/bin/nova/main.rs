//! Nova CLI - build multi-namespace C/C++ projects

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use miette::GraphicalReportHandler;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Session;
use nova::util::diagnostic::{emit, Diagnostic, ManifestParseError};
use nova::util::Shell;
use nova::{BuildError, ConfigError};

/// The build ran and failed.
const EXIT_BUILD_FAILED: u8 = 1;
/// Configuration was rejected before any recipe ran.
const EXIT_CONFIG_FAILED: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "nova=debug"
    } else if cli.quiet {
        "nova=error"
    } else {
        "nova=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let session = match Session::new(&cli) {
        Ok(session) => session,
        Err(err) => {
            let shell = Shell::from_flags(cli.quiet, cli.verbose, cli.color, false);
            report(&shell, &err);
            return ExitCode::from(exit_code(&err));
        }
    };

    match run(&session, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&session.shell, &err);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(session: &Session, command: Commands) -> Result<()> {
    match command {
        Commands::Build(args) => commands::build::execute(session, args),
        Commands::Clean(args) => commands::clean::execute(session, args),
        Commands::Targets(args) => commands::targets::execute(session, args),
        Commands::Flags(args) => commands::flags::execute(session, args),
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    let config = err.downcast_ref::<ConfigError>().is_some()
        || err.downcast_ref::<BuildError>().is_some_and(BuildError::is_config);
    if config {
        EXIT_CONFIG_FAILED
    } else {
        EXIT_BUILD_FAILED
    }
}

fn report(shell: &Shell, err: &anyhow::Error) {
    if shell.is_json() {
        shell.error(format!("{err:#}"));
        return;
    }

    // Syntax errors in a manifest get a source snippet.
    if let Some(parse) = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<ManifestParseError>())
    {
        let mut rendered = String::new();
        if GraphicalReportHandler::new()
            .render_report(&mut rendered, parse)
            .is_ok()
        {
            eprint!("{rendered}");
            return;
        }
    }

    emit(&Diagnostic::from_anyhow(err), shell.use_color());
}
