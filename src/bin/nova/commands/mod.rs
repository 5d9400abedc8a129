//! Command implementations

pub mod build;
pub mod clean;
pub mod flags;
pub mod targets;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::{Cli, MessageFormat};
use nova::builder::toolchain::Tool;
use nova::config::manifest::MANIFEST_NAME;
use nova::util::config::{global_config_dir, load_settings, project_config_path, Settings};
use nova::util::Shell;
use nova::{
    BuildError, BuildGraph, BuildOptions, BuildReport, ConfigError, Environment, ManifestConfig,
    Registry, Scheduler, TargetId,
};

/// State shared by every command of one invocation.
pub struct Session {
    pub shell: Shell,
    pub settings: Settings,
    env: Environment,
    manifest: PathBuf,
}

impl Session {
    /// Apply global options: working directory, settings, environment.
    pub fn new(cli: &Cli) -> Result<Self> {
        if let Some(dir) = &cli.directory {
            std::env::set_current_dir(dir)
                .with_context(|| format!("failed to change directory to {}", dir.display()))
                .map_err(|err| ConfigError::manifest(dir.display().to_string(), err))?;
        }

        let mut env = Environment::from_process()?;
        let global = global_config_dir().map(|dir| dir.join("config.toml"));
        let settings = load_settings(global.as_deref(), &project_config_path(env.cwd()));

        for (tool, configured) in [
            (Tool::Cc, &settings.toolchain.cc),
            (Tool::Cxx, &settings.toolchain.cxx),
            (Tool::Ar, &settings.toolchain.ar),
        ] {
            let Some(path) = configured else { continue };
            if env.var(tool.env_var()).is_none() {
                env.set_var(tool.env_var(), path.display().to_string());
            }
        }
        for (key, value) in &cli.define {
            env.set_var(key.clone(), value.clone());
        }
        if cli.release {
            env = env.with_debug(false);
        }
        debug!("building the {} profile in {}", env.profile(), env.cwd().display());

        let json = match cli.message_format {
            Some(format) => format == MessageFormat::Json,
            None => settings.build.message_format.as_deref() == Some("json"),
        };
        let shell = Shell::from_flags(cli.quiet, cli.verbose, cli.color, json);

        let manifest = cli
            .manifest
            .clone()
            .unwrap_or_else(|| PathBuf::from(MANIFEST_NAME));

        Ok(Session {
            shell,
            settings,
            env,
            manifest,
        })
    }

    /// Load the outermost manifest and everything it imports.
    pub fn configure(&self) -> Result<BuildGraph, ConfigError> {
        let path = self.env.cwd().join(&self.manifest);
        let config = ManifestConfig::open(&path)
            .with_context(|| "could not find a nova manifest; use `-f` or `-C` to point at one")
            .map_err(|err| ConfigError::manifest(path.display().to_string(), err))?;

        let mut registry = Registry::new(self.env.clone());
        registry.load(Arc::new(config))?;
        registry.freeze()
    }

    /// Scheduler options from settings, overridden by the command line.
    pub fn options(&self, jobs: Option<usize>, timeout: Option<u64>) -> BuildOptions {
        let mut options = BuildOptions::default().timeout(
            timeout
                .map(std::time::Duration::from_secs)
                .or_else(|| self.settings.timeout()),
        );
        if let Some(jobs) = jobs.or(self.settings.build.jobs) {
            options = options.jobs(jobs);
        }
        options
    }

    /// Build `target`, reporting progress through the shell.
    pub fn build(
        &self,
        graph: &BuildGraph,
        target: &TargetId,
        options: BuildOptions,
    ) -> Result<BuildReport, BuildError> {
        let report = Scheduler::new(graph, options)
            .with_sink(&self.shell)
            .build(target)?;
        if report.is_noop() {
            self.shell.note(format!("`{target}` is up to date"));
        }
        Ok(report)
    }
}
