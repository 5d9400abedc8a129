//! Nova - a dependency-graph-driven build orchestrator for C/C++ projects
//!
//! Projects are split into namespaces, each configured by a `nova.toml` or
//! by code implementing [`NamespaceConfig`](config::NamespaceConfig). The
//! [`Registry`] loads namespaces and their imports, freezes them into a
//! [`BuildGraph`], and the [`Scheduler`] brings a target up to date by
//! running only the recipes whose inputs changed.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nova::{BuildOptions, ManifestConfig, Registry, Scheduler, Environment};
//!
//! let env = Environment::from_process()?;
//! let mut registry = Registry::new(env);
//! registry.load(Arc::new(ManifestConfig::open("nova.toml".as_ref())?))?;
//! let graph = registry.freeze()?;
//! let target = graph.resolve(None)?;
//! Scheduler::new(&graph, BuildOptions::default()).build(&target)?;
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod util;

/// Test utilities for nova unit tests.
///
/// Only compiled for tests. Provides recording recipes, mtime helpers and
/// on-disk project fixtures.
#[cfg(test)]
pub mod test_support;

pub use builder::{BuildError, BuildOptions, BuildReport, Scheduler};
pub use config::ManifestConfig;
pub use core::{BuildGraph, ConfigError, Namespace, Registry, TargetId};
pub use util::context::Environment;
