//! Configuration-time errors.
//!
//! Every error in this module is fatal: it aborts the run before any recipe
//! executes, so the graph handed to the scheduler is always fully valid.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// An error raised while composing namespaces into a build graph.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("namespace `{name}` is already defined")]
    #[diagnostic(
        code(nova::config::duplicate_namespace),
        help("namespace names must be unique across every imported manifest")
    )]
    DuplicateNamespace { name: String },

    #[error("target `{target}` already has a recipe")]
    #[diagnostic(
        code(nova::config::duplicate_recipe),
        help("each output may be produced by exactly one recipe; remove one of the declarations")
    )]
    DuplicateRecipe { target: String },

    #[error("unknown target `{reference}` in namespace `{namespace}`")]
    #[diagnostic(
        code(nova::config::unknown_target),
        help("run `nova targets` to see the targets each namespace declares")
    )]
    UnknownTarget { namespace: String, reference: String },

    #[error("unknown namespace `{name}`")]
    #[diagnostic(code(nova::config::unknown_namespace))]
    UnknownNamespace { name: String },

    #[error("cyclic import: {}", cycle.join(" -> "))]
    #[diagnostic(code(nova::config::cyclic_import))]
    CyclicImport { cycle: Vec<String> },

    #[error("dependency cycle: {}", cycle.join(" -> "))]
    #[diagnostic(code(nova::config::cyclic_dependency))]
    CyclicDependency { cycle: Vec<String> },

    #[error("`{}` is not under `{}`", path.display(), root.display())]
    #[diagnostic(code(nova::config::path_not_under_root))]
    PathNotUnderRoot { path: PathBuf, root: PathBuf },

    #[error("invalid target reference `{reference}`: {reason}")]
    #[diagnostic(code(nova::config::invalid_reference))]
    InvalidReference { reference: String, reason: String },

    #[error("no default target for namespace `{namespace}`")]
    #[diagnostic(
        code(nova::config::no_default),
        help("set `default` under [namespace] or name a target explicitly")
    )]
    NoDefaultTarget { namespace: String },

    #[error("failed to configure `{origin}`")]
    #[diagnostic(code(nova::config::manifest))]
    Manifest {
        origin: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ConfigError {
    /// Wrap a failure raised while describing a configuration unit.
    pub fn manifest(origin: impl Into<String>, source: anyhow::Error) -> Self {
        ConfigError::Manifest {
            origin: origin.into(),
            source,
        }
    }
}
