//! The recipe abstraction: the action attached to a target.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::core::flags::FlagSet;
use crate::core::target::TargetId;
use crate::util::context::Environment;

/// An action that brings a target up to date.
///
/// Recipes run on worker threads, possibly concurrently with other recipes,
/// and must own their target's output exclusively.
pub trait Recipe: Send + Sync + fmt::Debug {
    /// Short label used in progress output (e.g. "compile", "copy").
    fn name(&self) -> &str;

    /// Perform the work for `ctx.target`.
    fn execute(&self, ctx: &RecipeContext<'_>) -> Result<(), RecipeError>;

    /// Dependency listing a previous run of this recipe leaves behind.
    ///
    /// Targets whose recipe returns a path here get extra prerequisites
    /// injected from that file before staleness is judged.
    fn dependency_listing(&self, _target: &TargetId) -> Option<PathBuf> {
        None
    }
}

/// Everything a recipe may look at while it runs.
#[derive(Debug, Clone, Copy)]
pub struct RecipeContext<'a> {
    /// The target being built.
    pub target: &'a TargetId,
    /// Namespace that declared the recipe.
    pub namespace: &'a str,
    /// Flags accumulated by that namespace.
    pub flags: &'a FlagSet,
    /// Process environment of the run.
    pub env: &'a Environment,
    /// Statically declared prerequisites, in declaration order.
    pub prerequisites: &'a [TargetId],
    /// Prerequisites injected from dependency listings.
    pub discovered: &'a [TargetId],
    /// Upper bound on external process runtime, if any.
    pub timeout: Option<Duration>,
}

impl<'a> RecipeContext<'a> {
    /// The output path of a file target.
    pub fn output(&self) -> Result<&'a Path, RecipeError> {
        self.target.path().ok_or_else(|| {
            RecipeError::Other(anyhow::anyhow!(
                "recipe needs a file target, got `{}`",
                self.target
            ))
        })
    }

    /// Declared file prerequisites, skipping pseudo-targets.
    pub fn inputs(&self) -> impl Iterator<Item = &'a Path> {
        self.prerequisites.iter().filter_map(TargetId::path)
    }
}

/// Failure reported by a recipe.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("`{command}` failed with exit code {}{}{}", fmt_code(*code), fmt_output(stdout), fmt_output(stderr))]
    Failed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("`{command}` timed out after {:.1}s", after.as_secs_f64())]
    Timeout { command: String, after: Duration },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RecipeError {
    /// Wrap an I/O failure with a description of what was attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RecipeError::Io {
            context: context.into(),
            source,
        }
    }
}

fn fmt_code(code: Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "(signal)".to_string())
}

fn fmt_output(output: &str) -> String {
    let output = output.trim_end();
    if output.is_empty() {
        String::new()
    } else {
        format!("\n{output}")
    }
}

/// A recipe backed by a closure.
pub struct FnRecipe<F> {
    name: String,
    func: F,
}

impl<F> FnRecipe<F>
where
    F: Fn(&RecipeContext<'_>) -> Result<(), RecipeError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        FnRecipe {
            name: name.into(),
            func,
        }
    }
}

impl<F> fmt::Debug for FnRecipe<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRecipe").field("name", &self.name).finish()
    }
}

impl<F> Recipe for FnRecipe<F>
where
    F: Fn(&RecipeContext<'_>) -> Result<(), RecipeError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &RecipeContext<'_>) -> Result<(), RecipeError> {
        (self.func)(ctx)
    }
}

/// Shorthand for a shared closure recipe.
pub fn recipe_fn<F>(name: impl Into<String>, func: F) -> Arc<dyn Recipe>
where
    F: Fn(&RecipeContext<'_>) -> Result<(), RecipeError> + Send + Sync + 'static,
{
    Arc::new(FnRecipe::new(name, func))
}

/// Whether two handles point at the same recipe instance.
pub(crate) fn same_recipe(a: &Arc<dyn Recipe>, b: &Arc<dyn Recipe>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
