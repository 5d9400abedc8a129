//! Execution-time errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::error::ConfigError;
use crate::core::recipe::RecipeError;

/// Why a build did not complete.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Planning found the graph invalid (a cycle, an unknown target).
    /// No recipe has run.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("`{target}` does not exist and no recipe produces it{}", needed_by_suffix(needed_by))]
    MissingPrerequisite {
        target: String,
        needed_by: Option<String>,
    },

    #[error("failed to build `{target}`")]
    RecipeExecution {
        target: String,
        namespace: String,
        #[source]
        source: RecipeError,
    },

    #[error("failed to inspect {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start build workers")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl BuildError {
    /// Whether the failure happened before any recipe could run.
    pub fn is_config(&self) -> bool {
        matches!(self, BuildError::Config(_))
    }
}

fn needed_by_suffix(needed_by: &Option<String>) -> String {
    match needed_by {
        Some(parent) => format!(" (needed by `{parent}`)"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_prerequisite_names_dependent() {
        let err = BuildError::MissingPrerequisite {
            target: "/p/src/a.c".into(),
            needed_by: Some("/p/obj/a.o".into()),
        };
        assert_eq!(
            err.to_string(),
            "`/p/src/a.c` does not exist and no recipe produces it (needed by `/p/obj/a.o`)"
        );
        assert!(!err.is_config());
    }

    #[test]
    fn test_config_errors_are_transparent() {
        let err = BuildError::from(ConfigError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        });
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
        assert!(err.is_config());
    }
}
