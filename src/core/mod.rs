//! Core data structures for nova.
//!
//! - Target identity and the `namespace|target` reference syntax
//! - Flag sets, recipes and the target graph
//! - Namespaces, the registry that composes them, and the frozen build graph

pub mod build_graph;
pub mod error;
pub mod flags;
pub mod graph;
pub mod namespace;
pub mod recipe;
pub mod registry;
pub mod target;

pub use build_graph::{BuildGraph, NamespaceInfo};
pub use error::ConfigError;
pub use flags::FlagSet;
pub use graph::{EdgeKind, TargetGraph, TargetNode};
pub use namespace::Namespace;
pub use recipe::{recipe_fn, FnRecipe, Recipe, RecipeContext, RecipeError};
pub use registry::Registry;
pub use target::{TargetId, TargetRef};
