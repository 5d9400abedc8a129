//! Build execution.
//!
//! This module turns a frozen [`BuildGraph`](crate::core::BuildGraph) into
//! work: the scheduler decides what is stale and runs recipes in parallel,
//! and the stock recipes drive the C/C++ toolchain.

pub mod depfile;
pub mod error;
pub mod events;
pub mod recipes;
pub mod scheduler;
pub mod toolchain;

pub use error::BuildError;
pub use events::{BuildEvent, EventLog, EventSink, NullSink};
pub use recipes::{
    ArchiveRecipe, CommandRecipe, CompileRecipe, CopyRecipe, LinkKind, LinkRecipe, RemoveRecipe,
};
pub use scheduler::{BuildOptions, BuildReport, Scheduler};
pub use toolchain::{Language, Tool};
