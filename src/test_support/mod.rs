//! Test utilities for nova unit tests.
//!
//! Recipes here never spawn processes: a [`Recorder`] recipe writes its file
//! target and remembers that it ran, which is all the scheduler needs to be
//! exercised against a real filesystem.
//!
//! # Example
//!
//! ```rust,ignore
//! use nova::test_support::{age, write, Recorder};
//!
//! let rec = Recorder::new();
//! write(&root.join("a.c"), "int a;\n");
//! age(&root.join("a.c"), 100);
//! ns.set_recipe("a.o", rec.recipe("compile"))?;
//! ```

pub mod fixtures;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::builder::recipes::dependency_file;
use crate::core::recipe::{Recipe, RecipeContext, RecipeError};
use crate::core::target::TargetId;

pub use fixtures::*;

/// Shared log of every target a recording recipe built.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    runs: Arc<Mutex<Vec<TargetId>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Recorder::default()
    }

    /// A recipe that records its target and writes file targets.
    pub fn recipe(&self, name: &str) -> Arc<dyn Recipe> {
        Arc::new(RecordingRecipe {
            name: name.to_string(),
            runs: Arc::clone(&self.runs),
            listing: false,
        })
    }

    /// Like [`Recorder::recipe`], but declares `<target>.d` as its
    /// dependency listing.
    pub fn listing_recipe(&self, name: &str) -> Arc<dyn Recipe> {
        Arc::new(RecordingRecipe {
            name: name.to_string(),
            runs: Arc::clone(&self.runs),
            listing: true,
        })
    }

    /// Targets built so far, in completion order.
    pub fn runs(&self) -> Vec<TargetId> {
        self.runs.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn ran(&self, id: &TargetId) -> bool {
        self.runs().contains(id)
    }

    pub fn clear(&self) {
        if let Ok(mut runs) = self.runs.lock() {
            runs.clear();
        }
    }
}

#[derive(Debug)]
struct RecordingRecipe {
    name: String,
    runs: Arc<Mutex<Vec<TargetId>>>,
    listing: bool,
}

impl Recipe for RecordingRecipe {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &RecipeContext<'_>) -> Result<(), RecipeError> {
        if let Some(path) = ctx.target.path() {
            write(path, &ctx.target.to_string());
        }
        if let Ok(mut runs) = self.runs.lock() {
            runs.push(ctx.target.clone());
        }
        Ok(())
    }

    fn dependency_listing(&self, target: &TargetId) -> Option<PathBuf> {
        if self.listing {
            target.path().map(dependency_file)
        } else {
            None
        }
    }
}

/// A recipe that always fails with `message`.
pub fn failing_recipe(message: &str) -> Arc<dyn Recipe> {
    let message = message.to_string();
    crate::core::recipe::recipe_fn("fail", move |_| {
        Err(RecipeError::Other(anyhow::anyhow!("{message}")))
    })
}

/// Write `contents` to `path`, creating parent directories.
pub fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Set the modification time of `path`.
pub fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(time))
        .unwrap();
}

/// Move the modification time of `path` `secs` seconds into the past.
pub fn age(path: &Path, secs: u64) {
    set_mtime(path, SystemTime::now() - Duration::from_secs(secs));
}

/// Move the modification time of `path` `secs` seconds into the future.
pub fn touch_future(path: &Path, secs: u64) {
    set_mtime(path, SystemTime::now() + Duration::from_secs(secs));
}
