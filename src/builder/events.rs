//! Build events.
//!
//! The scheduler reports what it does through an [`EventSink`]. The shell
//! renders events for humans; with `--message-format=json` each event is
//! printed as one JSON object per line.
//!
//! # Event Types
//!
//! - `build-started`: the closure of the requested target is known
//! - `target-started`: a recipe is about to run
//! - `target-finished`: a recipe succeeded
//! - `target-failed`: a recipe failed
//! - `build-finished`: the run is over (success or failure)
//!
//! New fields may be added, but existing fields should not be removed or renamed.

use std::sync::Mutex;

use serde::Serialize;

/// An event emitted while executing a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    #[serde(rename = "build-started")]
    BuildStarted {
        /// The requested target
        target: String,
        /// Profile being built ("debug" or "release")
        profile: String,
        /// Number of targets in the closure
        total: u64,
    },

    #[serde(rename = "target-started")]
    TargetStarted {
        target: String,
        /// Namespace that owns the recipe
        namespace: String,
        /// Recipe label, e.g. "compile"
        recipe: String,
    },

    #[serde(rename = "target-finished")]
    TargetFinished {
        target: String,
        namespace: String,
        recipe: String,
        duration_ms: u64,
    },

    #[serde(rename = "target-failed")]
    TargetFailed {
        target: String,
        namespace: String,
        message: String,
    },

    #[serde(rename = "build-finished")]
    BuildFinished {
        success: bool,
        /// Recipes that ran
        executed: u64,
        /// Targets judged up to date
        fresh: u64,
        duration_ms: u64,
    },
}

impl BuildEvent {
    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Receiver of build events.
///
/// Events are delivered from the scheduler's coordinating thread, in order.
pub trait EventSink: Sync {
    fn emit(&self, event: BuildEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: BuildEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<BuildEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        EventLog::default()
    }

    pub fn events(&self) -> Vec<BuildEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: BuildEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
