//! The process environment a build runs in.
//!
//! An [`Environment`] is a snapshot, not a view of the live process: it
//! holds the variables captured at startup plus any explicit overrides, so
//! several builds with different settings can run side by side.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

/// Variable selecting the debug profile when set to `1`.
pub const DEBUG_VAR: &str = "DEBUG";

/// Host operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Macos,
    Windows,
    Other,
}

impl Os {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Os::Linux,
            "macos" => Os::Macos,
            "windows" => Os::Windows,
            _ => Os::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Macos => "macos",
            Os::Windows => "windows",
            Os::Other => "other",
        }
    }

    pub fn is_unix(&self) -> bool {
        !matches!(self, Os::Windows)
    }

    pub fn program_suffix(&self) -> &'static str {
        match self {
            Os::Windows => ".exe",
            _ => "",
        }
    }

    pub fn shared_lib_suffix(&self) -> &'static str {
        match self {
            Os::Windows => ".dll",
            Os::Macos => ".dylib",
            _ => ".so",
        }
    }

    pub fn static_lib_suffix(&self) -> &'static str {
        match self {
            Os::Windows => ".lib",
            _ => ".a",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variables, host and build mode for one run.
#[derive(Debug, Clone)]
pub struct Environment {
    cwd: PathBuf,
    vars: BTreeMap<String, String>,
    os: Os,
    debug: Option<bool>,
}

impl Environment {
    /// Snapshot the current process.
    pub fn from_process() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Environment {
            cwd,
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
            os: Os::current(),
            debug: None,
        })
    }

    /// An environment with no variables, rooted at `/`.
    pub fn empty() -> Self {
        Environment {
            cwd: PathBuf::from("/"),
            vars: BTreeMap::new(),
            os: Os::current(),
            debug: None,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_var(key, value);
        self
    }

    pub fn with_os(mut self, os: Os) -> Self {
        self.os = os;
        self
    }

    /// Force the build mode, ignoring `DEBUG`.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Look up a variable, falling back to `default` when unset or empty.
    pub fn var_or(&self, key: &str, default: &str) -> String {
        match self.var(key) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => default.to_string(),
        }
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn os(&self) -> Os {
        self.os
    }

    pub fn is_debug(&self) -> bool {
        self.debug
            .unwrap_or_else(|| self.var(DEBUG_VAR) == Some("1"))
    }

    /// `debug` or `release`.
    pub fn profile(&self) -> &'static str {
        if self.is_debug() {
            "debug"
        } else {
            "release"
        }
    }

    /// Per-host, per-profile output directory name, e.g. `linux-debug`.
    pub fn out_dir_name(&self) -> String {
        format!("{}-{}", self.os, self.profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_mode_from_variable() {
        let env = Environment::empty().with_os(Os::Linux);
        assert_eq!(env.profile(), "release");
        assert_eq!(env.out_dir_name(), "linux-release");

        let env = env.with_var(DEBUG_VAR, "1");
        assert!(env.is_debug());
        assert_eq!(env.out_dir_name(), "linux-debug");

        assert!(!env.with_debug(false).is_debug());
    }

    #[test]
    fn test_var_or_falls_back() {
        let env = Environment::empty()
            .with_var("NUT_PATH", "/opt/nut")
            .with_var("EMPTY", "");
        assert_eq!(env.var_or("NUT_PATH", "../nut"), "/opt/nut");
        assert_eq!(env.var_or("EMPTY", "../nut"), "../nut");
        assert_eq!(env.var_or("MISSING", "../nut"), "../nut");
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(Os::Linux.shared_lib_suffix(), ".so");
        assert_eq!(Os::Macos.shared_lib_suffix(), ".dylib");
        assert_eq!(Os::Windows.program_suffix(), ".exe");
        assert_eq!(Os::Linux.static_lib_suffix(), ".a");
    }

    #[test]
    fn test_environments_are_independent() {
        let a = Environment::empty().with_var("CFLAGS", "-O2");
        let b = Environment::empty();
        assert_eq!(a.var("CFLAGS"), Some("-O2"));
        assert_eq!(b.var("CFLAGS"), None);
    }
}
