//! Compiler and archiver lookup.
//!
//! Detection priority:
//! 1. Environment variables (`CC`, `CXX`, `AR`)
//! 2. Searching `PATH` for common tool names
//!
//! Both read the build's [`Environment`] snapshot, not the live process.

use std::path::{Path, PathBuf};

use crate::core::recipe::RecipeError;
use crate::util::context::Environment;

/// Source language, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cxx,
}

/// Default source extensions for compiled artifacts.
pub const SOURCE_EXTENSIONS: [&str; 4] = [".c", ".cpp", ".cc", ".cxx"];

/// Default header extensions for header staging.
pub const HEADER_EXTENSIONS: [&str; 2] = [".h", ".hpp"];

impl Language {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "c" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "c++" | "C" => Some(Language::Cxx),
            _ => None,
        }
    }

    /// Flag class holding this language's compiler flags.
    pub fn flag_class(&self) -> &'static str {
        match self {
            Language::C => crate::core::flags::classes::CFLAGS,
            Language::Cxx => crate::core::flags::classes::CXXFLAGS,
        }
    }

    pub fn tool(&self) -> Tool {
        match self {
            Language::C => Tool::Cc,
            Language::Cxx => Tool::Cxx,
        }
    }
}

/// An external build tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Cc,
    Cxx,
    Ar,
}

impl Tool {
    /// Environment variable that overrides detection.
    pub fn env_var(&self) -> &'static str {
        match self {
            Tool::Cc => "CC",
            Tool::Cxx => "CXX",
            Tool::Ar => "AR",
        }
    }

    fn candidates(&self) -> &'static [&'static str] {
        match self {
            Tool::Cc => &["cc", "gcc", "clang"],
            Tool::Cxx => &["c++", "g++", "clang++"],
            Tool::Ar => &["ar", "llvm-ar"],
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Tool::Cc => "C compiler",
            Tool::Cxx => "C++ compiler",
            Tool::Ar => "archiver",
        }
    }
}

/// Locate `tool` for a build running in `env`.
pub fn resolve(tool: Tool, env: &Environment) -> Result<PathBuf, RecipeError> {
    if let Some(value) = env.var(tool.env_var()).filter(|v| !v.trim().is_empty()) {
        let value = value.trim();
        return Ok(find(value, env).unwrap_or_else(|| PathBuf::from(value)));
    }

    for candidate in tool.candidates() {
        if let Some(path) = find(candidate, env) {
            tracing::debug!("using {} {}", tool.describe(), path.display());
            return Ok(path);
        }
    }

    Err(RecipeError::Other(anyhow::anyhow!(
        "no {} found; set {} or install one of: {}",
        tool.describe(),
        tool.env_var(),
        tool.candidates().join(", ")
    )))
}

fn find(name: &str, env: &Environment) -> Option<PathBuf> {
    which::which_in(name, env.var("PATH"), env.cwd()).ok()
}
