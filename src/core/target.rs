//! Target identity and the `namespace|target` reference syntax.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::error::ConfigError;
use crate::util::fs::normalize_lexically;

/// Prefix that marks a symbolic target with no on-disk artifact.
pub const PSEUDO_SENTINEL: char = '@';

/// Separator between a namespace name and a local target name.
pub const NAMESPACE_SEPARATOR: char = '|';

/// Identity of a node in the build graph.
///
/// File targets are global: a path names the same node no matter which
/// namespace mentions it. Pseudo-targets always belong to a namespace, so
/// `@clean` in two namespaces are two different nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetId {
    /// An absolute, lexically normalized file path.
    File(PathBuf),
    /// A symbolic target, stored without its sentinel.
    Pseudo { namespace: String, name: String },
}

impl TargetId {
    /// Create a file target, normalizing `.` and `..` components.
    pub fn file(path: impl AsRef<Path>) -> Self {
        TargetId::File(normalize_lexically(path.as_ref()))
    }

    /// Create a pseudo-target. A leading sentinel on `name` is accepted.
    pub fn pseudo(namespace: impl Into<String>, name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        TargetId::Pseudo {
            namespace: namespace.into(),
            name: name.strip_prefix(PSEUDO_SENTINEL).unwrap_or(name).to_string(),
        }
    }

    pub fn is_pseudo(&self) -> bool {
        matches!(self, TargetId::Pseudo { .. })
    }

    /// The path of a file target.
    pub fn path(&self) -> Option<&Path> {
        match self {
            TargetId::File(path) => Some(path),
            TargetId::Pseudo { .. } => None,
        }
    }

    /// The namespace that owns a pseudo-target.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            TargetId::File(_) => None,
            TargetId::Pseudo { namespace, .. } => Some(namespace),
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetId::File(path) => write!(f, "{}", path.display()),
            TargetId::Pseudo { namespace, name } => {
                write!(f, "{namespace}{NAMESPACE_SEPARATOR}{PSEUDO_SENTINEL}{name}")
            }
        }
    }
}

/// A parsed textual reference: `target` or `namespace|target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRef {
    /// Explicit namespace, if the reference was qualified.
    pub namespace: Option<String>,
    /// The local part: a path or a sentinel-prefixed name.
    pub local: String,
}

impl TargetRef {
    /// Parse a reference, splitting on the first separator.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidReference {
            reference: text.to_string(),
            reason: reason.to_string(),
        };

        let (namespace, local) = match text.split_once(NAMESPACE_SEPARATOR) {
            Some((ns, local)) => {
                if ns.is_empty() {
                    return Err(invalid("empty namespace"));
                }
                (Some(ns.to_string()), local)
            }
            None => (None, text),
        };

        if local.is_empty() {
            return Err(invalid("empty target name"));
        }
        if local == PSEUDO_SENTINEL.to_string() {
            return Err(invalid("pseudo-target has no name"));
        }
        if local.contains(NAMESPACE_SEPARATOR) {
            return Err(invalid("more than one namespace separator"));
        }

        Ok(TargetRef {
            namespace,
            local: local.to_string(),
        })
    }

    pub fn is_qualified(&self) -> bool {
        self.namespace.is_some()
    }

    /// The namespace this reference points into, given the issuing namespace.
    pub fn namespace_or<'a>(&'a self, current: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(current)
    }

    /// Turn the reference into a graph identity.
    ///
    /// Relative file paths are anchored at `base_dir`.
    pub fn to_target(&self, current: &str, base_dir: &Path) -> TargetId {
        if self.local.starts_with(PSEUDO_SENTINEL) {
            TargetId::pseudo(self.namespace_or(current), &self.local)
        } else {
            TargetId::file(base_dir.join(&self.local))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unqualified() {
        let r = TargetRef::parse("@clean").unwrap();
        assert_eq!(r.namespace, None);
        assert_eq!(r.local, "@clean");
        assert!(!r.is_qualified());
    }

    #[test]
    fn test_parse_qualified() {
        let r = TargetRef::parse("lib|@clean").unwrap();
        assert_eq!(r.namespace.as_deref(), Some("lib"));
        assert_eq!(r.local, "@clean");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(TargetRef::parse("").is_err());
        assert!(TargetRef::parse("|@run").is_err());
        assert!(TargetRef::parse("lib|").is_err());
        assert!(TargetRef::parse("@").is_err());
        assert!(TargetRef::parse("a|b|c").is_err());
    }

    #[test]
    fn test_pseudo_targets_are_namespaced() {
        let base = Path::new("/work");
        let local = TargetRef::parse("@clean").unwrap().to_target("app", base);
        let remote = TargetRef::parse("lib|@clean").unwrap().to_target("app", base);

        assert_eq!(local, TargetId::pseudo("app", "clean"));
        assert_eq!(remote, TargetId::pseudo("lib", "@clean"));
        assert_ne!(local, remote);
        assert_eq!(remote.to_string(), "lib|@clean");
    }

    #[test]
    fn test_file_targets_are_global_and_normalized() {
        let a = TargetRef::parse("out/../out/a.o")
            .unwrap()
            .to_target("app", Path::new("/work"));
        let b = TargetRef::parse("lib|/work/out/a.o")
            .unwrap()
            .to_target("app", Path::new("/elsewhere"));

        assert_eq!(a, TargetId::File(PathBuf::from("/work/out/a.o")));
        assert_eq!(a, b);
        assert!(!a.is_pseudo());
    }
}
