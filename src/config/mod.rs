//! The two-phase configuration protocol.
//!
//! A configuration unit first *describes* its namespace as a plain value
//! ([`NamespaceDescription`]); the [`Registry`](crate::core::registry::Registry)
//! then merges that value, following imports. Describing never touches the
//! registry, so a unit can be evaluated without side effects and memoized by
//! its [`ConfigId`].

pub mod manifest;
pub mod vars;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::core::namespace::Namespace;
use crate::util::context::Environment;

pub use manifest::ManifestConfig;

/// Canonical identity of a configuration unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigId {
    /// A configuration file, by canonical path.
    Path(PathBuf),
    /// A configuration defined in code.
    Named(String),
}

impl ConfigId {
    /// Identity of a file-backed configuration.
    ///
    /// Two spellings of the same file (relative, through symlinks) yield
    /// the same identity.
    pub fn for_path(path: &Path) -> Result<Self> {
        let canonical = path
            .canonicalize()
            .with_context(|| format!("failed to locate `{}`", path.display()))?;
        Ok(ConfigId::Path(canonical))
    }

    pub fn named(name: impl Into<String>) -> Self {
        ConfigId::Named(name.into())
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigId::Path(path) => write!(f, "{}", path.display()),
            ConfigId::Named(name) => f.write_str(name),
        }
    }
}

/// A unit of configuration: one namespace and the units it imports.
pub trait NamespaceConfig {
    fn id(&self) -> ConfigId;

    /// Describe the namespace. Must not depend on anything but `env`.
    fn describe(&self, env: &Environment) -> Result<NamespaceDescription>;
}

/// The value a configuration unit evaluates to.
#[derive(Clone)]
pub struct NamespaceDescription {
    pub namespace: Namespace,
    pub imports: Vec<Arc<dyn NamespaceConfig>>,
}

impl NamespaceDescription {
    pub fn new(namespace: Namespace) -> Self {
        NamespaceDescription {
            namespace,
            imports: Vec::new(),
        }
    }

    /// Request that the registry also load `config`.
    pub fn import(&mut self, config: Arc<dyn NamespaceConfig>) -> &mut Self {
        self.imports.push(config);
        self
    }
}

impl fmt::Debug for NamespaceDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceDescription")
            .field("namespace", &self.namespace.name())
            .field(
                "imports",
                &self.imports.iter().map(|c| c.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A configuration defined by a closure.
pub struct FnConfig<F> {
    id: ConfigId,
    func: F,
}

impl<F> FnConfig<F>
where
    F: Fn(&Environment) -> Result<NamespaceDescription>,
{
    pub fn new(id: ConfigId, func: F) -> Self {
        FnConfig { id, func }
    }
}

impl<F> NamespaceConfig for FnConfig<F>
where
    F: Fn(&Environment) -> Result<NamespaceDescription>,
{
    fn id(&self) -> ConfigId {
        self.id.clone()
    }

    fn describe(&self, env: &Environment) -> Result<NamespaceDescription> {
        (self.func)(env)
    }
}

/// Shorthand for a shared closure configuration keyed by `name`.
pub fn config_fn<F>(name: impl Into<String>, func: F) -> Arc<dyn NamespaceConfig>
where
    F: Fn(&Environment) -> Result<NamespaceDescription> + 'static,
{
    Arc::new(FnConfig::new(ConfigId::named(name), func))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_identity_is_canonical() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("lib")).unwrap();
        std::fs::write(tmp.path().join("lib/nova.toml"), "").unwrap();

        let direct = ConfigId::for_path(&tmp.path().join("lib/nova.toml")).unwrap();
        let roundabout = ConfigId::for_path(&tmp.path().join("lib/../lib/./nova.toml")).unwrap();
        assert_eq!(direct, roundabout);
    }

    #[test]
    fn test_missing_path_has_no_identity() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(ConfigId::for_path(&tmp.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_fn_config_describes() {
        let config = config_fn("lib", |_env| {
            Ok(NamespaceDescription::new(Namespace::new("lib", "/p")))
        });
        assert_eq!(config.id(), ConfigId::named("lib"));
        let desc = config.describe(&Environment::empty()).unwrap();
        assert_eq!(desc.namespace.name(), "lib");
    }
}
