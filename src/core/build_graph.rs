//! The frozen, validated result of configuration.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::core::error::ConfigError;
use crate::core::flags::FlagSet;
use crate::core::graph::TargetGraph;
use crate::core::namespace::Namespace;
use crate::core::target::{TargetId, TargetRef};
use crate::util::context::Environment;

/// Read-only view of one namespace after configuration.
#[derive(Debug, Clone)]
pub struct NamespaceInfo {
    pub name: String,
    pub root: PathBuf,
    pub flags: FlagSet,
    pub default: Option<TargetId>,
    pub imports: Vec<String>,
    targets: Vec<TargetId>,
    declared: HashSet<TargetId>,
}

impl NamespaceInfo {
    pub(crate) fn from_namespace(namespace: &Namespace) -> Self {
        let targets: Vec<TargetId> = namespace
            .graph()
            .targets()
            .map(|node| node.id.clone())
            .collect();
        NamespaceInfo {
            name: namespace.name().to_string(),
            root: namespace.root().to_path_buf(),
            flags: namespace.flags().clone(),
            default: namespace.default_target().cloned(),
            imports: namespace.imports().to_vec(),
            declared: targets.iter().cloned().collect(),
            targets,
        }
    }

    /// Targets this namespace mentions, in declaration order.
    pub fn targets(&self) -> &[TargetId] {
        &self.targets
    }

    pub fn declares(&self, id: &TargetId) -> bool {
        self.declared.contains(id)
    }
}

/// The merged graph of every namespace, ready to execute.
#[derive(Debug, Clone)]
pub struct BuildGraph {
    graph: TargetGraph,
    namespaces: Vec<NamespaceInfo>,
    owners: HashMap<TargetId, String>,
    env: Environment,
}

impl BuildGraph {
    pub(crate) fn new(
        graph: TargetGraph,
        namespaces: Vec<NamespaceInfo>,
        owners: HashMap<TargetId, String>,
        env: Environment,
    ) -> Self {
        BuildGraph {
            graph,
            namespaces,
            owners,
            env,
        }
    }

    pub fn graph(&self) -> &TargetGraph {
        &self.graph
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// The outermost namespace, i.e. the first one configured.
    pub fn root_namespace(&self) -> Option<&NamespaceInfo> {
        self.namespaces.first()
    }

    pub fn namespace(&self, name: &str) -> Option<&NamespaceInfo> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    /// All namespaces in configuration order.
    pub fn namespaces(&self) -> &[NamespaceInfo] {
        &self.namespaces
    }

    /// The namespace whose recipe builds `id`.
    pub fn owner<'a>(&'a self, id: &'a TargetId) -> Option<&'a str> {
        self.owners
            .get(id)
            .map(String::as_str)
            .or_else(|| id.namespace())
    }

    /// Flags visible to the recipe of `id`.
    pub fn flags_for(&self, id: &TargetId) -> Option<&FlagSet> {
        let owner = self.owner(id)?;
        self.namespace(owner).map(|ns| &ns.flags)
    }

    /// The outermost namespace's default target.
    pub fn default_target(&self) -> Result<TargetId, ConfigError> {
        let root = self.root_namespace().ok_or_else(|| ConfigError::NoDefaultTarget {
            namespace: String::new(),
        })?;
        root.default
            .clone()
            .ok_or_else(|| ConfigError::NoDefaultTarget {
                namespace: root.name.clone(),
            })
    }

    /// Resolve a requested target against the outermost namespace.
    ///
    /// `None` selects the default target.
    pub fn resolve(&self, reference: Option<&str>) -> Result<TargetId, ConfigError> {
        let Some(reference) = reference else {
            return self.default_target();
        };
        let root = self.root_namespace().ok_or_else(|| ConfigError::UnknownTarget {
            namespace: String::new(),
            reference: reference.to_string(),
        })?;
        self.resolve_in(&root.name, reference, &root.root)
    }

    /// Resolve a reference issued from `namespace`, anchoring relative file
    /// paths at `base_dir`.
    pub fn resolve_in(
        &self,
        namespace: &str,
        reference: &str,
        base_dir: &Path,
    ) -> Result<TargetId, ConfigError> {
        let parsed = TargetRef::parse(reference)?;
        let owner = parsed.namespace_or(namespace);
        let unknown = || ConfigError::UnknownTarget {
            namespace: owner.to_string(),
            reference: reference.to_string(),
        };

        let info = self.namespace(owner).ok_or_else(unknown)?;
        let id = parsed.to_target(owner, base_dir);
        if info.declares(&id) {
            Ok(id)
        } else {
            Err(unknown())
        }
    }
}
