//! The namespace registry.
//!
//! A [`Registry`] lives for one configuration run: it is created with the
//! process [`Environment`], populated by loading configuration units, and
//! consumed by [`Registry::freeze`], which yields the immutable
//! [`BuildGraph`] the scheduler executes. Nothing here is global, so several
//! registries can coexist in one process.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ConfigId, NamespaceConfig, NamespaceDescription};
use crate::core::build_graph::{BuildGraph, NamespaceInfo};
use crate::core::error::ConfigError;
use crate::core::flags::FlagSet;
use crate::core::graph::TargetGraph;
use crate::core::namespace::Namespace;
use crate::core::target::{TargetId, TargetRef};
use crate::util::context::Environment;

/// All namespaces of one configuration run.
pub struct Registry {
    env: Environment,
    namespaces: BTreeMap<String, Namespace>,
    /// Creation order; the first namespace is the outermost one.
    order: Vec<String>,
    /// Configuration units already merged, and the namespace each produced.
    loaded: HashMap<ConfigId, String>,
    /// Units currently being merged, outermost first.
    loading: Vec<(ConfigId, String)>,
}

impl Registry {
    pub fn new(env: Environment) -> Self {
        Registry {
            env,
            namespaces: BTreeMap::new(),
            order: Vec::new(),
            loaded: HashMap::new(),
            loading: Vec::new(),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Create an empty namespace rooted at the working directory.
    pub fn create_namespace(&mut self, name: &str) -> Result<&mut Namespace, ConfigError> {
        let namespace = Namespace::new(name, self.env.cwd());
        self.add_namespace(namespace)
    }

    pub fn get_or_create_namespace(&mut self, name: &str) -> &mut Namespace {
        if !self.namespaces.contains_key(name) {
            debug!("created namespace `{name}`");
            self.order.push(name.to_string());
        }
        let root = self.env.cwd().to_path_buf();
        let flags = FlagSet::from_env(&self.env);
        self.namespaces
            .entry(name.to_string())
            .or_insert_with(|| {
                let mut namespace = Namespace::new(name, root);
                *namespace.flags_mut() = flags;
                namespace
            })
    }

    /// Register a fully built namespace.
    ///
    /// Its flags are layered on top of the flags seeded from the environment.
    pub fn add_namespace(&mut self, mut namespace: Namespace) -> Result<&mut Namespace, ConfigError> {
        let name = namespace.name().to_string();
        if self.namespaces.contains_key(&name) {
            return Err(ConfigError::DuplicateNamespace { name });
        }

        let mut flags = FlagSet::from_env(&self.env);
        flags.extend_from(namespace.flags());
        *namespace.flags_mut() = flags;

        debug!("created namespace `{name}`");
        self.order.push(name.clone());
        Ok(self.namespaces.entry(name).or_insert(namespace))
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    pub fn namespace_mut(&mut self, name: &str) -> Option<&mut Namespace> {
        self.namespaces.get_mut(name)
    }

    /// Namespaces in creation order.
    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.order.iter().filter_map(|name| self.namespaces.get(name))
    }

    /// Load a top-level configuration unit and return its namespace name.
    pub fn load(&mut self, config: Arc<dyn NamespaceConfig>) -> Result<String, ConfigError> {
        self.load_config(config)
    }

    /// Load `config` (at most once per identity) and make `importer` import it.
    pub fn import_namespace(
        &mut self,
        importer: &str,
        config: Arc<dyn NamespaceConfig>,
    ) -> Result<String, ConfigError> {
        let name = self.load_config(config)?;
        self.link(importer, &name)?;
        Ok(name)
    }

    /// Record that `importer` imports the already registered `importee`.
    pub fn link(&mut self, importer: &str, importee: &str) -> Result<(), ConfigError> {
        if !self.namespaces.contains_key(importee) {
            return Err(ConfigError::UnknownNamespace {
                name: importee.to_string(),
            });
        }
        if let Some(mut path) = self.import_path(importee, importer) {
            path.insert(0, importer.to_string());
            return Err(ConfigError::CyclicImport { cycle: path });
        }

        let namespace = self
            .namespaces
            .get_mut(importer)
            .ok_or_else(|| ConfigError::UnknownNamespace {
                name: importer.to_string(),
            })?;
        namespace.link_import(importee);
        debug!("namespace `{importer}` imports `{importee}`");
        Ok(())
    }

    /// An import path from `from` to `to`, both ends included.
    fn import_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut stack = vec![vec![from.to_string()]];
        while let Some(path) = stack.pop() {
            let Some(last) = path.last() else {
                continue;
            };
            if last == to {
                return Some(path);
            }
            if !visited.insert(last.clone()) {
                continue;
            }
            if let Some(namespace) = self.namespaces.get(last) {
                for next in namespace.imports() {
                    let mut extended = path.clone();
                    extended.push(next.clone());
                    stack.push(extended);
                }
            }
        }
        None
    }

    fn load_config(&mut self, config: Arc<dyn NamespaceConfig>) -> Result<String, ConfigError> {
        let id = config.id();
        if let Some(name) = self.loaded.get(&id) {
            debug!("configuration `{id}` already loaded as `{name}`");
            return Ok(name.clone());
        }
        if let Some(start) = self.loading.iter().position(|(loading, _)| *loading == id) {
            let mut cycle: Vec<String> = self.loading[start..]
                .iter()
                .map(|(_, label)| label.clone())
                .collect();
            cycle.push(self.loading[start].1.clone());
            return Err(ConfigError::CyclicImport { cycle });
        }

        self.loading.push((id.clone(), id.to_string()));
        let result = self.merge(config.as_ref());
        self.loading.pop();

        let name = result?;
        self.loaded.insert(id, name.clone());
        Ok(name)
    }

    fn merge(&mut self, config: &dyn NamespaceConfig) -> Result<String, ConfigError> {
        let origin = config.id().to_string();
        let NamespaceDescription { namespace, imports } =
            config.describe(&self.env).map_err(|err| {
                match err.downcast::<ConfigError>() {
                    Ok(config_error) => config_error,
                    Err(err) => ConfigError::manifest(origin.clone(), err),
                }
            })?;

        let name = namespace.name().to_string();
        info!("configuring namespace `{name}` from `{origin}`");
        self.add_namespace(namespace)?;
        if let Some(frame) = self.loading.last_mut() {
            frame.1 = name.clone();
        }

        for import in imports {
            self.import_namespace(&name, import)?;
        }
        Ok(name)
    }

    /// Resolve a reference issued from `namespace`.
    ///
    /// Qualified references may point into any registered namespace, not
    /// only direct imports. Unqualified references must exist in `namespace`.
    pub fn resolve(&self, namespace: &str, reference: &str) -> Result<TargetId, ConfigError> {
        let issuer = self
            .namespaces
            .get(namespace)
            .ok_or_else(|| ConfigError::UnknownNamespace {
                name: namespace.to_string(),
            })?;
        let parsed = TargetRef::parse(reference)?;
        let owner_name = parsed.namespace_or(namespace);
        let unknown = || ConfigError::UnknownTarget {
            namespace: owner_name.to_string(),
            reference: reference.to_string(),
        };

        let owner = self.namespaces.get(owner_name).ok_or_else(unknown)?;
        let id = parsed.to_target(owner_name, issuer.root());
        if owner.declares(&id) {
            Ok(id)
        } else {
            Err(unknown())
        }
    }

    /// Merge every namespace into one validated, immutable build graph.
    pub fn freeze(self) -> Result<BuildGraph, ConfigError> {
        let mut graph = TargetGraph::new();
        let mut owners = HashMap::new();
        for name in &self.order {
            let namespace = &self.namespaces[name];
            graph.merge(namespace.graph())?;
            for node in namespace.graph().targets() {
                if node.recipe().is_some() {
                    owners.entry(node.id.clone()).or_insert_with(|| name.clone());
                }
            }
        }

        // A pseudo-target is only valid if its own namespace mentions it.
        for node in graph.targets() {
            if let TargetId::Pseudo { namespace, .. } = &node.id {
                let known = self
                    .namespaces
                    .get(namespace)
                    .is_some_and(|ns| ns.declares(&node.id));
                if !known {
                    return Err(ConfigError::UnknownTarget {
                        namespace: namespace.clone(),
                        reference: node.id.to_string(),
                    });
                }
            }
        }

        // So is a file reached through another namespace's qualifier.
        for namespace in self.namespaces() {
            for (owner, id) in namespace.foreign_files() {
                let known = self
                    .namespaces
                    .get(owner)
                    .is_some_and(|ns| ns.declares(id));
                if !known {
                    return Err(ConfigError::UnknownTarget {
                        namespace: owner.clone(),
                        reference: format!("{owner}|{id}"),
                    });
                }
            }
        }

        let infos = self
            .order
            .iter()
            .filter_map(|name| self.namespaces.get(name))
            .map(NamespaceInfo::from_namespace)
            .collect();

        info!(
            "frozen build graph: {} namespaces, {} targets",
            self.order.len(),
            graph.len()
        );
        Ok(BuildGraph::new(graph, infos, owners, self.env))
    }
}
