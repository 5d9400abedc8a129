//! Namespaces: isolated scopes owning a target graph and a flag set.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::error::ConfigError;
use crate::core::flags::FlagSet;
use crate::core::graph::TargetGraph;
use crate::core::recipe::Recipe;
use crate::core::target::{TargetId, TargetRef};

/// A named scope of targets and flags.
///
/// This is the mutable handle configuration code works against. String
/// arguments use the `namespace|target` syntax; unqualified names refer to
/// this namespace, relative paths are anchored at [`Namespace::root`].
#[derive(Debug, Clone)]
pub struct Namespace {
    name: String,
    root: PathBuf,
    graph: TargetGraph,
    flags: FlagSet,
    default: Option<TargetId>,
    imports: Vec<String>,
    /// Qualified file references into other namespaces, as `(owner, id)`.
    foreign_files: Vec<(String, TargetId)>,
}

impl Namespace {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Namespace {
            name: name.into(),
            root: root.into(),
            graph: TargetGraph::new(),
            flags: FlagSet::new(),
            default: None,
            imports: Vec::new(),
            foreign_files: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory relative file references are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn graph(&self) -> &TargetGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut TargetGraph {
        &mut self.graph
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut FlagSet {
        &mut self.flags
    }

    /// Names of the namespaces this one imports.
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub(crate) fn link_import(&mut self, name: &str) {
        if !self.imports.iter().any(|n| n == name) {
            self.imports.push(name.to_string());
        }
    }

    /// Parse a reference issued from this namespace. No existence check.
    pub fn target(&self, reference: &str) -> Result<TargetId, ConfigError> {
        Ok(TargetRef::parse(reference)?.to_target(&self.name, &self.root))
    }

    /// Like [`Namespace::target`], but remembers a qualified file reference
    /// into another namespace so the registry can check it exists.
    pub fn reference(&mut self, reference: &str) -> Result<TargetId, ConfigError> {
        let parsed = TargetRef::parse(reference)?;
        let id = parsed.to_target(&self.name, &self.root);
        if let (Some(owner), TargetId::File(_)) = (&parsed.namespace, &id) {
            if *owner != self.name {
                self.foreign_files.push((owner.clone(), id.clone()));
            }
        }
        Ok(id)
    }

    /// File targets referenced as `owner|path` from this namespace.
    pub fn foreign_files(&self) -> &[(String, TargetId)] {
        &self.foreign_files
    }

    /// Pseudo-target owned by this namespace.
    pub fn pseudo(&self, name: &str) -> TargetId {
        TargetId::pseudo(self.name.clone(), name)
    }

    /// Whether this namespace itself mentions `id`.
    pub fn declares(&self, id: &TargetId) -> bool {
        self.graph.contains(id)
    }

    /// Attach a recipe to a target.
    pub fn set_recipe(
        &mut self,
        target: &str,
        recipe: Arc<dyn Recipe>,
    ) -> Result<TargetId, ConfigError> {
        let id = self.reference(target)?;
        self.check_owned(&id, target)?;
        self.graph.declare(id.clone(), Some(recipe))?;
        Ok(id)
    }

    /// Make `target` depend on `prerequisite`.
    pub fn add_dep(&mut self, target: &str, prerequisite: &str) -> Result<(), ConfigError> {
        let target = self.reference(target)?;
        let prerequisite = self.reference(prerequisite)?;
        self.graph.add_dependency(target, prerequisite);
        Ok(())
    }

    /// Make each listed target depend on the next one.
    pub fn add_chained_deps(&mut self, targets: &[&str]) -> Result<(), ConfigError> {
        let mut ids = Vec::with_capacity(targets.len());
        for target in targets {
            ids.push(self.reference(target)?);
        }
        self.graph.add_chain(ids);
        Ok(())
    }

    /// Nominate the target built when no target is requested.
    ///
    /// A later nomination replaces an earlier one.
    pub fn set_default(&mut self, target: &str) -> Result<TargetId, ConfigError> {
        let id = self.reference(target)?;
        self.set_default_id(id.clone());
        Ok(id)
    }

    pub fn set_default_id(&mut self, id: TargetId) {
        self.graph.declare(id.clone(), None).ok();
        if let Some(previous) = self.default.replace(id) {
            tracing::debug!("namespace `{}` replaces default `{}`", self.name, previous);
        }
    }

    pub fn default_target(&self) -> Option<&TargetId> {
        self.default.as_ref()
    }

    /// Append flags to a flag class.
    pub fn append_flags<I, S>(&mut self, class: &str, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.append(class, flags);
    }

    fn check_owned(&self, id: &TargetId, reference: &str) -> Result<(), ConfigError> {
        match id.namespace() {
            Some(owner) if owner != self.name => Err(ConfigError::InvalidReference {
                reference: reference.to_string(),
                reason: format!(
                    "namespace `{}` cannot attach recipes to targets of `{}`",
                    self.name, owner
                ),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flags::classes;
    use crate::core::recipe::recipe_fn;

    #[test]
    fn test_references_resolve_against_namespace() {
        let ns = Namespace::new("app", "/proj/app");
        assert_eq!(ns.target("@run").unwrap(), TargetId::pseudo("app", "run"));
        assert_eq!(
            ns.target("lib|@clean").unwrap(),
            TargetId::pseudo("lib", "clean")
        );
        assert_eq!(
            ns.target("out/app").unwrap(),
            TargetId::file("/proj/app/out/app")
        );
    }

    #[test]
    fn test_chained_deps_and_recipe() {
        let mut ns = Namespace::new("lib", "/p");
        ns.set_recipe("out/lib.so", recipe_fn("link", |_| Ok(())))
            .unwrap();
        ns.add_chained_deps(&["out/lib.so", "obj/a.o", "src/a.c"])
            .unwrap();

        let lib = TargetId::file("/p/out/lib.so");
        assert!(ns.graph().recipe(&lib).is_some());
        assert_eq!(ns.graph().prerequisites(&lib).len(), 1);
        assert!(ns.declares(&TargetId::file("/p/src/a.c")));
    }

    #[test]
    fn test_cannot_attach_recipe_to_foreign_pseudo_target() {
        let mut ns = Namespace::new("app", "/p");
        let err = ns
            .set_recipe("lib|@clean", recipe_fn("clean", |_| Ok(())))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidReference { .. }));
    }

    #[test]
    fn test_default_target_is_declared_locally() {
        let mut ns = Namespace::new("top", "/p");
        let id = ns.set_default("out/app").unwrap();
        assert_eq!(ns.default_target(), Some(&id));
        assert!(ns.declares(&id));
    }

    #[test]
    fn test_qualified_file_references_are_remembered() {
        let mut ns = Namespace::new("top", "/p");
        ns.add_dep("@build", "lib|out/lib.so").unwrap();
        ns.add_dep("@build", "top|out/app").unwrap();
        ns.add_dep("@build", "lib|@build").unwrap();
        assert_eq!(
            ns.foreign_files(),
            [("lib".to_string(), TargetId::file("/p/out/lib.so"))]
        );
    }

    #[test]
    fn test_append_flags() {
        let mut ns = Namespace::new("lib", "/p");
        ns.append_flags(classes::CXXFLAGS, ["-std=c++11", "-fPIC"]);
        ns.append_flags(classes::CXXFLAGS, ["-fPIC"]);
        assert_eq!(ns.flags().get(classes::CXXFLAGS), ["-std=c++11", "-fPIC"]);
    }
}
