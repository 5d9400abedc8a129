//! Declarative namespace manifests (`nova.toml`).
//!
//! A manifest describes exactly one namespace:
//!
//! ```toml
//! [namespace]
//! name = "lib"
//! imports = ["../nut"]
//!
//! [vars]
//! out = "${config_dir}/build/${out_dir}"
//!
//! [flags]
//! CPPFLAGS = ["-I${out}/include"]
//! CFLAGS = ["-std=c11", "-fPIC"]
//!
//! [platform.linux.flags]
//! LDFLAGS = ["-lpthread"]
//!
//! [profile.debug.flags]
//! CFLAGS = ["-g"]
//!
//! [[headers]]
//! from = "src"
//! to = "${out}/include/lib"
//!
//! [[artifact]]
//! kind = "shared"
//! output = "${out}/liblib${shared_lib_suffix}"
//! sources = "src"
//! objects = "${out}/obj"
//!
//! [clean]
//! paths = ["${out}"]
//! deps = ["nut|@clean"]
//! ```
//!
//! Flags are applied in order: `[flags]`, matching `[platform.*]` tables in
//! name order, then the table of the active profile.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::builder::recipes::{
    ArchiveRecipe, CommandRecipe, CompileRecipe, CopyRecipe, LinkKind, LinkRecipe, RemoveRecipe,
};
use crate::builder::toolchain::{Language, HEADER_EXTENSIONS, SOURCE_EXTENSIONS};
use crate::config::vars::Vars;
use crate::config::{ConfigId, NamespaceConfig, NamespaceDescription};
use crate::core::namespace::Namespace;
use crate::core::recipe::Recipe;
use crate::core::target::{TargetId, NAMESPACE_SEPARATOR, PSEUDO_SENTINEL};
use crate::util::context::{Environment, Os};
use crate::util::diagnostic::ManifestParseError;
use crate::util::fs::{absolutize, discover, remap};

/// File name looked up when a directory is given instead of a manifest.
pub const MANIFEST_NAME: &str = "nova.toml";

/// Aggregator over everything a manifest builds.
pub const BUILD_TARGET: &str = "@build";
/// Aggregator over every staged header. Objects compile after it, so an
/// `[[alias]]` can extend it with headers staged by other namespaces.
pub const HEADERS_TARGET: &str = "@headers";
/// Removes build outputs.
pub const CLEAN_TARGET: &str = "@clean";

/// The parsed contents of a `nova.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub namespace: NamespaceSection,

    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    #[serde(default)]
    pub flags: BTreeMap<String, Vec<String>>,

    /// Conditional tables keyed by platform selector.
    #[serde(default)]
    pub platform: BTreeMap<String, Conditional>,

    /// Conditional tables keyed by profile name.
    #[serde(default)]
    pub profile: BTreeMap<String, Conditional>,

    #[serde(default)]
    pub headers: Vec<HeadersSection>,

    #[serde(default, rename = "artifact")]
    pub artifacts: Vec<ArtifactSection>,

    #[serde(default)]
    pub copy: Vec<CopySection>,

    #[serde(default, rename = "command")]
    pub commands: Vec<CommandSection>,

    #[serde(default, rename = "alias")]
    pub aliases: Vec<AliasSection>,

    #[serde(default)]
    pub clean: Option<CleanSection>,
}

/// `[namespace]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamespaceSection {
    pub name: String,
    pub default: Option<String>,
    #[serde(default)]
    pub imports: Vec<String>,
}

/// `[platform.<selector>]` and `[profile.<name>]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Conditional {
    #[serde(default)]
    pub flags: BTreeMap<String, Vec<String>>,
}

/// `[[headers]]`: stage headers into an output tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeadersSection {
    pub from: String,
    pub to: String,
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Program,
    Shared,
    Static,
}

/// `[[artifact]]`: compile every source under a root and link the objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactSection {
    pub kind: ArtifactKind,
    pub output: String,
    pub sources: String,
    pub objects: String,
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub deps: Vec<String>,
}

/// `[[copy]]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopySection {
    pub from: String,
    pub to: String,
}

/// `[[command]]`: run a program, usually for a pseudo-target like `@run`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandSection {
    pub target: String,
    pub argv: Vec<String>,
    pub cwd: Option<String>,
    #[serde(default)]
    pub deps: Vec<String>,
}

/// `[[alias]]`: a target that only aggregates others.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasSection {
    pub target: String,
    #[serde(default)]
    pub deps: Vec<String>,
}

/// `[clean]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanSection {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub deps: Vec<String>,
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        Self::parse(&content, path)
    }

    /// Parse manifest content read from `path`.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content)
            .map_err(|e| ManifestParseError::new(path, content, &e))?;
        validate_name(&manifest.namespace.name)?;
        for profile in manifest.profile.keys() {
            if profile != "debug" && profile != "release" {
                bail!("unknown profile `{profile}` (expected `debug` or `release`)");
            }
        }
        for selector in manifest.platform.keys() {
            platform_matches(selector, Os::current())?;
        }
        Ok(manifest)
    }

    /// Turn the manifest into a namespace description.
    ///
    /// `dir` is the manifest's directory: the namespace root, the anchor of
    /// relative paths and the value of `${config_dir}`.
    pub fn describe(&self, dir: &Path, env: &Environment) -> Result<NamespaceDescription> {
        let mut vars = Vars::new(env, dir, &self.vars)?;
        let mut ns = Namespace::new(self.namespace.name.clone(), dir);
        let name = ns.name().to_string();

        self.apply_flags(&mut ns, &mut vars, env)?;

        let mut describer = Describer {
            ns,
            dir,
            vars,
            copy: Arc::new(CopyRecipe),
            compile: Arc::new(CompileRecipe),
            objects: HashSet::new(),
        };
        describer.declare_pseudo(BUILD_TARGET)?;
        describer.declare_pseudo(CLEAN_TARGET)?;
        describer.declare_pseudo(HEADERS_TARGET)?;

        for headers in &self.headers {
            describer.headers(headers)?;
        }
        for artifact in &self.artifacts {
            describer
                .artifact(artifact)
                .with_context(|| format!("in artifact `{}`", artifact.output))?;
        }
        for copy in &self.copy {
            describer.copy(copy)?;
        }
        for command in &self.commands {
            describer.command(command)?;
        }
        for alias in &self.aliases {
            describer.alias(alias)?;
        }
        if let Some(clean) = &self.clean {
            describer.clean(clean)?;
        }

        let default = match &self.namespace.default {
            Some(default) => describer.vars.expand(default)?,
            None => BUILD_TARGET.to_string(),
        };
        describer.ns.set_default(&default)?;

        let mut imports = Vec::new();
        for import in &self.namespace.imports {
            let path = absolutize(dir, Path::new(&describer.vars.expand(import)?));
            let config = ManifestConfig::open(&path)
                .with_context(|| format!("namespace `{name}` imports `{import}`"))?;
            imports.push(Arc::new(config) as Arc<dyn NamespaceConfig>);
        }

        debug!(
            "manifest namespace `{}` declares {} targets",
            name,
            describer.ns.graph().len()
        );
        let mut description = NamespaceDescription::new(describer.ns);
        for import in imports {
            description.import(import);
        }
        Ok(description)
    }

    fn apply_flags(&self, ns: &mut Namespace, vars: &mut Vars<'_>, env: &Environment) -> Result<()> {
        let mut tables = vec![&self.flags];
        for (selector, conditional) in &self.platform {
            if platform_matches(selector, env.os())? {
                debug!("platform `{selector}` applies to `{}`", ns.name());
                tables.push(&conditional.flags);
            }
        }
        if let Some(conditional) = self.profile.get(env.profile()) {
            tables.push(&conditional.flags);
        }

        for table in tables {
            for (class, flags) in table {
                let flags = vars.expand_all(flags)?;
                ns.append_flags(class, flags);
            }
        }
        Ok(())
    }
}

/// Builds one namespace from manifest sections.
struct Describer<'m, 'e> {
    ns: Namespace,
    dir: &'m Path,
    vars: Vars<'e>,
    copy: Arc<dyn Recipe>,
    compile: Arc<dyn Recipe>,
    objects: HashSet<PathBuf>,
}

impl Describer<'_, '_> {
    fn path(&mut self, text: &str) -> Result<PathBuf> {
        Ok(absolutize(self.dir, Path::new(&self.vars.expand(text)?)))
    }

    fn reference(&mut self, text: &str) -> Result<TargetId> {
        let expanded = self.vars.expand(text)?;
        Ok(self.ns.reference(&expanded)?)
    }

    fn declare_pseudo(&mut self, name: &str) -> Result<TargetId> {
        let id = self.ns.target(name)?;
        self.ns.graph_mut().declare(id.clone(), None)?;
        Ok(id)
    }

    fn depend_on_all(&mut self, target: &TargetId, deps: &[String]) -> Result<()> {
        for dep in deps {
            let dep = self.reference(dep)?;
            self.ns.graph_mut().add_dependency(target.clone(), dep);
        }
        Ok(())
    }

    fn headers(&mut self, section: &HeadersSection) -> Result<()> {
        let headers = TargetId::pseudo(self.ns.name(), HEADERS_TARGET);
        let from = self.path(&section.from)?;
        let to = self.path(&section.to)?;
        let extensions: Vec<String> = match &section.extensions {
            Some(exts) => self.vars.expand_all(exts)?,
            None => HEADER_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        };

        let mut staged = 0;
        for header in &discover(&from, extensions) {
            let target = TargetId::file(remap(&header, &from, &to)?);
            self.ns
                .graph_mut()
                .declare(target.clone(), Some(Arc::clone(&self.copy)))?;
            self.ns
                .graph_mut()
                .add_chain([headers.clone(), target, TargetId::file(&header)]);
            staged += 1;
        }
        debug!("staging {} headers from {}", staged, from.display());
        Ok(())
    }

    fn artifact(&mut self, section: &ArtifactSection) -> Result<()> {
        let output = TargetId::file(self.path(&section.output)?);
        let sources = self.path(&section.sources)?;
        let objects = self.path(&section.objects)?;
        let extensions: Vec<String> = match &section.extensions {
            Some(exts) => self.vars.expand_all(exts)?,
            None => SOURCE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        };
        let headers = TargetId::pseudo(self.ns.name(), HEADERS_TARGET);
        let build = TargetId::pseudo(self.ns.name(), BUILD_TARGET);

        let mut language = Language::C;
        let mut count = 0;
        for source in &discover(&sources, extensions) {
            if Language::from_path(&source) == Some(Language::Cxx) {
                language = Language::Cxx;
            }
            let object = remap(&source, &sources, &objects)?.with_extension("o");
            if !self.objects.insert(object.clone()) {
                bail!(
                    "`{}` maps to object `{}`, which another source already produces",
                    source.display(),
                    object.display()
                );
            }

            let object = TargetId::file(object);
            self.ns
                .graph_mut()
                .declare(object.clone(), Some(Arc::clone(&self.compile)))?;
            self.ns
                .graph_mut()
                .add_chain([output.clone(), object.clone(), TargetId::file(&source)]);
            self.ns.graph_mut().add_dependency(object, headers.clone());
            count += 1;
        }
        if count == 0 {
            warn!("artifact `{}` has no sources under {}", output, sources.display());
        }

        let recipe: Arc<dyn Recipe> = match section.kind {
            ArtifactKind::Program => Arc::new(LinkRecipe::new(LinkKind::Program, language)),
            ArtifactKind::Shared => Arc::new(LinkRecipe::new(LinkKind::Shared, language)),
            ArtifactKind::Static => Arc::new(ArchiveRecipe),
        };
        self.ns.graph_mut().declare(output.clone(), Some(recipe))?;
        self.depend_on_all(&output, &section.deps)?;
        self.ns.graph_mut().add_dependency(build, output);
        Ok(())
    }

    fn copy(&mut self, section: &CopySection) -> Result<()> {
        let from = TargetId::file(self.path(&section.from)?);
        let to = TargetId::file(self.path(&section.to)?);
        let build = TargetId::pseudo(self.ns.name(), BUILD_TARGET);

        self.ns
            .graph_mut()
            .declare(to.clone(), Some(Arc::clone(&self.copy)))?;
        self.ns.graph_mut().add_dependency(to.clone(), from);
        self.ns.graph_mut().add_dependency(build, to);
        Ok(())
    }

    fn command(&mut self, section: &CommandSection) -> Result<()> {
        let target = self.reference(&section.target)?;
        let argv = self.vars.expand_all(&section.argv)?;
        if argv.is_empty() {
            bail!("command `{}` has an empty argv", section.target);
        }
        let cwd = match &section.cwd {
            Some(cwd) => Some(self.path(cwd)?),
            None => None,
        };

        self.ns
            .set_recipe(&target.to_string(), Arc::new(CommandRecipe::new(argv, cwd)))?;
        self.depend_on_all(&target, &section.deps)
    }

    fn alias(&mut self, section: &AliasSection) -> Result<()> {
        let target = self.reference(&section.target)?;
        self.ns.graph_mut().declare(target.clone(), None)?;
        self.depend_on_all(&target, &section.deps)
    }

    fn clean(&mut self, section: &CleanSection) -> Result<()> {
        let clean = self.ns.pseudo(CLEAN_TARGET);
        if !section.paths.is_empty() {
            let mut paths = Vec::new();
            for path in &section.paths {
                paths.push(self.path(path)?);
            }
            let recipe: Arc<dyn Recipe> = Arc::new(RemoveRecipe::new(paths));
            self.ns.graph_mut().declare(clean.clone(), Some(recipe))?;
        }
        self.depend_on_all(&clean, &section.deps)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("namespace name must not be empty");
    }
    if name.contains(NAMESPACE_SEPARATOR)
        || name.starts_with(PSEUDO_SENTINEL)
        || name.chars().any(char::is_whitespace)
    {
        bail!(
            "invalid namespace name `{name}`: must not contain `{NAMESPACE_SEPARATOR}` or whitespace, or start with `{PSEUDO_SENTINEL}`"
        );
    }
    Ok(())
}

/// Whether a `[platform.<selector>]` table applies on `os`.
fn platform_matches(selector: &str, os: Os) -> Result<bool> {
    let (negated, name) = match selector.strip_prefix('!') {
        Some(name) => (true, name),
        None => (false, selector),
    };
    let matches = match name {
        "linux" => os == Os::Linux,
        "macos" => os == Os::Macos,
        "windows" => os == Os::Windows,
        "unix" => os.is_unix(),
        other => bail!("unknown platform selector `{other}` (expected linux, macos, windows or unix)"),
    };
    Ok(matches != negated)
}

/// A namespace configured by a `nova.toml`.
#[derive(Debug, Clone)]
pub struct ManifestConfig {
    path: PathBuf,
    id: ConfigId,
}

impl ManifestConfig {
    /// Open the manifest at `path`, or `path/nova.toml` for a directory.
    pub fn open(path: &Path) -> Result<Self> {
        let path = if path.is_dir() {
            path.join(MANIFEST_NAME)
        } else {
            path.to_path_buf()
        };
        let id = ConfigId::for_path(&path)?;
        let path = match &id {
            ConfigId::Path(canonical) => canonical.clone(),
            ConfigId::Named(_) => path,
        };
        Ok(ManifestConfig { path, id })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the manifest.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }
}

impl NamespaceConfig for ManifestConfig {
    fn id(&self) -> ConfigId {
        self.id.clone()
    }

    fn describe(&self, env: &Environment) -> Result<NamespaceDescription> {
        let manifest = Manifest::load(&self.path)?;
        manifest.describe(self.dir(), env)
    }
}
