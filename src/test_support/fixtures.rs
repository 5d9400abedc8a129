//! Test fixtures for common test scenarios.
//!
//! This module provides project layouts and manifest templates for tests
//! that configure nova from `nova.toml` files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::manifest::MANIFEST_NAME;

/// Fixture for a complete project directory.
#[derive(Debug, Clone)]
pub struct ProjectFixture {
    /// Directory name, usually the namespace name.
    pub name: String,
    /// nova.toml content.
    pub manifest: String,
    /// Source files (path relative to project root -> content).
    pub sources: BTreeMap<PathBuf, String>,
    /// Header files (path relative to project root -> content).
    pub headers: BTreeMap<PathBuf, String>,
    /// Sibling projects written next to this one.
    pub dependencies: Vec<ProjectFixture>,
}

impl ProjectFixture {
    /// Create a new empty project fixture.
    pub fn new(name: impl Into<String>) -> Self {
        ProjectFixture {
            name: name.into(),
            manifest: String::new(),
            sources: BTreeMap::new(),
            headers: BTreeMap::new(),
            dependencies: Vec::new(),
        }
    }

    /// A shared library with one source and one public header.
    pub fn library(name: impl Into<String>) -> Self {
        let name = name.into();
        ProjectFixture::new(name.clone())
            .with_manifest(manifests::shared_lib(&name))
            .with_source("src/lib.c", sources::simple_lib(&name))
            .with_header(format!("src/{name}.h"), sources::simple_header(&name))
    }

    /// A program built from `src/main.c`.
    pub fn executable(name: impl Into<String>) -> Self {
        let name = name.into();
        ProjectFixture::new(name.clone())
            .with_manifest(manifests::program(&name, &[]))
            .with_source("src/main.c", sources::main_c())
    }

    /// Set the manifest content.
    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = manifest.into();
        self
    }

    /// Add a source file.
    pub fn with_source(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.sources.insert(path.into(), content.into());
        self
    }

    /// Add a header file.
    pub fn with_header(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.headers.insert(path.into(), content.into());
        self
    }

    /// Add a sibling project.
    pub fn with_dependency(mut self, dep: ProjectFixture) -> Self {
        self.dependencies.push(dep);
        self
    }

    /// Write this fixture under `base_path` and return the project directory.
    pub fn write_to(&self, base_path: &Path) -> std::io::Result<PathBuf> {
        let project_path = base_path.join(&self.name);
        std::fs::create_dir_all(&project_path)?;

        std::fs::write(project_path.join(MANIFEST_NAME), &self.manifest)?;

        for (rel_path, content) in self.sources.iter().chain(&self.headers) {
            let full_path = project_path.join(rel_path);
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full_path, content)?;
        }

        for dep in &self.dependencies {
            dep.write_to(base_path)?;
        }

        Ok(project_path)
    }
}

/// Common manifest templates.
///
/// Every template writes its outputs below `build/<os>-<profile>`.
pub mod manifests {
    fn quoted(items: &[&str]) -> String {
        items
            .iter()
            .map(|i| format!("\"{i}\""))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// A shared library that stages its headers under `include/<name>`.
    pub fn shared_lib(name: &str) -> String {
        format!(
            r#"[namespace]
name = "{name}"

[vars]
out = "${{config_dir}}/build/${{out_dir}}"

[flags]
CPPFLAGS = ["-I${{out}}/include"]
CFLAGS = ["-fPIC"]
CXXFLAGS = ["-fPIC"]

[[headers]]
from = "src"
to = "${{out}}/include/{name}"

[[artifact]]
kind = "shared"
output = "${{out}}/lib{name}${{shared_lib_suffix}}"
sources = "src"
objects = "${{out}}/obj"

[clean]
paths = ["build"]
"#
        )
    }

    /// A static library.
    pub fn static_lib(name: &str) -> String {
        format!(
            r#"[namespace]
name = "{name}"

[vars]
out = "${{config_dir}}/build/${{out_dir}}"

[[artifact]]
kind = "static"
output = "${{out}}/lib{name}${{static_lib_suffix}}"
sources = "src"
objects = "${{out}}/obj"

[clean]
paths = ["build"]
"#
        )
    }

    /// A program importing sibling projects by directory name.
    pub fn program(name: &str, imports: &[&str]) -> String {
        let import_dirs: Vec<String> = imports.iter().map(|i| format!("../{i}")).collect();
        let import_dirs: Vec<&str> = import_dirs.iter().map(String::as_str).collect();
        let clean_deps: Vec<String> = imports.iter().map(|i| format!("{i}|@clean")).collect();
        let clean_deps: Vec<&str> = clean_deps.iter().map(String::as_str).collect();
        format!(
            r#"[namespace]
name = "{name}"
imports = [{imports}]

[vars]
out = "${{config_dir}}/build/${{out_dir}}"

[[artifact]]
kind = "program"
output = "${{out}}/{name}${{program_suffix}}"
sources = "src"
objects = "${{out}}/obj"

[clean]
paths = ["build"]
deps = [{clean_deps}]
"#,
            imports = quoted(&import_dirs),
            clean_deps = quoted(&clean_deps),
        )
    }
}

/// Common source file templates.
pub mod sources {
    /// A C library source including its own header.
    pub fn simple_lib(name: &str) -> String {
        format!(
            r#"#include "{name}.h"

int {name}_init(void) {{
    return 0;
}}
"#
        )
    }

    /// The header matching [`simple_lib`].
    pub fn simple_header(name: &str) -> String {
        let guard = name.to_uppercase().replace('-', "_");
        format!(
            r#"#ifndef {guard}_H
#define {guard}_H

int {name}_init(void);

#endif
"#
        )
    }

    /// A hello-world `main`.
    pub fn main_c() -> String {
        r#"#include <stdio.h>

int main(void) {
    printf("Hello, World!\n");
    return 0;
}
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_project_with_dependency() {
        let tmp = TempDir::new().unwrap();
        let app = ProjectFixture::executable("app")
            .with_manifest(manifests::program("app", &["lib"]))
            .with_dependency(ProjectFixture::library("lib"));
        let root = app.write_to(tmp.path()).unwrap();

        assert!(root.join("nova.toml").is_file());
        assert!(root.join("src/main.c").is_file());
        assert!(tmp.path().join("lib/src/lib.h").is_file());

        let manifest = std::fs::read_to_string(root.join("nova.toml")).unwrap();
        assert!(manifest.contains(r#"imports = ["../lib"]"#));
        assert!(manifest.contains(r#"deps = ["lib|@clean"]"#));
    }
}
