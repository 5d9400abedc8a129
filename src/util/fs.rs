//! Filesystem utilities.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::core::error::ConfigError;

/// Resolve `.` and `..` components without touching the filesystem.
///
/// `..` at the root stays at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Make `path` absolute against `base` and normalize it.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    normalize_lexically(&base.join(path))
}

/// Files under a root whose names end in one of a set of suffixes.
///
/// The walk happens lazily, once per call to [`SourceFiles::iter`], so the
/// same value can be iterated again after the tree changes. Within one walk
/// paths come out sorted.
#[derive(Debug, Clone)]
pub struct SourceFiles {
    root: PathBuf,
    extensions: Vec<String>,
}

/// Enumerate files under `root` ending in one of `extensions` (e.g. `".c"`).
pub fn discover<I, S>(root: impl AsRef<Path>, extensions: I) -> SourceFiles
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let root = root.as_ref();
    let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
    SourceFiles {
        root: normalize_lexically(&root),
        extensions: extensions.into_iter().map(Into::into).collect(),
    }
}

impl SourceFiles {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn iter(&self) -> SourceIter<'_> {
        SourceIter {
            files: self,
            walked: None,
        }
    }

    fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }

    fn walk(&self) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("skipping unreadable entry under {}: {}", self.root.display(), e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && self.matches(entry.path()))
            .map(|entry| normalize_lexically(entry.path()))
            .collect();
        found.sort();
        found
    }
}

impl<'a> IntoIterator for &'a SourceFiles {
    type Item = PathBuf;
    type IntoIter = SourceIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`SourceFiles`] set.
#[derive(Debug)]
pub struct SourceIter<'a> {
    files: &'a SourceFiles,
    walked: Option<std::vec::IntoIter<PathBuf>>,
}

impl Iterator for SourceIter<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        let files = self.files;
        self.walked
            .get_or_insert_with(|| files.walk().into_iter())
            .next()
    }
}

/// Re-root `path`: replace its `from` prefix with `to`.
pub fn remap(path: &Path, from: &Path, to: &Path) -> Result<PathBuf, ConfigError> {
    let path = normalize_lexically(path);
    let from = normalize_lexically(from);
    match path.strip_prefix(&from) {
        Ok(relative) => Ok(normalize_lexically(&to.join(relative))),
        Err(_) => Err(ConfigError::PathNotUnderRoot { path, root: from }),
    }
}

/// Ensure a directory exists, creating it if necessary.
///
/// Safe to call concurrently for the same path.
pub fn ensure_dir(path: &Path) -> Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to create directory: {}", path.display())),
    }
}

/// Ensure the parent directory of a file exists.
pub fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Remove files or directory trees, ignoring paths that do not exist.
pub fn remove_any<I, P>(paths: I) -> Result<()>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    for path in paths {
        let path = path.as_ref();
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("failed to inspect {}", path.display()))
            }
        };
        let removed = if metadata.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match removed {
            Ok(()) => tracing::debug!("removed {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("failed to remove {}", path.display()))
            }
        }
    }
    Ok(())
}

/// Modification time of a file, or `None` if it does not exist.
pub fn modified(path: &Path) -> io::Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(metadata) => metadata.modified().map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_lexically(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_lexically(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize_lexically(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn test_remap_preserves_relative_structure() {
        let out = remap(
            Path::new("/src/a/b.h"),
            Path::new("/src"),
            Path::new("/out/include"),
        )
        .unwrap();
        assert_eq!(out, PathBuf::from("/out/include/a/b.h"));
    }

    #[test]
    fn test_remap_outside_root_fails() {
        let err = remap(Path::new("/other/b.h"), Path::new("/src"), Path::new("/out")).unwrap_err();
        assert!(matches!(err, ConfigError::PathNotUnderRoot { .. }));

        // A shared string prefix is not a shared path prefix.
        assert!(remap(Path::new("/srcs/b.h"), Path::new("/src"), Path::new("/out")).is_err());
    }

    #[test]
    fn test_discover_is_sorted_filtered_and_restartable() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("b.c"), "").unwrap();
        fs::write(src.join("a.cpp"), "").unwrap();
        fs::write(src.join("nested/c.c"), "").unwrap();
        fs::write(src.join("readme.txt"), "").unwrap();

        let files = discover(&src, [".c", ".cpp"]);
        let first: Vec<_> = files.iter().collect();
        assert_eq!(
            first,
            vec![src.join("a.cpp"), src.join("b.c"), src.join("nested/c.c")]
        );
        assert!(first.iter().all(|p| p.is_absolute()));

        fs::write(src.join("d.c"), "").unwrap();
        assert_eq!(files.iter().count(), 4);
    }

    #[test]
    fn test_discover_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(discover(tmp.path().join("nope"), [".c"]).iter().count(), 0);
    }

    #[test]
    fn test_remove_any_ignores_missing() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.o");
        let dir = tmp.path().join("out");
        fs::write(&file, "").unwrap();
        fs::create_dir_all(dir.join("deep")).unwrap();

        remove_any([&file, &dir, &tmp.path().join("ghost")]).unwrap();
        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_modified_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(modified(&tmp.path().join("nope")).unwrap().is_none());
        fs::write(tmp.path().join("yes"), "").unwrap();
        assert!(modified(&tmp.path().join("yes")).unwrap().is_some());
    }
}
