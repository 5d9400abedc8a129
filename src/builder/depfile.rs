//! Dependency listings left behind by compilers (`-MMD -MF`).
//!
//! A listing is a Makefile fragment:
//!
//! ```text
//! out/obj/a.o: src/a.c src/common.h \
//!   src/with\ space.h
//! ```
//!
//! Only the prerequisites matter; rule targets are skipped. Listings are
//! advisory: a missing or unreadable one simply contributes nothing.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::graph::TargetGraph;
use crate::core::target::TargetId;
use crate::util::fs::absolutize;

/// A listing that could not be used.
#[derive(Debug, Error)]
pub enum DepfileError {
    #[error("failed to read dependency listing {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: {reason}", path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// Parse listing text into prerequisite paths, in order, without duplicates.
///
/// On failure returns the 1-based logical line and a reason.
pub fn parse(contents: &str) -> Result<Vec<PathBuf>, (usize, String)> {
    let mut prerequisites: Vec<PathBuf> = Vec::new();

    for (number, line) in logical_lines(contents) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some(split) = rule_separator(&line) else {
            return Err((number, "expected `target: prerequisites`".to_string()));
        };

        for token in tokens(&line[split + 1..]) {
            let path = PathBuf::from(token);
            if !prerequisites.contains(&path) {
                prerequisites.push(path);
            }
        }
    }

    Ok(prerequisites)
}

/// Read and parse a listing. `Ok(None)` means there is no listing yet.
pub fn read(path: &Path) -> Result<Option<Vec<PathBuf>>, DepfileError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(DepfileError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse(&contents)
        .map(Some)
        .map_err(|(line, reason)| DepfileError::Syntax {
            path: path.to_path_buf(),
            line,
            reason,
        })
}

/// Add the prerequisites listed in `listing` to `target` as discovered edges.
///
/// Relative entries are anchored at `base_dir`. Returns how many new edges
/// were added; any problem with the listing is logged and counts as empty.
pub fn inject(graph: &mut TargetGraph, target: &TargetId, listing: &Path, base_dir: &Path) -> usize {
    let prerequisites = match read(listing) {
        Ok(Some(prerequisites)) => prerequisites,
        Ok(None) => {
            debug!("no dependency listing for {} yet", target);
            return 0;
        }
        Err(e) => {
            warn!("ignoring dependency listing: {}", e);
            return 0;
        }
    };

    let mut added = 0;
    for path in prerequisites {
        let prerequisite = TargetId::file(absolutize(base_dir, &path));
        if prerequisite == *target {
            continue;
        }
        if graph.add_discovered(target.clone(), prerequisite) {
            added += 1;
        }
    }
    debug!("{} discovered prerequisites injected into {}", added, target);
    added
}

/// Join backslash-newline continuations, keeping the starting line number.
fn logical_lines(contents: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start = 1;

    for (index, raw) in contents.lines().enumerate() {
        if current.is_empty() {
            start = index + 1;
        }
        match raw.strip_suffix('\\') {
            Some(head) if !head.ends_with('\\') => {
                current.push_str(head);
                current.push(' ');
            }
            _ => {
                current.push_str(raw);
                lines.push((start, std::mem::take(&mut current)));
            }
        }
    }
    if !current.trim().is_empty() {
        lines.push((start, current));
    }
    lines
}

/// Byte offset of the `:` that ends the rule targets.
///
/// A colon followed by a path separator (`C:\x`, `C:/x`) is part of a
/// drive-qualified path.
fn rule_separator(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b':' => {
                let after_letter = i == 1 || (i >= 2 && bytes[i - 2].is_ascii_whitespace());
                let drive = after_letter && matches!(bytes.get(i + 1), Some(b'\\' | b'/'));
                if !drive {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on unescaped whitespace, unescaping `\ `, `\#` and `$$`.
fn tokens(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(&next) if next == ' ' || next == '#' || next == '\\' => {
                    current.push(next);
                    chars.next();
                }
                _ => current.push('\\'),
            },
            '$' if chars.peek() == Some(&'$') => {
                current.push('$');
                chars.next();
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}
