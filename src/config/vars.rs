//! `${...}` interpolation for manifest strings.
//!
//! - `${name}` expands a `[vars]` entry or a builtin
//! - `${env:NAME}` expands an environment variable (empty when unset)
//! - `${env:NAME:-fallback}` uses `fallback` when the variable is unset or
//!   empty; the fallback is itself interpolated
//! - `$$` is a literal `$`
//!
//! `[vars]` entries are resolved on first use, so their order in the file
//! does not matter. A variable that refers back to itself is an error.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use thiserror::Error;

use crate::util::context::Environment;

/// Names provided by nova itself.
pub const BUILTINS: [&str; 7] = [
    "config_dir",
    "os",
    "profile",
    "out_dir",
    "program_suffix",
    "shared_lib_suffix",
    "static_lib_suffix",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VarError {
    #[error("undefined variable `{0}`")]
    Undefined(String),

    #[error("variable cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("unterminated `${{` in `{0}`")]
    Unterminated(String),

    #[error("`{0}` is a builtin variable and cannot be redefined")]
    Reserved(String),
}

/// Interpolation scope of one manifest.
#[derive(Debug)]
pub struct Vars<'a> {
    env: &'a Environment,
    builtins: HashMap<&'static str, String>,
    raw: &'a BTreeMap<String, String>,
    resolved: HashMap<String, String>,
    resolving: Vec<String>,
}

impl<'a> Vars<'a> {
    pub fn new(
        env: &'a Environment,
        config_dir: &Path,
        raw: &'a BTreeMap<String, String>,
    ) -> Result<Self, VarError> {
        if let Some(name) = raw.keys().find(|k| BUILTINS.contains(&k.as_str())) {
            return Err(VarError::Reserved(name.clone()));
        }

        let os = env.os();
        let builtins = HashMap::from([
            ("config_dir", config_dir.display().to_string()),
            ("os", os.as_str().to_string()),
            ("profile", env.profile().to_string()),
            ("out_dir", env.out_dir_name()),
            ("program_suffix", os.program_suffix().to_string()),
            ("shared_lib_suffix", os.shared_lib_suffix().to_string()),
            ("static_lib_suffix", os.static_lib_suffix().to_string()),
        ]);

        Ok(Vars {
            env,
            builtins,
            raw,
            resolved: HashMap::new(),
            resolving: Vec::new(),
        })
    }

    /// Interpolate every reference in `text`.
    pub fn expand(&mut self, text: &str) -> Result<String, VarError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(tail) = after.strip_prefix('$') {
                out.push('$');
                rest = tail;
            } else if let Some(body) = after.strip_prefix('{') {
                let end = closing_brace(body).ok_or_else(|| VarError::Unterminated(text.to_string()))?;
                let value = self.reference(&body[..end])?;
                out.push_str(&value);
                rest = &body[end + 1..];
            } else {
                out.push('$');
                rest = after;
            }
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Interpolate each string of a list.
    pub fn expand_all(&mut self, items: &[String]) -> Result<Vec<String>, VarError> {
        items.iter().map(|item| self.expand(item)).collect()
    }

    fn reference(&mut self, body: &str) -> Result<String, VarError> {
        let Some(env_ref) = body.strip_prefix("env:") else {
            return self.lookup(body.trim());
        };

        let (name, fallback) = match env_ref.split_once(":-") {
            Some((name, fallback)) => (name.trim(), Some(fallback)),
            None => (env_ref.trim(), None),
        };
        match (self.env.var(name).filter(|v| !v.is_empty()), fallback) {
            (Some(value), _) => Ok(value.to_string()),
            (None, Some(fallback)) => self.expand(fallback),
            (None, None) => Ok(String::new()),
        }
    }

    fn lookup(&mut self, name: &str) -> Result<String, VarError> {
        if let Some(value) = self.builtins.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.resolved.get(name) {
            return Ok(value.clone());
        }
        let raw = self
            .raw
            .get(name)
            .ok_or_else(|| VarError::Undefined(name.to_string()))?;

        if let Some(start) = self.resolving.iter().position(|n| n == name) {
            let mut cycle = self.resolving[start..].to_vec();
            cycle.push(name.to_string());
            return Err(VarError::Cycle(cycle));
        }

        self.resolving.push(name.to_string());
        let value = self.expand(raw);
        self.resolving.pop();

        let value = value?;
        self.resolved.insert(name.to_string(), value.clone());
        Ok(value)
    }
}

/// Offset of the `}` closing a `${`, honouring nested `${...}`.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::context::Os;

    fn env() -> Environment {
        Environment::empty()
            .with_os(Os::Linux)
            .with_debug(true)
            .with_var("NUT_ROOT", "/opt/nut")
            .with_var("EMPTY", "")
    }

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_builtins() {
        let env = env();
        let raw = BTreeMap::new();
        let mut v = Vars::new(&env, Path::new("/proj/lib"), &raw).unwrap();
        assert_eq!(
            v.expand("${config_dir}/build/${out_dir}/lib${shared_lib_suffix}")
                .unwrap(),
            "/proj/lib/build/linux-debug/lib.so"
        );
        assert_eq!(v.expand("${profile}-${os}").unwrap(), "debug-linux");
    }

    #[test]
    fn test_vars_resolve_in_any_order() {
        let env = env();
        let raw = vars(&[("a", "${b}/a"), ("b", "${c}/b"), ("c", "root")]);
        let mut v = Vars::new(&env, Path::new("/p"), &raw).unwrap();
        assert_eq!(v.expand("${a}").unwrap(), "root/b/a");
    }

    #[test]
    fn test_env_lookup_and_fallback() {
        let env = env();
        let raw = vars(&[("base", "/fallback")]);
        let mut v = Vars::new(&env, Path::new("/p"), &raw).unwrap();
        assert_eq!(v.expand("${env:NUT_ROOT}/lib").unwrap(), "/opt/nut/lib");
        assert_eq!(v.expand("${env:MISSING}").unwrap(), "");
        assert_eq!(
            v.expand("${env:MISSING:-${base}/nut}").unwrap(),
            "/fallback/nut"
        );
        assert_eq!(v.expand("${env:EMPTY:-x}").unwrap(), "x");
    }

    #[test]
    fn test_dollar_escapes() {
        let env = env();
        let raw = BTreeMap::new();
        let mut v = Vars::new(&env, Path::new("/p"), &raw).unwrap();
        assert_eq!(v.expand("cost: $$5, $x").unwrap(), "cost: $5, $x");
    }

    #[test]
    fn test_errors() {
        let env = env();
        let raw = vars(&[("a", "${b}"), ("b", "${a}")]);
        let mut v = Vars::new(&env, Path::new("/p"), &raw).unwrap();
        assert_eq!(
            v.expand("${a}").unwrap_err(),
            VarError::Cycle(vec!["a".into(), "b".into(), "a".into()])
        );
        assert_eq!(
            v.expand("${nope}").unwrap_err(),
            VarError::Undefined("nope".into())
        );
        assert!(matches!(
            v.expand("${oops").unwrap_err(),
            VarError::Unterminated(_)
        ));

        let reserved = vars(&[("os", "plan9")]);
        assert_eq!(
            Vars::new(&env, Path::new("/p"), &reserved).unwrap_err(),
            VarError::Reserved("os".into())
        );
    }
}
