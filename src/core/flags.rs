//! Per-namespace flag accumulation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::util::context::Environment;

/// Well-known flag classes.
pub mod classes {
    /// Preprocessor flags (include paths, defines).
    pub const CPPFLAGS: &str = "CPPFLAGS";
    /// C compiler flags.
    pub const CFLAGS: &str = "CFLAGS";
    /// C++ compiler flags.
    pub const CXXFLAGS: &str = "CXXFLAGS";
    /// Linker flags.
    pub const LDFLAGS: &str = "LDFLAGS";

    /// Classes seeded from the process environment.
    pub const SEEDED: [&str; 4] = [CPPFLAGS, CFLAGS, CXXFLAGS, LDFLAGS];
}

/// Ordered, de-duplicating flag lists keyed by flag class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagSet {
    classes: BTreeMap<String, Vec<String>>,
}

impl FlagSet {
    pub fn new() -> Self {
        FlagSet::default()
    }

    /// Seed the well-known classes from environment variables of the same name.
    pub fn from_env(env: &Environment) -> Self {
        let mut flags = FlagSet::new();
        for class in classes::SEEDED {
            if let Some(value) = env.var(class) {
                flags.append(class, value.split_whitespace());
            }
        }
        flags
    }

    /// Append flags to a class, skipping any already present.
    ///
    /// Returns how many flags were actually added.
    pub fn append<I, S>(&mut self, class: &str, flags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = self.classes.entry(class.to_string()).or_default();
        let before = list.len();
        for flag in flags {
            let flag = flag.into();
            if flag.is_empty() || list.contains(&flag) {
                continue;
            }
            list.push(flag);
        }
        list.len() - before
    }

    /// Flags of one class, in append order.
    pub fn get(&self, class: &str) -> &[String] {
        self.classes.get(class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over all classes in name order.
    pub fn classes(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.classes
            .iter()
            .map(|(class, flags)| (class.as_str(), flags.as_slice()))
    }

    /// Compose another flag set into this one, class by class.
    pub fn extend_from(&mut self, other: &FlagSet) {
        for (class, flags) in other.classes() {
            self.append(class, flags.iter().cloned());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_suppresses_duplicates() {
        let mut flags = FlagSet::new();
        assert_eq!(flags.append(classes::CFLAGS, ["-std=c11", "-Wall"]), 2);
        assert_eq!(flags.append(classes::CFLAGS, ["-Wall", "-O2"]), 1);
        assert_eq!(flags.get(classes::CFLAGS), ["-std=c11", "-Wall", "-O2"]);
    }

    #[test]
    fn test_unknown_class_is_empty() {
        let flags = FlagSet::new();
        assert!(flags.get("NOPE").is_empty());
        assert!(flags.is_empty());
    }

    #[test]
    fn test_seeded_from_environment() {
        let env = Environment::empty()
            .with_var("CPPFLAGS", "-DFOO  -I/opt/include")
            .with_var("UNRELATED", "-x");
        let flags = FlagSet::from_env(&env);

        assert_eq!(flags.get(classes::CPPFLAGS), ["-DFOO", "-I/opt/include"]);
        assert!(flags.get("UNRELATED").is_empty());
    }

    #[test]
    fn test_extend_preserves_order_and_dedups() {
        let mut base = FlagSet::new();
        base.append(classes::LDFLAGS, ["-L/out", "-lnut"]);

        let mut extra = FlagSet::new();
        extra.append(classes::LDFLAGS, ["-lnut", "-lpthread"]);
        extra.append(classes::CXXFLAGS, ["-fPIC"]);

        base.extend_from(&extra);
        assert_eq!(base.get(classes::LDFLAGS), ["-L/out", "-lnut", "-lpthread"]);
        assert_eq!(base.get(classes::CXXFLAGS), ["-fPIC"]);
    }
}
