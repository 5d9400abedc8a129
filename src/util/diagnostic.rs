//! User-friendly diagnostic messages.
//!
//! Every error printed by the CLI says what went wrong, the chain of causes,
//! and where possible what to do about it.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::core::error::ConfigError;

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Stable error code, e.g. `nova::config::unknown_target`
    pub code: Option<String>,
    /// Causes, outermost first
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            code: None,
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Build a diagnostic from a configuration error, keeping its code and help.
    pub fn from_config_error(err: &ConfigError) -> Self {
        let mut diag = Diagnostic::error(err.to_string());
        diag.code = err.code().map(|c| c.to_string());
        if let Some(help) = err.help() {
            diag = diag.with_suggestion(help.to_string());
        }
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            diag = diag.with_context(cause.to_string());
            source = cause.source();
        }
        diag
    }

    /// Build a diagnostic from any error chain.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        if let Some(config) = err.downcast_ref::<ConfigError>() {
            return Diagnostic::from_config_error(config);
        }
        let mut diag = Diagnostic::error(err.to_string());
        for cause in err.chain().skip(1) {
            diag = diag.with_context(cause.to_string());
        }
        diag
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = if color {
            "\x1b[1;31merror\x1b[0m"
        } else {
            "error"
        };

        match &self.code {
            Some(code) => output.push_str(&format!("{}[{}]: {}\n", severity_str, code, self.message)),
            None => output.push_str(&format!("{}: {}\n", severity_str, self.message)),
        }

        for ctx in &self.context {
            output.push_str(&format!("  caused by: {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            for suggestion in &self.suggestions {
                output.push_str(&format!("{}: {}\n", help_prefix, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// A manifest that is not valid TOML, with the offending span.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("invalid manifest: {message}")]
#[diagnostic(code(nova::manifest::parse))]
pub struct ManifestParseError {
    pub message: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("here")]
    pub span: Option<SourceSpan>,
}

impl ManifestParseError {
    pub fn new(path: &std::path::Path, contents: &str, err: &toml::de::Error) -> Self {
        ManifestParseError {
            message: err.message().to_string(),
            src: NamedSource::new(path.display().to_string(), contents.to_string()),
            span: err.span().map(SourceSpan::from),
        }
    }

    /// 1-based line of the error, if known.
    pub fn line(&self) -> Option<usize> {
        let span = self.span?;
        let prefix = self.src.inner().get(..span.offset())?;
        Some(prefix.matches('\n').count() + 1)
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("failed to build `/p/out/app`")
            .with_context("`cc -c a.c` failed with exit code 1")
            .with_suggestion("run `nova build --verbose` for more details");

        let output = diag.format(false);
        assert!(output.starts_with("error: failed to build"));
        assert!(output.contains("caused by: `cc -c a.c`"));
        assert!(output.contains("help: run `nova build --verbose`"));
    }

    #[test]
    fn test_config_error_keeps_code_and_help() {
        let err = ConfigError::UnknownTarget {
            namespace: "lib".into(),
            reference: "lib|@nope".into(),
        };
        let output = Diagnostic::from_config_error(&err).format(false);
        assert!(output.starts_with("error[nova::config::unknown_target]"));
        assert!(output.contains("help: run `nova targets`"));
    }

    #[test]
    fn test_anyhow_chain_is_flattened() {
        let err = anyhow::anyhow!("root cause").context("loading nova.toml");
        let diag = Diagnostic::from_anyhow(&err);
        assert_eq!(diag.message, "loading nova.toml");
        assert_eq!(diag.context, vec!["root cause".to_string()]);
    }

    #[test]
    fn test_manifest_parse_error_line() {
        let contents = "[namespace]\nname = \n";
        let err = toml::from_str::<toml::Value>(contents).unwrap_err();
        let parse = ManifestParseError::new(std::path::Path::new("nova.toml"), contents, &err);
        assert_eq!(parse.line(), Some(2));
    }
}
