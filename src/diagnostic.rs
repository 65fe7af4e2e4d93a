//! Error kinds and diagnostic rendering.
//!
//! The driver reports a single, ordered list of diagnostics with severity
//! prefixes; on the first fatal error no action graph is handed to the
//! executor and no receipt is written.
//! [`BuildError`] is the closed set of design-level error kinds; [`ReferenceChain`]
//! is threaded through fallible operations so an error can name "the
//! offending declaration" the way module/plugin creation discovered it.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

/// Common suggestion strings surfaced alongside diagnostics.
pub mod suggestions {
    pub const NO_TARGET: &str = "help: pass -Target=<Name> or -TargetList=<file>";
    pub const NO_PROJECT: &str = "help: pass -Project=<path> or build an engine-only target";
    pub const RULES_NOT_FOUND: &str = "help: check the module/target name and its rules file location";
    pub const PLUGIN_NOT_FOUND: &str = "help: check the plugin reference and enabled-plugin roots";
    pub const SDK_NOT_INSTALLED: &str = "help: install the required platform SDK and re-run";
}

/// Severity level for a reported diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
    Help,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
            Severity::Help => write!(f, "help"),
        }
    }
}

/// A single reported diagnostic, with enough context to locate the
/// offending declaration.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    pub context: Vec<String>,
    pub suggestions: Vec<String>,
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Warning,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render for terminal output, severity-prefixed.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();
        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
                Severity::Note => "\x1b[1;36mnote\x1b[0m",
                Severity::Help => "\x1b[1;32mhelp\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Note => "note",
                Severity::Help => "help",
            }
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));
        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }
        for ctx in &self.context {
            output.push_str(&format!("  -> {}\n", ctx));
        }
        if !self.suggestions.is_empty() {
            for suggestion in &self.suggestions {
                output.push_str(&format!("  {}\n", suggestion));
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

/// An ordered accumulator of diagnostics for one driver invocation. The
/// driver stops handing the action graph to the executor (and writes no
/// receipt) as soon as `has_fatal()` is true.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticList {
    entries: Vec<Diagnostic>,
}

impl DiagnosticList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn has_fatal(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_fatal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn emit_all(&self, color: bool) {
        for diagnostic in &self.entries {
            eprint!("{}", diagnostic.format(color));
        }
    }
}

/// The stack-like chain of module/plugin/target names carried through
/// creation, used purely for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceChain {
    frames: Vec<String>,
}

impl ReferenceChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(name: impl Into<String>) -> Self {
        ReferenceChain {
            frames: vec![name.into()],
        }
    }

    #[must_use]
    pub fn push(&self, name: impl Into<String>) -> Self {
        let mut frames = self.frames.clone();
        frames.push(name.into());
        ReferenceChain { frames }
    }

    pub fn top(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }
}

impl fmt::Display for ReferenceChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.frames.join(" -> "))
    }
}

/// The closed set of design-level error kinds. Each carries the
/// reference chain active when the error was raised, when one applies.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum BuildError {
    #[error("configuration error: {message}")]
    #[diagnostic(code(forge::configuration_error))]
    Configuration { message: String },

    #[error("rules error: {message} (while building {chain})")]
    #[diagnostic(code(forge::rules_error))]
    Rules { message: String, chain: ReferenceChain },

    #[error("dependency error: {message} (while building {chain})")]
    #[diagnostic(code(forge::dependency_error))]
    Dependency { message: String, chain: ReferenceChain },

    #[error("graph error: {message}")]
    #[diagnostic(code(forge::graph_error))]
    Graph { message: String },

    #[error("scope violation: {message} (while building {chain})")]
    #[diagnostic(code(forge::scope_violation))]
    ScopeViolation { message: String, chain: ReferenceChain },

    #[error("license violation: {message} (while building {chain})")]
    #[diagnostic(code(forge::license_violation))]
    LicenseViolation { message: String, chain: ReferenceChain },

    #[error("SDK error: {message}")]
    #[diagnostic(code(forge::sdk_error), help("{}", suggestions::SDK_NOT_INSTALLED))]
    Sdk { message: String },
}

impl BuildError {
    pub fn configuration(message: impl Into<String>) -> Self {
        BuildError::Configuration {
            message: message.into(),
        }
    }

    pub fn rules(message: impl Into<String>, chain: &ReferenceChain) -> Self {
        BuildError::Rules {
            message: message.into(),
            chain: chain.clone(),
        }
    }

    pub fn dependency(message: impl Into<String>, chain: &ReferenceChain) -> Self {
        BuildError::Dependency {
            message: message.into(),
            chain: chain.clone(),
        }
    }

    pub fn graph(message: impl Into<String>) -> Self {
        BuildError::Graph {
            message: message.into(),
        }
    }

    pub fn scope_violation(message: impl Into<String>, chain: &ReferenceChain) -> Self {
        BuildError::ScopeViolation {
            message: message.into(),
            chain: chain.clone(),
        }
    }

    pub fn license_violation(message: impl Into<String>, chain: &ReferenceChain) -> Self {
        BuildError::LicenseViolation {
            message: message.into(),
            chain: chain.clone(),
        }
    }

    pub fn sdk(message: impl Into<String>) -> Self {
        BuildError::Sdk {
            message: message.into(),
        }
    }
}

pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_formatting_includes_context_and_suggestions() {
        let diag = Diagnostic::error("module `Foo` not found")
            .with_context("referenced from target `Editor`")
            .with_suggestion(suggestions::RULES_NOT_FOUND);

        let output = diag.format(false);
        assert!(output.contains("error: module `Foo` not found"));
        assert!(output.contains("referenced from target"));
        assert!(output.contains("help:"));
    }

    #[test]
    fn diagnostic_list_tracks_fatal() {
        let mut list = DiagnosticList::new();
        assert!(!list.has_fatal());
        list.push(Diagnostic::warning("unreferenced plugin dependency"));
        assert!(!list.has_fatal());
        list.push(Diagnostic::error("module not found"));
        assert!(list.has_fatal());
    }

    #[test]
    fn reference_chain_renders_as_arrow_path() {
        let chain = ReferenceChain::root("Editor").push("Engine").push("Core");
        assert_eq!(chain.to_string(), "Editor -> Engine -> Core");
        assert_eq!(chain.top(), Some("Core"));
    }

    #[test]
    fn build_error_carries_reference_chain() {
        let chain = ReferenceChain::root("Editor").push("Foo");
        let err = BuildError::rules("LaunchModuleName not set", &chain);
        assert!(err.to_string().contains("Editor -> Foo"));
    }
}
