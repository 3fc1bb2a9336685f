//! Shared error/diagnostic model for the pipeline.
//!
//! Every phase (parse, validate, collision-check, emit) reports its failures
//! as `Diagnostic`s rather than bailing out early, except for `Kind::Input`
//! faults which abort the run immediately (a missing file or an empty glob
//! leaves nothing to validate).

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// YAML parse error, missing file, empty glob.
    Input,
    /// JSON-Schema validation failure.
    Schema,
    /// Collision, multiple `domain_default`, `domain_default: false`.
    Constraint,
    /// Unknown action key, unknown origin scheme.
    Emitter,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Input => "input",
            Kind::Schema => "schema",
            Kind::Constraint => "constraint",
            Kind::Emitter => "emitter",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: Kind,
    pub severity: Severity,
    pub message: String,
    pub file: Option<PathBuf>,
    pub rule_id: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Fatal,
            message: message.into(),
            file: None,
            rule_id: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(Kind::Input, message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(Kind::Schema, message)
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(Kind::Constraint, message)
    }

    pub fn emitter(message: impl Into<String>) -> Self {
        Self::new(Kind::Emitter, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.kind)?;
        if let Some(file) = &self.file {
            write!(f, "{}: ", file.display())?;
        }
        if let Some(rule_id) = &self.rule_id {
            write!(f, "({rule_id}) ")?;
        }
        write!(f, "{}", self.message)
    }
}

/// A batch of diagnostics accumulated by a pipeline phase.
#[derive(Debug, Default)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.0.push(diag);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diag in &self.0 {
            writeln!(f, "{diag}")?;
        }
        Ok(())
    }
}

/// Errors raised by the `input`-kind phase: these abort the run immediately
/// rather than being accumulated alongside schema/constraint/emitter faults.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to read rules file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML document in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_norway::Error,
    },
    #[error("no files matched glob pattern {pattern}")]
    EmptyGlob { pattern: String },
    #[error("invalid glob pattern {pattern}: {source}")]
    BadGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("unsupported schema_version {version} in {path} (only version 1 is defined)")]
    UnsupportedSchemaVersion { path: PathBuf, version: u64 },
    #[error("globals file {path} must contain exactly one YAML document, found {count}")]
    GlobalsDocumentCount { path: PathBuf, count: usize },
}
