use std::path::PathBuf;

use thiserror::Error;

// GenError covers every way a single generation request can fail.
// None of these are retried; the caller fixes the input and runs again.
#[derive(Debug, Error, PartialEq)]
pub enum GenError {
    #[error("template not found: {}: {reason}", path.display())]
    TemplateNotFound { path: PathBuf, reason: String },

    #[error("malformed placeholder in {source_label} at line {line}, column {column}: {reason}")]
    MalformedPlaceholder {
        source_label: String,
        line: usize,
        column: usize,
        reason: String,
    },

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("unresolved placeholder: {{{0}}} has no manifest entry")]
    UnresolvedPlaceholder(String),

    #[error("emitted descriptor still contains the marker {0}")]
    EmissionInvariantViolated(String),

    #[error("invalid project: {0}")]
    InvalidProject(String),
}

impl GenError {
    // Process exit code for this error kind. 1 is left for untyped failures
    // and 2 for clap usage errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            GenError::TemplateNotFound { .. } => 3,
            GenError::MalformedPlaceholder { .. } => 4,
            GenError::InvalidManifest(_) => 5,
            GenError::UnresolvedPlaceholder(_) => 6,
            GenError::EmissionInvariantViolated(_) => 7,
            GenError::InvalidProject(_) => 8,
        }
    }
}
