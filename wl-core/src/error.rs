use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic::Diagnostic;

/// Outer error type for the wl-core pipeline.
///
/// Language-level errors travel as `Diagnostic` values; this wrapper
/// adds the I/O failures that can happen before a position exists.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source {path}: {source}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Diagnostic(Diagnostic),
}

impl From<Diagnostic> for CoreError {
    fn from(diagnostic: Diagnostic) -> CoreError {
        CoreError::Diagnostic(diagnostic)
    }
}
