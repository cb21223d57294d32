//! Diagnostics for the WL compiler.
//!
//! A diagnostic is a single fatal error: one position, one message,
//! and a stable error code. The first diagnostic aborts the
//! compilation; there is no recovery and no secondary labels.

use std::fmt;

use crate::source::{Position, SourceMap};

/// Stable error codes, one per error kind in the taxonomy.
pub mod codes {
    pub const UNEXPECTED_CHARACTER: &str = "E0001";
    pub const UNTERMINATED_STRING: &str = "E0002";
    pub const UNEXPECTED_TOKEN: &str = "E0003";
    pub const FILE_READ_FAILED: &str = "E0004";
    pub const IMPORT_FAILED: &str = "E0005";
    pub const DUPLICATE_DECLARATION: &str = "E0006";
    pub const DUPLICATE_FIELD: &str = "E0007";
    pub const UNDECLARED: &str = "E0008";
    pub const UNDECLARED_TYPE: &str = "E0009";
    pub const BREAK_OUTSIDE_LOOP: &str = "E0010";
    pub const OPERATOR_NOT_IMPLEMENTED: &str = "E0011";
    pub const RETURN_TYPE_MISMATCH: &str = "E0012";
    pub const MISSING_RETURN: &str = "E0013";
    pub const FIELD_MISMATCH: &str = "E0014";
    pub const ARITY_MISMATCH: &str = "E0015";
    pub const ARGUMENT_TYPE_MISMATCH: &str = "E0016";
    pub const ILLEGAL_CAST: &str = "E0017";
}

/// A single error produced by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub position: Position,
    pub code: Option<&'static str>,
    pub message: String,
}

impl Diagnostic {
    /// Create a new error diagnostic at the given position.
    pub fn error(message: impl Into<String>, position: Position) -> Diagnostic {
        Diagnostic {
            position,
            code: None,
            message: message.into(),
        }
    }

    /// Attach an error code (for example, `codes::UNDECLARED`).
    pub fn with_code(mut self, code: &'static str) -> Diagnostic {
        self.code = Some(code);
        self
    }

    /// Render as `<filename>:<line>: error: <message>`.
    pub fn render(&self, sources: &SourceMap) -> String {
        format!(
            "{}:{}: error: {}",
            sources.name(self.position.file),
            self.position.line,
            self.message
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Filename resolution needs a SourceMap; see `render`.
        write!(f, "line {}: error: {}", self.position.line, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn renders_with_filename_and_line() {
        let mut sm = SourceMap::new();
        let file = sm.add(PathBuf::from("main.wl"), String::new());
        let diag = Diagnostic::error("undeclared identifier `x`", Position::new(file, 3))
            .with_code(codes::UNDECLARED);
        assert_eq!(
            diag.render(&sm),
            "main.wl:3: error: undeclared identifier `x`"
        );
    }
}
