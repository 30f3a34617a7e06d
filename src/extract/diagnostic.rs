//! Diagnostic types for structural parsing.
//!
//! Diagnostics represent non-fatal issues discovered while scanning a source
//! unit. A malformed declaration is excluded from the output and recorded
//! here rather than aborting extraction of the rest of the file.

use serde::{Deserialize, Serialize};

/// Diagnostic information produced while parsing one source unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseDiagnostic {
    /// A declaration that was excluded from the output (malformed
    /// identifier, duplicate identifier, etc.). Extraction continues.
    Warning(String),

    /// A per-test hard error: the declaration was found but cannot be
    /// placed (e.g. unbalanced braces prevent container-path recovery).
    /// The engine refuses to guess a container.
    Error(String),
}

impl ParseDiagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Warning(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl std::fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning(msg) => write!(f, "Warning: {msg}"),
            Self::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}
