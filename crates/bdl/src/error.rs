//! Error types for BDL operations.
//!
//! This module provides the main error type [`BdlError`] which wraps the
//! conditions that can occur while compiling and composing BDL units.

use std::{io, path::PathBuf};

use thiserror::Error;

use bdl_parser::{Diagnostic, ParseError, grammar::GrammarError};

/// The main error type for BDL operations.
///
/// # Diagnostic Variants
///
/// The `Parse` variant carries every diagnostic of a failed phase, each with
/// labels pointing into the sources involved. Use
/// [`ParseError::render`] for the plain tooling format.
#[derive(Debug, Error)]
pub enum BdlError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("Grammar error: {0}")]
    Grammar(#[from] GrammarError),

    #[error("Cache error on '{path}': {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BdlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn cache(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Cache {
            path: path.into(),
            source,
        }
    }

    /// The diagnostics carried by this error, if it is a compilation error.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Parse(err) => err.diagnostics(),
            _ => &[],
        }
    }
}

impl From<Diagnostic> for BdlError {
    fn from(diagnostic: Diagnostic) -> Self {
        Self::Parse(diagnostic.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_converts_to_parse_error() {
        let err = BdlError::from(Diagnostic::error("Invalid syntax."));

        assert_eq!(err.diagnostics().len(), 1);
        assert_eq!(err.diagnostics()[0].message(), "Invalid syntax.");
    }

    #[test]
    fn test_io_error_display() {
        let err = BdlError::io("unit.bdl", io::Error::new(io::ErrorKind::NotFound, "missing"));

        assert_eq!(err.to_string(), "I/O error on 'unit.bdl': missing");
        assert!(err.diagnostics().is_empty());
    }
}
