//! The error a failed BDL phase returns.
//!
//! Parsing a unit, registering its declarations, resolving them and
//! elaborating a composition target each stop at the end of the phase, not
//! at the first problem. [`ParseError`] carries everything the phase found.

use std::fmt;

use crate::error::Diagnostic;

/// Result of a check that fails with a single diagnostic.
pub type Result<T> = std::result::Result<T, Diagnostic>;

/// Every diagnostic of a failed phase, in the order they were found.
#[derive(Debug, Clone)]
pub struct ParseError {
    diagnostics: Vec<Diagnostic>,
}

impl ParseError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// One `path:line:column` report per diagnostic, for build tools.
    pub fn render(&self) -> String {
        self.diagnostics
            .iter()
            .map(Diagnostic::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The first diagnostic, with a count of the others.
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(first) = self.diagnostics.first() else {
            return Ok(());
        };
        write!(f, "{first}")?;
        match self.diagnostics.len() {
            1 => Ok(()),
            count => write!(f, " (+{} more)", count - 1),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<Diagnostic> for ParseError {
    fn from(diagnostic: Diagnostic) -> Self {
        Self::new(vec![diagnostic])
    }
}

impl From<Vec<Diagnostic>> for ParseError {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self::new(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Context, Span, error::ErrorCode};

    #[test]
    fn test_single_resolution_failure() {
        let err = ParseError::from(
            Diagnostic::error("Symbol 'Integr' could not be resolved.").with_code(ErrorCode::E200),
        );

        assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E200));
        assert_eq!(err.to_string(), "error: Symbol 'Integr' could not be resolved.");
    }

    #[test]
    fn test_summary_counts_the_other_diagnostics() {
        let err = ParseError::new(vec![
            Diagnostic::error("Symbol 'Missing1' could not be resolved."),
            Diagnostic::error("Symbol 'Missing2' could not be resolved."),
            Diagnostic::error("The value 9 is lower than the minimum of 10."),
        ]);

        assert_eq!(
            err.to_string(),
            "error: Symbol 'Missing1' could not be resolved. (+2 more)"
        );
    }

    #[test]
    fn test_render_reports_each_location() {
        let context = Context::from_content("a = Missing1;\nb = Missing2;", None);
        let err = ParseError::new(vec![
            Diagnostic::error("Symbol 'Missing1' could not be resolved.")
                .with_label(Span::new(4..12), "here")
                .in_context(&context),
            Diagnostic::error("Symbol 'Missing2' could not be resolved.")
                .with_label(Span::new(18..26), "here")
                .in_context(&context),
        ]);

        let rendered = err.render();
        assert!(rendered.starts_with("<string>:1:5: error: Symbol 'Missing1'"), "{rendered}");
        assert!(rendered.contains("<string>:2:5: error: Symbol 'Missing2'"), "{rendered}");
    }
}
