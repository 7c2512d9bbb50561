//! Collector for accumulating diagnostics during a processing phase.
//!
//! The [`DiagnosticCollector`] lets independent checks (one per declaration,
//! one per composition instance) all report before the phase fails.

use crate::error::{Diagnostic, ParseError};

/// A collector for accumulating diagnostics during a processing phase.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    has_errors: bool,
}

impl DiagnosticCollector {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a diagnostic to this collector.
    ///
    /// The diagnostic is added to the collection and if it's an error,
    /// the collector is marked as having errors.
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity().is_error() {
            self.has_errors = true;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Emit every diagnostic of a failed phase.
    pub fn extend(&mut self, error: ParseError) {
        for diagnostic in error.into_diagnostics() {
            self.emit(diagnostic);
        }
    }

    /// Record the error of `result`, if any, and return its value.
    pub fn check<T>(&mut self, result: Result<T, Diagnostic>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(diagnostic) => {
                self.emit(diagnostic);
                None
            }
        }
    }

    /// Whether any error was emitted so far.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Finish collection and return a result.
    ///
    /// - If there are errors, returns `Err(ParseError)` with all diagnostics.
    /// - If there are no errors, returns `Ok(())`.
    ///
    /// Note: Warnings are currently discarded in the success case.
    pub fn finish(self) -> Result<(), ParseError> {
        if self.has_errors {
            Err(ParseError::new(self.diagnostics))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorCode, span::Span};

    #[test]
    fn test_collector_new_finish_ok() {
        let collector = DiagnosticCollector::new();
        assert!(collector.finish().is_ok());
    }

    #[test]
    fn test_collector_emit_warning_finish_ok() {
        let mut collector = DiagnosticCollector::new();

        collector.emit(Diagnostic::warning("test warning"));

        assert!(!collector.has_errors());
        assert!(collector.finish().is_ok());
    }

    #[test]
    fn test_collector_check_records_errors() {
        let mut collector = DiagnosticCollector::new();

        let ok: Option<u32> = collector.check(Ok(3));
        let failed: Option<u32> = collector.check(Err(Diagnostic::error("bad")
            .with_code(ErrorCode::E300)
            .with_label(Span::new(10..20), "here")));

        assert_eq!(ok, Some(3));
        assert_eq!(failed, None);
        let err = collector.finish().unwrap_err();
        assert_eq!(err.diagnostics().len(), 1);
        assert_eq!(err.diagnostics()[0].message(), "bad");
    }

    #[test]
    fn test_collector_extend() {
        let mut collector = DiagnosticCollector::new();

        collector.extend(ParseError::new(vec![
            Diagnostic::error("error 1"),
            Diagnostic::error("error 2"),
        ]));

        assert_eq!(collector.finish().unwrap_err().diagnostics().len(), 2);
    }
}
