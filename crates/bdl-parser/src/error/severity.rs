//! How much a diagnostic weighs on a compilation.

use std::fmt;

/// Whether a diagnostic stops the phase that emitted it.
///
/// A [`DiagnosticCollector`] fails its phase once an [`Severity::Error`]
/// was emitted. Warnings never fail a phase on their own.
///
/// [`DiagnosticCollector`]: crate::error::DiagnosticCollector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Rejects the unit, or the composition target being elaborated.
    Error,

    /// Advisory; the unit still produces its artifact.
    Warning,
}

impl Severity {
    pub fn is_error(self) -> bool {
        matches!(self, Severity::Error)
    }

    /// The word used in `path:line:column: <severity>: message` reports.
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Context, Span,
        error::{Diagnostic, DiagnosticCollector},
    };

    #[test]
    fn test_report_prefix() {
        let context = Context::from_content("value = 2;", None);
        let diagnostic = Diagnostic::warning("Symbol 'value' is never used.")
            .with_label(Span::new(0..5), "here")
            .in_context(&context);

        assert_eq!(Severity::Error.as_str(), "error");
        assert!(
            diagnostic.render().starts_with("<string>:1:1: warning: "),
            "{}",
            diagnostic.render()
        );
    }

    #[test]
    fn test_only_errors_fail_a_phase() {
        let mut resolution = DiagnosticCollector::new();
        resolution.emit(Diagnostic::warning("Symbol 'unused' is never used."));
        assert!(!resolution.has_errors());
        assert!(resolution.finish().is_ok());

        let mut composition = DiagnosticCollector::new();
        composition.emit(Diagnostic::warning("Symbol 'unused' is never used."));
        composition.emit(Diagnostic::error("Executor 'core' could not be resolved."));
        let err = composition.finish().unwrap_err();
        let severities: Vec<_> = err.diagnostics().iter().map(Diagnostic::severity).collect();
        assert_eq!(severities, [Severity::Warning, Severity::Error]);
    }
}
