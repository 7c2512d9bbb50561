//! The core diagnostic type.
//!
//! A [`Diagnostic`] represents a single error or warning with an optional
//! error code, labeled source spans and help text.

use std::{fmt, sync::Arc};

use crate::{
    context::Context,
    error::{Severity, error_code::ErrorCode, label::Label},
    span::Span,
};

/// A rich diagnostic message with source location information.
///
/// # Example
///
/// ```text
/// unit.bdl:3:5: error: Symbol 'Foo' could not be resolved.
/// component Hello {
///     a = Foo;
///     ^
/// ```
#[derive(Debug, Clone)]
pub struct Diagnostic {
    severity: Severity,
    code: Option<ErrorCode>,
    message: String,
    labels: Vec<Label>,
    help: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    ///
    /// # Example
    ///
    /// ```
    /// # use bdl_parser::error::{Diagnostic, ErrorCode};
    /// # use bdl_parser::Span;
    ///
    /// let diag = Diagnostic::error("Symbol 'Foo' could not be resolved.")
    ///     .with_code(ErrorCode::E200)
    ///     .with_label(Span::new(0..3), "unknown symbol")
    ///     .with_help("did you mean 'Float'?");
    /// ```
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Create a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Get the severity of this diagnostic.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Get the error code, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    /// Get the primary message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get all labels attached to this diagnostic.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// The primary label, if any.
    pub fn primary_label(&self) -> Option<&Label> {
        self.labels.iter().find(|label| label.is_primary())
    }

    /// Get the help text, if any.
    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Set the error code.
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Add a primary label to this diagnostic.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::primary(span, message));
        self
    }

    /// Add a secondary label to this diagnostic.
    pub fn with_secondary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::secondary(span, message));
        self
    }

    /// Add a prebuilt label, typically one pointing into another source.
    pub fn with_labeled(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    /// Set the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Attach `context` to every label that does not know its source yet.
    pub fn in_context(mut self, context: &Arc<Context>) -> Self {
        for label in &mut self.labels {
            label.set_context_if_missing(context);
        }
        self
    }

    /// Create a new diagnostic with the given severity and message.
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            help: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Format: "error[E100]: message" or "error: message"
        write!(f, "{}", self.severity)?;
        if let Some(code) = self.code {
            write!(f, "[{}]", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_new() {
        let diag = Diagnostic::new(Severity::Error, "test error");

        assert!(diag.severity().is_error());
        assert_eq!(diag.message(), "test error");
        assert!(diag.code().is_none());
        assert!(diag.labels().is_empty());
        assert!(diag.help().is_none());
    }

    #[test]
    fn test_diagnostic_with_secondary_label() {
        let diag = Diagnostic::error("duplicate definition")
            .with_label(Span::new(10..20), "duplicate here")
            .with_secondary_label(Span::new(5..15), "first defined here");

        assert_eq!(diag.labels().len(), 2);
        assert!(diag.labels()[0].is_primary());
        assert!(diag.labels()[1].is_secondary());
        assert_eq!(diag.primary_label().map(Label::message), Some("duplicate here"));
    }

    #[test]
    fn test_diagnostic_display_with_code() {
        let diag = Diagnostic::error("Invalid syntax.").with_code(ErrorCode::E100);

        assert_eq!(diag.to_string(), "error[E100]: Invalid syntax.");
    }

    #[test]
    fn test_in_context_keeps_existing_contexts() {
        let first = Context::from_content("a", None);
        let second = Context::from_content("b", None);
        let diag = Diagnostic::error("conflict")
            .with_label(Span::new(0..1), "here")
            .with_labeled(
                Label::secondary(Span::new(0..1), "there").with_context(Arc::clone(&second)),
            )
            .in_context(&first);

        let contexts: Vec<_> = diag
            .labels()
            .iter()
            .filter_map(|label| label.context())
            .collect();
        assert_eq!(contexts.len(), 2);
        assert!(Arc::ptr_eq(contexts[0], &first));
        assert!(Arc::ptr_eq(contexts[1], &second));
    }
}
