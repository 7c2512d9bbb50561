//! Labeled source spans for diagnostic messages.

use std::sync::Arc;

use crate::{context::Context, span::Span};

/// A labeled span in source code.
///
/// - **Primary labels** mark the main location of an error or warning.
/// - **Secondary labels** provide additional context, such as the other side
///   of a symbol conflict.
///
/// A label optionally knows the [`Context`] its span points into. Labels
/// without one are attached to a context later through
/// [`Diagnostic::in_context`](crate::error::Diagnostic::in_context).
#[derive(Debug, Clone)]
pub struct Label {
    span: Span,
    message: String,
    is_primary: bool,
    context: Option<Arc<Context>>,
}

impl Label {
    /// Create a new primary label.
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            is_primary: true,
            context: None,
        }
    }

    /// Create a new secondary label.
    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            is_primary: false,
            context: None,
        }
    }

    /// Attach the source context this label points into.
    pub fn with_context(mut self, context: Arc<Context>) -> Self {
        self.context = Some(context);
        self
    }

    /// Get the span this label applies to.
    pub fn span(&self) -> Span {
        self.span
    }

    /// Get the label message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source context, if known.
    pub fn context(&self) -> Option<&Arc<Context>> {
        self.context.as_ref()
    }

    /// Check if this is a primary label.
    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    /// Check if this is a secondary label.
    pub fn is_secondary(&self) -> bool {
        !self.is_primary
    }

    pub(crate) fn set_context_if_missing(&mut self, context: &Arc<Context>) {
        if self.context.is_none() {
            self.context = Some(Arc::clone(context));
        }
    }
}
