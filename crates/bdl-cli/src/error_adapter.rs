//! Error adapter for converting BdlError to miette diagnostics.
//!
//! This module provides the bridge between the library's standard error types
//! and miette's rich diagnostic formatting used in the CLI.
//!
//! # Multi-Error Support
//!
//! When a [`bdl::ParseError`] contains multiple diagnostics, each diagnostic
//! is rendered independently. Labels pointing into another unit than the
//! primary label (a conflict with an included declaration, for instance)
//! are rendered as related advice with their own source.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, NamedSource, Severity, SourceSpan};

use bdl::BdlError;
use bdl_parser::{
    Context, Span,
    error::{Diagnostic, Label, Severity as BdlSeverity},
};

type Source = NamedSource<String>;

fn source_of(context: Option<&Context>) -> Option<Source> {
    let context = context?;
    let content = context.content()?;
    Some(NamedSource::new(context.display_path(), content.into_owned()))
}

fn context_of(label: &Label) -> Option<&Context> {
    label.context().map(|context| &**context)
}

fn same_source(a: Option<&Context>, b: Option<&Context>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.display_path() == b.display_path(),
        (None, None) => true,
        _ => false,
    }
}

/// Adapter for a single BDL diagnostic.
///
/// The source shown is the one the primary label points into.
pub struct DiagnosticAdapter<'a> {
    diag: &'a Diagnostic,
    src: Option<Source>,
    labels: Vec<&'a Label>,
    notes: Vec<NoteAdapter<'a>>,
}

impl<'a> DiagnosticAdapter<'a> {
    /// Create a new diagnostic adapter.
    pub fn new(diag: &'a Diagnostic) -> Self {
        let primary = diag
            .primary_label()
            .or_else(|| diag.labels().first())
            .and_then(context_of);

        let (labels, others): (Vec<&Label>, Vec<&Label>) = diag
            .labels()
            .iter()
            .partition(|label| same_source(context_of(label), primary));

        Self {
            diag,
            src: source_of(primary),
            labels,
            notes: others.into_iter().map(NoteAdapter::new).collect(),
        }
    }
}

impl fmt::Debug for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticAdapter")
            .field("diag", &self.diag)
            .finish()
    }
}

impl fmt::Display for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.diag.message())
    }
}

impl std::error::Error for DiagnosticAdapter<'_> {}

impl MietteDiagnostic for DiagnosticAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diag
            .code()
            .map(|c| Box::new(c) as Box<dyn fmt::Display>)
    }

    fn severity(&self) -> Option<Severity> {
        Some(match self.diag.severity() {
            BdlSeverity::Error => Severity::Error,
            BdlSeverity::Warning => Severity::Warning,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diag
            .help()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.src.as_ref().map(|src| src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        if self.labels.is_empty() || self.src.is_none() {
            return None;
        }

        Some(Box::new(self.labels.iter().map(|label| {
            let span = span_to_miette(label.span());
            let message = Some(label.message().to_string());
            if label.is_primary() {
                LabeledSpan::new_primary_with_span(message, span)
            } else {
                LabeledSpan::new_with_span(message, span)
            }
        })))
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn MietteDiagnostic> + 'a>> {
        if self.notes.is_empty() {
            return None;
        }
        Some(Box::new(
            self.notes.iter().map(|note| note as &dyn MietteDiagnostic),
        ))
    }
}

/// A label located in another source than its diagnostic.
pub struct NoteAdapter<'a> {
    label: &'a Label,
    src: Option<Source>,
}

impl<'a> NoteAdapter<'a> {
    fn new(label: &'a Label) -> Self {
        Self {
            label,
            src: source_of(context_of(label)),
        }
    }
}

impl fmt::Debug for NoteAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteAdapter")
            .field("label", &self.label)
            .finish()
    }
}

impl fmt::Display for NoteAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label.message())
    }
}

impl std::error::Error for NoteAdapter<'_> {}

impl MietteDiagnostic for NoteAdapter<'_> {
    fn severity(&self) -> Option<Severity> {
        Some(Severity::Advice)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.src.as_ref().map(|src| src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        self.src.as_ref()?;
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            None,
            span_to_miette(self.label.span()),
        ))))
    }
}

/// Adapter for non-diagnostic [`BdlError`] variants.
///
/// This adapter handles errors that don't have rich diagnostic information,
/// such as I/O, grammar, cache and configuration errors.
pub struct ErrorAdapter<'a>(pub &'a BdlError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            BdlError::Io { .. } => "bdl::io",
            BdlError::Parse(_) => return None,
            BdlError::Grammar(_) => "bdl::grammar",
            BdlError::Cache { .. } => "bdl::cache",
            BdlError::Config(_) => "bdl::config",
        };
        Some(Box::new(code))
    }
}

/// A reportable error that can be rendered by miette.
///
/// This enum wraps either a single diagnostic or a non-diagnostic error,
/// providing a uniform interface for error rendering.
#[derive(Debug)]
pub enum Reportable<'a> {
    /// A rich diagnostic with source location information.
    Diagnostic(DiagnosticAdapter<'a>),
    /// A simple error without source location.
    Error(ErrorAdapter<'a>),
}

impl fmt::Display for Reportable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reportable::Diagnostic(d) => fmt::Display::fmt(d, f),
            Reportable::Error(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Reportable<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reportable::Diagnostic(_) => None,
            Reportable::Error(e) => e.source(),
        }
    }
}

impl MietteDiagnostic for Reportable<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.code(),
            Reportable::Error(e) => e.code(),
        }
    }

    fn severity(&self) -> Option<Severity> {
        match self {
            Reportable::Diagnostic(d) => d.severity(),
            Reportable::Error(e) => e.severity(),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.help(),
            Reportable::Error(e) => e.help(),
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Reportable::Diagnostic(d) => d.source_code(),
            Reportable::Error(e) => e.source_code(),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Reportable::Diagnostic(d) => d.labels(),
            Reportable::Error(e) => e.labels(),
        }
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn MietteDiagnostic> + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.related(),
            Reportable::Error(e) => e.related(),
        }
    }
}

/// Convert a BDL [`Span`] to a miette [`SourceSpan`].
fn span_to_miette(span: Span) -> SourceSpan {
    SourceSpan::new(span.start().into(), span.len())
}

/// Convert a [`BdlError`] into a list of reportable errors.
///
/// For [`BdlError::Parse`], this returns one [`Reportable`] for each
/// diagnostic in the error. For other error variants, this returns a
/// single [`Reportable`].
pub fn to_reportables(err: &BdlError) -> Vec<Reportable<'_>> {
    match err {
        BdlError::Parse(parse_err) => parse_err
            .diagnostics()
            .iter()
            .map(|d| Reportable::Diagnostic(DiagnosticAdapter::new(d)))
            .collect(),
        _ => vec![Reportable::Error(ErrorAdapter(err))],
    }
}

/// Render a [`BdlError`] in the plain `path:line:column` tooling format.
pub fn render_plain(err: &BdlError) -> String {
    match err {
        BdlError::Parse(parse_err) => parse_err.render(),
        _ => format!("error: {err}"),
    }
}
