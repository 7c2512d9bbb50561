//! Plain-text rendering of diagnostics for editors and build tools.
//!
//! Each located label renders as:
//!
//! ```text
//! path/to/unit.bdl:4:9: error: Symbol 'Foo' could not be resolved.
//!     component Hello {
//!         a = Foo;
//!             ^
//! ```
//!
//! The header is the line problem matchers look for. It is followed by the
//! previous source line (when there is one), the offending line and a caret
//! line. Positions are 1-based.

use crate::{
    context::{ANONYMOUS_SOURCE, locate_in},
    error::{Diagnostic, Label},
};

impl Diagnostic {
    /// Render this diagnostic in the `path:line:column: severity: message`
    /// format.
    ///
    /// The primary label comes first, secondary labels follow as `note`
    /// blocks carrying their own message. Without any located label only the
    /// header remains, reported against `<string>`.
    pub fn render(&self) -> String {
        let mut blocks = Vec::new();

        let mut labels: Vec<&Label> = self.labels().iter().filter(|l| l.is_primary()).collect();
        labels.extend(self.labels().iter().filter(|l| l.is_secondary()));

        for label in labels {
            let (kind, message) = if label.is_primary() {
                (self.severity().to_string(), self.message())
            } else {
                ("note".to_string(), label.message())
            };
            if let Some(block) = render_label(label, &kind, message) {
                blocks.push(block);
            }
        }

        if blocks.is_empty() {
            blocks.push(format!(
                "{ANONYMOUS_SOURCE}: {}: {}",
                self.severity(),
                self.message()
            ));
        }
        if let Some(help) = self.help() {
            blocks.push(format!("help: {help}"));
        }
        blocks.join("\n")
    }
}

fn render_label(label: &Label, kind: &str, message: &str) -> Option<String> {
    let context = label.context()?;
    let path = context.display_path();
    let Some(content) = context.content() else {
        return Some(format!("{path}: {kind}: {message}"));
    };

    let location = locate_in(&content, label.span().start());
    let lines: Vec<&str> = content.split('\n').collect();

    let mut output = vec![format!(
        "{path}:{}:{}: {kind}: {message}",
        location.line + 1,
        location.column + 1
    )];
    if let Some(previous) = location.line.checked_sub(1).and_then(|line| lines.get(line)) {
        output.push(previous.trim_end_matches('\r').to_string());
    }
    let current = lines
        .get(location.line)
        .copied()
        .unwrap_or_default()
        .trim_end_matches('\r');
    output.push(current.to_string());
    output.push(caret_line(current, location.column));

    Some(output.join("\n"))
}

/// Whitespace is kept so tabs line up with the source line.
fn caret_line(line: &str, column: usize) -> String {
    let mut caret: String = line
        .chars()
        .take(column)
        .map(|c| if c.is_whitespace() { c } else { ' ' })
        .collect();
    caret.push('^');
    caret
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{context::Context, span::Span};

    #[test]
    fn test_render_with_previous_line() {
        let context =
            Context::from_content("first\n\tsecond word\nthird", Some(PathBuf::from("a.bdl")));
        let diag = Diagnostic::error("Invalid syntax.")
            .with_label(Span::new(14..15), "here")
            .in_context(&context);

        assert_eq!(
            diag.render(),
            "a.bdl:2:9: error: Invalid syntax.\nfirst\n\tsecond word\n\t       ^"
        );
    }

    #[test]
    fn test_render_first_line_without_path() {
        let context = Context::from_content("abc def", None);
        let diag = Diagnostic::error("Invalid syntax.")
            .with_label(Span::new(4..5), "here")
            .in_context(&context);

        assert_eq!(
            diag.render(),
            "<string>:1:5: error: Invalid syntax.\nabc def\n    ^"
        );
    }

    #[test]
    fn test_render_secondary_label_as_note() {
        let first = Context::from_content("a = 1;", Some(PathBuf::from("one.bdl")));
        let second = Context::from_content("a = 2;", Some(PathBuf::from("two.bdl")));
        let diag = Diagnostic::error("Symbol name 'a' is in conflict...")
            .with_label(Span::new(0..1), "here")
            .with_labeled(
                Label::secondary(Span::new(0..1), "...with this one.").with_context(second),
            )
            .in_context(&first);

        let rendered = diag.render();
        assert!(rendered.starts_with("one.bdl:1:1: error: Symbol name 'a' is in conflict..."));
        assert!(rendered.contains("two.bdl:1:1: note: ...with this one."));
    }

    #[test]
    fn test_render_without_labels() {
        let diag =
            Diagnostic::error("Circular dependency detected.").with_help("check the includes");

        assert_eq!(
            diag.render(),
            "<string>: error: Circular dependency detected.\nhelp: check the includes"
        );
    }
}
