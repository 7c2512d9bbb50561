//! The parser driver.
//!
//! The driver walks the input with a cursor into the element tree. At each
//! offset it tries the pre-grammar (whitespace and comments) and then the
//! grammar list of the current element. The first item that matches
//! consumes its text, merges its attributes and moves the cursor according
//! to its [`Action`].

use std::sync::Arc;

use log::{debug, trace};

use crate::{
    context::Context,
    element::{Attribute, Element, Sequence},
    error::{Diagnostic, ErrorCode, ParseError},
    grammar::{Action, Grammar, GrammarId, GrammarItem},
    span::Span,
};

/// Number of consecutive empty matches tolerated before giving up.
const MAX_EMPTY_MATCHES: usize = 64;

/// One step of the cursor: the sequence name (none for the root) and the
/// element index inside it.
#[derive(Debug, Clone)]
struct Step {
    sequence: Option<String>,
    index: usize,
}

/// Parses text against a [`Grammar`].
#[derive(Debug, Clone, Copy)]
pub struct Parser<'g> {
    grammar: &'g Grammar,
}

impl<'g> Parser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self { grammar }
    }

    /// Parse `content`, attributing every element to `context`.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when no item matches at some offset, when
    /// the grammar stops making progress, or when the input ends inside an
    /// unfinished construct.
    pub fn parse(&self, content: &str, context: &Arc<Context>) -> Result<Sequence, ParseError> {
        let mut state = State::new(self.grammar, context);
        let mut offset = 0;
        let mut empty_matches = 0;

        while offset < content.len() {
            let rest = &content[offset..];
            let Some((item, captures)) = self.find(state.current_grammar(), rest) else {
                return Err(syntax_error(context, offset, "Invalid syntax.", ErrorCode::E100));
            };

            let matched = captures.get(0).map_or(0..0, |m| m.range());
            let span = Span::new(offset + matched.start..offset + matched.end);
            let attrs = item
                .pattern()
                .group_names()
                .filter_map(|name| {
                    captures.name(name).map(|value| {
                        let range = value.range();
                        (
                            name.to_string(),
                            Attribute::new(
                                value.as_str(),
                                Span::new(offset + range.start..offset + range.end),
                            ),
                        )
                    })
                })
                .collect::<Vec<_>>();

            trace!(offset, pattern = item.pattern().as_str(); "Matched grammar item");
            state
                .apply(item, span, attrs)
                .map_err(|message| syntax_error(context, offset, &message, ErrorCode::E102))?;

            if matched.is_empty() {
                empty_matches += 1;
                if empty_matches > MAX_EMPTY_MATCHES {
                    return Err(syntax_error(
                        context,
                        offset,
                        "The grammar does not make progress.",
                        ErrorCode::E102,
                    ));
                }
            } else {
                empty_matches = 0;
                offset += matched.end;
            }
        }

        if !state.is_complete() {
            return Err(syntax_error(
                context,
                content.len(),
                "Unexpected end of input.",
                ErrorCode::E101,
            ));
        }

        debug!(source = context.display_path(); "Parsed source");
        Ok(state.root)
    }

    fn find<'t>(
        &self,
        current: Option<GrammarId>,
        text: &'t str,
    ) -> Option<(&'g GrammarItem, regex::Captures<'t>)> {
        let grammar = self.grammar;
        grammar
            .pre()
            .into_iter()
            .chain(current)
            .flat_map(move |id| grammar.items(id))
            .find_map(|item| item.captures(text).map(|captures| (item, captures)))
    }
}

fn syntax_error(
    context: &Arc<Context>,
    offset: usize,
    message: &str,
    code: ErrorCode,
) -> ParseError {
    Diagnostic::error(message)
        .with_code(code)
        .with_label(Span::new(offset..offset), "here")
        .in_context(context)
        .into()
}

/// The tree being built and the cursor into it.
struct State<'c> {
    root: Sequence,
    cursor: Vec<Step>,
    context: &'c Arc<Context>,
}

impl<'c> State<'c> {
    fn new(grammar: &Grammar, context: &'c Arc<Context>) -> Self {
        let mut root = Sequence::new();
        root.grammar = Some(grammar.root());
        let index = root.push(Element::with_grammar(Some(grammar.root()), context));
        Self {
            root,
            cursor: vec![Step {
                sequence: None,
                index,
            }],
            context,
        }
    }

    fn current_grammar(&mut self) -> Option<GrammarId> {
        self.element().and_then(|element| element.grammar)
    }

    /// At root depth with nothing but comments pending.
    fn is_complete(&mut self) -> bool {
        if self.cursor.len() != 1 {
            return false;
        }
        self.element().is_none_or(|element| {
            element.attrs().all(|(name, _)| name == "comment")
                && element.sequences().all(|(_, sequence)| sequence.is_empty())
        })
    }

    fn element(&mut self) -> Option<&mut Element> {
        element_at(&mut self.root, &self.cursor)
    }

    fn sequence(&mut self) -> Option<&mut Sequence> {
        sequence_at(&mut self.root, &self.cursor)
    }

    fn apply(
        &mut self,
        item: &GrammarItem,
        span: Span,
        captured: Vec<(String, Attribute)>,
    ) -> Result<(), String> {
        let next = item.continuation();
        let action = item.get_action();
        if *action == Action::Skip {
            return Ok(());
        }

        let context = self.context;
        let element = self.element().ok_or("The parser lost track of its position.")?;
        match action {
            Action::Comment | Action::BlockComment => {
                for (name, attr) in captured {
                    if name == "comment" {
                        let block = *action == Action::BlockComment;
                        merge_comment(element, attr, block);
                    } else {
                        element.set_attr(name, attr);
                    }
                }
                return Ok(());
            }
            _ => {
                for (name, value) in item.fixed_attrs() {
                    element.set_attr(name, Attribute::new(value, span));
                }
                for (name, attr) in captured {
                    element.set_attr(name, attr);
                }
            }
        }

        match action {
            Action::Skip | Action::Comment | Action::BlockComment => {}
            Action::Append => {
                if next.is_some() {
                    element.grammar = next;
                }
            }
            Action::NewElement => self.new_sibling(next)?,
            Action::ParentElement => {
                self.parent()?;
                if next.is_some() {
                    let parent = self.element().ok_or("The parser lost track of its position.")?;
                    parent.grammar = next;
                }
            }
            Action::NestedStart(name) => {
                let sequence = element.sequence_entry(name);
                if next.is_some() {
                    sequence.grammar = next;
                }
                let grammar = sequence.grammar;
                let index = sequence.push(Element::with_grammar(grammar, context));
                self.cursor.push(Step {
                    sequence: Some(name.clone()),
                    index,
                });
            }
            Action::NestedStopNewElement => {
                self.parent()?;
                self.new_sibling(next)?;
            }
        }
        Ok(())
    }

    fn parent(&mut self) -> Result<(), String> {
        if self.cursor.len() < 2 {
            return Err("Unbalanced grammar: the root sequence has no parent.".to_string());
        }
        self.cursor.pop();
        Ok(())
    }

    fn new_sibling(&mut self, next: Option<GrammarId>) -> Result<(), String> {
        let context = self.context;
        let sequence = self.sequence().ok_or("The parser lost track of its position.")?;
        let grammar = next.or(sequence.grammar);
        let index = sequence.push(Element::with_grammar(grammar, context));
        if let Some(step) = self.cursor.last_mut() {
            step.index = index;
        }
        Ok(())
    }
}

fn element_at<'s>(root: &'s mut Sequence, cursor: &[Step]) -> Option<&'s mut Element> {
    let (first, rest) = cursor.split_first()?;
    let mut element = root.get_mut(first.index)?;
    for step in rest {
        let name = step.sequence.as_deref()?;
        element = element.sequence_mut(name)?.get_mut(step.index)?;
    }
    Some(element)
}

fn sequence_at<'s>(root: &'s mut Sequence, cursor: &[Step]) -> Option<&'s mut Sequence> {
    let (last, owner) = cursor.split_last()?;
    if owner.is_empty() {
        return Some(root);
    }
    let name = last.sequence.as_deref()?;
    element_at(root, owner)?.sequence_mut(name)
}

/// Append a comment to the element, one paragraph per comment.
fn merge_comment(element: &mut Element, attr: Attribute, block: bool) {
    let mut text = attr.value().to_string();
    if block {
        text = text
            .lines()
            .map(strip_block_prefix)
            .collect::<Vec<_>>()
            .join("\n");
    }
    let text = dedent(&text);

    let merged = match element.attr("comment") {
        Some(previous) => Attribute::new(
            format!("{}\n{}", previous.value(), text),
            previous.span().union(attr.span()),
        ),
        None => Attribute::new(text, attr.span()),
    };
    element.set_attr("comment", merged);
}

/// Remove leading `*` decorations of a block comment line.
fn strip_block_prefix(line: &str) -> &str {
    let mut rest = line;
    loop {
        let trimmed = rest.trim_start();
        match trimmed.strip_prefix('*') {
            Some(stripped) => rest = stripped,
            None => return rest,
        }
    }
}

/// Remove the common indentation and the surrounding blank lines.
fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    let body: Vec<&str> = lines
        .iter()
        .map(|line| line.get(indent..).unwrap_or("").trim_end())
        .collect();
    body.join("\n").trim_matches('\n').to_string()
}
