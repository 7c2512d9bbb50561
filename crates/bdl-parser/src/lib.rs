//! # BDL Parser
//!
//! A regex-driven grammar engine producing a positioned element tree.
//!
//! A [`Grammar`](grammar::Grammar) is assembled once with a
//! [`GrammarBuilder`](grammar::GrammarBuilder); the [`Parser`] then turns
//! source text into a [`Sequence`] of [`Element`]s. Elements carry named
//! attributes with byte spans, named nested sequences and the
//! [`Context`] they came from, so later phases can report errors against
//! the original text.
//!
//! ## Usage
//!
//! ```
//! # use bdl_parser::{Context, Parser};
//! # use bdl_parser::grammar::{Action, GrammarBuilder, GrammarItem};
//! let mut builder = GrammarBuilder::new();
//! let end = builder.list([GrammarItem::new(";").unwrap().action(Action::NewElement)]);
//! let value = builder.list([GrammarItem::new(r"(?P<value>[0-9]+)").unwrap().then(end)]);
//! let root = builder.list([GrammarItem::new(r"(?P<name>[a-z]+)\s*=").unwrap().then(value)]);
//! let space = builder.list([GrammarItem::new(r"\s+").unwrap().action(Action::Skip)]);
//! let grammar = builder.build(root, Some(space)).unwrap();
//!
//! let context = Context::from_content("a = 1; b = 2;", None);
//! let sequence = Parser::new(&grammar)
//!     .parse("a = 1; b = 2;", &context)
//!     .unwrap();
//! assert_eq!(sequence.len(), 2);
//! ```

pub mod context;
pub mod element;
pub mod error;
pub mod grammar;
mod parser;
mod span;

pub use context::{Context, ContextData, Location};
pub use element::{Attribute, Element, ElementBuilder, ElementData, Sequence, SequenceBuilder};
pub use error::{Diagnostic, ParseError};
pub use parser::Parser;
pub use span::Span;
