//! Grammar arena.
//!
//! A grammar is a set of ordered item lists stored in one arena and
//! addressed by [`GrammarId`]. Lists may include other lists, and items
//! may name the list that becomes active after they match. Both kinds of
//! reference can point forward: declare a list with
//! [`GrammarBuilder::declare`], reference it freely, and fill it later.
//! [`GrammarBuilder::build`] flattens includes and rejects cycles.
//!
//! ```
//! # use bdl_parser::grammar::{Action, GrammarBuilder, GrammarItem};
//! let mut builder = GrammarBuilder::new();
//! let root = builder.declare();
//! builder.push(root, GrammarItem::new(r"(?P<value>[0-9]+)").unwrap());
//! builder.push(root, GrammarItem::new(";").unwrap().action(Action::NewElement));
//! let grammar = builder.build(root, None).unwrap();
//! assert_eq!(grammar.items(grammar.root()).count(), 2);
//! ```

use std::{collections::HashSet, fmt};

use regex::{Captures, Regex};
use thiserror::Error;

/// Handle of an item list inside a grammar arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrammarId(usize);

impl GrammarId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for GrammarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors raised while assembling a grammar.
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("grammar list {0} does not belong to this grammar")]
    UnknownList(GrammarId),

    #[error("grammar list {0} includes itself")]
    IncludeCycle(GrammarId),
}

/// An anchored regular expression with optional reserved-word guards.
///
/// Patterns always match at the current offset. A guard rejects a match
/// when any dot-separated segment of the named capture group is one of the
/// reserved words.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
    reserved: Vec<(String, &'static [&'static str])>,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, GrammarError> {
        let regex = Regex::new(&format!(r"\A(?:{pattern})")).map_err(|source| {
            GrammarError::InvalidPattern {
                pattern: pattern.to_string(),
                source: Box::new(source),
            }
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            reserved: Vec::new(),
        })
    }

    /// Reject matches where `group` uses one of `words`.
    pub fn reserve(mut self, group: &str, words: &'static [&'static str]) -> Self {
        self.reserved.push((group.to_string(), words));
        self
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match at the start of `text`.
    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        let captures = self.regex.captures(text)?;
        let reserved = self.reserved.iter().any(|(group, words)| {
            captures.name(group).is_some_and(|value| {
                value
                    .as_str()
                    .split('.')
                    .any(|segment| words.contains(&segment))
            })
        });
        (!reserved).then_some(captures)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.captures(text).is_some()
    }

    pub(crate) fn group_names(&self) -> impl Iterator<Item = &str> {
        self.regex.capture_names().flatten()
    }
}

/// What the parser does with the cursor once an item matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Consume the text and keep the cursor where it is.
    Skip,
    /// Merge attributes into the current element.
    Append,
    /// Merge attributes, then start a new sibling element.
    NewElement,
    /// Merge attributes, then move to the element owning the current sequence.
    ParentElement,
    /// Merge attributes, then descend into the named nested sequence.
    NestedStart(String),
    /// Merge attributes, move to the parent and start a sibling of it.
    NestedStopNewElement,
    /// Accumulate a line comment on the current element.
    Comment,
    /// Accumulate a block comment on the current element.
    BlockComment,
}

/// One alternative of a grammar list.
#[derive(Debug, Clone)]
pub struct GrammarItem {
    pattern: Pattern,
    lookahead: Option<Pattern>,
    action: Action,
    attrs: Vec<(String, String)>,
    continuation: Option<GrammarId>,
}

impl GrammarItem {
    pub fn new(pattern: &str) -> Result<Self, GrammarError> {
        Ok(Self::from_pattern(Pattern::new(pattern)?))
    }

    pub fn from_pattern(pattern: Pattern) -> Self {
        Self {
            pattern,
            lookahead: None,
            action: Action::Append,
            attrs: Vec::new(),
            continuation: None,
        }
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    /// Set a fixed attribute whenever this item matches.
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    /// Grammar list active after this item matches.
    pub fn then(mut self, grammar: GrammarId) -> Self {
        self.continuation = Some(grammar);
        self
    }

    /// Only match when `lookahead` matches right after this item.
    pub fn followed_by(mut self, lookahead: Pattern) -> Self {
        self.lookahead = Some(lookahead);
        self
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn get_action(&self) -> &Action {
        &self.action
    }

    pub fn fixed_attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn continuation(&self) -> Option<GrammarId> {
        self.continuation
    }

    /// Match at the start of `text`, honoring the lookahead.
    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        let captures = self.pattern.captures(text)?;
        let end = captures.get(0).map_or(0, |m| m.end());
        match &self.lookahead {
            Some(lookahead) if !lookahead.is_match(&text[end..]) => None,
            _ => Some(captures),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Item(usize),
    Include(GrammarId),
}

/// Collects item lists before they are frozen into a [`Grammar`].
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    items: Vec<GrammarItem>,
    lists: Vec<Vec<Entry>>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an empty list so it can be referenced before it is filled.
    pub fn declare(&mut self) -> GrammarId {
        self.lists.push(Vec::new());
        GrammarId(self.lists.len() - 1)
    }

    /// Declare a list and fill it with `items`.
    pub fn list(&mut self, items: impl IntoIterator<Item = GrammarItem>) -> GrammarId {
        let id = self.declare();
        for item in items {
            self.push(id, item);
        }
        id
    }

    /// Append an item to a list.
    pub fn push(&mut self, list: GrammarId, item: GrammarItem) {
        self.items.push(item);
        let index = self.items.len() - 1;
        if let Some(entries) = self.lists.get_mut(list.0) {
            entries.push(Entry::Item(index));
        }
    }

    /// Append every item of `other`, as it stands at build time, to `list`.
    pub fn include(&mut self, list: GrammarId, other: GrammarId) {
        if let Some(entries) = self.lists.get_mut(list.0) {
            entries.push(Entry::Include(other));
        }
    }

    /// Freeze the arena.
    ///
    /// `pre` is tried before the active list at every step, typically to
    /// skip whitespace and comments.
    pub fn build(self, root: GrammarId, pre: Option<GrammarId>) -> Result<Grammar, GrammarError> {
        let count = self.lists.len();
        let known = |id: GrammarId| {
            if id.0 < count {
                Ok(id)
            } else {
                Err(GrammarError::UnknownList(id))
            }
        };
        known(root)?;
        if let Some(pre) = pre {
            known(pre)?;
        }
        for item in &self.items {
            if let Some(next) = item.continuation {
                known(next)?;
            }
        }

        let mut lists = Vec::with_capacity(count);
        for id in 0..count {
            let mut flat = Vec::new();
            let mut visiting = HashSet::new();
            self.flatten(GrammarId(id), &mut visiting, &mut flat)?;
            lists.push(flat);
        }

        log::debug!(lists = count, items = self.items.len(); "Grammar built");
        Ok(Grammar {
            items: self.items,
            lists,
            root,
            pre,
        })
    }

    fn flatten(
        &self,
        id: GrammarId,
        visiting: &mut HashSet<GrammarId>,
        out: &mut Vec<usize>,
    ) -> Result<(), GrammarError> {
        if !visiting.insert(id) {
            return Err(GrammarError::IncludeCycle(id));
        }
        let entries = self.lists.get(id.0).ok_or(GrammarError::UnknownList(id))?;
        for entry in entries {
            match *entry {
                Entry::Item(index) => out.push(index),
                Entry::Include(other) => self.flatten(other, visiting, out)?,
            }
        }
        visiting.remove(&id);
        Ok(())
    }
}

/// A frozen grammar: flattened item lists plus the root and pre lists.
#[derive(Debug)]
pub struct Grammar {
    items: Vec<GrammarItem>,
    lists: Vec<Vec<usize>>,
    root: GrammarId,
    pre: Option<GrammarId>,
}

impl Grammar {
    pub fn root(&self) -> GrammarId {
        self.root
    }

    pub fn pre(&self) -> Option<GrammarId> {
        self.pre
    }

    /// Items of a list, in matching order.
    pub fn items(&self, id: GrammarId) -> impl Iterator<Item = &GrammarItem> {
        self.lists
            .get(id.0)
            .into_iter()
            .flatten()
            .filter_map(|&index| self.items.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESERVED: &[&str] = &["const", "struct"];

    #[test]
    fn test_pattern_is_anchored() {
        let pattern = Pattern::new("[a-z]+").unwrap();

        assert!(pattern.is_match("abc def"));
        assert!(!pattern.is_match(" abc"));
    }

    #[test]
    fn test_pattern_alternation_is_anchored() {
        let pattern = Pattern::new("a|b").unwrap();

        assert!(!pattern.is_match("xb"));
    }

    #[test]
    fn test_pattern_reserved_words() {
        let pattern = Pattern::new(r"(?P<symbol>[a-z_.]+)")
            .unwrap()
            .reserve("symbol", RESERVED);

        assert!(pattern.is_match("value"));
        assert!(pattern.is_match("constant"));
        assert!(!pattern.is_match("const"));
        assert!(!pattern.is_match("a.struct.b"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Pattern::new("(unclosed").unwrap_err();

        assert!(matches!(err, GrammarError::InvalidPattern { .. }));
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn test_lookahead() {
        let item = GrammarItem::new("config")
            .unwrap()
            .followed_by(Pattern::new(r"\s*:").unwrap());

        assert!(item.captures("config :").is_some());
        assert!(item.captures("config = 2").is_none());
    }

    #[test]
    fn test_forward_include_is_flattened() {
        let mut builder = GrammarBuilder::new();
        let root = builder.declare();
        let later = builder.declare();
        builder.push(root, GrammarItem::new("a").unwrap());
        builder.include(root, later);
        builder.push(later, GrammarItem::new("b").unwrap());
        builder.push(later, GrammarItem::new("c").unwrap());

        let grammar = builder.build(root, None).unwrap();
        let patterns: Vec<_> = grammar
            .items(root)
            .map(|item| item.pattern().as_str())
            .collect();

        assert_eq!(patterns, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_include_cycle_is_rejected() {
        let mut builder = GrammarBuilder::new();
        let a = builder.declare();
        let b = builder.declare();
        builder.include(a, b);
        builder.include(b, a);

        assert!(matches!(
            builder.build(a, None),
            Err(GrammarError::IncludeCycle(_))
        ));
    }

    #[test]
    fn test_diamond_include_is_not_a_cycle() {
        let mut builder = GrammarBuilder::new();
        let shared = builder.list([GrammarItem::new("x").unwrap()]);
        let left = builder.declare();
        let right = builder.declare();
        let root = builder.declare();
        builder.include(left, shared);
        builder.include(right, shared);
        builder.include(root, left);
        builder.include(root, right);

        let grammar = builder.build(root, None).unwrap();
        assert_eq!(grammar.items(root).count(), 2);
    }

    #[test]
    fn test_unknown_continuation() {
        let mut other = GrammarBuilder::new();
        other.declare();
        let foreign = other.declare();

        let mut builder = GrammarBuilder::new();
        let root = builder.declare();
        builder.push(root, GrammarItem::new("a").unwrap().then(foreign));

        assert!(matches!(
            builder.build(root, None),
            Err(GrammarError::UnknownList(_))
        ));
    }
}
