//! The positioned element tree produced by the parser.
//!
//! An [`Element`] is a map of named [`Attribute`]s plus named nested
//! [`Sequence`]s. Every attribute remembers the byte range it was captured
//! from, and every element may know its [`Context`], which is enough to
//! report diagnostics against the original source.
//!
//! Elements are read-only to consumers. Passes that synthesize or rewrite
//! elements go through [`ElementBuilder`] and [`SequenceBuilder`].

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    context::Context,
    error::{Diagnostic, ErrorCode, Label, Result},
    grammar::GrammarId,
    span::Span,
};

/// A captured attribute value and its source range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    value: String,
    span: Span,
}

impl Attribute {
    pub fn new(value: impl Into<String>, span: Span) -> Self {
        Self {
            value: value.into(),
            span,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

/// A node of the parsed tree.
#[derive(Debug, Clone, Default)]
pub struct Element {
    attrs: IndexMap<String, Attribute>,
    sequences: IndexMap<String, Sequence>,
    context: Option<Arc<Context>>,
    pub(crate) grammar: Option<GrammarId>,
}

impl Element {
    /// An empty element without context.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_grammar(grammar: Option<GrammarId>, context: &Arc<Context>) -> Self {
        Self {
            grammar,
            context: Some(Arc::clone(context)),
            ..Self::default()
        }
    }

    /// Get an attribute by name.
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name)
    }

    /// Get the value of an attribute by name.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(Attribute::value)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// All attributes in capture order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attrs.iter().map(|(name, attr)| (name.as_str(), attr))
    }

    /// Get a nested sequence by name.
    pub fn sequence(&self, name: &str) -> Option<&Sequence> {
        self.sequences.get(name)
    }

    /// Whether a nested sequence exists and holds at least one element.
    pub fn has_sequence(&self, name: &str) -> bool {
        self.sequences.get(name).is_some_and(|seq| !seq.is_empty())
    }

    /// All nested sequences in creation order.
    pub fn sequences(&self) -> impl Iterator<Item = (&str, &Sequence)> {
        self.sequences.iter().map(|(name, seq)| (name.as_str(), seq))
    }

    /// An element without attributes and without non-empty sequences.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.sequences.values().all(Sequence::is_empty)
    }

    /// Source attribution of this element.
    pub fn context(&self) -> Option<&Arc<Context>> {
        self.context.as_ref()
    }

    /// Range covered by the attributes of this element.
    pub fn span(&self) -> Span {
        self.attrs
            .values()
            .map(Attribute::span)
            .reduce(|acc, span| acc.union(span))
            .unwrap_or_default()
    }

    /// Span of one attribute, falling back to the element span.
    pub fn attr_span(&self, name: &str) -> Span {
        self.attr(name).map_or_else(|| self.span(), Attribute::span)
    }

    /// An error diagnostic pointing at this element.
    pub fn error(&self, message: impl Into<String>) -> Diagnostic {
        let message = message.into();
        self.located(Diagnostic::error(message), self.span(), "here")
    }

    /// An error diagnostic pointing at one attribute of this element.
    pub fn attr_error(&self, name: &str, message: impl Into<String>) -> Diagnostic {
        self.located(Diagnostic::error(message), self.attr_span(name), "here")
    }

    /// A secondary label pointing at this element.
    pub fn label(&self, message: impl Into<String>) -> Label {
        let label = Label::secondary(self.span(), message);
        match &self.context {
            Some(context) => label.with_context(Arc::clone(context)),
            None => label,
        }
    }

    fn located(&self, diagnostic: Diagnostic, span: Span, label: &str) -> Diagnostic {
        let diagnostic = diagnostic.with_label(span, label);
        match &self.context {
            Some(context) => diagnostic.in_context(context),
            None => diagnostic,
        }
    }

    /// Fail with `message` unless `condition` holds.
    pub fn assert_true(&self, condition: bool, message: impl Into<String>) -> Result<()> {
        if condition {
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    /// Get a mandatory attribute.
    pub fn assert_has_attr(&self, name: &str) -> Result<&Attribute> {
        self.attr(name).ok_or_else(|| {
            self.error(format!("Missing mandatory attribute '{name}'."))
                .with_code(ErrorCode::E202)
        })
    }

    /// Get a mandatory, non-empty nested sequence.
    pub fn assert_has_sequence(&self, name: &str) -> Result<&Sequence> {
        match self.sequence(name) {
            Some(sequence) if !sequence.is_empty() => Ok(sequence),
            _ => Err(self
                .error(format!("Missing mandatory sequence '{name}'."))
                .with_code(ErrorCode::E203)),
        }
    }

    /// Start rewriting this element.
    pub fn into_builder(self) -> ElementBuilder {
        ElementBuilder { element: self }
    }

    /// Serializable snapshot of this element.
    pub fn to_data(&self) -> ElementData {
        ElementData {
            attributes: self
                .attrs
                .iter()
                .map(|(name, attr)| {
                    (
                        name.clone(),
                        AttributeData {
                            value: attr.value.clone(),
                            index: attr.span.start(),
                            end: attr.span.end(),
                        },
                    )
                })
                .collect(),
            sequences: self
                .sequences
                .iter()
                .filter(|(_, seq)| !seq.is_empty())
                .map(|(name, seq)| (name.clone(), seq.iter().map(Element::to_data).collect()))
                .collect(),
        }
    }

    /// Rebuild an element from its serialized form, attaching `context` to
    /// it and to all its descendants.
    pub fn from_data(data: ElementData, context: Option<&Arc<Context>>) -> Self {
        Self {
            attrs: data
                .attributes
                .into_iter()
                .map(|(name, attr)| {
                    (
                        name,
                        Attribute::new(attr.value, Span::new(attr.index..attr.end)),
                    )
                })
                .collect(),
            sequences: data
                .sequences
                .into_iter()
                .map(|(name, elements)| {
                    let elements = elements
                        .into_iter()
                        .map(|element| Element::from_data(element, context))
                        .collect();
                    (name, Sequence::from_elements(elements))
                })
                .collect(),
            context: context.cloned(),
            grammar: None,
        }
    }

    pub(crate) fn set_attr(&mut self, name: impl Into<String>, attr: Attribute) {
        self.attrs.insert(name.into(), attr);
    }

    /// The nested sequence `name`, created on first use.
    pub(crate) fn sequence_entry(&mut self, name: &str) -> &mut Sequence {
        self.sequences.entry(name.to_string()).or_default()
    }

    pub(crate) fn sequence_mut(&mut self, name: &str) -> Option<&mut Sequence> {
        self.sequences.get_mut(name)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.to_data() == other.to_data()
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_data().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        ElementData::deserialize(deserializer).map(|data| Element::from_data(data, None))
    }
}

/// An ordered list of elements.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    elements: Vec<Element>,
    pub(crate) grammar: Option<GrammarId>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: Vec<Element>) -> Self {
        Self {
            elements,
            grammar: None,
        }
    }

    /// Iterate over the non-empty elements.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|element| !element.is_empty())
    }

    /// Number of non-empty elements.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.iter().all(Element::is_empty)
    }

    /// Take the non-empty elements out of this sequence.
    pub fn into_elements(self) -> Vec<Element> {
        self.elements
            .into_iter()
            .filter(|element| !element.is_empty())
            .collect()
    }

    pub(crate) fn push(&mut self, element: Element) -> usize {
        self.elements.push(element);
        self.elements.len() - 1
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Element> {
        self.elements.get_mut(index)
    }
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Serialize for Sequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(Element::to_data))
    }
}

impl<'de> Deserialize<'de> for Sequence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let elements = Vec::<ElementData>::deserialize(deserializer)?;
        Ok(Sequence::from_elements(
            elements
                .into_iter()
                .map(|data| Element::from_data(data, None))
                .collect(),
        ))
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Element;
    type IntoIter = Box<dyn Iterator<Item = &'a Element> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Serialized attribute: value plus `[index, end)` offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeData {
    pub value: String,
    pub index: usize,
    pub end: usize,
}

/// Serialized element. Field order is fixed so output is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementData {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, AttributeData>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub sequences: IndexMap<String, Vec<ElementData>>,
}

/// Owned, mutable access to an element.
#[derive(Debug, Clone, Default)]
pub struct ElementBuilder {
    element: Element,
}

impl ElementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute without a meaningful source position.
    pub fn attr(self, name: &str, value: impl Into<String>) -> Self {
        self.attr_at(name, value, Span::default())
    }

    /// Set an attribute with its source position.
    pub fn attr_at(mut self, name: &str, value: impl Into<String>, span: Span) -> Self {
        self.element.set_attr(name, Attribute::new(value, span));
        self
    }

    pub fn remove_attr(mut self, name: &str) -> Self {
        self.element.attrs.shift_remove(name);
        self
    }

    /// Replace (or create) a nested sequence.
    pub fn sequence(mut self, name: &str, sequence: Sequence) -> Self {
        self.element.sequences.insert(name.to_string(), sequence);
        self
    }

    pub fn remove_sequence(mut self, name: &str) -> Self {
        self.element.sequences.shift_remove(name);
        self
    }

    /// Append an element to a nested sequence, creating it if needed.
    pub fn push(mut self, name: &str, element: Element) -> Self {
        let context = self.element.context.clone();
        let sequence = self.element.sequence_entry(name);
        sequence.elements.push(reparent(element, context.as_ref()));
        self
    }

    /// Attribute this element (and descendants without one) to `context`.
    pub fn context(mut self, context: Arc<Context>) -> Self {
        self.element.context = Some(context);
        self
    }

    pub fn build(self) -> Element {
        self.element
    }
}

/// Owned, mutable access to a sequence.
#[derive(Debug, Clone, Default)]
pub struct SequenceBuilder {
    sequence: Sequence,
    context: Option<Arc<Context>>,
}

impl SequenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elements pushed without a context of their own adopt this one.
    pub fn with_context(context: Arc<Context>) -> Self {
        Self {
            sequence: Sequence::default(),
            context: Some(context),
        }
    }

    pub fn from_sequence(sequence: Sequence) -> Self {
        Self {
            sequence,
            context: None,
        }
    }

    pub fn push_back(&mut self, element: Element) -> &mut Self {
        let element = reparent(element, self.context.as_ref());
        self.sequence.elements.push(element);
        self
    }

    pub fn push_front(&mut self, element: Element) -> &mut Self {
        let element = reparent(element, self.context.as_ref());
        self.sequence.elements.insert(0, element);
        self
    }

    /// Remove the element at `index` (counting every stored element).
    pub fn remove(&mut self, index: usize) -> Option<Element> {
        (index < self.sequence.elements.len()).then(|| self.sequence.elements.remove(index))
    }

    pub fn len(&self) -> usize {
        self.sequence.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.elements.is_empty()
    }

    pub fn build(self) -> Sequence {
        self.sequence
    }
}

fn reparent(mut element: Element, context: Option<&Arc<Context>>) -> Element {
    if element.context.is_none() {
        element.context = context.map(|context| Context::nested(Arc::clone(context)));
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        ElementBuilder::new()
            .attr_at("name", "hello", Span::new(4..9))
            .attr_at("category", "expression", Span::new(0..3))
            .push("values", ElementBuilder::new().attr("value", "1").build())
            .build()
    }

    #[test]
    fn test_element_accessors() {
        let element = sample();

        assert_eq!(element.value("name"), Some("hello"));
        assert!(element.has_attr("category"));
        assert!(!element.has_attr("symbol"));
        assert!(element.has_sequence("values"));
        assert_eq!(element.span(), Span::new(0..9));
        assert_eq!(element.attr_span("name"), Span::new(4..9));
    }

    #[test]
    fn test_empty_element_is_skipped() {
        let sequence = Sequence::from_elements(vec![Element::new(), sample(), Element::new()]);

        assert_eq!(sequence.len(), 1);
        assert!(!sequence.is_empty());
        assert!(Sequence::from_elements(vec![Element::new()]).is_empty());
    }

    #[test]
    fn test_assert_has_attr_message() {
        let err = sample().assert_has_attr("symbol").unwrap_err();

        assert_eq!(err.message(), "Missing mandatory attribute 'symbol'.");
        assert_eq!(err.code(), Some(ErrorCode::E202));
    }

    #[test]
    fn test_serialization_shape() {
        let json = serde_json::to_string(&sample()).unwrap();

        let expected = concat!(
            r#"{"attributes":{"name":{"value":"hello","index":4,"end":9},"#,
            r#""category":{"value":"expression","index":0,"end":3}},"#,
            r#""sequences":{"values":[{"attributes":"#,
            r#"{"value":{"value":"1","index":0,"end":0}}}]}}"#,
        );
        assert_eq!(json, expected);
    }

    #[test]
    fn test_serialization_round_trip() {
        let element = sample();
        let json = serde_json::to_string(&element).unwrap();
        let restored: Element = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, element);
        assert_eq!(serde_json::to_string(&restored).unwrap(), json);
    }

    #[test]
    fn test_sequence_builder_reparents() {
        let context = Context::from_content("abc", None);
        let mut builder = SequenceBuilder::with_context(Arc::clone(&context));
        builder.push_back(sample());
        builder.push_front(Element::new());
        let removed = builder.remove(0);

        assert!(removed.is_some_and(|element| element.is_empty()));
        let sequence = builder.build();
        let element = sequence.iter().next().unwrap();
        assert!(element.context().is_some());
        assert_eq!(element.context().unwrap().content().as_deref(), Some("abc"));
    }
}
