use bdl_parser::{Diagnostic, Element};

use crate::{
    attr::{Attr, ElementExt, Nest},
    entity::{Category, Symbol},
};

/// A `component`, `interface`, `struct` or `composition` declaration.
#[derive(Debug, Clone, Copy)]
pub struct Nested<'a> {
    element: &'a Element,
    category: Category,
}

impl<'a> Nested<'a> {
    pub fn new(element: &'a Element, category: Category) -> Self {
        Self { element, category }
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn name(&self) -> Option<&'a str> {
        self.element.get(Attr::Name)
    }

    /// The inheritance list.
    pub fn parents(&self) -> Result<Vec<Symbol<'a>>, Diagnostic> {
        self.element
            .nested_iter(Nest::Inheritance)
            .map(Symbol::new)
            .collect()
    }

    pub fn section(&self, section: Nest) -> impl Iterator<Item = &'a Element> + 'a {
        self.element.nested_iter(section)
    }

    pub fn contracts(&self) -> impl Iterator<Item = &'a Element> + 'a {
        self.element.nested_iter(Nest::Contract)
    }

    /// The section holding the parameters of an instantiation.
    pub fn parameter_section(&self) -> Option<Nest> {
        match self.category {
            Category::Component => Some(Nest::Config),
            Category::Struct => Some(Nest::Interface),
            _ => None,
        }
    }
}
