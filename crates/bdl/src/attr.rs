//! Closed vocabulary of element attributes and nested sequences.
//!
//! The grammar writes attributes and sequences by name. Every later phase
//! reads them through [`Attr`] and [`Nest`], so a misspelled name is a
//! compile error rather than a silently missing value.

use bdl_parser::{Attribute, Element, Sequence};

/// Attributes an element of the BDL tree may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
    Category,
    Name,
    Symbol,
    Value,
    Operator,
    Regexpr,
    Preset,
    Const,
    Interface,
    Extern,
    Path,
    Type,
    Comment,
}

impl Attr {
    pub const fn as_str(self) -> &'static str {
        match self {
            Attr::Category => "category",
            Attr::Name => "name",
            Attr::Symbol => "symbol",
            Attr::Value => "value",
            Attr::Operator => "operator",
            Attr::Regexpr => "regexpr",
            Attr::Preset => "preset",
            Attr::Const => "const",
            Attr::Interface => "interface",
            Attr::Extern => "extern",
            Attr::Path => "path",
            Attr::Type => "type",
            Attr::Comment => "comment",
        }
    }
}

/// Nested sequences an element of the BDL tree may own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nest {
    /// Operands and operators of an expression.
    Fragments,
    Template,
    Argument,
    /// Parameter declarations of a method.
    Parameters,
    Contract,
    /// Contracts of a method return type.
    ContractReturn,
    /// Contract arguments and enum values.
    Values,
    Inheritance,
    /// Segments of a namespace declaration.
    Name,
    Interface,
    Config,
    Composition,
    /// Members of a component written before any section label.
    Invalid,
}

impl Nest {
    pub const fn as_str(self) -> &'static str {
        match self {
            Nest::Fragments => "fragments",
            Nest::Template => "template",
            Nest::Argument => "argument",
            Nest::Parameters => "parameters",
            Nest::Contract => "contract",
            Nest::ContractReturn => "contract_return",
            Nest::Values => "values",
            Nest::Inheritance => "inheritance",
            Nest::Name => "name",
            Nest::Interface => "interface",
            Nest::Config => "config",
            Nest::Composition => "composition",
            Nest::Invalid => "invalid",
        }
    }

    /// Sections a nested declaration body may hold.
    pub const SECTIONS: [Nest; 4] = [
        Nest::Interface,
        Nest::Config,
        Nest::Composition,
        Nest::Invalid,
    ];
}

/// Typed access to the attributes and sequences of an [`Element`].
pub trait ElementExt {
    fn get(&self, attr: Attr) -> Option<&str>;
    fn get_attr(&self, attr: Attr) -> Option<&Attribute>;
    fn is_set(&self, attr: Attr) -> bool;
    fn nested(&self, nest: Nest) -> Option<&Sequence>;

    /// Non-empty elements of a nested sequence, empty if it is absent.
    fn nested_iter(&self, nest: Nest) -> impl Iterator<Item = &Element>;
}

impl ElementExt for Element {
    fn get(&self, attr: Attr) -> Option<&str> {
        self.value(attr.as_str())
    }

    fn get_attr(&self, attr: Attr) -> Option<&Attribute> {
        self.attr(attr.as_str())
    }

    fn is_set(&self, attr: Attr) -> bool {
        self.has_attr(attr.as_str())
    }

    fn nested(&self, nest: Nest) -> Option<&Sequence> {
        self.sequence(nest.as_str())
    }

    fn nested_iter(&self, nest: Nest) -> impl Iterator<Item = &Element> {
        self.sequence(nest.as_str()).into_iter().flat_map(Sequence::iter)
    }
}
