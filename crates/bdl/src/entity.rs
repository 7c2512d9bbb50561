//! Typed, read-only views over the element tree.
//!
//! An [`Entity`] never owns data: it borrows an [`Element`] and exposes the
//! attributes and sequences its category defines. Construction checks the
//! category once, so every later phase matches on a closed set of
//! variants.

mod declaration;
mod expression;
mod nested;

use std::fmt;

use bdl_parser::{Diagnostic, Element, error::ErrorCode};

use crate::attr::{Attr, ElementExt};

pub use declaration::{Builtin, Enum, EnumValue, Extern, Method, Namespace, Reference, Use, Using};
pub use expression::{Expression, Fragment, Symbol};
pub use nested::Nested;

/// Category of an element, as written by the grammar or the build pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Namespace,
    Use,
    Using,
    Method,
    Expression,
    Enum,
    EnumValue,
    Component,
    Interface,
    Struct,
    Composition,
    Builtin,
    Reference,
}

impl Category {
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Namespace => "namespace",
            Category::Use => "use",
            Category::Using => "using",
            Category::Method => "method",
            Category::Expression => "expression",
            Category::Enum => "enum",
            Category::EnumValue => "enum_value",
            Category::Component => "component",
            Category::Interface => "interface",
            Category::Struct => "struct",
            Category::Composition => "composition",
            Category::Builtin => "builtin",
            Category::Reference => "reference",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "namespace" => Category::Namespace,
            "use" => Category::Use,
            "using" => Category::Using,
            "method" => Category::Method,
            "expression" => Category::Expression,
            "enum" => Category::Enum,
            "enum_value" => Category::EnumValue,
            "component" => Category::Component,
            "interface" => Category::Interface,
            "struct" => Category::Struct,
            "composition" => Category::Composition,
            "builtin" => Category::Builtin,
            "reference" => Category::Reference,
            _ => return None,
        })
    }

    /// Declarations with a `{ ... }` body.
    pub fn is_nested(self) -> bool {
        matches!(
            self,
            Category::Component | Category::Interface | Category::Struct | Category::Composition
        )
    }

    /// Categories an expression can instantiate or refer to as a type.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            Category::Component
                | Category::Interface
                | Category::Struct
                | Category::Enum
                | Category::Using
                | Category::Builtin
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed view over one element.
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Expression(Expression<'a>),
    Nested(Nested<'a>),
    Method(Method<'a>),
    Using(Using<'a>),
    Enum(Enum<'a>),
    EnumValue(EnumValue<'a>),
    Namespace(Namespace<'a>),
    Use(Use<'a>),
    Extern(Extern<'a>),
    Builtin(Builtin<'a>),
    Reference(Reference<'a>),
}

impl<'a> Entity<'a> {
    /// Interpret `element` according to its category.
    pub fn new(element: &'a Element) -> Result<Self, Diagnostic> {
        let value = element.assert_has_attr(Attr::Category.as_str())?.value();
        let category = Category::parse(value).ok_or_else(|| {
            element
                .attr_error(
                    Attr::Category.as_str(),
                    format!("Unexpected element category '{value}'."),
                )
                .with_code(ErrorCode::E208)
        })?;

        if element.is_set(Attr::Extern) {
            return Ok(Entity::Extern(Extern::new(element, category)?));
        }
        Ok(match category {
            Category::Expression => Entity::Expression(Expression::new(element)),
            Category::Component
            | Category::Interface
            | Category::Struct
            | Category::Composition => Entity::Nested(Nested::new(element, category)),
            Category::Method => Entity::Method(Method::new(element)?),
            Category::Using => Entity::Using(Using::new(element)?),
            Category::Enum => Entity::Enum(Enum::new(element)?),
            Category::EnumValue => Entity::EnumValue(EnumValue::new(element)?),
            Category::Namespace => Entity::Namespace(Namespace::new(element)),
            Category::Use => Entity::Use(Use::new(element)?),
            Category::Builtin => Entity::Builtin(Builtin::new(element)?),
            Category::Reference => Entity::Reference(Reference::new(element)?),
        })
    }

    pub fn element(&self) -> &'a Element {
        match self {
            Entity::Expression(entity) => entity.element(),
            Entity::Nested(entity) => entity.element(),
            Entity::Method(entity) => entity.element(),
            Entity::Using(entity) => entity.element(),
            Entity::Enum(entity) => entity.element(),
            Entity::EnumValue(entity) => entity.element(),
            Entity::Namespace(entity) => entity.element(),
            Entity::Use(entity) => entity.element(),
            Entity::Extern(entity) => entity.element(),
            Entity::Builtin(entity) => entity.element(),
            Entity::Reference(entity) => entity.element(),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Entity::Expression(_) => Category::Expression,
            Entity::Nested(entity) => entity.category(),
            Entity::Method(_) => Category::Method,
            Entity::Using(_) => Category::Using,
            Entity::Enum(_) => Category::Enum,
            Entity::EnumValue(_) => Category::EnumValue,
            Entity::Namespace(_) => Category::Namespace,
            Entity::Use(_) => Category::Use,
            Entity::Extern(entity) => entity.category(),
            Entity::Builtin(_) => Category::Builtin,
            Entity::Reference(_) => Category::Reference,
        }
    }

    /// Declared name, without the variadic marker.
    pub fn name(&self) -> Option<&'a str> {
        match self {
            Entity::Expression(entity) => entity.name(),
            Entity::Namespace(_) | Entity::Use(_) => None,
            _ => self.element().get(Attr::Name),
        }
    }
}

#[cfg(test)]
mod tests {
    use bdl_parser::ElementBuilder;

    use super::*;

    #[test]
    fn test_category_round_trip() {
        for category in [
            Category::Namespace,
            Category::EnumValue,
            Category::Composition,
            Category::Reference,
        ] {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("variable"), None);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let element = ElementBuilder::new().attr("category", "variable").build();
        let err = Entity::new(&element).unwrap_err();

        assert_eq!(err.code(), Some(ErrorCode::E208));
        assert_eq!(err.message(), "Unexpected element category 'variable'.");
    }

    #[test]
    fn test_missing_category() {
        let element = ElementBuilder::new().attr("name", "x").build();

        assert_eq!(Entity::new(&element).unwrap_err().code(), Some(ErrorCode::E202));
    }

    #[test]
    fn test_extern_takes_precedence() {
        let element = ElementBuilder::new()
            .attr("extern", "true")
            .attr("category", "interface")
            .attr("name", "Logger")
            .build();
        let entity = Entity::new(&element).unwrap();

        assert!(matches!(entity, Entity::Extern(_)));
        assert_eq!(entity.category(), Category::Interface);
        assert_eq!(entity.name(), Some("Logger"));
    }
}
