use bdl_parser::{Attribute, Diagnostic, Element, error::ErrorCode};

use crate::attr::{Attr, ElementExt, Nest};

/// A value, a call or a variable declaration.
#[derive(Debug, Clone, Copy)]
pub struct Expression<'a> {
    element: &'a Element,
}

impl<'a> Expression<'a> {
    pub fn new(element: &'a Element) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    /// Declared name, without the variadic `...` marker.
    pub fn name(&self) -> Option<&'a str> {
        self.element
            .get(Attr::Name)
            .map(|name| name.trim_end_matches("..."))
    }

    /// Whether the declaration absorbs the remaining positional arguments.
    pub fn is_variadic(&self) -> bool {
        self.element
            .get(Attr::Name)
            .is_some_and(|name| name.ends_with("..."))
    }

    /// The `name : Interface = ...` annotation.
    pub fn interface(&self) -> Option<&'a Attribute> {
        self.element.get_attr(Attr::Interface)
    }

    pub fn is_const(&self) -> bool {
        self.element
            .nested_iter(Nest::Fragments)
            .any(|fragment| fragment.is_set(Attr::Const))
    }

    pub fn contracts(&self) -> impl Iterator<Item = &'a Element> + 'a {
        self.element.nested_iter(Nest::Contract)
    }

    /// Operands and operators in source order.
    pub fn fragments(&self) -> Result<Vec<Fragment<'a>>, Diagnostic> {
        let fragments = self
            .element
            .nested_iter(Nest::Fragments)
            .map(Fragment::new)
            .collect::<Result<Vec<_>, _>>()?;
        if fragments.is_empty() {
            return Err(self
                .element
                .error("This expression is malformed.")
                .with_code(ErrorCode::E201));
        }
        Ok(fragments)
    }
}

/// One operand or operator of an expression.
#[derive(Debug, Clone, Copy)]
pub enum Fragment<'a> {
    Symbol(Symbol<'a>),
    Value(&'a Element, &'a Attribute),
    Operator(&'a Element, &'a Attribute),
    Regexpr(&'a Element, &'a Attribute),
    Preset(&'a Element, &'a Attribute),
}

impl<'a> Fragment<'a> {
    fn new(element: &'a Element) -> Result<Self, Diagnostic> {
        if element.is_set(Attr::Symbol) {
            return Symbol::new(element).map(Fragment::Symbol);
        }
        let kinds: [(Attr, fn(&'a Element, &'a Attribute) -> Self); 4] = [
            (Attr::Value, Fragment::Value),
            (Attr::Operator, Fragment::Operator),
            (Attr::Regexpr, Fragment::Regexpr),
            (Attr::Preset, Fragment::Preset),
        ];
        kinds
            .into_iter()
            .find_map(|(attr, make)| element.get_attr(attr).map(|value| make(element, value)))
            .ok_or_else(|| {
                element
                    .error("Dangling fragment in expression.")
                    .with_code(ErrorCode::E201)
            })
    }

    pub fn element(&self) -> &'a Element {
        match self {
            Fragment::Symbol(symbol) => symbol.element(),
            Fragment::Value(element, _)
            | Fragment::Operator(element, _)
            | Fragment::Regexpr(element, _)
            | Fragment::Preset(element, _) => element,
        }
    }

    pub fn is_const(&self) -> bool {
        self.element().is_set(Attr::Const)
    }
}

/// A reference to a declaration, with its template and call arguments.
///
/// Also used for inheritance lists, `using` targets and method return
/// types, which share the same shape.
#[derive(Debug, Clone, Copy)]
pub struct Symbol<'a> {
    element: &'a Element,
    attribute: &'a Attribute,
}

impl<'a> Symbol<'a> {
    pub fn new(element: &'a Element) -> Result<Self, Diagnostic> {
        let attribute = element.assert_has_attr(Attr::Symbol.as_str())?;
        Ok(Self { element, attribute })
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    /// The dotted name as written.
    pub fn name(&self) -> &'a str {
        self.attribute.value()
    }

    pub fn attribute(&self) -> &'a Attribute {
        self.attribute
    }

    pub fn is_const(&self) -> bool {
        self.element.is_set(Attr::Const)
    }

    pub fn template(&self) -> Result<Vec<Symbol<'a>>, Diagnostic> {
        self.element
            .nested_iter(Nest::Template)
            .map(Symbol::new)
            .collect()
    }

    pub fn arguments(&self) -> impl Iterator<Item = Expression<'a>> + 'a {
        self.element
            .nested_iter(Nest::Argument)
            .map(Expression::new)
    }
}
