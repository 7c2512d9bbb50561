use bdl_parser::{Attribute, Diagnostic, Element, error::ErrorCode};

use crate::{
    attr::{Attr, ElementExt, Nest},
    entity::{Category, Expression, Symbol},
};

fn name_of(element: &Element) -> Result<&str, Diagnostic> {
    element
        .assert_has_attr(Attr::Name.as_str())
        .map(Attribute::value)
}

/// `method name(arguments) -> Type;`
#[derive(Debug, Clone, Copy)]
pub struct Method<'a> {
    element: &'a Element,
    name: &'a str,
}

impl<'a> Method<'a> {
    pub fn new(element: &'a Element) -> Result<Self, Diagnostic> {
        Ok(Self {
            element,
            name: name_of(element)?,
        })
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The parameter declarations, kept apart from the arguments of the
    /// return type.
    pub fn arguments(&self) -> impl Iterator<Item = Expression<'a>> + 'a {
        self.element
            .nested_iter(Nest::Parameters)
            .map(Expression::new)
    }

    pub fn has_arguments(&self) -> bool {
        self.arguments().next().is_some()
    }

    /// The return type; the method returns nothing without one.
    pub fn returns(&self) -> Option<Symbol<'a>> {
        Symbol::new(self.element).ok()
    }

    pub fn contracts(&self) -> impl Iterator<Item = &'a Element> + 'a {
        self.element.nested_iter(Nest::Contract)
    }

    pub fn return_contracts(&self) -> impl Iterator<Item = &'a Element> + 'a {
        self.element.nested_iter(Nest::ContractReturn)
    }
}

/// `using Name = Type;`
#[derive(Debug, Clone, Copy)]
pub struct Using<'a> {
    element: &'a Element,
    name: &'a str,
    target: Symbol<'a>,
}

impl<'a> Using<'a> {
    pub fn new(element: &'a Element) -> Result<Self, Diagnostic> {
        Ok(Self {
            element,
            name: name_of(element)?,
            target: Symbol::new(element)?,
        })
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn target(&self) -> Symbol<'a> {
        self.target
    }

    pub fn contracts(&self) -> impl Iterator<Item = &'a Element> + 'a {
        self.element.nested_iter(Nest::Contract)
    }
}

/// `enum Name { A, B }`
#[derive(Debug, Clone, Copy)]
pub struct Enum<'a> {
    element: &'a Element,
    name: &'a str,
}

impl<'a> Enum<'a> {
    pub fn new(element: &'a Element) -> Result<Self, Diagnostic> {
        Ok(Self {
            element,
            name: name_of(element)?,
        })
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The value elements, each carrying a `name`.
    pub fn values(&self) -> impl Iterator<Item = &'a Element> + 'a {
        self.element.nested_iter(Nest::Values)
    }
}

/// One value of an enum, registered as `Enum.VALUE`.
#[derive(Debug, Clone, Copy)]
pub struct EnumValue<'a> {
    element: &'a Element,
    name: &'a str,
}

impl<'a> EnumValue<'a> {
    pub fn new(element: &'a Element) -> Result<Self, Diagnostic> {
        Ok(Self {
            element,
            name: name_of(element)?,
        })
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    pub fn name(&self) -> &'a str {
        self.name
    }
}

/// `namespace a.b;`, or a namespace marker registered by the build pass.
#[derive(Debug, Clone, Copy)]
pub struct Namespace<'a> {
    element: &'a Element,
}

impl<'a> Namespace<'a> {
    pub fn new(element: &'a Element) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    /// The declared segments; markers carry their full name instead.
    pub fn segments(&self) -> Vec<&'a str> {
        let segments: Vec<_> = self
            .element
            .nested_iter(Nest::Name)
            .filter_map(|segment| segment.get(Attr::Name))
            .collect();
        if segments.is_empty() {
            self.element
                .get(Attr::Name)
                .map(|name| name.split('.').collect())
                .unwrap_or_default()
        } else {
            segments
        }
    }
}

/// `use "path"`
#[derive(Debug, Clone, Copy)]
pub struct Use<'a> {
    element: &'a Element,
    path: &'a Attribute,
}

impl<'a> Use<'a> {
    pub fn new(element: &'a Element) -> Result<Self, Diagnostic> {
        Ok(Self {
            element,
            path: element.assert_has_attr(Attr::Path.as_str())?,
        })
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    pub fn path(&self) -> &'a str {
        self.path.value()
    }
}

/// `extern interface Name;`
#[derive(Debug, Clone, Copy)]
pub struct Extern<'a> {
    element: &'a Element,
    category: Category,
    name: &'a str,
}

impl<'a> Extern<'a> {
    pub fn new(element: &'a Element, category: Category) -> Result<Self, Diagnostic> {
        if !matches!(category, Category::Interface | Category::Struct) {
            return Err(element
                .error(format!("Only interfaces and structs can be extern, not '{category}'."))
                .with_code(ErrorCode::E208));
        }
        Ok(Self {
            element,
            category,
            name: name_of(element)?,
        })
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn name(&self) -> &'a str {
        self.name
    }
}

/// A compiler-provided declaration.
#[derive(Debug, Clone, Copy)]
pub struct Builtin<'a> {
    element: &'a Element,
    name: &'a str,
}

impl<'a> Builtin<'a> {
    pub fn new(element: &'a Element) -> Result<Self, Diagnostic> {
        Ok(Self {
            element,
            name: name_of(element)?,
        })
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    pub fn name(&self) -> &'a str {
        self.name
    }
}

/// A member moved to its own symbol, pointing at its FQN.
#[derive(Debug, Clone, Copy)]
pub struct Reference<'a> {
    element: &'a Element,
    target: &'a str,
}

impl<'a> Reference<'a> {
    pub fn new(element: &'a Element) -> Result<Self, Diagnostic> {
        Ok(Self {
            element,
            target: element
                .assert_has_attr(Attr::Symbol.as_str())?
                .value(),
        })
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    /// FQN of the referenced declaration.
    pub fn target(&self) -> &'a str {
        self.target
    }
}
