//! Name resolution.
//!
//! A [`Resolver`] turns declarations and expressions into their
//! [`Resolved`] form: the FQN of the referenced type and value, folded
//! literals, merged contracts, bound parameters and the instances an
//! expression depends on.

use std::{collections::BTreeSet, sync::Arc};

use log::trace;

use bdl_parser::{
    Context, Diagnostic, Element, ParseError, Span,
    error::{ErrorCode, Label},
};

use crate::{
    contract::{Contracts, Validation},
    entity::{Category, Entity, Expression, Fragment, Nested, Symbol},
    fold::{self, Operator, Term},
    literal::Literal,
    parameters::{self, Parameter},
    symbols::{Scope, SymbolMap, join},
};

/// The keyword naming the enclosing instance.
pub const THIS: &str = "this";

/// A declaration or expression after name resolution.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub(crate) category: Category,
    pub(crate) fqn: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) symbol: Option<String>,
    pub(crate) type_fqn: Option<String>,
    pub(crate) value_fqn: Option<String>,
    pub(crate) this: Option<String>,
    pub(crate) literal: Option<Literal>,
    pub(crate) is_const: bool,
    pub(crate) variadic: bool,
    pub(crate) parents: Vec<String>,
    pub(crate) template: Vec<Resolved>,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) returns: Option<Box<Resolved>>,
    pub(crate) contracts: Contracts,
    pub(crate) deps: BTreeSet<String>,
    pub(crate) interface: Option<String>,
    pub(crate) regexpr: Option<String>,
    pub(crate) preset: Option<String>,
    span: Span,
    context: Option<Arc<Context>>,
}

impl Resolved {
    fn at(category: Category, element: &Element) -> Self {
        Self {
            category,
            fqn: None,
            name: None,
            symbol: None,
            type_fqn: None,
            value_fqn: None,
            this: None,
            literal: None,
            is_const: false,
            variadic: false,
            parents: Vec::new(),
            template: Vec::new(),
            parameters: Vec::new(),
            returns: None,
            contracts: Contracts::new(),
            deps: BTreeSet::new(),
            interface: None,
            regexpr: None,
            preset: None,
            span: element.span(),
            context: element.context().cloned(),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// FQN of the declaration, `None` for inline expressions.
    pub fn fqn(&self) -> Option<&str> {
        self.fqn.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The referenced symbol as the user would spell it fully qualified,
    /// with the instance in place of its type for member accesses.
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    /// FQN of the type of this entity; a method call has the method as type.
    pub fn type_fqn(&self) -> Option<&str> {
        self.type_fqn.as_deref()
    }

    /// FQN of the expression this one aliases.
    pub fn value_fqn(&self) -> Option<&str> {
        self.value_fqn.as_deref()
    }

    /// The instance a member access or method call goes through.
    pub fn this(&self) -> Option<&str> {
        self.this.as_deref()
    }

    pub fn literal(&self) -> Option<&Literal> {
        self.literal.as_ref()
    }

    pub fn is_const(&self) -> bool {
        self.is_const
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    pub fn template(&self) -> &[Resolved] {
        &self.template
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|parameter| parameter.name() == name)
    }

    pub fn returns(&self) -> Option<&Resolved> {
        self.returns.as_deref()
    }

    pub fn contracts(&self) -> &Contracts {
        &self.contracts
    }

    /// Expressions this one reads from, directly.
    pub fn deps(&self) -> &BTreeSet<String> {
        &self.deps
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn regexpr(&self) -> Option<&str> {
        self.regexpr.as_deref()
    }

    pub fn preset(&self) -> Option<&str> {
        self.preset.as_deref()
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn context(&self) -> Option<&Arc<Context>> {
        self.context.as_ref()
    }

    /// An error diagnostic pointing at where this entity was written.
    pub fn error(&self, message: impl Into<String>) -> Diagnostic {
        let diagnostic = Diagnostic::error(message).with_label(self.span, "here");
        match &self.context {
            Some(context) => diagnostic.in_context(context),
            None => diagnostic,
        }
    }

    /// A secondary label pointing at where this entity was written.
    pub fn label(&self, message: impl Into<String>) -> Label {
        let label = Label::secondary(self.span, message);
        match &self.context {
            Some(context) => label.with_context(Arc::clone(context)),
            None => label,
        }
    }

    /// The value as it appears in a composition view.
    pub fn to_json(&self) -> serde_json::Value {
        if let Some(literal) = &self.literal {
            return literal.to_json();
        }
        self.value_fqn
            .as_deref()
            .or(self.symbol.as_deref())
            .or(self.regexpr.as_deref())
            .or(self.preset.as_deref())
            .map_or(serde_json::Value::Null, serde_json::Value::from)
    }
}

/// A name found in the symbol table.
struct Target {
    fqn: String,
    symbol: String,
    this: Option<String>,
    deps: BTreeSet<String>,
}

/// Resolves names from one scope.
#[derive(Debug)]
pub struct Resolver<'s> {
    symbols: &'s SymbolMap,
    scope: Scope,
}

impl<'s> Resolver<'s> {
    pub fn new(symbols: &'s SymbolMap, scope: Scope) -> Self {
        Self { symbols, scope }
    }

    pub fn symbols(&self) -> &'s SymbolMap {
        self.symbols
    }

    /// Resolve the declaration `element` registered as `fqn`.
    pub fn entity(&self, fqn: &str, element: &Element) -> Result<Resolved, ParseError> {
        let entity = Entity::new(element)?;
        let mut resolved = match entity {
            Entity::Expression(expression) => return self.expression(expression, Some(fqn)),
            Entity::Reference(reference) => {
                return Ok(self.symbols.resolve(reference.target())?.as_ref().clone());
            }
            Entity::Nested(nested) => {
                let mut resolved = self.nested(nested)?;
                resolved.type_fqn = Some(fqn.to_string());
                resolved
            }
            Entity::Method(method) => {
                let mut resolved = Resolved::at(Category::Method, element);
                resolved.type_fqn = Some(fqn.to_string());
                let registry = self.symbols.prelude().contracts();
                let mut contracts = registry.parse_all(method.contracts())?;
                for contract in registry.parse_all(method.return_contracts())?.iter() {
                    contracts.push(contract.clone());
                }
                resolved.contracts = contracts;
                for argument in method.arguments() {
                    self.expression(argument, None)?;
                }
                if let Some(returns) = method.returns() {
                    resolved.returns = Some(Box::new(self.symbol(returns)?));
                }
                resolved
            }
            Entity::Using(using) => {
                let target = self.symbol(using.target())?;
                let own = self.symbols.prelude().contracts().parse_all(using.contracts())?;
                let mut resolved = Resolved::at(Category::Using, element);
                resolved.contracts = Contracts::merge(&target.contracts, &own)?;
                resolved.type_fqn = target.type_fqn;
                resolved.template = target.template;
                resolved
            }
            Entity::Enum(_) | Entity::Extern(_) => {
                let mut resolved = Resolved::at(entity.category(), element);
                resolved.type_fqn = Some(fqn.to_string());
                resolved
            }
            Entity::EnumValue(_) => {
                let mut resolved = Resolved::at(Category::EnumValue, element);
                resolved.type_fqn = fqn.rsplit_once('.').map(|(owner, _)| owner.to_string());
                resolved.value_fqn = Some(fqn.to_string());
                resolved.is_const = true;
                resolved
            }
            Entity::Builtin(builtin) => {
                let mut resolved = Resolved::at(Category::Builtin, element);
                resolved.type_fqn = Some(fqn.to_string());
                if let Some(builtin) = self.symbols.prelude().builtin(builtin.name()) {
                    resolved.contracts = builtin.contracts().clone();
                }
                resolved
            }
            Entity::Namespace(_) | Entity::Use(_) => Resolved::at(entity.category(), element),
        };
        resolved.fqn = Some(fqn.to_string());
        resolved.name = entity.name().map(str::to_string);
        resolved.symbol = Some(fqn.to_string());
        Ok(resolved)
    }

    fn nested(&self, nested: Nested<'_>) -> Result<Resolved, ParseError> {
        let element = nested.element();
        let mut resolved = Resolved::at(nested.category(), element);
        resolved.contracts = self
            .symbols
            .prelude()
            .contracts()
            .parse_all(nested.contracts())?;

        for parent in nested.parents()? {
            let target = self.lookup(parent.name(), parent.element())?;
            let declaration = self.symbols.resolve(&target.fqn)?;
            let category = declaration.category();
            if !category.is_nested() || category == Category::Composition {
                return Err(parent
                    .element()
                    .error(format!(
                        "'{}' is a {} and cannot be inherited.",
                        parent.name(),
                        declaration.category()
                    ))
                    .with_code(ErrorCode::E208)
                    .into());
            }
            resolved.parents.push(target.fqn);
        }
        Ok(resolved)
    }

    /// Resolve an expression, declared as `fqn` or inline.
    ///
    /// The literal of the expression is checked against the contracts of its
    /// type merged with its own.
    pub fn expression(
        &self,
        expression: Expression<'_>,
        fqn: Option<&str>,
    ) -> Result<Resolved, ParseError> {
        let element = expression.element();
        let fragments = expression.fragments()?;
        let mut resolved = match fragments.as_slice() {
            [Fragment::Symbol(symbol)] => self.symbol(*symbol)?,
            [fragment] => self.operand(fragment)?,
            _ => self.fold(element, &fragments)?,
        };

        resolved.category = Category::Expression;
        resolved.fqn = fqn.map(str::to_string);
        resolved.name = expression.name().map(str::to_string);
        resolved.variadic = expression.is_variadic();
        resolved.is_const |= expression.is_const();
        resolved.span = element.span();
        resolved.context = element.context().cloned();

        if let Some(interface) = expression.interface() {
            resolved.interface = Some(self.lookup(interface.value(), element)?.fqn);
        }

        let own = self
            .symbols
            .prelude()
            .contracts()
            .parse_all(expression.contracts())?;
        resolved.contracts = Contracts::merge(&resolved.contracts, &own)?;
        Validation::new(&resolved.contracts)
            .validate(resolved.literal.as_ref(), |message| element.error(message))?;

        trace!(
            fqn:? = resolved.fqn,
            type_fqn:? = resolved.type_fqn,
            literal:? = resolved.literal;
            "Resolved expression"
        );
        Ok(resolved)
    }

    /// Resolve a reference with its template and call arguments.
    pub fn symbol(&self, symbol: Symbol<'_>) -> Result<Resolved, ParseError> {
        let element = symbol.element();
        let target = self.lookup(symbol.name(), element)?;
        let declaration = self.symbols.resolve(&target.fqn)?;

        let mut resolved = Resolved::at(Category::Expression, element);
        resolved.symbol = Some(target.symbol);
        resolved.this = target.this;
        resolved.deps = target.deps;
        resolved.type_fqn = declaration.type_fqn.clone();
        resolved.is_const = symbol.is_const();
        resolved.template = symbol
            .template()?
            .into_iter()
            .map(|template| self.symbol(template))
            .collect::<Result<_, _>>()?;

        match declaration.category() {
            Category::Expression | Category::EnumValue => {
                if symbol.arguments().next().is_some() {
                    return Err(element
                        .error(format!("'{}' is a value and cannot be called.", symbol.name()))
                        .with_code(ErrorCode::E210)
                        .into());
                }
                if declaration.category() == Category::Expression {
                    resolved.deps.insert(target.fqn.clone());
                }
                resolved.value_fqn = Some(target.fqn);
                resolved.literal = declaration.literal.clone();
                resolved.is_const |= declaration.is_const;
                resolved.contracts = declaration.contracts.clone();
                resolved.regexpr = declaration.regexpr.clone();
                resolved.preset = declaration.preset.clone();
            }
            Category::Namespace | Category::Use | Category::Composition => {
                return Err(element
                    .error(format!(
                        "'{}' is a {} and does not name a value or a type.",
                        symbol.name(),
                        declaration.category()
                    ))
                    .with_code(ErrorCode::E208)
                    .into());
            }
            _ => {
                resolved.contracts = declaration.contracts.clone();
                let declarations =
                    parameters::declarations(self.symbols, &target.fqn, &declaration)?;
                resolved.parameters = parameters::bind(
                    self,
                    &declarations,
                    symbol.name(),
                    element,
                    symbol.arguments(),
                )?;
                for parameter in &resolved.parameters {
                    if parameter.is_default() {
                        continue;
                    }
                    for value in parameter.values() {
                        resolved.deps.extend(value.deps.iter().cloned());
                    }
                }

                let scalar = self
                    .symbols
                    .prelude()
                    .builtin(&target.fqn)
                    .is_some_and(|builtin| builtin.is_scalar());
                if scalar {
                    resolved.literal = resolved
                        .parameter("value")
                        .filter(|parameter| !parameter.is_default())
                        .and_then(|parameter| parameter.values().first())
                        .and_then(|value| value.literal.clone());
                }
            }
        }
        Ok(resolved)
    }

    fn operand(&self, fragment: &Fragment<'_>) -> Result<Resolved, ParseError> {
        let element = fragment.element();
        let mut resolved = Resolved::at(Category::Expression, element);
        resolved.is_const = fragment.is_const();
        match fragment {
            Fragment::Symbol(symbol) => return self.symbol(*symbol),
            Fragment::Value(_, value) => {
                let literal = Literal::parse(value.value()).ok_or_else(|| {
                    element
                        .error(format!("Invalid literal value '{}'.", value.value()))
                        .with_code(ErrorCode::E209)
                })?;
                resolved.type_fqn = Some(literal_type(&literal).to_string());
                resolved.literal = Some(literal);
            }
            Fragment::Regexpr(_, value) => {
                regex::Regex::new(value.value()).map_err(|err| {
                    element
                        .error(format!(
                            "Invalid regular expression '{}': {err}",
                            value.value()
                        ))
                        .with_code(ErrorCode::E209)
                })?;
                resolved.regexpr = Some(value.value().to_string());
            }
            Fragment::Preset(_, value) => {
                resolved.preset = Some(value.value().to_string());
            }
            Fragment::Operator(..) => {
                return Err(element
                    .error("This expression is malformed.")
                    .with_code(ErrorCode::E201)
                    .into());
            }
        }
        Ok(resolved)
    }

    /// Fold an operator expression into its literal.
    fn fold(&self, element: &Element, fragments: &[Fragment<'_>]) -> Result<Resolved, ParseError> {
        let mut resolved = Resolved::at(Category::Expression, element);
        let mut terms = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let span = fragment.element().span();
            let term = match fragment {
                Fragment::Operator(operator_element, operator) => {
                    let operator = Operator::parse(operator.value()).ok_or_else(|| {
                        operator_element
                            .error(format!("Unknown operator '{}'.", operator.value()))
                            .with_code(ErrorCode::E201)
                    })?;
                    Term::Operator(operator, span)
                }
                _ => {
                    let operand = self.operand(fragment)?;
                    resolved.deps.extend(operand.deps);
                    Term::Operand(operand.literal, span)
                }
            };
            terms.push(term);
        }

        let literal = fold::fold(terms).map_err(|err| {
            let diagnostic = Diagnostic::error(err.message)
                .with_code(err.code)
                .with_label(err.span, "here");
            match element.context() {
                Some(context) => diagnostic.in_context(context),
                None => diagnostic,
            }
        })?;
        resolved.type_fqn = Some(literal_type(&literal).to_string());
        resolved.literal = Some(literal);
        Ok(resolved)
    }

    /// FQN of the declaration `name` refers to from this scope.
    pub fn find(&self, name: &str) -> Option<String> {
        self.lookup(name, &Element::new()).ok().map(|target| target.fqn)
    }

    /// Find the declaration a dotted name refers to.
    ///
    /// The first segment is looked up as a member of `this`, then in the
    /// enclosing namespaces from the innermost outwards. Later segments
    /// extend the name while it is declared, and otherwise continue as a
    /// member of the type (or its parents) of what was found so far.
    fn lookup(&self, name: &str, element: &Element) -> Result<Target, ParseError> {
        let mut segments = name.split('.');
        let first = segments.next().unwrap_or(name);

        let mut current = if first == THIS {
            self.scope.this().map(str::to_string).ok_or_else(|| {
                element
                    .error("Keyword 'this' must be used in an object context.")
                    .with_code(ErrorCode::E204)
            })?
        } else {
            self.first_segment(first).ok_or_else(|| {
                let diagnostic = self
                    .symbols
                    .unresolved(first, self.scope.namespace())
                    .with_label(element.span(), "here");
                match element.context() {
                    Some(context) => diagnostic.in_context(context),
                    None => diagnostic,
                }
            })?
        };

        let mut this = (first == THIS).then(|| current.clone());
        let mut suffix: Vec<&str> = Vec::new();
        let mut deps = BTreeSet::new();

        for segment in segments {
            let nested = format!("{current}.{segment}");
            if self.symbols.contains(&nested) {
                current = nested;
                suffix.push(segment);
                continue;
            }

            let owner = self.symbols.resolve(&current)?;
            if owner.category() == Category::Expression {
                deps.insert(current.clone());
                this = Some(current.clone());
                suffix.clear();
            }
            let member = self
                .owners(&owner)?
                .into_iter()
                .map(|owner| format!("{owner}.{segment}"))
                .find(|candidate| self.symbols.contains(candidate))
                .ok_or_else(|| {
                    element
                        .error(format!("Symbol '{segment}' from '{name}' could not be resolved."))
                        .with_code(ErrorCode::E200)
                })?;
            current = member;
            suffix.push(segment);
        }

        let symbol = match &this {
            Some(this) if !suffix.is_empty() => format!("{this}.{}", suffix.join(".")),
            _ => current.clone(),
        };
        Ok(Target {
            fqn: current,
            symbol,
            this,
            deps,
        })
    }

    fn first_segment(&self, first: &str) -> Option<String> {
        if let Some(this) = self.scope.this() {
            let member = format!("{this}.{first}");
            if self.symbols.contains(&member) {
                return Some(member);
            }
        }
        let namespace = self.scope.namespace();
        (0..=namespace.len())
            .rev()
            .map(|end| join(&namespace[..end], first))
            .find(|candidate| self.symbols.contains(candidate))
    }

    /// Whether `value` is of type `target` or of a type inheriting from it.
    pub(crate) fn converts(&self, value: &Resolved, target: &str) -> Result<bool, ParseError> {
        Ok(self.owners(value)?.iter().any(|owner| owner == target))
    }

    /// The type of `resolved` followed by its ancestors.
    fn owners(&self, resolved: &Resolved) -> Result<Vec<String>, ParseError> {
        let mut owners: Vec<String> = Vec::new();
        let mut pending: Vec<String> = resolved.type_fqn.iter().cloned().collect();
        while let Some(owner) = pending.pop() {
            if owners.contains(&owner) {
                continue;
            }
            let declaration = self.symbols.resolve(&owner)?;
            owners.push(owner);
            pending.extend(declaration.parents.iter().rev().cloned());
        }
        Ok(owners)
    }
}

/// Builtin type of a literal.
pub(crate) fn literal_type(literal: &Literal) -> &'static str {
    match literal {
        Literal::Integer(_) => "Integer",
        Literal::Float(_) => "Float",
        Literal::Boolean(_) => "Boolean",
        Literal::String(_) => "String",
    }
}
