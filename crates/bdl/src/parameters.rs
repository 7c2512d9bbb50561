//! Parameter declarations and argument binding.
//!
//! Instantiable declarations expose parameters: the `config` section of a
//! component, the `interface` section of a struct, the arguments of a
//! method, and the builtin table. Parents contribute their parameters
//! first. A call binds its arguments positionally, then by name; a
//! variadic parameter takes every remaining positional argument.
//!
//! A bound value must be of the declared type or inherit from it. The
//! `convertible` contract replaces the declared type with its own list.

use indexmap::IndexMap;

use bdl_parser::{
    Element, ParseError,
    error::{DiagnosticCollector, ErrorCode},
};

use crate::{
    attr::{Attr, ElementExt},
    builtins::ANY,
    contract::{ContractKind, Contracts, Validation},
    entity::{Category, Expression, Method, Nested, Reference},
    resolver::{Resolved, Resolver},
    symbols::SymbolMap,
};

/// A declared parameter.
#[derive(Debug, Clone)]
pub(crate) struct Declaration {
    name: String,
    variadic: bool,
    default: Option<Resolved>,
    contracts: Contracts,
    /// Types a bound value must convert to; empty accepts any value.
    accepts: Vec<String>,
}

impl Declaration {
    fn from_resolved(
        resolver: &Resolver<'_>,
        resolved: &Resolved,
    ) -> Result<Option<Self>, ParseError> {
        let Some(name) = resolved.name() else {
            return Ok(None);
        };
        Ok(Some(Self {
            name: name.to_string(),
            variadic: resolved.is_variadic(),
            default: Some(resolved.clone()),
            contracts: resolved.contracts().clone(),
            accepts: accepted(resolver, resolved)?,
        }))
    }

    fn is_mandatory(&self) -> bool {
        self.contracts.has(ContractKind::Mandatory)
    }
}

/// Types a value bound to `declaration` must convert to.
///
/// A `convertible` contract names them, otherwise the declared type does.
/// `Any` accepts every value.
fn accepted(resolver: &Resolver<'_>, declaration: &Resolved) -> Result<Vec<String>, ParseError> {
    let Some(contract) = declaration.contracts().get(ContractKind::Convertible) else {
        return Ok(declaration
            .type_fqn()
            .filter(|fqn| *fqn != ANY)
            .map(str::to_string)
            .into_iter()
            .collect());
    };
    contract
        .args()
        .iter()
        .map(|arg| {
            resolver.find(arg).ok_or_else(|| {
                ParseError::from(
                    contract
                        .error(format!("Type '{arg}' could not be resolved."))
                        .with_code(ErrorCode::E200),
                )
            })
        })
        .collect()
}

/// Check that `value` is of a type accepted by `declaration` or derives
/// from one.
///
/// Values of unknown type pass. A builtin value bound to builtin types is
/// left to the value contracts.
fn convert(
    resolver: &Resolver<'_>,
    declaration: &Declaration,
    value: &Resolved,
) -> Result<(), ParseError> {
    let Some(from) = value.type_fqn() else {
        return Ok(());
    };
    if declaration.accepts.is_empty() || from == ANY {
        return Ok(());
    }
    let prelude = resolver.symbols().prelude();
    let builtin = |fqn: &str| prelude.builtin(fqn).is_some();
    if builtin(from) && declaration.accepts.iter().all(|to| builtin(to.as_str())) {
        return Ok(());
    }
    for target in &declaration.accepts {
        if resolver.converts(value, target)? {
            return Ok(());
        }
    }

    let mut diagnostic = value
        .error(format!(
            "Type '{from}' is not convertible to '{}'.",
            declaration.accepts.join("' or '")
        ))
        .with_code(ErrorCode::E300);
    if let Some(contract) = declaration.contracts.get(ContractKind::Convertible) {
        if let Some(label) = contract.label(format!("Contract '{contract}' is declared here.")) {
            diagnostic = diagnostic.with_labeled(label);
        }
    }
    Err(diagnostic.into())
}

/// A parameter bound at a call site.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    variadic: bool,
    default: bool,
    values: Vec<Resolved>,
}

impl Parameter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Whether the value is the declared default rather than an argument.
    pub fn is_default(&self) -> bool {
        self.default
    }

    pub fn values(&self) -> &[Resolved] {
        &self.values
    }

    /// The bound value; a list for variadic parameters.
    pub fn to_json(&self) -> serde_json::Value {
        if self.variadic {
            self.values.iter().map(Resolved::to_json).collect()
        } else {
            self.values
                .first()
                .map_or(serde_json::Value::Null, Resolved::to_json)
        }
    }
}

/// The parameters accepted by the declaration `fqn`.
pub(crate) fn declarations(
    symbols: &SymbolMap,
    fqn: &str,
    declaration: &Resolved,
) -> Result<Vec<Declaration>, ParseError> {
    let mut visiting = Vec::new();
    collect(symbols, fqn, declaration, &mut visiting)
}

fn collect(
    symbols: &SymbolMap,
    fqn: &str,
    declaration: &Resolved,
    visiting: &mut Vec<String>,
) -> Result<Vec<Declaration>, ParseError> {
    if visiting.iter().any(|pending| pending == fqn) {
        return Err(declaration
            .error(format!("Circular inheritance through '{fqn}'."))
            .with_code(ErrorCode::E211)
            .into());
    }
    visiting.push(fqn.to_string());

    let declarations = match declaration.category() {
        Category::Builtin => Ok(symbols
            .prelude()
            .builtin(fqn)
            .map(|builtin| {
                builtin
                    .parameters()
                    .iter()
                    .map(|parameter| Declaration {
                        name: parameter.name().to_string(),
                        variadic: parameter.is_variadic(),
                        default: None,
                        contracts: parameter.contracts().clone(),
                        accepts: Vec::new(),
                    })
                    .collect()
            })
            .unwrap_or_default()),
        Category::Using => match declaration.type_fqn() {
            Some(target) if target != fqn => {
                let resolved = symbols.resolve(target)?;
                collect(symbols, target, &resolved, visiting)
            }
            _ => Ok(Vec::new()),
        },
        Category::Method => method(symbols, fqn),
        Category::Component | Category::Struct => {
            let mut merged: IndexMap<String, Declaration> = IndexMap::new();
            for parent in declaration.parents() {
                let resolved = symbols.resolve(parent)?;
                for inherited in collect(symbols, parent, &resolved, visiting)? {
                    merged.insert(inherited.name.clone(), inherited);
                }
            }
            for own in section(symbols, fqn, declaration.category())? {
                merged.insert(own.name.clone(), own);
            }
            Ok(merged.into_values().collect())
        }
        _ => Ok(Vec::new()),
    };

    visiting.pop();
    declarations
}

fn method(symbols: &SymbolMap, fqn: &str) -> Result<Vec<Declaration>, ParseError> {
    let Some(entry) = symbols.get(fqn) else {
        return Ok(Vec::new());
    };
    let method = Method::new(entry.element())?;
    let resolver = symbols.resolver_for(fqn);
    let mut declarations = Vec::new();
    for argument in method.arguments() {
        let resolved = resolver.expression(argument, None)?;
        declarations.extend(Declaration::from_resolved(&resolver, &resolved)?);
    }
    Ok(declarations)
}

/// Named members of the parameter section of a component or struct.
fn section(
    symbols: &SymbolMap,
    fqn: &str,
    category: Category,
) -> Result<Vec<Declaration>, ParseError> {
    let Some(entry) = symbols.get(fqn) else {
        return Ok(Vec::new());
    };
    let nested = Nested::new(entry.element(), category);
    let Some(section) = nested.parameter_section() else {
        return Ok(Vec::new());
    };

    let mut declarations = Vec::new();
    for member in nested.section(section) {
        if member.get(Attr::Category) != Some(Category::Reference.as_str()) {
            continue;
        }
        let target = Reference::new(member)?.target();
        let resolved = symbols.resolve(target)?;
        if resolved.category() == Category::Expression {
            let resolver = symbols.resolver_for(target);
            declarations.extend(Declaration::from_resolved(&resolver, &resolved)?);
        }
    }
    Ok(declarations)
}

/// Bind call arguments to `declarations`.
///
/// Explicit arguments are checked against the contracts of their parameter;
/// defaults were checked where they were declared. Every binding error of
/// the call is reported.
pub(crate) fn bind<'a>(
    resolver: &Resolver<'_>,
    declarations: &[Declaration],
    callee: &str,
    call: &Element,
    arguments: impl Iterator<Item = Expression<'a>>,
) -> Result<Vec<Parameter>, ParseError> {
    let mut collector = DiagnosticCollector::new();
    let mut bound: IndexMap<&str, Vec<Resolved>> = IndexMap::new();
    let mut position = 0;

    for argument in arguments {
        let value = match resolver.expression(argument, None) {
            Ok(value) => value,
            Err(err) => {
                collector.extend(err);
                continue;
            }
        };

        if let Some(name) = argument.name() {
            match declarations.iter().find(|declaration| declaration.name == name) {
                None => collector.emit(
                    argument
                        .element()
                        .error(format!("Unknown parameter '{name}' for '{callee}'."))
                        .with_code(ErrorCode::E210),
                ),
                Some(declaration) if bound.contains_key(declaration.name.as_str()) => collector
                    .emit(
                        argument
                            .element()
                            .error(format!("Parameter '{name}' is set twice."))
                            .with_code(ErrorCode::E210),
                    ),
                Some(declaration) => {
                    bound.insert(declaration.name.as_str(), vec![value]);
                }
            }
            continue;
        }

        while let Some(declaration) = declarations.get(position) {
            if declaration.variadic || !bound.contains_key(declaration.name.as_str()) {
                break;
            }
            position += 1;
        }
        match declarations.get(position) {
            Some(declaration) if declaration.variadic => {
                bound.entry(declaration.name.as_str()).or_default().push(value);
            }
            Some(declaration) => {
                bound.insert(declaration.name.as_str(), vec![value]);
                position += 1;
            }
            None => collector.emit(
                argument
                    .element()
                    .error(format!(
                        "Too many arguments for '{callee}', it accepts {}.",
                        declarations.len()
                    ))
                    .with_code(ErrorCode::E210),
            ),
        }
    }

    let mut parameters = Vec::with_capacity(declarations.len());
    for declaration in declarations {
        match bound.shift_remove(declaration.name.as_str()) {
            Some(values) => {
                for value in &values {
                    if let Err(err) = Validation::new(&declaration.contracts)
                        .validate(value.literal(), |message| value.error(message))
                    {
                        collector.extend(err);
                    }
                    if let Err(err) = convert(resolver, declaration, value) {
                        collector.extend(err);
                    }
                }
                parameters.push(Parameter {
                    name: declaration.name.clone(),
                    variadic: declaration.variadic,
                    default: false,
                    values,
                });
            }
            None if declaration.is_mandatory() => collector.emit(
                call.error(format!(
                    "Missing mandatory parameter '{}' for '{callee}'.",
                    declaration.name
                ))
                .with_code(ErrorCode::E210),
            ),
            None => {
                let values: Vec<Resolved> = declaration.default.iter().cloned().collect();
                if values.is_empty() && !declaration.variadic {
                    continue;
                }
                parameters.push(Parameter {
                    name: declaration.name.clone(),
                    variadic: declaration.variadic,
                    default: !values.is_empty(),
                    values,
                });
            }
        }
    }

    collector.finish()?;
    Ok(parameters)
}
