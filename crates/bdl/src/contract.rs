//! Declarative constraints attached to declarations.
//!
//! A [`Contract`] is a kind plus its arguments, for example `min(10)`. The
//! [`ContractRegistry`] knows the argument schema of every kind and parses
//! contract elements. [`Contracts::merge`] combines the contracts of a type
//! with the ones of a declaration using it, and [`Validation`] checks a
//! resolved value against them.

mod registry;
mod validation;

use std::{fmt, sync::Arc};

use bdl_parser::{Context, Diagnostic, Span, error::{ErrorCode, Label}};

pub use registry::{ContractRegistry, ContractSpec};
pub use validation::Validation;

/// Every contract kind the compiler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    Integer,
    Float,
    Boolean,
    String,
    Min,
    Max,
    Mandatory,
    Convertible,
    Executor,
    Init,
    Shutdown,
}

impl ContractKind {
    pub const ALL: [ContractKind; 11] = [
        ContractKind::Integer,
        ContractKind::Float,
        ContractKind::Boolean,
        ContractKind::String,
        ContractKind::Min,
        ContractKind::Max,
        ContractKind::Mandatory,
        ContractKind::Convertible,
        ContractKind::Executor,
        ContractKind::Init,
        ContractKind::Shutdown,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ContractKind::Integer => "integer",
            ContractKind::Float => "float",
            ContractKind::Boolean => "boolean",
            ContractKind::String => "string",
            ContractKind::Min => "min",
            ContractKind::Max => "max",
            ContractKind::Mandatory => "mandatory",
            ContractKind::Convertible => "convertible",
            ContractKind::Executor => "executor",
            ContractKind::Init => "init",
            ContractKind::Shutdown => "shutdown",
        }
    }

    /// What the contract applies to.
    pub const fn role(self) -> Role {
        match self {
            ContractKind::Integer
            | ContractKind::Float
            | ContractKind::Boolean
            | ContractKind::String
            | ContractKind::Min
            | ContractKind::Max
            | ContractKind::Mandatory
            | ContractKind::Convertible => Role::Value,
            ContractKind::Executor => Role::Instance,
            ContractKind::Init | ContractKind::Shutdown => Role::Method,
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subject a contract constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The value of an expression; inherited from its type.
    Value,
    /// An instantiation inside a composition.
    Instance,
    /// A method of a component.
    Method,
}

/// One contract, for example `max(255)`.
#[derive(Debug, Clone)]
pub struct Contract {
    kind: ContractKind,
    args: Vec<String>,
    span: Span,
    context: Option<Arc<Context>>,
}

impl Contract {
    /// A contract with no source position, as declared by builtins.
    pub fn new(kind: ContractKind, args: &[&str]) -> Self {
        Self {
            kind,
            args: args.iter().map(|arg| arg.to_string()).collect(),
            span: Span::default(),
            context: None,
        }
    }

    pub(crate) fn located(mut self, span: Span, context: Option<Arc<Context>>) -> Self {
        self.span = span;
        self.context = context;
        self
    }

    pub fn kind(&self) -> ContractKind {
        self.kind
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Numeric value of the first argument, validated at parse time.
    pub fn bound(&self) -> Option<f64> {
        self.arg().and_then(|arg| arg.parse().ok())
    }

    /// A secondary label pointing at this contract, if it has a source.
    pub fn label(&self, message: impl Into<String>) -> Option<Label> {
        self.context
            .as_ref()
            .map(|context| Label::secondary(self.span, message).with_context(Arc::clone(context)))
    }

    /// An error located at this contract.
    pub fn error(&self, message: impl Into<String>) -> Diagnostic {
        let diagnostic = Diagnostic::error(message).with_label(self.span, "here");
        match &self.context {
            Some(context) => diagnostic.in_context(context),
            None => diagnostic,
        }
    }
}

impl PartialEq for Contract {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.args == other.args
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.args.is_empty() {
            write!(f, "({})", self.args.join(", "))?;
        }
        Ok(())
    }
}

/// An ordered set of contracts, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contracts(Vec<Contract>);

impl Contracts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: ContractKind) -> Option<&Contract> {
        self.0.iter().find(|contract| contract.kind == kind)
    }

    pub fn has(&self, kind: ContractKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contract> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep only the contracts of `role`.
    pub fn with_role(&self, role: Role) -> Contracts {
        Contracts(
            self.0
                .iter()
                .filter(|contract| contract.kind.role() == role)
                .cloned()
                .collect(),
        )
    }

    /// Combine the value contracts of a `base` type with the contracts of
    /// a declaration using it.
    ///
    /// Bounds may only tighten: a derived `min` must not be lower than the
    /// base one, a derived `max` not higher. Kinds without arguments are
    /// idempotent. Any other repeated kind must carry the same arguments.
    pub fn merge(base: &Contracts, derived: &Contracts) -> Result<Contracts, Diagnostic> {
        let mut merged = base.with_role(Role::Value);
        for contract in &derived.0 {
            let Some(index) = merged.0.iter().position(|c| c.kind == contract.kind) else {
                merged.0.push(contract.clone());
                continue;
            };
            let existing = &merged.0[index];
            let tightens = match (contract.kind, existing.bound(), contract.bound()) {
                (ContractKind::Min, Some(base), Some(derived)) => derived >= base,
                (ContractKind::Max, Some(base), Some(derived)) => derived <= base,
                _ => existing.args == contract.args,
            };
            if !tightens {
                let mut diagnostic = contract
                    .error(format!(
                        "Contract '{contract}' conflicts with the base contract '{existing}'."
                    ))
                    .with_code(ErrorCode::E302);
                if let Some(label) = existing.label("Base contract is here.") {
                    diagnostic = diagnostic.with_labeled(label);
                }
                return Err(diagnostic);
            }
            merged.0[index] = contract.clone();
        }
        Ok(merged)
    }

    pub(crate) fn push(&mut self, contract: Contract) {
        match self.0.iter_mut().find(|c| c.kind == contract.kind) {
            Some(existing) => *existing = contract,
            None => self.0.push(contract),
        }
    }
}

impl FromIterator<Contract> for Contracts {
    fn from_iter<T: IntoIterator<Item = Contract>>(iter: T) -> Self {
        let mut contracts = Contracts::new();
        for contract in iter {
            contracts.push(contract);
        }
        contracts
    }
}

impl fmt::Display for Contracts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<_> = self.0.iter().map(Contract::to_string).collect();
        write!(f, "[{}]", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contracts(list: &[(ContractKind, &[&str])]) -> Contracts {
        list.iter()
            .map(|(kind, args)| Contract::new(*kind, args))
            .collect()
    }

    #[test]
    fn test_merge_tightens_bounds() {
        let base = contracts(&[
            (ContractKind::Integer, &[]),
            (ContractKind::Min, &["0"]),
            (ContractKind::Max, &["255"]),
        ]);
        let derived = contracts(&[(ContractKind::Min, &["10"]), (ContractKind::Max, &["100"])]);
        let merged = Contracts::merge(&base, &derived).unwrap();

        assert_eq!(merged.to_string(), "[integer min(10) max(100)]");
    }

    #[test]
    fn test_merge_rejects_loosening() {
        let base = contracts(&[(ContractKind::Min, &["0"])]);
        let derived = contracts(&[(ContractKind::Min, &["-5"])]);
        let err = Contracts::merge(&base, &derived).unwrap_err();

        assert_eq!(err.code(), Some(ErrorCode::E302));
        assert_eq!(
            err.message(),
            "Contract 'min(-5)' conflicts with the base contract 'min(0)'."
        );
    }

    #[test]
    fn test_merge_keeps_only_base_value_contracts() {
        let base = contracts(&[(ContractKind::Integer, &[]), (ContractKind::Executor, &[])]);
        let derived = contracts(&[(ContractKind::Integer, &[]), (ContractKind::Init, &[])]);
        let merged = Contracts::merge(&base, &derived).unwrap();

        assert_eq!(merged.to_string(), "[integer init]");
    }

    #[test]
    fn test_merge_ignores_base_instance_contracts() {
        let base = contracts(&[(ContractKind::Executor, &["a"]), (ContractKind::Mandatory, &[])]);
        let derived =
            contracts(&[(ContractKind::Executor, &["b"]), (ContractKind::Mandatory, &[])]);
        let merged = Contracts::merge(&base, &derived).unwrap();

        assert_eq!(merged.to_string(), "[mandatory executor(b)]");
    }
}
