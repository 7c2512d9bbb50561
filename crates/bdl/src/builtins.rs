//! Compiler-provided declarations and the shared, read-only prelude.
//!
//! The [`Prelude`] is built once per process (or per [`Compiler`]) and
//! shared through an [`Arc`]: it holds the grammar, the builtin table and
//! the contract registry, none of which change after construction.
//!
//! [`Compiler`]: crate::Compiler

use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;

use bdl_parser::grammar::{Grammar, GrammarError};

use crate::{
    contract::{Contract, ContractKind, ContractRegistry, Contracts},
    grammar,
};

/// Name of the builtin type accepting any value.
pub const ANY: &str = "Any";

/// Name of the meta builtin wiring two interface members together.
pub const CONNECT: &str = "connect";

/// A parameter accepted by a builtin.
#[derive(Debug, Clone)]
pub struct BuiltinParameter {
    name: &'static str,
    variadic: bool,
    contracts: Contracts,
}

impl BuiltinParameter {
    fn new(name: &'static str, contracts: &[(ContractKind, &[&str])]) -> Self {
        Self {
            name,
            variadic: false,
            contracts: contracts
                .iter()
                .map(|(kind, args)| Contract::new(*kind, args))
                .collect(),
        }
    }

    fn variadic(name: &'static str, contracts: &[(ContractKind, &[&str])]) -> Self {
        Self {
            variadic: true,
            ..Self::new(name, contracts)
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn contracts(&self) -> &Contracts {
        &self.contracts
    }
}

/// A compiler-provided type or meta operator.
#[derive(Debug, Clone)]
pub struct Builtin {
    name: &'static str,
    contracts: Contracts,
    parameters: Vec<BuiltinParameter>,
    meta: bool,
}

impl Builtin {
    fn new(name: &'static str, contracts: &[(ContractKind, &[&str])]) -> Self {
        Self {
            name,
            contracts: contracts
                .iter()
                .map(|(kind, args)| Contract::new(*kind, args))
                .collect(),
            parameters: Vec::new(),
            meta: false,
        }
    }

    /// A type whose single `value` parameter carries its literal.
    fn scalar(name: &'static str, contracts: &[(ContractKind, &[&str])]) -> Self {
        let mut builtin = Self::new(name, contracts);
        builtin.parameters = vec![BuiltinParameter::new("value", contracts)];
        builtin
    }

    fn with_parameters(mut self, parameters: Vec<BuiltinParameter>) -> Self {
        self.parameters = parameters;
        self
    }

    fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Value contracts inherited by every declaration of this type.
    pub fn contracts(&self) -> &Contracts {
        &self.contracts
    }

    pub fn parameters(&self) -> &[BuiltinParameter] {
        &self.parameters
    }

    /// Meta operators act on the composition instead of producing a value.
    pub fn is_meta(&self) -> bool {
        self.meta
    }

    /// Whether the literal of a call is the literal of its `value` argument.
    pub fn is_scalar(&self) -> bool {
        self.parameters.len() == 1 && self.parameters[0].name == "value"
    }
}

fn builtins() -> Vec<Builtin> {
    use ContractKind as K;

    vec![
        Builtin::new(ANY, &[]),
        Builtin::new("Void", &[]),
        Builtin::scalar("Integer", &[(K::Integer, &[])]),
        Builtin::scalar("Float", &[(K::Float, &[])]),
        Builtin::scalar("Boolean", &[(K::Boolean, &[])]),
        Builtin::scalar("Byte", &[(K::Integer, &[]), (K::Min, &["0"]), (K::Max, &["255"])]),
        Builtin::scalar("String", &[(K::String, &[])]),
        Builtin::new("Result", &[]),
        Builtin::new("Async", &[]),
        Builtin::new("Array", &[])
            .with_parameters(vec![BuiltinParameter::variadic("values", &[])]),
        Builtin::new("Vector", &[])
            .with_parameters(vec![BuiltinParameter::variadic("values", &[])]),
        Builtin::new("Callable", &[]),
        Builtin::new("list", &[])
            .with_parameters(vec![BuiltinParameter::variadic("values", &[])])
            .meta(),
        Builtin::new(CONNECT, &[])
            .with_parameters(vec![
                BuiltinParameter::new("source", &[(K::Mandatory, &[])]),
                BuiltinParameter::variadic("sinks", &[(K::Mandatory, &[])]),
            ])
            .meta(),
        Builtin::new("bind", &[])
            .with_parameters(vec![BuiltinParameter::variadic("values", &[])])
            .meta(),
    ]
}

/// Everything a compilation shares and never mutates.
#[derive(Debug)]
pub struct Prelude {
    grammar: Grammar,
    builtins: IndexMap<&'static str, Builtin>,
    contracts: ContractRegistry,
}

impl Prelude {
    /// Build the grammar, the builtin table and the contract registry.
    ///
    /// # Errors
    ///
    /// Fails only if the grammar patterns are invalid.
    pub fn new() -> Result<Arc<Self>, GrammarError> {
        let grammar = grammar::build()?;
        let builtins: IndexMap<_, _> = builtins()
            .into_iter()
            .map(|builtin| (builtin.name, builtin))
            .collect();
        debug!(builtins = builtins.len(); "Prelude ready");
        Ok(Arc::new(Self {
            grammar,
            builtins,
            contracts: ContractRegistry::new(),
        }))
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn builtin(&self, name: &str) -> Option<&Builtin> {
        self.builtins.get(name)
    }

    pub fn builtins(&self) -> impl Iterator<Item = &Builtin> {
        self.builtins.values()
    }

    pub fn contracts(&self) -> &ContractRegistry {
        &self.contracts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_builtins() {
        let prelude = Prelude::new().unwrap();

        let byte = prelude.builtin("Byte").unwrap();
        assert!(byte.is_scalar());
        assert_eq!(byte.contracts().to_string(), "[integer min(0) max(255)]");

        let connect = prelude.builtin(CONNECT).unwrap();
        assert!(connect.is_meta());
        assert!(connect.parameters()[1].is_variadic());

        assert!(!prelude.builtin("Vector").unwrap().is_scalar());
        assert!(prelude.builtin("Unknown").is_none());
    }
}
