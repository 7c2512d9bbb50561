use indexmap::IndexMap;
use log::trace;

use bdl_parser::{Diagnostic, Element, error::ErrorCode};

use crate::{
    attr::{Attr, ElementExt, Nest},
    contract::{Contract, ContractKind, Contracts},
};

/// Argument schema of one contract kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractSpec {
    kind: ContractKind,
    min_args: usize,
    max_args: usize,
    numeric: bool,
}

impl ContractSpec {
    const fn new(kind: ContractKind, min_args: usize, max_args: usize, numeric: bool) -> Self {
        Self {
            kind,
            min_args,
            max_args,
            numeric,
        }
    }

    pub fn kind(&self) -> ContractKind {
        self.kind
    }

    /// Check `args` against this schema.
    fn check(&self, args: &[String]) -> Result<(), String> {
        let count = args.len();
        if count < self.min_args || count > self.max_args {
            let expected = if self.min_args == self.max_args {
                format!("{}", self.min_args)
            } else if self.max_args == usize::MAX {
                format!("at least {}", self.min_args)
            } else {
                format!("{} to {}", self.min_args, self.max_args)
            };
            let singular =
                self.max_args == 1 || (self.min_args == 1 && self.max_args == usize::MAX);
            let plural = if singular { "" } else { "s" };
            return Err(format!(
                "Contract '{}' expects {expected} argument{plural}, got {count}.",
                self.kind
            ));
        }
        if self.numeric {
            if let Some(arg) = args.iter().find(|arg| arg.parse::<f64>().is_err()) {
                return Err(format!(
                    "Contract '{}' expects a numeric argument, got '{arg}'.",
                    self.kind
                ));
            }
        }
        Ok(())
    }
}

/// Schemas of every contract kind, built once per compiler.
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    specs: IndexMap<&'static str, ContractSpec>,
}

impl Default for ContractRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractRegistry {
    pub fn new() -> Self {
        let specs = ContractKind::ALL
            .into_iter()
            .map(|kind| {
                let spec = match kind {
                    ContractKind::Min | ContractKind::Max => ContractSpec::new(kind, 1, 1, true),
                    ContractKind::Executor => ContractSpec::new(kind, 0, 1, false),
                    ContractKind::Convertible => ContractSpec::new(kind, 1, usize::MAX, false),
                    _ => ContractSpec::new(kind, 0, 0, false),
                };
                (kind.as_str(), spec)
            })
            .collect();
        Self { specs }
    }

    pub fn get(&self, name: &str) -> Option<&ContractSpec> {
        self.specs.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.keys().copied()
    }

    /// Parse one contract element.
    pub fn parse(&self, element: &Element) -> Result<Contract, Diagnostic> {
        let name = element.assert_has_attr(Attr::Type.as_str())?.value();
        let spec = self.get(name).ok_or_else(|| {
            let known: Vec<_> = self.names().collect();
            element
                .error(format!("Unknown contract '{name}'."))
                .with_code(ErrorCode::E303)
                .with_help(format!("known contracts are: {}", known.join(", ")))
        })?;
        let args: Vec<String> = element
            .nested_iter(Nest::Values)
            .filter_map(|value| value.get(Attr::Value))
            .map(str::to_string)
            .collect();
        spec.check(&args)
            .map_err(|message| element.error(message).with_code(ErrorCode::E301))?;

        trace!(contract = name, args:? = args; "Parsed contract");
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Ok(Contract::new(spec.kind(), &args).located(element.span(), element.context().cloned()))
    }

    /// Parse every contract element of a sequence.
    pub fn parse_all<'a>(
        &self,
        elements: impl Iterator<Item = &'a Element>,
    ) -> Result<Contracts, Diagnostic> {
        elements.map(|element| self.parse(element)).collect()
    }
}
