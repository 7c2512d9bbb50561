use bdl_parser::{Diagnostic, ParseError, error::ErrorCode};

use crate::{
    contract::{Contract, ContractKind, Contracts},
    literal::Literal,
};

#[derive(Debug, Clone, Copy)]
enum Check {
    Integer,
    Float,
    Boolean,
    String,
    Min(f64),
    Max(f64),
}

impl Check {
    fn install(contract: &Contract) -> Option<Self> {
        Some(match contract.kind() {
            ContractKind::Integer => Check::Integer,
            ContractKind::Float => Check::Float,
            ContractKind::Boolean => Check::Boolean,
            ContractKind::String => Check::String,
            ContractKind::Min => Check::Min(contract.bound()?),
            ContractKind::Max => Check::Max(contract.bound()?),
            // Convertible needs the symbol table, it is checked when binding arguments.
            _ => return None,
        })
    }

    fn run(self, value: &Literal) -> Result<(), String> {
        let failure = match (self, value) {
            (Check::Integer, Literal::Integer(_))
            | (Check::Float, Literal::Integer(_) | Literal::Float(_))
            | (Check::Boolean, Literal::Boolean(_))
            | (Check::String, Literal::String(_)) => None,
            (Check::Integer | Check::Float | Check::Boolean | Check::String, _) => Some(format!(
                "The value {value} is not {}.",
                match self {
                    Check::Integer => "an integer",
                    Check::Float => "a number",
                    Check::Boolean => "a boolean",
                    _ => "a string",
                }
            )),
            (Check::Min(min), value) => match value.as_f64() {
                Some(number) if number < min => {
                    Some(format!("The value {value} is lower than the minimum of {min}."))
                }
                Some(_) => None,
                None => Some(format!("The value {value} is not a number.")),
            },
            (Check::Max(max), value) => match value.as_f64() {
                Some(number) if number > max => {
                    Some(format!("The value {value} is higher than the maximum of {max}."))
                }
                Some(_) => None,
                None => Some(format!("The value {value} is not a number.")),
            },
        };
        failure.map_or(Ok(()), Err)
    }
}

/// Checks compiled from a set of contracts.
#[derive(Debug)]
pub struct Validation<'c> {
    checks: Vec<(Check, &'c Contract)>,
}

impl<'c> Validation<'c> {
    /// Install a check for every contract that constrains a value.
    pub fn new(contracts: &'c Contracts) -> Self {
        Self {
            checks: contracts
                .iter()
                .filter_map(|contract| Check::install(contract).map(|check| (check, contract)))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check against `value`, collecting all failures.
    ///
    /// A value that is not known at compile time passes. `locate` turns a
    /// failure message into a diagnostic pointing at the checked value.
    pub fn validate(
        &self,
        value: Option<&Literal>,
        locate: impl Fn(String) -> Diagnostic,
    ) -> Result<(), ParseError> {
        let Some(value) = value else {
            return Ok(());
        };
        let diagnostics: Vec<Diagnostic> = self
            .checks
            .iter()
            .filter_map(|(check, contract)| {
                check.run(value).err().map(|message| {
                    let diagnostic = locate(message).with_code(ErrorCode::E300);
                    match contract.label(format!("Contract '{contract}' is declared here.")) {
                        Some(label) => diagnostic.with_labeled(label),
                        None => diagnostic,
                    }
                })
            })
            .collect();
        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(ParseError::new(diagnostics))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(contracts: &[(ContractKind, &[&str])], value: Literal) -> Result<(), ParseError> {
        let contracts: Contracts = contracts
            .iter()
            .map(|(kind, args)| Contract::new(*kind, args))
            .collect();
        Validation::new(&contracts).validate(Some(&value), Diagnostic::error)
    }

    #[test]
    fn test_bounds() {
        let bounds: &[(ContractKind, &[&str])] =
            &[(ContractKind::Min, &["10"]), (ContractKind::Max, &["20"])];

        assert!(validate(bounds, Literal::Integer(15)).is_ok());
        let err = validate(bounds, Literal::Integer(9)).unwrap_err();
        assert_eq!(
            err.diagnostics()[0].message(),
            "The value 9 is lower than the minimum of 10."
        );
        let err = validate(bounds, Literal::Float(20.5)).unwrap_err();
        assert_eq!(
            err.diagnostics()[0].message(),
            "The value 20.5 is higher than the maximum of 20."
        );
    }

    #[test]
    fn test_collects_all_failures() {
        let contracts: &[(ContractKind, &[&str])] =
            &[(ContractKind::Integer, &[]), (ContractKind::Min, &["0"])];
        let err = validate(contracts, Literal::Float(-1.5)).unwrap_err();

        assert_eq!(err.diagnostics().len(), 2);
        assert!(err.diagnostics().iter().all(|d| d.code() == Some(ErrorCode::E300)));
    }

    #[test]
    fn test_type_checks() {
        assert!(validate(&[(ContractKind::Float, &[])], Literal::Integer(1)).is_ok());
        assert!(validate(&[(ContractKind::String, &[])], Literal::Boolean(true)).is_err());
        assert!(validate(&[(ContractKind::Boolean, &[])], Literal::Boolean(false)).is_ok());
    }

    #[test]
    fn test_convertible_is_not_a_value_check() {
        let contracts: Contracts = [Contract::new(ContractKind::Convertible, &["Sink"])]
            .into_iter()
            .collect();

        assert!(Validation::new(&contracts).is_empty());
    }

    #[test]
    fn test_unknown_value_passes() {
        let contracts: Contracts = [Contract::new(ContractKind::Min, &["10"])]
            .into_iter()
            .collect();

        assert!(Validation::new(&contracts).validate(None, Diagnostic::error).is_ok());
    }
}
