//! Operator folding of expression fragments.
//!
//! Unary `+`/`-` bind first, then `*`/`/`, then `+`/`-`, each pass
//! left to right. A well formed expression folds to exactly one value.

use bdl_parser::{Span, error::ErrorCode};

use crate::literal::Literal;

/// A binary or unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "*" => Operator::Mul,
            "/" => Operator::Div,
            _ => return None,
        })
    }

    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }
}

/// An input of the folding passes.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// An operand; `None` when it has no literal value.
    Operand(Option<Literal>, Span),
    Operator(Operator, Span),
}

impl Term {
    fn span(&self) -> Span {
        match self {
            Term::Operand(_, span) | Term::Operator(_, span) => *span,
        }
    }
}

/// Why folding failed, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldError {
    pub span: Span,
    pub message: String,
    pub code: ErrorCode,
}

impl FoldError {
    fn new(span: Span, message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            span,
            message: message.into(),
            code,
        }
    }

    fn malformed(span: Span) -> Self {
        Self::new(span, "This expression is malformed.", ErrorCode::E201)
    }
}

/// Fold `terms` into a single literal.
///
/// ```
/// # use bdl::fold::{fold, Operator, Term};
/// # use bdl::Literal;
/// # use bdl_parser::Span;
/// let at = Span::default();
/// let terms = vec![
///     Term::Operand(Some(Literal::Integer(2)), at),
///     Term::Operator(Operator::Add, at),
///     Term::Operand(Some(Literal::Integer(3)), at),
///     Term::Operator(Operator::Mul, at),
///     Term::Operand(Some(Literal::Integer(4)), at),
/// ];
/// assert_eq!(fold(terms), Ok(Literal::Integer(14)));
/// ```
pub fn fold(mut terms: Vec<Term>) -> Result<Literal, FoldError> {
    let whole = terms
        .iter()
        .map(Term::span)
        .reduce(|acc, span| acc.union(span))
        .unwrap_or_default();

    fold_unary(&mut terms)?;
    fold_binary(&mut terms, &[Operator::Mul, Operator::Div])?;
    fold_binary(&mut terms, &[Operator::Add, Operator::Sub])?;

    match terms.as_slice() {
        [Term::Operand(Some(literal), _)] => Ok(literal.clone()),
        [Term::Operand(None, span)] => Err(FoldError::new(
            *span,
            "This operand has no literal value.",
            ErrorCode::E209,
        )),
        _ => Err(FoldError::malformed(whole)),
    }
}

/// Apply `+`/`-` found at the start or right after another operator.
/// Scans right to left so `- -1` folds inside out.
fn fold_unary(terms: &mut Vec<Term>) -> Result<(), FoldError> {
    let mut index = terms.len();
    while index > 0 {
        index -= 1;
        let Term::Operator(operator, span) = terms[index] else {
            continue;
        };
        let prefix = index == 0 || matches!(terms[index - 1], Term::Operator(..));
        if !prefix || !matches!(operator, Operator::Add | Operator::Sub) {
            continue;
        }
        let Some(Term::Operand(operand, operand_span)) = terms.get(index + 1).cloned() else {
            continue;
        };
        let literal = operand.ok_or_else(|| non_literal(operator, operand_span))?;
        let value = match (operator, literal) {
            (Operator::Add, literal @ (Literal::Integer(_) | Literal::Float(_))) => literal,
            (Operator::Sub, Literal::Integer(value)) => Literal::Integer(
                value
                    .checked_neg()
                    .ok_or_else(|| FoldError::new(span, "Integer overflow.", ErrorCode::E209))?,
            ),
            (Operator::Sub, Literal::Float(value)) => Literal::Float(-value),
            (_, literal) => {
                return Err(FoldError::new(
                    span,
                    format!(
                        "Operator '{}' cannot be applied to a {}.",
                        operator.symbol(),
                        literal.type_name()
                    ),
                    ErrorCode::E209,
                ));
            }
        };
        terms.splice(
            index..index + 2,
            [Term::Operand(Some(value), span.union(operand_span))],
        );
    }
    Ok(())
}

fn fold_binary(terms: &mut Vec<Term>, operators: &[Operator]) -> Result<(), FoldError> {
    let mut index = 1;
    while index + 1 < terms.len() {
        let (
            Term::Operand(left, left_span),
            Term::Operator(operator, span),
            Term::Operand(right, right_span),
        ) = (&terms[index - 1], &terms[index], &terms[index + 1])
        else {
            index += 1;
            continue;
        };
        if !operators.contains(operator) {
            index += 2;
            continue;
        }
        let left = left.clone().ok_or_else(|| non_literal(*operator, *left_span))?;
        let right = right.clone().ok_or_else(|| non_literal(*operator, *right_span))?;
        let value = apply(*operator, left, right, *span)?;
        let whole = left_span.union(*right_span);
        terms.splice(index - 1..index + 2, [Term::Operand(Some(value), whole)]);
    }
    Ok(())
}

fn non_literal(operator: Operator, span: Span) -> FoldError {
    FoldError::new(
        span,
        format!(
            "Operator '{}' requires operands with a literal value.",
            operator.symbol()
        ),
        ErrorCode::E209,
    )
}

fn apply(
    operator: Operator,
    left: Literal,
    right: Literal,
    span: Span,
) -> Result<Literal, FoldError> {
    let overflow = || FoldError::new(span, "Integer overflow.", ErrorCode::E209);
    match (left, right) {
        (Literal::Integer(a), Literal::Integer(b)) => {
            let value = match operator {
                Operator::Add => a.checked_add(b),
                Operator::Sub => a.checked_sub(b),
                Operator::Mul => a.checked_mul(b),
                Operator::Div => {
                    if b == 0 {
                        return Err(FoldError::new(span, "Division by zero.", ErrorCode::E209));
                    }
                    a.checked_div(b)
                }
            };
            value.map(Literal::Integer).ok_or_else(overflow)
        }
        (Literal::String(a), Literal::String(b)) if operator == Operator::Add => {
            Ok(Literal::String(a + &b))
        }
        (left, right) => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => {
                let value = match operator {
                    Operator::Add => a + b,
                    Operator::Sub => a - b,
                    Operator::Mul => a * b,
                    Operator::Div => {
                        if b == 0.0 {
                            return Err(FoldError::new(span, "Division by zero.", ErrorCode::E209));
                        }
                        a / b
                    }
                };
                Ok(Literal::Float(value))
            }
            _ => Err(FoldError::new(
                span,
                format!(
                    "Operator '{}' cannot be applied to a {} and a {}.",
                    operator.symbol(),
                    left.type_name(),
                    right.type_name()
                ),
                ErrorCode::E209,
            )),
        },
    }
}
