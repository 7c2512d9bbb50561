//! Error codes for the BDL diagnostic system.
//!
//! Error codes are organized by phase:
//! - `E1xx` - Syntax errors
//! - `E2xx` - Resolution errors
//! - `E3xx` - Contract errors
//! - `E4xx` - Composition errors

use std::fmt;

/// Error codes for categorizing diagnostic errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Syntax Errors (E1xx)
    // =========================================================================
    /// Invalid syntax.
    ///
    /// No grammar alternative matches the input at this offset.
    E100,

    /// Unexpected end of input.
    ///
    /// The input ended inside a construct that was not terminated.
    E101,

    /// Stalled grammar.
    ///
    /// The grammar kept matching empty patterns without consuming input.
    E102,

    // =========================================================================
    // Resolution Errors (E2xx)
    // =========================================================================
    /// Unresolved symbol.
    E200,

    /// Malformed expression.
    ///
    /// Operator folding did not reduce the expression to a single value.
    E201,

    /// Missing mandatory attribute.
    E202,

    /// Missing mandatory sequence.
    E203,

    /// `this` used outside of an object context.
    E204,

    /// Symbol conflict.
    ///
    /// Two declarations share the same fully-qualified name.
    E205,

    /// Circular include.
    E206,

    /// Include not found.
    E207,

    /// Unexpected element.
    ///
    /// An element appears where its kind is not allowed.
    E208,

    /// Invalid value.
    ///
    /// A literal is malformed or an operator cannot apply to its operands.
    E209,

    /// Invalid parameters.
    ///
    /// Arguments do not match the declared parameters.
    E210,

    /// Circular reference.
    ///
    /// A declaration depends on itself while being resolved.
    E211,

    // =========================================================================
    // Contract Errors (E3xx)
    // =========================================================================
    /// Contract violation.
    E300,

    /// Invalid contract arguments.
    E301,

    /// Contract merge conflict.
    E302,

    /// Unknown contract.
    E303,

    // =========================================================================
    // Composition Errors (E4xx)
    // =========================================================================
    /// Invalid connection sink.
    E400,

    /// Invalid connection source.
    E401,

    /// Connection type mismatch.
    E402,

    /// Sink already connected.
    E403,

    /// Executor mismatch.
    E404,

    /// Lifecycle method with arguments.
    E405,

    /// Dependency cycle.
    E406,

    /// Missing executor.
    E407,

    /// Unsupported composition entry.
    E408,

    /// Recursive composition.
    E409,
}

impl ErrorCode {
    /// Returns the numeric code as a string (e.g., "E100").
    pub fn as_str(&self) -> &'static str {
        match self {
            // Syntax errors
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
            // Resolution errors
            ErrorCode::E200 => "E200",
            ErrorCode::E201 => "E201",
            ErrorCode::E202 => "E202",
            ErrorCode::E203 => "E203",
            ErrorCode::E204 => "E204",
            ErrorCode::E205 => "E205",
            ErrorCode::E206 => "E206",
            ErrorCode::E207 => "E207",
            ErrorCode::E208 => "E208",
            ErrorCode::E209 => "E209",
            ErrorCode::E210 => "E210",
            ErrorCode::E211 => "E211",
            // Contract errors
            ErrorCode::E300 => "E300",
            ErrorCode::E301 => "E301",
            ErrorCode::E302 => "E302",
            ErrorCode::E303 => "E303",
            // Composition errors
            ErrorCode::E400 => "E400",
            ErrorCode::E401 => "E401",
            ErrorCode::E402 => "E402",
            ErrorCode::E403 => "E403",
            ErrorCode::E404 => "E404",
            ErrorCode::E405 => "E405",
            ErrorCode::E406 => "E406",
            ErrorCode::E407 => "E407",
            ErrorCode::E408 => "E408",
            ErrorCode::E409 => "E409",
        }
    }

    /// Returns a short description of what this error code means.
    pub fn description(&self) -> &'static str {
        match self {
            // Syntax errors
            ErrorCode::E100 => "invalid syntax",
            ErrorCode::E101 => "unexpected end of input",
            ErrorCode::E102 => "stalled grammar",
            // Resolution errors
            ErrorCode::E200 => "unresolved symbol",
            ErrorCode::E201 => "malformed expression",
            ErrorCode::E202 => "missing attribute",
            ErrorCode::E203 => "missing sequence",
            ErrorCode::E204 => "this outside of an object",
            ErrorCode::E205 => "symbol conflict",
            ErrorCode::E206 => "circular include",
            ErrorCode::E207 => "include not found",
            ErrorCode::E208 => "unexpected element",
            ErrorCode::E209 => "invalid value",
            ErrorCode::E210 => "invalid parameters",
            ErrorCode::E211 => "circular reference",
            // Contract errors
            ErrorCode::E300 => "contract violation",
            ErrorCode::E301 => "invalid contract arguments",
            ErrorCode::E302 => "contract conflict",
            ErrorCode::E303 => "unknown contract",
            // Composition errors
            ErrorCode::E400 => "invalid sink",
            ErrorCode::E401 => "invalid source",
            ErrorCode::E402 => "connection type mismatch",
            ErrorCode::E403 => "already connected",
            ErrorCode::E404 => "executor mismatch",
            ErrorCode::E405 => "lifecycle method with arguments",
            ErrorCode::E406 => "dependency cycle",
            ErrorCode::E407 => "missing executor",
            ErrorCode::E408 => "unsupported composition entry",
            ErrorCode::E409 => "recursive composition",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
