//! Diagnostic error system shared by every BDL compilation phase.
//!
//! Phases report [`Diagnostic`]s; fatal results are wrapped in a
//! [`ParseError`]. Labels carry the [`Context`](crate::context::Context) they
//! point into, so a single diagnostic can reference several source files.

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;
mod render;
mod severity;

pub use collector::DiagnosticCollector;
pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;
pub use parse_error::{ParseError, Result};
pub use severity::Severity;
