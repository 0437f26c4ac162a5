//! Errors produced while parsing or evaluating an expression.

use thiserror::Error;

/// Failure modes for the expression sublanguage.
///
/// The engine maps every variant onto `ExpressionEvalFailure`: the enclosing
/// node is marked `ERROR`, the failure never propagates past the node.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    /// The expression text did not parse.
    #[error("parse error at position {pos}: {message}")]
    Parse { pos: usize, message: String },

    /// An identifier referenced a path that doesn't exist in scope.
    #[error("unresolved reference: {0}")]
    UnresolvedRef(String),

    /// An operator was applied to operands of the wrong type.
    #[error("type error: {0}")]
    Type(String),

    /// Evaluation exceeded the CPU budget (operation-count ceiling).
    #[error("expression exceeded evaluation budget ({0} operations)")]
    BudgetExceeded(usize),
}
