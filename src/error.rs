// ABOUTME: Error types for evaluation failures

use crate::value::Value;
use thiserror::Error;

// ===== Arity constant strings (eliminates allocations in error paths) =====
pub const ARITY_ONE: &str = "1";
pub const ARITY_TWO: &str = "2";
pub const ARITY_AT_LEAST_ONE: &str = "at least 1";
pub const ARITY_ONE_OR_TWO: &str = "1-2";

#[derive(Error, Debug, Clone)]
pub enum EvalError {
    /// Symbol lookup failed against every environment in the parent chain.
    #[error("Can't find '{0}' in environment.")]
    UndefinedSymbol(String),

    /// A special form received a form of the wrong shape (e.g. `if` with
    /// no condition, `fn` with a non-list parameter list).
    #[error("{function}: expected {expected}, got {actual} at argument {position}")]
    TypeMismatch {
        function: String,
        expected: String,
        actual: String,
        position: usize,
    },

    /// Arity mismatch calling a closure, primitive or foreign function.
    #[error("{function}: expected {expected} argument{}, got {actual}", if *.expected == "1" { "" } else { "s" })]
    ArityError {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Catch-all for special-form misuse that doesn't fit a more specific
    /// variant (malformed `let` binding list, `&` with no rest name, ...).
    #[error("{function}: {message}")]
    RuntimeError { function: String, message: String },

    /// A `match` form ran out of clauses without a match, or was given an
    /// uneven number of pattern/body forms.
    #[error("No matching clause in match form")]
    NoMatchingClause,

    #[error("match requires an even number of pattern/body forms")]
    UnevenMatchClauses,

    /// `let`'s binding list was not a proper list of symbol/value pairs.
    #[error("let requires an even number of forms in its binding list")]
    UnevenBindingList,

    /// Attempted to call a value that isn't Lambda/Macro/Primitive/Foreign/
    /// Keyword.
    #[error("{0} is not callable")]
    NotCallable(String),

    /// A `(keyword-value environment)` lookup failed or was given a
    /// non-Environment argument.
    #[error("{0}")]
    KeywordLookupFailed(String),

    /// A foreign call's declared argument or return type has no
    /// marshalling rule.
    #[error("Unsupported foreign type: {0}")]
    UnsupportedForeignType(String),

    /// A `Foreign` value had no resolved function pointer; calling it
    /// reports an error instead of crashing.
    #[error("Foreign function '{0}' has no resolved address (stub — funptr is NULL)")]
    ForeignStub(String),
}

impl EvalError {
    pub fn type_error(function: &str, expected: &str, actual: &Value, position: usize) -> Self {
        EvalError::TypeMismatch {
            function: function.to_string(),
            expected: expected.to_string(),
            actual: actual.type_name().to_string(),
            position,
        }
    }

    pub fn arity_error(function: &str, expected: impl Into<String>, actual: usize) -> Self {
        EvalError::ArityError {
            function: function.to_string(),
            expected: expected.into(),
            actual,
        }
    }

    pub fn runtime_error(function: &str, message: impl Into<String>) -> Self {
        EvalError::RuntimeError {
            function: function.to_string(),
            message: message.into(),
        }
    }
}
