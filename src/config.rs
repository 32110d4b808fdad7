// ABOUTME: Crate-wide constants

pub const VERSION: &str = "0.1.0";
pub const WELCOME_MESSAGE: &str = "sexpr-core REPL";
pub const WELCOME_SUBTITLE: &str = "A small evaluator core: value stack, call trace, pattern matcher, applicator, evaluator";

/// Both the value stack and the call trace have a fixed capacity;
/// overflowing either is fatal rather than a recoverable error.
pub const VALUE_STACK_CAPACITY: usize = 2048;
pub const CALL_TRACE_CAPACITY: usize = 256;

pub const HISTORY_FILE: &str = ".sexpr_core_history";
