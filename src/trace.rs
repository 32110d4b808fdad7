// ABOUTME: Fixed-capacity trace of in-flight calls, for diagnostics on error

use crate::config::CALL_TRACE_CAPACITY;
use crate::stack::ValueStack;
use crate::value::Value;
use std::fmt;

/// One in-flight call frame: the callable being applied and the
/// arguments it was given, kept only long enough to print a trace if
/// something below it goes wrong.
pub struct Frame {
    pub callee: Value,
    pub args: Vec<Value>,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.callee)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, ")")
    }
}

/// A fixed-capacity trace of in-flight calls: pushed immediately before
/// the Applicator enters a non-macro call, popped immediately after iff
/// the call succeeded. A call trace left non-empty on return from
/// `eval_text` indicates a bug in the evaluator itself, not a user error,
/// so overflow is fatal rather than a recoverable `EvalError`.
pub struct CallTrace {
    frames: Vec<Frame>,
    capacity: usize,
}

impl CallTrace {
    pub fn new() -> Self {
        CallTrace::with_capacity(CALL_TRACE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        CallTrace { frames: Vec::new(), capacity }
    }

    /// Pushes a frame; on overflow, prints both the value stack and the
    /// call trace before aborting, matching `eval.c`'s
    /// `stack_print()`/`function_trace_print()` pairing at its own
    /// function-trace-overflow check.
    pub fn push(&mut self, frame: Frame, stack: &ValueStack) {
        if self.frames.len() >= self.capacity {
            panic!(
                "call trace overflow: exceeded depth of {} calls\n{}{}",
                self.capacity,
                stack.render(),
                self.render()
            );
        }
        self.frames.push(frame);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn reset(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Renders the trace innermost-call-last, for inclusion in a
    /// fatal-overflow panic message or a top-level error report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (depth, frame) in self.frames.iter().enumerate() {
            out.push_str(&format!("  {depth}: {frame}\n"));
        }
        out
    }
}

impl Default for CallTrace {
    fn default() -> Self {
        CallTrace::new()
    }
}
