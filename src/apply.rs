// ABOUTME: Dispatches a callable Value against already-evaluated arguments

use crate::env::Environment;
use crate::error::EvalError;
use crate::eval::{eval_form, Interpreter};
use crate::value::Value;
use std::rc::Rc;

/// Applies `callable` to `args`, dispatching on the callable's variant
/// per the Applicator's contract. `Lambda` recurses back into the
/// Evaluator for its body; everything else is self-contained.
pub fn apply(interp: &mut Interpreter, callable: &Value, args: &[Value]) -> Result<Value, EvalError> {
    match callable {
        Value::Lambda(closure) => {
            let name = closure.name.borrow().as_deref().unwrap_or("lambda").to_string();
            let call_env = Environment::extend_with_args(&closure.env, &name, &closure.params, args)?;
            eval_form(interp, &call_env, &closure.body)
        }
        Value::Primitive(name, f) => f(args).map_err(|e| annotate(name, e)),
        Value::Foreign(foreign) => foreign.call(args),
        Value::Keyword(key) => apply_keyword(key, args),
        other => Err(EvalError::NotCallable(other.to_string())),
    }
}

/// Primitives report type/arity errors without knowing their own name
/// (they're plain `fn(&[Value]) -> Result<Value, EvalError>` pointers);
/// the Applicator knows the name they were bound under, so it fills in
/// any error variant left blank at the call site.
fn annotate(name: &str, err: EvalError) -> EvalError {
    match err {
        EvalError::RuntimeError { function, message } if function.is_empty() => {
            EvalError::RuntimeError { function: name.to_string(), message }
        }
        EvalError::TypeMismatch { function, expected, actual, position } if function.is_empty() => {
            EvalError::TypeMismatch { function: name.to_string(), expected, actual, position }
        }
        EvalError::ArityError { function, expected, actual } if function.is_empty() => {
            EvalError::ArityError { function: name.to_string(), expected, actual }
        }
        other => other,
    }
}

fn apply_keyword(key: &Rc<str>, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::arity_error(&format!(":{key}"), "1", args.len()));
    }
    let env = match &args[0] {
        Value::Environment(env) => env,
        other => return Err(EvalError::type_error(&format!(":{key}"), "environment", other, 0)),
    };
    env.lookup(key)
        .ok_or_else(|| EvalError::KeywordLookupFailed(format!("Failed to lookup keyword :{key}")))
}
