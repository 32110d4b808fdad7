// ABOUTME: Primitive-operation table: enough arithmetic, comparison and
// ABOUTME: list builtins to exercise the Applicator's Primitive arm

use crate::env::Environment;
use crate::error::EvalError;
use crate::value::Value;
use std::rc::Rc;

/// A small, self-contained primitive table: just enough arithmetic,
/// ordering and list operations to exercise the Applicator's
/// `Primitive` arm and drive realistic evaluator scenarios. Operates on
/// `Int` directly rather than promoting through a single numeric type,
/// since `Int` and `Float` are kept as distinct `Value` variants.
pub fn register(env: &Rc<Environment>) {
    for (name, f) in [
        ("+", add as crate::value::PrimitiveFn),
        ("-", sub),
        ("*", mul),
        ("/", div),
        ("%", rem),
        ("<", lt),
        (">", gt),
        ("<=", le),
        (">=", ge),
        ("=", num_eq),
        ("eq?", eq_predicate),
        ("list", list),
        ("cons", cons),
        ("car", car),
        ("cdr", cdr),
        ("empty?", empty_predicate),
    ] {
        env.extend(crate::interner::intern_symbol(name), Value::Primitive(Rc::from(name), f));
    }
}

fn as_int(v: &Value, position: usize) -> Result<i64, EvalError> {
    match v {
        Value::Int(n) => Ok(*n),
        other => Err(EvalError::type_error("", "int", other, position)),
    }
}

fn add(args: &[Value]) -> Result<Value, EvalError> {
    let mut sum = 0i64;
    for (i, a) in args.iter().enumerate() {
        sum += as_int(a, i)?;
    }
    Ok(Value::Int(sum))
}

fn sub(args: &[Value]) -> Result<Value, EvalError> {
    if args.is_empty() {
        return Err(EvalError::arity_error("", "at least 1", 0));
    }
    let first = as_int(&args[0], 0)?;
    if args.len() == 1 {
        return Ok(Value::Int(-first));
    }
    let mut result = first;
    for (i, a) in args[1..].iter().enumerate() {
        result -= as_int(a, i + 1)?;
    }
    Ok(Value::Int(result))
}

fn mul(args: &[Value]) -> Result<Value, EvalError> {
    let mut product = 1i64;
    for (i, a) in args.iter().enumerate() {
        product *= as_int(a, i)?;
    }
    Ok(Value::Int(product))
}

fn div(args: &[Value]) -> Result<Value, EvalError> {
    if args.is_empty() {
        return Err(EvalError::arity_error("", "at least 1", 0));
    }
    let first = as_int(&args[0], 0)?;
    if args.len() == 1 {
        if first == 0 {
            return Err(EvalError::runtime_error("/", "Division by zero"));
        }
        return Ok(Value::Int(1 / first));
    }
    let mut result = first;
    for (i, a) in args[1..].iter().enumerate() {
        let divisor = as_int(a, i + 1)?;
        if divisor == 0 {
            return Err(EvalError::runtime_error("/", "Division by zero"));
        }
        result /= divisor;
    }
    Ok(Value::Int(result))
}

fn rem(args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 2 {
        return Err(EvalError::arity_error("%", crate::error::ARITY_TWO, args.len()));
    }
    let a = as_int(&args[0], 0)?;
    let b = as_int(&args[1], 1)?;
    if b == 0 {
        return Err(EvalError::runtime_error("%", "Division by zero"));
    }
    Ok(Value::Int(a % b))
}

fn pairwise_ordered(args: &[Value], op: impl Fn(i64, i64) -> bool) -> Result<Value, EvalError> {
    for window in args.windows(2) {
        let a = as_int(&window[0], 0)?;
        let b = as_int(&window[1], 1)?;
        if !op(a, b) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn lt(args: &[Value]) -> Result<Value, EvalError> {
    pairwise_ordered(args, |a, b| a < b)
}

fn gt(args: &[Value]) -> Result<Value, EvalError> {
    pairwise_ordered(args, |a, b| a > b)
}

fn le(args: &[Value]) -> Result<Value, EvalError> {
    pairwise_ordered(args, |a, b| a <= b)
}

fn ge(args: &[Value]) -> Result<Value, EvalError> {
    pairwise_ordered(args, |a, b| a >= b)
}

fn num_eq(args: &[Value]) -> Result<Value, EvalError> {
    pairwise_ordered(args, |a, b| a == b)
}

fn eq_predicate(args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 2 {
        return Err(EvalError::arity_error("eq?", crate::error::ARITY_TWO, args.len()));
    }
    Ok(Value::Bool(args[0].obj_eq(&args[1])))
}

fn list(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::list(args.to_vec()))
}

fn cons(args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 2 {
        return Err(EvalError::arity_error("cons", crate::error::ARITY_TWO, args.len()));
    }
    Ok(Value::cons(args[0].clone(), args[1].clone()))
}

fn car(args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::arity_error("car", crate::error::ARITY_ONE, args.len()));
    }
    match &args[0] {
        Value::Cons(cell) => Ok(cell.car.clone()),
        other => Err(EvalError::type_error("car", "cons", other, 0)),
    }
}

fn cdr(args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::arity_error("cdr", crate::error::ARITY_ONE, args.len()));
    }
    match &args[0] {
        Value::Cons(cell) => Ok(cell.cdr.clone()),
        other => Err(EvalError::type_error("cdr", "cons", other, 0)),
    }
}

fn empty_predicate(args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::arity_error("empty?", crate::error::ARITY_ONE, args.len()));
    }
    Ok(Value::Bool(args[0].is_nil()))
}
