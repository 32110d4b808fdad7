// ABOUTME: Recursive evaluator: special forms, general application, top-level drivers

use crate::env::Environment;
use crate::error::EvalError;
use crate::stack::ValueStack;
use crate::trace::{CallTrace, Frame};
use crate::value::{Closure, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Per-evaluation context threaded through every recursive call, replacing
/// the process-wide latched-error cell with an explicit `Result` and the
/// process-wide value stack/call trace with state owned by one
/// interpreter instance, so multiple evaluators (e.g. concurrent tests)
/// never share mutable globals.
pub struct Interpreter {
    pub stack: ValueStack,
    pub trace: CallTrace,
    pub global_env: Rc<Environment>,
}

impl Interpreter {
    pub fn new(global_env: Rc<Environment>) -> Self {
        Interpreter { stack: ValueStack::new(), trace: CallTrace::new(), global_env }
    }
}

/// Top-level entry point: resets the per-evaluation stack and call trace,
/// evaluates `form`, and returns its value.
pub fn eval(interp: &mut Interpreter, env: &Rc<Environment>, form: Value) -> Result<Value, EvalError> {
    interp.stack.reset();
    interp.trace.reset();
    eval_form(interp, env, &form)
}

/// Reads zero or more top-level forms out of `text` and evaluates each in
/// turn, reporting success or failure per form and resetting the stack
/// and call trace between forms so one bad form doesn't corrupt the next.
pub fn eval_text(interp: &mut Interpreter, env: &Rc<Environment>, text: &str, print_results: bool) {
    let forms = match crate::parser::read_string(text) {
        Ok(forms) => forms,
        Err(parse_err) => {
            eprintln!("Parse error: {parse_err}");
            return;
        }
    };
    for form in forms {
        match eval(interp, env, form) {
            Ok(value) => {
                if print_results {
                    println!("{value}");
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                if !interp.trace.is_empty() {
                    eprint!("{}", interp.trace.render());
                }
            }
        }
        interp.stack.reset();
        interp.trace.reset();
    }
}

/// Evaluates a proper list of forms in sequence, returning the last
/// result, or Nil if the list is empty. Shared by `do` and closure/macro
/// bodies.
pub fn eval_body(interp: &mut Interpreter, body: &Value, env: &Rc<Environment>) -> Result<Value, EvalError> {
    let mut result = Value::Nil;
    for form in body.iter_list() {
        result = eval_form(interp, env, form)?;
    }
    Ok(result)
}

pub fn eval_form(interp: &mut Interpreter, env: &Rc<Environment>, form: &Value) -> Result<Value, EvalError> {
    match form {
        Value::Cons(_) => eval_list(interp, env, form),
        Value::Environment(src) => eval_environment_literal(interp, env, src),
        Value::Symbol(name) => env
            .lookup(name)
            .ok_or_else(|| EvalError::UndefinedSymbol(name.to_string())),
        other => Ok(other.clone()),
    }
}

fn eval_environment_literal(
    interp: &mut Interpreter,
    env: &Rc<Environment>,
    src: &Rc<Environment>,
) -> Result<Value, EvalError> {
    let copy = src.shallow_copy();
    for binding in copy.bindings() {
        let unevaluated = binding.value.borrow().clone();
        let evaluated = eval_form(interp, env, &unevaluated)?;
        *binding.value.borrow_mut() = evaluated;
    }
    Ok(Value::Environment(Rc::new(copy)))
}

fn eval_list(interp: &mut Interpreter, env: &Rc<Environment>, form: &Value) -> Result<Value, EvalError> {
    let cell = form.as_cons().expect("eval_list called on a non-Cons form");
    if let Value::Symbol(head) = &cell.car {
        match &**head {
            "do" => return eval_body(interp, &cell.cdr, env),
            "let" => return eval_let(interp, env, &cell.cdr),
            "not" => return eval_not(interp, env, &cell.cdr),
            "quote" => return Ok(cell.cdr.iter_list().next().cloned().unwrap_or(Value::Nil)),
            "while" => return eval_while(interp, env, &cell.cdr),
            "if" => return eval_if(interp, env, &cell.cdr),
            "match" => return eval_match(interp, env, &cell.cdr),
            "reset!" => return eval_reset(interp, env, &cell.cdr),
            "fn" => return eval_fn(env, &cell.cdr, false),
            "macro" => return eval_fn(env, &cell.cdr, true),
            "def" => return eval_def(interp, env, &cell.cdr),
            "def?" => return eval_defp(env, &cell.cdr),
            _ => {}
        }
    }
    eval_call(interp, env, form)
}

fn eval_let(interp: &mut Interpreter, env: &Rc<Environment>, rest: &Value) -> Result<Value, EvalError> {
    let rest_cell = rest
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error("let", "No bindings in 'let' form."))?;
    let let_env = Environment::with_parent(env);
    let mut cursor = &rest_cell.car;
    loop {
        match cursor {
            Value::Nil => break,
            Value::Cons(cell) => {
                let sym = cell
                    .car
                    .as_symbol()
                    .cloned()
                    .ok_or_else(|| EvalError::runtime_error("let", "Must bind to symbol in let form."))?;
                let value_cell = cell.cdr.as_cons().ok_or(EvalError::UnevenBindingList)?;
                let value = eval_form(interp, &let_env, &value_cell.car)?;
                let_env.extend(sym, value);
                cursor = &value_cell.cdr;
            }
            _ => return Err(EvalError::runtime_error("let", "Malformed let bindings.")),
        }
    }
    let body_cell = rest_cell
        .cdr
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error("let", "No body in 'let' form."))?;
    eval_form(interp, &let_env, &body_cell.car)
}

fn eval_not(interp: &mut Interpreter, env: &Rc<Environment>, rest: &Value) -> Result<Value, EvalError> {
    for form in rest.iter_list() {
        if eval_form(interp, env, form)?.is_truthy() {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn eval_while(interp: &mut Interpreter, env: &Rc<Environment>, rest: &Value) -> Result<Value, EvalError> {
    let cond_cell = rest
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error("while", "No condition in 'while' form."))?;
    let body_cell = cond_cell
        .cdr
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error("while", "No body in 'while' form."))?;
    while eval_form(interp, env, &cond_cell.car)?.is_truthy() {
        eval_form(interp, env, &body_cell.car)?;
    }
    Ok(Value::Nil)
}

fn eval_if(interp: &mut Interpreter, env: &Rc<Environment>, rest: &Value) -> Result<Value, EvalError> {
    let cond_cell = rest
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error("if", "No condition in 'if' form."))?;
    let then_cell = cond_cell
        .cdr
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error("if", "No then-branch in 'if' form."))?;
    let else_cell = then_cell
        .cdr
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error("if", "No else-branch in 'if' form."))?;
    if eval_form(interp, env, &cond_cell.car)?.is_truthy() {
        eval_form(interp, env, &then_cell.car)
    } else {
        eval_form(interp, env, &else_cell.car)
    }
}

fn eval_match(interp: &mut Interpreter, env: &Rc<Environment>, rest: &Value) -> Result<Value, EvalError> {
    let value_cell = rest
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error("match", "No value in 'match' form."))?;
    let value = eval_form(interp, env, &value_cell.car)?;
    let mut clauses = value_cell.cdr.iter_list();
    loop {
        let pattern = match clauses.next() {
            Some(p) => p,
            None => return Err(EvalError::NoMatchingClause),
        };
        let result_form = clauses.next().ok_or(EvalError::UnevenMatchClauses)?;
        let clause_env = Environment::with_parent(env);
        if crate::pattern::matches(pattern, &value, &clause_env) {
            return eval_form(interp, &clause_env, result_form);
        }
    }
}

fn eval_reset(interp: &mut Interpreter, env: &Rc<Environment>, rest: &Value) -> Result<Value, EvalError> {
    let key_cell = rest
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error("reset!", "Too few args to 'reset!'."))?;
    let sym = key_cell
        .car
        .as_symbol()
        .cloned()
        .ok_or_else(|| EvalError::runtime_error("reset!", "Must use 'reset!' on a symbol."))?;
    let value_cell = key_cell
        .cdr
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error("reset!", "No value in 'reset!' form."))?;
    match env.lookup_binding(&sym) {
        Some(binding) => {
            let new_val = eval_form(interp, env, &value_cell.car)?;
            *binding.value.borrow_mut() = new_val.clone();
            Ok(new_val)
        }
        None => {
            // A lookup miss and a corrupted binding's non-symbol key slot
            // are indistinguishable through `env_lookup_binding`; both
            // take this diagnostic-and-Nil path rather than raising.
            eprintln!("Can't reset! binding '{sym}', it's unbound");
            Ok(Value::Nil)
        }
    }
}

fn eval_fn(env: &Rc<Environment>, rest: &Value, is_macro: bool) -> Result<Value, EvalError> {
    let label = if is_macro { "macro" } else { "fn" };
    let params_cell = rest
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error(label, "form too short (no parameter list or body)."))?;
    let body_cell = params_cell
        .cdr
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error(label, "form too short (no body)."))?;
    let closure = Rc::new(Closure {
        params: params_cell.car.clone(),
        body: body_cell.car.clone(),
        env: Rc::clone(env),
        name: RefCell::new(None),
    });
    Ok(if is_macro { Value::Macro(closure) } else { Value::Lambda(closure) })
}

fn eval_def(interp: &mut Interpreter, env: &Rc<Environment>, rest: &Value) -> Result<Value, EvalError> {
    let key_cell = rest
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error("def", "Too few args to 'def'."))?;
    let sym = key_cell
        .car
        .as_symbol()
        .cloned()
        .ok_or_else(|| EvalError::runtime_error("def", "Can't assign to non-symbol."))?;
    let value_cell = key_cell
        .cdr
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error("def", "No value in 'def' form."))?;
    let value = eval_form(interp, env, &value_cell.car)?;
    if let Value::Lambda(c) | Value::Macro(c) = &value {
        if c.name.borrow().is_none() {
            *c.name.borrow_mut() = Some(Rc::clone(&sym));
        }
    }
    env.global_extend(sym, value.clone());
    Ok(value)
}

fn eval_defp(env: &Rc<Environment>, rest: &Value) -> Result<Value, EvalError> {
    let key_cell = rest
        .as_cons()
        .ok_or_else(|| EvalError::runtime_error("def?", "Too few args to 'def?'."))?;
    let sym = key_cell
        .car
        .as_symbol()
        .ok_or_else(|| EvalError::runtime_error("def?", "Must check a symbol."))?;
    Ok(Value::Bool(env.lookup_binding(sym).is_some()))
}

/// General call: evaluates the operator; macros receive their arguments
/// unevaluated and have their expansion re-evaluated in `env` (the
/// caller's environment), not the macro's own captured environment.
/// Everything else evaluates its arguments left to right, pushing each
/// onto the value stack before popping them into an ordered array, then
/// hands off to the Applicator with a call-trace frame around the call.
fn eval_call(interp: &mut Interpreter, env: &Rc<Environment>, form: &Value) -> Result<Value, EvalError> {
    let cell = form.as_cons().expect("eval_call called on a non-Cons form");
    let callee = eval_form(interp, env, &cell.car)?;

    if let Value::Macro(closure) = &callee {
        let raw_args: Vec<Value> = cell.cdr.iter_list().cloned().collect();
        for arg in &raw_args {
            interp.stack.push(arg.clone());
        }
        let args = interp.stack.pop_n(raw_args.len());
        let name = closure.name.borrow().as_deref().unwrap_or("macro").to_string();
        let calling_env = Environment::extend_with_args(&closure.env, &name, &closure.params, &args)?;
        let expanded = eval_form(interp, &calling_env, &closure.body)?;
        return eval_form(interp, env, &expanded);
    }

    let mut count = 0usize;
    for arg_form in cell.cdr.iter_list() {
        let value = eval_form(interp, env, arg_form)?;
        interp.stack.push(value);
        count += 1;
    }
    let args = interp.stack.pop_n(count);

    interp.trace.push(Frame { callee: callee.clone(), args: args.clone() }, &interp.stack);
    let result = crate::apply::apply(interp, &callee, &args);
    if result.is_ok() {
        interp.trace.pop();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::intern_symbol;

    fn fresh() -> (Rc<Environment>, Interpreter) {
        let env = Environment::new();
        let interp = Interpreter::new(Rc::clone(&env));
        (env, interp)
    }

    #[test]
    fn self_evaluating_literals_evaluate_to_themselves() {
        let (env, mut interp) = fresh();
        assert!(matches!(eval(&mut interp, &env, Value::Int(5)).unwrap(), Value::Int(5)));
        assert!(matches!(eval(&mut interp, &env, Value::Bool(true)).unwrap(), Value::Bool(true)));
        assert!(eval(&mut interp, &env, Value::Nil).unwrap().is_nil());
    }

    #[test]
    fn symbol_lookup_reports_the_exact_source_message() {
        let (env, mut interp) = fresh();
        let err = eval(&mut interp, &env, Value::symbol("missing")).unwrap_err();
        assert_eq!(err.to_string(), "Can't find 'missing' in environment.");
    }

    #[test]
    fn quote_returns_the_form_unevaluated() {
        let (env, mut interp) = fresh();
        let quoted = Value::list(vec![
            Value::symbol("quote"),
            Value::list(vec![Value::symbol("a"), Value::symbol("b")]),
        ]);
        let result = eval(&mut interp, &env, quoted).unwrap();
        assert_eq!(result.to_string(), "(a b)");
    }

    #[test]
    fn empty_do_returns_nil() {
        let (env, mut interp) = fresh();
        let form = Value::list(vec![Value::symbol("do")]);
        assert!(eval(&mut interp, &env, form).unwrap().is_nil());
    }

    #[test]
    fn do_returns_the_last_forms_value() {
        let (env, mut interp) = fresh();
        let form = Value::list(vec![Value::symbol("do"), Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(matches!(eval(&mut interp, &env, form).unwrap(), Value::Int(3)));
    }

    #[test]
    fn if_picks_branch_by_truthiness() {
        let (env, mut interp) = fresh();
        let then_branch = Value::list(vec![
            Value::symbol("if"),
            Value::Bool(true),
            Value::Int(1),
            Value::Int(2),
        ]);
        assert!(matches!(eval(&mut interp, &env, then_branch).unwrap(), Value::Int(1)));

        let else_branch = Value::list(vec![
            Value::symbol("if"),
            Value::Nil,
            Value::Int(1),
            Value::Int(2),
        ]);
        assert!(matches!(eval(&mut interp, &env, else_branch).unwrap(), Value::Int(2)));
    }

    #[test]
    fn not_is_true_only_when_every_argument_is_falsy() {
        let (env, mut interp) = fresh();
        let all_false = Value::list(vec![Value::symbol("not"), Value::Bool(false), Value::Nil]);
        assert!(matches!(eval(&mut interp, &env, all_false).unwrap(), Value::Bool(true)));

        let one_true = Value::list(vec![Value::symbol("not"), Value::Bool(false), Value::Int(1)]);
        assert!(matches!(eval(&mut interp, &env, one_true).unwrap(), Value::Bool(false)));
    }

    #[test]
    fn def_binds_in_the_global_environment_and_returns_the_value() {
        let (env, mut interp) = fresh();
        let child = Environment::with_parent(&env);
        let form = Value::list(vec![Value::symbol("def"), Value::symbol("x"), Value::Int(7)]);
        let result = eval(&mut interp, &child, form).unwrap();
        assert!(matches!(result, Value::Int(7)));
        assert!(matches!(env.lookup("x"), Some(Value::Int(7))));
    }

    #[test]
    fn def_question_mark_reports_whether_a_binding_exists() {
        let (env, mut interp) = fresh();
        env.extend(intern_symbol("x"), Value::Int(1));
        let yes = Value::list(vec![Value::symbol("def?"), Value::symbol("x")]);
        let no = Value::list(vec![Value::symbol("def?"), Value::symbol("y")]);
        assert!(matches!(eval(&mut interp, &env, yes).unwrap(), Value::Bool(true)));
        assert!(matches!(eval(&mut interp, &env, no).unwrap(), Value::Bool(false)));
    }

    #[test]
    fn reset_on_undefined_symbol_prints_a_diagnostic_and_returns_nil_instead_of_erroring() {
        let (env, mut interp) = fresh();
        let form = Value::list(vec![Value::symbol("reset!"), Value::symbol("ghost"), Value::Int(1)]);
        let result = eval(&mut interp, &env, form).unwrap();
        assert!(result.is_nil());
    }

    #[test]
    fn reset_mutates_an_existing_binding_in_place() {
        let (env, mut interp) = fresh();
        env.extend(intern_symbol("x"), Value::Int(1));
        let form = Value::list(vec![Value::symbol("reset!"), Value::symbol("x"), Value::Int(9)]);
        let result = eval(&mut interp, &env, form).unwrap();
        assert!(matches!(result, Value::Int(9)));
        assert!(matches!(env.lookup("x"), Some(Value::Int(9))));
    }

    #[test]
    fn let_bindings_are_visible_to_later_bindings_and_the_body() {
        let (env, mut interp) = fresh();
        let form = Value::list(vec![
            Value::symbol("let"),
            Value::list(vec![
                Value::symbol("a"),
                Value::Int(1),
                Value::symbol("b"),
                Value::symbol("a"),
            ]),
            Value::symbol("b"),
        ]);
        assert!(matches!(eval(&mut interp, &env, form).unwrap(), Value::Int(1)));
    }

    #[test]
    fn while_loops_until_the_condition_is_falsy() {
        let (env, mut interp) = fresh();
        env.extend(intern_symbol("n"), Value::Int(0));
        let cond = Value::list(vec![Value::symbol("not"), Value::list(vec![Value::symbol("def?"), Value::symbol("done")])]);
        // A simple termination: reset! n a few times then def 'done' so the
        // condition goes false. Exercises while/reset!/def? together.
        let body = Value::list(vec![
            Value::symbol("if"),
            Value::list(vec![Value::symbol("not"), Value::symbol("n")]),
            Value::list(vec![Value::symbol("def"), Value::symbol("done"), Value::Bool(true)]),
            Value::list(vec![Value::symbol("reset!"), Value::symbol("n"), Value::Bool(false)]),
        ]);
        let form = Value::list(vec![Value::symbol("while"), cond, body]);
        assert!(eval(&mut interp, &env, form).unwrap().is_nil());
        assert!(matches!(env.lookup("done"), Some(Value::Bool(true))));
    }

    #[test]
    fn match_binds_the_first_matching_clause_in_a_fresh_environment() {
        let (env, mut interp) = fresh();
        let form = Value::list(vec![
            Value::symbol("match"),
            Value::list(vec![Value::Int(1), Value::Int(2)]),
            Value::list(vec![Value::symbol("a"), Value::symbol("b")]),
            Value::symbol("b"),
        ]);
        assert!(matches!(eval(&mut interp, &env, form).unwrap(), Value::Int(2)));
    }

    #[test]
    fn match_with_no_matching_clause_is_an_error() {
        let (env, mut interp) = fresh();
        let form = Value::list(vec![
            Value::symbol("match"),
            Value::Int(1),
            Value::list(vec![Value::symbol("quote"), Value::Int(2)]),
            Value::Int(99),
        ]);
        let err = eval(&mut interp, &env, form).unwrap_err();
        assert!(matches!(err, EvalError::NoMatchingClause));
    }

    #[test]
    fn closures_capture_their_defining_environment_not_the_call_site() {
        let (global, mut interp) = fresh();
        let make_adder = Value::list(vec![
            Value::symbol("fn"),
            Value::list(vec![Value::symbol("n")]),
            Value::list(vec![
                Value::symbol("fn"),
                Value::list(vec![Value::symbol("x")]),
                Value::symbol("n"),
            ]),
        ]);
        let make_adder_fn = eval(&mut interp, &global, make_adder).unwrap();
        global.extend(intern_symbol("make-adder"), make_adder_fn);

        let make5 = Value::list(vec![Value::symbol("make-adder"), Value::Int(5)]);
        let add5 = eval(&mut interp, &global, make5).unwrap();

        let call_env = Environment::new();
        call_env.extend(intern_symbol("the-adder"), add5);
        call_env.extend(intern_symbol("n"), Value::Int(999));
        let call_form = Value::list(vec![Value::symbol("the-adder"), Value::Int(1)]);
        let result = eval(&mut interp, &call_env, call_form).unwrap();
        assert!(matches!(result, Value::Int(5)));
    }

    #[test]
    fn macro_expansion_is_evaluated_in_the_callers_environment() {
        let macro_home = Environment::new();
        let mut interp = Interpreter::new(Rc::clone(&macro_home));
        let macro_form = Value::list(vec![
            Value::symbol("macro"),
            Value::Nil,
            Value::list(vec![Value::symbol("quote"), Value::symbol("x")]),
        ]);
        let m = eval(&mut interp, &macro_home, macro_form).unwrap();

        let caller_env = Environment::new();
        caller_env.extend(intern_symbol("m"), m);
        caller_env.extend(intern_symbol("x"), Value::Int(42));
        let call_form = Value::list(vec![Value::symbol("m")]);
        let result = eval(&mut interp, &caller_env, call_form).unwrap();
        assert!(matches!(result, Value::Int(42)));
    }

    #[test]
    fn call_arguments_evaluate_left_to_right() {
        let (env, mut interp) = fresh();
        env.extend(intern_symbol("counter"), Value::Int(0));
        let step = Value::list(vec![
            Value::symbol("fn"),
            Value::list(vec![Value::symbol("n")]),
            Value::list(vec![
                Value::symbol("do"),
                Value::list(vec![Value::symbol("reset!"), Value::symbol("counter"), Value::symbol("n")]),
                Value::symbol("n"),
            ]),
        ]);
        let step_fn = eval(&mut interp, &env, step).unwrap();
        env.extend(intern_symbol("step"), step_fn);

        let picker = Value::list(vec![
            Value::symbol("fn"),
            Value::list(vec![Value::symbol("a"), Value::symbol("b")]),
            Value::symbol("b"),
        ]);
        let picker_fn = eval(&mut interp, &env, picker).unwrap();
        env.extend(intern_symbol("picker"), picker_fn);

        let call = Value::list(vec![
            Value::symbol("picker"),
            Value::list(vec![Value::symbol("step"), Value::Int(1)]),
            Value::list(vec![Value::symbol("step"), Value::Int(2)]),
        ]);
        let result = eval(&mut interp, &env, call).unwrap();
        assert!(matches!(result, Value::Int(2)));
        assert!(matches!(env.lookup("counter"), Some(Value::Int(2))));
    }

    #[test]
    fn eval_leaves_the_value_stack_and_call_trace_empty_on_success() {
        let (env, mut interp) = fresh();
        let lambda_form = Value::list(vec![Value::symbol("fn"), Value::Nil, Value::Int(1)]);
        let lambda = eval(&mut interp, &env, lambda_form).unwrap();
        env.extend(intern_symbol("f"), lambda);
        let call = Value::list(vec![Value::symbol("f")]);
        eval(&mut interp, &env, call).unwrap();
        assert!(interp.stack.is_empty());
        assert!(interp.trace.is_empty());
    }

    #[test]
    fn a_failed_call_leaves_its_frame_on_the_trace_for_diagnostics() {
        let (env, mut interp) = fresh();
        let call = Value::list(vec![Value::symbol("not-a-function")]);
        env.extend(intern_symbol("not-a-function"), Value::Int(1));
        let err = eval(&mut interp, &env, call).unwrap_err();
        assert!(matches!(err, EvalError::NotCallable(_)));
        assert_eq!(interp.trace.len(), 1);
    }
}
