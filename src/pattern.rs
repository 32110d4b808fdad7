// ABOUTME: Structural pattern matching against a fresh environment

use crate::env::Environment;
use crate::value::Value;
use std::rc::Rc;

const REST_MARKER: &str = "&";

/// Attempts to match `pattern` against `subject`, extending `env` with
/// any bindings the pattern introduces. Returns whether the match
/// succeeded; on failure, bindings already added to `env` are left in
/// place (each attempt in a `match` form is given its own fresh
/// environment so this never leaks between clauses).
pub fn matches(pattern: &Value, subject: &Value, env: &Rc<Environment>) -> bool {
    if let Some(quoted) = quoted_pattern(pattern) {
        return quoted.obj_eq(subject);
    }
    if let Value::Symbol(name) = pattern {
        env.extend(Rc::clone(name), subject.clone());
        return true;
    }
    if matches!(pattern, Value::Cons(_)) && matches!(subject, Value::Cons(_) | Value::Nil) {
        return list_match(pattern, subject, env);
    }
    pattern.obj_eq(subject)
}

fn quoted_pattern(pattern: &Value) -> Option<&Value> {
    let cell = pattern.as_cons()?;
    let head = cell.car.as_symbol()?;
    if &**head != "quote" {
        return None;
    }
    let rest = cell.cdr.as_cons()?;
    if !rest.cdr.is_nil() {
        return None;
    }
    Some(&rest.car)
}

fn list_match(pattern: &Value, subject: &Value, env: &Rc<Environment>) -> bool {
    let mut pat_cursor = pattern;
    let mut subj_cursor = subject;
    loop {
        match pat_cursor {
            Value::Cons(pat_cell) => {
                if let Value::Symbol(head) = &pat_cell.car {
                    if &**head == REST_MARKER {
                        let rest_pattern = match &pat_cell.cdr {
                            Value::Cons(rest_cell) => &rest_cell.car,
                            _ => return false,
                        };
                        return matches(rest_pattern, subj_cursor, env);
                    }
                }
                let subj_cell = match subj_cursor {
                    Value::Cons(cell) => cell,
                    _ => return false,
                };
                if !matches(&pat_cell.car, &subj_cell.car, env) {
                    return false;
                }
                pat_cursor = &pat_cell.cdr;
                subj_cursor = &subj_cell.cdr;
            }
            Value::Nil => return subj_cursor.is_nil(),
            other => return matches(other, subj_cursor, env),
        }
    }
}
