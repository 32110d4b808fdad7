// ABOUTME: Ordered, parent-chained variable bindings

use crate::error::EvalError;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A single name/value slot. Held behind `Rc` so `env_lookup_binding` can
/// hand back a reference `reset!` can mutate in place without re-walking
/// the environment chain a second time.
#[derive(Debug)]
pub struct Binding {
    pub key: Rc<str>,
    pub value: RefCell<Value>,
}

/// Ordered bindings plus an optional parent. Lookup walks bindings most-
/// recently-defined first, then falls through to the parent, so a later
/// `def`/`let` of an already-bound name shadows the earlier one without
/// needing to search-and-replace.
#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<VecDeque<Rc<Binding>>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new() -> Rc<Environment> {
        Rc::new(Environment {
            bindings: RefCell::new(VecDeque::new()),
            parent: None,
        })
    }

    pub fn with_parent(parent: &Rc<Environment>) -> Rc<Environment> {
        Rc::new(Environment {
            bindings: RefCell::new(VecDeque::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn parent(&self) -> Option<&Rc<Environment>> {
        self.parent.as_ref()
    }

    /// `env_extend`: adds a binding, shadowing any existing one with the
    /// same name within this environment.
    pub fn extend(&self, key: Rc<str>, value: Value) {
        self.bindings
            .borrow_mut()
            .push_front(Rc::new(Binding { key, value: RefCell::new(value) }));
    }

    /// `env_lookup`: walks this environment then its parent chain,
    /// returning the value of the first matching binding.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.lookup_binding(key).map(|b| b.value.borrow().clone())
    }

    /// `env_lookup_binding`: like `lookup`, but returns the binding slot
    /// itself so callers (namely `reset!`) can mutate it in place.
    pub fn lookup_binding(&self, key: &str) -> Option<Rc<Binding>> {
        if let Some(found) = self.bindings.borrow().iter().find(|b| &*b.key == key) {
            return Some(Rc::clone(found));
        }
        self.parent.as_ref().and_then(|p| p.lookup_binding(key))
    }

    /// `global_env_extend`: walks to the root of the parent chain and
    /// defines the binding there, regardless of which environment this
    /// was called on. Used by `def`.
    pub fn global_extend(self: &Rc<Environment>, key: Rc<str>, value: Value) {
        let mut root = Rc::clone(self);
        while let Some(parent) = root.parent.clone() {
            root = parent;
        }
        root.extend(key, value);
    }

    /// `env_extend_with_args`: binds a proper parameter list (optionally
    /// ending in `& rest`) to an argument slice in a fresh child
    /// environment. Exact-arity mismatch is an error unless a rest
    /// parameter is present to absorb the remainder (or absence) of args.
    pub fn extend_with_args(
        parent: &Rc<Environment>,
        callable_name: &str,
        params: &Value,
        args: &[Value],
    ) -> Result<Rc<Environment>, EvalError> {
        let child = Environment::with_parent(parent);
        let mut cursor = params;
        let mut i = 0usize;
        loop {
            match cursor {
                Value::Cons(cell) => {
                    if let Value::Symbol(s) = &cell.car {
                        if &**s == "&" {
                            let rest_name = match &cell.cdr {
                                Value::Cons(rest_cell) => match &rest_cell.car {
                                    Value::Symbol(rest) => Rc::clone(rest),
                                    _ => {
                                        return Err(EvalError::RuntimeError {
                                            function: callable_name.to_string(),
                                            message: "rest parameter must be a symbol".to_string(),
                                        })
                                    }
                                },
                                _ => {
                                    return Err(EvalError::RuntimeError {
                                        function: callable_name.to_string(),
                                        message: "`&` must be followed by a rest parameter".to_string(),
                                    })
                                }
                            };
                            let rest_values = Value::list(args[i.min(args.len())..].to_vec());
                            child.extend(rest_name, rest_values);
                            i = args.len();
                            break;
                        }
                        if i >= args.len() {
                            return Err(EvalError::ArityError {
                                function: callable_name.to_string(),
                                expected: params.list_len().to_string(),
                                actual: args.len(),
                            });
                        }
                        child.extend(Rc::clone(s), args[i].clone());
                        i += 1;
                        cursor = &cell.cdr;
                    } else {
                        return Err(EvalError::RuntimeError {
                            function: callable_name.to_string(),
                            message: "parameter list must contain only symbols".to_string(),
                        });
                    }
                }
                Value::Nil => break,
                _ => {
                    return Err(EvalError::RuntimeError {
                        function: callable_name.to_string(),
                        message: "parameter list must be a proper list".to_string(),
                    })
                }
            }
        }
        if i < args.len() {
            return Err(EvalError::ArityError {
                function: callable_name.to_string(),
                expected: params.list_len().to_string(),
                actual: args.len(),
            });
        }
        Ok(child)
    }

    /// `obj_copy` for `Environment` values: a fresh environment with the
    /// same parent and a snapshot of the current bindings. Mutating the
    /// copy's bindings afterward does not affect the original.
    pub fn shallow_copy(&self) -> Environment {
        let bindings = self
            .bindings
            .borrow()
            .iter()
            .map(|b| {
                Rc::new(Binding {
                    key: Rc::clone(&b.key),
                    value: RefCell::new(b.value.borrow().clone()),
                })
            })
            .collect();
        Environment {
            bindings: RefCell::new(bindings),
            parent: self.parent.clone(),
        }
    }

    /// Bindings in definition order (most recent first), for the
    /// Evaluator's `Environment` self-evaluation rule, which re-evaluates
    /// each binding's value in the *enclosing* environment.
    pub fn bindings(&self) -> Vec<Rc<Binding>> {
        self.bindings.borrow().iter().cloned().collect()
    }

    pub fn replace_binding_value(&self, key: &str, value: Value) {
        if let Some(binding) = self.bindings.borrow().iter().find(|b| &*b.key == key) {
            *binding.value.borrow_mut() = value;
        }
    }
}
