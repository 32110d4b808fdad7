// ABOUTME: C-ABI marshalling bridge for Foreign values, via libffi

use crate::error::EvalError;
use crate::value::{PtrCell, Value};
use libffi::middle::{Arg, Cif, CodePtr, Type};
use std::ffi::{c_void, CString};
use std::fmt;
use std::rc::Rc;

/// A prepared call descriptor for one foreign function: the native
/// address (if resolved), the argument/return type annotations as given
/// in the declaration, and the `Cif` libffi needs to actually place the
/// call. The `Cif` is built once, at construction, rather than per call.
pub struct ForeignFn {
    pub name: Rc<str>,
    pub arg_types: Vec<Value>,
    pub return_type: Value,
    native: Option<CodePtr>,
    cif: Cif,
}

/// `Cif`/`CodePtr` carry no `Debug` impl of their own; render the parts
/// of a `Foreign` value that matter for diagnostics instead.
impl fmt::Debug for ForeignFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignFn")
            .field("name", &self.name)
            .field("arg_types", &self.arg_types)
            .field("return_type", &self.return_type)
            .field("resolved", &self.native.is_some())
            .finish()
    }
}

impl ForeignFn {
    pub fn new(
        name: Rc<str>,
        arg_types: Vec<Value>,
        return_type: Value,
        native: Option<*mut c_void>,
    ) -> Result<Self, EvalError> {
        let ffi_args = arg_types
            .iter()
            .map(arg_type_for_annotation)
            .collect::<Result<Vec<_>, _>>()?;
        let ffi_result = type_for_annotation(&return_type)?;
        let cif = Cif::new(ffi_args, ffi_result);
        Ok(ForeignFn {
            name,
            arg_types,
            return_type,
            native: native.map(CodePtr::from_ptr),
            cif,
        })
    }

    /// Marshals `args` per `arg_types`, invokes the prepared descriptor,
    /// and unmarshals the result per `return_type`. Arity mismatches are
    /// detected by walking `args` and `arg_types` in lockstep: running
    /// out of `arg_types` first is "Too many arguments", running out of
    /// `args` first is "Too few arguments".
    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        let code = self.native.ok_or_else(|| EvalError::ForeignStub(self.name.to_string()))?;

        let mut marshalled = Vec::with_capacity(args.len());
        let mut args_iter = args.iter();
        let mut types_iter = self.arg_types.iter();
        loop {
            match (args_iter.next(), types_iter.next()) {
                (Some(arg), Some(ty)) => marshalled.push(marshal(arg, ty, &self.name)?),
                (Some(_), None) => {
                    return Err(EvalError::runtime_error(&self.name, "Too many arguments"))
                }
                (None, Some(_)) => {
                    return Err(EvalError::runtime_error(&self.name, "Too few arguments"))
                }
                (None, None) => break,
            }
        }

        let ffi_args: Vec<Arg> = marshalled.iter().map(Marshalled::as_arg).collect();

        // Safety: `self.cif` was built from the same `arg_types`/
        // `return_type` pair used to marshal `ffi_args` above, and `code`
        // is only `Some` when a caller has supplied a genuine function
        // pointer matching this signature.
        unsafe { unmarshal(&self.cif, code, &ffi_args, &self.return_type) }
    }
}

/// Owned storage for one marshalled argument; `Arg`s in libffi borrow
/// from their backing value, so these must outlive the call.
enum Marshalled {
    Int(i64),
    Float(f32),
    /// The `CString` must be kept alive alongside the pointer libffi
    /// actually reads; the pointer is captured once at construction so
    /// `as_arg` can hand out a stable reference to it.
    CStr(CString, *const std::os::raw::c_char),
    Ptr(*mut c_void),
}

impl Marshalled {
    fn new_cstr(s: CString) -> Self {
        let ptr = s.as_ptr();
        Marshalled::CStr(s, ptr)
    }

    fn as_arg(&self) -> Arg {
        match self {
            Marshalled::Int(v) => Arg::new(v),
            Marshalled::Float(v) => Arg::new(v),
            Marshalled::CStr(_, ptr) => Arg::new(ptr),
            Marshalled::Ptr(v) => Arg::new(v),
        }
    }
}

fn annotation_name(annotation: &Value) -> String {
    match annotation {
        Value::Symbol(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn ptr_pointee(annotation: &Value) -> Option<String> {
    let cell = annotation.as_cons()?;
    let head = cell.car.as_symbol()?;
    if &**head != "ptr" {
        return None;
    }
    let rest = cell.cdr.as_cons()?;
    Some(annotation_name(&rest.car))
}

/// Type annotations valid in return-type position: everything `marshal`
/// doesn't need to handle, plus `bool` (a foreign function may hand back
/// a C int interpreted as bool, but nothing marshals a dynamic `Value`
/// into one — see `marshal`, which has no `"bool"` arm).
fn type_for_annotation(annotation: &Value) -> Result<Type, EvalError> {
    if ptr_pointee(annotation).is_some() {
        return Ok(Type::pointer());
    }
    match annotation.as_symbol().map(|s| &**s) {
        Some("int") => Ok(Type::i64()),
        Some("float") => Ok(Type::f32()),
        Some("string") => Ok(Type::pointer()),
        Some("bool") => Ok(Type::c_int()),
        Some("void") => Ok(Type::void()),
        _ => Err(EvalError::UnsupportedForeignType(annotation_name(annotation))),
    }
}

/// Type annotations valid in argument-type position. `bool` is excluded:
/// per the marshalling table, a foreign call never marshals a `Value`
/// into a `bool`-typed argument slot, so accepting it here would only
/// defer the rejection from construction time to call time.
fn arg_type_for_annotation(annotation: &Value) -> Result<Type, EvalError> {
    if annotation.as_symbol().map(|s| &**s) == Some("bool") {
        return Err(EvalError::UnsupportedForeignType(annotation_name(annotation)));
    }
    type_for_annotation(annotation)
}

fn marshal(arg: &Value, annotation: &Value, function: &str) -> Result<Marshalled, EvalError> {
    if ptr_pointee(annotation).is_some() {
        return match arg {
            Value::Ptr(p) => Ok(Marshalled::Ptr(p.addr)),
            other => Err(EvalError::type_error(function, "ptr", other, 0)),
        };
    }
    match (annotation.as_symbol().map(|s| &**s), arg) {
        (Some("int"), Value::Int(n)) => Ok(Marshalled::Int(*n)),
        (Some("float"), Value::Float(n)) => Ok(Marshalled::Float(*n)),
        (Some("string"), Value::String(s)) => {
            CString::new(s.borrow().as_bytes())
                .map(Marshalled::new_cstr)
                .map_err(|_| EvalError::runtime_error(function, "string argument contains a NUL byte"))
        }
        (_, other) => Err(EvalError::type_error(
            function,
            &annotation_name(annotation),
            other,
            0,
        )),
    }
}

/// # Safety
/// Caller must ensure `cif` was built from types matching `args` and
/// `code` points to a function matching that signature.
unsafe fn unmarshal(cif: &Cif, code: CodePtr, args: &[Arg], return_type: &Value) -> Result<Value, EvalError> {
    if ptr_pointee(return_type).is_some() {
        let addr: *mut c_void = cif.call(code, args);
        let pointee = ptr_pointee(return_type).unwrap();
        return Ok(Value::Ptr(Rc::new(PtrCell { pointee: Rc::from(pointee.as_str()), addr })));
    }
    match return_type.as_symbol().map(|s| &**s) {
        Some("int") => Ok(Value::Int(cif.call(code, args))),
        Some("float") => Ok(Value::Float(cif.call(code, args))),
        Some("bool") => {
            let raw: i32 = cif.call(code, args);
            Ok(Value::Bool(raw != 0))
        }
        Some("void") => {
            let (): () = cif.call(code, args);
            Ok(Value::Nil)
        }
        Some("string") => {
            let ptr: *const std::os::raw::c_char = cif.call(code, args);
            if ptr.is_null() {
                Ok(Value::string(""))
            } else {
                let cstr = std::ffi::CStr::from_ptr(ptr);
                Ok(Value::string(cstr.to_string_lossy().into_owned()))
            }
        }
        other => Err(EvalError::UnsupportedForeignType(
            other.map(str::to_string).unwrap_or_else(|| return_type.to_string()),
        )),
    }
}
