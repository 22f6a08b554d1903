//! Built-in functions and objects
//!
//! This module provides the standard built-ins learner code and test code
//! rely on: `Object`, `Function`, `Array`, `String`, `Number`, `Boolean`,
//! `Math`, `JSON`, `Map`, `Set`, `RegExp` and the `Error` family.

use std::rc::Rc;

use super::interp::{EvalResult, Interpreter};
use super::value::{NativeFn, NativeFunction, Object, ObjectKind, ObjectRef, Value};
use crate::error::ErrorKind;

mod array;
mod collections;
mod error;
mod function;
pub mod json;
mod math;
mod object;
pub mod regexp;
mod string;

/// Prototype objects every realm needs before any built-in is registered
pub struct Intrinsics {
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub string_prototype: ObjectRef,
    pub number_prototype: ObjectRef,
    pub boolean_prototype: ObjectRef,
    pub map_prototype: ObjectRef,
    pub set_prototype: ObjectRef,
    pub regexp_prototype: ObjectRef,
    error_prototypes: Vec<(ErrorKind, ObjectRef)>,
}

impl Intrinsics {
    pub fn new() -> Self {
        let object_prototype = Object::new(ObjectKind::Ordinary, None).into_ref();
        let derive = |parent: &ObjectRef| {
            Object::new(ObjectKind::Ordinary, Some(parent.clone())).into_ref()
        };

        let error_prototype = derive(&object_prototype);
        let mut error_prototypes = vec![(ErrorKind::GenericError, error_prototype.clone())];
        for kind in ErrorKind::ALL {
            if kind != ErrorKind::GenericError {
                error_prototypes.push((kind, derive(&error_prototype)));
            }
        }

        Self {
            function_prototype: derive(&object_prototype),
            array_prototype: derive(&object_prototype),
            string_prototype: derive(&object_prototype),
            number_prototype: derive(&object_prototype),
            boolean_prototype: derive(&object_prototype),
            map_prototype: derive(&object_prototype),
            set_prototype: derive(&object_prototype),
            regexp_prototype: derive(&object_prototype),
            error_prototypes,
            object_prototype,
        }
    }

    pub fn error_prototype(&self, kind: ErrorKind) -> &ObjectRef {
        self.error_prototypes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, prototype)| prototype)
            .unwrap_or(&self.error_prototypes[0].1)
    }
}

impl Default for Intrinsics {
    fn default() -> Self {
        Self::new()
    }
}

/// Register all built-in globals
pub fn install(interp: &mut Interpreter) {
    object::register_object(interp);
    function::register_function(interp);
    array::register_array(interp);
    string::register_string(interp);
    math::register_number(interp);
    math::register_boolean(interp);
    math::register_math(interp);
    math::register_global_functions(interp);
    json::register_json(interp);
    collections::register_map(interp);
    collections::register_set(interp);
    error::register_error(interp);
    regexp::register_regexp(interp);
}

/// Argument `index`, or `undefined` when absent
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

/// Pin a closure to the native function signature
pub(crate) fn native<F>(func: F) -> NativeFn
where
    F: Fn(&mut Interpreter, &Value, &[Value]) -> EvalResult<Value> + 'static,
{
    Rc::new(func)
}

/// Define a non-enumerable native method on `target`
pub(crate) fn define_method<F>(interp: &Interpreter, target: &ObjectRef, name: &str, length: u32, func: F)
where
    F: Fn(&mut Interpreter, &Value, &[Value]) -> EvalResult<Value> + 'static,
{
    let function = interp.native_function(name, length, func);
    target
        .borrow_mut()
        .properties
        .define(name.into(), function, false);
}

/// Define a non-enumerable data property on `target`
pub(crate) fn define_value(target: &ObjectRef, name: &str, value: Value) {
    target
        .borrow_mut()
        .properties
        .define(name.into(), value, false);
}

/// Create a constructor linked to `prototype` and bind it as a global
pub(crate) fn define_constructor(
    interp: &mut Interpreter,
    name: &str,
    length: u32,
    prototype: &ObjectRef,
    call: NativeFn,
    construct: Option<NativeFn>,
) -> ObjectRef {
    let function = NativeFunction {
        name: name.into(),
        length,
        func: call,
        constructor: construct,
    };
    let constructor = Object::new(
        ObjectKind::Native(Rc::new(function)),
        Some(interp.intrinsics.function_prototype.clone()),
    )
    .into_ref();
    define_value(&constructor, "prototype", Value::Object(prototype.clone()));
    define_value(prototype, "constructor", Value::Object(constructor.clone()));
    interp.define_global(name, Value::Object(constructor.clone()));
    constructor
}

/// Callback argument of the higher-order built-ins
pub(crate) fn callback(interp: &Interpreter, args: &[Value], index: usize) -> EvalResult<Value> {
    let function = arg(args, index);
    if function.is_callable() {
        Ok(function)
    } else {
        Err(interp.type_error(format!(
            "{} is not a function",
            interp.display_primitive(&function)
        )))
    }
}

/// Resolve a relative index (negative counts from the end) into `0..=len`
pub(crate) fn relative_index(interp: &mut Interpreter, value: &Value, len: usize, default: usize) -> EvalResult<usize> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = super::number::to_integer(interp.to_number(value)?);
    Ok(if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    })
}
