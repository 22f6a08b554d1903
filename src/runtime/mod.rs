//! Script runtime for learner and test code
//!
//! This module provides the tree-walking interpreter, the value model and
//! the built-in library. [`Runtime`] wraps an [`Interpreter`] for embedders
//! that only need to evaluate code and exchange globals.

pub mod builtins;
pub mod inspect;
mod interp;
pub mod number;
mod scope;
mod value;

pub use interp::{EvalResult, Exception, Hint, Interpreter, Limits, MAX_ARRAY_LENGTH, MAX_STRING_LENGTH};
pub use number::number_to_string;
pub use scope::BindingKind;
pub use value::{
    BoundFunction, Closure, FunctionKind, Key, Name, NativeFn, NativeFunction, Object, ObjectKind,
    ObjectRef, OrderedMap, RegExpData, Value,
};

use crate::error::{Error, Result};

/// Seed used for `Math.random` when the embedder does not pick one
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// A self-contained script realm
pub struct Runtime {
    interp: Interpreter,
}

impl Runtime {
    /// Create a runtime with the default limits
    pub fn new() -> Self {
        Self::with_limits(Limits::default(), DEFAULT_RANDOM_SEED)
    }

    /// Create a runtime with explicit limits and `Math.random` seed
    pub fn with_limits(limits: Limits, random_seed: u64) -> Self {
        Self {
            interp: Interpreter::new(limits, random_seed),
        }
    }

    /// Evaluate a script; declarations persist across calls
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        self.interp.eval_script(source)
    }

    /// Get a global value
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.interp.get_global(name)
    }

    /// Set a global value
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.interp.define_global(name, value);
    }

    /// Register a host function as a global.
    ///
    /// A [`Error::RuntimeError`] returned by `func` is thrown into the script
    /// as an error of the same kind; any other error aborts evaluation.
    pub fn register_function<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        let function = self
            .interp
            .native_function(name, 0, move |interp, _this, args| {
                func(args).map_err(|error| match error {
                    Error::RuntimeError { kind, message } => interp.throw(kind, message),
                    other => Exception::from(other),
                })
            });
        self.interp.define_global(name, function);
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interp
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_runtime_eval() {
        let mut runtime = Runtime::new();
        let result = runtime.eval("1 + 2").unwrap();
        assert_eq!(result, Value::Number(3.0));
    }

    #[test]
    fn test_runtime_variables() {
        let mut runtime = Runtime::new();
        runtime.eval("let x = 10;").unwrap();
        let result = runtime.eval("x * 2").unwrap();
        assert_eq!(result, Value::Number(20.0));
    }

    #[test]
    fn test_runtime_globals() {
        let mut runtime = Runtime::new();
        runtime.set_global("limit", Value::Number(3.0));
        runtime.eval("var doubled = limit * 2").unwrap();
        assert_eq!(runtime.get_global("doubled"), Some(Value::Number(6.0)));
        assert_eq!(runtime.get_global("nothing"), None);
    }

    #[test]
    fn test_register_function() {
        let mut runtime = Runtime::new();
        runtime.register_function("sum", |args| {
            Ok(Value::Number(args.iter().filter_map(Value::as_number).sum()))
        });
        runtime.register_function("reject", |_args| {
            Err(Error::RuntimeError {
                kind: ErrorKind::RangeError,
                message: "nope".into(),
            })
        });
        assert_eq!(runtime.eval("sum(1, 2, 3)").unwrap(), Value::Number(6.0));
        assert_eq!(
            runtime.eval("try { reject() } catch (e) { e.name + ': ' + e.message }").unwrap(),
            Value::from("RangeError: nope")
        );
    }
}
