//! `Error` and its native subclasses

use super::{arg, define_constructor, define_method, define_value, native};
use crate::error::ErrorKind;
use crate::runtime::interp::{EvalResult, Interpreter};
use crate::runtime::value::{NativeFn, ObjectKind, ObjectRef, Value};

/// Turn `target` into an error instance carrying `message` and `cause`
fn initialize(interp: &mut Interpreter, target: &Value, kind: ErrorKind, args: &[Value]) -> EvalResult<()> {
    let Value::Object(obj) = target else {
        return Ok(());
    };
    let message = match arg(args, 0) {
        Value::Undefined => None,
        other => Some(interp.to_string(&other)?),
    };
    let options = arg(args, 1);
    let cause = if matches!(options, Value::Object(_)) {
        let has_cause = options
            .as_object()
            .is_some_and(|o| o.borrow().properties.contains("cause"));
        if has_cause {
            Some(interp.get_property(&options, "cause")?)
        } else {
            None
        }
    } else {
        None
    };

    let mut o = obj.borrow_mut();
    o.kind = ObjectKind::Error;
    if let Some(message) = &message {
        o.properties
            .define("message".into(), Value::String(message.clone()), false);
    }
    if let Some(cause) = cause {
        o.properties.define("cause".into(), cause, false);
    }
    let stack = format!(
        "{}: {}\n    at <anonymous>",
        kind.name(),
        message.as_deref().unwrap_or("")
    );
    o.properties.define("stack".into(), Value::from(stack), false);
    Ok(())
}

fn constructor_for(kind: ErrorKind) -> (NativeFn, NativeFn) {
    let call = native(move |interp, _this, args| {
        let error = interp.create_error(kind, "");
        if let Value::Object(obj) = &error {
            obj.borrow_mut().properties.remove("message");
        }
        initialize(interp, &error, kind, args)?;
        Ok(error)
    });
    let construct = native(move |interp, this, args| {
        initialize(interp, this, kind, args)?;
        Ok(this.clone())
    });
    (call, construct)
}

pub(super) fn register_error(interp: &mut Interpreter) {
    let base_prototype = interp.intrinsics.error_prototype(ErrorKind::GenericError).clone();

    // Error.prototype.toString
    define_method(interp, &base_prototype, "toString", 0, |interp, this, _args| {
        if !matches!(this, Value::Object(_)) {
            return Err(interp.type_error("Error.prototype.toString requires that 'this' be an Object"));
        }
        let name = match interp.get_property(this, "name")? {
            Value::Undefined => "Error".into(),
            other => interp.to_string(&other)?,
        };
        let message = match interp.get_property(this, "message")? {
            Value::Undefined => "".into(),
            other => interp.to_string(&other)?,
        };
        Ok(Value::from(match (name.is_empty(), message.is_empty()) {
            (true, _) => message.to_string(),
            (false, true) => name.to_string(),
            (false, false) => format!("{}: {}", name, message),
        }))
    });

    let mut base_constructor: Option<ObjectRef> = None;
    for kind in ErrorKind::ALL {
        let prototype = interp.intrinsics.error_prototype(kind).clone();
        define_value(&prototype, "name", Value::from(kind.name()));
        define_value(&prototype, "message", Value::from(""));

        let (call, construct) = constructor_for(kind);
        let constructor = define_constructor(interp, kind.name(), 1, &prototype, call, Some(construct));
        if let Some(base) = &base_constructor {
            constructor.borrow_mut().prototype = Some(base.clone());
        } else {
            base_constructor = Some(constructor);
        }
    }

    if let Some(base) = &base_constructor {
        // Error.captureStackTrace
        define_method(interp, base, "captureStackTrace", 1, |_interp, _this, _args| {
            Ok(Value::Undefined)
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::interp::{Interpreter, Limits};
    use crate::runtime::value::Value;

    fn eval(source: &str) -> Value {
        Interpreter::new(Limits::default(), 1).eval_script(source).unwrap()
    }

    #[test]
    fn test_error_construction() {
        assert_eq!(eval("new Error('boom').message"), Value::from("boom"));
        assert_eq!(eval("String(new TypeError('bad'))"), Value::from("TypeError: bad"));
        assert_eq!(eval("String(Error())"), Value::from("Error"));
        assert_eq!(eval("RangeError('r') instanceof Error"), Value::Boolean(true));
        assert_eq!(eval("Object.keys(new Error('x')).length"), Value::Number(0.0));
        assert_eq!(eval("new Error('x', { cause: 42 }).cause"), Value::Number(42.0));
    }

    #[test]
    fn test_error_subclass() {
        assert_eq!(
            eval(
                "class ValidationError extends Error {
                    constructor(field) { super(field + ' is invalid'); this.name = 'ValidationError'; }
                }
                const e = new ValidationError('email');
                [e instanceof ValidationError, e instanceof Error, String(e)].join()"
            ),
            Value::from("true,true,ValidationError: email is invalid")
        );
    }

    #[test]
    fn test_native_errors_are_catchable() {
        assert_eq!(
            eval("try { null.x } catch (e) { e instanceof TypeError && e.name }"),
            Value::from("TypeError")
        );
        assert_eq!(
            eval("try { missing } catch (e) { e.message }"),
            Value::from("missing is not defined")
        );
    }
}
