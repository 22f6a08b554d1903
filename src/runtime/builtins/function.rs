//! `Function.prototype`

use std::rc::Rc;

use super::{arg, define_constructor, define_method, native};
use crate::runtime::interp::Interpreter;
use crate::runtime::value::{BoundFunction, FunctionKind, Object, ObjectKind, Value};

pub(super) fn register_function(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.function_prototype.clone();

    // Function.prototype.call
    define_method(interp, &prototype, "call", 1, |interp, this, args| {
        let receiver = arg(args, 0);
        let rest = args.get(1..).unwrap_or(&[]);
        interp.call(this, &receiver, rest)
    });

    // Function.prototype.apply
    define_method(interp, &prototype, "apply", 2, |interp, this, args| {
        let receiver = arg(args, 0);
        let list = arg(args, 1);
        let list = if list.is_nullish() {
            Vec::new()
        } else if list.is_array() {
            interp.iterate(&list)?
        } else {
            return Err(interp.type_error("CreateListFromArrayLike called on non-object"));
        };
        interp.call(this, &receiver, &list)
    });

    // Function.prototype.bind
    define_method(interp, &prototype, "bind", 1, |interp, this, args| {
        if !this.is_callable() {
            return Err(interp.type_error("Bind must be called on a function"));
        }
        let bound = BoundFunction {
            target: this.clone(),
            this: arg(args, 0),
            args: args.get(1..).unwrap_or(&[]).to_vec(),
        };
        Ok(Value::Object(
            Object::new(
                ObjectKind::BoundFunction(Rc::new(bound)),
                Some(interp.intrinsics.function_prototype.clone()),
            )
            .into_ref(),
        ))
    });

    // Function.prototype.toString
    define_method(interp, &prototype, "toString", 0, |interp, this, _args| {
        let Value::Object(obj) = this else {
            return Err(interp.type_error("Function.prototype.toString requires that 'this' be a Function"));
        };
        let o = obj.borrow();
        let name = o.function_name().unwrap_or_else(|| "".into());
        let text = match &o.kind {
            ObjectKind::Function(closure) if closure.kind == FunctionKind::ClassConstructor => {
                format!("class {} {{ }}", name)
            }
            ObjectKind::Function(closure) if closure.kind == FunctionKind::Arrow => {
                "() => { }".to_string()
            }
            ObjectKind::Function(_) => format!("function {}() {{ }}", name),
            ObjectKind::Native(_) | ObjectKind::BoundFunction(_) => {
                format!("function {}() {{ [native code] }}", name)
            }
            _ => {
                return Err(interp.type_error(
                    "Function.prototype.toString requires that 'this' be a Function",
                ))
            }
        };
        Ok(Value::from(text))
    });

    define_constructor(
        interp,
        "Function",
        1,
        &prototype,
        native(|interp, _this, _args| {
            Err(interp.throw(
                crate::error::ErrorKind::GenericError,
                "Code generation from strings is not supported",
            ))
        }),
        None,
    );
}
