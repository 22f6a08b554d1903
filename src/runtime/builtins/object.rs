//! `Object` and `Object.prototype`

use std::rc::Rc;

use super::{arg, define_constructor, define_method, native};
use crate::runtime::interp::{EvalResult, Interpreter};
use crate::runtime::value::{Key, Name, Object, ObjectKind, ObjectRef, Value};

pub(super) fn register_object(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.object_prototype.clone();

    // Object.prototype.hasOwnProperty
    define_method(interp, &prototype, "hasOwnProperty", 1, |interp, this, args| {
        let key = interp.to_key(&arg(args, 0))?;
        Ok(Value::Boolean(match this {
            Value::Object(obj) => obj.borrow().has_own(&key),
            Value::String(s) => match &key {
                Key::Index(i) => (*i as usize) < s.encode_utf16().count(),
                Key::Name(name) => &**name == "length",
            },
            _ => false,
        }))
    });

    // Object.prototype.propertyIsEnumerable
    define_method(interp, &prototype, "propertyIsEnumerable", 1, |interp, this, args| {
        let key = interp.to_key(&arg(args, 0))?;
        let Value::Object(obj) = this else {
            return Ok(Value::Boolean(false));
        };
        let o = obj.borrow();
        let enumerable = match (&o.kind, &key) {
            (ObjectKind::Array(elements), Key::Index(i)) => (*i as usize) < elements.len(),
            _ => o
                .properties
                .get(&key.to_name())
                .is_some_and(|property| property.enumerable),
        };
        Ok(Value::Boolean(enumerable))
    });

    // Object.prototype.isPrototypeOf
    define_method(interp, &prototype, "isPrototypeOf", 1, |_interp, this, args| {
        let value = arg(args, 0);
        let (Value::Object(this), Value::Object(value)) = (this, &value) else {
            return Ok(Value::Boolean(false));
        };
        let mut current = value.borrow().prototype.clone();
        while let Some(candidate) = current {
            if Rc::ptr_eq(&candidate, this) {
                return Ok(Value::Boolean(true));
            }
            current = candidate.borrow().prototype.clone();
        }
        Ok(Value::Boolean(false))
    });

    // Object.prototype.toString
    define_method(interp, &prototype, "toString", 0, |_interp, this, _args| {
        let tag = match this {
            Value::Undefined => "Undefined",
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Object(obj) => obj.borrow().class_name(),
        };
        Ok(Value::from(format!("[object {}]", tag)))
    });

    // Object.prototype.toLocaleString
    define_method(interp, &prototype, "toLocaleString", 0, |interp, this, _args| {
        Ok(Value::String(interp.to_string(this)?))
    });

    // Object.prototype.valueOf
    define_method(interp, &prototype, "valueOf", 0, |_interp, this, _args| Ok(this.clone()));

    let object = define_constructor(
        interp,
        "Object",
        1,
        &prototype,
        native(|interp, _this, args| Ok(object_from(interp, args))),
        Some(native(|interp, _this, args| Ok(object_from(interp, args)))),
    );

    // Object.keys
    define_method(interp, &object, "keys", 1, |interp, _this, args| {
        let keys = own_keys(interp, &arg(args, 0))?;
        Ok(interp.new_array(keys.into_iter().map(Value::String).collect()))
    });

    // Object.values
    define_method(interp, &object, "values", 1, |interp, _this, args| {
        let target = arg(args, 0);
        let mut values = Vec::new();
        for key in own_keys(interp, &target)? {
            values.push(interp.get_property(&target, &key)?);
        }
        Ok(interp.new_array(values))
    });

    // Object.entries
    define_method(interp, &object, "entries", 1, |interp, _this, args| {
        let target = arg(args, 0);
        let mut entries = Vec::new();
        for key in own_keys(interp, &target)? {
            let value = interp.get_property(&target, &key)?;
            entries.push(interp.new_array(vec![Value::String(key), value]));
        }
        Ok(interp.new_array(entries))
    });

    // Object.assign
    define_method(interp, &object, "assign", 2, |interp, _this, args| {
        let target = arg(args, 0);
        let Value::Object(target_obj) = &target else {
            return Err(interp.type_error("Cannot convert undefined or null to object"));
        };
        for source in args.iter().skip(1) {
            for key in own_keys(interp, source).unwrap_or_default() {
                let value = interp.get_property(source, &key)?;
                interp.set_property(&Value::Object(target_obj.clone()), &key, value)?;
            }
        }
        Ok(target)
    });

    // Object.freeze
    define_method(interp, &object, "freeze", 1, |_interp, _this, args| {
        let target = arg(args, 0);
        if let Value::Object(obj) = &target {
            obj.borrow_mut().frozen = true;
        }
        Ok(target)
    });

    // Object.isFrozen
    define_method(interp, &object, "isFrozen", 1, |_interp, _this, args| {
        Ok(Value::Boolean(match arg(args, 0) {
            Value::Object(obj) => obj.borrow().frozen,
            _ => true,
        }))
    });

    // Object.fromEntries
    define_method(interp, &object, "fromEntries", 1, |interp, _this, args| {
        let result = interp.new_object();
        for entry in interp.iterate(&arg(args, 0))? {
            let key = interp.get_property_key(&entry, &Key::Index(0))?;
            let value = interp.get_property_key(&entry, &Key::Index(1))?;
            let key = interp.to_key(&key)?;
            result.borrow_mut().properties.set(key.to_name(), value);
        }
        Ok(Value::Object(result))
    });

    // Object.create
    define_method(interp, &object, "create", 2, |interp, _this, args| {
        let prototype = match arg(args, 0) {
            Value::Object(obj) => Some(obj),
            Value::Null => None,
            other => {
                return Err(interp.type_error(format!(
                    "Object prototype may only be an Object or null: {}",
                    interp.display_primitive(&other)
                )))
            }
        };
        let result = Object::new(ObjectKind::Ordinary, prototype).into_ref();
        let properties = arg(args, 1);
        if !properties.is_undefined() {
            define_properties(interp, &result, &properties)?;
        }
        Ok(Value::Object(result))
    });

    // Object.getPrototypeOf
    define_method(interp, &object, "getPrototypeOf", 1, |interp, _this, args| {
        let prototype = match arg(args, 0) {
            Value::Object(obj) => obj.borrow().prototype.clone(),
            Value::String(_) => Some(interp.intrinsics.string_prototype.clone()),
            Value::Number(_) => Some(interp.intrinsics.number_prototype.clone()),
            Value::Boolean(_) => Some(interp.intrinsics.boolean_prototype.clone()),
            _ => return Err(interp.type_error("Cannot convert undefined or null to object")),
        };
        Ok(prototype.map(Value::Object).unwrap_or(Value::Null))
    });

    // Object.setPrototypeOf
    define_method(interp, &object, "setPrototypeOf", 2, |interp, _this, args| {
        let target = arg(args, 0);
        let prototype = match arg(args, 1) {
            Value::Object(obj) => Some(obj),
            Value::Null => None,
            _ => return Err(interp.type_error("Object prototype may only be an Object or null")),
        };
        if let Value::Object(obj) = &target {
            obj.borrow_mut().prototype = prototype;
        }
        Ok(target)
    });

    // Object.getOwnPropertyNames
    define_method(interp, &object, "getOwnPropertyNames", 1, |interp, _this, args| {
        let names: Vec<Value> = match arg(args, 0) {
            Value::Object(obj) => {
                let o = obj.borrow();
                let mut names: Vec<Name> = match &o.kind {
                    ObjectKind::Array(elements) => {
                        (0..elements.len()).map(|i| Name::from(i.to_string())).collect()
                    }
                    _ => Vec::new(),
                };
                names.extend(o.properties.keys(false));
                if matches!(o.kind, ObjectKind::Array(_)) {
                    names.push("length".into());
                }
                names.into_iter().map(Value::String).collect()
            }
            other => own_keys(interp, &other)?
                .into_iter()
                .map(Value::String)
                .collect(),
        };
        Ok(interp.new_array(names))
    });

    // Object.defineProperty
    define_method(interp, &object, "defineProperty", 3, |interp, _this, args| {
        let target = arg(args, 0);
        let Value::Object(obj) = &target else {
            return Err(interp.type_error("Object.defineProperty called on non-object"));
        };
        let key = interp.to_key(&arg(args, 1))?;
        define_property(interp, obj, key, &arg(args, 2))?;
        Ok(target)
    });

    // Object.defineProperties
    define_method(interp, &object, "defineProperties", 2, |interp, _this, args| {
        let target = arg(args, 0);
        let Value::Object(obj) = &target else {
            return Err(interp.type_error("Object.defineProperties called on non-object"));
        };
        define_properties(interp, obj, &arg(args, 1))?;
        Ok(target)
    });

    // Object.is
    define_method(interp, &object, "is", 2, |_interp, _this, args| {
        let (a, b) = (arg(args, 0), arg(args, 1));
        Ok(Value::Boolean(match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => {
                (x.is_nan() && y.is_nan()) || (x == y && x.is_sign_negative() == y.is_sign_negative())
            }
            _ => a.strict_equals(&b),
        }))
    });
}

/// `Object(value)`: objects pass through, everything else gets a fresh object
fn object_from(interp: &Interpreter, args: &[Value]) -> Value {
    match arg(args, 0) {
        value @ Value::Object(_) => value,
        _ => Value::Object(interp.new_object()),
    }
}

/// Own enumerable string keys, as `Object.keys` reports them
pub(crate) fn own_keys(interp: &Interpreter, value: &Value) -> EvalResult<Vec<Name>> {
    match value {
        Value::Object(obj) => Ok(obj.borrow().own_keys()),
        Value::String(s) => Ok((0..s.encode_utf16().count())
            .map(|i| Name::from(i.to_string()))
            .collect()),
        Value::Undefined | Value::Null => {
            Err(interp.type_error("Cannot convert undefined or null to object"))
        }
        _ => Ok(Vec::new()),
    }
}

fn define_property(
    interp: &mut Interpreter,
    target: &ObjectRef,
    key: Key,
    descriptor: &Value,
) -> EvalResult<()> {
    if !matches!(descriptor, Value::Object(_)) {
        return Err(interp.type_error("Property description must be an object"));
    }
    let getter = interp.get_property(descriptor, "get")?;
    let setter = interp.get_property(descriptor, "set")?;
    if !getter.is_undefined() || !setter.is_undefined() {
        return Err(interp.type_error("Accessor properties are not supported"));
    }
    let value = interp.get_property(descriptor, "value")?;
    let enumerable = interp.get_property(descriptor, "enumerable")?.to_boolean();

    let is_array_index = matches!(key, Key::Index(_)) && matches!(target.borrow().kind, ObjectKind::Array(_));
    if is_array_index {
        return interp.set_property_key(&Value::Object(target.clone()), &key, value);
    }
    let mut o = target.borrow_mut();
    if !o.frozen {
        o.properties.define(key.to_name(), value, enumerable);
    }
    Ok(())
}

fn define_properties(
    interp: &mut Interpreter,
    target: &ObjectRef,
    properties: &Value,
) -> EvalResult<()> {
    for name in own_keys(interp, properties)? {
        let descriptor = interp.get_property(properties, &name)?;
        define_property(interp, target, Key::from_name(&name), &descriptor)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::runtime::interp::{Interpreter, Limits};
    use crate::runtime::value::Value;

    fn eval(source: &str) -> Value {
        Interpreter::new(Limits::default(), 1).eval_script(source).unwrap()
    }

    #[test]
    fn test_keys_values_entries() {
        assert_eq!(eval("Object.keys({ b: 1, a: 2, 1: 3 }).join()"), Value::from("1,b,a"));
        assert_eq!(eval("Object.values({ x: 1, y: 2 }).join()"), Value::from("1,2"));
        assert_eq!(
            eval("Object.entries({ x: 1 }).map(([k, v]) => k + '=' + v).join()"),
            Value::from("x=1")
        );
        assert_eq!(eval("Object.keys('ab').join()"), Value::from("0,1"));
    }

    #[test]
    fn test_freeze_ignores_writes() {
        assert_eq!(
            eval("const o = Object.freeze({ a: 1 }); o.a = 2; o.b = 3; [o.a, o.b, Object.isFrozen(o)].join()"),
            Value::from("1,,true")
        );
    }

    #[test]
    fn test_define_property_enumerability() {
        assert_eq!(
            eval("const o = {}; Object.defineProperty(o, 'hidden', { value: 1 }); o.shown = 2; [Object.keys(o).join(), o.hidden].join('|')"),
            Value::from("shown|1")
        );
    }

    #[test]
    fn test_create_and_prototypes() {
        assert_eq!(
            eval("const base = { greet() { return 'hi ' + this.name } }; const o = Object.create(base); o.name = 'x'; o.greet()"),
            Value::from("hi x")
        );
        assert_eq!(eval("Object.getPrototypeOf([]) === Array.prototype"), Value::Boolean(true));
        assert_eq!(eval("Object.prototype.toString.call([])"), Value::from("[object Array]"));
        assert_eq!(eval("Object.is(NaN, NaN) && !Object.is(0, -0)"), Value::Boolean(true));
    }

    #[test]
    fn test_assign_and_from_entries() {
        assert_eq!(
            eval("const o = Object.assign({ a: 1 }, { b: 2 }, null, { a: 3 }); JSON.stringify(o)"),
            Value::from("{\"a\":3,\"b\":2}")
        );
        assert_eq!(
            eval("JSON.stringify(Object.fromEntries([['x', 1], ['y', 2]]))"),
            Value::from("{\"x\":1,\"y\":2}")
        );
    }
}
