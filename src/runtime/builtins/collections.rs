//! `Map` and `Set`
//!
//! Both are backed by [`OrderedMap`] with SameValueZero keys. `keys()`,
//! `values()` and `entries()` return arrays, which covers spreading,
//! `for..of` and `Array.from` without an iterator protocol.

use super::{arg, callback, define_constructor, define_method, native};
use crate::runtime::interp::{EvalResult, Interpreter};
use crate::runtime::value::{NativeFn, ObjectKind, OrderedMap, Value};

#[derive(Clone, Copy, PartialEq)]
enum Collection {
    Map,
    Set,
}

impl Collection {
    fn name(self) -> &'static str {
        match self {
            Collection::Map => "Map",
            Collection::Set => "Set",
        }
    }
}

/// Run `f` on the backing store of a Map or Set receiver
fn with_store<R>(
    interp: &Interpreter,
    this: &Value,
    collection: Collection,
    method: &str,
    f: impl FnOnce(&mut OrderedMap) -> R,
) -> EvalResult<R> {
    if let Value::Object(obj) = this {
        let mut o = obj.borrow_mut();
        match (&mut o.kind, collection) {
            (ObjectKind::Map(map), Collection::Map) | (ObjectKind::Set(map), Collection::Set) => {
                return Ok(f(map));
            }
            _ => {}
        }
    }
    Err(interp.type_error(format!(
        "Method {}.prototype.{} called on incompatible receiver {}",
        collection.name(),
        method,
        interp.display_primitive(this)
    )))
}

fn snapshot(interp: &Interpreter, this: &Value, collection: Collection, method: &str) -> EvalResult<Vec<(Value, Value)>> {
    with_store(interp, this, collection, method, |map| {
        map.entries().map(|(k, v)| (k.clone(), v.clone())).collect()
    })
}

fn requires_new(collection: Collection) -> NativeFn {
    native(move |interp, _this, _args| {
        Err(interp.type_error(format!("Constructor {} requires 'new'", collection.name())))
    })
}

fn construct(interp: &mut Interpreter, this: &Value, args: &[Value], collection: Collection) -> EvalResult<Value> {
    let items = match arg(args, 0) {
        Value::Undefined | Value::Null => Vec::new(),
        iterable => interp.iterate(&iterable)?,
    };

    let mut store = OrderedMap::new();
    for item in items {
        match collection {
            Collection::Map => {
                if !matches!(item, Value::Object(_)) {
                    return Err(interp.type_error(format!(
                        "Iterator value {} is not an entry object",
                        interp.display_primitive(&item)
                    )));
                }
                let key = interp.get_property(&item, "0")?;
                let value = interp.get_property(&item, "1")?;
                store.set(key, value);
            }
            Collection::Set => store.set(item, Value::Undefined),
        }
    }

    if let Value::Object(obj) = this {
        obj.borrow_mut().kind = match collection {
            Collection::Map => ObjectKind::Map(store),
            Collection::Set => ObjectKind::Set(store),
        };
    }
    Ok(this.clone())
}

/// Methods shared by both collections
fn register_common(interp: &mut Interpreter, collection: Collection) {
    let prototype = match collection {
        Collection::Map => interp.intrinsics.map_prototype.clone(),
        Collection::Set => interp.intrinsics.set_prototype.clone(),
    };

    define_method(interp, &prototype, "has", 1, move |interp, this, args| {
        let key = arg(args, 0);
        with_store(interp, this, collection, "has", |map| Value::Boolean(map.has(&key)))
    });

    define_method(interp, &prototype, "delete", 1, move |interp, this, args| {
        let key = arg(args, 0);
        with_store(interp, this, collection, "delete", |map| Value::Boolean(map.delete(&key)))
    });

    define_method(interp, &prototype, "clear", 0, move |interp, this, _args| {
        with_store(interp, this, collection, "clear", |map| map.clear())?;
        Ok(Value::Undefined)
    });

    define_method(interp, &prototype, "forEach", 1, move |interp, this, args| {
        let function = callback(interp, args, 0)?;
        let receiver = arg(args, 1);
        for (key, value) in snapshot(interp, this, collection, "forEach")? {
            let value = match collection {
                Collection::Map => value,
                Collection::Set => key.clone(),
            };
            interp.call(&function, &receiver, &[value, key, this.clone()])?;
        }
        Ok(Value::Undefined)
    });

    define_method(interp, &prototype, "keys", 0, move |interp, this, _args| {
        let keys = snapshot(interp, this, collection, "keys")?
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        Ok(interp.new_array(keys))
    });

    define_method(interp, &prototype, "values", 0, move |interp, this, _args| {
        let values = snapshot(interp, this, collection, "values")?
            .into_iter()
            .map(|(k, v)| match collection {
                Collection::Map => v,
                Collection::Set => k,
            })
            .collect();
        Ok(interp.new_array(values))
    });

    define_method(interp, &prototype, "entries", 0, move |interp, this, _args| {
        let entries: Vec<Value> = snapshot(interp, this, collection, "entries")?
            .into_iter()
            .map(|(k, v)| match collection {
                Collection::Map => interp.new_array(vec![k, v]),
                Collection::Set => interp.new_array(vec![k.clone(), k]),
            })
            .collect();
        Ok(interp.new_array(entries))
    });

    let construct_fn = native(move |interp, this, args| construct(interp, this, args, collection));
    define_constructor(
        interp,
        collection.name(),
        0,
        &prototype,
        requires_new(collection),
        Some(construct_fn),
    );
}

pub(super) fn register_map(interp: &mut Interpreter) {
    register_common(interp, Collection::Map);
    let prototype = interp.intrinsics.map_prototype.clone();

    // Map.prototype.get
    define_method(interp, &prototype, "get", 1, |interp, this, args| {
        let key = arg(args, 0);
        with_store(interp, this, Collection::Map, "get", |map| {
            map.get(&key).cloned().unwrap_or(Value::Undefined)
        })
    });

    // Map.prototype.set
    define_method(interp, &prototype, "set", 2, |interp, this, args| {
        let (key, value) = (arg(args, 0), arg(args, 1));
        with_store(interp, this, Collection::Map, "set", |map| map.set(key, value))?;
        Ok(this.clone())
    });
}

pub(super) fn register_set(interp: &mut Interpreter) {
    register_common(interp, Collection::Set);
    let prototype = interp.intrinsics.set_prototype.clone();

    // Set.prototype.add
    define_method(interp, &prototype, "add", 1, |interp, this, args| {
        let value = arg(args, 0);
        with_store(interp, this, Collection::Set, "add", |set| set.set(value, Value::Undefined))?;
        Ok(this.clone())
    });
}

#[cfg(test)]
mod tests {
    use crate::runtime::interp::{Interpreter, Limits};
    use crate::runtime::value::Value;

    fn eval(source: &str) -> Value {
        Interpreter::new(Limits::default(), 1).eval_script(source).unwrap()
    }

    #[test]
    fn test_map() {
        assert_eq!(
            eval("const m = new Map([['a', 1]]); m.set('b', 2).set('a', 3); [m.size, m.get('a'), m.has('b')].join()"),
            Value::from("2,3,true")
        );
        assert_eq!(
            eval("const m = new Map(); m.set(NaN, 'n'); m.get(NaN)"),
            Value::from("n")
        );
        assert_eq!(
            eval("const m = new Map([[1, 'x'], [2, 'y']]); [...m.keys()].join() + '|' + Array.from(m.values()).join()"),
            Value::from("1,2|x,y")
        );
        assert_eq!(
            eval("let out = ''; for (const [k, v] of new Map([['a', 1], ['b', 2]])) out += k + v; out"),
            Value::from("a1b2")
        );
    }

    #[test]
    fn test_set() {
        assert_eq!(eval("new Set([1, 2, 2, 3, 1]).size"), Value::Number(3.0));
        assert_eq!(eval("[...new Set('hello')].join('')"), Value::from("helo"));
        assert_eq!(
            eval("const s = new Set([1]); s.add(2).add(1); s.delete(1); [...s].join()"),
            Value::from("2")
        );
    }

    #[test]
    fn test_requires_new() {
        assert_eq!(
            eval("try { Map() } catch (e) { e.message }"),
            Value::from("Constructor Map requires 'new'")
        );
        assert_eq!(eval("new Map() instanceof Map"), Value::Boolean(true));
    }
}
