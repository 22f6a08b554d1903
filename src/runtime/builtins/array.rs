//! `Array` and `Array.prototype`

use std::cmp::Ordering;

use super::{arg, callback, define_constructor, define_method, native, relative_index};
use crate::error::messages;
use crate::runtime::interp::{EvalResult, Interpreter, MAX_ARRAY_LENGTH, MAX_STRING_LENGTH};
use crate::runtime::number::to_integer;
use crate::runtime::value::{Key, ObjectKind, Value};

/// Snapshot of the receiver's elements, charged by length
fn elements(interp: &mut Interpreter, this: &Value, method: &str) -> EvalResult<Vec<Value>> {
    if let Value::Object(obj) = this {
        let snapshot = match &obj.borrow().kind {
            ObjectKind::Array(elements) => Some(elements.clone()),
            _ => None,
        };
        if let Some(elements) = snapshot {
            interp.charge(elements.len())?;
            return Ok(elements);
        }
    }
    Err(interp.type_error(format!(
        "Array.prototype.{} called on non-array",
        method
    )))
}

/// Run `f` on the receiver's element storage
fn with_elements<R>(
    interp: &Interpreter,
    this: &Value,
    method: &str,
    f: impl FnOnce(&mut Vec<Value>) -> R,
) -> EvalResult<R> {
    if let Value::Object(obj) = this {
        let mut o = obj.borrow_mut();
        if o.frozen {
            return Err(interp.type_error(format!(
                "Cannot modify frozen array with Array.prototype.{}",
                method
            )));
        }
        if let ObjectKind::Array(elements) = &mut o.kind {
            return Ok(f(elements));
        }
    }
    Err(interp.type_error(format!(
        "Array.prototype.{} called on non-array",
        method
    )))
}

/// Call `callback(element, index, array)` with the optional `thisArg`
fn visit(
    interp: &mut Interpreter,
    function: &Value,
    this_arg: &Value,
    element: &Value,
    index: usize,
    array: &Value,
) -> EvalResult<Value> {
    interp.call(
        function,
        this_arg,
        &[element.clone(), Value::Number(index as f64), array.clone()],
    )
}

/// `join` with `undefined`/`null` rendered as empty strings
fn join(interp: &mut Interpreter, items: &[Value], separator: &str) -> EvalResult<String> {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        if !item.is_nullish() {
            out.push_str(&interp.to_string(item)?);
        }
        if out.len() > MAX_STRING_LENGTH {
            return Err(interp.range_error("Invalid string length"));
        }
    }
    interp.charge(out.len())?;
    Ok(out)
}

fn flatten(interp: &mut Interpreter, items: Vec<Value>, depth: f64, out: &mut Vec<Value>) -> EvalResult<()> {
    interp.charge(items.len())?;
    for item in items {
        if depth >= 1.0 && item.is_array() {
            let inner = interp.iterate(&item)?;
            interp.nested(|interp| flatten(interp, inner, depth - 1.0, out))?;
        } else {
            out.push(item);
        }
    }
    Ok(())
}

/// Stable merge sort with a comparator that may throw
fn sort_values(
    interp: &mut Interpreter,
    mut items: Vec<Value>,
    comparator: &Value,
) -> EvalResult<Vec<Value>> {
    // undefined always sorts last and never reaches the comparator
    let undefined_count = items.iter().filter(|v| v.is_undefined()).count();
    items.retain(|v| !v.is_undefined());

    let mut width = 1;
    let len = items.len();
    while width < len {
        interp.charge(len)?;
        let mut merged = Vec::with_capacity(len);
        let mut start = 0;
        while start < len {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut i, mut j) = (start, mid);
            while i < mid && j < end {
                if compare(interp, &items[j], &items[i], comparator)? == Ordering::Less {
                    merged.push(items[j].clone());
                    j += 1;
                } else {
                    merged.push(items[i].clone());
                    i += 1;
                }
            }
            merged.extend_from_slice(&items[i..mid]);
            merged.extend_from_slice(&items[j..end]);
            start = end;
        }
        items = merged;
        width *= 2;
    }

    items.extend(std::iter::repeat(Value::Undefined).take(undefined_count));
    Ok(items)
}

fn compare(interp: &mut Interpreter, a: &Value, b: &Value, comparator: &Value) -> EvalResult<Ordering> {
    if comparator.is_undefined() {
        let a = interp.to_string(a)?;
        let b = interp.to_string(b)?;
        return Ok(a.encode_utf16().cmp(b.encode_utf16()));
    }
    let result = interp.call(comparator, &Value::Undefined, &[a.clone(), b.clone()])?;
    let n = interp.to_number(&result)?;
    Ok(if n < 0.0 {
        Ordering::Less
    } else if n > 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    })
}

fn check_length(interp: &Interpreter, len: usize) -> EvalResult<()> {
    if len > MAX_ARRAY_LENGTH {
        Err(interp.range_error(messages::INVALID_ARRAY_LENGTH))
    } else {
        Ok(())
    }
}

pub(super) fn register_array(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.array_prototype.clone();

    // Array.prototype.push
    define_method(interp, &prototype, "push", 1, |interp, this, args| {
        let len = with_elements(interp, this, "push", |elements| {
            elements.extend_from_slice(args);
            elements.len()
        })?;
        check_length(interp, len)?;
        Ok(Value::Number(len as f64))
    });

    // Array.prototype.pop
    define_method(interp, &prototype, "pop", 0, |interp, this, _args| {
        with_elements(interp, this, "pop", |elements| {
            elements.pop().unwrap_or(Value::Undefined)
        })
    });

    // Array.prototype.shift
    define_method(interp, &prototype, "shift", 0, |interp, this, _args| {
        with_elements(interp, this, "shift", |elements| {
            if elements.is_empty() {
                Value::Undefined
            } else {
                elements.remove(0)
            }
        })
    });

    // Array.prototype.unshift
    define_method(interp, &prototype, "unshift", 1, |interp, this, args| {
        let len = with_elements(interp, this, "unshift", |elements| {
            elements.splice(0..0, args.iter().cloned());
            elements.len()
        })?;
        Ok(Value::Number(len as f64))
    });

    // Array.prototype.slice
    define_method(interp, &prototype, "slice", 2, |interp, this, args| {
        let items = elements(interp, this, "slice")?;
        let start = relative_index(interp, &arg(args, 0), items.len(), 0)?;
        let end = relative_index(interp, &arg(args, 1), items.len(), items.len())?;
        let slice = if start < end {
            items[start..end].to_vec()
        } else {
            Vec::new()
        };
        Ok(interp.new_array(slice))
    });

    // Array.prototype.splice
    define_method(interp, &prototype, "splice", 2, |interp, this, args| {
        let len = elements(interp, this, "splice")?.len();
        let start = relative_index(interp, &arg(args, 0), len, 0)?;
        let delete_count = match args.len() {
            0 => 0,
            1 => len - start,
            _ => {
                let n = to_integer(interp.to_number(&args[1])?);
                (n.max(0.0) as usize).min(len - start)
            }
        };
        let inserted: Vec<Value> = args.iter().skip(2).cloned().collect();
        let removed = with_elements(interp, this, "splice", |elements| {
            elements
                .splice(start..start + delete_count, inserted)
                .collect::<Vec<_>>()
        })?;
        Ok(interp.new_array(removed))
    });

    // Array.prototype.concat
    define_method(interp, &prototype, "concat", 1, |interp, this, args| {
        let mut items = elements(interp, this, "concat")?;
        for value in args {
            if value.is_array() {
                items.extend(interp.iterate(value)?);
            } else {
                items.push(value.clone());
            }
        }
        check_length(interp, items.len())?;
        Ok(interp.new_array(items))
    });

    // Array.prototype.join
    define_method(interp, &prototype, "join", 1, |interp, this, args| {
        let items = elements(interp, this, "join")?;
        let separator = match arg(args, 0) {
            Value::Undefined => ",".into(),
            other => interp.to_string(&other)?,
        };
        Ok(Value::from(join(interp, &items, &separator)?))
    });

    // Array.prototype.toString
    define_method(interp, &prototype, "toString", 0, |interp, this, _args| {
        let items = elements(interp, this, "toString")?;
        Ok(Value::from(join(interp, &items, ",")?))
    });

    // Array.prototype.reverse
    define_method(interp, &prototype, "reverse", 0, |interp, this, _args| {
        with_elements(interp, this, "reverse", |elements| elements.reverse())?;
        Ok(this.clone())
    });

    // Array.prototype.toReversed
    define_method(interp, &prototype, "toReversed", 0, |interp, this, _args| {
        let mut items = elements(interp, this, "toReversed")?;
        items.reverse();
        Ok(interp.new_array(items))
    });

    // Array.prototype.indexOf
    define_method(interp, &prototype, "indexOf", 1, |interp, this, args| {
        let items = elements(interp, this, "indexOf")?;
        let target = arg(args, 0);
        let from = relative_index(interp, &arg(args, 1), items.len(), 0)?;
        let found = items
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, item)| item.strict_equals(&target))
            .map(|(i, _)| i as f64);
        Ok(Value::Number(found.unwrap_or(-1.0)))
    });

    // Array.prototype.lastIndexOf
    define_method(interp, &prototype, "lastIndexOf", 1, |interp, this, args| {
        let items = elements(interp, this, "lastIndexOf")?;
        let target = arg(args, 0);
        let found = items
            .iter()
            .rposition(|item| item.strict_equals(&target))
            .map(|i| i as f64);
        Ok(Value::Number(found.unwrap_or(-1.0)))
    });

    // Array.prototype.includes
    define_method(interp, &prototype, "includes", 1, |interp, this, args| {
        let items = elements(interp, this, "includes")?;
        let target = arg(args, 0);
        let from = relative_index(interp, &arg(args, 1), items.len(), 0)?;
        Ok(Value::Boolean(
            items.iter().skip(from).any(|item| item.same_value_zero(&target)),
        ))
    });

    // Array.prototype.find
    define_method(interp, &prototype, "find", 1, |interp, this, args| {
        let items = elements(interp, this, "find")?;
        let function = callback(interp, args, 0)?;
        let this_arg = arg(args, 1);
        for (i, item) in items.iter().enumerate() {
            if visit(interp, &function, &this_arg, item, i, this)?.to_boolean() {
                return Ok(item.clone());
            }
        }
        Ok(Value::Undefined)
    });

    // Array.prototype.findIndex
    define_method(interp, &prototype, "findIndex", 1, |interp, this, args| {
        let items = elements(interp, this, "findIndex")?;
        let function = callback(interp, args, 0)?;
        let this_arg = arg(args, 1);
        for (i, item) in items.iter().enumerate() {
            if visit(interp, &function, &this_arg, item, i, this)?.to_boolean() {
                return Ok(Value::Number(i as f64));
            }
        }
        Ok(Value::Number(-1.0))
    });

    // Array.prototype.findLast
    define_method(interp, &prototype, "findLast", 1, |interp, this, args| {
        let items = elements(interp, this, "findLast")?;
        let function = callback(interp, args, 0)?;
        let this_arg = arg(args, 1);
        for (i, item) in items.iter().enumerate().rev() {
            if visit(interp, &function, &this_arg, item, i, this)?.to_boolean() {
                return Ok(item.clone());
            }
        }
        Ok(Value::Undefined)
    });

    // Array.prototype.findLastIndex
    define_method(interp, &prototype, "findLastIndex", 1, |interp, this, args| {
        let items = elements(interp, this, "findLastIndex")?;
        let function = callback(interp, args, 0)?;
        let this_arg = arg(args, 1);
        for (i, item) in items.iter().enumerate().rev() {
            if visit(interp, &function, &this_arg, item, i, this)?.to_boolean() {
                return Ok(Value::Number(i as f64));
            }
        }
        Ok(Value::Number(-1.0))
    });

    // Array.prototype.filter
    define_method(interp, &prototype, "filter", 1, |interp, this, args| {
        let items = elements(interp, this, "filter")?;
        let function = callback(interp, args, 0)?;
        let this_arg = arg(args, 1);
        let mut kept = Vec::new();
        for (i, item) in items.iter().enumerate() {
            if visit(interp, &function, &this_arg, item, i, this)?.to_boolean() {
                kept.push(item.clone());
            }
        }
        Ok(interp.new_array(kept))
    });

    // Array.prototype.map
    define_method(interp, &prototype, "map", 1, |interp, this, args| {
        let items = elements(interp, this, "map")?;
        let function = callback(interp, args, 0)?;
        let this_arg = arg(args, 1);
        let mut mapped = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            mapped.push(visit(interp, &function, &this_arg, item, i, this)?);
        }
        Ok(interp.new_array(mapped))
    });

    // Array.prototype.forEach
    define_method(interp, &prototype, "forEach", 1, |interp, this, args| {
        let items = elements(interp, this, "forEach")?;
        let function = callback(interp, args, 0)?;
        let this_arg = arg(args, 1);
        for (i, item) in items.iter().enumerate() {
            visit(interp, &function, &this_arg, item, i, this)?;
        }
        Ok(Value::Undefined)
    });

    // Array.prototype.some
    define_method(interp, &prototype, "some", 1, |interp, this, args| {
        let items = elements(interp, this, "some")?;
        let function = callback(interp, args, 0)?;
        let this_arg = arg(args, 1);
        for (i, item) in items.iter().enumerate() {
            if visit(interp, &function, &this_arg, item, i, this)?.to_boolean() {
                return Ok(Value::Boolean(true));
            }
        }
        Ok(Value::Boolean(false))
    });

    // Array.prototype.every
    define_method(interp, &prototype, "every", 1, |interp, this, args| {
        let items = elements(interp, this, "every")?;
        let function = callback(interp, args, 0)?;
        let this_arg = arg(args, 1);
        for (i, item) in items.iter().enumerate() {
            if !visit(interp, &function, &this_arg, item, i, this)?.to_boolean() {
                return Ok(Value::Boolean(false));
            }
        }
        Ok(Value::Boolean(true))
    });

    // Array.prototype.reduce
    define_method(interp, &prototype, "reduce", 1, |interp, this, args| {
        let items = elements(interp, this, "reduce")?;
        let function = callback(interp, args, 0)?;
        let mut indices = 0..items.len();
        let mut accumulator = if args.len() > 1 {
            args[1].clone()
        } else {
            match indices.next() {
                Some(first) => items[first].clone(),
                None => {
                    return Err(interp.type_error("Reduce of empty array with no initial value"))
                }
            }
        };
        for i in indices {
            accumulator = interp.call(
                &function,
                &Value::Undefined,
                &[accumulator, items[i].clone(), Value::Number(i as f64), this.clone()],
            )?;
        }
        Ok(accumulator)
    });

    // Array.prototype.reduceRight
    define_method(interp, &prototype, "reduceRight", 1, |interp, this, args| {
        let items = elements(interp, this, "reduceRight")?;
        let function = callback(interp, args, 0)?;
        let mut indices = (0..items.len()).rev();
        let mut accumulator = if args.len() > 1 {
            args[1].clone()
        } else {
            match indices.next() {
                Some(last) => items[last].clone(),
                None => {
                    return Err(interp.type_error("Reduce of empty array with no initial value"))
                }
            }
        };
        for i in indices {
            accumulator = interp.call(
                &function,
                &Value::Undefined,
                &[accumulator, items[i].clone(), Value::Number(i as f64), this.clone()],
            )?;
        }
        Ok(accumulator)
    });

    // Array.prototype.sort
    define_method(interp, &prototype, "sort", 1, |interp, this, args| {
        let comparator = arg(args, 0);
        if !comparator.is_undefined() && !comparator.is_callable() {
            return Err(interp.type_error(
                "The comparison function must be either a function or undefined",
            ));
        }
        let items = elements(interp, this, "sort")?;
        let sorted = sort_values(interp, items, &comparator)?;
        with_elements(interp, this, "sort", |elements| *elements = sorted)?;
        Ok(this.clone())
    });

    // Array.prototype.toSorted
    define_method(interp, &prototype, "toSorted", 1, |interp, this, args| {
        let comparator = arg(args, 0);
        if !comparator.is_undefined() && !comparator.is_callable() {
            return Err(interp.type_error(
                "The comparison function must be either a function or undefined",
            ));
        }
        let items = elements(interp, this, "toSorted")?;
        let sorted = sort_values(interp, items, &comparator)?;
        Ok(interp.new_array(sorted))
    });

    // Array.prototype.flat
    define_method(interp, &prototype, "flat", 0, |interp, this, args| {
        let items = elements(interp, this, "flat")?;
        let depth = match arg(args, 0) {
            Value::Undefined => 1.0,
            other => to_integer(interp.to_number(&other)?),
        };
        let mut out = Vec::new();
        flatten(interp, items, depth, &mut out)?;
        Ok(interp.new_array(out))
    });

    // Array.prototype.flatMap
    define_method(interp, &prototype, "flatMap", 1, |interp, this, args| {
        let items = elements(interp, this, "flatMap")?;
        let function = callback(interp, args, 0)?;
        let this_arg = arg(args, 1);
        let mut mapped = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            mapped.push(visit(interp, &function, &this_arg, item, i, this)?);
        }
        let mut out = Vec::new();
        flatten(interp, mapped, 1.0, &mut out)?;
        Ok(interp.new_array(out))
    });

    // Array.prototype.fill
    define_method(interp, &prototype, "fill", 1, |interp, this, args| {
        let len = elements(interp, this, "fill")?.len();
        let value = arg(args, 0);
        let start = relative_index(interp, &arg(args, 1), len, 0)?;
        let end = relative_index(interp, &arg(args, 2), len, len)?;
        with_elements(interp, this, "fill", |elements| {
            for slot in elements.iter_mut().take(end).skip(start) {
                *slot = value.clone();
            }
        })?;
        Ok(this.clone())
    });

    // Array.prototype.at
    define_method(interp, &prototype, "at", 1, |interp, this, args| {
        let items = elements(interp, this, "at")?;
        let n = to_integer(interp.to_number(&arg(args, 0))?);
        let index = if n < 0.0 { items.len() as f64 + n } else { n };
        if index < 0.0 {
            return Ok(Value::Undefined);
        }
        Ok(items.get(index as usize).cloned().unwrap_or(Value::Undefined))
    });

    // Array.prototype.keys
    define_method(interp, &prototype, "keys", 0, |interp, this, _args| {
        let len = elements(interp, this, "keys")?.len();
        Ok(interp.new_array((0..len).map(|i| Value::Number(i as f64)).collect()))
    });

    // Array.prototype.values
    define_method(interp, &prototype, "values", 0, |interp, this, _args| {
        let items = elements(interp, this, "values")?;
        Ok(interp.new_array(items))
    });

    // Array.prototype.entries
    define_method(interp, &prototype, "entries", 0, |interp, this, _args| {
        let items = elements(interp, this, "entries")?;
        let entries = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| interp.new_array(vec![Value::Number(i as f64), item]))
            .collect();
        Ok(interp.new_array(entries))
    });

    let array = define_constructor(
        interp,
        "Array",
        1,
        &prototype,
        native(construct_array),
        Some(native(construct_array)),
    );

    // Array.isArray
    define_method(interp, &array, "isArray", 1, |_interp, _this, args| {
        Ok(Value::Boolean(arg(args, 0).is_array()))
    });

    // Array.of
    define_method(interp, &array, "of", 0, |interp, _this, args| {
        Ok(interp.new_array(args.to_vec()))
    });

    // Array.from
    define_method(interp, &array, "from", 1, |interp, _this, args| {
        let source = arg(args, 0);
        let map_fn = arg(args, 1);
        if !map_fn.is_undefined() && !map_fn.is_callable() {
            return Err(interp.type_error(format!(
                "{} is not a function",
                interp.display_primitive(&map_fn)
            )));
        }

        let items = match &source {
            Value::Undefined | Value::Null => {
                return Err(interp.type_error(format!(
                    "{} is not iterable",
                    interp.display_primitive(&source)
                )))
            }
            Value::String(_) => interp.iterate(&source)?,
            Value::Object(obj) => {
                let iterable = matches!(
                    obj.borrow().kind,
                    ObjectKind::Array(_) | ObjectKind::Map(_) | ObjectKind::Set(_)
                );
                if iterable {
                    interp.iterate(&source)?
                } else {
                    // array-like: { length: n, 0: ..., 1: ... }
                    let length = interp.get_property(&source, "length")?;
                    let length = to_integer(interp.to_number(&length)?).max(0.0) as usize;
                    check_length(interp, length)?;
                    let mut items = Vec::with_capacity(length);
                    for i in 0..length {
                        items.push(interp.get_property_key(&source, &Key::Index(i as u32))?);
                    }
                    items
                }
            }
            _ => Vec::new(),
        };

        if map_fn.is_undefined() {
            return Ok(interp.new_array(items));
        }
        let mut mapped = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            mapped.push(interp.call(&map_fn, &Value::Undefined, &[item, Value::Number(i as f64)])?);
        }
        Ok(interp.new_array(mapped))
    });
}

/// `Array(n)` and `Array(a, b, ...)`, with or without `new`
fn construct_array(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    if let [Value::Number(n)] = args {
        if *n < 0.0 || n.fract() != 0.0 || *n > MAX_ARRAY_LENGTH as f64 {
            return Err(interp.range_error(messages::INVALID_ARRAY_LENGTH));
        }
        interp.charge(*n as usize)?;
        return Ok(interp.new_array(vec![Value::Undefined; *n as usize]));
    }
    Ok(interp.new_array(args.to_vec()))
}

#[cfg(test)]
mod tests {
    use crate::runtime::interp::{Interpreter, Limits};
    use crate::runtime::value::Value;

    fn eval(source: &str) -> Value {
        Interpreter::new(Limits::default(), 1).eval_script(source).unwrap()
    }

    #[test]
    fn test_mutators() {
        assert_eq!(
            eval("const a = [1, 2]; a.push(3, 4); a.shift(); a.unshift(0); a.join('-')"),
            Value::from("0-2-3-4")
        );
        assert_eq!(
            eval("const a = [1, 2, 3, 4, 5]; const removed = a.splice(1, 2, 'x'); a.join() + '|' + removed.join()"),
            Value::from("1,x,4,5|2,3")
        );
        assert_eq!(eval("const a = [1, 2, 3]; a.length = 1; a.join()"), Value::from("1"));
    }

    #[test]
    fn test_higher_order() {
        assert_eq!(
            eval("[1, 2, 3, 4].filter(n => n % 2 === 0).map(n => n * 10).reduce((a, b) => a + b, 0)"),
            Value::Number(60.0)
        );
        assert_eq!(eval("[3, 1, 2].find(n => n < 3)"), Value::Number(1.0));
        assert_eq!(eval("[1, 2].some(n => n > 1) && [1, 2].every(n => n > 0)"), Value::Boolean(true));
        assert_eq!(eval("[[1, [2]], [3]].flat().length"), Value::Number(3.0));
        assert_eq!(eval("[1, 2].flatMap(n => [n, n]).join('')"), Value::from("1122"));
    }

    #[test]
    fn test_sort() {
        assert_eq!(eval("[10, 9, 1, 100].sort().join()"), Value::from("1,10,100,9"));
        assert_eq!(eval("[10, 9, 1, 100].sort((a, b) => a - b).join()"), Value::from("1,9,10,100"));
        assert_eq!(
            eval("[{ k: 1, v: 'a' }, { k: 0, v: 'b' }, { k: 1, v: 'c' }].sort((x, y) => x.k - y.k).map(o => o.v).join('')"),
            Value::from("bac")
        );
    }

    #[test]
    fn test_reduce_empty_throws() {
        let mut interp = Interpreter::new(Limits::default(), 1);
        let err = interp.eval_script("[].reduce((a, b) => a + b)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Reduce of empty array with no initial value"
        );
    }

    #[test]
    fn test_from_and_search() {
        assert_eq!(eval("Array.from('abc').join()"), Value::from("a,b,c"));
        assert_eq!(eval("Array.from({ length: 3 }, (_, i) => i * 2).join()"), Value::from("0,2,4"));
        assert_eq!(eval("[1, NaN].includes(NaN) && [1, NaN].indexOf(NaN) === -1"), Value::Boolean(true));
        assert_eq!(eval("[1, 2, 3].at(-1)"), Value::Number(3.0));
        assert_eq!(eval("Array.isArray(new Array(3)) && new Array(3).length === 3"), Value::Boolean(true));
    }
}
