//! `RegExp` on top of the `regex` crate
//!
//! Patterns are compiled with the `regex` engine, so look-around and
//! backreferences are rejected with a `SyntaxError`. Match positions are
//! reported in UTF-16 code units.

use std::rc::Rc;

use regex::{Captures, RegexBuilder};

use super::{arg, define_constructor, define_method, native};
use crate::runtime::interp::{EvalResult, Interpreter};
use crate::runtime::number::to_integer;
use crate::runtime::value::{Object, ObjectKind, RegExpData, Value};

const FLAGS: &str = "dgimsuy";

/// UTF-16 offset of the byte offset `byte` in `s`
pub(crate) fn utf16_offset(s: &str, byte: usize) -> usize {
    s.get(..byte).map(|prefix| prefix.encode_utf16().count()).unwrap_or(0)
}

/// Byte offset of the UTF-16 offset `units` in `s`, clamped to the end
pub(crate) fn byte_offset(s: &str, units: usize) -> usize {
    let mut seen = 0;
    for (index, c) in s.char_indices() {
        if seen >= units {
            return index;
        }
        seen += c.len_utf16();
    }
    s.len()
}

/// Compiled pattern behind a RegExp object
pub(crate) fn regexp_data(value: &Value) -> Option<Rc<RegExpData>> {
    let Value::Object(obj) = value else {
        return None;
    };
    let o = obj.borrow();
    match &o.kind {
        ObjectKind::RegExp(data) => Some(data.clone()),
        _ => None,
    }
}

/// Rewrite the few escapes the `regex` parser rejects
fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('/') => out.push('/'),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn compile(pattern: &str, flags: &str) -> Result<RegExpData, String> {
    for (index, flag) in flags.char_indices() {
        if !FLAGS.contains(flag) || flags[..index].contains(flag) {
            return Err(format!("Invalid flags supplied to RegExp constructor '{}'", flags));
        }
    }
    let regex = RegexBuilder::new(&translate(pattern))
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| {
            let detail = e.to_string();
            let reason = detail
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map(|line| line.trim().trim_start_matches("error: ").to_string())
                .unwrap_or(detail);
            format!("Invalid regular expression: /{}/{}: {}", pattern, flags, reason)
        })?;
    Ok(RegExpData {
        source: if pattern.is_empty() { "(?:)".into() } else { pattern.into() },
        flags: flags.into(),
        regex,
    })
}

/// Create a RegExp object; invalid patterns and flags throw `SyntaxError`
pub fn create_regexp(interp: &mut Interpreter, pattern: &str, flags: &str) -> EvalResult<Value> {
    let data = compile(pattern, flags).map_err(|message| interp.syntax_error(message))?;
    let mut object = Object::new(
        ObjectKind::RegExp(Rc::new(data)),
        Some(interp.intrinsics.regexp_prototype.clone()),
    );
    object
        .properties
        .define("lastIndex".into(), Value::Number(0.0), false);
    Ok(Value::Object(object.into_ref()))
}

/// Match result array: groups plus `index`, `input` and `groups`
pub(crate) fn match_array(interp: &mut Interpreter, data: &RegExpData, caps: &Captures<'_>, input: &str) -> Value {
    let elements = (0..caps.len())
        .map(|i| {
            caps.get(i)
                .map(|m| Value::from(m.as_str()))
                .unwrap_or(Value::Undefined)
        })
        .collect();
    let array = interp.new_array(elements);
    let index = caps.get(0).map(|m| utf16_offset(input, m.start())).unwrap_or(0);

    let groups = if data.regex.capture_names().any(|name| name.is_some()) {
        let groups = interp.new_object();
        for name in data.regex.capture_names().flatten() {
            let value = caps
                .name(name)
                .map(|m| Value::from(m.as_str()))
                .unwrap_or(Value::Undefined);
            groups.borrow_mut().properties.set(name.into(), value);
        }
        Value::Object(groups)
    } else {
        Value::Undefined
    };

    if let Value::Object(obj) = &array {
        let mut o = obj.borrow_mut();
        o.properties.set("index".into(), Value::Number(index as f64));
        o.properties.set("input".into(), Value::from(input));
        o.properties.set("groups".into(), groups);
    }
    array
}

/// `RegExp.prototype.exec`, honoring `lastIndex` for global and sticky
/// patterns
pub(crate) fn exec(interp: &mut Interpreter, regexp: &Value, input: &str) -> EvalResult<Value> {
    let Some(data) = regexp_data(regexp) else {
        return Err(interp.type_error("RegExp.prototype.exec called on incompatible receiver"));
    };
    let sticky = data.flags.contains('y');
    let stateful = sticky || data.global();

    let start = if stateful {
        let last_index = interp.get_property(regexp, "lastIndex")?;
        to_integer(interp.to_number(&last_index)?)
    } else {
        0.0
    };
    if start < 0.0 || start > input.encode_utf16().count() as f64 {
        interp.set_property(regexp, "lastIndex", Value::Number(0.0))?;
        return Ok(Value::Null);
    }

    let byte_start = byte_offset(input, start as usize);
    let found = data
        .regex
        .captures_at(input, byte_start)
        .filter(|caps| !sticky || caps.get(0).is_some_and(|m| m.start() == byte_start));
    match found {
        Some(caps) => {
            if stateful {
                let end = caps.get(0).map(|m| m.end()).unwrap_or(byte_start);
                interp.set_property(regexp, "lastIndex", Value::Number(utf16_offset(input, end) as f64))?;
            }
            Ok(match_array(interp, &data, &caps, input))
        }
        None => {
            if stateful {
                interp.set_property(regexp, "lastIndex", Value::Number(0.0))?;
            }
            Ok(Value::Null)
        }
    }
}

pub(super) fn register_regexp(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.regexp_prototype.clone();

    // RegExp.prototype.exec
    define_method(interp, &prototype, "exec", 1, |interp, this, args| {
        let input = interp.to_string(&arg(args, 0))?;
        exec(interp, this, &input)
    });

    // RegExp.prototype.test
    define_method(interp, &prototype, "test", 1, |interp, this, args| {
        let input = interp.to_string(&arg(args, 0))?;
        Ok(Value::Boolean(!matches!(exec(interp, this, &input)?, Value::Null)))
    });

    // RegExp.prototype.toString
    define_method(interp, &prototype, "toString", 0, |interp, this, _args| {
        let Some(data) = regexp_data(this) else {
            return Err(interp.type_error("RegExp.prototype.toString requires that 'this' be a RegExp"));
        };
        Ok(Value::from(format!("/{}/{}", data.source, data.flags)))
    });

    let create = native(|interp, _this, args| {
        let pattern = arg(args, 0);
        let flags = match arg(args, 1) {
            Value::Undefined => None,
            other => Some(interp.to_string(&other)?),
        };
        if let Some(data) = regexp_data(&pattern) {
            let flags = flags.unwrap_or_else(|| data.flags.clone());
            return create_regexp(interp, &data.source, &flags);
        }
        let source = match pattern {
            Value::Undefined => "".into(),
            other => interp.to_string(&other)?,
        };
        create_regexp(interp, &source, flags.as_deref().unwrap_or(""))
    });
    define_constructor(interp, "RegExp", 2, &prototype, create.clone(), Some(create));
}
