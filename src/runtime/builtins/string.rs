//! `String` and `String.prototype`
//!
//! Indices are UTF-16 code units, as in every JavaScript engine; strings are
//! stored as UTF-8 and converted at the boundary.

use super::regexp::{self, regexp_data, utf16_offset};
use super::{arg, define_constructor, define_method, native, relative_index};
use crate::runtime::interp::{EvalResult, Interpreter, MAX_STRING_LENGTH};
use crate::runtime::number::{to_integer, to_uint32};
use crate::runtime::value::{Name, Value};

fn units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn from_units(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return (from <= haystack.len()).then_some(from);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

fn this_string(interp: &mut Interpreter, this: &Value, method: &str) -> EvalResult<Name> {
    match this {
        Value::String(s) => Ok(s.clone()),
        Value::Undefined | Value::Null => Err(interp.type_error(format!(
            "String.prototype.{} called on null or undefined",
            method
        ))),
        other => interp.to_string(other),
    }
}

/// Optional string argument, `undefined` kept as `None`
fn string_arg(interp: &mut Interpreter, args: &[Value], index: usize) -> EvalResult<Option<Name>> {
    match arg(args, index) {
        Value::Undefined => Ok(None),
        other => interp.to_string(&other).map(Some),
    }
}

/// One match found by `replace`/`replaceAll`, in byte offsets
struct Found {
    start: usize,
    end: usize,
    groups: Vec<Option<String>>,
}

/// Expand `$&`, `$1`, `$<name>`, `` $` ``, `$'` and `$$` in a replacement
fn expand_replacement(
    template: &str,
    input: &str,
    found: &Found,
    group_names: &[Option<String>],
) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('&') => {
                chars.next();
                out.push_str(&input[found.start..found.end]);
            }
            Some('`') => {
                chars.next();
                out.push_str(&input[..found.start]);
            }
            Some('\'') => {
                chars.next();
                out.push_str(&input[found.end..]);
            }
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let mut index = d.to_digit(10).unwrap_or(0) as usize;
                if let Some(next) = chars.peek().and_then(|n| n.to_digit(10)) {
                    let two = index * 10 + next as usize;
                    if two >= 1 && two <= found.groups.len() {
                        chars.next();
                        index = two;
                    }
                }
                if index >= 1 && index <= found.groups.len() {
                    out.push_str(found.groups[index - 1].as_deref().unwrap_or(""));
                } else {
                    out.push('$');
                    out.push(d);
                }
            }
            Some('<') if group_names.iter().any(Option::is_some) => {
                chars.next();
                let name: String = chars.by_ref().take_while(|c| *c != '>').collect();
                let position = group_names
                    .iter()
                    .position(|n| n.as_deref() == Some(name.as_str()));
                if let Some(position) = position {
                    out.push_str(found.groups[position].as_deref().unwrap_or(""));
                }
            }
            _ => out.push('$'),
        }
    }
    out
}

fn replace(interp: &mut Interpreter, this: &Value, args: &[Value], all: bool) -> EvalResult<Value> {
    let method = if all { "replaceAll" } else { "replace" };
    let input = this_string(interp, this, method)?;
    let pattern = arg(args, 0);
    let replacement = arg(args, 1);
    let template = if replacement.is_callable() {
        None
    } else {
        Some(interp.to_string(&replacement)?)
    };

    let mut group_names = Vec::new();
    let matches: Vec<Found> = match regexp_data(&pattern) {
        Some(data) => {
            if all && !data.global() {
                return Err(interp.type_error("replaceAll must be called with a global RegExp"));
            }
            group_names = data
                .regex
                .capture_names()
                .skip(1)
                .map(|n| n.map(str::to_string))
                .collect();
            let limit = if data.global() { usize::MAX } else { 1 };
            let found = data
                .regex
                .captures_iter(&input)
                .take(limit)
                .filter_map(|caps| {
                    let whole = caps.get(0)?;
                    Some(Found {
                        start: whole.start(),
                        end: whole.end(),
                        groups: (1..caps.len())
                            .map(|i| caps.get(i).map(|m| m.as_str().to_string()))
                            .collect(),
                    })
                })
                .collect();
            if data.global() {
                interp.set_property(&pattern, "lastIndex", Value::Number(0.0))?;
            }
            found
        }
        None => {
            let needle = interp.to_string(&pattern)?;
            let positions: Vec<usize> = if all {
                input.match_indices(&*needle).map(|(i, _)| i).collect()
            } else {
                input.find(&*needle).into_iter().collect()
            };
            positions
                .into_iter()
                .map(|start| Found {
                    start,
                    end: start + needle.len(),
                    groups: Vec::new(),
                })
                .collect()
        }
    };

    let mut out = String::new();
    let mut last = 0;
    for found in &matches {
        out.push_str(&input[last..found.start]);
        match &template {
            Some(template) => {
                out.push_str(&expand_replacement(template, &input, found, &group_names));
            }
            None => {
                let mut call_args = vec![Value::from(&input[found.start..found.end])];
                call_args.extend(
                    found
                        .groups
                        .iter()
                        .map(|g| g.as_deref().map(Value::from).unwrap_or(Value::Undefined)),
                );
                call_args.push(Value::Number(utf16_offset(&input, found.start) as f64));
                call_args.push(Value::String(input.clone()));
                let result = interp.call(&replacement, &Value::Undefined, &call_args)?;
                out.push_str(&interp.to_string(&result)?);
            }
        }
        last = found.end;
        if out.len() > MAX_STRING_LENGTH {
            return Err(interp.range_error("Invalid string length"));
        }
    }
    out.push_str(&input[last..]);
    Ok(Value::from(out))
}

fn split(interp: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let input = this_string(interp, this, "split")?;
    let separator = arg(args, 0);
    let limit = match arg(args, 1) {
        Value::Undefined => u32::MAX as usize,
        other => to_uint32(interp.to_number(&other)?) as usize,
    };

    let mut pieces: Vec<Value> = Vec::new();
    if let Some(data) = regexp_data(&separator) {
        if input.is_empty() {
            if !data.regex.is_match("") {
                pieces.push(Value::from(""));
            }
        } else {
            let mut last = 0;
            for caps in data.regex.captures_iter(&input) {
                let Some(whole) = caps.get(0) else { continue };
                if whole.start() == whole.end() && (whole.start() == 0 || whole.start() == input.len()) {
                    continue;
                }
                pieces.push(Value::from(&input[last..whole.start()]));
                for i in 1..caps.len() {
                    pieces.push(
                        caps.get(i)
                            .map(|m| Value::from(m.as_str()))
                            .unwrap_or(Value::Undefined),
                    );
                }
                last = whole.end();
            }
            pieces.push(Value::from(&input[last..]));
        }
    } else if separator.is_undefined() {
        pieces.push(Value::String(input.clone()));
    } else {
        let separator = interp.to_string(&separator)?;
        if separator.is_empty() {
            pieces.extend(
                input
                    .encode_utf16()
                    .map(|unit| Value::from(from_units(&[unit]))),
            );
        } else {
            pieces.extend(input.split(&*separator).map(Value::from));
        }
    }
    pieces.truncate(limit);
    Ok(interp.new_array(pieces))
}

/// Coerce a `match`/`search` argument into a RegExp
fn to_regexp(interp: &mut Interpreter, value: &Value, flags: &str) -> EvalResult<Value> {
    if regexp_data(value).is_some() {
        return Ok(value.clone());
    }
    let source = match value {
        Value::Undefined => "(?:)".into(),
        other => interp.to_string(other)?,
    };
    regexp::create_regexp(interp, &source, flags)
}

pub(super) fn register_string(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.string_prototype.clone();

    // String.prototype.charAt
    define_method(interp, &prototype, "charAt", 1, |interp, this, args| {
        let s = units(&this_string(interp, this, "charAt")?);
        let index = to_integer(interp.to_number(&arg(args, 0))?);
        if index < 0.0 || index >= s.len() as f64 {
            return Ok(Value::from(""));
        }
        Ok(Value::from(from_units(&s[index as usize..index as usize + 1])))
    });

    // String.prototype.charCodeAt
    define_method(interp, &prototype, "charCodeAt", 1, |interp, this, args| {
        let s = units(&this_string(interp, this, "charCodeAt")?);
        let index = to_integer(interp.to_number(&arg(args, 0))?);
        if index < 0.0 || index >= s.len() as f64 {
            return Ok(Value::Number(f64::NAN));
        }
        Ok(Value::Number(s[index as usize] as f64))
    });

    // String.prototype.codePointAt
    define_method(interp, &prototype, "codePointAt", 1, |interp, this, args| {
        let s = units(&this_string(interp, this, "codePointAt")?);
        let index = to_integer(interp.to_number(&arg(args, 0))?);
        if index < 0.0 || index >= s.len() as f64 {
            return Ok(Value::Undefined);
        }
        let tail = &s[index as usize..];
        let code = char::decode_utf16(tail.iter().copied())
            .next()
            .map(|c| match c {
                Ok(c) => c as u32,
                Err(e) => e.unpaired_surrogate() as u32,
            })
            .unwrap_or(0);
        Ok(Value::Number(code as f64))
    });

    // String.prototype.at
    define_method(interp, &prototype, "at", 1, |interp, this, args| {
        let s = units(&this_string(interp, this, "at")?);
        let n = to_integer(interp.to_number(&arg(args, 0))?);
        let index = if n < 0.0 { s.len() as f64 + n } else { n };
        if index < 0.0 || index >= s.len() as f64 {
            return Ok(Value::Undefined);
        }
        Ok(Value::from(from_units(&s[index as usize..index as usize + 1])))
    });

    // String.prototype.indexOf
    define_method(interp, &prototype, "indexOf", 1, |interp, this, args| {
        let s = units(&this_string(interp, this, "indexOf")?);
        let needle = units(&interp.to_string(&arg(args, 0))?);
        let from = to_integer(interp.to_number(&arg(args, 1))?).clamp(0.0, s.len() as f64) as usize;
        let found = find_units(&s, &needle, from).map(|i| i as f64);
        Ok(Value::Number(found.unwrap_or(-1.0)))
    });

    // String.prototype.lastIndexOf
    define_method(interp, &prototype, "lastIndexOf", 1, |interp, this, args| {
        let s = units(&this_string(interp, this, "lastIndexOf")?);
        let needle = units(&interp.to_string(&arg(args, 0))?);
        if needle.len() > s.len() {
            return Ok(Value::Number(-1.0));
        }
        let found = (0..=s.len() - needle.len())
            .rev()
            .find(|&i| s[i..i + needle.len()] == *needle)
            .map(|i| i as f64);
        Ok(Value::Number(found.unwrap_or(-1.0)))
    });

    // String.prototype.includes
    define_method(interp, &prototype, "includes", 1, |interp, this, args| {
        let s = units(&this_string(interp, this, "includes")?);
        if regexp_data(&arg(args, 0)).is_some() {
            return Err(interp.type_error(
                "First argument to String.prototype.includes must not be a regular expression",
            ));
        }
        let needle = units(&interp.to_string(&arg(args, 0))?);
        let from = to_integer(interp.to_number(&arg(args, 1))?).clamp(0.0, s.len() as f64) as usize;
        Ok(Value::Boolean(find_units(&s, &needle, from).is_some()))
    });

    // String.prototype.startsWith
    define_method(interp, &prototype, "startsWith", 1, |interp, this, args| {
        let s = units(&this_string(interp, this, "startsWith")?);
        let needle = units(&interp.to_string(&arg(args, 0))?);
        let from = to_integer(interp.to_number(&arg(args, 1))?).clamp(0.0, s.len() as f64) as usize;
        Ok(Value::Boolean(s[from..].starts_with(&needle)))
    });

    // String.prototype.endsWith
    define_method(interp, &prototype, "endsWith", 1, |interp, this, args| {
        let s = units(&this_string(interp, this, "endsWith")?);
        let needle = units(&interp.to_string(&arg(args, 0))?);
        let end = match arg(args, 1) {
            Value::Undefined => s.len(),
            other => to_integer(interp.to_number(&other)?).clamp(0.0, s.len() as f64) as usize,
        };
        Ok(Value::Boolean(s[..end].ends_with(&needle)))
    });

    // String.prototype.slice
    define_method(interp, &prototype, "slice", 2, |interp, this, args| {
        let s = units(&this_string(interp, this, "slice")?);
        let start = relative_index(interp, &arg(args, 0), s.len(), 0)?;
        let end = relative_index(interp, &arg(args, 1), s.len(), s.len())?;
        Ok(Value::from(if start < end {
            from_units(&s[start..end])
        } else {
            String::new()
        }))
    });

    // String.prototype.substring
    define_method(interp, &prototype, "substring", 2, |interp, this, args| {
        let s = units(&this_string(interp, this, "substring")?);
        let len = s.len() as f64;
        let start = to_integer(interp.to_number(&arg(args, 0))?).clamp(0.0, len) as usize;
        let end = match arg(args, 1) {
            Value::Undefined => s.len(),
            other => to_integer(interp.to_number(&other)?).clamp(0.0, len) as usize,
        };
        let (from, to) = if start <= end { (start, end) } else { (end, start) };
        Ok(Value::from(from_units(&s[from..to])))
    });

    // String.prototype.substr
    define_method(interp, &prototype, "substr", 2, |interp, this, args| {
        let s = units(&this_string(interp, this, "substr")?);
        let start = relative_index(interp, &arg(args, 0), s.len(), 0)?;
        let count = match arg(args, 1) {
            Value::Undefined => s.len() - start,
            other => to_integer(interp.to_number(&other)?).clamp(0.0, (s.len() - start) as f64) as usize,
        };
        Ok(Value::from(from_units(&s[start..start + count])))
    });

    // String.prototype.toUpperCase
    define_method(interp, &prototype, "toUpperCase", 0, |interp, this, _args| {
        Ok(Value::from(this_string(interp, this, "toUpperCase")?.to_uppercase()))
    });

    // String.prototype.toLowerCase
    define_method(interp, &prototype, "toLowerCase", 0, |interp, this, _args| {
        Ok(Value::from(this_string(interp, this, "toLowerCase")?.to_lowercase()))
    });

    // String.prototype.trim
    define_method(interp, &prototype, "trim", 0, |interp, this, _args| {
        let s = this_string(interp, this, "trim")?;
        Ok(Value::from(s.trim_matches(is_js_space)))
    });

    // String.prototype.trimStart
    define_method(interp, &prototype, "trimStart", 0, |interp, this, _args| {
        let s = this_string(interp, this, "trimStart")?;
        Ok(Value::from(s.trim_start_matches(is_js_space)))
    });

    // String.prototype.trimEnd
    define_method(interp, &prototype, "trimEnd", 0, |interp, this, _args| {
        let s = this_string(interp, this, "trimEnd")?;
        Ok(Value::from(s.trim_end_matches(is_js_space)))
    });

    // String.prototype.padStart
    define_method(interp, &prototype, "padStart", 2, |interp, this, args| {
        pad(interp, this, args, true)
    });

    // String.prototype.padEnd
    define_method(interp, &prototype, "padEnd", 2, |interp, this, args| {
        pad(interp, this, args, false)
    });

    // String.prototype.repeat
    define_method(interp, &prototype, "repeat", 1, |interp, this, args| {
        let s = this_string(interp, this, "repeat")?;
        let count = to_integer(interp.to_number(&arg(args, 0))?);
        if count < 0.0 || count.is_infinite() {
            return Err(interp.range_error(format!(
                "Invalid count value: {}",
                crate::runtime::number::number_to_string(count)
            )));
        }
        if s.len() as f64 * count > MAX_STRING_LENGTH as f64 {
            return Err(interp.range_error("Invalid string length"));
        }
        interp.charge(s.len() * count as usize)?;
        Ok(Value::from(s.repeat(count as usize)))
    });

    // String.prototype.concat
    define_method(interp, &prototype, "concat", 1, |interp, this, args| {
        let mut out = this_string(interp, this, "concat")?.to_string();
        for value in args {
            out.push_str(&interp.to_string(value)?);
        }
        Ok(Value::from(out))
    });

    // String.prototype.split
    define_method(interp, &prototype, "split", 2, split);

    // String.prototype.replace
    define_method(interp, &prototype, "replace", 2, |interp, this, args| {
        replace(interp, this, args, false)
    });

    // String.prototype.replaceAll
    define_method(interp, &prototype, "replaceAll", 2, |interp, this, args| {
        replace(interp, this, args, true)
    });

    // String.prototype.match
    define_method(interp, &prototype, "match", 1, |interp, this, args| {
        let input = this_string(interp, this, "match")?;
        let regexp = to_regexp(interp, &arg(args, 0), "")?;
        let Some(data) = regexp_data(&regexp) else {
            return Ok(Value::Null);
        };
        if !data.global() {
            return regexp::exec(interp, &regexp, &input);
        }
        interp.set_property(&regexp, "lastIndex", Value::Number(0.0))?;
        let found: Vec<Value> = data
            .regex
            .find_iter(&input)
            .map(|m| Value::from(m.as_str()))
            .collect();
        Ok(if found.is_empty() {
            Value::Null
        } else {
            interp.new_array(found)
        })
    });

    // String.prototype.matchAll
    define_method(interp, &prototype, "matchAll", 1, |interp, this, args| {
        let input = this_string(interp, this, "matchAll")?;
        let regexp = to_regexp(interp, &arg(args, 0), "g")?;
        let Some(data) = regexp_data(&regexp) else {
            return Ok(interp.new_array(Vec::new()));
        };
        if !data.global() {
            return Err(interp.type_error(
                "String.prototype.matchAll called with a non-global RegExp argument",
            ));
        }
        let mut results = Vec::new();
        for caps in data.regex.captures_iter(&input) {
            results.push(regexp::match_array(interp, &data, &caps, &input));
        }
        Ok(interp.new_array(results))
    });

    // String.prototype.search
    define_method(interp, &prototype, "search", 1, |interp, this, args| {
        let input = this_string(interp, this, "search")?;
        let regexp = to_regexp(interp, &arg(args, 0), "")?;
        let index = regexp_data(&regexp)
            .and_then(|data| data.regex.find(&input).map(|m| utf16_offset(&input, m.start()) as f64));
        Ok(Value::Number(index.unwrap_or(-1.0)))
    });

    // String.prototype.localeCompare
    define_method(interp, &prototype, "localeCompare", 1, |interp, this, args| {
        let a = this_string(interp, this, "localeCompare")?;
        let b = interp.to_string(&arg(args, 0))?;
        let ordering = a
            .to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| {
                // lowercase sorts before uppercase on ties
                a.chars()
                    .map(char::is_uppercase)
                    .cmp(b.chars().map(char::is_uppercase))
            });
        Ok(Value::Number(match ordering {
            std::cmp::Ordering::Less => -1.0,
            std::cmp::Ordering::Equal => 0.0,
            std::cmp::Ordering::Greater => 1.0,
        }))
    });

    // String.prototype.normalize
    define_method(interp, &prototype, "normalize", 0, |interp, this, _args| {
        Ok(Value::String(this_string(interp, this, "normalize")?))
    });

    // String.prototype.toString
    define_method(interp, &prototype, "toString", 0, |interp, this, _args| {
        match this {
            Value::String(s) => Ok(Value::String(s.clone())),
            _ => Err(interp.type_error("String.prototype.toString requires that 'this' be a String")),
        }
    });

    // String.prototype.valueOf
    define_method(interp, &prototype, "valueOf", 0, |interp, this, _args| {
        match this {
            Value::String(s) => Ok(Value::String(s.clone())),
            _ => Err(interp.type_error("String.prototype.valueOf requires that 'this' be a String")),
        }
    });

    let string = define_constructor(
        interp,
        "String",
        1,
        &prototype,
        native(|interp, _this, args| {
            if args.is_empty() {
                return Ok(Value::from(""));
            }
            Ok(Value::String(interp.to_string(&args[0])?))
        }),
        None,
    );

    // String.fromCharCode
    define_method(interp, &string, "fromCharCode", 1, |interp, _this, args| {
        let mut codes = Vec::with_capacity(args.len());
        for value in args {
            codes.push(to_uint32(interp.to_number(value)?) as u16);
        }
        Ok(Value::from(from_units(&codes)))
    });

    // String.fromCodePoint
    define_method(interp, &string, "fromCodePoint", 1, |interp, _this, args| {
        let mut out = String::new();
        for value in args {
            let n = interp.to_number(value)?;
            match (n.fract() == 0.0).then(|| char::from_u32(n as u32)).flatten() {
                Some(c) if n >= 0.0 => out.push(c),
                _ => {
                    return Err(interp.range_error(format!(
                        "Invalid code point {}",
                        crate::runtime::number::number_to_string(n)
                    )))
                }
            }
        }
        Ok(Value::from(out))
    });
}

fn is_js_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

fn pad(interp: &mut Interpreter, this: &Value, args: &[Value], at_start: bool) -> EvalResult<Value> {
    let s = this_string(interp, this, if at_start { "padStart" } else { "padEnd" })?;
    let target = to_integer(interp.to_number(&arg(args, 0))?);
    let filler = string_arg(interp, args, 1)?.unwrap_or_else(|| " ".into());
    let current = s.encode_utf16().count();
    if target <= current as f64 || filler.is_empty() {
        return Ok(Value::String(s));
    }
    if target > MAX_STRING_LENGTH as f64 {
        return Err(interp.range_error("Invalid string length"));
    }
    let needed = target as usize - current;
    interp.charge(s.len() + needed)?;
    let filler_units = units(&filler);
    let padding: Vec<u16> = filler_units.iter().copied().cycle().take(needed).collect();
    let padding = from_units(&padding);
    Ok(Value::from(if at_start {
        format!("{}{}", padding, s)
    } else {
        format!("{}{}", s, padding)
    }))
}

#[cfg(test)]
mod tests {
    use crate::runtime::interp::{Interpreter, Limits};
    use crate::runtime::value::Value;

    fn eval(source: &str) -> Value {
        Interpreter::new(Limits::default(), 1).eval_script(source).unwrap()
    }

    #[test]
    fn test_basic_methods() {
        assert_eq!(eval("'Hello'.toUpperCase() + 'WORLD'.toLowerCase()"), Value::from("HELLOworld"));
        assert_eq!(eval("'  pad '.trim()"), Value::from("pad"));
        assert_eq!(eval("'abc'.slice(-2)"), Value::from("bc"));
        assert_eq!(eval("'abcdef'.substring(4, 1)"), Value::from("bcd"));
        assert_eq!(eval("'5'.padStart(3, '0')"), Value::from("005"));
        assert_eq!(eval("'ab'.repeat(3)"), Value::from("ababab"));
        assert_eq!(eval("'hello'.indexOf('l') + 'hello'.lastIndexOf('l')"), Value::Number(5.0));
        assert_eq!(eval("'abc'.at(-1) + 'abc'.charAt(0)"), Value::from("ca"));
    }

    #[test]
    fn test_split() {
        assert_eq!(eval("'a,b,,c'.split(',').length"), Value::Number(4.0));
        assert_eq!(eval("'abc'.split('').join('-')"), Value::from("a-b-c"));
        assert_eq!(eval("'a1b22c'.split(/\\d+/).join()"), Value::from("a,b,c"));
        assert_eq!(eval("'abc'.split().length"), Value::Number(1.0));
        assert_eq!(eval("'a b c'.split(' ', 2).join()"), Value::from("a,b"));
    }

    #[test]
    fn test_replace() {
        assert_eq!(eval("'aaa'.replace('a', 'b')"), Value::from("baa"));
        assert_eq!(eval("'aaa'.replaceAll('a', 'b')"), Value::from("bbb"));
        assert_eq!(eval("'john smith'.replace(/(\\w+) (\\w+)/, '$2, $1')"), Value::from("smith, john"));
        assert_eq!(eval("'a-b-c'.replace(/-/g, m => '+')"), Value::from("a+b+c"));
        assert_eq!(
            eval("'hello world'.replace(/\\b\\w/g, c => c.toUpperCase())"),
            Value::from("Hello World")
        );
    }

    #[test]
    fn test_match_and_search() {
        assert_eq!(eval("'a1b2'.match(/\\d/g).join()"), Value::from("1,2"));
        assert_eq!(eval("'abc'.match(/x/)"), Value::Null);
        assert_eq!(eval("const m = 'key=value'.match(/(\\w+)=(\\w+)/); m[2] + m.index"), Value::from("value0"));
        assert_eq!(eval("'hello'.search(/l+/)"), Value::Number(2.0));
        assert_eq!(eval("[...'a1b2'.matchAll(/\\d/g)].map(m => m[0]).join()"), Value::from("1,2"));
    }

    #[test]
    fn test_utf16_semantics() {
        assert_eq!(eval("'😀'.length"), Value::Number(2.0));
        assert_eq!(eval("[...'😀a'].length"), Value::Number(2.0));
        assert_eq!(eval("'😀'.codePointAt(0)"), Value::Number(128512.0));
        assert_eq!(eval("String.fromCharCode(72, 105)"), Value::from("Hi"));
    }
}
