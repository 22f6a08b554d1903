//! Console formatting of script values
//!
//! Output follows Node's `util.inspect` closely enough for learners to
//! recognize it: strings are quoted when nested, objects print as
//! `{ a: 1 }`, deep structures collapse to `[Object]`, and cycles print
//! as `[Circular]`. Formatting never runs script code.

use std::rc::Rc;

use super::number::number_to_string;
use super::value::{Key, ObjectKind, ObjectRef, Value};

/// Nesting level past which objects collapse to `[Object]` / `[Array]`
const MAX_DEPTH: usize = 2;
/// Single-line width before an object breaks over several lines
const BREAK_LENGTH: usize = 72;

/// `console.log` rendering of one argument: top-level strings print raw
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        other => inspect(other),
    }
}

/// `util.inspect` rendering
pub fn inspect(value: &Value) -> String {
    Inspector::default().format(value, 0, 0)
}

/// Join `console.log` arguments with single spaces
pub fn format_args(args: &[Value]) -> String {
    args.iter().map(display).collect::<Vec<_>>().join(" ")
}

fn quote(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn format_key(key: &str) -> String {
    let identifier = key
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if identifier {
        key.to_string()
    } else {
        quote(key)
    }
}

fn format_number(n: f64) -> String {
    if n == 0.0 && n.is_sign_negative() {
        "-0".to_string()
    } else {
        number_to_string(n)
    }
}

/// Name of the constructor behind an instance, unless it is plain `Object`
fn constructor_name(obj: &ObjectRef) -> Option<String> {
    let prototype = obj.borrow().prototype.clone()?;
    let constructor = prototype.borrow().get_own(&Key::from_name("constructor"))?;
    let Value::Object(constructor) = constructor else {
        return None;
    };
    let name = constructor.borrow().function_name()?;
    (!name.is_empty() && &*name != "Object").then(|| name.to_string())
}

#[derive(Default)]
struct Inspector {
    seen: Vec<ObjectRef>,
}

impl Inspector {
    fn format(&mut self, value: &Value, depth: usize, indent: usize) -> String {
        match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => quote(s),
            Value::Object(obj) => self.format_object(obj, depth, indent),
        }
    }

    fn format_object(&mut self, obj: &ObjectRef, depth: usize, indent: usize) -> String {
        if self.seen.iter().any(|seen| Rc::ptr_eq(seen, obj)) {
            return "[Circular]".to_string();
        }

        enum Shape {
            Plain,
            Array(Vec<Value>),
            Function(String),
            Error,
            Map(Vec<(Value, Value)>),
            Set(Vec<Value>),
            RegExp(String),
        }

        let (shape, properties) = {
            let o = obj.borrow();
            let shape = match &o.kind {
                ObjectKind::Ordinary => Shape::Plain,
                ObjectKind::Array(elements) => Shape::Array(elements.clone()),
                ObjectKind::Function(closure) if closure.class.is_some() => {
                    Shape::Function(format!("[class {}]", o.function_name().as_deref().unwrap_or("")))
                }
                ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::BoundFunction(_) => {
                    let name = o.function_name().map(|n| n.to_string()).unwrap_or_default();
                    Shape::Function(if name.is_empty() {
                        "[Function (anonymous)]".to_string()
                    } else {
                        format!("[Function: {}]", name)
                    })
                }
                ObjectKind::Error => Shape::Error,
                ObjectKind::Map(map) => {
                    Shape::Map(map.entries().map(|(k, v)| (k.clone(), v.clone())).collect())
                }
                ObjectKind::Set(set) => Shape::Set(set.entries().map(|(k, _)| k.clone()).collect()),
                ObjectKind::RegExp(data) => Shape::RegExp(format!("/{}/{}", data.source, data.flags)),
            };
            let properties: Vec<(String, Value)> = o
                .properties
                .keys(true)
                .into_iter()
                .filter_map(|key| {
                    o.properties
                        .get(&key)
                        .map(|property| (key.to_string(), property.value.clone()))
                })
                .collect();
            (shape, properties)
        };

        match &shape {
            Shape::Function(text) | Shape::RegExp(text) if properties.is_empty() => return text.clone(),
            Shape::Error => {
                let stack = obj
                    .borrow()
                    .properties
                    .get("stack")
                    .and_then(|p| p.value.as_str().map(str::to_string));
                let text = stack.unwrap_or_else(|| "Error".to_string());
                if properties.is_empty() {
                    return text;
                }
                let parts = properties_parts(self, properties, depth, indent);
                return wrap(&text, "{", "}", parts, indent);
            }
            _ => {}
        }

        if depth > MAX_DEPTH {
            return match &shape {
                Shape::Array(_) => "[Array]".to_string(),
                _ => match constructor_name(obj) {
                    Some(name) => format!("[{}]", name),
                    None => "[Object]".to_string(),
                },
            };
        }

        self.seen.push(obj.clone());
        let result = match shape {
            Shape::Array(elements) => {
                let mut parts: Vec<String> = elements
                    .iter()
                    .map(|element| self.format(element, depth + 1, indent + 2))
                    .collect();
                parts.extend(properties_parts(self, properties, depth, indent));
                wrap("", "[", "]", parts, indent)
            }
            Shape::Map(entries) => {
                let mut parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| {
                        format!(
                            "{} => {}",
                            self.format(k, depth + 1, indent + 2),
                            self.format(v, depth + 1, indent + 2)
                        )
                    })
                    .collect();
                let prefix = format!("Map({})", entries.len());
                parts.extend(properties_parts(self, properties, depth, indent));
                wrap(&prefix, "{", "}", parts, indent)
            }
            Shape::Set(values) => {
                let mut parts: Vec<String> = values
                    .iter()
                    .map(|v| self.format(v, depth + 1, indent + 2))
                    .collect();
                let prefix = format!("Set({})", values.len());
                parts.extend(properties_parts(self, properties, depth, indent));
                wrap(&prefix, "{", "}", parts, indent)
            }
            Shape::Function(text) | Shape::RegExp(text) => {
                let parts = properties_parts(self, properties, depth, indent);
                wrap(&text, "{", "}", parts, indent)
            }
            Shape::Plain | Shape::Error => {
                let prefix = constructor_name(obj).unwrap_or_default();
                let parts = properties_parts(self, properties, depth, indent);
                wrap(&prefix, "{", "}", parts, indent)
            }
        };
        self.seen.pop();
        result
    }
}

/// Lay `parts` out on one line, or one per line when too long
fn wrap(prefix: &str, open: &str, close: &str, parts: Vec<String>, indent: usize) -> String {
    let lead = if prefix.is_empty() {
        String::new()
    } else {
        format!("{} ", prefix)
    };
    if parts.is_empty() {
        return format!("{}{}{}", lead, open, close);
    }
    let single = format!("{}{} {} {}", lead, open, parts.join(", "), close);
    if single.len() + indent <= BREAK_LENGTH && !single.contains('\n') {
        return single;
    }
    let pad = " ".repeat(indent + 2);
    format!(
        "{}{}\n{}{}\n{}{}",
        lead,
        open,
        pad,
        parts.join(&format!(",\n{}", pad)),
        " ".repeat(indent),
        close
    )
}

fn properties_parts(
    inspector: &mut Inspector,
    properties: Vec<(String, Value)>,
    depth: usize,
    indent: usize,
) -> Vec<String> {
    properties
        .into_iter()
        .map(|(key, value)| {
            format!(
                "{}: {}",
                format_key(&key),
                inspector.format(&value, depth + 1, indent + 2)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::interp::{Interpreter, Limits};

    fn show(source: &str) -> String {
        let mut interp = Interpreter::new(Limits::default(), 1);
        let value = interp.eval_script(source).unwrap();
        inspect(&value)
    }

    #[test]
    fn test_primitives() {
        assert_eq!(display(&Value::from("plain")), "plain");
        assert_eq!(inspect(&Value::from("it's")), "\"it's\"");
        assert_eq!(inspect(&Value::Number(-0.0)), "-0");
        assert_eq!(inspect(&Value::Undefined), "undefined");
    }

    #[test]
    fn test_objects_and_arrays() {
        assert_eq!(show("({ a: 1, 'b-c': 'x', d: [1, 2] })"), "{ a: 1, 'b-c': 'x', d: [ 1, 2 ] }");
        assert_eq!(show("[]"), "[]");
        assert_eq!(show("({})"), "{}");
        assert_eq!(show("({ a: { b: { c: { d: 1 } } } })"), "{ a: { b: { c: [Object] } } }");
        assert_eq!(show("const o = { name: 'loop' }; o.self = o; o"), "{ name: 'loop', self: [Circular] }");
    }

    #[test]
    fn test_special_objects() {
        assert_eq!(show("function greet() {}; greet"), "[Function: greet]");
        assert_eq!(show("(() => {})"), "[Function (anonymous)]");
        assert_eq!(show("class Point { constructor() { this.x = 1 } }; new Point()"), "Point { x: 1 }");
        assert_eq!(show("new Map([['a', 1]])"), "Map(1) { 'a' => 1 }");
        assert_eq!(show("new Set([1, 2])"), "Set(2) { 1, 2 }");
        assert_eq!(show("/ab/g"), "/ab/g");
    }

    #[test]
    fn test_long_objects_break_lines() {
        let text = show("({ first: 'aaaaaaaaaaaaaaaa', second: 'bbbbbbbbbbbbbbbb', third: 'cccccccccccccccc' })");
        assert_eq!(
            text,
            "{\n  first: 'aaaaaaaaaaaaaaaa',\n  second: 'bbbbbbbbbbbbbbbb',\n  third: 'cccccccccccccccc'\n}"
        );
    }
}
