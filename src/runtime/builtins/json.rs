//! `JSON.stringify` and `JSON.parse`
//!
//! Parsing builds script values directly and keeps object keys in source
//! order. Stringification is also what the deep-equality matcher and the
//! result report use to serialize script values.

use std::rc::Rc;

use super::object::own_keys;
use super::{arg, define_method};
use crate::error::messages;
use crate::runtime::interp::{EvalResult, Interpreter};
use crate::runtime::number::number_to_string;
use crate::runtime::value::{Key, Name, ObjectKind, ObjectRef, Value};

/// Quote a string the way `JSON.stringify` does
pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

struct Stringifier {
    replacer: Option<Value>,
    allow: Option<Vec<Name>>,
    gap: String,
    stack: Vec<ObjectRef>,
}

impl Stringifier {
    fn property(
        &mut self,
        interp: &mut Interpreter,
        holder: &Value,
        key: &str,
        mut value: Value,
        indent: &str,
    ) -> EvalResult<Option<String>> {
        if matches!(value, Value::Object(_)) {
            let to_json = interp.get_property(&value, "toJSON")?;
            if to_json.is_callable() {
                value = interp.call(&to_json, &value, &[Value::from(key)])?;
            }
        }
        if let Some(replacer) = &self.replacer {
            let replacer = replacer.clone();
            value = interp.call(&replacer, holder, &[Value::from(key), value])?;
        }

        Ok(match &value {
            Value::Null => Some("null".to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Number(n) if n.is_finite() => Some(number_to_string(*n)),
            Value::Number(_) => Some("null".to_string()),
            Value::String(s) => Some(quote(s)),
            Value::Undefined => None,
            Value::Object(obj) => {
                if obj.borrow().is_callable() {
                    None
                } else if value.is_array() {
                    Some(interp.nested(|interp| self.array(interp, obj, indent))?)
                } else {
                    Some(interp.nested(|interp| self.object(interp, obj, indent))?)
                }
            }
        })
    }

    fn enter(&mut self, interp: &Interpreter, obj: &ObjectRef) -> EvalResult<()> {
        if self.stack.iter().any(|seen| Rc::ptr_eq(seen, obj)) {
            return Err(interp.type_error(messages::CIRCULAR_JSON));
        }
        self.stack.push(obj.clone());
        Ok(())
    }

    fn wrap(&self, open: char, close: char, parts: Vec<String>, indent: &str, inner: &str) -> String {
        if parts.is_empty() {
            format!("{}{}", open, close)
        } else if self.gap.is_empty() {
            format!("{}{}{}", open, parts.join(","), close)
        } else {
            let separator = format!(",\n{}", inner);
            format!("{}\n{}{}\n{}{}", open, inner, parts.join(&separator), indent, close)
        }
    }

    fn object(&mut self, interp: &mut Interpreter, obj: &ObjectRef, indent: &str) -> EvalResult<String> {
        self.enter(interp, obj)?;
        let inner = format!("{}{}", indent, self.gap);
        let holder = Value::Object(obj.clone());
        let keys = match &self.allow {
            Some(allow) => allow.clone(),
            None => own_keys(interp, &holder)?,
        };

        let mut parts = Vec::new();
        for key in keys {
            let value = interp.get_property_key(&holder, &Key::from_name(&key))?;
            if let Some(text) = self.property(interp, &holder, &key, value, &inner)? {
                let colon = if self.gap.is_empty() { ":" } else { ": " };
                parts.push(format!("{}{}{}", quote(&key), colon, text));
            }
        }
        self.stack.pop();
        Ok(self.wrap('{', '}', parts, indent, &inner))
    }

    fn array(&mut self, interp: &mut Interpreter, obj: &ObjectRef, indent: &str) -> EvalResult<String> {
        self.enter(interp, obj)?;
        let inner = format!("{}{}", indent, self.gap);
        let holder = Value::Object(obj.clone());
        let elements = match &obj.borrow().kind {
            ObjectKind::Array(elements) => elements.clone(),
            _ => Vec::new(),
        };
        interp.charge(elements.len())?;

        let mut parts = Vec::with_capacity(elements.len());
        for (index, value) in elements.into_iter().enumerate() {
            let text = self.property(interp, &holder, &index.to_string(), value, &inner)?;
            parts.push(text.unwrap_or_else(|| "null".to_string()));
        }
        self.stack.pop();
        Ok(self.wrap('[', ']', parts, indent, &inner))
    }
}

fn gap_of(space: &Value) -> String {
    match space {
        Value::Number(n) if !n.is_nan() => " ".repeat(n.clamp(0.0, 10.0) as usize),
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    }
}

/// `JSON.stringify(value, replacer, space)`; `None` where JavaScript
/// returns `undefined`
pub fn stringify_with(
    interp: &mut Interpreter,
    value: &Value,
    replacer: &Value,
    space: &Value,
) -> EvalResult<Option<String>> {
    let mut stringifier = Stringifier {
        replacer: None,
        allow: None,
        gap: gap_of(space),
        stack: Vec::new(),
    };
    if replacer.is_callable() {
        stringifier.replacer = Some(replacer.clone());
    } else if replacer.is_array() {
        let mut allow: Vec<Name> = Vec::new();
        for item in interp.iterate(replacer)? {
            if matches!(item, Value::String(_) | Value::Number(_)) {
                let name = interp.to_string(&item)?;
                if !allow.contains(&name) {
                    allow.push(name);
                }
            }
        }
        stringifier.allow = Some(allow);
    }

    let holder = interp.new_object();
    holder.borrow_mut().properties.set("".into(), value.clone());
    stringifier.property(interp, &Value::Object(holder), "", value.clone(), "")
}

/// Compact `JSON.stringify(value)`
pub fn stringify(interp: &mut Interpreter, value: &Value) -> EvalResult<Option<String>> {
    stringify_with(interp, value, &Value::Undefined, &Value::Undefined)
}

/// Script value as a `serde_json` tree; `None` for values JSON drops
pub fn to_json_value(interp: &mut Interpreter, value: &Value) -> EvalResult<Option<serde_json::Value>> {
    let Some(text) = stringify(interp, value)? else {
        return Ok(None);
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| interp.syntax_error(e.to_string()))
}

/// Deepest array/object nesting `JSON.parse` accepts
const MAX_JSON_DEPTH: usize = 1_000;

/// Reader behind `JSON.parse`. Builds script values directly, so numbers
/// beyond the `f64` range become `Infinity` instead of failing.
struct JsonReader<'a> {
    text: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> JsonReader<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0, depth: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn error(&self) -> String {
        match self.text[self.pos..].chars().next() {
            None => "Unexpected end of JSON input".to_string(),
            Some(c) => format!(
                "Unexpected token '{}', \"{}\" is not valid JSON",
                c,
                self.text.chars().take(32).collect::<String>()
            ),
        }
    }

    fn expect(&mut self, byte: u8) -> std::result::Result<(), String> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn document(&mut self, interp: &Interpreter) -> std::result::Result<Value, String> {
        let value = self.value(interp)?;
        self.skip_whitespace();
        if self.pos < self.text.len() {
            return Err(self.error());
        }
        Ok(value)
    }

    fn value(&mut self, interp: &Interpreter) -> std::result::Result<Value, String> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'{') => self.nested(interp, Self::object),
            Some(b'[') => self.nested(interp, Self::array),
            Some(b'"') => self.string().map(|s| Value::from(s.as_str())),
            Some(b'-' | b'0'..=b'9') => self.number(),
            Some(b't') => self.literal("true", Value::Boolean(true)),
            Some(b'f') => self.literal("false", Value::Boolean(false)),
            Some(b'n') => self.literal("null", Value::Null),
            _ => Err(self.error()),
        }
    }

    fn nested(
        &mut self,
        interp: &Interpreter,
        read: fn(&mut Self, &Interpreter) -> std::result::Result<Value, String>,
    ) -> std::result::Result<Value, String> {
        if self.depth >= MAX_JSON_DEPTH {
            return Err("Maximum nesting depth exceeded in JSON".to_string());
        }
        self.depth += 1;
        let value = read(self, interp);
        self.depth -= 1;
        value
    }

    fn literal(&mut self, word: &str, value: Value) -> std::result::Result<Value, String> {
        for expected in word.bytes() {
            self.expect(expected)?;
        }
        Ok(value)
    }

    fn digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn number(&mut self) -> std::result::Result<Value, String> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => {
                self.digits();
            }
            _ => return Err(self.error()),
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            if self.digits() == 0 {
                return Err(self.error());
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if self.digits() == 0 {
                return Err(self.error());
            }
        }
        // Out-of-range literals saturate to infinity or zero.
        self.text[start..self.pos]
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| self.error())
    }

    fn hex4(&mut self) -> std::result::Result<u32, String> {
        let digits = self.text.get(self.pos..self.pos + 4).ok_or_else(|| self.error())?;
        let code = u32::from_str_radix(digits, 16).map_err(|_| self.error())?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(self.error());
        }
        self.pos += 4;
        Ok(code)
    }

    fn string(&mut self) -> std::result::Result<String, String> {
        self.expect(b'"')?;
        let mut out = String::new();
        loop {
            let Some(c) = self.text[self.pos..].chars().next() else {
                return Err(self.error());
            };
            match c {
                '"' => {
                    self.pos += 1;
                    return Ok(out);
                }
                '\\' => {
                    self.pos += 1;
                    let escape = self.peek().ok_or_else(|| self.error())?;
                    self.pos += 1;
                    match escape {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'b' => out.push('\u{8}'),
                        b'f' => out.push('\u{c}'),
                        b'n' => out.push('\n'),
                        b'r' => out.push('\r'),
                        b't' => out.push('\t'),
                        b'u' => {
                            let high = self.hex4()?;
                            let code = if (0xD800..0xDC00).contains(&high)
                                && self.text[self.pos..].starts_with("\\u")
                            {
                                let rewind = self.pos;
                                self.pos += 2;
                                let low = self.hex4()?;
                                if (0xDC00..0xE000).contains(&low) {
                                    0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                                } else {
                                    self.pos = rewind;
                                    high
                                }
                            } else {
                                high
                            };
                            out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                        }
                        _ => {
                            self.pos -= 1;
                            return Err(self.error());
                        }
                    }
                }
                c if (c as u32) < 0x20 => return Err(self.error()),
                c => {
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn array(&mut self, interp: &Interpreter) -> std::result::Result<Value, String> {
        self.expect(b'[')?;
        let mut elements = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(interp.new_array(elements));
        }
        loop {
            elements.push(self.value(interp)?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(interp.new_array(elements));
                }
                _ => return Err(self.error()),
            }
        }
    }

    fn object(&mut self, interp: &Interpreter) -> std::result::Result<Value, String> {
        self.expect(b'{')?;
        let object = interp.new_object();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(Value::Object(object));
        }
        loop {
            self.skip_whitespace();
            let key = self.string()?;
            self.skip_whitespace();
            self.expect(b':')?;
            let value = self.value(interp)?;
            object.borrow_mut().properties.set(key.as_str().into(), value);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Object(object));
                }
                _ => return Err(self.error()),
            }
        }
    }
}

fn internalize(interp: &mut Interpreter, reviver: &Value, holder: &Value, key: &str) -> EvalResult<Value> {
    let value = interp.get_property(holder, key)?;
    if matches!(value, Value::Object(_)) {
        let keys = own_keys(interp, &value)?;
        for child in keys {
            let revived = internalize(interp, reviver, &value, &child)?;
            let child_key = Key::from_name(&child);
            if revived.is_undefined() {
                interp.delete_property(&value, &child_key);
            } else {
                interp.set_property_key(&value, &child_key, revived)?;
            }
        }
    }
    interp.call(reviver, holder, &[Value::from(key), value])
}

pub fn register_json(interp: &mut Interpreter) {
    let json = interp.new_object();

    // JSON.stringify
    define_method(interp, &json, "stringify", 3, |interp, _this, args| {
        let text = stringify_with(interp, &arg(args, 0), &arg(args, 1), &arg(args, 2))?;
        Ok(text.map(Value::from).unwrap_or(Value::Undefined))
    });

    // JSON.parse
    define_method(interp, &json, "parse", 2, |interp, _this, args| {
        let text = interp.to_string(&arg(args, 0))?;
        let value = JsonReader::new(&text)
            .document(interp)
            .map_err(|message| interp.syntax_error(message))?;

        let reviver = arg(args, 1);
        if !reviver.is_callable() {
            return Ok(value);
        }
        let root = interp.new_object();
        root.borrow_mut().properties.set("".into(), value);
        internalize(interp, &reviver, &Value::Object(root), "")
    });

    interp.define_global("JSON", Value::Object(json));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::interp::Limits;
    use pretty_assertions::assert_eq;

    fn eval(source: &str) -> Value {
        Interpreter::new(Limits::default(), 1).eval_script(source).unwrap()
    }

    #[test]
    fn test_stringify_shapes() {
        assert_eq!(
            eval("JSON.stringify({ b: 1, a: [1, 'x', null, undefined], f() {}, u: undefined })"),
            Value::from(r#"{"b":1,"a":[1,"x",null,null]}"#)
        );
        assert_eq!(eval("JSON.stringify(undefined)"), Value::Undefined);
        assert_eq!(eval("JSON.stringify(NaN)"), Value::from("null"));
        assert_eq!(eval("JSON.stringify('a\"b\\n')"), Value::from(r#""a\"b\n""#));
    }

    #[test]
    fn test_stringify_indent_and_replacer() {
        assert_eq!(
            eval("JSON.stringify({ a: 1, b: [2] }, null, 2)"),
            Value::from("{\n  \"a\": 1,\n  \"b\": [\n    2\n  ]\n}")
        );
        assert_eq!(
            eval("JSON.stringify({ a: 1, b: 2, c: 3 }, ['a', 'c'])"),
            Value::from(r#"{"a":1,"c":3}"#)
        );
        assert_eq!(
            eval("JSON.stringify({ a: 1, b: 'x' }, (k, v) => typeof v === 'number' ? v * 10 : v)"),
            Value::from(r#"{"a":10,"b":"x"}"#)
        );
        assert_eq!(
            eval("JSON.stringify({ toJSON() { return 'custom' } })"),
            Value::from(r#""custom""#)
        );
    }

    #[test]
    fn test_stringify_circular() {
        assert_eq!(
            eval("const o = {}; o.self = o; try { JSON.stringify(o) } catch (e) { e.message }"),
            Value::from("Converting circular structure to JSON")
        );
        // shared, non-circular references are fine
        assert_eq!(
            eval("const s = { v: 1 }; JSON.stringify([s, s])"),
            Value::from(r#"[{"v":1},{"v":1}]"#)
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(eval("JSON.parse('{\"z\":1,\"a\":[true,null]}').a[0]"), Value::Boolean(true));
        assert_eq!(eval("Object.keys(JSON.parse('{\"z\":1,\"a\":2}')).join()"), Value::from("z,a"));
        assert_eq!(
            eval("try { JSON.parse('{bad') } catch (e) { e.name }"),
            Value::from("SyntaxError")
        );
        assert_eq!(
            eval("JSON.parse('{\"a\":1,\"b\":2}', (k, v) => k === 'a' ? undefined : v).a"),
            Value::Undefined
        );
    }

    #[test]
    fn test_deep_values_abort() {
        let checks = std::thread::Builder::new()
            .stack_size(256 * 1024 * 1024)
            .spawn(|| {
                let nest = "let a = []; for (let i = 0; i < 10000; i++) a = [a];";
                for call in ["JSON.stringify(a)", "a.flat(Infinity)"] {
                    let source = format!("{} try {{ {} }} catch (e) {{ 'caught' }}", nest, call);
                    let err = Interpreter::new(Limits::default(), 1).eval_script(&source).unwrap_err();
                    assert!(err.is_resource_limit(), "{}: {}", call, err);
                }
            })
            .unwrap();
        checks.join().unwrap();
    }

    #[test]
    fn test_parse_out_of_range_numbers() {
        assert_eq!(eval(r#"JSON.parse('{"a":1e400}').a === Infinity"#), Value::Boolean(true));
        assert_eq!(eval("JSON.parse('[-1e400]')[0] === -Infinity"), Value::Boolean(true));
        assert_eq!(eval("JSON.parse('1e-400')"), Value::Number(0.0));
        assert_eq!(eval("JSON.parse(' -0.5e1 ')"), Value::Number(-5.0));
    }

    #[test]
    fn test_parse_strings_and_errors() {
        assert_eq!(eval(r#"JSON.parse('"\\u00e9\\t\\"x\\""') === '\u00e9\t"x"'"#), Value::Boolean(true));
        assert_eq!(eval(r#"JSON.parse('"\\ud83d\\ude00"') === '😀'"#), Value::Boolean(true));
        for bad in ["01", "[1,]", "{\"a\" 1}", "'x'", "[1] 2", "tru", "1.", "-"] {
            let source = format!("try {{ JSON.parse({}); 'parsed' }} catch (e) {{ e.name }}", quote(bad));
            assert_eq!(eval(&source), Value::from("SyntaxError"), "{}", bad);
        }
        assert_eq!(
            eval("try { JSON.parse('') } catch (e) { e.message }"),
            Value::from("Unexpected end of JSON input")
        );
    }

    #[test]
    fn test_to_json_value() {
        let mut interp = Interpreter::new(Limits::default(), 1);
        let value = interp.eval_script("({ list: [1, 2], name: 'x' })").unwrap();
        let json = to_json_value(&mut interp, &value).unwrap();
        assert_eq!(json, Some(serde_json::json!({ "list": [1, 2], "name": "x" })));
    }
}
