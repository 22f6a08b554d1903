//! JavaScript value types
//!
//! This module defines the runtime representation of JavaScript values:
//! primitives are stored inline, everything else lives behind a shared
//! [`ObjectRef`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap as HashMap;

use super::interp::{EvalResult, Interpreter};
use super::number::{array_index, number_to_string};
use super::scope::ScopeRef;
use crate::ast;

/// Property names and string values
pub use crate::ast::Name;

/// Shared, mutable object handle
pub type ObjectRef = Rc<RefCell<Object>>;

/// Type alias for native function implementations: `(interpreter, this, args)`
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &Value, &[Value]) -> EvalResult<Value>>;

/// A JavaScript value
#[derive(Clone)]
pub enum Value {
    /// undefined
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(Name),
    /// Object (includes arrays, functions, errors, ...)
    Object(ObjectRef),
}

impl Value {
    pub fn string(text: impl Into<Name>) -> Self {
        Value::String(text.into())
    }

    /// Check if value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if value is nullish (null or undefined)
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to boolean (truthiness)
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// Get the typeof string
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(obj) => {
                if obj.borrow().is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    pub fn is_callable(&self) -> bool {
        match self {
            Value::Object(obj) => obj.borrow().is_callable(),
            _ => false,
        }
    }

    pub fn is_array(&self) -> bool {
        match self {
            Value::Object(obj) => matches!(obj.borrow().kind, ObjectKind::Array(_)),
            _ => false,
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            Value::Object(obj) => matches!(obj.borrow().kind, ObjectKind::Error),
            _ => false,
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// SameValueZero, used by `includes`, `Map` and `Set`
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }

    /// ToString for primitives; objects need the interpreter
    /// (see [`Interpreter::to_string`])
    pub fn primitive_to_string(&self) -> Option<Name> {
        Some(match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Boolean(true) => "true".into(),
            Value::Boolean(false) => "false".into(),
            Value::Number(n) => number_to_string(*n).into(),
            Value::String(s) => s.clone(),
            Value::Object(_) => return None,
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(obj) => match obj.try_borrow() {
                Ok(obj) => write!(f, "[{}]", obj.class_name()),
                Err(_) => write!(f, "[object]"),
            },
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

/// Property key after ToPropertyKey: array indices are kept numeric
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Index(u32),
    Name(Name),
}

impl Key {
    pub fn from_name(name: &str) -> Key {
        match array_index(name) {
            Some(index) => Key::Index(index),
            None => Key::Name(name.into()),
        }
    }

    /// String form, as stored on ordinary objects
    pub fn to_name(&self) -> Name {
        match self {
            Key::Index(index) => index.to_string().into(),
            Key::Name(name) => name.clone(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{}", index),
            Key::Name(name) => f.write_str(name),
        }
    }
}

/// An own data property
#[derive(Debug, Clone)]
pub struct Property {
    pub value: Value,
    pub enumerable: bool,
}

/// Insertion-ordered property storage
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    entries: Vec<(Name, Property)>,
    index: HashMap<Name, usize>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Set a value, keeping the enumerability of an existing property
    pub fn set(&mut self, key: Name, value: Value) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1.value = value,
            None => self.define(key, value, true),
        }
    }

    /// Create or replace a property with explicit enumerability
    pub fn define(&mut self, key: Name, value: Value, enumerable: bool) {
        let property = Property { value, enumerable };
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = property,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, property));
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let Some(position) = self.index.remove(key) else {
            return false;
        };
        self.entries.remove(position);
        for (i, (name, _)) in self.entries.iter().enumerate().skip(position) {
            self.index.insert(name.clone(), i);
        }
        true
    }

    /// Keys in property order: integer keys ascending, then the rest in
    /// insertion order. Private `#names` are never listed.
    pub fn keys(&self, only_enumerable: bool) -> Vec<Name> {
        let mut indices: Vec<(u32, Name)> = Vec::new();
        let mut names = Vec::new();
        for (name, property) in &self.entries {
            if (only_enumerable && !property.enumerable) || name.starts_with('#') {
                continue;
            }
            match array_index(name) {
                Some(i) => indices.push((i, name.clone())),
                None => names.push(name.clone()),
            }
        }
        indices.sort_by_key(|(i, _)| *i);
        indices.into_iter().map(|(_, name)| name).chain(names).collect()
    }
}

/// Behaviour of a script-defined function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// `function` declarations and expressions
    Normal,
    /// Lexical `this`, never a constructor
    Arrow,
    /// Object literal and class methods
    Method,
    /// Class constructor, only callable with `new`
    ClassConstructor,
}

/// A script function together with its captured environment
pub struct Closure {
    pub function: Rc<ast::Function>,
    pub scope: ScopeRef,
    pub kind: FunctionKind,
    /// Object whose prototype `super.x` resolves against
    pub home_object: Option<ObjectRef>,
    /// Set for class constructors
    pub class: Option<Rc<ClassInfo>>,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.function.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// What a class constructor needs beyond its function body
pub struct ClassInfo {
    pub name: Name,
    /// `None` for base classes, `Some(Value::Null)` for `extends null`
    pub parent: Option<Value>,
    /// Instance fields in declaration order (key, initializer)
    pub fields: Vec<(Name, Option<ast::Expression>)>,
    /// Scope the class body was evaluated in
    pub scope: ScopeRef,
}

/// A host-implemented function
pub struct NativeFunction {
    pub name: Name,
    pub length: u32,
    pub func: NativeFn,
    /// Behaviour under `new`: receives the freshly allocated `this`
    pub constructor: Option<NativeFn>,
}

/// `Function.prototype.bind` result
#[derive(Debug, Clone)]
pub struct BoundFunction {
    pub target: Value,
    pub this: Value,
    pub args: Vec<Value>,
}

/// Hashable identity of a Map/Set key under SameValueZero
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MapKey {
    Undefined,
    Null,
    Boolean(bool),
    Number(u64),
    String(Name),
    Object(usize),
}

impl MapKey {
    fn of(value: &Value) -> Self {
        match value {
            Value::Undefined => MapKey::Undefined,
            Value::Null => MapKey::Null,
            Value::Boolean(b) => MapKey::Boolean(*b),
            Value::Number(n) => {
                let normalized = if *n == 0.0 {
                    0.0
                } else if n.is_nan() {
                    f64::NAN
                } else {
                    *n
                };
                MapKey::Number(normalized.to_bits())
            }
            Value::String(s) => MapKey::String(s.clone()),
            // the entry keeps the object alive, so the address is stable
            Value::Object(obj) => MapKey::Object(Rc::as_ptr(obj) as *const () as usize),
        }
    }
}

/// Insertion-ordered hash map backing `Map` and `Set`
#[derive(Debug, Clone, Default)]
pub struct OrderedMap {
    entries: Vec<Option<(Value, Value)>>,
    index: HashMap<MapKey, usize>,
}

impl OrderedMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        let &i = self.index.get(&MapKey::of(key))?;
        self.entries[i].as_ref().map(|(_, v)| v)
    }

    pub fn has(&self, key: &Value) -> bool {
        self.index.contains_key(&MapKey::of(key))
    }

    pub fn set(&mut self, key: Value, value: Value) {
        let hashed = MapKey::of(&key);
        match self.index.get(&hashed) {
            Some(&i) => {
                if let Some(entry) = self.entries[i].as_mut() {
                    entry.1 = value;
                }
            }
            None => {
                // -0 is stored as +0
                let key = match key {
                    Value::Number(n) if n == 0.0 => Value::Number(0.0),
                    other => other,
                };
                self.index.insert(hashed, self.entries.len());
                self.entries.push(Some((key, value)));
            }
        }
    }

    pub fn delete(&mut self, key: &Value) -> bool {
        match self.index.remove(&MapKey::of(key)) {
            Some(i) => {
                self.entries[i] = None;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Live entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().flatten().map(|(k, v)| (k, v))
    }
}

/// Compiled `RegExp`
#[derive(Debug)]
pub struct RegExpData {
    pub source: Name,
    pub flags: Name,
    pub regex: regex::Regex,
}

impl RegExpData {
    pub fn global(&self) -> bool {
        self.flags.contains('g')
    }
}

/// The internal kind of an object
pub enum ObjectKind {
    Ordinary,
    /// Dense element storage; holes read as `undefined`
    Array(Vec<Value>),
    Function(Rc<Closure>),
    Native(Rc<NativeFunction>),
    BoundFunction(Rc<BoundFunction>),
    /// Instances of `Error` and its subclasses
    Error,
    Map(OrderedMap),
    Set(OrderedMap),
    RegExp(Rc<RegExpData>),
}

/// A JavaScript object
pub struct Object {
    pub kind: ObjectKind,
    pub properties: PropertyMap,
    pub prototype: Option<ObjectRef>,
    /// `Object.freeze` was applied
    pub frozen: bool,
}

impl Object {
    pub fn new(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self {
            kind,
            properties: PropertyMap::new(),
            prototype,
            frozen: false,
        }
    }

    pub fn into_ref(self) -> ObjectRef {
        Rc::new(RefCell::new(self))
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::BoundFunction(_)
        )
    }

    /// Name used by `Object.prototype.toString` and debug output
    pub fn class_name(&self) -> &'static str {
        match self.kind {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::BoundFunction(_) => {
                "Function"
            }
            ObjectKind::Error => "Error",
            ObjectKind::Map(_) => "Map",
            ObjectKind::Set(_) => "Set",
            ObjectKind::RegExp(_) => "RegExp",
        }
    }

    /// Function name as reported by `fn.name`
    pub fn function_name(&self) -> Option<Name> {
        match &self.kind {
            ObjectKind::Function(closure) => Some(match &closure.class {
                Some(class) => class.name.clone(),
                None => closure.function.name.clone().unwrap_or_else(|| "".into()),
            }),
            ObjectKind::Native(native) => Some(native.name.clone()),
            ObjectKind::BoundFunction(bound) => {
                let target = match &bound.target {
                    Value::Object(obj) => obj.borrow().function_name(),
                    _ => None,
                };
                Some(format!("bound {}", target.as_deref().unwrap_or("")).into())
            }
            _ => None,
        }
    }

    /// Own property lookup, including the virtual properties of arrays and
    /// functions
    pub fn get_own(&self, key: &Key) -> Option<Value> {
        match (&self.kind, key) {
            (ObjectKind::Array(elements), Key::Index(i)) => {
                return elements.get(*i as usize).cloned();
            }
            (ObjectKind::Array(elements), Key::Name(name)) if &**name == "length" => {
                return Some(Value::Number(elements.len() as f64));
            }
            _ => {}
        }

        let name = key.to_name();
        if let Some(property) = self.properties.get(&name) {
            return Some(property.value.clone());
        }

        match (&self.kind, &*name) {
            (ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::BoundFunction(_), "name") => {
                self.function_name().map(Value::String)
            }
            (ObjectKind::Function(closure), "length") => {
                Some(Value::Number(closure.function.length() as f64))
            }
            (ObjectKind::Native(native), "length") => Some(Value::Number(native.length as f64)),
            (ObjectKind::BoundFunction(_), "length") => Some(Value::Number(0.0)),
            (ObjectKind::RegExp(data), "source") => Some(Value::String(data.source.clone())),
            (ObjectKind::RegExp(data), "flags") => Some(Value::String(data.flags.clone())),
            (ObjectKind::RegExp(data), "global") => Some(Value::Boolean(data.global())),
            (ObjectKind::RegExp(data), "ignoreCase") => Some(Value::Boolean(data.flags.contains('i'))),
            (ObjectKind::RegExp(data), "multiline") => Some(Value::Boolean(data.flags.contains('m'))),
            (ObjectKind::RegExp(data), "sticky") => Some(Value::Boolean(data.flags.contains('y'))),
            (ObjectKind::Map(map) | ObjectKind::Set(map), "size") => {
                Some(Value::Number(map.len() as f64))
            }
            _ => None,
        }
    }

    pub fn has_own(&self, key: &Key) -> bool {
        match (&self.kind, key) {
            (ObjectKind::Array(elements), Key::Index(i)) => (*i as usize) < elements.len(),
            _ => self.get_own(key).is_some(),
        }
    }

    /// Own enumerable keys in property order
    pub fn own_keys(&self) -> Vec<Name> {
        let mut keys: Vec<Name> = match &self.kind {
            ObjectKind::Array(elements) => {
                (0..elements.len()).map(|i| Name::from(i.to_string())).collect()
            }
            _ => Vec::new(),
        };
        keys.extend(self.properties.keys(true));
        keys
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class_name())
            .field("properties", &self.properties.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_order() {
        let mut props = PropertyMap::new();
        props.set("b".into(), Value::Number(1.0));
        props.set("2".into(), Value::Number(2.0));
        props.set("a".into(), Value::Number(3.0));
        props.set("1".into(), Value::Number(4.0));
        props.define("hidden".into(), Value::Null, false);
        props.set("#secret".into(), Value::Null);
        let keys: Vec<String> = props.keys(true).iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["1", "2", "b", "a"]);

        assert!(props.remove("2"));
        assert!(!props.remove("2"));
        assert_eq!(props.get("a").map(|p| p.value.clone()), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_ordered_map_same_value_zero() {
        let mut map = OrderedMap::new();
        map.set(Value::Number(f64::NAN), Value::from("nan"));
        map.set(Value::Number(-0.0), Value::from("zero"));
        map.set(Value::from("k"), Value::Number(1.0));
        assert_eq!(map.get(&Value::Number(f64::NAN)), Some(&Value::from("nan")));
        assert_eq!(map.get(&Value::Number(0.0)), Some(&Value::from("zero")));
        assert_eq!(map.len(), 3);

        assert!(map.delete(&Value::Number(0.0)));
        let keys: Vec<String> = map.entries().map(|(k, _)| format!("{:?}", k)).collect();
        assert_eq!(keys, vec!["NaN", "\"k\""]);
    }

    #[test]
    fn test_truthiness_and_typeof() {
        assert!(!Value::from("").to_boolean());
        assert!(!Value::Number(f64::NAN).to_boolean());
        assert!(Value::from("0").to_boolean());
        assert_eq!(Value::Null.type_of(), "object");
        let array = Object::new(ObjectKind::Array(vec![]), None).into_ref();
        assert_eq!(Value::Object(array).type_of(), "object");
    }

    #[test]
    fn test_array_virtual_length() {
        let array = Object::new(
            ObjectKind::Array(vec![Value::Number(1.0), Value::Number(2.0)]),
            None,
        );
        assert_eq!(array.get_own(&Key::from_name("length")), Some(Value::Number(2.0)));
        assert_eq!(array.get_own(&Key::Index(1)), Some(Value::Number(2.0)));
        assert_eq!(array.get_own(&Key::Index(5)), None);
        assert_eq!(array.own_keys().len(), 2);
    }
}
