//! Lexical environments

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap as HashMap;

use super::value::{Name, ObjectRef, Value};

pub type ScopeRef = Rc<RefCell<Scope>>;

/// How a binding was introduced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
    Class,
    Parameter,
    /// Host-provided globals (intrinsics and shim bindings)
    Host,
}

impl BindingKind {
    pub fn is_lexical(self) -> bool {
        matches!(self, BindingKind::Let | BindingKind::Const | BindingKind::Class)
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    /// `None` until initialized (temporal dead zone)
    pub value: Option<Value>,
    pub kind: BindingKind,
}

/// `this` and `super` context of a non-arrow function activation
#[derive(Debug, Clone, Default)]
pub struct FunctionContext {
    /// `None` inside a derived constructor until `super()` returns
    pub this: Option<Value>,
    pub home_object: Option<ObjectRef>,
    /// The function object being executed
    pub function: Option<Value>,
    /// Constructor `new` was applied to, when constructing
    pub new_target: Option<Value>,
}

/// A scope in the scope chain
#[derive(Debug, Default)]
pub struct Scope {
    bindings: HashMap<Name, Binding>,
    parent: Option<ScopeRef>,
    pub context: Option<FunctionContext>,
}

impl Scope {
    pub fn new_global() -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            context: Some(FunctionContext {
                this: Some(Value::Undefined),
                ..FunctionContext::default()
            }),
            ..Scope::default()
        }))
    }

    pub fn new_child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            parent: Some(parent.clone()),
            ..Scope::default()
        }))
    }

    pub fn new_function(parent: &ScopeRef, context: Option<FunctionContext>) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            parent: Some(parent.clone()),
            context,
            ..Scope::default()
        }))
    }

    /// Fresh scope with the same parent and a copy of the bindings (one
    /// `for (let ...)` iteration)
    pub fn copy_of(scope: &ScopeRef) -> ScopeRef {
        let source = scope.borrow();
        Rc::new(RefCell::new(Scope {
            bindings: source.bindings.clone(),
            parent: source.parent.clone(),
            context: source.context.clone(),
        }))
    }

    pub fn parent(&self) -> Option<&ScopeRef> {
        self.parent.as_ref()
    }

    pub fn get_own(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Insert or replace a binding
    pub fn declare(&mut self, name: Name, kind: BindingKind, value: Option<Value>) {
        self.bindings.insert(name, Binding { value, kind });
    }

    /// Initialize a binding in the temporal dead zone
    pub fn initialize(&mut self, name: &str, value: Value) {
        if let Some(binding) = self.bindings.get_mut(name) {
            binding.value = Some(value);
        }
    }

    pub fn binding_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.bindings.get_mut(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &Name> {
        self.bindings.keys()
    }

    /// Drop every binding (breaks reference cycles through closures)
    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}

/// Find the scope holding `name`, walking outwards
pub fn resolve(scope: &ScopeRef, name: &str) -> Option<ScopeRef> {
    let mut current = scope.clone();
    loop {
        if current.borrow().has_own(name) {
            return Some(current);
        }
        let parent = current.borrow().parent.clone();
        match parent {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

/// Find the nearest scope carrying a [`FunctionContext`]
pub fn function_scope(scope: &ScopeRef) -> ScopeRef {
    let mut current = scope.clone();
    loop {
        if current.borrow().context.is_some() {
            return current;
        }
        let parent = current.borrow().parent.clone();
        match parent {
            Some(parent) => current = parent,
            None => return current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_walks_parents() {
        let global = Scope::new_global();
        global
            .borrow_mut()
            .declare("x".into(), BindingKind::Let, Some(Value::Number(1.0)));
        let child = Scope::new_child(&global);
        let grandchild = Scope::new_child(&child);

        let found = resolve(&grandchild, "x").unwrap();
        assert!(Rc::ptr_eq(&found, &global));
        assert!(resolve(&grandchild, "y").is_none());
        assert!(Rc::ptr_eq(&function_scope(&grandchild), &global));
    }

    #[test]
    fn test_copy_of_is_independent() {
        let global = Scope::new_global();
        let loop_scope = Scope::new_child(&global);
        loop_scope
            .borrow_mut()
            .declare("i".into(), BindingKind::Let, Some(Value::Number(0.0)));
        let next = Scope::copy_of(&loop_scope);
        next.borrow_mut().initialize("i", Value::Number(1.0));

        let first = loop_scope.borrow().get_own("i").and_then(|b| b.value.clone());
        assert_eq!(first, Some(Value::Number(0.0)));
    }
}
