//! Tree-walking interpreter
//!
//! Evaluates the AST produced by [`crate::parser`] directly. Script-level
//! exceptions travel as `Err(Exception::Thrown(value))`; resource limit
//! violations travel as `Err(Exception::Abort(error))`, which no `catch`
//! clause intercepts.

use std::rc::Rc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::builtins::{self, Intrinsics};
use super::number::{array_index, string_to_number, to_int32, to_uint32};
use super::scope::{function_scope, resolve, BindingKind, FunctionContext, Scope, ScopeRef};
use super::value::*;
use crate::ast::{self, *};
use crate::error::{messages, Error, ErrorKind, Result};

/// Largest array the interpreter will materialize
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Largest string (in bytes) the interpreter will build
pub const MAX_STRING_LENGTH: usize = 1 << 28;

/// Deepest expression nesting evaluated at once, summed over active calls
pub const MAX_EVAL_DEPTH: usize = 3_000;

/// Elements or bytes of native bulk work that count as one operation
const BULK_UNITS_PER_OPERATION: usize = 16;

/// A non-local exit from evaluation
#[derive(Debug)]
pub enum Exception {
    /// A script value raised by `throw` or by a failing built-in
    Thrown(Value),
    /// Resource exhaustion or an engine error; never catchable
    Abort(Error),
}

impl From<Error> for Exception {
    fn from(error: Error) -> Self {
        Exception::Abort(error)
    }
}

/// Result of evaluating script code
pub type EvalResult<T> = std::result::Result<T, Exception>;

/// Statement completion
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Execution budget for one interpreter
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Statements, calls and loop iterations
    pub max_operations: u64,
    pub max_call_depth: usize,
    /// Wall-clock budget measured from interpreter creation
    pub timeout: Option<Duration>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_operations: 50_000_000,
            max_call_depth: 400,
            timeout: Some(Duration::from_millis(5_000)),
        }
    }
}

/// Hint for [`Interpreter::to_primitive`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Default,
    Number,
    String,
}

/// How [`Interpreter::bind_pattern`] stores values
#[derive(Debug, Clone, Copy)]
enum BindMode {
    /// Assignment through the scope chain
    Assign,
    /// New binding in the given scope
    Declare(BindingKind),
}

/// An assignable location
enum Reference {
    Binding(Name),
    Property(Value, Key),
    Super(Key),
}

/// Values produced by `for...of`, spread and destructuring
pub enum ValueIter {
    /// Arrays are read live, so pushes during iteration are visited
    Array { array: ObjectRef, index: usize },
    List(std::vec::IntoIter<Value>),
}

enum Callee {
    Closure(Rc<Closure>),
    Native(Rc<NativeFunction>),
    Bound(Rc<BoundFunction>),
    NotCallable,
}

/// The interpreter state: intrinsics, scopes and execution budget
pub struct Interpreter {
    pub(crate) intrinsics: Intrinsics,
    /// Intrinsics and host bindings
    global: ScopeRef,
    /// Declarations of every evaluated script
    script: ScopeRef,
    limits: Limits,
    operations: u64,
    call_depth: usize,
    /// Expressions being evaluated, across all calls
    eval_depth: usize,
    started: Instant,
    pub(crate) rng: StdRng,
    /// Value of the last expression statement
    completion: Value,
    default_base_constructor: Rc<ast::Function>,
    default_derived_constructor: Rc<ast::Function>,
}

impl Interpreter {
    /// Create an interpreter with the standard intrinsics installed
    pub fn new(limits: Limits, random_seed: u64) -> Self {
        let global = Scope::new_global();
        let script = Scope::new_child(&global);
        let mut interp = Self {
            intrinsics: Intrinsics::new(),
            global,
            script,
            limits,
            operations: 0,
            call_depth: 0,
            eval_depth: 0,
            started: Instant::now(),
            rng: StdRng::seed_from_u64(random_seed),
            completion: Value::Undefined,
            default_base_constructor: Rc::new(default_constructor(false)),
            default_derived_constructor: Rc::new(default_constructor(true)),
        };
        builtins::install(&mut interp);
        interp
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Operations executed so far
    pub fn operations(&self) -> u64 {
        self.operations
    }

    /// Parse and evaluate a script in the shared script scope
    pub fn eval_script(&mut self, source: &str) -> Result<Value> {
        let program = crate::parser::parse(source)?;
        match self.eval_program(&program) {
            Ok(value) => Ok(value),
            Err(exception) => Err(self.exception_to_error(exception)),
        }
    }

    /// Bind a host value in the global scope
    pub fn define_global(&mut self, name: &str, value: Value) {
        self.global
            .borrow_mut()
            .declare(name.into(), BindingKind::Host, Some(value));
    }

    /// Look a name up the way script code would
    pub fn get_global(&self, name: &str) -> Option<Value> {
        let scope = resolve(&self.script, name)?;
        let scope = scope.borrow();
        scope.get_own(name).and_then(|binding| binding.value.clone())
    }

    /// Drop every global and script binding
    pub fn clear(&mut self) {
        self.script.borrow_mut().clear();
        self.global.borrow_mut().clear();
    }

    /// Convert an escaped exception into a host error
    pub fn exception_to_error(&mut self, exception: Exception) -> Error {
        match exception {
            Exception::Abort(error) => error,
            Exception::Thrown(value) => {
                let (name, message) = self.describe_thrown(&value);
                Error::Uncaught { name, message }
            }
        }
    }

    /// `(name, message)` of a thrown value
    pub fn describe_thrown(&mut self, value: &Value) -> (String, String) {
        if let Value::Object(obj) = value {
            let looks_like_error = {
                let o = obj.borrow();
                matches!(o.kind, ObjectKind::Error) || o.properties.contains("message")
            };
            if looks_like_error {
                let name = self
                    .get_property(value, "name")
                    .ok()
                    .and_then(|v| v.primitive_to_string())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "Error".to_string());
                let message = self
                    .get_property(value, "message")
                    .ok()
                    .and_then(|v| v.primitive_to_string())
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                return (name, message);
            }
        }
        let text = match self.to_string(value) {
            Ok(text) => text.to_string(),
            Err(_) => "[object]".to_string(),
        };
        ("Uncaught".to_string(), text)
    }

    // ========== Budget ==========

    /// Count one unit of work against the operation and time budgets
    pub fn tick(&mut self) -> EvalResult<()> {
        self.operations += 1;
        if self.operations > self.limits.max_operations {
            return Err(Exception::Abort(Error::operation_limit_exceeded(
                self.operations,
                self.limits.max_operations,
            )));
        }
        if self.operations & 0x3ff == 0 {
            self.check_deadline()?;
        }
        Ok(())
    }

    fn check_deadline(&self) -> EvalResult<()> {
        if let Some(timeout) = self.limits.timeout {
            let elapsed = self.started.elapsed();
            if elapsed >= timeout {
                return Err(Exception::Abort(Error::time_limit_exceeded(
                    elapsed.as_millis() as u64,
                    timeout.as_millis() as u64,
                )));
            }
        }
        Ok(())
    }

    /// Count native bulk work (string building, array copies) against the
    /// operation budget, then check the deadline.
    pub(crate) fn charge(&mut self, units: usize) -> EvalResult<()> {
        let operations = (units / BULK_UNITS_PER_OPERATION) as u64;
        self.operations = self.operations.saturating_add(operations);
        if self.operations > self.limits.max_operations {
            return Err(Exception::Abort(Error::operation_limit_exceeded(
                self.operations,
                self.limits.max_operations,
            )));
        }
        self.check_deadline()
    }

    /// Run `eval` one expression level deeper, aborting past [`MAX_EVAL_DEPTH`]
    pub(crate) fn nested<T>(&mut self, eval: impl FnOnce(&mut Self) -> EvalResult<T>) -> EvalResult<T> {
        if self.eval_depth >= MAX_EVAL_DEPTH {
            return Err(Exception::Abort(Error::nesting_depth_exceeded(MAX_EVAL_DEPTH)));
        }
        self.eval_depth += 1;
        let result = eval(self);
        self.eval_depth -= 1;
        result
    }

    fn enter_call(&mut self) -> EvalResult<()> {
        self.tick()?;
        if self.call_depth >= self.limits.max_call_depth {
            return Err(Exception::Abort(Error::stack_depth_exceeded(
                self.call_depth + 1,
                self.limits.max_call_depth,
            )));
        }
        self.call_depth += 1;
        Ok(())
    }

    // ========== Errors ==========

    /// Create an error object of the given kind
    pub fn create_error(&self, kind: ErrorKind, message: &str) -> Value {
        let prototype = self.intrinsics.error_prototype(kind).clone();
        let mut object = Object::new(ObjectKind::Error, Some(prototype));
        object
            .properties
            .define("message".into(), Value::from(message), false);
        object.properties.define(
            "stack".into(),
            Value::from(format!("{}: {}\n    at <anonymous>", kind.name(), message)),
            false,
        );
        Value::Object(object.into_ref())
    }

    pub fn throw(&self, kind: ErrorKind, message: impl AsRef<str>) -> Exception {
        Exception::Thrown(self.create_error(kind, message.as_ref()))
    }

    pub fn type_error(&self, message: impl AsRef<str>) -> Exception {
        self.throw(ErrorKind::TypeError, message)
    }

    pub fn range_error(&self, message: impl AsRef<str>) -> Exception {
        self.throw(ErrorKind::RangeError, message)
    }

    pub fn reference_error(&self, message: impl AsRef<str>) -> Exception {
        self.throw(ErrorKind::ReferenceError, message)
    }

    pub fn syntax_error(&self, message: impl AsRef<str>) -> Exception {
        self.throw(ErrorKind::SyntaxError, message)
    }

    // ========== Object Creation ==========

    pub fn new_object(&self) -> ObjectRef {
        Object::new(
            ObjectKind::Ordinary,
            Some(self.intrinsics.object_prototype.clone()),
        )
        .into_ref()
    }

    pub fn new_array(&self, elements: Vec<Value>) -> Value {
        Value::Object(
            Object::new(
                ObjectKind::Array(elements),
                Some(self.intrinsics.array_prototype.clone()),
            )
            .into_ref(),
        )
    }

    /// Wrap a Rust closure as a callable function object
    pub fn native_function<F>(&self, name: &str, length: u32, func: F) -> Value
    where
        F: Fn(&mut Interpreter, &Value, &[Value]) -> EvalResult<Value> + 'static,
    {
        let native = NativeFunction {
            name: name.into(),
            length,
            func: Rc::new(func),
            constructor: None,
        };
        self.native_object(native)
    }

    pub(crate) fn native_object(&self, native: NativeFunction) -> Value {
        Value::Object(
            Object::new(
                ObjectKind::Native(Rc::new(native)),
                Some(self.intrinsics.function_prototype.clone()),
            )
            .into_ref(),
        )
    }

    fn create_closure(
        &self,
        function: &Rc<ast::Function>,
        scope: &ScopeRef,
        kind: FunctionKind,
        home_object: Option<ObjectRef>,
    ) -> Value {
        let closure = Closure {
            function: function.clone(),
            scope: scope.clone(),
            kind,
            home_object,
            class: None,
        };
        Value::Object(
            Object::new(
                ObjectKind::Function(Rc::new(closure)),
                Some(self.intrinsics.function_prototype.clone()),
            )
            .into_ref(),
        )
    }

    // ========== Programs and Declarations ==========

    /// Evaluate a parsed program in the shared script scope
    pub fn eval_program(&mut self, program: &Program) -> EvalResult<Value> {
        let scope = self.script.clone();
        self.declare_vars(&program.var_names, &scope)?;
        self.hoist_declarations(&program.body, &scope)?;

        self.completion = Value::Undefined;
        for statement in &program.body {
            if !matches!(self.exec(statement, &scope)?, Flow::Normal) {
                break;
            }
        }
        Ok(std::mem::replace(&mut self.completion, Value::Undefined))
    }

    fn declare_vars(&mut self, names: &[Name], scope: &ScopeRef) -> EvalResult<()> {
        for name in names {
            let existing = scope.borrow().get_own(name).map(|b| b.kind);
            match existing {
                Some(kind) if kind.is_lexical() => {
                    return Err(self.syntax_error(messages::already_declared(name)));
                }
                Some(_) => {}
                None => scope.borrow_mut().declare(
                    name.clone(),
                    BindingKind::Var,
                    Some(Value::Undefined),
                ),
            }
        }
        Ok(())
    }

    /// Create the block-scoped bindings of `body` up front: functions are
    /// initialized, `let`/`const`/`class` start in the temporal dead zone
    fn hoist_declarations<'a>(
        &mut self,
        body: impl IntoIterator<Item = &'a Statement>,
        scope: &ScopeRef,
    ) -> EvalResult<()> {
        for statement in body {
            match statement {
                Statement::VariableDeclaration(decl) if decl.kind != VariableKind::Var => {
                    let kind = if decl.kind == VariableKind::Const {
                        BindingKind::Const
                    } else {
                        BindingKind::Let
                    };
                    for declarator in &decl.declarations {
                        for name in declarator.id.bound_names() {
                            self.declare_lexical(scope, name, kind, None)?;
                        }
                    }
                }
                Statement::ClassDeclaration(class) => {
                    if let Some(name) = &class.name {
                        self.declare_lexical(scope, name.clone(), BindingKind::Class, None)?;
                    }
                }
                Statement::FunctionDeclaration(function) => {
                    let Some(name) = function.name.clone() else {
                        continue;
                    };
                    let existing = scope.borrow().get_own(&name).map(|b| b.kind);
                    if existing.is_some_and(BindingKind::is_lexical) {
                        return Err(self.syntax_error(messages::already_declared(&name)));
                    }
                    let value = self.create_closure(function, scope, FunctionKind::Normal, None);
                    scope
                        .borrow_mut()
                        .declare(name, BindingKind::Function, Some(value));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn declare_lexical(
        &mut self,
        scope: &ScopeRef,
        name: Name,
        kind: BindingKind,
        value: Option<Value>,
    ) -> EvalResult<()> {
        if scope.borrow().has_own(&name) {
            return Err(self.syntax_error(messages::already_declared(&name)));
        }
        scope.borrow_mut().declare(name, kind, value);
        Ok(())
    }

    // ========== Statements ==========

    fn exec(&mut self, statement: &Statement, scope: &ScopeRef) -> EvalResult<Flow> {
        self.tick()?;
        match statement {
            Statement::Expression(expr) => {
                self.completion = self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
            Statement::VariableDeclaration(decl) => {
                self.exec_variable_declaration(decl, scope)?;
                Ok(Flow::Normal)
            }
            Statement::FunctionDeclaration(_) | Statement::Empty => Ok(Flow::Normal),
            Statement::ClassDeclaration(class) => {
                let value = self.eval_class(class, scope)?;
                if let Some(name) = &class.name {
                    scope
                        .borrow_mut()
                        .declare(name.clone(), BindingKind::Class, Some(value));
                }
                Ok(Flow::Normal)
            }
            Statement::Block(body) => self.exec_block(body, scope),
            Statement::If(stmt) => {
                if self.eval(&stmt.test, scope)?.to_boolean() {
                    self.exec(&stmt.consequent, scope)
                } else if let Some(alternate) = &stmt.alternate {
                    self.exec(alternate, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::While(stmt) => {
                while self.eval(&stmt.test, scope)?.to_boolean() {
                    match self.exec(&stmt.body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::DoWhile(stmt) => {
                loop {
                    match self.exec(&stmt.body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(&stmt.test, scope)?.to_boolean() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::For(stmt) => self.exec_for(stmt, scope),
            Statement::ForOf(stmt) => {
                let iterable = self.eval(&stmt.right, scope)?;
                let mut iter = self.iterator_for(&iterable)?;
                while let Some(item) = self.iter_next(&mut iter) {
                    match self.exec_for_each_body(stmt, item, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::ForIn(stmt) => {
                let object = self.eval(&stmt.right, scope)?;
                for key in self.for_in_keys(&object) {
                    match self.exec_for_each_body(stmt, Value::String(key), scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::Switch(stmt) => self.exec_switch(stmt, scope),
            Statement::Break => Ok(Flow::Break),
            Statement::Continue => Ok(Flow::Continue),
            Statement::Return(argument) => {
                let value = match argument {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Statement::Throw(expr) => {
                let value = self.eval(expr, scope)?;
                Err(Exception::Thrown(value))
            }
            Statement::Try(stmt) => self.exec_try(stmt, scope),
        }
    }

    fn exec_block(&mut self, body: &[Statement], scope: &ScopeRef) -> EvalResult<Flow> {
        let block_scope = if body.iter().any(Statement::is_lexical_declaration) {
            let block_scope = Scope::new_child(scope);
            self.hoist_declarations(body, &block_scope)?;
            block_scope
        } else {
            scope.clone()
        };
        for statement in body {
            match self.exec(statement, &block_scope)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_variable_declaration(
        &mut self,
        decl: &VariableDeclaration,
        scope: &ScopeRef,
    ) -> EvalResult<()> {
        for declarator in &decl.declarations {
            let value = match &declarator.init {
                Some(init) => self.eval(init, scope)?,
                // `var x;` never resets an existing value
                None if decl.kind == VariableKind::Var => continue,
                None => Value::Undefined,
            };
            let mode = match decl.kind {
                VariableKind::Var => BindMode::Assign,
                VariableKind::Let => BindMode::Declare(BindingKind::Let),
                VariableKind::Const => BindMode::Declare(BindingKind::Const),
            };
            self.bind_pattern(&declarator.id, value, scope, mode)?;
        }
        Ok(())
    }

    fn exec_for(&mut self, stmt: &ForStatement, scope: &ScopeRef) -> EvalResult<Flow> {
        let per_iteration = matches!(
            &stmt.init,
            Some(ForInit::Declaration(decl)) if decl.kind != VariableKind::Var
        );
        let loop_scope = if per_iteration {
            Scope::new_child(scope)
        } else {
            scope.clone()
        };

        match &stmt.init {
            Some(ForInit::Declaration(decl)) => {
                if per_iteration {
                    self.hoist_declarations(
                        std::iter::once(&Statement::VariableDeclaration(decl.clone())),
                        &loop_scope,
                    )?;
                }
                self.exec_variable_declaration(decl, &loop_scope)?;
            }
            Some(ForInit::Expression(expr)) => {
                self.eval(expr, &loop_scope)?;
            }
            None => {}
        }

        let mut iteration_scope = loop_scope;
        loop {
            if let Some(test) = &stmt.test {
                if !self.eval(test, &iteration_scope)?.to_boolean() {
                    break;
                }
            }
            match self.exec(&stmt.body, &iteration_scope)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
            if per_iteration {
                iteration_scope = Scope::copy_of(&iteration_scope);
            }
            if let Some(update) = &stmt.update {
                self.eval(update, &iteration_scope)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for_each_body(
        &mut self,
        stmt: &ForEachStatement,
        item: Value,
        scope: &ScopeRef,
    ) -> EvalResult<Flow> {
        self.tick()?;
        let body_scope = match &stmt.left {
            ForTarget::Declaration(kind, pattern) if *kind != VariableKind::Var => {
                let body_scope = Scope::new_child(scope);
                let binding = if *kind == VariableKind::Const {
                    BindingKind::Const
                } else {
                    BindingKind::Let
                };
                self.bind_pattern(pattern, item, &body_scope, BindMode::Declare(binding))?;
                body_scope
            }
            ForTarget::Declaration(_, pattern) | ForTarget::Pattern(pattern) => {
                self.bind_pattern(pattern, item, scope, BindMode::Assign)?;
                scope.clone()
            }
        };
        self.exec(&stmt.body, &body_scope)
    }

    fn exec_switch(&mut self, stmt: &SwitchStatement, scope: &ScopeRef) -> EvalResult<Flow> {
        let discriminant = self.eval(&stmt.discriminant, scope)?;

        let statements = || stmt.cases.iter().flat_map(|case| case.consequent.iter());
        let switch_scope = if statements().any(Statement::is_lexical_declaration) {
            let switch_scope = Scope::new_child(scope);
            self.hoist_declarations(statements(), &switch_scope)?;
            switch_scope
        } else {
            scope.clone()
        };

        let mut start = None;
        for (index, case) in stmt.cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let value = self.eval(test, &switch_scope)?;
                if value.strict_equals(&discriminant) {
                    start = Some(index);
                    break;
                }
            }
        }
        let start = start.or_else(|| stmt.cases.iter().position(|case| case.test.is_none()));

        if let Some(start) = start {
            for case in &stmt.cases[start..] {
                for statement in &case.consequent {
                    match self.exec(statement, &switch_scope)? {
                        Flow::Normal => {}
                        Flow::Break => return Ok(Flow::Normal),
                        other => return Ok(other),
                    }
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_try(&mut self, stmt: &TryStatement, scope: &ScopeRef) -> EvalResult<Flow> {
        let mut result = self.exec_block(&stmt.block, scope);

        if let (Err(Exception::Thrown(_)), Some(handler)) = (&result, &stmt.handler) {
            let thrown = match std::mem::replace(&mut result, Ok(Flow::Normal)) {
                Err(Exception::Thrown(value)) => value,
                _ => Value::Undefined,
            };
            result = self.exec_catch(handler, thrown, scope);
        }

        if let Some(finalizer) = &stmt.finalizer {
            if matches!(result, Err(Exception::Abort(_))) {
                return result;
            }
            match self.exec_block(finalizer, scope)? {
                Flow::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }

    fn exec_catch(
        &mut self,
        handler: &CatchClause,
        thrown: Value,
        scope: &ScopeRef,
    ) -> EvalResult<Flow> {
        let catch_scope = Scope::new_child(scope);
        if let Some(param) = &handler.param {
            self.bind_pattern(param, thrown, &catch_scope, BindMode::Declare(BindingKind::Let))?;
        }
        self.exec_block(&handler.body, &catch_scope)
    }

    // ========== Bindings ==========

    fn lookup(&mut self, name: &str, scope: &ScopeRef) -> EvalResult<Value> {
        let mut current = scope.clone();
        loop {
            let parent = {
                let s = current.borrow();
                if let Some(binding) = s.get_own(name) {
                    return match &binding.value {
                        Some(value) => Ok(value.clone()),
                        None => Err(self.reference_error(messages::before_initialization(name))),
                    };
                }
                s.parent().cloned()
            };
            match parent {
                Some(parent) => current = parent,
                None => return Err(self.reference_error(messages::not_defined(name))),
            }
        }
    }

    fn assign_identifier(&mut self, name: &Name, value: Value, scope: &ScopeRef) -> EvalResult<()> {
        let Some(owner) = resolve(scope, name) else {
            // sloppy-mode scripts create an implicit global
            self.script
                .borrow_mut()
                .declare(name.clone(), BindingKind::Var, Some(value));
            return Ok(());
        };
        let mut owner = owner.borrow_mut();
        let Some(binding) = owner.binding_mut(name) else {
            return Ok(());
        };
        if binding.value.is_none() {
            drop(owner);
            return Err(self.reference_error(messages::before_initialization(name)));
        }
        if binding.kind == BindingKind::Const {
            drop(owner);
            return Err(self.type_error(messages::assignment_to_constant()));
        }
        binding.value = Some(value);
        Ok(())
    }

    fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        scope: &ScopeRef,
        mode: BindMode,
    ) -> EvalResult<()> {
        match pattern {
            Pattern::Identifier(name) => match mode {
                BindMode::Assign => self.assign_identifier(name, value, scope),
                BindMode::Declare(kind) => {
                    scope.borrow_mut().declare(name.clone(), kind, Some(value));
                    Ok(())
                }
            },
            Pattern::Member(target) => {
                let reference = self.eval_reference(target, scope)?;
                self.put_reference(&reference, value, scope)
            }
            Pattern::Assignment(target, default) => {
                let value = if value.is_undefined() {
                    self.eval(default, scope)?
                } else {
                    value
                };
                self.bind_pattern(target, value, scope, mode)
            }
            Pattern::Rest(inner) => self.bind_pattern(inner, value, scope, mode),
            Pattern::Array(elements) => {
                let items = self.iterate(&value)?;
                for (index, element) in elements.iter().enumerate() {
                    match element {
                        None => {}
                        Some(Pattern::Rest(inner)) => {
                            let rest = items.get(index..).unwrap_or(&[]).to_vec();
                            let rest = self.new_array(rest);
                            self.bind_pattern(inner, rest, scope, mode)?;
                        }
                        Some(element) => {
                            let item = items.get(index).cloned().unwrap_or(Value::Undefined);
                            self.bind_pattern(element, item, scope, mode)?;
                        }
                    }
                }
                Ok(())
            }
            Pattern::Object(properties) => {
                if value.is_nullish() {
                    return Err(self.type_error(format!(
                        "Cannot destructure '{}' as it is {}.",
                        self.display_primitive(&value),
                        self.display_primitive(&value)
                    )));
                }
                let mut used: Vec<Name> = Vec::new();
                for property in properties {
                    match property {
                        ObjectPatternProperty::Property { key, value: target } => {
                            let key = self.property_key(key, scope)?;
                            let item = self.get_property_key(&value, &key)?;
                            used.push(key.to_name());
                            self.bind_pattern(target, item, scope, mode)?;
                        }
                        ObjectPatternProperty::Rest(target) => {
                            let rest = self.new_object();
                            self.copy_data_properties(&rest, &value, &used)?;
                            self.bind_pattern(target, Value::Object(rest), scope, mode)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Copy own enumerable properties of `source` onto `target`
    pub fn copy_data_properties(
        &mut self,
        target: &ObjectRef,
        source: &Value,
        excluded: &[Name],
    ) -> EvalResult<()> {
        let entries: Vec<(Name, Value)> = match source {
            Value::Object(obj) => {
                let o = obj.borrow();
                o.own_keys()
                    .into_iter()
                    .filter_map(|key| {
                        let value = o.get_own(&Key::from_name(&key))?;
                        Some((key, value))
                    })
                    .collect()
            }
            Value::String(s) => s
                .encode_utf16()
                .enumerate()
                .map(|(i, unit)| {
                    (
                        Name::from(i.to_string()),
                        Value::from(String::from_utf16_lossy(&[unit])),
                    )
                })
                .collect(),
            _ => Vec::new(),
        };
        let mut target = target.borrow_mut();
        for (key, value) in entries {
            if !excluded.contains(&key) {
                target.properties.set(key, value);
            }
        }
        Ok(())
    }

    // ========== References ==========

    fn eval_reference(&mut self, expr: &Expression, scope: &ScopeRef) -> EvalResult<Reference> {
        match expr {
            Expression::Identifier(name) => Ok(Reference::Binding(name.clone())),
            Expression::Member(member) => {
                let object = self.eval(&member.object, scope)?;
                let key = self.member_key(&member.property, scope)?;
                Ok(Reference::Property(object, key))
            }
            Expression::SuperMember(property) => {
                let key = self.member_key(property, scope)?;
                Ok(Reference::Super(key))
            }
            _ => Err(self.syntax_error("Invalid left-hand side in assignment")),
        }
    }

    fn target_reference(&mut self, target: &Pattern, scope: &ScopeRef) -> EvalResult<Reference> {
        match target {
            Pattern::Identifier(name) => Ok(Reference::Binding(name.clone())),
            Pattern::Member(expr) => self.eval_reference(expr, scope),
            _ => Err(self.syntax_error("Invalid left-hand side in assignment")),
        }
    }

    fn get_reference(&mut self, reference: &Reference, scope: &ScopeRef) -> EvalResult<Value> {
        match reference {
            Reference::Binding(name) => self.lookup(name, scope),
            Reference::Property(object, key) => {
                if object.is_nullish() {
                    return Err(self.type_error(messages::cannot_read_property(
                        &key.to_name(),
                        &self.display_primitive(object),
                    )));
                }
                self.get_property_key(object, key)
            }
            Reference::Super(key) => self.get_super_property(key, scope),
        }
    }

    fn put_reference(
        &mut self,
        reference: &Reference,
        value: Value,
        scope: &ScopeRef,
    ) -> EvalResult<()> {
        match reference {
            Reference::Binding(name) => self.assign_identifier(name, value, scope),
            Reference::Property(object, key) => self.set_property_key(object, key, value),
            Reference::Super(key) => {
                let this = self.resolve_this(scope)?;
                self.set_property_key(&this, key, value)
            }
        }
    }

    // ========== Expressions ==========

    pub(crate) fn eval(&mut self, expr: &Expression, scope: &ScopeRef) -> EvalResult<Value> {
        self.nested(|interp| interp.eval_expression(expr, scope))
    }

    fn eval_expression(&mut self, expr: &Expression, scope: &ScopeRef) -> EvalResult<Value> {
        match expr {
            Expression::Identifier(name) => self.lookup(name, scope),
            Expression::Literal(literal) => Ok(match literal {
                Literal::Null => Value::Null,
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
            }),
            Expression::Regex { pattern, flags } => {
                builtins::regexp::create_regexp(self, pattern, flags)
            }
            Expression::Template(template) => {
                let mut out = String::new();
                for (index, quasi) in template.quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = template.expressions.get(index) {
                        let value = self.eval(expr, scope)?;
                        out.push_str(&self.to_string(&value)?);
                    }
                }
                Ok(Value::from(out))
            }
            Expression::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    match element {
                        None => values.push(Value::Undefined),
                        Some(Expression::Spread(inner)) => {
                            let iterable = self.eval(inner, scope)?;
                            values.extend(self.iterate(&iterable)?);
                        }
                        Some(expr) => values.push(self.eval(expr, scope)?),
                    }
                }
                Ok(self.new_array(values))
            }
            Expression::Object(properties) => self.eval_object_literal(properties, scope),
            Expression::Function(function) => {
                Ok(self.create_closure(function, scope, FunctionKind::Normal, None))
            }
            Expression::Arrow(function) => {
                Ok(self.create_closure(function, scope, FunctionKind::Arrow, None))
            }
            Expression::Class(class) => self.eval_class(class, scope),
            Expression::This => self.resolve_this(scope),
            Expression::Member(_) | Expression::Call(_) | Expression::OptionalChain(_) => {
                Ok(self.eval_chain(expr, scope)?.unwrap_or(Value::Undefined))
            }
            Expression::SuperMember(property) => {
                let key = self.member_key(property, scope)?;
                self.get_super_property(&key, scope)
            }
            Expression::SuperCall(arguments) => self.eval_super_call(arguments, scope),
            Expression::New(call) => {
                let callee = self.eval(&call.callee, scope)?;
                let args = self.eval_arguments(&call.arguments, scope)?;
                if !self.is_constructor(&callee) {
                    return Err(
                        self.type_error(messages::not_a_constructor(&call.callee.describe()))
                    );
                }
                self.construct(&callee, &args)
            }
            Expression::Unary(operator, argument) => self.eval_unary(*operator, argument, scope),
            Expression::Update(update) => {
                let reference = self.eval_reference(&update.argument, scope)?;
                let old = self.get_reference(&reference, scope)?;
                let old = self.to_number(&old)?;
                let new = match update.operator {
                    UpdateOperator::Increment => old + 1.0,
                    UpdateOperator::Decrement => old - 1.0,
                };
                self.put_reference(&reference, Value::Number(new), scope)?;
                Ok(Value::Number(if update.prefix { new } else { old }))
            }
            Expression::Binary(operator, left, right) => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary(*operator, &left, &right)
            }
            Expression::Logical(operator, left, right) => {
                let left = self.eval(left, scope)?;
                let short_circuit = match operator {
                    LogicalOperator::And => !left.to_boolean(),
                    LogicalOperator::Or => left.to_boolean(),
                    LogicalOperator::NullishCoalescing => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expression::Assignment(assignment) => self.eval_assignment(assignment, scope),
            Expression::Conditional(conditional) => {
                if self.eval(&conditional.test, scope)?.to_boolean() {
                    self.eval(&conditional.consequent, scope)
                } else {
                    self.eval(&conditional.alternate, scope)
                }
            }
            Expression::Sequence(expressions) => {
                let mut last = Value::Undefined;
                for expr in expressions {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
            Expression::Spread(_) => Err(self.syntax_error("Unexpected token '...'")),
        }
    }

    /// Member and call chains; `None` when an optional link short-circuits
    fn eval_chain(&mut self, expr: &Expression, scope: &ScopeRef) -> EvalResult<Option<Value>> {
        self.nested(|interp| interp.eval_chain_link(expr, scope))
    }

    fn eval_chain_link(&mut self, expr: &Expression, scope: &ScopeRef) -> EvalResult<Option<Value>> {
        match expr {
            Expression::Member(member) => {
                let Some(object) = self.eval_chain(&member.object, scope)? else {
                    return Ok(None);
                };
                if member.optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(&member.property, scope)?;
                if object.is_nullish() {
                    return Err(self.type_error(messages::cannot_read_property(
                        &key.to_name(),
                        &self.display_primitive(&object),
                    )));
                }
                self.get_property_key(&object, &key).map(Some)
            }
            Expression::Call(call) => {
                let Some((callee, this)) = self.eval_callee(&call.callee, scope)? else {
                    return Ok(None);
                };
                if call.optional && callee.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_arguments(&call.arguments, scope)?;
                if !callee.is_callable() {
                    return Err(self.type_error(messages::not_a_function(&call.callee.describe())));
                }
                self.call(&callee, &this, &args).map(Some)
            }
            Expression::OptionalChain(inner) => {
                Ok(Some(self.eval_chain(inner, scope)?.unwrap_or(Value::Undefined)))
            }
            other => self.eval(other, scope).map(Some),
        }
    }

    /// Evaluate a callee, returning the function and its `this`
    fn eval_callee(
        &mut self,
        callee: &Expression,
        scope: &ScopeRef,
    ) -> EvalResult<Option<(Value, Value)>> {
        match callee {
            Expression::Member(member) => {
                let Some(object) = self.eval_chain(&member.object, scope)? else {
                    return Ok(None);
                };
                if member.optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(&member.property, scope)?;
                if object.is_nullish() {
                    return Err(self.type_error(messages::cannot_read_property(
                        &key.to_name(),
                        &self.display_primitive(&object),
                    )));
                }
                let function = self.get_property_key(&object, &key)?;
                Ok(Some((function, object)))
            }
            Expression::SuperMember(property) => {
                let key = self.member_key(property, scope)?;
                let function = self.get_super_property(&key, scope)?;
                let this = self.resolve_this(scope)?;
                Ok(Some((function, this)))
            }
            other => Ok(self
                .eval_chain(other, scope)?
                .map(|function| (function, Value::Undefined))),
        }
    }

    fn eval_arguments(&mut self, arguments: &[Expression], scope: &ScopeRef) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match argument {
                Expression::Spread(inner) => {
                    let iterable = self.eval(inner, scope)?;
                    values.extend(self.iterate(&iterable)?);
                }
                expr => values.push(self.eval(expr, scope)?),
            }
        }
        Ok(values)
    }

    fn member_key(&mut self, property: &MemberProperty, scope: &ScopeRef) -> EvalResult<Key> {
        match property {
            MemberProperty::Static(name) => Ok(Key::Name(name.clone())),
            MemberProperty::Computed(expr) => {
                let value = self.eval(expr, scope)?;
                self.to_key(&value)
            }
        }
    }

    fn property_key(&mut self, key: &ast::PropertyKey, scope: &ScopeRef) -> EvalResult<Key> {
        match key {
            ast::PropertyKey::Static(name) => Ok(match array_index(name) {
                Some(index) => Key::Index(index),
                None => Key::Name(name.clone()),
            }),
            ast::PropertyKey::Computed(expr) => {
                let value = self.eval(expr, scope)?;
                self.to_key(&value)
            }
        }
    }

    fn eval_object_literal(
        &mut self,
        properties: &[ObjectProperty],
        scope: &ScopeRef,
    ) -> EvalResult<Value> {
        let object = self.new_object();
        for property in properties {
            match property {
                ObjectProperty::KeyValue(key, value) => {
                    let key = self.property_key(key, scope)?.to_name();
                    let value = self.eval(value, scope)?;
                    object.borrow_mut().properties.set(key, value);
                }
                ObjectProperty::Spread(expr) => {
                    let source = self.eval(expr, scope)?;
                    self.copy_data_properties(&object, &source, &[])?;
                }
            }
        }
        Ok(Value::Object(object))
    }

    fn eval_unary(
        &mut self,
        operator: UnaryOperator,
        argument: &Expression,
        scope: &ScopeRef,
    ) -> EvalResult<Value> {
        match operator {
            UnaryOperator::Typeof => {
                if let Expression::Identifier(name) = argument {
                    if resolve(scope, name).is_none() {
                        return Ok(Value::from("undefined"));
                    }
                }
                let value = self.eval(argument, scope)?;
                Ok(Value::from(value.type_of()))
            }
            UnaryOperator::Delete => match argument {
                Expression::Member(member) => {
                    let object = self.eval(&member.object, scope)?;
                    let key = self.member_key(&member.property, scope)?;
                    Ok(Value::Boolean(self.delete_property(&object, &key)))
                }
                other => {
                    self.eval(other, scope)?;
                    Ok(Value::Boolean(true))
                }
            },
            UnaryOperator::Void => {
                self.eval(argument, scope)?;
                Ok(Value::Undefined)
            }
            UnaryOperator::Not => Ok(Value::Boolean(!self.eval(argument, scope)?.to_boolean())),
            UnaryOperator::Minus => {
                let value = self.eval(argument, scope)?;
                Ok(Value::Number(-self.to_number(&value)?))
            }
            UnaryOperator::Plus => {
                let value = self.eval(argument, scope)?;
                Ok(Value::Number(self.to_number(&value)?))
            }
            UnaryOperator::BitwiseNot => {
                let value = self.eval(argument, scope)?;
                Ok(Value::Number(!to_int32(self.to_number(&value)?) as f64))
            }
        }
    }

    fn eval_assignment(
        &mut self,
        assignment: &AssignmentExpression,
        scope: &ScopeRef,
    ) -> EvalResult<Value> {
        match assignment.operator {
            AssignmentOperator::Assign => match &assignment.target {
                Pattern::Identifier(name) => {
                    let value = self.eval(&assignment.value, scope)?;
                    self.assign_identifier(name, value.clone(), scope)?;
                    Ok(value)
                }
                Pattern::Member(target) => {
                    let reference = self.eval_reference(target, scope)?;
                    let value = self.eval(&assignment.value, scope)?;
                    self.put_reference(&reference, value.clone(), scope)?;
                    Ok(value)
                }
                pattern => {
                    let value = self.eval(&assignment.value, scope)?;
                    self.bind_pattern(pattern, value.clone(), scope, BindMode::Assign)?;
                    Ok(value)
                }
            },
            AssignmentOperator::Compound(operator) => {
                let reference = self.target_reference(&assignment.target, scope)?;
                let old = self.get_reference(&reference, scope)?;
                let right = self.eval(&assignment.value, scope)?;
                let value = self.binary(operator, &old, &right)?;
                self.put_reference(&reference, value.clone(), scope)?;
                Ok(value)
            }
            AssignmentOperator::Logical(operator) => {
                let reference = self.target_reference(&assignment.target, scope)?;
                let old = self.get_reference(&reference, scope)?;
                let keep = match operator {
                    LogicalOperator::And => !old.to_boolean(),
                    LogicalOperator::Or => old.to_boolean(),
                    LogicalOperator::NullishCoalescing => !old.is_nullish(),
                };
                if keep {
                    return Ok(old);
                }
                let value = self.eval(&assignment.value, scope)?;
                self.put_reference(&reference, value.clone(), scope)?;
                Ok(value)
            }
        }
    }

    // ========== Operators ==========

    /// Apply a binary operator to evaluated operands
    pub fn binary(&mut self, operator: BinaryOperator, left: &Value, right: &Value) -> EvalResult<Value> {
        use BinaryOperator::*;

        if let (Value::Number(a), Value::Number(b)) = (left, right) {
            let (a, b) = (*a, *b);
            let fast = match operator {
                Add => Some(a + b),
                Sub => Some(a - b),
                Mul => Some(a * b),
                Div => Some(a / b),
                Mod => Some(a % b),
                _ => None,
            };
            if let Some(result) = fast {
                return Ok(Value::Number(result));
            }
        }

        Ok(match operator {
            Add => {
                let a = self.to_primitive(left, Hint::Default)?;
                let b = self.to_primitive(right, Hint::Default)?;
                if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) {
                    let a = self.to_string(&a)?;
                    let b = self.to_string(&b)?;
                    if a.len() + b.len() > MAX_STRING_LENGTH {
                        return Err(self.range_error("Invalid string length"));
                    }
                    self.charge(a.len() + b.len())?;
                    let mut out = String::with_capacity(a.len() + b.len());
                    out.push_str(&a);
                    out.push_str(&b);
                    Value::from(out)
                } else {
                    Value::Number(self.to_number(&a)? + self.to_number(&b)?)
                }
            }
            Sub | Mul | Div | Mod | Pow => {
                let a = self.to_number(left)?;
                let b = self.to_number(right)?;
                Value::Number(match operator {
                    Sub => a - b,
                    Mul => a * b,
                    Div => a / b,
                    Mod => a % b,
                    _ => js_pow(a, b),
                })
            }
            Eq => Value::Boolean(self.loose_equals(left, right)?),
            Ne => Value::Boolean(!self.loose_equals(left, right)?),
            StrictEq => Value::Boolean(left.strict_equals(right)),
            StrictNe => Value::Boolean(!left.strict_equals(right)),
            Lt => Value::Boolean(self.less_than(left, right, true)? == Some(true)),
            Gt => Value::Boolean(self.less_than(right, left, false)? == Some(true)),
            Le => Value::Boolean(self.less_than(right, left, false)? == Some(false)),
            Ge => Value::Boolean(self.less_than(left, right, true)? == Some(false)),
            Shl | Shr | UShr | BitwiseAnd | BitwiseOr | BitwiseXor => {
                let a = self.to_number(left)?;
                let b = self.to_number(right)?;
                let shift = to_uint32(b) & 31;
                Value::Number(match operator {
                    Shl => to_int32(a).wrapping_shl(shift) as f64,
                    Shr => (to_int32(a) >> shift) as f64,
                    UShr => (to_uint32(a) >> shift) as f64,
                    BitwiseAnd => (to_int32(a) & to_int32(b)) as f64,
                    BitwiseOr => (to_int32(a) | to_int32(b)) as f64,
                    _ => (to_int32(a) ^ to_int32(b)) as f64,
                })
            }
            In => {
                let Value::Object(object) = right else {
                    let key = self.to_string(left)?;
                    return Err(self.type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        key,
                        self.display_primitive(right)
                    )));
                };
                let key = self.to_key(left)?;
                Value::Boolean(self.has_property(object, &key))
            }
            Instanceof => Value::Boolean(self.instance_of(left, right)?),
        })
    }

    /// Abstract relational comparison; `None` when either side is NaN
    fn less_than(&mut self, left: &Value, right: &Value, left_first: bool) -> EvalResult<Option<bool>> {
        let (a, b) = if left_first {
            let a = self.to_primitive(left, Hint::Number)?;
            (a, self.to_primitive(right, Hint::Number)?)
        } else {
            let b = self.to_primitive(right, Hint::Number)?;
            (self.to_primitive(left, Hint::Number)?, b)
        };
        if let (Value::String(a), Value::String(b)) = (&a, &b) {
            return Ok(Some(a.encode_utf16().lt(b.encode_utf16())));
        }
        let a = self.to_number(&a)?;
        let b = self.to_number(&b)?;
        if a.is_nan() || b.is_nan() {
            Ok(None)
        } else {
            Ok(Some(a < b))
        }
    }

    /// Abstract equality (==)
    pub fn loose_equals(&mut self, left: &Value, right: &Value) -> EvalResult<bool> {
        Ok(match (left, right) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(a), Value::String(b)) => *a == string_to_number(b),
            (Value::String(a), Value::Number(b)) => string_to_number(a) == *b,
            (Value::Boolean(b), other) => {
                let n = Value::Number(if *b { 1.0 } else { 0.0 });
                return self.loose_equals(&n, other);
            }
            (other, Value::Boolean(b)) => {
                let n = Value::Number(if *b { 1.0 } else { 0.0 });
                return self.loose_equals(other, &n);
            }
            (Value::Object(_), Value::Number(_) | Value::String(_)) => {
                let primitive = self.to_primitive(left, Hint::Default)?;
                return self.loose_equals(&primitive, right);
            }
            (Value::Number(_) | Value::String(_), Value::Object(_)) => {
                let primitive = self.to_primitive(right, Hint::Default)?;
                return self.loose_equals(left, &primitive);
            }
            _ => left.strict_equals(right),
        })
    }

    pub fn instance_of(&mut self, value: &Value, constructor: &Value) -> EvalResult<bool> {
        if !constructor.is_callable() {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        }
        let bound_target = match constructor {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::BoundFunction(bound) => Some(bound.target.clone()),
                _ => None,
            },
            _ => None,
        };
        if let Some(target) = bound_target {
            return self.instance_of(value, &target);
        }

        let Value::Object(object) = value else {
            return Ok(false);
        };
        let Value::Object(prototype) = self.get_property(constructor, "prototype")? else {
            return Err(self.type_error(
                "Function has non-object prototype 'undefined' in instanceof check",
            ));
        };
        let mut current = object.borrow().prototype.clone();
        while let Some(candidate) = current {
            if Rc::ptr_eq(&candidate, &prototype) {
                return Ok(true);
            }
            current = candidate.borrow().prototype.clone();
        }
        Ok(false)
    }

    // ========== Conversions ==========

    pub fn to_primitive(&mut self, value: &Value, hint: Hint) -> EvalResult<Value> {
        if !matches!(value, Value::Object(_)) {
            return Ok(value.clone());
        }
        let order = if hint == Hint::String {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for method in order {
            let function = self.get_property(value, method)?;
            if function.is_callable() {
                let result = self.call(&function, value, &[])?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("Cannot convert object to primitive value"))
    }

    /// ToString
    pub fn to_string(&mut self, value: &Value) -> EvalResult<Name> {
        if let Some(text) = value.primitive_to_string() {
            return Ok(text);
        }
        let primitive = self.to_primitive(value, Hint::String)?;
        Ok(primitive.primitive_to_string().unwrap_or_else(|| "".into()))
    }

    /// ToNumber
    pub fn to_number(&mut self, value: &Value) -> EvalResult<f64> {
        Ok(match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::Number)?;
                return self.to_number(&primitive);
            }
        })
    }

    /// ToPropertyKey
    pub fn to_key(&mut self, value: &Value) -> EvalResult<Key> {
        match value {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < u32::MAX as f64 => {
                Ok(Key::Index(*n as u32))
            }
            Value::String(s) => Ok(match array_index(s) {
                Some(index) => Key::Index(index),
                None => Key::Name(s.clone()),
            }),
            other => {
                let text = self.to_string(other)?;
                Ok(match array_index(&text) {
                    Some(index) => Key::Index(index),
                    None => Key::Name(text),
                })
            }
        }
    }

    /// Short description of a primitive for error messages
    pub fn display_primitive(&self, value: &Value) -> String {
        match value {
            Value::String(s) => format!("\"{}\"", s),
            Value::Object(obj) => match obj.borrow().function_name() {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => "object".to_string(),
            },
            other => other
                .primitive_to_string()
                .map(|s| s.to_string())
                .unwrap_or_default(),
        }
    }

    // ========== Properties ==========

    /// `target[key]` for a string key
    pub fn get_property(&mut self, target: &Value, key: &str) -> EvalResult<Value> {
        let key = Key::from_name(key);
        self.get_property_key(target, &key)
    }

    pub fn get_property_key(&mut self, target: &Value, key: &Key) -> EvalResult<Value> {
        match target {
            Value::Object(obj) => Ok(self.get_from_object(obj, key)),
            Value::String(s) => {
                match key {
                    Key::Index(index) => {
                        let unit = s.encode_utf16().nth(*index as usize);
                        return Ok(unit
                            .map(|unit| Value::from(String::from_utf16_lossy(&[unit])))
                            .unwrap_or(Value::Undefined));
                    }
                    Key::Name(name) if &**name == "length" => {
                        return Ok(Value::Number(s.encode_utf16().count() as f64));
                    }
                    _ => {}
                }
                let prototype = self.intrinsics.string_prototype.clone();
                Ok(self.get_from_object(&prototype, key))
            }
            Value::Number(_) => {
                let prototype = self.intrinsics.number_prototype.clone();
                Ok(self.get_from_object(&prototype, key))
            }
            Value::Boolean(_) => {
                let prototype = self.intrinsics.boolean_prototype.clone();
                Ok(self.get_from_object(&prototype, key))
            }
            Value::Undefined | Value::Null => Err(self.type_error(messages::cannot_read_property(
                &key.to_name(),
                &self.display_primitive(target),
            ))),
        }
    }

    /// Property lookup along the prototype chain
    pub fn get_from_object(&self, object: &ObjectRef, key: &Key) -> Value {
        if matches!(key, Key::Name(name) if &**name == "prototype") {
            self.ensure_function_prototype(object);
        }
        let mut current = object.clone();
        loop {
            let next = {
                let o = current.borrow();
                if let Some(value) = o.get_own(key) {
                    return value;
                }
                o.prototype.clone()
            };
            match next {
                Some(next) => current = next,
                None => return Value::Undefined,
            }
        }
    }

    /// Ordinary functions get their `prototype` object on first use
    fn ensure_function_prototype(&self, object: &ObjectRef) {
        let needed = {
            let o = object.borrow();
            matches!(&o.kind, ObjectKind::Function(closure) if closure.kind == FunctionKind::Normal)
                && !o.properties.contains("prototype")
        };
        if needed {
            let prototype = self.new_object();
            prototype.borrow_mut().properties.define(
                "constructor".into(),
                Value::Object(object.clone()),
                false,
            );
            object.borrow_mut().properties.define(
                "prototype".into(),
                Value::Object(prototype),
                false,
            );
        }
    }

    pub fn has_property(&self, object: &ObjectRef, key: &Key) -> bool {
        let mut current = Some(object.clone());
        while let Some(candidate) = current {
            if candidate.borrow().has_own(key) {
                return true;
            }
            current = candidate.borrow().prototype.clone();
        }
        false
    }

    pub fn set_property(&mut self, target: &Value, key: &str, value: Value) -> EvalResult<()> {
        let key = Key::from_name(key);
        self.set_property_key(target, &key, value)
    }

    pub fn set_property_key(&mut self, target: &Value, key: &Key, value: Value) -> EvalResult<()> {
        let object = match target {
            Value::Object(obj) => obj,
            Value::Undefined | Value::Null => {
                return Err(self.type_error(messages::cannot_set_property(
                    &key.to_name(),
                    &self.display_primitive(target),
                )));
            }
            // writes to primitives are dropped
            _ => return Ok(()),
        };

        let is_length = matches!(key, Key::Name(name) if &**name == "length");
        if is_length && target.is_array() {
            let length = self.to_number(&value)?;
            if length < 0.0 || length.fract() != 0.0 || length > MAX_ARRAY_LENGTH as f64 {
                return Err(self.range_error(messages::INVALID_ARRAY_LENGTH));
            }
            self.charge(length as usize)?;
            let mut o = object.borrow_mut();
            if o.frozen {
                return Ok(());
            }
            if let ObjectKind::Array(elements) = &mut o.kind {
                elements.resize(length as usize, Value::Undefined);
            }
            return Ok(());
        }

        if let Key::Index(index) = key {
            let growth = match &object.borrow().kind {
                ObjectKind::Array(elements) => (*index as usize).saturating_sub(elements.len()),
                _ => 0,
            };
            if growth > 0 {
                self.charge(growth.min(MAX_ARRAY_LENGTH))?;
            }
        }

        let mut o = object.borrow_mut();
        if o.frozen {
            return Ok(());
        }
        if let (ObjectKind::Array(elements), Key::Index(index)) = (&mut o.kind, key) {
            let index = *index as usize;
            if index >= elements.len() {
                if index >= MAX_ARRAY_LENGTH {
                    drop(o);
                    return Err(self.range_error(messages::INVALID_ARRAY_LENGTH));
                }
                elements.resize(index + 1, Value::Undefined);
            }
            elements[index] = value;
            return Ok(());
        }
        o.properties.set(key.to_name(), value);
        Ok(())
    }

    pub fn delete_property(&mut self, target: &Value, key: &Key) -> bool {
        let Value::Object(object) = target else {
            return true;
        };
        let mut o = object.borrow_mut();
        if o.frozen {
            return false;
        }
        if let (ObjectKind::Array(elements), Key::Index(index)) = (&mut o.kind, key) {
            if let Some(slot) = elements.get_mut(*index as usize) {
                *slot = Value::Undefined;
            }
            return true;
        }
        o.properties.remove(&key.to_name());
        true
    }

    /// Keys visited by `for...in`
    fn for_in_keys(&self, value: &Value) -> Vec<Name> {
        match value {
            Value::String(s) => (0..s.encode_utf16().count())
                .map(|i| Name::from(i.to_string()))
                .collect(),
            Value::Object(object) => {
                let mut keys: Vec<Name> = Vec::new();
                let mut current = Some(object.clone());
                while let Some(candidate) = current {
                    let o = candidate.borrow();
                    for key in o.own_keys() {
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                    current = o.prototype.clone();
                }
                keys
            }
            _ => Vec::new(),
        }
    }

    // ========== Iteration ==========

    pub fn iterator_for(&mut self, value: &Value) -> EvalResult<ValueIter> {
        let items: Vec<Value> = match value {
            Value::Object(object) => {
                let o = object.borrow();
                match &o.kind {
                    ObjectKind::Array(_) => {
                        return Ok(ValueIter::Array {
                            array: object.clone(),
                            index: 0,
                        })
                    }
                    ObjectKind::Map(map) => {
                        let entries: Vec<(Value, Value)> =
                            map.entries().map(|(k, v)| (k.clone(), v.clone())).collect();
                        entries
                            .into_iter()
                            .map(|(k, v)| self.new_array(vec![k, v]))
                            .collect()
                    }
                    ObjectKind::Set(set) => set.entries().map(|(k, _)| k.clone()).collect(),
                    _ => {
                        return Err(
                            self.type_error(messages::not_iterable(&self.display_primitive(value)))
                        )
                    }
                }
            }
            Value::String(s) => s.chars().map(|c| Value::from(c.to_string())).collect(),
            _ => {
                return Err(self.type_error(messages::not_iterable(&self.display_primitive(value))))
            }
        };
        Ok(ValueIter::List(items.into_iter()))
    }

    pub fn iter_next(&self, iter: &mut ValueIter) -> Option<Value> {
        match iter {
            ValueIter::Array { array, index } => {
                let item = match &array.borrow().kind {
                    ObjectKind::Array(elements) => elements.get(*index).cloned(),
                    _ => None,
                };
                *index += 1;
                item
            }
            ValueIter::List(items) => items.next(),
        }
    }

    /// Collect every value an iterable produces
    pub fn iterate(&mut self, value: &Value) -> EvalResult<Vec<Value>> {
        if let Value::Object(object) = value {
            if let ObjectKind::Array(elements) = &object.borrow().kind {
                return Ok(elements.clone());
            }
        }
        let mut iter = self.iterator_for(value)?;
        let mut items = Vec::new();
        while let Some(item) = self.iter_next(&mut iter) {
            items.push(item);
        }
        Ok(items)
    }

    // ========== Calls ==========

    fn callee_of(value: &Value) -> Callee {
        let Value::Object(object) = value else {
            return Callee::NotCallable;
        };
        let o = object.borrow();
        match &o.kind {
            ObjectKind::Function(closure) => Callee::Closure(closure.clone()),
            ObjectKind::Native(native) => Callee::Native(native.clone()),
            ObjectKind::BoundFunction(bound) => Callee::Bound(bound.clone()),
            _ => Callee::NotCallable,
        }
    }

    /// Call `callee` with the given `this` and arguments
    pub fn call(&mut self, callee: &Value, this: &Value, args: &[Value]) -> EvalResult<Value> {
        match Self::callee_of(callee) {
            Callee::Closure(closure) => {
                if closure.kind == FunctionKind::ClassConstructor {
                    let name = closure
                        .class
                        .as_ref()
                        .map(|class| class.name.to_string())
                        .unwrap_or_default();
                    return Err(self.type_error(format!(
                        "Class constructor {} cannot be invoked without 'new'",
                        name
                    )));
                }
                self.invoke(&closure, callee, Some(this.clone()), args, None)
                    .map(|(value, _)| value)
            }
            Callee::Native(native) => {
                self.enter_call()?;
                let result = (native.func)(self, this, args);
                self.call_depth -= 1;
                result
            }
            Callee::Bound(bound) => {
                let mut full = bound.args.clone();
                full.extend_from_slice(args);
                self.call(&bound.target, &bound.this, &full)
            }
            Callee::NotCallable => {
                Err(self.type_error(messages::not_a_function(&self.display_primitive(callee))))
            }
        }
    }

    /// Run a closure body; returns the completion value and the final `this`
    fn invoke(
        &mut self,
        closure: &Rc<Closure>,
        function_value: &Value,
        this: Option<Value>,
        args: &[Value],
        new_target: Option<Value>,
    ) -> EvalResult<(Value, Option<Value>)> {
        self.enter_call()?;
        let result = self.invoke_inner(closure, function_value, this, args, new_target);
        self.call_depth -= 1;
        result
    }

    fn invoke_inner(
        &mut self,
        closure: &Rc<Closure>,
        function_value: &Value,
        this: Option<Value>,
        args: &[Value],
        new_target: Option<Value>,
    ) -> EvalResult<(Value, Option<Value>)> {
        let function = &closure.function;
        let context = (closure.kind != FunctionKind::Arrow).then(|| FunctionContext {
            this,
            home_object: closure.home_object.clone(),
            function: Some(function_value.clone()),
            new_target,
        });
        let scope = Scope::new_function(&closure.scope, context);

        {
            let mut s = scope.borrow_mut();
            if function.binds_own_name {
                if let Some(name) = &function.name {
                    s.declare(name.clone(), BindingKind::Function, Some(function_value.clone()));
                }
            }
            if function.uses_arguments && closure.kind != FunctionKind::Arrow {
                s.declare("arguments".into(), BindingKind::Var, Some(self.new_array(args.to_vec())));
            }
        }

        for (index, param) in function.params.iter().enumerate() {
            match param {
                Pattern::Rest(inner) => {
                    let rest = self.new_array(args.get(index..).unwrap_or(&[]).to_vec());
                    self.bind_pattern(inner, rest, &scope, BindMode::Declare(BindingKind::Parameter))?;
                }
                param => {
                    let value = args.get(index).cloned().unwrap_or(Value::Undefined);
                    self.bind_pattern(param, value, &scope, BindMode::Declare(BindingKind::Parameter))?;
                }
            }
        }

        let value = match &function.body {
            FunctionBody::Block(body) => {
                {
                    let mut s = scope.borrow_mut();
                    for name in &function.var_names {
                        if !s.has_own(name) {
                            s.declare(name.clone(), BindingKind::Var, Some(Value::Undefined));
                        }
                    }
                }
                self.hoist_declarations(body, &scope)?;
                let mut value = Value::Undefined;
                for statement in body {
                    if let Flow::Return(returned) = self.exec(statement, &scope)? {
                        value = returned;
                        break;
                    }
                }
                value
            }
            FunctionBody::Expression(expr) => self.eval(expr, &scope)?,
        };

        let final_this = scope
            .borrow()
            .context
            .as_ref()
            .and_then(|context| context.this.clone());
        Ok((value, final_this))
    }

    pub fn is_constructor(&self, value: &Value) -> bool {
        match Self::callee_of(value) {
            Callee::Closure(closure) => matches!(
                closure.kind,
                FunctionKind::Normal | FunctionKind::ClassConstructor
            ),
            Callee::Native(native) => native.constructor.is_some(),
            Callee::Bound(bound) => self.is_constructor(&bound.target),
            Callee::NotCallable => false,
        }
    }

    /// `new callee(...args)`
    pub fn construct(&mut self, callee: &Value, args: &[Value]) -> EvalResult<Value> {
        self.construct_with(callee, args, callee)
    }

    fn prototype_for(&self, new_target: &Value) -> ObjectRef {
        if let Value::Object(target) = new_target {
            let key = Key::Name("prototype".into());
            if let Value::Object(prototype) = self.get_from_object(target, &key) {
                return prototype;
            }
        }
        self.intrinsics.object_prototype.clone()
    }

    fn construct_with(&mut self, callee: &Value, args: &[Value], new_target: &Value) -> EvalResult<Value> {
        match Self::callee_of(callee) {
            Callee::Closure(closure) => {
                if !matches!(
                    closure.kind,
                    FunctionKind::Normal | FunctionKind::ClassConstructor
                ) {
                    return Err(self.type_error(messages::not_a_constructor(
                        &self.display_primitive(callee),
                    )));
                }
                let derived = closure
                    .class
                    .as_ref()
                    .is_some_and(|class| class.parent.is_some());
                let this = if derived {
                    None
                } else {
                    let instance =
                        Object::new(ObjectKind::Ordinary, Some(self.prototype_for(new_target)))
                            .into_ref();
                    if let Some(class) = &closure.class {
                        self.initialize_fields(&instance, class, callee)?;
                    }
                    Some(Value::Object(instance))
                };

                let (returned, this) =
                    self.invoke(&closure, callee, this, args, Some(new_target.clone()))?;
                if matches!(returned, Value::Object(_)) {
                    return Ok(returned);
                }
                this.ok_or_else(|| {
                    self.reference_error(
                        "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
                    )
                })
            }
            Callee::Native(native) => {
                let Some(constructor) = native.constructor.clone() else {
                    return Err(self.type_error(messages::not_a_constructor(&native.name)));
                };
                let instance =
                    Object::new(ObjectKind::Ordinary, Some(self.prototype_for(new_target)))
                        .into_ref();
                let this = Value::Object(instance);
                self.enter_call()?;
                let result = constructor(self, &this, args);
                self.call_depth -= 1;
                let result = result?;
                Ok(if matches!(result, Value::Object(_)) {
                    result
                } else {
                    this
                })
            }
            Callee::Bound(bound) => {
                let mut full = bound.args.clone();
                full.extend_from_slice(args);
                let new_target = if new_target.strict_equals(callee) {
                    bound.target.clone()
                } else {
                    new_target.clone()
                };
                self.construct_with(&bound.target, &full, &new_target)
            }
            Callee::NotCallable => Err(self.type_error(messages::not_a_constructor(
                &self.display_primitive(callee),
            ))),
        }
    }

    // ========== Classes ==========

    fn resolve_this(&mut self, scope: &ScopeRef) -> EvalResult<Value> {
        let owner = function_scope(scope);
        let this = owner
            .borrow()
            .context
            .as_ref()
            .map(|context| context.this.clone());
        match this {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(self.reference_error(
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
            )),
            None => Ok(Value::Undefined),
        }
    }

    fn get_super_property(&mut self, key: &Key, scope: &ScopeRef) -> EvalResult<Value> {
        let owner = function_scope(scope);
        let home = owner
            .borrow()
            .context
            .as_ref()
            .and_then(|context| context.home_object.clone());
        let Some(home) = home else {
            return Err(self.syntax_error("'super' keyword unexpected here"));
        };
        let prototype = home.borrow().prototype.clone();
        Ok(match prototype {
            Some(prototype) => self.get_from_object(&prototype, key),
            None => Value::Undefined,
        })
    }

    fn eval_super_call(&mut self, arguments: &[Expression], scope: &ScopeRef) -> EvalResult<Value> {
        let owner = function_scope(scope);
        let (function, new_target, initialized) = {
            let s = owner.borrow();
            match &s.context {
                Some(context) => (
                    context.function.clone(),
                    context.new_target.clone(),
                    context.this.is_some(),
                ),
                None => (None, None, false),
            }
        };

        let class = match function.as_ref().map(Self::callee_of) {
            Some(Callee::Closure(closure)) => closure.class.clone(),
            _ => None,
        };
        let (Some(function), Some(class), Some(new_target)) = (function, class, new_target) else {
            return Err(self.syntax_error("'super' keyword unexpected here"));
        };
        let Some(parent) = class.parent.clone() else {
            return Err(self.syntax_error("'super' keyword unexpected here"));
        };
        if !self.is_constructor(&parent) {
            return Err(self.type_error(format!(
                "Super constructor {} of anonymous class is not a constructor",
                self.display_primitive(&parent)
            )));
        }
        if initialized {
            return Err(self.reference_error("Super constructor may only be called once"));
        }

        let args = self.eval_arguments(arguments, scope)?;
        let this = self.construct_with(&parent, &args, &new_target)?;
        if let Some(context) = owner.borrow_mut().context.as_mut() {
            context.this = Some(this.clone());
        }
        if let Value::Object(instance) = &this {
            self.initialize_fields(instance, &class, &function)?;
        }
        Ok(Value::Undefined)
    }

    fn initialize_fields(
        &mut self,
        instance: &ObjectRef,
        class: &ClassInfo,
        constructor: &Value,
    ) -> EvalResult<()> {
        if class.fields.is_empty() {
            return Ok(());
        }
        let home = match constructor {
            Value::Object(ctor) => match self.get_from_object(ctor, &Key::Name("prototype".into())) {
                Value::Object(prototype) => Some(prototype),
                _ => None,
            },
            _ => None,
        };
        for (key, initializer) in &class.fields {
            let value = match initializer {
                Some(expr) => {
                    let scope = Scope::new_function(
                        &class.scope,
                        Some(FunctionContext {
                            this: Some(Value::Object(instance.clone())),
                            home_object: home.clone(),
                            function: Some(constructor.clone()),
                            new_target: None,
                        }),
                    );
                    self.eval(expr, &scope)?
                }
                None => Value::Undefined,
            };
            instance
                .borrow_mut()
                .properties
                .define(key.clone(), value, true);
        }
        Ok(())
    }

    fn eval_class(&mut self, class: &Rc<ast::Class>, scope: &ScopeRef) -> EvalResult<Value> {
        let name: Name = class.name.clone().unwrap_or_else(|| "".into());
        let class_scope = Scope::new_child(scope);
        if let Some(name) = &class.name {
            class_scope
                .borrow_mut()
                .declare(name.clone(), BindingKind::Const, None);
        }

        let parent = match &class.super_class {
            Some(expr) => {
                let parent = self.eval(expr, &class_scope)?;
                if !matches!(parent, Value::Null) && !self.is_constructor(&parent) {
                    return Err(self.type_error(format!(
                        "Class extends value {} is not a constructor or null",
                        self.display_primitive(&parent)
                    )));
                }
                Some(parent)
            }
            None => None,
        };

        let prototype_parent = match &parent {
            None => Some(self.intrinsics.object_prototype.clone()),
            Some(Value::Null) => None,
            Some(parent) => match self.get_property(parent, "prototype")? {
                Value::Object(prototype) => Some(prototype),
                Value::Null => None,
                _ => {
                    return Err(self.type_error(
                        "Class extends value does not have valid prototype property",
                    ))
                }
            },
        };
        let prototype = Object::new(ObjectKind::Ordinary, prototype_parent).into_ref();

        let mut fields = Vec::new();
        for member in &class.members {
            if let ClassMember::Field {
                key,
                value,
                is_static: false,
            } = member
            {
                let key = self.property_key(key, &class_scope)?.to_name();
                fields.push((key, value.clone()));
            }
        }

        let function = match &class.constructor {
            Some(constructor) => constructor.clone(),
            None if parent.is_some() => self.default_derived_constructor.clone(),
            None => self.default_base_constructor.clone(),
        };
        let constructor_parent = match &parent {
            Some(Value::Object(parent)) => parent.clone(),
            _ => self.intrinsics.function_prototype.clone(),
        };
        let closure = Closure {
            function,
            scope: class_scope.clone(),
            kind: FunctionKind::ClassConstructor,
            home_object: Some(prototype.clone()),
            class: Some(Rc::new(ClassInfo {
                name,
                parent,
                fields,
                scope: class_scope.clone(),
            })),
        };
        let constructor = Object::new(
            ObjectKind::Function(Rc::new(closure)),
            Some(constructor_parent),
        )
        .into_ref();
        constructor.borrow_mut().properties.define(
            "prototype".into(),
            Value::Object(prototype.clone()),
            false,
        );
        prototype.borrow_mut().properties.define(
            "constructor".into(),
            Value::Object(constructor.clone()),
            false,
        );
        let constructor_value = Value::Object(constructor.clone());

        for member in &class.members {
            if let ClassMember::Method {
                key,
                value,
                is_static,
            } = member
            {
                let target = if *is_static {
                    constructor.clone()
                } else {
                    prototype.clone()
                };
                let key = self.property_key(key, &class_scope)?.to_name();
                let method =
                    self.create_closure(value, &class_scope, FunctionKind::Method, Some(target.clone()));
                target.borrow_mut().properties.define(key, method, false);
            }
        }

        if let Some(name) = &class.name {
            class_scope
                .borrow_mut()
                .initialize(name, constructor_value.clone());
        }

        let static_context = FunctionContext {
            this: Some(constructor_value.clone()),
            home_object: Some(constructor.clone()),
            function: None,
            new_target: None,
        };
        for member in &class.members {
            match member {
                ClassMember::Field {
                    key,
                    value,
                    is_static: true,
                } => {
                    let key = self.property_key(key, &class_scope)?.to_name();
                    let value = match value {
                        Some(expr) => {
                            let scope =
                                Scope::new_function(&class_scope, Some(static_context.clone()));
                            self.eval(expr, &scope)?
                        }
                        None => Value::Undefined,
                    };
                    constructor.borrow_mut().properties.define(key, value, true);
                }
                ClassMember::StaticBlock(body) => {
                    let scope = Scope::new_function(&class_scope, Some(static_context.clone()));
                    self.exec_block(body, &scope)?;
                }
                _ => {}
            }
        }

        Ok(constructor_value)
    }
}

/// `constructor() {}` or `constructor(...args) { super(...args); }`
fn default_constructor(derived: bool) -> ast::Function {
    let (params, body) = if derived {
        let args: Name = "args".into();
        (
            vec![Pattern::Rest(Box::new(Pattern::Identifier(args.clone())))],
            vec![Statement::Expression(Expression::SuperCall(vec![
                Expression::Spread(Box::new(Expression::Identifier(args))),
            ]))],
        )
    } else {
        (Vec::new(), Vec::new())
    };
    ast::Function {
        name: None,
        params,
        body: FunctionBody::Block(body),
        is_arrow: false,
        binds_own_name: false,
        uses_arguments: false,
        var_names: Vec::new(),
    }
}

/// `**` with the ECMAScript special cases Rust's `powf` disagrees on
pub(crate) fn js_pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str) -> Value {
        let mut interp = Interpreter::new(Limits::default(), 42);
        interp.eval_script(source).unwrap()
    }

    fn eval_err(source: &str) -> Error {
        let mut interp = Interpreter::new(Limits::default(), 42);
        interp.eval_script(source).unwrap_err()
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(eval("1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(eval("'a' + 1 + 2"), Value::from("a12"));
        assert_eq!(eval("2 ** 10"), Value::Number(1024.0));
        assert_eq!(eval("-7 % 3"), Value::Number(-1.0));
        assert_eq!(eval("'5' * '2'"), Value::Number(10.0));
        assert_eq!(eval("1 / 0"), Value::Number(f64::INFINITY));
        assert_eq!(eval("(-1) >>> 28"), Value::Number(15.0));
    }

    #[test]
    fn test_equality() {
        assert_eq!(eval("null == undefined"), Value::Boolean(true));
        assert_eq!(eval("'1' == 1"), Value::Boolean(true));
        assert_eq!(eval("'1' === 1"), Value::Boolean(false));
        assert_eq!(eval("NaN === NaN"), Value::Boolean(false));
        assert_eq!(eval("[1] == 1"), Value::Boolean(true));
    }

    #[test]
    fn test_closures_and_scopes() {
        assert_eq!(
            eval("function counter() { let n = 0; return () => ++n; } const c = counter(); c(); c(); c()"),
            Value::Number(3.0)
        );
        assert_eq!(
            eval("const fns = []; for (let i = 0; i < 3; i++) { fns.push(() => i); } fns.map(f => f()).join(',')"),
            Value::from("0,1,2")
        );
        assert_eq!(eval("var x = 1; { var x = 2; } x"), Value::Number(2.0));
        assert_eq!(eval("let y = 1; { let y = 2; } y"), Value::Number(1.0));
    }

    #[test]
    fn test_hoisting_and_tdz() {
        assert_eq!(eval("f(); function f() { return 1 }"), Value::Number(1.0));
        let err = eval_err("x; let x = 1;");
        assert_eq!(
            err.to_string(),
            "ReferenceError: Cannot access 'x' before initialization"
        );
        let err = eval_err("const k = 1; k = 2;");
        assert_eq!(err.to_string(), "TypeError: Assignment to constant variable.");
    }

    #[test]
    fn test_destructuring() {
        assert_eq!(
            eval("const { a, b: [c, ...rest], d = 4 } = { a: 1, b: [2, 3, 5] }; a + c + rest.length + d"),
            Value::Number(9.0)
        );
        assert_eq!(eval("let p = 1, q = 2; [p, q] = [q, p]; p * 10 + q"), Value::Number(21.0));
        assert_eq!(
            eval("function f({ x = 1, ...others } = {}) { return x + Object.keys(others).length } f({ y: 1, z: 2 })"),
            Value::Number(3.0)
        );
    }

    #[test]
    fn test_classes() {
        let source = r#"
            class Animal {
                legs = 4;
                constructor(name) { this.name = name; }
                speak() { return `${this.name} makes a sound`; }
                static create(name) { return new this(name); }
            }
            class Bird extends Animal {
                legs = 2;
                speak() { return super.speak() + ' (tweet)'; }
            }
            const b = Bird.create('Tweety');
            [b.speak(), b.legs, b instanceof Animal, Object.keys(b).join()].join('|')
        "#;
        assert_eq!(
            eval(source),
            Value::from("Tweety makes a sound (tweet)|2|true|legs,name")
        );
    }

    #[test]
    fn test_class_requires_new() {
        let err = eval_err("class A {} A()");
        assert_eq!(
            err.to_string(),
            "TypeError: Class constructor A cannot be invoked without 'new'"
        );
    }

    #[test]
    fn test_try_catch_finally() {
        assert_eq!(
            eval("let log = []; try { throw new Error('boom') } catch (e) { log.push(e.message) } finally { log.push('done') } log.join()"),
            Value::from("boom,done")
        );
        assert_eq!(
            eval("function f() { try { return 'try' } finally { return 'finally' } } f()"),
            Value::from("finally")
        );
        assert_eq!(
            eval("let m; try { null.x } catch (e) { m = e instanceof TypeError } m"),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_optional_chaining_and_nullish() {
        assert_eq!(eval("const o = { a: { b: 1 } }; o?.a?.b"), Value::Number(1.0));
        assert_eq!(eval("const o = {}; o.a?.b.c.d"), Value::Undefined);
        assert_eq!(eval("const o = {}; o.f?.()"), Value::Undefined);
        assert_eq!(eval("null ?? 'x'"), Value::from("x"));
        assert_eq!(eval("0 ?? 'x'"), Value::Number(0.0));
        assert_eq!(eval("let v = null; v ??= 5; v"), Value::Number(5.0));
    }

    #[test]
    fn test_switch_fallthrough() {
        let source = "function f(x) { let out = ''; switch (x) { case 1: out += 'a'; case 2: out += 'b'; break; default: out += 'z'; } return out } f(1) + f(2) + f(3)";
        assert_eq!(eval(source), Value::from("abbz"));
    }

    #[test]
    fn test_uncaught_errors() {
        let err = eval_err("undefinedFunction()");
        assert_eq!(err.to_string(), "ReferenceError: undefinedFunction is not defined");
        let err = eval_err("const o = {}; o.missing()");
        assert_eq!(err.to_string(), "TypeError: o.missing is not a function");
        let err = eval_err("throw 'plain'");
        assert_eq!(err.to_string(), "Uncaught: plain");
    }

    #[test]
    fn test_operation_limit_is_not_catchable() {
        let mut interp = Interpreter::new(
            Limits {
                max_operations: 10_000,
                ..Limits::default()
            },
            42,
        );
        let err = interp
            .eval_script("try { while (true) {} } catch (e) { 'caught' }")
            .unwrap_err();
        assert!(err.is_resource_limit());
    }

    #[test]
    fn test_call_depth_limit() {
        let mut interp = Interpreter::new(
            Limits {
                max_call_depth: 50,
                ..Limits::default()
            },
            42,
        );
        let err = interp.eval_script("function r() { return r() } r()").unwrap_err();
        assert!(matches!(
            err,
            Error::ResourceLimitError {
                kind: crate::error::ResourceLimitKind::StackDepthLimit,
                ..
            }
        ));
    }

    #[test]
    fn test_bulk_natives_are_charged() {
        let limits = Limits {
            max_operations: 100_000,
            ..Limits::default()
        };
        for source in [
            "'x'.repeat(2 ** 24)",
            "''.padEnd(2 ** 24, 'ab')",
            "new Array(1 << 20).join('ab')",
            "const a = []; a[1 << 23] = 1",
            "let s = 'x'; for (let i = 0; i < 24; i++) s = s + s",
        ] {
            let err = Interpreter::new(limits, 42).eval_script(source).unwrap_err();
            assert!(
                matches!(
                    err,
                    Error::ResourceLimitError {
                        kind: crate::error::ResourceLimitKind::OperationLimit,
                        ..
                    }
                ),
                "{}: {}",
                source,
                err
            );
        }
        assert_eq!(
            Interpreter::new(limits, 42).eval_script("'ab'.repeat(1000).length").unwrap(),
            Value::Number(2000.0)
        );
    }

    #[test]
    fn test_bulk_natives_check_the_deadline() {
        let mut interp = Interpreter::new(
            Limits {
                timeout: Some(Duration::ZERO),
                ..Limits::default()
            },
            42,
        );
        let err = interp.eval_script("'x'.repeat(100)").unwrap_err();
        assert!(matches!(
            err,
            Error::ResourceLimitError {
                kind: crate::error::ResourceLimitKind::TimeLimit,
                ..
            }
        ));
    }

    #[test]
    fn test_deep_expressions_abort() {
        let checks = std::thread::Builder::new()
            .stack_size(256 * 1024 * 1024)
            .spawn(|| {
                let mut interp = Interpreter::new(Limits::default(), 42);
                let sum = format!("try {{ 1{} }} catch (e) {{ 'caught' }}", " + 1".repeat(MAX_EVAL_DEPTH * 2));
                let err = interp.eval_script(&sum).unwrap_err();
                assert!(matches!(
                    err,
                    Error::ResourceLimitError {
                        kind: crate::error::ResourceLimitKind::StackDepthLimit,
                        ..
                    }
                ));

                let chain = format!("const o = {{}}; o.o = o; o{}", ".o".repeat(MAX_EVAL_DEPTH * 2));
                assert!(interp.eval_script(&chain).unwrap_err().is_resource_limit());

                let mut fresh = Interpreter::new(Limits::default(), 42);
                let shallow = format!("1{}", " + 1".repeat(500));
                assert_eq!(fresh.eval_script(&shallow).unwrap(), Value::Number(501.0));
            })
            .unwrap();
        checks.join().unwrap();
    }

    #[test]
    fn test_shared_script_scope_rejects_redeclaration() {
        let mut interp = Interpreter::new(Limits::default(), 42);
        interp.eval_script("let total = 1; function helper() { return total }").unwrap();
        assert_eq!(interp.eval_script("helper()").unwrap(), Value::Number(1.0));
        let err = interp.eval_script("let total = 2;").unwrap_err();
        assert_eq!(
            err.to_string(),
            "SyntaxError: Identifier 'total' has already been declared"
        );
    }
}
