//! Abstract Syntax Tree (AST) types for the JavaScript subset the sandbox
//! executes
//!
//! The shapes follow ESTree loosely. Functions and classes are reference
//! counted so closures created at runtime share the parsed node instead of
//! cloning it.

mod expr;
mod pattern;
mod stmt;

pub use expr::*;
pub use pattern::*;
pub use stmt::*;

use std::rc::Rc;

/// Identifier text, shared between the tree and runtime scopes
pub type Name = Rc<str>;

/// A parsed script
#[derive(Debug, Clone)]
pub struct Program {
    /// Top-level statements
    pub body: Vec<Statement>,
    /// Names declared with `var` anywhere outside nested functions
    pub var_names: Vec<Name>,
}

/// Variable declaration kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Var,
    Let,
    Const,
}

/// A single variable declarator (id = init)
#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    pub id: Pattern,
    pub init: Option<Expression>,
}

/// `let x = 1, y = 2`
#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    pub kind: VariableKind,
    pub declarations: Vec<VariableDeclarator>,
}

/// A function, method or arrow function
#[derive(Debug, Clone)]
pub struct Function {
    /// Declared or inferred name
    pub name: Option<Name>,
    /// Parameters; a rest parameter is the last entry as [`Pattern::Rest`]
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    /// Named function expressions can refer to themselves by name
    pub binds_own_name: bool,
    /// The body mentions `arguments`
    pub uses_arguments: bool,
    /// Names declared with `var` in the body, hoisted to the function scope
    pub var_names: Vec<Name>,
}

impl Function {
    /// Number of parameters before the first default or rest parameter
    pub fn length(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| matches!(p, Pattern::Identifier(_) | Pattern::Array(_) | Pattern::Object(_)))
            .count()
    }
}

/// Function body: a block or a single expression (arrows only)
#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Vec<Statement>),
    Expression(Box<Expression>),
}

/// A class declaration or expression
#[derive(Debug, Clone)]
pub struct Class {
    pub name: Option<Name>,
    pub super_class: Option<Expression>,
    pub constructor: Option<Rc<Function>>,
    pub members: Vec<ClassMember>,
}

/// Everything in a class body except the constructor
#[derive(Debug, Clone)]
pub enum ClassMember {
    Method {
        key: PropertyKey,
        value: Rc<Function>,
        is_static: bool,
    },
    Field {
        key: PropertyKey,
        value: Option<Expression>,
        is_static: bool,
    },
    StaticBlock(Vec<Statement>),
}

/// Property key in object literals, patterns and classes
#[derive(Debug, Clone)]
pub enum PropertyKey {
    /// Identifier, string or number key, already converted to its string form
    Static(Name),
    /// `[expr]`
    Computed(Box<Expression>),
}
