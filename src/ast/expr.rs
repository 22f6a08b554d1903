//! Expression AST node types

use super::*;

/// A JavaScript expression
#[derive(Debug, Clone)]
pub enum Expression {
    /// Identifier reference
    Identifier(Name),

    /// Literal value
    Literal(Literal),

    /// Regular expression literal `/ab+c/gi`
    Regex { pattern: Name, flags: Name },

    /// Template literal `hello ${name}`
    Template(TemplateLiteral),

    /// Array literal `[1, , ...xs]` (holes are `None`)
    Array(Vec<Option<Expression>>),

    /// Object literal `{ a: 1, b, [k]: v, ...rest, m() {} }`
    Object(Vec<ObjectProperty>),

    /// Function expression
    Function(Rc<Function>),

    /// Arrow function expression
    Arrow(Rc<Function>),

    /// Class expression
    Class(Rc<Class>),

    /// `this`
    This,

    /// `obj.prop`, `obj[prop]`, `obj?.prop`
    Member(Box<MemberExpression>),

    /// `super.prop` / `super[prop]`
    SuperMember(Box<MemberProperty>),

    /// `callee(args)`, `callee?.(args)`
    Call(Box<CallExpression>),

    /// `super(args)` inside a derived constructor
    SuperCall(Vec<Expression>),

    /// `new Callee(args)`
    New(Box<CallExpression>),

    /// Boundary of an optional chain; evaluates to `undefined` when a link
    /// inside short-circuits
    OptionalChain(Box<Expression>),

    /// `!x`, `-x`, `typeof x`, ...
    Unary(UnaryOperator, Box<Expression>),

    /// `++x`, `x--`
    Update(Box<UpdateExpression>),

    /// `x + y`, `x === y`, ...
    Binary(BinaryOperator, Box<Expression>, Box<Expression>),

    /// `x && y`, `x || y`, `x ?? y`
    Logical(LogicalOperator, Box<Expression>, Box<Expression>),

    /// `x = y`, `x += y`, `[a, b] = pair`
    Assignment(Box<AssignmentExpression>),

    /// `test ? consequent : alternate`
    Conditional(Box<ConditionalExpression>),

    /// `a, b, c`
    Sequence(Vec<Expression>),

    /// `...xs` inside array literals and argument lists
    Spread(Box<Expression>),
}

impl Expression {
    /// Identifier-like description used in "is not a function" messages
    pub fn describe(&self) -> String {
        match self {
            Expression::Identifier(name) => name.to_string(),
            Expression::This => "this".to_string(),
            Expression::Member(member) => match &member.property {
                MemberProperty::Static(name) => format!("{}.{}", member.object.describe(), name),
                MemberProperty::Computed(_) => format!("{}[...]", member.object.describe()),
            },
            Expression::SuperMember(property) => match property.as_ref() {
                MemberProperty::Static(name) => format!("super.{}", name),
                MemberProperty::Computed(_) => "super[...]".to_string(),
            },
            Expression::Call(call) => format!("{}(...)", call.callee.describe()),
            Expression::OptionalChain(inner) => inner.describe(),
            _ => "expression".to_string(),
        }
    }

    /// Whether an anonymous function/class here should take a binding's name
    pub fn is_anonymous_function(&self) -> bool {
        match self {
            Expression::Arrow(f) => f.name.is_none(),
            Expression::Function(f) => f.name.is_none(),
            Expression::Class(c) => c.name.is_none(),
            _ => false,
        }
    }
}

/// A literal value
#[derive(Debug, Clone)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(f64),
    String(Name),
}

/// Template literal: `quasis.len() == expressions.len() + 1`
#[derive(Debug, Clone)]
pub struct TemplateLiteral {
    pub quasis: Vec<Name>,
    pub expressions: Vec<Expression>,
}

/// Object literal entry
#[derive(Debug, Clone)]
pub enum ObjectProperty {
    /// `key: value`, shorthand `key` and methods `key() {}`
    KeyValue(PropertyKey, Expression),
    /// `...expr`
    Spread(Expression),
}

#[derive(Debug, Clone)]
pub struct MemberExpression {
    pub object: Expression,
    pub property: MemberProperty,
    /// `?.` link
    pub optional: bool,
}

#[derive(Debug, Clone)]
pub enum MemberProperty {
    /// `.name` (also private `#name`)
    Static(Name),
    /// `[expr]`
    Computed(Expression),
}

#[derive(Debug, Clone)]
pub struct CallExpression {
    pub callee: Expression,
    pub arguments: Vec<Expression>,
    /// `?.(` link
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Minus,
    Plus,
    Not,
    BitwiseNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone)]
pub struct UpdateExpression {
    pub operator: UpdateOperator,
    pub prefix: bool,
    pub argument: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    UShr,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    In,
    Instanceof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
    NullishCoalescing,
}

#[derive(Debug, Clone)]
pub struct AssignmentExpression {
    pub operator: AssignmentOperator,
    pub target: Pattern,
    pub value: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    /// `=`
    Assign,
    /// `+=`, `*=`, `>>>=`, ...
    Compound(BinaryOperator),
    /// `&&=`, `||=`, `??=`
    Logical(LogicalOperator),
}

#[derive(Debug, Clone)]
pub struct ConditionalExpression {
    pub test: Expression,
    pub consequent: Expression,
    pub alternate: Expression,
}
