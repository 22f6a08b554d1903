//! Statement AST node types

use super::*;

/// A JavaScript statement
#[derive(Debug, Clone)]
pub enum Statement {
    /// `{ ... }`
    Block(Vec<Statement>),

    /// `;`
    Empty,

    Expression(Expression),

    If(Box<IfStatement>),

    While(Box<WhileStatement>),

    DoWhile(Box<WhileStatement>),

    For(Box<ForStatement>),

    ForIn(Box<ForEachStatement>),

    ForOf(Box<ForEachStatement>),

    Switch(Box<SwitchStatement>),

    Break,

    Continue,

    Return(Option<Expression>),

    Throw(Expression),

    Try(Box<TryStatement>),

    VariableDeclaration(VariableDeclaration),

    FunctionDeclaration(Rc<Function>),

    ClassDeclaration(Rc<Class>),
}

impl Statement {
    /// Whether this statement introduces a block-scoped binding
    pub fn is_lexical_declaration(&self) -> bool {
        match self {
            Statement::VariableDeclaration(decl) => decl.kind != VariableKind::Var,
            Statement::FunctionDeclaration(_) | Statement::ClassDeclaration(_) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Statement,
    pub alternate: Option<Statement>,
}

/// Shared by `while` and `do ... while`
#[derive(Debug, Clone)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Statement,
}

/// `for (init; test; update) body`
#[derive(Debug, Clone)]
pub struct ForStatement {
    pub init: Option<ForInit>,
    pub test: Option<Expression>,
    pub update: Option<Expression>,
    pub body: Statement,
}

#[derive(Debug, Clone)]
pub enum ForInit {
    Declaration(VariableDeclaration),
    Expression(Expression),
}

/// `for (left in right)` and `for (left of right)`
#[derive(Debug, Clone)]
pub struct ForEachStatement {
    pub left: ForTarget,
    pub right: Expression,
    pub body: Statement,
}

#[derive(Debug, Clone)]
pub enum ForTarget {
    Declaration(VariableKind, Pattern),
    Pattern(Pattern),
}

#[derive(Debug, Clone)]
pub struct SwitchStatement {
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub test: Option<Expression>,
    pub consequent: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct TryStatement {
    pub block: Vec<Statement>,
    pub handler: Option<CatchClause>,
    pub finalizer: Option<Vec<Statement>>,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    /// Optional since ES2019
    pub param: Option<Pattern>,
    pub body: Vec<Statement>,
}

/// Collect the names declared with `var` in `body`, without descending into
/// nested functions
pub fn var_declared_names(body: &[Statement]) -> Vec<Name> {
    let mut names = Vec::new();
    for statement in body {
        collect_var_names(statement, &mut names);
    }
    names
}

fn push_var_declaration(decl: &VariableDeclaration, names: &mut Vec<Name>) {
    if decl.kind == VariableKind::Var {
        for declarator in &decl.declarations {
            for name in declarator.id.bound_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
    }
}

fn collect_var_names(statement: &Statement, names: &mut Vec<Name>) {
    match statement {
        Statement::VariableDeclaration(decl) => push_var_declaration(decl, names),
        Statement::Block(body) => body.iter().for_each(|s| collect_var_names(s, names)),
        Statement::If(stmt) => {
            collect_var_names(&stmt.consequent, names);
            if let Some(alternate) = &stmt.alternate {
                collect_var_names(alternate, names);
            }
        }
        Statement::While(stmt) | Statement::DoWhile(stmt) => collect_var_names(&stmt.body, names),
        Statement::For(stmt) => {
            if let Some(ForInit::Declaration(decl)) = &stmt.init {
                push_var_declaration(decl, names);
            }
            collect_var_names(&stmt.body, names);
        }
        Statement::ForIn(stmt) | Statement::ForOf(stmt) => {
            if let ForTarget::Declaration(VariableKind::Var, pattern) = &stmt.left {
                for name in pattern.bound_names() {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
            collect_var_names(&stmt.body, names);
        }
        Statement::Switch(stmt) => {
            for case in &stmt.cases {
                case.consequent.iter().for_each(|s| collect_var_names(s, names));
            }
        }
        Statement::Try(stmt) => {
            stmt.block.iter().for_each(|s| collect_var_names(s, names));
            if let Some(handler) = &stmt.handler {
                handler.body.iter().for_each(|s| collect_var_names(s, names));
            }
            if let Some(finalizer) = &stmt.finalizer {
                finalizer.iter().for_each(|s| collect_var_names(s, names));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_names_skip_nested_functions() {
        let program = crate::parser::parse(
            "var a = 1; if (x) { var b; } for (var i = 0;;) {} function f() { var hidden; } let c;",
        )
        .unwrap();
        let names: Vec<String> = program.var_names.iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["a", "b", "i"]);
    }
}
