//! JavaScript parser
//!
//! A recursive descent parser over the token stream from [`crate::lexer`].
//! It accepts the script subset the sandbox executes and rejects the rest
//! (generators, `async`, accessors, labels, modules) with a `SyntaxError`
//! naming the construct, so learners get a precise message instead of a
//! confusing runtime failure.

use std::rc::Rc;

use crate::ast::*;
use crate::error::{Error, Result, SourceLocation};
use crate::lexer::{cook_string, Keyword, Lexer, Token, TokenKind};

/// Deepest nesting of statements, expressions and patterns the parser accepts
pub const MAX_NESTING_DEPTH: u32 = 1_000;

/// Per-function parser state
#[derive(Debug, Clone, Copy, Default)]
struct FunctionContext {
    /// Inside a function body (return is legal)
    in_function: bool,
    /// Arrow functions see the enclosing function's `arguments`
    is_arrow: bool,
    uses_arguments: bool,
    loop_depth: u32,
    breakable_depth: u32,
}

/// A recursive descent parser for JavaScript
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token<'src>>,
    pos: usize,
    /// Innermost function last
    contexts: Vec<FunctionContext>,
    /// `in` is not a binary operator while parsing a `for` head
    no_in: bool,
    depth: u32,
}

impl<'src> Parser<'src> {
    /// Create a new parser from source code
    pub fn new(source: &'src str) -> Result<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self {
            source,
            tokens,
            pos: 0,
            contexts: vec![FunctionContext::default()],
            no_in: false,
            depth: 0,
        })
    }

    /// Parse the source as a complete script
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut body = Vec::new();
        while !self.is_eof() {
            body.push(self.parse_statement()?);
        }
        let var_names = var_declared_names(&body);
        Ok(Program { body, var_names })
    }

    // ========== Token Access ==========

    fn current(&self) -> &Token<'src> {
        &self.tokens[self.pos]
    }

    fn peek(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn token_at(&self, offset: usize) -> &Token<'src> {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn is_eof(&self) -> bool {
        self.peek() == TokenKind::Eof
    }

    fn check_word(&self, word: &str) -> bool {
        self.current().is_word(word)
    }

    fn location(&self) -> SourceLocation {
        self.current().location
    }

    /// Create a parse error with source context
    fn error(&self, message: impl Into<String>, location: SourceLocation) -> Error {
        Error::parse_error_with_context(message, location, self.source)
    }

    fn unexpected(&self) -> Error {
        let token = self.current();
        let message = match token.kind {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            TokenKind::StringLiteral => "Unexpected string".to_string(),
            TokenKind::NumberLiteral => "Unexpected number".to_string(),
            TokenKind::TemplateLiteral | TokenKind::TemplateHead => {
                "Unexpected template string".to_string()
            }
            TokenKind::Identifier => format!("Unexpected identifier '{}'", token.text),
            _ => format!("Unexpected token '{}'", token.text),
        };
        self.error(message, token.location)
    }

    fn unsupported(&self, what: &str) -> Error {
        self.error(format!("{} are not supported", what), self.location())
    }

    fn advance(&mut self) -> Token<'src> {
        let token = self.tokens[self.pos].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'src>> {
        if self.peek() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected())
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Automatic semicolon insertion: `;`, `}`, end of input or a line break
    fn consume_semicolon(&mut self) -> Result<()> {
        if self.consume(TokenKind::Semicolon) {
            return Ok(());
        }
        if matches!(self.peek(), TokenKind::RightBrace | TokenKind::Eof)
            || self.current().newline_before
        {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn context(&mut self) -> &mut FunctionContext {
        // the program context is pushed in `new` and never popped
        let last = self.contexts.len() - 1;
        &mut self.contexts[last]
    }

    /// Run `f` with `in` parsed as a binary operator again
    fn allowing_in<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = std::mem::replace(&mut self.no_in, false);
        let result = f(self);
        self.no_in = saved;
        result
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING_DEPTH`]
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error("Maximum nesting depth exceeded", self.location()));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn mark_arguments_use(&mut self) {
        if let Some(context) = self.contexts.iter_mut().rev().find(|c| !c.is_arrow) {
            context.uses_arguments = true;
        }
    }

    // ========== Statements ==========

    fn parse_statement(&mut self) -> Result<Statement> {
        self.nested(Self::parse_statement_kind)
    }

    fn parse_statement_kind(&mut self) -> Result<Statement> {
        match self.peek() {
            TokenKind::LeftBrace => self.parse_block().map(Statement::Block),
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            TokenKind::Keyword(Keyword::Var) => self.parse_variable_statement(VariableKind::Var),
            TokenKind::Keyword(Keyword::Let) => self.parse_variable_statement(VariableKind::Let),
            TokenKind::Keyword(Keyword::Const) => {
                self.parse_variable_statement(VariableKind::Const)
            }
            TokenKind::Keyword(Keyword::Function) => {
                let function = self.parse_function(true)?;
                Ok(Statement::FunctionDeclaration(Rc::new(function)))
            }
            TokenKind::Keyword(Keyword::Class) => {
                let class = self.parse_class(true)?;
                Ok(Statement::ClassDeclaration(Rc::new(class)))
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if_statement(),
            TokenKind::Keyword(Keyword::While) => self.parse_while_statement(),
            TokenKind::Keyword(Keyword::Do) => self.parse_do_while_statement(),
            TokenKind::Keyword(Keyword::For) => self.parse_for_statement(),
            TokenKind::Keyword(Keyword::Switch) => self.parse_switch_statement(),
            TokenKind::Keyword(Keyword::Break) => self.parse_break_continue(true),
            TokenKind::Keyword(Keyword::Continue) => self.parse_break_continue(false),
            TokenKind::Keyword(Keyword::Return) => self.parse_return_statement(),
            TokenKind::Keyword(Keyword::Throw) => self.parse_throw_statement(),
            TokenKind::Keyword(Keyword::Try) => self.parse_try_statement(),
            TokenKind::Keyword(Keyword::Debugger) => {
                self.advance();
                self.consume_semicolon()?;
                Ok(Statement::Empty)
            }
            TokenKind::Keyword(Keyword::Import | Keyword::Export) => Err(self.error(
                "Cannot use import/export statements outside a module",
                self.location(),
            )),
            TokenKind::Keyword(Keyword::With) => Err(self.unsupported("'with' statements")),
            TokenKind::Identifier if self.peek_at(1) == TokenKind::Colon => {
                Err(self.unsupported("Labeled statements"))
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>> {
        self.expect(TokenKind::LeftBrace)?;
        let mut body = Vec::new();
        while !self.consume(TokenKind::RightBrace) {
            if self.is_eof() {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_variable_statement(&mut self, kind: VariableKind) -> Result<Statement> {
        self.advance();
        let declaration = self.parse_declarators(kind)?;
        self.consume_semicolon()?;
        Ok(Statement::VariableDeclaration(declaration))
    }

    /// Declarators after the `var`/`let`/`const` keyword
    fn parse_declarators(&mut self, kind: VariableKind) -> Result<VariableDeclaration> {
        let mut declarations = vec![self.parse_declarator(kind)?];
        while self.consume(TokenKind::Comma) {
            declarations.push(self.parse_declarator(kind)?);
        }
        Ok(VariableDeclaration { kind, declarations })
    }

    fn parse_declarator(&mut self, kind: VariableKind) -> Result<VariableDeclarator> {
        let location = self.location();
        let id = self.parse_binding_pattern()?;
        let init = if self.consume(TokenKind::Equals) {
            let mut init = self.parse_assignment_expression()?;
            if let Pattern::Identifier(name) = &id {
                name_anonymous_function(&mut init, name);
            }
            Some(init)
        } else {
            None
        };

        if init.is_none() {
            let in_for_each =
                self.check_word("of") || self.peek() == TokenKind::Keyword(Keyword::In);
            if kind == VariableKind::Const && !in_for_each {
                return Err(self.error("Missing initializer in const declaration", location));
            }
            if !matches!(id, Pattern::Identifier(_)) && !in_for_each {
                return Err(self.error(
                    "Missing initializer in destructuring declaration",
                    location,
                ));
            }
        }
        Ok(VariableDeclarator { id, init })
    }

    fn parse_binding_pattern(&mut self) -> Result<Pattern> {
        match self.peek() {
            TokenKind::Identifier => {
                let token = self.advance();
                Ok(Pattern::Identifier(token.text.into()))
            }
            TokenKind::LeftBracket => self.nested(Self::parse_array_pattern),
            TokenKind::LeftBrace => self.nested(Self::parse_object_pattern),
            _ => Err(self.unexpected()),
        }
    }

    /// Binding pattern with an optional `= default`
    fn parse_binding_element(&mut self) -> Result<Pattern> {
        let pattern = self.parse_binding_pattern()?;
        if self.consume(TokenKind::Equals) {
            let mut default = self.allowing_in(|p| p.parse_assignment_expression())?;
            if let Pattern::Identifier(name) = &pattern {
                name_anonymous_function(&mut default, name);
            }
            return Ok(Pattern::Assignment(Box::new(pattern), Box::new(default)));
        }
        Ok(pattern)
    }

    fn parse_array_pattern(&mut self) -> Result<Pattern> {
        self.expect(TokenKind::LeftBracket)?;
        let mut elements = Vec::new();
        while !self.consume(TokenKind::RightBracket) {
            if self.consume(TokenKind::Comma) {
                elements.push(None);
                continue;
            }
            if self.consume(TokenKind::DotDotDot) {
                let argument = self.parse_binding_pattern()?;
                elements.push(Some(Pattern::Rest(Box::new(argument))));
                self.expect(TokenKind::RightBracket)?;
                break;
            }
            elements.push(Some(self.parse_binding_element()?));
            if self.peek() != TokenKind::RightBracket {
                self.expect(TokenKind::Comma)?;
            }
        }
        Ok(Pattern::Array(elements))
    }

    fn parse_object_pattern(&mut self) -> Result<Pattern> {
        self.expect(TokenKind::LeftBrace)?;
        let mut properties = Vec::new();
        while !self.consume(TokenKind::RightBrace) {
            if self.consume(TokenKind::DotDotDot) {
                let argument = self.parse_binding_pattern()?;
                properties.push(ObjectPatternProperty::Rest(argument));
                self.expect(TokenKind::RightBrace)?;
                break;
            }

            let shorthand = self.peek() == TokenKind::Identifier;
            let key = self.parse_property_key()?;
            let value = if self.consume(TokenKind::Colon) {
                self.parse_binding_element()?
            } else {
                let PropertyKey::Static(name) = &key else {
                    return Err(self.unexpected());
                };
                if !shorthand {
                    return Err(self.unexpected());
                }
                let target = Pattern::Identifier(name.clone());
                if self.consume(TokenKind::Equals) {
                    let default = self.allowing_in(|p| p.parse_assignment_expression())?;
                    Pattern::Assignment(Box::new(target), Box::new(default))
                } else {
                    target
                }
            };
            properties.push(ObjectPatternProperty::Property { key, value });

            if self.peek() != TokenKind::RightBrace {
                self.expect(TokenKind::Comma)?;
            }
        }
        Ok(Pattern::Object(properties))
    }

    fn parse_property_key(&mut self) -> Result<PropertyKey> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Identifier | TokenKind::Keyword(_) | TokenKind::PrivateName => {
                self.advance();
                Ok(PropertyKey::Static(token.text.into()))
            }
            TokenKind::StringLiteral => {
                self.advance();
                let value = self.string_value(&token)?;
                Ok(PropertyKey::Static(value))
            }
            TokenKind::NumberLiteral => {
                self.advance();
                let value = self.number_value(&token)?;
                Ok(PropertyKey::Static(
                    crate::runtime::number_to_string(value).into(),
                ))
            }
            TokenKind::LeftBracket => {
                self.advance();
                let expr = self.allowing_in(|p| p.parse_assignment_expression())?;
                self.expect(TokenKind::RightBracket)?;
                Ok(PropertyKey::Computed(Box::new(expr)))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// `function name(params) { body }`
    fn parse_function(&mut self, is_declaration: bool) -> Result<Function> {
        self.expect(TokenKind::Keyword(Keyword::Function))?;
        if self.peek() == TokenKind::Star {
            return Err(self.unsupported("Generator functions"));
        }
        let name: Option<Name> = if self.peek() == TokenKind::Identifier {
            Some(self.advance().text.into())
        } else if is_declaration {
            return Err(self.error("Function statements require a function name", self.location()));
        } else {
            None
        };
        let binds_own_name = !is_declaration && name.is_some();
        self.parse_function_rest(name, binds_own_name)
    }

    /// Parameters and body of a function or method
    fn parse_function_rest(&mut self, name: Option<Name>, binds_own_name: bool) -> Result<Function> {
        self.contexts.push(FunctionContext {
            in_function: true,
            ..FunctionContext::default()
        });
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let result = self.parse_params().and_then(|params| {
            let body = self.parse_block()?;
            Ok((params, body))
        });
        self.no_in = saved_no_in;
        let context = self.contexts.pop().unwrap_or_default();
        let (params, body) = result?;

        let var_names = var_declared_names(&body);
        Ok(Function {
            name,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            binds_own_name,
            uses_arguments: context.uses_arguments,
            var_names,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Pattern>> {
        self.expect(TokenKind::LeftParen)?;
        let mut params = Vec::new();
        while !self.consume(TokenKind::RightParen) {
            if self.consume(TokenKind::DotDotDot) {
                let argument = self.parse_binding_pattern()?;
                params.push(Pattern::Rest(Box::new(argument)));
                self.expect(TokenKind::RightParen)?;
                break;
            }
            params.push(self.parse_binding_element()?);
            if self.peek() != TokenKind::RightParen {
                self.expect(TokenKind::Comma)?;
            }
        }
        Ok(params)
    }

    fn parse_class(&mut self, is_declaration: bool) -> Result<Class> {
        self.expect(TokenKind::Keyword(Keyword::Class))?;
        let name: Option<Name> = if self.peek() == TokenKind::Identifier {
            Some(self.advance().text.into())
        } else if is_declaration {
            return Err(self.error("Class statements require a class name", self.location()));
        } else {
            None
        };

        let super_class = if self.consume(TokenKind::Keyword(Keyword::Extends)) {
            Some(self.parse_left_hand_side_expression()?)
        } else {
            None
        };

        self.expect(TokenKind::LeftBrace)?;
        let mut constructor = None;
        let mut members = Vec::new();
        while !self.consume(TokenKind::RightBrace) {
            if self.is_eof() {
                return Err(self.unexpected());
            }
            if self.consume(TokenKind::Semicolon) {
                continue;
            }
            if self.peek() == TokenKind::At {
                return Err(self.unsupported("Decorators"));
            }

            let mut is_static = false;
            if self.check_word("static")
                && !matches!(
                    self.peek_at(1),
                    TokenKind::LeftParen | TokenKind::Equals | TokenKind::Semicolon | TokenKind::RightBrace
                )
            {
                self.advance();
                if self.peek() == TokenKind::LeftBrace {
                    let body = self.parse_static_block()?;
                    members.push(ClassMember::StaticBlock(body));
                    continue;
                }
                is_static = true;
            }

            self.reject_method_prefix()?;

            let is_constructor = !is_static && self.check_word("constructor");
            let key = self.parse_property_key()?;

            if self.peek() == TokenKind::LeftParen {
                let method_name = match &key {
                    PropertyKey::Static(name) => Some(name.clone()),
                    PropertyKey::Computed(_) => None,
                };
                let function = Rc::new(self.parse_function_rest(method_name, false)?);
                if is_constructor {
                    if constructor.is_some() {
                        return Err(self.error(
                            "A class may only have one constructor",
                            self.location(),
                        ));
                    }
                    constructor = Some(function);
                } else {
                    members.push(ClassMember::Method {
                        key,
                        value: function,
                        is_static,
                    });
                }
                continue;
            }

            let value = if self.consume(TokenKind::Equals) {
                // field initializers run with `this` bound to the instance
                self.contexts.push(FunctionContext {
                    in_function: true,
                    is_arrow: true,
                    ..FunctionContext::default()
                });
                let value = self.allowing_in(|p| p.parse_assignment_expression());
                self.contexts.pop();
                let mut value = value?;
                if let PropertyKey::Static(name) = &key {
                    name_anonymous_function(&mut value, name);
                }
                Some(value)
            } else {
                None
            };
            self.consume_semicolon()?;
            members.push(ClassMember::Field {
                key,
                value,
                is_static,
            });
        }

        Ok(Class {
            name,
            super_class,
            constructor,
            members,
        })
    }

    fn parse_static_block(&mut self) -> Result<Vec<Statement>> {
        self.contexts.push(FunctionContext {
            in_function: false,
            is_arrow: true,
            ..FunctionContext::default()
        });
        let body = self.parse_block();
        self.contexts.pop();
        body
    }

    /// `async`, `get`, `set` and `*` before a method name
    fn reject_method_prefix(&self) -> Result<()> {
        if self.peek() == TokenKind::Star {
            return Err(self.unsupported("Generator methods"));
        }
        let next = self.token_at(1);
        let names_member = !next.newline_before
            && matches!(
                next.kind,
                TokenKind::Identifier
                    | TokenKind::Keyword(_)
                    | TokenKind::StringLiteral
                    | TokenKind::NumberLiteral
                    | TokenKind::PrivateName
                    | TokenKind::LeftBracket
                    | TokenKind::Star
            );
        if names_member {
            if self.check_word("async") {
                return Err(self.unsupported("Async functions"));
            }
            if self.check_word("get") || self.check_word("set") {
                return Err(self.unsupported("Getters and setters"));
            }
        }
        Ok(())
    }

    fn parse_if_statement(&mut self) -> Result<Statement> {
        self.advance();
        let test = self.parse_parenthesized()?;
        let consequent = self.parse_statement()?;
        let alternate = if self.consume(TokenKind::Keyword(Keyword::Else)) {
            Some(self.parse_statement()?)
        } else {
            None
        };
        Ok(Statement::If(Box::new(IfStatement {
            test,
            consequent,
            alternate,
        })))
    }

    fn parse_parenthesized(&mut self) -> Result<Expression> {
        self.expect(TokenKind::LeftParen)?;
        let expr = self.allowing_in(|p| p.parse_expression())?;
        self.expect(TokenKind::RightParen)?;
        Ok(expr)
    }

    /// Parse a loop body with break/continue allowed
    fn parse_loop_body(&mut self) -> Result<Statement> {
        self.context().loop_depth += 1;
        self.context().breakable_depth += 1;
        let body = self.parse_statement();
        self.context().loop_depth -= 1;
        self.context().breakable_depth -= 1;
        body
    }

    fn parse_while_statement(&mut self) -> Result<Statement> {
        self.advance();
        let test = self.parse_parenthesized()?;
        let body = self.parse_loop_body()?;
        Ok(Statement::While(Box::new(WhileStatement { test, body })))
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement> {
        self.advance();
        let body = self.parse_loop_body()?;
        self.expect(TokenKind::Keyword(Keyword::While))?;
        let test = self.parse_parenthesized()?;
        self.consume(TokenKind::Semicolon);
        Ok(Statement::DoWhile(Box::new(WhileStatement { test, body })))
    }

    fn parse_for_statement(&mut self) -> Result<Statement> {
        self.advance();
        if self.peek() == TokenKind::Keyword(Keyword::Await) {
            return Err(self.unsupported("'for await' loops"));
        }
        self.expect(TokenKind::LeftParen)?;

        let init = match self.peek() {
            TokenKind::Semicolon => None,
            TokenKind::Keyword(keyword @ (Keyword::Var | Keyword::Let | Keyword::Const)) => {
                let kind = match keyword {
                    Keyword::Var => VariableKind::Var,
                    Keyword::Let => VariableKind::Let,
                    _ => VariableKind::Const,
                };
                self.advance();
                self.no_in = true;
                let declaration = self.parse_declarators(kind);
                self.no_in = false;
                let mut declaration = declaration?;

                let is_for_each =
                    self.check_word("of") || self.peek() == TokenKind::Keyword(Keyword::In);
                if is_for_each {
                    if declaration.declarations.len() != 1
                        || declaration.declarations[0].init.is_some()
                    {
                        return Err(self.error(
                            "Invalid left-hand side in for-loop: must have a single binding",
                            self.location(),
                        ));
                    }
                    let pattern = declaration.declarations.remove(0).id;
                    return self.parse_for_each(ForTarget::Declaration(kind, pattern));
                }
                Some(ForInit::Declaration(declaration))
            }
            _ => {
                let location = self.location();
                self.no_in = true;
                let expr = self.parse_expression();
                self.no_in = false;
                let expr = expr?;
                if self.check_word("of") || self.peek() == TokenKind::Keyword(Keyword::In) {
                    let pattern = self.expression_to_pattern(expr, location)?;
                    return self.parse_for_each(ForTarget::Pattern(pattern));
                }
                Some(ForInit::Expression(expr))
            }
        };

        self.expect(TokenKind::Semicolon)?;
        let test = if self.peek() == TokenKind::Semicolon {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semicolon)?;
        let update = if self.peek() == TokenKind::RightParen {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::RightParen)?;
        let body = self.parse_loop_body()?;

        Ok(Statement::For(Box::new(ForStatement {
            init,
            test,
            update,
            body,
        })))
    }

    /// Rest of `for (left of right)` / `for (left in right)` after `left`
    fn parse_for_each(&mut self, left: ForTarget) -> Result<Statement> {
        let is_of = self.check_word("of");
        self.advance();
        let right = if is_of {
            self.parse_assignment_expression()?
        } else {
            self.parse_expression()?
        };
        self.expect(TokenKind::RightParen)?;
        let body = self.parse_loop_body()?;
        let statement = Box::new(ForEachStatement { left, right, body });
        Ok(if is_of {
            Statement::ForOf(statement)
        } else {
            Statement::ForIn(statement)
        })
    }

    fn parse_switch_statement(&mut self) -> Result<Statement> {
        self.advance();
        let discriminant = self.parse_parenthesized()?;
        self.expect(TokenKind::LeftBrace)?;

        self.context().breakable_depth += 1;
        let cases = self.parse_switch_cases();
        self.context().breakable_depth -= 1;

        Ok(Statement::Switch(Box::new(SwitchStatement {
            discriminant,
            cases: cases?,
        })))
    }

    fn parse_switch_cases(&mut self) -> Result<Vec<SwitchCase>> {
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.consume(TokenKind::RightBrace) {
            let test = if self.consume(TokenKind::Keyword(Keyword::Case)) {
                Some(self.parse_expression()?)
            } else if self.peek() == TokenKind::Keyword(Keyword::Default) {
                if seen_default {
                    return Err(self.error(
                        "More than one default clause in switch statement",
                        self.location(),
                    ));
                }
                seen_default = true;
                self.advance();
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect(TokenKind::Colon)?;

            let mut consequent = Vec::new();
            while !matches!(
                self.peek(),
                TokenKind::Keyword(Keyword::Case | Keyword::Default) | TokenKind::RightBrace
            ) {
                if self.is_eof() {
                    return Err(self.unexpected());
                }
                consequent.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, consequent });
        }
        Ok(cases)
    }

    fn parse_break_continue(&mut self, is_break: bool) -> Result<Statement> {
        let location = self.location();
        self.advance();
        if self.peek() == TokenKind::Identifier && !self.current().newline_before {
            return Err(self.unsupported("Labeled statements"));
        }
        self.consume_semicolon()?;

        let context = *self.context();
        if is_break {
            if context.breakable_depth == 0 {
                return Err(self.error("Illegal break statement", location));
            }
            Ok(Statement::Break)
        } else {
            if context.loop_depth == 0 {
                return Err(self.error(
                    "Illegal continue statement: no surrounding iteration statement",
                    location,
                ));
            }
            Ok(Statement::Continue)
        }
    }

    fn parse_return_statement(&mut self) -> Result<Statement> {
        let location = self.location();
        self.advance();
        if !self.context().in_function {
            return Err(self.error("Illegal return statement", location));
        }
        let ends_here = matches!(
            self.peek(),
            TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
        ) || self.current().newline_before;
        let argument = if ends_here {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_semicolon()?;
        Ok(Statement::Return(argument))
    }

    fn parse_throw_statement(&mut self) -> Result<Statement> {
        self.advance();
        if self.current().newline_before {
            return Err(self.error("Illegal newline after throw", self.location()));
        }
        let argument = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Statement::Throw(argument))
    }

    fn parse_try_statement(&mut self) -> Result<Statement> {
        let location = self.location();
        self.advance();
        let block = self.parse_block()?;

        let handler = if self.consume(TokenKind::Keyword(Keyword::Catch)) {
            let param = if self.consume(TokenKind::LeftParen) {
                let param = self.parse_binding_pattern()?;
                self.expect(TokenKind::RightParen)?;
                Some(param)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };

        let finalizer = if self.consume(TokenKind::Keyword(Keyword::Finally)) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try", location));
        }
        Ok(Statement::Try(Box::new(TryStatement {
            block,
            handler,
            finalizer,
        })))
    }

    fn parse_expression_statement(&mut self) -> Result<Statement> {
        let expression = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Statement::Expression(expression))
    }

    // ========== Expressions ==========

    /// Parse a full expression, including the comma operator
    pub fn parse_expression(&mut self) -> Result<Expression> {
        let first = self.parse_assignment_expression()?;
        if self.peek() != TokenKind::Comma {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.consume(TokenKind::Comma) {
            expressions.push(self.parse_assignment_expression()?);
        }
        Ok(Expression::Sequence(expressions))
    }

    fn parse_assignment_expression(&mut self) -> Result<Expression> {
        self.nested(Self::parse_assignment_or_arrow)
    }

    fn parse_assignment_or_arrow(&mut self) -> Result<Expression> {
        if self.check_word("async")
            && !self.token_at(1).newline_before
            && matches!(
                self.peek_at(1),
                TokenKind::Keyword(Keyword::Function) | TokenKind::Identifier | TokenKind::LeftParen
            )
            && (self.peek_at(1) != TokenKind::LeftParen || self.is_arrow_ahead(1))
        {
            return Err(self.unsupported("Async functions"));
        }
        if self.peek() == TokenKind::Keyword(Keyword::Yield) {
            return Err(self.unsupported("Generators"));
        }
        if self.peek() == TokenKind::Identifier && self.peek_at(1) == TokenKind::Arrow {
            return self.parse_arrow_function();
        }
        if self.peek() == TokenKind::LeftParen && self.is_arrow_ahead(0) {
            return self.parse_arrow_function();
        }

        let location = self.location();
        let left = self.parse_conditional_expression()?;

        let operator = match self.assignment_operator() {
            Some(operator) => operator,
            None => return Ok(left),
        };
        self.advance();

        let is_member_target = is_member_target(&left);
        let target = match left {
            Expression::Array(_) | Expression::Object(_)
                if operator == AssignmentOperator::Assign =>
            {
                self.expression_to_pattern(left, location)?
            }
            Expression::Identifier(name) => Pattern::Identifier(name),
            _ if is_member_target => Pattern::Member(Box::new(left)),
            _ => {
                return Err(self.error("Invalid left-hand side in assignment", location));
            }
        };

        let mut value = self.parse_assignment_expression()?;
        if let Pattern::Identifier(name) = &target {
            name_anonymous_function(&mut value, name);
        }
        Ok(Expression::Assignment(Box::new(AssignmentExpression {
            operator,
            target,
            value,
        })))
    }

    fn assignment_operator(&self) -> Option<AssignmentOperator> {
        let operator = match self.peek() {
            TokenKind::Equals => AssignmentOperator::Assign,
            TokenKind::PlusEquals => AssignmentOperator::Compound(BinaryOperator::Add),
            TokenKind::MinusEquals => AssignmentOperator::Compound(BinaryOperator::Sub),
            TokenKind::StarEquals => AssignmentOperator::Compound(BinaryOperator::Mul),
            TokenKind::SlashEquals => AssignmentOperator::Compound(BinaryOperator::Div),
            TokenKind::PercentEquals => AssignmentOperator::Compound(BinaryOperator::Mod),
            TokenKind::StarStarEquals => AssignmentOperator::Compound(BinaryOperator::Pow),
            TokenKind::LessLessEquals => AssignmentOperator::Compound(BinaryOperator::Shl),
            TokenKind::GreaterGreaterEquals => AssignmentOperator::Compound(BinaryOperator::Shr),
            TokenKind::GreaterGreaterGreaterEquals => {
                AssignmentOperator::Compound(BinaryOperator::UShr)
            }
            TokenKind::AmpersandEquals => AssignmentOperator::Compound(BinaryOperator::BitwiseAnd),
            TokenKind::PipeEquals => AssignmentOperator::Compound(BinaryOperator::BitwiseOr),
            TokenKind::CaretEquals => AssignmentOperator::Compound(BinaryOperator::BitwiseXor),
            TokenKind::AmpersandAmpersandEquals => AssignmentOperator::Logical(LogicalOperator::And),
            TokenKind::PipePipeEquals => AssignmentOperator::Logical(LogicalOperator::Or),
            TokenKind::QuestionQuestionEquals => {
                AssignmentOperator::Logical(LogicalOperator::NullishCoalescing)
            }
            _ => return None,
        };
        Some(operator)
    }

    /// Whether the parenthesis at `offset` closes right before `=>`
    fn is_arrow_ahead(&self, offset: usize) -> bool {
        let mut depth = 0usize;
        let mut i = self.pos + offset;
        while i < self.tokens.len() {
            match self.tokens[i].kind {
                TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => depth += 1,
                TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return self
                            .tokens
                            .get(i + 1)
                            .is_some_and(|t| t.kind == TokenKind::Arrow && !t.newline_before);
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            i += 1;
        }
        false
    }

    fn parse_arrow_function(&mut self) -> Result<Expression> {
        self.contexts.push(FunctionContext {
            in_function: true,
            is_arrow: true,
            ..FunctionContext::default()
        });
        let result = self.parse_arrow_rest();
        let context = self.contexts.pop().unwrap_or_default();
        let (params, body) = result?;

        let var_names = match &body {
            FunctionBody::Block(statements) => var_declared_names(statements),
            FunctionBody::Expression(_) => Vec::new(),
        };
        Ok(Expression::Arrow(Rc::new(Function {
            name: None,
            params,
            body,
            is_arrow: true,
            binds_own_name: false,
            uses_arguments: context.uses_arguments,
            var_names,
        })))
    }

    fn parse_arrow_rest(&mut self) -> Result<(Vec<Pattern>, FunctionBody)> {
        let params = if self.peek() == TokenKind::Identifier {
            vec![Pattern::Identifier(self.advance().text.into())]
        } else {
            let saved = std::mem::replace(&mut self.no_in, false);
            let params = self.parse_params();
            self.no_in = saved;
            params?
        };
        self.expect(TokenKind::Arrow)?;

        let body = if self.peek() == TokenKind::LeftBrace {
            let saved = std::mem::replace(&mut self.no_in, false);
            let block = self.parse_block();
            self.no_in = saved;
            FunctionBody::Block(block?)
        } else {
            FunctionBody::Expression(Box::new(self.parse_assignment_expression()?))
        };
        Ok((params, body))
    }

    /// Reinterpret an array/object literal (or simple target) as a pattern
    fn expression_to_pattern(&self, expr: Expression, location: SourceLocation) -> Result<Pattern> {
        if is_member_target(&expr) {
            return Ok(Pattern::Member(Box::new(expr)));
        }
        match expr {
            Expression::Identifier(name) => Ok(Pattern::Identifier(name)),
            Expression::Array(elements) => {
                let mut patterns = Vec::with_capacity(elements.len());
                let count = elements.len();
                for (index, element) in elements.into_iter().enumerate() {
                    let pattern = match element {
                        None => None,
                        Some(Expression::Spread(argument)) => {
                            if index + 1 != count {
                                return Err(self.error(
                                    "Rest element must be last element",
                                    location,
                                ));
                            }
                            let inner = self.expression_to_pattern(*argument, location)?;
                            Some(Pattern::Rest(Box::new(inner)))
                        }
                        Some(element) => Some(self.expression_to_pattern(element, location)?),
                    };
                    patterns.push(pattern);
                }
                Ok(Pattern::Array(patterns))
            }
            Expression::Object(properties) => {
                let mut patterns = Vec::with_capacity(properties.len());
                for property in properties {
                    match property {
                        ObjectProperty::KeyValue(key, value) => {
                            let value = self.expression_to_pattern(value, location)?;
                            patterns.push(ObjectPatternProperty::Property { key, value });
                        }
                        ObjectProperty::Spread(argument) => {
                            let inner = self.expression_to_pattern(argument, location)?;
                            patterns.push(ObjectPatternProperty::Rest(inner));
                        }
                    }
                }
                Ok(Pattern::Object(patterns))
            }
            Expression::Assignment(assignment)
                if assignment.operator == AssignmentOperator::Assign =>
            {
                let AssignmentExpression { target, value, .. } = *assignment;
                Ok(Pattern::Assignment(Box::new(target), Box::new(value)))
            }
            _ => Err(self.error("Invalid destructuring assignment target", location)),
        }
    }

    fn parse_conditional_expression(&mut self) -> Result<Expression> {
        let test = self.parse_binary_expression(0)?;
        if !self.consume(TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.allowing_in(|p| p.parse_assignment_expression())?;
        self.expect(TokenKind::Colon)?;
        let alternate = self.parse_assignment_expression()?;
        Ok(Expression::Conditional(Box::new(ConditionalExpression {
            test,
            consequent,
            alternate,
        })))
    }

    fn parse_binary_expression(&mut self, min_prec: u8) -> Result<Expression> {
        let mut left = self.parse_unary_expression()?;

        loop {
            let prec = self.binary_precedence();
            if prec == 0 || prec < min_prec {
                break;
            }
            let kind = self.advance().kind;

            // `**` is right associative
            let next_min = if kind == TokenKind::StarStar { prec } else { prec + 1 };
            let right = self.nested(|p| p.parse_binary_expression(next_min))?;

            left = match kind {
                TokenKind::AmpersandAmpersand => {
                    Expression::Logical(LogicalOperator::And, Box::new(left), Box::new(right))
                }
                TokenKind::PipePipe => {
                    Expression::Logical(LogicalOperator::Or, Box::new(left), Box::new(right))
                }
                TokenKind::QuestionQuestion => Expression::Logical(
                    LogicalOperator::NullishCoalescing,
                    Box::new(left),
                    Box::new(right),
                ),
                other => {
                    let operator = binary_operator(other).ok_or_else(|| self.unexpected())?;
                    Expression::Binary(operator, Box::new(left), Box::new(right))
                }
            };
        }

        Ok(left)
    }

    fn binary_precedence(&self) -> u8 {
        match self.peek() {
            TokenKind::QuestionQuestion => 3,
            TokenKind::PipePipe => 4,
            TokenKind::AmpersandAmpersand => 5,
            TokenKind::Pipe => 6,
            TokenKind::Caret => 7,
            TokenKind::Ampersand => 8,
            TokenKind::EqualsEquals
            | TokenKind::BangEquals
            | TokenKind::EqualsEqualsEquals
            | TokenKind::BangEqualsEquals => 9,
            TokenKind::Less
            | TokenKind::Greater
            | TokenKind::LessEquals
            | TokenKind::GreaterEquals
            | TokenKind::Keyword(Keyword::Instanceof) => 10,
            TokenKind::Keyword(Keyword::In) if !self.no_in => 10,
            TokenKind::LessLess | TokenKind::GreaterGreater | TokenKind::GreaterGreaterGreater => {
                11
            }
            TokenKind::Plus | TokenKind::Minus => 12,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 13,
            TokenKind::StarStar => 14,
            _ => 0,
        }
    }

    fn parse_unary_expression(&mut self) -> Result<Expression> {
        let operator = match self.peek() {
            TokenKind::Bang => Some(UnaryOperator::Not),
            TokenKind::Minus => Some(UnaryOperator::Minus),
            TokenKind::Plus => Some(UnaryOperator::Plus),
            TokenKind::Tilde => Some(UnaryOperator::BitwiseNot),
            TokenKind::Keyword(Keyword::Typeof) => Some(UnaryOperator::Typeof),
            TokenKind::Keyword(Keyword::Void) => Some(UnaryOperator::Void),
            TokenKind::Keyword(Keyword::Delete) => Some(UnaryOperator::Delete),
            _ => None,
        };
        if let Some(operator) = operator {
            self.advance();
            let argument = self.nested(Self::parse_unary_expression)?;
            return Ok(Expression::Unary(operator, Box::new(argument)));
        }

        if matches!(self.peek(), TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let operator = if self.advance().kind == TokenKind::PlusPlus {
                UpdateOperator::Increment
            } else {
                UpdateOperator::Decrement
            };
            let location = self.location();
            let argument = self.nested(Self::parse_unary_expression)?;
            self.check_update_target(&argument, location)?;
            return Ok(Expression::Update(Box::new(UpdateExpression {
                operator,
                prefix: true,
                argument,
            })));
        }

        if self.peek() == TokenKind::Keyword(Keyword::Await) {
            return Err(self.unsupported("'await' expressions"));
        }

        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Result<Expression> {
        let location = self.location();
        let expr = self.parse_left_hand_side_expression()?;
        if matches!(self.peek(), TokenKind::PlusPlus | TokenKind::MinusMinus)
            && !self.current().newline_before
        {
            self.check_update_target(&expr, location)?;
            let operator = if self.advance().kind == TokenKind::PlusPlus {
                UpdateOperator::Increment
            } else {
                UpdateOperator::Decrement
            };
            return Ok(Expression::Update(Box::new(UpdateExpression {
                operator,
                prefix: false,
                argument: expr,
            })));
        }
        Ok(expr)
    }

    fn check_update_target(&self, expr: &Expression, location: SourceLocation) -> Result<()> {
        match expr {
            Expression::Identifier(_) | Expression::SuperMember(_) => Ok(()),
            Expression::Member(member) if !member.optional => Ok(()),
            _ => Err(self.error(
                "Invalid left-hand side expression in update operation",
                location,
            )),
        }
    }

    /// Member accesses, calls and `new`, including optional chains
    fn parse_left_hand_side_expression(&mut self) -> Result<Expression> {
        let mut expr = if self.peek() == TokenKind::Keyword(Keyword::New) {
            self.parse_new_expression()?
        } else if self.peek() == TokenKind::Keyword(Keyword::Super) {
            self.parse_super()?
        } else {
            self.parse_primary_expression()?
        };

        let mut in_optional_chain = false;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.parse_member_name()?;
                    expr = member(expr, MemberProperty::Static(property), false);
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    in_optional_chain = true;
                    match self.peek() {
                        TokenKind::LeftParen => {
                            let arguments = self.parse_arguments()?;
                            expr = Expression::Call(Box::new(CallExpression {
                                callee: expr,
                                arguments,
                                optional: true,
                            }));
                        }
                        TokenKind::LeftBracket => {
                            let property = self.parse_computed_member()?;
                            expr = member(expr, MemberProperty::Computed(property), true);
                        }
                        _ => {
                            let property = self.parse_member_name()?;
                            expr = member(expr, MemberProperty::Static(property), true);
                        }
                    }
                }
                TokenKind::LeftBracket => {
                    let property = self.parse_computed_member()?;
                    expr = member(expr, MemberProperty::Computed(property), false);
                }
                TokenKind::LeftParen => {
                    let arguments = self.parse_arguments()?;
                    expr = Expression::Call(Box::new(CallExpression {
                        callee: expr,
                        arguments,
                        optional: false,
                    }));
                }
                TokenKind::TemplateLiteral | TokenKind::TemplateHead => {
                    return Err(self.unsupported("Tagged templates"));
                }
                _ => break,
            }
        }

        if in_optional_chain {
            expr = Expression::OptionalChain(Box::new(expr));
        }
        Ok(expr)
    }

    fn parse_member_name(&mut self) -> Result<Name> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Identifier | TokenKind::Keyword(_) | TokenKind::PrivateName => {
                self.advance();
                Ok(token.text.into())
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_computed_member(&mut self) -> Result<Expression> {
        self.expect(TokenKind::LeftBracket)?;
        let property = self.allowing_in(|p| p.parse_expression())?;
        self.expect(TokenKind::RightBracket)?;
        Ok(property)
    }

    fn parse_super(&mut self) -> Result<Expression> {
        self.advance();
        match self.peek() {
            TokenKind::LeftParen => Ok(Expression::SuperCall(self.parse_arguments()?)),
            TokenKind::Dot => {
                self.advance();
                let property = self.parse_member_name()?;
                Ok(Expression::SuperMember(Box::new(MemberProperty::Static(property))))
            }
            TokenKind::LeftBracket => {
                let property = self.parse_computed_member()?;
                Ok(Expression::SuperMember(Box::new(MemberProperty::Computed(property))))
            }
            _ => Err(self.error("'super' keyword unexpected here", self.location())),
        }
    }

    fn parse_new_expression(&mut self) -> Result<Expression> {
        self.advance();
        if self.peek() == TokenKind::Dot {
            return Err(self.unsupported("Meta properties"));
        }

        let mut callee = if self.peek() == TokenKind::Keyword(Keyword::New) {
            self.nested(Self::parse_new_expression)?
        } else {
            self.parse_primary_expression()?
        };
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.parse_member_name()?;
                    callee = member(callee, MemberProperty::Static(property), false);
                }
                TokenKind::LeftBracket => {
                    let property = self.parse_computed_member()?;
                    callee = member(callee, MemberProperty::Computed(property), false);
                }
                _ => break,
            }
        }

        let arguments = if self.peek() == TokenKind::LeftParen {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expression::New(Box::new(CallExpression {
            callee,
            arguments,
            optional: false,
        })))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>> {
        self.expect(TokenKind::LeftParen)?;
        let saved = std::mem::replace(&mut self.no_in, false);
        let result = self.parse_argument_list();
        self.no_in = saved;
        result
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Expression>> {
        let mut arguments = Vec::new();
        while !self.consume(TokenKind::RightParen) {
            if self.consume(TokenKind::DotDotDot) {
                let argument = self.parse_assignment_expression()?;
                arguments.push(Expression::Spread(Box::new(argument)));
            } else {
                arguments.push(self.parse_assignment_expression()?);
            }
            if self.peek() != TokenKind::RightParen {
                self.expect(TokenKind::Comma)?;
            }
        }
        Ok(arguments)
    }

    fn parse_primary_expression(&mut self) -> Result<Expression> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Identifier => {
                self.advance();
                if token.text == "arguments" {
                    self.mark_arguments_use();
                }
                Ok(Expression::Identifier(token.text.into()))
            }
            TokenKind::Keyword(Keyword::This) => {
                self.advance();
                Ok(Expression::This)
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expression::Literal(Literal::Null))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expression::Literal(Literal::Boolean(true)))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expression::Literal(Literal::Boolean(false)))
            }
            TokenKind::Keyword(Keyword::Function) => {
                let function = self.parse_function(false)?;
                Ok(Expression::Function(Rc::new(function)))
            }
            TokenKind::Keyword(Keyword::Class) => {
                let class = self.parse_class(false)?;
                Ok(Expression::Class(Rc::new(class)))
            }
            TokenKind::NumberLiteral => {
                self.advance();
                Ok(Expression::Literal(Literal::Number(self.number_value(&token)?)))
            }
            TokenKind::BigIntLiteral => Err(self.unsupported("BigInt literals")),
            TokenKind::StringLiteral => {
                self.advance();
                Ok(Expression::Literal(Literal::String(self.string_value(&token)?)))
            }
            TokenKind::TemplateLiteral | TokenKind::TemplateHead => self.parse_template_literal(),
            TokenKind::RegexLiteral => {
                self.advance();
                let text = token.text;
                let close = text.rfind('/').unwrap_or(0);
                if close == 0 {
                    return Err(self.error("Invalid regular expression", token.location));
                }
                Ok(Expression::Regex {
                    pattern: text[1..close].into(),
                    flags: text[close + 1..].into(),
                })
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.allowing_in(|p| p.parse_expression())?;
                self.expect(TokenKind::RightParen)?;
                Ok(expr)
            }
            TokenKind::LeftBracket => self.parse_array_literal(),
            TokenKind::LeftBrace => self.parse_object_literal(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expression> {
        self.expect(TokenKind::LeftBracket)?;
        let saved = std::mem::replace(&mut self.no_in, false);
        let mut elements = Vec::new();
        let result = loop {
            if self.consume(TokenKind::RightBracket) {
                break Ok(());
            }
            if self.consume(TokenKind::Comma) {
                elements.push(None);
                continue;
            }
            let element = if self.consume(TokenKind::DotDotDot) {
                self.parse_assignment_expression()
                    .map(|e| Expression::Spread(Box::new(e)))
            } else {
                self.parse_assignment_expression()
            };
            match element {
                Ok(element) => elements.push(Some(element)),
                Err(e) => break Err(e),
            }
            if self.peek() != TokenKind::RightBracket {
                if let Err(e) = self.expect(TokenKind::Comma) {
                    break Err(e);
                }
            }
        };
        self.no_in = saved;
        result.map(|_| Expression::Array(elements))
    }

    fn parse_object_literal(&mut self) -> Result<Expression> {
        self.expect(TokenKind::LeftBrace)?;
        let saved = std::mem::replace(&mut self.no_in, false);
        let result = self.parse_object_properties();
        self.no_in = saved;
        result.map(Expression::Object)
    }

    fn parse_object_properties(&mut self) -> Result<Vec<ObjectProperty>> {
        let mut properties = Vec::new();
        while !self.consume(TokenKind::RightBrace) {
            if self.consume(TokenKind::DotDotDot) {
                properties.push(ObjectProperty::Spread(self.parse_assignment_expression()?));
            } else {
                properties.push(self.parse_object_property()?);
            }
            if self.peek() != TokenKind::RightBrace {
                self.expect(TokenKind::Comma)?;
            }
        }
        Ok(properties)
    }

    fn parse_object_property(&mut self) -> Result<ObjectProperty> {
        self.reject_method_prefix()?;
        let shorthand_name = (self.peek() == TokenKind::Identifier).then(|| self.current().text);
        let key = self.parse_property_key()?;

        match self.peek() {
            TokenKind::Colon => {
                self.advance();
                let mut value = self.parse_assignment_expression()?;
                if let PropertyKey::Static(name) = &key {
                    name_anonymous_function(&mut value, name);
                }
                Ok(ObjectProperty::KeyValue(key, value))
            }
            TokenKind::LeftParen => {
                let name = match &key {
                    PropertyKey::Static(name) => Some(name.clone()),
                    PropertyKey::Computed(_) => None,
                };
                let function = self.parse_function_rest(name, false)?;
                Ok(ObjectProperty::KeyValue(
                    key,
                    Expression::Function(Rc::new(function)),
                ))
            }
            _ => {
                let Some(name) = shorthand_name else {
                    return Err(self.unexpected());
                };
                if name == "arguments" {
                    self.mark_arguments_use();
                }
                let value = Expression::Identifier(name.into());
                if self.consume(TokenKind::Equals) {
                    // only valid as a destructuring target: `({ a = 1 } = obj)`
                    let default = self.parse_assignment_expression()?;
                    return Ok(ObjectProperty::KeyValue(
                        key,
                        Expression::Assignment(Box::new(AssignmentExpression {
                            operator: AssignmentOperator::Assign,
                            target: Pattern::Identifier(name.into()),
                            value: default,
                        })),
                    ));
                }
                Ok(ObjectProperty::KeyValue(key, value))
            }
        }
    }

    fn parse_template_literal(&mut self) -> Result<Expression> {
        let first = self.advance();
        if first.kind == TokenKind::TemplateLiteral {
            let text = first.text;
            let cooked = self.cook(&text[1..text.len() - 1], first.location)?;
            return Ok(Expression::Template(TemplateLiteral {
                quasis: vec![cooked],
                expressions: Vec::new(),
            }));
        }

        // head: `...${
        let text = first.text;
        let mut quasis = vec![self.cook(&text[1..text.len() - 2], first.location)?];
        let mut expressions = Vec::new();
        loop {
            expressions.push(self.allowing_in(|p| p.parse_expression())?);
            let part = self.advance();
            match part.kind {
                TokenKind::TemplateMiddle => {
                    let text = part.text;
                    quasis.push(self.cook(&text[1..text.len() - 2], part.location)?);
                }
                TokenKind::TemplateTail => {
                    let text = part.text;
                    quasis.push(self.cook(&text[1..text.len() - 1], part.location)?);
                    break;
                }
                _ => return Err(self.error("Unterminated template literal", part.location)),
            }
        }
        Ok(Expression::Template(TemplateLiteral {
            quasis,
            expressions,
        }))
    }

    fn cook(&self, raw: &str, location: SourceLocation) -> Result<Name> {
        cook_string(raw)
            .map(Name::from)
            .map_err(|message| self.error(message, location))
    }

    fn string_value(&self, token: &Token<'src>) -> Result<Name> {
        let text = token.text;
        self.cook(&text[1..text.len() - 1], token.location)
    }

    fn number_value(&self, token: &Token<'src>) -> Result<f64> {
        parse_number_literal(token.text)
            .ok_or_else(|| self.error("Invalid number literal", token.location))
    }
}

/// Plain (non-optional) member accesses can be assigned to
fn is_member_target(expr: &Expression) -> bool {
    match expr {
        Expression::Member(member) => !member.optional,
        Expression::SuperMember(_) => true,
        _ => false,
    }
}

fn member(object: Expression, property: MemberProperty, optional: bool) -> Expression {
    Expression::Member(Box::new(MemberExpression {
        object,
        property,
        optional,
    }))
}

fn binary_operator(kind: TokenKind) -> Option<BinaryOperator> {
    let operator = match kind {
        TokenKind::Plus => BinaryOperator::Add,
        TokenKind::Minus => BinaryOperator::Sub,
        TokenKind::Star => BinaryOperator::Mul,
        TokenKind::Slash => BinaryOperator::Div,
        TokenKind::Percent => BinaryOperator::Mod,
        TokenKind::StarStar => BinaryOperator::Pow,
        TokenKind::EqualsEquals => BinaryOperator::Eq,
        TokenKind::BangEquals => BinaryOperator::Ne,
        TokenKind::EqualsEqualsEquals => BinaryOperator::StrictEq,
        TokenKind::BangEqualsEquals => BinaryOperator::StrictNe,
        TokenKind::Less => BinaryOperator::Lt,
        TokenKind::LessEquals => BinaryOperator::Le,
        TokenKind::Greater => BinaryOperator::Gt,
        TokenKind::GreaterEquals => BinaryOperator::Ge,
        TokenKind::LessLess => BinaryOperator::Shl,
        TokenKind::GreaterGreater => BinaryOperator::Shr,
        TokenKind::GreaterGreaterGreater => BinaryOperator::UShr,
        TokenKind::Ampersand => BinaryOperator::BitwiseAnd,
        TokenKind::Pipe => BinaryOperator::BitwiseOr,
        TokenKind::Caret => BinaryOperator::BitwiseXor,
        TokenKind::Keyword(Keyword::In) => BinaryOperator::In,
        TokenKind::Keyword(Keyword::Instanceof) => BinaryOperator::Instanceof,
        _ => return None,
    };
    Some(operator)
}

/// Give `const f = () => {}` and friends their binding's name
fn name_anonymous_function(expr: &mut Expression, name: &Name) {
    match expr {
        Expression::Arrow(function) | Expression::Function(function) => {
            if let Some(function) = Rc::get_mut(function) {
                if function.name.is_none() {
                    function.name = Some(name.clone());
                }
            }
        }
        Expression::Class(class) => {
            if let Some(class) = Rc::get_mut(class) {
                if class.name.is_none() {
                    class.name = Some(name.clone());
                }
            }
        }
        _ => {}
    }
}

/// Numeric value of a number literal token (`_` separators allowed)
pub fn parse_number_literal(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    let radix = match cleaned.get(..2) {
        Some("0x" | "0X") => 16,
        Some("0b" | "0B") => 2,
        Some("0o" | "0O") => 8,
        _ => 10,
    };
    if radix != 10 {
        let digits = &cleaned[2..];
        if digits.is_empty() {
            return None;
        }
        let mut value = 0f64;
        for c in digits.chars() {
            value = value * radix as f64 + c.to_digit(radix)? as f64;
        }
        return Some(value);
    }

    lexical_core::parse::<f64>(cleaned.as_bytes())
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok())
}

/// Parse a complete script
pub fn parse(source: &str) -> Result<Program> {
    Parser::new(source)?.parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_expression(source: &str) -> Expression {
        let program = parse(source).unwrap();
        match program.body.into_iter().next() {
            Some(Statement::Expression(expr)) => expr,
            other => panic!("expected an expression statement, got {:?}", other),
        }
    }

    fn syntax_error(source: &str) -> String {
        parse(source).unwrap_err().to_string()
    }

    #[test]
    fn test_parse_literals() {
        assert!(matches!(
            first_expression("0x1F;"),
            Expression::Literal(Literal::Number(n)) if n == 31.0
        ));
        assert!(matches!(
            first_expression("1_000.5;"),
            Expression::Literal(Literal::Number(n)) if n == 1000.5
        ));
        assert!(matches!(
            first_expression("'a\\tb';"),
            Expression::Literal(Literal::String(s)) if &*s == "a\tb"
        ));
        assert!(matches!(first_expression("/a+/g;"), Expression::Regex { .. }));
    }

    #[test]
    fn test_parse_precedence() {
        let expr = first_expression("1 + 2 * 3;");
        let Expression::Binary(BinaryOperator::Add, _, right) = expr else {
            panic!("expected addition at the root");
        };
        assert!(matches!(*right, Expression::Binary(BinaryOperator::Mul, _, _)));

        // right associative exponent
        let expr = first_expression("2 ** 3 ** 2;");
        let Expression::Binary(BinaryOperator::Pow, left, _) = expr else {
            panic!("expected exponent at the root");
        };
        assert!(matches!(*left, Expression::Literal(_)));
    }

    #[test]
    fn test_parse_arrow_functions() {
        assert!(matches!(first_expression("x => x * 2;"), Expression::Arrow(_)));
        assert!(matches!(first_expression("(a, b = 1, ...rest) => a;"), Expression::Arrow(_)));
        assert!(matches!(first_expression("({ a }, [b]) => { return a + b };"), Expression::Arrow(_)));
        // a parenthesized expression is not an arrow
        assert!(matches!(first_expression("(a, b);"), Expression::Sequence(_)));
    }

    #[test]
    fn test_anonymous_functions_take_binding_name() {
        let program = parse("const double = (x) => x * 2;").unwrap();
        let Statement::VariableDeclaration(decl) = &program.body[0] else {
            panic!("expected declaration");
        };
        let Some(Expression::Arrow(function)) = &decl.declarations[0].init else {
            panic!("expected arrow");
        };
        assert_eq!(function.name.as_deref(), Some("double"));
    }

    #[test]
    fn test_destructuring_assignment() {
        let expr = first_expression("[a, b] = [b, a];");
        let Expression::Assignment(assignment) = expr else {
            panic!("expected assignment");
        };
        assert!(matches!(assignment.target, Pattern::Array(_)));

        let expr = first_expression("({ x, y: [z] = [] } = point);");
        let Expression::Assignment(assignment) = expr else {
            panic!("expected assignment");
        };
        assert!(matches!(assignment.target, Pattern::Object(_)));
    }

    #[test]
    fn test_optional_chain_is_wrapped() {
        let expr = first_expression("a?.b.c();");
        assert!(matches!(expr, Expression::OptionalChain(_)));
    }

    #[test]
    fn test_asi() {
        let program = parse("let a = 1\nlet b = a\n++b\nfoo()").unwrap();
        assert_eq!(program.body.len(), 4);

        let program = parse("function f() {\n  return\n  42\n}").unwrap();
        let Statement::FunctionDeclaration(function) = &program.body[0] else {
            panic!("expected function");
        };
        let FunctionBody::Block(body) = &function.body else {
            panic!("expected block");
        };
        assert!(matches!(body[0], Statement::Return(None)));
    }

    #[test]
    fn test_for_loop_heads() {
        assert!(matches!(
            parse("for (let i = 0; i < 3; i++) {}").unwrap().body[0],
            Statement::For(_)
        ));
        assert!(matches!(
            parse("for (const [k, v] of entries) {}").unwrap().body[0],
            Statement::ForOf(_)
        ));
        assert!(matches!(
            parse("for (key in obj) {}").unwrap().body[0],
            Statement::ForIn(_)
        ));
        // `in` needs parentheses inside a for head initializer
        assert!(parse("for (let i = 'a' in obj ? 1 : 0; i;) {}").is_err());
        assert!(parse("for (let i = ('a' in obj) ? 1 : 0; i;) {}").is_ok());
    }

    #[test]
    fn test_class_members() {
        let program = parse(
            "class Counter extends Base {\n  count = 0;\n  static instances = 0;\n  constructor(n) { super(n); }\n  inc() { this.count++; }\n  static create() { return new Counter(0); }\n}",
        )
        .unwrap();
        let Statement::ClassDeclaration(class) = &program.body[0] else {
            panic!("expected class");
        };
        assert!(class.super_class.is_some());
        assert!(class.constructor.is_some());
        assert_eq!(class.members.len(), 4);
    }

    #[test]
    fn test_arguments_usage_is_tracked() {
        let program = parse("function f() { return () => arguments.length; }").unwrap();
        let Statement::FunctionDeclaration(function) = &program.body[0] else {
            panic!("expected function");
        };
        assert!(function.uses_arguments);
    }

    #[test]
    fn test_unsupported_constructs_are_named() {
        assert!(syntax_error("function* g() {}").contains("Generator functions are not supported"));
        assert!(syntax_error("async function f() {}").contains("Async functions are not supported"));
        assert!(syntax_error("const o = { get x() { return 1 } };")
            .contains("Getters and setters are not supported"));
        assert!(syntax_error("outer: for (;;) {}").contains("Labeled statements are not supported"));
        assert!(syntax_error("import x from 'y';").contains("outside a module"));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(syntax_error("let = ;").starts_with("SyntaxError"));
        assert!(syntax_error("const x;").contains("Missing initializer in const declaration"));
        assert!(syntax_error("return 1;").contains("Illegal return statement"));
        assert!(syntax_error("break;").contains("Illegal break statement"));
        assert!(syntax_error("f(").contains("Unexpected end of input"));
        assert!(syntax_error("1 = 2;").contains("Invalid left-hand side in assignment"));
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        // Reaching the limit takes more stack than a test thread has.
        let checks = std::thread::Builder::new()
            .stack_size(128 * 1024 * 1024)
            .spawn(|| {
                let depth = MAX_NESTING_DEPTH as usize * 2;
                let arrays = format!("x = {}1{};", "[".repeat(depth), "]".repeat(depth));
                assert!(syntax_error(&arrays).contains("Maximum nesting depth exceeded"));
                let blocks = format!("{}{}", "{".repeat(depth), "}".repeat(depth));
                assert!(syntax_error(&blocks).contains("Maximum nesting depth exceeded"));
                let negations = format!("{}x;", "!".repeat(depth));
                assert!(syntax_error(&negations).contains("Maximum nesting depth exceeded"));
                let powers = format!("x = 2{};", " ** 2".repeat(depth));
                assert!(syntax_error(&powers).contains("Maximum nesting depth exceeded"));

                let shallow = format!("x = {}1{};", "[".repeat(100), "]".repeat(100));
                assert!(parse(&shallow).is_ok());
            })
            .unwrap();
        checks.join().unwrap();
    }
}
