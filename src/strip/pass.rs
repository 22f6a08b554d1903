//! Token walk that records the edits for one stripping run

use super::StripRules;
use crate::lexer::{Keyword, Token, TokenKind};

/// TypeScript-only member/parameter modifiers
const MODIFIERS: &[&str] = &[
    "public",
    "private",
    "protected",
    "readonly",
    "declare",
    "abstract",
    "override",
];

/// A replacement of `source[start..end]` by `text`. Removals have empty
/// text, insertions have `start == end`.
#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

pub(super) struct StripPass<'a, 'src> {
    source: &'src str,
    tokens: &'a [Token<'src>],
    /// For every opening bracket (and template head/middle), the index of
    /// the token that closes it
    closer: Vec<Option<usize>>,
    rules: StripRules,
    edits: Vec<Edit>,
}

impl<'a, 'src> StripPass<'a, 'src> {
    pub(super) fn new(source: &'src str, tokens: &'a [Token<'src>], rules: StripRules) -> Self {
        Self {
            source,
            tokens,
            closer: match_brackets(tokens),
            rules,
            edits: Vec::new(),
        }
    }

    pub(super) fn run(&mut self) {
        // the final token is always Eof
        let end = self.tokens.len().saturating_sub(1);
        self.walk(0, end);
    }

    /// Apply the recorded edits to the source
    pub(super) fn finish(mut self) -> String {
        self.edits.sort_by_key(|e| (e.start, e.end));

        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for edit in &self.edits {
            if edit.start < cursor || (edit.end <= cursor && edit.start != edit.end) {
                continue;
            }
            out.push_str(&self.source[cursor..edit.start]);
            out.push_str(&edit.text);
            cursor = edit.end;

            // never glue two words together
            let left = out.chars().next_back();
            let right = self.source[cursor..].chars().next();
            if let (Some(l), Some(r)) = (left, right) {
                if is_word_char(l) && is_word_char(r) {
                    out.push(' ');
                }
            }
        }
        out.push_str(&self.source[cursor..]);
        out
    }

    // ------------------------------------------------------------------
    // Token access
    // ------------------------------------------------------------------

    fn tok(&self, i: usize) -> &Token<'src> {
        let last = self.tokens.len() - 1;
        &self.tokens[i.min(last)]
    }

    fn kind(&self, i: usize) -> TokenKind {
        self.tok(i).kind
    }

    fn is_word(&self, i: usize, word: &str) -> bool {
        self.tok(i).is_word(word)
    }

    fn closer(&self, i: usize) -> Option<usize> {
        self.closer.get(i).copied().flatten()
    }

    fn has(&self, rule: StripRules) -> bool {
        self.rules.contains(rule)
    }

    /// Remove the source text from the start of token `first` to the end of
    /// token `last`
    fn remove_tokens(&mut self, first: usize, last: usize) {
        let start = self.tok(first).location.offset;
        let end = self.tok(last).end();
        self.remove_range(start, end);
    }

    /// Remove token `first` and everything up to the start of token `next`
    fn remove_until(&mut self, first: usize, next: usize) {
        let start = self.tok(first).location.offset;
        let end = self.tok(next).location.offset;
        self.remove_range(start, end);
    }

    fn remove_range(&mut self, start: usize, end: usize) {
        if start < end {
            self.edits.push(Edit {
                start,
                end,
                text: String::new(),
            });
        }
    }

    fn replace_tokens(&mut self, first: usize, last: usize, text: String) {
        self.edits.push(Edit {
            start: self.tok(first).location.offset,
            end: self.tok(last).end(),
            text,
        });
    }

    fn insert_after(&mut self, token: usize, text: String) {
        let at = self.tok(token).end();
        self.edits.push(Edit {
            start: at,
            end: at,
            text,
        });
    }

    fn at_statement_start(&self, i: usize) -> bool {
        if i == 0 {
            return true;
        }
        self.tok(i).newline_before
            || matches!(
                self.kind(i - 1),
                TokenKind::Semicolon
                    | TokenKind::LeftBrace
                    | TokenKind::RightBrace
                    | TokenKind::Keyword(Keyword::Export)
                    | TokenKind::Keyword(Keyword::Default)
            )
    }

    fn same_line(&self, i: usize) -> bool {
        !self.tok(i).newline_before
    }

    // ------------------------------------------------------------------
    // Walking
    // ------------------------------------------------------------------

    fn walk(&mut self, start: usize, end: usize) {
        let mut i = start;
        while i < end {
            let next = self.step(i);
            i = next.max(i + 1);
        }
    }

    /// Handle the construct starting at token `i`, returning the index of
    /// the next token to look at
    fn step(&mut self, i: usize) -> usize {
        match self.kind(i) {
            TokenKind::Keyword(Keyword::Export) if self.has(StripRules::EXPORTS) => {
                self.strip_export(i)
            }
            TokenKind::Keyword(Keyword::Import)
                if self.has(StripRules::IMPORTS)
                    && !matches!(self.kind(i + 1), TokenKind::LeftParen | TokenKind::Dot) =>
            {
                self.strip_import(i)
            }
            TokenKind::Keyword(Keyword::Function) => self.strip_function(i),
            TokenKind::Keyword(Keyword::Const | Keyword::Let | Keyword::Var) => {
                self.strip_variable(i)
            }
            TokenKind::Keyword(Keyword::Class) => self.strip_class(i),
            TokenKind::Keyword(Keyword::Catch) => self.strip_catch(i),
            TokenKind::Keyword(Keyword::Enum) if self.has(StripRules::ENUMS) => {
                self.rewrite_enum(i).unwrap_or(i + 1)
            }
            TokenKind::LeftParen => self.strip_arrow_head(i).unwrap_or(i + 1),
            TokenKind::Less if self.has(StripRules::GENERICS) => {
                self.strip_generic_call(i).unwrap_or(i + 1)
            }
            TokenKind::Bang
                if self.has(StripRules::EXPRESSION_TYPES) && self.is_non_null_assertion(i) =>
            {
                self.remove_tokens(i, i);
                i + 1
            }
            TokenKind::Identifier => self.strip_word(i),
            _ => i + 1,
        }
    }

    /// Identifier-led constructs: contextual keywords and object methods
    fn strip_word(&mut self, i: usize) -> usize {
        let text = self.tok(i).text;
        let statement_start = self.at_statement_start(i);
        let next_same_line = self.same_line(i + 1);

        match text {
            "interface"
                if self.has(StripRules::INTERFACES)
                    && statement_start
                    && next_same_line
                    && self.kind(i + 1) == TokenKind::Identifier =>
            {
                return self.strip_interface(i).unwrap_or(i + 1);
            }
            "type"
                if self.has(StripRules::TYPE_ALIASES)
                    && statement_start
                    && next_same_line
                    && self.kind(i + 1) == TokenKind::Identifier
                    && matches!(self.kind(i + 2), TokenKind::Equals | TokenKind::Less) =>
            {
                return self.strip_type_alias(i).unwrap_or(i + 1);
            }
            "declare"
                if self.has(StripRules::EXPRESSION_TYPES)
                    && statement_start
                    && next_same_line
                    && self.starts_declaration(i + 1) =>
            {
                let end = self.statement_end(i + 1);
                self.remove_tokens(i, end - 1);
                return end;
            }
            "abstract"
                if self.has(StripRules::EXPRESSION_TYPES)
                    && next_same_line
                    && self.kind(i + 1) == TokenKind::Keyword(Keyword::Class) =>
            {
                self.remove_until(i, i + 1);
                return i + 1;
            }
            "as" | "satisfies"
                if self.has(StripRules::EXPRESSION_TYPES)
                    && i > 0
                    && self.kind(i - 1).ends_expression()
                    && self.same_line(i) =>
            {
                let end = if text == "as" && self.kind(i + 1) == TokenKind::Keyword(Keyword::Const)
                {
                    Some(i + 2)
                } else {
                    self.skip_type(i + 1)
                };
                if let Some(end) = end {
                    let start = self.tok(i - 1).end();
                    let stop = self.tok(end - 1).end();
                    self.remove_range(start, stop);
                    return end;
                }
            }
            _ => {}
        }

        if self.in_method_position(i) {
            if let Some(body) = self.try_object_method(i) {
                return body;
            }
        }
        i + 1
    }

    fn starts_declaration(&self, i: usize) -> bool {
        match self.kind(i) {
            TokenKind::Keyword(
                Keyword::Const | Keyword::Let | Keyword::Var | Keyword::Function | Keyword::Class | Keyword::Enum,
            ) => true,
            TokenKind::Identifier => matches!(
                self.tok(i).text,
                "module" | "namespace" | "global" | "type" | "interface" | "abstract"
            ),
            _ => false,
        }
    }

    /// Index one past the end of the statement beginning at `start`
    fn statement_end(&self, start: usize) -> usize {
        let last = self.tokens.len() - 1;
        let mut k = start;
        while k < last {
            match self.kind(k) {
                TokenKind::Semicolon => return k + 1,
                TokenKind::LeftBrace => match self.closer(k) {
                    Some(close) => {
                        let after = close + 1;
                        if after >= last
                            || self.tok(after).newline_before
                            || self.kind(after) == TokenKind::RightBrace
                        {
                            return after;
                        }
                        k = after;
                        continue;
                    }
                    None => return last,
                },
                TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::TemplateHead => {
                    k = self.closer(k).map_or(last, |c| c + 1);
                    continue;
                }
                _ => {}
            }
            if k > start && self.tok(k).newline_before && self.kind(k - 1).ends_expression() {
                return k;
            }
            k += 1;
        }
        last
    }

    // ------------------------------------------------------------------
    // Modules
    // ------------------------------------------------------------------

    fn strip_export(&mut self, i: usize) -> usize {
        let next = i + 1;
        match self.kind(next) {
            TokenKind::Keyword(Keyword::Default) => {
                self.remove_until(i, next + 1);
                next + 1
            }
            TokenKind::LeftBrace => self.strip_export_list(i, next),
            TokenKind::Identifier
                if self.tok(next).text == "type" && self.kind(next + 1) == TokenKind::LeftBrace =>
            {
                self.strip_export_list(i, next + 1)
            }
            TokenKind::Star => {
                let mut k = next + 1;
                while k < self.tokens.len() - 1
                    && !matches!(self.kind(k), TokenKind::StringLiteral | TokenKind::Semicolon)
                {
                    k += 1;
                }
                if self.kind(k) == TokenKind::StringLiteral {
                    k += 1;
                }
                if self.kind(k) == TokenKind::Semicolon {
                    k += 1;
                }
                self.remove_tokens(i, k - 1);
                k
            }
            _ => {
                self.remove_until(i, next);
                next
            }
        }
    }

    /// `export { a, b as c } [from '...'];`
    fn strip_export_list(&mut self, i: usize, open: usize) -> usize {
        let Some(close) = self.closer(open) else {
            return i + 1;
        };
        let mut end = close + 1;
        if self.is_word(end, "from") && self.kind(end + 1) == TokenKind::StringLiteral {
            end += 2;
        }
        if self.kind(end) == TokenKind::Semicolon {
            end += 1;
        }
        self.remove_tokens(i, end - 1);
        end
    }

    fn strip_import(&mut self, i: usize) -> usize {
        let last = self.tokens.len() - 1;
        let mut k = i + 1;
        loop {
            match self.kind(k) {
                TokenKind::StringLiteral => break,
                TokenKind::LeftBrace => match self.closer(k) {
                    Some(close) => k = close + 1,
                    None => return i + 1,
                },
                TokenKind::Semicolon | TokenKind::Eof => return i + 1,
                _ => k += 1,
            }
            if k >= last {
                return i + 1;
            }
        }

        let mut end = k + 1;
        let attributes = self.is_word(end, "assert") || self.kind(end) == TokenKind::Keyword(Keyword::With);
        if attributes && self.kind(end + 1) == TokenKind::LeftBrace {
            if let Some(close) = self.closer(end + 1) {
                end = close + 1;
            }
        }
        if self.kind(end) == TokenKind::Semicolon {
            end += 1;
        }
        self.remove_tokens(i, end - 1);
        end
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn strip_interface(&mut self, i: usize) -> Option<usize> {
        let mut k = i + 2;
        while self.kind(k) != TokenKind::LeftBrace {
            match self.kind(k) {
                TokenKind::Less => k = self.angle_end(k)?,
                TokenKind::Semicolon | TokenKind::Eof => return None,
                _ => k += 1,
            }
        }
        let close = self.closer(k)?;
        let last = if self.kind(close + 1) == TokenKind::Semicolon {
            close + 1
        } else {
            close
        };
        self.remove_tokens(i, last);
        Some(last + 1)
    }

    fn strip_type_alias(&mut self, i: usize) -> Option<usize> {
        let mut k = i + 2;
        if self.kind(k) == TokenKind::Less {
            k = self.angle_end(k)?;
        }
        if self.kind(k) != TokenKind::Equals {
            return None;
        }
        let mut end = self.skip_type(k + 1)?;
        if self.kind(end) == TokenKind::Semicolon {
            end += 1;
        }
        self.remove_tokens(i, end - 1);
        Some(end)
    }

    /// `enum E { A, B = 5, C = 'c' }` becomes the usual two-way lookup object
    fn rewrite_enum(&mut self, i: usize) -> Option<usize> {
        if self.kind(i + 1) != TokenKind::Identifier || self.kind(i + 2) != TokenKind::LeftBrace {
            return None;
        }
        let name = self.tok(i + 1).text;
        let open = i + 2;
        let close = self.closer(open)?;

        let mut body = String::new();
        let mut next_value: Option<f64> = Some(0.0);
        let mut previous: Option<String> = None;
        let mut k = open + 1;
        while k < close {
            let member = match self.kind(k) {
                TokenKind::Identifier | TokenKind::Keyword(_) => self.tok(k).text.to_string(),
                TokenKind::StringLiteral => {
                    let raw = self.tok(k).text;
                    raw[1..raw.len() - 1].to_string()
                }
                _ => return None,
            };
            k += 1;

            let value = if self.kind(k) == TokenKind::Equals {
                let start = k + 1;
                let mut end = start;
                while end < close && self.kind(end) != TokenKind::Comma {
                    end = match self.closer(end) {
                        Some(c) if c < close => c + 1,
                        _ => end + 1,
                    };
                }
                if end == start {
                    return None;
                }
                let text = &self.source[self.tok(start).location.offset..self.tok(end - 1).end()];
                next_value = text.parse::<f64>().ok().map(|v| v + 1.0);
                k = end;
                text.to_string()
            } else {
                let value = match (next_value, &previous) {
                    (Some(v), _) => crate::runtime::number_to_string(v),
                    (None, Some(prev)) => format!("{}[\"{}\"] + 1", name, prev),
                    (None, None) => "0".to_string(),
                };
                next_value = next_value.map(|v| v + 1.0);
                value
            };

            let is_string = value.starts_with('"') || value.starts_with('\'') || value.starts_with('`');
            if is_string {
                body.push_str(&format!(" {}[\"{}\"] = {};", name, member, value));
            } else {
                body.push_str(&format!(
                    " {name}[{name}[\"{member}\"] = {value}] = \"{member}\";",
                    name = name,
                    member = member,
                    value = value
                ));
            }
            previous = Some(member);

            if self.kind(k) == TokenKind::Comma {
                k += 1;
            }
        }

        let text = format!(
            "var {name};(function ({name}) {{{body} }})({name} || ({name} = {{}}));",
            name = name,
            body = body
        );
        self.replace_tokens(i, close, text);
        Some(close + 1)
    }

    fn strip_function(&mut self, i: usize) -> usize {
        let mut j = i + 1;
        if self.kind(j) == TokenKind::Star {
            j += 1;
        }
        if self.kind(j) == TokenKind::Identifier {
            j += 1;
        }
        if self.kind(j) == TokenKind::Less {
            if let Some(end) = self.angle_end(j) {
                if self.has(StripRules::GENERICS) {
                    self.remove_tokens(j, end - 1);
                }
                j = end;
            }
        }
        if self.kind(j) != TokenKind::LeftParen {
            return j;
        }
        let Some(close) = self.strip_params(j, StripRules::PARAM_TYPES).map(|p| p.close) else {
            return j + 1;
        };

        let mut k = close + 1;
        if self.kind(k) == TokenKind::Colon {
            if let Some(end) = self.skip_type(k + 1) {
                if self.has(StripRules::RETURN_TYPES) {
                    self.remove_tokens(k, end - 1);
                }
                k = end;
            }
        }

        if self.kind(k) != TokenKind::LeftBrace && self.has(StripRules::EXPRESSION_TYPES) {
            // overload signature without a body
            let last = if self.kind(k) == TokenKind::Semicolon { k } else { k - 1 };
            self.remove_tokens(i, last);
            return last + 1;
        }
        k
    }

    fn strip_variable(&mut self, i: usize) -> usize {
        let mut j = i + 1;
        match self.kind(j) {
            TokenKind::Identifier => j += 1,
            TokenKind::LeftBrace | TokenKind::LeftBracket => match self.closer(j) {
                Some(close) => j = close + 1,
                None => return i + 1,
            },
            TokenKind::Keyword(Keyword::Enum) if self.has(StripRules::ENUMS) => {
                // `const enum` is emitted like a plain enum
                self.remove_until(i, j);
                return j;
            }
            _ => return i + 1,
        }

        if self.kind(j) == TokenKind::Bang && self.kind(j + 1) == TokenKind::Colon {
            if self.has(StripRules::VARIABLE_TYPES) {
                self.remove_tokens(j, j);
            }
            j += 1;
        }
        if self.kind(j) == TokenKind::Colon {
            if let Some(end) = self.skip_type(j + 1) {
                if self.has(StripRules::VARIABLE_TYPES) {
                    self.remove_tokens(j, end - 1);
                }
                j = end;
            }
        }
        j
    }

    fn strip_catch(&mut self, i: usize) -> usize {
        if self.kind(i + 1) == TokenKind::LeftParen
            && self.kind(i + 2) == TokenKind::Identifier
            && self.kind(i + 3) == TokenKind::Colon
        {
            if let Some(end) = self.skip_type(i + 4) {
                if self.has(StripRules::EXPRESSION_TYPES) {
                    self.remove_tokens(i + 3, end - 1);
                }
                return end;
            }
        }
        i + 1
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    /// Strip a parameter list opening at `open`. Annotations are removed
    /// only when `rule` is enabled; default values are always walked.
    fn strip_params(&mut self, open: usize, rule: StripRules) -> Option<ParamList> {
        let close = self.closer(open)?;
        let strip = self.has(rule);
        let mut properties = Vec::new();
        let mut j = open + 1;

        while j < close {
            let mut is_property = false;
            while self.kind(j) == TokenKind::Identifier
                && MODIFIERS.contains(&self.tok(j).text)
                && matches!(
                    self.kind(j + 1),
                    TokenKind::Identifier | TokenKind::LeftBrace | TokenKind::LeftBracket
                )
            {
                if self.has(StripRules::EXPRESSION_TYPES) {
                    self.remove_until(j, j + 1);
                }
                is_property = true;
                j += 1;
            }

            if self.kind(j) == TokenKind::DotDotDot {
                j += 1;
            }
            match self.kind(j) {
                TokenKind::LeftBrace | TokenKind::LeftBracket => {
                    j = self.closer(j).map_or(j + 1, |c| c + 1);
                }
                TokenKind::Identifier | TokenKind::Keyword(Keyword::This) => {
                    if is_property {
                        properties.push(self.tok(j).text.to_string());
                    }
                    j += 1;
                }
                _ => {}
            }

            if self.kind(j) == TokenKind::Question
                && matches!(
                    self.kind(j + 1),
                    TokenKind::Colon | TokenKind::Comma | TokenKind::RightParen | TokenKind::Equals
                )
            {
                if strip {
                    self.remove_tokens(j, j);
                }
                j += 1;
            }

            if self.kind(j) == TokenKind::Colon {
                match self.skip_type(j + 1) {
                    Some(end) if end <= close => {
                        if strip {
                            self.remove_tokens(j, end - 1);
                        }
                        j = end;
                    }
                    _ => j += 1,
                }
            }

            if self.kind(j) == TokenKind::Equals {
                let end = self.expression_end(j + 1, close);
                self.walk(j + 1, end);
                j = end;
            }

            if self.kind(j) == TokenKind::Comma {
                j += 1;
            } else if j < close {
                j = self.expression_end(j, close);
                if self.kind(j) == TokenKind::Comma {
                    j += 1;
                }
            }
        }

        Some(ParamList { close, properties })
    }

    /// First depth-0 `,` at or after `from`, or `limit`
    fn expression_end(&self, from: usize, limit: usize) -> usize {
        let mut k = from;
        while k < limit {
            match self.kind(k) {
                TokenKind::Comma => return k,
                TokenKind::LeftParen
                | TokenKind::LeftBracket
                | TokenKind::LeftBrace
                | TokenKind::TemplateHead => {
                    k = self.closer(k).map_or(k + 1, |c| c + 1);
                }
                _ => k += 1,
            }
        }
        limit
    }

    /// `(a: T, b?: U): R =>` heads. Returns `None` when the parenthesis is
    /// not an arrow parameter list.
    fn strip_arrow_head(&mut self, i: usize) -> Option<usize> {
        let close = self.closer(i)?;
        match self.kind(close + 1) {
            TokenKind::Arrow => {
                self.strip_params(i, StripRules::ARROW_PARAM_TYPES);
                Some(close + 1)
            }
            TokenKind::Colon => {
                let end = self.skip_type(close + 2)?;
                if self.kind(end) != TokenKind::Arrow {
                    return None;
                }
                self.strip_params(i, StripRules::ARROW_PARAM_TYPES);
                if self.has(StripRules::RETURN_TYPES) {
                    self.remove_tokens(close + 1, end - 1);
                }
                Some(end)
            }
            _ => None,
        }
    }

    /// `fn<T>(...)` calls, `new Map<K, V>()` and `<T>(x: T) => x`
    fn strip_generic_call(&mut self, i: usize) -> Option<usize> {
        let end = self.angle_end(i)?;
        if self.kind(end) != TokenKind::LeftParen {
            return None;
        }
        let after_name = i > 0 && self.kind(i - 1) == TokenKind::Identifier;
        let expression_start = i == 0 || !self.kind(i - 1).ends_expression();
        if after_name {
            self.remove_tokens(i, end - 1);
            return Some(end);
        }
        if expression_start {
            let close = self.closer(end)?;
            if matches!(self.kind(close + 1), TokenKind::Arrow | TokenKind::Colon) {
                self.remove_tokens(i, end - 1);
                return Some(end);
            }
        }
        None
    }

    fn in_method_position(&self, i: usize) -> bool {
        if i == 0 {
            return false;
        }
        match self.kind(i - 1) {
            TokenKind::LeftBrace | TokenKind::Comma => true,
            TokenKind::Identifier => {
                matches!(self.tok(i - 1).text, "async" | "get" | "set")
                    && i >= 2
                    && matches!(self.kind(i - 2), TokenKind::LeftBrace | TokenKind::Comma)
            }
            _ => false,
        }
    }

    /// Object literal method `name<T>(params): R { ... }`. Returns the index
    /// of the body's opening brace.
    fn try_object_method(&mut self, i: usize) -> Option<usize> {
        let mut j = i + 1;
        let generics = if self.kind(j) == TokenKind::Less {
            let end = self.angle_end(j)?;
            let range = (j, end);
            j = end;
            Some(range)
        } else {
            None
        };
        if self.kind(j) != TokenKind::LeftParen {
            return None;
        }
        let close = self.closer(j)?;
        let mut k = close + 1;
        let return_type = if self.kind(k) == TokenKind::Colon {
            let end = self.skip_type(k + 1)?;
            let range = (k, end);
            k = end;
            Some(range)
        } else {
            None
        };
        if self.kind(k) != TokenKind::LeftBrace {
            return None;
        }

        if let Some((start, end)) = generics {
            if self.has(StripRules::GENERICS) {
                self.remove_tokens(start, end - 1);
            }
        }
        self.strip_params(j, StripRules::PARAM_TYPES);
        if let Some((start, end)) = return_type {
            if self.has(StripRules::RETURN_TYPES) {
                self.remove_tokens(start, end - 1);
            }
        }
        Some(k)
    }

    fn is_non_null_assertion(&self, i: usize) -> bool {
        if i == 0 || !self.same_line(i) {
            return false;
        }
        let prev = self.tok(i - 1);
        let attached = prev.end() == self.tok(i).location.offset;
        attached
            && matches!(
                prev.kind,
                TokenKind::Identifier
                    | TokenKind::PrivateName
                    | TokenKind::RightParen
                    | TokenKind::RightBracket
                    | TokenKind::Keyword(Keyword::This)
            )
    }

    // ------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------

    fn strip_class(&mut self, i: usize) -> usize {
        let mut j = i + 1;
        if self.kind(j) == TokenKind::Identifier && !self.is_word(j, "implements") {
            j += 1;
        }
        if self.kind(j) == TokenKind::Less {
            if let Some(end) = self.angle_end(j) {
                if self.has(StripRules::GENERICS) {
                    self.remove_tokens(j, end - 1);
                }
                j = end;
            }
        }
        if self.kind(j) == TokenKind::Keyword(Keyword::Extends) {
            j += 1;
            while j < self.tokens.len() - 1
                && self.kind(j) != TokenKind::LeftBrace
                && !self.is_word(j, "implements")
            {
                if self.kind(j) == TokenKind::Less {
                    if let Some(end) = self.angle_end(j) {
                        if self.has(StripRules::GENERICS) {
                            self.remove_tokens(j, end - 1);
                        }
                        j = end;
                        continue;
                    }
                }
                j = match self.kind(j) {
                    TokenKind::LeftParen | TokenKind::LeftBracket => {
                        self.closer(j).map_or(j + 1, |c| c + 1)
                    }
                    _ => j + 1,
                };
            }
        }
        if self.is_word(j, "implements") {
            let mut k = j;
            while k < self.tokens.len() - 1 && self.kind(k) != TokenKind::LeftBrace {
                k = match self.kind(k) {
                    TokenKind::Less => self.angle_end(k).unwrap_or(k + 1),
                    _ => k + 1,
                };
            }
            if self.has(StripRules::EXPRESSION_TYPES) {
                self.remove_until(j, k);
            }
            j = k;
        }
        if self.kind(j) == TokenKind::LeftBrace {
            return self.strip_class_body(j);
        }
        j
    }

    fn strip_class_body(&mut self, open: usize) -> usize {
        let Some(close) = self.closer(open) else {
            return open + 1;
        };
        let mut j = open + 1;
        while j < close {
            let next = self.strip_class_member(j, close);
            j = next.max(j + 1);
        }
        close + 1
    }

    fn begins_member_name(&self, k: usize) -> bool {
        matches!(
            self.kind(k),
            TokenKind::Identifier
                | TokenKind::Keyword(_)
                | TokenKind::StringLiteral
                | TokenKind::NumberLiteral
                | TokenKind::PrivateName
                | TokenKind::LeftBracket
                | TokenKind::Star
        )
    }

    fn strip_class_member(&mut self, start: usize, close: usize) -> usize {
        let expression_types = self.has(StripRules::EXPRESSION_TYPES);
        let mut j = start;
        if matches!(self.kind(j), TokenKind::Semicolon | TokenKind::At) {
            return j + 1;
        }

        // index signature `[key: string]: T;`
        if self.kind(j) == TokenKind::LeftBracket
            && self.kind(j + 1) == TokenKind::Identifier
            && self.kind(j + 2) == TokenKind::Colon
        {
            if let Some(bracket_close) = self.closer(j) {
                if self.kind(bracket_close + 1) == TokenKind::Colon {
                    if let Some(mut end) = self.skip_type(bracket_close + 2) {
                        if self.kind(end) == TokenKind::Semicolon {
                            end += 1;
                        }
                        if expression_types {
                            self.remove_tokens(j, end - 1);
                        }
                        return end;
                    }
                }
            }
        }

        while self.kind(j) == TokenKind::Identifier
            && MODIFIERS.contains(&self.tok(j).text)
            && self.begins_member_name(j + 1)
            && self.same_line(j + 1)
        {
            if expression_types {
                self.remove_until(j, j + 1);
            }
            j += 1;
        }
        while self.kind(j) == TokenKind::Identifier
            && matches!(self.tok(j).text, "static" | "async" | "get" | "set")
            && self.begins_member_name(j + 1)
            && self.same_line(j + 1)
        {
            j += 1;
        }
        if self.kind(j) == TokenKind::Star {
            j += 1;
        }

        let name = j;
        match self.kind(j) {
            TokenKind::LeftBracket => match self.closer(j) {
                Some(c) => j = c + 1,
                None => return j + 1,
            },
            TokenKind::Identifier
            | TokenKind::Keyword(_)
            | TokenKind::StringLiteral
            | TokenKind::NumberLiteral
            | TokenKind::PrivateName => j += 1,
            TokenKind::LeftBrace => {
                // static initialization block
                return match self.closer(j) {
                    Some(c) => {
                        self.walk(j + 1, c);
                        c + 1
                    }
                    None => j + 1,
                };
            }
            _ => return j + 1,
        }

        if matches!(self.kind(j), TokenKind::Question | TokenKind::Bang)
            && matches!(
                self.kind(j + 1),
                TokenKind::Colon
                    | TokenKind::LeftParen
                    | TokenKind::Semicolon
                    | TokenKind::Equals
                    | TokenKind::Less
            )
        {
            if expression_types {
                self.remove_tokens(j, j);
            }
            j += 1;
        }

        if self.kind(j) == TokenKind::Less {
            if let Some(end) = self.angle_end(j) {
                if self.kind(end) == TokenKind::LeftParen {
                    if self.has(StripRules::GENERICS) {
                        self.remove_tokens(j, end - 1);
                    }
                    j = end;
                }
            }
        }

        if self.kind(j) == TokenKind::LeftParen {
            let Some(params) = self.strip_params(j, StripRules::PARAM_TYPES) else {
                return j + 1;
            };
            let mut k = params.close + 1;
            if self.kind(k) == TokenKind::Colon {
                if let Some(end) = self.skip_type(k + 1) {
                    if self.has(StripRules::RETURN_TYPES) {
                        self.remove_tokens(k, end - 1);
                    }
                    k = end;
                }
            }
            if self.kind(k) == TokenKind::LeftBrace {
                let Some(body_close) = self.closer(k) else {
                    return k + 1;
                };
                if self.is_word(name, "constructor") && !params.properties.is_empty() {
                    let assignments: String = params
                        .properties
                        .iter()
                        .map(|p| format!(" this.{p} = {p};", p = p))
                        .collect();
                    self.insert_after(k, assignments);
                }
                self.walk(k + 1, body_close);
                return body_close + 1;
            }

            // overload or abstract signature
            let end = if self.kind(k) == TokenKind::Semicolon { k + 1 } else { k };
            if expression_types && end > start {
                self.remove_tokens(start, end - 1);
            }
            return end;
        }

        if self.kind(j) == TokenKind::Colon {
            if let Some(end) = self.skip_type(j + 1) {
                if expression_types {
                    self.remove_tokens(j, end - 1);
                }
                j = end;
            }
        }

        if self.kind(j) == TokenKind::Equals {
            let end = self.member_initializer_end(j + 1, close);
            self.walk(j + 1, end);
            j = end;
        }

        if self.kind(j) == TokenKind::Semicolon {
            j += 1;
        }
        j
    }

    fn member_initializer_end(&self, from: usize, close: usize) -> usize {
        let mut k = from;
        while k < close {
            if self.kind(k) == TokenKind::Semicolon {
                return k;
            }
            if k > from && self.is_member_boundary(k) {
                return k;
            }
            k = match self.kind(k) {
                TokenKind::LeftParen
                | TokenKind::LeftBracket
                | TokenKind::LeftBrace
                | TokenKind::TemplateHead => self.closer(k).map_or(k + 1, |c| c + 1),
                _ => k + 1,
            };
        }
        close
    }

    fn is_member_boundary(&self, k: usize) -> bool {
        self.tok(k).newline_before
            && self.kind(k - 1).ends_expression()
            && !matches!(
                self.kind(k),
                TokenKind::Keyword(Keyword::In | Keyword::Instanceof)
            )
            && matches!(
                self.kind(k),
                TokenKind::Identifier
                    | TokenKind::Keyword(_)
                    | TokenKind::StringLiteral
                    | TokenKind::NumberLiteral
                    | TokenKind::PrivateName
                    | TokenKind::Star
                    | TokenKind::At
            )
    }

    // ------------------------------------------------------------------
    // Type expressions
    // ------------------------------------------------------------------

    /// Index one past a `<...>` list starting at `i`, splitting `>>` and
    /// `>>>` as needed. `None` when the tokens cannot be a type list.
    fn angle_end(&self, i: usize) -> Option<usize> {
        let mut depth: i32 = 0;
        let mut j = i;
        loop {
            match self.kind(j) {
                TokenKind::Less => depth += 1,
                TokenKind::Greater => depth -= 1,
                TokenKind::GreaterGreater => depth -= 2,
                TokenKind::GreaterGreaterGreater => depth -= 3,
                TokenKind::LeftParen
                | TokenKind::LeftBracket
                | TokenKind::LeftBrace
                | TokenKind::TemplateHead => {
                    j = self.closer(j)?;
                }
                TokenKind::Identifier
                | TokenKind::Keyword(_)
                | TokenKind::Comma
                | TokenKind::Dot
                | TokenKind::Pipe
                | TokenKind::Ampersand
                | TokenKind::Arrow
                | TokenKind::Question
                | TokenKind::Colon
                | TokenKind::Equals
                | TokenKind::DotDotDot
                | TokenKind::Minus
                | TokenKind::StringLiteral
                | TokenKind::NumberLiteral
                | TokenKind::TemplateLiteral => {}
                _ => return None,
            }
            if depth < 0 {
                return None;
            }
            j += 1;
            if depth == 0 {
                return Some(j);
            }
        }
    }

    /// Index one past the type expression starting at `i`
    fn skip_type(&self, i: usize) -> Option<usize> {
        let mut j = i;
        if matches!(self.kind(j), TokenKind::Pipe | TokenKind::Ampersand) {
            j += 1;
        }
        loop {
            j = self.skip_type_operand(j)?;
            match self.kind(j) {
                TokenKind::Pipe | TokenKind::Ampersand => j += 1,
                TokenKind::Keyword(Keyword::Extends) if self.same_line(j) => {
                    // conditional type `A extends B ? C : D`
                    j = self.skip_type(j + 1)?;
                    if self.kind(j) != TokenKind::Question {
                        return None;
                    }
                    j = self.skip_type(j + 1)?;
                    if self.kind(j) != TokenKind::Colon {
                        return None;
                    }
                    return self.skip_type(j + 1);
                }
                _ => return Some(j),
            }
        }
    }

    fn skip_type_operand(&self, i: usize) -> Option<usize> {
        let token = self.tok(i);
        let mut j = match token.kind {
            TokenKind::Identifier
                if matches!(token.text, "keyof" | "unique" | "infer" | "readonly" | "asserts")
                    && self.begins_type(i + 1) =>
            {
                return self.skip_type_operand(i + 1);
            }
            TokenKind::Keyword(Keyword::Typeof) => {
                let mut j = i + 1;
                if !self.tok(j).is_identifier_name() {
                    return None;
                }
                j += 1;
                while self.kind(j) == TokenKind::Dot && self.tok(j + 1).is_identifier_name() {
                    j += 2;
                }
                j
            }
            TokenKind::Identifier
            | TokenKind::Keyword(
                Keyword::Void | Keyword::Null | Keyword::This | Keyword::True | Keyword::False,
            ) => {
                let mut j = i + 1;
                while self.kind(j) == TokenKind::Dot && self.tok(j + 1).is_identifier_name() {
                    j += 2;
                }
                if self.is_word(j, "is") && self.same_line(j) {
                    return self.skip_type(j + 1);
                }
                if self.kind(j) == TokenKind::Less {
                    j = self.angle_end(j)?;
                }
                j
            }
            TokenKind::Keyword(Keyword::New) => {
                let mut j = i + 1;
                if self.kind(j) == TokenKind::Less {
                    j = self.angle_end(j)?;
                }
                if self.kind(j) != TokenKind::LeftParen {
                    return None;
                }
                let close = self.closer(j)?;
                if self.kind(close + 1) != TokenKind::Arrow {
                    return None;
                }
                return self.skip_type(close + 2);
            }
            TokenKind::StringLiteral | TokenKind::NumberLiteral | TokenKind::TemplateLiteral => i + 1,
            TokenKind::Minus if self.kind(i + 1) == TokenKind::NumberLiteral => i + 2,
            TokenKind::TemplateHead => {
                let mut j = i;
                loop {
                    let c = self.closer(j)?;
                    if self.kind(c) == TokenKind::TemplateTail {
                        break c + 1;
                    }
                    j = c;
                }
            }
            TokenKind::LeftBrace | TokenKind::LeftBracket => self.closer(i)? + 1,
            TokenKind::LeftParen => {
                let close = self.closer(i)?;
                if self.kind(close + 1) == TokenKind::Arrow {
                    return self.skip_type(close + 2);
                }
                close + 1
            }
            TokenKind::Less => {
                // generic function type `<T>(x: T) => T`
                let k = self.angle_end(i)?;
                if self.kind(k) != TokenKind::LeftParen {
                    return None;
                }
                let close = self.closer(k)?;
                if self.kind(close + 1) != TokenKind::Arrow {
                    return None;
                }
                return self.skip_type(close + 2);
            }
            _ => return None,
        };

        // array types and indexed access
        while self.kind(j) == TokenKind::LeftBracket && self.same_line(j) {
            j = self.closer(j)? + 1;
        }
        Some(j)
    }

    fn begins_type(&self, k: usize) -> bool {
        matches!(
            self.kind(k),
            TokenKind::Identifier
                | TokenKind::Keyword(_)
                | TokenKind::LeftBrace
                | TokenKind::LeftBracket
                | TokenKind::LeftParen
                | TokenKind::StringLiteral
                | TokenKind::NumberLiteral
        )
    }
}

struct ParamList {
    close: usize,
    /// Parameters declared with an access modifier (`constructor(private x)`)
    properties: Vec<String>,
}

fn is_word_char(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

/// Pair every opening bracket with its closing token
fn match_brackets(tokens: &[Token<'_>]) -> Vec<Option<usize>> {
    let mut closer = vec![None; tokens.len()];
    let mut stack: Vec<usize> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LeftParen
            | TokenKind::LeftBracket
            | TokenKind::LeftBrace
            | TokenKind::TemplateHead => stack.push(i),
            TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                if let Some(open) = stack.pop() {
                    let pairs = matches!(
                        (tokens[open].kind, token.kind),
                        (TokenKind::LeftParen, TokenKind::RightParen)
                            | (TokenKind::LeftBracket, TokenKind::RightBracket)
                            | (TokenKind::LeftBrace, TokenKind::RightBrace)
                    );
                    if pairs {
                        closer[open] = Some(i);
                    } else {
                        // unbalanced source: leave the rest unmatched
                        stack.clear();
                    }
                }
            }
            TokenKind::TemplateMiddle => {
                if let Some(open) = stack.pop() {
                    closer[open] = Some(i);
                }
                stack.push(i);
            }
            TokenKind::TemplateTail => {
                if let Some(open) = stack.pop() {
                    closer[open] = Some(i);
                }
            }
            _ => {}
        }
    }
    closer
}
