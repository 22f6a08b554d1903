//! Lexer/tokenizer
//!
//! Produces tokens for JavaScript source and for the TypeScript surface
//! syntax the stripper has to see through. Type-only words (`interface`,
//! `type`, `as`, `readonly`, ...) come out as plain identifiers, and every
//! token keeps its byte span so callers can splice the original text.

mod token;

pub use token::{Keyword, Token, TokenKind};

use crate::error::{Error, Result, SourceLocation};

/// A lexer for JavaScript / TypeScript source code
pub struct Lexer<'src> {
    /// Source code being lexed
    source: &'src str,
    /// Source as bytes for faster access
    bytes: &'src [u8],
    /// Current position in bytes
    pos: usize,
    /// Current line number (1-indexed)
    line: u32,
    /// Current column number (1-indexed)
    column: u32,
    /// A line terminator was skipped since the last token
    saw_newline: bool,
    /// Kind of the last token produced, for regex/division disambiguation
    last_kind: Option<TokenKind>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            saw_newline: false,
            last_kind: None,
        }
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            offset: self.pos,
        }
    }

    fn error(&self, message: impl Into<String>, location: SourceLocation) -> Error {
        Error::lexer_error_with_context(message, location, self.source)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<char> {
        if self.is_eof() {
            None
        } else {
            self.source[self.pos..].chars().next()
        }
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.saw_newline = true;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        loop {
            while let Some(c) = self.peek() {
                if c.is_whitespace() || c == '\u{feff}' {
                    if c == '\u{2028}' || c == '\u{2029}' {
                        self.saw_newline = true;
                    }
                    self.advance();
                } else {
                    break;
                }
            }

            if self.peek() == Some('/') {
                if self.peek_next() == Some('/') {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                    continue;
                } else if self.peek_next() == Some('*') {
                    let start_loc = self.location();
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => return Err(self.error("Unterminated comment", start_loc)),
                            Some('*') if self.peek_next() == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                    continue;
                }
            }

            return Ok(());
        }
    }

    fn is_id_start(c: char) -> bool {
        c == '_' || c == '$' || unicode_xid::UnicodeXID::is_xid_start(c)
    }

    fn is_id_continue(c: char) -> bool {
        c == '_' || c == '$' || c == '\u{200c}' || c == '\u{200d}' || unicode_xid::UnicodeXID::is_xid_continue(c)
    }

    fn make(&self, kind: TokenKind, start: usize, location: SourceLocation) -> Token<'src> {
        Token {
            kind,
            text: &self.source[start..self.pos],
            location,
            newline_before: false,
        }
    }

    fn scan_identifier(&mut self) -> Token<'src> {
        let start = self.pos;
        let start_loc = self.location();

        while let Some(c) = self.peek() {
            if Self::is_id_continue(c) {
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.source[start..self.pos];
        let kind = match Keyword::lookup(text) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier,
        };
        self.make(kind, start, start_loc)
    }

    fn eat_digits(&mut self, accept: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if accept(c) || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_number(&mut self) -> Result<Token<'src>> {
        let start = self.pos;
        let start_loc = self.location();

        if self.peek() == Some('0') {
            let radix = match self.peek_next() {
                Some('x') | Some('X') => Some(16),
                Some('b') | Some('B') => Some(2),
                Some('o') | Some('O') => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                self.advance();
                self.eat_digits(|c| c.is_digit(radix));
                return Ok(self.finish_number(start, start_loc));
            }
        }

        self.eat_digits(|c| c.is_ascii_digit());

        if self.peek() == Some('.') {
            self.advance();
            self.eat_digits(|c| c.is_ascii_digit());
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            let after = self.peek_next();
            let signed = matches!(after, Some('+') | Some('-'));
            if signed || after.is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
                if signed {
                    self.advance();
                }
                self.eat_digits(|c| c.is_ascii_digit());
            }
        }

        Ok(self.finish_number(start, start_loc))
    }

    fn finish_number(&mut self, start: usize, start_loc: SourceLocation) -> Token<'src> {
        if self.peek() == Some('n') {
            self.advance();
            return self.make(TokenKind::BigIntLiteral, start, start_loc);
        }
        self.make(TokenKind::NumberLiteral, start, start_loc)
    }

    fn scan_string(&mut self, quote: char) -> Result<Token<'src>> {
        let start = self.pos;
        let start_loc = self.location();
        self.advance();

        loop {
            match self.peek() {
                None | Some('\n') | Some('\r') => {
                    return Err(self.error("Unterminated string literal", start_loc));
                }
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }

        Ok(self.make(TokenKind::StringLiteral, start, start_loc))
    }

    /// Scan template characters up to and including the closing backtick or
    /// the next `${`. Returns whether a substitution follows.
    fn scan_template_chars(&mut self, start_loc: SourceLocation) -> Result<bool> {
        loop {
            match self.peek() {
                None => return Err(self.error("Unterminated template literal", start_loc)),
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some('$') if self.peek_next() == Some('{') => {
                    self.advance();
                    self.advance();
                    return Ok(true);
                }
                Some('`') => {
                    self.advance();
                    return Ok(false);
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn scan_template(&mut self) -> Result<Token<'src>> {
        let start = self.pos;
        let start_loc = self.location();
        self.advance();

        let kind = if self.scan_template_chars(start_loc)? {
            TokenKind::TemplateHead
        } else {
            TokenKind::TemplateLiteral
        };
        Ok(self.make(kind, start, start_loc))
    }

    /// Continue a template literal after the `}` that closes a substitution.
    /// The returned token's text starts at that `}`.
    fn scan_template_continuation(&mut self, brace: &Token<'src>) -> Result<Token<'src>> {
        let start = brace.location.offset;
        let kind = if self.scan_template_chars(brace.location)? {
            TokenKind::TemplateMiddle
        } else {
            TokenKind::TemplateTail
        };
        Ok(Token {
            kind,
            text: &self.source[start..self.pos],
            location: brace.location,
            newline_before: brace.newline_before,
        })
    }

    fn scan_regex(&mut self) -> Result<Token<'src>> {
        let start = self.pos;
        let start_loc = self.location();
        self.advance();

        let mut in_class = false;
        loop {
            match self.peek() {
                None | Some('\n') | Some('\r') => {
                    return Err(self.error("Unterminated regular expression", start_loc));
                }
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some('[') => {
                    in_class = true;
                    self.advance();
                }
                Some(']') => {
                    in_class = false;
                    self.advance();
                }
                Some('/') if !in_class => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }

        while let Some(c) = self.peek() {
            if Self::is_id_continue(c) {
                self.advance();
            } else {
                break;
            }
        }

        Ok(self.make(TokenKind::RegexLiteral, start, start_loc))
    }

    fn regex_allowed(&self) -> bool {
        match self.last_kind {
            None => true,
            Some(kind) => !kind.ends_expression(),
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token<'src>> {
        self.saw_newline = false;
        self.skip_whitespace_and_comments()?;
        let newline_before = self.saw_newline;

        let mut token = self.scan_token()?;
        token.newline_before = newline_before;
        self.last_kind = Some(token.kind);
        Ok(token)
    }

    fn scan_token(&mut self) -> Result<Token<'src>> {
        let start_loc = self.location();
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(self.make(TokenKind::Eof, self.pos, start_loc)),
        };

        if Self::is_id_start(c) {
            return Ok(self.scan_identifier());
        }

        if c.is_ascii_digit() || (c == '.' && self.peek_next().is_some_and(|n| n.is_ascii_digit()))
        {
            return self.scan_number();
        }

        if c == '"' || c == '\'' {
            return self.scan_string(c);
        }

        if c == '`' {
            return self.scan_template();
        }

        if c == '/' && self.regex_allowed() {
            return self.scan_regex();
        }

        let start = self.pos;
        self.advance();

        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '~' => TokenKind::Tilde,
            '@' => TokenKind::At,
            '?' => {
                if self.peek() == Some('.') && self.peek_next().is_none_or(|c| !c.is_ascii_digit())
                {
                    self.advance();
                    TokenKind::QuestionDot
                } else if self.peek() == Some('?') {
                    self.advance();
                    self.with_equals(TokenKind::QuestionQuestion, TokenKind::QuestionQuestionEquals)
                } else {
                    TokenKind::Question
                }
            }
            '.' => {
                if self.peek() == Some('.') && self.peek_next() == Some('.') {
                    self.advance();
                    self.advance();
                    TokenKind::DotDotDot
                } else {
                    TokenKind::Dot
                }
            }
            '+' => {
                if self.peek() == Some('+') {
                    self.advance();
                    TokenKind::PlusPlus
                } else {
                    self.with_equals(TokenKind::Plus, TokenKind::PlusEquals)
                }
            }
            '-' => {
                if self.peek() == Some('-') {
                    self.advance();
                    TokenKind::MinusMinus
                } else {
                    self.with_equals(TokenKind::Minus, TokenKind::MinusEquals)
                }
            }
            '*' => {
                if self.peek() == Some('*') {
                    self.advance();
                    self.with_equals(TokenKind::StarStar, TokenKind::StarStarEquals)
                } else {
                    self.with_equals(TokenKind::Star, TokenKind::StarEquals)
                }
            }
            '/' => self.with_equals(TokenKind::Slash, TokenKind::SlashEquals),
            '%' => self.with_equals(TokenKind::Percent, TokenKind::PercentEquals),
            '^' => self.with_equals(TokenKind::Caret, TokenKind::CaretEquals),
            '<' => {
                if self.peek() == Some('<') {
                    self.advance();
                    self.with_equals(TokenKind::LessLess, TokenKind::LessLessEquals)
                } else {
                    self.with_equals(TokenKind::Less, TokenKind::LessEquals)
                }
            }
            '>' => {
                if self.peek() == Some('>') {
                    self.advance();
                    if self.peek() == Some('>') {
                        self.advance();
                        self.with_equals(
                            TokenKind::GreaterGreaterGreater,
                            TokenKind::GreaterGreaterGreaterEquals,
                        )
                    } else {
                        self.with_equals(TokenKind::GreaterGreater, TokenKind::GreaterGreaterEquals)
                    }
                } else {
                    self.with_equals(TokenKind::Greater, TokenKind::GreaterEquals)
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.with_equals(TokenKind::EqualsEquals, TokenKind::EqualsEqualsEquals)
                } else if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::Arrow
                } else {
                    TokenKind::Equals
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.with_equals(TokenKind::BangEquals, TokenKind::BangEqualsEquals)
                } else {
                    TokenKind::Bang
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    self.with_equals(
                        TokenKind::AmpersandAmpersand,
                        TokenKind::AmpersandAmpersandEquals,
                    )
                } else {
                    self.with_equals(TokenKind::Ampersand, TokenKind::AmpersandEquals)
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    self.with_equals(TokenKind::PipePipe, TokenKind::PipePipeEquals)
                } else {
                    self.with_equals(TokenKind::Pipe, TokenKind::PipeEquals)
                }
            }
            '#' => {
                if self.peek().is_some_and(Self::is_id_start) {
                    while let Some(c) = self.peek() {
                        if Self::is_id_continue(c) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    return Ok(self.make(TokenKind::PrivateName, start, start_loc));
                }
                return Err(self.error("Invalid private name", start_loc));
            }
            _ => {
                return Err(self.error(format!("Invalid or unexpected token '{}'", c), start_loc));
            }
        };

        Ok(self.make(kind, start, start_loc))
    }

    /// Consume a trailing `=` if present, choosing between the two kinds
    fn with_equals(&mut self, plain: TokenKind, assign: TokenKind) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            assign
        } else {
            plain
        }
    }

    /// Tokenize the entire source into a vector of tokens ending with `Eof`
    pub fn tokenize(&mut self) -> Result<Vec<Token<'src>>> {
        let mut tokens = Vec::new();
        // Open-brace depth inside each active template substitution
        let mut brace_depth_stack: Vec<u32> = Vec::new();

        loop {
            let token = self.next_token()?;
            match token.kind {
                TokenKind::Eof => {
                    tokens.push(token);
                    break;
                }
                TokenKind::TemplateHead => {
                    brace_depth_stack.push(0);
                    tokens.push(token);
                }
                TokenKind::LeftBrace if !brace_depth_stack.is_empty() => {
                    if let Some(depth) = brace_depth_stack.last_mut() {
                        *depth += 1;
                    }
                    tokens.push(token);
                }
                TokenKind::RightBrace if brace_depth_stack.last() == Some(&0) => {
                    let continuation = self.scan_template_continuation(&token)?;
                    if continuation.kind == TokenKind::TemplateTail {
                        brace_depth_stack.pop();
                    }
                    self.last_kind = Some(continuation.kind);
                    tokens.push(continuation);
                }
                TokenKind::RightBrace if !brace_depth_stack.is_empty() => {
                    if let Some(depth) = brace_depth_stack.last_mut() {
                        *depth -= 1;
                    }
                    tokens.push(token);
                }
                _ => tokens.push(token),
            }
        }
        Ok(tokens)
    }
}

/// Convenience wrapper: tokenize a whole source blob
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>> {
    Lexer::new(source).tokenize()
}

/// Decode the escape sequences of a string literal body (quotes removed)
/// or a template chunk. Errors carry a human readable reason.
pub fn cook_string(raw: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            if c == '\r' {
                // template literals normalize CRLF and CR to LF
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            } else {
                out.push(c);
            }
            continue;
        }

        let escaped = chars.next().ok_or("Invalid escape at end of literal")?;
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000c}'),
            'v' => out.push('\u{000b}'),
            '0' if !chars.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| "Invalid hexadecimal escape sequence".to_string())?;
                out.push(char::from_u32(code).ok_or("Invalid hexadecimal escape sequence")?);
            }
            'u' => {
                let code = if chars.peek() == Some(&'{') {
                    chars.next();
                    let mut hex = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(h) => hex.push(h),
                            None => return Err("Invalid Unicode escape sequence".into()),
                        }
                    }
                    u32::from_str_radix(&hex, 16)
                        .map_err(|_| "Invalid Unicode escape sequence".to_string())?
                } else {
                    let hex: String = chars.by_ref().take(4).collect();
                    let unit = u32::from_str_radix(&hex, 16)
                        .map_err(|_| "Invalid Unicode escape sequence".to_string())?;
                    // join surrogate pairs written as two \u escapes
                    if (0xD800..0xDC00).contains(&unit) {
                        let mut lookahead = chars.clone();
                        if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
                            let low_hex: String = lookahead.by_ref().take(4).collect();
                            if let Ok(low) = u32::from_str_radix(&low_hex, 16) {
                                if (0xDC00..0xE000).contains(&low) {
                                    chars = lookahead;
                                    out.push(
                                        char::from_u32(
                                            0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00),
                                        )
                                        .unwrap_or('\u{fffd}'),
                                    );
                                    continue;
                                }
                            }
                        }
                    }
                    unit
                };
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }
    }

    Ok(out)
}
