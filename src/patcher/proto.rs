//! Minimal protobuf schema reader.
//!
//! Only the top level of a file is understood: `syntax`/`edition`,
//! `package`, `import` and `option` statements are parsed, while message,
//! enum, service and extend bodies are skipped by brace matching. That is
//! enough to locate the two statements the go_package patcher cares about
//! and to reject content that is not a schema file at all.

use crate::error::PatchError;

/// Where a statement sits in the source: 1-based inclusive lines, and the
/// byte range from its keyword through the terminating `;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
    pub start: usize,
    pub end: usize,
}

impl Span {
    fn between(first: &Token, last: &Token) -> Self {
        Self {
            start_line: first.line,
            end_line: last.line,
            start: first.start,
            end: last.end,
        }
    }

    pub fn lines(&self) -> (usize, usize) {
        (self.start_line, self.end_line)
    }
}

/// Locations of the statements a patcher may rewrite.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProtoOutline {
    pub syntax: Option<Span>,
    pub package: Option<String>,
    /// Top-level file options keyed by name, in declaration order.
    pub options: Vec<(String, Span)>,
}

impl ProtoOutline {
    pub fn option(&self, name: &str) -> Option<Span> {
        self.options
            .iter()
            .find(|(option, _)| option == name)
            .map(|(_, span)| *span)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    Ident,
    Number,
    Str,
    Symbol(char),
}

#[derive(Debug, Clone)]
struct Token {
    kind: Kind,
    text: String,
    line: usize,
    start: usize,
    end: usize,
}

pub fn parse(content: &str) -> Result<ProtoOutline, PatchError> {
    let tokens = tokenize(content)?;
    Parser {
        tokens,
        pos: 0,
        outline: ProtoOutline::default(),
    }
    .parse_file()
}

fn syntax_error(line: usize, message: impl Into<String>) -> PatchError {
    PatchError::Syntax {
        line,
        message: message.into(),
    }
}

fn tokenize(content: &str) -> Result<Vec<Token>, PatchError> {
    let mut tokens = Vec::new();
    let mut chars = content.char_indices().peekable();
    let mut line = 1;

    while let Some((start, c)) = chars.next() {
        let kind = match c {
            '\u{feff}' if start == 0 => continue,
            '\n' => {
                line += 1;
                continue;
            }
            c if c.is_whitespace() => continue,
            '/' if matches!(chars.peek(), Some((_, '/'))) => {
                for (_, next) in chars.by_ref() {
                    if next == '\n' {
                        line += 1;
                        break;
                    }
                }
                continue;
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                let opened = line;
                chars.next();
                let mut prev = '\0';
                let mut closed = false;
                for (_, next) in chars.by_ref() {
                    if next == '\n' {
                        line += 1;
                    }
                    if prev == '*' && next == '/' {
                        closed = true;
                        break;
                    }
                    prev = next;
                }
                if !closed {
                    return Err(syntax_error(opened, "unterminated block comment"));
                }
                continue;
            }
            '"' | '\'' => {
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, next)) = chars.next() {
                    match next {
                        '\\' => {
                            text.push(next);
                            if let Some((_, escaped)) = chars.next() {
                                text.push(escaped);
                            }
                        }
                        '\n' => break,
                        q if q == c => {
                            closed = true;
                            break;
                        }
                        other => text.push(other),
                    }
                }
                if !closed {
                    return Err(syntax_error(line, "unterminated string literal"));
                }
                let end = chars.peek().map_or(content.len(), |&(i, _)| i);
                tokens.push(Token {
                    kind: Kind::Str,
                    text,
                    line,
                    start,
                    end,
                });
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while chars
                    .peek()
                    .is_some_and(|&(_, next)| next.is_ascii_alphanumeric() || next == '_')
                {
                    chars.next();
                }
                Kind::Ident
            }
            c if c.is_ascii_digit() => {
                while let Some(&(i, next)) = chars.peek() {
                    let exponent_sign = (next == '-' || next == '+')
                        && content[start..i].ends_with(['e', 'E']);
                    if next.is_ascii_alphanumeric() || next == '.' || exponent_sign {
                        chars.next();
                    } else {
                        break;
                    }
                }
                Kind::Number
            }
            '{' | '}' | '(' | ')' | '[' | ']' | '<' | '>' | ';' | '=' | ',' | '.' | ':' | '-'
            | '+' => Kind::Symbol(c),
            other => {
                return Err(syntax_error(line, format!("unexpected character '{}'", other)));
            }
        };

        let end = chars.peek().map_or(content.len(), |&(i, _)| i);
        tokens.push(Token {
            kind,
            text: content[start..end].to_string(),
            line,
            start,
            end,
        });
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    outline: ProtoOutline,
}

impl Parser {
    fn parse_file(mut self) -> Result<ProtoOutline, PatchError> {
        while let Some(token) = self.next() {
            match (&token.kind, token.text.as_str()) {
                (Kind::Symbol(';'), _) => {}
                (Kind::Ident, "syntax" | "edition") => {
                    self.expect_symbol('=')?;
                    self.expect_string()?;
                    let end = self.expect_symbol(';')?;
                    if self.outline.syntax.is_some() {
                        return Err(syntax_error(token.line, "duplicate syntax declaration"));
                    }
                    self.outline.syntax = Some(Span::between(&token, &end));
                }
                (Kind::Ident, "package") => {
                    let name = self.full_ident()?;
                    self.expect_symbol(';')?;
                    self.outline.package = Some(name);
                }
                (Kind::Ident, "import") => {
                    if self.peek_ident("public") || self.peek_ident("weak") {
                        self.next();
                    }
                    self.expect_string()?;
                    self.expect_symbol(';')?;
                }
                (Kind::Ident, "option") => {
                    let name = self.option_name()?;
                    self.expect_symbol('=')?;
                    self.constant()?;
                    let end = self.expect_symbol(';')?;
                    self.outline
                        .options
                        .push((name, Span::between(&token, &end)));
                }
                (Kind::Ident, "message" | "enum" | "service" | "extend") => {
                    self.skip_block(token.line)?;
                }
                _ => {
                    return Err(syntax_error(
                        token.line,
                        format!("unexpected '{}' at top level", token.text),
                    ));
                }
            }
        }

        Ok(self.outline)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_ident(&self, text: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == Kind::Ident && t.text == text)
    }

    fn peek_symbol(&self, symbol: char) -> bool {
        self.peek().is_some_and(|t| t.kind == Kind::Symbol(symbol))
    }

    fn last_line(&self) -> usize {
        self.tokens.last().map_or(1, |t| t.line)
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<Token, PatchError> {
        match self.next() {
            Some(token) if token.kind == Kind::Symbol(symbol) => Ok(token),
            Some(token) => Err(syntax_error(
                token.line,
                format!("expected '{}', found '{}'", symbol, token.text),
            )),
            None => Err(syntax_error(
                self.last_line(),
                format!("expected '{}', found end of file", symbol),
            )),
        }
    }

    fn expect_string(&mut self) -> Result<String, PatchError> {
        match self.next() {
            Some(Token {
                kind: Kind::Str,
                text,
                ..
            }) => Ok(text),
            Some(token) => Err(syntax_error(
                token.line,
                format!("expected string literal, found '{}'", token.text),
            )),
            None => Err(syntax_error(
                self.last_line(),
                "expected string literal, found end of file",
            )),
        }
    }

    fn expect_ident(&mut self) -> Result<String, PatchError> {
        match self.next() {
            Some(Token {
                kind: Kind::Ident,
                text,
                ..
            }) => Ok(text),
            Some(token) => Err(syntax_error(
                token.line,
                format!("expected identifier, found '{}'", token.text),
            )),
            None => Err(syntax_error(
                self.last_line(),
                "expected identifier, found end of file",
            )),
        }
    }

    fn full_ident(&mut self) -> Result<String, PatchError> {
        let mut name = self.expect_ident()?;
        while self.peek_symbol('.') {
            self.next();
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok(name)
    }

    /// `go_package`, `(my.ext)` or `(my.ext).field`.
    fn option_name(&mut self) -> Result<String, PatchError> {
        let mut name = if self.peek_symbol('(') {
            self.next();
            let inner = if self.peek_symbol('.') {
                self.next();
                format!(".{}", self.full_ident()?)
            } else {
                self.full_ident()?
            };
            self.expect_symbol(')')?;
            format!("({})", inner)
        } else {
            self.expect_ident()?
        };

        while self.peek_symbol('.') {
            self.next();
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok(name)
    }

    fn constant(&mut self) -> Result<(), PatchError> {
        let Some(token) = self.next() else {
            return Err(syntax_error(
                self.last_line(),
                "expected option value, found end of file",
            ));
        };

        match token.kind {
            Kind::Str => {
                while self.peek().is_some_and(|t| t.kind == Kind::Str) {
                    self.next();
                }
                Ok(())
            }
            Kind::Ident => {
                while self.peek_symbol('.') {
                    self.next();
                    self.expect_ident()?;
                }
                Ok(())
            }
            Kind::Number => Ok(()),
            Kind::Symbol('-' | '+') => match self.next() {
                Some(t) if matches!(t.kind, Kind::Number | Kind::Ident) => Ok(()),
                _ => Err(syntax_error(token.line, "expected number after sign")),
            },
            Kind::Symbol('{') => self.skip_until_close(token.line),
            _ => Err(syntax_error(
                token.line,
                format!("unexpected option value '{}'", token.text),
            )),
        }
    }

    /// Consume a definition header and its `{ ... }` body.
    fn skip_block(&mut self, start: usize) -> Result<(), PatchError> {
        loop {
            match self.next() {
                Some(t) if t.kind == Kind::Symbol('{') => return self.skip_until_close(start),
                Some(t) if t.kind == Kind::Symbol(';') || t.kind == Kind::Symbol('}') => {
                    return Err(syntax_error(
                        t.line,
                        format!("unexpected '{}' before definition body", t.text),
                    ));
                }
                Some(_) => {}
                None => return Err(syntax_error(start, "definition has no body")),
            }
        }
    }

    /// Called just after an opening `{`; consumes through its matching `}`.
    fn skip_until_close(&mut self, start: usize) -> Result<(), PatchError> {
        let mut depth = 1usize;
        while let Some(token) = self.next() {
            match token.kind {
                Kind::Symbol('{') => depth += 1,
                Kind::Symbol('}') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(syntax_error(start, "unbalanced braces"))
    }
}
