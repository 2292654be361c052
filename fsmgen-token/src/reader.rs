//! Located JSON reader.
//!
//! A small recursive descent reader that turns source text into a token tree
//! while tracking line and column of every token. It accepts:
//!
//! - standard JSON values (objects, arrays, strings, numbers, literals)
//! - `// line` and `/* block */` comments, when enabled
//!
//! Duplicate keys within one object are rejected. String unescaping and
//! number conversion are delegated to `serde_json`.

use crate::error::ReadError;
use crate::token::{child_path, index_path, Member, Span, Token, TokenValue};
use std::collections::HashSet;

/// Default bound on container nesting.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Reader options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Skip `//` and `/* */` comments.
    pub allow_comments: bool,
    /// Maximum nesting of arrays and objects.
    pub max_depth: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            allow_comments: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Reads a whole document into a token tree.
pub fn read_str(input: &str, options: &ReaderOptions) -> Result<Token, ReadError> {
    let mut reader = Reader::new(input, options);
    reader.skip_trivia()?;
    let token = reader.parse_value(String::new(), 0)?;
    reader.skip_trivia()?;
    if reader.peek_char().is_some() {
        return Err(ReadError::TrailingCharacters {
            line: reader.line,
            column: reader.column,
        });
    }
    Ok(token)
}

struct Reader<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    options: &'a ReaderOptions,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str, options: &'a ReaderOptions) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
            options,
        }
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn eof(&self) -> ReadError {
        ReadError::UnexpectedEof {
            line: self.line,
            column: self.column,
        }
    }

    fn unexpected(&self, found: char, expected: &'static str) -> ReadError {
        ReadError::UnexpectedChar {
            found,
            expected,
            line: self.line,
            column: self.column,
        }
    }

    fn parse_value(&mut self, path: String, depth: usize) -> Result<Token, ReadError> {
        let span = self.span();
        match self.peek_char() {
            None => Err(self.eof()),
            Some('{') => self.parse_object(path, span, depth),
            Some('[') => self.parse_array(path, span, depth),
            Some('"') => {
                let s = self.parse_string()?;
                Ok(Token::new(TokenValue::String(s), path, Some(span)))
            }
            Some('t') => self.parse_literal("true", TokenValue::Bool(true), path),
            Some('f') => self.parse_literal("false", TokenValue::Bool(false), path),
            Some('n') => self.parse_literal("null", TokenValue::Null, path),
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_number(path),
            Some(c) => Err(self.unexpected(c, "a value")),
        }
    }

    fn enter(&self, depth: usize) -> Result<(), ReadError> {
        if depth >= self.options.max_depth {
            return Err(ReadError::DepthLimitExceeded {
                limit: self.options.max_depth,
                line: self.line,
                column: self.column,
            });
        }
        Ok(())
    }

    fn parse_object(&mut self, path: String, span: Span, depth: usize) -> Result<Token, ReadError> {
        self.enter(depth)?;
        self.bump(); // '{'

        let mut members = Vec::new();
        let mut seen = HashSet::new();

        self.skip_trivia()?;
        if self.peek_char() == Some('}') {
            self.bump();
            return Ok(Token::new(TokenValue::Object(members), path, Some(span)));
        }

        loop {
            self.skip_trivia()?;
            let key_span = self.span();
            match self.peek_char() {
                Some('"') => {}
                Some(c) => return Err(self.unexpected(c, "a string key")),
                None => return Err(self.eof()),
            }
            let key = self.parse_string()?;
            if !seen.insert(key.clone()) {
                return Err(ReadError::DuplicateKey {
                    key,
                    line: key_span.line,
                    column: key_span.column,
                });
            }

            self.skip_trivia()?;
            self.expect(':', "':'")?;
            self.skip_trivia()?;

            let value = self.parse_value(child_path(&path, &key), depth + 1)?;
            members.push(Member {
                key,
                key_span: Some(key_span),
                value,
            });

            self.skip_trivia()?;
            match self.peek_char() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {
                    self.bump();
                    break;
                }
                Some(c) => return Err(self.unexpected(c, "',' or '}'")),
                None => return Err(self.eof()),
            }
        }

        Ok(Token::new(TokenValue::Object(members), path, Some(span)))
    }

    fn parse_array(&mut self, path: String, span: Span, depth: usize) -> Result<Token, ReadError> {
        self.enter(depth)?;
        self.bump(); // '['

        let mut items = Vec::new();

        self.skip_trivia()?;
        if self.peek_char() == Some(']') {
            self.bump();
            return Ok(Token::new(TokenValue::Array(items), path, Some(span)));
        }

        loop {
            self.skip_trivia()?;
            let item = self.parse_value(index_path(&path, items.len()), depth + 1)?;
            items.push(item);

            self.skip_trivia()?;
            match self.peek_char() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {
                    self.bump();
                    break;
                }
                Some(c) => return Err(self.unexpected(c, "',' or ']'")),
                None => return Err(self.eof()),
            }
        }

        Ok(Token::new(TokenValue::Array(items), path, Some(span)))
    }

    fn parse_string(&mut self) -> Result<String, ReadError> {
        let span = self.span();
        let start = self.pos;
        self.bump(); // opening quote

        loop {
            match self.bump() {
                None => return Err(self.eof()),
                Some('"') => break,
                Some('\\') => {
                    if self.bump().is_none() {
                        return Err(self.eof());
                    }
                }
                Some(_) => {}
            }
        }

        let raw = &self.input[start..self.pos];
        serde_json::from_str::<String>(raw).map_err(|e| ReadError::InvalidString {
            reason: e.to_string(),
            line: span.line,
            column: span.column,
        })
    }

    fn parse_number(&mut self, path: String) -> Result<Token, ReadError> {
        let span = self.span();
        let start = self.pos;

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                self.bump();
            } else {
                break;
            }
        }

        let text = &self.input[start..self.pos];
        let number = serde_json::from_str::<f64>(text).map_err(|_| ReadError::InvalidNumber {
            text: text.to_string(),
            line: span.line,
            column: span.column,
        })?;

        Ok(Token::new(TokenValue::Number(number), path, Some(span)))
    }

    fn parse_literal(
        &mut self,
        word: &str,
        value: TokenValue,
        path: String,
    ) -> Result<Token, ReadError> {
        let span = self.span();
        if !self.input[self.pos..].starts_with(word) {
            return Err(ReadError::InvalidLiteral {
                line: span.line,
                column: span.column,
            });
        }
        for _ in word.chars() {
            self.bump();
        }
        if matches!(self.peek_char(), Some(c) if c.is_alphanumeric() || c == '_') {
            return Err(ReadError::InvalidLiteral {
                line: span.line,
                column: span.column,
            });
        }
        Ok(Token::new(value, path, Some(span)))
    }

    fn expect(&mut self, ch: char, expected: &'static str) -> Result<(), ReadError> {
        match self.peek_char() {
            Some(c) if c == ch => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.unexpected(c, expected)),
            None => Err(self.eof()),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ReadError> {
        loop {
            match self.peek_char() {
                Some(' ' | '\t' | '\n' | '\r') => {
                    self.bump();
                }
                Some('/') if self.options.allow_comments => self.skip_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn skip_comment(&mut self) -> Result<(), ReadError> {
        self.bump(); // '/'
        match self.peek_char() {
            Some('/') => {
                while let Some(c) = self.peek_char() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
                Ok(())
            }
            Some('*') => {
                self.bump();
                loop {
                    match self.bump() {
                        None => return Err(self.eof()),
                        Some('*') if self.peek_char() == Some('/') => {
                            self.bump();
                            return Ok(());
                        }
                        Some(_) => {}
                    }
                }
            }
            Some(c) => Err(self.unexpected(c, "'/' or '*'")),
            None => Err(self.eof()),
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}
