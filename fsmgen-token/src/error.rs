//! Reader error types.

use crate::token::Span;
use thiserror::Error;

/// Syntax errors raised while reading a document into a token tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("unexpected end of input; line: {line}, pos: {column}")]
    UnexpectedEof { line: usize, column: usize },

    #[error(
        "unexpected character '{found}', expected {expected}; line: {line}, pos: {column}"
    )]
    UnexpectedChar {
        found: char,
        expected: &'static str,
        line: usize,
        column: usize,
    },

    #[error("invalid literal; line: {line}, pos: {column}")]
    InvalidLiteral { line: usize, column: usize },

    #[error("invalid string: {reason}; line: {line}, pos: {column}")]
    InvalidString {
        reason: String,
        line: usize,
        column: usize,
    },

    #[error("invalid number '{text}'; line: {line}, pos: {column}")]
    InvalidNumber {
        text: String,
        line: usize,
        column: usize,
    },

    #[error("duplicate key '{key}'; line: {line}, pos: {column}")]
    DuplicateKey {
        key: String,
        line: usize,
        column: usize,
    },

    #[error("trailing characters after document; line: {line}, pos: {column}")]
    TrailingCharacters { line: usize, column: usize },

    #[error("nesting depth exceeds {limit}; line: {line}, pos: {column}")]
    DepthLimitExceeded {
        limit: usize,
        line: usize,
        column: usize,
    },
}

impl ReadError {
    /// Returns the source position the error points at.
    pub fn span(&self) -> Span {
        match self {
            ReadError::UnexpectedEof { line, column }
            | ReadError::UnexpectedChar { line, column, .. }
            | ReadError::InvalidLiteral { line, column }
            | ReadError::InvalidString { line, column, .. }
            | ReadError::InvalidNumber { line, column, .. }
            | ReadError::DuplicateKey { line, column, .. }
            | ReadError::TrailingCharacters { line, column }
            | ReadError::DepthLimitExceeded { line, column, .. } => Span::new(*line, *column),
        }
    }
}
