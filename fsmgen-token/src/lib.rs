//! # fsmgen-token
//!
//! Token tree for fsmgen state machine specifications.
//!
//! This crate provides:
//! - A JSON-like token tree where every token knows its path and source position
//! - A located JSON reader (line/column tracking, optional comments,
//!   duplicate key rejection)
//! - Conversion from an already parsed `serde_json::Value`

pub mod error;
pub mod reader;
pub mod token;

pub use error::ReadError;
pub use reader::{read_str, ReaderOptions, DEFAULT_MAX_DEPTH};
pub use token::{Member, Span, Token, TokenType, TokenValue};
