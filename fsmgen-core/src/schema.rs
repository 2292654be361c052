//! Strict token access helpers for the loader.
//!
//! Every object is read through an [`ObjectReader`], which remembers the
//! members taken so far. `finish` rejects whatever was left over, so unknown
//! keys never slip through.

use crate::error::{ParseError, ParseErrorKind};
use fsmgen_token::{Member, Token, TokenType};
use std::collections::HashSet;

/// Builds an error located at `token`.
pub(crate) fn error_at(token: &Token, kind: ParseErrorKind) -> ParseError {
    ParseError::new(kind, token.path.clone(), token.span)
}

/// Builds an error located at the key of `member`.
pub(crate) fn error_at_key(member: &Member, kind: ParseErrorKind) -> ParseError {
    ParseError::new(
        kind,
        member.value.path.clone(),
        member.key_span.or(member.value.span),
    )
}

pub(crate) fn unexpected_type(token: &Token, name: &str, expected: &str) -> ParseError {
    error_at(
        token,
        ParseErrorKind::UnexpectedType {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: token.token_type(),
        },
    )
}

pub(crate) fn expect_type(
    token: &Token,
    name: &str,
    expected: TokenType,
) -> Result<(), ParseError> {
    if token.token_type() != expected {
        return Err(unexpected_type(token, name, &expected.to_string()));
    }
    Ok(())
}

pub(crate) fn as_str<'a>(token: &'a Token, name: &str) -> Result<&'a str, ParseError> {
    token
        .as_str()
        .ok_or_else(|| unexpected_type(token, name, "String"))
}

pub(crate) fn as_members<'a>(token: &'a Token, name: &str) -> Result<&'a [Member], ParseError> {
    token
        .as_object()
        .ok_or_else(|| unexpected_type(token, name, "Object"))
}

/// Strict reader over the members of one object token.
pub(crate) struct ObjectReader<'a> {
    token: &'a Token,
    members: &'a [Member],
    handled: HashSet<&'a str>,
}

impl<'a> ObjectReader<'a> {
    pub(crate) fn new(token: &'a Token, name: &str) -> Result<Self, ParseError> {
        Ok(Self {
            token,
            members: as_members(token, name)?,
            handled: HashSet::new(),
        })
    }

    /// Takes a member, marking it handled.
    pub(crate) fn take(&mut self, key: &str) -> Option<&'a Token> {
        let member = self.members.iter().find(|m| m.key == key)?;
        let first = self.handled.insert(member.key.as_str());
        debug_assert!(first, "token '{}' taken twice", key);
        Some(&member.value)
    }

    pub(crate) fn required(&mut self, key: &str) -> Result<&'a Token, ParseError> {
        self.take(key).ok_or_else(|| {
            error_at(
                self.token,
                ParseErrorKind::MissingField {
                    name: key.to_string(),
                },
            )
        })
    }

    pub(crate) fn object(&mut self, key: &str) -> Result<Option<&'a Token>, ParseError> {
        match self.take(key) {
            Some(token) => {
                expect_type(token, key, TokenType::Object)?;
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn required_object(&mut self, key: &str) -> Result<&'a Token, ParseError> {
        let token = self.required(key)?;
        expect_type(token, key, TokenType::Object)?;
        Ok(token)
    }

    pub(crate) fn array(&mut self, key: &str) -> Result<Option<&'a [Token]>, ParseError> {
        match self.take(key) {
            Some(token) => token
                .as_array()
                .map(Some)
                .ok_or_else(|| unexpected_type(token, key, "Array")),
            None => Ok(None),
        }
    }

    /// Optional string; `null` counts as absent.
    pub(crate) fn string(&mut self, key: &str) -> Result<Option<(&'a str, &'a Token)>, ParseError> {
        match self.take(key) {
            Some(token) if token.is_null() => Ok(None),
            Some(token) => Ok(Some((as_str(token, key)?, token))),
            None => Ok(None),
        }
    }

    pub(crate) fn required_string(
        &mut self,
        key: &str,
    ) -> Result<(&'a str, &'a Token), ParseError> {
        let token = self.required(key)?;
        if token.is_null() {
            return Err(error_at(
                token,
                ParseErrorKind::NullField {
                    name: key.to_string(),
                },
            ));
        }
        Ok((as_str(token, key)?, token))
    }

    pub(crate) fn bool_or(&mut self, key: &str, default: bool) -> Result<bool, ParseError> {
        match self.take(key) {
            Some(token) => token
                .as_bool()
                .ok_or_else(|| unexpected_type(token, key, "Boolean")),
            None => Ok(default),
        }
    }

    /// Optional number; `null` counts as absent.
    pub(crate) fn number(&mut self, key: &str) -> Result<Option<(f64, &'a Token)>, ParseError> {
        match self.take(key) {
            Some(token) if token.is_null() => Ok(None),
            Some(token) => token
                .as_f64()
                .map(|n| Some((n, token)))
                .ok_or_else(|| unexpected_type(token, key, "Number")),
            None => Ok(None),
        }
    }

    /// Fails on the first member that was never taken.
    pub(crate) fn finish(self) -> Result<(), ParseError> {
        match self
            .members
            .iter()
            .find(|m| !self.handled.contains(m.key.as_str()))
        {
            Some(member) => Err(error_at_key(
                member,
                ParseErrorKind::UnusedField {
                    name: member.key.clone(),
                },
            )),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reader_takes_and_finishes() {
        let token = Token::from_value(&json!({"a": "x", "b": true, "c": 1.5, "d": null}));
        let mut reader = ObjectReader::new(&token, "root").unwrap();

        assert_eq!(reader.required_string("a").unwrap().0, "x");
        assert!(reader.bool_or("b", false).unwrap());
        assert_eq!(reader.number("c").unwrap().map(|(n, _)| n), Some(1.5));
        assert_eq!(reader.string("d").unwrap(), None);
        assert!(!reader.bool_or("missing", false).unwrap());
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn test_reader_rejects_leftovers() {
        let token = Token::from_value(&json!({"known": 1, "extra": 2}));
        let mut reader = ObjectReader::new(&token, "root").unwrap();
        reader.take("known");

        let err = reader.finish().unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UnusedField {
                name: "extra".to_string(),
            }
        );
        assert_eq!(err.path, "extra");
    }

    #[test]
    fn test_reader_type_errors() {
        let token = Token::from_value(&json!({"flag": "yes", "name": null, "obj": []}));
        let mut reader = ObjectReader::new(&token, "root").unwrap();

        let err = reader.bool_or("flag", false).unwrap_err();
        assert!(matches!(
            err.kind,
            ParseErrorKind::UnexpectedType {
                actual: TokenType::String,
                ..
            }
        ));

        let err = reader.required_string("name").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::NullField { .. }));

        let err = reader.object("obj").unwrap_err();
        assert_eq!(
            err.to_string(),
            "token 'obj' should be Object, but it is Array, path: obj"
        );

        let err = reader.required("absent").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MissingField { .. }));
    }

    #[test]
    fn test_reader_requires_object() {
        let token = Token::from_value(&json!([1, 2]));
        assert!(ObjectReader::new(&token, "root").is_err());
    }
}
