use smol_str::SmolStr;
use thiserror::Error;

use crate::{lexer::token::Token, range::Range};

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token `{}`", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    UnexpectedToken(Token),
    #[error("Unexpected EOF detected")]
    UnexpectedEOFDetected(Token),
    #[error("Missing argument before `{}`", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    InsufficientTokens(Token),
    #[error("Expected a closing parenthesis `)` but got `{}` delimiter", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    ExpectedClosingParen(Token),
    #[error("Operator `{0}` cannot follow a different operator without parentheses")]
    MixedOperators(Token),
    #[error("Unknown variable `${1}`")]
    UnknownVariable(Token, SmolStr),
    #[error("\"{1}\" is not defined")]
    UndefinedFunction(Token, SmolStr),
    #[error("Invalid number of arguments in \"{name}\", expected {expected}, got {got}")]
    ArityMismatch {
        token: Token,
        name: SmolStr,
        expected: u8,
        got: usize,
    },
}

impl ParseError {
    #[cold]
    pub fn token(&self) -> &Token {
        match self {
            ParseError::UnexpectedToken(token) => token,
            ParseError::UnexpectedEOFDetected(token) => token,
            ParseError::InsufficientTokens(token) => token,
            ParseError::ExpectedClosingParen(token) => token,
            ParseError::MixedOperators(token) => token,
            ParseError::UnknownVariable(token, _) => token,
            ParseError::UndefinedFunction(token, _) => token,
            ParseError::ArityMismatch { token, .. } => token,
        }
    }

    pub fn range(&self) -> Range {
        self.token().range
    }
}
