use thiserror::Error;

use crate::range::Range;

#[derive(Error, Debug, PartialEq)]
pub enum LexerError {
    #[error("Unexpected character `{0}`")]
    UnexpectedCharacter(char, Range),
    #[error("Unterminated or malformed string literal")]
    InvalidStringLiteral(Range),
}

impl LexerError {
    #[cold]
    pub fn range(&self) -> Range {
        match self {
            LexerError::UnexpectedCharacter(_, range) => *range,
            LexerError::InvalidStringLiteral(range) => *range,
        }
    }
}
