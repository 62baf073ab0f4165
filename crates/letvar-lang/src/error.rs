use miette::{Diagnostic, SourceOffset, SourceSpan};

use crate::{
    ast::error::ParseError, config::ConfigError, lexer::error::LexerError, range::Range,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InnerError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl InnerError {
    pub fn range(&self) -> Range {
        match self {
            InnerError::Lexer(err) => err.range(),
            InnerError::Parse(err) => err.range(),
            InnerError::Config(err) => err.token().range,
        }
    }
}

/// A load-time error with the source it refers to.
#[derive(PartialEq, Debug, thiserror::Error)]
#[error("{cause}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// The directive file or expression being loaded.
    pub source_code: String,
    /// The location in the source code for diagnostics.
    pub location: SourceSpan,
}

impl Error {
    pub fn from_error(source_code: impl Into<String>, cause: InnerError) -> Self {
        let source_code = source_code.into();
        let range = cause.range();

        let start = SourceOffset::from_location(
            &source_code,
            range.start.line as usize,
            range.start.column,
        );
        let end = SourceOffset::from_location(&source_code, range.end.line as usize, range.end.column);
        let location = SourceSpan::new(
            start,
            std::cmp::max(end.offset().saturating_sub(start.offset()), 1),
        );

        Self {
            cause,
            source_code,
            location,
        }
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let c = match &self.cause {
            InnerError::Lexer(LexerError::UnexpectedCharacter(..)) => {
                "LexerError::UnexpectedCharacter"
            }
            InnerError::Lexer(LexerError::InvalidStringLiteral(_)) => {
                "LexerError::InvalidStringLiteral"
            }
            InnerError::Parse(ParseError::UnexpectedToken(_)) => "ParseError::UnexpectedToken",
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => {
                "ParseError::UnexpectedEOFDetected"
            }
            InnerError::Parse(ParseError::InsufficientTokens(_)) => {
                "ParseError::InsufficientTokens"
            }
            InnerError::Parse(ParseError::ExpectedClosingParen(_)) => {
                "ParseError::ExpectedClosingParen"
            }
            InnerError::Parse(ParseError::MixedOperators(_)) => "ParseError::MixedOperators",
            InnerError::Parse(ParseError::UnknownVariable(..)) => "ParseError::UnknownVariable",
            InnerError::Parse(ParseError::UndefinedFunction(..)) => {
                "ParseError::UndefinedFunction"
            }
            InnerError::Parse(ParseError::ArityMismatch { .. }) => "ParseError::ArityMismatch",
            InnerError::Config(ConfigError::UnknownDirective(..)) => {
                "ConfigError::UnknownDirective"
            }
            InnerError::Config(ConfigError::MissingDirective(_)) => {
                "ConfigError::MissingDirective"
            }
            InnerError::Config(ConfigError::ExpectedVariable(_)) => {
                "ConfigError::ExpectedVariable"
            }
            InnerError::Config(ConfigError::DuplicateVariable(..)) => {
                "ConfigError::DuplicateVariable"
            }
            InnerError::Config(ConfigError::MissingArgument(..)) => "ConfigError::MissingArgument",
            InnerError::Config(ConfigError::UnexpectedArgument(..)) => {
                "ConfigError::UnexpectedArgument"
            }
            InnerError::Config(ConfigError::InvalidArgument(..)) => "ConfigError::InvalidArgument",
            InnerError::Config(ConfigError::ZeroDivisor(_)) => "ConfigError::ZeroDivisor",
            InnerError::Config(ConfigError::InvertedRange(..)) => "ConfigError::InvertedRange",
            InnerError::Config(ConfigError::ExpectedSemiColon(_)) => {
                "ConfigError::ExpectedSemiColon"
            }
        };

        Some(Box::new(c))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Lexer(LexerError::InvalidStringLiteral(_)) => {
                Some("Close the string with the same quote it was opened with.".to_string())
            }
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => Some(
                "Input ended unexpectedly. Check for a missing operand or closing parenthesis."
                    .to_string(),
            ),
            InnerError::Parse(ParseError::InsufficientTokens(_)) => {
                Some("Arguments must not be empty.".to_string())
            }
            InnerError::Parse(ParseError::MixedOperators(_)) => Some(
                "Use parentheses to combine different operators, e.g. `($a + 1) * 2`.".to_string(),
            ),
            InnerError::Parse(ParseError::UnknownVariable(_, name)) => Some(format!(
                "`${name}` is neither provided by the host nor defined by a directive."
            )),
            InnerError::Parse(ParseError::UndefinedFunction(_, name)) => {
                Some(format!("'{name}' is not a builtin function."))
            }
            InnerError::Parse(ParseError::ArityMismatch { expected, got, .. }) => Some(format!(
                "Invalid number of arguments: expected {expected}, got {got}."
            )),
            InnerError::Config(ConfigError::UnknownDirective(..)) => Some(
                "Supported directives are `let`, `let_rand`, `let_hash` and `let_mod`.".to_string(),
            ),
            InnerError::Config(ConfigError::DuplicateVariable(_, name)) => {
                Some(format!("Rename one of the definitions of `${name}`."))
            }
            InnerError::Config(ConfigError::ZeroDivisor(_)) => {
                Some("Division by zero is not allowed.".to_string())
            }
            InnerError::Config(ConfigError::InvertedRange(..)) => {
                Some("Swap the bounds so that `from` is not greater than `to`.".to_string())
            }
            _ => None,
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(
            miette::LabeledSpan::new_with_span(Some(format!("{}", self.cause)), self.location),
        )))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}
