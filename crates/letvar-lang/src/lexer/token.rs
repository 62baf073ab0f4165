use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::range::Range;

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone)]
pub struct Token {
    pub range: Range,
    pub kind: TokenKind,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone)]
pub enum TokenKind {
    Ampersand,
    Asterisk,
    Capture(usize),
    Comma,
    Comment(String),
    Dot,
    Eof,
    LParen,
    Minus,
    Percent,
    Pipe,
    Plus,
    RParen,
    SemiColon,
    Slash,
    StringLiteral(Vec<u8>),
    Variable(SmolStr),
    Word(SmolStr),
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.kind)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match &self {
            TokenKind::Ampersand => write!(f, "&"),
            TokenKind::Asterisk => write!(f, "*"),
            TokenKind::Capture(n) => write!(f, "${}", n),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Comment(comment) => write!(f, "# {}", comment.trim()),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Eof => write!(f, ""),
            TokenKind::LParen => write!(f, "("),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::SemiColon => write!(f, ";"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::StringLiteral(s) => write!(f, "\"{}\"", String::from_utf8_lossy(s)),
            TokenKind::Variable(name) => write!(f, "${}", name),
            TokenKind::Word(word) => write!(f, "{}", word),
        }
    }
}
