pub mod error;
pub mod token;

use error::LexerError;
use nom::Parser;
use nom::bytes::complete::{is_not, tag, take_while_m_n, take_while1};
use nom::character::complete::{anychar, char, multispace0, none_of};
use nom::combinator::{map, map_opt, opt, recognize};
use nom::multi::{fold_many0, many0};
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::{IResult, branch::alt};
use nom_locate::position;
use smol_str::SmolStr;
use token::{Token, TokenKind};

use crate::range::{Position, Range, Span};

/// Characters that end a bare word.
const WORD_DELIMITERS: &str = " \t\r\n$()\"',+-*/%&|.;";
/// Characters that cannot start a bare word; `#` starts a comment instead.
const WORD_START_DELIMITERS: &str = "# \t\r\n$()\"',+-*/%&|.;";

macro_rules! define_token_parser {
    ($name:ident, $tag:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(tag($tag), |span: Span| Token {
                range: span.into(),
                kind: $kind,
            })
            .parse(input)
        }
    };
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub include_comments: bool,
}

#[derive(Debug, Default)]
pub struct Lexer {
    options: Options,
}

impl Lexer {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    pub fn tokenize(&self, input: &str) -> Result<Vec<Token>, LexerError> {
        match tokens(Span::new(input)) {
            Ok((span, tokens)) if span.fragment().is_empty() => {
                let eof = Token {
                    range: span.into(),
                    kind: TokenKind::Eof,
                };

                Ok(tokens
                    .into_iter()
                    .filter(|token| {
                        self.options.include_comments
                            || !matches!(token.kind, TokenKind::Comment(_))
                    })
                    .chain(std::iter::once(eof))
                    .collect())
            }
            Ok((span, _)) => Err(unexpected_input(span)),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(unexpected_input(e.input)),
            Err(nom::Err::Incomplete(_)) => Err(unexpected_input(Span::new(input))),
        }
    }
}

fn unexpected_input(span: Span) -> LexerError {
    let range = Range::single(Position::from(span));

    match span.fragment().chars().next() {
        Some('"' | '\'') | None => LexerError::InvalidStringLiteral(range),
        Some(c) => LexerError::UnexpectedCharacter(c, range),
    }
}

define_token_parser!(comma, ",", TokenKind::Comma);
define_token_parser!(l_paren, "(", TokenKind::LParen);
define_token_parser!(r_paren, ")", TokenKind::RParen);
define_token_parser!(semi_colon, ";", TokenKind::SemiColon);
define_token_parser!(plus, "+", TokenKind::Plus);
define_token_parser!(minus, "-", TokenKind::Minus);
define_token_parser!(asterisk, "*", TokenKind::Asterisk);
define_token_parser!(slash, "/", TokenKind::Slash);
define_token_parser!(percent, "%", TokenKind::Percent);
define_token_parser!(ampersand, "&", TokenKind::Ampersand);
define_token_parser!(pipe, "|", TokenKind::Pipe);
define_token_parser!(dot, ".", TokenKind::Dot);

fn punctuations(input: Span) -> IResult<Span, Token> {
    alt((
        l_paren, r_paren, comma, semi_colon, plus, minus, asterisk, slash, percent, ampersand,
        pipe, dot,
    ))
    .parse(input)
}

fn comment(input: Span) -> IResult<Span, Token> {
    map(
        recognize(preceded(char('#'), opt(is_not("\r\n")))),
        |span: Span| Token {
            range: span.into(),
            kind: TokenKind::Comment(span.fragment()[1..].to_string()),
        },
    )
    .parse(input)
}

fn variable_name(input: Span) -> IResult<Span, Span> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_').parse(input)
}

fn variable(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, name) = alt((
        delimited(tag("${"), variable_name, char('}')),
        preceded(char('$'), variable_name),
    ))
    .parse(span)?;
    let (span, end) = position(span)?;

    let name = *name.fragment();
    let kind = if name.bytes().all(|b| b.is_ascii_digit()) {
        match name.parse() {
            Ok(n) => TokenKind::Capture(n),
            Err(_) => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Digit,
                )));
            }
        }
    } else {
        TokenKind::Variable(SmolStr::new(name))
    };

    Ok((
        span,
        Token {
            range: Range {
                start: start.into(),
                end: end.into(),
            },
            kind,
        },
    ))
}

/// A piece of a quoted literal body.
enum Fragment<'a> {
    Text(Span<'a>),
    Byte(u8),
    Char(char),
    /// Unknown escape, kept with its backslash.
    Raw(char),
}

impl Fragment<'_> {
    fn push_to(self, bytes: &mut Vec<u8>) {
        match self {
            Fragment::Text(text) => bytes.extend_from_slice(text.fragment().as_bytes()),
            Fragment::Byte(b) => bytes.push(b),
            Fragment::Char(c) => bytes.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes()),
            Fragment::Raw(c) => {
                bytes.push(b'\\');
                Fragment::Char(c).push_to(bytes);
            }
        }
    }
}

fn escape(quote: char, input: Span) -> IResult<Span, Fragment<'_>> {
    alt((
        map_opt(
            preceded(char('x'), take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit())),
            |hex: Span| u8::from_str_radix(hex.fragment(), 16).ok().map(Fragment::Byte),
        ),
        map(alt((char('\\'), char(quote))), Fragment::Char),
        map(anychar, Fragment::Raw),
    ))
    .parse(input)
}

fn quoted(quote: char, input: Span) -> IResult<Span, Vec<u8>> {
    let plain = if quote == '"' { "\"\\" } else { "'\\" };

    delimited(
        char(quote),
        fold_many0(
            alt((
                map(is_not(plain), Fragment::Text),
                preceded(char('\\'), |input| escape(quote, input)),
            )),
            Vec::new,
            |mut bytes, fragment| {
                fragment.push_to(&mut bytes);
                bytes
            },
        ),
        char(quote),
    )
    .parse(input)
}

fn double_quoted(input: Span) -> IResult<Span, Vec<u8>> {
    quoted('"', input)
}

fn single_quoted(input: Span) -> IResult<Span, Vec<u8>> {
    quoted('\'', input)
}

fn string_literal(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, s) = alt((double_quoted, single_quoted)).parse(span)?;
    let (span, end) = position(span)?;

    Ok((
        span,
        Token {
            range: Range {
                start: start.into(),
                end: end.into(),
            },
            kind: TokenKind::StringLiteral(s),
        },
    ))
}

fn word(input: Span) -> IResult<Span, Token> {
    map(
        recognize(pair(
            none_of(WORD_START_DELIMITERS),
            opt(is_not(WORD_DELIMITERS)),
        )),
        |span: Span| Token {
            range: span.into(),
            kind: TokenKind::Word(SmolStr::new(span.fragment())),
        },
    )
    .parse(input)
}

fn token(input: Span) -> IResult<Span, Token> {
    alt((comment, punctuations, variable, string_literal, word)).parse(input)
}

fn tokens(input: Span) -> IResult<Span, Vec<Token>> {
    preceded(multispace0, many0(terminated(token, multispace0))).parse(input)
}
