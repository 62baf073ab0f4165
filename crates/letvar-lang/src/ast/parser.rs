use std::iter::Peekable;

use smol_str::SmolStr;

use crate::eval::builtin::BUILTIN_FUNCTIONS;
use crate::lexer::token::{Token, TokenKind};
use crate::range::Range;

use super::error::ParseError;
use super::node::{Args, Node, Operator};

/// Maps variable names to the indexes the evaluator uses at request time.
pub trait VariableResolver {
    fn index_of(&self, name: &str) -> Option<usize>;
}

impl<F> VariableResolver for F
where
    F: Fn(&str) -> Option<usize>,
{
    fn index_of(&self, name: &str) -> Option<usize> {
        self(name)
    }
}

pub struct Parser<'a, R: VariableResolver + ?Sized> {
    tokens: Peekable<core::slice::Iter<'a, Token>>,
    resolver: &'a R,
    eof: Token,
}

impl<'a, R: VariableResolver + ?Sized> Parser<'a, R> {
    pub fn new(tokens: &'a [Token], resolver: &'a R) -> Self {
        let eof = match tokens.last() {
            Some(token) if token.is_eof() => token.clone(),
            Some(token) => Token {
                range: Range::new(token.range.end, token.range.end),
                kind: TokenKind::Eof,
            },
            None => Token {
                range: Range::default(),
                kind: TokenKind::Eof,
            },
        };

        Self {
            tokens: tokens.iter().peekable(),
            resolver,
            eof,
        }
    }

    /// Parses exactly one expression; anything after it is an error.
    pub fn parse(&mut self) -> Result<Node, ParseError> {
        let token = self.next_token()?;
        let node = self.parse_expr(token)?;

        match self.tokens.next() {
            None => Ok(node),
            Some(token) if token.is_eof() => Ok(node),
            Some(token) => Err(ParseError::UnexpectedToken(token.clone())),
        }
    }

    fn next_token(&mut self) -> Result<&'a Token, ParseError> {
        match self.tokens.next() {
            Some(token) if token.is_eof() => Err(ParseError::UnexpectedEOFDetected(token.clone())),
            Some(token) => Ok(token),
            None => Err(ParseError::UnexpectedEOFDetected(self.eof.clone())),
        }
    }

    fn peek_operator(&mut self) -> Option<(Operator, &'a Token)> {
        self.tokens
            .peek()
            .and_then(|token| Operator::from_token(&token.kind).map(|op| (op, *token)))
    }

    fn peek_is(&mut self, kind: &TokenKind) -> bool {
        matches!(self.tokens.peek(), Some(token) if &token.kind == kind)
    }

    fn parse_expr(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        let lhs = self.parse_primary_expr(token)?;

        match self.peek_operator() {
            Some((Operator::Concat, _)) => self.parse_concat(lhs),
            Some((op, _)) => self.parse_binary_op(op, lhs),
            None => Ok(lhs),
        }
    }

    fn parse_primary_expr(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        match &token.kind {
            TokenKind::Variable(name) => self.parse_variable(token, name),
            TokenKind::Capture(index) => Ok(Node::Capture(*index)),
            TokenKind::StringLiteral(s) => Ok(Node::Literal(s.clone())),
            TokenKind::Word(name) if self.peek_is(&TokenKind::LParen) => {
                self.parse_call(token, name)
            }
            TokenKind::Word(word) => Ok(Node::Literal(word.as_bytes().to_vec())),
            TokenKind::Minus => self.parse_negative(token),
            TokenKind::LParen => self.parse_paren(),
            TokenKind::Eof => Err(ParseError::UnexpectedEOFDetected(token.clone())),
            _ => Err(ParseError::UnexpectedToken(token.clone())),
        }
    }

    fn parse_variable(&self, token: &Token, name: &SmolStr) -> Result<Node, ParseError> {
        self.resolver
            .index_of(name)
            .map(|index| Node::Variable {
                name: name.clone(),
                index,
            })
            .ok_or_else(|| ParseError::UnknownVariable(token.clone(), name.clone()))
    }

    fn parse_negative(&mut self, minus: &'a Token) -> Result<Node, ParseError> {
        match self.tokens.next() {
            Some(Token {
                kind: TokenKind::Word(word),
                ..
            }) => Ok(Node::Literal(format!("-{}", word).into_bytes())),
            Some(token) if token.is_eof() => Err(ParseError::UnexpectedEOFDetected(token.clone())),
            Some(token) => Err(ParseError::UnexpectedToken(token.clone())),
            None => Err(ParseError::UnexpectedToken(minus.clone())),
        }
    }

    fn parse_paren(&mut self) -> Result<Node, ParseError> {
        let token = self.next_token()?;
        let node = self.parse_expr(token)?;

        match self.tokens.next() {
            Some(Token {
                kind: TokenKind::RParen,
                ..
            }) => Ok(node),
            Some(token) => Err(ParseError::ExpectedClosingParen(token.clone())),
            None => Err(ParseError::ExpectedClosingParen(self.eof.clone())),
        }
    }

    fn parse_concat(&mut self, first: Node) -> Result<Node, ParseError> {
        let mut args = vec![first];

        while let Some((op, op_token)) = self.peek_operator() {
            if op != Operator::Concat {
                return Err(ParseError::MixedOperators(op_token.clone()));
            }

            self.tokens.next();
            let token = self.next_token()?;
            args.push(self.parse_primary_expr(token)?);
        }

        Ok(Node::Operation(Operator::Concat, args))
    }

    fn parse_binary_op(&mut self, op: Operator, lhs: Node) -> Result<Node, ParseError> {
        let mut lhs = lhs;

        while let Some((next_op, op_token)) = self.peek_operator() {
            if next_op != op {
                return Err(ParseError::MixedOperators(op_token.clone()));
            }

            self.tokens.next();
            let token = self.next_token()?;
            let rhs = self.parse_primary_expr(token)?;
            lhs = Node::Operation(op, vec![lhs, rhs]);
        }

        Ok(lhs)
    }

    fn parse_call(&mut self, token: &'a Token, name: &SmolStr) -> Result<Node, ParseError> {
        if !is_identifier(name) {
            return Err(ParseError::UnexpectedToken(token.clone()));
        }

        // Consume `(`.
        self.tokens.next();
        let args = self.parse_args()?;

        match BUILTIN_FUNCTIONS.get(name.as_str()) {
            None => Err(ParseError::UndefinedFunction(token.clone(), name.clone())),
            Some(f) if !f.num_params.is_valid(args.len()) => Err(ParseError::ArityMismatch {
                token: token.clone(),
                name: name.clone(),
                expected: f.num_params.to_num(),
                got: args.len(),
            }),
            Some(_) => Ok(Node::Function(name.clone(), args)),
        }
    }

    fn parse_args(&mut self) -> Result<Args, ParseError> {
        let mut args = Vec::new();

        if self.peek_is(&TokenKind::RParen) {
            self.tokens.next();
            return Ok(args);
        }

        loop {
            let token = self.next_token()?;

            if matches!(token.kind, TokenKind::Comma | TokenKind::RParen) {
                return Err(ParseError::InsufficientTokens(token.clone()));
            }

            args.push(self.parse_expr(token)?);

            match self.tokens.next() {
                Some(Token {
                    kind: TokenKind::Comma,
                    ..
                }) => continue,
                Some(Token {
                    kind: TokenKind::RParen,
                    ..
                }) => break,
                Some(token) => return Err(ParseError::ExpectedClosingParen(token.clone())),
                None => return Err(ParseError::ExpectedClosingParen(self.eof.clone())),
            }
        }

        Ok(args)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use rstest::rstest;

    fn resolver(name: &str) -> Option<usize> {
        ["host", "uri", "remote_addr"]
            .iter()
            .position(|candidate| *candidate == name)
    }

    fn parse(code: &str) -> Result<Node, ParseError> {
        let tokens = Lexer::default().tokenize(code).unwrap();
        Parser::new(&tokens, &resolver).parse()
    }

    fn lit(s: &str) -> Node {
        Node::literal(s)
    }

    #[rstest]
    #[case::variable("$uri", Node::variable("uri", 1))]
    #[case::braced_variable("${remote_addr}", Node::variable("remote_addr", 2))]
    #[case::capture("$3", Node::Capture(3))]
    #[case::word("hello", lit("hello"))]
    #[case::quoted("\"a b\"", lit("a b"))]
    #[case::negative("-5", lit("-5"))]
    #[case::hex("0x1F", lit("0x1F"))]
    #[case::group("($host)", Node::variable("host", 0))]
    #[case::binary("$1 + 2", Node::operation(Operator::Add, vec![Node::Capture(1), lit("2")]))]
    #[case::negative_operand("5 - -3", Node::operation(Operator::Sub, vec![lit("5"), lit("-3")]))]
    #[case::left_assoc("10 - 3 - 2", Node::operation(Operator::Sub, vec![
        Node::operation(Operator::Sub, vec![lit("10"), lit("3")]),
        lit("2"),
    ]))]
    #[case::concat_flattened("$host . \"/\" . $uri", Node::operation(Operator::Concat, vec![
        Node::variable("host", 0), lit("/"), Node::variable("uri", 1),
    ]))]
    #[case::grouped_mix("($1 + 1) . x", Node::operation(Operator::Concat, vec![
        Node::operation(Operator::Add, vec![Node::Capture(1), lit("1")]),
        lit("x"),
    ]))]
    #[case::call("md5($host)", Node::function("md5", vec![Node::variable("host", 0)]))]
    #[case::call_no_args("rand()", Node::function("rand", vec![]))]
    #[case::nested_call("substr(md5($uri . $1), 0, 8)", Node::function("substr", vec![
        Node::function("md5", vec![Node::operation(Operator::Concat, vec![Node::variable("uri", 1), Node::Capture(1)])]),
        lit("0"),
        lit("8"),
    ]))]
    #[case::call_operand("length($uri) * 2", Node::operation(Operator::Mul, vec![
        Node::function("length", vec![Node::variable("uri", 1)]),
        lit("2"),
    ]))]
    fn test_parse(#[case] code: &str, #[case] expected: Node) {
        assert_eq!(parse(code), Ok(expected));
    }

    #[rstest]
    #[case::empty("")]
    #[case::unbalanced_open("($1 + 1")]
    #[case::unbalanced_close("$1 + 1)")]
    #[case::trailing_token("$1 $2")]
    #[case::missing_operand("$1 +")]
    #[case::empty_argument("min(1, , 2)")]
    #[case::leading_comma("max(, 1)")]
    #[case::mixed("1 + 2 * 3")]
    #[case::mixed_concat("a . 1 + 2")]
    #[case::unknown_variable("$nope")]
    #[case::unknown_function("nope(1)")]
    #[case::arity("md5(1, 2)")]
    #[case::rand_with_args("rand(1)")]
    #[case::bare_operator("*")]
    fn test_parse_error(#[case] code: &str) {
        assert!(parse(code).is_err());
    }

    #[rstest]
    #[case::mixed("1 + 2 * 3", |e: &ParseError| matches!(e, ParseError::MixedOperators(_)))]
    #[case::unknown_variable("$nope", |e: &ParseError| matches!(e, ParseError::UnknownVariable(_, name) if name == "nope"))]
    #[case::unknown_function("nope(1)", |e: &ParseError| matches!(e, ParseError::UndefinedFunction(_, name) if name == "nope"))]
    #[case::arity("substr($uri)", |e: &ParseError| matches!(e, ParseError::ArityMismatch { expected: 3, got: 1, .. }))]
    #[case::closing_paren("($1", |e: &ParseError| matches!(e, ParseError::ExpectedClosingParen(t) if t.is_eof()))]
    #[case::eof("$1 -", |e: &ParseError| matches!(e, ParseError::UnexpectedEOFDetected(_)))]
    #[case::trailing("1 2", |e: &ParseError| matches!(e, ParseError::UnexpectedToken(t) if t.kind == TokenKind::Word(SmolStr::new("2"))))]
    #[case::empty_argument("min(1,)", |e: &ParseError| matches!(e, ParseError::InsufficientTokens(_)))]
    fn test_parse_error_kind(#[case] code: &str, #[case] check: fn(&ParseError) -> bool) {
        let err = parse(code).unwrap_err();
        assert!(check(&err), "unexpected error: {:?}", err);
    }

    #[rstest]
    #[case("$host . \"/\" . $uri")]
    #[case("substr(md5($1), 0, 8)")]
    #[case("((1 + 2) - 3)")]
    #[case("\"with \\\"quotes\\\" and \\\\\"")]
    fn test_display_round_trip(#[case] code: &str) {
        let node = parse(code).unwrap();
        assert_eq!(parse(&node.to_string()), Ok(node));
    }

    #[test]
    fn test_error_range() {
        let err = parse("$host . nope($uri)").unwrap_err();
        assert_eq!(err.range().start.column, 9);
    }
}
