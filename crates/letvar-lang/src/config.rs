use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;
use thiserror::Error;

use crate::arena::ValueArena;
use crate::ast::error::ParseError;
use crate::ast::node::Node;
use crate::ast::parser::{Parser, VariableResolver};
use crate::error::{Error, InnerError};
use crate::eval::builtin::{self, MD5_HEX_LEN};
use crate::eval::error::EvalError;
use crate::eval::random::{RandomSource, SeededRandom};
use crate::eval::{Context, Evaluator};
use crate::host::Variables;
use crate::lexer::Lexer;
use crate::lexer::token::{Token, TokenKind};
use crate::number::Integer;
use crate::value::Value;

const LET: &str = "let";
const LET_RAND: &str = "let_rand";
const LET_HASH: &str = "let_hash";
const LET_MOD: &str = "let_mod";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Unknown directive `{1}`")]
    UnknownDirective(Token, SmolStr),
    #[error("Expected a directive before `;`")]
    MissingDirective(Token),
    #[error("Expected a variable such as `$name` but got `{}`", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    ExpectedVariable(Token),
    #[error("Variable `${1}` is already defined")]
    DuplicateVariable(Token, SmolStr),
    #[error("Missing argument for `{1}`")]
    MissingArgument(Token, SmolStr),
    #[error("Unexpected argument `{0}` for `{1}`")]
    UnexpectedArgument(Token, SmolStr),
    #[error("Invalid argument `{0}` for `{1}`, {2}")]
    InvalidArgument(Token, SmolStr, String),
    #[error("Divisor of `let_mod` must not be zero")]
    ZeroDivisor(Token),
    #[error("Random range is empty, {1} is greater than {2}")]
    InvertedRange(Token, i64, i64),
    #[error("Expected `;` at the end of the directive")]
    ExpectedSemiColon(Token),
}

impl ConfigError {
    #[cold]
    pub fn token(&self) -> &Token {
        match self {
            ConfigError::UnknownDirective(token, _) => token,
            ConfigError::MissingDirective(token) => token,
            ConfigError::ExpectedVariable(token) => token,
            ConfigError::DuplicateVariable(token, _) => token,
            ConfigError::MissingArgument(token, _) => token,
            ConfigError::UnexpectedArgument(token, _) => token,
            ConfigError::InvalidArgument(token, _, _) => token,
            ConfigError::ZeroDivisor(token) => token,
            ConfigError::InvertedRange(token, _, _) => token,
            ConfigError::ExpectedSemiColon(token) => token,
        }
    }
}

/// How a derived variable computes its value.
#[derive(Debug, Clone, PartialEq)]
pub enum Derived {
    /// `let $name <expression>;`
    Expression(Node),
    /// `let_rand $name from to;`
    RandomRange { from: Integer, to: Integer },
    /// `let_hash $name $source start count;`
    HashSubstring {
        source: Node,
        start: usize,
        count: usize,
    },
    /// `let_mod $name $source divisor;`
    Modulo { source: Node, divisor: Integer },
}

impl Derived {
    pub fn evaluate<'a>(
        &'a self,
        context: &'a dyn Context,
        arena: &mut ValueArena,
    ) -> Result<Value<'a>, EvalError> {
        match self {
            Derived::Expression(node) => Evaluator::new(context).eval(node, arena),
            Derived::RandomRange { from, to } => {
                let n = context.random().between(from.value(), to.value());
                Ok(Value::alloc(arena, Integer::new(n).to_bytes()))
            }
            Derived::HashSubstring {
                source,
                start,
                count,
            } => {
                let value = Evaluator::new(context).eval(source, arena)?;
                let nibbles = builtin::md5_nibbles(value.as_bytes(arena), *start, *count);
                Ok(Value::alloc(arena, nibbles))
            }
            Derived::Modulo { source, divisor } => {
                let value = Evaluator::new(context).eval(source, arena)?;
                let result = builtin::modulo(LET_MOD, value.as_bytes(arena), *divisor)?;
                Ok(Value::alloc(arena, result))
            }
        }
    }
}

impl Display for Derived {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Derived::Expression(node) => write!(f, "{}", node),
            Derived::RandomRange { from, to } => write!(f, "{} {} {}", LET_RAND, from, to),
            Derived::HashSubstring {
                source,
                start,
                count,
            } => write!(f, "{} {} {} {}", LET_HASH, source, start, count),
            Derived::Modulo { source, divisor } => {
                write!(f, "{} {} {}", LET_MOD, source, divisor)
            }
        }
    }
}

/// A loaded directive file.
///
/// Immutable once loaded; requests borrow it to evaluate derived variables.
pub struct Config {
    variables: Variables,
    definitions: Vec<Option<Derived>>,
    random: Box<dyn RandomSource>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("variables", &self.variables)
            .field("definitions", &self.definitions)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Loads `source`, seeding the random source from the clock.
    ///
    /// `host_variables` are the names the host provides per request; they may
    /// be referenced from expressions but not redefined.
    #[allow(clippy::result_large_err)]
    pub fn load<I, S>(source: &str, host_variables: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::load_with_random(
            source,
            host_variables,
            Box::new(SeededRandom::from_clock()),
        )
    }

    #[allow(clippy::result_large_err)]
    pub fn load_with_seed<I, S>(source: &str, host_variables: I, seed: u64) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::load_with_random(source, host_variables, Box::new(SeededRandom::new(seed)))
    }

    #[allow(clippy::result_large_err)]
    pub fn load_with_random<I, S>(
        source: &str,
        host_variables: I,
        random: Box<dyn RandomSource>,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::compile(source, host_variables, random)
            .map_err(|cause| Error::from_error(source, cause))
    }

    fn compile<I, S>(
        source: &str,
        host_variables: I,
        random: Box<dyn RandomSource>,
    ) -> Result<Self, InnerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = Lexer::default().tokenize(source)?;
        let statements = split_statements(&tokens)?;

        let mut variables = Variables::default();
        for name in host_variables {
            variables.declare(name.as_ref());
        }

        // Destinations are declared up front so expressions may refer to
        // variables defined further down the file.
        let mut indexes = Vec::with_capacity(statements.len());
        for statement in &statements {
            match variables.declare(statement.target_name) {
                Some(index) => indexes.push(index),
                None => {
                    return Err(ConfigError::DuplicateVariable(
                        statement.target.clone(),
                        statement.target_name.clone(),
                    )
                    .into());
                }
            }
        }

        let mut definitions = vec![None; variables.len()];
        for (statement, index) in statements.iter().zip(indexes) {
            let derived = statement.compile(&variables)?;
            log::debug!("${} = {}", statement.target_name, derived);
            definitions[index] = Some(derived);
        }

        Ok(Self {
            variables,
            definitions,
            random,
        })
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// The derivation registered at `index`, or `None` for host inputs.
    pub fn definition(&self, index: usize) -> Option<&Derived> {
        self.definitions.get(index).and_then(Option::as_ref)
    }

    pub fn is_derived(&self, name: &str) -> bool {
        self.variables
            .index_of(name)
            .and_then(|index| self.definition(index))
            .is_some()
    }

    /// Names of derived variables in declaration order.
    pub fn derived_names(&self) -> impl Iterator<Item = &str> {
        self.variables
            .iter()
            .filter(|(index, _)| self.definition(*index).is_some())
            .map(|(_, name)| name)
    }

    pub fn random(&self) -> &dyn RandomSource {
        self.random.as_ref()
    }
}

struct Statement<'t> {
    directive: &'t Token,
    directive_name: &'t SmolStr,
    target: &'t Token,
    target_name: &'t SmolStr,
    args: &'t [Token],
    end: &'t Token,
}

fn split_statements(tokens: &[Token]) -> Result<Vec<Statement<'_>>, ConfigError> {
    let mut statements = Vec::new();
    let mut rest = tokens;

    while let Some(pos) = rest
        .iter()
        .position(|token| matches!(token.kind, TokenKind::SemiColon | TokenKind::Eof))
    {
        let (body, tail) = rest.split_at(pos);
        let Some((end, tail)) = tail.split_first() else {
            break;
        };

        if end.is_eof() {
            if !body.is_empty() {
                return Err(ConfigError::ExpectedSemiColon(end.clone()));
            }
            break;
        }

        statements.push(Statement::new(body, end)?);
        rest = tail;
    }

    Ok(statements)
}

impl<'t> Statement<'t> {
    fn new(body: &'t [Token], end: &'t Token) -> Result<Self, ConfigError> {
        let (directive, body) = body
            .split_first()
            .ok_or_else(|| ConfigError::MissingDirective(end.clone()))?;

        let directive_name = match &directive.kind {
            TokenKind::Word(name) if [LET, LET_RAND, LET_HASH, LET_MOD].contains(&name.as_str()) => {
                name
            }
            _ => {
                return Err(ConfigError::UnknownDirective(
                    directive.clone(),
                    SmolStr::new(directive.to_string()),
                ));
            }
        };

        let (target, args) = body
            .split_first()
            .ok_or_else(|| ConfigError::ExpectedVariable(end.clone()))?;

        let target_name = match &target.kind {
            TokenKind::Variable(name) => name,
            _ => return Err(ConfigError::ExpectedVariable(target.clone())),
        };

        Ok(Self {
            directive,
            directive_name,
            target,
            target_name,
            args,
            end,
        })
    }

    fn compile(&self, variables: &Variables) -> Result<Derived, InnerError> {
        match self.directive_name.as_str() {
            LET => self.compile_expression(variables),
            LET_RAND => self.compile_random_range(),
            LET_HASH => self.compile_hash_substring(variables),
            LET_MOD => self.compile_modulo(variables),
            _ => Err(ConfigError::UnknownDirective(
                self.directive.clone(),
                self.directive_name.clone(),
            )
            .into()),
        }
    }

    fn compile_expression(&self, variables: &Variables) -> Result<Derived, InnerError> {
        if self.args.is_empty() {
            return Err(self.missing_argument().into());
        }

        let node = Parser::new(self.args, variables).parse()?;
        Ok(Derived::Expression(node))
    }

    fn compile_random_range(&self) -> Result<Derived, InnerError> {
        match self.integer_args(self.args)?.as_slice() {
            [(from, _), (to, token)] => {
                if from > to {
                    Err(ConfigError::InvertedRange((*token).clone(), from.value(), to.value()).into())
                } else {
                    Ok(Derived::RandomRange {
                        from: *from,
                        to: *to,
                    })
                }
            }
            [_, _, (_, token), ..] => Err(self.unexpected_argument(token).into()),
            _ => Err(self.missing_argument().into()),
        }
    }

    fn compile_hash_substring(&self, variables: &Variables) -> Result<Derived, InnerError> {
        let (source, args) = self.source_arg(variables)?;

        match self.integer_args(args)?.as_slice() {
            [(start, start_token), (count, count_token)] => Ok(Derived::HashSubstring {
                source,
                start: self.non_negative(*start, start_token)?.min(MD5_HEX_LEN),
                count: self.non_negative(*count, count_token)?.min(MD5_HEX_LEN),
            }),
            [_, _, (_, token), ..] => Err(self.unexpected_argument(token).into()),
            _ => Err(self.missing_argument().into()),
        }
    }

    fn compile_modulo(&self, variables: &Variables) -> Result<Derived, InnerError> {
        let (source, args) = self.source_arg(variables)?;

        match self.integer_args(args)?.as_slice() {
            [(divisor, token)] if divisor.value() == 0 => {
                Err(ConfigError::ZeroDivisor((*token).clone()).into())
            }
            [(divisor, token)] if divisor.value() < 0 => Err(ConfigError::InvalidArgument(
                (*token).clone(),
                self.directive_name.clone(),
                "divisor must be positive".to_string(),
            )
            .into()),
            [(divisor, _)] => Ok(Derived::Modulo {
                source,
                divisor: *divisor,
            }),
            [_, (_, token), ..] => Err(self.unexpected_argument(token).into()),
            [] => Err(self.missing_argument().into()),
        }
    }

    /// Reads the `$source` argument of `let_hash` and `let_mod`.
    fn source_arg(&self, variables: &Variables) -> Result<(Node, &'t [Token]), InnerError> {
        let (token, rest) = self
            .args
            .split_first()
            .ok_or_else(|| self.missing_argument())?;

        match &token.kind {
            TokenKind::Variable(name) => match variables.index_of(name) {
                Some(index) => Ok((
                    Node::Variable {
                        name: name.clone(),
                        index,
                    },
                    rest,
                )),
                None => Err(ParseError::UnknownVariable(token.clone(), name.clone()).into()),
            },
            TokenKind::Capture(index) => Ok((Node::Capture(*index), rest)),
            _ => Err(ConfigError::ExpectedVariable(token.clone()).into()),
        }
    }

    /// Reads integer arguments, folding a leading `-` into the number.
    fn integer_args(&self, args: &'t [Token]) -> Result<Vec<(Integer, &'t Token)>, ConfigError> {
        let mut integers = Vec::with_capacity(args.len());
        let mut tokens = args.iter();

        while let Some(token) = tokens.next() {
            let text = match &token.kind {
                TokenKind::Minus => match tokens.next() {
                    Some(Token {
                        kind: TokenKind::Word(word),
                        ..
                    }) => format!("-{}", word),
                    Some(other) => return Err(self.not_an_integer(other)),
                    None => return Err(self.missing_argument()),
                },
                TokenKind::Word(word) => word.to_string(),
                TokenKind::StringLiteral(s) => String::from_utf8_lossy(s).into_owned(),
                _ => return Err(self.not_an_integer(token)),
            };

            let n = Integer::parse(text.as_bytes()).ok_or_else(|| self.not_an_integer(token))?;
            integers.push((n, token));
        }

        Ok(integers)
    }

    fn non_negative(&self, n: Integer, token: &Token) -> Result<usize, ConfigError> {
        usize::try_from(n.value()).map_err(|_| {
            ConfigError::InvalidArgument(
                token.clone(),
                self.directive_name.clone(),
                "must not be negative".to_string(),
            )
        })
    }

    fn not_an_integer(&self, token: &Token) -> ConfigError {
        ConfigError::InvalidArgument(
            token.clone(),
            self.directive_name.clone(),
            "expected an integer".to_string(),
        )
    }

    fn missing_argument(&self) -> ConfigError {
        ConfigError::MissingArgument(self.end.clone(), self.directive_name.clone())
    }

    fn unexpected_argument(&self, token: &Token) -> ConfigError {
        ConfigError::UnexpectedArgument(token.clone(), self.directive_name.clone())
    }
}
