//! `letvar-lang` compiles and evaluates derived-variable expressions.
//!
//! Expressions are compiled once when a directive file is loaded and then
//! evaluated for every request against request-scoped inputs, capture groups
//! and a shared random source. Values are opaque byte strings.
//!
//! ## Examples
//!
//! ```rust
//! use letvar_lang::{Config, Request, Status};
//!
//! let config = Config::load_with_seed(
//!     "let $shard substr(md5($uri), 0, 2);\nlet $next $n + 1;",
//!     ["uri", "n"],
//!     0,
//! )
//! .unwrap();
//!
//! let mut request = Request::new(&config);
//! request.set_input("uri", "");
//! request.set_input("n", "41");
//!
//! assert_eq!(request.get("shard"), (b"d4".to_vec(), Status::Ok));
//! assert_eq!(request.get("next"), (b"42".to_vec(), Status::Ok));
//!
//! // Compile a single expression against a custom resolver.
//! let resolver = |name: &str| (name == "host").then_some(0usize);
//! let node = letvar_lang::parse("$host . \":\" . 8080", &resolver).unwrap();
//!
//! assert_eq!(node.to_string(), "($host . \":\" . \"8080\")");
//! ```
mod arena;
mod ast;
mod config;
mod error;
mod eval;
mod host;
mod lexer;
mod number;
mod range;
mod value;

use error::InnerError;
use lexer::Lexer;

pub use arena::{Arena, ArenaId, ValueArena};
pub use ast::error::ParseError;
pub use ast::node::{Node, Operator};
pub use ast::parser::{Parser as AstParser, VariableResolver};
pub use config::{Config, ConfigError, Derived};
pub use error::Error;
pub use eval::builtin::{BUILTIN_FUNCTIONS, BuiltinFunction, ParamNum};
pub use eval::error::EvalError;
pub use eval::random::{RANDOM_MAX, RandomSource, SeededRandom};
pub use eval::{Context, Evaluator, Status, evaluate};
pub use host::{Request, Variables};
pub use lexer::Options as LexerOptions;
pub use lexer::error::LexerError;
pub use lexer::token::{Token, TokenKind};
pub use number::Integer;
pub use range::{Position, Range};
pub use value::Value;

/// Compiles one expression, resolving `$name` references through `resolver`.
#[allow(clippy::result_large_err)]
pub fn parse<R: VariableResolver + ?Sized>(code: &str, resolver: &R) -> Result<Node, Error> {
    let tokens = tokenize(code, LexerOptions::default())?;

    AstParser::new(&tokens, resolver)
        .parse()
        .map_err(|e| Error::from_error(code, InnerError::Parse(e)))
}

#[allow(clippy::result_large_err)]
pub fn tokenize(code: &str, options: LexerOptions) -> Result<Vec<Token>, Error> {
    Lexer::new(options)
        .tokenize(code)
        .map_err(|e| Error::from_error(code, InnerError::Lexer(e)))
}
