use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use smol_str::SmolStr;

use crate::lexer::token::TokenKind;

pub type Args = Vec<Node>;
pub type FunctionName = SmolStr;
pub type VariableIndex = usize;
pub type CaptureIndex = usize;

/// Binary integer operators plus the n-ary concatenation operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    Concat,
}

impl Operator {
    pub fn from_token(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Plus => Some(Operator::Add),
            TokenKind::Minus => Some(Operator::Sub),
            TokenKind::Asterisk => Some(Operator::Mul),
            TokenKind::Slash => Some(Operator::Div),
            TokenKind::Percent => Some(Operator::Rem),
            TokenKind::Ampersand => Some(Operator::BitAnd),
            TokenKind::Pipe => Some(Operator::BitOr),
            TokenKind::Dot => Some(Operator::Concat),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
            Operator::Rem => '%',
            Operator::BitAnd => '&',
            Operator::BitOr => '|',
            Operator::Concat => '.',
        }
    }

    /// Returns `true` for the two-operand integer operators.
    pub fn is_arithmetic(&self) -> bool {
        !matches!(self, Operator::Concat)
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.symbol())
    }
}

/// A compiled expression.
///
/// Trees are built once when the configuration is loaded and are never
/// mutated afterwards, so they can be shared by any number of concurrent
/// evaluations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A host variable, resolved to its table index at load time.
    Variable { name: SmolStr, index: VariableIndex },
    /// A regular-expression capture group of the current request.
    Capture(CaptureIndex),
    Literal(Vec<u8>),
    Operation(Operator, Args),
    Function(FunctionName, Args),
}

impl Node {
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Node::Literal(bytes.into())
    }

    pub fn variable(name: &str, index: VariableIndex) -> Self {
        Node::Variable {
            name: SmolStr::new(name),
            index,
        }
    }

    pub fn operation(operator: Operator, args: Args) -> Self {
        Node::Operation(operator, args)
    }

    pub fn function(name: &str, args: Args) -> Self {
        Node::Function(SmolStr::new(name), args)
    }

    /// Number of nodes in the tree rooted at `self`.
    pub fn size(&self) -> usize {
        match self {
            Node::Variable { .. } | Node::Capture(_) | Node::Literal(_) => 1,
            Node::Operation(_, args) | Node::Function(_, args) => {
                1 + args.iter().map(Node::size).sum::<usize>()
            }
        }
    }
}

/// Quotes `bytes` so the lexer reads them back unchanged. Invalid UTF-8 and
/// control characters are written as `\xHH`.
fn write_literal(f: &mut Formatter<'_>, bytes: &[u8]) -> Result<(), fmt::Error> {
    write!(f, "\"")?;
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '"' | '\\' => write!(f, "\\{}", c)?,
                c if c.is_control() => {
                    for b in c.encode_utf8(&mut [0; 4]).bytes() {
                        write!(f, "\\x{:02x}", b)?;
                    }
                }
                c => write!(f, "{}", c)?,
            }
        }

        for b in chunk.invalid() {
            write!(f, "\\x{:02x}", b)?;
        }
    }
    write!(f, "\"")
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Node::Variable { name, .. } => write!(f, "${}", name),
            Node::Capture(index) => write!(f, "${}", index),
            Node::Literal(bytes) => write_literal(f, bytes),
            Node::Operation(operator, args) => {
                write!(f, "({})", args.iter().join(&format!(" {} ", operator)))
            }
            Node::Function(name, args) => write!(f, "{}({})", name, args.iter().join(", ")),
        }
    }
}
