pub mod builtin;
pub mod error;
pub mod random;

use std::fmt::{self, Display};

use smallvec::SmallVec;

use crate::arena::ValueArena;
use crate::ast::node::{Node, Operator};
use crate::value::Value;

use error::EvalError;
use random::RandomSource;

/// Outcome of evaluating a derived variable for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    Error,
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "ok"),
            Status::NotFound => write!(f, "not_found"),
            Status::Error => write!(f, "error"),
        }
    }
}

/// Request-scoped data the evaluator reads from.
pub trait Context {
    /// Value of the variable registered at `index`.
    ///
    /// Host values are returned borrowed. Values computed on the fly are
    /// allocated in `arena`.
    fn variable<'a>(&'a self, index: usize, arena: &mut ValueArena) -> Option<Value<'a>>;

    fn capture(&self, index: usize) -> Option<&[u8]>;

    fn random(&self) -> &dyn RandomSource;
}

type Values<'a> = SmallVec<[Value<'a>; 4]>;

/// Walks an expression tree against one request context.
pub struct Evaluator<'a> {
    context: &'a dyn Context,
}

impl<'a> Evaluator<'a> {
    pub fn new(context: &'a dyn Context) -> Self {
        Self { context }
    }

    pub fn eval(&self, node: &'a Node, arena: &mut ValueArena) -> Result<Value<'a>, EvalError> {
        match node {
            Node::Variable { name, index } => self
                .context
                .variable(*index, arena)
                .ok_or_else(|| EvalError::VariableNotFound(*index, name.clone())),
            Node::Capture(index) => self
                .context
                .capture(*index)
                .map(Value::Borrowed)
                .ok_or(EvalError::CaptureNotFound(*index)),
            Node::Literal(bytes) => Ok(Value::Borrowed(bytes)),
            Node::Operation(operator, args) => self.eval_operation(*operator, args, arena),
            Node::Function(name, args) => {
                let values = self.eval_args(args, arena)?;
                let result = {
                    let args = as_slices(&values, arena);
                    builtin::eval_builtin(name, &args, self.context.random())?
                };

                log::trace!("{}: {} byte(s)", name, result.len());
                Ok(Value::alloc(arena, result))
            }
        }
    }

    fn eval_operation(
        &self,
        operator: Operator,
        args: &'a [Node],
        arena: &mut ValueArena,
    ) -> Result<Value<'a>, EvalError> {
        let values = self.eval_args(args, arena)?;

        if let (Operator::Concat, [value]) = (operator, values.as_slice()) {
            return Ok(*value);
        }

        let result = {
            let args = as_slices(&values, arena);
            builtin::eval_operator(operator, &args)?
        };

        Ok(Value::alloc(arena, result))
    }

    /// Evaluates `args` left to right, stopping at the first failure.
    fn eval_args(&self, args: &'a [Node], arena: &mut ValueArena) -> Result<Values<'a>, EvalError> {
        args.iter().map(|arg| self.eval(arg, arena)).collect()
    }
}

fn as_slices<'s>(values: &'s [Value<'_>], arena: &'s ValueArena) -> SmallVec<[&'s [u8]; 4]> {
    values.iter().map(|value| value.as_bytes(arena)).collect()
}

/// Evaluates `node`, reporting failures as a status instead of an error.
///
/// On failure the returned value is empty and the reason is logged.
pub fn evaluate<'a>(
    node: &'a Node,
    context: &'a dyn Context,
    arena: &mut ValueArena,
) -> (Value<'a>, Status) {
    match Evaluator::new(context).eval(node, arena) {
        Ok(value) => (value, Status::Ok),
        Err(err) => {
            log::debug!("Evaluation of `{}` failed: {}", node, err);
            (Value::EMPTY, err.status())
        }
    }
}
