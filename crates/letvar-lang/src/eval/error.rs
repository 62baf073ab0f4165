use smol_str::SmolStr;
use thiserror::Error;

use super::Status;

type FunctionName = SmolStr;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum EvalError {
    #[error("Variable \"${1}\" not found")]
    VariableNotFound(usize, SmolStr),
    #[error("Capture \"${0}\" not found")]
    CaptureNotFound(usize),
    #[error("\"{0}\" is not defined")]
    UndefinedFunction(FunctionName),
    #[error("Invalid number of arguments in \"{0}\", expected {1}, got {2}")]
    ArityMismatch(FunctionName, u8, usize),
    #[error("Cannot convert \"{1}\" to an integer in \"{0}\"")]
    CoercionFailure(FunctionName, String),
    #[error("Divided by 0")]
    ZeroDivision,
    #[error("Integer overflow in \"{0}\"")]
    Overflow(FunctionName),
    #[error("Invalid argument for \"{0}\": {1}")]
    InvalidArgument(FunctionName, String),
}

impl EvalError {
    /// Missing inputs are reported as not found; everything else is malformed input.
    pub fn status(&self) -> Status {
        match self {
            EvalError::VariableNotFound(..) | EvalError::CaptureNotFound(_) => Status::NotFound,
            _ => Status::Error,
        }
    }

    pub(crate) fn coercion(name: &str, value: &[u8]) -> Self {
        EvalError::CoercionFailure(
            SmolStr::new(name),
            String::from_utf8_lossy(value).into_owned(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(EvalError::VariableNotFound(0, SmolStr::new("host")), Status::NotFound)]
    #[case(EvalError::CaptureNotFound(3), Status::NotFound)]
    #[case(EvalError::ZeroDivision, Status::Error)]
    #[case(EvalError::UndefinedFunction(SmolStr::new("nope")), Status::Error)]
    #[case(EvalError::coercion("+", b"abc"), Status::Error)]
    fn test_status(#[case] error: EvalError, #[case] expected: Status) {
        assert_eq!(error.status(), expected);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            EvalError::coercion("min", b"x1").to_string(),
            "Cannot convert \"x1\" to an integer in \"min\""
        );
        assert_eq!(
            EvalError::ArityMismatch(SmolStr::new("md5"), 1, 2).to_string(),
            "Invalid number of arguments in \"md5\", expected 1, got 2"
        );
    }
}
