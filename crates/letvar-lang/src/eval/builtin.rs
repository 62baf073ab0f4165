use std::sync::LazyLock;

use md4::Md4;
use ripemd::Ripemd160;
use rustc_hash::FxHashMap;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use smol_str::SmolStr;

use crate::ast::node::Operator;
use crate::number::Integer;

use super::error::EvalError;
use super::random::RandomSource;

type FunctionName = &'static str;
type BuiltinFn = fn(&str, &[&[u8]], &dyn RandomSource) -> Result<Vec<u8>, EvalError>;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";
/// Length of an MD5 digest rendered as lowercase hex.
pub const MD5_HEX_LEN: usize = 32;

#[derive(Clone, Debug)]
pub struct BuiltinFunction {
    pub num_params: ParamNum,
    pub func: BuiltinFn,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParamNum {
    None,
    Fixed(u8),
}

impl ParamNum {
    pub fn to_num(&self) -> u8 {
        match self {
            ParamNum::None => 0,
            ParamNum::Fixed(n) => *n,
        }
    }

    #[inline(always)]
    pub fn is_valid(&self, num_args: usize) -> bool {
        match self {
            ParamNum::None => num_args == 0,
            ParamNum::Fixed(n) => num_args == usize::from(*n),
        }
    }
}

impl BuiltinFunction {
    pub fn new(num_params: ParamNum, func: BuiltinFn) -> Self {
        BuiltinFunction { num_params, func }
    }
}

pub static BUILTIN_FUNCTIONS: LazyLock<FxHashMap<FunctionName, BuiltinFunction>> =
    LazyLock::new(|| {
        let mut map = FxHashMap::default();

        map.insert(
            "rand",
            BuiltinFunction::new(ParamNum::None, |_, _, random| {
                Ok(Integer::new(random.next()).to_bytes())
            }),
        );
        map.insert(
            "md4",
            BuiltinFunction::new(ParamNum::Fixed(1), |name, args, _| {
                unary(name, args, hex_digest::<Md4>)
            }),
        );
        map.insert(
            "md5",
            BuiltinFunction::new(ParamNum::Fixed(1), |name, args, _| unary(name, args, md5_hex)),
        );
        map.insert(
            "sha1",
            BuiltinFunction::new(ParamNum::Fixed(1), |name, args, _| {
                unary(name, args, hex_digest::<Sha1>)
            }),
        );
        map.insert(
            "sha224",
            BuiltinFunction::new(ParamNum::Fixed(1), |name, args, _| {
                unary(name, args, hex_digest::<Sha224>)
            }),
        );
        map.insert(
            "sha256",
            BuiltinFunction::new(ParamNum::Fixed(1), |name, args, _| {
                unary(name, args, hex_digest::<Sha256>)
            }),
        );
        map.insert(
            "sha384",
            BuiltinFunction::new(ParamNum::Fixed(1), |name, args, _| {
                unary(name, args, hex_digest::<Sha384>)
            }),
        );
        map.insert(
            "sha512",
            BuiltinFunction::new(ParamNum::Fixed(1), |name, args, _| {
                unary(name, args, hex_digest::<Sha512>)
            }),
        );
        map.insert(
            "ripemd160",
            BuiltinFunction::new(ParamNum::Fixed(1), |name, args, _| {
                unary(name, args, hex_digest::<Ripemd160>)
            }),
        );
        map.insert(
            "length",
            BuiltinFunction::new(ParamNum::Fixed(1), |name, args, _| {
                unary(name, args, |s| s.len().to_string().into_bytes())
            }),
        );
        map.insert(
            "substr",
            BuiltinFunction::new(ParamNum::Fixed(3), |name, args, _| match args {
                [s, offset, length] => {
                    let offset = to_length(name, "offset", offset)?;
                    let length = to_length(name, "length", length)?;
                    Ok(substr(s, offset, length).to_vec())
                }
                _ => Err(arity_mismatch(name, 3, args.len())),
            }),
        );
        map.insert(
            "min",
            BuiltinFunction::new(ParamNum::Fixed(2), |name, args, _| match args {
                [a, b] => Ok(std::cmp::min(to_integer(name, a)?, to_integer(name, b)?).to_bytes()),
                _ => Err(arity_mismatch(name, 2, args.len())),
            }),
        );
        map.insert(
            "max",
            BuiltinFunction::new(ParamNum::Fixed(2), |name, args, _| match args {
                [a, b] => Ok(std::cmp::max(to_integer(name, a)?, to_integer(name, b)?).to_bytes()),
                _ => Err(arity_mismatch(name, 2, args.len())),
            }),
        );

        map
    });

/// Calls the builtin `name`, checking its arity first.
pub fn eval_builtin(
    name: &str,
    args: &[&[u8]],
    random: &dyn RandomSource,
) -> Result<Vec<u8>, EvalError> {
    BUILTIN_FUNCTIONS.get(name).map_or_else(
        || Err(EvalError::UndefinedFunction(SmolStr::new(name))),
        |f| {
            if f.num_params.is_valid(args.len()) {
                (f.func)(name, args, random)
            } else {
                Err(arity_mismatch(name, f.num_params.to_num(), args.len()))
            }
        },
    )
}

/// Applies an operator to already evaluated operands.
///
/// Arithmetic and bitwise operators take exactly two operands, each coerced
/// to an integer. Concatenation accepts any number of operands.
pub fn eval_operator(operator: Operator, args: &[&[u8]]) -> Result<Vec<u8>, EvalError> {
    match (operator, args) {
        (Operator::Concat, args) => Ok(concat(args)),
        (operator, [lhs, rhs]) => {
            let name = operator.symbol().to_string();
            let lhs = to_integer(&name, lhs)?;
            let rhs = to_integer(&name, rhs)?;
            arithmetic(operator, lhs, rhs).map(Integer::to_bytes)
        }
        (operator, args) => Err(arity_mismatch(
            &operator.symbol().to_string(),
            2,
            args.len(),
        )),
    }
}

pub fn arithmetic(operator: Operator, lhs: Integer, rhs: Integer) -> Result<Integer, EvalError> {
    let (l, r) = (lhs.value(), rhs.value());

    let result = match operator {
        Operator::Add => l.checked_add(r),
        Operator::Sub => l.checked_sub(r),
        Operator::Mul => l.checked_mul(r),
        Operator::Div | Operator::Rem if r == 0 => return Err(EvalError::ZeroDivision),
        Operator::Div => l.checked_div(r),
        Operator::Rem => l.checked_rem(r),
        Operator::BitAnd => Some(l & r),
        Operator::BitOr => Some(l | r),
        Operator::Concat => None,
    };

    result
        .map(Integer::new)
        .ok_or_else(|| EvalError::Overflow(SmolStr::new(operator.symbol().to_string())))
}

/// Joins operands into a single buffer sized up front.
pub fn concat(args: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(args.iter().map(|arg| arg.len()).sum());
    for arg in args {
        buf.extend_from_slice(arg);
    }
    buf
}

/// Byte substring with clamping.
///
/// An offset at or past the end yields an empty string. A zero length, or one
/// reaching the end, yields the remainder from `offset`.
pub fn substr(s: &[u8], offset: usize, length: usize) -> &[u8] {
    if offset >= s.len() {
        return &[];
    }

    if length == 0 || offset.saturating_add(length) >= s.len() {
        &s[offset..]
    } else {
        &s[offset..offset + length]
    }
}

/// Nibbles `[start, start + count)` of the hex MD5 digest of `input`,
/// clamped to the digest.
pub fn md5_nibbles(input: &[u8], start: usize, count: usize) -> Vec<u8> {
    let hex = md5_hex(input);
    let start = start.min(hex.len());
    let end = start.saturating_add(count).min(hex.len());
    hex[start..end].to_vec()
}

/// `input % divisor` after integer coercion of `input`.
pub fn modulo(name: &str, input: &[u8], divisor: Integer) -> Result<Vec<u8>, EvalError> {
    arithmetic(Operator::Rem, to_integer(name, input)?, divisor).map(Integer::to_bytes)
}

#[inline(always)]
pub fn to_integer(name: &str, value: &[u8]) -> Result<Integer, EvalError> {
    Integer::parse(value).ok_or_else(|| EvalError::coercion(name, value))
}

fn to_length(name: &str, what: &str, value: &[u8]) -> Result<usize, EvalError> {
    let n = to_integer(name, value)?;
    usize::try_from(n.value()).map_err(|_| {
        EvalError::InvalidArgument(SmolStr::new(name), format!("negative {} {}", what, n))
    })
}

#[inline(always)]
fn unary(name: &str, args: &[&[u8]], f: fn(&[u8]) -> Vec<u8>) -> Result<Vec<u8>, EvalError> {
    match args {
        [arg] => Ok(f(arg)),
        _ => Err(arity_mismatch(name, 1, args.len())),
    }
}

fn arity_mismatch(name: &str, expected: u8, got: usize) -> EvalError {
    EvalError::ArityMismatch(SmolStr::new(name), expected, got)
}

fn to_hex(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|b| {
            [
                HEX_DIGITS[usize::from(b >> 4)],
                HEX_DIGITS[usize::from(b & 0x0f)],
            ]
        })
        .collect()
}

fn md5_hex(input: &[u8]) -> Vec<u8> {
    to_hex(&md5::compute(input).0)
}

fn hex_digest<D: Digest>(input: &[u8]) -> Vec<u8> {
    to_hex(&D::digest(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::random::SeededRandom;
    use rstest::rstest;

    fn call(name: &str, args: &[&str]) -> Result<String, EvalError> {
        let args = args.iter().map(|a| a.as_bytes()).collect::<Vec<_>>();
        eval_builtin(name, &args, &SeededRandom::new(0))
            .map(|v| String::from_utf8(v).unwrap())
    }

    #[rstest]
    #[case::md4("md4", "", "31d6cfe0d16ae931b73c59d7e0c089c0")]
    #[case::md5("md5", "", "d41d8cd98f00b204e9800998ecf8427e")]
    #[case::md5_abc("md5", "abc", "900150983cd24fb0d6963f7d28e17f72")]
    #[case::sha1("sha1", "abc", "a9993e364706816aba3e25717850c26c9cd0d89d")]
    #[case::sha224("sha224", "abc", "23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7")]
    #[case::sha256("sha256", "abc", "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")]
    #[case::sha384("sha384", "abc", "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded1631a8b605a43ff5bed8086072ba1e7cc2358baeca134c825a7")]
    #[case::sha512("sha512", "abc", "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f")]
    #[case::ripemd160("ripemd160", "abc", "8eb208f7e05d987a9b044a8e98c6b087f15a0bfc")]
    #[case::length_empty("length", "", "0")]
    #[case::length("length", "abc", "3")]
    fn test_unary(#[case] name: &str, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(call(name, &[input]), Ok(expected.to_string()));
    }

    #[rstest]
    #[case::whole("hello", "0", "0", "hello")]
    #[case::middle("hello", "1", "3", "ell")]
    #[case::to_end("hello", "2", "3", "llo")]
    #[case::past_end("hello", "2", "10", "llo")]
    #[case::offset_at_len("hello", "5", "1", "")]
    #[case::offset_past_len("hello", "9", "0", "")]
    #[case::hex_args("hello", "0x1", "0x2", "el")]
    #[case::empty("", "0", "0", "")]
    fn test_substr(
        #[case] s: &str,
        #[case] offset: &str,
        #[case] length: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(call("substr", &[s, offset, length]), Ok(expected.to_string()));
    }

    #[rstest]
    #[case::negative_offset(&["hello", "-1", "2"])]
    #[case::negative_length(&["hello", "1", "-2"])]
    fn test_substr_invalid_argument(#[case] args: &[&str]) {
        assert!(matches!(
            call("substr", args),
            Err(EvalError::InvalidArgument(..))
        ));
    }

    #[rstest]
    #[case::min("min", "3", "7", Ok("3".to_string()))]
    #[case::max("max", "3", "7", Ok("7".to_string()))]
    #[case::max_negative("max", "-3", "-7", Ok("-3".to_string()))]
    #[case::min_hex("min", "0x10", "20", Ok("16".to_string()))]
    #[case::not_integer("min", "a", "1", Err(EvalError::coercion("min", b"a")))]
    fn test_min_max(
        #[case] name: &str,
        #[case] a: &str,
        #[case] b: &str,
        #[case] expected: Result<String, EvalError>,
    ) {
        assert_eq!(call(name, &[a, b]), expected);
    }

    #[test]
    fn test_rand() {
        let n: i64 = call("rand", &[]).unwrap().parse().unwrap();
        assert!(n >= 0);
    }

    #[rstest]
    #[case::undefined("nope", &["a"], Err(EvalError::UndefinedFunction(SmolStr::new("nope"))))]
    #[case::case_sensitive("MD5", &["a"], Err(EvalError::UndefinedFunction(SmolStr::new("MD5"))))]
    #[case::too_many("md5", &["a", "b"], Err(EvalError::ArityMismatch(SmolStr::new("md5"), 1, 2)))]
    #[case::rand_with_arg("rand", &["a"], Err(EvalError::ArityMismatch(SmolStr::new("rand"), 0, 1)))]
    #[case::too_few("substr", &["a"], Err(EvalError::ArityMismatch(SmolStr::new("substr"), 3, 1)))]
    fn test_eval_builtin_errors(
        #[case] name: &str,
        #[case] args: &[&str],
        #[case] expected: Result<String, EvalError>,
    ) {
        assert_eq!(call(name, args), expected);
    }

    #[rstest]
    #[case::add(Operator::Add, &["2", "3"], Ok("5"))]
    #[case::sub(Operator::Sub, &["2", "3"], Ok("-1"))]
    #[case::mul(Operator::Mul, &["-4", "3"], Ok("-12"))]
    #[case::div(Operator::Div, &["7", "2"], Ok("3"))]
    #[case::rem(Operator::Rem, &["7", "2"], Ok("1"))]
    #[case::and(Operator::BitAnd, &["12", "10"], Ok("8"))]
    #[case::or(Operator::BitOr, &["12", "10"], Ok("14"))]
    #[case::hex(Operator::Add, &["0x1F", "1"], Ok("32"))]
    #[case::concat(Operator::Concat, &["a", "", "bc"], Ok("abc"))]
    #[case::concat_single(Operator::Concat, &["a"], Ok("a"))]
    fn test_eval_operator(
        #[case] operator: Operator,
        #[case] args: &[&str],
        #[case] expected: Result<&str, EvalError>,
    ) {
        let args = args.iter().map(|a| a.as_bytes()).collect::<Vec<_>>();
        assert_eq!(
            eval_operator(operator, &args),
            expected.map(|s| s.as_bytes().to_vec())
        );
    }

    #[rstest]
    #[case::div_zero(Operator::Div, &["1", "0"], EvalError::ZeroDivision)]
    #[case::rem_zero(Operator::Rem, &["1", "0"], EvalError::ZeroDivision)]
    #[case::overflow(Operator::Add, &["9223372036854775807", "1"], EvalError::Overflow(SmolStr::new("+")))]
    #[case::min_div(Operator::Div, &["-9223372036854775808", "-1"], EvalError::Overflow(SmolStr::new("/")))]
    #[case::coercion(Operator::Mul, &["2", "x"], EvalError::coercion("*", b"x"))]
    #[case::arity(Operator::Add, &["1", "2", "3"], EvalError::ArityMismatch(SmolStr::new("+"), 2, 3))]
    fn test_eval_operator_errors(
        #[case] operator: Operator,
        #[case] args: &[&str],
        #[case] expected: EvalError,
    ) {
        let args = args.iter().map(|a| a.as_bytes()).collect::<Vec<_>>();
        assert_eq!(eval_operator(operator, &args), Err(expected));
    }

    #[rstest]
    #[case::first_byte(0, 2, "d4")]
    #[case::odd_start(1, 3, "41d")]
    #[case::clamped(30, 10, "7e")]
    #[case::past_end(40, 2, "")]
    #[case::zero_count(3, 0, "")]
    fn test_md5_nibbles(#[case] start: usize, #[case] count: usize, #[case] expected: &str) {
        assert_eq!(md5_nibbles(b"", start, count), expected.as_bytes().to_vec());
    }

    #[rstest]
    #[case("17", 5, Ok(b"2".to_vec()))]
    #[case("0x11", 16, Ok(b"1".to_vec()))]
    #[case("abc", 3, Err(EvalError::coercion("let_mod", b"abc")))]
    fn test_modulo(#[case] input: &str, #[case] divisor: i64, #[case] expected: Result<Vec<u8>, EvalError>) {
        assert_eq!(
            modulo("let_mod", input.as_bytes(), Integer::new(divisor)),
            expected
        );
    }
}
