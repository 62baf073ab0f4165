use std::fmt;

const HEX_PREFIX: &[u8] = b"0x";

/// A signed integer coerced from a byte-string value.
///
/// Values are written either in decimal (`42`, `-7`) or as `0x`-prefixed
/// hexadecimal (`0x1F`). Anything else, including surrounding whitespace,
/// is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Integer(i64);

impl Integer {
    /// Creates a new `Integer` from an `i64` value.
    pub const fn new(value: i64) -> Self {
        Integer(value)
    }

    /// Returns the underlying `i64` value.
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Parses `bytes` as a decimal or `0x`-prefixed hexadecimal integer.
    ///
    /// Returns `None` for empty input, stray characters and values that do
    /// not fit in an `i64`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > HEX_PREFIX.len() && bytes.starts_with(HEX_PREFIX) {
            Self::parse_hex(&bytes[HEX_PREFIX.len()..])
        } else {
            Self::parse_decimal(bytes)
        }
    }

    fn parse_hex(digits: &[u8]) -> Option<Self> {
        digits
            .iter()
            .try_fold(0i64, |acc, b| {
                let digit = char::from(*b).to_digit(16)?;
                acc.checked_mul(16)?.checked_add(i64::from(digit))
            })
            .map(Integer)
    }

    fn parse_decimal(bytes: &[u8]) -> Option<Self> {
        let (negative, digits) = match bytes.split_first() {
            Some((b'-', rest)) => (true, rest),
            _ => (false, bytes),
        };

        if digits.is_empty() {
            return None;
        }

        // Accumulate towards the sign so that i64::MIN stays representable.
        digits
            .iter()
            .try_fold(0i64, |acc, b| {
                let digit = i64::from(char::from(*b).to_digit(10)?);
                let acc = acc.checked_mul(10)?;
                if negative {
                    acc.checked_sub(digit)
                } else {
                    acc.checked_add(digit)
                }
            })
            .map(Integer)
    }

    /// Renders the minimal decimal representation.
    pub fn to_bytes(self) -> Vec<u8> {
        self.0.to_string().into_bytes()
    }
}

impl From<i64> for Integer {
    fn from(value: i64) -> Self {
        Integer(value)
    }
}

impl From<Integer> for i64 {
    fn from(value: Integer) -> Self {
        value.0
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
