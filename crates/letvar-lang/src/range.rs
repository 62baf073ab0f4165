use std::fmt;

use nom_locate::LocatedSpan;

pub type Span<'a> = LocatedSpan<&'a str>;

/// 1-based line and column (in characters) within a directive file.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash)]
pub struct Position {
    pub line: u32,
    pub column: usize,
}

impl Position {
    pub fn new(line: u32, column: usize) -> Self {
        Self { line, column }
    }

    fn advance(self, columns: usize) -> Self {
        Self::new(self.line, self.column + columns)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl<'a> From<Span<'a>> for Position {
    fn from(span: Span<'a>) -> Self {
        Self::new(span.location_line(), span.get_utf8_column())
    }
}

/// Half-open source range `[start, end)`.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Default, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// The one-character range starting at `start`.
    pub fn single(start: Position) -> Self {
        Self::new(start, start.advance(1))
    }
}

impl<'a> From<Span<'a>> for Range {
    fn from(span: Span<'a>) -> Self {
        let start = Position::from(span);
        Self::new(start, start.advance(span.fragment().chars().count()))
    }
}
