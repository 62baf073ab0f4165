use crate::arena::{ArenaId, ValueArena};

/// The result of evaluating one node.
///
/// Either a borrow of bytes that outlive the evaluation (literal payloads,
/// host variables, captures) or a buffer owned by the request arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    Borrowed(&'a [u8]),
    Allocated(ArenaId<Vec<u8>>),
}

impl<'a> Value<'a> {
    pub const EMPTY: Value<'static> = Value::Borrowed(&[]);

    /// Moves `bytes` into the arena.
    pub fn alloc(arena: &mut ValueArena, bytes: Vec<u8>) -> Self {
        Value::Allocated(arena.alloc(bytes))
    }

    pub fn as_bytes<'s>(&'s self, arena: &'s ValueArena) -> &'s [u8] {
        match self {
            Value::Borrowed(bytes) => bytes,
            Value::Allocated(id) => arena.get(*id).map(Vec::as_slice).unwrap_or_default(),
        }
    }

    pub fn to_vec(&self, arena: &ValueArena) -> Vec<u8> {
        self.as_bytes(arena).to_vec()
    }

    pub fn is_allocated(&self) -> bool {
        matches!(self, Value::Allocated(_))
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Value::Borrowed(bytes)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(s: &'a str) -> Self {
        Value::Borrowed(s.as_bytes())
    }
}
