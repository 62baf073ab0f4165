use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Handle to a value stored in an [`Arena`].
///
/// Handles are only meaningful for the arena that issued them.
pub struct ArenaId<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ArenaId<T> {
    pub const fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl<T> Copy for ArenaId<T> {}

impl<T> Clone for ArenaId<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for ArenaId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for ArenaId<T> {}

impl<T> Hash for ArenaId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for ArenaId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaId({})", self.index)
    }
}

/// Append-only storage released as a whole.
///
/// Nothing is freed individually; dropping the arena drops every value it
/// holds. One [`ValueArena`] lives for the duration of one request.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    items: Vec<T>,
}

/// Buffers produced while evaluating one request.
pub type ValueArena = Arena<Vec<u8>>;

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Arena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn alloc(&mut self, value: T) -> ArenaId<T> {
        let id = ArenaId::new(self.items.len() as u32);
        self.items.push(value);
        id
    }

    pub fn get(&self, id: ArenaId<T>) -> Option<&T> {
        self.items.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ValueArena {
    /// Total payload bytes held by the arena.
    pub fn allocated_bytes(&self) -> usize {
        self.items.iter().map(Vec::len).sum()
    }
}
