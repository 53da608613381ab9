use crate::containers::StorageKey;

/// A reversible integer cell, read and written through
/// [`TrailedValues`](super::TrailedValues).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TrailedInteger {
    id: u32,
}

impl StorageKey for TrailedInteger {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        Self { id: index as u32 }
    }
}

/// A contiguous range of [`TrailedInteger`]s, used for the per-value cells of a variable or a
/// cost function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TrailedBlock {
    start: u32,
    len: u32,
}

impl TrailedBlock {
    pub(crate) fn new(start: TrailedInteger, len: usize) -> Self {
        Self {
            start: start.id,
            len: len as u32,
        }
    }

    /// The cell at offset `index` in the block.
    pub(crate) fn at(&self, index: usize) -> TrailedInteger {
        debug_assert!(index < self.len as usize);
        TrailedInteger {
            id: self.start + index as u32,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len as usize
    }
}
