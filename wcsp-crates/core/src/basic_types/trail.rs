use std::iter::Rev;
use std::ops::Deref;
use std::vec::Drain;

use crate::wcsp_assert_simple;

/// An undo log which is split into segments, one per checkpoint.
///
/// Entries pushed after [`Trail::new_checkpoint`] belong to the new checkpoint and are handed
/// back, most recent first, when [`Trail::synchronise`] returns to an earlier checkpoint.
#[derive(Clone, Debug)]
pub(crate) struct Trail<T> {
    current_checkpoint: usize,
    /// At index i is the position where the segment of checkpoint i ends (exclusive).
    segment_ends: Vec<usize>,
    entries: Vec<T>,
}

impl<T> Default for Trail<T> {
    fn default() -> Self {
        Trail {
            current_checkpoint: 0,
            segment_ends: Vec::new(),
            entries: Vec::new(),
        }
    }
}

impl<T> Trail<T> {
    pub(crate) fn new_checkpoint(&mut self) {
        self.current_checkpoint += 1;
        self.segment_ends.push(self.entries.len());
    }

    pub(crate) fn get_checkpoint(&self) -> usize {
        self.current_checkpoint
    }

    /// The entries that were pushed while `checkpoint` was the current checkpoint.
    pub(crate) fn values_at_checkpoint(&self, checkpoint: usize) -> &[T] {
        wcsp_assert_simple!(checkpoint <= self.current_checkpoint);

        let start = if checkpoint == 0 {
            0
        } else {
            self.segment_ends[checkpoint - 1]
        };
        let end = if checkpoint == self.current_checkpoint {
            self.entries.len()
        } else {
            self.segment_ends[checkpoint]
        };

        &self.entries[start..end]
    }

    /// Returns to `new_checkpoint`, yielding the removed entries in reverse chronological order.
    pub(crate) fn synchronise(&mut self, new_checkpoint: usize) -> Rev<Drain<'_, T>> {
        wcsp_assert_simple!(
            new_checkpoint < self.current_checkpoint,
            "cannot restore to checkpoint {new_checkpoint} from checkpoint {}",
            self.current_checkpoint
        );

        let new_len = self.segment_ends[new_checkpoint];

        self.current_checkpoint = new_checkpoint;
        self.segment_ends.truncate(new_checkpoint);
        self.entries.drain(new_len..).rev()
    }

    pub(crate) fn push(&mut self, entry: T) {
        self.entries.push(entry)
    }
}

impl<T> Deref for Trail<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}
