use super::TrailedBlock;
use super::TrailedChange;
use super::TrailedInteger;
use crate::basic_types::Trail;
use crate::containers::KeyedVec;

/// The reversible store: every backtrackable field of the network is a [`TrailedInteger`] in
/// here.
///
/// A write pushes the previous value on the trail, unless the value does not change.
/// Synchronising to an earlier checkpoint replays the trail backwards.
#[derive(Default, Debug, Clone)]
pub(crate) struct TrailedValues {
    trail: Trail<TrailedChange>,
    values: KeyedVec<TrailedInteger, i64>,
}

impl TrailedValues {
    pub(crate) fn grow(&mut self, initial_value: i64) -> TrailedInteger {
        self.values.push(initial_value)
    }

    /// Allocates consecutive cells holding `initial_values`.
    pub(crate) fn grow_block(&mut self, initial_values: impl IntoIterator<Item = i64>) -> TrailedBlock {
        let start = self.values.next_key();
        let mut len = 0;
        for initial_value in initial_values {
            let _ = self.values.push(initial_value);
            len += 1;
        }
        TrailedBlock::new(start, len)
    }

    pub(crate) fn new_checkpoint(&mut self) {
        self.trail.new_checkpoint()
    }

    pub(crate) fn get_checkpoint(&self) -> usize {
        self.trail.get_checkpoint()
    }

    pub(crate) fn read(&self, trailed_integer: TrailedInteger) -> i64 {
        self.values[trailed_integer]
    }

    pub(crate) fn synchronise(&mut self, new_checkpoint: usize) {
        self.trail
            .synchronise(new_checkpoint)
            .for_each(|change| self.values[change.reference] = change.old_value)
    }

    fn write(&mut self, trailed_integer: TrailedInteger, value: i64) {
        let old_value = self.values[trailed_integer];
        if old_value == value {
            return;
        }
        self.trail.push(TrailedChange {
            old_value,
            reference: trailed_integer,
        });
        self.values[trailed_integer] = value;
    }

    pub(crate) fn assign(&mut self, trailed_integer: TrailedInteger, value: i64) {
        self.write(trailed_integer, value);
    }

    pub(crate) fn add_assign(&mut self, trailed_integer: TrailedInteger, addition: i64) {
        self.write(trailed_integer, self.values[trailed_integer] + addition);
    }

    /// The number of writes recorded since the last checkpoint.
    #[cfg(test)]
    pub(crate) fn num_changes_at_current_checkpoint(&self) -> usize {
        self.trail
            .values_at_checkpoint(self.trail.get_checkpoint())
            .len()
    }

    /// A copy of every cell, for comparing states in tests.
    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Vec<i64> {
        self.values.iter().copied().collect()
    }
}
