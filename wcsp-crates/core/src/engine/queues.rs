use std::collections::BinaryHeap;
use std::collections::VecDeque;

use enum_map::Enum;
use enum_map::EnumMap;
use enumset::EnumSetType;

use super::VariableId;
use crate::containers::KeyedVec;
use crate::wcsp_assert_moderate;

/// The kinds of variable events of the fixpoint.
#[derive(Debug, Enum, EnumSetType)]
pub(crate) enum QueueKind {
    /// The cost functions of an assigned variable still need to take the assignment into account.
    Assign,
    Eliminate,
    /// A unary cost changed or the bounds moved; forbidden values may need to be removed.
    Nc,
    /// A value was removed.
    Ac,
    /// A unary cost became positive; ordered by decreasing DAC order.
    Dac,
    Eac1,
    Eac2,
    Dee,
    FullEac,
}

/// A queue of variables without duplicates.
///
/// The DAC queue pops the variable of largest priority first, all other queues are first in first
/// out. Removing a variable is lazy: its stale entry is skipped when it reaches the front.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventQueue {
    fifo: VecDeque<VariableId>,
    by_priority: BinaryHeap<(u32, VariableId)>,
    is_enqueued: KeyedVec<VariableId, bool>,
    num_enqueued: usize,
}

impl EventQueue {
    pub(crate) fn is_empty(&self) -> bool {
        self.num_enqueued == 0
    }

    pub(crate) fn is_enqueued(&self, variable: VariableId) -> bool {
        self.is_enqueued
            .get(variable)
            .copied()
            .unwrap_or_default()
    }

    fn mark_enqueued(&mut self, variable: VariableId) -> bool {
        if self.is_enqueued(variable) {
            return false;
        }
        self.is_enqueued.accomodate(variable, false);
        self.is_enqueued[variable] = true;
        self.num_enqueued += 1;
        true
    }

    pub(crate) fn enqueue(&mut self, variable: VariableId) {
        if self.mark_enqueued(variable) {
            self.fifo.push_back(variable);
        }
    }

    pub(crate) fn enqueue_with_priority(&mut self, variable: VariableId, priority: u32) {
        if self.mark_enqueued(variable) {
            self.by_priority.push((priority, variable));
        }
    }

    pub(crate) fn pop(&mut self) -> Option<VariableId> {
        while let Some(variable) = self
            .by_priority
            .pop()
            .map(|(_, variable)| variable)
            .or_else(|| self.fifo.pop_front())
        {
            if self.is_enqueued(variable) {
                self.is_enqueued[variable] = false;
                self.num_enqueued -= 1;
                return Some(variable);
            }
        }

        wcsp_assert_moderate!(self.num_enqueued == 0);
        None
    }

    pub(crate) fn remove(&mut self, variable: VariableId) {
        if self.is_enqueued(variable) {
            self.is_enqueued[variable] = false;
            self.num_enqueued -= 1;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.fifo.clear();
        self.by_priority.clear();
        for is_enqueued in self.is_enqueued.iter_mut() {
            *is_enqueued = false;
        }
        self.num_enqueued = 0;
    }
}

/// One [`EventQueue`] per [`QueueKind`].
#[derive(Debug, Clone, Default)]
pub(crate) struct PropagationQueues {
    queues: EnumMap<QueueKind, EventQueue>,
}

impl PropagationQueues {
    pub(crate) fn get(&self, kind: QueueKind) -> &EventQueue {
        &self.queues[kind]
    }

    pub(crate) fn get_mut(&mut self, kind: QueueKind) -> &mut EventQueue {
        &mut self.queues[kind]
    }

    pub(crate) fn pop(&mut self, kind: QueueKind) -> Option<VariableId> {
        self.queues[kind].pop()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queues.values().all(EventQueue::is_empty)
    }

    pub(crate) fn clear(&mut self) {
        self.queues.values_mut().for_each(EventQueue::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::StorageKey;

    fn variable(index: usize) -> VariableId {
        VariableId::create_from_index(index)
    }

    #[test]
    fn variables_are_enqueued_once() {
        let mut queue = EventQueue::default();

        queue.enqueue(variable(1));
        queue.enqueue(variable(0));
        queue.enqueue(variable(1));

        assert_eq!(Some(variable(1)), queue.pop());
        assert_eq!(Some(variable(0)), queue.pop());
        assert_eq!(None, queue.pop());
        assert!(queue.is_empty());
    }

    #[test]
    fn the_largest_priority_is_popped_first() {
        let mut queue = EventQueue::default();

        queue.enqueue_with_priority(variable(0), 3);
        queue.enqueue_with_priority(variable(1), 7);
        queue.enqueue_with_priority(variable(2), 5);

        assert_eq!(Some(variable(1)), queue.pop());
        assert_eq!(Some(variable(2)), queue.pop());
        assert_eq!(Some(variable(0)), queue.pop());
        assert_eq!(None, queue.pop());
    }

    #[test]
    fn removed_variables_are_skipped() {
        let mut queue = EventQueue::default();

        queue.enqueue(variable(0));
        queue.enqueue(variable(1));
        queue.remove(variable(0));

        assert!(!queue.is_enqueued(variable(0)));
        assert_eq!(Some(variable(1)), queue.pop());
        assert_eq!(None, queue.pop());

        queue.enqueue(variable(0));
        assert_eq!(Some(variable(0)), queue.pop());
    }

    #[test]
    fn clearing_empties_every_queue() {
        let mut queues = PropagationQueues::default();
        queues.get_mut(QueueKind::Nc).enqueue(variable(2));
        queues
            .get_mut(QueueKind::Dac)
            .enqueue_with_priority(variable(1), 1);

        queues.clear();

        assert!(queues.is_empty());
        assert_eq!(None, queues.pop(QueueKind::Dac));
        assert!(!queues.get(QueueKind::Nc).is_enqueued(variable(2)));
    }
}
