use std::fmt::Display;
use std::fmt::Formatter;

use super::TrailedBlock;
use super::TrailedInteger;
use super::TrailedValues;
use crate::basic_types::Cost;
use crate::containers::StorageKey;
use crate::cost_functions::CostFunctionLink;

/// A handle to a variable of a [`Network`](super::Network).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId {
    id: u32,
}

impl StorageKey for VariableId {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        Self { id: index as u32 }
    }
}

impl Display for VariableId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{}", self.id)
    }
}

/// The reversible cells of a variable.
///
/// Values are addressed by their index in the initial domain. A value is in the domain when it
/// lies within `[inf, sup]` and its presence cell is set. The unary cost of a value is its cost
/// cell minus `delta_cost`, so that removing a constant from every value is a single write.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VariableCells {
    pub(crate) costs: TrailedBlock,
    pub(crate) present: TrailedBlock,
    pub(crate) delta_cost: TrailedInteger,
    pub(crate) inf: TrailedInteger,
    pub(crate) sup: TrailedInteger,
    pub(crate) size: TrailedInteger,
    pub(crate) support: TrailedInteger,
    pub(crate) max_cost_value: TrailedInteger,
    pub(crate) max_cost: TrailedInteger,
    pub(crate) full_eac: TrailedInteger,
    pub(crate) eliminated: TrailedInteger,
}

impl VariableCells {
    pub(crate) fn new(trailed_values: &mut TrailedValues, present: &[bool]) -> Self {
        let num_values = present.len();
        let first = present.iter().position(|&is_present| is_present).unwrap_or(0);
        let last = present.iter().rposition(|&is_present| is_present).unwrap_or(0);
        let size = present.iter().filter(|&&is_present| is_present).count();

        let costs = trailed_values.grow_block(std::iter::repeat(0).take(num_values));
        let present_block =
            trailed_values.grow_block(present.iter().map(|&is_present| i64::from(is_present)));

        VariableCells {
            costs,
            present: present_block,
            delta_cost: trailed_values.grow(0),
            inf: trailed_values.grow(first as i64),
            sup: trailed_values.grow(last as i64),
            size: trailed_values.grow(size as i64),
            support: trailed_values.grow(first as i64),
            max_cost_value: trailed_values.grow(first as i64),
            max_cost: trailed_values.grow(0),
            full_eac: trailed_values.grow(0),
            eliminated: trailed_values.grow(0),
        }
    }

    pub(crate) fn inf(&self, trailed_values: &TrailedValues) -> usize {
        trailed_values.read(self.inf) as usize
    }

    pub(crate) fn sup(&self, trailed_values: &TrailedValues) -> usize {
        trailed_values.read(self.sup) as usize
    }

    pub(crate) fn size(&self, trailed_values: &TrailedValues) -> usize {
        trailed_values.read(self.size) as usize
    }

    pub(crate) fn is_assigned(&self, trailed_values: &TrailedValues) -> bool {
        self.size(trailed_values) == 1
    }

    pub(crate) fn support(&self, trailed_values: &TrailedValues) -> usize {
        trailed_values.read(self.support) as usize
    }

    pub(crate) fn max_cost_value(&self, trailed_values: &TrailedValues) -> usize {
        trailed_values.read(self.max_cost_value) as usize
    }

    pub(crate) fn max_cost(&self, trailed_values: &TrailedValues) -> Cost {
        trailed_values.read(self.max_cost)
    }

    pub(crate) fn is_eliminated(&self, trailed_values: &TrailedValues) -> bool {
        trailed_values.read(self.eliminated) != 0
    }

    pub(crate) fn is_full_eac(&self, trailed_values: &TrailedValues) -> bool {
        trailed_values.read(self.full_eac) != 0
    }

    pub(crate) fn contains(&self, trailed_values: &TrailedValues, index: usize) -> bool {
        index < self.present.len()
            && self.inf(trailed_values) <= index
            && index <= self.sup(trailed_values)
            && self.is_present(trailed_values, index)
    }

    /// Whether the value at `index` was not removed as a hole; the bounds are not checked.
    pub(crate) fn is_present(&self, trailed_values: &TrailedValues, index: usize) -> bool {
        trailed_values.read(self.present.at(index)) != 0
    }

    /// The unary cost of the value at `index`, whether or not it is still in the domain.
    pub(crate) fn unary_cost(&self, trailed_values: &TrailedValues, index: usize) -> Cost {
        trailed_values.read(self.costs.at(index)) - trailed_values.read(self.delta_cost)
    }

    /// The smallest value in the domain which is larger than `index`.
    pub(crate) fn next(&self, trailed_values: &TrailedValues, index: usize) -> Option<usize> {
        let sup = self.sup(trailed_values);
        ((index + 1).max(self.inf(trailed_values))..=sup)
            .find(|&next| self.is_present(trailed_values, next))
    }

    /// The values of the domain, in increasing order.
    pub(crate) fn iter(self, trailed_values: &TrailedValues) -> impl Iterator<Item = usize> + '_ {
        (self.inf(trailed_values)..=self.sup(trailed_values))
            .filter(move |&index| self.is_present(trailed_values, index))
    }
}

/// A variable with a finite domain of integer values.
#[derive(Debug)]
pub(crate) struct Variable {
    pub(crate) name: Option<String>,
    /// The initial domain, in increasing order; a value is referred to by its index in here.
    pub(crate) values: Box<[i32]>,
    pub(crate) cells: VariableCells,
    /// Every cost function the variable was ever part of, connected or not.
    pub(crate) links: Vec<CostFunctionLink>,
    pub(crate) dac_order: u32,
    /// The value of the incumbent solution, preferred on ties.
    pub(crate) best_value: Option<usize>,
}

impl Variable {
    pub(crate) fn index_of(&self, value: i32) -> Option<usize> {
        self.values.binary_search(&value).ok()
    }

    pub(crate) fn value_of(&self, index: usize) -> i32 {
        self.values[index]
    }
}
