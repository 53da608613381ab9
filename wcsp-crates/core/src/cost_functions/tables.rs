//! The table layouts of the cost functions of each arity.
use std::fmt::Debug;

use crate::basic_types::Cost;
use crate::basic_types::MAX_COST;
use crate::containers::HashMap;

/// The cost of a tuple of an N-ary cost function given by a rule instead of a table.
///
/// This is the hook through which global cost functions are added to a network: the network
/// enumerates tuples and calls [`TableFunction::cost`], doing all of the cost bookkeeping
/// itself. Costs at or above [`MAX_COST`] are forbidden.
pub trait TableFunction: Debug + Send {
    /// The cost of `values`, given in scope order.
    fn cost(&self, values: &[i32]) -> Cost;
}

/// The table of an N-ary cost function, as given to
/// [`Network::add_nary_cost_function`](crate::Network::add_nary_cost_function).
#[derive(Debug)]
pub enum NaryTable {
    /// One cost per tuple of the initial domains, the last variable of the scope varying fastest.
    Dense(Vec<Cost>),
    /// Every tuple costs `default`, except the listed tuples of values.
    Sparse {
        default: Cost,
        exceptions: Vec<(Vec<i32>, Cost)>,
    },
    Implicit(Box<dyn TableFunction>),
}

/// The index of `tuple` in a row-major table over domains of the given sizes.
pub(crate) fn dense_index(sizes: &[usize], tuple: &[usize]) -> usize {
    sizes
        .iter()
        .zip(tuple)
        .fold(0, |index, (&size, &value)| index * size + value)
}

/// The cost stored in a table, and an update of it.
///
/// Tuples are given in scope order as indices into the initial domains.
pub(crate) trait CostTable {
    fn table_cost(&self, tuple: &[usize]) -> Cost;

    /// Overwrites the cost of `tuple`; costs at or above [`MAX_COST`] are stored as `MAX_COST`.
    fn set_table_cost(&mut self, tuple: &[usize], cost: Cost);
}

#[derive(Debug)]
pub(crate) struct UnaryTable {
    pub(crate) costs: Box<[Cost]>,
}

impl CostTable for UnaryTable {
    fn table_cost(&self, tuple: &[usize]) -> Cost {
        self.costs[tuple[0]]
    }

    fn set_table_cost(&mut self, tuple: &[usize], cost: Cost) {
        self.costs[tuple[0]] = cost.min(MAX_COST);
    }
}

#[derive(Debug)]
pub(crate) struct BinaryTable {
    pub(crate) num_columns: usize,
    pub(crate) costs: Box<[Cost]>,
}

impl CostTable for BinaryTable {
    fn table_cost(&self, tuple: &[usize]) -> Cost {
        self.costs[tuple[0] * self.num_columns + tuple[1]]
    }

    fn set_table_cost(&mut self, tuple: &[usize], cost: Cost) {
        self.costs[tuple[0] * self.num_columns + tuple[1]] = cost.min(MAX_COST);
    }
}

/// Marks a pair of values of the other two positions for which no value of a functional
/// position has a cost below [`MAX_COST`].
const NO_VALUE: u32 = u32::MAX;

#[derive(Debug)]
enum TernaryStorage {
    Dense(Box<[Cost]>),
    /// The costs of the tuples in which `position` takes the value given by its functional
    /// dependency, indexed by the pair of values of the other two positions. All other tuples are
    /// forbidden.
    Functional {
        position: usize,
        costs: Box<[Cost]>,
    },
}

/// A ternary table which keeps track of its functional positions.
///
/// A position is functional when, for every pair of values of the other two positions, at most
/// one of its values has a cost below [`MAX_COST`]. The table of the first functional position is
/// stored in two dimensions.
#[derive(Debug)]
pub(crate) struct TernaryTable {
    sizes: [usize; 3],
    storage: TernaryStorage,
    /// For each functional position, the value it takes for each pair of values of the other two
    /// positions.
    functions: [Option<Box<[u32]>>; 3],
}

/// The two positions of a ternary scope other than `position`.
fn other_positions(position: usize) -> (usize, usize) {
    match position {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

impl TernaryTable {
    /// Builds the table from dense costs, detecting the functional positions.
    pub(crate) fn new(sizes: [usize; 3], costs: Box<[Cost]>) -> Self {
        let functions = [0, 1, 2].map(|position| Self::detect_function(sizes, &costs, position));
        let mut table = TernaryTable {
            sizes,
            storage: TernaryStorage::Dense(costs),
            functions,
        };

        if let Some(position) = table.functions.iter().position(Option::is_some) {
            let (first, second) = other_positions(position);
            let mut compact = vec![MAX_COST; sizes[first] * sizes[second]];
            for (pair, cost) in compact.iter_mut().enumerate() {
                let mut tuple = [0; 3];
                tuple[first] = pair / sizes[second];
                tuple[second] = pair % sizes[second];
                if let Some(value) = table.function_value(position, &tuple) {
                    tuple[position] = value;
                    *cost = table.table_cost(&tuple);
                }
            }
            table.storage = TernaryStorage::Functional {
                position,
                costs: compact.into(),
            };
        }

        table
    }

    fn detect_function(sizes: [usize; 3], costs: &[Cost], position: usize) -> Option<Box<[u32]>> {
        let (first, second) = other_positions(position);
        let mut function = vec![NO_VALUE; sizes[first] * sizes[second]];

        for (pair, value_of_position) in function.iter_mut().enumerate() {
            let mut tuple = [0; 3];
            tuple[first] = pair / sizes[second];
            tuple[second] = pair % sizes[second];
            for value in 0..sizes[position] {
                tuple[position] = value;
                if costs[dense_index(&sizes, &tuple)] >= MAX_COST {
                    continue;
                }
                if *value_of_position != NO_VALUE {
                    return None;
                }
                *value_of_position = value as u32;
            }
        }

        Some(function.into())
    }

    fn pair_index(&self, position: usize, tuple: &[usize]) -> usize {
        let (first, second) = other_positions(position);
        tuple[first] * self.sizes[second] + tuple[second]
    }

    pub(crate) fn is_functional(&self, position: usize) -> bool {
        self.functions[position].is_some()
    }

    /// The only value of the functional `position` which is not forbidden together with the
    /// values of the other two positions in `tuple`.
    pub(crate) fn function_value(&self, position: usize, tuple: &[usize]) -> Option<usize> {
        let function = self.functions[position].as_ref()?;
        let value = function[self.pair_index(position, tuple)];
        (value != NO_VALUE).then_some(value as usize)
    }

    fn to_dense(&self) -> Box<[Cost]> {
        let mut costs = vec![MAX_COST; self.sizes.iter().product()];
        for (index, cost) in costs.iter_mut().enumerate() {
            let tuple = [
                index / (self.sizes[1] * self.sizes[2]),
                (index / self.sizes[2]) % self.sizes[1],
                index % self.sizes[2],
            ];
            *cost = self.table_cost(&tuple);
        }
        costs.into()
    }
}

impl CostTable for TernaryTable {
    fn table_cost(&self, tuple: &[usize]) -> Cost {
        match &self.storage {
            TernaryStorage::Dense(costs) => costs[dense_index(&self.sizes, tuple)],
            TernaryStorage::Functional { position, costs } => {
                if self.function_value(*position, tuple) == Some(tuple[*position]) {
                    costs[self.pair_index(*position, tuple)]
                } else {
                    MAX_COST
                }
            }
        }
    }

    fn set_table_cost(&mut self, tuple: &[usize], cost: Cost) {
        let cost = cost.min(MAX_COST);

        // A position stops being functional when a second value of it becomes allowed.
        let breaks = |table: &Self, position: usize| {
            cost < MAX_COST
                && table
                    .function_value(position, tuple)
                    .is_some_and(|value| value != tuple[position])
        };
        if let TernaryStorage::Functional { position, .. } = self.storage {
            if breaks(self, position) {
                self.storage = TernaryStorage::Dense(self.to_dense());
            }
        }
        for position in 0..3 {
            if breaks(self, position) {
                self.functions[position] = None;
                continue;
            }
            let pair = self.pair_index(position, tuple);
            if let Some(function) = self.functions[position].as_mut() {
                if cost < MAX_COST {
                    function[pair] = tuple[position] as u32;
                } else if function[pair] == tuple[position] as u32 {
                    function[pair] = NO_VALUE;
                }
            }
        }

        match &mut self.storage {
            TernaryStorage::Dense(costs) => costs[dense_index(&self.sizes, tuple)] = cost,
            TernaryStorage::Functional { position, costs } => {
                let (first, second) = other_positions(*position);
                let pair = tuple[first] * self.sizes[second] + tuple[second];
                if let Some(function) = &self.functions[*position] {
                    if function[pair] == tuple[*position] as u32 || function[pair] == NO_VALUE {
                        costs[pair] = cost;
                    }
                }
            }
        }
    }
}

/// The storage of an N-ary table, with values translated to indices.
#[derive(Debug)]
pub(crate) enum NaryStorage {
    Dense(Box<[Cost]>),
    Sparse {
        default: Cost,
        exceptions: HashMap<Box<[usize]>, Cost>,
    },
    Implicit {
        function: Box<dyn TableFunction>,
        /// The initial domain of every position, to translate indices back to values.
        values: Box<[Box<[i32]>]>,
        /// Costs set after construction.
        overrides: HashMap<Box<[usize]>, Cost>,
    },
}

#[derive(Debug)]
pub(crate) struct NaryTableStorage {
    pub(crate) sizes: Box<[usize]>,
    pub(crate) storage: NaryStorage,
}

impl CostTable for NaryTableStorage {
    fn table_cost(&self, tuple: &[usize]) -> Cost {
        match &self.storage {
            NaryStorage::Dense(costs) => costs[dense_index(&self.sizes, tuple)],
            NaryStorage::Sparse {
                default,
                exceptions,
            } => exceptions.get(tuple).copied().unwrap_or(*default),
            NaryStorage::Implicit {
                function,
                values,
                overrides,
            } => overrides.get(tuple).copied().unwrap_or_else(|| {
                let values = tuple
                    .iter()
                    .zip(values.iter())
                    .map(|(&index, domain)| domain[index])
                    .collect::<Vec<_>>();
                function.cost(&values).clamp(0, MAX_COST)
            }),
        }
    }

    fn set_table_cost(&mut self, tuple: &[usize], cost: Cost) {
        let cost = cost.min(MAX_COST);
        match &mut self.storage {
            NaryStorage::Dense(costs) => costs[dense_index(&self.sizes, tuple)] = cost,
            NaryStorage::Sparse { exceptions, .. }
            | NaryStorage::Implicit {
                overrides: exceptions,
                ..
            } => {
                let _ = exceptions.insert(tuple.into(), cost);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ternary_costs(sizes: [usize; 3], cost: impl Fn([usize; 3]) -> Cost) -> Box<[Cost]> {
        let mut costs = Vec::new();
        for a in 0..sizes[0] {
            for b in 0..sizes[1] {
                for c in 0..sizes[2] {
                    costs.push(cost([a, b, c]));
                }
            }
        }
        costs.into()
    }

    #[test]
    fn a_sum_constraint_is_functional_in_every_position() {
        // z = x + y over x, y in 0..2 and z in 0..3.
        let sizes = [2, 2, 3];
        let table = TernaryTable::new(
            sizes,
            ternary_costs(sizes, |[x, y, z]| if x + y == z { x as Cost } else { MAX_COST }),
        );

        assert!(table.is_functional(2));
        assert!(table.is_functional(0));
        assert!(table.is_functional(1));
        assert_eq!(table.function_value(2, &[1, 1, 0]), Some(2));
        assert_eq!(table.table_cost(&[1, 0, 1]), 1);
        assert_eq!(table.table_cost(&[1, 0, 2]), MAX_COST);
    }

    #[test]
    fn a_table_without_forbidden_tuples_is_not_functional() {
        let sizes = [2, 2, 2];
        let table = TernaryTable::new(sizes, ternary_costs(sizes, |[x, y, z]| (x + y + z) as Cost));

        assert!((0..3).all(|position| !table.is_functional(position)));
        assert_eq!(table.table_cost(&[1, 1, 1]), 3);
    }

    #[test]
    fn allowing_a_second_value_breaks_the_functional_dependency() {
        let sizes = [2, 2, 2];
        let mut table = TernaryTable::new(
            sizes,
            ternary_costs(sizes, |[x, y, z]| if (x ^ y) == z { 1 } else { MAX_COST }),
        );
        assert!(table.is_functional(2));

        table.set_table_cost(&[0, 0, 1], 4);

        assert!(!table.is_functional(2));
        assert_eq!(table.table_cost(&[0, 0, 1]), 4);
        assert_eq!(table.table_cost(&[0, 0, 0]), 1);
        assert_eq!(table.table_cost(&[1, 1, 1]), MAX_COST);
    }

    #[test]
    fn sparse_tables_fall_back_to_their_default() {
        let mut exceptions = HashMap::default();
        let _ = exceptions.insert(vec![0, 1, 0, 1].into_boxed_slice(), 0);
        let mut table = NaryTableStorage {
            sizes: vec![2; 4].into(),
            storage: NaryStorage::Sparse {
                default: 5,
                exceptions,
            },
        };

        assert_eq!(table.table_cost(&[0, 1, 0, 1]), 0);
        assert_eq!(table.table_cost(&[1, 1, 0, 1]), 5);

        table.set_table_cost(&[1, 1, 1, 1], MAX_COST + 3);
        assert_eq!(table.table_cost(&[1, 1, 1, 1]), MAX_COST);
    }
}
