use std::fmt::Display;
use std::fmt::Formatter;

use super::tables::BinaryTable;
use super::tables::CostTable;
use super::tables::NaryTableStorage;
use super::tables::TernaryTable;
use super::tables::UnaryTable;
use crate::basic_types::Cost;
use crate::basic_types::MAX_COST;
use crate::containers::StorageKey;
use crate::engine::TrailedBlock;
use crate::engine::TrailedInteger;
use crate::engine::TrailedValues;
use crate::engine::VariableId;

/// A handle to a cost function of a [`Network`](crate::Network).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CostFunctionId {
    id: u32,
}

impl StorageKey for CostFunctionId {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        Self { id: index as u32 }
    }
}

impl Display for CostFunctionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.id)
    }
}

/// The occurrence of a variable in the scope of a cost function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CostFunctionLink {
    pub(crate) cost_function: CostFunctionId,
    pub(crate) position: usize,
}

/// Marks a value of a scope variable without a cached support.
pub(crate) const NO_SUPPORT: i64 = -1;

/// The part of a cost function which does not depend on its arity.
#[derive(Debug)]
pub(crate) struct CostFunctionScope {
    pub(crate) variables: Box<[VariableId]>,
    /// The size of the initial domain of every scope variable.
    pub(crate) sizes: Box<[usize]>,
    /// For every position, the cost moved out of the table per value of that position.
    pub(crate) deltas: Box<[TrailedBlock]>,
    /// For every position and value, the other values of a tuple in which the value was last
    /// found to have its minimal cost, encoded by [`CostFunctionScope::encode_support`]. Absent
    /// when the tuples are too many to encode.
    pub(crate) supports: Option<Box<[TrailedBlock]>>,
    pub(crate) connected: TrailedInteger,
    /// Created by eliminating a variable; it is not part of the problem that was given.
    pub(crate) derived: bool,
    /// Its costs were added to another cost function.
    pub(crate) merged: bool,
}

impl CostFunctionScope {
    pub(crate) fn new(
        trailed_values: &mut TrailedValues,
        variables: Box<[VariableId]>,
        sizes: Box<[usize]>,
        derived: bool,
    ) -> Self {
        let deltas = sizes
            .iter()
            .map(|&size| trailed_values.grow_block(std::iter::repeat(0).take(size)))
            .collect();
        let can_encode_supports = sizes
            .iter()
            .try_fold(1_i64, |product, &size| product.checked_mul(size as i64))
            .is_some();
        let supports = can_encode_supports.then(|| {
            sizes
                .iter()
                .map(|&size| trailed_values.grow_block(std::iter::repeat(NO_SUPPORT).take(size)))
                .collect()
        });

        CostFunctionScope {
            variables,
            sizes,
            deltas,
            supports,
            connected: trailed_values.grow(1),
            derived,
            merged: false,
        }
    }

    pub(crate) fn arity(&self) -> usize {
        self.variables.len()
    }

    pub(crate) fn position_of(&self, variable: VariableId) -> Option<usize> {
        self.variables
            .iter()
            .position(|&scope_variable| scope_variable == variable)
    }

    /// Encodes the values of `tuple` at every position other than `pivot`.
    pub(crate) fn encode_support(&self, pivot: usize, tuple: &[usize]) -> i64 {
        (0..self.arity())
            .filter(|&position| position != pivot)
            .fold(0, |code, position| {
                code * self.sizes[position] as i64 + tuple[position] as i64
            })
    }

    /// Writes the values encoded in `code` into every position of `tuple` other than `pivot`.
    pub(crate) fn decode_support(&self, pivot: usize, mut code: i64, tuple: &mut [usize]) {
        for position in (0..self.arity()).rev().filter(|&position| position != pivot) {
            let size = self.sizes[position] as i64;
            tuple[position] = (code % size) as usize;
            code /= size;
        }
    }
}

/// A cost function, closed over the arities the network distinguishes.
#[derive(Debug)]
pub(crate) enum CostFunction {
    Unary {
        scope: CostFunctionScope,
        table: UnaryTable,
    },
    Binary {
        scope: CostFunctionScope,
        table: BinaryTable,
    },
    Ternary {
        scope: CostFunctionScope,
        table: TernaryTable,
    },
    Nary {
        scope: CostFunctionScope,
        table: NaryTableStorage,
    },
}

impl CostFunction {
    pub(crate) fn scope(&self) -> &CostFunctionScope {
        match self {
            CostFunction::Unary { scope, .. }
            | CostFunction::Binary { scope, .. }
            | CostFunction::Ternary { scope, .. }
            | CostFunction::Nary { scope, .. } => scope,
        }
    }

    pub(crate) fn scope_mut(&mut self) -> &mut CostFunctionScope {
        match self {
            CostFunction::Unary { scope, .. }
            | CostFunction::Binary { scope, .. }
            | CostFunction::Ternary { scope, .. }
            | CostFunction::Nary { scope, .. } => scope,
        }
    }

    fn table(&self) -> &dyn CostTable {
        match self {
            CostFunction::Unary { table, .. } => table,
            CostFunction::Binary { table, .. } => table,
            CostFunction::Ternary { table, .. } => table,
            CostFunction::Nary { table, .. } => table,
        }
    }

    fn table_mut(&mut self) -> &mut dyn CostTable {
        match self {
            CostFunction::Unary { table, .. } => table,
            CostFunction::Binary { table, .. } => table,
            CostFunction::Ternary { table, .. } => table,
            CostFunction::Nary { table, .. } => table,
        }
    }

    pub(crate) fn ternary_table(&self) -> Option<&TernaryTable> {
        match self {
            CostFunction::Ternary { table, .. } => Some(table),
            _ => None,
        }
    }

    pub(crate) fn is_nary(&self) -> bool {
        matches!(self, CostFunction::Nary { .. })
    }

    pub(crate) fn variables(&self) -> &[VariableId] {
        &self.scope().variables
    }

    /// The cost of `tuple` in the table minus what was moved out to the variables. Costs at or
    /// above [`MAX_COST`] are not affected by the moves.
    pub(crate) fn observed_cost(&self, trailed_values: &TrailedValues, tuple: &[usize]) -> Cost {
        let table_cost = self.table_cost(tuple);
        if table_cost >= MAX_COST {
            return MAX_COST;
        }
        let scope = self.scope();
        table_cost
            - tuple
                .iter()
                .zip(scope.deltas.iter())
                .map(|(&index, deltas)| trailed_values.read(deltas.at(index)))
                .sum::<Cost>()
    }

    /// Whether nothing was moved out of the table yet.
    pub(crate) fn has_zero_deltas(&self, trailed_values: &TrailedValues) -> bool {
        self.scope().deltas.iter().all(|deltas| {
            (0..deltas.len()).all(|index| trailed_values.read(deltas.at(index)) == 0)
        })
    }
}

impl CostTable for CostFunction {
    fn table_cost(&self, tuple: &[usize]) -> Cost {
        self.table().table_cost(tuple)
    }

    fn set_table_cost(&mut self, tuple: &[usize], cost: Cost) {
        self.table_mut().set_table_cost(tuple, cost)
    }
}
