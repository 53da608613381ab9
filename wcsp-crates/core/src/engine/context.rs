use enumset::EnumSet;
use log::trace;

use super::elimination::Eliminations;
use super::network_statistics::PropagationStatistics;
use super::DeeResidues;
use super::PropagationOptions;
use super::PropagationQueues;
use super::QueueKind;
use super::TrailedInteger;
use super::TrailedValues;
use super::Variable;
use super::VariableCells;
use super::VariableId;
use crate::basic_types::is_forbidden;
use crate::basic_types::Contradiction;
use crate::basic_types::Cost;
use crate::basic_types::PropagationStatus;
use crate::containers::KeyedVec;
use crate::cost_functions::CostFunction;
use crate::cost_functions::CostFunctionId;

/// The lower and upper bound of the network.
///
/// Only the lower bound is reversible; the upper bound is the cost of the best solution found so
/// far and stays valid when search backtracks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bounds {
    pub(crate) lower_bound: TrailedInteger,
    pub(crate) upper_bound: Cost,
    /// Set whenever one of the bounds moved, so that the next node consistency pass can look
    /// for values which became forbidden.
    pub(crate) objective_changed: bool,
}

/// A mutable view on the state of a [`Network`](super::Network) through which all the
/// consistency algorithms work.
///
/// The tables of the cost functions never change while propagating, so the arenas of variables
/// and cost functions are borrowed immutably and every change goes through the trailed values.
#[derive(Debug)]
pub(crate) struct PropagationContext<'a> {
    pub(crate) trailed_values: &'a mut TrailedValues,
    pub(crate) variables: &'a KeyedVec<VariableId, Variable>,
    pub(crate) cost_functions: &'a KeyedVec<CostFunctionId, CostFunction>,
    pub(crate) queues: &'a mut PropagationQueues,
    pub(crate) bounds: &'a mut Bounds,
    pub(crate) dee_residues: &'a mut KeyedVec<VariableId, DeeResidues>,
    pub(crate) eliminations: &'a mut Eliminations,
    pub(crate) options: &'a PropagationOptions,
    pub(crate) statistics: &'a mut PropagationStatistics,
    pub(crate) propagated_queues: EnumSet<QueueKind>,
}

impl<'a> PropagationContext<'a> {
    pub(crate) fn variable(&self, variable: VariableId) -> &'a Variable {
        let variables: &'a KeyedVec<VariableId, Variable> = self.variables;
        &variables[variable]
    }

    pub(crate) fn cells(&self, variable: VariableId) -> VariableCells {
        self.variables[variable].cells
    }

    pub(crate) fn cost_function(&self, cost_function: CostFunctionId) -> &'a CostFunction {
        let cost_functions: &'a KeyedVec<CostFunctionId, CostFunction> = self.cost_functions;
        &cost_functions[cost_function]
    }

    pub(crate) fn lower_bound(&self) -> Cost {
        self.trailed_values.read(self.bounds.lower_bound)
    }

    pub(crate) fn upper_bound(&self) -> Cost {
        self.bounds.upper_bound
    }

    /// Whether `cost`, added to the lower bound, reaches the upper bound.
    pub(crate) fn is_forbidden(&self, cost: Cost) -> bool {
        is_forbidden(cost, self.lower_bound(), self.upper_bound())
    }

    pub(crate) fn increase_lower_bound(&mut self, cost: Cost) -> PropagationStatus {
        if cost == 0 {
            return Ok(());
        }
        self.trailed_values
            .add_assign(self.bounds.lower_bound, cost);
        self.bounds.objective_changed = true;
        trace!("lower bound increased by {cost} to {}", self.lower_bound());

        if self.lower_bound() >= self.upper_bound() {
            return Err(Contradiction);
        }
        Ok(())
    }

    /// Puts `variable` on the queue of `kind`, if that queue is drained under the current options.
    pub(crate) fn enqueue(&mut self, kind: QueueKind, variable: VariableId) {
        if !self.propagated_queues.contains(kind) {
            return;
        }
        if kind == QueueKind::Dac {
            let dac_order = self.variables[variable].dac_order;
            self.queues
                .get_mut(kind)
                .enqueue_with_priority(variable, dac_order);
        } else {
            self.queues.get_mut(kind).enqueue(variable);
        }
    }

    // Shorthands on the cells of variables.

    pub(crate) fn is_assigned(&self, variable: VariableId) -> bool {
        self.cells(variable).is_assigned(self.trailed_values)
    }

    pub(crate) fn is_eliminated(&self, variable: VariableId) -> bool {
        self.cells(variable).is_eliminated(self.trailed_values)
    }

    pub(crate) fn contains(&self, variable: VariableId, index: usize) -> bool {
        self.cells(variable).contains(self.trailed_values, index)
    }

    pub(crate) fn unary_cost(&self, variable: VariableId, index: usize) -> Cost {
        self.cells(variable).unary_cost(self.trailed_values, index)
    }

    pub(crate) fn inf(&self, variable: VariableId) -> usize {
        self.cells(variable).inf(self.trailed_values)
    }

    pub(crate) fn sup(&self, variable: VariableId) -> usize {
        self.cells(variable).sup(self.trailed_values)
    }

    pub(crate) fn size(&self, variable: VariableId) -> usize {
        self.cells(variable).size(self.trailed_values)
    }

    pub(crate) fn support(&self, variable: VariableId) -> usize {
        self.cells(variable).support(self.trailed_values)
    }

    pub(crate) fn next_value(&self, variable: VariableId, index: usize) -> Option<usize> {
        self.cells(variable).next(self.trailed_values, index)
    }

    /// The current domain of `variable`, as indices in its initial domain.
    pub(crate) fn domain(&self, variable: VariableId) -> Vec<usize> {
        self.cells(variable).iter(self.trailed_values).collect()
    }
}
