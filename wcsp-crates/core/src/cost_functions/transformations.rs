//! The equivalence-preserving transformations between a cost function and its scope variables,
//! and the scans for minimal completions they are driven by.
use log::trace;

use super::cost_function::NO_SUPPORT;
use super::CostFunctionId;
use super::Completions;
use crate::basic_types::add_costs;
use crate::basic_types::Contradiction;
use crate::basic_types::Cost;
use crate::basic_types::MAX_COST;
use crate::engine::PropagationContext;
use crate::engine::QueueKind;
use crate::wcsp_assert_simple;

impl PropagationContext<'_> {
    pub(crate) fn is_connected(&self, cost_function: CostFunctionId) -> bool {
        let scope = self.cost_function(cost_function).scope();
        self.trailed_values.read(scope.connected) != 0
    }

    /// Disables the cost function until search backtracks past this point.
    pub(crate) fn deconnect(&mut self, cost_function: CostFunctionId) {
        let scope = self.cost_function(cost_function).scope();
        if !self.is_connected(cost_function) {
            return;
        }
        trace!("deconnect {cost_function}");
        self.trailed_values.assign(scope.connected, 0);
        for &variable in scope.variables.iter() {
            if !self.is_assigned(variable) {
                self.enqueue(QueueKind::Eliminate, variable);
            }
        }
    }

    pub(crate) fn reconnect(&mut self, cost_function: CostFunctionId) {
        let scope = self.cost_function(cost_function).scope();
        self.trailed_values.assign(scope.connected, 1);
    }

    /// The cost of `tuple` in the table minus what was moved out to the variables.
    pub(crate) fn observed_cost(&self, cost_function: CostFunctionId, tuple: &[usize]) -> Cost {
        self.cost_function(cost_function)
            .observed_cost(self.trailed_values, tuple)
    }

    /// The sum of the unary costs of the values of `tuple`, except at `pivot`.
    pub(crate) fn unary_cost_of_others(
        &self,
        cost_function: CostFunctionId,
        tuple: &[usize],
        pivot: usize,
    ) -> Cost {
        let variables = self.cost_function(cost_function).variables();
        tuple
            .iter()
            .enumerate()
            .filter(|&(position, _)| position != pivot)
            .fold(0, |sum, (position, &index)| {
                add_costs(sum, self.unary_cost(variables[position], index))
            })
    }

    /// The tuples over the current domains in which the positions in `fixed` take the given
    /// values.
    pub(crate) fn completions(
        &self,
        cost_function: CostFunctionId,
        fixed: &[(usize, usize)],
    ) -> Completions {
        let variables = self.cost_function(cost_function).variables();
        Completions::new(
            variables
                .iter()
                .enumerate()
                .map(|(position, &variable)| {
                    match fixed.iter().find(|&&(fixed_position, _)| fixed_position == position) {
                        Some(&(_, index)) => vec![index],
                        None => self.domain(variable),
                    }
                })
                .collect(),
        )
    }

    /// The positions of the scope whose variable has more than one value left.
    pub(crate) fn unassigned_positions(&self, cost_function: CostFunctionId) -> Vec<usize> {
        let variables = self.cost_function(cost_function).variables();
        (0..variables.len())
            .filter(|&position| !self.is_assigned(variables[position]))
            .collect()
    }

    /// Moves `cost` from every tuple in which `position` takes the value at `index` into the unary
    /// cost of that value.
    ///
    /// A forbidden amount removes the value instead. Returns whether the projection was made on
    /// the support of the variable, in which case the caller restores it.
    pub(crate) fn project_from_cost_function(
        &mut self,
        cost_function: CostFunctionId,
        position: usize,
        index: usize,
        cost: Cost,
    ) -> Result<bool, Contradiction> {
        if cost == 0 {
            return Ok(false);
        }
        let scope = self.cost_function(cost_function).scope();
        let variable = scope.variables[position];

        if self.is_forbidden(cost) {
            self.statistics.num_nc_removals += 1;
            self.remove(variable, index)?;
            return Ok(false);
        }

        self.trailed_values
            .add_assign(scope.deltas[position].at(index), cost);
        self.project(variable, index, cost)?;
        Ok(self.contains(variable, index) && self.support(variable) == index)
    }

    /// Moves `cost` from the unary cost of the value at `index` of `position` into every tuple in
    /// which `position` takes that value.
    pub(crate) fn extend_to_cost_function(
        &mut self,
        cost_function: CostFunctionId,
        position: usize,
        index: usize,
        cost: Cost,
    ) {
        if cost == 0 {
            return;
        }
        let scope = self.cost_function(cost_function).scope();
        let variable = scope.variables[position];
        wcsp_assert_simple!(
            cost <= self.unary_cost(variable, index),
            "cannot extend {cost} from {variable}={index} into {cost_function}"
        );

        self.extend(variable, index, cost);
        self.trailed_values
            .add_assign(scope.deltas[position].at(index), -cost);
    }

    /// The smallest cost of a tuple over the current domains in which `pivot` takes the value at
    /// `index`, together with such a tuple. With `with_unary`, the unary costs of the values at
    /// the other positions are included.
    pub(crate) fn minimum_completion(
        &self,
        cost_function: CostFunctionId,
        pivot: usize,
        index: usize,
        with_unary: bool,
    ) -> (Cost, Option<Vec<usize>>) {
        let cost_of = |tuple: &[usize]| {
            let observed = self.observed_cost(cost_function, tuple);
            if with_unary {
                add_costs(observed, self.unary_cost_of_others(cost_function, tuple, pivot))
            } else {
                observed
            }
        };
        let mut minimum = MAX_COST;
        let mut witness = None;

        if let Some(table) = self.cost_function(cost_function).ternary_table() {
            if let Some(functional) = (0..3).find(|&position| position != pivot && table.is_functional(position)) {
                // Only one value of the functional position is allowed per value of the third.
                let variables = self.cost_function(cost_function).variables();
                let other = 3 - pivot - functional;
                let mut tuple = [0; 3];
                tuple[pivot] = index;
                for value in self.cells(variables[other]).iter(self.trailed_values) {
                    tuple[other] = value;
                    let Some(determined) = table.function_value(functional, &tuple) else {
                        continue;
                    };
                    if !self.contains(variables[functional], determined) {
                        continue;
                    }
                    tuple[functional] = determined;
                    let cost = cost_of(&tuple);
                    if cost < minimum {
                        minimum = cost;
                        witness = Some(tuple.to_vec());
                        if cost == 0 {
                            break;
                        }
                    }
                }
                return (minimum, witness);
            }
        }

        let mut completions = self.completions(cost_function, &[(pivot, index)]);
        while let Some(tuple) = completions.next_tuple() {
            let cost = cost_of(tuple);
            if cost < minimum || witness.is_none() {
                minimum = cost;
                witness = Some(tuple.to_vec());
                if cost == 0 {
                    break;
                }
            }
        }
        (minimum, witness)
    }

    /// Whether the cached support of the value at `index` of `pivot` still has zero cost (and
    /// zero unary costs at the other positions, with `with_unary`).
    pub(crate) fn support_is_valid(
        &self,
        cost_function: CostFunctionId,
        pivot: usize,
        index: usize,
        with_unary: bool,
    ) -> bool {
        let scope = self.cost_function(cost_function).scope();
        let Some(supports) = &scope.supports else {
            return false;
        };
        let code = self.trailed_values.read(supports[pivot].at(index));
        if code == NO_SUPPORT {
            return false;
        }

        let mut tuple = vec![0; scope.arity()];
        tuple[pivot] = index;
        scope.decode_support(pivot, code, &mut tuple);

        let all_present = tuple
            .iter()
            .enumerate()
            .all(|(position, &value)| position == pivot || self.contains(scope.variables[position], value));
        all_present
            && self.observed_cost(cost_function, &tuple) == 0
            && (!with_unary || self.unary_cost_of_others(cost_function, &tuple, pivot) == 0)
    }

    pub(crate) fn store_support(
        &mut self,
        cost_function: CostFunctionId,
        pivot: usize,
        index: usize,
        tuple: &[usize],
    ) {
        let scope = self.cost_function(cost_function).scope();
        if let Some(supports) = &scope.supports {
            let code = scope.encode_support(pivot, tuple);
            self.trailed_values.assign(supports[pivot].at(index), code);
        }
    }
}
