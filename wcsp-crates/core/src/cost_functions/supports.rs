//! Arc and directional arc consistency of a single cost function, and its reactions to the
//! events of its scope variables.
use log::trace;

use super::CostFunctionId;
use crate::basic_types::add_costs;
use crate::basic_types::Cost;
use crate::basic_types::PropagationStatus;
use crate::engine::ConsistencyLevel;
use crate::engine::PropagationContext;
use crate::engine::QueueKind;

impl PropagationContext<'_> {
    /// The unassigned position with the smallest DAC order; cost is moved towards it.
    pub(crate) fn dac_position(&self, cost_function: CostFunctionId) -> Option<usize> {
        let variables = self.cost_function(cost_function).variables();
        (0..variables.len())
            .filter(|&position| !self.is_assigned(variables[position]))
            .min_by_key(|&position| self.variable(variables[position]).dac_order)
    }

    /// Whether the cost function takes part in propagation. Large N-ary cost functions are
    /// delayed until enough of their variables are assigned.
    pub(crate) fn is_active(&self, cost_function: CostFunctionId) -> bool {
        let cost_function_data = self.cost_function(cost_function);
        if !cost_function_data.is_nary() {
            return true;
        }
        let variables = cost_function_data.variables();
        let num_unassigned = variables
            .iter()
            .filter(|&&variable| !self.is_assigned(variable))
            .count();
        if num_unassigned <= 3 {
            return true;
        }
        variables
            .iter()
            .try_fold(1_u64, |product, &variable| {
                product
                    .checked_mul(self.size(variable) as u64)
                    .filter(|&product| product <= self.options.nary_enumeration_limit)
            })
            .is_some()
    }

    /// Makes every value of `pivot` have a zero-cost tuple in the cost function, projecting the
    /// minimal cost onto the values that do not.
    pub(crate) fn find_arc_support(&mut self, cost_function: CostFunctionId, pivot: usize) -> PropagationStatus {
        let variable = self.cost_function(cost_function).variables()[pivot];
        let mut support_broken = false;

        let mut current = Some(self.inf(variable));
        while let Some(index) = current {
            current = self.next_value(variable, index);
            if !self.contains(variable, index)
                || self.support_is_valid(cost_function, pivot, index, false)
            {
                continue;
            }

            let (minimum, witness) = self.minimum_completion(cost_function, pivot, index, false);
            if minimum > 0 {
                support_broken |= self.project_from_cost_function(cost_function, pivot, index, minimum)?;
            }
            if let Some(tuple) = witness {
                if self.contains(variable, index) {
                    self.store_support(cost_function, pivot, index, &tuple);
                }
            }
        }

        if support_broken {
            self.find_support(variable)?;
        }
        Ok(())
    }

    /// Makes every value of `pivot` have a tuple of zero cost in which the other values also have
    /// zero unary cost, extending unary cost of the other variables into the cost function where
    /// needed before projecting.
    pub(crate) fn find_full_support(&mut self, cost_function: CostFunctionId, pivot: usize) -> PropagationStatus {
        let variables = self.cost_function(cost_function).variables();
        let variable = variables[pivot];
        let mut support_broken = false;
        let mut extended = vec![false; variables.len()];

        let mut current = Some(self.inf(variable));
        while let Some(index) = current {
            current = self.next_value(variable, index);
            if !self.contains(variable, index)
                || self.support_is_valid(cost_function, pivot, index, true)
            {
                continue;
            }

            let (minimum, witness) = self.minimum_completion(cost_function, pivot, index, true);
            if self.is_forbidden(minimum) {
                support_broken |= self.project_from_cost_function(cost_function, pivot, index, minimum)?;
                continue;
            }
            if minimum > 0 {
                self.extend_for_full_support(cost_function, pivot, index, minimum, &mut extended);
                support_broken |= self.project_from_cost_function(cost_function, pivot, index, minimum)?;
            }
            if let Some(tuple) = witness {
                if self.contains(variable, index) {
                    self.store_support(cost_function, pivot, index, &tuple);
                }
            }
        }

        if support_broken {
            self.find_support(variable)?;
        }

        if !extended.contains(&true) {
            return Ok(());
        }
        // The unary costs of `variable` only grow here; the full supports of the DAC position
        // are restored through the DAC queue once the pass which called this is done.
        let dac_position = self.dac_position(cost_function);
        if self.options.consistency.maintains_arc_supports() {
            for position in self.unassigned_positions(cost_function) {
                if position != pivot && Some(position) != dac_position {
                    self.find_arc_support(cost_function, position)?;
                }
            }
        }
        if dac_position != Some(pivot) && !self.is_assigned(variable) {
            self.enqueue(QueueKind::Dac, variable);
        }
        Ok(())
    }

    /// Extends, position by position, just enough unary cost into the cost function that every
    /// tuple with `pivot` at `index` costs at least `minimum`.
    ///
    /// At position `q`, the value `b` gives up the largest shortfall of a tuple through `b`,
    /// counting the unary costs of the positions after `q` as still available. This never
    /// exceeds the unary cost of `b`, since `minimum` is the smallest cost of a tuple including
    /// all of the unary costs.
    fn extend_for_full_support(
        &mut self,
        cost_function: CostFunctionId,
        pivot: usize,
        index: usize,
        minimum: Cost,
        extended: &mut [bool],
    ) {
        let variables = self.cost_function(cost_function).variables();
        for position in 0..variables.len() {
            if position == pivot {
                continue;
            }
            let variable = variables[position];
            for value in self.domain(variable) {
                if self.unary_cost(variable, value) == 0 {
                    continue;
                }

                let mut shortfall = 0;
                let mut completions = self.completions(cost_function, &[(pivot, index), (position, value)]);
                while let Some(tuple) = completions.next_tuple() {
                    let available_later = tuple
                        .iter()
                        .enumerate()
                        .filter(|&(later, _)| later > position && later != pivot)
                        .fold(0, |sum, (later, &later_value)| {
                            add_costs(sum, self.unary_cost(variables[later], later_value))
                        });
                    let covered = add_costs(self.observed_cost(cost_function, tuple), available_later);
                    shortfall = shortfall.max(minimum - covered);
                }

                if shortfall > 0 {
                    self.extend_to_cost_function(cost_function, position, value, shortfall);
                    extended[position] = true;
                }
            }
        }
    }

    /// Moves all remaining cost of a cost function with at most one unassigned variable out of
    /// it, and disables it.
    pub(crate) fn absorb(&mut self, cost_function: CostFunctionId) -> PropagationStatus {
        let variables = self.cost_function(cost_function).variables();
        let unassigned = self.unassigned_positions(cost_function);
        trace!("absorb {cost_function}");

        match unassigned.as_slice() {
            [] => {
                let tuple = variables
                    .iter()
                    .map(|&variable| self.inf(variable))
                    .collect::<Vec<_>>();
                let cost = self.observed_cost(cost_function, &tuple);
                self.deconnect(cost_function);
                self.increase_lower_bound(cost)?;
            }
            &[position] => {
                let variable = variables[position];
                let mut support_broken = false;
                for index in self.domain(variable) {
                    if !self.contains(variable, index) {
                        continue;
                    }
                    let fixed = variables
                        .iter()
                        .enumerate()
                        .map(|(other, &other_variable)| {
                            if other == position {
                                index
                            } else {
                                self.inf(other_variable)
                            }
                        })
                        .collect::<Vec<_>>();
                    let cost = self.observed_cost(cost_function, &fixed);
                    support_broken |= self.project_from_cost_function(cost_function, position, index, cost)?;
                }
                self.deconnect(cost_function);
                if support_broken {
                    self.find_support(variable)?;
                }
            }
            _ => unreachable!("only cost functions with at most one unassigned variable are absorbed"),
        }
        Ok(())
    }

    /// Establishes the consistency level on a cost function from scratch.
    pub(crate) fn propagate_cost_function(&mut self, cost_function: CostFunctionId) -> PropagationStatus {
        if !self.is_connected(cost_function) {
            return Ok(());
        }
        if self.unassigned_positions(cost_function).len() <= 1 {
            return self.absorb(cost_function);
        }
        if !self.is_active(cost_function) {
            return Ok(());
        }
        let Some(dac_position) = self.dac_position(cost_function) else {
            return Ok(());
        };

        match self.options.consistency {
            ConsistencyLevel::Node => {}
            ConsistencyLevel::Arc => {
                for position in self.unassigned_positions(cost_function) {
                    self.find_arc_support(cost_function, position)?;
                }
            }
            ConsistencyLevel::DirectionalArc => {
                self.find_full_support(cost_function, dac_position)?;
            }
            ConsistencyLevel::FullDirectionalArc | ConsistencyLevel::ExistentialDirectionalArc => {
                for position in self.unassigned_positions(cost_function) {
                    if position != dac_position {
                        self.find_arc_support(cost_function, position)?;
                    }
                }
                self.find_full_support(cost_function, dac_position)?;
                for &variable in self.cost_function(cost_function).variables() {
                    self.enqueue(QueueKind::Eac1, variable);
                }
            }
        }
        Ok(())
    }

    /// A value of the variable at `position` was removed, which may break the supports of the
    /// values of the other variables.
    pub(crate) fn on_value_removed(&mut self, cost_function: CostFunctionId, position: usize) -> PropagationStatus {
        if !self.is_connected(cost_function) || !self.is_active(cost_function) {
            return Ok(());
        }
        if self.cost_function(cost_function).is_nary()
            || self.unassigned_positions(cost_function).len() <= 1
        {
            return self.propagate_cost_function(cost_function);
        }

        let variables = self.cost_function(cost_function).variables();
        for (other, &variable) in variables.iter().enumerate() {
            if other != position {
                self.enqueue(QueueKind::Dee, variable);
            }
        }

        let dac_position = self.dac_position(cost_function);
        let consistency = self.options.consistency;
        for other in self.unassigned_positions(cost_function) {
            if other == position {
                continue;
            }
            if consistency == ConsistencyLevel::Arc
                || (consistency >= ConsistencyLevel::FullDirectionalArc && Some(other) != dac_position)
            {
                self.find_arc_support(cost_function, other)?;
            }
        }
        Ok(())
    }

    /// A unary cost of the variable at `position` became positive, which may allow cost to be
    /// moved towards the DAC variable.
    pub(crate) fn on_projection_from_zero(&mut self, cost_function: CostFunctionId, position: usize) -> PropagationStatus {
        if !self.is_connected(cost_function) || !self.is_active(cost_function) {
            return Ok(());
        }
        if self.cost_function(cost_function).is_nary()
            || self.unassigned_positions(cost_function).len() <= 1
        {
            return self.propagate_cost_function(cost_function);
        }
        match self.dac_position(cost_function) {
            Some(dac_position) if dac_position != position => self.find_full_support(cost_function, dac_position),
            _ => Ok(()),
        }
    }

    /// A variable of the scope was assigned.
    pub(crate) fn on_assignment(&mut self, cost_function: CostFunctionId) -> PropagationStatus {
        if !self.is_connected(cost_function) {
            return Ok(());
        }
        self.propagate_cost_function(cost_function)?;
        for &variable in self.cost_function(cost_function).variables() {
            if !self.is_assigned(variable) {
                self.enqueue(QueueKind::Eliminate, variable);
            }
        }
        Ok(())
    }

    /// Whether the value at `index` of `pivot` has a zero-cost tuple in which every other value
    /// has zero unary cost. The tuple found becomes the cached support.
    pub(crate) fn is_existentially_supported(
        &mut self,
        cost_function: CostFunctionId,
        pivot: usize,
        index: usize,
    ) -> bool {
        if self.support_is_valid(cost_function, pivot, index, true) {
            return true;
        }
        let (minimum, witness) = self.minimum_completion(cost_function, pivot, index, true);
        match witness {
            Some(tuple) if minimum == 0 => {
                self.store_support(cost_function, pivot, index, &tuple);
                true
            }
            _ => false,
        }
    }

    /// Enqueues for existential arc consistency the other variables of the scope whose support is
    /// no longer existentially supported in this cost function.
    pub(crate) fn fill_existential_queue(&mut self, cost_function: CostFunctionId, position: usize) {
        if !self.is_connected(cost_function) || !self.is_active(cost_function) {
            return;
        }
        let variables = self.cost_function(cost_function).variables();
        for other in self.unassigned_positions(cost_function) {
            if other == position {
                continue;
            }
            let variable = variables[other];
            let support = self.support(variable);
            if !self.support_is_valid(cost_function, other, support, true) {
                self.enqueue(QueueKind::Eac2, variable);
            }
        }
    }
}
