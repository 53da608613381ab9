//! The operations on a single variable: moving cost in and out of its unary costs, keeping its
//! support and its worst value up to date, and shrinking its domain.
use log::trace;

use super::PropagationContext;
use super::QueueKind;
use super::VariableId;
use crate::basic_types::add_costs;
use crate::basic_types::Contradiction;
use crate::basic_types::Cost;
use crate::basic_types::PropagationStatus;
use crate::wcsp_assert_moderate;
use crate::wcsp_assert_simple;

impl PropagationContext<'_> {
    /// Adds `cost` to the unary cost of the value at `index`, removing the value when it becomes
    /// forbidden.
    pub(crate) fn project(&mut self, variable: VariableId, index: usize, cost: Cost) -> PropagationStatus {
        wcsp_assert_simple!(cost >= 0, "cannot project the negative cost {cost}");
        if cost == 0 {
            return Ok(());
        }

        let cells = self.cells(variable);
        let old_cost = cells.unary_cost(self.trailed_values, index);
        let new_cost = add_costs(old_cost, cost);
        self.trailed_values
            .add_assign(cells.costs.at(index), new_cost - old_cost);
        self.statistics.num_projections += 1;
        trace!("project {cost} onto {variable}={index}");

        if index == cells.max_cost_value(self.trailed_values)
            || new_cost > cells.max_cost(self.trailed_values)
        {
            self.enqueue(QueueKind::Nc, variable);
        }
        if old_cost == 0 {
            self.enqueue(QueueKind::Dac, variable);
            self.enqueue(QueueKind::Eac1, variable);
        }

        if self.is_forbidden(new_cost) {
            self.statistics.num_nc_removals += 1;
            self.remove(variable, index)?;
        }
        Ok(())
    }

    /// Moves `cost` of the unary cost of the value at `index` back out of the variable. The caller
    /// puts it somewhere else.
    pub(crate) fn extend(&mut self, variable: VariableId, index: usize, cost: Cost) {
        let cells = self.cells(variable);
        wcsp_assert_simple!(
            cost <= cells.unary_cost(self.trailed_values, index),
            "cannot extend more than the unary cost of {variable}={index}"
        );
        if cost == 0 {
            return;
        }

        self.trailed_values
            .add_assign(cells.costs.at(index), -cost);
        self.statistics.num_extensions += 1;
        trace!("extend {cost} from {variable}={index}");

        if index == cells.max_cost_value(self.trailed_values) {
            self.enqueue(QueueKind::Nc, variable);
        }
    }

    /// Removes `cost` from the unary cost of every value; the caller adds it to the lower bound.
    pub(crate) fn extend_all(&mut self, variable: VariableId, cost: Cost) {
        if cost == 0 {
            return;
        }
        let cells = self.cells(variable);
        self.trailed_values.add_assign(cells.delta_cost, cost);
        self.enqueue(QueueKind::Nc, variable);
    }

    /// Projects `cost` onto the smallest value of the domain.
    pub(crate) fn project_inf_cost(&mut self, variable: VariableId, cost: Cost) -> PropagationStatus {
        let index = self.inf(variable);
        self.project(variable, index, cost)?;
        if self.support(variable) == index {
            self.find_support(variable)?;
        }
        Ok(())
    }

    /// Projects `cost` onto the largest value of the domain.
    pub(crate) fn project_sup_cost(&mut self, variable: VariableId, cost: Cost) -> PropagationStatus {
        let index = self.sup(variable);
        self.project(variable, index, cost)?;
        if self.support(variable) == index {
            self.find_support(variable)?;
        }
        Ok(())
    }

    /// Restores a zero unary cost for the support of `variable`, folding a positive minimum into
    /// the lower bound.
    pub(crate) fn find_support(&mut self, variable: VariableId) -> PropagationStatus {
        let cells = self.cells(variable);
        let support = cells.support(self.trailed_values);
        if cells.contains(self.trailed_values, support)
            && cells.unary_cost(self.trailed_values, support) == 0
        {
            return Ok(());
        }

        let best_value = self
            .variable(variable)
            .best_value
            .filter(|&best| cells.contains(self.trailed_values, best));
        let (minimum, new_support) = cells
            .iter(self.trailed_values)
            .map(|index| (cells.unary_cost(self.trailed_values, index), index))
            .min_by_key(|&(cost, index)| (cost, Some(index) != best_value))
            .ok_or(Contradiction)?;

        if minimum > 0 {
            self.extend_all(variable, minimum);
            self.increase_lower_bound(minimum)?;
        }
        self.set_support(variable, new_support);
        Ok(())
    }

    pub(crate) fn set_support(&mut self, variable: VariableId, index: usize) {
        let cells = self.cells(variable);
        if cells.support(self.trailed_values) == index {
            return;
        }
        self.trailed_values.assign(cells.support, index as i64);
        self.enqueue(QueueKind::Dee, variable);
        self.enqueue(QueueKind::FullEac, variable);
    }

    /// Enqueues the events for a domain which lost values but is not yet a singleton.
    fn notify_domain_change(&mut self, variable: VariableId) {
        self.enqueue(QueueKind::Ac, variable);
        self.enqueue(QueueKind::Dac, variable);
        self.enqueue(QueueKind::Eac1, variable);
    }

    /// Removes the value at `index` from the domain.
    pub(crate) fn remove(&mut self, variable: VariableId, index: usize) -> PropagationStatus {
        let cells = self.cells(variable);
        if !cells.contains(self.trailed_values, index) {
            return Ok(());
        }
        if cells.is_assigned(self.trailed_values) {
            return Err(Contradiction);
        }
        trace!("remove {variable}={index}");

        if index == cells.inf(self.trailed_values) {
            return self.increase(variable, index + 1);
        }
        if index == cells.sup(self.trailed_values) {
            return self.decrease(variable, index - 1);
        }

        self.trailed_values.assign(cells.present.at(index), 0);
        self.trailed_values.add_assign(cells.size, -1);

        if index == cells.max_cost_value(self.trailed_values) {
            self.enqueue(QueueKind::Nc, variable);
        }
        if index == cells.support(self.trailed_values) {
            self.find_support(variable)?;
        }
        self.notify_domain_change(variable);
        Ok(())
    }

    /// Removes every value below `new_inf`.
    pub(crate) fn increase(&mut self, variable: VariableId, new_inf: usize) -> PropagationStatus {
        let cells = self.cells(variable);
        let inf = cells.inf(self.trailed_values);
        if new_inf <= inf {
            return Ok(());
        }
        let sup = cells.sup(self.trailed_values);
        let first = if new_inf <= sup && cells.is_present(self.trailed_values, new_inf)
        {
            new_inf
        } else {
            cells.next(self.trailed_values, new_inf).ok_or(Contradiction)?
        };

        let num_removed = (inf..first)
            .filter(|&index| cells.is_present(self.trailed_values, index))
            .count();
        self.trailed_values.assign(cells.inf, first as i64);
        self.trailed_values
            .add_assign(cells.size, -(num_removed as i64));

        self.on_bound_change(variable, |removed| removed < first)
    }

    /// Removes every value above `new_sup`.
    pub(crate) fn decrease(&mut self, variable: VariableId, new_sup: usize) -> PropagationStatus {
        let cells = self.cells(variable);
        let sup = cells.sup(self.trailed_values);
        if new_sup >= sup {
            return Ok(());
        }
        let inf = cells.inf(self.trailed_values);
        if new_sup < inf {
            return Err(Contradiction);
        }
        let last = (inf..=new_sup)
            .rev()
            .find(|&index| cells.is_present(self.trailed_values, index))
            .ok_or(Contradiction)?;

        let num_removed = (last + 1..=sup)
            .filter(|&index| cells.is_present(self.trailed_values, index))
            .count();
        self.trailed_values.assign(cells.sup, last as i64);
        self.trailed_values
            .add_assign(cells.size, -(num_removed as i64));

        self.on_bound_change(variable, |removed| removed > last)
    }

    fn on_bound_change(
        &mut self,
        variable: VariableId,
        was_removed: impl Fn(usize) -> bool,
    ) -> PropagationStatus {
        let cells = self.cells(variable);
        if cells.is_assigned(self.trailed_values) {
            return self.on_assigned(variable);
        }

        if was_removed(cells.max_cost_value(self.trailed_values)) {
            self.enqueue(QueueKind::Nc, variable);
        }
        if was_removed(cells.support(self.trailed_values)) {
            self.find_support(variable)?;
        }
        self.notify_domain_change(variable);
        Ok(())
    }

    /// Reduces the domain to the value at `index`.
    pub(crate) fn assign(&mut self, variable: VariableId, index: usize) -> PropagationStatus {
        let cells = self.cells(variable);
        if !cells.contains(self.trailed_values, index) {
            return Err(Contradiction);
        }
        if cells.is_assigned(self.trailed_values) {
            return Ok(());
        }
        trace!("assign {variable}={index}");

        self.trailed_values.assign(cells.inf, index as i64);
        self.trailed_values.assign(cells.sup, index as i64);
        self.trailed_values.assign(cells.size, 1);
        self.on_assigned(variable)
    }

    /// The variable side of an assignment: its support becomes the remaining value and the unary
    /// cost of that value goes into the lower bound. The cost functions are told through the
    /// assign queue.
    fn on_assigned(&mut self, variable: VariableId) -> PropagationStatus {
        let cells = self.cells(variable);
        let value = cells.inf(self.trailed_values);
        wcsp_assert_moderate!(cells.contains(self.trailed_values, value));

        self.set_support(variable, value);
        self.trailed_values
            .assign(cells.max_cost_value, value as i64);
        self.trailed_values.assign(cells.max_cost, 0);
        self.enqueue(QueueKind::Assign, variable);

        let cost = cells.unary_cost(self.trailed_values, value);
        if cost > 0 {
            self.extend_all(variable, cost);
            self.increase_lower_bound(cost)?;
        }
        Ok(())
    }
}
