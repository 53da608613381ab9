use super::CostFunctionId;
use crate::basic_types::Cost;
use crate::basic_types::MAX_COST;
use crate::engine::PropagationContext;

/// For one of two values of a variable, the largest cost it can have in a cost function and the
/// largest amount by which it can cost more than the other value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DominanceCosts {
    pub(crate) max_cost: Cost,
    pub(crate) max_difference: Cost,
}

impl DominanceCosts {
    const UNKNOWN: DominanceCosts = DominanceCosts {
        max_cost: MAX_COST,
        max_difference: MAX_COST,
    };
}

impl PropagationContext<'_> {
    /// Compares the values at `first` and `second` of `pivot` over every completion of the current
    /// domains.
    ///
    /// Completions in which the other values are already forbidden by their unary costs are left
    /// out of the differences.
    pub(crate) fn dominance_costs(
        &self,
        cost_function: CostFunctionId,
        pivot: usize,
        first: usize,
        second: usize,
    ) -> (DominanceCosts, DominanceCosts) {
        if !self.is_active(cost_function) {
            return (DominanceCosts::UNKNOWN, DominanceCosts::UNKNOWN);
        }

        let mut for_first = DominanceCosts {
            max_cost: 0,
            max_difference: 0,
        };
        let mut for_second = for_first;

        let mut completions = self.completions(cost_function, &[(pivot, first)]);
        let mut with_second = Vec::new();
        while let Some(tuple) = completions.next_tuple() {
            with_second.clear();
            with_second.extend_from_slice(tuple);
            with_second[pivot] = second;

            let cost_first = self.observed_cost(cost_function, tuple);
            let cost_second = self.observed_cost(cost_function, &with_second);
            for_first.max_cost = for_first.max_cost.max(cost_first);
            for_second.max_cost = for_second.max_cost.max(cost_second);

            if !self.is_forbidden(self.unary_cost_of_others(cost_function, tuple, pivot)) {
                for_first.max_difference = for_first.max_difference.max(cost_first - cost_second);
                for_second.max_difference = for_second.max_difference.max(cost_second - cost_first);
            }
        }

        (for_first, for_second)
    }
}
