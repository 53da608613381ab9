//! The per-variable passes of the fixpoint: node consistency, dispatching removals and
//! projections to the cost functions, existential arc consistency and dominance.
use log::debug;

use super::DominanceLevel;
use super::PropagationContext;
use super::QueueKind;
use super::VariableId;
use crate::basic_types::add_costs;
use crate::basic_types::Cost;
use crate::basic_types::PropagationStatus;
use crate::containers::HashMap;
use crate::cost_functions::CostFunctionLink;

/// The cost functions which last prevented a dominance conclusion for a variable; they are tried
/// first the next time.
#[derive(Debug, Default, Clone)]
pub(crate) struct DeeResidues {
    support_against_worst: Option<CostFunctionLink>,
    pairs: HashMap<(usize, usize), CostFunctionLink>,
}

#[derive(Debug, Clone, Copy)]
enum DeeResidueKey {
    SupportAgainstWorst,
    Pair(usize, usize),
}

impl PropagationContext<'_> {
    /// The cost functions `variable` is currently connected to.
    pub(crate) fn connected_links(&self, variable: VariableId) -> impl Iterator<Item = CostFunctionLink> + '_ {
        self.variable(variable)
            .links
            .iter()
            .copied()
            .filter(|link| self.is_connected(link.cost_function))
    }

    /// Removes the forbidden values of `variable` and recomputes its worst unary cost.
    pub(crate) fn propagate_nc(&mut self, variable: VariableId) -> PropagationStatus {
        let mut current = Some(self.inf(variable));
        while let Some(index) = current {
            current = self.next_value(variable, index);
            if self.contains(variable, index) && self.is_forbidden(self.unary_cost(variable, index)) {
                self.statistics.num_nc_removals += 1;
                self.remove(variable, index)?;
            }
        }
        if self.is_assigned(variable) {
            return Ok(());
        }

        let cells = self.cells(variable);
        let old_max_cost = cells.max_cost(self.trailed_values);
        let (max_cost, max_cost_value) = cells
            .iter(self.trailed_values)
            .map(|index| (cells.unary_cost(self.trailed_values, index), index))
            .fold((0, cells.support(self.trailed_values)), |worst, candidate| {
                if candidate.0 > worst.0 {
                    candidate
                } else {
                    worst
                }
            });

        self.trailed_values.assign(cells.max_cost, max_cost);
        self.trailed_values
            .assign(cells.max_cost_value, max_cost_value as i64);
        if max_cost > old_max_cost {
            self.enqueue(QueueKind::Dee, variable);
        }
        Ok(())
    }

    /// Lets every cost function of `variable` react to removed values.
    pub(crate) fn propagate_ac(&mut self, variable: VariableId) -> PropagationStatus {
        if self.is_assigned(variable) {
            return Ok(());
        }
        for link in self.variable(variable).links.iter() {
            self.on_value_removed(link.cost_function, link.position)?;
        }
        Ok(())
    }

    /// Lets every cost function of `variable` move cost away from its new positive unary costs.
    pub(crate) fn propagate_dac(&mut self, variable: VariableId) -> PropagationStatus {
        if self.is_assigned(variable) {
            return Ok(());
        }
        for link in self.variable(variable).links.iter().rev() {
            self.on_projection_from_zero(link.cost_function, link.position)?;
        }
        Ok(())
    }

    /// The neighbours of `variable` (and `variable` itself, with `include_self`) may have lost
    /// existential arc consistency.
    pub(crate) fn fill_existential_queues(&mut self, variable: VariableId, include_self: bool) {
        if self.is_assigned(variable) {
            return;
        }
        if include_self {
            self.enqueue(QueueKind::Eac2, variable);
        }
        for link in self.variable(variable).links.iter() {
            self.fill_existential_queue(link.cost_function, link.position);
        }
    }

    fn is_existentially_consistent_value(&mut self, variable: VariableId, index: usize) -> bool {
        if !self.contains(variable, index) || self.unary_cost(variable, index) > 0 {
            return false;
        }
        let links = self
            .connected_links(variable)
            .filter(|link| self.is_active(link.cost_function))
            .collect::<Vec<_>>();
        links
            .into_iter()
            .all(|link| self.is_existentially_supported(link.cost_function, link.position, index))
    }

    /// Looks for a value of `variable` with zero unary cost which has a zero-cost tuple of zero
    /// unary costs in every cost function, and makes it the support.
    fn is_existentially_consistent(&mut self, variable: VariableId) -> bool {
        let best_value = self.variable(variable).best_value;
        let candidates = best_value
            .into_iter()
            .chain([self.support(variable)])
            .chain(self.domain(variable))
            .collect::<Vec<_>>();

        for index in candidates {
            if self.is_existentially_consistent_value(variable, index) {
                self.set_support(variable, index);
                return true;
            }
        }
        false
    }

    /// Restores existential arc consistency of `variable`, which raises the lower bound when no
    /// value is supported by all of its cost functions at once.
    pub(crate) fn propagate_eac(&mut self, variable: VariableId) -> PropagationStatus {
        if self.is_assigned(variable) || self.is_existentially_consistent(variable) {
            return Ok(());
        }
        self.statistics.num_eac_revisions += 1;

        for link in self.variable(variable).links.iter() {
            if self.is_connected(link.cost_function) && self.is_active(link.cost_function) {
                self.find_full_support(link.cost_function, link.position)?;
            }
        }
        self.find_support(variable)?;

        self.fill_existential_queues(variable, false);
        self.enqueue(QueueKind::Dee, variable);
        self.queues.get_mut(QueueKind::Eac1).remove(variable);
        Ok(())
    }

    /// Removes dominated values of `variable`.
    pub(crate) fn propagate_dee(&mut self, variable: VariableId) -> PropagationStatus {
        if self.is_assigned(variable) || self.is_eliminated(variable) {
            return Ok(());
        }

        let all_pairs = match self.options.dominance {
            DominanceLevel::Off => return Ok(()),
            DominanceLevel::SupportAgainstWorst => false,
            DominanceLevel::AllPairsAtRoot => self.trailed_values.get_checkpoint() == 0,
            DominanceLevel::AllPairs => true,
        };

        if all_pairs {
            let domain = self.domain(variable);
            for (position, &first) in domain.iter().enumerate() {
                for &second in &domain[position + 1..] {
                    if self.is_assigned(variable)
                        || !self.contains(variable, first)
                        || !self.contains(variable, second)
                    {
                        continue;
                    }
                    self.dominance_pair(variable, first, second, DeeResidueKey::Pair(first, second))?;
                }
            }
            return Ok(());
        }

        let cells = self.cells(variable);
        let support = cells.support(self.trailed_values);
        let mut worst = cells.max_cost_value(self.trailed_values);
        if worst == support || !self.contains(variable, worst) {
            worst = if self.sup(variable) != support {
                self.sup(variable)
            } else {
                self.inf(variable)
            };
        }
        if worst == support || !self.contains(variable, support) {
            return Ok(());
        }
        self.dominance_pair(variable, support, worst, DeeResidueKey::SupportAgainstWorst)
    }

    fn residue(&self, variable: VariableId, key: DeeResidueKey) -> Option<CostFunctionLink> {
        let residues = &self.dee_residues[variable];
        match key {
            DeeResidueKey::SupportAgainstWorst => residues.support_against_worst,
            DeeResidueKey::Pair(first, second) => residues.pairs.get(&(first, second)).copied(),
        }
    }

    fn set_residue(&mut self, variable: VariableId, key: DeeResidueKey, link: CostFunctionLink) {
        let residues = &mut self.dee_residues[variable];
        match key {
            DeeResidueKey::SupportAgainstWorst => residues.support_against_worst = Some(link),
            DeeResidueKey::Pair(first, second) => {
                let _ = residues.pairs.insert((first, second), link);
            }
        }
    }

    /// Tests the values at `first` and `second` of `variable` against each other.
    ///
    /// A value is removed when the other one costs at most as much in every completion; the
    /// variable is assigned when a value never costs anything. When testing the support against
    /// the worst value, every value whose unary cost alone reaches the worst cost of the kept
    /// value is removed as well.
    fn dominance_pair(
        &mut self,
        variable: VariableId,
        first: usize,
        second: usize,
        key: DeeResidueKey,
    ) -> PropagationStatus {
        let cost_first = self.unary_cost(variable, first);
        let cost_second = self.unary_cost(variable, second);
        let mut total_max_first = cost_first;
        let mut total_max_second = cost_second;
        let mut total_difference_first = cost_first;
        let mut total_difference_second = cost_second;

        let residue = self
            .residue(variable, key)
            .filter(|link| self.is_connected(link.cost_function));
        let links = residue
            .into_iter()
            .chain(self.connected_links(variable).filter(|&link| Some(link) != residue))
            .collect::<Vec<_>>();

        for link in links {
            let (for_first, for_second) =
                self.dominance_costs(link.cost_function, link.position, first, second);
            total_max_first = add_costs(total_max_first, for_first.max_cost);
            total_max_second = add_costs(total_max_second, for_second.max_cost);
            total_difference_first = add_costs(total_difference_first, for_first.max_difference);
            total_difference_second = add_costs(total_difference_second, for_second.max_difference);

            if total_difference_first > cost_second && total_difference_second > cost_first {
                self.set_residue(variable, key, link);
                return Ok(());
            }
        }

        if total_max_first == 0 {
            debug!("{variable}={first} never costs anything, assigning it");
            self.statistics.num_dee_removals += self.size(variable) as u64 - 1;
            return self.assign(variable, first);
        }
        if total_max_second == 0 {
            debug!("{variable}={second} never costs anything, assigning it");
            self.statistics.num_dee_removals += self.size(variable) as u64 - 1;
            return self.assign(variable, second);
        }

        let kept = if total_difference_first <= cost_second {
            debug!("{variable}={second} is dominated by {first}");
            self.statistics.num_dee_removals += 1;
            self.remove(variable, second)?;
            first
        } else if total_difference_second <= cost_first {
            debug!("{variable}={first} is dominated by {second}");
            self.statistics.num_dee_removals += 1;
            self.remove(variable, first)?;
            second
        } else if total_max_first <= total_max_second {
            first
        } else {
            second
        };

        if matches!(key, DeeResidueKey::SupportAgainstWorst) {
            let threshold = total_max_first.min(total_max_second);
            self.remove_values_costlier_than(variable, kept, threshold)?;
        }
        Ok(())
    }

    /// Removes every value other than `kept` whose unary cost is at least `threshold`, the
    /// largest cost one of the two compared values can lead to. A value removed as dominated
    /// still bounds the others, since `kept` dominates it in turn.
    fn remove_values_costlier_than(&mut self, variable: VariableId, kept: usize, threshold: Cost) -> PropagationStatus {
        for index in self.domain(variable) {
            if index != kept
                && self.contains(variable, kept)
                && self.contains(variable, index)
                && self.unary_cost(variable, index) >= threshold
            {
                debug!("{variable}={index} costs at least as much as {variable}={kept} ever does");
                self.statistics.num_dee_removals += 1;
                self.remove(variable, index)?;
            }
        }
        Ok(())
    }

    /// Whether the support of `variable` forms a zero-cost tuple with the supports of the other
    /// variables in every cost function of `variable`.
    fn has_full_eac_support(&self, variable: VariableId) -> bool {
        let support = self.support(variable);
        if self.unary_cost(variable, support) > 0 {
            return false;
        }
        self.connected_links(variable).all(|link| {
            let tuple = self
                .cost_function(link.cost_function)
                .variables()
                .iter()
                .map(|&other| self.support(other))
                .collect::<Vec<_>>();
            tuple
                .iter()
                .zip(self.cost_function(link.cost_function).variables())
                .all(|(&index, &other)| self.contains(other, index))
                && self.observed_cost(link.cost_function, &tuple) == 0
        })
    }

    /// Recomputes the full EAC flags of the variables whose support changed, and of their
    /// neighbours.
    pub(crate) fn revise_full_eac(&mut self) {
        while let Some(variable) = self.queues.pop(QueueKind::FullEac) {
            let mut to_revise = vec![variable];
            for link in self.connected_links(variable) {
                to_revise.extend_from_slice(self.cost_function(link.cost_function).variables());
            }
            for revised in to_revise {
                let flag = self.is_eliminated(revised) || self.has_full_eac_support(revised);
                let cells = self.cells(revised);
                self.trailed_values.assign(cells.full_eac, i64::from(flag));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DeeResidueKey;
    use crate::engine::test_helpers::branch_and_bound;
    use crate::engine::test_helpers::brute_force_optimum;
    use crate::engine::test_helpers::initial_domains;
    use crate::engine::test_helpers::RandomNetwork;
    use crate::engine::ConsistencyLevel;
    use crate::engine::DominanceLevel;
    use crate::engine::Network;
    use crate::engine::PropagationOptions;

    #[test]
    fn node_consistency_twice_changes_nothing() {
        'seeds: for seed in 0..10 {
            let (mut network, variables) = RandomNetwork::default().build(seed, PropagationOptions::default());
            network.propagate_to_fixed_point().unwrap();
            network.new_checkpoint();
            network.set_upper_bound(network.lower_bound() + 4).unwrap();

            let mut context = network.context();
            for &variable in &variables {
                if context.propagate_nc(variable).is_err() {
                    continue 'seeds;
                }
                let after_first = context.trailed_values.snapshot();
                context.propagate_nc(variable).unwrap();
                assert_eq!(context.trailed_values.snapshot(), after_first, "seed {seed}");
            }
        }
    }

    #[test]
    fn no_projectable_cost_is_left_after_the_fixpoint() {
        for consistency in [ConsistencyLevel::Arc, ConsistencyLevel::FullDirectionalArc] {
            for seed in 0..10 {
                let options = PropagationOptions {
                    consistency,
                    ..Default::default()
                };
                let (mut network, _) = RandomNetwork::default().build(seed, options);
                network.propagate_to_fixed_point().unwrap();

                let context = network.context();
                for cost_function in context.cost_functions.keys() {
                    if !context.is_connected(cost_function) {
                        continue;
                    }
                    let variables = context.cost_function(cost_function).variables();
                    for position in context.unassigned_positions(cost_function) {
                        for index in context.domain(variables[position]) {
                            let (minimum, _) =
                                context.minimum_completion(cost_function, position, index, false);
                            assert_eq!(minimum, 0, "{consistency:?} on seed {seed}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn the_default_fixpoint_terminates_and_keeps_the_optimum() {
        for seed in 0..40 {
            let (mut network, _) = RandomNetwork::default().build(seed, PropagationOptions::default());
            let domains = initial_domains(&network);
            let optimum = brute_force_optimum(&network, &domains);

            network.propagate_to_fixed_point().unwrap();
            assert!(network.lower_bound() <= optimum, "seed {seed}");

            let (cost, values) = branch_and_bound(&mut network).unwrap();
            assert_eq!(cost, optimum, "seed {seed}");
            assert_eq!(network.evaluate(&values), optimum, "seed {seed}");
        }
    }

    #[test]
    fn the_first_variable_in_dac_order_has_full_supports() {
        for consistency in [ConsistencyLevel::DirectionalArc, ConsistencyLevel::FullDirectionalArc] {
            for seed in 0..10 {
                let options = PropagationOptions {
                    consistency,
                    ..Default::default()
                };
                let (mut network, _) = RandomNetwork::default().build(seed, options);
                network.propagate_to_fixed_point().unwrap();

                let context = network.context();
                for cost_function in context.cost_functions.keys() {
                    if !context.is_connected(cost_function)
                        || context.cost_function(cost_function).is_nary()
                        || context.unassigned_positions(cost_function).len() < 2
                    {
                        continue;
                    }
                    let Some(dac_position) = context.dac_position(cost_function) else {
                        continue;
                    };
                    let variable = context.cost_function(cost_function).variables()[dac_position];
                    for index in context.domain(variable) {
                        let (minimum, _) = context.minimum_completion(cost_function, dac_position, index, true);
                        assert_eq!(minimum, 0, "{consistency:?} on seed {seed}");
                    }
                }
            }
        }
    }

    #[test]
    fn values_as_costly_as_the_removed_worst_value_are_removed_too() {
        let mut network = Network::new(PropagationOptions {
            dominance: DominanceLevel::SupportAgainstWorst,
            ..Default::default()
        });
        let x = network.new_variable(0, 2, None).unwrap();
        let y = network.new_variable(0, 1, None).unwrap();
        let _ = network.add_binary_cost_function([x, y], vec![0, 9, 0, 0, 0, 0]).unwrap();
        network.project(x, 1, 2).unwrap();
        network.project(x, 2, 2).unwrap();
        network.project(y, 1, 10).unwrap();
        network.set_upper_bound(10).unwrap();

        // Only the completions with y = 0 count: x = 0 dominates x = 2 there, while x = 0
        // still costs 9 with y = 1 and x = 2 never costs more than 2.
        let mut context = network.context();
        context
            .dominance_pair(x, 0, 2, DeeResidueKey::SupportAgainstWorst)
            .unwrap();

        assert_eq!(network.domain(x), vec![0]);
    }

    #[test]
    fn a_dominated_value_is_removed() {
        let build = |dominance| {
            let mut network = Network::new(PropagationOptions {
                dominance,
                ..Default::default()
            });
            let x = network.new_variable(0, 1, None).unwrap();
            let y = network.new_variable(0, 1, None).unwrap();
            let _ = network.add_unary_cost_function(x, vec![0, 3]).unwrap();
            let _ = network.add_binary_cost_function([x, y], vec![1, 0, 0, 0]).unwrap();
            network.propagate_to_fixed_point().unwrap();
            (network, x)
        };

        let (network, x) = build(DominanceLevel::Off);
        assert_eq!(network.domain(x), vec![0, 1]);

        let (network, x) = build(DominanceLevel::SupportAgainstWorst);
        assert_eq!(network.domain(x), vec![0]);
        assert_eq!(network.lower_bound(), 0);
        assert!(network.statistics().num_dee_removals > 0);
    }

    #[test]
    fn dominance_keeps_an_optimal_solution() {
        let levels = [
            DominanceLevel::SupportAgainstWorst,
            DominanceLevel::AllPairsAtRoot,
            DominanceLevel::AllPairs,
        ];
        for dominance in levels {
            for seed in 0..10 {
                let shape = RandomNetwork {
                    num_variables: 6,
                    num_binary: 7,
                    max_cost: 3,
                    ..Default::default()
                };
                let options = PropagationOptions {
                    dominance,
                    ..Default::default()
                };
                let (mut network, _) = shape.build(seed, options);
                let domains = initial_domains(&network);
                let optimum = brute_force_optimum(&network, &domains);

                let (cost, _) = branch_and_bound(&mut network).unwrap();
                assert_eq!(cost, optimum, "{dominance:?} on seed {seed}");
            }
        }
    }

    #[test]
    fn the_support_is_preferred_to_be_the_best_value() {
        let mut network = Network::new(PropagationOptions {
            dominance: DominanceLevel::Off,
            ..Default::default()
        });
        let x = network.new_variable(0, 3, None).unwrap();
        let _ = network.add_unary_cost_function(x, vec![2, 1, 1, 1]).unwrap();
        network.set_best_value(x, 2);
        network.propagate_to_fixed_point().unwrap();

        assert_eq!(network.lower_bound(), 1);
        assert_eq!(network.support(x), 2);
    }
}
