//! Variable elimination: a variable connected to at most one cost function is removed from the
//! network and its cost is moved onto its neighbour, to be recovered when a solution is completed.
use log::debug;

use super::PropagationContext;
use super::TrailedInteger;
use super::TrailedValues;
use super::VariableId;
use crate::basic_types::add_costs;
use crate::basic_types::PropagationStatus;
use crate::basic_types::MAX_COST;
use crate::cost_functions::CostFunctionLink;

/// An eliminated variable, with the cost functions it was connected to at that point.
#[derive(Debug, Clone)]
pub(crate) struct EliminationRecord {
    pub(crate) variable: VariableId,
    pub(crate) links: Vec<CostFunctionLink>,
}

/// The eliminations in the order they happened.
///
/// Only the number of valid records is reversible; the records beyond it are dropped when the
/// next one is added.
#[derive(Debug, Clone)]
pub(crate) struct Eliminations {
    records: Vec<EliminationRecord>,
    num_records: TrailedInteger,
}

impl Eliminations {
    pub(crate) fn new(trailed_values: &mut TrailedValues) -> Self {
        Eliminations {
            records: Vec::new(),
            num_records: trailed_values.grow(0),
        }
    }

    pub(crate) fn records<'a>(&'a self, trailed_values: &TrailedValues) -> &'a [EliminationRecord] {
        let num_records = trailed_values.read(self.num_records) as usize;
        &self.records[..num_records]
    }

    pub(crate) fn push(&mut self, trailed_values: &mut TrailedValues, record: EliminationRecord) {
        let num_records = trailed_values.read(self.num_records) as usize;
        self.records.truncate(num_records);
        self.records.push(record);
        trailed_values.add_assign(self.num_records, 1);
    }
}

impl PropagationContext<'_> {
    pub(crate) fn mark_eliminated(&mut self, variable: VariableId, links: Vec<CostFunctionLink>) {
        let cells = self.cells(variable);
        self.trailed_values.assign(cells.eliminated, 1);
        self.eliminations
            .push(self.trailed_values, EliminationRecord { variable, links });
        self.statistics.num_eliminations += 1;
    }

    /// Eliminates `variable` if it is connected to no cost function, or to a single one which has
    /// exactly one other unassigned variable.
    pub(crate) fn eliminate(&mut self, variable: VariableId) -> PropagationStatus {
        let Some(max_degree) = self.options.elimination_degree else {
            return Ok(());
        };
        if self.is_assigned(variable) || self.is_eliminated(variable) {
            return Ok(());
        }

        let links = self.connected_links(variable).collect::<Vec<_>>();
        if links.len() > max_degree {
            return Ok(());
        }
        match links.as_slice() {
            [] => {
                debug!("eliminate {variable}, it has no cost functions left");
                self.mark_eliminated(variable, links);
            }
            &[link] => {
                let unassigned = self.unassigned_positions(link.cost_function);
                let &[first, second] = unassigned.as_slice() else {
                    return Ok(());
                };
                let other_position = if first == link.position { second } else { first };
                let other = self.cost_function(link.cost_function).variables()[other_position];

                debug!("eliminate {variable} into {other} through {}", link.cost_function);
                for other_index in self.domain(other) {
                    let cost = self
                        .domain(variable)
                        .into_iter()
                        .map(|index| {
                            let observed = self
                                .completions(
                                    link.cost_function,
                                    &[(link.position, index), (other_position, other_index)],
                                )
                                .next_tuple()
                                .map_or(MAX_COST, |tuple| self.observed_cost(link.cost_function, tuple));
                            add_costs(observed, self.unary_cost(variable, index))
                        })
                        .min()
                        .unwrap_or(MAX_COST);
                    self.project(other, other_index, cost)?;
                }

                self.deconnect(link.cost_function);
                self.mark_eliminated(variable, links);
                self.find_support(other)?;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::basic_types::MAX_COST;
    use crate::engine::test_helpers::branch_and_bound;
    use crate::engine::test_helpers::brute_force_optimum;
    use crate::engine::test_helpers::cost_function_id;
    use crate::engine::test_helpers::initial_domains;
    use crate::engine::test_helpers::RandomNetwork;
    use crate::engine::DominanceLevel;
    use crate::engine::Network;
    use crate::engine::PropagationOptions;

    fn eliminating(degree: usize) -> PropagationOptions {
        PropagationOptions {
            dominance: DominanceLevel::Off,
            elimination_degree: Some(degree),
            ..Default::default()
        }
    }

    #[test]
    fn a_chain_of_two_is_eliminated_entirely() {
        let mut network = Network::new(eliminating(1));
        let x = network.new_variable(0, 1, None).unwrap();
        let y = network.new_variable(0, 1, None).unwrap();
        let _ = network.add_binary_cost_function([x, y], vec![1, 3, 3, 2]).unwrap();

        network.propagate_to_fixed_point().unwrap();

        assert!(network.is_eliminated(x));
        assert!(network.is_eliminated(y));
        assert_eq!(network.lower_bound(), 1);
        assert_eq!(network.statistics().num_eliminations, 2);

        let mut values = vec![network.support(x), network.support(y)];
        network.complete_assignment(&mut values);
        assert_eq!(values, vec![0, 0]);
        assert_eq!(network.evaluate(&values), 1);
    }

    #[test]
    fn eliminations_are_undone_on_backtrack() {
        let mut network = Network::new(eliminating(1));
        let x = network.new_variable(0, 1, None).unwrap();
        let y = network.new_variable(0, 1, None).unwrap();
        let z = network.new_variable(0, 1, None).unwrap();
        let _ = network.add_binary_cost_function([x, y], vec![0, 2, 2, 0]).unwrap();
        let _ = network.add_binary_cost_function([y, z], vec![0, 2, 2, 0]).unwrap();
        let _ = network.add_binary_cost_function([x, z], vec![0, 2, 2, 0]).unwrap();
        network.propagate_to_fixed_point().unwrap();
        assert!(!network.is_eliminated(y));

        network.new_checkpoint();
        network.assign(x, 1).unwrap();
        network.propagate_to_fixed_point().unwrap();
        assert!(network.is_eliminated(y) || network.is_eliminated(z));

        network.restore_to(0);
        assert!(!network.is_eliminated(y));
        assert!(!network.is_eliminated(z));
    }

    #[test]
    fn a_cycle_is_shortened_through_new_cost_functions() {
        let mut network = Network::new(eliminating(2));
        let variables = (0..4)
            .map(|_| network.new_variable(0, 2, None).unwrap())
            .collect::<Vec<_>>();
        let tables = [
            vec![0, 3, 1, 2, 0, 4, 1, 1, 0],
            vec![2, 0, 1, 0, 3, 3, 1, 2, 0],
            vec![0, 1, 4, 2, 0, 1, 3, 1, 2],
            vec![1, 1, 0, 0, 2, 3, 4, 0, 1],
        ];
        for (index, costs) in tables.into_iter().enumerate() {
            let scope = [variables[index], variables[(index + 1) % 4]];
            let _ = network.add_binary_cost_function(scope, costs).unwrap();
        }
        let domains = initial_domains(&network);
        let optimum = brute_force_optimum(&network, &domains);

        network.eliminate_variables().unwrap();
        assert!(network.is_eliminated(variables[0]));
        assert!(network.num_cost_functions() > 4);

        let (cost, values) = branch_and_bound(&mut network).expect("the cycle has a solution");
        assert_eq!(cost, optimum);
        assert_eq!(network.evaluate(&values), optimum);
    }

    #[test]
    fn removed_values_are_forbidden_in_the_new_cost_function() {
        let mut network = Network::new(eliminating(2));
        let variables = (0..4)
            .map(|_| network.new_variable(0, 2, None).unwrap())
            .collect::<Vec<_>>();
        for index in 0..4 {
            let scope = [variables[index], variables[(index + 1) % 4]];
            let _ = network.add_binary_cost_function(scope, vec![1; 9]).unwrap();
        }
        network.remove(variables[1], 2).unwrap();

        network.eliminate_variables().unwrap();

        let new_cost_function = cost_function_id(4);
        assert_eq!(network.scope(new_cost_function), &[variables[1], variables[3]]);
        assert_eq!(network.observed_cost(new_cost_function, &[2, 0]), MAX_COST);
        assert!(network.observed_cost(new_cost_function, &[1, 0]) < MAX_COST);
    }

    #[test]
    fn search_with_elimination_finds_the_optimum() {
        let shape = RandomNetwork {
            num_variables: 6,
            num_binary: 5,
            num_ternary: 0,
            ..Default::default()
        };
        for degree in [1, 2] {
            for seed in 0..15 {
                let (mut network, _) = shape.build(seed, eliminating(degree));
                let domains = initial_domains(&network);
                let optimum = brute_force_optimum(&network, &domains);

                network.eliminate_variables().unwrap();
                let (cost, values) = branch_and_bound(&mut network).expect("all costs are finite");
                assert_eq!(cost, optimum, "degree {degree}, seed {seed}");
                assert_eq!(network.evaluate(&values), optimum, "degree {degree}, seed {seed}");
            }
        }
    }
}
