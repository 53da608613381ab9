//! Random networks and a small depth-first branch and bound for the tests of the engine.
use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;

use super::Network;
use super::PropagationOptions;
use super::VariableId;
use crate::basic_types::Cost;
use crate::basic_types::MAX_COST;
use crate::containers::StorageKey;
use crate::cost_functions::Completions;
use crate::cost_functions::CostFunctionId;

/// The shape of a random network.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RandomNetwork {
    pub(crate) num_variables: usize,
    pub(crate) domain_size: i32,
    pub(crate) num_unary: usize,
    pub(crate) num_binary: usize,
    pub(crate) num_ternary: usize,
    pub(crate) max_cost: Cost,
    /// The chance that a tuple is forbidden outright.
    pub(crate) forbidden_probability: f64,
}

impl Default for RandomNetwork {
    fn default() -> Self {
        RandomNetwork {
            num_variables: 5,
            domain_size: 3,
            num_unary: 2,
            num_binary: 5,
            num_ternary: 1,
            max_cost: 5,
            forbidden_probability: 0.0,
        }
    }
}

impl RandomNetwork {
    pub(crate) fn build(&self, seed: u64, options: PropagationOptions) -> (Network, Vec<VariableId>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut network = Network::new(options);
        let variables = (0..self.num_variables)
            .map(|_| {
                network
                    .new_variable(0, self.domain_size - 1, None)
                    .expect("the domain is not empty")
            })
            .collect::<Vec<_>>();
        let domain_size = self.domain_size as usize;

        for _ in 0..self.num_unary {
            let variable = variables[rng.gen_range(0..variables.len())];
            let costs = self.random_costs(&mut rng, domain_size);
            let _ = network
                .add_unary_cost_function(variable, costs)
                .expect("valid unary table");
        }
        for _ in 0..self.num_binary {
            let [first, second] = distinct_variables(&mut rng, &variables);
            let costs = self.random_costs(&mut rng, domain_size.pow(2));
            let _ = network
                .add_binary_cost_function([first, second], costs)
                .expect("valid binary table");
        }
        for _ in 0..self.num_ternary {
            let [first, second, third] = distinct_variables(&mut rng, &variables);
            let costs = self.random_costs(&mut rng, domain_size.pow(3));
            let _ = network
                .add_ternary_cost_function([first, second, third], costs)
                .expect("valid ternary table");
        }
        (network, variables)
    }

    fn random_costs(&self, rng: &mut SmallRng, num_tuples: usize) -> Vec<Cost> {
        (0..num_tuples)
            .map(|_| {
                if rng.gen_bool(self.forbidden_probability) {
                    MAX_COST
                } else {
                    rng.gen_range(0..=self.max_cost)
                }
            })
            .collect()
    }
}

fn distinct_variables<const N: usize>(rng: &mut SmallRng, variables: &[VariableId]) -> [VariableId; N] {
    let mut chosen = [variables[0]; N];
    let mut num_chosen = 0;
    while num_chosen < N {
        let candidate = variables[rng.gen_range(0..variables.len())];
        if !chosen[..num_chosen].contains(&candidate) {
            chosen[num_chosen] = candidate;
            num_chosen += 1;
        }
    }
    chosen
}

/// The initial domains of every variable, read before anything is propagated.
pub(crate) fn initial_domains(network: &Network) -> Vec<Vec<i32>> {
    network.variables().map(|variable| network.domain(variable)).collect()
}

/// Every complete assignment over `domains`.
pub(crate) fn all_assignments(domains: &[Vec<i32>]) -> Vec<Vec<i32>> {
    let sizes = domains.iter().map(Vec::len).collect::<Vec<_>>();
    let mut tuples = Completions::over_initial_domains(&sizes);
    let mut assignments = Vec::new();
    while let Some(tuple) = tuples.next_tuple() {
        assignments.push(
            tuple
                .iter()
                .zip(domains)
                .map(|(&index, domain)| domain[index])
                .collect(),
        );
    }
    assignments
}

pub(crate) fn brute_force_optimum(network: &Network, domains: &[Vec<i32>]) -> Cost {
    all_assignments(domains)
        .iter()
        .map(|values| network.evaluate(values))
        .min()
        .unwrap_or(MAX_COST)
}

/// The lower bound plus the unary costs plus the observed costs of the connected cost
/// functions; transformations must leave this unchanged for every assignment within the
/// current domains.
pub(crate) fn distributed_cost(network: &Network, values: &[i32]) -> Cost {
    let unary = network
        .variables()
        .zip(values)
        .map(|(variable, &value)| network.unary_cost(variable, value))
        .sum::<Cost>();
    let observed = (0..network.num_cost_functions())
        .map(cost_function_id)
        .filter(|&cost_function| network.is_connected(cost_function))
        .map(|cost_function| {
            let scope_values = network
                .scope(cost_function)
                .iter()
                .map(|variable| values[variable.index()])
                .collect::<Vec<_>>();
            network.observed_cost(cost_function, &scope_values)
        })
        .sum::<Cost>();
    network.lower_bound() + unary + observed
}

pub(crate) fn cost_function_id(index: usize) -> CostFunctionId {
    CostFunctionId::create_from_index(index)
}

/// Depth-first branch and bound over the variables in creation order. Returns the optimal cost
/// and an optimal assignment, or `None` when the root is inconsistent.
pub(crate) fn branch_and_bound(network: &mut Network) -> Option<(Cost, Vec<i32>)> {
    if network.propagate_to_fixed_point().is_err() {
        return None;
    }
    let mut best = None;
    search(network, &mut best);
    best
}

fn search(network: &mut Network, best: &mut Option<(Cost, Vec<i32>)>) {
    let unassigned = network
        .variables()
        .find(|&variable| !network.is_assigned(variable) && !network.is_eliminated(variable));

    let Some(variable) = unassigned else {
        let mut values = network
            .variables()
            .map(|variable| network.support(variable))
            .collect::<Vec<_>>();
        network.complete_assignment(&mut values);
        let cost = network.evaluate(&values);
        if best.as_ref().map_or(true, |(best_cost, _)| cost < *best_cost) {
            *best = Some((cost, values));
            let _ = network.set_upper_bound(cost);
        }
        return;
    };

    for value in network.domain(variable) {
        let checkpoint = network.get_checkpoint();
        network.new_checkpoint();
        if network.assign(variable, value).is_ok() && network.propagate_to_fixed_point().is_ok() {
            search(network, best);
        }
        network.restore_to(checkpoint);
    }
}
