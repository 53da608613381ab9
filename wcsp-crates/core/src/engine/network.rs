use log::debug;

use super::Bounds;
use super::DeeResidues;
use super::PropagationContext;
use super::PropagationOptions;
use super::PropagationQueues;
use super::QueueKind;
use super::TrailedValues;
use super::Variable;
use super::VariableCells;
use super::VariableId;
use super::elimination::EliminationRecord;
use super::elimination::Eliminations;
use super::network_statistics::PropagationStatistics;
use crate::basic_types::add_costs;
use crate::basic_types::ConstructionError;
use crate::basic_types::Contradiction;
use crate::basic_types::Cost;
use crate::basic_types::PropagationStatus;
use crate::basic_types::MAX_COST;
use crate::containers::HashMap;
use crate::containers::KeyedVec;
use crate::containers::StorageKey;
use crate::cost_functions::BinaryTable;
use crate::cost_functions::Completions;
use crate::cost_functions::CostFunction;
use crate::cost_functions::CostFunctionId;
use crate::cost_functions::CostFunctionLink;
use crate::cost_functions::CostFunctionScope;
use crate::cost_functions::CostTable;
use crate::cost_functions::NaryStorage;
use crate::cost_functions::NaryTable;
use crate::cost_functions::NaryTableStorage;
use crate::cost_functions::TernaryTable;
use crate::cost_functions::UnaryTable;
use crate::statistics::log_statistic_postfix;
use crate::statistics::should_log_statistics;
use crate::statistics::Statistic;
use crate::statistics::StatisticLogger;
use crate::wcsp_assert_moderate;
use crate::wcsp_assert_simple;

/// A cost function network together with the reversible state of its soft local consistency.
///
/// The network is built at the root (checkpoint 0): variables and cost functions can only be
/// added there. A search driver then alternates [`Network::new_checkpoint`], a branching
/// decision such as [`Network::assign`], [`Network::propagate_to_fixed_point`] and, on a
/// contradiction or when the subtree is done, [`Network::restore_to`].
///
/// After a successful fixpoint, [`Network::lower_bound`] is a lower bound on the cost of every
/// complete assignment within the current domains.
///
/// # Example
/// ```
/// # use wcsp_core::DominanceLevel;
/// # use wcsp_core::Network;
/// # use wcsp_core::PropagationOptions;
/// let mut network = Network::new(PropagationOptions {
///     dominance: DominanceLevel::Off,
///     ..Default::default()
/// });
/// let x = network.new_variable(0, 2, None).unwrap();
/// let _ = network.add_unary_cost_function(x, vec![4, 2, 3]).unwrap();
///
/// network.propagate_to_fixed_point().unwrap();
/// assert_eq!(network.lower_bound(), 2);
/// assert_eq!(network.unary_cost(x, 0), 2);
///
/// network.new_checkpoint();
/// network.set_upper_bound(4).unwrap();
/// network.propagate_to_fixed_point().unwrap();
/// assert_eq!(network.domain(x), vec![1, 2]);
///
/// network.restore_to(0);
/// assert_eq!(network.domain(x), vec![0, 1, 2]);
/// ```
#[derive(Debug)]
pub struct Network {
    options: PropagationOptions,
    trailed_values: TrailedValues,
    variables: KeyedVec<VariableId, Variable>,
    cost_functions: KeyedVec<CostFunctionId, CostFunction>,
    queues: PropagationQueues,
    bounds: Bounds,
    dee_residues: KeyedVec<VariableId, DeeResidues>,
    eliminations: Eliminations,
    /// Cost functions which were added or changed since the last fixpoint, propagated from
    /// scratch by the next one.
    pending: Vec<CostFunctionId>,
    statistics: PropagationStatistics,
}

impl Default for Network {
    fn default() -> Self {
        Network::new(PropagationOptions::default())
    }
}

impl Network {
    pub fn new(options: PropagationOptions) -> Self {
        let mut trailed_values = TrailedValues::default();
        let bounds = Bounds {
            lower_bound: trailed_values.grow(0),
            upper_bound: MAX_COST,
            objective_changed: false,
        };
        let eliminations = Eliminations::new(&mut trailed_values);

        Network {
            options,
            trailed_values,
            variables: KeyedVec::default(),
            cost_functions: KeyedVec::default(),
            queues: PropagationQueues::default(),
            bounds,
            dee_residues: KeyedVec::default(),
            eliminations,
            pending: Vec::new(),
            statistics: PropagationStatistics::default(),
        }
    }

    pub fn options(&self) -> &PropagationOptions {
        &self.options
    }

    pub(crate) fn context(&mut self) -> PropagationContext<'_> {
        PropagationContext {
            trailed_values: &mut self.trailed_values,
            variables: &self.variables,
            cost_functions: &self.cost_functions,
            queues: &mut self.queues,
            bounds: &mut self.bounds,
            dee_residues: &mut self.dee_residues,
            eliminations: &mut self.eliminations,
            options: &self.options,
            statistics: &mut self.statistics,
            propagated_queues: self.options.propagated_queues(),
        }
    }

    #[cfg(test)]
    pub(crate) fn statistics(&self) -> &PropagationStatistics {
        &self.statistics
    }

    fn assert_at_root(&self, operation: &str) {
        wcsp_assert_simple!(
            self.trailed_values.get_checkpoint() == 0,
            "{operation} is only allowed at the root"
        );
    }
}

/// Building the network.
impl Network {
    /// Creates a variable with the domain `[lower, upper]`.
    pub fn new_variable(
        &mut self,
        lower: i32,
        upper: i32,
        name: Option<&str>,
    ) -> Result<VariableId, ConstructionError> {
        if lower > upper {
            return Err(ConstructionError::EmptyDomain { lower, upper });
        }
        Ok(self.push_variable((lower..=upper).collect(), name))
    }

    /// Creates a variable whose domain is the given values; duplicates are ignored.
    pub fn new_sparse_variable(
        &mut self,
        values: &[i32],
        name: Option<&str>,
    ) -> Result<VariableId, ConstructionError> {
        let mut values = values.to_vec();
        values.sort_unstable();
        values.dedup();
        if values.is_empty() {
            return Err(ConstructionError::NoValues);
        }
        Ok(self.push_variable(values.into(), name))
    }

    fn push_variable(&mut self, values: Box<[i32]>, name: Option<&str>) -> VariableId {
        self.assert_at_root("creating a variable");

        let cells = VariableCells::new(&mut self.trailed_values, &vec![true; values.len()]);
        let dac_order = self.variables.len() as u32;
        let variable = self.variables.push(Variable {
            name: name.map(str::to_owned),
            values,
            cells,
            links: Vec::new(),
            dac_order,
            best_value: None,
        });
        let _ = self.dee_residues.push(DeeResidues::default());
        variable
    }

    fn check_scope(&self, scope: &[VariableId]) -> Result<(), ConstructionError> {
        if scope.is_empty() {
            return Err(ConstructionError::EmptyScope);
        }
        for (position, variable) in scope.iter().enumerate() {
            if scope[..position].contains(variable) {
                return Err(ConstructionError::RepeatedVariable(*variable));
            }
        }
        Ok(())
    }

    fn check_table(&self, scope: &[VariableId], costs: &[Cost]) -> Result<(), ConstructionError> {
        let expected = scope
            .iter()
            .map(|&variable| self.variables[variable].values.len())
            .product();
        if costs.len() != expected {
            return Err(ConstructionError::TableLengthMismatch {
                expected,
                actual: costs.len(),
            });
        }
        check_costs(costs.iter().copied())
    }

    fn indices_of(&self, scope: &[VariableId], values: &[i32]) -> Result<Vec<usize>, ConstructionError> {
        if values.len() != scope.len() {
            return Err(ConstructionError::ExceptionArityMismatch {
                expected: scope.len(),
                actual: values.len(),
            });
        }
        scope
            .iter()
            .zip(values)
            .map(|(&variable, &value)| {
                self.variables[variable]
                    .index_of(value)
                    .ok_or(ConstructionError::ValueOutsideDomain { variable, value })
            })
            .collect()
    }

    fn push_cost_function(
        &mut self,
        variables: Box<[VariableId]>,
        derived: bool,
        build: impl FnOnce(CostFunctionScope) -> CostFunction,
    ) -> CostFunctionId {
        self.assert_at_root("creating a cost function");

        let sizes = variables
            .iter()
            .map(|&variable| self.variables[variable].values.len())
            .collect();
        let scope = CostFunctionScope::new(&mut self.trailed_values, variables.clone(), sizes, derived);
        let cost_function = self.cost_functions.push(build(scope));

        for (position, &variable) in variables.iter().enumerate() {
            self.variables[variable].links.push(CostFunctionLink {
                cost_function,
                position,
            });
        }
        self.pending.push(cost_function);
        debug!("created {cost_function} over {variables:?}");
        cost_function
    }

    /// Adds a cost function with one cost per value of the initial domain of `variable`.
    pub fn add_unary_cost_function(
        &mut self,
        variable: VariableId,
        costs: Vec<Cost>,
    ) -> Result<CostFunctionId, ConstructionError> {
        self.check_table(&[variable], &costs)?;
        Ok(self.push_cost_function(Box::new([variable]), false, |scope| {
            CostFunction::Unary {
                scope,
                table: UnaryTable {
                    costs: costs.into_iter().map(|cost| cost.min(MAX_COST)).collect(),
                },
            }
        }))
    }

    /// Adds a cost function over two variables; `costs` is indexed by the first variable, then
    /// the second.
    pub fn add_binary_cost_function(
        &mut self,
        scope: [VariableId; 2],
        costs: Vec<Cost>,
    ) -> Result<CostFunctionId, ConstructionError> {
        self.check_scope(&scope)?;
        self.check_table(&scope, &costs)?;
        Ok(self.push_binary(scope, costs, false))
    }

    fn push_binary(&mut self, scope: [VariableId; 2], costs: Vec<Cost>, derived: bool) -> CostFunctionId {
        let num_columns = self.variables[scope[1]].values.len();
        self.push_cost_function(Box::new(scope), derived, |scope| CostFunction::Binary {
            scope,
            table: BinaryTable {
                num_columns,
                costs: costs.into_iter().map(|cost| cost.min(MAX_COST)).collect(),
            },
        })
    }

    /// Adds a cost function over three variables; the last variable varies fastest in `costs`.
    pub fn add_ternary_cost_function(
        &mut self,
        scope: [VariableId; 3],
        costs: Vec<Cost>,
    ) -> Result<CostFunctionId, ConstructionError> {
        self.check_scope(&scope)?;
        self.check_table(&scope, &costs)?;
        let sizes = scope.map(|variable| self.variables[variable].values.len());
        let costs = costs.into_iter().map(|cost| cost.min(MAX_COST)).collect();
        Ok(self.push_cost_function(Box::new(scope), false, |scope| CostFunction::Ternary {
            scope,
            table: TernaryTable::new(sizes, costs),
        }))
    }

    /// Adds a cost function over any number of variables.
    pub fn add_nary_cost_function(
        &mut self,
        scope: &[VariableId],
        table: NaryTable,
    ) -> Result<CostFunctionId, ConstructionError> {
        self.check_scope(scope)?;
        let storage = match table {
            NaryTable::Dense(costs) => {
                self.check_table(scope, &costs)?;
                NaryStorage::Dense(costs.into_iter().map(|cost| cost.min(MAX_COST)).collect())
            }
            NaryTable::Sparse {
                default,
                exceptions,
            } => {
                check_costs([default])?;
                let mut indexed = HashMap::default();
                for (values, cost) in exceptions {
                    check_costs([cost])?;
                    let tuple = self.indices_of(scope, &values)?;
                    let _ = indexed.insert(tuple.into_boxed_slice(), cost.min(MAX_COST));
                }
                NaryStorage::Sparse {
                    default: default.min(MAX_COST),
                    exceptions: indexed,
                }
            }
            NaryTable::Implicit(function) => NaryStorage::Implicit {
                function,
                values: scope
                    .iter()
                    .map(|&variable| self.variables[variable].values.clone())
                    .collect(),
                overrides: HashMap::default(),
            },
        };

        let sizes = scope
            .iter()
            .map(|&variable| self.variables[variable].values.len())
            .collect();
        Ok(self.push_cost_function(scope.into(), false, |scope| CostFunction::Nary {
            scope,
            table: NaryTableStorage { sizes, storage },
        }))
    }

    fn update_table_cost(
        &mut self,
        cost_function: CostFunctionId,
        values: &[i32],
        update: impl FnOnce(Cost) -> Cost,
    ) -> Result<(), ConstructionError> {
        self.assert_at_root("changing a table");
        wcsp_assert_simple!(
            self.cost_functions[cost_function].has_zero_deltas(&self.trailed_values),
            "the table of {cost_function} cannot change while cost was moved out of it"
        );

        let tuple = self.indices_of(self.cost_functions[cost_function].variables(), values)?;
        let old_cost = self.cost_functions[cost_function].table_cost(&tuple);
        let new_cost = update(old_cost);
        check_costs([new_cost])?;
        self.cost_functions[cost_function].set_table_cost(&tuple, new_cost);
        if !self.pending.contains(&cost_function) {
            self.pending.push(cost_function);
        }
        Ok(())
    }

    /// Adds `cost` to the cost of the tuple `values` of the cost function.
    pub fn add_cost(
        &mut self,
        cost_function: CostFunctionId,
        values: &[i32],
        cost: Cost,
    ) -> Result<(), ConstructionError> {
        check_costs([cost])?;
        self.update_table_cost(cost_function, values, |old_cost| add_costs(old_cost, cost))
    }

    /// Overwrites the cost of the tuple `values` of the cost function.
    pub fn set_cost(
        &mut self,
        cost_function: CostFunctionId,
        values: &[i32],
        cost: Cost,
    ) -> Result<(), ConstructionError> {
        self.update_table_cost(cost_function, values, |_| cost)
    }

    /// Adds the costs of `source` into `target`, which must have the same variables in any
    /// order, and disables `source`.
    pub fn merge_cost_functions(
        &mut self,
        target: CostFunctionId,
        source: CostFunctionId,
    ) -> Result<(), ConstructionError> {
        self.assert_at_root("merging cost functions");
        let target_variables = self.cost_functions[target].variables().to_vec();
        let source_scope = self.cost_functions[source].scope();
        if target == source
            || target_variables.len() != source_scope.arity()
            || target_variables
                .iter()
                .any(|&variable| source_scope.position_of(variable).is_none())
        {
            return Err(ConstructionError::MergeScopeMismatch(target, source));
        }
        wcsp_assert_simple!(
            self.cost_functions[target].has_zero_deltas(&self.trailed_values)
                && self.cost_functions[source].has_zero_deltas(&self.trailed_values),
            "{source} can only be merged into {target} while no cost was moved out of either"
        );

        let permutation = target_variables
            .iter()
            .map(|&variable| source_scope.position_of(variable).unwrap_or_default())
            .collect::<Vec<_>>();
        let mut merged_costs = Vec::new();
        let mut source_tuple = vec![0; permutation.len()];
        let mut tuples = Completions::over_initial_domains(&self.cost_functions[target].scope().sizes);
        while let Some(tuple) = tuples.next_tuple() {
            for (target_position, &source_position) in permutation.iter().enumerate() {
                source_tuple[source_position] = tuple[target_position];
            }
            let cost = add_costs(
                self.cost_functions[target].table_cost(tuple),
                self.cost_functions[source].table_cost(&source_tuple),
            );
            merged_costs.push((tuple.to_vec(), cost));
        }
        for (tuple, cost) in merged_costs {
            self.cost_functions[target].set_table_cost(&tuple, cost);
        }

        debug!("merged {source} into {target}");
        self.cost_functions[source].scope_mut().merged = true;
        self.context().deconnect(source);
        self.pending.retain(|&pending| pending != source);
        if !self.pending.contains(&target) {
            self.pending.push(target);
        }
        Ok(())
    }

    /// Sets the position of `variable` in the order along which cost is moved by directional arc
    /// consistency; cost flows towards variables of smaller order.
    pub fn set_dac_order(&mut self, variable: VariableId, order: u32) {
        self.assert_at_root("changing the DAC order");
        self.variables[variable].dac_order = order;
    }

    /// Records the value of `variable` in the best solution found so far; it is preferred when
    /// choosing among supports of equal cost.
    pub fn set_best_value(&mut self, variable: VariableId, value: i32) {
        let index = self.variables[variable].index_of(value);
        self.variables[variable].best_value = index;
    }
}

/// Search.
impl Network {
    pub fn lower_bound(&self) -> Cost {
        self.trailed_values.read(self.bounds.lower_bound)
    }

    pub fn upper_bound(&self) -> Cost {
        self.bounds.upper_bound
    }

    /// Lowers the upper bound to `upper_bound`; a larger value is ignored. The upper bound is not
    /// restored on backtracking.
    pub fn set_upper_bound(&mut self, upper_bound: Cost) -> PropagationStatus {
        let upper_bound = upper_bound.min(MAX_COST);
        if upper_bound < self.bounds.upper_bound {
            debug!("upper bound lowered to {upper_bound}");
            self.bounds.upper_bound = upper_bound;
            self.bounds.objective_changed = true;
        }
        if self.lower_bound() >= self.bounds.upper_bound {
            return Err(Contradiction);
        }
        Ok(())
    }

    pub fn get_checkpoint(&self) -> usize {
        self.trailed_values.get_checkpoint()
    }

    /// Marks a point which [`Network::restore_to`] can return to. Only allowed after a successful
    /// fixpoint, when no events are left to process.
    pub fn new_checkpoint(&mut self) {
        wcsp_assert_simple!(
            self.queues.is_empty() && self.pending.is_empty(),
            "a checkpoint can only be created after propagating"
        );
        self.trailed_values.new_checkpoint();
    }

    /// Undoes every change made since `checkpoint` was created.
    pub fn restore_to(&mut self, checkpoint: usize) {
        self.trailed_values.synchronise(checkpoint);
        self.queues.clear();
        let cost_functions = &self.cost_functions;
        let trailed_values = &self.trailed_values;
        self.pending.retain(|&cost_function| {
            trailed_values.read(cost_functions[cost_function].scope().connected) != 0
        });
        // The upper bound may have dropped since the checkpoint was created.
        self.bounds.objective_changed = true;
        self.statistics.num_backtracks += 1;
    }

    /// Applies the consistency transformations until none of them changes anything.
    ///
    /// On a contradiction the network is left in an unspecified state; the caller restores an
    /// earlier checkpoint before using it again.
    pub fn propagate_to_fixed_point(&mut self) -> PropagationStatus {
        let pending = std::mem::take(&mut self.pending);
        if self.get_checkpoint() == 0 {
            let variables = self.variables.keys().collect::<Vec<_>>();
            let mut context = self.context();
            for variable in variables {
                context.enqueue(QueueKind::Eliminate, variable);
                context.enqueue(QueueKind::FullEac, variable);
            }
        }

        let result = self.context().propagate_to_fixed_point(&pending);
        if result.is_err() {
            debug!("contradiction at checkpoint {}", self.get_checkpoint());
            self.statistics.num_contradictions += 1;
            self.queues.clear();
        }
        result
    }

    /// Reduces the domain of `variable` to `value`.
    pub fn assign(&mut self, variable: VariableId, value: i32) -> PropagationStatus {
        let index = self.variables[variable].index_of(value).ok_or(Contradiction)?;
        self.context().assign(variable, index)
    }

    /// Removes `value` from the domain of `variable`; values outside the initial domain are
    /// ignored.
    pub fn remove(&mut self, variable: VariableId, value: i32) -> PropagationStatus {
        match self.variables[variable].index_of(value) {
            Some(index) => self.context().remove(variable, index),
            None => Ok(()),
        }
    }

    /// Removes every value smaller than `value`.
    pub fn increase(&mut self, variable: VariableId, value: i32) -> PropagationStatus {
        let values = &self.variables[variable].values;
        let new_inf = values.partition_point(|&candidate| candidate < value);
        if new_inf == values.len() {
            return Err(Contradiction);
        }
        self.context().increase(variable, new_inf)
    }

    /// Removes every value larger than `value`.
    pub fn decrease(&mut self, variable: VariableId, value: i32) -> PropagationStatus {
        let values = &self.variables[variable].values;
        let num_kept = values.partition_point(|&candidate| candidate <= value);
        if num_kept == 0 {
            return Err(Contradiction);
        }
        self.context().decrease(variable, num_kept - 1)
    }

    /// Removes every value outside `[lower, upper]`.
    pub fn restrict_domain(&mut self, variable: VariableId, lower: i32, upper: i32) -> PropagationStatus {
        self.increase(variable, lower)?;
        self.decrease(variable, upper)
    }

    /// Eliminates variables at the root: those of degree at most one, and, when the elimination
    /// degree allows it, variables of degree two whose cost functions are both binary, replacing
    /// them with a new binary cost function between their two neighbours.
    pub fn eliminate_variables(&mut self) -> PropagationStatus {
        self.assert_at_root("eliminating variables of degree two");
        let Some(max_degree) = self.options.elimination_degree else {
            return Ok(());
        };
        self.propagate_to_fixed_point()?;
        if max_degree < 2 {
            return Ok(());
        }

        while let Some((variable, first, second)) = self.find_degree_two_variable() {
            let (first_neighbour, first_position) = self.other_of_binary(first);
            let (second_neighbour, second_position) = self.other_of_binary(second);
            let domain = self.domain_indices(variable);
            let cells = self.variables[variable].cells;
            let first_cells = self.variables[first_neighbour].cells;
            let second_cells = self.variables[second_neighbour].cells;

            let mut costs = Vec::new();
            for b in 0..self.variables[first_neighbour].values.len() {
                for c in 0..self.variables[second_neighbour].values.len() {
                    if !first_cells.contains(&self.trailed_values, b)
                        || !second_cells.contains(&self.trailed_values, c)
                    {
                        costs.push(MAX_COST);
                        continue;
                    }
                    let cost = domain
                        .iter()
                        .map(|&a| {
                            let through_first = self.observed_binary(first, first_position, a, b);
                            let through_second = self.observed_binary(second, second_position, a, c);
                            add_costs(
                                cells.unary_cost(&self.trailed_values, a),
                                add_costs(through_first, through_second),
                            )
                        })
                        .min()
                        .unwrap_or(MAX_COST);
                    costs.push(cost);
                }
            }

            debug!("eliminate {variable} into a new cost function over {first_neighbour} and {second_neighbour}");
            let _ = self.push_binary([first_neighbour, second_neighbour], costs, true);
            let mut context = self.context();
            context.deconnect(first.cost_function);
            context.deconnect(second.cost_function);
            context.mark_eliminated(variable, vec![first, second]);
            self.propagate_to_fixed_point()?;
        }
        Ok(())
    }

    fn find_degree_two_variable(&self) -> Option<(VariableId, CostFunctionLink, CostFunctionLink)> {
        self.variables.keys().find_map(|variable| {
            let cells = self.variables[variable].cells;
            if cells.is_assigned(&self.trailed_values) || cells.is_eliminated(&self.trailed_values) {
                return None;
            }
            let links = self.connected_links(variable).collect::<Vec<_>>();
            let &[first, second] = links.as_slice() else {
                return None;
            };
            let is_binary_between_unassigned = |link: CostFunctionLink| {
                let cost_function = &self.cost_functions[link.cost_function];
                matches!(cost_function, CostFunction::Binary { .. })
                    && cost_function
                        .variables()
                        .iter()
                        .all(|&other| !self.variables[other].cells.is_assigned(&self.trailed_values))
            };
            (is_binary_between_unassigned(first)
                && is_binary_between_unassigned(second)
                && self.other_of_binary(first).0 != self.other_of_binary(second).0)
                .then_some((variable, first, second))
        })
    }

    /// The other variable of a binary cost function, and its position.
    fn other_of_binary(&self, link: CostFunctionLink) -> (VariableId, usize) {
        let position = 1 - link.position;
        (self.cost_functions[link.cost_function].variables()[position], position)
    }

    fn observed_binary(&self, link: CostFunctionLink, other_position: usize, index: usize, other_index: usize) -> Cost {
        let mut tuple = [0; 2];
        tuple[link.position] = index;
        tuple[other_position] = other_index;
        self.cost_functions[link.cost_function].observed_cost(&self.trailed_values, &tuple)
    }
}

/// Moving cost by hand, for cost functions built on top of the network.
impl Network {
    fn index_of(&self, variable: VariableId, value: i32) -> usize {
        match self.variables[variable].index_of(value) {
            Some(index) => index,
            None => panic!("{value} is not in the initial domain of {variable}"),
        }
    }

    fn position_of(&self, cost_function: CostFunctionId, variable: VariableId) -> usize {
        match self.cost_functions[cost_function].scope().position_of(variable) {
            Some(position) => position,
            None => panic!("{variable} is not in the scope of {cost_function}"),
        }
    }

    /// Adds `cost` to the unary cost of `value`.
    pub fn project(&mut self, variable: VariableId, value: i32, cost: Cost) -> PropagationStatus {
        let index = self.index_of(variable, value);
        let mut context = self.context();
        context.project(variable, index, cost)?;
        if context.contains(variable, index) && context.support(variable) == index {
            context.find_support(variable)?;
        }
        Ok(())
    }

    /// Takes `cost` back out of the unary cost of `value`; the caller puts it elsewhere.
    pub fn extend(&mut self, variable: VariableId, value: i32, cost: Cost) {
        let index = self.index_of(variable, value);
        self.context().extend(variable, index, cost)
    }

    /// Moves `cost` from every value of `variable` into the lower bound.
    pub fn extend_all(&mut self, variable: VariableId, cost: Cost) -> PropagationStatus {
        let mut context = self.context();
        wcsp_assert_simple!(
            context
                .domain(variable)
                .into_iter()
                .all(|index| context.unary_cost(variable, index) >= cost),
            "cannot move {cost} out of every value of {variable}"
        );
        context.extend_all(variable, cost);
        context.increase_lower_bound(cost)
    }

    pub fn project_inf_cost(&mut self, variable: VariableId, cost: Cost) -> PropagationStatus {
        self.context().project_inf_cost(variable, cost)
    }

    pub fn project_sup_cost(&mut self, variable: VariableId, cost: Cost) -> PropagationStatus {
        self.context().project_sup_cost(variable, cost)
    }

    /// Restores a zero unary cost for the support of `variable`.
    pub fn find_support(&mut self, variable: VariableId) -> PropagationStatus {
        self.context().find_support(variable)
    }

    /// Moves `cost` out of every tuple of the cost function in which `variable` takes `value`,
    /// into the unary cost of `value`. The cost must not exceed the cost of any such tuple.
    pub fn project_cost_function(
        &mut self,
        cost_function: CostFunctionId,
        variable: VariableId,
        value: i32,
        cost: Cost,
    ) -> PropagationStatus {
        let index = self.index_of(variable, value);
        let position = self.position_of(cost_function, variable);
        let mut context = self.context();
        wcsp_assert_moderate!(
            cost <= context.minimum_completion(cost_function, position, index, false).0,
            "cannot project {cost} out of {cost_function}"
        );
        if context.project_from_cost_function(cost_function, position, index, cost)? {
            context.find_support(variable)?;
        }
        Ok(())
    }

    /// Moves `cost` from the unary cost of `value` into every tuple of the cost function in which
    /// `variable` takes `value`.
    pub fn extend_cost_function(
        &mut self,
        cost_function: CostFunctionId,
        variable: VariableId,
        value: i32,
        cost: Cost,
    ) {
        let index = self.index_of(variable, value);
        let position = self.position_of(cost_function, variable);
        self.context()
            .extend_to_cost_function(cost_function, position, index, cost)
    }

    /// Disables the cost function until search backtracks past this point.
    pub fn deconnect(&mut self, cost_function: CostFunctionId) {
        self.context().deconnect(cost_function)
    }

    /// Enables the cost function again; it is propagated from scratch by the next fixpoint.
    pub fn reconnect(&mut self, cost_function: CostFunctionId) {
        self.context().reconnect(cost_function);
        if !self.pending.contains(&cost_function) {
            self.pending.push(cost_function);
        }
    }

    /// For the values `first` and `second` of `variable`, the largest cost each has in the cost
    /// function and the largest amount by which each can cost more than the other, over the
    /// current domains.
    pub fn max_cost(
        &mut self,
        cost_function: CostFunctionId,
        variable: VariableId,
        first: i32,
        second: i32,
    ) -> ((Cost, Cost), (Cost, Cost)) {
        let first = self.index_of(variable, first);
        let second = self.index_of(variable, second);
        let position = self.position_of(cost_function, variable);
        let (for_first, for_second) = self
            .context()
            .dominance_costs(cost_function, position, first, second);
        (
            (for_first.max_cost, for_first.max_difference),
            (for_second.max_cost, for_second.max_difference),
        )
    }
}

/// Inspecting the network.
impl Network {
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.variables.keys()
    }

    pub fn name(&self, variable: VariableId) -> Option<&str> {
        self.variables[variable].name.as_deref()
    }

    pub fn num_cost_functions(&self) -> usize {
        self.cost_functions.len()
    }

    fn cells(&self, variable: VariableId) -> VariableCells {
        self.variables[variable].cells
    }

    fn domain_indices(&self, variable: VariableId) -> Vec<usize> {
        self.cells(variable).iter(&self.trailed_values).collect()
    }

    /// The values left in the domain of `variable`, in increasing order.
    pub fn domain(&self, variable: VariableId) -> Vec<i32> {
        let variable_data = &self.variables[variable];
        self.domain_indices(variable)
            .into_iter()
            .map(|index| variable_data.value_of(index))
            .collect()
    }

    pub fn domain_size(&self, variable: VariableId) -> usize {
        self.cells(variable).size(&self.trailed_values)
    }

    pub fn contains(&self, variable: VariableId, value: i32) -> bool {
        self.variables[variable]
            .index_of(value)
            .is_some_and(|index| self.cells(variable).contains(&self.trailed_values, index))
    }

    pub fn is_assigned(&self, variable: VariableId) -> bool {
        self.cells(variable).is_assigned(&self.trailed_values)
    }

    pub fn assigned_value(&self, variable: VariableId) -> Option<i32> {
        let cells = self.cells(variable);
        cells
            .is_assigned(&self.trailed_values)
            .then(|| self.variables[variable].value_of(cells.inf(&self.trailed_values)))
    }

    /// A value of zero unary cost, once the fixpoint is reached.
    pub fn support(&self, variable: VariableId) -> i32 {
        let index = self.cells(variable).support(&self.trailed_values);
        self.variables[variable].value_of(index)
    }

    pub fn unary_cost(&self, variable: VariableId, value: i32) -> Cost {
        let index = self.index_of(variable, value);
        self.cells(variable).unary_cost(&self.trailed_values, index)
    }

    pub fn is_eliminated(&self, variable: VariableId) -> bool {
        self.cells(variable).is_eliminated(&self.trailed_values)
    }

    /// The number of connected cost functions of `variable`.
    pub fn degree(&self, variable: VariableId) -> usize {
        self.connected_links(variable).count()
    }

    fn connected_links(&self, variable: VariableId) -> impl Iterator<Item = CostFunctionLink> + '_ {
        self.variables[variable]
            .links
            .iter()
            .copied()
            .filter(|link| self.is_connected(link.cost_function))
    }

    pub fn scope(&self, cost_function: CostFunctionId) -> &[VariableId] {
        self.cost_functions[cost_function].variables()
    }

    pub fn is_connected(&self, cost_function: CostFunctionId) -> bool {
        self.trailed_values
            .read(self.cost_functions[cost_function].scope().connected)
            != 0
    }

    /// The cost of `values`, given in scope order, in the cost function as it currently stands.
    pub fn observed_cost(&self, cost_function: CostFunctionId, values: &[i32]) -> Cost {
        let tuple = self
            .scope(cost_function)
            .iter()
            .zip(values)
            .map(|(&variable, &value)| self.index_of(variable, value))
            .collect::<Vec<_>>();
        self.cost_functions[cost_function].observed_cost(&self.trailed_values, &tuple)
    }

    /// The cost of the complete assignment `values`, indexed by variable, in the problem as it was
    /// given.
    pub fn evaluate(&self, values: &[i32]) -> Cost {
        wcsp_assert_simple!(values.len() == self.variables.len());
        self.cost_functions
            .iter()
            .filter(|cost_function| !cost_function.scope().derived && !cost_function.scope().merged)
            .map(|cost_function| {
                let tuple = cost_function
                    .variables()
                    .iter()
                    .map(|&variable| self.variables[variable].index_of(values[variable.index()]))
                    .collect::<Option<Vec<_>>>();
                tuple.map_or(MAX_COST, |tuple| cost_function.table_cost(&tuple).min(MAX_COST))
            })
            .fold(0, add_costs)
    }

    /// Gives the eliminated variables, in reverse order of elimination, the value which minimises
    /// the cost they were folded with, given the values of the other variables in `values`.
    pub fn complete_assignment(&self, values: &mut [i32]) {
        for record in self.eliminations.records(&self.trailed_values).iter().rev() {
            if let Some(value) = self.best_value_of_eliminated(record, values) {
                values[record.variable.index()] = value;
            }
        }
    }

    fn best_value_of_eliminated(&self, record: &EliminationRecord, values: &[i32]) -> Option<i32> {
        let variable = &self.variables[record.variable];
        let cells = variable.cells;
        cells
            .iter(&self.trailed_values)
            .min_by_key(|&index| {
                record.links.iter().fold(
                    cells.unary_cost(&self.trailed_values, index),
                    |total, link| {
                        let cost_function = &self.cost_functions[link.cost_function];
                        let tuple = cost_function
                            .variables()
                            .iter()
                            .enumerate()
                            .map(|(position, &other)| {
                                if position == link.position {
                                    Some(index)
                                } else {
                                    self.variables[other].index_of(values[other.index()])
                                }
                            })
                            .collect::<Option<Vec<_>>>();
                        let cost = tuple.map_or(MAX_COST, |tuple| {
                            cost_function.observed_cost(&self.trailed_values, &tuple)
                        });
                        add_costs(total, cost)
                    },
                )
            })
            .map(|index| variable.value_of(index))
    }

    /// When full EAC flags are maintained and every variable is flagged, the assignment of every
    /// variable to its support, which then costs exactly the lower bound.
    pub fn existential_witness(&self) -> Option<Vec<i32>> {
        if !self.options.full_eac {
            return None;
        }
        let all_flagged = self.variables.keys().all(|variable| {
            let cells = self.cells(variable);
            cells.is_eliminated(&self.trailed_values)
                || cells.is_assigned(&self.trailed_values)
                || cells.is_full_eac(&self.trailed_values)
        });
        if !all_flagged {
            return None;
        }

        let supports = self
            .variables
            .keys()
            .map(|variable| self.cells(variable).support(&self.trailed_values))
            .collect::<Vec<_>>();
        let zero_unary_costs = self.variables.keys().all(|variable| {
            let cells = self.cells(variable);
            cells.is_eliminated(&self.trailed_values)
                || cells.unary_cost(&self.trailed_values, supports[variable.index()]) == 0
        });
        let zero_tuples = self
            .cost_functions
            .keys()
            .filter(|&cost_function| self.is_connected(cost_function))
            .all(|cost_function| {
                let cost_function = &self.cost_functions[cost_function];
                let tuple = cost_function
                    .variables()
                    .iter()
                    .map(|&variable| supports[variable.index()])
                    .collect::<Vec<_>>();
                cost_function.observed_cost(&self.trailed_values, &tuple) == 0
            });
        if !zero_unary_costs || !zero_tuples {
            return None;
        }

        let mut values = self
            .variables
            .keys()
            .map(|variable| self.variables[variable].value_of(supports[variable.index()]))
            .collect::<Vec<_>>();
        self.complete_assignment(&mut values);
        Some(values)
    }

    /// Writes the counters of the network through the configured statistic sink.
    pub fn log_statistics(&self) {
        if !should_log_statistics() {
            return;
        }
        let logger = StatisticLogger::new(["wcsp"]);
        logger
            .attach_to_prefix("num_variables")
            .log_statistic(self.variables.len());
        logger
            .attach_to_prefix("num_cost_functions")
            .log_statistic(self.cost_functions.len());
        logger
            .attach_to_prefix("lower_bound")
            .log_statistic(self.lower_bound());
        self.statistics.log(logger);
        log_statistic_postfix();
    }
}

fn check_costs(costs: impl IntoIterator<Item = Cost>) -> Result<(), ConstructionError> {
    match costs.into_iter().find(|&cost| cost < 0) {
        Some(cost) => Err(ConstructionError::NegativeCost(cost)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;
    use crate::cost_functions::TableFunction;
    use crate::engine::test_helpers::branch_and_bound;
    use crate::engine::test_helpers::brute_force_optimum;
    use crate::engine::test_helpers::initial_domains;
    use crate::engine::test_helpers::RandomNetwork;
    use crate::engine::ConsistencyLevel;
    use crate::engine::DominanceLevel;
    use crate::statistics::configure_statistic_logging;

    fn without_dominance() -> PropagationOptions {
        PropagationOptions {
            dominance: DominanceLevel::Off,
            ..Default::default()
        }
    }

    #[test]
    fn malformed_input_is_rejected() {
        let mut network = Network::default();
        let x = network.new_variable(0, 1, Some("x")).unwrap();
        let y = network.new_sparse_variable(&[5, 1, 5], Some("y")).unwrap();

        assert_eq!(
            network.new_variable(3, 2, None),
            Err(ConstructionError::EmptyDomain { lower: 3, upper: 2 })
        );
        assert_eq!(network.new_sparse_variable(&[], None), Err(ConstructionError::NoValues));
        assert_eq!(
            network.add_binary_cost_function([x, y], vec![0, 1, 2]),
            Err(ConstructionError::TableLengthMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(
            network.add_binary_cost_function([x, x], vec![0; 4]),
            Err(ConstructionError::RepeatedVariable(x))
        );
        assert_eq!(
            network.add_unary_cost_function(x, vec![0, -1]),
            Err(ConstructionError::NegativeCost(-1))
        );
        assert_eq!(
            network.add_nary_cost_function(&[], NaryTable::Dense(vec![])),
            Err(ConstructionError::EmptyScope)
        );
        assert_eq!(
            network.add_nary_cost_function(
                &[x, y],
                NaryTable::Sparse {
                    default: 0,
                    exceptions: vec![(vec![0, 3], 1)]
                }
            ),
            Err(ConstructionError::ValueOutsideDomain { variable: y, value: 3 })
        );
        assert_eq!(
            network.add_nary_cost_function(
                &[x, y],
                NaryTable::Sparse {
                    default: 0,
                    exceptions: vec![(vec![0], 1)]
                }
            ),
            Err(ConstructionError::ExceptionArityMismatch {
                expected: 2,
                actual: 1
            })
        );

        let unary = network.add_unary_cost_function(x, vec![0, 1]).unwrap();
        let binary = network.add_binary_cost_function([x, y], vec![0; 4]).unwrap();
        assert_eq!(
            network.merge_cost_functions(binary, unary),
            Err(ConstructionError::MergeScopeMismatch(binary, unary))
        );
    }

    #[test]
    fn sparse_domains_are_sorted_and_deduplicated() {
        let mut network = Network::default();
        let x = network.new_sparse_variable(&[7, -2, 7, 3], None).unwrap();

        assert_eq!(network.domain(x), vec![-2, 3, 7]);
        assert!(network.contains(x, 3));
        assert!(!network.contains(x, 4));
    }

    #[test]
    fn assigning_a_variable_absorbs_its_binary_cost_functions() {
        let mut network = Network::new(without_dominance());
        let x = network.new_variable(0, 1, None).unwrap();
        let y = network.new_variable(0, 1, None).unwrap();
        let cost_function = network.add_binary_cost_function([x, y], vec![0, 3, 3, 0]).unwrap();

        network.propagate_to_fixed_point().unwrap();
        assert_eq!(network.lower_bound(), 0);

        network.new_checkpoint();
        network.assign(x, 0).unwrap();
        network.propagate_to_fixed_point().unwrap();

        assert_eq!(network.lower_bound(), 0);
        assert!(!network.is_connected(cost_function));
        assert_eq!(network.unary_cost(y, 0), 0);
        assert_eq!(network.unary_cost(y, 1), 3);

        network.restore_to(0);
        assert!(network.is_connected(cost_function));
        assert_eq!(network.unary_cost(y, 1), 0);
        assert_eq!(network.domain(x), vec![0, 1]);
    }

    #[test]
    fn repeated_projections_are_trailed_individually() {
        let mut network = Network::new(without_dominance());
        let x = network.new_variable(0, 2, None).unwrap();
        network.propagate_to_fixed_point().unwrap();
        network.new_checkpoint();

        for _ in 0..3 {
            network.project(x, 1, 2).unwrap();
        }
        network.extend(x, 1, 3);

        assert_eq!(network.unary_cost(x, 1), 3);
        assert_eq!(network.trailed_values.num_changes_at_current_checkpoint(), 4);

        network.restore_to(0);
        assert_eq!(network.unary_cost(x, 1), 0);
    }

    #[test]
    fn projecting_onto_the_support_moves_the_support() {
        let mut network = Network::new(without_dominance());
        let x = network.new_variable(0, 2, None).unwrap();
        network.propagate_to_fixed_point().unwrap();

        network.project(x, 0, 4).unwrap();
        assert_ne!(network.support(x), 0);
        assert_eq!(network.lower_bound(), 0);

        network.project_sup_cost(x, 1).unwrap();
        network.project(x, 1, 2).unwrap();
        assert_eq!(network.lower_bound(), 1);
        assert_eq!(network.unary_cost(x, 0), 3);
        assert_eq!(network.unary_cost(x, 1), 1);
        assert_eq!(network.unary_cost(x, 2), 0);
    }

    #[test]
    fn lowering_the_upper_bound_removes_expensive_values() {
        let mut network = Network::new(without_dominance());
        let x = network.new_variable(0, 3, None).unwrap();
        let _ = network.add_unary_cost_function(x, vec![0, 5, 2, 9]).unwrap();
        network.propagate_to_fixed_point().unwrap();

        network.new_checkpoint();
        network.set_upper_bound(5).unwrap();
        network.propagate_to_fixed_point().unwrap();
        assert_eq!(network.domain(x), vec![0, 2]);

        assert_eq!(network.set_upper_bound(0), Err(Contradiction));
    }

    #[test]
    fn bound_changes_shrink_the_domain() {
        let mut network = Network::new(without_dominance());
        let x = network.new_sparse_variable(&[1, 3, 5, 7, 9], None).unwrap();
        network.propagate_to_fixed_point().unwrap();
        network.new_checkpoint();

        network.restrict_domain(x, 2, 8).unwrap();
        assert_eq!(network.domain(x), vec![3, 5, 7]);

        network.remove(x, 5).unwrap();
        network.remove(x, 4).unwrap();
        assert_eq!(network.domain(x), vec![3, 7]);
        assert_eq!(network.domain_size(x), 2);

        network.decrease(x, 6).unwrap();
        assert_eq!(network.assigned_value(x), Some(3));
        assert_eq!(network.remove(x, 3), Err(Contradiction));
        assert_eq!(network.increase(x, 10), Err(Contradiction));
    }

    #[test]
    fn assigning_a_removed_value_fails() {
        let mut network = Network::default();
        let x = network.new_variable(0, 2, None).unwrap();
        network.propagate_to_fixed_point().unwrap();
        network.new_checkpoint();

        network.remove(x, 1).unwrap();
        assert_eq!(network.assign(x, 1), Err(Contradiction));
        assert_eq!(network.assign(x, 8), Err(Contradiction));
    }

    #[test]
    fn backtracking_restores_every_reversible_cell() {
        for seed in 0..10 {
            let (mut network, variables) = RandomNetwork::default().build(seed, PropagationOptions::default());
            network.propagate_to_fixed_point().unwrap();
            let before = network.trailed_values.snapshot();
            let lower_bound = network.lower_bound();

            network.new_checkpoint();
            let value = network.support(variables[0]);
            if network.assign(variables[0], value).is_ok() {
                let _ = network.propagate_to_fixed_point();
            }
            network.restore_to(0);

            assert_eq!(network.trailed_values.snapshot(), before);
            assert_eq!(network.lower_bound(), lower_bound);
        }
    }

    #[test]
    fn a_reconnection_is_forgotten_on_backtrack() {
        let mut network = Network::new(without_dominance());
        let x = network.new_variable(0, 1, None).unwrap();
        let y = network.new_variable(0, 1, None).unwrap();
        let cost_function = network.add_binary_cost_function([x, y], vec![0, 2, 2, 0]).unwrap();
        network.propagate_to_fixed_point().unwrap();

        network.new_checkpoint();
        network.deconnect(cost_function);
        network.propagate_to_fixed_point().unwrap();

        network.new_checkpoint();
        network.reconnect(cost_function);
        assert_eq!(network.pending, vec![cost_function]);

        network.restore_to(1);
        assert!(!network.is_connected(cost_function));
        assert!(network.pending.is_empty());
        network.new_checkpoint();
    }

    #[test]
    fn the_lower_bound_never_exceeds_the_optimum() {
        for seed in 0..20 {
            let (mut network, _) = RandomNetwork::default().build(seed, PropagationOptions::default());
            let domains = initial_domains(&network);
            let optimum = brute_force_optimum(&network, &domains);

            network.propagate_to_fixed_point().unwrap();
            assert!(network.lower_bound() <= optimum, "seed {seed}");
        }
    }

    #[test]
    fn evaluation_uses_the_tables_as_given() {
        let mut network = Network::default();
        let x = network.new_variable(0, 1, None).unwrap();
        let y = network.new_variable(0, 1, None).unwrap();
        let _ = network.add_unary_cost_function(x, vec![1, 0]).unwrap();
        let _ = network.add_binary_cost_function([x, y], vec![1, 3, 3, 2]).unwrap();
        network.propagate_to_fixed_point().unwrap();

        assert_eq!(network.evaluate(&[0, 0]), 2);
        assert_eq!(network.evaluate(&[1, 1]), 2);
        assert_eq!(network.evaluate(&[0, 1]), 4);
        assert_eq!(network.evaluate(&[0, 4]), MAX_COST);
    }

    #[test]
    fn merged_cost_functions_are_counted_once() {
        let mut network = Network::new(without_dominance());
        let x = network.new_variable(0, 1, None).unwrap();
        let y = network.new_variable(0, 2, None).unwrap();
        let target = network
            .add_binary_cost_function([x, y], vec![0, 1, 2, 3, 4, 5])
            .unwrap();
        let source = network
            .add_binary_cost_function([y, x], vec![1, 0, 0, 1, 2, 2])
            .unwrap();

        network.merge_cost_functions(target, source).unwrap();
        assert!(!network.is_connected(source));
        assert_eq!(network.observed_cost(target, &[0, 0]), 1);
        assert_eq!(network.observed_cost(target, &[1, 2]), 7);
        assert_eq!(network.evaluate(&[1, 1]), 5);

        network.propagate_to_fixed_point().unwrap();
        assert_eq!(network.lower_bound(), 1);
    }

    #[test]
    fn table_costs_can_be_changed_before_propagating() {
        let mut network = Network::new(without_dominance());
        let x = network.new_variable(0, 1, None).unwrap();
        let y = network.new_variable(0, 1, None).unwrap();
        let cost_function = network.add_binary_cost_function([x, y], vec![2, 2, 2, 2]).unwrap();

        network.set_cost(cost_function, &[1, 1], 0).unwrap();
        network.add_cost(cost_function, &[0, 0], 1).unwrap();
        assert_eq!(
            network.add_cost(cost_function, &[0, 3], 1),
            Err(ConstructionError::ValueOutsideDomain { variable: y, value: 3 })
        );

        assert_eq!(network.evaluate(&[0, 0]), 3);
        network.propagate_to_fixed_point().unwrap();
        assert_eq!(network.lower_bound(), 0);
    }

    #[derive(Debug)]
    struct AllDifferent;

    impl TableFunction for AllDifferent {
        fn cost(&self, values: &[i32]) -> Cost {
            let num_equal_pairs = values
                .iter()
                .enumerate()
                .flat_map(|(i, a)| values[i + 1..].iter().filter(move |&b| a == b))
                .count();
            num_equal_pairs as Cost
        }
    }

    #[test]
    fn implicit_tables_are_propagated_and_searched() {
        let mut network = Network::default();
        let variables = (0..4)
            .map(|_| network.new_variable(0, 2, None).unwrap())
            .collect::<Vec<_>>();
        let _ = network
            .add_nary_cost_function(&variables, NaryTable::Implicit(Box::new(AllDifferent)))
            .unwrap();
        let _ = network
            .add_nary_cost_function(
                &variables[..3],
                NaryTable::Sparse {
                    default: 1,
                    exceptions: vec![(vec![2, 1, 0], 0)],
                },
            )
            .unwrap();
        let domains = initial_domains(&network);

        let optimum = brute_force_optimum(&network, &domains);
        let (cost, values) = branch_and_bound(&mut network).unwrap();
        assert_eq!(optimum, 1);
        assert_eq!(cost, optimum);
        assert_eq!(network.evaluate(&values), optimum);
    }

    #[test]
    fn a_network_can_be_moved_to_another_thread() {
        let mut network = Network::default();
        let variables = (0..3)
            .map(|_| network.new_variable(0, 1, None).unwrap())
            .collect::<Vec<_>>();
        let _ = network
            .add_nary_cost_function(&variables, NaryTable::Implicit(Box::new(AllDifferent)))
            .unwrap();

        let worker = std::thread::spawn(move || {
            network.propagate_to_fixed_point().unwrap();
            network.lower_bound()
        });
        assert_eq!(worker.join().unwrap(), 1);
    }

    #[test]
    fn branch_and_bound_finds_the_optimum_at_every_level() {
        let levels = [
            ConsistencyLevel::Node,
            ConsistencyLevel::Arc,
            ConsistencyLevel::DirectionalArc,
            ConsistencyLevel::FullDirectionalArc,
            ConsistencyLevel::ExistentialDirectionalArc,
        ];
        for consistency in levels {
            for seed in 0..8 {
                let options = PropagationOptions {
                    consistency,
                    ..Default::default()
                };
                let (mut network, _) = RandomNetwork::default().build(seed, options);
                let domains = initial_domains(&network);
                let optimum = brute_force_optimum(&network, &domains);

                let (cost, values) = branch_and_bound(&mut network).unwrap();
                assert_eq!(cost, optimum, "{consistency:?} on seed {seed}");
                assert_eq!(network.evaluate(&values), optimum);
            }
        }
    }

    #[test]
    fn forbidden_tuples_are_never_part_of_a_solution() {
        for seed in 0..8 {
            let shape = RandomNetwork {
                forbidden_probability: 0.3,
                ..Default::default()
            };
            let (mut network, _) = shape.build(seed, PropagationOptions::default());
            let domains = initial_domains(&network);
            let optimum = brute_force_optimum(&network, &domains);

            match branch_and_bound(&mut network) {
                Some((cost, _)) => assert_eq!(cost, optimum, "seed {seed}"),
                None => assert!(optimum >= MAX_COST, "seed {seed}"),
            }
        }
    }

    #[test]
    fn the_existential_witness_costs_the_lower_bound() {
        let mut network = Network::new(PropagationOptions {
            full_eac: true,
            ..without_dominance()
        });
        let x = network.new_variable(0, 1, None).unwrap();
        let y = network.new_variable(0, 1, None).unwrap();
        let _ = network.add_binary_cost_function([x, y], vec![1, 3, 3, 2]).unwrap();
        network.propagate_to_fixed_point().unwrap();

        assert_eq!(network.lower_bound(), 1);
        let witness = network.existential_witness().unwrap();
        assert_eq!(network.evaluate(&witness), network.lower_bound());

        for seed in 0..10 {
            let options = PropagationOptions {
                full_eac: true,
                ..Default::default()
            };
            let (mut network, _) = RandomNetwork::default().build(seed, options);
            network.propagate_to_fixed_point().unwrap();
            if let Some(witness) = network.existential_witness() {
                assert_eq!(network.evaluate(&witness), network.lower_bound(), "seed {seed}");
            }
        }
    }

    #[test]
    fn counters_are_kept() {
        let (mut network, _) = RandomNetwork::default().build(3, PropagationOptions::default());
        let _ = branch_and_bound(&mut network);

        assert!(network.statistics.num_fixpoint_calls > 1);
        assert!(network.statistics.num_projections > 0);
        assert!(network.statistics.num_backtracks > 0);

        let output = SharedBuffer::default();
        configure_statistic_logging("c", Some("c end"), None, Some(Box::new(output.clone())));
        network.log_statistics();

        let written = output.contents();
        assert!(written.contains("c wcsp_num_variables=5\n"));
        assert!(written.contains(&format!(
            "c wcsp_num_backtracks={}\n",
            network.statistics.num_backtracks
        )));
        assert!(written.ends_with("c end\n"));
    }

    #[derive(Debug, Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
