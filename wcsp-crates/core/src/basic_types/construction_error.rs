use thiserror::Error;

use crate::basic_types::Cost;
use crate::cost_functions::CostFunctionId;
use crate::engine::VariableId;

/// Errors related to building a [`Network`](crate::Network).
///
/// These are reported before any search starts and are not recovered from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    /// The number of costs in a table does not match the number of tuples of its scope.
    #[error("a table of {actual} costs was given for a scope with {expected} tuples")]
    TableLengthMismatch { expected: usize, actual: usize },
    /// A cost function was given without any variable.
    #[error("a cost function needs a non-empty scope")]
    EmptyScope,
    /// A variable appears more than once in a scope.
    #[error("variable {0} appears more than once in the scope")]
    RepeatedVariable(VariableId),
    /// The bounds of a new variable do not describe any value.
    #[error("the domain [{lower}, {upper}] is empty")]
    EmptyDomain { lower: i32, upper: i32 },
    /// A variable was given an empty list of values.
    #[error("a variable needs at least one value")]
    NoValues,
    /// A value which is not in the initial domain of a variable was used.
    #[error("value {value} is not in the initial domain of {variable}")]
    ValueOutsideDomain { variable: VariableId, value: i32 },
    /// Costs are never negative.
    #[error("cost {0} is negative")]
    NegativeCost(Cost),
    /// An exception of an N-ary table lists the wrong number of values.
    #[error("an exception of arity {actual} was given for a scope of arity {expected}")]
    ExceptionArityMismatch { expected: usize, actual: usize },
    /// Two cost functions can only be merged when their scopes contain the same variables.
    #[error("cost functions {0} and {1} do not have the same scope")]
    MergeScopeMismatch(CostFunctionId, CostFunctionId),
}
