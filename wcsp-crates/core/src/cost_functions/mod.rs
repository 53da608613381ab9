//! Cost functions: their tables, and the transformations which move cost between a cost function
//! and the variables of its scope.
mod cost_function;
mod dominance;
mod supports;
mod tables;
mod transformations;
mod tuples;

pub use cost_function::CostFunctionId;
pub(crate) use cost_function::*;
pub use tables::NaryTable;
pub use tables::TableFunction;
pub(crate) use tables::*;
pub(crate) use tuples::Completions;
