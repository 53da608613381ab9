//! The propagation engine: the reversible state of the network and the soft local consistency
//! algorithms which run over it.
mod consistency;
mod context;
mod elimination;
mod fixpoint;
mod network;
mod network_statistics;
mod options;
mod queues;
#[cfg(test)]
mod test_helpers;
mod trailed;
mod variable;
mod variable_operations;

pub(crate) use consistency::DeeResidues;
pub(crate) use context::Bounds;
pub(crate) use context::PropagationContext;
pub use network::Network;
pub use options::ConsistencyLevel;
pub use options::DominanceLevel;
pub use options::PropagationOptions;
pub(crate) use queues::PropagationQueues;
pub(crate) use queues::QueueKind;
pub(crate) use trailed::*;
pub(crate) use variable::Variable;
pub(crate) use variable::VariableCells;
pub use variable::VariableId;
