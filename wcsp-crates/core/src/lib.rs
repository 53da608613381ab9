//! The soft local consistency core of a weighted constraint satisfaction solver.
//!
//! A [`Network`] holds the variables and cost functions of a cost function network. Between
//! branching decisions, [`Network::propagate_to_fixed_point`] applies equivalence-preserving
//! transformations which move cost from the cost functions towards the unary costs of the
//! variables and from there into the global lower bound. Every change is recorded on a trail so
//! that [`Network::restore_to`] can undo it when search backtracks.
//!
//! # Example
//! ```
//! # use wcsp_core::Network;
//! # use wcsp_core::PropagationOptions;
//! let mut network = Network::new(PropagationOptions::default());
//! let x = network.new_variable(0, 1, Some("x")).unwrap();
//! let y = network.new_variable(0, 1, Some("y")).unwrap();
//! let _ = network
//!     .add_binary_cost_function([x, y], vec![1, 3, 3, 2])
//!     .unwrap();
//!
//! network.propagate_to_fixed_point().unwrap();
//! assert_eq!(network.lower_bound(), 1);
//! ```
pub(crate) mod basic_types;
pub(crate) mod containers;
pub mod cost_functions;
pub(crate) mod engine;
pub mod statistics;
pub mod wcsp_asserts;

pub use convert_case;

pub use crate::basic_types::ConstructionError;
pub use crate::basic_types::Contradiction;
pub use crate::basic_types::Cost;
pub use crate::basic_types::PropagationStatus;
pub use crate::basic_types::MAX_COST;
pub use crate::basic_types::MIN_COST;
pub use crate::engine::ConsistencyLevel;
pub use crate::engine::DominanceLevel;
pub use crate::engine::Network;
pub use crate::engine::PropagationOptions;
pub use crate::engine::VariableId;
