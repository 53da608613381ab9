mod construction_error;
mod cost;
mod propagation_status;
mod trail;

pub use construction_error::ConstructionError;
pub use cost::*;
pub use propagation_status::*;
pub(crate) use trail::Trail;
