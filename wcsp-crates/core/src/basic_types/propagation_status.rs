/// The result of a propagation step: either the network is still consistent, or a
/// [`Contradiction`] was found.
pub type PropagationStatus = Result<(), Contradiction>;

/// A domain became empty or the lower bound reached the upper bound.
///
/// The state of the network is undefined after a contradiction until the search restores it to
/// an earlier checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[error("the lower bound reached the upper bound or a domain became empty")]
pub struct Contradiction;
