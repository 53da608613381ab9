use enumset::EnumSet;

use super::QueueKind;

/// The soft local consistency which the fixpoint enforces, from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ConsistencyLevel {
    /// Only unary costs are normalised into the lower bound.
    Node,
    /// Every value has a zero-cost completion in every cost function.
    Arc,
    /// Every value of the first variable of a cost function in the DAC order has a zero-cost
    /// completion once the unary costs of the other variables are added.
    DirectionalArc,
    /// Both [`ConsistencyLevel::Arc`] and [`ConsistencyLevel::DirectionalArc`].
    FullDirectionalArc,
    /// [`ConsistencyLevel::FullDirectionalArc`] and existential arc consistency: every variable
    /// has a value which is supported at zero cost by all of its cost functions at once.
    #[default]
    ExistentialDirectionalArc,
}

impl ConsistencyLevel {
    /// The variable queues which are drained at this level.
    pub(crate) fn propagated_queues(self) -> EnumSet<QueueKind> {
        let always = QueueKind::Assign | QueueKind::Nc;
        match self {
            ConsistencyLevel::Node => always,
            ConsistencyLevel::Arc => always | QueueKind::Ac,
            ConsistencyLevel::DirectionalArc => always | QueueKind::Dac,
            ConsistencyLevel::FullDirectionalArc => always | QueueKind::Ac | QueueKind::Dac,
            ConsistencyLevel::ExistentialDirectionalArc => {
                always | QueueKind::Ac | QueueKind::Dac | QueueKind::Eac1 | QueueKind::Eac2
            }
        }
    }

    pub(crate) fn maintains_arc_supports(self) -> bool {
        self == ConsistencyLevel::Arc || self >= ConsistencyLevel::FullDirectionalArc
    }
}

/// Which value pairs are tested for dominance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DominanceLevel {
    Off,
    /// The support of a variable is tested against its value of worst unary cost.
    #[default]
    SupportAgainstWorst,
    /// All value pairs at the root, [`DominanceLevel::SupportAgainstWorst`] below it.
    AllPairsAtRoot,
    AllPairs,
}

/// The options which control the strength of propagation of a [`Network`](super::Network).
#[derive(Debug, Clone, Copy)]
pub struct PropagationOptions {
    pub consistency: ConsistencyLevel,
    pub dominance: DominanceLevel,
    /// When set to `d`, variables of degree at most `min(1, d)` are eliminated during the
    /// fixpoint and [`Network::eliminate_variables`](super::Network::eliminate_variables) may
    /// also eliminate variables of degree 2 when `d >= 2`.
    pub elimination_degree: Option<usize>,
    /// An N-ary cost function with more than three unassigned variables is only propagated when
    /// the product of the sizes of the current domains of its scope is at most this limit.
    pub nary_enumeration_limit: u64,
    /// Maintain, after every fixpoint, which variables have a support that is a zero-cost value
    /// of every cost function when combined with the supports of its other variables.
    pub full_eac: bool,
}

impl Default for PropagationOptions {
    fn default() -> Self {
        Self {
            consistency: ConsistencyLevel::default(),
            dominance: DominanceLevel::default(),
            elimination_degree: None,
            nary_enumeration_limit: 10_000,
            full_eac: false,
        }
    }
}

impl PropagationOptions {
    /// Every queue which is drained under these options.
    pub(crate) fn propagated_queues(&self) -> EnumSet<QueueKind> {
        let mut queues = self.consistency.propagated_queues();
        if self.dominance != DominanceLevel::Off {
            queues |= QueueKind::Dee;
        }
        if self.elimination_degree.is_some() {
            queues |= QueueKind::Eliminate;
        }
        if self.full_eac {
            queues |= QueueKind::FullEac;
        }
        queues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existential_queues_are_only_drained_at_the_strongest_level() {
        let options = PropagationOptions {
            consistency: ConsistencyLevel::FullDirectionalArc,
            ..Default::default()
        };

        let queues = options.propagated_queues();
        assert!(queues.contains(QueueKind::Dac));
        assert!(queues.contains(QueueKind::Dee));
        assert!(!queues.contains(QueueKind::Eac1));
        assert!(!queues.contains(QueueKind::Eliminate));
    }

    #[test]
    fn directional_arc_consistency_does_not_maintain_arc_supports() {
        assert!(!ConsistencyLevel::DirectionalArc.maintains_arc_supports());
        assert!(ConsistencyLevel::Arc.maintains_arc_supports());
        assert!(ConsistencyLevel::FullDirectionalArc.maintains_arc_supports());
    }
}
