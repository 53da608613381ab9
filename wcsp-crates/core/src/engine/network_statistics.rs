use crate::create_statistics_struct;

create_statistics_struct!(
    /// The counters of a [`Network`](super::Network), logged with the `wcsp` prefix.
    PropagationStatistics {
        num_fixpoint_calls: u64,
        num_assign_events: u64,
        num_nc_events: u64,
        num_ac_events: u64,
        num_dac_events: u64,
        num_eac_events: u64,
        /// The variables of the EAC queue which were not existentially arc consistent.
        num_eac_revisions: u64,
        num_dee_events: u64,
        num_eliminate_events: u64,
        num_projections: u64,
        num_extensions: u64,
        num_nc_removals: u64,
        num_dee_removals: u64,
        num_eliminations: u64,
        num_contradictions: u64,
        num_backtracks: u64,
    }
);
