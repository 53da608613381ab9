/// A cost of a tuple, a unary cost or a bound of the network.
pub type Cost = i64;

/// The smallest cost; every cost of the network is at least this.
pub const MIN_COST: Cost = 0;

/// The forbidden cost. Table entries at or above this value are absolute: no transformation ever
/// changes the cost that is observed for them.
///
/// The value leaves enough headroom that a handful of costs can be summed without overflowing.
pub const MAX_COST: Cost = i64::MAX / 8;

/// Adds two costs, saturating at [`MAX_COST`].
pub(crate) fn add_costs(lhs: Cost, rhs: Cost) -> Cost {
    lhs.saturating_add(rhs).min(MAX_COST)
}

/// Whether `cost`, on top of the lower bound `lower_bound`, reaches the cutoff `upper_bound`.
pub(crate) fn is_forbidden(cost: Cost, lower_bound: Cost, upper_bound: Cost) -> bool {
    add_costs(cost, lower_bound) >= upper_bound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_saturate_at_the_forbidden_cost() {
        assert_eq!(add_costs(MAX_COST, MAX_COST), MAX_COST);
        assert_eq!(add_costs(3, 4), 7);
    }

    #[test]
    fn the_forbidden_test_includes_the_lower_bound() {
        assert!(!is_forbidden(4, 5, 10));
        assert!(is_forbidden(5, 5, 10));
        assert!(is_forbidden(MAX_COST, 0, MAX_COST));
    }
}
