//! Level arithmetic for layered placement.

/// Level a parent must have to sit left of a child.
///
/// # Arguments
///
/// * `child_level` - Level of the child node
///
/// # Returns
///
/// The level immediately upstream of `child_level`.
///
/// # Example
///
/// ```
/// use aspen_vsm_core::verified::upstream_level;
///
/// assert_eq!(upstream_level(0), -1);
/// assert_eq!(upstream_level(-3), -4);
/// assert_eq!(upstream_level(2), 1);
/// ```
#[inline]
pub fn upstream_level(child_level: i32) -> i32 {
    child_level.saturating_sub(1)
}

/// Level a child must have to sit right of a parent.
///
/// # Example
///
/// ```
/// use aspen_vsm_core::verified::downstream_level;
///
/// assert_eq!(downstream_level(0), 1);
/// assert_eq!(downstream_level(-2), -1);
/// ```
#[inline]
pub fn downstream_level(parent_level: i32) -> i32 {
    parent_level.saturating_add(1)
}

/// Check whether an upstream node must move further left.
///
/// A node's position follows its longest path to the root, so a node is only
/// ever moved away from the root, never back towards it.
///
/// # Arguments
///
/// * `current` - Level the node currently has
/// * `required` - Level demanded by a newly discovered edge
///
/// # Returns
///
/// `true` if `required` is strictly left of `current`.
///
/// # Example
///
/// ```
/// use aspen_vsm_core::verified::needs_upstream_relocation;
///
/// assert!(needs_upstream_relocation(-1, -2));
/// assert!(!needs_upstream_relocation(-2, -1));
/// assert!(!needs_upstream_relocation(-2, -2));
/// ```
#[inline]
pub fn needs_upstream_relocation(current: i32, required: i32) -> bool {
    required < current
}

/// Check whether a downstream node must move further right.
///
/// # Example
///
/// ```
/// use aspen_vsm_core::verified::needs_downstream_relocation;
///
/// assert!(needs_downstream_relocation(1, 2));
/// assert!(!needs_downstream_relocation(2, 1));
/// ```
#[inline]
pub fn needs_downstream_relocation(current: i32, required: i32) -> bool {
    required > current
}

/// Number of filler nodes needed to close the gap of one edge.
///
/// # Arguments
///
/// * `parent_level` - Level of the edge's source
/// * `child_level` - Level of the edge's target
///
/// # Returns
///
/// `child_level - parent_level - 1`, or 0 when the edge already spans a
/// single level (or is malformed).
///
/// # Example
///
/// ```
/// use aspen_vsm_core::verified::filler_count;
///
/// assert_eq!(filler_count(-1, 0), 0);
/// assert_eq!(filler_count(-3, 0), 2);
/// assert_eq!(filler_count(0, 0), 0);
/// ```
#[inline]
pub fn filler_count(parent_level: i32, child_level: i32) -> u32 {
    let span = i64::from(child_level) - i64::from(parent_level) - 1;
    u32::try_from(span.max(0)).unwrap_or(u32::MAX)
}

/// Check whether a level can only be reached through a cycle.
///
/// In an acyclic graph of `node_count` nodes the longest path has at most
/// `node_count - 1` edges, so no level magnitude can reach `node_count`.
///
/// # Arguments
///
/// * `level` - Level a node is about to be moved to
/// * `node_count` - Number of nodes currently in the graph
///
/// # Returns
///
/// `true` if the placement proves a cycle.
///
/// # Example
///
/// ```
/// use aspen_vsm_core::verified::exceeds_acyclic_bound;
///
/// assert!(!exceeds_acyclic_bound(-2, 3));
/// assert!(exceeds_acyclic_bound(-3, 3));
/// assert!(exceeds_acyclic_bound(4, 3));
/// ```
#[inline]
pub fn exceeds_acyclic_bound(level: i32, node_count: usize) -> bool {
    usize::try_from(level.unsigned_abs()).map_or(true, |magnitude| magnitude >= node_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Level arithmetic
    // ========================================================================

    #[test]
    fn test_level_arithmetic_saturates() {
        assert_eq!(upstream_level(i32::MIN), i32::MIN);
        assert_eq!(downstream_level(i32::MAX), i32::MAX);
    }

    #[test]
    fn test_relocation_only_moves_away_from_root() {
        assert!(needs_upstream_relocation(-1, -3));
        assert!(!needs_upstream_relocation(-3, -1));
        assert!(needs_downstream_relocation(1, 3));
        assert!(!needs_downstream_relocation(3, 1));
    }

    // ========================================================================
    // filler_count tests
    // ========================================================================

    #[test]
    fn test_filler_count_spans() {
        assert_eq!(filler_count(-2, -1), 0);
        assert_eq!(filler_count(-2, 0), 1);
        assert_eq!(filler_count(-2, 3), 4);
    }

    #[test]
    fn test_filler_count_backward_edge_is_zero() {
        assert_eq!(filler_count(1, -1), 0);
    }

    #[test]
    fn test_filler_count_extreme_levels() {
        assert_eq!(filler_count(i32::MIN, i32::MAX), u32::MAX - 1);
    }

    // ========================================================================
    // exceeds_acyclic_bound tests
    // ========================================================================

    #[test]
    fn test_bound_in_small_graph() {
        assert!(!exceeds_acyclic_bound(0, 1));
        assert!(exceeds_acyclic_bound(-1, 1));
    }
}
