//! Fence-post search positions over a node's sorted key slice.
//!
//! Both engines compute a search position exactly once per node and reuse it
//! for the paired pointer operation. The two helpers differ in how they treat
//! an exact match, and the two fence posts are not interchangeable: descent
//! and internal insertion must step *past* equal keys (`upper_bound`), while
//! leaf insertion and exact-position deletes must stop *at* them
//! (`lower_bound`). Mixing them up shifts the very next descent by one child.

use std::cmp::Ordering;

/// Index of the first key strictly greater than `target`.
///
/// Used for descent (the returned index is the child pointer to follow; when
/// every key qualifies it is the last pointer) and for internal-node key
/// insertion.
#[inline]
pub(crate) fn upper_bound<K: Ord>(keys: &[K], target: &K) -> usize {
    keys.partition_point(|key| key.cmp(target) != Ordering::Greater)
}

/// Index of the first key not less than `target`.
///
/// Used for leaf insertion (equal keys keep insertion stable) and for the
/// exact-position check before a delete: the key is present iff
/// `keys[lower_bound(keys, target)] == target`.
#[inline]
pub(crate) fn lower_bound<K: Ord>(keys: &[K], target: &K) -> usize {
    keys.partition_point(|key| key.cmp(target) == Ordering::Less)
}

/// Exact position of `target`, or `None` when absent.
#[inline]
pub(crate) fn exact_position<K: Ord>(keys: &[K], target: &K) -> Option<usize> {
    let index = lower_bound(keys, target);
    (index < keys.len() && keys[index] == *target).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upper_bound_fence_post() {
        let keys = [10, 20, 30];
        assert_eq!(upper_bound(&keys, &5), 0);
        assert_eq!(upper_bound(&keys, &10), 1); // steps past the equal key
        assert_eq!(upper_bound(&keys, &15), 1);
        assert_eq!(upper_bound(&keys, &30), 3);
        assert_eq!(upper_bound(&keys, &99), 3);
    }

    #[test]
    fn test_lower_bound_fence_post() {
        let keys = [10, 20, 30];
        assert_eq!(lower_bound(&keys, &5), 0);
        assert_eq!(lower_bound(&keys, &10), 0); // stops at the equal key
        assert_eq!(lower_bound(&keys, &15), 1);
        assert_eq!(lower_bound(&keys, &30), 2);
        assert_eq!(lower_bound(&keys, &99), 3);
    }

    #[test]
    fn test_empty_slice() {
        let keys: [i32; 0] = [];
        assert_eq!(upper_bound(&keys, &1), 0);
        assert_eq!(lower_bound(&keys, &1), 0);
        assert_eq!(exact_position(&keys, &1), None);
    }

    #[test]
    fn test_exact_position() {
        let keys = [10, 20, 30];
        assert_eq!(exact_position(&keys, &10), Some(0));
        assert_eq!(exact_position(&keys, &20), Some(1));
        assert_eq!(exact_position(&keys, &30), Some(2));
        assert_eq!(exact_position(&keys, &15), None);
        assert_eq!(exact_position(&keys, &99), None);
    }
}
