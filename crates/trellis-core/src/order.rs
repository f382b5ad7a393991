//! Sparse order keys for sibling groups.
//!
//! Siblings are sorted by a floating-point key spaced [`OrderingConfig::base_spacing`]
//! apart. Moving one item normally rewrites only that item: it gets the
//! floored midpoint of its new neighbours, or one spacing past either end.
//!
//! Repeated bisection of the same gap eventually shrinks it below
//! [`OrderingConfig::min_gap`]. [`allocate`] checks for that *before*
//! computing a key and, when the group is dense, renormalizes it to
//! `B, 2B, 3B, …` first.
//!
//! Everything here is pure: the allocator returns the writes it needs
//! ([`Allocation`]) and the caller applies them in one transaction.

use std::cmp::Ordering;

use serde::Serialize;

use crate::config::OrderingConfig;
use crate::model::WorkItem;

/// The order key of one sibling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiblingKey {
    pub id: String,
    pub order: f64,
}

impl SiblingKey {
    pub fn new(id: impl Into<String>, order: f64) -> Self {
        Self {
            id: id.into(),
            order,
        }
    }
}

impl From<&WorkItem> for SiblingKey {
    fn from(item: &WorkItem) -> Self {
        Self::new(item.id.clone(), item.order)
    }
}

/// A single key rewrite produced by renormalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderUpdate {
    pub id: String,
    pub order: f64,
}

/// Result of [`allocate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    /// Key for the inserted or moved item.
    pub order: f64,
    /// Sibling rewrites that must be persisted together with `order`.
    /// Empty unless the group was dense.
    pub renormalized: Vec<OrderUpdate>,
}

impl Allocation {
    #[must_use]
    pub fn did_renormalize(&self) -> bool {
        !self.renormalized.is_empty()
    }
}

/// Ascending by key; ties broken by id so the order is deterministic.
fn compare_keys(a: &SiblingKey, b: &SiblingKey) -> Ordering {
    a.order.total_cmp(&b.order).then_with(|| a.id.cmp(&b.id))
}

/// Sort siblings into display order.
pub fn sort_siblings(siblings: &mut [SiblingKey]) {
    siblings.sort_by(compare_keys);
}

/// Largest key magnitude at which adjacent integers are still distinct.
pub const MAX_EXACT_KEY: f64 = 4_503_599_627_370_496.0; // 2^52

/// Returns `true` if the sorted group needs renormalization before a key
/// can be computed: some key is not finite or beyond [`MAX_EXACT_KEY`], or
/// two adjacent keys are equal or closer than `min_gap`.
#[must_use]
pub fn is_dense(sorted: &[SiblingKey], min_gap: f64) -> bool {
    if sorted
        .iter()
        .any(|s| !s.order.is_finite() || s.order.abs() > MAX_EXACT_KEY)
    {
        return true;
    }
    sorted
        .windows(2)
        .any(|pair| pair[1].order - pair[0].order < min_gap)
}

/// Respace a sorted group to `(i + 1) * base_spacing`.
///
/// Only keys that actually change are returned, so renormalizing an
/// already-normalized group yields an empty batch.
#[must_use]
pub fn renormalize(sorted: &[SiblingKey], base_spacing: f64) -> Vec<OrderUpdate> {
    sorted
        .iter()
        .zip(normalized_keys(sorted.len(), base_spacing))
        .filter(|(sibling, key)| sibling.order.total_cmp(key) != Ordering::Equal)
        .map(|(sibling, key)| OrderUpdate {
            id: sibling.id.clone(),
            order: key,
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn normalized_keys(len: usize, base_spacing: f64) -> impl Iterator<Item = f64> {
    (1..=len).map(move |position| position as f64 * base_spacing)
}

/// Key for inserting at `target_index` into an already sorted, non-dense
/// list of keys.
///
/// An index at or past the end appends.
#[must_use]
pub fn key_at(sorted_orders: &[f64], target_index: usize, base_spacing: f64) -> f64 {
    match sorted_orders {
        [] => base_spacing,
        [first, ..] if target_index == 0 => first - base_spacing,
        [.., last] if target_index >= sorted_orders.len() => last + base_spacing,
        _ => {
            let prev = sorted_orders[target_index - 1];
            let next = sorted_orders[target_index];
            (prev + (next - prev) / 2.0).floor()
        }
    }
}

/// Compute the key for inserting at `target_index` among `siblings`.
///
/// `siblings` must not contain the item being placed; they need not be
/// sorted. If the group is dense it is renormalized first and the rewrites
/// are returned alongside the key.
#[must_use]
pub fn allocate(siblings: &[SiblingKey], target_index: usize, config: &OrderingConfig) -> Allocation {
    let mut sorted = siblings.to_vec();
    sort_siblings(&mut sorted);

    let mut renormalized = Vec::new();
    if is_dense(&sorted, config.min_gap) {
        renormalized = renormalize(&sorted, config.base_spacing);
        for (sibling, key) in sorted
            .iter_mut()
            .zip(normalized_keys(siblings.len(), config.base_spacing))
        {
            sibling.order = key;
        }
    }

    let orders: Vec<f64> = sorted.iter().map(|s| s.order).collect();
    Allocation {
        order: key_at(&orders, target_index, config.base_spacing),
        renormalized,
    }
}

/// Key for appending to the end of a group.
#[must_use]
pub fn append(siblings: &[SiblingKey], config: &OrderingConfig) -> Allocation {
    allocate(siblings, siblings.len(), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> OrderingConfig {
        OrderingConfig::default()
    }

    fn keys(pairs: &[(&str, f64)]) -> Vec<SiblingKey> {
        pairs.iter().map(|(id, order)| SiblingKey::new(*id, *order)).collect()
    }

    #[test]
    fn empty_group_gets_base_spacing() {
        let alloc = allocate(&[], 0, &cfg());
        assert!((alloc.order - 1000.0).abs() < f64::EPSILON);
        assert!(!alloc.did_renormalize());
    }

    #[test]
    fn midpoint_between_neighbours() {
        let alloc = allocate(&keys(&[("a", 1000.0), ("b", 2000.0)]), 1, &cfg());
        assert!((alloc.order - 1500.0).abs() < f64::EPSILON);
        assert!(!alloc.did_renormalize());
    }

    #[test]
    fn midpoint_is_floored() {
        let alloc = allocate(&keys(&[("a", 1000.0), ("b", 1301.0)]), 1, &cfg());
        assert!((alloc.order - 1150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn front_and_back_step_one_spacing() {
        let group = keys(&[("a", 1000.0), ("b", 2000.0)]);
        assert!((allocate(&group, 0, &cfg()).order - 0.0).abs() < f64::EPSILON);
        assert!((allocate(&group, 2, &cfg()).order - 3000.0).abs() < f64::EPSILON);
        assert!((allocate(&group, 99, &cfg()).order - 3000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let alloc = allocate(&keys(&[("b", 2000.0), ("a", 1000.0)]), 1, &cfg());
        assert!((alloc.order - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dense_group_is_renormalized_before_insert() {
        let alloc = allocate(&keys(&[("a", 1000.0), ("b", 1001.0)]), 1, &cfg());
        assert_eq!(alloc.renormalized, vec![OrderUpdate { id: "b".into(), order: 2000.0 }]);
        assert!((alloc.order - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn equal_keys_count_as_dense() {
        let sorted = keys(&[("a", 500.0), ("b", 500.0)]);
        assert!(is_dense(&sorted, 100.0));

        let alloc = allocate(&sorted, 0, &cfg());
        assert_eq!(
            alloc.renormalized,
            vec![
                OrderUpdate { id: "a".into(), order: 1000.0 },
                OrderUpdate { id: "b".into(), order: 2000.0 },
            ]
        );
        assert!((alloc.order - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_finite_keys_count_as_dense() {
        assert!(is_dense(&keys(&[("a", f64::NAN)]), 100.0));
        assert!(is_dense(&keys(&[("a", 1000.0), ("b", f64::INFINITY)]), 100.0));
    }

    #[test]
    fn huge_keys_count_as_dense() {
        let group = keys(&[("a", -f64::MAX), ("b", f64::MAX)]);
        assert!(is_dense(&group, 2.0));
        let allocation = allocate(&group, 1, &cfg());
        assert!(allocation.did_renormalize());
        assert!((allocation.order - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn gap_exactly_min_gap_is_not_dense() {
        assert!(!is_dense(&keys(&[("a", 1000.0), ("b", 1100.0)]), 100.0));
        assert!(is_dense(&keys(&[("a", 1000.0), ("b", 1099.0)]), 100.0));
    }

    #[test]
    fn renormalize_is_idempotent() {
        let normalized = keys(&[("a", 1000.0), ("b", 2000.0), ("c", 3000.0)]);
        assert!(renormalize(&normalized, 1000.0).is_empty());
    }

    #[test]
    fn renormalize_keeps_relative_order() {
        let sorted = keys(&[("x", -50.0), ("y", 7.0), ("z", 7.5)]);
        let updates = renormalize(&sorted, 1000.0);
        let ids: Vec<&str> = updates.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
        let orders: Vec<f64> = updates.iter().map(|u| u.order).collect();
        assert_eq!(orders, vec![1000.0, 2000.0, 3000.0]);
    }

    #[test]
    fn repeated_front_inserts_never_renormalize() {
        let mut group: Vec<SiblingKey> = Vec::new();
        for i in 0..50 {
            let alloc = allocate(&group, 0, &cfg());
            assert!(!alloc.did_renormalize(), "front insert {i} renormalized");
            group.push(SiblingKey::new(format!("f{i}"), alloc.order));
        }
        for i in 0..50 {
            let alloc = append(&group, &cfg());
            assert!(!alloc.did_renormalize(), "append {i} renormalized");
            group.push(SiblingKey::new(format!("b{i}"), alloc.order));
        }
    }

    #[test]
    fn custom_spacing_is_respected() {
        let config = OrderingConfig {
            base_spacing: 64.0,
            min_gap: 4.0,
        };
        assert!((allocate(&[], 0, &config).order - 64.0).abs() < f64::EPSILON);
        let alloc = allocate(&keys(&[("a", 10.0), ("b", 12.0)]), 2, &config);
        assert_eq!(alloc.renormalized.len(), 2);
        assert!((alloc.order - 192.0).abs() < f64::EPSILON);
    }
}
