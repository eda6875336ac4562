//! Per-family hit ranking and truncation.

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

use crate::hits::GenomicInterval;

/// Group normalized intervals by family and keep the top `hit_number` per
/// group, ranked by e-value (ascending) then bit score (descending).
///
/// Families keep their first-seen order from the hit table, and the sort is
/// stable so exact ties on both keys preserve input order. A family with
/// fewer hits than the cap keeps all of them.
pub fn rank_hits(
    intervals: Vec<GenomicInterval>,
    hit_number: usize,
) -> IndexMap<String, Vec<GenomicInterval>> {
    let mut groups: IndexMap<String, Vec<GenomicInterval>> = IndexMap::new();
    for interval in intervals {
        groups
            .entry(interval.family.clone())
            .or_default()
            .push(interval);
    }

    for hits in groups.values_mut() {
        hits.sort_by_key(|h| (OrderedFloat(h.e_value), Reverse(OrderedFloat(h.bit_score))));
        hits.truncate(hit_number);
    }

    groups
}
