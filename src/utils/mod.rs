pub mod metrics;

use crate::models::Recommendation;
use std::cmp::Ordering;

/// Sorts scored recommendations descending by score, ties broken by
/// ascending item id so equal scores always order the same way, and keeps
/// the first k.
pub fn top_k(mut scored: Vec<Recommendation>, k: usize) -> Vec<Recommendation> {
    scored.sort_unstable_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
    scored.truncate(k);
    scored
}
