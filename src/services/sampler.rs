use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::models::{CatalogItem, ScoredCandidate};

/// Number of results shown per run
pub const RESULT_COUNT: usize = 3;

/// Draws three distinct items from the top `slice` of a ranked pool
///
/// The draw is a pure function of the pool order and `seed`: the same inputs
/// always give the same items in the same order. A pool with three or fewer
/// items is returned whole.
pub fn pick_three(ranked: &[ScoredCandidate], seed: u64, slice: usize) -> Vec<CatalogItem> {
    if ranked.len() <= RESULT_COUNT {
        return ranked.iter().map(|c| c.item.clone()).collect();
    }

    let top = &ranked[..slice.max(RESULT_COUNT).min(ranked.len())];
    let mut rng = StdRng::seed_from_u64(seed);

    top.choose_multiple(&mut rng, RESULT_COUNT)
        .map(|c| c.item.clone())
        .collect()
}
