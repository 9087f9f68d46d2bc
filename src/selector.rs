//! Top-alignment selection
//!
//! A read's fragments are sorted descending by score; the merge anchor is the
//! fragment heading the best-scoring group. Ties are broken uniformly at
//! random so ambiguous best alignments are not biased toward file order. The
//! random source is injected so callers (and tests) can seed it.

use crate::alignment_record::AlignmentFragment;
use rand::Rng;

/// Stable descending sort by score; encounter order is preserved among ties
pub fn sort_by_score(fragments: &mut [AlignmentFragment]) {
    fragments.sort_by(|a, b| b.score.cmp(&a.score));
}

/// Pick the merge anchor from a non-empty, score-sorted fragment list.
///
/// Scans the tied head of the list; a unique maximum is picked
/// deterministically, `k` tied maxima are resolved with a uniform draw in
/// `[0, k)`.
pub fn pick_top_alignment<R: Rng>(fragments: &[AlignmentFragment], rng: &mut R) -> usize {
    let top_score = fragments[0].score;
    let mut count_same = 0;
    while count_same < fragments.len() && fragments[count_same].score == top_score {
        count_same += 1;
    }

    if count_same > 1 {
        rng.gen_range(0..count_same)
    } else {
        0
    }
}
