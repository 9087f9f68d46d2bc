//! Merging of a read's alignment fragments into one consensus profile
//!
//! Starting from the selected anchor, fragments are folded in score-sorted
//! order. Only fragments hitting the anchor's reference contribute; a
//! candidate whose query interval is already fully covered by the merged
//! span is discarded so redundant fragments never double-count bases.

use crate::alignment_record::AlignmentFragment;

/// Consensus alignment profile for one read against one reference
#[derive(Debug, Clone, PartialEq)]
pub struct MergedAlignmentProfile {
    pub query_name: String,
    pub hit_name: String,
    pub query_len: usize,
    pub hit_len: usize,
    pub matched: u64,
    pub mismatched: u64,
    pub inserted: u64,
    pub deleted: u64,
    /// Union of the folded fragments' reference spans, half-open
    pub hit_start: usize,
    pub hit_end: usize,
    /// Union of the folded fragments' query spans, half-open
    pub query_start: usize,
    pub query_end: usize,
    pub fragment_count: usize,
}

impl MergedAlignmentProfile {
    pub fn total_alignment_bases(&self) -> u64 {
        self.matched + self.mismatched + self.inserted + self.deleted
    }

    /// Fraction of alignment bases that matched the reference
    pub fn identity(&self) -> f64 {
        let total = self.total_alignment_bases();
        if total == 0 {
            0.0
        } else {
            self.matched as f64 / total as f64
        }
    }

    pub fn hit_span(&self) -> usize {
        self.hit_end - self.hit_start
    }

    pub fn query_span(&self) -> usize {
        self.query_end - self.query_start
    }
}

/// Folds one read's fragments, anchor first, into a MergedAlignmentProfile
pub struct AlignmentMerger {
    profile: MergedAlignmentProfile,
    discarded: usize,
}

impl AlignmentMerger {
    /// Start a merge; the anchor fragment defines the reference and seeds
    /// the profile
    pub fn new(anchor: &AlignmentFragment) -> Self {
        let tallies = anchor.tallies();
        AlignmentMerger {
            profile: MergedAlignmentProfile {
                query_name: anchor.query_name.clone(),
                hit_name: anchor.hit_name.clone(),
                query_len: anchor.query_len,
                hit_len: anchor.hit_len,
                matched: tallies.matched,
                mismatched: tallies.mismatched,
                inserted: tallies.inserted,
                deleted: tallies.deleted,
                hit_start: anchor.hit_start,
                hit_end: anchor.hit_end,
                query_start: anchor.query_start,
                query_end: anchor.query_end,
                fragment_count: 1,
            },
            discarded: 0,
        }
    }

    /// Fold one more fragment into the profile. Returns false when the
    /// fragment is excluded: it targets a different reference, or its query
    /// interval adds nothing to the span already merged.
    pub fn add_fragment(&mut self, fragment: &AlignmentFragment) -> bool {
        if fragment.hit_name != self.profile.hit_name {
            self.discarded += 1;
            return false;
        }
        if fragment.query_start >= self.profile.query_start
            && fragment.query_end <= self.profile.query_end
        {
            self.discarded += 1;
            return false;
        }

        let tallies = fragment.tallies();
        self.profile.matched += tallies.matched;
        self.profile.mismatched += tallies.mismatched;
        self.profile.inserted += tallies.inserted;
        self.profile.deleted += tallies.deleted;
        self.profile.hit_start = self.profile.hit_start.min(fragment.hit_start);
        self.profile.hit_end = self.profile.hit_end.max(fragment.hit_end);
        self.profile.query_start = self.profile.query_start.min(fragment.query_start);
        self.profile.query_end = self.profile.query_end.max(fragment.query_end);
        self.profile.fragment_count += 1;
        true
    }

    /// Fragments seen but excluded from the merge
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn finish(self) -> MergedAlignmentProfile {
        self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment_record::{EditOp, Strand};

    fn fragment(
        hit: &str,
        query_range: (usize, usize),
        hit_range: (usize, usize),
        ops: Vec<EditOp>,
    ) -> AlignmentFragment {
        AlignmentFragment {
            query_name: "read_1".to_string(),
            hit_name: hit.to_string(),
            query_len: 1000,
            hit_len: 100000,
            query_start: query_range.0,
            query_end: query_range.1,
            hit_start: hit_range.0,
            hit_end: hit_range.1,
            strand: Strand::Forward,
            score: 100,
            ops,
        }
    }

    #[test]
    fn test_single_fragment_profile() {
        let anchor = fragment(
            "ref_1",
            (0, 100),
            (500, 600),
            vec![EditOp::new(90, '='), EditOp::new(10, 'X')],
        );
        let profile = AlignmentMerger::new(&anchor).finish();
        assert_eq!(profile.fragment_count, 1);
        assert_eq!(profile.matched, 90);
        assert_eq!(profile.mismatched, 10);
        assert_eq!(profile.hit_span(), 100);
        assert_eq!(profile.query_span(), 100);
        assert!((profile.identity() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_fold_extends_spans_and_tallies() {
        let anchor = fragment("ref_1", (0, 100), (500, 600), vec![EditOp::new(100, '=')]);
        let tail = fragment(
            "ref_1",
            (150, 200),
            (700, 752),
            vec![EditOp::new(48, '='), EditOp::new(2, 'X'), EditOp::new(2, 'D')],
        );
        let mut merger = AlignmentMerger::new(&anchor);
        assert!(merger.add_fragment(&tail));
        let profile = merger.finish();

        assert_eq!(profile.fragment_count, 2);
        assert_eq!(profile.matched, 148);
        assert_eq!(profile.mismatched, 2);
        assert_eq!(profile.deleted, 2);
        assert_eq!((profile.query_start, profile.query_end), (0, 200));
        assert_eq!((profile.hit_start, profile.hit_end), (500, 752));
    }

    #[test]
    fn test_cross_reference_fragment_excluded() {
        let anchor = fragment("ref_1", (0, 100), (500, 600), vec![EditOp::new(100, '=')]);
        let other = fragment("ref_2", (100, 200), (0, 100), vec![EditOp::new(100, '=')]);
        let mut merger = AlignmentMerger::new(&anchor);
        assert!(!merger.add_fragment(&other));
        let profile = merger.finish();
        assert_eq!(profile.fragment_count, 1);
        assert_eq!(profile.matched, 100);
    }

    #[test]
    fn test_contained_fragment_discarded() {
        let anchor = fragment("ref_1", (0, 100), (500, 600), vec![EditOp::new(100, '=')]);
        let inner = fragment("ref_1", (20, 80), (520, 580), vec![EditOp::new(60, '=')]);
        let mut merger = AlignmentMerger::new(&anchor);
        assert!(!merger.add_fragment(&inner));
        assert_eq!(merger.discarded(), 1);
        assert_eq!(merger.finish().matched, 100);
    }

    #[test]
    fn test_fold_is_associative_over_the_sorted_order() {
        let a = fragment("ref_1", (0, 100), (500, 600), vec![EditOp::new(100, '=')]);
        let b = fragment("ref_1", (120, 180), (620, 680), vec![EditOp::new(60, '=')]);
        let c = fragment(
            "ref_1",
            (200, 260),
            (700, 760),
            vec![EditOp::new(55, '='), EditOp::new(5, 'X')],
        );

        // One at a time
        let mut merger = AlignmentMerger::new(&a);
        merger.add_fragment(&b);
        merger.add_fragment(&c);
        let stepwise = merger.finish();

        // Same order, fresh merger
        let mut merger = AlignmentMerger::new(&a);
        for f in [&b, &c] {
            merger.add_fragment(f);
        }
        assert_eq!(merger.finish(), stepwise);
    }

    #[test]
    fn test_round_trip_tally_sum() {
        let a = fragment("ref_1", (0, 100), (500, 600), vec![EditOp::new(100, '=')]);
        let b = fragment(
            "ref_1",
            (120, 180),
            (620, 682),
            vec![EditOp::new(58, '='), EditOp::new(2, 'I'), EditOp::new(4, 'D')],
        );
        let cross = fragment("ref_9", (0, 50), (0, 50), vec![EditOp::new(50, '=')]);

        let mut merger = AlignmentMerger::new(&a);
        merger.add_fragment(&b);
        merger.add_fragment(&cross);
        let profile = merger.finish();

        // Profile bases equal the tally sum of the included fragments only
        let expected = a.tallies().total() + b.tallies().total();
        assert_eq!(profile.total_alignment_bases(), expected);
    }
}
