use crate::index::{ChromosomeIndex, ReferenceHit};
use crate::variant::GenomicInterval;
use std::cmp::{max, min};

/// Default minimum overlap percentage for a query to count as known
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 70.0;

/// Overlap of two half-open intervals as a percentage of the longer one.
///
/// Lengths are floored at 1 so zero-length intervals never divide by zero; the
/// result always lies in `[0, 100]`.
pub fn overlap_percentage(query: &GenomicInterval, candidate: &ReferenceHit) -> f64 {
    let query_end = query.effective_end();
    let candidate_end = candidate.end.max(candidate.start);

    let overlap_start = max(query.start, candidate.start);
    let overlap_end = min(query_end, candidate_end);
    let overlap_length = max(0, overlap_end as i64 - overlap_start as i64);

    let query_length = max(query.len() as i64, 1);
    let candidate_length = max(candidate.len() as i64, 1);
    let max_length = max(query_length, candidate_length);

    (overlap_length as f64 * 100.0) / max_length as f64
}

/// Outcome of evaluating one query against the index
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub found: bool,
    /// Candidates returned by the index
    pub candidates: usize,
    /// Highest percentage computed before the search stopped
    pub best_percentage: f64,
}

/// Coordinate-only overlap classifier.
///
/// The variant type is never compared: a DEL in the query may be matched by a DUP
/// in the reference. Only the chromosome and the overlap percentage matter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classifier {
    threshold: f64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_OVERLAP_THRESHOLD,
        }
    }
}

impl Classifier {
    /// Returns `None` unless `threshold` is a percentage in `[0, 100]`
    pub fn new(threshold: f64) -> Option<Self> {
        (0.0..=100.0)
            .contains(&threshold)
            .then_some(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// True when `query` overlaps some reference interval by at least the threshold
    pub fn classify(&self, query: &GenomicInterval, index: &ChromosomeIndex) -> bool {
        self.evaluate(query, index).found
    }

    pub fn evaluate(&self, query: &GenomicInterval, index: &ChromosomeIndex) -> Decision {
        let mut decision = Decision {
            found: false,
            candidates: 0,
            best_percentage: 0.0,
        };

        if !index.contains_chromosome(&query.chromosome) {
            return decision;
        }

        // The tree visits every overlapping node; once a match is found the
        // remaining candidates are counted but no longer evaluated.
        decision.candidates = index.for_each_overlapping(
            &query.chromosome,
            query.start,
            query.end,
            |candidate| {
                if decision.found {
                    return;
                }
                let percentage = overlap_percentage(query, candidate);
                if percentage > decision.best_percentage {
                    decision.best_percentage = percentage;
                }
                if percentage >= self.threshold {
                    decision.found = true;
                }
            },
        );

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::SvType;

    fn interval(chromosome: &str, start: i32, end: i32) -> GenomicInterval {
        GenomicInterval::new(chromosome, start, end).with_sv_type(SvType::Del)
    }

    fn hit(start: i32, end: i32) -> ReferenceHit {
        ReferenceHit {
            start,
            end,
            sv_type: SvType::Del,
        }
    }

    #[test]
    fn test_contained_query_is_found() {
        let index = ChromosomeIndex::build(&[interval("chr1", 100, 200)]);
        let query = interval("chr1", 110, 190);

        // 80 bp shared out of the 100 bp reference
        assert_eq!(overlap_percentage(&query, &hit(100, 200)), 80.0);
        assert!(Classifier::default().classify(&query, &index));
    }

    #[test]
    fn test_chromosome_mismatch_is_not_found() {
        let index = ChromosomeIndex::build(&[interval("chr1", 100, 200)]);
        let decision = Classifier::default().evaluate(&interval("chr2", 110, 190), &index);
        assert!(!decision.found);
        assert_eq!(decision.candidates, 0);
    }

    #[test]
    fn test_empty_reference_finds_nothing() {
        let index = ChromosomeIndex::build(&[]);
        let classifier = Classifier::default();
        for query in [interval("chr1", 0, 10), interval("chr2", 5, 500)] {
            assert!(!classifier.classify(&query, &index));
        }
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let index = ChromosomeIndex::build(&[interval("chr1", 0, 100)]);
        let classifier = Classifier::default();

        let exact = interval("chr1", 0, 70);
        assert_eq!(overlap_percentage(&exact, &hit(0, 100)), 70.0);
        assert!(classifier.classify(&exact, &index));

        let index = ChromosomeIndex::build(&[interval("chr1", 0, 100_000)]);
        let just_below = interval("chr1", 0, 69_999);
        assert!(overlap_percentage(&just_below, &hit(0, 100_000)) < 70.0);
        assert!(!classifier.classify(&just_below, &index));
    }

    #[test]
    fn test_sv_type_is_not_a_filter() {
        let reference = GenomicInterval::new("chr1", 100, 200).with_sv_type(SvType::Dup);
        let index = ChromosomeIndex::build(&[reference]);
        let query = GenomicInterval::new("chr1", 100, 200).with_sv_type(SvType::Del);
        assert!(Classifier::default().classify(&query, &index));
    }

    #[test]
    fn test_small_query_inside_large_reference_is_not_found() {
        // Percentage is relative to the longer interval, so containment alone is not enough
        let index = ChromosomeIndex::build(&[interval("chr1", 0, 1000)]);
        let decision = Classifier::default().evaluate(&interval("chr1", 100, 200), &index);
        assert!(!decision.found);
        assert_eq!(decision.candidates, 1);
        assert_eq!(decision.best_percentage, 10.0);
    }

    #[test]
    fn test_any_qualifying_candidate_is_enough() {
        let index = ChromosomeIndex::build(&[
            interval("chr1", 0, 10_000),
            interval("chr1", 500, 600),
            interval("chr1", 550, 560),
        ]);
        let decision = Classifier::default().evaluate(&interval("chr1", 505, 600), &index);
        assert!(decision.found);
        assert_eq!(decision.candidates, 3);
    }

    #[test]
    fn test_percentage_stays_in_range() {
        let cases = [
            (interval("chr1", 0, 0), hit(0, 0)),
            (interval("chr1", 10, 5), hit(0, 100)),
            (interval("chr1", 0, 100), hit(50, 40)),
            (interval("chr1", 0, 100), hit(0, 100)),
            (interval("chr1", 0, 100), hit(200, 300)),
            (interval("chr1", i32::MAX - 10, i32::MAX), hit(0, i32::MAX)),
        ];
        for (query, candidate) in cases {
            let percentage = overlap_percentage(&query, &candidate);
            assert!(
                (0.0..=100.0).contains(&percentage),
                "{query} vs {candidate:?} gave {percentage}"
            );
        }
        assert_eq!(overlap_percentage(&interval("chr1", 0, 100), &hit(0, 100)), 100.0);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let catalog: Vec<GenomicInterval> = (0..200)
            .map(|i| interval("chr1", i * 37, i * 37 + 50 + (i % 7) * 10))
            .collect();
        let index = ChromosomeIndex::build(&catalog);
        let classifier = Classifier::default();

        for i in 0..100 {
            let query = interval("chr1", i * 53, i * 53 + 60);
            let first = classifier.classify(&query, &index);
            for _ in 0..5 {
                assert_eq!(classifier.classify(&query, &index), first);
            }
        }
    }

    #[test]
    fn test_threshold_validation() {
        assert!(Classifier::new(0.0).is_some());
        assert!(Classifier::new(100.0).is_some());
        assert!(Classifier::new(-1.0).is_none());
        assert!(Classifier::new(100.5).is_none());
        assert!(Classifier::new(f64::NAN).is_none());
        assert_eq!(Classifier::default().threshold(), DEFAULT_OVERLAP_THRESHOLD);
    }
}
