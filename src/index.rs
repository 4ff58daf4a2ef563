use crate::variant::{GenomicInterval, SvType};
use coitrees::{BasicCOITree, Interval, IntervalTree};
use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// Payload stored for every reference interval.
///
/// Tree nodes use closed coordinates, so the original half-open bounds travel
/// with the payload for exact overlap arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceHit {
    pub start: i32,
    pub end: i32,
    pub sv_type: SvType,
}

impl ReferenceHit {
    pub fn len(&self) -> i32 {
        self.end.max(self.start) - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type TreeMap = FxHashMap<String, BasicCOITree<ReferenceHit, u32>>;

/// Map a half-open `[start, end)` range onto the tree's closed coordinates.
/// Zero-length and inverted ranges collapse onto their start position.
fn closed_bounds(start: i32, end: i32) -> (i32, i32) {
    (start, end.saturating_sub(1).max(start))
}

/// Reference intervals partitioned by chromosome, one interval tree each.
///
/// Built once from the catalog and read-only afterwards; workers share it through
/// an `Arc` handle.
pub struct ChromosomeIndex {
    trees: TreeMap,
    num_intervals: usize,
}

impl ChromosomeIndex {
    pub fn build(catalog: &[GenomicInterval]) -> Self {
        let intervals: FxHashMap<&str, Vec<Interval<ReferenceHit>>> = catalog
            .par_iter()
            .fold(
                FxHashMap::default,
                |mut acc: FxHashMap<&str, Vec<Interval<ReferenceHit>>>, variant| {
                    let (first, last) = closed_bounds(variant.start, variant.end);
                    acc.entry(variant.chromosome.as_str())
                        .or_default()
                        .push(Interval {
                            first,
                            last,
                            metadata: ReferenceHit {
                                start: variant.start,
                                end: variant.end,
                                sv_type: variant.sv_type.clone(),
                            },
                        });
                    acc
                },
            )
            .reduce(FxHashMap::default, |mut acc, part| {
                for (key, value) in part {
                    acc.entry(key).or_default().extend(value);
                }
                acc
            });

        let trees: TreeMap = intervals
            .into_par_iter()
            .map(|(chromosome, nodes)| {
                debug!(
                    "Built interval tree for {} with {} intervals",
                    chromosome,
                    nodes.len()
                );
                (chromosome.to_string(), BasicCOITree::new(nodes.as_slice()))
            })
            .collect();

        info!(
            "Indexed {} reference intervals across {} chromosomes",
            catalog.len(),
            trees.len()
        );

        Self {
            trees,
            num_intervals: catalog.len(),
        }
    }

    pub fn contains_chromosome(&self, chromosome: &str) -> bool {
        self.trees.contains_key(chromosome)
    }

    /// Visit every reference interval on `chromosome` that overlaps `[start, end)`.
    /// Returns the number of intervals visited; an absent chromosome visits nothing.
    pub fn for_each_overlapping<F>(&self, chromosome: &str, start: i32, end: i32, mut visit: F) -> usize
    where
        F: FnMut(&ReferenceHit),
    {
        let Some(tree) = self.trees.get(chromosome) else {
            return 0;
        };

        let (first, last) = closed_bounds(start, end);
        let mut visited = 0;
        tree.query(first, last, |node| {
            visited += 1;
            visit(&node.metadata);
        });
        visited
    }

    /// Candidate reference intervals overlapping `[start, end)` on `chromosome`
    pub fn overlapping(&self, chromosome: &str, start: i32, end: i32) -> Vec<ReferenceHit> {
        let mut hits = Vec::new();
        self.for_each_overlapping(chromosome, start, end, |hit| hits.push(hit.clone()));
        hits
    }

    pub fn num_chromosomes(&self) -> usize {
        self.trees.len()
    }

    pub fn num_intervals(&self) -> usize {
        self.num_intervals
    }

    pub fn is_empty(&self) -> bool {
        self.num_intervals == 0
    }

    /// Interval count per chromosome, in natural chromosome order
    pub fn chromosome_counts(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = self
            .trees
            .iter()
            .map(|(chromosome, tree)| (chromosome.as_str(), tree.len()))
            .collect();
        counts.sort_by(|a, b| natord::compare(a.0, b.0));
        counts
    }
}
