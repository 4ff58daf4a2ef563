use crate::error::SvError;
use crate::index::ChromosomeIndex;
use crate::variant::SvType;
use crate::vcf::load_catalog;
use rustc_hash::FxHashMap;
use std::path::Path;

/// Summary of a reference catalog and the index built from it
#[derive(Debug, Clone)]
pub struct ReferenceStats {
    pub num_intervals: usize,
    pub num_chromosomes: usize,
    pub total_span: i64,
    /// Chromosomes in natural order with their interval counts
    pub per_chromosome: Vec<(String, usize)>,
    /// Variant types by descending count
    pub per_type: Vec<(SvType, usize)>,
}

pub fn run_stats(reference: &Path) -> Result<ReferenceStats, SvError> {
    let catalog = load_catalog(reference)?;
    let index = ChromosomeIndex::build(&catalog);

    let mut per_type: FxHashMap<SvType, usize> = FxHashMap::default();
    for variant in &catalog {
        *per_type.entry(variant.sv_type.clone()).or_default() += 1;
    }
    let mut per_type: Vec<(SvType, usize)> = per_type.into_iter().collect();
    per_type.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Ok(ReferenceStats {
        num_intervals: index.num_intervals(),
        num_chromosomes: index.num_chromosomes(),
        total_span: catalog.iter().map(|v| v.len() as i64).sum(),
        per_chromosome: index
            .chromosome_counts()
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect(),
        per_type,
    })
}

pub fn print_stats(stats: &ReferenceStats) {
    println!("Number of reference variants: {}", stats.num_intervals);
    println!("Number of chromosomes: {}", stats.num_chromosomes);
    println!("Total span: {} bp", stats.total_span);

    if stats.per_chromosome.is_empty() {
        return;
    }

    let counts: Vec<usize> = stats.per_chromosome.iter().map(|(_, c)| *c).collect();
    let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
    let mut sorted = counts.clone();
    sorted.sort_unstable();
    let median = if sorted.len() % 2 == 0 {
        let mid = sorted.len() / 2;
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[sorted.len() / 2] as f64
    };
    println!("\nMean variants per chromosome: {:.2}", mean);
    println!("Median variants per chromosome: {:.2}", median);

    println!("\nVariants per chromosome:");
    for (name, count) in &stats.per_chromosome {
        println!("{}\t{}", name, count);
    }

    println!("\nVariants per type:");
    for (sv_type, count) in &stats.per_type {
        println!("{}\t{}", sv_type, count);
    }
}
