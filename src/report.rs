use crate::dispatch::FileClassification;
use crate::reconcile::ReconcileStats;
use crate::variant::SvType;
use crate::writer::WriteSummary;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Found / not-found counts for one variant type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeCounts {
    pub found: usize,
    pub not_found: usize,
}

/// Aggregate view of a classification run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub files_discovered: usize,
    pub files_processed: usize,
    pub failed_files: Vec<(PathBuf, String)>,
    pub found: usize,
    pub not_found: usize,
    pub excluded: usize,
    pub mismatched: usize,
    pub write: WriteSummary,
    pub by_type: BTreeMap<SvType, TypeCounts>,
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

impl RunReport {
    pub fn new(files_discovered: usize) -> Self {
        Self {
            files_discovered,
            ..Self::default()
        }
    }

    /// Add the classification counts of one file
    pub fn add_file(&mut self, file: &FileClassification) {
        self.files_processed += 1;
        self.found += file.result.found.len();
        self.not_found += file.result.not_found.len();
        self.excluded += file.excluded.len();

        for variant in &file.result.found {
            self.by_type
                .entry(variant.interval.sv_type.clone())
                .or_default()
                .found += 1;
        }
        for variant in &file.result.not_found {
            self.by_type
                .entry(variant.interval.sv_type.clone())
                .or_default()
                .not_found += 1;
        }
    }

    pub fn add_failure(&mut self, path: PathBuf, reason: String) {
        self.failed_files.push((path, reason));
    }

    pub fn add_reconcile(&mut self, stats: &ReconcileStats) {
        self.mismatched += stats.mismatched;
    }

    pub fn total_variants(&self) -> usize {
        self.found + self.not_found
    }

    pub fn found_percentage(&self) -> f64 {
        percentage(self.found, self.total_variants())
    }

    pub fn not_found_percentage(&self) -> f64 {
        percentage(self.not_found, self.total_variants())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Files discovered: {}", self.files_discovered)?;
        writeln!(f, "Files processed: {}", self.files_processed)?;
        writeln!(f, "Files failed: {}", self.failed_files.len())?;
        writeln!(f, "Variants classified: {}", self.total_variants())?;
        writeln!(
            f,
            "Found in reference: {} ({:.2}%)",
            self.found,
            self.found_percentage()
        )?;
        writeln!(
            f,
            "Not found in reference: {} ({:.2}%)",
            self.not_found,
            self.not_found_percentage()
        )?;
        writeln!(f, "Records excluded (undecodable or filtered): {}", self.excluded)?;
        writeln!(f, "Records dropped by reconciliation: {}", self.mismatched)?;
        writeln!(f, "Records that failed to write: {}", self.write.failures)?;
        writeln!(
            f,
            "Records written: {} found, {} not found",
            self.write.found_written, self.write.not_found_written
        )?;

        if !self.by_type.is_empty() {
            writeln!(f, "\nBy variant type (found / not found):")?;
            for (sv_type, counts) in &self.by_type {
                writeln!(f, "  {}: {} / {}", sv_type, counts.found, counts.not_found)?;
            }
        }

        if !self.failed_files.is_empty() {
            writeln!(f, "\nFailed files:")?;
            for (path, reason) in &self.failed_files {
                writeln!(f, "  {}: {}", path.display(), reason)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ClassificationResult, QueryVariant};
    use crate::variant::{GenomicInterval, RecordId};
    use crate::vcf::VcfHeader;

    fn variant(id: u64, sv_type: SvType) -> QueryVariant {
        QueryVariant {
            id: RecordId(id),
            interval: GenomicInterval::new("chr1", 0, 10).with_sv_type(sv_type),
        }
    }

    #[test]
    fn test_empty_run_reports_zero_percent() {
        let report = RunReport::new(3);
        assert_eq!(report.total_variants(), 0);
        assert_eq!(report.found_percentage(), 0.0);
        let text = report.to_string();
        assert!(text.contains("Found in reference: 0 (0.00%)"));
        assert!(!text.contains("By variant type"));
    }

    #[test]
    fn test_empty_index_reports_everything_not_found() {
        use crate::classify::Classifier;
        use crate::dispatch::{QueryFilter, QuerySet, Worker};
        use crate::index::ChromosomeIndex;
        use std::sync::Arc;

        let worker = Worker::new(
            Arc::new(ChromosomeIndex::build(&[])),
            Classifier::default(),
            QueryFilter::default(),
        );
        let query_set = QuerySet {
            variants: vec![variant(0, SvType::Del), variant(1, SvType::Ins)],
            ..QuerySet::default()
        };

        let mut report = RunReport::new(1);
        report.add_file(&FileClassification {
            path: PathBuf::from("child.vcf"),
            header: query_set.header.clone(),
            result: worker.classify_set(&query_set),
            excluded: query_set.excluded.clone(),
        });

        assert_eq!((report.found, report.not_found), (0, 2));
        assert_eq!(report.found_percentage(), 0.0);
        let text = report.to_string();
        assert!(text.contains("Found in reference: 0 (0.00%)"), "{text}");
        assert!(text.contains("Not found in reference: 2 (100.00%)"), "{text}");
    }

    #[test]
    fn test_counts_and_breakdown() {
        let mut report = RunReport::new(2);
        report.add_file(&FileClassification {
            path: PathBuf::from("a.vcf"),
            header: VcfHeader::default(),
            result: ClassificationResult {
                found: vec![variant(0, SvType::Del)],
                not_found: vec![
                    variant(1, SvType::Del),
                    variant(2, SvType::Dup),
                    variant(3, SvType::Unknown),
                ],
            },
            excluded: vec![RecordId(4)],
        });
        report.add_failure(PathBuf::from("b.vcf"), "unreadable".to_string());

        assert_eq!(report.total_variants(), 4);
        assert_eq!(report.found_percentage(), 25.0);
        assert_eq!(report.not_found_percentage(), 75.0);
        assert_eq!(report.by_type[&SvType::Del], TypeCounts { found: 1, not_found: 1 });

        let text = report.to_string();
        assert!(text.contains("Files failed: 1"));
        assert!(text.contains("Records excluded (undecodable or filtered): 1"));
        assert!(text.contains("  unknown: 0 / 1"));
        assert!(text.contains("  b.vcf: unreadable"));
    }
}
