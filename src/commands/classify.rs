use crate::classify::{Classifier, DEFAULT_OVERLAP_THRESHOLD};
use crate::dispatch::{Dispatcher, FileClassification, QueryFilter, Worker, DEFAULT_MAX_WORKERS};
use crate::error::SvError;
use crate::index::ChromosomeIndex;
use crate::reconcile::{MatchStrategy, Reconciler};
use crate::report::RunReport;
use crate::vcf::{discover_inputs, load_catalog, RawRecord, VcfHeader, VcfReader};
use crate::writer::{Partition, PartitionedWriter, DEFAULT_FOUND_NAME, DEFAULT_NOT_FOUND_NAME};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the classify command
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    pub reference: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub extension: String,
    pub threshold: f64,
    pub max_workers: usize,
    pub match_strategy: MatchStrategy,
    pub filter: QueryFilter,
    pub found_name: String,
    pub not_found_name: String,
}

impl ClassifyConfig {
    pub fn new(reference: PathBuf, input_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            reference,
            input_dir,
            output_dir,
            extension: "vcf".to_string(),
            threshold: DEFAULT_OVERLAP_THRESHOLD,
            max_workers: DEFAULT_MAX_WORKERS,
            match_strategy: MatchStrategy::default(),
            filter: QueryFilter::default(),
            found_name: DEFAULT_FOUND_NAME.to_string(),
            not_found_name: DEFAULT_NOT_FOUND_NAME.to_string(),
        }
    }

    fn classifier(&self) -> Result<Classifier, SvError> {
        Classifier::new(self.threshold).ok_or_else(|| {
            SvError::InvalidConfig(format!(
                "overlap threshold must be a percentage between 0 and 100, got {}",
                self.threshold
            ))
        })
    }

    fn validate(&self) -> Result<Classifier, SvError> {
        if self.max_workers == 0 {
            return Err(SvError::InvalidConfig(
                "the worker cap must be at least 1".to_string(),
            ));
        }
        if self.found_name == self.not_found_name {
            return Err(SvError::InvalidConfig(format!(
                "found and not-found outputs share the name '{}'",
                self.found_name
            )));
        }
        self.classifier()
    }
}

/// Classify every query file in `config.input_dir` against the reference catalog.
///
/// The reference is loaded and indexed once before any file is dispatched; a
/// reference that cannot be loaded aborts the run. Per-file, per-record failures
/// are logged and show up in the returned report.
pub fn run_classify(config: &ClassifyConfig) -> Result<RunReport, SvError> {
    let classifier = config.validate()?;

    let files = discover_inputs(&config.input_dir, &config.extension)?;
    if files.is_empty() {
        return Err(SvError::EmptyInput {
            dir: config.input_dir.clone(),
            extension: config.extension.trim_start_matches('.').to_string(),
        });
    }
    info!("Found {} query files to classify", files.len());

    let catalog = load_catalog(&config.reference)?;
    let index = Arc::new(ChromosomeIndex::build(&catalog));
    drop(catalog);

    let mut writer =
        PartitionedWriter::prepare(&config.output_dir, &config.found_name, &config.not_found_name)?;

    let dispatcher = Dispatcher::new(
        Worker::new(index, classifier, config.filter.clone()),
        config.max_workers,
    );
    let outcomes = dispatcher.run(&files)?;

    let reconciler = Reconciler::new(config.match_strategy);
    let mut report = RunReport::new(files.len());
    for outcome in outcomes {
        let file = match outcome {
            Ok(file) => file,
            Err(SvError::PerFile { path, reason }) => {
                report.add_failure(path, reason);
                continue;
            }
            Err(e) => return Err(e),
        };

        let reader = VcfReader::from_path(&file.path).map_err(|e| SvError::per_file(&file.path, e));
        route_file(&reconciler, reader, &file, &mut writer, &mut report);
    }

    report.write = writer.finish()?;
    info!(
        "Classified {} variants from {} files",
        report.total_variants(),
        report.files_processed
    );
    Ok(report)
}

/// Reconcile one classified file and write its records.
///
/// Routed records are held back until the re-scan completes, so a file that fails
/// halfway contributes nothing to the outputs and is reported as failed.
fn route_file(
    reconciler: &Reconciler,
    reader: Result<VcfReader, SvError>,
    file: &FileClassification,
    writer: &mut PartitionedWriter,
    report: &mut RunReport,
) {
    let mut header: Option<VcfHeader> = None;
    let mut routed: Vec<(Partition, RawRecord)> = Vec::new();
    let reconciled = reader.and_then(|reader| {
        reconciler.reconcile_reader(file, reader, |partition, file_header, record| {
            header.get_or_insert_with(|| file_header.clone());
            routed.push((partition, record.clone()));
        })
    });

    match reconciled {
        Ok(stats) => {
            if let Some(header) = &header {
                for (partition, record) in &routed {
                    writer.write(*partition, header, &file.path, record);
                }
            }
            report.add_file(file);
            report.add_reconcile(&stats);
        }
        Err(e) => {
            warn!("{}", e);
            report.add_failure(file.path.clone(), e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{self, BufReader, Cursor, Read};
    use std::path::Path;

    const HEADER: &str = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

    fn setup(reference_body: &str) -> (tempfile::TempDir, ClassifyConfig) {
        let dir = tempfile::TempDir::new().unwrap();
        let reference = dir.path().join("reference.vcf");
        fs::write(&reference, format!("{HEADER}{reference_body}")).unwrap();
        let input_dir = dir.path().join("queries");
        fs::create_dir(&input_dir).unwrap();
        let config = ClassifyConfig::new(reference, input_dir, dir.path().join("out"));
        (dir, config)
    }

    fn add_query(config: &ClassifyConfig, name: &str, body: &str) {
        fs::write(config.input_dir.join(name), format!("{HEADER}{body}")).unwrap();
    }

    fn data_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|l| !l.starts_with('#'))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_end_to_end_known_and_novel() {
        let (_dir, config) = setup("chr1\t101\tref1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=200\n");
        add_query(
            &config,
            "child1.vcf",
            "chr1\t111\tknown\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=190\n\
             chr2\t111\tnovel\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=190\n",
        );
        add_query(&config, "child2.vcf", "");

        let report = run_classify(&config).unwrap();
        assert_eq!(report.files_processed, 2);
        assert_eq!(report.total_variants(), 2);
        assert_eq!((report.found, report.not_found), (1, 1));
        assert_eq!(report.write.found_written, 1);
        assert_eq!(report.write.not_found_written, 1);

        let found = data_lines(&config.output_dir.join(DEFAULT_FOUND_NAME));
        let novel = data_lines(&config.output_dir.join(DEFAULT_NOT_FOUND_NAME));
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("\tknown\t"));
        assert_eq!(novel.len(), 1);
        assert!(novel[0].contains("\tnovel\t"));
    }

    #[test]
    fn test_no_query_files_is_empty_input() {
        let (_dir, config) = setup("chr1\t101\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=200\n");
        assert!(matches!(
            run_classify(&config),
            Err(SvError::EmptyInput { .. })
        ));
        assert!(!config.output_dir.exists());
    }

    #[test]
    fn test_unloadable_reference_aborts() {
        let (_dir, config) = setup("");
        add_query(&config, "a.vcf", "chr1\t111\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=190\n");
        assert!(matches!(run_classify(&config), Err(SvError::Load { .. })));
        assert!(!config.output_dir.exists());
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let (_dir, mut config) = setup("");
        config.threshold = 170.0;
        assert!(matches!(
            run_classify(&config),
            Err(SvError::InvalidConfig(_))
        ));

        config.threshold = 70.0;
        config.max_workers = 0;
        assert!(matches!(
            run_classify(&config),
            Err(SvError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_lower_threshold_finds_more() {
        let (_dir, mut config) =
            setup("chr1\t1\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=1000\n");
        add_query(
            &config,
            "a.vcf",
            "chr1\t1\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=500\n",
        );

        assert_eq!(run_classify(&config).unwrap().found, 0);
        config.threshold = 50.0;
        assert_eq!(run_classify(&config).unwrap().found, 1);
    }

    /// Serves its bytes, then fails instead of signalling end of input
    struct FailsAtEnd(Cursor<Vec<u8>>);

    impl Read for FailsAtEnd {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.read(buf)? {
                0 => Err(io::Error::other("device went away")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_failed_rescan_writes_nothing() {
        let (_dir, config) = setup("chr1\t101\tref1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=200\n");
        let body = "chr1\t111\tknown\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=190\n\
                    chr2\t111\tnovel\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=190\n";
        add_query(&config, "child.vcf", body);

        let catalog = load_catalog(&config.reference).unwrap();
        let worker = Worker::new(
            Arc::new(ChromosomeIndex::build(&catalog)),
            Classifier::default(),
            QueryFilter::default(),
        );
        let file = worker
            .process_file(&config.input_dir.join("child.vcf"))
            .unwrap();
        let reconciler = Reconciler::new(MatchStrategy::RecordId);

        let mut writer =
            PartitionedWriter::prepare(&config.output_dir, DEFAULT_FOUND_NAME, DEFAULT_NOT_FOUND_NAME)
                .unwrap();
        let mut report = RunReport::new(1);
        let broken = FailsAtEnd(Cursor::new(format!("{HEADER}{body}").into_bytes()));
        let reader = VcfReader::new(Box::new(BufReader::new(broken)))
            .map_err(|e| SvError::per_file(&file.path, e));
        route_file(&reconciler, reader, &file, &mut writer, &mut report);

        assert_eq!(report.files_processed, 0);
        assert_eq!(report.failed_files.len(), 1);
        assert_eq!(report.total_variants(), 0);
        let summary = writer.finish().unwrap();
        assert_eq!((summary.found_written, summary.not_found_written), (0, 0));
        assert!(!config.output_dir.join(DEFAULT_FOUND_NAME).exists());
        assert!(!config.output_dir.join(DEFAULT_NOT_FOUND_NAME).exists());

        // The same file routes normally once the re-scan completes
        let mut writer =
            PartitionedWriter::prepare(&config.output_dir, DEFAULT_FOUND_NAME, DEFAULT_NOT_FOUND_NAME)
                .unwrap();
        let mut report = RunReport::new(1);
        let reader = VcfReader::from_path(&file.path).map_err(|e| SvError::per_file(&file.path, e));
        route_file(&reconciler, reader, &file, &mut writer, &mut report);
        assert_eq!(report.files_processed, 1);
        assert_eq!((report.found, report.not_found), (1, 1));
        let summary = writer.finish().unwrap();
        assert_eq!((summary.found_written, summary.not_found_written), (1, 1));
    }
}
