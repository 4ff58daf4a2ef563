use crate::error::SvError;
use crate::vcf::{RawRecord, VcfHeader};
use log::{debug, error, info, warn};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_FOUND_NAME: &str = "found_in_reference.vcf";
pub const DEFAULT_NOT_FOUND_NAME: &str = "not_found_in_reference.vcf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Found,
    NotFound,
}

impl Partition {
    fn slot(self) -> usize {
        match self {
            Partition::Found => 0,
            Partition::NotFound => 1,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Found => f.write_str("found"),
            Partition::NotFound => f.write_str("not found"),
        }
    }
}

/// One output file, opened on its first record
struct PartitionSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    header_source: Option<PathBuf>,
    column_line: Option<String>,
    column_count: Option<usize>,
    /// Set when the output could not be created; later records fail without retrying
    broken: Option<String>,
    warned_sources: Vec<PathBuf>,
    written: usize,
}

impl PartitionSink {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            writer: None,
            header_source: None,
            column_line: None,
            column_count: None,
            broken: None,
            warned_sources: Vec::new(),
            written: 0,
        }
    }

    fn open(&mut self, header: &VcfHeader, source: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        for line in header.lines() {
            writeln!(writer, "{}", line)?;
        }
        info!(
            "Writing '{}' with the header of '{}'",
            self.path.display(),
            source.display()
        );
        self.writer = Some(writer);
        self.header_source = Some(source.to_path_buf());
        self.column_line = header.column_line().map(str::to_string);
        self.column_count = header.column_count();
        Ok(())
    }

    fn check_header(&mut self, header: &VcfHeader, source: &Path) {
        if self.header_source.as_deref() == Some(source)
            || self.warned_sources.iter().any(|p| p == source)
        {
            return;
        }
        if header.column_line() != self.column_line.as_deref() {
            warn!(
                "Columns of '{}' differ from those of '{}'; its records are written under the latter header",
                source.display(),
                self.header_source
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            );
            self.warned_sources.push(source.to_path_buf());
        }
    }

    fn write(&mut self, header: &VcfHeader, source: &Path, record: &RawRecord) -> Result<(), String> {
        if let Some(reason) = &self.broken {
            return Err(reason.clone());
        }

        if self.writer.is_none() {
            if let Err(e) = self.open(header, source) {
                let reason = format!("cannot create output: {e}");
                error!("Failed to create '{}': {}", self.path.display(), e);
                self.writer = None;
                self.broken = Some(reason.clone());
                return Err(reason);
            }
        } else {
            self.check_header(header, source);
        }

        if let Some(expected) = self.column_count {
            let found = record.column_count();
            if found != expected {
                return Err(format!(
                    "record has {found} columns but the output header declares {expected}"
                ));
            }
        }

        let Some(writer) = self.writer.as_mut() else {
            return Err("output is not open".to_string());
        };
        writeln!(writer, "{}", record.line).map_err(|e| e.to_string())?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Record counts produced by [`PartitionedWriter::finish`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub found_written: usize,
    pub not_found_written: usize,
    pub failures: usize,
}

/// Writes classified records into the found / not-found outputs.
///
/// Header rule: each output takes the full header of the first file that
/// contributes a record to it, and every later record is written under that
/// header. An output that receives no record is never created.
pub struct PartitionedWriter {
    sinks: [PartitionSink; 2],
    failures: usize,
}

impl PartitionedWriter {
    /// Create `dir` if needed and remove stale outputs left by a previous run
    pub fn prepare(dir: &Path, found_name: &str, not_found_name: &str) -> Result<Self, SvError> {
        fs::create_dir_all(dir)?;

        let sinks = [
            PartitionSink::new(dir.join(found_name)),
            PartitionSink::new(dir.join(not_found_name)),
        ];
        for sink in &sinks {
            if sink.path.exists() {
                debug!("Removing previous output '{}'", sink.path.display());
                fs::remove_file(&sink.path)?;
            }
        }

        Ok(Self { sinks, failures: 0 })
    }

    pub fn output_path(&self, partition: Partition) -> &Path {
        &self.sinks[partition.slot()].path
    }

    /// Write one record; failures are logged and counted, never propagated
    pub fn write(&mut self, partition: Partition, header: &VcfHeader, source: &Path, record: &RawRecord) {
        let sink = &mut self.sinks[partition.slot()];
        if let Err(reason) = sink.write(header, source, record) {
            self.failures += 1;
            error!(
                "{}",
                SvError::Write {
                    output: sink.path.clone(),
                    source_path: source.to_path_buf(),
                    record: record.id.0,
                    reason,
                }
            );
        }
    }

    pub fn finish(mut self) -> Result<WriteSummary, SvError> {
        for sink in &mut self.sinks {
            sink.finish()?;
        }
        Ok(WriteSummary {
            found_written: self.sinks[Partition::Found.slot()].written,
            not_found_written: self.sinks[Partition::NotFound.slot()].written,
            failures: self.failures,
        })
    }
}
