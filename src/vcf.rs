//! VCF line-level reading
//!
//! Just enough of the format for overlap classification: header lines are kept
//! verbatim so outputs can reuse them, data lines are kept verbatim so records are
//! written back untouched, and only CHROM/POS/REF/QUAL/FILTER/INFO are decoded.
//! Supports both uncompressed and BGZF-compressed files.

use crate::error::{DecodeError, SvError};
use crate::variant::{GenomicInterval, RecordId, ReferenceCatalog, SvType};
use log::{debug, info, warn};
use noodles::bgzf;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const BGZF_HEADER_SIZE: usize = 18;

/// Number of undecodable records reported one by one before switching to a summary
const MAX_REPORTED_DECODE_ERRORS: usize = 5;

/// Check whether a file starts with a valid BGZF header.
/// Returns `Ok(false)` for regular gzip, too-small files, or plain text.
fn is_bgzf<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    let mut header = [0u8; BGZF_HEADER_SIZE];
    let result = match reader.read_exact(&mut header) {
        Ok(()) => {
            Ok(header[0..2] == [0x1f, 0x8b]      // gzip magic
                && header[2] == 0x08              // DEFLATE
                && header[3] == 0x04              // FEXTRA
                && header[10..12] == [0x06, 0x00] // XLEN=6
                && header[12..14] == [b'B', b'C'] // BC subfield
                && header[14..16] == [0x02, 0x00]) // SLEN=2
        }
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    };
    reader.seek(SeekFrom::Start(0))?;
    result
}

fn is_compressed(path: &Path) -> bool {
    let name = path.to_string_lossy();
    [".gz", ".bgz"].iter().any(|e| name.ends_with(e))
}

fn open_vcf(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let mut file = File::open(path)?;
    if is_compressed(path) {
        if !is_bgzf(&mut file)? {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "'{}' is regular gzip, not BGZF. Convert with: zcat '{}' | bgzip > output.vcf.gz",
                    path.display(),
                    path.display()
                ),
            ));
        }
        Ok(Box::new(BufReader::new(bgzf::io::Reader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Meta-information and column header lines of a VCF file, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VcfHeader {
    lines: Vec<String>,
}

impl VcfHeader {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The `#CHROM ...` line, if the file has one
    pub fn column_line(&self) -> Option<&str> {
        self.lines
            .last()
            .map(String::as_str)
            .filter(|line| line.starts_with("#CHROM"))
    }

    pub fn column_count(&self) -> Option<usize> {
        self.column_line().map(|line| line.split('\t').count())
    }
}

/// A data line exactly as read, tagged with its ordinal within the file
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: RecordId,
    pub line: String,
    /// Byte offset of the first invalid UTF-8 sequence; `line` is then a lossy copy
    pub invalid_utf8_at: Option<usize>,
}

/// Fields decoded from one data line
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub interval: GenomicInterval,
    pub passes_filter: bool,
    pub imprecise: bool,
}

impl RawRecord {
    pub fn column_count(&self) -> usize {
        self.line.split('\t').count()
    }

    /// Decode the interval of a data line.
    ///
    /// Start is `POS - 1`; end is INFO `END` when present, otherwise start plus the
    /// REF allele length.
    pub fn decode(&self) -> Result<DecodedRecord, DecodeError> {
        if let Some(offset) = self.invalid_utf8_at {
            return Err(DecodeError::InvalidUtf8(offset));
        }
        let fields: Vec<&str> = self.line.split('\t').collect();
        if fields.len() < 8 {
            return Err(DecodeError::NotEnoughFields(fields.len()));
        }

        let chromosome = fields[0].to_string();
        let pos = parse_int("POS", fields[1])?;
        let start = to_position((pos - 1).max(0))?;

        let mut end_override = None;
        let mut sv_type = None;
        let mut imprecise = false;
        for entry in fields[7].split(';') {
            let (key, value) = match entry.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (entry, None),
            };
            match (key, value) {
                ("END", Some(value)) => end_override = Some(parse_int("END", value)?),
                ("SVTYPE", Some(value)) => sv_type = Some(value),
                ("IMPRECISE", _) => imprecise = true,
                _ => {}
            }
        }

        let end = match end_override {
            Some(end) => to_position(end)?,
            None => to_position(start as i64 + fields[3].len() as i64)?,
        };

        let quality = match fields[5] {
            "." => None,
            qual => Some(qual.parse::<f64>().map_err(|_| DecodeError::InvalidField {
                field: "QUAL",
                value: qual.to_string(),
            })?),
        };

        Ok(DecodedRecord {
            interval: GenomicInterval::new(chromosome, start, end)
                .with_sv_type(SvType::from_label(sv_type))
                .with_quality(quality),
            passes_filter: fields[6] == "PASS",
            imprecise,
        })
    }
}

fn parse_int(field: &'static str, value: &str) -> Result<i64, DecodeError> {
    value.parse::<i64>().map_err(|_| DecodeError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn to_position(value: i64) -> Result<i32, DecodeError> {
    i32::try_from(value).map_err(|_| DecodeError::CoordinateOverflow(value))
}

/// One line without its terminator
struct Line {
    text: String,
    invalid_utf8_at: Option<usize>,
}

/// Read the next line as raw bytes. Invalid UTF-8 does not fail the stream; the
/// line is kept lossily and the offset of the first bad byte is recorded.
fn read_raw_line(inner: &mut dyn BufRead, buf: &mut Vec<u8>) -> io::Result<Option<Line>> {
    buf.clear();
    if inner.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }

    let line = match String::from_utf8(std::mem::take(buf)) {
        Ok(text) => Line {
            text,
            invalid_utf8_at: None,
        },
        Err(e) => Line {
            invalid_utf8_at: Some(e.utf8_error().valid_up_to()),
            text: String::from_utf8_lossy(e.as_bytes()).into_owned(),
        },
    };
    Ok(Some(line))
}

/// Streaming reader over the data lines of a VCF file.
///
/// The header is consumed when the reader is opened. Empty lines are skipped and do
/// not receive an ordinal, so every scan of the same file assigns the same ids.
/// Lines that are not valid UTF-8 still receive an ordinal and fail to decode.
pub struct VcfReader {
    inner: Box<dyn BufRead>,
    header: VcfHeader,
    pending: Option<Line>,
    next_id: u64,
}

impl VcfReader {
    pub fn from_path(path: &Path) -> io::Result<Self> {
        Self::new(open_vcf(path)?)
    }

    pub fn new(mut inner: Box<dyn BufRead>) -> io::Result<Self> {
        let mut lines = Vec::new();
        let mut pending = None;
        let mut buf = Vec::new();
        while let Some(line) = read_raw_line(inner.as_mut(), &mut buf)? {
            if line.text.starts_with('#') {
                lines.push(line.text);
            } else if !line.text.is_empty() {
                pending = Some(line);
                break;
            }
        }

        Ok(Self {
            inner,
            header: VcfHeader::new(lines),
            pending,
            next_id: 0,
        })
    }

    pub fn header(&self) -> &VcfHeader {
        &self.header
    }

    fn next_line(&mut self) -> io::Result<Option<Line>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        let mut buf = Vec::new();
        while let Some(line) = read_raw_line(self.inner.as_mut(), &mut buf)? {
            // Stray meta lines after the column header are not records
            if !line.text.is_empty() && !line.text.starts_with('#') {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}

impl Iterator for VcfReader {
    type Item = io::Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_line() {
            Ok(Some(line)) => {
                let id = RecordId(self.next_id);
                self.next_id += 1;
                Some(Ok(RawRecord {
                    id,
                    line: line.text,
                    invalid_utf8_at: line.invalid_utf8_at,
                }))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Load the reference catalog.
///
/// Undecodable records are skipped with a warning; a source that cannot be read,
/// or that yields no decodable record at all, is a fatal load error.
pub fn load_catalog(path: &Path) -> Result<ReferenceCatalog, SvError> {
    let reader = VcfReader::from_path(path).map_err(|e| SvError::load(path, e))?;

    let mut catalog = ReferenceCatalog::new();
    let mut undecodable = 0usize;
    for record in reader {
        let record = record.map_err(|e| SvError::load(path, e))?;
        match record.decode() {
            Ok(decoded) => catalog.push(decoded.interval),
            Err(e) => {
                undecodable += 1;
                if undecodable <= MAX_REPORTED_DECODE_ERRORS {
                    warn!(
                        "Skipping undecodable reference record {} in '{}': {}",
                        record.id,
                        path.display(),
                        e
                    );
                }
            }
        }
    }

    if undecodable > MAX_REPORTED_DECODE_ERRORS {
        warn!(
            "Skipped {} undecodable reference records in total",
            undecodable
        );
    }

    if catalog.is_empty() {
        return Err(SvError::load(
            path,
            "no decodable records found after a full scan",
        ));
    }

    info!(
        "Loaded {} reference variants from '{}'",
        catalog.len(),
        path.display()
    );
    Ok(catalog)
}

/// List the files in `dir` whose name ends with `.{extension}`, in natural order
pub fn discover_inputs(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(&suffix))
        })
        .collect();

    files.sort_by(|a, b| natord::compare(&a.to_string_lossy(), &b.to_string_lossy()));
    debug!(
        "Discovered {} '{}' files in '{}'",
        files.len(),
        suffix,
        dir.display()
    );
    Ok(files)
}
