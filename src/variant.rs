use std::fmt;
use std::sync::Arc;

/// Structural-variant type label as found in the INFO `SVTYPE` key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum SvType {
    Del,
    Dup,
    Inv,
    Ins,
    Bnd,
    Cnv,
    Other(Arc<str>),
    #[default]
    Unknown,
}

impl SvType {
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            None | Some("") | Some(".") => SvType::Unknown,
            Some(label) => match label.to_ascii_uppercase().as_str() {
                "DEL" => SvType::Del,
                "DUP" => SvType::Dup,
                "INV" => SvType::Inv,
                "INS" => SvType::Ins,
                "BND" => SvType::Bnd,
                "CNV" => SvType::Cnv,
                _ => SvType::Other(Arc::from(label)),
            },
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SvType::Del => "DEL",
            SvType::Dup => "DUP",
            SvType::Inv => "INV",
            SvType::Ins => "INS",
            SvType::Bnd => "BND",
            SvType::Cnv => "CNV",
            SvType::Other(label) => label,
            SvType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File-local ordinal of a data line, stable across re-scans of the same file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `(chromosome, start, end)` used by the coordinate-matching reconciliation mode
pub type IdentityKey = (String, i32, i32);

/// A half-open genomic interval `[start, end)` with its variant annotations.
///
/// `end` is kept as decoded; upstream callers occasionally produce `end < start`,
/// which is treated as a zero-length interval by every length computation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenomicInterval {
    pub chromosome: String,
    pub start: i32,
    pub end: i32,
    pub sv_type: SvType,
    pub quality: Option<f64>,
}

impl GenomicInterval {
    pub fn new(chromosome: impl Into<String>, start: i32, end: i32) -> Self {
        Self {
            chromosome: chromosome.into(),
            start,
            end,
            sv_type: SvType::Unknown,
            quality: None,
        }
    }

    pub fn with_sv_type(mut self, sv_type: SvType) -> Self {
        self.sv_type = sv_type;
        self
    }

    pub fn with_quality(mut self, quality: Option<f64>) -> Self {
        self.quality = quality;
        self
    }

    /// End clamped so that it never precedes start
    pub fn effective_end(&self) -> i32 {
        self.end.max(self.start)
    }

    pub fn len(&self) -> i32 {
        self.effective_end() - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn identity_key(&self) -> IdentityKey {
        (self.chromosome.clone(), self.start, self.end)
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{} ({})",
            self.chromosome, self.start, self.end, self.sv_type
        )
    }
}

/// Reference intervals loaded once per run and never mutated afterwards
pub type ReferenceCatalog = Vec<GenomicInterval>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sv_type_labels() {
        assert_eq!(SvType::from_label(Some("DEL")), SvType::Del);
        assert_eq!(SvType::from_label(Some("dup")), SvType::Dup);
        assert_eq!(SvType::from_label(None), SvType::Unknown);
        assert_eq!(SvType::from_label(Some(".")), SvType::Unknown);

        let other = SvType::from_label(Some("CPX"));
        assert_eq!(other, SvType::Other(Arc::from("CPX")));
        assert_eq!(other.to_string(), "CPX");
        assert_eq!(SvType::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_degenerate_interval_has_zero_length() {
        let inverted = GenomicInterval::new("chr1", 200, 100);
        assert_eq!(inverted.len(), 0);
        assert!(inverted.is_empty());
        assert_eq!(inverted.effective_end(), 200);
        // The identity key keeps the raw coordinates
        assert_eq!(inverted.identity_key(), ("chr1".to_string(), 200, 100));

        let regular = GenomicInterval::new("chr1", 100, 200);
        assert_eq!(regular.len(), 100);
    }
}
