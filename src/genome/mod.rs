//! Genomic intervals, gene annotations and overlap indexing.
//!
//! Peaks are identified by strings that encode their location (`chr1-1000-1500`,
//! `chr1:1000-1500` or `chr1_1000_1500`). Coordinates are 0-based and half-open.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

pub mod annotation;
pub mod index;

pub use annotation::{AnnotationRegistry, Gene, GeneAnnotation, GenomeBuild};
pub use index::IntervalIndex;

/// A genomic interval `[start, end)` on one chromosome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Peak {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl Peak {
    pub fn new(chrom: impl Into<String>, start: u64, end: u64) -> anyhow::Result<Self> {
        let chrom = chrom.into();
        if chrom.is_empty() {
            return Err(anyhow!("Chromosome name cannot be empty"));
        }
        if start >= end {
            return Err(anyhow!(
                "Interval start must be smaller than end, got {}:{}-{}",
                chrom,
                start,
                end
            ));
        }
        Ok(Peak { chrom, start, end })
    }

    /// Parse a peak identifier. The last two fields are the coordinates, everything before
    /// them is the chromosome name, so `chrUn_gl000220-100-200` parses as expected.
    pub fn parse(id: &str) -> anyhow::Result<Self> {
        let mut fields = id.rsplitn(3, |c| c == '-' || c == ':' || c == '_');
        let (end, start, chrom) = match (fields.next(), fields.next(), fields.next()) {
            (Some(end), Some(start), Some(chrom)) => (end, start, chrom),
            _ => return Err(anyhow!("Malformed peak identifier '{}'", id)),
        };

        let start: u64 = start
            .parse()
            .map_err(|_| anyhow!("Malformed start coordinate in peak identifier '{}'", id))?;
        let end: u64 = end
            .parse()
            .map_err(|_| anyhow!("Malformed end coordinate in peak identifier '{}'", id))?;

        Peak::new(chrom, start, end)
    }

    pub fn width(&self) -> u64 {
        self.end - self.start
    }

    pub fn midpoint(&self) -> u64 {
        self.start + self.width() / 2
    }

    /// The single base at the midpoint.
    pub fn summit(&self) -> Peak {
        let mid = self.midpoint();
        Peak {
            chrom: self.chrom.clone(),
            start: mid,
            end: mid + 1,
        }
    }

    /// Resize to `width` bases centered on the midpoint. The start is clamped at 0.
    pub fn resize(&self, width: u64) -> anyhow::Result<Peak> {
        if width == 0 {
            return Err(anyhow!("Cannot resize an interval to zero width"));
        }
        let start = self.midpoint().saturating_sub(width / 2);
        Peak::new(self.chrom.clone(), start, start + width)
    }

    pub fn overlaps(&self, other: &Peak) -> bool {
        self.chrom == other.chrom && self.start < other.end && other.start < self.end
    }

    /// Distance between midpoints, `None` for intervals on different chromosomes.
    pub fn distance(&self, other: &Peak) -> Option<u64> {
        if self.chrom != other.chrom {
            return None;
        }
        Some(self.midpoint().abs_diff(other.midpoint()))
    }
}

impl FromStr for Peak {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Peak::parse(s)
    }
}

impl fmt::Display for Peak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.chrom, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_separators() {
        let expected = Peak::new("chr1", 1000, 1500).unwrap();
        assert_eq!(Peak::parse("chr1-1000-1500").unwrap(), expected);
        assert_eq!(Peak::parse("chr1:1000-1500").unwrap(), expected);
        assert_eq!(Peak::parse("chr1_1000_1500").unwrap(), expected);
    }

    #[test]
    fn test_parse_keeps_underscored_chromosome() {
        let peak = Peak::parse("chrUn_gl000220-100-200").unwrap();
        assert_eq!(peak.chrom, "chrUn_gl000220");
        assert_eq!((peak.start, peak.end), (100, 200));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Peak::parse("chr1").is_err());
        assert!(Peak::parse("chr1-abc-200").is_err());
        assert!(Peak::parse("chr1-300-200").is_err());
        assert!(Peak::parse("-100-200").is_err());
    }

    #[test]
    fn test_summit_and_resize() {
        let peak = Peak::parse("chr2-100-201").unwrap();
        let summit = peak.summit();
        assert_eq!((summit.start, summit.end), (150, 151));

        let padded = peak.resize(1000).unwrap();
        assert_eq!((padded.start, padded.end), (0, 1000));

        let narrow = Peak::parse("chr2-10000-10500").unwrap().resize(100).unwrap();
        assert_eq!((narrow.start, narrow.end), (10200, 10300));
        assert!(peak.resize(0).is_err());
    }

    #[test]
    fn test_overlap_is_half_open() {
        let a = Peak::parse("chr1-100-200").unwrap();
        let b = Peak::parse("chr1-200-300").unwrap();
        let c = Peak::parse("chr1-199-300").unwrap();
        let d = Peak::parse("chr2-100-200").unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(!a.overlaps(&d));
        assert_eq!(a.distance(&b), Some(100));
        assert_eq!(a.distance(&d), None);
    }

    #[test]
    fn test_display_round_trip() {
        let peak = Peak::parse("chrX:5-10").unwrap();
        assert_eq!(peak.to_string(), "chrX-5-10");
    }
}
