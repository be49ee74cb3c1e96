//! Genome builds, gene TSS annotations and the per-build annotation registry.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use log::warn;

use super::{IntervalIndex, Peak};
use crate::error::PipelineError;

/// Reference genome builds with a supported TSS annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenomeBuild {
    Hg19,
    Hg38,
    Mm10,
    MacFas5,
}

impl GenomeBuild {
    pub const ALL: [GenomeBuild; 4] = [
        GenomeBuild::Hg19,
        GenomeBuild::Hg38,
        GenomeBuild::Mm10,
        GenomeBuild::MacFas5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GenomeBuild::Hg19 => "hg19",
            GenomeBuild::Hg38 => "hg38",
            GenomeBuild::Mm10 => "mm10",
            GenomeBuild::MacFas5 => "macFas5",
        }
    }
}

impl FromStr for GenomeBuild {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GenomeBuild::ALL
            .iter()
            .copied()
            .find(|build| build.as_str() == s)
            .ok_or_else(|| {
                PipelineError::config(format!(
                    "unsupported genome build '{}', expected one of hg19, hg38, mm10, macFas5",
                    s
                ))
            })
    }
}

impl fmt::Display for GenomeBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gene and its transcription start site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gene {
    pub name: String,
    pub chrom: String,
    pub tss: u64,
}

impl Gene {
    pub fn new(name: impl Into<String>, chrom: impl Into<String>, tss: u64) -> Self {
        Gene {
            name: name.into(),
            chrom: chrom.into(),
            tss,
        }
    }

    /// `TSS ± pad`, both ends inclusive.
    pub fn window(&self, pad: u64) -> Peak {
        Peak {
            chrom: self.chrom.clone(),
            start: self.tss.saturating_sub(pad),
            end: self.tss + pad + 1,
        }
    }

    pub fn promoter(&self, pad: u64) -> Peak {
        self.window(pad)
    }
}

/// TSS table for one genome build. Gene names are unique; later duplicates are ignored.
#[derive(Debug, Clone)]
pub struct GeneAnnotation {
    build: GenomeBuild,
    genes: Vec<Gene>,
    by_name: HashMap<String, usize>,
}

impl GeneAnnotation {
    pub fn new(build: GenomeBuild, genes: Vec<Gene>) -> Self {
        let mut kept = Vec::with_capacity(genes.len());
        let mut by_name = HashMap::with_capacity(genes.len());
        for gene in genes {
            if by_name.contains_key(&gene.name) {
                warn!(
                    "Duplicate gene '{}' in {} annotation, keeping the first TSS",
                    gene.name, build
                );
                continue;
            }
            by_name.insert(gene.name.clone(), kept.len());
            kept.push(gene);
        }
        GeneAnnotation {
            build,
            genes: kept,
            by_name,
        }
    }

    pub fn build(&self) -> GenomeBuild {
        self.build
    }

    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    pub fn get(&self, name: &str) -> Option<&Gene> {
        self.by_name.get(name).map(|&i| &self.genes[i])
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Promoter windows of every gene, payload is the gene's position in [`Self::genes`].
    pub fn promoter_index(&self, pad: u64) -> IntervalIndex<usize> {
        IntervalIndex::from_intervals(
            self.genes
                .iter()
                .enumerate()
                .map(|(i, gene)| (gene.promoter(pad), i)),
        )
    }
}

/// Annotations loaded at startup, one per genome build. Passed explicitly into the pipeline.
#[derive(Debug, Clone, Default)]
pub struct AnnotationRegistry {
    annotations: HashMap<GenomeBuild, GeneAnnotation>,
}

impl AnnotationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_annotation(mut self, annotation: GeneAnnotation) -> Self {
        self.insert(annotation);
        self
    }

    /// Replaces any annotation already registered for the same build.
    pub fn insert(&mut self, annotation: GeneAnnotation) {
        self.annotations.insert(annotation.build(), annotation);
    }

    pub fn get(&self, build: GenomeBuild) -> anyhow::Result<&GeneAnnotation> {
        self.annotations.get(&build).ok_or_else(|| {
            PipelineError::config(format!("no gene annotation registered for {}", build))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genome_build_parsing() {
        assert_eq!("hg38".parse::<GenomeBuild>().unwrap(), GenomeBuild::Hg38);
        assert_eq!("macFas5".parse::<GenomeBuild>().unwrap(), GenomeBuild::MacFas5);
        assert_eq!("mm10".parse::<GenomeBuild>().unwrap(), GenomeBuild::Mm10);
        for near_miss in ["MM10", "HG38", " hg19 ", "macfas5"] {
            assert!(near_miss.parse::<GenomeBuild>().is_err(), "{:?} accepted", near_miss);
        }

        let err = "hg20".parse::<GenomeBuild>().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidConfiguration(_))
        ));
        assert!(err.to_string().contains("hg20"));
    }

    #[test]
    fn test_gene_windows() {
        let gene = Gene::new("GATA1", "chrX", 1_000);
        let window = gene.window(500);
        assert_eq!((window.start, window.end), (500, 1_501));

        let clipped = gene.promoter(2_000);
        assert_eq!((clipped.start, clipped.end), (0, 3_001));
    }

    #[test]
    fn test_duplicate_genes_keep_first() {
        let annotation = GeneAnnotation::new(
            GenomeBuild::Hg19,
            vec![
                Gene::new("A", "chr1", 100),
                Gene::new("A", "chr2", 200),
                Gene::new("B", "chr1", 300),
            ],
        );
        assert_eq!(annotation.len(), 2);
        assert_eq!(annotation.get("A").unwrap().chrom, "chr1");
        assert!(annotation.get("C").is_none());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = AnnotationRegistry::new()
            .with_annotation(GeneAnnotation::new(GenomeBuild::Mm10, Vec::new()));
        assert!(registry.get(GenomeBuild::Mm10).is_ok());
        assert!(registry.get(GenomeBuild::Hg38).is_err());
    }

    #[test]
    fn test_promoter_index() {
        let annotation = GeneAnnotation::new(
            GenomeBuild::Hg38,
            vec![Gene::new("A", "chr1", 10_000), Gene::new("B", "chr1", 50_000)],
        );
        let index = annotation.promoter_index(2_000);
        assert!(index.overlaps_any(&Peak::parse("chr1-12000-12001").unwrap()));
        assert!(!index.overlaps_any(&Peak::parse("chr1-12001-12002").unwrap()));
        assert_eq!(index.query(&Peak::parse("chr1-49000-49001").unwrap()), vec![&1]);
    }
}
