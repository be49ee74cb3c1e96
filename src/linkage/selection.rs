//! Node selection: turn correlation records into distal enhancer assignments.

use std::collections::HashMap;

use log::info;

use super::correlation::{CorrelationClass, CorrelationRecord};
use crate::config::PipelineConfig;
use crate::genome::{GeneAnnotation, Peak};

/// A peak kept as a distal enhancer candidate of `gene`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancerAssignment {
    pub peak: String,
    pub gene: String,
    pub estimate: f64,
    pub fdr: f64,
}

impl From<&CorrelationRecord> for EnhancerAssignment {
    fn from(record: &CorrelationRecord) -> Self {
        EnhancerAssignment {
            peak: record.peak.clone(),
            gene: record.gene.clone(),
            estimate: record.estimate,
            fdr: record.fdr,
        }
    }
}

/// Keep records with class `Corr`, `estimate > estimate_floor` and `fdr < fdr_ceiling`.
pub fn significant_links<'a>(
    records: &'a [CorrelationRecord],
    estimate_floor: f64,
    fdr_ceiling: f64,
) -> Vec<&'a CorrelationRecord> {
    records
        .iter()
        .filter(|r| {
            r.class == CorrelationClass::Corr && r.estimate > estimate_floor && r.fdr < fdr_ceiling
        })
        .collect()
}

/// Drop records whose peak summit falls in the promoter window of any annotated gene, not only
/// the gene the record links to.
pub fn exclude_promoter_peaks<'a>(
    records: Vec<&'a CorrelationRecord>,
    annotation: &GeneAnnotation,
    promoter_pad: u64,
) -> anyhow::Result<Vec<&'a CorrelationRecord>> {
    let promoters = annotation.promoter_index(promoter_pad);
    if promoters.is_empty() {
        return Ok(records);
    }

    let mut proximal: HashMap<&str, bool> = HashMap::new();
    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        let is_proximal = match proximal.get(record.peak.as_str()) {
            Some(&flag) => flag,
            None => {
                let summit = Peak::parse(&record.peak)?.summit();
                let flag = promoters.overlaps_any(&summit);
                proximal.insert(record.peak.as_str(), flag);
                flag
            }
        };
        if !is_proximal {
            kept.push(record);
        }
    }
    Ok(kept)
}

/// For each peak keep only the records with the highest estimate. Ties keep every tied gene.
pub fn best_gene_per_peak<'a>(records: Vec<&'a CorrelationRecord>) -> Vec<&'a CorrelationRecord> {
    let mut best: HashMap<&str, f64> = HashMap::new();
    for &record in &records {
        best.entry(record.peak.as_str())
            .and_modify(|max| *max = max.max(record.estimate))
            .or_insert(record.estimate);
    }
    records
        .into_iter()
        .filter(|r| best.get(r.peak.as_str()).is_some_and(|&max| r.estimate == max))
        .collect()
}

/// Threshold filter, genome-wide promoter exclusion, then the argmax peak to gene reduction.
/// Output keeps the input order (gene, then peak).
pub fn select_enhancers(
    records: &[CorrelationRecord],
    annotation: &GeneAnnotation,
    config: &PipelineConfig,
) -> anyhow::Result<Vec<EnhancerAssignment>> {
    let significant = significant_links(records, config.estimate_floor, config.fdr_ceiling);
    let n_significant = significant.len();

    let distal = exclude_promoter_peaks(significant, annotation, config.promoter_pad)?;
    let n_distal = distal.len();

    let assignments: Vec<EnhancerAssignment> = best_gene_per_peak(distal)
        .into_iter()
        .map(EnhancerAssignment::from)
        .collect();

    info!(
        "Node selection kept {} significant, {} distal, {} assigned links",
        n_significant,
        n_distal,
        assignments.len()
    );
    Ok(assignments)
}
