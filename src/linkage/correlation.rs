//! Peak-gene correlation testing.
//!
//! For every gene, each peak overlapping `TSS ± window_pad` is correlated with the gene's
//! expression across cells. One [`CorrelationRecord`] is emitted per tested pair and the
//! p-values of the testable pairs are adjusted for multiple testing all at once.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use log::{info, warn};
use rayon::ThreadPool;
use single_utilities::traits::FloatOpsTS;
use statrs::distribution::{ContinuousCDF, StudentsT};

use super::correction::adjust_p_values;
use crate::config::{CorrelationMethod, PipelineConfig};
use crate::error::PipelineError;
use crate::genome::{GeneAnnotation, IntervalIndex, Peak};
use crate::matrix::FeatureMatrix;
use crate::parallel::map_by_gene;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationClass {
    /// Non-negative estimate from a valid test.
    Corr,
    /// Negative estimate from a valid test.
    AntiCorr,
    /// One of the vectors is constant, or there are fewer than three cells.
    Untestable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationTest {
    pub estimate: f64,
    pub p_value: f64,
    pub class: CorrelationClass,
}

impl CorrelationTest {
    fn untestable() -> Self {
        CorrelationTest {
            estimate: 0.0,
            p_value: 1.0,
            class: CorrelationClass::Untestable,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationRecord {
    pub peak: String,
    pub gene: String,
    pub estimate: f64,
    pub p_value: f64,
    /// Adjusted p-value across all tested pairs, 1 for `Untestable` pairs.
    pub fdr: f64,
    pub class: CorrelationClass,
}

/// Correlate two equally long vectors and test the estimate against zero (two-sided,
/// Student's t with `n - 2` degrees of freedom).
pub fn correlation_test(x: &[f64], y: &[f64], method: CorrelationMethod) -> anyhow::Result<CorrelationTest> {
    if x.len() != y.len() {
        return Err(PipelineError::contract(format!(
            "correlation vectors differ in length: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < 3 {
        return Ok(CorrelationTest::untestable());
    }

    let estimate = match method {
        CorrelationMethod::Pearson => pearson(x, y),
        CorrelationMethod::Spearman => pearson(&average_ranks(x), &average_ranks(y)),
    };
    let estimate = match estimate {
        Some(r) => r.clamp(-1.0, 1.0),
        None => return Ok(CorrelationTest::untestable()),
    };

    let p_value = correlation_p_value(estimate, (n - 2) as f64);
    let class = if estimate < 0.0 {
        CorrelationClass::AntiCorr
    } else {
        CorrelationClass::Corr
    };

    Ok(CorrelationTest {
        estimate,
        p_value,
        class,
    })
}

/// Pearson's r, `None` when either vector has zero variance.
pub(crate) fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    if n == 0.0 {
        return None;
    }
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some(cov / denom)
}

/// 1-based ranks, ties get the average of the ranks they span.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len() && values[order[j]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j - 1) as f64 / 2.0 + 1.0;
        for &idx in &order[i..j] {
            ranks[idx] = rank;
        }
        i = j;
    }
    ranks
}

fn correlation_p_value(r: f64, df: f64) -> f64 {
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    let t_stat = r * (df / denom).sqrt();
    if !t_stat.is_finite() {
        return 0.0;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => (2.0 * t_dist.sf(t_stat.abs())).min(1.0),
        Err(_) => 1.0,
    }
}

/// Genes to analyse: the requested list (or every expressed gene) restricted to genes that are
/// both annotated and present in the expression matrix, sorted and deduplicated.
pub fn resolve_genes<T>(
    requested: Option<&[String]>,
    expression: &FeatureMatrix<T>,
    annotation: &GeneAnnotation,
) -> anyhow::Result<Vec<String>>
where
    T: FloatOpsTS,
{
    let candidates: BTreeSet<&str> = match requested {
        Some(genes) => genes.iter().map(String::as_str).collect(),
        None => expression.features().iter().map(String::as_str).collect(),
    };
    if candidates.is_empty() {
        return Err(PipelineError::contract("gene list is empty"));
    }

    let mut resolved = Vec::with_capacity(candidates.len());
    let mut missing = 0usize;
    for gene in candidates {
        if annotation.get(gene).is_some() && expression.feature_index(gene).is_some() {
            resolved.push(gene.to_string());
        } else {
            missing += 1;
        }
    }
    if missing > 0 {
        warn!(
            "{} genes are missing from the {} annotation or the expression matrix and are skipped",
            missing,
            annotation.build()
        );
    }
    if resolved.is_empty() {
        return Err(PipelineError::contract(
            "none of the requested genes is both annotated and expressed",
        ));
    }
    Ok(resolved)
}

/// Index the peak matrix rows by genomic location. Every row name must be a peak identifier.
pub fn index_peaks<T>(peaks: &FeatureMatrix<T>) -> anyhow::Result<IntervalIndex<usize>>
where
    T: FloatOpsTS,
{
    let loci = peaks
        .features()
        .iter()
        .enumerate()
        .map(|(row, id)| {
            Peak::parse(id)
                .map(|peak| (peak, row))
                .map_err(|e| PipelineError::contract(format!("peak row {}: {}", row, e)))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(IntervalIndex::from_intervals(loci))
}

/// Test every (peak, gene) pair with the peak inside the gene's window.
///
/// Records come back ordered by gene, then peak identifier, independent of the worker count.
pub fn link_peaks_to_genes<T, U>(
    peaks: &FeatureMatrix<T>,
    expression: &FeatureMatrix<U>,
    annotation: &GeneAnnotation,
    genes: &[String],
    config: &PipelineConfig,
    pool: &ThreadPool,
) -> anyhow::Result<Vec<CorrelationRecord>>
where
    T: FloatOpsTS,
    U: FloatOpsTS,
{
    if genes.is_empty() {
        return Err(PipelineError::contract("gene list is empty"));
    }
    // Expression columns reordered into the peak matrix's cell order
    let cell_order = expression.cell_order_for(peaks.cells())?;
    let peak_index = index_peaks(peaks)?;

    let per_gene = map_by_gene(pool, genes, |gene| {
        let locus = annotation
            .get(gene)
            .ok_or_else(|| anyhow::anyhow!("gene is not in the {} annotation", annotation.build()))?;
        let row = expression
            .feature_index(gene)
            .ok_or_else(|| anyhow::anyhow!("gene is not in the expression matrix"))?;

        let mut rows: Vec<usize> = peak_index
            .query(&locus.window(config.window_pad))
            .into_iter()
            .copied()
            .collect();
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        rows.sort_by(|&a, &b| peaks.features()[a].cmp(&peaks.features()[b]));

        let gene_values = expression.dense_row_ordered(row, &cell_order);
        rows.into_iter()
            .map(|peak_row| {
                let test = correlation_test(
                    &peaks.dense_row(peak_row),
                    &gene_values,
                    config.correlation_method,
                )?;
                Ok(CorrelationRecord {
                    peak: peaks.features()[peak_row].clone(),
                    gene: gene.to_string(),
                    estimate: test.estimate,
                    p_value: test.p_value,
                    fdr: test.p_value,
                    class: test.class,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()
    })?;

    let mut records: Vec<CorrelationRecord> = per_gene
        .into_iter()
        .flat_map(|(_, records)| records)
        .collect();

    // Untestable pairs were never tested and do not count towards the correction
    let tested: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.class != CorrelationClass::Untestable)
        .map(|(i, _)| i)
        .collect();
    let p_values: Vec<f64> = tested.iter().map(|&i| records[i].p_value).collect();
    let adjusted = adjust_p_values(&p_values, config.correction_method)?;
    for record in records.iter_mut() {
        record.fdr = 1.0;
    }
    for (&i, fdr) in tested.iter().zip(adjusted) {
        records[i].fdr = fdr;
    }

    info!(
        "Tested {} of {} peak-gene pairs across {} genes",
        tested.len(),
        records.len(),
        genes.len()
    );
    Ok(records)
}
