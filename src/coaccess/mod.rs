//! Co-accessibility scoring between the peaks kept by node selection.
//!
//! Accessibility is binarized, aggregated into metacells built from the cell embedding, and the
//! resulting `peaks × metacells` profiles are handed to a [`CoaccessEstimator`]. The estimator
//! is pluggable; [`MetacellCorrelation`] is the built-in one.

use std::collections::BTreeSet;

use anyhow::Context;
use log::{info, warn};
use ndarray::ArrayView2;
use rayon::ThreadPool;
use single_utilities::traits::FloatOpsTS;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::genome::Peak;
use crate::linkage::EnhancerAssignment;
use crate::matrix::FeatureMatrix;

pub mod estimator;
pub mod metacell;

pub use estimator::MetacellCorrelation;
pub use metacell::{aggregate_profiles, build_metacells};

/// Symmetric co-accessibility score between two peaks. `peak1 < peak2` for edges produced here.
#[derive(Debug, Clone, PartialEq)]
pub struct CoaccessEdge {
    pub peak1: String,
    pub peak2: String,
    pub coaccess: f64,
}

/// What an estimator gets to see: peak names, their loci and one profile row per peak.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub peaks: &'a [String],
    pub loci: &'a [Peak],
    pub profiles: ArrayView2<'a, f64>,
}

/// A peak covariance model scoring pairs of peaks from metacell profiles.
///
/// Implementations decide which pairs are scored (typically a genomic distance window) and must
/// reject profiles with zero coverage, see [`ensure_covered`].
pub trait CoaccessEstimator: Send + Sync {
    fn score(&self, input: &ScoringInput<'_>) -> anyhow::Result<Vec<CoaccessEdge>>;
}

/// Fail if any profile row is all zeros; a zero-variance feature leaves the covariance undefined.
pub fn ensure_covered(input: &ScoringInput<'_>) -> anyhow::Result<()> {
    if input.peaks.len() != input.profiles.nrows() || input.loci.len() != input.profiles.nrows() {
        return Err(PipelineError::contract(format!(
            "scoring input has {} peaks, {} loci and {} profile rows",
            input.peaks.len(),
            input.loci.len(),
            input.profiles.nrows()
        )));
    }
    for (row, profile) in input.profiles.rows().into_iter().enumerate() {
        if profile.iter().all(|&v| v == 0.0) {
            return Err(PipelineError::contract(format!(
                "peak '{}' has zero coverage and cannot be scored",
                input.peaks[row]
            )));
        }
    }
    Ok(())
}

/// Score co-accessibility for the union of all assigned peaks.
///
/// `embedding` is `cells × dims` in the peak matrix's cell order. Peaks without any reads, or
/// whose reads fall only in cells outside every metacell, are dropped with a warning before the
/// estimator runs. Edges come back sorted by `(peak1, peak2)`.
pub fn score_coaccess<T>(
    peaks: &FeatureMatrix<T>,
    assignments: &[EnhancerAssignment],
    embedding: ArrayView2<f64>,
    estimator: &dyn CoaccessEstimator,
    config: &PipelineConfig,
    pool: &ThreadPool,
) -> anyhow::Result<Vec<CoaccessEdge>>
where
    T: FloatOpsTS,
{
    if embedding.nrows() != peaks.n_cells() {
        return Err(PipelineError::contract(format!(
            "embedding has {} cells but the peak matrix has {}",
            embedding.nrows(),
            peaks.n_cells()
        )));
    }

    let union: BTreeSet<&str> = assignments.iter().map(|a| a.peak.as_str()).collect();
    let mut ids = Vec::with_capacity(union.len());
    let mut rows = Vec::with_capacity(union.len());
    let mut uncovered = 0usize;
    for id in union {
        let row = peaks.feature_index(id).ok_or_else(|| {
            PipelineError::contract(format!("assigned peak '{}' is not in the peak matrix", id))
        })?;
        let binary = peaks.binarized_row(row);
        if binary.iter().all(|&v| v == 0.0) {
            uncovered += 1;
            continue;
        }
        ids.push(id.to_string());
        rows.push(binary);
    }
    if uncovered > 0 {
        warn!("Dropped {} zero-coverage peaks before co-accessibility scoring", uncovered);
    }
    if ids.len() < 2 {
        info!("Fewer than two peaks to score, no co-accessibility edges");
        return Ok(Vec::new());
    }

    let mut edges = pool.install(|| -> anyhow::Result<Vec<CoaccessEdge>> {
        let metacells = build_metacells(embedding, config.metacell_k, config.metacell_max_overlap)?;
        let profiles = aggregate_profiles(&rows, &metacells);

        // Keep only rows some metacell actually saw
        let keep: Vec<usize> = profiles
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|&v| v != 0.0))
            .map(|(i, _)| i)
            .collect();
        if keep.len() < ids.len() {
            warn!(
                "Dropped {} peaks not covered by any of the {} metacells",
                ids.len() - keep.len(),
                metacells.len()
            );
        }
        let kept_ids: Vec<String> = keep.iter().map(|&i| ids[i].clone()).collect();
        let loci = kept_ids
            .iter()
            .map(|id| Peak::parse(id).with_context(|| format!("assigned peak '{}'", id)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let profiles = profiles.select(ndarray::Axis(0), &keep);

        info!(
            "Scoring co-accessibility for {} peaks over {} metacells",
            kept_ids.len(),
            metacells.len()
        );
        estimator.score(&ScoringInput {
            peaks: &kept_ids,
            loci: &loci,
            profiles: profiles.view(),
        })
    })?;

    edges.sort_by(|a, b| (&a.peak1, &a.peak2).cmp(&(&b.peak1, &b.peak2)));
    info!("Scored {} co-accessibility edges", edges.len());
    Ok(edges)
}
