//! Built-in co-accessibility estimator on metacell profiles.

use log::warn;
use rayon::prelude::*;

use super::{CoaccessEdge, CoaccessEstimator, ScoringInput, ensure_covered};
use crate::linkage::correlation::pearson;

/// Pearson correlation between metacell profiles of peaks on the same chromosome whose
/// midpoints are at most `distance` bases apart.
///
/// Pairs where either profile is constant across metacells get no score.
#[derive(Debug, Clone, Copy)]
pub struct MetacellCorrelation {
    pub distance: u64,
}

impl MetacellCorrelation {
    pub fn new(distance: u64) -> Self {
        MetacellCorrelation { distance }
    }
}

impl CoaccessEstimator for MetacellCorrelation {
    fn score(&self, input: &ScoringInput<'_>) -> anyhow::Result<Vec<CoaccessEdge>> {
        ensure_covered(input)?;
        if input.profiles.ncols() < 3 {
            warn!(
                "Only {} metacells available, co-accessibility needs at least 3",
                input.profiles.ncols()
            );
            return Ok(Vec::new());
        }

        // Profiles copied out once so every pair works on contiguous slices
        let profiles: Vec<Vec<f64>> = input
            .profiles
            .rows()
            .into_iter()
            .map(|row| row.to_vec())
            .collect();

        let n = input.peaks.len();
        let edges: Vec<CoaccessEdge> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                let profiles = &profiles;
                ((i + 1)..n).filter_map(move |j| {
                    let within = input.loci[i]
                        .distance(&input.loci[j])
                        .is_some_and(|d| d <= self.distance);
                    if !within {
                        return None;
                    }
                    pearson(&profiles[i], &profiles[j]).map(|r| CoaccessEdge {
                        peak1: input.peaks[i].clone(),
                        peak2: input.peaks[j].clone(),
                        coaccess: r.clamp(-1.0, 1.0),
                    })
                })
            })
            .collect();

        Ok(edges)
    }
}
