//! Multiple testing correction of peak-gene p-values.

use anyhow::{Result, anyhow};
use std::cmp::Ordering;

use crate::config::CorrectionMethod;

/// Multiple testing correction over all tested peak-gene pairs.
///
/// An empty set of tests is legal here (no gene had a peak in its window) and yields an empty
/// vector; the individual procedures below reject it.
pub fn adjust_p_values(p_values: &[f64], method: CorrectionMethod) -> Result<Vec<f64>> {
    if p_values.is_empty() {
        return Ok(Vec::new());
    }
    match method {
        CorrectionMethod::BenjaminiHochberg => benjamini_hochberg_correction(p_values),
        CorrectionMethod::Bonferroni => bonferroni_correction(p_values),
    }
}

fn validate_p_values(p_values: &[f64]) -> Result<()> {
    if p_values.is_empty() {
        return Err(anyhow!("Empty p-value array"));
    }
    for (i, &p) in p_values.iter().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(anyhow!("Invalid p-value at index {}: {}", i, p));
        }
    }
    Ok(())
}

/// Bonferroni: multiply each p-value by the number of tests, capped at 1.
pub fn bonferroni_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len() as f64;
    Ok(p_values.iter().map(|&p| (p * n).min(1.0)).collect())
}

/// Benjamini-Hochberg step-up procedure controlling the false discovery rate.
pub fn benjamini_hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();

    let mut indexed_p_values: Vec<(usize, f64)> =
        p_values.iter().enumerate().map(|(i, &p)| (i, p)).collect();
    indexed_p_values.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let mut adjusted_p_values = vec![0.0; n];
    let mut current_min = 1.0;

    // Largest p-value first, carrying the running minimum down
    for i in (0..n).rev() {
        let (orig_idx, p_val) = indexed_p_values[i];
        let rank = i + 1;

        let adjustment = (p_val * n as f64 / rank as f64).min(1.0);
        current_min = adjustment.min(current_min);
        adjusted_p_values[orig_idx] = current_min;
    }

    Ok(adjusted_p_values)
}
