//! Metacells: groups of `k` neighbouring cells in embedding space, aggregated into pseudo-bulk
//! accessibility profiles.

use std::cmp::Ordering;

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::error::PipelineError;

/// The `k` cells closest to `cell` (itself included), sorted by cell index.
/// Equal distances are broken by the lower cell index.
pub fn nearest_neighbors(embedding: ArrayView2<f64>, cell: usize, k: usize) -> Vec<usize> {
    let origin = embedding.row(cell);
    let mut distances: Vec<(f64, usize)> = embedding
        .rows()
        .into_iter()
        .enumerate()
        .map(|(j, row)| {
            let d: f64 = row
                .iter()
                .zip(origin.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            (d, j)
        })
        .collect();

    if k == 0 {
        return Vec::new();
    }
    let by_distance = |a: &(f64, usize), b: &(f64, usize)| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then(a.1.cmp(&b.1))
    };
    // Partition out the k nearest, the rest is never ordered
    if k < distances.len() {
        distances.select_nth_unstable_by(k - 1, by_distance);
        distances.truncate(k);
    }
    let mut members: Vec<usize> = distances.into_iter().map(|(_, j)| j).collect();
    members.sort_unstable();
    members
}

fn shared_members(a: &[usize], b: &[usize]) -> usize {
    let (mut i, mut j, mut shared) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
        }
    }
    shared
}

/// Build metacells from a `cells × dims` embedding.
///
/// Every cell seeds a candidate neighbourhood of size `k`; candidates are accepted in cell order
/// unless they share more than `max_overlap * k` cells with an accepted metacell. Identical
/// neighbourhoods are never accepted twice.
pub fn build_metacells(
    embedding: ArrayView2<f64>,
    k: usize,
    max_overlap: f64,
) -> anyhow::Result<Vec<Vec<usize>>> {
    let n_cells = embedding.nrows();
    if embedding.ncols() == 0 {
        return Err(PipelineError::contract("cell embedding has no dimensions"));
    }
    if k == 0 || k > n_cells {
        return Err(PipelineError::contract(format!(
            "metacell size k={} must be between 1 and the number of cells ({})",
            k, n_cells
        )));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::contract("cell embedding contains non-finite values"));
    }

    let candidates: Vec<Vec<usize>> = (0..n_cells)
        .into_par_iter()
        .map(|cell| nearest_neighbors(embedding, cell, k))
        .collect();

    let max_shared = (max_overlap * k as f64).floor() as usize;
    let mut accepted: Vec<Vec<usize>> = Vec::new();
    for candidate in candidates {
        let admissible = accepted.iter().all(|existing| {
            let shared = shared_members(existing, &candidate);
            shared <= max_shared && shared < k
        });
        if admissible {
            accepted.push(candidate);
        }
    }
    Ok(accepted)
}

/// Mean of each feature row over the members of every metacell, `features × metacells`.
pub fn aggregate_profiles(rows: &[Vec<f64>], metacells: &[Vec<usize>]) -> Array2<f64> {
    let mut profiles = Array2::zeros((rows.len(), metacells.len()));
    for (f, row) in rows.iter().enumerate() {
        for (m, members) in metacells.iter().enumerate() {
            let sum: f64 = members.iter().map(|&cell| row[cell]).sum();
            profiles[[f, m]] = sum / members.len() as f64;
        }
    }
    profiles
}
