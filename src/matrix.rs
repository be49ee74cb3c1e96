//! Feature-by-cell matrices with named axes.

use std::collections::HashMap;

use anyhow::anyhow;
use nalgebra_sparse::CsrMatrix;
use single_utilities::traits::FloatOpsTS;

use crate::error::PipelineError;

/// A sparse `features × cells` matrix (peaks or genes in rows, cells in columns) together with
/// the row and column names.
#[derive(Debug, Clone)]
pub struct FeatureMatrix<T> {
    matrix: CsrMatrix<T>,
    features: Vec<String>,
    cells: Vec<String>,
    feature_lookup: HashMap<String, usize>,
}

impl<T> FeatureMatrix<T>
where
    T: FloatOpsTS,
{
    pub fn new(matrix: CsrMatrix<T>, features: Vec<String>, cells: Vec<String>) -> anyhow::Result<Self> {
        if matrix.nrows() != features.len() {
            return Err(anyhow!(
                "Matrix has {} rows but {} feature names were given",
                matrix.nrows(),
                features.len()
            ));
        }
        if matrix.ncols() != cells.len() {
            return Err(anyhow!(
                "Matrix has {} columns but {} cell names were given",
                matrix.ncols(),
                cells.len()
            ));
        }

        let mut feature_lookup = HashMap::with_capacity(features.len());
        for (i, name) in features.iter().enumerate() {
            if feature_lookup.insert(name.clone(), i).is_some() {
                return Err(anyhow!("Duplicate feature name '{}'", name));
            }
        }

        let mut seen = std::collections::HashSet::with_capacity(cells.len());
        for cell in &cells {
            if !seen.insert(cell.as_str()) {
                return Err(anyhow!("Duplicate cell name '{}'", cell));
            }
        }

        Ok(FeatureMatrix {
            matrix,
            features,
            cells,
            feature_lookup,
        })
    }

    pub fn matrix(&self) -> &CsrMatrix<T> {
        &self.matrix
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_lookup.get(name).copied()
    }

    /// Row `row` densified into cell order.
    pub fn dense_row(&self, row: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_cells()];
        let lane = self.matrix.row(row);
        for (&col, value) in lane.col_indices().iter().zip(lane.values()) {
            dense[col] = num_traits::ToPrimitive::to_f64(value).unwrap_or(0.0);
        }
        dense
    }

    /// Row `row` densified and reordered so position `i` holds the value of cell `order[i]`.
    pub fn dense_row_ordered(&self, row: usize, order: &[usize]) -> Vec<f64> {
        let dense = self.dense_row(row);
        order.iter().map(|&col| dense[col]).collect()
    }

    /// Row `row` with every non-zero entry set to 1.
    pub fn binarized_row(&self, row: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_cells()];
        let lane = self.matrix.row(row);
        for (&col, value) in lane.col_indices().iter().zip(lane.values()) {
            if num_traits::ToPrimitive::to_f64(value).is_some_and(|v| v != 0.0) {
                dense[col] = 1.0;
            }
        }
        dense
    }

    /// Column positions in `self` for each cell of `cells`, in that order.
    ///
    /// Both matrices must describe the same set of cells; a different set is an input contract
    /// violation, a different order is fine.
    pub fn cell_order_for(&self, cells: &[String]) -> anyhow::Result<Vec<usize>> {
        if cells.len() != self.n_cells() {
            return Err(PipelineError::contract(format!(
                "cell axes differ in length: {} vs {}",
                cells.len(),
                self.n_cells()
            )));
        }

        let positions: HashMap<&str, usize> = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, cell)| (cell.as_str(), i))
            .collect();

        cells
            .iter()
            .map(|cell| {
                positions.get(cell.as_str()).copied().ok_or_else(|| {
                    PipelineError::contract(format!(
                        "cell '{}' is missing from one of the matrices",
                        cell
                    ))
                })
            })
            .collect()
    }
}
