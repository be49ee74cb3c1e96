//! Peak-gene linkage: correlation testing, multiple testing correction and node selection.
//!
//! - **[`correlation`]**: per-gene correlation of expression against every peak in the TSS window
//! - **[`correction`]**: FDR adjustment over all tested pairs
//! - **[`selection`]**: thresholding, promoter exclusion and the one-gene-per-peak reduction

pub mod correction;
pub mod correlation;
pub mod selection;

pub use correlation::{
    CorrelationClass, CorrelationRecord, CorrelationTest, correlation_test, link_peaks_to_genes,
    resolve_genes,
};
pub use selection::{EnhancerAssignment, select_enhancers};
