//! # single-enhancer
//!
//! Peak-to-gene linkage and enhancer network classification for paired single-cell ATAC-seq and
//! RNA-seq (or gene activity) data, part of the single-rust ecosystem.
//!
//! The crate runs a fixed recipe over a `peaks × cells` accessibility matrix, a `genes × cells`
//! expression matrix and a low-dimensional cell embedding:
//!
//! 1. **Linkage**: correlate every gene with each peak within `TSS ± window_pad` and adjust the
//!    p-values for multiple testing.
//! 2. **Node selection**: keep significant positive links, drop peaks whose summit lies in any
//!    promoter, and assign each peak to its best-correlated gene.
//! 3. **Co-accessibility**: score pairs of selected peaks on metacell profiles.
//! 4. **Networks**: one graph per gene over its assigned peaks and the edges above the cutoff.
//! 5. **Modes**: label each network `Complex`, `Multiple` or `Simple` from size and connectivity.
//!
//! Work is spread over a bounded rayon pool, one gene per work item, and every table comes back
//! in a deterministic order regardless of the worker count.
//!
//! ## Module Organization
//!
//! - **[`genome`]**: peaks, gene annotations, genome builds and the interval index
//! - **[`matrix`]**: named sparse feature-by-cell matrices
//! - **[`linkage`]**: correlation testing, FDR correction and node selection
//! - **[`coaccess`]**: metacells and pluggable co-accessibility estimators
//! - **[`network`]**: enhancer networks, metrics and mode classification
//! - **[`pipeline`]**: [`EnhancerPipeline`] driving all stages
//! - **[`config`]** and **[`error`]**: run configuration and the error taxonomy

pub mod coaccess;
pub mod config;
pub mod error;
pub mod genome;
pub mod linkage;
pub mod matrix;
pub mod network;
pub mod parallel;
pub mod pipeline;

pub use config::{CorrectionMethod, CorrelationMethod, PipelineConfig};
pub use error::PipelineError;
pub use genome::{AnnotationRegistry, Gene, GeneAnnotation, GenomeBuild, Peak};
pub use matrix::FeatureMatrix;
pub use network::{EnhancerNetwork, Mode};
pub use pipeline::{EnhancerPipeline, MultiomeInput, PipelineOutput};
