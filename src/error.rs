//! Error taxonomy for the enhancer network pipeline.
//!
//! All public operations return `anyhow::Result`; the variants below are what ends up inside
//! the `anyhow::Error` when a run is rejected, so callers can `downcast_ref::<PipelineError>()`
//! to tell a bad configuration from bad input or a failed worker.
//!
//! A gene that yields no valid network is not an error. It is left out of the network
//! collection and logged at debug level.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unsupported genome build or out-of-range knob. Raised before any matrix is touched.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The inputs break a contract the stages rely on (mismatched cell axes, zero-coverage
    /// peaks reaching the co-accessibility scorer, empty gene list, ...).
    #[error("input contract violation: {0}")]
    InputContractViolation(String),

    /// One per-gene work item failed; the whole batch is aborted.
    #[error("worker failed on gene '{gene}': {source}")]
    WorkerFailure {
        gene: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PipelineError {
    pub(crate) fn config(msg: impl Into<String>) -> anyhow::Error {
        PipelineError::InvalidConfiguration(msg.into()).into()
    }

    pub(crate) fn contract(msg: impl Into<String>) -> anyhow::Error {
        PipelineError::InputContractViolation(msg.into()).into()
    }

    pub(crate) fn worker(gene: &str, source: anyhow::Error) -> anyhow::Error {
        PipelineError::WorkerFailure {
            gene: gene.to_string(),
            source: source.into(),
        }
        .into()
    }
}
