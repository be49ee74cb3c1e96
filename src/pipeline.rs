//! End-to-end enhancer network recipe.

use anyhow::Context;
use log::info;
use ndarray::ArrayView2;
use rayon::ThreadPool;
use single_utilities::traits::FloatOpsTS;

use crate::coaccess::{CoaccessEdge, CoaccessEstimator, MetacellCorrelation, score_coaccess};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::genome::{AnnotationRegistry, GeneAnnotation};
use crate::linkage::{
    CorrelationRecord, EnhancerAssignment, link_peaks_to_genes, resolve_genes, select_enhancers,
};
use crate::matrix::FeatureMatrix;
use crate::network::{
    EnhancerNetwork, ModeRow, ModeSummary, NetworkMetrics, build_networks, classify_networks,
    network_metrics,
};
use crate::parallel::worker_pool;

/// Paired single-cell inputs. Both matrices are `features × cells` over the same set of cells;
/// `embedding` is `cells × dims` in the peak matrix's cell order.
pub struct MultiomeInput<'a, T, U> {
    pub peaks: &'a FeatureMatrix<T>,
    pub expression: &'a FeatureMatrix<U>,
    pub embedding: ArrayView2<'a, f64>,
    /// Genes to analyse; `None` means every expressed, annotated gene.
    pub genes: Option<&'a [String]>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub correlations: Vec<CorrelationRecord>,
    pub assignments: Vec<EnhancerAssignment>,
    pub edges: Vec<CoaccessEdge>,
    pub networks: Vec<EnhancerNetwork>,
    pub metrics: Vec<NetworkMetrics>,
    pub modes: Vec<ModeRow>,
}

impl PipelineOutput {
    pub fn mode_summary(&self) -> ModeSummary {
        ModeSummary::from_rows(&self.modes)
    }

    pub fn network(&self, gene: &str) -> Option<&EnhancerNetwork> {
        self.networks
            .binary_search_by(|n| n.gene.as_str().cmp(gene))
            .ok()
            .map(|i| &self.networks[i])
    }
}

pub struct EnhancerPipeline<'a> {
    config: PipelineConfig,
    annotation: &'a GeneAnnotation,
    estimator: Box<dyn CoaccessEstimator>,
    pool: ThreadPool,
}

impl<'a> EnhancerPipeline<'a> {
    /// Validate the configuration and pick the annotation for its genome build. Nothing is
    /// computed if either step fails.
    pub fn new(config: PipelineConfig, registry: &'a AnnotationRegistry) -> anyhow::Result<Self> {
        config.validate()?;
        let annotation = registry
            .get(config.genome)
            .with_context(|| format!("no gene annotation loaded for {}", config.genome))?;
        if annotation.is_empty() {
            return Err(PipelineError::config(format!(
                "gene annotation for {} is empty",
                config.genome
            )));
        }
        let pool = worker_pool(config.workers)?;
        let estimator: Box<dyn CoaccessEstimator> =
            Box::new(MetacellCorrelation::new(config.coaccess_distance));
        Ok(EnhancerPipeline {
            config,
            annotation,
            estimator,
            pool,
        })
    }

    /// Swap in another co-accessibility model.
    pub fn with_estimator(mut self, estimator: Box<dyn CoaccessEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn annotation(&self) -> &GeneAnnotation {
        self.annotation
    }

    pub fn link_peaks<T, U>(
        &self,
        peaks: &FeatureMatrix<T>,
        expression: &FeatureMatrix<U>,
        genes: &[String],
    ) -> anyhow::Result<Vec<CorrelationRecord>>
    where
        T: FloatOpsTS,
        U: FloatOpsTS,
    {
        link_peaks_to_genes(peaks, expression, self.annotation, genes, &self.config, &self.pool)
    }

    pub fn select_nodes(&self, records: &[CorrelationRecord]) -> anyhow::Result<Vec<EnhancerAssignment>> {
        select_enhancers(records, self.annotation, &self.config)
    }

    pub fn score_edges<T>(
        &self,
        peaks: &FeatureMatrix<T>,
        assignments: &[EnhancerAssignment],
        embedding: ArrayView2<f64>,
    ) -> anyhow::Result<Vec<CoaccessEdge>>
    where
        T: FloatOpsTS,
    {
        score_coaccess(
            peaks,
            assignments,
            embedding,
            self.estimator.as_ref(),
            &self.config,
            &self.pool,
        )
    }

    pub fn build_networks(
        &self,
        edges: &[CoaccessEdge],
        assignments: &[EnhancerAssignment],
    ) -> anyhow::Result<Vec<EnhancerNetwork>> {
        build_networks(edges, assignments, self.config.coaccess_cutoff, &self.pool)
    }

    pub fn classify(&self, networks: &[EnhancerNetwork]) -> anyhow::Result<(Vec<NetworkMetrics>, Vec<ModeRow>)> {
        let metrics = network_metrics(networks, &self.pool)?;
        let modes = classify_networks(
            &metrics,
            self.config.size_cutoff,
            self.config.connectivity_cutoff,
            self.config.label_top_n,
        );
        Ok((metrics, modes))
    }

    pub fn run<T, U>(&self, input: &MultiomeInput<'_, T, U>) -> anyhow::Result<PipelineOutput>
    where
        T: FloatOpsTS,
        U: FloatOpsTS,
    {
        if input.embedding.nrows() != input.peaks.n_cells() {
            return Err(PipelineError::contract(format!(
                "embedding has {} cells but the peak matrix has {}",
                input.embedding.nrows(),
                input.peaks.n_cells()
            )));
        }
        // Cell axes are checked before any gene is resolved or tested
        input.expression.cell_order_for(input.peaks.cells())?;

        let genes = resolve_genes(input.genes, input.expression, self.annotation)?;
        info!(
            "Running enhancer networks on {} genes, {} peaks, {} cells ({}, {} workers)",
            genes.len(),
            input.peaks.n_features(),
            input.peaks.n_cells(),
            self.config.genome,
            self.config.workers
        );

        let correlations = self.link_peaks(input.peaks, input.expression, &genes)?;
        let assignments = self.select_nodes(&correlations)?;
        let edges = self.score_edges(input.peaks, &assignments, input.embedding)?;
        let networks = self.build_networks(&edges, &assignments)?;
        let (metrics, modes) = self.classify(&networks)?;

        let output = PipelineOutput {
            correlations,
            assignments,
            edges,
            networks,
            metrics,
            modes,
        };
        let summary = output.mode_summary();
        info!(
            "Classified {} networks: {} complex, {} multiple, {} simple",
            summary.total(),
            summary.complex,
            summary.multiple,
            summary.simple
        );
        Ok(output)
    }
}
