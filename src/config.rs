//! Run configuration. Every knob has a default and is checked by [`PipelineConfig::validate`]
//! before any input is touched.

use crate::error::PipelineError;
use crate::genome::GenomeBuild;

/// Upper bound on the worker pool size.
pub const MAX_WORKERS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationMethod {
    Pearson,
    /// Pearson correlation of average ranks.
    Spearman,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionMethod {
    BenjaminiHochberg,
    Bonferroni,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub genome: GenomeBuild,
    /// Padding around each TSS within which peaks are tested against the gene (bp).
    pub window_pad: u64,
    /// Padding around each TSS that defines the promoter exclusion zone (bp).
    pub promoter_pad: u64,
    /// Correlation estimates must be strictly above this.
    pub estimate_floor: f64,
    /// Adjusted p-values must be strictly below this.
    pub fdr_ceiling: f64,
    /// Co-accessibility scores at or above this become network edges.
    pub coaccess_cutoff: f64,
    /// Cells per metacell.
    pub metacell_k: usize,
    /// Largest fraction of cells two metacells may share.
    pub metacell_max_overlap: f64,
    /// Peaks further apart than this (midpoint to midpoint) are never scored.
    pub coaccess_distance: u64,
    pub size_cutoff: usize,
    pub connectivity_cutoff: f64,
    /// Number of top-ranked genes that receive a display label.
    pub label_top_n: usize,
    pub workers: usize,
    pub correlation_method: CorrelationMethod,
    pub correction_method: CorrectionMethod,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(8);

        PipelineConfig {
            genome: GenomeBuild::Hg38,
            window_pad: 500_000,
            promoter_pad: 2_000,
            estimate_floor: 0.0,
            fdr_ceiling: 0.05,
            coaccess_cutoff: 0.25,
            metacell_k: 50,
            metacell_max_overlap: 0.9,
            coaccess_distance: 500_000,
            size_cutoff: 5,
            connectivity_cutoff: 1.0,
            label_top_n: 20,
            workers,
            correlation_method: CorrelationMethod::Pearson,
            correction_method: CorrectionMethod::BenjaminiHochberg,
        }
    }
}

impl PipelineConfig {
    pub fn new(genome: GenomeBuild) -> Self {
        PipelineConfig {
            genome,
            ..Default::default()
        }
    }

    /// Parse the genome name first so an unsupported build is rejected up front.
    pub fn for_genome(genome: &str) -> anyhow::Result<Self> {
        Ok(Self::new(genome.parse()?))
    }

    pub fn with_window_pad(mut self, pad: u64) -> Self {
        self.window_pad = pad;
        self
    }

    pub fn with_promoter_pad(mut self, pad: u64) -> Self {
        self.promoter_pad = pad;
        self
    }

    pub fn with_correlation_thresholds(mut self, estimate_floor: f64, fdr_ceiling: f64) -> Self {
        self.estimate_floor = estimate_floor;
        self.fdr_ceiling = fdr_ceiling;
        self
    }

    pub fn with_coaccess_cutoff(mut self, cutoff: f64) -> Self {
        self.coaccess_cutoff = cutoff;
        self
    }

    pub fn with_metacells(mut self, k: usize, max_overlap: f64) -> Self {
        self.metacell_k = k;
        self.metacell_max_overlap = max_overlap;
        self
    }

    pub fn with_coaccess_distance(mut self, distance: u64) -> Self {
        self.coaccess_distance = distance;
        self
    }

    pub fn with_mode_cutoffs(mut self, size_cutoff: usize, connectivity_cutoff: f64) -> Self {
        self.size_cutoff = size_cutoff;
        self.connectivity_cutoff = connectivity_cutoff;
        self
    }

    pub fn with_label_top_n(mut self, n: usize) -> Self {
        self.label_top_n = n;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_correlation_method(mut self, method: CorrelationMethod) -> Self {
        self.correlation_method = method;
        self
    }

    pub fn with_correction_method(mut self, method: CorrectionMethod) -> Self {
        self.correction_method = method;
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window_pad == 0 {
            return Err(PipelineError::config("window_pad must be positive"));
        }
        if self.promoter_pad == 0 {
            return Err(PipelineError::config("promoter_pad must be positive"));
        }
        if !(-1.0..1.0).contains(&self.estimate_floor) {
            return Err(PipelineError::config(format!(
                "estimate_floor must be in [-1, 1), got {}",
                self.estimate_floor
            )));
        }
        if !(self.fdr_ceiling > 0.0 && self.fdr_ceiling <= 1.0) {
            return Err(PipelineError::config(format!(
                "fdr_ceiling must be in (0, 1], got {}",
                self.fdr_ceiling
            )));
        }
        if !(-1.0..=1.0).contains(&self.coaccess_cutoff) {
            return Err(PipelineError::config(format!(
                "coaccess_cutoff must be in [-1, 1], got {}",
                self.coaccess_cutoff
            )));
        }
        if self.metacell_k == 0 {
            return Err(PipelineError::config("metacell_k must be positive"));
        }
        if !(self.metacell_max_overlap > 0.0 && self.metacell_max_overlap <= 1.0) {
            return Err(PipelineError::config(format!(
                "metacell_max_overlap must be in (0, 1], got {}",
                self.metacell_max_overlap
            )));
        }
        if self.coaccess_distance == 0 {
            return Err(PipelineError::config("coaccess_distance must be positive"));
        }
        if self.size_cutoff == 0 {
            return Err(PipelineError::config("size_cutoff must be positive"));
        }
        if !(self.connectivity_cutoff.is_finite() && self.connectivity_cutoff >= 0.0) {
            return Err(PipelineError::config(format!(
                "connectivity_cutoff must be a non-negative number, got {}",
                self.connectivity_cutoff
            )));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(PipelineError::config(format!(
                "workers must be between 1 and {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        Ok(())
    }
}
