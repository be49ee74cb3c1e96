//! Network size and connectivity, and the regulatory mode derived from them.

use std::cmp::Ordering;
use std::fmt;

use rayon::ThreadPool;

use super::EnhancerNetwork;
use crate::parallel::map_by_gene;

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkMetrics {
    pub gene: String,
    /// Node count.
    pub size: usize,
    /// Mean degree, see [`EnhancerNetwork::connectivity`].
    pub connectivity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Large and densely connected.
    Complex,
    /// Large but sparsely connected.
    Multiple,
    /// At most `size_cutoff` enhancers.
    Simple,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Complex => "Complex",
            Mode::Multiple => "Multiple",
            Mode::Simple => "Simple",
        };
        f.write_str(name)
    }
}

/// Regulatory mode of a network.
///
/// Size is compared on the log2 scale: `log2(size) > log2(size_cutoff)` is required for
/// `Complex` or `Multiple`, so a network of exactly `size_cutoff` nodes is `Simple`. Above the
/// size gate, `connectivity >= connectivity_cutoff` is `Complex`, anything lower `Multiple`.
pub fn classify_mode(size: usize, connectivity: f64, size_cutoff: usize, connectivity_cutoff: f64) -> Mode {
    let log_size = (size as f64).log2();
    let log_cutoff = (size_cutoff as f64).log2();
    if log_size <= log_cutoff {
        Mode::Simple
    } else if connectivity >= connectivity_cutoff {
        Mode::Complex
    } else {
        Mode::Multiple
    }
}

/// Size and connectivity of every network, sorted by gene.
pub fn network_metrics(networks: &[EnhancerNetwork], pool: &ThreadPool) -> anyhow::Result<Vec<NetworkMetrics>> {
    let by_gene: std::collections::HashMap<&str, &EnhancerNetwork> =
        networks.iter().map(|n| (n.gene.as_str(), n)).collect();
    let genes: Vec<&str> = networks.iter().map(|n| n.gene.as_str()).collect();

    let metrics = map_by_gene(pool, &genes, |gene| {
        let network = by_gene
            .get(gene)
            .ok_or_else(|| anyhow::anyhow!("network disappeared while computing metrics"))?;
        Ok(NetworkMetrics {
            gene: gene.to_string(),
            size: network.size(),
            connectivity: network.connectivity(),
        })
    })?;

    Ok(metrics.into_iter().map(|(_, m)| m).collect())
}

/// One row of the mode table.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeRow {
    pub gene: String,
    pub size: usize,
    pub log2_size: f64,
    pub connectivity: f64,
    pub mode: Mode,
    /// Gene name for the top-ranked rows, `None` for the rest.
    pub label: Option<String>,
}

/// Classify every network and rank the rows by descending connectivity (ties by gene name).
/// The first `label_top_n` rows carry their gene name as a display label.
pub fn classify_networks(
    metrics: &[NetworkMetrics],
    size_cutoff: usize,
    connectivity_cutoff: f64,
    label_top_n: usize,
) -> Vec<ModeRow> {
    let mut rows: Vec<ModeRow> = metrics
        .iter()
        .map(|m| ModeRow {
            gene: m.gene.clone(),
            size: m.size,
            log2_size: (m.size as f64).log2(),
            connectivity: m.connectivity,
            mode: classify_mode(m.size, m.connectivity, size_cutoff, connectivity_cutoff),
            label: None,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.connectivity
            .partial_cmp(&a.connectivity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.gene.cmp(&b.gene))
    });
    for row in rows.iter_mut().take(label_top_n) {
        row.label = Some(row.gene.clone());
    }
    rows
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeSummary {
    pub complex: usize,
    pub multiple: usize,
    pub simple: usize,
}

impl ModeSummary {
    pub fn from_rows(rows: &[ModeRow]) -> Self {
        rows.iter().fold(ModeSummary::default(), |mut acc, row| {
            match row.mode {
                Mode::Complex => acc.complex += 1,
                Mode::Multiple => acc.multiple += 1,
                Mode::Simple => acc.simple += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.complex + self.multiple + self.simple
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkEdge;
    use crate::parallel::worker_pool;

    fn metrics(gene: &str, size: usize, connectivity: f64) -> NetworkMetrics {
        NetworkMetrics {
            gene: gene.to_string(),
            size,
            connectivity,
        }
    }

    #[test]
    fn test_mode_scenarios() {
        assert_eq!(classify_mode(10, 1.5, 5, 1.0), Mode::Complex);
        assert_eq!(classify_mode(10, 0.5, 5, 1.0), Mode::Multiple);
        assert_eq!(classify_mode(3, 5.0, 5, 1.0), Mode::Simple);
    }

    #[test]
    fn test_mode_boundaries() {
        assert_eq!(classify_mode(5, 10.0, 5, 1.0), Mode::Simple);
        assert_eq!(classify_mode(6, 1.0, 5, 1.0), Mode::Complex);
        assert_eq!(classify_mode(6, 0.999, 5, 1.0), Mode::Multiple);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let input = vec![metrics("A", 10, 1.5), metrics("B", 10, 0.5), metrics("C", 3, 5.0)];
        let first = classify_networks(&input, 5, 1.0, 20);
        let second = classify_networks(&input, 5, 1.0, 20);
        assert_eq!(first, second);
    }

    #[test]
    fn test_ranking_and_labels() {
        let input: Vec<NetworkMetrics> = (0..25)
            .map(|i| metrics(&format!("G{:02}", i), 6, (i % 5) as f64))
            .collect();
        let rows = classify_networks(&input, 5, 1.0, 20);
        assert_eq!(rows.len(), 25);
        assert!(rows.windows(2).all(|w| w[0].connectivity >= w[1].connectivity));
        assert_eq!(rows[0].gene, "G04");
        assert_eq!(rows[1].gene, "G09");
        assert_eq!(rows.iter().filter(|r| r.label.is_some()).count(), 20);
        assert!(rows[..20].iter().all(|r| r.label.as_deref() == Some(r.gene.as_str())));
        assert!(rows[20..].iter().all(|r| r.label.is_none()));

        let summary = ModeSummary::from_rows(&rows);
        assert_eq!(summary.total(), 25);
        assert_eq!(summary.multiple, 5);
        assert_eq!(summary.complex, 20);
    }

    #[test]
    fn test_metrics_match_networks() {
        let networks = vec![
            EnhancerNetwork {
                gene: "B".to_string(),
                nodes: vec!["p1".into(), "p2".into()],
                edges: vec![NetworkEdge { source: 0, target: 1, coaccess: 0.4 }],
            },
            EnhancerNetwork {
                gene: "A".to_string(),
                nodes: vec!["p3".into(), "p4".into(), "p5".into()],
                edges: Vec::new(),
            },
        ];
        let pool = worker_pool(2).unwrap();
        let result = network_metrics(&networks, &pool).unwrap();
        assert_eq!(result, vec![metrics("A", 3, 0.0), metrics("B", 2, 1.0)]);
    }
}
