//! Per-gene enhancer networks.
//!
//! Nodes are the peaks assigned to a gene, edges are co-accessibility scores at or above the
//! cutoff between two of those nodes. Genes with fewer than two assigned peaks have no network
//! and are left out of the collection.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info};
use rayon::ThreadPool;

use crate::coaccess::CoaccessEdge;
use crate::linkage::EnhancerAssignment;
use crate::parallel::map_by_gene;

pub mod metrics;

pub use metrics::{Mode, ModeRow, ModeSummary, NetworkMetrics, classify_mode, classify_networks, network_metrics};

/// An undirected edge between `nodes[source]` and `nodes[target]`, `source < target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkEdge {
    pub source: usize,
    pub target: usize,
    pub coaccess: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnhancerNetwork {
    pub gene: String,
    /// Peak identifiers, sorted.
    pub nodes: Vec<String>,
    /// Sorted by `(source, target)`, no duplicates and no self loops.
    pub edges: Vec<NetworkEdge>,
}

impl EnhancerNetwork {
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// Mean degree, `2E / N`. Zero for an edgeless network and strictly increasing with the
    /// number of edges at a fixed node count.
    pub fn connectivity(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        2.0 * self.edges.len() as f64 / self.nodes.len() as f64
    }

    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.nodes.len()];
        for edge in &self.edges {
            degrees[edge.source] += 1;
            degrees[edge.target] += 1;
        }
        degrees
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        let (Ok(i), Ok(j)) = (
            self.nodes.binary_search_by(|n| n.as_str().cmp(a)),
            self.nodes.binary_search_by(|n| n.as_str().cmp(b)),
        ) else {
            return false;
        };
        let (source, target) = (i.min(j), i.max(j));
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target)
    }
}

/// Edges with `coaccess >= cutoff`, self loops removed.
pub fn filter_edges(edges: &[CoaccessEdge], cutoff: f64) -> Vec<&CoaccessEdge> {
    edges
        .iter()
        .filter(|e| e.coaccess >= cutoff && e.peak1 != e.peak2)
        .collect()
}

/// Build a network for `gene` from its assigned peaks and the pre-filtered edge adjacency.
/// Returns `None` when fewer than two nodes are assigned.
fn assemble_network(
    gene: &str,
    nodes: &BTreeSet<&str>,
    adjacency: &HashMap<&str, Vec<(&str, f64)>>,
) -> Option<EnhancerNetwork> {
    if nodes.len() < 2 {
        return None;
    }
    let nodes: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
    let position: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();

    // Duplicate (a, b) / (b, a) rows collapse to one edge with the highest score
    let mut unique: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (i, node) in nodes.iter().enumerate() {
        let Some(neighbours) = adjacency.get(node.as_str()) else {
            continue;
        };
        for &(other, coaccess) in neighbours {
            let Some(&j) = position.get(other) else {
                continue;
            };
            if j <= i {
                continue;
            }
            unique
                .entry((i, j))
                .and_modify(|score| *score = score.max(coaccess))
                .or_insert(coaccess);
        }
    }

    let edges = unique
        .into_iter()
        .map(|((source, target), coaccess)| NetworkEdge {
            source,
            target,
            coaccess,
        })
        .collect();

    Some(EnhancerNetwork {
        gene: gene.to_string(),
        nodes,
        edges,
    })
}

/// One network per gene with at least two assigned peaks, sorted by gene.
pub fn build_networks(
    edges: &[CoaccessEdge],
    assignments: &[EnhancerAssignment],
    coaccess_cutoff: f64,
    pool: &ThreadPool,
) -> anyhow::Result<Vec<EnhancerNetwork>> {
    let filtered = filter_edges(edges, coaccess_cutoff);

    let mut adjacency: HashMap<&str, Vec<(&str, f64)>> = HashMap::new();
    for edge in &filtered {
        adjacency
            .entry(edge.peak1.as_str())
            .or_default()
            .push((edge.peak2.as_str(), edge.coaccess));
        adjacency
            .entry(edge.peak2.as_str())
            .or_default()
            .push((edge.peak1.as_str(), edge.coaccess));
    }

    let mut nodes_by_gene: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for assignment in assignments {
        nodes_by_gene
            .entry(assignment.gene.as_str())
            .or_default()
            .insert(assignment.peak.as_str());
    }
    let genes: Vec<&str> = nodes_by_gene.keys().copied().collect();

    let built = map_by_gene(pool, &genes, |gene| {
        let network = nodes_by_gene
            .get(gene)
            .and_then(|nodes| assemble_network(gene, nodes, &adjacency));
        if network.is_none() {
            debug!("Gene '{}' has fewer than two enhancers, no network", gene);
        }
        Ok(network)
    })?;

    let networks: Vec<EnhancerNetwork> = built.into_iter().filter_map(|(_, n)| n).collect();
    info!(
        "Built {} enhancer networks from {} genes and {} edges at cutoff {}",
        networks.len(),
        genes.len(),
        filtered.len(),
        coaccess_cutoff
    );
    Ok(networks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::worker_pool;
    use approx::assert_relative_eq;

    fn edge(a: &str, b: &str, coaccess: f64) -> CoaccessEdge {
        CoaccessEdge {
            peak1: a.to_string(),
            peak2: b.to_string(),
            coaccess,
        }
    }

    fn assignment(peak: &str, gene: &str) -> EnhancerAssignment {
        EnhancerAssignment {
            peak: peak.to_string(),
            gene: gene.to_string(),
            estimate: 0.5,
            fdr: 0.01,
        }
    }

    fn fixture() -> (Vec<CoaccessEdge>, Vec<EnhancerAssignment>) {
        let edges = vec![
            edge("p1", "p2", 0.6),
            edge("p2", "p1", 0.7),
            edge("p2", "p3", 0.25),
            edge("p1", "p3", 0.1),
            edge("p3", "p4", 0.9),
            edge("p4", "p5", 0.8),
            edge("p5", "p5", 1.0),
        ];
        let assignments = vec![
            assignment("p1", "A"),
            assignment("p2", "A"),
            assignment("p3", "A"),
            assignment("p4", "B"),
            assignment("p5", "B"),
            assignment("p6", "C"),
        ];
        (edges, assignments)
    }

    #[test]
    fn test_cutoff_is_inclusive_and_nodes_restricted() {
        let (edges, assignments) = fixture();
        let pool = worker_pool(2).unwrap();
        let networks = build_networks(&edges, &assignments, 0.25, &pool).unwrap();

        let genes: Vec<&str> = networks.iter().map(|n| n.gene.as_str()).collect();
        assert_eq!(genes, vec!["A", "B"]);

        let a = &networks[0];
        assert_eq!(a.nodes, vec!["p1", "p2", "p3"]);
        assert_eq!(a.n_edges(), 2);
        assert!(a.has_edge("p2", "p1"));
        assert!(a.has_edge("p2", "p3"));
        assert!(!a.has_edge("p1", "p3"));
        assert_relative_eq!(a.edges[0].coaccess, 0.7);
        // p3-p4 crosses genes and is not part of either network
        assert!(!a.has_edge("p3", "p4"));

        let b = &networks[1];
        assert_eq!(b.nodes, vec!["p4", "p5"]);
        assert_eq!(b.n_edges(), 1);
    }

    #[test]
    fn test_edgeless_network_kept_with_zero_connectivity() {
        let (edges, assignments) = fixture();
        let pool = worker_pool(1).unwrap();
        let networks = build_networks(&edges, &assignments, 0.95, &pool).unwrap();
        assert_eq!(networks.len(), 2);
        assert!(networks.iter().all(|n| n.n_edges() == 0));
        assert_eq!(networks[0].connectivity(), 0.0);
    }

    #[test]
    fn test_connectivity_is_mean_degree() {
        let network = EnhancerNetwork {
            gene: "A".to_string(),
            nodes: vec!["p1".into(), "p2".into(), "p3".into(), "p4".into()],
            edges: vec![
                NetworkEdge { source: 0, target: 1, coaccess: 0.5 },
                NetworkEdge { source: 1, target: 2, coaccess: 0.5 },
                NetworkEdge { source: 2, target: 3, coaccess: 0.5 },
            ],
        };
        assert_relative_eq!(network.connectivity(), 1.5);
        assert_eq!(network.degrees(), vec![1, 2, 2, 1]);
    }

    #[test]
    fn test_worker_count_invariance() {
        let (edges, assignments) = fixture();
        let one = build_networks(&edges, &assignments, 0.2, &worker_pool(1).unwrap()).unwrap();
        let eight = build_networks(&edges, &assignments, 0.2, &worker_pool(8).unwrap()).unwrap();
        assert_eq!(one, eight);
    }
}
