//! Bounded worker pool and the per-gene parallel map used by every stage.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::MAX_WORKERS;
use crate::error::PipelineError;

pub fn worker_pool(workers: usize) -> anyhow::Result<ThreadPool> {
    if workers == 0 || workers > MAX_WORKERS {
        return Err(PipelineError::config(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, workers
        )));
    }
    ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("enhancer-worker-{}", i))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build worker pool: {}", e))
}

/// Run `work` once per gene on `pool` and return the results keyed and sorted by gene.
///
/// The first failing gene aborts the batch; its error comes back as
/// [`PipelineError::WorkerFailure`] naming that gene. Gene keys must be unique.
pub fn map_by_gene<G, R, F>(pool: &ThreadPool, genes: &[G], work: F) -> anyhow::Result<Vec<(String, R)>>
where
    G: AsRef<str> + Sync,
    R: Send,
    F: Fn(&str) -> anyhow::Result<R> + Sync,
{
    let mut results = pool.install(|| {
        genes
            .par_iter()
            .map(|gene| {
                let gene = gene.as_ref();
                work(gene)
                    .map(|result| (gene.to_string(), result))
                    .map_err(|e| PipelineError::worker(gene, e))
            })
            .collect::<anyhow::Result<Vec<_>>>()
    })?;

    results.sort_by(|a, b| a.0.cmp(&b.0));
    if let Some(pair) = results.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(PipelineError::contract(format!(
            "gene '{}' was scheduled more than once",
            pair[0].0
        )));
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_sorted_by_gene() {
        let pool = worker_pool(4).unwrap();
        let genes = vec!["TP53", "ACTB", "MYC", "GAPDH"];
        let results = map_by_gene(&pool, &genes, |g| Ok(g.len())).unwrap();
        let keys: Vec<&str> = results.iter().map(|(g, _)| g.as_str()).collect();
        assert_eq!(keys, vec!["ACTB", "GAPDH", "MYC", "TP53"]);
        assert_eq!(results[0].1, 4);
    }

    #[test]
    fn test_worker_count_does_not_change_output() {
        let genes: Vec<String> = (0..200).map(|i| format!("gene{:03}", (i * 37) % 200)).collect();
        let work = |g: &str| Ok(g.bytes().map(|b| b as u64).sum::<u64>());
        let single = map_by_gene(&worker_pool(1).unwrap(), &genes, work).unwrap();
        let many = map_by_gene(&worker_pool(8).unwrap(), &genes, work).unwrap();
        assert_eq!(single, many);
    }

    #[test]
    fn test_failure_names_gene() {
        let pool = worker_pool(2).unwrap();
        let genes = vec!["A", "B", "C"];
        let err = map_by_gene(&pool, &genes, |g| {
            if g == "B" {
                Err(anyhow::anyhow!("boom"))
            } else {
                Ok(())
            }
        })
        .unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::WorkerFailure { gene, .. }) => assert_eq!(gene, "B"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_genes_rejected() {
        let pool = worker_pool(2).unwrap();
        assert!(map_by_gene(&pool, &["A", "A"], |_| Ok(())).is_err());
    }

    #[test]
    fn test_pool_bounds() {
        assert!(worker_pool(0).is_err());
        assert!(worker_pool(MAX_WORKERS + 1).is_err());
    }
}
