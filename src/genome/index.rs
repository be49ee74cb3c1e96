//! Static per-chromosome interval index.
//!
//! Intervals are kept sorted by start for each chromosome together with the widest interval
//! seen on that chromosome. A query `[qs, qe)` only has to look at entries whose start lies in
//! `[qs - max_width, qe)`, which two binary searches locate. Build once, query many times.

use std::collections::HashMap;

use super::Peak;

#[derive(Debug, Clone)]
struct ChromIntervals<T> {
    /// `(start, end, payload)`, sorted by start.
    entries: Vec<(u64, u64, T)>,
    max_width: u64,
}

#[derive(Debug, Clone)]
pub struct IntervalIndex<T> {
    chroms: HashMap<String, ChromIntervals<T>>,
    len: usize,
}

impl<T> IntervalIndex<T> {
    pub fn from_intervals<I>(intervals: I) -> Self
    where
        I: IntoIterator<Item = (Peak, T)>,
    {
        let mut chroms: HashMap<String, ChromIntervals<T>> = HashMap::new();
        let mut len = 0;

        for (interval, payload) in intervals {
            let width = interval.width();
            let bucket = chroms
                .entry(interval.chrom)
                .or_insert_with(|| ChromIntervals {
                    entries: Vec::new(),
                    max_width: 0,
                });
            bucket.max_width = bucket.max_width.max(width);
            bucket.entries.push((interval.start, interval.end, payload));
            len += 1;
        }

        for bucket in chroms.values_mut() {
            bucket.entries.sort_by_key(|&(start, end, _)| (start, end));
        }

        IntervalIndex { chroms, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Payloads of all intervals overlapping `region`, in start order.
    pub fn query(&self, region: &Peak) -> Vec<&T> {
        self.candidates(region)
            .filter(|(_, end, _)| *end > region.start)
            .map(|(_, _, payload)| payload)
            .collect()
    }

    pub fn overlaps_any(&self, region: &Peak) -> bool {
        self.candidates(region)
            .any(|(_, end, _)| *end > region.start)
    }

    fn candidates<'a>(
        &'a self,
        region: &Peak,
    ) -> impl Iterator<Item = &'a (u64, u64, T)> + 'a {
        let slice: &'a [(u64, u64, T)] = match self.chroms.get(&region.chrom) {
            Some(bucket) => {
                let lower_start = region.start.saturating_sub(bucket.max_width);
                let lo = bucket
                    .entries
                    .partition_point(|(start, _, _)| *start < lower_start);
                let hi = bucket
                    .entries
                    .partition_point(|(start, _, _)| *start < region.end);
                &bucket.entries[lo..hi.max(lo)]
            }
            None => &[],
        };
        slice.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(id: &str) -> Peak {
        Peak::parse(id).unwrap()
    }

    fn index() -> IntervalIndex<&'static str> {
        IntervalIndex::from_intervals(vec![
            (peak("chr1-500-600"), "c"),
            (peak("chr1-100-200"), "a"),
            (peak("chr1-150-10150"), "wide"),
            (peak("chr1-300-400"), "b"),
            (peak("chr2-100-200"), "other"),
        ])
    }

    #[test]
    fn test_query_finds_overlaps_in_start_order() {
        let idx = index();
        assert_eq!(idx.len(), 5);
        assert_eq!(idx.query(&peak("chr1-180-320")), vec![&"a", &"wide", &"b"]);
        assert_eq!(idx.query(&peak("chr2-0-150")), vec![&"other"]);
    }

    #[test]
    fn test_wide_interval_found_far_from_its_start() {
        let idx = index();
        assert_eq!(idx.query(&peak("chr1-9000-9001")), vec![&"wide"]);
        assert!(idx.overlaps_any(&peak("chr1-10149-10150")));
        assert!(!idx.overlaps_any(&peak("chr1-10150-10151")));
    }

    #[test]
    fn test_unknown_chromosome_and_empty_index() {
        let idx = index();
        assert!(idx.query(&peak("chr3-0-1000")).is_empty());

        let empty: IntervalIndex<usize> = IntervalIndex::from_intervals(Vec::new());
        assert!(empty.is_empty());
        assert!(!empty.overlaps_any(&peak("chr1-0-10")));
    }
}
