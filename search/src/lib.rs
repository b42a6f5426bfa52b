//! Merges the per-chunk [`SearchResult`]s a [`data_types::Query`] fans out to into a single
//! bounded result: top-k hits by sort key, bucket-wise summed histogram.
#![warn(missing_docs, missing_debug_implementations)]

use data_types::{Query, SearchResult};
use std::cmp::Ordering;

/// Merge `results` (one per queried chunk) into a single result bounded to `query.how_many` hits.
///
/// Hits are sorted by `sort_key` descending across the union of all inputs. Histogram buckets
/// are merged bucket-wise using [`data_types::HistogramBucket::compare`]/`merge`, which assumes
/// every input was queried with the same bucket schema (the only configuration the core needs
/// to support). `failed_chunks` across inputs is summed.
pub fn merge(query: &Query, results: Vec<SearchResult>) -> SearchResult {
    let mut hits = Vec::new();
    let mut buckets: Vec<_> = Vec::new();
    let mut failed_chunks = 0;

    for result in results {
        failed_chunks += result.failed_chunks;
        hits.extend(result.hits);

        for incoming in result.buckets {
            match buckets
                .iter_mut()
                .find(|existing: &&mut data_types::HistogramBucket| existing.compare(&incoming) == Ordering::Equal)
            {
                Some(existing) => existing.merge(&incoming),
                None => buckets.push(incoming),
            }
        }
    }

    hits.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));
    hits.truncate(query.how_many);
    buckets.sort_by(|a, b| a.low.cmp(&b.low));

    SearchResult {
        hits,
        buckets,
        failed_chunks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_types::{Hit, HistogramBucket};

    fn query(how_many: usize) -> Query {
        Query {
            start_epoch_s: 0,
            end_epoch_s: 100,
            query_string: "*".to_string(),
            how_many,
            buckets: Vec::new(),
        }
    }

    #[test]
    fn merges_hits_sorted_and_bounded() {
        let a = SearchResult {
            hits: vec![Hit { sort_key: 1, payload: vec![1] }, Hit { sort_key: 3, payload: vec![3] }],
            buckets: Vec::new(),
            failed_chunks: 0,
        };
        let b = SearchResult {
            hits: vec![Hit { sort_key: 2, payload: vec![2] }],
            buckets: Vec::new(),
            failed_chunks: 1,
        };

        let merged = merge(&query(2), vec![a, b]);
        assert_eq!(merged.hits.len(), 2);
        assert_eq!(merged.hits[0].sort_key, 3);
        assert_eq!(merged.hits[1].sort_key, 2);
        assert_eq!(merged.failed_chunks, 1);
    }

    #[test]
    fn merges_overlapping_buckets_by_summing_counts() {
        let a = SearchResult {
            hits: Vec::new(),
            buckets: vec![HistogramBucket { low: 0, high: 10, count: 3 }],
            failed_chunks: 0,
        };
        let b = SearchResult {
            hits: Vec::new(),
            buckets: vec![HistogramBucket { low: 0, high: 10, count: 4 }],
            failed_chunks: 0,
        };

        let merged = merge(&query(10), vec![a, b]);
        assert_eq!(merged.buckets.len(), 1);
        assert_eq!(merged.buckets[0].count, 7);
    }

    #[test]
    fn distinct_non_overlapping_buckets_stay_separate() {
        let a = SearchResult {
            hits: Vec::new(),
            buckets: vec![HistogramBucket { low: 0, high: 10, count: 1 }],
            failed_chunks: 0,
        };
        let b = SearchResult {
            hits: Vec::new(),
            buckets: vec![HistogramBucket { low: 10, high: 20, count: 1 }],
            failed_chunks: 0,
        };

        let merged = merge(&query(10), vec![a, b]);
        assert_eq!(merged.buckets.len(), 2);
    }
}
