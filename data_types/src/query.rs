use std::cmp::Ordering;

/// A time-bounded search request dispatched to every chunk whose data overlaps
/// `[start_epoch_s, end_epoch_s]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Inclusive lower bound of the time range to search.
    pub start_epoch_s: i64,
    /// Inclusive upper bound of the time range to search.
    pub end_epoch_s: i64,
    /// Opaque query text handed to the (out of scope) index store.
    pub query_string: String,
    /// Maximum number of hits to return, after merging across chunks.
    pub how_many: usize,
    /// Histogram bucket boundaries requested for this query, if any.
    pub buckets: Vec<HistogramBucket>,
}

impl Query {
    /// Whether this query's time range intersects `[data_start_epoch_s, data_end_epoch_s]`.
    pub fn overlaps(&self, data_start_epoch_s: i64, data_end_epoch_s: i64) -> bool {
        self.start_epoch_s <= data_end_epoch_s && self.end_epoch_s >= data_start_epoch_s
    }
}

/// A single matched record, as returned by an index store search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    /// The query's sort key for this hit; higher sorts first (newest-first log search).
    pub sort_key: i64,
    /// The matched record, serialized.
    pub payload: Vec<u8>,
}

/// A half-open `[low, high)` bucket of a search-result histogram.
///
/// Two buckets are considered the same bucket ("equal") if their ranges overlap at all; this
/// lets the aggregator merge histograms from chunks that don't share exact bucket boundaries as
/// long as every chunk was queried with the same bucket schema, which is the only configuration
/// the core actually needs to support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramBucket {
    /// Inclusive lower bound.
    pub low: i64,
    /// Exclusive upper bound.
    pub high: i64,
    /// Number of records falling in this bucket.
    pub count: u64,
}

impl HistogramBucket {
    /// Compare two buckets by the overlap rule: overlapping ranges are `Equal`, otherwise
    /// ordered by position. Deliberately not a [`PartialOrd`]/[`Ord`] impl: overlap-equality is
    /// not transitive, so this must never be used to sort a set of buckets against each other,
    /// only to merge two schema-aligned sequences pairwise.
    pub fn compare(&self, other: &Self) -> Ordering {
        if self.high <= other.low {
            Ordering::Less
        } else if other.high <= self.low {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    /// Merge another bucket covering the same range into this one, summing counts.
    pub fn merge(&mut self, other: &Self) {
        debug_assert_eq!(self.compare(other), Ordering::Equal);
        self.count += other.count;
    }
}

/// The bounded, merged result of a [`Query`] dispatched across every overlapping chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// Top-k hits, sorted by `sort_key` descending, bounded to the query's `how_many`.
    pub hits: Vec<Hit>,
    /// Bucket-wise summed histogram.
    pub buckets: Vec<HistogramBucket>,
    /// Number of chunks whose query failed; their hits/buckets are simply absent, not retried.
    pub failed_chunks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_compare_overlap_is_equal() {
        let a = HistogramBucket { low: 0, high: 10, count: 1 };
        let b = HistogramBucket { low: 5, high: 15, count: 1 };
        assert_eq!(a.compare(&b), Ordering::Equal);
    }

    #[test]
    fn bucket_compare_touching_edges_are_not_equal() {
        let a = HistogramBucket { low: 0, high: 10, count: 1 };
        let b = HistogramBucket { low: 10, high: 20, count: 1 };
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(b.compare(&a), Ordering::Greater);
    }
}
