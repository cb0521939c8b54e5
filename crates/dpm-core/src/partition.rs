//! Work partitioner.
//!
//! Splits the filtered catalog into contiguous chunks, one per worker.
//! Static partitioning trades load balance for determinism: under skewed
//! per-item latency some workers finish early and idle, which is an
//! accepted limitation.

/// Split `catalog` into at most `worker_count` contiguous, in-order chunks.
///
/// Chunk size is `max(1, ceil(len / worker_count))`; the last chunk may be
/// shorter. Chunks partition the input without overlap or omission.
pub fn partition(catalog: &[String], worker_count: usize) -> Vec<Vec<String>> {
    let worker_count = worker_count.max(1);
    if catalog.is_empty() {
        return Vec::new();
    }

    let chunk_size = catalog.len().div_ceil(worker_count).max(1);
    catalog
        .chunks(chunk_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn catalog(len: usize) -> Vec<String> {
        (0..len).map(|i| format!("metric_{i}")).collect()
    }

    #[test]
    fn chunks_partition_without_overlap_or_omission() {
        for len in 0..40 {
            for workers in 1..12 {
                let input = catalog(len);
                let chunks = partition(&input, workers);

                let total: usize = chunks.iter().map(Vec::len).sum();
                assert_eq!(total, len, "chunk lengths must sum to the catalog size");

                let rebuilt: Vec<String> = chunks.into_iter().flatten().collect();
                assert_eq!(
                    rebuilt, input,
                    "concatenating chunks in order must reconstruct the catalog"
                );
            }
        }
    }

    #[test]
    fn chunk_count_never_exceeds_worker_count() {
        for len in 0..40 {
            for workers in 1..12 {
                let chunks = partition(&catalog(len), workers);
                assert!(
                    chunks.len() <= workers,
                    "{} chunks for {workers} workers over {len} items",
                    chunks.len()
                );
            }
        }
    }

    #[test]
    fn chunk_length_is_bounded_by_ceil_division() {
        for len in 1..40usize {
            for workers in 1..12 {
                let bound = len.div_ceil(workers);
                for chunk in partition(&catalog(len), workers) {
                    assert!(chunk.len() <= bound);
                    assert!(!chunk.is_empty(), "empty chunks are never produced");
                }
            }
        }
    }

    #[test]
    fn zero_workers_behaves_like_one() {
        let input = catalog(5);

        assert_eq!(partition(&input, 0), vec![input]);
    }

    #[test]
    fn more_workers_than_items_yields_single_item_chunks() {
        let input = catalog(3);

        let chunks = partition(&input, 10);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|chunk| chunk.len() == 1));
    }
}
